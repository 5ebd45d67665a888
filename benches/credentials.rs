use chrono::Utc;
use couchbase_dbplugin::cluster::InMemoryCluster;
use couchbase_dbplugin::credentials::{
    CredentialsProducer, TemplateCredentialsProducer, UsernameConfig,
};
use couchbase_dbplugin::plugin::{Couchbase, Database, Statements};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const STATEMENT: &str = r#"{"roles":[{"role":"bucket_full_access","bucket_name":"Test"}]}"#;

fn bench_generate_username(c: &mut Criterion) {
    let producer = TemplateCredentialsProducer::default();

    let mut group = c.benchmark_group("credentials_username");
    for len in [0usize, 15, 64].iter() {
        let config = UsernameConfig::new("d".repeat(*len), "r".repeat(*len));
        group.bench_with_input(BenchmarkId::new("generate_username", len), &config, |b, config| {
            b.iter(|| black_box(producer.generate_username(black_box(config)).unwrap()));
        });
    }
    group.finish();
}

fn bench_generate_password(c: &mut Criterion) {
    let producer = TemplateCredentialsProducer::default();

    c.bench_function("generate_password", |b| {
        b.iter(|| black_box(producer.generate_password().unwrap()));
    });
}

fn bench_create_user_in_memory(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("lifecycle_in_memory");
    group.measurement_time(Duration::from_secs(5));

    let cluster = InMemoryCluster::new("admin", "password").with_bucket("Test");
    let db = Couchbase::with_connector(Arc::new(cluster));
    let config = json!({
        "connection_string": "couchbase://localhost",
        "username": "admin",
        "password": "password",
        "bucket": "Test"
    });
    rt.block_on(db.init(config.as_object().cloned().unwrap(), true)).unwrap();

    let statements = Statements::creation(STATEMENT);
    let username_config = UsernameConfig::new("bench", "writer");

    group.bench_function("create_user", |b| {
        b.to_async(&rt).iter(|| async {
            let created =
                db.create_user(&statements, &username_config, Utc::now()).await.unwrap();
            black_box(created)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_generate_username,
    bench_generate_password,
    bench_create_user_in_memory
);
criterion_main!(benches);

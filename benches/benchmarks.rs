use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use daedalus::{Class, Database, OpenMode, Primitive, PrimitiveType, Value};
use tempfile::TempDir;

fn coords_class() -> Class {
    Class::strct(
        "coords",
        vec![
            Class::primitive("lat", PrimitiveType::F64).unwrap(),
            Class::primitive("lon", PrimitiveType::F64).unwrap(),
        ],
    )
    .unwrap()
}

fn name_class() -> Class {
    Class::string("name").unwrap()
}

fn setup_fixed(rows: usize) -> (TempDir, Database, Class) {
    let dir = TempDir::new().unwrap();
    let mut db = Database::open(dir.path().join("bench.ddb"), OpenMode::Write).unwrap();
    let class = coords_class();
    db.add_class(&class).unwrap();
    for i in 0..rows {
        db.add_node(
            &class,
            Value::Struct(vec![
                Value::Primitive(Primitive::F64(i as f64)),
                Value::Primitive(Primitive::F64((i * 2) as f64)),
            ]),
        )
        .unwrap();
    }
    (dir, db, class)
}

fn setup_var(rows: usize) -> (TempDir, Database, Class) {
    let dir = TempDir::new().unwrap();
    let mut db = Database::open(dir.path().join("bench.ddb"), OpenMode::Write).unwrap();
    let class = name_class();
    db.add_class(&class).unwrap();
    for i in 0..rows {
        db.add_node(&class, Value::Str(format!("name_{i}"))).unwrap();
    }
    (dir, db, class)
}

fn bench_fixed_insert(c: &mut Criterion) {
    c.bench_function("fixed_size_insert_1000", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let mut db = Database::open(dir.path().join("bench.ddb"), OpenMode::Write).unwrap();
                let class = coords_class();
                db.add_class(&class).unwrap();
                (dir, db, class)
            },
            |(_dir, mut db, class)| {
                for i in 0..1000 {
                    db.add_node(
                        &class,
                        Value::Struct(vec![
                            Value::Primitive(Primitive::F64(i as f64)),
                            Value::Primitive(Primitive::F64((i * 2) as f64)),
                        ]),
                    )
                    .unwrap();
                }
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_var_insert(c: &mut Criterion) {
    c.bench_function("var_size_insert_1000", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let mut db = Database::open(dir.path().join("bench.ddb"), OpenMode::Write).unwrap();
                let class = name_class();
                db.add_class(&class).unwrap();
                (dir, db, class)
            },
            |(_dir, mut db, class)| {
                for i in 0..1000 {
                    db.add_node(&class, Value::Str(format!("name_{i}"))).unwrap();
                }
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_fixed_scan(c: &mut Criterion) {
    let (_dir, mut db, class) = setup_fixed(5_000);
    c.bench_function("fixed_size_scan_5000_with_predicate", |b| {
        b.iter(|| {
            db.collect_nodes_if(&class, |id, _| id % 2 == 0).unwrap()
        })
    });
}

fn bench_var_scan(c: &mut Criterion) {
    let (_dir, mut db, class) = setup_var(5_000);
    c.bench_function("var_size_scan_5000", |b| {
        b.iter(|| db.collect_nodes_if(&class, |_, _| true).unwrap())
    });
}

fn bench_fixed_remove(c: &mut Criterion) {
    c.bench_function("fixed_size_remove_half_of_1000", |b| {
        b.iter_batched(
            || setup_fixed(1000),
            |(_dir, mut db, class)| {
                db.remove_nodes_if(&class, |id, _| id % 2 == 0).unwrap();
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_fixed_insert,
    bench_var_insert,
    bench_fixed_scan,
    bench_var_scan,
    bench_fixed_remove,
);
criterion_main!(benches);

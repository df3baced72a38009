use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rh_table::{ErasedTable, ErasedValue, TypeDesc};
use std::sync::Arc;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

struct Descs {
    key: Arc<TypeDesc>,
    value: Arc<TypeDesc>,
    pair: Arc<TypeDesc>,
}

fn descs() -> Descs {
    let key = Arc::new(TypeDesc::of::<u64>("u64"));
    let value = Arc::new(TypeDesc::of::<String>("String"));
    let pair = Arc::new(TypeDesc::pair(key.clone(), value.clone()));
    Descs { key, value, pair }
}

fn entry(d: &Descs, k: u64) -> ErasedValue {
    ErasedValue::pair(
        d.pair.clone(),
        ErasedValue::from_typed(d.key.clone(), k),
        ErasedValue::from_typed(d.value.clone(), format!("v{k}")),
    )
}

fn bench_insert_10k(c: &mut Criterion) {
    let d = descs();
    c.bench_function("erased::insert_10k", |b| {
        b.iter_batched(
            || {
                let entries: Vec<ErasedValue> = lcg(1).take(10_000).map(|k| entry(&d, k)).collect();
                (ErasedTable::new_set(d.pair.clone()), entries)
            },
            |(mut t, entries)| {
                for e in entries {
                    t.insert(e);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_hit_10k(c: &mut Criterion) {
    let d = descs();
    c.bench_function("erased::find_hit_10k", |b| {
        let mut t = ErasedTable::new_set(d.pair.clone());
        let keys: Vec<u64> = lcg(7).take(10_000).collect();
        for &k in &keys {
            t.insert(entry(&d, k));
        }
        let queries: Vec<ErasedValue> = keys
            .iter()
            .map(|&k| ErasedValue::from_typed(d.key.clone(), k))
            .collect();
        b.iter(|| {
            for q in &queries {
                black_box(t.find(q.as_ref()));
            }
        })
    });
}

fn bench_serialize_10k(c: &mut Criterion) {
    let d = descs();
    c.bench_function("erased::serialize_10k", |b| {
        let mut t = ErasedTable::new_set(d.pair.clone());
        for k in lcg(9).take(10_000) {
            t.insert(entry(&d, k));
        }
        b.iter(|| black_box(t.serialize().unwrap()))
    });
}

fn bench_deserialize_10k(c: &mut Criterion) {
    let d = descs();
    c.bench_function("erased::deserialize_10k", |b| {
        let mut t = ErasedTable::new_set(d.pair.clone());
        for k in lcg(11).take(10_000) {
            t.insert(entry(&d, k));
        }
        let json = t.serialize().unwrap();
        b.iter_batched(
            || ErasedTable::new_set(d.pair.clone()),
            |mut back| {
                back.deserialize(&json).unwrap();
                black_box(back)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert_10k,
              bench_find_hit_10k,
              bench_serialize_10k,
              bench_deserialize_10k
}
criterion_main!(benches);

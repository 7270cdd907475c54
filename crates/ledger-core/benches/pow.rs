use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{
    mine::mine_block_parallel,
    pow::{mine_block, MineControl},
    Block,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

fn candidate(rng: &mut StdRng) -> Block {
    let items: Vec<String> = (0..10).map(|i| format!("item-{i}")).collect();
    Block::new(
        1,
        "0".repeat(64),
        json!({"total": rng.gen_range(1..100_000u64), "items": items}),
    )
}

fn bench_pow(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let block = candidate(&mut rng);

    c.bench_function("mine_block_difficulty_4", |b| {
        b.iter(|| {
            let _mined = mine_block(block.clone(), 4);
        });
    });

    c.bench_function("mine_block_parallel_difficulty_4", |b| {
        let control = MineControl::unbounded();
        b.iter(|| {
            let _mined = mine_block_parallel(block.clone(), 4, &control);
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tnrs::ctrie::CtrieDatabase;

const SYLLABLES: [&str; 12] = [
    "an", "ba", "cor", "del", "eri", "fla", "gon", "his", "ium", "lor", "mus", "pte",
];

fn synthetic_binomial(rng: &mut StdRng) -> String {
    let word = |rng: &mut StdRng, parts: usize| {
        (0..parts)
            .map(|_| SYLLABLES[rng.gen_range(0..SYLLABLES.len())])
            .collect::<String>()
    };
    format!("{} {}", word(rng, 3), word(rng, 4))
}

fn fuzzy_bench(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(20_200_116);
    let entries: Vec<(String, u64)> = (0..20_000u64)
        .map(|i| (synthetic_binomial(&mut rng), i))
        .collect();
    let db = CtrieDatabase::build(entries).expect("Error building trie database");

    c.bench_function("fuzzy_query", |b| {
        b.iter(|| db.fuzzy_query("corbaan hislorium"));
    });
    c.bench_function("exact_query", |b| {
        b.iter(|| db.exact_query("corbaan hislorium"));
    });
    c.bench_function("prefix_query", |b| {
        b.iter(|| db.prefix_query("cor"));
    });
}

criterion_group!(benches, fuzzy_bench);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rnaec::libs::apc::ApcCorrector;
use rnaec::libs::chunk::{ChunkParams, ChunkingOrchestrator};
use rnaec::libs::filter::sequence_weights;
use rnaec::libs::mi::MiEstimator;
use rnaec::libs::msa::Alignment;
use rnaec::libs::pool::WorkerPool;

fn random_alignment(n: usize, len: usize) -> Alignment {
    let mut rng = SmallRng::seed_from_u64(42);
    let seqs: Vec<Vec<u8>> = (0..n)
        .map(|_| (0..len).map(|_| b"ACGU-"[rng.gen_range(0..5)]).collect())
        .collect();
    Alignment::from_seqs(&seqs).unwrap()
}

fn bench_estimate(c: &mut Criterion) {
    let pool = WorkerPool::new(None).unwrap();
    let estimator = MiEstimator::default();

    let mut group = c.benchmark_group("estimate");
    for len in [50, 100, 200] {
        let aln = random_alignment(100, len);
        let weights = vec![0.01; 100];
        group.bench_with_input(BenchmarkId::from_parameter(len), &aln, |b, aln| {
            b.iter(|| estimator.estimate(black_box(aln), &weights, 0.2, &pool).unwrap())
        });
    }
    group.finish();
}

fn bench_weights(c: &mut Criterion) {
    let pool = WorkerPool::new(None).unwrap();
    let aln = random_alignment(1000, 100);

    c.bench_function("sequence_weights 1000x100", |b| {
        b.iter(|| sequence_weights(black_box(aln.seqs()), 0.8, 500, &pool))
    });
}

fn bench_chunked(c: &mut Criterion) {
    let pool = WorkerPool::new(None).unwrap();
    let aln = random_alignment(50, 400);
    let weights = vec![0.02; 50];
    let orchestrator = ChunkingOrchestrator::new(
        ChunkParams {
            max_length: 200,
            chunk_size: 150,
            overlap: 50,
        },
        MiEstimator::default(),
        ApcCorrector::default(),
    )
    .unwrap();

    c.bench_function("chunked 50x400", |b| {
        b.iter(|| {
            orchestrator
                .process(black_box(&aln), &weights, 0.2, &pool)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_estimate, bench_weights, bench_chunked);
criterion_main!(benches);

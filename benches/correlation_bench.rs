use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use mcorr::bam_source::Batch;
use mcorr::codon_comparator::CodonComparator;
use mcorr::lag_covariance::LagCovariances;
use mcorr::pipeline::process_batch;
use mcorr::read_projector::{AlignOp, AlignmentRecord, MappedRead};
use mcorr::{CorrConfig, GeneticCode};

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Deterministic pseudo-random sequence (xorshift)
fn synthetic_sequence(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            BASES[(state % 4) as usize]
        })
        .collect()
}

/// Reads tiled over one reference, each a copy of the genome with a few
/// substitutions.
fn synthetic_batch(n_reads: usize, read_len: usize, step: usize) -> Batch {
    let genome = synthetic_sequence(n_reads * step + read_len, 42);
    let records = (0..n_reads)
        .map(|i| {
            let start = i * step;
            let mut sequence = genome[start..start + read_len].to_vec();
            for k in (i % 7..read_len).step_by(37) {
                sequence[k] = BASES[(i + k) % 4];
            }
            AlignmentRecord {
                reference_id: 0,
                position: start as i64,
                mapping_quality: 40,
                ops: vec![AlignOp::Match(read_len as u32)],
                sequence,
                qualities: vec![35; read_len],
            }
        })
        .collect();
    Batch {
        reference: "chr1".to_string(),
        records,
    }
}

fn bench_compare(c: &mut Criterion) {
    let code = GeneticCode::ncbi("11").unwrap();
    let config = CorrConfig::default();
    let comparator = CodonComparator::new(&code, &config);

    let genome = synthetic_sequence(400, 7);
    let a = MappedRead::new(0, genome[..250].to_vec(), vec![35; 250]);
    let mut shifted = genome[40..290].to_vec();
    for k in (5..shifted.len()).step_by(11) {
        shifted[k] = BASES[k % 4];
    }
    let b = MappedRead::new(40, shifted, vec![35; 250]);

    c.bench_function("codon_compare_250bp", |bench| {
        bench.iter(|| comparator.compare(black_box(&a), black_box(&b)))
    });

    let profile = comparator.compare(&a, &b);
    let mut group = c.benchmark_group("lag_accumulation");
    for max_lag in [30usize, 100, 300] {
        group.bench_with_input(BenchmarkId::from_parameter(max_lag), &max_lag, |bench, &max_lag| {
            bench.iter(|| {
                let mut lags = LagCovariances::new(max_lag);
                lags.add_profile(black_box(&profile));
                lags.results()
            })
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let code = GeneticCode::ncbi("11").unwrap();
    let config = CorrConfig::default();

    let mut group = c.benchmark_group("process_batch");
    group.sample_size(10);
    for n_reads in [200usize, 1000] {
        let batch = synthetic_batch(n_reads, 150, 25);
        group.bench_with_input(BenchmarkId::from_parameter(n_reads), &batch, |bench, batch| {
            bench.iter(|| process_batch(black_box(batch), &config, &code).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compare, bench_batch);
criterion_main!(benches);

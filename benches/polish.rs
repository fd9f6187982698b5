use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use plateqc::bscore::compute_bscore;
use plateqc::plate::{MeasurementMatrix, PlateLayout};
use plateqc::polish::{MedianPolish, PolishConfig};

fn plate(wells: usize) -> (PlateLayout, MeasurementMatrix) {
    let layout = PlateLayout::standard(wells).unwrap();
    let values = Array2::from_shape_fn(layout.shape(), |(r, c)| {
        let noise = ((r as f64) * 12.9898 + (c as f64) * 78.233).sin();
        100.0 + 0.3 * r as f64 - 0.1 * c as f64 + noise
    });
    (layout, MeasurementMatrix::from_values(&values))
}

fn bench_median_polish(c: &mut Criterion) {
    let mut group = c.benchmark_group("MedianPolish");
    let solver = MedianPolish::new(PolishConfig::default());

    for wells in [96, 384, 1536] {
        let (_, matrix) = plate(wells);
        group.bench_with_input(BenchmarkId::from_parameter(wells), &matrix, |b, m| {
            b.iter(|| solver.solve(m).unwrap());
        });
    }
    group.finish();
}

fn bench_bscore(c: &mut Criterion) {
    let mut group = c.benchmark_group("BScore");
    let config = PolishConfig::default();

    for wells in [96, 384, 1536] {
        let (_, matrix) = plate(wells);
        group.bench_with_input(BenchmarkId::from_parameter(wells), &matrix, |b, m| {
            b.iter(|| compute_bscore(m, &config).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_median_polish, bench_bscore);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use plateqc::edge::{generate_report, DetectorConfig, EdgeEffectDetector};
use plateqc::plate::{MeasurementMatrix, PlateLayout};

fn plate(wells: usize, offset: f64) -> (PlateLayout, MeasurementMatrix) {
    let layout = PlateLayout::standard(wells).unwrap();
    let values = Array2::from_shape_fn(layout.shape(), |(r, c)| {
        let noise = ((r as f64) * 12.9898 + (c as f64) * 78.233).sin();
        let rim = if layout.is_edge(r, c) { offset } else { 0.0 };
        100.0 + noise + rim
    });
    (layout, MeasurementMatrix::from_values(&values))
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("Detect");
    let detector = EdgeEffectDetector::default();

    for wells in [96, 384, 1536] {
        let (layout, matrix) = plate(wells, 2.0);
        group.bench_with_input(BenchmarkId::from_parameter(wells), &matrix, |b, m| {
            b.iter(|| detector.detect(m, &layout, "signal", "P1").unwrap());
        });
    }
    group.finish();
}

fn bench_detect_without_spatial(c: &mut Criterion) {
    let mut group = c.benchmark_group("Detect_NoMoransI");
    let detector =
        EdgeEffectDetector::new(DetectorConfig::default().with_spatial_autocorrelation(false));

    for wells in [96, 384, 1536] {
        let (layout, matrix) = plate(wells, 2.0);
        group.bench_with_input(BenchmarkId::from_parameter(wells), &matrix, |b, m| {
            b.iter(|| detector.detect(m, &layout, "signal", "P1").unwrap());
        });
    }
    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let detector = EdgeEffectDetector::default();
    let results: Vec<_> = (0..100)
        .map(|p| {
            let (layout, matrix) = plate(384, p as f64 * 0.05);
            detector
                .detect(&matrix, &layout, "signal", &format!("P{p}"))
                .unwrap()
        })
        .collect();

    c.bench_function("Report_100_plates", |b| {
        b.iter(|| generate_report(&results));
    });
}

criterion_group!(benches, bench_detect, bench_detect_without_spatial, bench_report);
criterion_main!(benches);

use criterion::*;
use nesting_engine::*;

fn build_pieces(n: usize) -> Vec<(u32, u32)> {
    (0..n)
        .map(|i| {
            let width = 200 + (i * 37) % 2800;
            let drop = 300 + (i * 53) % 4500;
            (width as u32, drop as u32)
        })
        .collect()
}

pub fn benchmark_compute_layout(c: &mut Criterion) {
    let pieces = build_pieces(200);
    c.bench_function("compute_layout 200 pieces", |b| {
        b.iter(|| compute_layout(black_box(&pieces), 3000, 10).unwrap())
    });
}

pub fn benchmark_build_markers(c: &mut Criterion) {
    let pieces = build_pieces(200);
    let layout = compute_layout(&pieces, 3000, 10).unwrap();
    c.bench_function("build_markers_from_layout 200 pieces", |b| {
        b.iter(|| {
            clear_marker_cache();
            build_markers_from_layout(black_box(&layout.placements), 3000.0, "batch", None)
        })
    });
}

pub fn benchmark_compute_tube_plan(c: &mut Criterion) {
    let items: Vec<(u32, u32)> = (0..50).map(|i| (500 + (i * 97) % 5000, 3)).collect();
    c.bench_function("compute_tube_plan 50 widths", |b| {
        b.iter(|| compute_tube_plan(black_box(&items), 6000, 3, "BFD"))
    });
}

criterion_group!(
    benches,
    benchmark_compute_layout,
    benchmark_build_markers,
    benchmark_compute_tube_plan
);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    benches();
    Criterion::default().configure_from_args().final_summary();
}

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Vec2;
use lenskit_math::*;

const UNIT_SQUARE: [Vec2; 4] = [
    Vec2::new(-0.5, -0.5),
    Vec2::new(0.5, -0.5),
    Vec2::new(-0.5, 0.5),
    Vec2::new(0.5, 0.5),
];

fn bench_rotation(c: &mut Criterion) {
    c.bench_function("matrix_rotation", |bencher| {
        bencher.iter(|| black_box(Matrix2x2::rotation(black_box(-37.5))))
    });
}

fn bench_rotated_bounds(c: &mut Criterion) {
    let m = Matrix2x2::rotation(-37.5);
    c.bench_function("rotated_unit_square_bounds", |bencher| {
        bencher.iter(|| {
            black_box(Bounds2::from_points(
                UNIT_SQUARE.iter().map(|&p| black_box(m) * p),
            ))
        })
    });
}

criterion_group!(benches, bench_rotation, bench_rotated_bounds);
criterion_main!(benches);

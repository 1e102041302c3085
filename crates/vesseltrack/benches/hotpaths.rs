use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vesseltrack::sphere::{sample_full_sphere, sample_half_sphere};
use vesseltrack::tracking::{fit_cylinder_ransac, sample_filtered, RansacParams};
use vesseltrack::{next_cylinder, Cylinder, TrackingConfig, TubePhantom};

fn noisy_tube(n_in: usize, n_out: usize, seed: u64) -> Vec<Point3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pts = Vec::with_capacity(n_in + n_out);
    for _ in 0..n_in {
        let th = rng.gen_range(0.0..std::f64::consts::TAU);
        let r = 2.0 + rng.gen_range(-0.05..0.05);
        pts.push(Point3::new(r * th.cos(), r * th.sin(), rng.gen_range(-3.0..3.0)));
    }
    for _ in 0..n_out {
        pts.push(Point3::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
        ));
    }
    pts
}

fn bench_sphere(c: &mut Criterion) {
    c.bench_function("full_sphere_500", |b| {
        b.iter(|| black_box(sample_full_sphere(black_box(500))))
    });
    c.bench_function("half_sphere_200", |b| {
        b.iter(|| black_box(sample_half_sphere(black_box(200))))
    });
}

fn bench_ransac(c: &mut Criterion) {
    let points = noisy_tube(160, 40, 7);
    let axis = Vector3::z_axis();
    let params = RansacParams {
        nb_test_min: 100,
        nb_test_max: 1000,
        pct_inlier_target: 0.8,
        r_min: 1.0,
        r_max: 4.0,
        err_threshold: 0.3,
    };
    c.bench_function("ransac_200pts", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| black_box(fit_cylinder_ransac(black_box(&points), &axis, &params, &mut rng)))
    });
}

fn bench_rays(c: &mut Criterion) {
    let Ok(volume) = TubePhantom::straight().render() else {
        return;
    };
    let config = TrackingConfig::default();
    let center = Point3::new(0.0, 0.0, 20.0);
    c.bench_function("sample_filtered_straight_tube", |b| {
        b.iter(|| black_box(sample_filtered(&volume, black_box(&center), &config, 8.0)))
    });
}

fn bench_step(c: &mut Criterion) {
    let Ok(mut volume) = TubePhantom::straight().render() else {
        return;
    };
    let config = TrackingConfig::default();
    let Ok(seed) = Cylinder::new(Point3::new(0.0, 0.0, 20.0), 2.0, Vector3::z(), Some(0.0)) else {
        return;
    };
    c.bench_function("next_cylinder_straight_tube", |b| {
        let mut rng = StdRng::seed_from_u64(3);
        b.iter(|| black_box(next_cylinder(&mut volume, &seed, &config, &mut rng)))
    });
}

criterion_group!(hotpaths, bench_sphere, bench_ransac, bench_rays, bench_step);
criterion_main!(hotpaths);

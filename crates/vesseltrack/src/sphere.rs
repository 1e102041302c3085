//! Quasi-uniform unit direction sets from icosahedral subdivision.

use std::collections::HashMap;

use nalgebra::{Unit, Vector3};

/// Subdivision level whose icosphere has at least `n` vertices.
///
/// Level `L` has `10 * 4^L + 2` vertices; level 0 is the bare icosahedron.
pub fn subdivision_level(n: usize) -> usize {
    if n <= 12 {
        return 0;
    }
    (((n - 2) as f64 / 10.0).log2() / 2.0).ceil().max(0.0) as usize
}

/// Vertices and triangular faces of an icosphere after `subdivisions` levels.
pub fn icosphere(subdivisions: usize) -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;

    #[rustfmt::skip]
    let mut vertices: Vec<Vector3<f64>> = [
        [-1.0,  phi, 0.0], [ 1.0,  phi, 0.0], [-1.0, -phi, 0.0], [ 1.0, -phi, 0.0],
        [ 0.0, -1.0,  phi], [ 0.0,  1.0,  phi], [ 0.0, -1.0, -phi], [ 0.0,  1.0, -phi],
        [ phi, 0.0, -1.0], [ phi, 0.0,  1.0], [-phi, 0.0, -1.0], [-phi, 0.0,  1.0],
    ]
    .iter()
    .map(|v| Vector3::new(v[0], v[1], v[2]).normalize())
    .collect();

    #[rustfmt::skip]
    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        faces = subdivide(&mut vertices, &faces);
    }
    (vertices, faces)
}

/// Split every face into four, pushing the normalized edge midpoints.
fn subdivide(vertices: &mut Vec<Vector3<f64>>, faces: &[[usize; 3]]) -> Vec<[usize; 3]> {
    let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
    let mut midpoint = |a: usize, b: usize, verts: &mut Vec<Vector3<f64>>| -> usize {
        let key = if a < b { (a, b) } else { (b, a) };
        *midpoints.entry(key).or_insert_with(|| {
            verts.push(((verts[a] + verts[b]) * 0.5).normalize());
            verts.len() - 1
        })
    };

    let mut out = Vec::with_capacity(faces.len() * 4);
    for &[v0, v1, v2] in faces {
        let m01 = midpoint(v0, v1, vertices);
        let m12 = midpoint(v1, v2, vertices);
        let m20 = midpoint(v2, v0, vertices);
        out.push([v0, m01, m20]);
        out.push([v1, m12, m01]);
        out.push([v2, m20, m12]);
        out.push([m01, m12, m20]);
    }
    out
}

/// At least `n` (and at least 12) directions covering the full sphere.
pub fn sample_full_sphere(n: usize) -> Vec<Unit<Vector3<f64>>> {
    let (vertices, _) = icosphere(subdivision_level(n));
    vertices.into_iter().map(Unit::new_unchecked).collect()
}

/// One direction out of each antipodal pair of `sample_full_sphere(2 n)`.
///
/// The result covers orientations rather than directions; it is used for
/// candidate cylinder axes where `d` and `-d` are equivalent.
pub fn sample_half_sphere(n: usize) -> Vec<Unit<Vector3<f64>>> {
    let full = sample_full_sphere(n.saturating_mul(2));
    let mut keep = Vec::with_capacity(full.len() / 2);
    for (i, vi) in full.iter().enumerate() {
        let has_later_antipode = full[i + 1..]
            .iter()
            .any(|vj| (vi.dot(&**vj) + 1.0).abs() < 1e-9);
        if has_later_antipode {
            keep.push(*vi);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn level_matches_vertex_counts() {
        assert_eq!(subdivision_level(0), 0);
        assert_eq!(subdivision_level(12), 0);
        assert_eq!(subdivision_level(13), 1);
        assert_eq!(subdivision_level(42), 1);
        assert_eq!(subdivision_level(162), 2);
        assert_eq!(subdivision_level(163), 3);
    }

    #[test]
    fn full_sphere_counts_and_norms() {
        assert_eq!(sample_full_sphere(1).len(), 12);
        assert_eq!(sample_full_sphere(40).len(), 42);
        let dirs = sample_full_sphere(162);
        assert_eq!(dirs.len(), 162);
        for d in &dirs {
            assert_relative_eq!(d.norm(), 1.0, epsilon = 1e-12);
        }
        let (_, faces) = icosphere(2);
        assert_eq!(faces.len(), 320);
    }

    #[test]
    fn half_sphere_keeps_one_of_each_antipodal_pair() {
        let half = sample_half_sphere(81);
        assert_eq!(half.len(), 81);
        for (i, a) in half.iter().enumerate() {
            for b in &half[i + 1..] {
                assert!((a.dot(&**b) + 1.0).abs() > 1e-6);
            }
        }
        assert_eq!(sample_half_sphere(1).len(), 6);
    }

    #[test]
    fn full_sphere_is_balanced() {
        let sum = sample_full_sphere(642)
            .iter()
            .fold(Vector3::zeros(), |acc, d| acc + d.into_inner());
        assert!(sum.norm() < 1e-9);
    }
}

use super::{add, cross, dot, norm_squared};
use crate::types::Lattice;
use std::f64::consts::PI;

/// Signed triple product of the lattice rows.
#[inline]
pub fn determinant(lattice: &Lattice) -> f64 {
    dot(lattice[0], cross(lattice[1], lattice[2]))
}

/// Unit cell volume.
#[inline]
pub fn volume(lattice: &Lattice) -> f64 {
    determinant(lattice).abs()
}

/// Reciprocal lattice vectors (rows) satisfying `a_i · b_j = 2π δ_ij`.
pub fn reciprocal(lattice: &Lattice) -> Lattice {
    let scale = 2.0 * PI / determinant(lattice);
    let [a1, a2, a3] = *lattice;
    let b1 = cross(a2, a3);
    let b2 = cross(a3, a1);
    let b3 = cross(a1, a2);
    [
        b1.map(|x| x * scale),
        b2.map(|x| x * scale),
        b3.map(|x| x * scale),
    ]
}

/// Enumerates `n1·a1 + n2·a2 + n3·a3` with `|n_i| ≤ rep` along periodic directions.
///
/// Non-periodic directions contribute only `n_i = 0`. The origin is kept when `include_origin`
/// is set; its position in the returned list is not specified.
pub fn lattice_points(
    lattice: &Lattice,
    periodic: [bool; 3],
    rep: usize,
    include_origin: bool,
) -> Vec<[f64; 3]> {
    let reps = periodic.map(|p| if p { rep } else { 0 });
    points_with_repetitions(lattice, reps, include_origin)
}

/// Enumerates every lattice translation that can place an image within `cutoff` of a point in
/// the reference cell, origin included.
///
/// The repetition along each direction is derived from the spacing of the lattice planes
/// spanned by the other two vectors.
pub fn translations_within(lattice: &Lattice, periodic: [bool; 3], cutoff: f64) -> Vec<[f64; 3]> {
    let recip = reciprocal(lattice);
    let mut reps = [0usize; 3];
    for dir in 0..3 {
        if periodic[dir] {
            let plane_spacing = 2.0 * PI / norm_squared(recip[dir]).sqrt();
            reps[dir] = (cutoff / plane_spacing).ceil() as usize;
        }
    }
    points_with_repetitions(lattice, reps, true)
}

fn points_with_repetitions(lattice: &Lattice, reps: [usize; 3], include_origin: bool) -> Vec<[f64; 3]> {
    let range = |r: usize| -(r as i64)..=(r as i64);
    let capacity = reps.iter().map(|&r| 2 * r + 1).product();
    let mut points = Vec::with_capacity(capacity);

    for n1 in range(reps[0]) {
        for n2 in range(reps[1]) {
            for n3 in range(reps[2]) {
                if !include_origin && n1 == 0 && n2 == 0 && n3 == 0 {
                    continue;
                }
                let t = add(
                    add(
                        lattice[0].map(|x| x * n1 as f64),
                        lattice[1].map(|x| x * n2 as f64),
                    ),
                    lattice[2].map(|x| x * n3 as f64),
                );
                points.push(t);
            }
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triclinic() -> Lattice {
        [[6.0, 0.0, 0.0], [1.5, 5.5, 0.0], [0.7, -0.4, 7.2]]
    }

    #[test]
    fn volume_of_cubic_cell() {
        let cubic = [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]];
        assert_relative_eq!(volume(&cubic), 64.0, epsilon = 1e-12);
    }

    #[test]
    fn volume_ignores_handedness() {
        let mut left = triclinic();
        left.swap(0, 1);
        assert_relative_eq!(volume(&left), volume(&triclinic()), epsilon = 1e-10);
        assert!(determinant(&left) < 0.0);
    }

    #[test]
    fn reciprocal_is_dual_to_direct() {
        let lattice = triclinic();
        let recip = reciprocal(&lattice);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 2.0 * PI } else { 0.0 };
                assert_relative_eq!(dot(lattice[i], recip[j]), expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn lattice_points_count_and_origin() {
        let lattice = triclinic();
        let with_origin = lattice_points(&lattice, [true; 3], 2, true);
        let without_origin = lattice_points(&lattice, [true; 3], 2, false);
        assert_eq!(with_origin.len(), 125);
        assert_eq!(without_origin.len(), 124);
        assert!(with_origin.iter().any(|t| norm_squared(*t) == 0.0));
        assert!(without_origin.iter().all(|t| norm_squared(*t) > 0.0));
    }

    #[test]
    fn lattice_points_respect_periodicity() {
        let lattice = triclinic();
        let slab = lattice_points(&lattice, [true, true, false], 2, true);
        assert_eq!(slab.len(), 25);
        assert!(slab.iter().all(|t| t[2] == 0.0));
    }

    #[test]
    fn translations_within_cover_the_cutoff_sphere() {
        let cubic = [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]];
        let cutoff = 12.0;
        let translations = translations_within(&cubic, [true; 3], cutoff);
        assert_eq!(translations.len(), 7 * 7 * 7);

        let dense = lattice_points(&cubic, [true; 3], 6, true);
        let inside = dense
            .iter()
            .filter(|t| norm_squared(**t) <= cutoff * cutoff)
            .count();
        let covered = translations
            .iter()
            .filter(|t| norm_squared(**t) <= cutoff * cutoff)
            .count();
        assert_eq!(inside, covered);
    }
}

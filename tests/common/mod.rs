#![allow(dead_code)]

use eeq::{EeqModel, Lattice, Parameters, Request, Structure};

pub const PARAMS_TOML: &str = r#"
[elements]
H  = { rad = 0.78, chi = 0.354, eta = 0.471, kcn = 0.028, rcov = 0.60 }
C  = { rad = 1.34, chi = 0.531, eta = 0.272, kcn = 0.039, rcov = 1.43 }
N  = { rad = 1.17, chi = 0.675, eta = 0.419, kcn = 0.054, rcov = 1.35 }
O  = { rad = 1.05, chi = 0.801, eta = 0.457, kcn = 0.084, rcov = 1.25 }
Na = { rad = 2.50, chi = 0.181, eta = 0.102, kcn = -0.021, rcov = 2.60 }
Cl = { rad = 1.70, chi = 0.662, eta = 0.205, kcn = 0.019, rcov = 1.89 }
"#;

pub fn parameters() -> Parameters {
    Parameters::load_from_str(PARAMS_TOML).expect("test parameters must parse")
}

pub struct Case<'a> {
    pub name: &'a str,
    pub structure: Structure,
}

pub fn water() -> Structure {
    Structure::molecule(
        vec![8, 1, 1],
        vec![
            [0.000, 0.000, 0.221],
            [0.000, 1.431, -0.886],
            [0.000, -1.431, -0.886],
        ],
        0.0,
    )
}

pub fn formamide() -> Structure {
    Structure::molecule(
        vec![6, 8, 7, 1, 1, 1],
        vec![
            [0.000, 0.790, 0.000],
            [2.240, 0.760, 0.050],
            [-1.330, -1.330, 0.020],
            [-1.040, 2.580, -0.030],
            [-3.200, -1.240, 0.110],
            [-0.430, -2.990, -0.080],
        ],
        0.0,
    )
}

pub fn hydroxide() -> Structure {
    Structure::molecule(vec![8, 1], vec![[0.0, 0.0, 0.0], [1.83, 0.0, 0.0]], -1.0)
}

pub fn isolated_cases() -> Vec<Case<'static>> {
    vec![
        Case {
            name: "water",
            structure: water(),
        },
        Case {
            name: "formamide",
            structure: formamide(),
        },
        Case {
            name: "hydroxide",
            structure: hydroxide(),
        },
    ]
}

/// Rock-salt NaCl in its primitive face-centered cell, slightly distorted so that no pair sits on
/// a Wigner–Seitz boundary.
pub fn rocksalt() -> Structure {
    let a = 10.6;
    let lattice: Lattice = [
        [0.0, 0.5 * a, 0.5 * a],
        [0.5 * a, 0.0, 0.5 * a],
        [0.5 * a, 0.5 * a, 0.0],
    ];
    Structure::periodic(
        vec![11, 17],
        vec![[0.05, -0.03, 0.02], [0.5 * a - 0.08, 0.04, 0.01]],
        lattice,
        0.0,
    )
}

/// A water molecule in an oblique box.
pub fn hydrated_cell() -> Structure {
    Structure::periodic(
        vec![8, 1, 1, 7, 1],
        vec![
            [0.30, 0.20, 0.10],
            [0.40, 1.95, -0.60],
            [1.90, -0.50, 0.20],
            [4.10, 3.70, 2.90],
            [5.60, 4.20, 3.70],
        ],
        [[8.9, 0.0, 0.0], [0.6, 8.4, 0.0], [-0.4, 0.3, 9.2]],
        0.0,
    )
}

/// Applies `R → (1 + ε e_a e_bᵀ) R` to positions and lattice vectors.
pub fn strained(structure: &Structure, a: usize, b: usize, eps: f64) -> Structure {
    let deform = |v: [f64; 3]| {
        let mut out = v;
        out[a] += eps * v[b];
        out
    };
    let mut s = structure.clone();
    s.positions = s.positions.iter().map(|&p| deform(p)).collect();
    s.lattice = s.lattice.map(|l| [deform(l[0]), deform(l[1]), deform(l[2])]);
    s
}

pub fn displaced(structure: &Structure, atom: usize, direction: usize, step: f64) -> Structure {
    let mut s = structure.clone();
    s.positions[atom][direction] += step;
    s
}

pub fn energy(model: &EeqModel, structure: &Structure) -> f64 {
    model
        .evaluate(structure, &Request::energy())
        .expect("energy evaluation failed")
        .energy()
        .expect("energy requested")
}

pub fn charges(model: &EeqModel, structure: &Structure) -> Vec<f64> {
    model
        .charges(structure)
        .expect("charge evaluation failed")
        .charges
}

/// Central finite-difference gradient of the total energy.
pub fn numerical_gradient(model: &EeqModel, structure: &Structure, step: f64) -> Vec<[f64; 3]> {
    (0..structure.len())
        .map(|k| {
            let mut g = [0.0; 3];
            for (c, gc) in g.iter_mut().enumerate() {
                let plus = energy(model, &displaced(structure, k, c, step));
                let minus = energy(model, &displaced(structure, k, c, -step));
                *gc = (plus - minus) / (2.0 * step);
            }
            g
        })
        .collect()
}

/// Central finite-difference strain derivative of the total energy.
pub fn numerical_sigma(model: &EeqModel, structure: &Structure, step: f64) -> [[f64; 3]; 3] {
    let mut sigma = [[0.0; 3]; 3];
    for (a, row) in sigma.iter_mut().enumerate() {
        for (b, value) in row.iter_mut().enumerate() {
            let plus = energy(model, &strained(structure, a, b, step));
            let minus = energy(model, &strained(structure, a, b, -step));
            *value = (plus - minus) / (2.0 * step);
        }
    }
    sigma
}

pub fn print_comparison(label: &str, analytic: f64, numerical: f64) {
    println!(
        "{:<28} | {:>14.8e} | {:>14.8e} | {:>10.2e}",
        label,
        analytic,
        numerical,
        (analytic - numerical).abs()
    );
}

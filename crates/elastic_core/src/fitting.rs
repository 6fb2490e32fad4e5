//! Fitting elastic tensors to stress-strain samples.

use crate::error::{Error, Result};
use crate::finite_diff::diff_coefficients;
use crate::pseudo::{generate_pseudo, pinv};
use crate::strain::{Strain, Stress};
use crate::strain_states::{classify, ClassifySettings, StrainState};
use crate::tensor::{Tensor, VoigtScale};
use log::{debug, warn};
use nalgebra::{DMatrix, Matrix6};

/// Default tolerance below which strain/stress entries count as zero.
pub const DEFAULT_FIT_TOL: f64 = 1e-10;

/// Fits the elastic tensors of orders `2..=order` by finite differences.
///
/// Each strain state gives a stencil along its ray. Stress derivatives of
/// every degree `1..order` are stacked over states and mapped to independent
/// constants through the pseudo-inverses of [`generate_pseudo`]. Returns one
/// tensor per order, ranks `4, 6, .., 2 * order`.
pub fn diff_fit(
    strains: &[Strain],
    stresses: &[Stress],
    eq_stress: Option<&Stress>,
    order: usize,
    tol: f64,
) -> Result<Vec<Tensor>> {
    if order < 2 {
        return Err(Error::InvalidInput(format!(
            "fit order must be at least 2, got {order}"
        )));
    }
    let settings = ClassifySettings {
        tol,
        ..ClassifySettings::default()
    };
    let states = classify(strains, stresses, eq_stress, settings)?;
    if states.is_empty() {
        return Err(Error::MissingStrainStates(
            "no nonzero strain samples".to_string(),
        ));
    }

    let derivatives = stacked_derivatives(&states, order)?;
    let rays: Vec<[f64; 6]> = states.iter().map(|s| s.ray).collect();
    let pseudo = generate_pseudo(&rays, order)?;

    let mut tensors = Vec::with_capacity(order - 1);
    for (p, dvec) in pseudo.iter().zip(&derivatives) {
        if !p.absent.is_empty() {
            debug!(
                "order {}: {} constants not constrained by the strain states, set to zero",
                p.degree,
                p.absent.len()
            );
        }
        let values = p.solve(dvec)?;
        let voigt = p.table.substitute_ordered(&values)?;
        tensors.push(Tensor::from_voigt(p.degree, &voigt, VoigtScale::Unit)?);
    }
    Ok(tensors)
}

/// Finite-difference derivatives of degree `1..order` for every state,
/// stacked as `state * 6 + component`.
fn stacked_derivatives(states: &[StrainState], order: usize) -> Result<Vec<Vec<f64>>> {
    let mut out = vec![vec![0.0; 6 * states.len()]; order - 1];
    for (n, state) in states.iter().enumerate() {
        let stencil = state.stencil()?;
        for degree in 1..order {
            let coef = diff_coefficients(&stencil, degree)?;
            let target = &mut out[degree - 1][6 * n..6 * n + 6];
            for (w, stress) in coef.iter().zip(&state.stresses) {
                for (t, s) in target.iter_mut().zip(stress) {
                    *t += w * s;
                }
            }
        }
    }
    Ok(out)
}

/// Second-order fit from the six single-component strain states.
///
/// Entry `(i, j)` is the least-squares slope of stress component `j` against
/// strain component `i` within state `i`. With `vasp` the stresses are taken
/// as VASP output (kBar, opposite sign) and the result is scaled by -0.1.
pub fn fit_independent_strains(
    strains: &[Strain],
    stresses: &[Stress],
    eq_stress: Option<&Stress>,
    vasp: bool,
    tol: f64,
) -> Result<Tensor> {
    let states = classify(strains, stresses, eq_stress, ClassifySettings::default())?;
    let unit_rays: Vec<[f64; 6]> = (0..6)
        .map(|i| {
            let mut ray = [0.0; 6];
            ray[i] = 1.0;
            ray
        })
        .collect();

    let missing: Vec<String> = unit_rays
        .iter()
        .filter(|ray| !states.iter().any(|s| &s.ray == *ray))
        .map(|ray| format!("{ray:?}"))
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingStrainStates(missing.join(", ")));
    }
    if states.iter().any(|s| !unit_rays.contains(&s.ray)) {
        warn!("extra strain states in strain-stress pairs are neglected in independent strain fitting");
    }

    let mut c = Matrix6::zeros();
    for (i, ray) in unit_rays.iter().enumerate() {
        let state = states
            .iter()
            .find(|s| &s.ray == ray)
            .ok_or_else(|| Error::MissingStrainStates(format!("{ray:?}")))?;
        let x: Vec<f64> = state.strains.iter().map(|s| s[i]).collect();
        for j in 0..6 {
            let y: Vec<f64> = state.stresses.iter().map(|s| s[j]).collect();
            c[(i, j)] = linear_slope(&x, &y)?;
        }
    }
    if vasp {
        c *= -0.1;
    }
    Ok(Tensor::from_voigt_matrix(&c, VoigtScale::Unit).zeroed(tol))
}

/// Least-squares second-order fit over all samples at once.
pub fn fit_pseudoinverse(strains: &[Strain], stresses: &[Stress]) -> Result<Tensor> {
    if strains.len() != stresses.len() {
        return Err(Error::Shape(format!(
            "{} strains paired with {} stresses",
            strains.len(),
            stresses.len()
        )));
    }
    if strains.is_empty() {
        return Err(Error::InvalidInput("no stress-strain samples".to_string()));
    }
    warn!(
        "pseudo-inverse fitting of strain-stress pairs should be used with caution; \
         check the resulting tensor against other fitting methods"
    );
    let n = strains.len();
    let e = DMatrix::from_fn(n, 6, |r, c| strains[r].voigt()[c]);
    let s = DMatrix::from_fn(n, 6, |r, c| stresses[r].voigt()[c]);
    let c = (pinv(e)? * s).transpose();
    Ok(Tensor::from_voigt_matrix(
        &Matrix6::from_fn(|i, j| c[(i, j)]),
        VoigtScale::Unit,
    ))
}

fn linear_slope(x: &[f64], y: &[f64]) -> Result<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
    if x.len() < 2 || sxx == 0.0 {
        return Err(Error::StencilRankDeficient(
            "linear fit needs at least two distinct strain values".to_string(),
        ));
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    Ok(sxy / sxx)
}

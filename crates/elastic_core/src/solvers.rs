//! Scalar root finding and numerical quadrature.

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RootSettings {
    pub max_steps: usize,
    pub damping: f64,
    /// Relative step size at which the iteration is considered converged.
    pub tolerance: f64,
    /// Relative half-width of the central difference used for the slope.
    pub step: f64,
}

impl Default for RootSettings {
    fn default() -> Self {
        Self {
            max_steps: 100,
            damping: 1.0,
            tolerance: 1e-10,
            step: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootResult {
    pub root: f64,
    pub residual: f64,
    pub iterations: usize,
}

/// Damped Newton iteration with a central-difference slope.
pub fn find_root(f: impl Fn(f64) -> f64, x0: f64, settings: RootSettings) -> Result<RootResult> {
    if settings.max_steps == 0 {
        return Err(Error::InvalidInput("max_steps must be greater than zero".to_string()));
    }
    if settings.damping <= 0.0 {
        return Err(Error::InvalidInput("damping must be positive".to_string()));
    }
    if settings.tolerance <= 0.0 || settings.step <= 0.0 {
        return Err(Error::InvalidInput(
            "tolerance and step must be positive".to_string(),
        ));
    }
    if !x0.is_finite() {
        return Err(Error::InvalidInput(format!("initial guess {x0} is not finite")));
    }

    let mut x = x0;
    let mut fx = f(x);
    for iterations in 0..settings.max_steps {
        if !fx.is_finite() {
            return Err(Error::Solver(format!("function is not finite at x = {x}")));
        }
        if fx == 0.0 {
            return Ok(RootResult {
                root: x,
                residual: 0.0,
                iterations,
            });
        }
        let h = settings.step * x.abs().max(1.0);
        let slope = (f(x + h) - f(x - h)) / (2.0 * h);
        if slope == 0.0 || !slope.is_finite() {
            return Err(Error::Solver(format!("zero or non-finite slope at x = {x}")));
        }
        let delta = settings.damping * fx / slope;
        x -= delta;
        fx = f(x);
        if delta.abs() <= settings.tolerance * (1.0 + x.abs()) {
            debug!("root {x} found after {} Newton steps", iterations + 1);
            return Ok(RootResult {
                root: x,
                residual: fx,
                iterations: iterations + 1,
            });
        }
    }
    Err(Error::Solver(format!(
        "Newton iteration from {x0} failed to converge in {} steps (last x = {x}, f(x) = {fx})",
        settings.max_steps
    )))
}

/// [`find_root`] for a fallible function. The first error `f` raises is
/// returned in place of the iteration's own outcome.
pub fn try_find_root(
    f: impl Fn(f64) -> Result<f64>,
    x0: f64,
    settings: RootSettings,
) -> Result<RootResult> {
    let first_error: Cell<Option<Error>> = Cell::new(None);
    let result = find_root(
        |x| match f(x) {
            Ok(value) => value,
            Err(e) => {
                let earlier = first_error.take();
                first_error.set(Some(earlier.unwrap_or(e)));
                f64::NAN
            }
        },
        x0,
        settings,
    );
    match first_error.into_inner() {
        Some(e) => Err(e),
        None => result,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuadratureSettings {
    pub abs_tol: f64,
    pub rel_tol: f64,
    /// Maximum bisection depth of the adaptive scheme.
    pub max_depth: usize,
}

impl Default for QuadratureSettings {
    fn default() -> Self {
        Self {
            abs_tol: 1e-12,
            rel_tol: 1e-10,
            max_depth: 30,
        }
    }
}

// Kronrod nodes on [0, 1]; odd indices are the 7-point Gauss nodes.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];
const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_2,
    0.140_653_259_715_525_9,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_8,
];
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

/// Kronrod-15 estimate and its difference from Gauss-7.
fn gauss_kronrod(f: &impl Fn(f64) -> f64, a: f64, b: f64) -> (f64, f64) {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let fc = f(center);
    let mut kronrod = WGK[7] * fc;
    let mut gauss = WG[3] * fc;
    for k in 0..7 {
        let dx = half * XGK[k];
        let pair = f(center - dx) + f(center + dx);
        kronrod += WGK[k] * pair;
        if k % 2 == 1 {
            gauss += WG[k / 2] * pair;
        }
    }
    (kronrod * half, ((kronrod - gauss) * half).abs())
}

/// Adaptive Gauss-Kronrod (7/15) integral of `f` over `[a, b]`.
///
/// Integrand endpoints are never evaluated.
pub fn integrate(f: impl Fn(f64) -> f64, a: f64, b: f64, settings: QuadratureSettings) -> Result<f64> {
    if !(a.is_finite() && b.is_finite()) {
        return Err(Error::InvalidInput("integration bounds must be finite".to_string()));
    }
    if a == b {
        return Ok(0.0);
    }
    let (whole, _) = gauss_kronrod(&f, a, b);
    let target = settings.abs_tol.max(settings.rel_tol * whole.abs());
    let value = adapt(&f, a, b, target, settings.max_depth)?;
    if !value.is_finite() {
        return Err(Error::Solver("integral is not finite".to_string()));
    }
    Ok(value)
}

fn adapt(f: &impl Fn(f64) -> f64, a: f64, b: f64, tol: f64, depth: usize) -> Result<f64> {
    let (value, error) = gauss_kronrod(f, a, b);
    if error <= tol {
        return Ok(value);
    }
    if depth == 0 {
        return Err(Error::Solver(format!(
            "quadrature on [{a}, {b}] did not reach tolerance {tol:e} (error {error:e})"
        )));
    }
    let mid = 0.5 * (a + b);
    Ok(adapt(f, a, mid, 0.5 * tol, depth - 1)? + adapt(f, mid, b, 0.5 * tol, depth - 1)?)
}

/// Gauss-Legendre nodes and weights on `[-1, 1]`.
pub fn gauss_legendre(n: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if n == 0 {
        return Err(Error::InvalidInput("Gauss-Legendre order must be positive".to_string()));
    }
    Ok(legendre_rule(n))
}

fn legendre_rule(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for i in 0..(n + 1) / 2 {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, d) = legendre(n, x);
            let dx = p / d;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, d) = legendre(n, x);
        let w = 2.0 / ((1.0 - x * x) * d * d);
        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}

/// `P_n(x)` and its derivative.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let p2 = ((2 * k - 1) as f64 * x * p1 - (k - 1) as f64 * p0) / k as f64;
        p0 = p1;
        p1 = p2;
    }
    (p1, n as f64 * (x * p1 - p0) / (x * x - 1.0))
}

/// Quadrature rule on the unit sphere; weights sum to one, so a weighted
/// sum is the mean over directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereQuadrature {
    pub points: Vec<[f64; 3]>,
    pub weights: Vec<f64>,
}

impl SphereQuadrature {
    /// Gauss-Legendre in `cos(theta)` times a uniform azimuthal grid. Exact
    /// for spherical polynomials of degree below `min(2 * n_theta, n_phi)`.
    pub fn product(n_theta: usize, n_phi: usize) -> Result<Self> {
        if n_theta == 0 || n_phi == 0 {
            return Err(Error::InvalidInput(
                "sphere quadrature point counts must be positive".to_string(),
            ));
        }
        Ok(Self::product_rule(n_theta, n_phi))
    }

    fn product_rule(n_theta: usize, n_phi: usize) -> Self {
        let (nodes, gl_weights) = legendre_rule(n_theta);
        let mut points = Vec::with_capacity(n_theta * n_phi);
        let mut weights = Vec::with_capacity(n_theta * n_phi);
        for (&z, &w) in nodes.iter().zip(&gl_weights) {
            let r = (1.0 - z * z).max(0.0).sqrt();
            for k in 0..n_phi {
                let phi = 2.0 * PI * k as f64 / n_phi as f64;
                points.push([r * phi.cos(), r * phi.sin(), z]);
                weights.push(0.5 * w / n_phi as f64);
            }
        }
        Self { points, weights }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for SphereQuadrature {
    fn default() -> Self {
        Self::product_rule(8, 16)
    }
}

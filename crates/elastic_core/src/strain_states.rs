//! Grouping of stress-strain samples into strain states.
//!
//! A strain state is a fixed direction in Voigt strain space. Samples that
//! perturb the same set of Voigt components belong to the same state and
//! differ only in magnitude along its ray, so each state forms a 1-D stencil
//! for finite differences.

use crate::error::{Error, Result};
use crate::strain::{Strain, Stress};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Absolute tolerance for agreement between equilibrium stress candidates.
const EQ_STRESS_ATOL: f64 = 1e-8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifySettings {
    /// Strain/stress entries below this magnitude are treated as zero.
    pub tol: f64,
    /// Append the equilibrium (zero strain) sample to every state.
    pub add_eq: bool,
    /// Sort samples along the perturbation axis.
    pub sort: bool,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            tol: 1e-10,
            add_eq: true,
            sort: true,
        }
    }
}

/// Samples sharing one perturbation direction.
#[derive(Debug, Clone, PartialEq)]
pub struct StrainState {
    /// Voigt strain divided by its smallest-magnitude nonzero component.
    pub ray: [f64; 6],
    /// Perturbed Voigt components, ascending.
    pub indices: Vec<usize>,
    /// Voigt strains of the group.
    pub strains: Vec<[f64; 6]>,
    /// Voigt stresses, paired with `strains` by position.
    pub stresses: Vec<[f64; 6]>,
}

impl StrainState {
    /// First Voigt component at which the ray equals one: the component
    /// whose strain value is the stencil parameter.
    pub fn principal_index(&self) -> Option<usize> {
        self.ray.iter().position(|&r| r == 1.0)
    }

    /// Strain values along the principal component.
    pub fn stencil(&self) -> Result<Vec<f64>> {
        let idx = self.principal_index().ok_or_else(|| {
            Error::InvalidInput(format!("strain state {:?} has no unit component", self.ray))
        })?;
        Ok(self.strains.iter().map(|s| s[idx]).collect())
    }

    pub fn len(&self) -> usize {
        self.strains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strains.is_empty()
    }
}

/// Where an equilibrium stress came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquilibriumSource {
    Supplied,
    Found,
    /// No zero-strain sample; zero stress was used.
    DefaultZero,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumStress {
    pub stress: Stress,
    pub source: EquilibriumSource,
}

/// Finds the stress of the zero-strain samples.
///
/// Every sample whose strain components are all below `tol` is a candidate.
/// Candidates must agree to within 1e-8; with no candidate a zero stress is
/// returned and a warning is logged.
pub fn find_eq_stress(strains: &[Strain], stresses: &[Stress], tol: f64) -> Result<EquilibriumStress> {
    check_pairing(strains, stresses)?;
    let candidates: Vec<&Stress> = strains
        .iter()
        .zip(stresses)
        .filter(|(strain, _)| strain.is_zero(tol))
        .map(|(_, stress)| stress)
        .collect();

    match candidates.first() {
        Some(first) => {
            if candidates.iter().any(|s| !s.approx_eq(first, EQ_STRESS_ATOL)) {
                return Err(Error::AmbiguousEquilibriumStress);
            }
            Ok(EquilibriumStress {
                stress: **first,
                source: EquilibriumSource::Found,
            })
        }
        None => {
            warn!("no equilibrium state found, using zero stress");
            Ok(EquilibriumStress {
                stress: Stress::zero(),
                source: EquilibriumSource::DefaultZero,
            })
        }
    }
}

/// Uses the supplied equilibrium stress, or falls back to [`find_eq_stress`].
pub fn resolve_eq_stress(
    eq_stress: Option<&Stress>,
    strains: &[Strain],
    stresses: &[Stress],
    tol: f64,
) -> Result<EquilibriumStress> {
    match eq_stress {
        Some(stress) => Ok(EquilibriumStress {
            stress: *stress,
            source: EquilibriumSource::Supplied,
        }),
        None => find_eq_stress(strains, stresses, tol),
    }
}

/// Groups samples into strain states.
///
/// States are returned in lexicographic order of their perturbed index sets.
/// Zero-strain samples only contribute the equilibrium stress.
pub fn classify(
    strains: &[Strain],
    stresses: &[Stress],
    eq_stress: Option<&Stress>,
    settings: ClassifySettings,
) -> Result<Vec<StrainState>> {
    check_pairing(strains, stresses)?;
    let tol = settings.tol;
    let vstrains: Vec<[f64; 6]> = strains.iter().map(|s| s.zeroed(tol).voigt()).collect();
    let vstresses: Vec<[f64; 6]> = stresses.iter().map(|s| s.zeroed(tol).voigt()).collect();

    let independent: BTreeSet<Vec<usize>> = vstrains
        .iter()
        .map(nonzero_indices)
        .filter(|ind| !ind.is_empty())
        .collect();

    let veq_stress = if settings.add_eq {
        Some(resolve_eq_stress(eq_stress, strains, stresses, tol)?.stress.voigt())
    } else {
        None
    };

    let mut states = Vec::with_capacity(independent.len());
    for ind in independent {
        let mut group: Vec<([f64; 6], [f64; 6])> = vstrains
            .iter()
            .zip(&vstresses)
            .filter(|(strain, _)| nonzero_indices(strain) == ind)
            .map(|(strain, stress)| (*strain, *stress))
            .collect();

        let ray = match group.last() {
            Some((last, _)) => strain_ray(last, &ind),
            None => continue,
        };

        if let Some(eq) = veq_stress {
            group.push(([0.0; 6], eq));
        }
        if settings.sort {
            let axis = ind[0];
            group.sort_by(|a, b| a.0[axis].total_cmp(&b.0[axis]));
        }

        let (strains, stresses): (Vec<_>, Vec<_>) = group.into_iter().unzip();
        states.push(StrainState {
            ray,
            indices: ind,
            strains,
            stresses,
        });
    }
    debug!("classified {} samples into {} strain states", strains.len(), states.len());
    Ok(states)
}

/// State whose ray equals `ray` exactly.
pub fn lookup<'a>(states: &'a [StrainState], ray: &[f64; 6]) -> Result<&'a StrainState> {
    states
        .iter()
        .find(|s| &s.ray == ray)
        .ok_or_else(|| Error::MissingStrainStates(format!("{ray:?}")))
}

fn nonzero_indices(v: &[f64; 6]) -> Vec<usize> {
    (0..6).filter(|&i| v[i] != 0.0).collect()
}

fn strain_ray(strain: &[f64; 6], ind: &[usize]) -> [f64; 6] {
    let mut min_val = strain[ind[0]];
    for &i in &ind[1..] {
        if strain[i].abs() < min_val.abs() {
            min_val = strain[i];
        }
    }
    strain.map(|v| if v == 0.0 { 0.0 } else { v / min_val })
}

fn check_pairing(strains: &[Strain], stresses: &[Stress]) -> Result<()> {
    if strains.len() != stresses.len() {
        return Err(Error::Shape(format!(
            "{} strains paired with {} stresses",
            strains.len(),
            stresses.len()
        )));
    }
    Ok(())
}

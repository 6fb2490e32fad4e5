//! The `elastic_core` crate fits elastic tensor expansions to stress-strain
//! samples and evaluates the physical properties derived from them.
//!
//! Key components:
//! - **Tensors**: dense rank-n `Tensor`s with Voigt folding, and `einsum` contraction.
//! - **Fitting**: strain-state classification, finite-difference derivatives on
//!   irregular stencils, symmetry-reduced pseudo-inverses (`diff_fit`).
//! - **Properties**: `ElasticTensor` moduli, sound velocities and thermal
//!   conductivities; `ElasticTensorExpansion` Gruneisen tensors, thermal
//!   expansion, compliance expansions and yield stress.
//! - **Solvers**: Newton root finding, Gauss-Kronrod and spherical quadrature.

pub mod einsum;
pub mod elastic;
pub mod error;
pub mod expansion;
pub mod finite_diff;
pub mod fitting;
pub mod pseudo;
pub mod solvers;
pub mod strain;
pub mod strain_states;
pub mod structure;
pub mod symbolic;
pub mod tensor;
pub mod traits;
pub mod units;

pub use elastic::{ComplianceTensor, ElasticTensor, NthOrderElasticTensor, StructureProperty};
pub use error::{Error, Result};
pub use expansion::{ElasticTensorExpansion, HeatCapacityMode};
pub use fitting::diff_fit;
pub use strain::{Strain, Stress};
pub use structure::CrystalStructure;
pub use tensor::Tensor;
pub use traits::Structure;

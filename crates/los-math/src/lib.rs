//! Traffic level-of-service math utilities.
//!
//! Everything here is a pure function of its inputs: no fitted state is kept
//! between calls.

pub mod error;
pub mod math;

pub use error::MathError;
pub use math::interp::{linspace, Pchip};
pub use math::linalg::{eigenpair_nearest, principal_axes, EigenPair, PrincipalAxes};
pub use math::stats::*;
pub use math::weibull::{fit_weibull, WeibullFit};

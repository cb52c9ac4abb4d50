//! Core math modules.

pub mod interp;
pub mod linalg;
pub mod stats;
pub mod weibull;

//! Core types: errors, feature vectors, problems and parameters

pub mod error;
pub mod params;
pub mod types;

pub use self::error::*;
pub use self::params::*;
pub use self::types::*;

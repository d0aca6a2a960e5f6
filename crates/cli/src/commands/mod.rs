//! CLI command implementations

pub mod analysis;
pub mod costs;
pub mod quota;
pub mod recommendations;
pub mod scaling;

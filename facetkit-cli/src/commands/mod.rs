//! CLI command implementations.

pub mod check;
pub mod simulate;

pub use check::check_config;
pub use simulate::simulate;

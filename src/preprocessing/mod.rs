//! Data preprocessing module
//!
//! Feature scaling applied before optimization and at serving time.

mod scaler;

pub use scaler::StandardScaler;

//! Foundation types and math shared by every layer.

pub mod math;
pub mod types;

//! Outer surfaces: CSV command replay and reports.

pub mod csv;
pub mod replay;

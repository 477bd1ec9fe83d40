//! Command implementations.

pub mod check;
pub mod order_file;
pub mod plan;
pub mod report;
pub mod sync;

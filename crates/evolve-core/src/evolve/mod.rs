//! Function bindings that analyze their own source in development mode.

pub mod context;
pub mod mode;
pub mod report;
pub mod resources;
pub mod wrapper;

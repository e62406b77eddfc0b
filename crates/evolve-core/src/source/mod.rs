//! Parsing, caching and rewriting of function source text.

pub mod cache;
pub mod language;
pub mod model;
pub mod transform;

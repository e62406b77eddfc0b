pub mod heuristics;

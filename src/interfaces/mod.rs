//! Boundary adapters for driving the application from the outside.

pub mod csv;

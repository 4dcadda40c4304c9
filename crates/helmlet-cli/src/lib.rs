//! helmlet CLI library
//!
//! The binary is a thin wrapper around [`run`], which integration tests and
//! other packaging can call directly.

mod cli;

pub use cli::run;

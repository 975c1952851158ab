//! Reconciliation end-to-end tests against simulated chains.
#![allow(missing_docs)]

mod cases;
mod environment;

pub use environment::*;

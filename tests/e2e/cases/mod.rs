//! Reconciliation end-to-end test cases

mod concurrency;
mod deployment;
mod failures;

//! # Omniwire
//!
//! Library for reconciling a declarative LayerZero peering graph against live OApp state.
//!
//! The desired topology is a [`GraphModel`](types::GraphModel) of endpoints and directed
//! connections. A [`Reconciler`](reconcile::Reconciler) reads the peers and enforced options of
//! every endpoint through a [`ChainStateReader`](chains::ChainStateReader), computes the minimal
//! set of writes and applies them through a [`WriteAdapter`](chains::WriteAdapter).

pub mod chains;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod serde;
pub mod types;

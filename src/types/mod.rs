//! Omniwire types.

mod endpoint;
pub use endpoint::*;

mod graph;
pub use graph::*;

mod options;
pub use options::*;

mod state;
pub use state::*;

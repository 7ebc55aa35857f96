//! Strategy module
//!
//! Signal producers, the model collaborators they wrap, their registry and the
//! signal combiner.

pub mod base;
pub mod combiner;
pub mod implementations;
pub mod model;
pub mod opinion;
pub mod registry;

pub use base::*;
pub use combiner::*;
pub use implementations::*;
pub use model::*;
pub use opinion::*;
pub use registry::*;

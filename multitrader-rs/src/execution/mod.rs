//! Execution module
//!
//! Broker and ledger collaborators, and the executor that drives them.

pub mod broker;
pub mod executor;
pub mod ledger;

pub use broker::*;
pub use executor::*;
pub use ledger::*;

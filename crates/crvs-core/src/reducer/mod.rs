//! Reducer framework for folding action histories into derived state.
//!
//! A reducer consumes actions in ledger order and maintains a projection.
//! Reducers must be deterministic: given the same sequence of actions they
//! must produce the same state. Nothing in the ledger stores derived state,
//! so replay-from-genesis is the only way state is ever obtained.
//!
//! # Architecture
//!
//! ```text
//! Actions (Ledger) --> Reducer --> Projection State
//! ```
//!
//! # Example
//!
//! ```rust
//! use crvs_core::action::Action;
//! use crvs_core::reducer::{Reducer, ReducerContext, replay};
//!
//! #[derive(Default)]
//! struct ReadCounter {
//!     reads: u64,
//! }
//!
//! impl Reducer for ReadCounter {
//!     type State = u64;
//!     type Error = std::convert::Infallible;
//!
//!     fn name(&self) -> &'static str {
//!         "read-counter"
//!     }
//!
//!     fn apply(&mut self, action: &Action, _ctx: &ReducerContext) -> Result<(), Self::Error> {
//!         if action.kind == crvs_core::ActionKind::Read {
//!             self.reads += 1;
//!         }
//!         Ok(())
//!     }
//!
//!     fn state(&self) -> &u64 {
//!         &self.reads
//!     }
//!
//!     fn state_mut(&mut self) -> &mut u64 {
//!         &mut self.reads
//!     }
//!
//!     fn reset(&mut self) {
//!         self.reads = 0;
//!     }
//! }
//!
//! let mut counter = ReadCounter::default();
//! replay(&mut counter, &[]).unwrap();
//! assert_eq!(*counter.state(), 0);
//! ```

mod traits;

#[cfg(test)]
mod tests;

pub use traits::{Reducer, ReducerContext, replay};

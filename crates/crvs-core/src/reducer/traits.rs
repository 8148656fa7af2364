//! Core reducer trait.

use crate::action::Action;

/// Context handed to a reducer alongside each action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerContext {
    /// 1-based position of the action within its event history.
    pub position: u64,
}

impl ReducerContext {
    /// Creates a context for the action at `position`.
    #[must_use]
    pub const fn new(position: u64) -> Self {
        Self { position }
    }
}

/// Folds actions into a projection.
pub trait Reducer {
    /// Projection maintained by the reducer.
    type State;

    /// Error raised when an action cannot be applied.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stable reducer name, used in logs.
    fn name(&self) -> &'static str;

    /// Applies one action.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is inconsistent with the state built so
    /// far. The state is left as it was before the call.
    fn apply(&mut self, action: &Action, ctx: &ReducerContext) -> Result<(), Self::Error>;

    /// Returns the current projection.
    fn state(&self) -> &Self::State;

    /// Returns the current projection mutably.
    fn state_mut(&mut self) -> &mut Self::State;

    /// Resets to the genesis state.
    fn reset(&mut self);
}

/// Resets `reducer` and replays `actions` from genesis.
///
/// Positions come from the sealed actions when present, otherwise from the
/// slice index.
///
/// # Errors
///
/// Returns the first error raised by [`Reducer::apply`].
pub fn replay<R: Reducer>(reducer: &mut R, actions: &[Action]) -> Result<(), R::Error> {
    reducer.reset();
    for (index, action) in actions.iter().enumerate() {
        let position = action.position.unwrap_or(index as u64 + 1);
        reducer.apply(action, &ReducerContext::new(position))?;
    }
    Ok(())
}

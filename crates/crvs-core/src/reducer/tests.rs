//! Tests for the reducer framework.

use std::fmt;

use crate::action::{Action, ActionKind, ActorId, EventId, TransactionId};
use crate::reducer::{Reducer, ReducerContext, replay};

#[derive(Debug)]
struct Refused(u64);

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "refused at {}", self.0)
    }
}

impl std::error::Error for Refused {}

/// Records the positions it saw and refuses `ARCHIVE`.
#[derive(Debug, Default)]
struct PositionRecorder {
    seen: Vec<u64>,
}

impl Reducer for PositionRecorder {
    type State = Vec<u64>;
    type Error = Refused;

    fn name(&self) -> &'static str {
        "position-recorder"
    }

    fn apply(&mut self, action: &Action, ctx: &ReducerContext) -> Result<(), Self::Error> {
        if action.kind == ActionKind::Archive {
            return Err(Refused(ctx.position));
        }
        self.seen.push(ctx.position);
        Ok(())
    }

    fn state(&self) -> &Self::State {
        &self.seen
    }

    fn state_mut(&mut self) -> &mut Self::State {
        &mut self.seen
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

fn action(kind: ActionKind, n: u32) -> Action {
    Action::with_timestamp(
        EventId::generate(),
        kind,
        ActorId::new("actor").unwrap(),
        TransactionId::new(format!("tx-{n}")).unwrap(),
        u64::from(n),
    )
}

#[test]
fn replay_uses_slice_positions_for_unsealed_actions() {
    let actions = vec![
        action(ActionKind::Create, 1),
        action(ActionKind::Read, 2),
        action(ActionKind::Read, 3),
    ];
    let mut reducer = PositionRecorder::default();
    replay(&mut reducer, &actions).unwrap();
    assert_eq!(reducer.state(), &vec![1, 2, 3]);
}

#[test]
fn replay_prefers_sealed_positions() {
    let mut first = action(ActionKind::Read, 1);
    first.position = Some(7);
    let mut reducer = PositionRecorder::default();
    replay(&mut reducer, &[first]).unwrap();
    assert_eq!(reducer.state(), &vec![7]);
}

#[test]
fn replay_resets_previous_state() {
    let mut reducer = PositionRecorder::default();
    reducer.state_mut().push(99);
    replay(&mut reducer, &[action(ActionKind::Read, 1)]).unwrap();
    assert_eq!(reducer.state(), &vec![1]);
}

#[test]
fn replay_stops_at_first_error() {
    let actions = vec![
        action(ActionKind::Create, 1),
        action(ActionKind::Archive, 2),
        action(ActionKind::Read, 3),
    ];
    let mut reducer = PositionRecorder::default();
    let err = replay(&mut reducer, &actions).unwrap_err();
    assert_eq!(err.0, 2);
    assert_eq!(reducer.state(), &vec![1]);
}

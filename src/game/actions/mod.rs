//! Action modules: stateless orchestration between the UI entry points
//! and the engine. Each function reads the current session, delegates
//! the math to [`crate::game::combat`], and returns the dispatches the
//! runtime should apply, plus an optional delayed follow-up for turn
//! pacing. On rejection nothing is dispatched.

pub mod battle;
pub mod explore;
pub mod inventory;

use crate::game::combat::TurnRejection;
use crate::game::reducer::Action;
use crate::game::types::{GameMode, GameSession};

/// A scheduled continuation the runtime runs after a pacing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    /// Resolve the enemy's counter-turn. The runtime reads the freshly
    /// reserved token off the reduced state and schedules against it.
    EnemyTurn,
}

/// The dispatches produced by one entry point, applied in order.
#[derive(Debug, Default)]
pub struct Outcome {
    pub actions: Vec<Action>,
    pub followup: Option<Followup>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn act(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn log(mut self, line: impl Into<String>) -> Self {
        self.actions.push(Action::AppendLog(line.into()));
        self
    }

    pub fn logs<I: IntoIterator<Item = String>>(mut self, lines: I) -> Self {
        self.actions
            .extend(lines.into_iter().map(Action::AppendLog));
        self
    }

    pub fn then_enemy_turn(mut self) -> Self {
        self.actions.push(Action::BeginEnemyTurn);
        self.followup = Some(Followup::EnemyTurn);
        self
    }
}

pub(crate) fn require_mode(
    session: &GameSession,
    mode: GameMode,
) -> Result<(), TurnRejection> {
    if session.mode == mode {
        Ok(())
    } else {
        Err(TurnRejection::WrongMode)
    }
}

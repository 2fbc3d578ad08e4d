//! 对局控制器：持有唯一的 `GameState`，并为延迟执行的对手回合签发票据。

use serde::{Deserialize, Serialize};

use crate::ai::OpponentPolicy;
use crate::config::GameConfig;
use crate::game::{
    GameSnapshot, GameState, GameStatus, MoveError, MoveResolution, Participant, RuleEngine,
};

/// 一次待执行的对手回合。票据绑定签发时的状态版本，任何后续修改都会使其失效。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpponentTicket {
    revision: u64,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    state: GameState,
    engine: RuleEngine,
    revision: u64,
}

impl GameSession {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            state: RuleEngine::new_game(),
            engine: RuleEngine::with_policy(OpponentPolicy::new(config.opponent_mode)),
            revision: 0,
        }
    }

    pub fn with_state(config: &GameConfig, state: GameState) -> Result<Self, MoveError> {
        let mut session = Self::new(config);
        session.replace_state(state)?;
        Ok(session)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.state.snapshot()
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn replace_state(&mut self, state: GameState) -> Result<(), MoveError> {
        state
            .integrity_check()
            .map_err(|error| MoveError::IntegrityViolation { error })?;
        self.state = state;
        self.bump();
        Ok(())
    }

    pub fn human_move(&mut self, value: u8) -> Result<MoveResolution, MoveError> {
        let resolution = self
            .engine
            .apply_human_move(&mut self.state, value)
            .map_err(|error| {
                log::warn!("rejected human move {value}: {error}");
                error
            })?;
        self.bump();
        Ok(resolution)
    }

    pub fn opponent_move(&mut self) -> Result<MoveResolution, MoveError> {
        let resolution = self
            .engine
            .apply_opponent_move(&mut self.state)
            .map_err(|error| {
                log::warn!("rejected opponent move: {error}");
                error
            })?;
        self.bump();
        Ok(resolution)
    }

    /// 轮到对手且对局未结束时返回一张票据，供展示层延迟执行。
    pub fn pending_opponent_turn(&self) -> Option<OpponentTicket> {
        let due = self.state.status == GameStatus::InProgress
            && self.state.current_turn == Participant::Opponent;
        due.then_some(OpponentTicket {
            revision: self.revision,
        })
    }

    pub fn fire(&mut self, ticket: OpponentTicket) -> Result<MoveResolution, MoveError> {
        if ticket.revision != self.revision {
            log::warn!(
                "dropping stale opponent turn (ticket {}, current {})",
                ticket.revision,
                self.revision
            );
            return Err(MoveError::StaleTurn);
        }
        self.opponent_move()
    }

    pub fn reset(&mut self) -> GameSnapshot {
        self.state = RuleEngine::new_game();
        self.bump();
        log::info!("game reset");
        self.snapshot()
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new(&GameConfig::default())
    }
}

use serde::{Deserialize, Serialize};

use super::state::{
    GameEvent, GameState, IntegrityError, Participant, Pick, VictoryReason, VictoryState,
    WIN_TOTAL,
};
use crate::ai::{AiDecision, OpponentPolicy};

/// 出牌被拒绝的原因。被拒绝的操作不会修改状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type")]
pub enum MoveError {
    #[error("game is already finished")]
    GameFinished,
    #[error("not the {actual}'s turn (expected {expected})")]
    NotYourTurn {
        expected: Participant,
        actual: Participant,
    },
    #[error("number {value} is outside 1..=10")]
    OutOfRange { value: u8 },
    #[error("scheduled opponent turn no longer matches the game")]
    StaleTurn,
    #[error("state failed integrity check: {error:?}")]
    IntegrityViolation { error: IntegrityError },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<AiDecision>,
}

impl MoveResolution {
    pub fn new(state: GameState, mut events: Vec<GameEvent>) -> Self {
        let victory = state.outcome.clone();
        if let Some(ref outcome) = victory {
            let has_event = events
                .iter()
                .any(|event| matches!(event, GameEvent::GameWon { .. }));
            if !has_event {
                events.push(GameEvent::GameWon {
                    winner: outcome.winner,
                    reason: outcome.reason.clone(),
                });
            }
        }

        Self {
            state,
            events,
            victory,
            decision: None,
        }
    }

    pub fn with_decision(mut self, decision: AiDecision) -> Self {
        self.decision = Some(decision);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    policy: OpponentPolicy,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: OpponentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &OpponentPolicy {
        &self.policy
    }

    pub fn new_game() -> GameState {
        GameState::new()
    }

    fn ensure_in_progress(state: &GameState) -> Result<(), MoveError> {
        if state.is_finished() {
            return Err(MoveError::GameFinished);
        }
        Ok(())
    }

    fn ensure_turn_owner(state: &GameState, participant: Participant) -> Result<(), MoveError> {
        if state.current_turn != participant {
            return Err(MoveError::NotYourTurn {
                expected: state.current_turn,
                actual: participant,
            });
        }
        Ok(())
    }

    pub fn apply_human_move(
        &self,
        state: &mut GameState,
        value: u8,
    ) -> Result<MoveResolution, MoveError> {
        self.apply_move(state, Participant::Human, value)
    }

    pub fn apply_opponent_move(&self, state: &mut GameState) -> Result<MoveResolution, MoveError> {
        Self::ensure_in_progress(state)?;
        Self::ensure_turn_owner(state, Participant::Opponent)?;

        let decision = self
            .policy
            .choose(&state.human_moves, &state.opponent_moves);
        log::debug!("opponent chose {} ({:?})", decision.pick, decision.reason);

        let events = Self::play(state, Participant::Opponent, decision.pick);
        Ok(MoveResolution::new(state.clone(), events).with_decision(decision))
    }

    /// 任一玩家出一个数字：校验、记账，然后依次判定序列胜利、总和胜利、交换回合。
    pub fn apply_move(
        &self,
        state: &mut GameState,
        participant: Participant,
        value: u8,
    ) -> Result<MoveResolution, MoveError> {
        Self::ensure_in_progress(state)?;
        Self::ensure_turn_owner(state, participant)?;
        let pick = Pick::new(value)?;

        let events = Self::play(state, participant, pick);
        Ok(MoveResolution::new(state.clone(), events))
    }

    fn play(state: &mut GameState, participant: Participant, pick: Pick) -> Vec<GameEvent> {
        let mut events = vec![state.push_pick(participant, pick)];
        log::debug!("{participant} played {pick}, total {}", state.total);

        if let Some(sequence) = state.completed_sequence(participant) {
            let victory =
                state.declare_victory(participant, VictoryReason::SequenceCompleted { sequence });
            log::info!("{participant} wins by completing {sequence:?}");
            events.push(GameEvent::GameWon {
                winner: victory.winner,
                reason: victory.reason,
            });
            return events;
        }

        if state.total >= WIN_TOTAL {
            let victory = state.declare_victory(
                participant,
                VictoryReason::TotalReached { total: state.total },
            );
            log::info!("{participant} wins by reaching total {}", state.total);
            events.push(GameEvent::GameWon {
                winner: victory.winner,
                reason: victory.reason,
            });
            return events;
        }

        events.push(state.pass_turn());
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::OpponentMode;
    use crate::game::state::GameStatus;

    fn engine() -> RuleEngine {
        RuleEngine::new()
    }

    fn values(moves: &[Pick]) -> Vec<u8> {
        moves.iter().map(|pick| pick.value()).collect()
    }

    #[test]
    fn human_move_updates_total_and_passes_turn() {
        let engine = engine();
        let mut state = GameState::new();

        let resolution = engine
            .apply_human_move(&mut state, 7)
            .expect("human opens the game");

        assert_eq!(state.total, 7);
        assert_eq!(values(&state.human_moves), vec![7]);
        assert_eq!(state.current_turn, Participant::Opponent);
        assert_eq!(state.status, GameStatus::InProgress);
        assert!(resolution.victory.is_none());
        assert!(resolution.events.contains(&GameEvent::TurnPassed {
            to: Participant::Opponent
        }));
    }

    #[test]
    fn human_completing_sequence_wins() {
        let engine = engine();
        let mut state = GameState::new();

        for number in 1..=5 {
            engine
                .apply_human_move(&mut state, number)
                .expect("human move accepted");
            if !state.is_finished() {
                engine
                    .apply_opponent_move(&mut state)
                    .expect("opponent move accepted");
            }
        }

        assert_eq!(state.status, GameStatus::WonHuman);
        assert_eq!(values(&state.opponent_moves), vec![1, 2, 3, 4]);
        assert_eq!(state.total, 25);
        assert_eq!(state.current_turn, Participant::Human);
        assert_eq!(
            state.outcome,
            Some(VictoryState {
                winner: Participant::Human,
                reason: VictoryReason::SequenceCompleted {
                    sequence: [1, 2, 3, 4, 5]
                },
            })
        );
    }

    #[test]
    fn reaching_total_credits_the_mover() {
        let engine = engine();
        let mut state = GameState::new();

        let mut last = None;
        for turn in 0..10 {
            let participant = if turn % 2 == 0 {
                Participant::Human
            } else {
                Participant::Opponent
            };
            last = Some(
                engine
                    .apply_move(&mut state, participant, 10)
                    .expect("alternating tens are accepted"),
            );
        }

        assert_eq!(state.total, 100);
        assert_eq!(state.status, GameStatus::WonOpponent);
        let victory = last.and_then(|resolution| resolution.victory);
        assert_eq!(
            victory.map(|victory| victory.reason),
            Some(VictoryReason::TotalReached { total: 100 })
        );
    }

    #[test]
    fn sequence_takes_precedence_over_total() {
        let engine = engine();
        let mut state = GameState::new();
        let script: [(Participant, u8); 13] = [
            (Participant::Human, 10),
            (Participant::Opponent, 10),
            (Participant::Human, 10),
            (Participant::Opponent, 10),
            (Participant::Human, 10),
            (Participant::Opponent, 10),
            (Participant::Human, 9),
            (Participant::Opponent, 10),
            (Participant::Human, 8),
            (Participant::Opponent, 1),
            (Participant::Human, 7),
            (Participant::Opponent, 1),
            (Participant::Human, 6),
        ];
        for (participant, value) in script {
            engine
                .apply_move(&mut state, participant, value)
                .expect("scripted move accepted");
        }

        assert_eq!(state.total, 102);
        assert_eq!(state.status, GameStatus::WonHuman);
        assert_eq!(
            state.outcome.map(|victory| victory.reason),
            Some(VictoryReason::SequenceCompleted {
                sequence: [6, 7, 8, 9, 10]
            })
        );
    }

    #[test]
    fn faithful_opponent_wins_with_its_own_sequence() {
        let engine = engine();
        let mut state = GameState::new();

        while !state.is_finished() {
            engine
                .apply_human_move(&mut state, 10)
                .expect("human move accepted");
            if !state.is_finished() {
                engine
                    .apply_opponent_move(&mut state)
                    .expect("opponent move accepted");
            }
        }

        assert_eq!(state.status, GameStatus::WonOpponent);
        assert_eq!(values(&state.opponent_moves), vec![1, 2, 3, 4, 5]);
        assert_eq!(state.total, 65);
    }

    #[test]
    fn out_of_turn_move_is_rejected_without_changes() {
        let engine = engine();
        let mut state = GameState::new();
        engine
            .apply_human_move(&mut state, 3)
            .expect("opening move accepted");
        let before = state.clone();

        let error = engine
            .apply_human_move(&mut state, 7)
            .expect_err("human cannot move twice");

        assert_eq!(
            error,
            MoveError::NotYourTurn {
                expected: Participant::Opponent,
                actual: Participant::Human
            }
        );
        assert_eq!(state, before);
    }

    #[test]
    fn opponent_cannot_open_the_game() {
        let engine = engine();
        let mut state = GameState::new();
        let error = engine
            .apply_opponent_move(&mut state)
            .expect_err("human moves first");
        assert!(matches!(error, MoveError::NotYourTurn { .. }));
        assert_eq!(state, GameState::new());
    }

    #[test]
    fn out_of_range_move_is_rejected_without_changes() {
        let engine = engine();
        let mut state = GameState::new();

        for value in [0, 11, 255] {
            assert_eq!(
                engine.apply_human_move(&mut state, value),
                Err(MoveError::OutOfRange { value })
            );
        }
        assert_eq!(state, GameState::new());
    }

    #[test]
    fn finished_game_rejects_every_move() {
        let engine = engine();
        let mut state = GameState::new();
        state.declare_victory(Participant::Human, VictoryReason::TotalReached { total: 100 });
        let before = state.clone();

        assert_eq!(
            engine.apply_human_move(&mut state, 1),
            Err(MoveError::GameFinished)
        );
        assert_eq!(
            engine.apply_opponent_move(&mut state),
            Err(MoveError::GameFinished)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn blocking_policy_flows_into_opponent_move() {
        let engine = RuleEngine::with_policy(OpponentPolicy::new(OpponentMode::Blocking));
        let mut state = GameState::new();
        engine
            .apply_human_move(&mut state, 4)
            .expect("human move accepted");

        let resolution = engine
            .apply_opponent_move(&mut state)
            .expect("opponent move accepted");

        // {1..5} 是第一个人类已占有成员的序列，最小缺失数字为 1。
        assert_eq!(values(&state.opponent_moves), vec![1]);
        assert_eq!(
            resolution.decision.map(|decision| decision.pick.value()),
            Some(1)
        );
    }

    #[test]
    fn move_error_serializes_with_type_tag() {
        let json = serde_json::to_value(MoveError::OutOfRange { value: 12 })
            .expect("error serializes");
        assert_eq!(json["type"], "OutOfRange");
        assert_eq!(json["value"], 12);
        assert_eq!(
            MoveError::GameFinished.to_string(),
            "game is already finished"
        );
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use super::rules::MoveError;

/// 可选数字下限。
pub const MIN_PICK: u8 = 1;
/// 可选数字上限。
pub const MAX_PICK: u8 = 10;
/// 累计总和达到该值即结束游戏。
pub const WIN_TOTAL: u32 = 100;

/// 固定的六组获胜序列：1–10 上宽度为 5 的滑动窗口。
pub const WINNING_SEQUENCES: [[u8; 5]; 6] = [
    [1, 2, 3, 4, 5],
    [2, 3, 4, 5, 6],
    [3, 4, 5, 6, 7],
    [4, 5, 6, 7, 8],
    [5, 6, 7, 8, 9],
    [6, 7, 8, 9, 10],
];

/// 一次出牌的数字，保证位于 `MIN_PICK..=MAX_PICK`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Pick(u8);

impl Pick {
    pub fn new(value: u8) -> Result<Self, MoveError> {
        if (MIN_PICK..=MAX_PICK).contains(&value) {
            Ok(Self(value))
        } else {
            Err(MoveError::OutOfRange { value })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// 按升序返回全部可选数字。
    pub fn all() -> impl Iterator<Item = Pick> {
        (MIN_PICK..=MAX_PICK).map(Pick)
    }
}

impl TryFrom<u8> for Pick {
    type Error = MoveError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Pick::new(value)
    }
}

impl From<Pick> for u8 {
    fn from(pick: Pick) -> Self {
        pick.0
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 对局双方。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Human,
    Opponent,
}

impl Participant {
    pub fn other(self) -> Self {
        match self {
            Participant::Human => Participant::Opponent,
            Participant::Opponent => Participant::Human,
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Human => f.write_str("human"),
            Participant::Opponent => f.write_str("opponent"),
        }
    }
}

impl Default for Participant {
    fn default() -> Self {
        Participant::Human
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    WonHuman,
    WonOpponent,
}

impl GameStatus {
    pub fn won_by(participant: Participant) -> Self {
        match participant {
            Participant::Human => GameStatus::WonHuman,
            Participant::Opponent => GameStatus::WonOpponent,
        }
    }

    pub fn winner(self) -> Option<Participant> {
        match self {
            GameStatus::InProgress => None,
            GameStatus::WonHuman => Some(Participant::Human),
            GameStatus::WonOpponent => Some(Participant::Opponent),
        }
    }

    pub fn is_terminal(self) -> bool {
        self != GameStatus::InProgress
    }
}

impl Default for GameStatus {
    fn default() -> Self {
        GameStatus::InProgress
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum VictoryReason {
    SequenceCompleted { sequence: [u8; 5] },
    TotalReached { total: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictoryState {
    pub winner: Participant,
    pub reason: VictoryReason,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    NumberPlayed {
        participant: Participant,
        pick: Pick,
        total: u32,
    },
    TurnPassed {
        to: Participant,
    },
    GameWon {
        winner: Participant,
        reason: VictoryReason,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    TotalMismatch { expected: u32, actual: u32 },
    TurnOrderViolation {
        human_moves: usize,
        opponent_moves: usize,
    },
    StatusMismatch {
        status: GameStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<Participant>,
    },
    UnresolvedVictory { participant: Participant },
    VictoryMismatch {
        winner: Participant,
        #[serde(skip_serializing_if = "Option::is_none")]
        recorded: Option<VictoryReason>,
        #[serde(skip_serializing_if = "Option::is_none")]
        derived: Option<VictoryReason>,
    },
}

/// 游戏整体状态。只能通过 `RuleEngine` 的出牌操作修改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub total: u32,
    #[serde(default)]
    pub current_turn: Participant,
    #[serde(default)]
    pub human_moves: Vec<Pick>,
    #[serde(default)]
    pub opponent_moves: Vec<Pick>,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VictoryState>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            total: 0,
            current_turn: Participant::Human,
            human_moves: Vec::new(),
            opponent_moves: Vec::new(),
            status: GameStatus::InProgress,
            event_log: Vec::new(),
            outcome: None,
        }
    }

    pub fn moves_of(&self, participant: Participant) -> &[Pick] {
        match participant {
            Participant::Human => &self.human_moves,
            Participant::Opponent => &self.opponent_moves,
        }
    }

    pub fn moves_of_mut(&mut self, participant: Participant) -> &mut Vec<Pick> {
        match participant {
            Participant::Human => &mut self.human_moves,
            Participant::Opponent => &mut self.opponent_moves,
        }
    }

    /// 返回该玩家已凑齐的第一组获胜序列（按目录顺序）。
    pub fn completed_sequence(&self, participant: Participant) -> Option<[u8; 5]> {
        let moves = self.moves_of(participant);
        WINNING_SEQUENCES
            .iter()
            .find(|sequence| {
                sequence
                    .iter()
                    .all(|&number| moves.iter().any(|pick| pick.value() == number))
            })
            .copied()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn winner(&self) -> Option<Participant> {
        self.status.winner()
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    /// 记录一次出牌：追加到该玩家的序列并累加总和。
    pub fn push_pick(&mut self, participant: Participant, pick: Pick) -> GameEvent {
        self.moves_of_mut(participant).push(pick);
        self.total += u32::from(pick.value());
        let event = GameEvent::NumberPlayed {
            participant,
            pick,
            total: self.total,
        };
        self.record_event(event.clone());
        event
    }

    pub fn pass_turn(&mut self) -> GameEvent {
        self.current_turn = self.current_turn.other();
        let event = GameEvent::TurnPassed {
            to: self.current_turn,
        };
        self.record_event(event.clone());
        event
    }

    pub fn declare_victory(&mut self, winner: Participant, reason: VictoryReason) -> VictoryState {
        let victory = VictoryState { winner, reason };
        if self.outcome.is_none() {
            self.status = GameStatus::won_by(winner);
            self.record_event(GameEvent::GameWon {
                winner: victory.winner,
                reason: victory.reason.clone(),
            });
            self.outcome = Some(victory.clone());
        }
        victory
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::from(self)
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let expected: u32 = self
            .human_moves
            .iter()
            .chain(self.opponent_moves.iter())
            .map(|pick| u32::from(pick.value()))
            .sum();
        if expected != self.total {
            return Err(IntegrityError::TotalMismatch {
                expected,
                actual: self.total,
            });
        }

        let human = self.human_moves.len();
        let opponent = self.opponent_moves.len();
        let balanced = match (self.status, self.current_turn) {
            (GameStatus::InProgress, Participant::Human) => human == opponent,
            (GameStatus::InProgress, Participant::Opponent) => human == opponent + 1,
            (GameStatus::WonHuman, Participant::Human) => human == opponent + 1,
            (GameStatus::WonOpponent, Participant::Opponent) => human == opponent && opponent > 0,
            _ => false,
        };
        if !balanced {
            return Err(IntegrityError::TurnOrderViolation {
                human_moves: human,
                opponent_moves: opponent,
            });
        }

        let outcome = self.outcome.as_ref().map(|victory| victory.winner);
        if outcome != self.status.winner() {
            return Err(IntegrityError::StatusMismatch {
                status: self.status,
                outcome,
            });
        }

        match self.winner() {
            None => {
                for participant in [Participant::Human, Participant::Opponent] {
                    if self.completed_sequence(participant).is_some() {
                        return Err(IntegrityError::UnresolvedVictory { participant });
                    }
                }
                if self.total >= WIN_TOTAL {
                    // 最后出牌的一方达到了阈值。
                    return Err(IntegrityError::UnresolvedVictory {
                        participant: self.current_turn.other(),
                    });
                }
            }
            Some(winner) => {
                // 失败方若已凑齐序列，对局应在更早的回合结束。
                let loser = winner.other();
                if self.completed_sequence(loser).is_some() {
                    return Err(IntegrityError::UnresolvedVictory { participant: loser });
                }
                let derived = self.derived_victory_reason(winner);
                let recorded = self.outcome.as_ref().map(|victory| victory.reason.clone());
                if derived.is_none() || derived != recorded {
                    return Err(IntegrityError::VictoryMismatch {
                        winner,
                        recorded,
                        derived,
                    });
                }
            }
        }

        Ok(())
    }

    /// 按规则的判定顺序推导获胜原因：先看序列，再看总和。
    fn derived_victory_reason(&self, winner: Participant) -> Option<VictoryReason> {
        if let Some(sequence) = self.completed_sequence(winner) {
            return Some(VictoryReason::SequenceCompleted { sequence });
        }
        (self.total >= WIN_TOTAL).then_some(VictoryReason::TotalReached { total: self.total })
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// 提供给展示层渲染的只读快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSnapshot {
    pub total: u32,
    pub current_turn: Participant,
    pub status: GameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Participant>,
    pub human_moves: Vec<Pick>,
    pub opponent_moves: Vec<Pick>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

impl From<&GameState> for GameSnapshot {
    fn from(state: &GameState) -> Self {
        Self {
            total: state.total,
            current_turn: state.current_turn,
            status: state.status,
            winner: state.winner(),
            human_moves: state.human_moves.clone(),
            opponent_moves: state.opponent_moves.clone(),
            victory: state.outcome.clone(),
        }
    }
}

//! 游戏核心逻辑模块（状态机、规则引擎）。

pub mod rules;
pub mod state;

pub use rules::{MoveError, MoveResolution, RuleEngine};
pub use state::{
    GameEvent,
    GameSnapshot,
    GameState,
    GameStatus,
    IntegrityError,
    Participant,
    Pick,
    VictoryReason,
    VictoryState,
    MAX_PICK,
    MIN_PICK,
    WINNING_SEQUENCES,
    WIN_TOTAL,
};

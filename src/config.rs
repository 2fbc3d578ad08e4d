use std::str::FromStr;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::ai::OpponentMode;

const DEFAULT_OPPONENT_DELAY_MS: u32 = 1000;

/// 前端在构造 `GameEngine` 时传入的配置（JSON，可省略任意字段）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    /// 对手“思考”的延迟，0 表示立即出牌。
    pub opponent_delay_ms: u32,
    pub opponent_mode: OpponentMode,
    pub log_level: String,
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_mode(mut self, mode: OpponentMode) -> Self {
        self.opponent_mode = mode;
        self
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.opponent_delay_ms = delay_ms;
        self
    }

    pub fn log_level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            opponent_delay_ms: DEFAULT_OPPONENT_DELAY_MS,
            opponent_mode: OpponentMode::default(),
            log_level: "info".into(),
        }
    }
}

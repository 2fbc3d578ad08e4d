//! 对手 AI 模块（确定性选数策略）。

pub mod policy;

pub use policy::{AiDecision, DecisionReason, OpponentMode, OpponentPolicy};

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::game::{Pick, WINNING_SEQUENCES};

/// 对手选数策略的两种解读。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpponentMode {
    /// 拦截扫描的判定条件恒为假，总是退回到“最小未出过的数字”。
    Faithful,
    /// 人类已占有 1–4 个成员的第一个序列会被拦截：出该序列中最小的缺失数字。
    Blocking,
}

impl FromStr for OpponentMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "faithful" | "classic" => Ok(OpponentMode::Faithful),
            "blocking" | "block" | "fixed" => Ok(OpponentMode::Blocking),
            _ => Err(()),
        }
    }
}

impl Default for OpponentMode {
    fn default() -> Self {
        OpponentMode::Faithful
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DecisionReason {
    Block { sequence: [u8; 5] },
    Lowest,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiDecision {
    pub pick: Pick,
    pub reason: DecisionReason,
    pub mode: OpponentMode,
}

/// 确定性的对手选数策略，不使用随机数。
#[derive(Debug, Clone, Default)]
pub struct OpponentPolicy {
    mode: OpponentMode,
}

impl OpponentPolicy {
    pub fn new(mode: OpponentMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OpponentMode {
        self.mode
    }

    /// 可选数字每次都是完整的 1–10，双方都可以重复出同一个数字。
    fn available_picks() -> Vec<Pick> {
        Pick::all().collect()
    }

    pub fn choose(&self, human_moves: &[Pick], opponent_moves: &[Pick]) -> AiDecision {
        let available = Self::available_picks();

        if let Some((sequence, pick)) = self.blocking_pick(human_moves, &available) {
            return AiDecision {
                pick,
                reason: DecisionReason::Block { sequence },
                mode: self.mode,
            };
        }

        match available
            .iter()
            .find(|pick| !opponent_moves.contains(pick))
        {
            Some(&pick) => AiDecision {
                pick,
                reason: DecisionReason::Lowest,
                mode: self.mode,
            },
            None => AiDecision {
                pick: available[0],
                reason: DecisionReason::Fallback,
                mode: self.mode,
            },
        }
    }

    fn blocking_pick(&self, human_moves: &[Pick], available: &[Pick]) -> Option<([u8; 5], Pick)> {
        for sequence in WINNING_SEQUENCES.iter() {
            if !self.is_contested(sequence, human_moves) {
                continue;
            }
            let next = sequence
                .iter()
                .find(|&&number| !holds(human_moves, number))
                .and_then(|&number| Pick::new(number).ok());
            if let Some(pick) = next {
                if available.contains(&pick) {
                    return Some((*sequence, pick));
                }
            }
        }
        None
    }

    fn is_contested(&self, sequence: &[u8; 5], human_moves: &[Pick]) -> bool {
        match self.mode {
            OpponentMode::Faithful => false,
            OpponentMode::Blocking => {
                let held = sequence
                    .iter()
                    .filter(|&&number| holds(human_moves, number))
                    .count();
                (1..sequence.len()).contains(&held)
            }
        }
    }
}

fn holds(moves: &[Pick], number: u8) -> bool {
    moves.iter().any(|pick| pick.value() == number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picks(values: &[u8]) -> Vec<Pick> {
        values
            .iter()
            .map(|&value| Pick::new(value).expect("test picks are in range"))
            .collect()
    }

    #[test]
    fn faithful_mode_ignores_human_progress() {
        let policy = OpponentPolicy::new(OpponentMode::Faithful);
        let decision = policy.choose(&picks(&[1, 2, 3, 4]), &[]);
        assert_eq!(decision.pick.value(), 1);
        assert_eq!(decision.reason, DecisionReason::Lowest);
    }

    #[test]
    fn blocking_mode_completes_the_block() {
        let policy = OpponentPolicy::new(OpponentMode::Blocking);
        let decision = policy.choose(&picks(&[1, 2, 3, 4]), &[]);
        assert_eq!(decision.pick.value(), 5);
        assert_eq!(
            decision.reason,
            DecisionReason::Block {
                sequence: [1, 2, 3, 4, 5]
            }
        );
    }

    #[test]
    fn lowest_unplayed_number_is_chosen() {
        let policy = OpponentPolicy::default();
        let decision = policy.choose(&picks(&[9]), &picks(&[1, 2, 4]));
        assert_eq!(decision.pick.value(), 3);
    }

    #[test]
    fn falls_back_to_one_when_everything_was_played() {
        let policy = OpponentPolicy::default();
        let all: Vec<Pick> = Pick::all().collect();
        let decision = policy.choose(&[], &all);
        assert_eq!(decision.pick.value(), 1);
        assert_eq!(decision.reason, DecisionReason::Fallback);
    }

    #[test]
    fn blocking_scans_in_catalogue_order() {
        let policy = OpponentPolicy::new(OpponentMode::Blocking);
        // 人类持有 7、8：{3..7} 是第一个被触及的序列。
        let decision = policy.choose(&picks(&[7, 8]), &[]);
        assert_eq!(
            decision.reason,
            DecisionReason::Block {
                sequence: [3, 4, 5, 6, 7]
            }
        );
        assert_eq!(decision.pick.value(), 3);
    }

    #[test]
    fn blocking_falls_through_without_human_moves() {
        let policy = OpponentPolicy::new(OpponentMode::Blocking);
        let decision = policy.choose(&[], &picks(&[1]));
        assert_eq!(decision.pick.value(), 2);
        assert_eq!(decision.reason, DecisionReason::Lowest);
    }

    #[test]
    fn blocking_may_repeat_an_opponent_number() {
        let policy = OpponentPolicy::new(OpponentMode::Blocking);
        let decision = policy.choose(&picks(&[2]), &picks(&[1]));
        assert_eq!(decision.pick.value(), 1);
    }

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("Faithful".parse::<OpponentMode>(), Ok(OpponentMode::Faithful));
        assert_eq!("fixed".parse::<OpponentMode>(), Ok(OpponentMode::Blocking));
        assert!("hard".parse::<OpponentMode>().is_err());
    }
}

pub mod ai;
pub mod config;
pub mod game;
pub mod session;
pub mod utils;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use gloo_timers::callback::Timeout;
use gloo_timers::future::TimeoutFuture;
use log::LevelFilter;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::{Function, Promise};

pub use ai::{AiDecision, DecisionReason, OpponentMode, OpponentPolicy};
pub use config::GameConfig;
pub use game::{
    GameEvent, GameSnapshot, GameState, GameStatus, IntegrityError, MoveError, MoveResolution,
    Participant, Pick, RuleEngine, VictoryReason, VictoryState, MAX_PICK, MIN_PICK,
    WINNING_SEQUENCES, WIN_TOTAL,
};
pub use session::{GameSession, OpponentTicket};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging(LevelFilter::Info);
}

fn to_js_error(error: MoveError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

fn parse_mode(mode: Option<String>) -> OpponentMode {
    mode.as_deref()
        .and_then(|value| OpponentMode::from_str(value).ok())
        .unwrap_or_default()
}

fn ensure_valid(state: &GameState) -> Result<(), JsValue> {
    state
        .integrity_check()
        .map_err(|error| to_js_error(MoveError::IntegrityViolation { error }))
}

struct EngineInner {
    session: GameSession,
    config: GameConfig,
    pending: Option<Timeout>,
    on_change: Option<Function>,
}

impl EngineInner {
    fn cancel_pending(&mut self) {
        if let Some(timeout) = self.pending.take() {
            log::debug!("cancelling scheduled opponent turn");
            drop(timeout.cancel());
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// 浏览器端持有的对局实例。对手回合通过可取消的定时器延迟执行。
#[wasm_bindgen]
pub struct GameEngine {
    inner: Rc<RefCell<EngineInner>>,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameEngine, JsValue> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => GameConfig::default(),
        };
        log::set_max_level(config.log_level_filter());
        let session = GameSession::new(&config);
        Ok(GameEngine {
            inner: Rc::new(RefCell::new(EngineInner {
                session,
                config,
                pending: None,
                on_change: None,
            })),
        })
    }

    /// 注册状态变化回调：定时器触发的对手回合完成后以快照 JSON 调用。
    pub fn on_change(&self, callback: Function) {
        self.inner.borrow_mut().on_change = Some(callback);
    }

    pub fn config_json(&self) -> Result<String, JsValue> {
        to_json(&self.inner.borrow().config)
    }

    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        to_json(&self.inner.borrow().session.snapshot())
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(self.inner.borrow().session.state())
    }

    pub fn set_state_json(&self, json: &str) -> Result<(), JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        // 校验失败时保留原有状态和已排队的对手回合。
        ensure_valid(&state)?;
        self.inner
            .borrow_mut()
            .session
            .replace_state(state)
            .map_err(to_js_error)?;
        self.schedule_opponent();
        Ok(())
    }

    pub fn apply_human_move(&self, value: u8) -> Result<String, JsValue> {
        let resolution = self
            .inner
            .borrow_mut()
            .session
            .human_move(value)
            .map_err(to_js_error)?;
        self.schedule_opponent();
        to_json(&resolution)
    }

    /// 立即执行对手回合（调用方自行控制节奏时使用），同时取消已排队的定时器。
    pub fn apply_opponent_move(&self) -> Result<String, JsValue> {
        let mut inner = self.inner.borrow_mut();
        inner.cancel_pending();
        let resolution = inner.session.opponent_move().map_err(to_js_error)?;
        to_json(&resolution)
    }

    pub fn reset_game(&self) -> Result<String, JsValue> {
        let mut inner = self.inner.borrow_mut();
        inner.cancel_pending();
        let snapshot = inner.session.reset();
        to_json(&snapshot)
    }

    /// 卸载前调用，确保没有遗留的对手回合。
    pub fn dispose(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.cancel_pending();
        inner.on_change = None;
    }

    pub fn has_pending_opponent_turn(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    /// 延迟后给出对手的选择，但不修改对局。
    pub fn think_opponent(&self, delay_ms: Option<u32>) -> Promise {
        let inner = self.inner.borrow();
        let policy = inner.session.engine().policy().clone();
        let human_moves = inner.session.state().human_moves.clone();
        let opponent_moves = inner.session.state().opponent_moves.clone();
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let decision = policy.choose(&human_moves, &opponent_moves);
            let json = to_json(&decision)?;
            Ok(JsValue::from_str(&json))
        })
    }

    fn schedule_opponent(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.cancel_pending();
        let Some(ticket) = inner.session.pending_opponent_turn() else {
            return;
        };
        let delay = inner.config.opponent_delay_ms;
        let handle = Rc::downgrade(&self.inner);
        log::debug!("opponent turn scheduled in {delay}ms");
        inner.pending = Some(Timeout::new(delay, move || {
            run_scheduled_turn(&handle, ticket)
        }));
    }
}

fn run_scheduled_turn(handle: &Weak<RefCell<EngineInner>>, ticket: OpponentTicket) {
    let Some(inner) = handle.upgrade() else {
        return;
    };

    // 回调可能重入 GameEngine，调用前先释放借用。
    let (listener, payload) = {
        let mut inner = inner.borrow_mut();
        // 能触发的定时器一定是当前排队的那个，其余都已在重新排队时取消。
        drop(inner.pending.take());
        if let Err(error) = inner.session.fire(ticket) {
            log::warn!("scheduled opponent turn skipped: {error}");
            return;
        }
        (inner.on_change.clone(), to_json(&inner.session.snapshot()))
    };

    let Some(listener) = listener else {
        return;
    };
    match payload {
        Ok(json) => {
            if let Err(error) = listener.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                log::error!("on_change listener threw: {error:?}");
            }
        }
        Err(error) => log::error!("failed to serialize snapshot: {error:?}"),
    }
}

/// 返回一个全新的初始状态。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state() -> Result<JsValue, JsValue> {
    to_value(&GameState::new()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "winningSequences")]
pub fn winning_sequences() -> Result<JsValue, JsValue> {
    to_value(&WINNING_SEQUENCES).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "applyHumanMove")]
pub fn apply_human_move(state: JsValue, value: u8) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    ensure_valid(&state)?;
    let engine = RuleEngine::new();
    match engine.apply_human_move(&mut state, value) {
        Ok(resolution) => to_value(&resolution).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "applyOpponentMove")]
pub fn apply_opponent_move(state: JsValue, mode: Option<String>) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    ensure_valid(&state)?;
    let engine = RuleEngine::with_policy(OpponentPolicy::new(parse_mode(mode)));
    match engine.apply_opponent_move(&mut state) {
        Ok(resolution) => to_value(&resolution).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "chooseOpponentMove")]
pub fn choose_opponent_move(
    human_moves: Vec<u8>,
    opponent_moves: Vec<u8>,
    mode: Option<String>,
) -> Result<JsValue, JsValue> {
    let to_picks = |values: Vec<u8>| -> Result<Vec<Pick>, JsValue> {
        values
            .into_iter()
            .map(|value| Pick::new(value).map_err(to_js_error))
            .collect()
    };
    let human_moves = to_picks(human_moves)?;
    let opponent_moves = to_picks(opponent_moves)?;
    let policy = OpponentPolicy::new(parse_mode(mode));
    let decision = policy.choose(&human_moves, &opponent_moves);
    to_value(&decision).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    ensure_valid(&state)
}

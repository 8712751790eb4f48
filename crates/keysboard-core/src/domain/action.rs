//! Action types and their JSON wire shape.
//!
//! On disk every action is an object with an optional type tag and a payload:
//!
//! ```json
//! { "action_type": "shell",     "action": "notify-send hi" }
//! { "action_type": "keyboard",  "action": "KEY_A", "hold_time": 0.1 }
//! { "action_type": "keyboard",  "action": "KEY_LEFTSHIFT", "state": 1 }
//! { "action_type": "keyboard",  "action": [ { "key": "KEY_A", "delay": 0.5 } ] }
//! { "action_type": "set_layer", "action": "alt" }
//! { "action_type": "alias",     "action": "open-browser" }
//! { "action_type": "multi",     "action": [ { "action": "echo 1" }, ... ] }
//! ```
//!
//! The object is decoded into [`Action`] when the config is parsed, so the
//! dispatch path only ever sees a typed variant.  A missing, empty, or
//! unrecognised `action_type` means the payload is a shell command.
//!
//! Durations (`hold_time`, `delay`) are written in seconds as floating point
//! numbers and must be finite and non-negative.
//!
//! # Malformed entries
//!
//! Decoding never fails the whole document.  An entry that does not fit any
//! shape (no `action`, a `hold_time` written as a string, a list where a
//! string is expected) becomes [`Action::Invalid`].  It keeps the raw JSON, so
//! saving the document writes the entry back as it was, and the executor
//! logs and skips it.  Inside a multi action only the bad sub-entry is
//! invalid; its siblings still run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tag for [`Action::Shell`].
pub const SHELL_TAG: &str = "shell";
/// Tag for [`Action::Keyboard`].
pub const KEYBOARD_TAG: &str = "keyboard";
/// Tag for [`Action::SetLayer`].
pub const SET_LAYER_TAG: &str = "set_layer";
/// Tag for [`Action::Alias`].
pub const ALIAS_TAG: &str = "alias";
/// Tag for [`Action::Multi`].
pub const MULTI_TAG: &str = "multi";

/// Error produced when an action object does not match any valid shape.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionDecodeError {
    #[error("malformed action: {0}")]
    Malformed(String),
    #[error("{kind} action expects a string payload")]
    ExpectedString { kind: &'static str },
    #[error("{kind} action expects a list payload")]
    ExpectedList { kind: &'static str },
    #[error("keyboard action expects a key name or a list of key steps")]
    ExpectedKeyboardPayload,
    #[error("invalid {field} value {value}: must be a finite, non-negative number of seconds")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("invalid key state {0}: must be 0 (released) or 1 (pressed)")]
    InvalidState(u8),
    #[error("key step {index}: {reason}")]
    Step { index: usize, reason: String },
    #[error("multi entry {index}: {reason}")]
    Nested { index: usize, reason: String },
}

/// A single key operation emitted through the synthetic keyboard.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOp {
    /// Press, hold for `hold` (or the engine default), then release.
    Press { key: String, hold: Option<Duration> },
    /// Set the key to exactly this state once, with no implicit release.
    Set { key: String, pressed: bool },
}

impl KeyOp {
    /// The key identifier this operation acts on.
    pub fn key(&self) -> &str {
        match self {
            KeyOp::Press { key, .. } | KeyOp::Set { key, .. } => key,
        }
    }
}

/// One entry of a keyboard sequence: an optional delay, then a key operation.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyStep {
    /// Time to sleep before performing `op`.
    pub delay: Option<Duration>,
    pub op: KeyOp,
}

/// Payload of a keyboard action.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyboardAction {
    Single(KeyOp),
    Sequence(Vec<KeyStep>),
}

/// What a keybind (or alias) does when triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Action {
    /// Run a command in a detached shell.
    Shell(String),
    /// Emit synthetic key events.
    Keyboard(KeyboardAction),
    /// Switch the session's current layer.
    SetLayer(String),
    /// Run the device alias with this name.
    Alias(String),
    /// Run each action in order.
    Multi(Vec<Action>),
    /// An entry that did not decode; skipped when dispatched.
    Invalid(InvalidAction),
}

/// A keybind, alias or multi entry that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidAction {
    /// The entry exactly as written in the document.
    pub raw: Value,
    pub error: ActionDecodeError,
}

impl Action {
    /// The wire tag for this action's variant (`None` for an invalid entry).
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Action::Shell(_) => Some(SHELL_TAG),
            Action::Keyboard(_) => Some(KEYBOARD_TAG),
            Action::SetLayer(_) => Some(SET_LAYER_TAG),
            Action::Alias(_) => Some(ALIAS_TAG),
            Action::Multi(_) => Some(MULTI_TAG),
            Action::Invalid(_) => None,
        }
    }

    /// Decodes one action object.
    ///
    /// # Errors
    ///
    /// Returns [`ActionDecodeError`] if `value` does not describe an action.
    /// Bad sub-entries of a multi action are not errors here; they decode to
    /// [`Action::Invalid`] (see [`validate`](Self::validate)).
    pub fn decode(value: Value) -> Result<Self, ActionDecodeError> {
        let raw: RawAction = serde_json::from_value(value)
            .map_err(|e| ActionDecodeError::Malformed(e.to_string()))?;
        Action::try_from(raw)
    }

    /// Checks that no part of this action is [`Action::Invalid`].
    ///
    /// # Errors
    ///
    /// Returns the first decode error, wrapped in
    /// [`ActionDecodeError::Nested`] when it sits inside a multi action.
    pub fn validate(&self) -> Result<(), ActionDecodeError> {
        match self {
            Action::Invalid(invalid) => Err(invalid.error.clone()),
            Action::Multi(actions) => actions.iter().enumerate().try_for_each(|(index, action)| {
                action.validate().map_err(|e| ActionDecodeError::Nested {
                    index,
                    reason: e.to_string(),
                })
            }),
            _ => Ok(()),
        }
    }

    /// Builds an action from a type tag and a textual payload, as typed on the
    /// command line.
    ///
    /// A payload that parses as a JSON array is used as a list (keyboard
    /// sequences and multi actions); anything else is taken as a string.
    ///
    /// # Errors
    ///
    /// Returns [`ActionDecodeError`] if the payload does not fit the tag.
    pub fn from_parts(action_type: &str, payload: &str) -> Result<Self, ActionDecodeError> {
        let action = match serde_json::from_str::<Value>(payload) {
            Ok(list @ Value::Array(_)) => list,
            _ => Value::String(payload.to_string()),
        };
        let action = Action::try_from(RawAction {
            action_type: Some(action_type.to_string()),
            action,
            hold_time: None,
            state: None,
        })?;
        action.validate()?;
        Ok(action)
    }
}

// ── Wire shape ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action_type: Option<String>,
    action: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hold_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawKeyStep {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hold_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay: Option<f64>,
}

fn seconds(field: &'static str, value: Option<f64>) -> Result<Option<Duration>, ActionDecodeError> {
    value
        .map(|v| {
            Duration::try_from_secs_f64(v)
                .map_err(|_| ActionDecodeError::InvalidDuration { field, value: v })
        })
        .transpose()
}

fn pressed(state: u8) -> Result<bool, ActionDecodeError> {
    match state {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ActionDecodeError::InvalidState(other)),
    }
}

/// `state` takes precedence over `hold_time` when both are present.
fn key_op(key: String, hold_time: Option<f64>, state: Option<u8>) -> Result<KeyOp, ActionDecodeError> {
    match state {
        Some(state) => Ok(KeyOp::Set {
            key,
            pressed: pressed(state)?,
        }),
        None => Ok(KeyOp::Press {
            key,
            hold: seconds("hold_time", hold_time)?,
        }),
    }
}

fn string_payload(kind: &'static str, value: Value) -> Result<String, ActionDecodeError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(ActionDecodeError::ExpectedString { kind }),
    }
}

impl TryFrom<RawAction> for Action {
    type Error = ActionDecodeError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        match raw.action_type.as_deref().unwrap_or_default() {
            KEYBOARD_TAG => match raw.action {
                Value::String(key) => Ok(Action::Keyboard(KeyboardAction::Single(key_op(
                    key,
                    raw.hold_time,
                    raw.state,
                )?))),
                Value::Array(items) => {
                    let steps = items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| -> Result<KeyStep, ActionDecodeError> {
                            let step: RawKeyStep =
                                serde_json::from_value(item).map_err(|e| ActionDecodeError::Step {
                                    index,
                                    reason: e.to_string(),
                                })?;
                            let wrap = |e: ActionDecodeError| ActionDecodeError::Step {
                                index,
                                reason: e.to_string(),
                            };
                            Ok(KeyStep {
                                delay: seconds("delay", step.delay).map_err(wrap)?,
                                op: key_op(step.key, step.hold_time, step.state).map_err(wrap)?,
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Action::Keyboard(KeyboardAction::Sequence(steps)))
                }
                _ => Err(ActionDecodeError::ExpectedKeyboardPayload),
            },
            SET_LAYER_TAG => Ok(Action::SetLayer(string_payload(SET_LAYER_TAG, raw.action)?)),
            ALIAS_TAG => Ok(Action::Alias(string_payload(ALIAS_TAG, raw.action)?)),
            MULTI_TAG => match raw.action {
                Value::Array(items) => Ok(Action::Multi(items.into_iter().map(Action::from).collect())),
                _ => Err(ActionDecodeError::ExpectedList { kind: MULTI_TAG }),
            },
            // "shell", "", absent, or anything unrecognised.
            _ => Ok(Action::Shell(string_payload(SHELL_TAG, raw.action)?)),
        }
    }
}

fn raw_key_op(op: KeyOp) -> (String, Option<f64>, Option<u8>) {
    match op {
        KeyOp::Press { key, hold } => (key, hold.map(|d| d.as_secs_f64()), None),
        KeyOp::Set { key, pressed } => (key, None, Some(u8::from(pressed))),
    }
}

impl From<Value> for Action {
    fn from(value: Value) -> Self {
        Action::decode(value.clone())
            .unwrap_or_else(|error| Action::Invalid(InvalidAction { raw: value, error }))
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Self {
        let tag = action.tag().map(str::to_string);
        let plain = |action: Value| RawAction {
            action_type: tag.clone(),
            action,
            hold_time: None,
            state: None,
        };
        let raw = match action {
            Action::Invalid(invalid) => return invalid.raw,
            Action::Shell(cmd) => plain(Value::String(cmd)),
            Action::SetLayer(layer) => plain(Value::String(layer)),
            Action::Alias(name) => plain(Value::String(name)),
            Action::Multi(actions) => {
                plain(Value::Array(actions.into_iter().map(Value::from).collect()))
            }
            Action::Keyboard(KeyboardAction::Single(op)) => {
                let (key, hold_time, state) = raw_key_op(op);
                RawAction {
                    action_type: tag.clone(),
                    action: Value::String(key),
                    hold_time,
                    state,
                }
            }
            Action::Keyboard(KeyboardAction::Sequence(steps)) => plain(Value::Array(
                steps
                    .into_iter()
                    .map(|step| {
                        let (key, hold_time, state) = raw_key_op(step.op);
                        let raw = RawKeyStep {
                            key,
                            hold_time,
                            state,
                            delay: step.delay.map(|d| d.as_secs_f64()),
                        };
                        serde_json::to_value(raw).unwrap_or(Value::Null)
                    })
                    .collect(),
            )),
        };
        serde_json::to_value(raw).unwrap_or(Value::Null)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

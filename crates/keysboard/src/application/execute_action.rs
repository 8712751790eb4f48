//! Action Executor: performs one resolved [`Action`].
//!
//! # Dispatch rules (for beginners)
//!
//! | Action     | Effect                                                         |
//! |------------|----------------------------------------------------------------|
//! | `Shell`    | start the command detached; never waited on                    |
//! | `Keyboard` | state set: emitted now; press/sequence: detached task          |
//! | `SetLayer` | report the target as the new current layer (if it exists)     |
//! | `Alias`    | run the device alias of that name, guarded against recursion  |
//! | `Multi`    | run each sub-action in order                                   |
//!
//! # Alias cycles
//!
//! Every key-down gets a fresh [`AliasGuard`].  Entering an alias adds its
//! name; an alias whose name is already in the guard is a recursive call and
//! is skipped with a warning, which is what stops `x → x` (or `x → y → x`)
//! from looping forever.
//!
//! A multi action removes an alias name from the guard once the sub-action
//! that added it has finished.  So `[Alias(x), Shell, Alias(x)]` runs `x`
//! twice, while an `x` whose own body calls `x` is still blocked, because the
//! blocked inner attempt never added the name and so never removes it.
//!
//! # Errors never escape
//!
//! Every failure is classified as a [`DispatchError`], logged with the device
//! short name, and swallowed.  One broken keybind cannot stop the session or
//! the remaining sub-actions of a multi action.

use std::{fmt, sync::Arc};

use keysboard_core::{Action, ActionDecodeError, AliasGuard, Layer, OrderedMap};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    application::emit_keys::{EmulationError, SyntheticEmitter},
    infrastructure::process::{CommandSpawner, SpawnError},
};

/// Why an action had no (or only partial) effect.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("layer [ {0} ] is not in the config")]
    UnknownLayer(String),
    #[error("alias \"{0}\" is undefined")]
    UndefinedAlias(String),
    #[error("alias \"{0}\" was recursively called, skipping")]
    AliasCycle(String),
    #[error("shell action failed to start: {0}")]
    ActionSpawnFailure(#[from] SpawnError),
    #[error("keyboard action failed: {0}")]
    Emulation(#[from] EmulationError),
    #[error("keybind could not be decoded, skipping: {0}")]
    InvalidAction(#[source] ActionDecodeError),
}

/// What the executor needs to know about the device that triggered an action.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    /// Nickname or shortened identifier, for log lines.
    pub device_name: &'a str,
    pub current_layer: &'a str,
    pub aliases: &'a OrderedMap<Action>,
    pub layers: &'a OrderedMap<Layer>,
    /// Log dispatched actions at `info` rather than `debug`.
    pub print_actions: bool,
}

/// Performs actions for one session.
pub struct ActionExecutor {
    spawner: Arc<dyn CommandSpawner>,
    emitter: SyntheticEmitter,
}

impl ActionExecutor {
    pub fn new(spawner: Arc<dyn CommandSpawner>, emitter: SyntheticEmitter) -> Self {
        Self { spawner, emitter }
    }

    /// Executes `action` and returns the layer it switched to, if any.
    ///
    /// When several layer switches happen in one action tree (through
    /// aliases or a multi action) the last one wins.
    pub fn execute(
        &self,
        action: &Action,
        ctx: &DispatchContext<'_>,
        guard: &mut AliasGuard,
    ) -> Option<String> {
        let mut next_layer = None;
        self.run(action, ctx, guard, &mut next_layer);
        next_layer
    }

    fn run(
        &self,
        action: &Action,
        ctx: &DispatchContext<'_>,
        guard: &mut AliasGuard,
        next_layer: &mut Option<String>,
    ) {
        if let Err(e) = self.perform(action, ctx, guard, next_layer) {
            let layer = next_layer.as_deref().unwrap_or(ctx.current_layer);
            match e {
                DispatchError::ActionSpawnFailure(_) | DispatchError::Emulation(_) => {
                    error!("[ {} ] on [ {layer} ]: {e}", ctx.device_name)
                }
                _ => warn!("[ {} ] on [ {layer} ]: {e}", ctx.device_name),
            }
        }
    }

    fn perform(
        &self,
        action: &Action,
        ctx: &DispatchContext<'_>,
        guard: &mut AliasGuard,
        next_layer: &mut Option<String>,
    ) -> Result<(), DispatchError> {
        match action {
            Action::Invalid(invalid) => {
                return Err(DispatchError::InvalidAction(invalid.error.clone()));
            }
            Action::Shell(command) => {
                announce(ctx, format_args!("shell: {command}"));
                self.spawner.spawn_detached(command)?;
            }
            Action::Keyboard(keys) => {
                announce(ctx, format_args!("keyboard: {keys:?}"));
                self.emitter.dispatch(keys)?;
            }
            Action::SetLayer(target) => {
                if !ctx.layers.contains_key(target) {
                    return Err(DispatchError::UnknownLayer(target.clone()));
                }
                let from = next_layer.as_deref().unwrap_or(ctx.current_layer);
                info!("[ {} ] layer [ {from} ] -> [ {target} ]", ctx.device_name);
                *next_layer = Some(target.clone());
            }
            Action::Alias(name) => {
                let aliased = ctx
                    .aliases
                    .get(name)
                    .ok_or_else(|| DispatchError::UndefinedAlias(name.clone()))?;
                if !guard.enter(name) {
                    return Err(DispatchError::AliasCycle(name.clone()));
                }
                announce(ctx, format_args!("alias: {name}"));
                self.run(aliased, ctx, guard, next_layer);
            }
            Action::Multi(actions) => {
                announce(ctx, format_args!("multi: {} actions", actions.len()));
                for sub in actions {
                    let entered = match sub {
                        Action::Alias(name) if !guard.contains(name) => Some(name),
                        _ => None,
                    };
                    self.run(sub, ctx, guard, next_layer);
                    if let Some(name) = entered {
                        guard.release(name);
                    }
                }
            }
        }
        Ok(())
    }
}

fn announce(ctx: &DispatchContext<'_>, what: fmt::Arguments<'_>) {
    if ctx.print_actions {
        info!("[ {} ] {what}", ctx.device_name);
    } else {
        debug!("[ {} ] {what}", ctx.device_name);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use keysboard_core::{KeyOp, KeyboardAction};
    use mockall::predicate::eq;
    use tokio::runtime::Runtime;

    use super::*;
    use crate::infrastructure::{
        input_emulation::mock::RecordingKeyboard,
        process::{mock::RecordingSpawner, MockCommandSpawner},
    };

    // ── Fixture ───────────────────────────────────────────────────────────────

    struct Fixture {
        runtime: Runtime,
        spawner: Arc<RecordingSpawner>,
        keyboard: Arc<RecordingKeyboard>,
        aliases: OrderedMap<Action>,
        layers: OrderedMap<Layer>,
    }

    impl Fixture {
        fn new() -> Self {
            let layers = ["main", "alt"]
                .into_iter()
                .map(|name| (name, Layer::default()))
                .collect();
            Self {
                runtime: Runtime::new().unwrap(),
                spawner: Arc::new(RecordingSpawner::new()),
                keyboard: Arc::new(RecordingKeyboard::new()),
                aliases: OrderedMap::new(),
                layers,
            }
        }

        fn alias(mut self, name: &str, action: Action) -> Self {
            self.aliases.insert(name, action);
            self
        }

        fn executor(&self) -> ActionExecutor {
            executor_with(self.spawner.clone(), self)
        }

        fn ctx(&self) -> DispatchContext<'_> {
            DispatchContext {
                device_name: "pad",
                current_layer: "main",
                aliases: &self.aliases,
                layers: &self.layers,
                print_actions: true,
            }
        }

        /// Runs `action` with a fresh guard; returns the layer switch and the
        /// guard afterwards.
        fn execute(&self, action: &Action) -> (Option<String>, AliasGuard) {
            let mut guard = AliasGuard::new();
            let next = self.executor().execute(action, &self.ctx(), &mut guard);
            (next, guard)
        }
    }

    fn executor_with(spawner: Arc<dyn CommandSpawner>, fixture: &Fixture) -> ActionExecutor {
        let emitter = SyntheticEmitter::new(
            fixture.keyboard.clone(),
            fixture.runtime.handle().clone(),
            Duration::from_millis(1),
            "pad",
        );
        ActionExecutor::new(spawner, emitter)
    }

    fn shell(command: &str) -> Action {
        Action::Shell(command.into())
    }

    fn alias(name: &str) -> Action {
        Action::Alias(name.into())
    }

    // ── Shell ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_shell_spawns_command() {
        let fixture = Fixture::new();

        let (next, _) = fixture.execute(&shell("echo hi"));

        assert_eq!(next, None);
        assert_eq!(fixture.spawner.commands(), vec!["echo hi"]);
    }

    #[test]
    fn test_spawn_failure_is_swallowed_and_multi_continues() {
        // Arrange
        let fixture = Fixture::new();
        let failing = Arc::new(RecordingSpawner::failing());
        let executor = executor_with(failing.clone(), &fixture);
        let action = Action::Multi(vec![shell("a"), Action::SetLayer("alt".into())]);

        // Act
        let next = executor.execute(&action, &fixture.ctx(), &mut AliasGuard::new());

        // Assert
        assert_eq!(failing.commands(), vec!["a"]);
        assert_eq!(next.as_deref(), Some("alt"));
    }

    #[test]
    fn test_mockall_spawner_receives_each_multi_command_in_order() {
        // Arrange
        let fixture = Fixture::new();
        let mut spawner = MockCommandSpawner::new();
        let mut seq = mockall::Sequence::new();
        for command in ["echo 1", "echo 2"] {
            spawner
                .expect_spawn_detached()
                .with(eq(command))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }
        let executor = executor_with(Arc::new(spawner), &fixture);

        // Act / Assert: expectations are checked when the mock drops
        executor.execute(
            &Action::Multi(vec![shell("echo 1"), shell("echo 2")]),
            &fixture.ctx(),
            &mut AliasGuard::new(),
        );
    }

    // ── Keyboard ──────────────────────────────────────────────────────────────

    #[test]
    fn test_keyboard_state_set_is_emitted_synchronously() {
        let fixture = Fixture::new();

        fixture.execute(&Action::Keyboard(KeyboardAction::Single(KeyOp::Set {
            key: "KEY_A".into(),
            pressed: true,
        })));

        assert_eq!(fixture.keyboard.events(), vec![("KEY_A".to_string(), true)]);
    }

    #[test]
    fn test_keyboard_press_runs_in_background() {
        let fixture = Fixture::new();

        fixture.execute(&Action::Keyboard(KeyboardAction::Single(KeyOp::Press {
            key: "KEY_A".into(),
            hold: Some(Duration::from_millis(5)),
        })));
        std::thread::sleep(Duration::from_millis(300));

        assert_eq!(
            fixture.keyboard.events(),
            vec![("KEY_A".to_string(), true), ("KEY_A".to_string(), false)]
        );
    }

    // ── SetLayer ──────────────────────────────────────────────────────────────

    #[test]
    fn test_set_layer_to_present_layer_returns_it() {
        let fixture = Fixture::new();

        let (next, _) = fixture.execute(&Action::SetLayer("alt".into()));

        assert_eq!(next.as_deref(), Some("alt"));
    }

    #[test]
    fn test_set_layer_to_absent_layer_leaves_layer_unchanged() {
        let fixture = Fixture::new();

        let (next, _) = fixture.execute(&Action::SetLayer("nope".into()));

        assert_eq!(next, None);
    }

    #[test]
    fn test_last_set_layer_in_multi_wins() {
        let fixture = Fixture::new();
        let action = Action::Multi(vec![
            Action::SetLayer("alt".into()),
            Action::SetLayer("nope".into()),
            Action::SetLayer("main".into()),
        ]);

        let (next, _) = fixture.execute(&action);

        assert_eq!(next.as_deref(), Some("main"));
    }

    #[test]
    fn test_set_layer_propagates_through_alias() {
        let fixture = Fixture::new().alias("to_alt", Action::SetLayer("alt".into()));

        let (next, _) = fixture.execute(&alias("to_alt"));

        assert_eq!(next.as_deref(), Some("alt"));
    }

    // ── Alias ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_undefined_alias_is_a_noop() {
        let fixture = Fixture::new();

        let (next, guard) = fixture.execute(&alias("ghost"));

        assert_eq!(next, None);
        assert!(guard.is_empty());
        assert!(fixture.spawner.commands().is_empty());
    }

    #[test]
    fn test_alias_runs_its_action_and_stays_in_guard() {
        let fixture = Fixture::new().alias("greet", shell("echo hello"));

        let (_, guard) = fixture.execute(&alias("greet"));

        assert_eq!(fixture.spawner.commands(), vec!["echo hello"]);
        assert_eq!(guard.active(), ["greet".to_string()]);
    }

    #[test]
    fn test_self_referencing_alias_terminates() {
        // Arrange: x → x
        let fixture = Fixture::new().alias("x", alias("x"));

        // Act
        let (next, guard) = fixture.execute(&alias("x"));

        // Assert
        assert_eq!(next, None);
        assert_eq!(guard.active(), ["x".to_string()]);
    }

    #[test]
    fn test_mutually_recursive_aliases_terminate() {
        let fixture = Fixture::new()
            .alias("x", Action::Multi(vec![shell("in x"), alias("y")]))
            .alias("y", Action::Multi(vec![shell("in y"), alias("x")]));

        fixture.execute(&alias("x"));

        assert_eq!(fixture.spawner.commands(), vec!["in x", "in y"]);
    }

    #[test]
    fn test_multi_runs_same_alias_twice() {
        // Arrange: [Alias(x), Shell("echo 1"), Alias(x)]
        let fixture = Fixture::new().alias("x", shell("echo x"));
        let action = Action::Multi(vec![alias("x"), shell("echo 1"), alias("x")]);

        // Act
        let (_, guard) = fixture.execute(&action);

        // Assert
        assert_eq!(fixture.spawner.commands(), vec!["echo x", "echo 1", "echo x"]);
        assert!(guard.is_empty());
    }

    #[test]
    fn test_alias_whose_multi_body_calls_itself_is_blocked() {
        // Arrange: x → [Shell("a"), Alias(x), Alias(x), Shell("b")]
        let fixture = Fixture::new().alias(
            "x",
            Action::Multi(vec![shell("a"), alias("x"), alias("x"), shell("b")]),
        );

        // Act
        let (_, guard) = fixture.execute(&alias("x"));

        // Assert: both recursive attempts are skipped, the body still finishes
        assert_eq!(fixture.spawner.commands(), vec!["a", "b"]);
        assert_eq!(guard.active(), ["x".to_string()]);
    }

    // ── Malformed entries ─────────────────────────────────────────────────────

    #[test]
    fn test_malformed_entry_is_skipped_and_multi_continues() {
        // Arrange: the middle entry is a shell action without a command
        let fixture = Fixture::new();
        let broken = Action::from(serde_json::json!({ "action_type": "shell" }));
        let action = Action::Multi(vec![shell("before"), broken, shell("after")]);

        // Act
        let (next, guard) = fixture.execute(&action);

        // Assert
        assert_eq!(next, None);
        assert_eq!(fixture.spawner.commands(), vec!["before", "after"]);
        assert!(guard.is_empty());
    }

    #[test]
    fn test_malformed_alias_body_is_skipped() {
        let fixture = Fixture::new().alias(
            "x",
            Action::from(serde_json::json!({ "action_type": "keyboard", "action": 5 })),
        );

        fixture.execute(&alias("x"));

        assert!(fixture.spawner.commands().is_empty());
        assert!(fixture.keyboard.events().is_empty());
    }
}

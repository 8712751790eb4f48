//! keysboard entry point.
//!
//! Parses the command line, sets up logging, and either runs the remapping
//! engine or performs one management command on the config file.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  ├─ run (default)
//!  │   └─ Supervisor::run_all()        -- one OS thread per device
//!  │        └─ DeviceSession::run()    -- grab, read, dispatch, ungrab
//!  │   └─ wait for all sessions, or Ctrl-C
//!  ├─ add-device / add-layer / add-keybind
//!  │   └─ manage_config::*             -- read-modify-write the JSON file
//!  └─ list
//! ```
//!
//! # Why a hand-built runtime? (for beginners)
//!
//! Shell actions are reaped, and timed key presses run, on a tokio runtime.
//! Dropping a runtime normally waits for its blocking tasks, which would make
//! keysboard hang on exit until every command it started has finished.
//! Building the runtime by hand lets `main` call `shutdown_background()`
//! instead, so Ctrl-C exits at once and started commands keep running.

use std::{ffi::OsString, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use keysboard::{
    application::{
        emit_keys::VirtualKeyboardOpener,
        manage_config::{self, Change},
        run_session::{Engine, StopReason},
        supervise::{join_all, Supervisor},
    },
    infrastructure::{
        input_device::DeviceOpener,
        process::ShellSpawner,
        storage::{config::resolve_config_path, JsonConfigStore},
    },
};
use keysboard_core::{keycode::UNIVERSAL_EXIT_KEY, settings::DEFAULT_HOLD_TIME, EngineSettings};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Per-device keyboard remapper.
///
/// Grabs each configured input device and turns its key presses into shell
/// commands, synthetic keys, layer switches, and aliases.
#[derive(Debug, Parser)]
#[command(name = "keysboard", version)]
struct Cli {
    /// Configuration file (`~/` is expanded).
    ///
    /// Defaults to `$XDG_CONFIG_HOME/keysboard/keysboard-conf.json`.
    #[arg(long, global = true, value_name = "PATH", env = "KEYSBOARD_CONFIG")]
    config: Option<String>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log pressed keys at debug instead of info (per-device
    /// `print_key_codes` still wins).
    #[arg(long, global = true)]
    quiet_keys: bool,

    /// Log dispatched actions at debug instead of info (per-device
    /// `print_actions` still wins).
    #[arg(long, global = true)]
    quiet_actions: bool,

    /// Do not treat KEY_ESC as an exit key on every device.
    #[arg(long, global = true)]
    no_universal_exit: bool,

    /// Hold time in milliseconds for key presses without `hold_time`.
    #[arg(long, global = true, value_name = "MS", default_value_t = DEFAULT_HOLD_TIME.as_millis() as u64)]
    hold_ms: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every configured device (the default).
    Run,
    /// Add a device with a starter layer.
    AddDevice { device: String },
    /// Add a layer to a device, creating the device if needed.
    AddLayer { device: String, layer: String },
    /// Bind a key on a layer, creating the device and layer if needed.
    ///
    /// ACTION_TYPE is one of shell, keyboard, set_layer, alias, multi.
    AddKeybind {
        device: String,
        layer: String,
        key: String,
        action_type: String,
        action: String,
    },
    /// List configured devices and their layers.
    List,
}

impl Cli {
    fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            print_key_codes: !self.quiet_keys,
            print_actions: !self.quiet_actions,
            universal_exit_key: (!self.no_universal_exit).then(|| UNIVERSAL_EXIT_KEY.to_string()),
            default_hold_time: Duration::from_millis(self.hold_ms),
            ..EngineSettings::default()
        }
    }
}

/// Rewrites the legacy `config=<path>` argument into `--config <path>`.
fn expand_legacy_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut out = Vec::new();
    for arg in args {
        match arg.to_str().and_then(|a| a.strip_prefix("config=")) {
            Some(path) => {
                out.push(OsString::from("--config"));
                out.push(OsString::from(path));
            }
            None => out.push(arg),
        }
    }
    out
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(expand_legacy_args(std::env::args_os()));

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let path = resolve_config_path(cli.config.as_deref())?;
    let store = JsonConfigStore::new(path);
    let settings = cli.engine_settings();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(store, settings),
        Command::AddDevice { device } => {
            report(manage_config::add_device(&store, &device)?, &store);
            Ok(())
        }
        Command::AddLayer { device, layer } => {
            report(manage_config::add_layer(&store, &device, &layer)?, &store);
            Ok(())
        }
        Command::AddKeybind {
            device,
            layer,
            key,
            action_type,
            action,
        } => {
            let change =
                manage_config::add_keybind(&store, &device, &layer, &key, &action_type, &action)?;
            report(change, &store);
            Ok(())
        }
        Command::List => {
            for row in manage_config::list_devices(&store, &settings)? {
                println!("{}  ({})  layers: {}", row.device_id, row.name, row.layers.join(", "));
            }
            Ok(())
        }
    }
}

fn report(change: Change, store: &JsonConfigStore) {
    match change {
        Change::Added => info!("updated {}", store.path().display()),
        Change::AlreadyPresent => info!("already present, {} unchanged", store.path().display()),
    }
}

/// Runs every configured device until all sessions stop or Ctrl-C.
fn run(store: JsonConfigStore, settings: EngineSettings) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("keysboard-worker")
        .build()
        .context("failed to start the tokio runtime")?;

    let (devices, keyboards) = platform_openers()?;
    let engine = Engine {
        config: Arc::new(store.clone()),
        devices,
        keyboards,
        spawner: Arc::new(ShellSpawner::new(runtime.handle().clone())),
        runtime: runtime.handle().clone(),
        settings,
    };

    info!("keysboard starting with {}", store.path().display());
    let handles = Supervisor::new(engine)
        .run_all()
        .with_context(|| format!("nothing to run from {}", store.path().display()))?;

    runtime.block_on(async move {
        let sessions = tokio::task::spawn_blocking(move || join_all(handles));
        tokio::select! {
            reports = sessions => match reports {
                Ok(reports) => {
                    let exited = reports
                        .iter()
                        .filter(|r| matches!(r.stop_reason, StopReason::ExitRequested))
                        .count();
                    info!("all sessions stopped ({exited} by exit key)");
                }
                Err(e) => error!("session watcher failed: {e}"),
            },
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => info!("received Ctrl-C, exiting"),
                Err(e) => error!("failed to listen for Ctrl-C: {e}"),
            },
        }
    });

    runtime.shutdown_background();
    Ok(())
}

#[cfg(target_os = "linux")]
fn platform_openers() -> anyhow::Result<(Arc<dyn DeviceOpener>, Arc<dyn VirtualKeyboardOpener>)> {
    use keysboard::infrastructure::{
        input_device::linux::EvdevOpener, input_emulation::linux::UinputOpener,
    };
    Ok((Arc::new(EvdevOpener), Arc::new(UinputOpener)))
}

#[cfg(not(target_os = "linux"))]
fn platform_openers() -> anyhow::Result<(Arc<dyn DeviceOpener>, Arc<dyn VirtualKeyboardOpener>)> {
    anyhow::bail!("keysboard needs Linux evdev and uinput")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_legacy_config_argument_is_rewritten() {
        let out = expand_legacy_args(args(&["keysboard", "add-device", "pad", "config=~/k.json"]));

        assert_eq!(
            out,
            args(&["keysboard", "add-device", "pad", "--config", "~/k.json"])
        );
    }

    #[test]
    fn test_cli_defaults_to_run_with_default_settings() {
        let cli = Cli::parse_from(["keysboard"]);

        assert!(cli.command.is_none());
        assert_eq!(cli.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_cli_flags_map_to_settings() {
        let cli = Cli::parse_from([
            "keysboard",
            "--quiet-keys",
            "--no-universal-exit",
            "--hold-ms",
            "50",
            "list",
        ]);

        let settings = cli.engine_settings();

        assert!(!settings.print_key_codes);
        assert!(settings.print_actions);
        assert_eq!(settings.universal_exit_key, None);
        assert_eq!(settings.default_hold_time, Duration::from_millis(50));
        assert!(matches!(cli.command, Some(Command::List)));
    }

    #[test]
    fn test_engine_flags_are_accepted_after_the_subcommand() {
        // Arrange
        let cli = Cli::parse_from([
            "keysboard",
            "run",
            "--quiet-keys",
            "--quiet-actions",
            "--no-universal-exit",
            "--hold-ms",
            "50",
        ]);

        // Act
        let settings = cli.engine_settings();

        // Assert
        assert!(matches!(cli.command, Some(Command::Run)));
        assert!(!settings.print_key_codes);
        assert!(!settings.print_actions);
        assert_eq!(settings.universal_exit_key, None);
        assert_eq!(settings.default_hold_time, Duration::from_millis(50));
    }

    #[test]
    fn test_add_keybind_takes_five_positionals() {
        let cli = Cli::parse_from([
            "keysboard",
            "add-keybind",
            "pad",
            "main",
            "KEY_3",
            "shell",
            "echo three",
        ]);

        match cli.command {
            Some(Command::AddKeybind { key, action, .. }) => {
                assert_eq!(key, "KEY_3");
                assert_eq!(action, "echo three");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

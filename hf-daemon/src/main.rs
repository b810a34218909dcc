//! hyperfand - the hyperfan control daemon.
//!
//! Resolves configuration, scans the hwmon tree, and spawns the two long-lived scheduling
//! domains described for this daemon: the tick task (owns the engine, the inventory, and
//! every sysfs write) and the accept task (owns the JSON-RPC listening socket). Detection and
//! import each get their own short-lived job context, spawned on demand by RPC handlers
//! through `DaemonState`'s job managers.
//!
//! A `SIGINT`/`SIGTERM` triggers an orderly shutdown: the engine is disabled (restoring every
//! PWM's captured enable mode) before the process exits, whether the signal arrived or a
//! client called `daemon.shutdown`/`daemon.restart` over RPC.

mod detect_job;
mod import_job;
mod registry;
mod server;
mod state;
mod telemetry;
mod tick;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{error, info, warn};

use state::DaemonState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("hyperfand {VERSION} - hyperfan control daemon");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    hyperfand [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Configuration file (default: resolved per §6)");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    HYPERFAND_CONFIG    Configuration file path");
    eprintln!("    HYPERFAN_LOG        Log level (trace, debug, info, warn, error)");
}

fn print_version() {
    println!("hyperfand {VERSION}");
}

fn parse_args() -> Result<Option<PathBuf>, ()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_flag: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Err(());
            }
            "-v" | "--version" => {
                print_version();
                return Err(());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_flag = Some(PathBuf::from(&args[i]));
            }
            other => {
                eprintln!("unknown argument: {other}");
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    Ok(config_flag)
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = std::env::var("HYPERFAN_LOG").unwrap_or_else(|_| default_level.to_string());

    let use_journald = std::path::Path::new("/run/systemd/journal/socket").exists();
    if use_journald {
        match tracing_journald::layer() {
            Ok(layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(layer)
                    .with(tracing_subscriber::EnvFilter::new(&filter))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("failed to open journald socket: {e}, falling back to stdout");
            }
        }
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

/// Drop the dangerous handful of environment variables that could redirect dynamic linking
/// or locale-dependent parsing underneath a privileged process, and pin a predictable locale.
fn sanitize_environment() {
    const DANGEROUS_VARS: &[&str] = &[
        "LD_PRELOAD",
        "LD_LIBRARY_PATH",
        "LD_AUDIT",
        "LD_DEBUG",
        "LD_PROFILE",
        "MALLOC_CHECK_",
        "HOSTALIASES",
        "LOCALDOMAIN",
        "RES_OPTIONS",
    ];
    for var in DANGEROUS_VARS {
        std::env::remove_var(var);
    }
    std::env::set_var("LC_ALL", "C");
    std::env::set_var("LANG", "C");
}

fn set_secure_umask() {
    // SAFETY: umask takes no pointers and always succeeds.
    unsafe { libc::umask(0o027) };
}

fn write_pid_file(path: &std::path::Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(error = %e, path = %parent.display(), "could not create pidfile directory");
            return;
        }
    }
    if let Err(e) = std::fs::write(path, format!("{}\n", std::process::id())) {
        warn!(error = %e, path = %path.display(), "could not write pidfile");
    }
}

fn remove_pid_file(path: &std::path::Path) {
    let _ = std::fs::remove_file(path);
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    sanitize_environment();
    set_secure_umask();

    let config_flag = match parse_args() {
        Ok(flag) => flag,
        Err(()) => return,
    };

    let config_path = hf_core::resolve_config_path(config_flag.as_ref().and_then(|p| p.to_str()));
    let config = match hf_core::load_config(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            // Logging isn't initialized yet; a config parse failure at startup is fatal
            // and there's no subsystem to report it through but stderr.
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(config.debug);
    info!(version = VERSION, "starting hyperfand");
    if let Some(path) = &config_path {
        info!(path = %path.display(), "loaded configuration");
    } else {
        info!("no configuration file found, using built-in defaults");
    }

    let pidfile = PathBuf::from(hf_core::expand_path(&config.pidfile));
    write_pid_file(&pidfile);

    let host = config.host.clone();
    let port = config.port;
    let state: Arc<DaemonState> = Arc::new(DaemonState::new(config, config_path));

    // `ctrlc`'s "termination" feature additionally traps SIGTERM and SIGHUP on Unix, so
    // `systemctl stop`/`kill <pid>` run the same restoration path as Ctrl-C.
    let shutdown_state = state.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        shutdown_state.shutdown.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install signal handler");
    }

    let tick_state = state.clone();
    let tick_handle = tokio::spawn(async move { tick::run(tick_state).await });

    let server_state = state.clone();
    let server_handle = tokio::spawn(async move { server::run(server_state, host, port).await });

    // `server::run` and the tick task both poll `state.shutdown` on their own clock and
    // return once it's set, so simply awaiting the accept task here blocks until whichever
    // of a signal, `daemon.shutdown`, or a bind failure happened first.
    let exit_code = match server_handle.await {
        Ok(Ok(())) => hf_core::constants::daemon::CLEAN_EXIT_CODE as i32,
        Ok(Err(e)) => {
            error!(error = %e, "RPC transport failed");
            hf_core::constants::daemon::STARTUP_FAILURE_EXIT_CODE as i32
        }
        Err(e) => {
            error!(error = %e, "RPC transport task panicked");
            hf_core::constants::daemon::STARTUP_FAILURE_EXIT_CODE as i32
        }
    };

    state.shutdown.store(true, Ordering::SeqCst);
    // Disable the engine one last time so every captured PWM enable mode is restored before
    // the process exits, whether shutdown came from a signal or an RPC call.
    state.engine.lock().enable(false);

    let _ = tick_handle.await;
    remove_pid_file(&pidfile);

    let restart = state.restart_requested.load(Ordering::SeqCst);
    info!(restart, "hyperfand exiting");
    if restart {
        std::process::exit(hf_core::constants::daemon::RESTART_EXIT_CODE as i32);
    }
    std::process::exit(exit_code);
}

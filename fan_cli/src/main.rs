mod cli;
mod error_fmt;
mod record;
mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use fan_core::FanError;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{EXIT_CANCELLED, EXIT_ERROR, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }

    match real_main(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            std::process::exit(EXIT_ERROR);
        }
    }
}

fn real_main(cli: Cli) -> eyre::Result<i32> {
    let cfg = load_config(cli.config.as_deref())?;
    init_logging(&cli, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let flag = cancel.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    match &cli.cmd {
        Commands::Run { output } => {
            let summary = run::cmd_run(&cfg, output.as_ref(), cancel, cli.json)?;
            Ok(if summary.cancelled { EXIT_CANCELLED } else { 0 })
        }
        Commands::Interactive { output } => {
            let cancelled = run::cmd_interactive(&cfg, output.as_ref(), cancel, cli.json)?;
            Ok(if cancelled { EXIT_CANCELLED } else { 0 })
        }
        Commands::SelfCheck { duty, seconds } => {
            match run::cmd_self_check(&cfg, *duty, *seconds, &cancel, cli.json)? {
                Some(_) => Ok(0),
                None => {
                    eprintln!("self-check cancelled");
                    Ok(EXIT_CANCELLED)
                }
            }
        }
    }
}

/// Load and validate the config file, or validate the built-in defaults.
fn load_config(path: Option<&std::path::Path>) -> eyre::Result<fan_config::Config> {
    let loaded = match path {
        Some(path) => fan_config::load_file(path),
        None => {
            let cfg = fan_config::Config::default();
            cfg.validate().map(|()| cfg)
        }
    };
    loaded
        .map_err(|e| eyre::Report::new(FanError::Config(format!("{e:#}"))))
        .wrap_err_with(|| match path {
            Some(p) => format!("load config {p:?}"),
            None => "validate default config".to_string(),
        })
}

/// Console output on stderr (pretty or JSON) plus an optional JSON-lines file.
///
/// Console level: `RUST_LOG` if set, else `--log-level`. File level:
/// `[logging].level`, else the console level.
fn init_logging(cli: &Cli, logging: &fan_config::Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .wrap_err_with(|| format!("invalid log level {:?}", cli.log_level))?;

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                "never" => tracing_appender::rolling::never(dir, name),
                other => eyre::bail!("logging.rotation must be never, daily or hourly (got {other:?})"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let level = logging.level.as_deref().unwrap_or(&cli.log_level);
            let file_filter = EnvFilter::try_new(level)
                .wrap_err_with(|| format!("invalid logging.level {level:?}"))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

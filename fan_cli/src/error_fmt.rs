//! Human-readable error descriptions and structured JSON error formatting.

use fan_core::{FanError, PlanError};

/// Exit status for a run stopped by the operator.
pub const EXIT_CANCELLED: i32 = 2;
/// Exit status for any error.
pub const EXIT_ERROR: i32 = 1;

fn find<T: std::error::Error + 'static>(err: &eyre::Report) -> Option<&T> {
    err.chain().find_map(|e| e.downcast_ref::<T>())
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(pe) = find::<PlanError>(err) {
        return format!(
            "What happened: The test plan is invalid ({pe}).\nLikely causes: A [[phase]] entry is missing or out of range.\nHow to fix: Give 1 to 10 phases with duration_min 1..=60000, duty_pct 0..=95 and repetitions 1..=1000."
        );
    }

    if let Some(fe) = find::<FanError>(err) {
        return match fe {
            FanError::HardwareFault(msg) => format!(
                "What happened: GPIO hardware failed ({msg}).\nLikely causes: Wrong tach/PWM line numbers, PWM overlay not enabled, or insufficient GPIO permissions.\nHow to fix: Check [pins] in the config (PWM must be on GPIO 12, 13, 18 or 19) and run with access to /dev/gpiomem."
            ),
            FanError::Hardware(msg) => format!(
                "What happened: Could not use the fan hardware ({msg}).\nLikely causes: The GPIO backend is unavailable or already in use.\nHow to fix: Make sure no other process holds the tach line, then retry."
            ),
            FanError::Config(msg) => config_message(msg),
            FanError::Plan(pe) => format!("What happened: The test plan is invalid ({pe})."),
            FanError::Record(msg) => format!(
                "What happened: Results could not be written ({msg}).\nLikely causes: Output directory missing, read-only, or disk full.\nHow to fix: Check [output].dir or pass --output DIR."
            ),
        };
    }

    let msg = format!("{err:#}");
    format!(
        "Something went wrong.\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Config failures: unreadable file versus bad contents.
fn config_message(msg: &str) -> String {
    if msg.contains("read config") {
        format!(
            "What happened: The config file could not be read.\nHow to fix: Check the --config path. Original: {msg}"
        )
    } else {
        format!(
            "What happened: Configuration is invalid.\nLikely causes: A TOML syntax error or an out-of-range value.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        )
    }
}

/// Stable machine name for the error kind.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if find::<PlanError>(err).is_some() {
        return "Plan";
    }
    match find::<FanError>(err) {
        Some(FanError::Hardware(_)) => "Hardware",
        Some(FanError::HardwareFault(_)) => "HardwareFault",
        Some(FanError::Config(_)) => "Config",
        Some(FanError::Plan(_)) => "Plan",
        Some(FanError::Record(_)) => "Record",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

//! Tracing setup shared by the service and trainer binaries.

use std::env;

use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install the process-wide subscriber for `airsense` and `airsense-train`.
///
/// Level comes from `RUST_LOG` when set, otherwise `AIRSENSE_LOG_LEVEL`
/// (default `debug`) with SQL statement logging held at `warn` and the MQTT
/// client's connection chatter at `info`. `AIRSENSE_SPAN_EVENTS` selects
/// `full` or `enter_exit` span events (close only by default). ANSI colour
/// follows `FORCE_COLOR` when it is set, the TTY otherwise.
///
/// Call once, first thing in `main`; a second call panics.
pub fn init_tracing() {
    // ---
    let span_events = match env::var("AIRSENSE_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1" | "true" | "yes") => true,
        Ok("0" | "false" | "no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_directives(env::var("AIRSENSE_LOG_LEVEL").ok().as_deref()))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

/// Filter directives used when `RUST_LOG` is unset.
fn default_directives(level: Option<&str>) -> String {
    // ---
    let level = match level {
        Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => level,
        _ => "debug",
    };
    format!("{level},sqlx::query=warn,rumqttc=info")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_default_directives() {
        // ---
        assert_eq!(default_directives(Some("info")), "info,sqlx::query=warn,rumqttc=info");
        assert_eq!(default_directives(Some("verbose")), "debug,sqlx::query=warn,rumqttc=info");
        assert_eq!(default_directives(None), "debug,sqlx::query=warn,rumqttc=info");
    }
}

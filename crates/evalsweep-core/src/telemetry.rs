//! Tracing setup for the evalsweep binary.
//!
//! Logs go to stderr so the ranking table and `plan` output on stdout stay
//! clean. Without `RUST_LOG`, the evalsweep crates log at the requested
//! level and everything else (tokio, walkdir) only at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const SWEEP_TARGETS: [&str; 3] = ["evalsweep_core", "evalsweep_runner", "evalsweep_cli"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in SWEEP_TARGETS {
        directives.push_str(&format!(",{}={}", target, level));
    }
    directives
}

/// Install the global subscriber. Only the first call in a process wins.
///
/// * `json` - newline-delimited JSON lines carrying the current sweep span.
/// * `level` - verbosity of the evalsweep crates when `RUST_LOG` is unset.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_sweep_crates() {
        let directives = default_directives(Level::DEBUG);
        assert_eq!(
            directives,
            "warn,evalsweep_core=debug,evalsweep_runner=debug,evalsweep_cli=debug"
        );
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
        tracing::info!("still logging");
    }
}

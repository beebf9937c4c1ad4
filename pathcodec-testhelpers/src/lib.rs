#![warn(missing_docs)]
#![forbid(unsafe_code)]
//! Test setup shared by the pathcodec crates.
//!
//! Call [`setup`] at the top of every integration test. Log output is
//! filtered by the `PATHCODEC_LOG` environment variable, which takes
//! `tracing-subscriber` target syntax (`pathcodec=debug,pathcodec_json=trace`).

use std::sync::LazyLock;
use std::time::Instant;

use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "PATHCODEC_LOG";

static STARTED: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Seconds since the first test in the process called [`setup`].
struct SinceStart;

impl FormatTime for SinceStart {
    fn format_time(&self, w: &mut Writer<'_>) -> core::fmt::Result {
        let elapsed = STARTED.elapsed();
        write!(w, "{:3}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis())
    }
}

/// Frames that only ever show the test harness or panic plumbing.
fn is_harness_frame(name: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "test::run_test",
        "test::__rust_begin_short_backtrace",
        "std::panicking::",
        "std::panic::",
        "core::panicking::",
        "std::sys::backtrace::",
        "core::ops::function::FnOnce::call_once",
    ];
    PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// The filter configured through [`LOG_ENV`]; everything at TRACE when unset
/// or unparsable.
pub fn log_filter() -> Targets {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|spec| spec.parse::<Targets>().ok())
        .unwrap_or_else(|| Targets::new().with_default(tracing::Level::TRACE))
}

static INIT: LazyLock<()> = LazyLock::new(|| {
    let _ = *STARTED;

    color_backtrace::BacktracePrinter::new()
        .verbosity(color_backtrace::Verbosity::Full)
        .add_frame_filter(Box::new(|frames| {
            frames.retain(|frame| frame.name.as_deref().is_none_or(|name| !is_harness_frame(name)))
        }))
        .install(Box::new(termcolor::StandardStream::stderr(
            termcolor::ColorChoice::Auto,
        )));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(SinceStart)
                .with_target(true)
                .with_line_number(true)
                .with_test_writer()
                .compact(),
        )
        .with(log_filter())
        .try_init()
        .ok();
});

/// Install the tracing subscriber and panic printer, once per process.
pub fn setup() {
    #[allow(clippy::let_unit_value)]
    let _ = *INIT;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_frames_are_recognized() {
        assert!(is_harness_frame("std::panicking::begin_panic"));
        assert!(!is_harness_frame("pathcodec::trie::PathTrie::register"));
    }

    #[test]
    fn setup_is_idempotent() {
        setup();
        setup();
        tracing::debug!("subscriber installed");
    }
}

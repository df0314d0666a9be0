use std::io::{self, IsTerminal};
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Crate target prefix used to filter only library-originated logs.
pub const TARGET_PREFIX: &str = "ai_llm_service";

/// RFC3339 UTC timer implemented via `chrono`.
/// Example output: `2025-09-12T10:20:30Z`
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let s = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Build a formatting layer that renders ONLY events whose target starts with
/// one of `prefixes`.
///
/// - RFC3339 UTC timestamps
/// - Compact single-line format with `file:line`
/// - Span close events (duration of instrumented provider calls)
/// - ANSI colors only when stdout is a terminal
///
/// The filter is per-layer, so it does **not** affect other layers of the
/// global subscriber.
pub fn layer_for<S>(prefixes: &'static [&'static str]) -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stdout().is_terminal();
    let only_ours =
        filter::filter_fn(move |meta| prefixes.iter().any(|p| meta.target().starts_with(p)));

    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(only_ours)
}

/// [`layer_for`] restricted to this crate.
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    layer_for(&[TARGET_PREFIX])
}

/// Level directive for one target, e.g. `rag_store=debug`.
pub fn level_directive(target: &str, level: Level) -> Option<Directive> {
    Directive::from_str(&format!("{target}={}", level.as_str().to_lowercase())).ok()
}

/// EnvFilter from `RUST_LOG` (or `default`), plus `level` for each of `targets`.
///
/// With `default = "warn"` and `level = Level::INFO`, third-party crates log at
/// WARN while the listed targets log at INFO.
pub fn env_filter_with_level(default: &str, targets: &[&str], level: Level) -> EnvFilter {
    let mut base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    for t in targets {
        if let Some(d) = level_directive(t, level) {
            base = base.add_directive(d);
        }
    }
    base
}

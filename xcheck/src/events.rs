use std::fmt::Display;
use tracing_subscriber::{Layer, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt};

/// Category of event to trace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, clap::ValueEnum)]
pub enum TraceEvent {
    /// Traces template matching and normalization.
    #[clap(name = "matcher")]
    Matcher,
    /// Traces communication with the target.
    #[clap(name = "channel")]
    Channel,
    /// Traces runs of the reference interpreter.
    #[clap(name = "oracle")]
    Oracle,
    /// Traces test discovery and sequencing.
    #[clap(name = "runner")]
    Runner,
}

impl TraceEvent {
    const fn target(self) -> &'static str {
        match self {
            Self::Matcher => "matcher",
            Self::Channel => "channel",
            Self::Oracle => "oracle",
            Self::Runner => "runner",
        }
    }
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.target())
    }
}

/// Installs the global tracing subscriber, logging to stderr.
pub fn init(enabled_trace_events: &[TraceEvent]) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(compose_filter(enabled_trace_events));

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        // Something went wrong; proceed on anyway but complain audibly.
        eprintln!("warning: failed to initialize tracing.");
    }
}

fn compose_filter(enabled_trace_events: &[TraceEvent]) -> Targets {
    Targets::new()
        .with_default(tracing_subscriber::filter::LevelFilter::INFO)
        .with_targets(
            enabled_trace_events
                .iter()
                .map(|event| (event.target(), tracing::Level::DEBUG)),
        )
}

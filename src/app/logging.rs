//! Tracing subscriber setup for the command-line tools.
//!
//! Logs go to stderr so that the report written to stdout stays clean when piped.
//! `RUST_LOG` takes precedence over the verbosity flag.

use tracing_subscriber::prelude::*;

/// Filter directives for a `-v` count
pub fn default_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "azmon_toggle=warn,reqwest=warn,hyper=warn",
        1 => "azmon_toggle=info,reqwest=warn,hyper=warn",
        2 => "azmon_toggle=debug,reqwest=info,hyper=warn",
        _ => "azmon_toggle=trace,reqwest=debug,hyper=info",
    }
}

/// Install the global subscriber; later calls are ignored
pub fn init_logging(verbosity: u8) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.trim().is_empty() => tracing_subscriber::EnvFilter::builder()
            .parse(&spec)
            .unwrap_or_else(|e| {
                eprintln!("Ignoring invalid RUST_LOG '{}': {}", spec, e);
                tracing_subscriber::EnvFilter::new(default_directives(verbosity))
            }),
        _ => tracing_subscriber::EnvFilter::new(default_directives(verbosity)),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }

    // Bridge log crate events (reqwest, hyper) to tracing.
    // This must be done AFTER setting the tracing subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to initialize log-to-tracing bridge: {}", e);
    }

    log_debug!("Logging initialized at verbosity {}", verbosity);
}

//! Integration with the tracing ecosystem
//!
//! The host program logs through `tracing` as usual. [`GraphTracingLayer`]
//! feeds spans and events into the log graph the live writer renders, and an
//! optional fmt layer keeps a plain diagnostics file, since stdout belongs to
//! the canvas.

pub mod tracing_layer;

pub use tracing_layer::GraphTracingLayer;

use crate::graph::LogGraph;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Everything down to `TRACE` reaches the graph so the severity keys can
/// reveal it later. The diagnostics file honours `RUST_LOG` and defaults to
/// `info`.
pub fn init_tracing(
    graph: Arc<LogGraph>,
    diagnostics: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::prelude::*;

    let graph_layer = GraphTracingLayer::new(graph).with_filter(LevelFilter::TRACE);

    let file_layer = match diagnostics {
        Some(path) => {
            let file = File::create(path)?;
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter);
            Some(layer)
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(graph_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

mod workload;

use anyhow::{anyhow, Context};
use clap::Parser;
use live_log::render::keys::spawn_key_reader;
use live_log::{
    init_tracing, BatchFlusher, EventBatchBuffer, JsonLinesSink, LiveConfig, LiveWriter, LogGraph,
    PlainRenderer, ProcessContext, TerminalCanvas,
};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

/// Render a simulated build as a live terminal view.
#[derive(Parser, Debug)]
#[command(name = "live_log_demo", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write outbound event batches here as JSON lines
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Shell command whose stdout is streamed into the view
    #[arg(long)]
    command: Option<String>,

    /// Number of synthetic output lines when no command is given
    #[arg(long, default_value_t = 400)]
    burst: usize,

    /// Diagnostics log file (filtered by RUST_LOG)
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Keep the view open after the work is done, until `q` is pressed
    #[arg(long)]
    hold: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LiveConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => LiveConfig::default(),
    };

    let ctx = ProcessContext::new();
    let graph = Arc::new(LogGraph::new());
    init_tracing(Arc::clone(&graph), args.diagnostics.as_deref()).map_err(|e| anyhow!(e))?;

    let out: Box<dyn Write + Send> = match &args.events_out {
        Some(path) => Box::new(File::create(path).with_context(|| format!("creating {}", path.display()))?),
        None => Box::new(io::sink()),
    };
    let events = Arc::new(EventBatchBuffer::new(
        config.events.session_id.clone(),
        config.events.batch_cap,
        JsonLinesSink::new(out),
    ));

    // Hooks run newest first: the writer stops before the final flush.
    BatchFlusher::spawn_in(&ctx, Arc::clone(&events), config.events.flush_interval());
    let canvas = TerminalCanvas::stdout().context("taking over the terminal")?;
    let writer = LiveWriter::spawn(
        Arc::clone(&graph),
        canvas,
        PlainRenderer::default(),
        &config,
        Some(Arc::clone(&events)),
        &ctx,
    )?;
    let keys = spawn_key_reader(writer.commands(), ctx.shutdown_requested());

    let trigger = ctx.trigger();
    let work_graph = Arc::clone(&graph);
    let work_events = Arc::clone(&events);
    let hold = args.hold;
    let command = args.command.clone();
    let burst = args.burst;
    let work = thread::spawn(move || {
        let result = workload::run(&work_graph, &work_events, command.as_deref(), burst);
        if result.is_err() || !hold {
            trigger.fire();
        }
        result
    });

    // Disconnects once shutdown is requested, by the workload or by `q`.
    let _ = ctx.shutdown_requested().recv();
    ctx.shutdown();
    let _ = keys.join();

    if work.is_finished() {
        match work.join() {
            Ok(result) => result?,
            Err(_) => return Err(anyhow!("workload thread panicked")),
        }
    }

    let stats = events.stats();
    let graph_stats = graph.stats();
    println!("=== Live log summary ===");
    println!("Entries in graph: {}", graph_stats.entries);
    println!("Graph revision: {}", graph_stats.revision);
    println!("Event batches sent: {}", stats.batches_sent);
    println!("Event batches failed: {}", stats.failed_batches);
    Ok(())
}

//! Sample work for the live view: nested tasks, log events and a stream of
//! subprocess output

use anyhow::Context;
use live_log::graph::{EntryStatus, LogGraph, LogLevel, NewEntry};
use live_log::EventBatchBuffer;
use serde_json::json;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, info_span, trace, warn};

fn pause(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

/// Run every demo stage in order.
pub fn run(
    graph: &LogGraph,
    events: &EventBatchBuffer,
    command: Option<&str>,
    burst: usize,
) -> anyhow::Result<()> {
    prepare();
    match command {
        Some(command) => stream_command(graph, events, command)?,
        None => stream_burst(graph, events, burst)?,
    }
    report();
    events.record("demo_finished", json!({ "burst": burst }));
    Ok(())
}

fn prepare() {
    let span = info_span!("prepare", stage = 1);
    let _guard = span.enter();

    info!("resolving workspace");
    pause(300);
    trace!(component = "resolver", "lockfile unchanged");
    debug!(packages = 12, "dependency graph loaded");

    for name in ["core", "render", "cli"] {
        let span = info_span!("fetch", package = name);
        let _guard = span.enter();
        pause(250);
        info!(package = name, "fetched");
    }
    warn!(memory_usage = 85, "cache is getting large: {}%", 85);
}

fn stream_command(graph: &LogGraph, events: &EventBatchBuffer, command: &str) -> anyhow::Result<()> {
    let task = graph.insert(None, NewEntry::task("run", command))?;
    let output = graph.insert(Some(task), NewEntry::stream(LogLevel::Info))?;

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start `{command}`"))?;

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            graph.append_output(output, &line?)?;
        }
    }

    let status = child.wait()?;
    let final_status = if status.success() {
        EntryStatus::Done
    } else {
        EntryStatus::Error
    };
    graph.set_status(task, final_status)?;
    events.record(
        "command_finished",
        json!({ "command": command, "success": status.success(), "code": status.code() }),
    );
    Ok(())
}

fn stream_burst(graph: &LogGraph, events: &EventBatchBuffer, lines: usize) -> anyhow::Result<()> {
    let task = graph.insert(None, NewEntry::task("compile", format!("{lines} units")))?;
    let output = graph.insert(Some(task), NewEntry::stream(LogLevel::Info))?;

    for i in 0..lines {
        graph.append_output(output, &format!("   Compiling unit-{i:04} v0.1.0"))?;
        pause(3);
    }

    graph.set_status(task, EntryStatus::Done)?;
    events.record("burst_finished", json!({ "lines": lines }));
    Ok(())
}

fn report() {
    let span = info_span!("report");
    let _guard = span.enter();
    pause(400);
    info!(user_action = "summary", "writing summary");
    error!(error_code = 404, "simulated upload failure");
    info!("done; press q to quit");
}

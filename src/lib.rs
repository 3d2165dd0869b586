// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod server;
pub mod steps;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::load_or_preset;
use crate::config::model::{ConfigFile, StepConfig, TaskConfig};
use crate::engine::{
    CoreRuntime, RunRecord, Runtime, RuntimeEvent, RuntimeOptions, RuntimeReport, TriggerReason,
};
use crate::exec::RealExecutorBackend;
use crate::graph::{Scheduler, TaskGraph};
use crate::server::ReloadChannel;
use crate::steps::StepContext;

/// Exit code when Ctrl-C interrupts a one-shot run.
const EXIT_INTERRUPTED: i32 = 130;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading (or the built-in preset)
/// - task graph resolution
/// - scheduler / queue / runtime
/// - executor
/// - for long-running tasks: dev server and file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_preset(&config_path)?;
    let graph = TaskGraph::from_config(&cfg);

    if args.list {
        print_task_list(&cfg);
        return Ok(0);
    }

    let target = args.task.clone();
    let task = graph.require(&target)?.clone();
    let plan = graph.plan(&[target.as_str()])?;

    if args.dry_run {
        print_dry_run(&cfg, &target, &plan);
        return Ok(0);
    }

    let root = config_root_dir(&config_path);
    info!(task = %target, ?plan, root = %root.display(), "resolved task");

    if task.is_long_running() {
        run_long_running(&cfg, &root, &target, &task, args.port).await
    } else {
        run_one_shot(&cfg, &root, &target).await
    }
}

/// Channels plus the pure core for a fresh runtime.
fn runtime_parts(
    cfg: &ConfigFile,
    exit_when_idle: bool,
) -> (
    CoreRuntime,
    mpsc::Sender<RuntimeEvent>,
    mpsc::Receiver<RuntimeEvent>,
) {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let core = CoreRuntime::new(
        Scheduler::from_config(cfg),
        cfg.config.triggered_while_running_behaviour,
        cfg.config.queue_length,
        RuntimeOptions { exit_when_idle },
    );
    (core, rt_tx, rt_rx)
}

/// Ctrl-C → graceful shutdown.
fn forward_ctrl_c(tx: mpsc::Sender<RuntimeEvent>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl-C received; shutting down");
        let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
    });
}

async fn run_one_shot(cfg: &ConfigFile, root: &Path, target: &str) -> Result<i32> {
    let (core, rt_tx, rt_rx) = runtime_parts(cfg, true);
    let executor = RealExecutorBackend::new(rt_tx.clone(), StepContext::new(root));
    forward_ctrl_c(rt_tx.clone());

    rt_tx
        .send(RuntimeEvent::RunRequested {
            tasks: vec![target.to_string()],
            reason: TriggerReason::Manual,
        })
        .await?;

    let report = Runtime::new(core, rt_rx, executor).run().await?;
    Ok(exit_code(&report))
}

/// Exit status for a finished one-shot runtime.
pub fn exit_code(report: &RuntimeReport) -> i32 {
    if report.runs.is_empty() {
        warn!("interrupted before the run finished");
        return EXIT_INTERRUPTED;
    }
    for record in report.runs.iter() {
        log_run(record);
    }
    if report.is_success() { 0 } else { 1 }
}

fn log_run(record: &RunRecord) {
    let summary = &record.summary;
    if summary.is_success() {
        info!(run_id = summary.run_id, tasks = ?summary.succeeded, "run succeeded");
    } else if record.counted {
        error!(
            run_id = summary.run_id,
            failed = ?summary.failed,
            blocked = ?summary.blocked,
            "run failed"
        );
    } else {
        warn!(
            run_id = summary.run_id,
            failed = ?summary.failed,
            blocked = ?summary.blocked,
            "chained run failed"
        );
    }
}

async fn run_long_running(
    cfg: &ConfigFile,
    root: &Path,
    target: &str,
    task: &TaskConfig,
    port: Option<u16>,
) -> Result<i32> {
    let Some(server_cfg) = task.server.as_ref() else {
        return Ok(0);
    };
    let rules = crate::watch::compile_rules(task)?;

    let (core, rt_tx, rt_rx) = runtime_parts(cfg, false);
    let ctx = StepContext::new(root).with_server_active(true);
    let executor = RealExecutorBackend::new(rt_tx.clone(), ctx);
    let channel = ReloadChannel::new();
    let (run_tx, mut run_rx) = mpsc::unbounded_channel::<RunRecord>();

    let runtime = Runtime::new(core, rt_rx, executor)
        .with_reload_channel(channel.clone())
        .with_run_listener(run_tx);
    let runtime_task = tokio::spawn(runtime.run());
    forward_ctrl_c(rt_tx.clone());

    rt_tx
        .send(RuntimeEvent::RunRequested {
            tasks: vec![target.to_string()],
            reason: TriggerReason::Manual,
        })
        .await?;

    // The server starts once the initial run is over, whatever its outcome.
    match run_rx.recv().await {
        Some(record) => log_run(&record),
        None => {
            debug!("runtime stopped before the initial run finished");
            runtime_task.await??;
            return Ok(0);
        }
    }

    let server = crate::server::serve(server_cfg, root, channel, port).await?;
    println!("serving {} at {}", target, server.url());

    let _watcher = if rules.is_empty() {
        None
    } else {
        Some(crate::watch::spawn_watcher(
            root,
            rules,
            Duration::from_millis(cfg.config.debounce_ms),
            rt_tx.clone(),
        )?)
    };
    drop(rt_tx);

    tokio::spawn(async move {
        while let Some(record) = run_rx.recv().await {
            log_run(&record);
        }
    });

    let report = runtime_task.await??;
    server.abort();
    info!(runs = report.runs.len(), "dev server stopped");
    Ok(0)
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetpipe.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Assetpipe.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_task_list(cfg: &ConfigFile) {
    for (name, task) in cfg.task.iter() {
        if task.after.is_empty() {
            println!("{name}");
        } else {
            println!("{name} (after: {})", task.after.join(", "));
        }
    }
}

/// Print tasks, prerequisites, steps and the resolved plan without running
/// anything.
fn print_dry_run(cfg: &ConfigFile, target: &str, plan: &[String]) {
    println!("assetpipe dry-run");
    println!(
        "  config.triggered_while_running_behaviour = {:?}",
        cfg.config.triggered_while_running_behaviour
    );
    println!("  config.queue_length = {}", cfg.config.queue_length);
    println!("  config.chain_mode = {:?}", cfg.config.chain_mode);
    println!("  config.parallel = {}", cfg.config.parallel);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if !task.start.is_empty() {
            println!("      start: {:?}", task.start);
        }
        for step in task.steps.iter() {
            println!("      step: {}", describe_step(step));
        }
        if let Some(server) = &task.server {
            println!(
                "      server: {:?} on port {}",
                server.base_dirs, server.port
            );
            for (prefix, dir) in server.routes.iter() {
                println!("      route: {prefix} -> {dir}");
            }
        }
        for rule in task.watch.iter() {
            println!(
                "      watch: {:?} -> tasks {:?}, reload {:?}",
                rule.patterns, rule.tasks, rule.reload
            );
        }
    }

    println!();
    println!("plan for '{target}': {}", plan.join(" -> "));
    debug!("dry-run complete (no execution)");
}

fn describe_step(step: &StepConfig) -> String {
    let detail = match step {
        StepConfig::Command(c) => c.cmd.clone(),
        StepConfig::Lint(c) => c.cmd.clone(),
        StepConfig::Copy(c) => format!("{:?} -> {:?}", c.src, c.dest),
        StepConfig::Clean(c) => format!("{:?}", c.paths),
        StepConfig::Inject(c) => format!(
            "{:?}",
            c.targets.iter().map(|t| t.src.as_str()).collect::<Vec<_>>()
        ),
        StepConfig::Bundle(c) => format!("{:?} -> {}", c.src, c.dest),
        StepConfig::InlineImages(c) => format!("{:?} from {}", c.src, c.base_dir),
        StepConfig::SizeReport(c) => c.dir.clone(),
    };
    let flag = if step.is_informational() {
        " (informational)"
    } else {
        ""
    };
    format!("{} {detail}{flag}", step.label())
}

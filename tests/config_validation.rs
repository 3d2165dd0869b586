// tests/config_validation.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::{TestResult, config_from_toml, init_tracing};

use assetpipe::config::{StepConfig, load_and_validate, load_from_str, load_or_preset};
use assetpipe::errors::PipelineError;
use assetpipe::graph::TaskGraph;
use assetpipe::types::{ChainMode, ReloadScope, TriggerWhileRunningBehaviour};

fn task() -> TaskConfigBuilder {
    TaskConfigBuilder::new()
}

fn expect_config_error(builder: ConfigFileBuilder, needle: &str) {
    match builder.try_build() {
        Err(PipelineError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}")
        }
        other => panic!("expected config error containing {needle:?}, got {other:?}"),
    }
}

#[test]
fn preset_defines_the_conventional_tasks() -> TestResult {
    init_tracing();
    let cfg = load_or_preset("missing-dir/Assetpipe.toml")?;

    for name in [
        "default", "build", "serve", "serve:dist", "serve:test", "lint", "lint:test", "styles",
        "images", "html", "fonts", "extras", "clean", "wiredep",
    ] {
        assert!(cfg.task.contains_key(name), "preset lacks {name}");
    }

    let graph = TaskGraph::from_config(&cfg);
    assert_eq!(
        graph.plan(&["build"])?,
        vec!["lint", "images", "styles", "html", "fonts", "extras", "build"]
    );
    assert_eq!(cfg.config.chain_mode, ChainMode::Sync);
    assert!(cfg.task["serve"].is_long_running());
    assert!(!cfg.task["build"].is_long_running());
    Ok(())
}

#[test]
fn steps_parse_by_kind() {
    init_tracing();
    let cfg = config_from_toml(
        r#"
[config]
triggered_while_running_behaviour = "cancel"
chain_mode = "detached"
debounce_ms = 250

[task.styles]
[[task.styles.steps]]
kind = "command"
src = ["app/styles/*.scss"]
dest = ".tmp/styles"
ext = "css"
cmd = "sass {input} {output}"

[[task.styles.steps]]
kind = "inline_images"
src = [".tmp/styles/*.css"]
base_dir = "dist/images"

[task.report]
[[task.report.steps]]
kind = "size_report"
dir = "dist"
"#,
    );

    assert_eq!(
        cfg.config.triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Cancel
    );
    assert_eq!(cfg.config.chain_mode, ChainMode::Detached);
    assert_eq!(cfg.config.debounce_ms, 250);
    assert_eq!(cfg.config.queue_length, 1);

    let steps = &cfg.task["styles"].steps;
    match &steps[0] {
        StepConfig::Command(c) => {
            assert!(c.per_file);
            assert_eq!(c.ext.as_deref(), Some("css"));
        }
        other => panic!("expected command step, got {other:?}"),
    }
    match &steps[1] {
        StepConfig::InlineImages(c) => assert_eq!(c.max_size, 100 * 1024),
        other => panic!("expected inline_images step, got {other:?}"),
    }
    assert!(cfg.task["report"].steps[0].is_informational());
    assert_eq!(steps[0].output_dirs(), vec![".tmp/styles"]);
}

#[test]
fn in_place_commands_lock_their_source_dirs() {
    let cfg = config_from_toml(
        r#"
[task.minify]
[[task.minify.steps]]
kind = "command"
src = ["dist/scripts/**/*.js", "*.html"]
cmd = "uglifyjs {input} -o {input}"
"#,
    );
    assert_eq!(
        cfg.task["minify"].steps[0].output_dirs(),
        vec!["dist/scripts", "."]
    );
}

#[test]
fn unknown_step_kind_is_a_parse_error() {
    let err = load_from_str(
        r#"
[task.a]
[[task.a.steps]]
kind = "minify"
"#,
    )
    .expect_err("unknown kind");
    assert!(matches!(err, PipelineError::TomlError(_)));
}

#[test]
fn empty_config_is_rejected() {
    expect_config_error(ConfigFileBuilder::new(), "at least one");
}

#[test]
fn unknown_references_are_rejected() {
    expect_config_error(
        ConfigFileBuilder::new().with_task("a", task().after("ghost").build()),
        "unknown dependency",
    );
    expect_config_error(
        ConfigFileBuilder::new().with_task("a", task().start("ghost").build()),
        "starts unknown task",
    );
    expect_config_error(
        ConfigFileBuilder::new().with_task(
            "serve",
            task()
                .server(&["app"], 9000)
                .watch(&["app/**/*"], &["ghost"], None)
                .build(),
        ),
        "unknown task",
    );
}

fn expect_cycle(builder: ConfigFileBuilder, needle: &str) {
    match builder.try_build() {
        Err(err @ PipelineError::GraphCycle(_)) => {
            let msg = err.to_string();
            assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}");
            assert_eq!(msg.matches("ycle detected").count(), 1, "{msg:?}");
        }
        other => panic!("expected GraphCycle containing {needle:?}, got {other:?}"),
    }
}

#[test]
fn start_chains_back_to_origin_are_rejected() {
    init_tracing();
    expect_cycle(
        ConfigFileBuilder::new()
            .with_task("a", task().start("b").build())
            .with_task("b", task().start("a").build())
            .chain_mode(ChainMode::Detached),
        "a -> b -> a (through `start`)",
    );

    // Starting `b` runs its prerequisite `c` again, which starts `b`.
    expect_cycle(
        ConfigFileBuilder::new()
            .with_task("c", task().start("b").build())
            .with_task("b", task().after("c").build()),
        "c -> c",
    );

    expect_cycle(
        ConfigFileBuilder::new()
            .with_task("a", task().after("b").build())
            .with_task("b", task().after("a").build()),
        "`after` chain through task",
    );
}

#[test]
fn start_chains_without_loops_are_accepted() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task("clean", task().build())
        .with_task("build", task().build())
        .with_task("default", task().after("clean").start("build").build())
        .chain_mode(ChainMode::Detached)
        .try_build()?;
    assert_eq!(cfg.task["default"].start, vec!["build"]);
    Ok(())
}

#[test]
fn watch_rules_need_a_server_and_an_action() {
    expect_config_error(
        ConfigFileBuilder::new().with_task(
            "a",
            task().watch(&["app/*.html"], &[], Some(ReloadScope::Full)).build(),
        ),
        "no [server]",
    );
    expect_config_error(
        ConfigFileBuilder::new().with_task(
            "serve",
            task()
                .server(&["app"], 9000)
                .watch(&["app/*.html"], &[], None)
                .build(),
        ),
        "neither",
    );
}

#[test]
fn bad_globs_and_servers_are_rejected() {
    expect_config_error(
        ConfigFileBuilder::new().with_task(
            "serve",
            task()
                .server(&["app"], 9000)
                .watch(&["app/[*.html"], &[], Some(ReloadScope::Full))
                .build(),
        ),
        "invalid glob",
    );
    expect_config_error(
        ConfigFileBuilder::new().with_task("serve", task().server(&[], 9000).build()),
        "base dir",
    );
    expect_config_error(
        ConfigFileBuilder::new().with_task(
            "serve",
            task()
                .server(&["app"], 9000)
                .route("/__assetpipe/x", "vendor")
                .build(),
        ),
        "route prefix",
    );
    expect_config_error(
        ConfigFileBuilder::new()
            .with_task("a", task().build())
            .queue_length(0),
        "queue_length",
    );
}

#[test]
fn load_and_validate_reads_from_disk() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Assetpipe.toml");
    std::fs::write(
        &path,
        r#"
[task.clean]
[[task.clean.steps]]
kind = "clean"
paths = ["dist"]
"#,
    )?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.task.len(), 1);

    // An existing file wins over the preset.
    let cfg = load_or_preset(&path)?;
    assert!(!cfg.task.contains_key("serve"));
    Ok(())
}

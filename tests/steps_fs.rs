// tests/steps_fs.rs

mod common;
use crate::common::{TestResult, init_tracing, read_file, write_file};

use std::path::Path;

use assetpipe::config::{
    BundleStep, CleanStep, CommandStep, CopyStep, InjectStep, InjectTarget, InlineImagesStep,
    LintStep, SizeReportStep, StepConfig,
};
use assetpipe::errors::PipelineError;
use assetpipe::steps::{self, StepContext, bundle, copy, inject, inline_images, lint, size_report};

fn copy_step(src: &[&str], exclude: &[&str], base: Option<&str>, dest: &[&str]) -> CopyStep {
    CopyStep {
        src: src.iter().map(|s| s.to_string()).collect(),
        exclude: exclude.iter().map(|s| s.to_string()).collect(),
        dest: dest.iter().map(|s| s.to_string()).collect(),
        base: base.map(str::to_string),
        dot: false,
        manifest_main: None,
        manifest: "bower.json".to_string(),
        components_dir: "bower_components".to_string(),
    }
}

fn command_step(cmd: &str, src: &[&str], dest: Option<&str>) -> CommandStep {
    CommandStep {
        cmd: cmd.to_string(),
        src: src.iter().map(|s| s.to_string()).collect(),
        exclude: Vec::new(),
        dest: dest.map(str::to_string),
        ext: None,
        base: None,
        per_file: true,
        informational: false,
    }
}

/// A small bower setup: bootstrap-sass depends on jquery.
fn write_components(root: &Path) {
    write_file(
        root,
        "bower.json",
        r#"{ "name": "site", "dependencies": { "bootstrap-sass": "~3.3" } }"#,
    );
    write_file(
        root,
        "bower_components/bootstrap-sass/bower.json",
        r#"{
  "name": "bootstrap-sass",
  "main": ["assets/stylesheets/_bootstrap.scss", "assets/fonts/glyphicons.woff"],
  "dependencies": { "jquery": ">= 1.9.1" }
}"#,
    );
    write_file(
        root,
        "bower_components/bootstrap-sass/assets/stylesheets/_bootstrap.scss",
        "// bootstrap",
    );
    write_file(
        root,
        "bower_components/bootstrap-sass/assets/fonts/glyphicons.woff",
        "woff",
    );
    write_file(
        root,
        "bower_components/jquery/.bower.json",
        r#"{ "name": "jquery", "main": "dist/jquery.js" }"#,
    );
    write_file(root, "bower_components/jquery/dist/jquery.js", "// jquery");
}

#[test]
fn extras_copy_honours_excludes_and_dotfiles() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/robots.txt", "User-agent: *");
    write_file(root, "app/.htaccess", "Options -Indexes");
    write_file(root, "app/index.html", "<html></html>");
    write_file(root, "app/scripts/main.js", "console.log(1)");

    let ctx = StepContext::new(root);
    let mut step = copy_step(&["app/*.*"], &["app/*.html"], Some("app"), &["dist"]);

    let written = copy::run(&ctx, &step)?;
    assert_eq!(written, vec!["dist/robots.txt"]);

    step.dot = true;
    let mut written = copy::run(&ctx, &step)?;
    written.sort();
    assert_eq!(written, vec!["dist/.htaccess", "dist/robots.txt"]);
    assert!(!root.join("dist/index.html").exists());
    assert!(!root.join("dist/scripts").exists());
    Ok(())
}

#[test]
fn fonts_copy_includes_manifest_main_files_flat() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_components(root);
    write_file(root, "app/fonts/custom/brand.ttf", "ttf");

    let ctx = StepContext::new(root);
    let mut step = copy_step(
        &["app/fonts/**/*"],
        &[],
        Some("app/fonts"),
        &[".tmp/fonts", "dist/fonts"],
    );
    step.manifest_main = Some("**/*.{eot,svg,ttf,woff,woff2}".to_string());

    copy::run(&ctx, &step)?;

    for dest in [".tmp/fonts", "dist/fonts"] {
        assert_eq!(read_file(root, &format!("{dest}/glyphicons.woff")), "woff");
        assert_eq!(read_file(root, &format!("{dest}/custom/brand.ttf")), "ttf");
        assert!(!root.join(dest).join("_bootstrap.scss").exists());
    }
    Ok(())
}

#[tokio::test]
async fn clean_removes_outputs_and_tolerates_missing_paths() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "dist/index.html", "x");
    write_file(root, ".tmp/styles/main.css", "y");

    let ctx = StepContext::new(root);
    let step = StepConfig::Clean(CleanStep {
        paths: vec![".tmp".to_string(), "dist".to_string(), "never-built".to_string()],
    });

    steps::run_step(&ctx, &step).await?;
    assert!(!root.join("dist").exists());
    assert!(!root.join(".tmp").exists());

    // Cleaning an already clean tree is fine too.
    steps::run_step(&ctx, &step).await?;
    Ok(())
}

#[tokio::test]
async fn clean_then_build_is_repeatable() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/robots.txt", "User-agent: *");
    write_file(root, "app/favicon.ico", "ico");

    let ctx = StepContext::new(root);
    let clean = StepConfig::Clean(CleanStep {
        paths: vec!["dist".to_string()],
    });
    let extras = StepConfig::Copy(copy_step(&["app/*.*"], &[], Some("app"), &["dist"]));

    steps::run_step(&ctx, &clean).await?;
    steps::run_step(&ctx, &extras).await?;
    let first = read_file(root, "dist/robots.txt");

    write_file(root, "dist/stale.txt", "left over");
    steps::run_step(&ctx, &clean).await?;
    steps::run_step(&ctx, &extras).await?;

    assert_eq!(read_file(root, "dist/robots.txt"), first);
    assert!(!root.join("dist/stale.txt").exists());
    Ok(())
}

#[test]
fn inject_rewrites_html_and_scss_blocks() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_components(root);
    write_file(
        root,
        "app/index.html",
        "<head>\n    <!-- bower:js -->\n    <script src=\"old.js\"></script>\n    <!-- endbower -->\n</head>\n",
    );
    write_file(
        root,
        "app/styles/main.scss",
        "// bower:scss\n// endbower\nbody { margin: 0; }\n",
    );

    let ctx = StepContext::new(root);
    let step = InjectStep {
        manifest: "bower.json".to_string(),
        components_dir: "bower_components".to_string(),
        targets: vec![
            InjectTarget {
                src: "app/styles/*.scss".to_string(),
                ignore_path: Some(r"^(\.\./)+".to_string()),
            },
            InjectTarget {
                src: "app/*.html".to_string(),
                ignore_path: Some(r"^(\.\./)*\.\.".to_string()),
            },
        ],
    };

    let changed = inject::run(&ctx, &step)?;
    assert_eq!(changed, vec!["app/styles/main.scss", "app/index.html"]);

    assert_eq!(
        read_file(root, "app/index.html"),
        "<head>\n    <!-- bower:js -->\n    <script src=\"/bower_components/jquery/dist/jquery.js\"></script>\n    <!-- endbower -->\n</head>\n"
    );
    assert_eq!(
        read_file(root, "app/styles/main.scss"),
        "// bower:scss\n@import \"bower_components/bootstrap-sass/assets/stylesheets/_bootstrap.scss\";\n// endbower\nbody { margin: 0; }\n"
    );

    // Nothing changes on a second pass.
    assert!(inject::run(&ctx, &step)?.is_empty());
    Ok(())
}

const PAGE: &str = r#"<html>
<head>
<!-- build:css(.tmp) styles/main.css -->
<link rel="stylesheet" href="styles/main.css">
<!-- endbuild -->
</head>
<body>
<!-- build:js scripts/main.js -->
<script src="scripts/a.js"></script>
<script src="scripts/b.js"></script>
<!-- endbuild -->
</body>
</html>
"#;

fn bundle_step(rev: bool) -> BundleStep {
    BundleStep {
        src: vec!["app/*.html".to_string()],
        dest: "dist".to_string(),
        search_path: vec![".tmp".to_string(), "app".to_string(), ".".to_string()],
        rev,
    }
}

fn write_bundle_sources(root: &Path) {
    write_file(root, "app/index.html", PAGE);
    write_file(root, ".tmp/styles/main.css", "body{margin:0}");
    write_file(root, "app/scripts/a.js", "var a=1");
    write_file(root, "app/scripts/b.js", "var b=2");
}

#[test]
fn bundle_concatenates_blocks_and_rewrites_the_page() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_bundle_sources(root);

    let output = bundle::run(&StepContext::new(root), &bundle_step(false))?;

    assert_eq!(output.pages, vec!["dist/index.html"]);
    assert_eq!(read_file(root, "dist/scripts/main.js"), "var a=1;\nvar b=2");
    assert_eq!(read_file(root, "dist/styles/main.css"), "body{margin:0}");

    let page = read_file(root, "dist/index.html");
    assert!(page.contains(r#"<link rel="stylesheet" href="styles/main.css">"#));
    assert!(page.contains(r#"<script src="scripts/main.js"></script>"#));
    assert!(!page.contains("build:"));
    assert!(!page.contains("scripts/a.js"));
    assert!(page.ends_with("</html>\n"));
    Ok(())
}

#[test]
fn bundle_revisions_names_by_content() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_bundle_sources(root);

    let output = bundle::run(&StepContext::new(root), &bundle_step(true))?;

    let expected = format!(
        "dist/{}",
        bundle::revisioned("scripts/main.js", b"var a=1;\nvar b=2")
    );
    assert_eq!(output.bundles["scripts/main.js"], expected);
    assert!(root.join(&expected).is_file());

    let reference = expected.trim_start_matches("dist/");
    assert!(read_file(root, "dist/index.html").contains(reference));
    Ok(())
}

#[test]
fn bundle_reports_missing_assets_with_location() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/index.html", PAGE);
    write_file(root, ".tmp/styles/main.css", "body{}");

    match bundle::run(&StepContext::new(root), &bundle_step(false)) {
        Err(PipelineError::Transform { file, line, .. }) => {
            assert_eq!(file.as_deref(), Some(Path::new("app/index.html")));
            assert_eq!(line, Some(8));
        }
        other => panic!("expected a transform error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn small_images_are_inlined() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(
        root,
        ".tmp/styles/main.css",
        ".logo{background:url(\"../images/logo.png\")}\n.hero{background:url(../images/hero.png)}\n.cdn{background:url(https://cdn.example.com/x.png)}\n",
    );
    write_file(root, "dist/images/logo.png", "PNG");
    write_file(root, "dist/images/hero.png", &"x".repeat(500));

    let ctx = StepContext::new(root);
    let step = InlineImagesStep {
        src: vec![".tmp/styles/*.css".to_string()],
        base_dir: "dist/images".to_string(),
        max_size: 100,
    };

    assert_eq!(inline_images::run(&ctx, &step)?, 1);
    let css = read_file(root, ".tmp/styles/main.css");
    assert!(css.contains("url(data:image/png;base64,UE5H)"));
    assert!(css.contains("url(../images/hero.png)"));
    assert!(css.contains("url(https://cdn.example.com/x.png)"));
    Ok(())
}

#[test]
fn size_report_sums_the_tree() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "dist/index.html", &"a".repeat(1500));
    write_file(root, "dist/scripts/main.js", &"b".repeat(500));

    let ctx = StepContext::new(root);
    let report = size_report::run(
        &ctx,
        &SizeReportStep {
            dir: "dist".to_string(),
            title: Some("build".to_string()),
            gzip: false,
        },
    )?;
    assert_eq!(report.files, 2);
    assert_eq!(report.bytes, 2000);
    assert_eq!(report.to_string(), "build all files 2.00 kB (2 files)");

    let gzipped = size_report::run(
        &ctx,
        &SizeReportStep {
            dir: "dist".to_string(),
            title: Some("build".to_string()),
            gzip: true,
        },
    )?;
    let gz = gzipped.gzip_bytes.expect("gzip total requested");
    assert!(gz > 0 && gz < 2000, "unexpected gzipped total {gz}");
    assert!(
        gzipped.to_string().starts_with("build all files 2.00 kB (2 files), "),
        "{gzipped}"
    );
    assert!(gzipped.to_string().ends_with(" gzipped"));

    let missing = size_report::run(
        &ctx,
        &SizeReportStep {
            dir: "nowhere".to_string(),
            title: None,
            gzip: false,
        },
    )?;
    assert_eq!(missing.bytes, 0);
    assert_eq!(missing.title, "nowhere");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn command_runs_per_file_into_dest() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/images/logo.svg", "<svg/>");
    write_file(root, "app/images/icons/star.svg", "<svg id=star/>");

    let ctx = StepContext::new(root);
    let mut step = command_step("cp {input} {output}", &["app/images/**/*"], Some("dist/images"));
    step.base = Some("app/images".to_string());

    steps::run_step(&ctx, &StepConfig::Command(step)).await?;

    assert_eq!(read_file(root, "dist/images/logo.svg"), "<svg/>");
    assert_eq!(read_file(root, "dist/images/icons/star.svg"), "<svg id=star/>");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn command_failure_carries_the_exit_status() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let ctx = StepContext::new(dir.path());

    let err = steps::run_step(&ctx, &StepConfig::Command(command_step("exit 3", &[], None)))
        .await
        .expect_err("non-zero exit fails the step");

    assert!(matches!(err, PipelineError::ToolFailed { code: 3, .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(!err.is_fatal());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn lint_violations_fail_unless_serving() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/scripts/main.js", "var a = 1");

    let step = LintStep {
        cmd: r"printf 'app/scripts/main.js:1:10: Missing semicolon.\n\n1 problem\n'; exit 1"
            .to_string(),
        src: vec!["app/scripts/**/*.js".to_string()],
        exclude: Vec::new(),
    };

    let err = lint::run(&StepContext::new(root), &step)
        .await
        .expect_err("violations fail a one-shot lint");
    assert!(matches!(err, PipelineError::Lint { violations: 1 }));

    let serving = StepContext::new(root).with_server_active(true);
    let violations = lint::run(&serving, &step).await?;
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].to_string(),
        "app/scripts/main.js:1:10: Missing semicolon."
    );
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn lint_warnings_with_clean_exit_pass() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/scripts/main.js", "var a = 1");

    let step = LintStep {
        cmd: r"printf 'app/scripts/main.js:1:10: Missing semicolon. [Warning/semi]\n'; exit 0"
            .to_string(),
        src: vec!["app/scripts/**/*.js".to_string()],
        exclude: Vec::new(),
    };

    let violations = lint::run(&StepContext::new(root), &step).await?;
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].message, "Missing semicolon. [Warning/semi]");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn broken_linter_is_a_tool_failure() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/scripts/main.js", "var a = 1;");

    let step = LintStep {
        cmd: "echo 'config not found' >&2; exit 2".to_string(),
        src: vec!["app/scripts/**/*.js".to_string()],
        exclude: Vec::new(),
    };

    let err = lint::run(&StepContext::new(root).with_server_active(true), &step)
        .await
        .expect_err("linter crash fails even while serving");
    assert!(matches!(err, PipelineError::ToolFailed { code: 2, .. }));
    Ok(())
}

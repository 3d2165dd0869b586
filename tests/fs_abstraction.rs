// tests/fs_abstraction.rs

mod common;
use crate::common::{TestResult, init_tracing};

use std::path::Path;
use std::sync::Arc;

use assetpipe::config::{CleanStep, CopyStep, InlineImagesStep};
use assetpipe::fs::mock::MockFileSystem;
use assetpipe::fs::FileSystem;
use assetpipe::steps::sources::resolve;
use assetpipe::steps::{StepContext, clean, copy, inline_images, manifest};

const ROOT: &str = "/project";

fn mock_project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/project/app/index.html", "<html></html>");
    fs.add_file("/project/app/robots.txt", "User-agent: *");
    fs.add_file("/project/app/.htaccess", "Options -Indexes");
    fs.add_file("/project/app/styles/main.scss", "body{}");
    fs.add_file("/project/app/styles/_vars.scss", "$x: 1;");
    fs.add_file("/project/app/styles/vendor/.cache/x.scss", "");
    fs.add_file("/project/app/scripts/main.js", "main()");
    fs
}

fn ctx(fs: &MockFileSystem) -> StepContext {
    StepContext::new(ROOT).with_fs(Arc::new(fs.clone()))
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn resolve_matches_globs_against_the_mock() -> TestResult {
    init_tracing();
    let fs = mock_project();
    let root = Path::new(ROOT);

    let files = resolve(
        &fs,
        root,
        &strings(&["app/styles/**/*.scss"]),
        &strings(&["app/styles/_*.scss"]),
        None,
        false,
    )?;
    let rels: Vec<&str> = files.iter().map(|f| f.rel.as_str()).collect();
    assert_eq!(rels, vec!["app/styles/main.scss"]);
    assert_eq!(files[0].base, "app/styles");
    assert_eq!(files[0].rel_to_base(), "main.scss");

    let dotted = resolve(&fs, root, &strings(&["app/**/*.scss"]), &[], None, true)?;
    assert!(dotted.iter().any(|f| f.rel == "app/styles/vendor/.cache/x.scss"));

    // A single `*` never crosses a directory.
    let top = resolve(&fs, root, &strings(&["app/*"]), &[], None, false)?;
    let rels: Vec<&str> = top.iter().map(|f| f.rel.as_str()).collect();
    assert_eq!(rels, vec!["app/index.html", "app/robots.txt"]);

    let none = resolve(&fs, root, &strings(&["missing/**/*.js"]), &[], None, false)?;
    assert!(none.is_empty());
    Ok(())
}

#[test]
fn resolve_keeps_pattern_order_without_duplicates() -> TestResult {
    let fs = mock_project();
    let files = resolve(
        &fs,
        Path::new(ROOT),
        &strings(&["app/scripts/*.js", "app/**/*.js"]),
        &[],
        None,
        false,
    )?;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].base, "app/scripts");
    Ok(())
}

#[test]
fn copy_and_clean_work_on_the_mock() -> TestResult {
    init_tracing();
    let fs = mock_project();
    let ctx = ctx(&fs);

    let step = CopyStep {
        src: strings(&["app/*.*"]),
        exclude: strings(&["app/*.html"]),
        dest: strings(&["dist"]),
        base: Some("app".to_string()),
        dot: true,
        manifest_main: None,
        manifest: "bower.json".to_string(),
        components_dir: "bower_components".to_string(),
    };
    copy::run(&ctx, &step)?;

    assert_eq!(
        fs.contents("/project/dist/robots.txt").as_deref(),
        Some("User-agent: *")
    );
    assert!(fs.is_file(Path::new("/project/dist/.htaccess")));
    assert!(!fs.exists(Path::new("/project/dist/index.html")));

    clean::run(
        &ctx,
        &CleanStep {
            paths: strings(&["dist", "never-built"]),
        },
    )?;
    assert!(fs.files().iter().all(|p| !p.starts_with("/project/dist")));
    assert!(fs.is_file(Path::new("/project/app/robots.txt")));
    Ok(())
}

#[test]
fn manifest_lists_dependencies_first_and_honours_overrides() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(
        "/project/bower.json",
        r#"{
  "dependencies": { "bootstrap": "~3", "modernizr": "~2" },
  "overrides": { "bootstrap": { "main": ["dist/css/bootstrap.css", "dist/js/bootstrap.js"] } }
}"#,
    );
    fs.add_file(
        "/project/bower_components/bootstrap/bower.json",
        r#"{ "main": "less/bootstrap.less", "dependencies": { "jquery": "*" } }"#,
    );
    fs.add_file("/project/bower_components/bootstrap/dist/css/bootstrap.css", "");
    fs.add_file("/project/bower_components/bootstrap/dist/js/bootstrap.js", "");
    fs.add_file(
        "/project/bower_components/jquery/package.json",
        r#"{ "main": "dist/jquery.js" }"#,
    );
    fs.add_file("/project/bower_components/jquery/dist/jquery.js", "");

    let files = manifest::main_files(&ctx(&fs), "bower.json", "bower_components")?;

    // modernizr is declared but not installed: skipped with a warning.
    assert_eq!(
        files,
        vec![
            "bower_components/jquery/dist/jquery.js",
            "bower_components/bootstrap/dist/css/bootstrap.css",
            "bower_components/bootstrap/dist/js/bootstrap.js",
        ]
    );
    Ok(())
}

#[test]
fn manifest_keeps_declared_package_order() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(
        "/project/bower.json",
        r#"{ "dependencies": { "modernizr": "~2", "jquery": "~2", "angular": "~1" } }"#,
    );
    for pkg in ["modernizr", "jquery", "angular"] {
        fs.add_file(
            &format!("/project/bower_components/{pkg}/bower.json"),
            format!(r#"{{ "main": "{pkg}.js" }}"#),
        );
        fs.add_file(&format!("/project/bower_components/{pkg}/{pkg}.js"), "");
    }

    let files = manifest::main_files(&ctx(&fs), "bower.json", "bower_components")?;
    assert_eq!(
        files,
        vec![
            "bower_components/modernizr/modernizr.js",
            "bower_components/jquery/jquery.js",
            "bower_components/angular/angular.js",
        ]
    );
    Ok(())
}

#[test]
fn inline_images_reads_through_the_abstraction() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(
        "/project/.tmp/styles/main.css",
        ".a{background:url('/images/dot.gif')}",
    );
    fs.add_file("/project/dist/images/dot.gif", "GIF");

    let step = InlineImagesStep {
        src: strings(&[".tmp/styles/*.css"]),
        base_dir: "dist/images".to_string(),
        max_size: 1024,
    };
    assert_eq!(inline_images::run(&ctx(&fs), &step)?, 1);
    assert_eq!(
        fs.contents("/project/.tmp/styles/main.css").as_deref(),
        Some(".a{background:url(data:image/gif;base64,R0lG)}")
    );
    Ok(())
}

#![allow(dead_code)]

pub use assetpipe_test_utils::builders;
pub use assetpipe_test_utils::fake_executor::FakeExecutor;
pub use assetpipe_test_utils::{init_tracing, with_timeout};

use std::path::Path;

use assetpipe::config::{ConfigFile, load_from_str};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Parse and validate a TOML config.
pub fn config_from_toml(toml: &str) -> ConfigFile {
    let raw = load_from_str(toml).expect("config should parse");
    ConfigFile::try_from(raw).expect("config should validate")
}

/// Create `rel` below `root` with `contents`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(path, contents).expect("write test file");
}

pub fn read_file(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).expect("read test file")
}

// tests/dev_server.rs

mod common;
use crate::common::{TestResult, init_tracing, with_timeout, write_file};

use std::collections::BTreeMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use assetpipe::config::ServerConfig;
use assetpipe::server::{self, CLIENT_PATH, ReloadChannel};
use assetpipe::types::ReloadSignal;

/// Minimal HTTP/1.1 GET; returns the raw response text.
async fn get(port: u16, path: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

#[tokio::test]
async fn serves_base_dirs_in_order_with_reload_client() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/index.html", "<html><body><h1>hi</h1></body></html>");
    write_file(root, "app/styles/main.css", "/* stale source */");
    write_file(root, ".tmp/styles/main.css", "body{margin:0}");
    write_file(root, "bower_components/jquery/dist/jquery.js", "// jquery");

    let cfg = ServerConfig {
        base_dirs: vec![".tmp".to_string(), "app".to_string()],
        port: 9000,
        routes: BTreeMap::from([(
            "/bower_components".to_string(),
            "bower_components".to_string(),
        )]),
    };
    let channel = ReloadChannel::new();
    let handle = server::serve(&cfg, root, channel.clone(), Some(0)).await?;
    assert_ne!(handle.port, 0);

    let index = with_timeout(get(handle.port, "/")).await?;
    assert!(status_line(&index).contains("200"), "{index}");
    assert!(index.contains("<h1>hi</h1>"));
    assert!(index.contains(&format!(r#"<script src="{CLIENT_PATH}"></script></body>"#)));

    let css = with_timeout(get(handle.port, "/styles/main.css")).await?;
    assert!(css.contains("body{margin:0}"));
    assert!(!css.contains("stale source"));
    assert!(!css.contains(CLIENT_PATH));

    let vendored = with_timeout(get(handle.port, "/bower_components/jquery/dist/jquery.js")).await?;
    assert!(status_line(&vendored).contains("200"));
    assert!(vendored.contains("// jquery"));

    let client = with_timeout(get(handle.port, CLIENT_PATH)).await?;
    assert!(client.contains("WebSocket"));

    let missing = with_timeout(get(handle.port, "/nope.js")).await?;
    assert!(status_line(&missing).contains("404"));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn reload_without_sessions_is_a_no_op() {
    init_tracing();
    let channel = ReloadChannel::new();
    assert_eq!(channel.session_count(), 0);
    assert_eq!(channel.reload(ReloadSignal::full()), 0);
}

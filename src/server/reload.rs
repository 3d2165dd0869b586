// src/server/reload.rs

//! Live reload notifications pushed to browser sessions.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::header;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::types::ReloadSignal;

/// Script served at [`CLIENT_PATH`] and injected into every HTML page.
pub const CLIENT_JS: &str = r#"(function () {
  var url = (location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/__assetpipe/ws";
  function refreshStyles() {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    for (var i = 0; i < links.length; i++) {
      var href = links[i].href.replace(/([?&])__assetpipe=\d+&?/, "$1").replace(/[?&]$/, "");
      links[i].href = href + (href.indexOf("?") >= 0 ? "&" : "?") + "__assetpipe=" + Date.now();
    }
  }
  function connect() {
    var ws = new WebSocket(url);
    ws.onmessage = function (event) {
      var signal = JSON.parse(event.data);
      if (signal.scope === "styles") { refreshStyles(); } else { location.reload(); }
    };
    ws.onclose = function () { setTimeout(connect, 1000); };
  }
  connect();
})();
"#;

pub const CLIENT_PATH: &str = "/__assetpipe/client.js";
pub const SOCKET_PATH: &str = "/__assetpipe/ws";

/// Broadcast side of the reload channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReloadChannel {
    tx: broadcast::Sender<ReloadSignal>,
}

impl Default for ReloadChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Register a session. The session counts as connected until the
    /// receiver is dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.tx.subscribe()
    }

    pub fn session_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Notify every connected session. Returns how many were notified; with
    /// no sessions this is a logged no-op.
    pub fn reload(&self, signal: ReloadSignal) -> usize {
        match self.tx.send(signal) {
            Ok(sessions) => {
                info!(sessions, "reload broadcast");
                sessions
            }
            Err(broadcast::error::SendError(signal)) => {
                info!(scope = ?signal.scope, "no browser sessions connected; reload skipped");
                0
            }
        }
    }
}

pub(crate) async fn client_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_JS,
    )
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(channel): State<ReloadChannel>,
) -> impl IntoResponse {
    // Subscribe before the upgrade completes so a reload sent right after
    // the handshake is not lost.
    let rx = channel.subscribe();
    ws.on_upgrade(move |socket| handle_session(socket, rx))
}

async fn handle_session(socket: WebSocket, mut rx: broadcast::Receiver<ReloadSignal>) {
    info!("browser session connected");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            signal = rx.recv() => match signal {
                Ok(signal) => {
                    let json = match serde_json::to_string(&signal) {
                        Ok(json) => json,
                        Err(_) => continue,
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("browser session went away while sending");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "browser session lagged; continuing");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("reload channel closed");
                    break;
                }
            },
        }
    }

    info!("browser session disconnected");
}

//! HTTP access to the remote player-control service.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::api::model::{
    ControlAction, ControlResponse, CurrentSongResponse, InvalidAction, PlaybackSnapshot,
};

const CURRENT_SONG_PATH: &str = "api/current_song";
const CONTROL_PATH: &str = "api/control/";
const SUCCESS: &str = "success";

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("unparseable response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("unparseable response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("action rejected: {0}")]
    Rejected(String),
    #[error("resync after control failed: {0}")]
    Resync(#[source] FetchError),
}

/// Operations the scheduler needs from the remote player.
pub trait PlayerApi: Clone + Send + Sync + 'static {
    /// Read the current song and transport state.
    fn fetch_current_state(
        &self,
    ) -> impl Future<Output = Result<PlaybackSnapshot, FetchError>> + Send;

    /// Ask the player to perform `action`. Succeeds only when the server reports success.
    fn send_control(
        &self,
        action: &ControlAction,
    ) -> impl Future<Output = Result<(), ControlError>> + Send;
}

/// `PlayerApi` over plain HTTP GETs.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
    previous_action: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            previous_action: ControlAction::Previous.as_path().to_string(),
        })
    }

    /// Path segment to send for `ControlAction::Previous`.
    pub fn with_previous_action(mut self, name: &str) -> Result<Self, InvalidAction> {
        self.previous_action = name.parse::<ControlAction>()?.as_path().to_string();
        Ok(self)
    }

    fn control_path<'a>(&'a self, action: &'a ControlAction) -> &'a str {
        match action {
            ControlAction::Previous => &self.previous_action,
            other => other.as_path(),
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        // Both paths are relative and built from validated segments.
        self.base.join(path).unwrap_or_else(|_| self.base.clone())
    }
}

impl PlayerApi for HttpApi {
    async fn fetch_current_state(&self) -> Result<PlaybackSnapshot, FetchError> {
        let url = self.endpoint(CURRENT_SONG_PATH);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.text().await?;
        let parsed: CurrentSongResponse = serde_json::from_str(&body)?;
        debug!(
            title = %parsed.song.title,
            current_time = parsed.current_time,
            "fetched current song"
        );
        Ok(parsed.into())
    }

    async fn send_control(&self, action: &ControlAction) -> Result<(), ControlError> {
        let url = self.endpoint(&format!("{CONTROL_PATH}{}", self.control_path(action)));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ControlError::Status(status));
        }
        let body = response.text().await?;
        let parsed: ControlResponse = serde_json::from_str(&body)?;
        match parsed.status.as_deref() {
            Some(SUCCESS) => Ok(()),
            Some(other) => Err(ControlError::Rejected(other.to_string())),
            None => Err(ControlError::Rejected(
                parsed.error.unwrap_or_else(|| "missing status".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection and report the request lines seen.
    async fn serve(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (code, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap();
                let request = String::from_utf8_lossy(&buf[..n]);
                seen.push(request.lines().next().unwrap_or_default().to_string());
                let reply = format!(
                    "HTTP/1.1 {code} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            seen
        });
        (format!("http://{addr}"), handle)
    }

    fn api(base: &str) -> HttpApi {
        HttpApi::new(base, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_parses_current_song() {
        let (base, server) = serve(vec![(
            200,
            r#"{"song":{"title":"A","artist":"B","duration":"3:00"},"current_time":30,"is_playing":true}"#,
        )])
        .await;
        let snapshot = api(&base).fetch_current_state().await.unwrap();
        assert_eq!(snapshot.song.title, "A");
        assert_eq!(snapshot.server_elapsed_seconds, 30.0);
        assert!(snapshot.is_playing);
        assert_eq!(server.await.unwrap(), vec!["GET /api/current_song HTTP/1.1"]);
    }

    #[tokio::test]
    async fn server_errors_and_garbage_become_fetch_errors() {
        let (base, _server) = serve(vec![(500, r#"{"error":"boom"}"#), (200, "not json")]).await;
        let api = api(&base);
        assert_matches!(
            api.fetch_current_state().await,
            Err(FetchError::Status(s)) if s.as_u16() == 500
        );
        assert_matches!(api.fetch_current_state().await, Err(FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn control_requires_success_status() {
        let (base, server) = serve(vec![
            (200, r#"{"status":"success"}"#),
            (200, r#"{"status":"busy"}"#),
            (200, r#"{"error":"unknown action"}"#),
        ])
        .await;
        let api = api(&format!("{base}/"));
        assert_matches!(api.send_control(&ControlAction::Next).await, Ok(()));
        assert_matches!(
            api.send_control(&ControlAction::PlayPause).await,
            Err(ControlError::Rejected(s)) if s == "busy"
        );
        assert_matches!(
            api.send_control(&ControlAction::Custom("prev".into())).await,
            Err(ControlError::Rejected(s)) if s == "unknown action"
        );
        assert_eq!(
            server.await.unwrap(),
            vec![
                "GET /api/control/next HTTP/1.1",
                "GET /api/control/play_pause HTTP/1.1",
                "GET /api/control/prev HTTP/1.1",
            ]
        );
    }

    #[tokio::test]
    async fn previous_uses_the_configured_action_name() {
        let (base, server) = serve(vec![
            (200, r#"{"status":"success"}"#),
            (200, r#"{"status":"success"}"#),
        ])
        .await;
        let default_api = api(&base);
        assert_matches!(default_api.send_control(&ControlAction::Previous).await, Ok(()));
        let prev_api = api(&base).with_previous_action("prev").unwrap();
        assert_matches!(prev_api.send_control(&ControlAction::Previous).await, Ok(()));
        assert_eq!(
            server.await.unwrap(),
            vec!["GET /api/control/previous HTTP/1.1", "GET /api/control/prev HTTP/1.1"]
        );
        assert_matches!(api(&base).with_previous_action("../x"), Err(InvalidAction(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let api = api(&format!("http://{addr}"));
        assert_matches!(api.fetch_current_state().await, Err(FetchError::Transport(_)));
        assert_matches!(
            api.send_control(&ControlAction::Play).await,
            Err(ControlError::Transport(_))
        );
    }
}

// Backend Setup Check
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Probes Ollama's /api/tags and normalizes the status spellings used
// across backend and editor into one closed enum.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::models::setup::{SetupCheckOutcome, SetupState, SetupStatus};

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Debug, Deserialize)]
struct TaggedModel {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TaggedModel {
    fn is_named(&self, wanted: &str) -> bool {
        self.model.as_deref() == Some(wanted) || self.name.as_deref() == Some(wanted)
    }
}

/// Ask the Ollama server which models are installed.
///
/// Any transport or decode failure is reported as `ServerUnavailable`.
pub async fn check_ollama_setup(
    client: &Client,
    base_url: &str,
    required_model: Option<&str>,
) -> SetupCheckOutcome {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));

    let response = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            log::warn!("Setup check got HTTP {} from {}", response.status(), url);
            return SetupCheckOutcome::server_unavailable();
        }
        Err(e) => {
            log::warn!("Setup check could not reach {}: {}", url, e);
            return SetupCheckOutcome::server_unavailable();
        }
    };

    let tags = match response.json::<TagsResponse>().await {
        Ok(tags) => tags,
        Err(e) => {
            log::warn!("Setup check got an unreadable tag list: {}", e);
            return SetupCheckOutcome::server_unavailable();
        }
    };

    if let Some(required) = required_model {
        if !tags.models.iter().any(|m| m.is_named(required)) {
            log::info!("Required model {} is not installed", required);
            return SetupCheckOutcome::model_missing();
        }
    }

    let has_any_model = tags
        .models
        .iter()
        .any(|m| m.model.is_some() || m.name.is_some());
    if has_any_model {
        SetupCheckOutcome::ready()
    } else {
        SetupCheckOutcome::model_missing()
    }
}

/// Known status token, compared case- and separator-insensitively
pub fn parse_setup_status(token: &str) -> Option<SetupStatus> {
    let normalized: String = token
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect();

    match normalized.as_str() {
        "ok" | "ready" => Some(SetupStatus::Ok),
        "offline" | "server_unavailable" => Some(SetupStatus::Offline),
        "missing_model" | "model_missing" => Some(SetupStatus::MissingModel),
        _ => None,
    }
}

/// Map any status token to a `SetupStatus`. Unknown tokens are treated as offline.
pub fn normalize_setup_status(token: &str) -> SetupStatus {
    parse_setup_status(token).unwrap_or_else(|| {
        log::warn!("Unknown setup status {:?}; treating as offline", token);
        SetupStatus::Offline
    })
}

impl SetupState {
    /// Normalize a loosely-typed `{status, guidance?}` response.
    ///
    /// Missing guidance falls back to the status default. Anything
    /// unrecognized becomes the offline state.
    pub fn from_response(response: &Value) -> Self {
        let status = response
            .get("status")
            .and_then(Value::as_str)
            .and_then(parse_setup_status);

        match status {
            Some(status) => {
                let guidance = response
                    .get("guidance")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| status.default_guidance().to_string());
                Self { status, guidance }
            }
            None => Self::offline(),
        }
    }
}

impl From<SetupCheckOutcome> for SetupState {
    fn from(outcome: SetupCheckOutcome) -> Self {
        let status = normalize_setup_status(outcome.status.as_str());
        Self {
            status,
            guidance: outcome.guidance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::setup::SetupProbeStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    async fn spawn_json_server(status: &'static str, body: &'static str) -> (JoinHandle<()>, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        (handle, format!("http://{}", addr))
    }

    async fn probe(status: &'static str, body: &'static str, required: Option<&str>) -> SetupProbeStatus {
        let (server, base_url) = spawn_json_server(status, body).await;
        let outcome = check_ollama_setup(&Client::new(), &base_url, required).await;
        server.await.unwrap();
        outcome.status
    }

    #[tokio::test]
    async fn test_probe_statuses() {
        for (body, required, expected) in [
            (r#"{"models":[{"model":"llama2"}]}"#, Some("llama2"), SetupProbeStatus::Ready),
            (r#"{"models":[{"name":"llama2"}]}"#, None, SetupProbeStatus::Ready),
            (r#"{"models":[{"model":"phi"}]}"#, Some("llama2"), SetupProbeStatus::ModelMissing),
            (r#"{"models":[]}"#, None, SetupProbeStatus::ModelMissing),
            (r#"{}"#, None, SetupProbeStatus::ModelMissing),
            ("not json", None, SetupProbeStatus::ServerUnavailable),
        ] {
            assert_eq!(probe("200 OK", body, required).await, expected, "body: {}", body);
        }
    }

    #[tokio::test]
    async fn test_probe_http_error() {
        assert_eq!(
            probe("500 Internal Server Error", "{}", None).await,
            SetupProbeStatus::ServerUnavailable
        );
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/", port);
        let outcome = check_ollama_setup(&Client::new(), &url, None).await;
        assert_eq!(outcome.status, SetupProbeStatus::ServerUnavailable);
    }

    #[test]
    fn test_normalize_known_tokens() {
        for (token, expected) in [
            ("ok", SetupStatus::Ok),
            ("READY", SetupStatus::Ok),
            ("offline", SetupStatus::Offline),
            ("server_unavailable", SetupStatus::Offline),
            ("Server-Unavailable", SetupStatus::Offline),
            ("missing-model", SetupStatus::MissingModel),
            ("model_missing", SetupStatus::MissingModel),
            (" Missing Model ", SetupStatus::MissingModel),
        ] {
            assert_eq!(normalize_setup_status(token), expected, "token: {}", token);
        }
    }

    #[test]
    fn test_unknown_token_is_offline() {
        assert_eq!(normalize_setup_status("degraded"), SetupStatus::Offline);
        assert_eq!(normalize_setup_status(""), SetupStatus::Offline);
    }

    #[test]
    fn test_state_from_response() {
        let state = SetupState::from_response(&serde_json::json!({ "status": "model_missing" }));
        assert_eq!(state.status, SetupStatus::MissingModel);
        assert_eq!(state.guidance, SetupStatus::MissingModel.default_guidance());

        let state = SetupState::from_response(&serde_json::json!({
            "status": "ready",
            "guidance": "all good"
        }));
        assert_eq!(state, SetupState { status: SetupStatus::Ok, guidance: "all good".to_string() });

        for bad in [
            serde_json::json!(null),
            serde_json::json!("ready"),
            serde_json::json!({ "status": 3 }),
            serde_json::json!({ "status": "weird", "guidance": "ignored" }),
        ] {
            assert_eq!(SetupState::from_response(&bad), SetupState::offline());
        }
    }

    #[test]
    fn test_state_from_probe_outcome() {
        let state = SetupState::from(SetupCheckOutcome::server_unavailable());
        assert_eq!(state.status, SetupStatus::Offline);
        assert!(state.status.needs_attention());
        assert!(!SetupState::from(SetupCheckOutcome::ready()).status.needs_attention());
    }
}

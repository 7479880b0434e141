//! The Matrix client contract: "deliver message M to room R as user U on
//! host H". This is a minimal, idiomatic implementation against the
//! Matrix Client-Server API, not a full SDK.
//!
//! Login happens fresh on every delivery attempt rather than holding a
//! shared session; the room-alias → room-id cache is the one thing that
//! persists across attempts, loaded from [`sv_store::RoomAliasCache`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sv_common::{AlertingError, MatrixConfig, MatrixMessage, Result};
use sv_store::RoomAliasCache;

#[async_trait]
pub trait MatrixClient: Send + Sync {
    async fn send(&self, config: &MatrixConfig, message: &MatrixMessage) -> Result<()>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    user: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct RoomResolution {
    room_id: String,
}

#[derive(Serialize)]
struct RoomMessageEvent<'a> {
    msgtype: &'static str,
    body: &'a str,
}

/// HTTP implementation of [`MatrixClient`] against the Matrix
/// Client-Server API: password login, alias resolution, then a
/// `m.room.message` send.
pub struct HttpMatrixClient {
    http: reqwest::Client,
    room_cache: std::sync::Arc<RoomAliasCache>,
}

impl HttpMatrixClient {
    pub fn new(http: reqwest::Client, room_cache: std::sync::Arc<RoomAliasCache>) -> Self {
        Self { http, room_cache }
    }

    async fn login(&self, config: &MatrixConfig) -> Result<String> {
        let url = format!("{}/_matrix/client/v3/login", config.host.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                kind: "m.login.password",
                user: &config.user,
                password: &config.password,
            })
            .send()
            .await
            .map_err(|e| AlertingError::QueueTransportError(format!("matrix login request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AlertingError::QueueTransportError(format!(
                "matrix login returned {}",
                response.status()
            )));
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| AlertingError::QueueTransportError(format!("matrix login response malformed: {e}")))?;
        Ok(parsed.access_token)
    }

    async fn resolve_room(&self, config: &MatrixConfig, token: &str, room: &str) -> Result<String> {
        if !room.starts_with('#') {
            // Already a room id (or some other non-alias identifier).
            return Ok(room.to_string());
        }
        if let Some(room_id) = self.room_cache.get(room).await {
            return Ok(room_id);
        }

        let url = format!(
            "{}/_matrix/client/v3/directory/room/{}",
            config.host.trim_end_matches('/'),
            urlencode(room)
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AlertingError::QueueTransportError(format!("room resolution request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AlertingError::QueueTransportError(format!(
                "room resolution for {room} returned {}",
                response.status()
            )));
        }

        let resolved: RoomResolution = response
            .json()
            .await
            .map_err(|e| AlertingError::QueueTransportError(format!("room resolution response malformed: {e}")))?;

        let _ = self.room_cache.put(room.to_string(), resolved.room_id.clone()).await;
        Ok(resolved.room_id)
    }
}

#[async_trait]
impl MatrixClient for HttpMatrixClient {
    async fn send(&self, config: &MatrixConfig, message: &MatrixMessage) -> Result<()> {
        let token = self.login(config).await?;
        let room_id = self.resolve_room(config, &token, &message.room).await?;

        let txn_id = uuid::Uuid::new_v4().simple().to_string();
        let url = format!(
            "{}/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            config.host.trim_end_matches('/'),
            urlencode(&room_id),
            txn_id
        );

        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&RoomMessageEvent {
                msgtype: "m.text",
                body: &message.message,
            })
            .send()
            .await
            .map_err(|e| AlertingError::QueueTransportError(format!("matrix send request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AlertingError::QueueTransportError(format!(
                "matrix send returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_a_message_to_a_room_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "event_id": "$abc"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(RoomAliasCache::load(dir.path().join("state.json")).await);
        let client = HttpMatrixClient::new(reqwest::Client::new(), cache);

        let config = MatrixConfig {
            host: server.uri(),
            user: "bot".to_string(),
            password: "secret".to_string(),
        };
        let message = MatrixMessage {
            room: "!roomid:example.org".to_string(),
            message: "hello".to_string(),
        };

        client.send(&config, &message).await.unwrap();
    }

    #[tokio::test]
    async fn resolves_and_caches_a_room_alias() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "room_id": "!resolved:example.org"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "event_id": "$abc"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(RoomAliasCache::load(dir.path().join("state.json")).await);
        let client = HttpMatrixClient::new(reqwest::Client::new(), cache);

        let config = MatrixConfig {
            host: server.uri(),
            user: "bot".to_string(),
            password: "secret".to_string(),
        };
        let message = MatrixMessage {
            room: "#ops:example.org".to_string(),
            message: "hello".to_string(),
        };

        client.send(&config, &message).await.unwrap();
        // Second send should hit the cache, not the directory endpoint again.
        client.send(&config, &message).await.unwrap();
    }
}

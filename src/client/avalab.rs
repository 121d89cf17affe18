//! Avalab API client implementation

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;

use super::api::{AuthApi, AvatarApi};
use super::models::{
    Empty, PrepareAvatarRequest, PrepareAvatarResponse, RegisterLoraRequest, TokenRequest,
    TokenResponse, UserProfile,
};
use super::request::{
    API_KEY_HEADER, Auth, MODEL_CONTENT_TYPE, OAUTH_TOKEN_HEADER, ProgressFn, ProgressPoller,
    REQUEST_ID_HEADER, RequestBody, THUMBNAIL_CONTENT_TYPE, decode_body,
};
use crate::config::Config;
use crate::error::{ApiError, RequestFailure, Result};

/// Connection establishment limit. Uploads have no overall timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Avalab API client
pub struct AvalabClient {
    http: HttpClient,
    api_host: String,
    api_key: String,
    client_id: String,
    redirect_uri: String,
}

impl std::fmt::Debug for AvalabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvalabClient")
            .field("api_host", &self.api_host)
            .finish_non_exhaustive()
    }
}

impl AvalabClient {
    /// Create a client for the hosts and credentials in `config`
    pub fn new(config: &Config) -> Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("avalab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::from)?;

        Ok(Self {
            http,
            api_host: config.api_host.trim_end_matches('/').to_string(),
            api_key: config.require_api_key()?.to_string(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_host, path)
    }

    /// Send a request and decode its response.
    ///
    /// Any transport failure or non-2xx status becomes
    /// [`ApiError::RequestFailed`] carrying the raw body and request id.
    pub async fn request<Res: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
        auth: Auth<'_>,
        progress: Option<ProgressFn>,
    ) -> Result<(StatusCode, Res)> {
        log::debug!("{} {}", method, url);

        let prepared = body.prepare().await?;

        let mut builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, prepared.content_type)
            .header(API_KEY_HEADER, &self.api_key);
        if let Auth::Bearer(token) = auth {
            builder = builder.header(OAUTH_TOKEN_HEADER, token);
        }
        if let Some(body) = prepared.body {
            builder = builder
                .header(CONTENT_LENGTH, prepared.total)
                .body(body);
        }

        let poller = progress
            .as_ref()
            .map(|p| ProgressPoller::spawn(prepared.sent, prepared.total, p.clone()));
        let sent = builder.send().await;
        if let Some(poller) = poller {
            poller.finish().await;
        }

        let response = sent.map_err(ApiError::from)?;
        let status = response.status();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let text = response.text().await.map_err(ApiError::from)?;

        if !status.is_success() {
            log::debug!(
                "{} failed with {} (request id {:?}): {}",
                url,
                status,
                request_id,
                text
            );
            return Err(ApiError::RequestFailed(RequestFailure {
                status: Some(status.as_u16()),
                error: format!("HTTP {}", status),
                body: text,
                request_id,
            })
            .into());
        }

        let decoded = decode_body(&text)?;
        if let Some(progress) = &progress {
            progress(1.0);
        }
        Ok((status, decoded))
    }

    async fn token(&self, body: TokenRequest) -> Result<TokenResponse> {
        let (_, token) = self
            .request(
                Method::POST,
                &self.url("/v1/authorize/token"),
                RequestBody::Json(serde_json::to_value(body)?),
                Auth::ApiKey,
                None,
            )
            .await?;
        Ok(token)
    }

    async fn put_file(
        &self,
        access_token: &str,
        upload_url: &str,
        path: &Path,
        content_type: &'static str,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        let (_, Empty {}) = self
            .request(
                Method::PUT,
                upload_url,
                RequestBody::File {
                    path: path.to_path_buf(),
                    content_type,
                },
                Auth::Bearer(access_token),
                progress,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for AvalabClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.token(TokenRequest::authorization_code(
            code,
            &self.client_id,
            &self.redirect_uri,
        ))
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.token(TokenRequest::refresh(
            refresh_token,
            &self.client_id,
            &self.redirect_uri,
        ))
        .await
    }
}

#[async_trait]
impl AvatarApi for AvalabClient {
    async fn current_user(
        &self,
        access_token: &str,
        progress: Option<ProgressFn>,
    ) -> Result<UserProfile> {
        let (_, profile) = self
            .request(
                Method::GET,
                &self.url("/v1/user/current"),
                RequestBody::Empty,
                Auth::Bearer(access_token),
                progress,
            )
            .await?;
        Ok(profile)
    }

    async fn prepare_avatar(
        &self,
        access_token: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PrepareAvatarResponse> {
        let body = serde_json::to_value(PrepareAvatarRequest::default())?;
        let (_, prepared) = self
            .request(
                Method::POST,
                &self.url("/v1/avatar/prepare"),
                RequestBody::Json(body),
                Auth::Bearer(access_token),
                progress,
            )
            .await?;
        Ok(prepared)
    }

    async fn upload_model(
        &self,
        access_token: &str,
        upload_url: &str,
        model_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.put_file(
            access_token,
            upload_url,
            model_path,
            MODEL_CONTENT_TYPE,
            progress,
        )
        .await
    }

    async fn upload_thumbnail(
        &self,
        access_token: &str,
        upload_url: &str,
        thumbnail_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.put_file(
            access_token,
            upload_url,
            thumbnail_path,
            THUMBNAIL_CONTENT_TYPE,
            progress,
        )
        .await
    }

    async fn complete_avatar(
        &self,
        access_token: &str,
        avatar_id: &str,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        let (_, Empty {}) = self
            .request(
                Method::POST,
                &self.url(&format!("/v1/avatar/{}/complete", avatar_id)),
                RequestBody::Json(serde_json::json!({})),
                Auth::Bearer(access_token),
                progress,
            )
            .await?;
        Ok(())
    }

    async fn register_lora(
        &self,
        access_token: &str,
        avatar_id: &str,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        let body = serde_json::to_value(RegisterLoraRequest {
            avatar_id: avatar_id.to_string(),
        })?;
        let (_, Empty {}) = self
            .request(
                Method::POST,
                &self.url("/v1/lora"),
                RequestBody::Json(body),
                Auth::Bearer(access_token),
                progress,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn client_for(server: &mockito::Server) -> AvalabClient {
        let config = Config {
            api_host: server.url(),
            api_key: Some("test-key".to_string()),
            ..Config::default()
        };
        AvalabClient::new(&config).unwrap()
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = AvalabClient::new(&Config::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_api_key_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/authorize/token")
            .match_header("x-avalab-api-key", "test-key")
            .match_header("content-type", "application/json")
            .match_header("x-avalab-oauth-token", Matcher::Missing)
            .match_body(Matcher::Json(json!({
                "grant_type": "authorization_code",
                "code": "ABC123",
                "client_id": crate::config::DEFAULT_CLIENT_ID,
                "redirect_uri": "http://localhost:4444/"
            })))
            .with_status(200)
            .with_body(
                r#"{"access_token":"a","refresh_token":"r","expires_at":"2030-01-01T00:00:00Z","scope":["avatar"]}"#,
            )
            .create_async()
            .await;

        let token = client_for(&server).exchange_code("ABC123").await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.access_token, "a");
        assert_eq!(token.scope, vec!["avatar".to_string()]);
    }

    #[tokio::test]
    async fn test_bearer_header_on_authorized_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/user/current")
            .match_header("x-avalab-oauth-token", "tok-1")
            .match_header("x-avalab-api-key", "test-key")
            .with_status(200)
            .with_body(r#"{"id":"u-1","name":"mika","model_registration_left":2}"#)
            .create_async()
            .await;

        let profile = client_for(&server)
            .current_user("tok-1", None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(profile.id, "u-1");
        assert_eq!(profile.model_registration_left, 2);
    }

    #[tokio::test]
    async fn test_failure_carries_body_and_request_id() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/avatar/prepare")
            .with_status(500)
            .with_header("X-Avalab-Request-ID", "req-9")
            .with_body("quota exceeded")
            .create_async()
            .await;

        let err = client_for(&server)
            .prepare_avatar("tok", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RequestFailed);
        let failure = err.request_failure().unwrap();
        assert_eq!(failure.status, Some(500));
        assert_eq!(failure.body, "quota exceeded");
        assert_eq!(failure.request_id.as_deref(), Some("req-9"));
    }

    #[tokio::test]
    async fn test_null_body_decodes_as_empty_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/avatar/av-1/complete")
            .match_body(Matcher::Json(json!({})))
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        client_for(&server)
            .complete_avatar("tok", "av-1", None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_lora_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/lora")
            .match_body(Matcher::Json(json!({ "avatar_id": "av-1" })))
            .with_status(201)
            .create_async()
            .await;

        client_for(&server)
            .register_lora("tok", "av-1", None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_undecodable_success_is_decode_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/avatar/prepare")
            .with_status(200)
            .with_body(r#"{"avatar_id":"only"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .prepare_avatar("tok", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);
    }

    #[tokio::test]
    async fn test_model_upload_streams_file_with_progress() {
        let mut server = mockito::Server::new_async().await;
        let payload = vec![7u8; 512 * 1024];
        let mock = server
            .mock("PUT", "/upload/model")
            .match_header("content-type", MODEL_CONTENT_TYPE)
            .match_header("content-length", payload.len().to_string().as_str())
            .match_header("x-avalab-oauth-token", "tok")
            .match_body(payload.clone())
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.bundle");
        std::fs::write(&path, &payload).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));

        let url = format!("{}/upload/model", server.url());
        client_for(&server)
            .upload_model("tok", &url, &path, Some(progress))
            .await
            .unwrap();

        mock.assert_async().await;
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[tokio::test]
    async fn test_transport_error_is_request_failure() {
        let config = Config {
            api_host: "http://127.0.0.1:1".to_string(),
            api_key: Some("k".to_string()),
            ..Config::default()
        };
        let client = AvalabClient::new(&config).unwrap();
        let err = client.refresh_token("r").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestFailed);
        assert_eq!(err.request_failure().unwrap().status, None);
    }
}

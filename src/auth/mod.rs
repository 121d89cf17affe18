//! Authentication: OAuth redirect capture, token persistence and refresh

mod listener;
pub mod sealer;
mod token;
mod token_store;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;

pub use listener::{RedirectListener, authorize_url};
pub use sealer::{AesGcmSealer, PlaintextSealer, SealMethod, SecretSealer};
pub use token::TokenRecord;
pub use token_store::TokenStore;

use crate::client::AuthApi;
use crate::error::{ApiError, AuthError, Error, RequestFailure, Result};

/// Return a usable token, refreshing and persisting an expired one.
///
/// A failed refresh deletes the stored token so the next run asks the user
/// to sign in again.
pub async fn ensure_valid_token<C>(client: &C, store: &TokenStore) -> Result<TokenRecord>
where
    C: AuthApi + ?Sized,
{
    let record = store.load().ok_or(AuthError::NotAuthenticated)?;
    if !record.is_expired() {
        return Ok(record);
    }

    log::info!("Access token expired, refreshing");
    let refreshed = match client.refresh_token(&record.refresh_token).await {
        Ok(response) => TokenRecord::try_from(response),
        Err(e) => Err(into_api_error(e)),
    };

    match refreshed {
        Ok(fresh) => {
            store.save(Some(&fresh))?;
            log::debug!("Stored refreshed token");
            Ok(fresh)
        }
        Err(e) => {
            log::warn!("Token refresh failed: {}", e);
            if let Err(clear) = store.save(None) {
                log::warn!("Could not clear stored token: {}", clear);
            }
            Err(AuthError::RefreshFailed(Box::new(e)).into())
        }
    }
}

/// Exchange an authorization code and persist the resulting token
pub async fn complete_login<C>(
    client: &C,
    store: &TokenStore,
    code: &str,
) -> Result<(TokenRecord, SealMethod)>
where
    C: AuthApi + ?Sized,
{
    let response = client.exchange_code(code).await?;
    let record = TokenRecord::try_from(response)?;
    let method = store.save(Some(&record))?.unwrap_or_else(|| store.method());
    Ok((record, method))
}

/// Run the interactive sign-in.
///
/// Clears any stored token, starts `listener`, calls `on_ready` with the bound
/// address (the caller opens the browser there), then waits up to `timeout`
/// for the redirect. The listener is stopped before the code is exchanged.
pub async fn login<C, F>(
    client: &C,
    store: &TokenStore,
    listener: &mut RedirectListener,
    timeout: Duration,
    on_ready: F,
) -> Result<(TokenRecord, SealMethod)>
where
    C: AuthApi + ?Sized,
    F: FnOnce(SocketAddr),
{
    store.save(None)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let addr = listener
        .start(move |code| {
            let _ = tx.send(code);
        })
        .await?;
    on_ready(addr);

    let received = tokio::time::timeout(timeout, rx.recv()).await;
    listener.stop().await;

    let code = match received {
        Ok(Some(code)) => code,
        Ok(None) => return Err(AuthError::Listener("redirect listener closed".to_string()).into()),
        Err(_) => return Err(AuthError::LoginTimedOut(timeout).into()),
    };

    complete_login(client, store, &code).await
}

/// Keep API failures as-is and describe anything else as a request failure
fn into_api_error(err: Error) -> ApiError {
    match err {
        Error::Api(api) => api,
        other => ApiError::RequestFailed(RequestFailure {
            status: None,
            error: other.to_string(),
            body: String::new(),
            request_id: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAvalabClient;
    use crate::client::models::TokenResponse;
    use crate::error::ErrorKind;
    use crate::store::PreferenceStore;
    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn plaintext_store() -> TokenStore {
        TokenStore::new(
            PreferenceStore::open_in_memory().unwrap(),
            Box::new(PlaintextSealer),
        )
    }

    fn stored(store: &TokenStore, expires_in: chrono::Duration) -> TokenRecord {
        let record = TokenRecord {
            access_token: "old-access".to_string(),
            refresh_token: "old-refresh".to_string(),
            expires_at: Some(Utc::now() + expires_in),
        };
        store.save(Some(&record)).unwrap();
        record
    }

    fn api_failure() -> ApiError {
        ApiError::RequestFailed(RequestFailure {
            status: Some(400),
            error: "HTTP 400 Bad Request".to_string(),
            body: "invalid_grant".to_string(),
            request_id: None,
        })
    }

    #[tokio::test]
    async fn test_no_token_is_not_authenticated() {
        let client = MockAvalabClient::new();
        let store = plaintext_store();

        let err = ensure_valid_token(&client, &store).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
        assert_eq!(client.call_counts().await.total(), 0);
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_calls() {
        let client = MockAvalabClient::new();
        let store = plaintext_store();
        let record = stored(&store, chrono::Duration::hours(1));

        assert_eq!(ensure_valid_token(&client, &store).await.unwrap(), record);
        assert_eq!(client.call_counts().await.total(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_saved() {
        let client = MockAvalabClient::new()
            .with_token(TokenResponse {
                access_token: "new-access".to_string(),
                refresh_token: "new-refresh".to_string(),
                expires_at: (Utc::now() + chrono::Duration::hours(2)).to_rfc3339(),
                scope: vec![],
            })
            .await;
        let store = plaintext_store();
        stored(&store, -chrono::Duration::minutes(1));

        let fresh = ensure_valid_token(&client, &store).await.unwrap();

        assert_eq!(fresh.access_token, "new-access");
        assert_eq!(store.load(), Some(fresh));
        assert_eq!(client.call_counts().await.refresh_token, 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_token() {
        let client = MockAvalabClient::new().with_error(api_failure()).await;
        let store = plaintext_store();
        stored(&store, -chrono::Duration::minutes(1));

        let err = ensure_valid_token(&client, &store).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthExpiredRefreshFailed);
        assert_eq!(err.request_failure().unwrap().body, "invalid_grant");
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_complete_login_persists_token() {
        let client = MockAvalabClient::new();
        let store = plaintext_store();

        let (record, method) = complete_login(&client, &store, "code-1").await.unwrap();

        assert_eq!(method, SealMethod::Plaintext);
        assert_eq!(record.access_token, "mock-access-token");
        assert_eq!(store.load(), Some(record));
    }

    #[tokio::test]
    async fn test_login_receives_code_from_redirect() {
        let client = MockAvalabClient::new();
        let store = plaintext_store();
        stored(&store, chrono::Duration::hours(1));
        let mut listener = RedirectListener::new(0);

        let (record, _) = login(
            &client,
            &store,
            &mut listener,
            Duration::from_secs(5),
            |addr| {
                tokio::spawn(async move {
                    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                    stream
                        .write_all(b"GET /?code=ABC123 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                        .await
                        .unwrap();
                    let mut response = Vec::new();
                    let _ = stream.read_to_end(&mut response).await;
                });
            },
        )
        .await
        .unwrap();

        assert_eq!(record.access_token, "mock-access-token");
        assert!(!listener.is_running());
        assert_eq!(client.call_counts().await.exchange_code, 1);
    }

    #[tokio::test]
    async fn test_login_times_out_and_clears_old_token() {
        let client = MockAvalabClient::new();
        let store = plaintext_store();
        stored(&store, chrono::Duration::hours(1));
        let mut listener = RedirectListener::new(0);

        let err = login(
            &client,
            &store,
            &mut listener,
            Duration::from_millis(50),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::LoginTimedOut(_))));
        assert!(!listener.is_running());
        assert!(store.load().is_none());
        assert_eq!(client.call_counts().await.total(), 0);
    }
}

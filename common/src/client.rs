// common/src/client.rs
//! HTTP client for the `/api/auth/*` endpoints, used by the sign-in page
//! and by the desktop app when it redeems its code.
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{AuthError, ErrorBody};
use crate::flow::driver::AuthBackend;
use crate::protocol::messages::{
    DesktopCodeRequest, DesktopCodeResponse, NonceRequest, NonceResponse, RedeemRequest,
    RedeemResponse, SessionInfoResponse, SiweRequest, SiweResponse,
};

#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    client: Client,
    base: Url,
}

impl HttpAuthBackend {
    /// `base` is the server origin, e.g. `https://snelabs.space`.
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        Ok(Self::with_client(Client::new(), Url::parse(base)?))
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base.join(path).map_err(|e| {
            tracing::error!("Bad endpoint {} on {}: {}", path, self.base, e);
            AuthError::NetworkError
        })
    }

    /// Desktop app side: trade the deep-link code for a bearer token.
    pub async fn redeem(&self, code: &str, state: Option<&str>) -> Result<RedeemResponse, AuthError> {
        let request = RedeemRequest {
            code: code.to_string(),
            state: state.map(str::to_string),
        };
        let url = self.endpoint("/api/auth/redeem")?;
        self.send(self.client.post(url).json(&request)).await
    }

    pub async fn desktop_code(&self, token: &str, state: &str) -> Result<DesktopCodeResponse, AuthError> {
        let request = DesktopCodeRequest {
            state: state.to_string(),
        };
        let url = self.endpoint("/api/auth/desktop-code")?;
        self.send(self.client.post(url).bearer_auth(token).json(&request))
            .await
    }

    pub async fn session_info(&self, token: &str) -> Result<SessionInfoResponse, AuthError> {
        let url = self.endpoint("/api/auth/verify")?;
        self.send(self.client.get(url).bearer_auth(token)).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let url = self.endpoint("/api/auth/logout")?;
        let response = self.dispatch(self.client.post(url).bearer_auth(token)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(read_error(response).await)
        }
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Response, AuthError> {
        request.send().await.map_err(|e| {
            tracing::warn!("Auth request failed: {}", e);
            AuthError::NetworkError
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AuthError> {
        let response = self.dispatch(request).await?;
        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        response.json::<T>().await.map_err(|e| {
            tracing::warn!("Malformed auth response: {}", e);
            AuthError::NetworkError
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn request_nonce(&self, request: &NonceRequest) -> Result<NonceResponse, AuthError> {
        let url = self.endpoint("/api/auth/nonce")?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn verify(&self, request: &SiweRequest) -> Result<SiweResponse, AuthError> {
        let url = self.endpoint("/api/auth/siwe")?;
        self.send(self.client.post(url).json(request)).await
    }
}

async fn read_error(response: Response) -> AuthError {
    let status = response.status();
    match response.text().await {
        Ok(body) => decode_error(status, &body),
        Err(e) => {
            tracing::warn!("Unreadable error body ({}): {}", status, e);
            AuthError::NetworkError
        }
    }
}

/// Map an error response back to its code. Anything the server did not
/// describe with a known code is a `NetworkError`.
fn decode_error(status: StatusCode, body: &str) -> AuthError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => AuthError::from_code(&parsed.error.code).unwrap_or_else(|| {
            tracing::warn!("Unknown error code {} ({})", parsed.error.code, status);
            AuthError::NetworkError
        }),
        Err(_) => {
            tracing::warn!("Non-JSON error response ({})", status);
            AuthError::NetworkError
        }
    }
}

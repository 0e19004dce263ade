use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::Session;
use crate::validation::{validate_password_pair, validate_phone, validate_required};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl SignUpRequest {
    /// Checks the form and normalizes the phone number in place.
    pub fn validate(&mut self) -> Result<(), ApiError> {
        validate_required("username", &self.username)?;
        validate_password_pair(&self.password, &self.confirm_password)?;
        if let Some(phone) = &self.phone {
            self.phone = Some(validate_phone(phone)?);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "error")]
    message: String,
}

/// Bearer-token REST client. Cheap to clone; clones share the connection pool
/// and the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Session) -> Result<Self, ApiError> {
        let mut base = config.api_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Http)?;

        Ok(Self {
            base_url,
            http,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        tracing::debug!("GET {}", url);
        let response = self.send(self.http.get(url)).await?;
        Self::decode(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        let response = self.send(self.http.post(url).json(body)).await?;
        Self::decode(response).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        self.send(self.http.post(url)).await?;
        Ok(())
    }

    // Authentication endpoints

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SignInResponse, ApiError> {
        validate_required("username", username)?;
        validate_required("password", password)?;

        let req = SignInRequest { username, password };
        let response: SignInResponse = self.post_json("auth/signin", &req).await?;
        self.session.sign_in(&response.access_token)?;
        tracing::info!("Signed in as {}", response.username.as_deref().unwrap_or(username));
        Ok(response)
    }

    pub async fn sign_up(&self, mut req: SignUpRequest) -> Result<(), ApiError> {
        req.validate()?;
        let url = self.endpoint("auth/signup")?;
        self.send(self.http.post(url).json(&req)).await?;
        Ok(())
    }

    pub fn sign_out(&self) -> Result<(), ApiError> {
        self.session.sign_out()?;
        Ok(())
    }

    // Helper methods

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.session.token();
        let request = match &token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            tracing::warn!("Request failed: {}", e);
            ApiError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.session.expire(token.as_deref());
            return Err(ApiError::Unauthorized);
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };
        tracing::warn!("API error ({}): {}", status, message);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

//! HTTP client for the scan server API

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};

/// Version prefix joined onto the server base URL
pub const API_VERSION_PATH: &str = "api/v1/";

/// What to do with a response before handing it back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseHandler {
    /// Return the response untouched, whatever its status code
    Echo,
    /// Turn 4xx and 5xx responses into errors
    #[default]
    Code,
}

/// Client for the scan server API.
///
/// Endpoints are relative to `<base>/api/v1/`, e.g. `client.get("scans/")`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    handler: ResponseHandler,
}

impl ApiClient {
    /// Build a client. An explicit `url` wins over `qcs.hostname` from config.
    pub fn new(config: &HarnessConfig, url: Option<&str>) -> HarnessResult<Self> {
        let base = resolve_base_url(config, url)?;
        let qcs = config.qcs.clone().unwrap_or_default();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(qcs.request_timeout_secs))
            .danger_accept_invalid_certs(!qcs.ssl_verify)
            .build()?;

        Ok(Self {
            http,
            base_url: base.join(API_VERSION_PATH)?,
            token: qcs.token,
            handler: ResponseHandler::default(),
        })
    }

    pub fn with_handler(mut self, handler: ResponseHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `endpoint` against the versioned base URL
    pub fn url_for(&self, endpoint: &str) -> HarnessResult<Url> {
        Ok(self.base_url.join(endpoint)?)
    }

    pub async fn get(&self, endpoint: &str) -> HarnessResult<Response> {
        self.request::<()>(Method::GET, endpoint, None).await
    }

    pub async fn head(&self, endpoint: &str) -> HarnessResult<Response> {
        self.request::<()>(Method::HEAD, endpoint, None).await
    }

    pub async fn delete(&self, endpoint: &str) -> HarnessResult<Response> {
        self.request::<()>(Method::DELETE, endpoint, None).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, endpoint: &str, payload: &T) -> HarnessResult<Response> {
        self.request(Method::POST, endpoint, Some(payload)).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, endpoint: &str, payload: &T) -> HarnessResult<Response> {
        self.request(Method::PUT, endpoint, Some(payload)).await
    }

    /// GET and decode the body. Error status codes always fail here,
    /// whatever the configured handler.
    pub async fn get_json<R: DeserializeOwned>(&self, endpoint: &str) -> HarnessResult<R> {
        let response = self.get(endpoint).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// POST `payload` and decode the body, failing on error status codes
    pub async fn post_json<T, R>(&self, endpoint: &str, payload: &T) -> HarnessResult<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(endpoint, payload).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&T>,
    ) -> HarnessResult<Response> {
        let url = self.url_for(endpoint)?;
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Token {}", token));
        }
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }

        let response = builder.send().await?;
        match self.handler {
            ResponseHandler::Echo => Ok(response),
            ResponseHandler::Code => Ok(response.error_for_status()?),
        }
    }
}

fn resolve_base_url(config: &HarnessConfig, url: Option<&str>) -> HarnessResult<Url> {
    let base = match (url, &config.qcs) {
        (Some(url), _) => url.to_string(),
        (None, Some(qcs)) => qcs.hostname.clone().ok_or_else(|| {
            HarnessError::BaseUrlNotFound(
                "'qcs' section specified in config file, but no 'hostname' key found".to_string(),
            )
        })?,
        (None, None) => {
            return Err(HarnessError::BaseUrlNotFound(
                "no base url was given, either explicitly or through the 'qcs' section of the config file"
                    .to_string(),
            ))
        }
    };

    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(HarnessError::BaseUrlNotFound(format!(
            "'{}' cannot be used: valid hostnames start with http:// or https://",
            base
        )));
    }

    Ok(Url::parse(&base)?)
}

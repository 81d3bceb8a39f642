//! HTTP client for the Marathon REST API.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::application::{AppsResponse, TasksResponse};
use super::{Application, Marathon, MarathonError, Task};

/// Marathon address used when none is configured.
pub const DEFAULT_MARATHON_URI: &str = "http://marathon.mesos:8080";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for [`MarathonClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub uri: String,
    pub basic_auth_user: Option<String>,
    pub basic_auth_password: Option<String>,
    pub dcos_token: Option<String>,
}

impl ClientConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth_user = Some(user.into());
        self.basic_auth_password = Some(password.into());
        self
    }

    pub fn with_dcos_token(mut self, token: impl Into<String>) -> Self {
        self.dcos_token = Some(token.into());
        self
    }
}

pub struct MarathonClient {
    base_url: String,
    config: ClientConfig,
    client: reqwest::Client,
}

impl MarathonClient {
    /// Builds a client.  A URI without a scheme is assumed to be plain
    /// HTTP, an empty one falls back to [`DEFAULT_MARATHON_URI`].
    pub fn new(config: ClientConfig) -> Result<Self, MarathonError> {
        let base_url = normalize_uri(&config.uri)?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url,
            config,
            client,
        })
    }

    pub fn uri(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json");

        // Both schemes share the Authorization header; the token wins.
        if let Some(token) = self.config.dcos_token.as_deref().filter(|t| !t.is_empty()) {
            return request.header(AUTHORIZATION, format!("token={}", token));
        }

        if let (Some(user), Some(password)) =
            (&self.config.basic_auth_user, &self.config.basic_auth_password)
        {
            if !user.is_empty() && !password.is_empty() {
                request = request.basic_auth(user, Some(password));
            }
        }

        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, MarathonError> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(parse_error(response).await)
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, MarathonError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Marathon for MarathonClient {
    async fn ping(&self) -> Result<(), MarathonError> {
        self.send(self.get("/ping")).await?;
        Ok(())
    }

    async fn applications(&self, label: &str) -> Result<Vec<Application>, MarathonError> {
        let request = self.get("/v2/apps").query(&[("label", label)]);
        let body: AppsResponse = self.get_json(request).await?;
        debug!("Marathon returned {} applications for {}", body.apps.len(), label);
        Ok(body.apps)
    }

    async fn tasks(&self, app_id: &str) -> Result<Vec<Task>, MarathonError> {
        let path = format!("/v2/apps/{}/tasks", app_id.trim_start_matches('/'));
        let body: TasksResponse = self.get_json(self.get(&path)).await?;
        Ok(body.tasks)
    }
}

async fn parse_error(response: Response) -> MarathonError {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.message,
        Err(_) if body.is_empty() => "no response body".to_string(),
        Err(_) => body,
    };

    MarathonError::Status { status, message }
}

fn normalize_uri(uri: &str) -> Result<String, MarathonError> {
    let uri = uri.trim();
    let candidate = if uri.is_empty() {
        DEFAULT_MARATHON_URI.to_string()
    } else if uri.contains("://") {
        uri.to_string()
    } else {
        format!("http://{}", uri)
    };

    let parsed = Url::parse(&candidate).map_err(|e| MarathonError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.host_str().is_none() {
        return Err(MarathonError::InvalidUri {
            uri: uri.to_string(),
            reason: "missing host".into(),
        });
    }

    Ok(candidate.trim_end_matches('/').to_string())
}

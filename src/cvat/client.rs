use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::models::{
    DataRequest, DataResponse, LoginRequest, LoginResponse, RequestState, RequestStatus,
    TaskResponse, TaskSpec, IMAGE_QUALITY,
};
use crate::config::{CvatCredentials, RunSettings};
use crate::import::JobRecord;
use crate::worker::TaskCreator;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response from CVAT: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("data import for task {task_id} failed: {message}")]
    ImportFailed { task_id: u64, message: String },

    #[error("data import for task {task_id} did not finish within {timeout:?}")]
    ImportTimeout { task_id: u64, timeout: Duration },
}

/// HTTP behaviour of the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub wait_for_import: bool,
    pub import_poll_interval: Duration,
    pub import_timeout: Duration,
}

impl From<&RunSettings> for ClientOptions {
    fn from(settings: &RunSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout,
            wait_for_import: settings.wait_for_import,
            import_poll_interval: settings.import_poll_interval,
            import_timeout: settings.import_timeout,
        }
    }
}

/// Authenticated session against a CVAT server
///
/// One session is shared by every worker behind an `Arc`. The underlying
/// `reqwest::Client` pools connections across them.
pub struct CvatClient {
    http: Client,
    base: Url,
    token: String,
    organization: Option<String>,
    options: ClientOptions,
}

impl CvatClient {
    /// Log in and return a session
    ///
    /// # Returns
    /// - `Ok(CvatClient)` - session token acquired
    /// - `Err(RemoteError)` - server unreachable or credentials rejected
    pub async fn authenticate(
        credentials: &CvatCredentials,
        options: ClientOptions,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(options.request_timeout).build()?;
        let base = normalize_base(&credentials.host);

        info!(
            "Authenticating as {} against {}",
            credentials.username, base
        );

        let response = http
            .post(base.join("api/auth/login")?)
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;
        let login: LoginResponse = parse_json(ensure_success(response).await?).await?;

        info!("CVAT client setup complete");

        Ok(Self {
            http,
            base,
            token: login.key,
            organization: credentials.organization.clone(),
            options,
        })
    }

    /// Create a task for `record` from its remote image and return the task id
    pub async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError> {
        let spec = TaskSpec::for_record(record);
        debug!(record_id = %record.id, "Creating task {}", spec.name);

        let response = self
            .authorized(self.http.post(self.base.join("api/tasks")?))
            .json(&spec)
            .send()
            .await?;
        let task: TaskResponse = parse_json(ensure_success(response).await?).await?;

        debug!(record_id = %record.id, task_id = task.id, "Attaching remote image");
        let response = self
            .authorized(
                self.http
                    .post(self.base.join(&format!("api/tasks/{}/data", task.id))?),
            )
            .json(&DataRequest {
                image_quality: IMAGE_QUALITY,
                remote_files: vec![record.image_url.as_str()],
            })
            .send()
            .await?;
        let data: DataResponse = parse_json_or_default(ensure_success(response).await?).await?;

        if self.options.wait_for_import {
            match data.rq_id {
                Some(rq_id) => self.wait_for_import(task.id, &rq_id).await?,
                None => warn!(
                    task_id = task.id,
                    "Server returned no request id, not waiting for data import"
                ),
            }
        }

        Ok(task.id)
    }

    /// Poll the background import request until it settles
    async fn wait_for_import(&self, task_id: u64, rq_id: &str) -> Result<(), RemoteError> {
        let deadline = Instant::now() + self.options.import_timeout;
        let mut status_url = self.base.join("api/requests/")?;
        status_url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(rq_id);

        loop {
            let response = self.authorized(self.http.get(status_url.clone())).send().await?;
            let status: RequestStatus = parse_json(ensure_success(response).await?).await?;

            match status.status {
                RequestState::Finished => {
                    debug!(task_id, "Data import finished");
                    return Ok(());
                }
                RequestState::Failed => {
                    return Err(RemoteError::ImportFailed {
                        task_id,
                        message: status
                            .message
                            .unwrap_or_else(|| "no message from server".to_string()),
                    });
                }
                state => debug!(task_id, ?state, "Data import still running"),
            }

            if Instant::now() + self.options.import_poll_interval > deadline {
                return Err(RemoteError::ImportTimeout {
                    task_id,
                    timeout: self.options.import_timeout,
                });
            }
            sleep(self.options.import_poll_interval).await;
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Authorization", format!("Token {}", self.token));
        match &self.organization {
            Some(slug) => request.header("X-Organization", slug),
            None => request,
        }
    }
}

#[async_trait]
impl TaskCreator for CvatClient {
    async fn create_task(&self, record: &JobRecord) -> Result<u64, RemoteError> {
        CvatClient::create_task(self, record).await
    }
}

/// `Url::join` replaces the last path segment unless the base ends with `/`.
fn normalize_base(host: &Url) -> Url {
    let mut base = host.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body: truncate(body.trim()),
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Some CVAT versions answer the data upload with an empty 202.
async fn parse_json_or_default<T>(response: Response) -> Result<T, RemoteError>
where
    T: DeserializeOwned + Default,
{
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_gets_trailing_slash() {
        let host = Url::parse("https://cvat.example/prefix").unwrap();
        let base = normalize_base(&host);
        assert_eq!(
            base.join("api/tasks").unwrap().as_str(),
            "https://cvat.example/prefix/api/tasks"
        );
    }

    #[test]
    fn root_host_is_unchanged() {
        let host = Url::parse("https://app.cvat.ai/").unwrap();
        assert_eq!(normalize_base(&host), host);
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        let truncated = truncate(&body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= MAX_ERROR_BODY + 3);
    }

    #[test]
    fn status_error_renders_code_and_body() {
        let err = RemoteError::Status {
            status: 400,
            body: "labels: duplicate name".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 400: labels: duplicate name");
    }
}

//! GitHub contents API backend.
//!
//! Documents live as files in a repository; every write is a commit and the
//! blob SHA returned by the API is the document revision.

use std::time::Duration;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Credentials, Settings};
use crate::error::{Error, Result};
use crate::storage::traits::{RemoteFile, RemoteStore, Revision};

const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone)]
pub struct GithubStore {
    client: Client,
    api_base: String,
    repo: String,
    branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

impl GithubStore {
    pub fn new(credentials: &Credentials, settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", credentials.github_token))
            .map_err(|_| Error::Config("GITHUB_TOKEN contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        let agent = HeaderValue::from_str(&settings.user_agent)
            .map_err(|_| Error::Config(format!("Invalid user agent '{}'", settings.user_agent)))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create GitHub client: {}", e)))?;

        Ok(Self {
            client,
            api_base: settings.github_api_base.trim_end_matches('/').to_string(),
            repo: credentials.repo_name.clone(),
            branch: settings.branch.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, self.repo, path.trim_start_matches('/'))
    }

    fn decode(path: &str, encoded: &str) -> Result<String> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|e| Error::Storage(format!("{}: invalid base64 content: {}", path, e)))?;
        String::from_utf8(bytes).map_err(|e| Error::Storage(format!("{}: content is not UTF-8: {}", path, e)))
    }

    /// Files over 1 MB come back without inline content; ask for the raw body.
    async fn get_raw(&self, path: &str) -> Result<String> {
        let mut request = self
            .client
            .get(self.contents_url(path))
            .header(ACCEPT, "application/vnd.github.raw+json");
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(status_error("GET raw", path, response.status()));
        }
        Ok(response.text().await?)
    }

    async fn put(&self, path: &str, body: &PutRequest<'_>) -> Result<Revision> {
        let response = self.client.put(self.contents_url(path)).json(body).send().await?;
        let status = response.status();
        debug!("PUT {} -> {}", path, status);

        match status {
            s if s.is_success() => {
                let parsed: PutResponse = response.json().await?;
                Ok(Revision::new(parsed.content.sha))
            }
            StatusCode::CONFLICT => Err(Error::Conflict(format!(
                "{} changed since revision {}",
                path,
                body.sha.unwrap_or("<none>")
            ))),
            StatusCode::UNPROCESSABLE_ENTITY if body.sha.is_none() => {
                Err(Error::AlreadyExists(format!("{} already exists in {}", path, self.repo)))
            }
            s => Err(status_error("PUT", path, s)),
        }
    }
}

fn status_error(op: &str, path: &str, status: StatusCode) -> Error {
    Error::HttpError(format!(
        "{} {}: HTTP {} {}",
        op,
        path,
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown error")
    ))
}

#[async_trait]
impl RemoteStore for GithubStore {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>> {
        let mut request = self.client.get(self.contents_url(path));
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("GET {} -> {}", path, status);

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error("GET", path, status));
        }

        let body: ContentsResponse = response.json().await?;
        let content = if body.encoding == "base64" {
            Self::decode(path, &body.content)?
        } else {
            self.get_raw(path).await?
        };

        Ok(Some(RemoteFile {
            path: path.to_string(),
            content,
            revision: Revision::new(body.sha),
        }))
    }

    async fn create_file(&self, path: &str, content: &str, message: &str) -> Result<Revision> {
        let body = PutRequest {
            message,
            content: STANDARD.encode(content.as_bytes()),
            sha: None,
            branch: self.branch.as_deref(),
        };
        self.put(path, &body).await
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: &Revision,
    ) -> Result<Revision> {
        let body = PutRequest {
            message,
            content: STANDARD.encode(content.as_bytes()),
            sha: Some(expected.as_str()),
            branch: self.branch.as_deref(),
        };
        self.put(path, &body).await
    }

    fn describe(&self) -> String {
        match &self.branch {
            Some(branch) => format!("github:{}@{}", self.repo, branch),
            None => format!("github:{}", self.repo),
        }
    }
}

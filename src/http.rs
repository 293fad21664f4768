//! Single-shot HTTP fetch and response classification.

use std::future::Future;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::constants::MAX_REDIRECTS;
use crate::error::{ErrorKind, FetchError, Payload, TransportResult};

/// Raw HTTP response: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The one network capability the pipeline needs.
///
/// `Err` means no HTTP response was received at all; any status code,
/// including errors, comes back as `Ok`.
pub trait HttpClient: Send + Sync + 'static {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, String> {
        let mut request = self.client.get(url).header("Cache-Control", "no-cache");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| e.to_string())?;

        Ok(HttpResponse { status, body })
    }
}

/// NWS `application/problem+json` error document.
#[derive(Debug, Deserialize)]
struct Problem {
    title: Option<String>,
    detail: Option<String>,
}

fn problem_text(body: &str) -> Option<String> {
    let problem: Problem = serde_json::from_str(body).ok()?;
    let title = problem.title?;
    Some(match problem.detail {
        Some(detail) => format!("{title}: {detail}"),
        None => title,
    })
}

/// Classifies a raw response into a JSON payload or a [`FetchError`].
pub fn classify_response(url: &str, response: HttpResponse) -> TransportResult {
    let HttpResponse { status, body } = response;

    if !(200..300).contains(&status) {
        let mut err = FetchError::new(ErrorKind::HttpStatus, url, format!("http {status}"))
            .with_status(status);
        err.problem = problem_text(&body);
        return Err(err);
    }

    if body.trim_start().starts_with('<') {
        return Err(FetchError::new(ErrorKind::NonJsonBody, url, "non-json body").with_status(status));
    }

    serde_json::from_str::<Value>(&body)
        .map(Payload::fresh)
        .map_err(|e| FetchError::new(ErrorKind::Parse, url, e.to_string()).with_status(status))
}

/// Issues one GET and classifies the result. Never panics, never retries.
pub async fn fetch_json<C: HttpClient>(client: &C, url: &str, accept: &str) -> TransportResult {
    fetch_json_with(client, url, &[("Accept", accept)]).await
}

/// [`fetch_json`] with an explicit header list.
pub async fn fetch_json_with<C: HttpClient>(
    client: &C,
    url: &str,
    headers: &[(&str, &str)],
) -> TransportResult {
    debug!("GET {}", url);
    match client.get(url, headers).await {
        Ok(response) => classify_response(url, response),
        Err(message) => Err(FetchError::new(ErrorKind::Network, url, message)),
    }
}

// ── Stub client for tests ────────────────────────────────────────────────

//! Contains a remote implementation using HTTP to interact with the registry.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::Value;

use crate::workload::Action;

/// A remote implementation using HTTP to interact with the registry.
///
/// The underlying client keeps connections alive across operations. Requests are issued one at a
/// time.
#[derive(Debug)]
pub struct HttpRemote {
    base: String,
    client: reqwest::Client,
    capture_details: bool,
}

impl HttpRemote {
    /// Creates a remote for the descriptor collection at `base`, with a default client.
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(base, reqwest::Client::new())
    }

    /// Creates a remote whose requests time out after `timeout`.
    pub fn with_timeout(base: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base, client))
    }

    /// Creates a remote using the given client.
    pub fn with_client(base: impl Into<String>, client: reqwest::Client) -> Self {
        let base = base.into().trim_end_matches('/').to_owned();
        Self {
            base,
            client,
            capture_details: false,
        }
    }

    /// Whether response bodies are kept in the [`Outcome`].
    pub fn capture_details(mut self, capture: bool) -> Self {
        self.capture_details = capture;
        self
    }

    /// Returns `true` if response bodies are captured.
    pub fn captures_details(&self) -> bool {
        self.capture_details
    }

    /// The client used for all requests.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The URL of the descriptor collection.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the URL addressing a single descriptor.
    pub fn descriptor_url(&self, id: &str) -> String {
        format!("{}/{}", self.base, URL_SAFE_NO_PAD.encode(id))
    }

    /// Issues the request for `action` and waits for the full response.
    ///
    /// Only sending the request and receiving the response body is timed. Building the request and
    /// decoding the body for capture happen outside of the measurement.
    pub async fn execute(&self, action: &Action) -> Outcome {
        let builder = match action {
            Action::Create(descriptor) => self.client.post(&self.base).json(&descriptor.body),
            Action::Read { id } => self.client.get(self.descriptor_url(id)),
            Action::List => self.client.get(&self.base),
            Action::SearchPaginated { limit, cursor } => self
                .client
                .get(&self.base)
                .query(&[("limit", limit.to_string().as_str()), ("cursor", cursor.as_str())]),
        };

        let request = match builder.build() {
            Ok(request) => request,
            Err(error) => {
                return Outcome {
                    request_url: self.base.clone(),
                    status: None,
                    elapsed: Duration::ZERO,
                    error: Some(error),
                    response_body: None,
                };
            }
        };
        let request_url = request.url().to_string();

        let start = Instant::now();
        let result = match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                response.bytes().await.map(|body| (status, body))
            }
            Err(error) => Err(error),
        };
        let elapsed = start.elapsed();

        match result {
            Ok((status, body)) => Outcome {
                request_url,
                status: Some(status),
                elapsed,
                error: None,
                response_body: self.capture_details.then(|| decode_body(&body)),
            },
            Err(error) => Outcome {
                request_url,
                status: error.status(),
                elapsed,
                error: Some(error),
                response_body: None,
            },
        }
    }
}

/// Parses a response body as JSON, falling back to a plain string.
fn decode_body(body: &Bytes) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// The result of issuing a single request.
#[derive(Debug)]
pub struct Outcome {
    /// The fully encoded URL of the request.
    pub request_url: String,
    /// The response status, absent if no response was received.
    pub status: Option<StatusCode>,
    /// Time from sending the request until the response body was received or the request failed.
    pub elapsed: Duration,
    /// A transport error, such as a refused connection, a timeout, or an aborted body.
    pub error: Option<reqwest::Error>,
    /// The decoded response body, if details are captured.
    pub response_body: Option<Value>,
}

impl Outcome {
    /// Returns `true` if a response with a non-error status was received.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self
                .status
                .is_some_and(|status| !status.is_client_error() && !status.is_server_error())
    }
}

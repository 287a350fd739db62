use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http status {status} from remote")]
    Status { status: u16, body: String },
    #[error("remote request failed: {message}")]
    Network { status: Option<u16>, message: String },
    #[error("remote response invalid: {0}")]
    Decode(String),
    #[error("invalid endpoint url: {0}")]
    Endpoint(String),
}

impl TransportError {
    /// Status code reported by the remote, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Network { status, .. } => *status,
            TransportError::Decode(_) | TransportError::Endpoint(_) => None,
        }
    }
}

/// One GET against the volumes endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VolumeRequest {
    /// Appended to the base URL as a single path segment when set.
    pub volume_id: Option<String>,
    pub params: Vec<(String, String)>,
}

impl VolumeRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait VolumeTransport: Send + Sync {
    async fn get(&self, req: VolumeRequest) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T> VolumeTransport for Box<T>
where
    T: VolumeTransport + ?Sized,
{
    async fn get(&self, req: VolumeRequest) -> Result<Value, TransportError> {
        (**self).get(req).await
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: Url,
    client: Client,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url =
            Url::parse(base_url).map_err(|e| TransportError::Endpoint(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Endpoint(format!(
                "{base_url} cannot carry a volume id"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network {
                status: None,
                message: e.to_string(),
            })?;
        Ok(Self { base_url, client })
    }

    fn url_for(&self, volume_id: Option<&str>) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        if let Some(id) = volume_id {
            url.path_segments_mut()
                .map_err(|_| TransportError::Endpoint(self.base_url.to_string()))?
                .pop_if_empty()
                .push(id);
        }
        Ok(url)
    }
}

#[async_trait]
impl VolumeTransport for ReqwestTransport {
    async fn get(&self, req: VolumeRequest) -> Result<Value, TransportError> {
        let url = self.url_for(req.volume_id.as_deref())?;
        debug!(
            url = %url,
            params = ?redacted(&req.params),
            "requesting google books volumes"
        );
        send_json(self.client.get(url).query(&req.params)).await
    }
}

fn redacted(params: &[(String, String)]) -> Vec<(&str, &str)> {
    params
        .iter()
        .map(|(k, v)| {
            if k == "key" {
                (k.as_str(), "<redacted>")
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect()
}

async fn send_json(request: RequestBuilder) -> Result<Value, TransportError> {
    let response = request.send().await.map_err(|e| TransportError::Network {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    })?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

/// Scripted transport that replays queued replies and records every request.
///
/// When the queue runs dry it answers with an empty volume list.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<VolumeRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: Result<Value, TransportError>) -> Self {
        self.push_reply(reply);
        self
    }

    pub fn push_reply(&self, reply: Result<Value, TransportError>) {
        self.replies
            .lock()
            .expect("mock transport replies lock poisoned")
            .push_back(reply);
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<VolumeRequest> {
        self.requests
            .lock()
            .expect("mock transport requests lock poisoned")
            .clone()
    }
}

#[async_trait]
impl VolumeTransport for MockTransport {
    async fn get(&self, req: VolumeRequest) -> Result<Value, TransportError> {
        self.requests
            .lock()
            .expect("mock transport requests lock poisoned")
            .push(req);
        let next = self
            .replies
            .lock()
            .expect("mock transport replies lock poisoned")
            .pop_front();
        next.unwrap_or_else(|| {
            Ok(serde_json::json!({ "kind": "books#volumes", "totalItems": 0 }))
        })
    }
}

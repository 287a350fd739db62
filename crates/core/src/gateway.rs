use crate::store::{BookStore, StoreError};
use crate::transport::{TransportError, VolumeRequest, VolumeTransport};
use crate::types::{AppConfig, Book, DEFAULT_API_KEY_ENV_VAR};
use crate::volumes::VolumeList;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

const INTERNAL_ERROR: u16 = 500;

/// Errors returned by [`BookLookupGateway`] operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message} (status {status})")]
    Upstream { status: u16, message: String },
    #[error("book store failure: {0}")]
    Store(#[from] StoreError),
}

impl GatewayError {
    /// HTTP-style status code for the error kind.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::InvalidInput(_) => 400,
            GatewayError::ServiceUnavailable(_) => 503,
            GatewayError::NotFound(_) => 404,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Store(err) => err.status(),
        }
    }

    fn upstream(message: &str, err: TransportError) -> Self {
        let status = err.status().unwrap_or(INTERNAL_ERROR);
        warn!(status, error = %err, "{message}");
        GatewayError::Upstream {
            status,
            message: message.to_string(),
        }
    }
}

/// Settings resolved once at startup and handed to the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    /// Name of the variable the key was read from, used in error messages.
    pub api_key_env_var: String,
    pub max_results: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env_var: DEFAULT_API_KEY_ENV_VAR.to_string(),
            max_results: 20,
        }
    }
}

impl GatewayConfig {
    /// Reads the credential through `env_get`; blank values count as missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use bookgate_core::gateway::GatewayConfig;
    /// use bookgate_core::types::AppConfig;
    ///
    /// let cfg = GatewayConfig::from_app_config(&AppConfig::default(), |_| Some("  ".to_string()));
    /// assert!(cfg.api_key.is_none());
    /// assert_eq!(cfg.max_results, 20);
    /// ```
    pub fn from_app_config<F>(cfg: &AppConfig, env_get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = cfg.google_books.api_key_env_var.clone();
        Self {
            api_key: env_get(&var).filter(|v| !v.trim().is_empty()),
            api_key_env_var: var,
            max_results: cfg.google_books.max_results,
        }
    }
}

/// Forwards lookups to the volumes API and upserts local records.
///
/// Every operation validates its input, then checks the credential, then
/// issues at most one remote call.
pub struct BookLookupGateway<T, S>
where
    T: VolumeTransport,
    S: BookStore,
{
    config: GatewayConfig,
    transport: T,
    store: S,
}

impl<T, S> BookLookupGateway<T, S>
where
    T: VolumeTransport,
    S: BookStore,
{
    pub fn new(config: GatewayConfig, transport: T, store: S) -> Self {
        Self {
            config,
            transport,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            GatewayError::ServiceUnavailable(format!(
                "Google Books API key not configured. Set {} in environment.",
                self.config.api_key_env_var
            ))
        })
    }

    /// Free-text search, capped at the configured result limit.
    pub async fn search(&self, query: &str) -> Result<Value, GatewayError> {
        require(query, "Query parameter q is required")?;
        let key = self.api_key()?;
        let req = VolumeRequest {
            volume_id: None,
            params: vec![
                ("q".to_string(), query.to_string()),
                ("key".to_string(), key.to_string()),
                ("maxResults".to_string(), self.config.max_results.to_string()),
            ],
        };
        self.transport
            .get(req)
            .await
            .map_err(|e| GatewayError::upstream("Error fetching books from Google Books API", e))
    }

    pub async fn search_by_isbn(&self, isbn: &str) -> Result<Value, GatewayError> {
        require(isbn, "ISBN is required")?;
        let key = self.api_key()?;
        let req = VolumeRequest {
            volume_id: None,
            params: vec![
                ("q".to_string(), format!("isbn:{isbn}")),
                ("key".to_string(), key.to_string()),
            ],
        };
        self.transport
            .get(req)
            .await
            .map_err(|e| GatewayError::upstream("Error fetching book from Google Books API", e))
    }

    pub async fn get_volume_by_id(&self, volume_id: &str) -> Result<Value, GatewayError> {
        require(volume_id, "Volume id is required")?;
        let key = self.api_key()?;
        let req = VolumeRequest {
            volume_id: Some(volume_id.to_string()),
            params: vec![("key".to_string(), key.to_string())],
        };
        self.transport
            .get(req)
            .await
            .map_err(|e| GatewayError::upstream("Error fetching volume from Google Books API", e))
    }

    /// Looks `isbn` up remotely and creates or updates the matching local
    /// record from the first result.
    pub async fn enrich_book_data(&self, isbn: &str) -> Result<Book, GatewayError> {
        let raw = self.search_by_isbn(isbn).await?;
        let list: VolumeList = serde_json::from_value(raw).map_err(unexpected_payload)?;
        let volume = list
            .into_first()
            .map_err(unexpected_payload)?
            .ok_or_else(|| GatewayError::NotFound("Book not found in Google Books".to_string()))?;
        let fields = volume.volume_info.unwrap_or_default().into_book_fields(isbn);

        match self.store.find_by_isbn(isbn).await? {
            Some(existing) => {
                info!(isbn, id = existing.id, "updating book from google books");
                Ok(self.store.update(existing.id, fields).await?)
            }
            None => {
                info!(isbn, "creating book from google books");
                Ok(self.store.create(fields).await?)
            }
        }
    }
}

fn unexpected_payload(err: serde_json::Error) -> GatewayError {
    GatewayError::Upstream {
        status: INTERNAL_ERROR,
        message: format!("Unexpected response from Google Books API: {err}"),
    }
}

fn require(value: &str, message: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        Err(GatewayError::InvalidInput(message.to_string()))
    } else {
        Ok(())
    }
}

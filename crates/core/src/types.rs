use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutable part of a local book record, as mapped from a remote volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookFields {
    pub isbn: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl BookFields {
    /// Applies `other` on top of `self`. Optional fields only overwrite when
    /// `other` carries a value.
    pub fn merge(&mut self, other: BookFields) {
        self.isbn = other.isbn;
        self.title = other.title;
        self.author = other.author;
        merge_opt(&mut self.publisher, other.publisher);
        merge_opt(&mut self.published_date, other.published_date);
        merge_opt(&mut self.description, other.description);
        merge_opt(&mut self.page_count, other.page_count);
        merge_opt(&mut self.categories, other.categories);
        merge_opt(&mut self.language, other.language);
        merge_opt(&mut self.thumbnail, other.thumbnail);
    }
}

fn merge_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Local book record owned by a [`crate::store::BookStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    #[serde(flatten)]
    pub fields: BookFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub status: String,
    pub phase: String,
    pub message: String,
    pub details: Value,
}

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1/volumes";
pub const DEFAULT_API_KEY_ENV_VAR: &str = "GOOGLE_BOOKS_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleBooksConfig {
    pub base_url: String,
    pub api_key_env_var: String,
    pub max_results: u32,
    pub timeout_ms: u64,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env_var: DEFAULT_API_KEY_ENV_VAR.to_string(),
            max_results: 20,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: ".bookgate/books.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub google_books: GoogleBooksConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

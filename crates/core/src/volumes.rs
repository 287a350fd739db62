//! Typed view of the Google Books volumes response.
//!
//! Every field is optional so a sparse or partially populated volume still
//! decodes; defaulting rules live in [`VolumeInfo::into_book_fields`].

use crate::types::BookFields;
use serde::Deserialize;
use serde_json::Value;

const UNKNOWN: &str = "Unknown";

/// Body of `GET /volumes?q=...`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeList {
    #[serde(default)]
    pub total_items: u32,
    /// Kept undecoded; only the first result is ever read.
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<Authors>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    #[serde(default)]
    pub small_thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// The remote usually sends a list, but single strings show up in the wild.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Authors {
    Many(Vec<Option<String>>),
    One(String),
    Other(Value),
}

impl Authors {
    /// Renders the author line stored on a local record.
    ///
    /// # Examples
    ///
    /// ```
    /// use bookgate_core::volumes::Authors;
    ///
    /// let many = Authors::Many(vec![Some("A".to_string()), Some("B".to_string())]);
    /// assert_eq!(many.display(), "A, B");
    /// assert_eq!(Authors::Many(vec![]).display(), "");
    /// assert_eq!(Authors::One(String::new()).display(), "Unknown");
    /// ```
    pub fn display(&self) -> String {
        match self {
            // a list is always joined, even when that yields ""
            Authors::Many(names) => names
                .iter()
                .map(|n| n.as_deref().unwrap_or_default())
                .collect::<Vec<_>>()
                .join(", "),
            Authors::One(name) if name.is_empty() => UNKNOWN.to_string(),
            Authors::One(name) => name.clone(),
            Authors::Other(Value::Null) => UNKNOWN.to_string(),
            Authors::Other(other) => other.to_string(),
        }
    }
}

impl VolumeList {
    /// Decodes the first result, if any. Later results are never inspected.
    pub fn into_first(self) -> Result<Option<Volume>, serde_json::Error> {
        self.items
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
    }
}

impl VolumeInfo {
    /// Maps remote metadata onto local book fields for `isbn`.
    pub fn into_book_fields(self, isbn: &str) -> BookFields {
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let author = self
            .authors
            .as_ref()
            .map(Authors::display)
            .unwrap_or_else(|| UNKNOWN.to_string());

        BookFields {
            isbn: isbn.to_string(),
            title,
            author,
            publisher: self.publisher,
            published_date: self.published_date,
            description: self.description,
            page_count: self.page_count,
            categories: self.categories,
            language: self.language,
            thumbnail: self.image_links.and_then(|links| links.thumbnail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_sparse_volume_list() {
        let list: VolumeList = serde_json::from_value(json!({
            "kind": "books#volumes",
            "totalItems": 1,
            "items": [{ "id": "abc" }]
        }))
        .expect("decode");
        assert_eq!(list.total_items, 1);
        let first = list.into_first().expect("decode first").expect("one item");
        assert_eq!(first.id.as_deref(), Some("abc"));
        assert!(first.volume_info.is_none());
    }

    #[test]
    fn missing_items_decodes_as_empty() {
        let list: VolumeList =
            serde_json::from_value(json!({ "kind": "books#volumes", "totalItems": 0 }))
                .expect("decode");
        assert!(list.into_first().expect("decode").is_none());
    }

    #[test]
    fn malformed_later_items_are_ignored() {
        let list: VolumeList = serde_json::from_value(json!({
            "totalItems": 2,
            "items": [
                { "volumeInfo": { "title": "Good", "authors": ["A"] } },
                { "volumeInfo": { "title": 42, "pageCount": "n/a" } }
            ]
        }))
        .expect("decode");
        let first = list
            .into_first()
            .expect("first item decodes")
            .expect("one item");
        let fields = first.volume_info.unwrap_or_default().into_book_fields("1");
        assert_eq!(fields.title, "Good");
        assert_eq!(fields.author, "A");
    }

    #[test]
    fn maps_full_volume_info() {
        let info: VolumeInfo = serde_json::from_value(json!({
            "title": "Code Complete",
            "authors": ["Steve McConnell"],
            "publisher": "DV-Professional",
            "publishedDate": "2004",
            "pageCount": 952,
            "categories": ["Computers"],
            "language": "en",
            "imageLinks": {
                "smallThumbnail": "http://books.google.com/small",
                "thumbnail": "http://books.google.com/thumb"
            }
        }))
        .expect("decode");

        let fields = info.into_book_fields("0735619670");
        assert_eq!(fields.isbn, "0735619670");
        assert_eq!(fields.title, "Code Complete");
        assert_eq!(fields.author, "Steve McConnell");
        assert_eq!(fields.page_count, Some(952));
        assert_eq!(fields.categories, Some(vec!["Computers".to_string()]));
        assert_eq!(fields.thumbnail.as_deref(), Some("http://books.google.com/thumb"));
    }

    #[test]
    fn empty_info_uses_unknown_defaults() {
        let fields = VolumeInfo::default().into_book_fields("1");
        assert_eq!(fields.title, "Unknown");
        assert_eq!(fields.author, "Unknown");
        assert!(fields.thumbnail.is_none());
    }

    #[test]
    fn single_string_author_is_kept_verbatim() {
        let info: VolumeInfo =
            serde_json::from_value(json!({ "title": "", "authors": "Ursula K. Le Guin" }))
                .expect("decode");
        let fields = info.into_book_fields("1");
        assert_eq!(fields.title, "Unknown");
        assert_eq!(fields.author, "Ursula K. Le Guin");
    }

    #[test]
    fn author_lists_are_joined_verbatim() {
        let info: VolumeInfo =
            serde_json::from_value(json!({ "authors": [] })).expect("decode");
        assert_eq!(info.into_book_fields("1").author, "");

        let info: VolumeInfo =
            serde_json::from_value(json!({ "authors": ["A", null] })).expect("decode");
        assert_eq!(info.into_book_fields("1").author, "A, ");
    }

    #[test]
    fn null_authors_are_unknown() {
        let info: VolumeInfo =
            serde_json::from_value(json!({ "authors": null })).expect("decode");
        assert_eq!(info.into_book_fields("1").author, "Unknown");
    }
}

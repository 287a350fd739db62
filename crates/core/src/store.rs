use crate::types::{Book, BookFields};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("book {0} not found")]
    NotFound(u64),
    #[error("a book with isbn {0} already exists")]
    Conflict(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn status(&self) -> u16 {
        match self {
            StoreError::NotFound(_) => 404,
            StoreError::Conflict(_) => 409,
            StoreError::Io(_) | StoreError::Serialization(_) => 500,
        }
    }
}

/// Persistence for local book records, keyed by isbn.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError>;
    async fn create(&self, fields: BookFields) -> Result<Book, StoreError>;
    /// Merges `fields` into the record with `id`; see [`BookFields::merge`].
    async fn update(&self, id: u64, fields: BookFields) -> Result<Book, StoreError>;
}

#[async_trait]
impl<T> BookStore for Box<T>
where
    T: BookStore + ?Sized,
{
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        (**self).find_by_isbn(isbn).await
    }

    async fn create(&self, fields: BookFields) -> Result<Book, StoreError> {
        (**self).create(fields).await
    }

    async fn update(&self, id: u64, fields: BookFields) -> Result<Book, StoreError> {
        (**self).update(id, fields).await
    }
}

#[async_trait]
impl<T> BookStore for Arc<T>
where
    T: BookStore + ?Sized,
{
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        (**self).find_by_isbn(isbn).await
    }

    async fn create(&self, fields: BookFields) -> Result<Book, StoreError> {
        (**self).create(fields).await
    }

    async fn update(&self, id: u64, fields: BookFields) -> Result<Book, StoreError> {
        (**self).update(id, fields).await
    }
}

#[derive(Debug, Clone, Default)]
struct Records {
    next_id: u64,
    books: BTreeMap<u64, Book>,
}

impl Records {
    fn from_books(books: Vec<Book>) -> Self {
        let next_id = books.iter().map(|b| b.id).max().unwrap_or(0);
        let books = books.into_iter().map(|b| (b.id, b)).collect();
        Self { next_id, books }
    }

    fn snapshot(&self) -> Vec<Book> {
        self.books.values().cloned().collect()
    }

    fn find_by_isbn(&self, isbn: &str) -> Option<Book> {
        self.books.values().find(|b| b.fields.isbn == isbn).cloned()
    }

    fn create(&mut self, fields: BookFields) -> Result<Book, StoreError> {
        if self.books.values().any(|b| b.fields.isbn == fields.isbn) {
            return Err(StoreError::Conflict(fields.isbn));
        }
        self.next_id += 1;
        let book = Book {
            id: self.next_id,
            fields,
        };
        self.books.insert(book.id, book.clone());
        Ok(book)
    }

    fn update(&mut self, id: u64, fields: BookFields) -> Result<Book, StoreError> {
        if self
            .books
            .values()
            .any(|b| b.id != id && b.fields.isbn == fields.isbn)
        {
            return Err(StoreError::Conflict(fields.isbn));
        }
        let book = self.books.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        book.fields.merge(fields);
        Ok(book.clone())
    }
}

/// Process-local store; ids are assigned sequentially from 1.
#[derive(Debug, Default)]
pub struct InMemoryBookStore {
    records: RwLock<Records>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_books(books: Vec<Book>) -> Self {
        Self {
            records: RwLock::new(Records::from_books(books)),
        }
    }

    /// All records ordered by id.
    pub async fn snapshot(&self) -> Vec<Book> {
        self.records.read().await.snapshot()
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        Ok(self.records.read().await.find_by_isbn(isbn))
    }

    async fn create(&self, fields: BookFields) -> Result<Book, StoreError> {
        self.records.write().await.create(fields)
    }

    async fn update(&self, id: u64, fields: BookFields) -> Result<Book, StoreError> {
        self.records.write().await.update(id, fields)
    }
}

/// Store backed by a JSON array on disk, rewritten after every mutation.
///
/// A mutation becomes visible only once the new snapshot is on disk.
#[derive(Debug)]
pub struct JsonFileBookStore {
    path: PathBuf,
    records: RwLock<Records>,
}

impl JsonFileBookStore {
    /// Opens `path`, treating a missing or blank file as an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let books = match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str::<Vec<Book>>(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            records: RwLock::new(Records::from_books(books)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `op` to a staged copy, writes it, then swaps it in.
    async fn commit<F>(&self, op: F) -> Result<Book, StoreError>
    where
        F: FnOnce(&mut Records) -> Result<Book, StoreError> + Send,
    {
        let mut records = self.records.write().await;
        let mut staged = records.clone();
        let book = op(&mut staged)?;
        self.persist(&staged).await?;
        *records = staged;
        Ok(book)
    }

    async fn persist(&self, records: &Records) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(&records.snapshot())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl BookStore for JsonFileBookStore {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        Ok(self.records.read().await.find_by_isbn(isbn))
    }

    async fn create(&self, fields: BookFields) -> Result<Book, StoreError> {
        self.commit(move |records| records.create(fields)).await
    }

    async fn update(&self, id: u64, fields: BookFields) -> Result<Book, StoreError> {
        self.commit(move |records| records.update(id, fields)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn fields(isbn: &str, title: &str) -> BookFields {
        BookFields {
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: "Frank Herbert".to_string(),
            ..BookFields::default()
        }
    }

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!(
                "bookgate-store-test-{}-{}",
                std::process::id(),
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .expect("time")
                    .as_nanos()
            ))
            .join("books.json")
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = InMemoryBookStore::new();
        let a = store.create(fields("1", "Dune")).await.expect("create");
        let b = store
            .create(fields("2", "Dune Messiah"))
            .await
            .expect("create");
        assert_eq!((a.id, b.id), (1, 2));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_isbn() {
        let store = InMemoryBookStore::new();
        store.create(fields("1", "Dune")).await.expect("create");
        let err = store
            .create(fields("1", "Dune again"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(err.status(), 409);
    }

    #[tokio::test]
    async fn update_merges_and_reports_missing_ids() {
        let store = InMemoryBookStore::new();
        let mut initial = fields("1", "Dune");
        initial.language = Some("en".to_string());
        let created = store.create(initial).await.expect("create");

        let updated = store
            .update(created.id, fields("1", "Dune (40th Anniversary)"))
            .await
            .expect("update");
        assert_eq!(updated.fields.title, "Dune (40th Anniversary)");
        assert_eq!(updated.fields.language.as_deref(), Some("en"));

        let err = store
            .update(99, fields("9", "Nope"))
            .await
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(99)));
    }

    #[tokio::test]
    async fn from_books_continues_id_sequence() {
        let store = InMemoryBookStore::from_books(vec![Book {
            id: 41,
            fields: fields("1", "Dune"),
        }]);
        let next = store.create(fields("2", "Children of Dune")).await.expect("create");
        assert_eq!(next.id, 42);
        let found = store.find_by_isbn("1").await.expect("find");
        assert_eq!(found.map(|b| b.id), Some(41));
    }

    #[tokio::test]
    async fn json_file_store_round_trips_through_disk() {
        let path = temp_store_path();
        let store = JsonFileBookStore::open(&path).await.expect("open empty");
        store.create(fields("1", "Dune")).await.expect("create");
        drop(store);

        let reopened = JsonFileBookStore::open(&path).await.expect("reopen");
        let found = reopened
            .find_by_isbn("1")
            .await
            .expect("find")
            .expect("persisted");
        assert_eq!(found.fields.title, "Dune");

        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).expect("cleanup temp dir");
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_store_unchanged() {
        let path = temp_store_path();
        let blocker = path.parent().expect("parent").to_path_buf();
        let store = JsonFileBookStore::open(&path).await.expect("open empty");
        // a regular file where the store directory should be
        std::fs::write(&blocker, b"").expect("create blocking file");

        let err = store
            .create(fields("1", "Dune"))
            .await
            .expect_err("write must fail");
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(err.status(), 500);
        assert!(store.find_by_isbn("1").await.expect("find").is_none());

        let retry = store
            .create(fields("1", "Dune"))
            .await
            .expect_err("retry must fail the same way");
        assert!(matches!(retry, StoreError::Io(_)));

        std::fs::remove_file(&blocker).expect("cleanup blocking file");
        let book = store.create(fields("1", "Dune")).await.expect("create");
        assert_eq!(book.id, 1);

        std::fs::remove_dir_all(&blocker).expect("cleanup temp dir");
    }

    #[tokio::test]
    async fn open_rejects_corrupt_file() {
        let path = temp_store_path();
        let dir = path.parent().expect("parent").to_path_buf();
        std::fs::create_dir_all(&dir).expect("create temp dir");
        std::fs::write(&path, "{ not json").expect("write corrupt file");

        let err = JsonFileBookStore::open(&path)
            .await
            .expect_err("corrupt file");
        assert!(matches!(err, StoreError::Serialization(_)));

        std::fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }
}

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

//! Core library for the bookgate CLI.
//!
//! `bookgate_core` provides:
//! - the lookup/enrich flow via [`gateway`]
//! - remote transport adapters via [`transport`]
//! - typed Google Books payloads via [`volumes`]
//! - local book persistence via [`store`]
//! - shared configuration and record types via [`types`]
//!
//! # Quick Start
//!
//! ```no_run
//! use bookgate_core::gateway::{BookLookupGateway, GatewayConfig};
//! use bookgate_core::store::InMemoryBookStore;
//! use bookgate_core::transport::MockTransport;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = MockTransport::new().with_reply(Ok(json!({
//!     "totalItems": 1,
//!     "items": [{ "volumeInfo": { "title": "Dune", "authors": ["Frank Herbert"] } }]
//! })));
//! let config = GatewayConfig {
//!     api_key: Some("key".to_string()),
//!     ..GatewayConfig::default()
//! };
//! let gateway = BookLookupGateway::new(config, transport, InMemoryBookStore::new());
//! let book = gateway.enrich_book_data("9780441013593").await?;
//! assert_eq!(book.fields.author, "Frank Herbert");
//! # Ok(())
//! # }
//! ```

pub mod gateway;
pub mod store;
pub mod transport;
pub mod types;
pub mod volumes;

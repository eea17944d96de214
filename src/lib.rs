//! bookmark-organiser: LLM-assisted bookmark reorganisation
//!
//! Pipeline stages:
//! - parser: Netscape bookmark HTML to flat records
//! - metadata: page titles, descriptions and keywords over HTTP
//! - organiser: batched model calls with retry/fallback, merged back in place
//! - render: depth-bounded folder tree to Netscape HTML
//! - validator: count, URL multiset, location and snapshot checks

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod metadata;
pub mod organiser;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod response;
pub mod retry;
pub mod schema;
pub mod snapshot;
pub mod tree;
pub mod validator;

pub use client::{ChatMessage, CompletionClient, CompletionRequest, OpenAiClient, OpenAiConfig};
pub use config::{OrganiserConfig, RetryPolicy, DEFAULT_BATCH_SIZE, MAX_FOLDER_DEPTH};
pub use error::{AttemptError, Error, ProviderError, ResponseError, Result, ValidationError};
pub use metadata::{enrich_with_metadata, EnrichMode, MetadataConfig};
pub use organiser::{merge_entries, BookmarkOrganiser};
pub use parser::{parse_bookmark_file, parse_bookmark_html};
pub use render::{render_html, write_bookmark_html};
pub use retry::{invoke_with_retry, Session};
pub use schema::{BookmarkMetadata, BookmarkRecord, ReorgEntry};
pub use snapshot::{load_snapshot, write_snapshot};
pub use tree::{build_tree, BookmarkTreeNode};
pub use validator::{validate_records, validate_reorganisation};

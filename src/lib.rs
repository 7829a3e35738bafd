pub mod autocomplete;
pub mod builder;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod models;
pub mod search;
pub mod segment;
pub mod semantic;
pub mod tokenizer;

pub use autocomplete::AutocompleteTrie;
pub use builder::{build_single_document, build_slice_segment, BuildOutcome};
pub use config::{Bm25Params, EngineConfig, ExpansionParams};
pub use engine::Engine;
pub use error::{CorpexError, Result};
pub use models::{AddDocumentResponse, SearchHit, SearchResponse, SuggestResponse};
pub use semantic::SemanticIndex;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

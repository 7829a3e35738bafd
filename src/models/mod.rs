pub mod search;

pub use search::{AddDocumentResponse, SearchHit, SearchResponse, SuggestResponse};

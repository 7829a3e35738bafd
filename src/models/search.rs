//! Serializable response models returned by the engine

use serde::{Deserialize, Serialize};

/// One ranked search hit
///
/// `score`, `segment`, `docId` and `cord_uid` are always present; the
/// metadata-backed fields appear only when the CSV row yields them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub segment: String,
    #[serde(rename = "docId")]
    pub doc_id: u32,
    pub cord_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Full search response, echoing the query and clamped k
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub k: usize,
    /// Number of loaded segments consulted
    pub segments: usize,
    /// Matches across all segments (a document is counted once per segment
    /// that scored it)
    pub found: u64,
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    /// Empty response shell for a query that produced no candidates
    pub fn empty(query: &str, k: usize, segments: usize) -> Self {
        Self {
            query: query.to_string(),
            k,
            segments,
            found: 0,
            results: Vec::new(),
        }
    }
}

/// Autocomplete response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub query: String,
    pub limit: usize,
    pub suggestions: Vec<String>,
}

/// Result of an incremental document add
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddDocumentResponse {
    pub ok: bool,
    /// Name of the new single-document segment
    pub segment: String,
    /// Whether the post-ingest reload succeeded
    pub reloaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_serialization_omits_missing_metadata() {
        let hit = SearchHit {
            score: 1.5,
            segment: "seg_000001".to_string(),
            doc_id: 3,
            cord_uid: "u1".to_string(),
            title: None,
            url: Some("http://x".to_string()),
            publish_time: None,
            author: None,
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["docId"], 3);
        assert_eq!(json["url"], "http://x");
        assert!(json.get("title").is_none());
        assert!(json.get("author").is_none());
    }

    #[test]
    fn test_empty_response_shape() {
        let resp = SearchResponse::empty("covid", 10, 2);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["k"], 10);
        assert_eq!(json["segments"], 2);
        assert_eq!(json["found"], 0);
        assert!(json["results"].as_array().unwrap().is_empty());
    }
}

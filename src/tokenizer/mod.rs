pub mod tokenizer;

pub use tokenizer::{is_stopword, query_terms, tokenize};

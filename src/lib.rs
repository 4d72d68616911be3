pub mod region;
pub mod tagger;
pub mod tokenizer;

// Re-export main types for convenient access
pub use region::{regions_invert, Book, FlatParseError, FlatRegion, Region};
pub use tagger::{TagConfig, TagError, Tagger};

// Re-export tokenizer entry points used by query-side callers
pub use tokenizer::{normalize_type, parse_query, types_from_string, types_from_string_at};

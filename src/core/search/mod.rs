// src/core/search/mod.rs

//! The inverted-index full-text search engine backing `FT.*` commands.

pub mod index;
pub mod query;
pub mod schema;

pub use self::index::{DocumentStore, InvertedIndex, SearchIndex};
pub use self::query::{Query, QueryParser, Term};
pub use self::schema::{Field, FieldOption, FieldType, Schema};

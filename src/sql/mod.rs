//! SQL text handling: lexing, statement classification and dialect translation.
//!
//! Nothing here parses SQL into an AST. The lexer wraps the `sqlparser`
//! tokenizer; classification looks at the leading keyword.

pub mod lexer;
pub mod statement;
pub mod translate;

pub use statement::{StatementKind, has_returning, insert_table, is_upsert, returns_rows};
pub use translate::{TranslatedQuery, translate};

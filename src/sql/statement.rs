//! Statement classification by leading keyword.

use crate::sql::lexer::{self, Lexeme, next_code};
use sqlparser::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Row-producing: SELECT, WITH, VALUES, PRAGMA, EXPLAIN, SHOW
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, transaction control, scripts
    Other,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        match lexer::leading_keyword(sql).as_deref() {
            Some("SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" | "SHOW") => Self::Select,
            Some("INSERT" | "REPLACE") => Self::Insert,
            Some("UPDATE") => Self::Update,
            Some("DELETE") => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// True if a `RETURNING` keyword appears outside literals and comments.
pub fn has_returning(sql: &str) -> bool {
    lexer::tokenize(sql).is_some_and(|lexemes| lexemes.iter().any(|l| l.is_word("RETURNING")))
}

/// True if the statement yields rows on a backend with native RETURNING.
pub fn returns_rows(sql: &str) -> bool {
    StatementKind::classify(sql) == StatementKind::Select || has_returning(sql)
}

/// True for an `ON CONFLICT .. DO UPDATE` upsert.
pub fn is_upsert(sql: &str) -> bool {
    lexer::tokenize(sql).is_some_and(|lexemes| {
        lexemes.iter().enumerate().any(|(i, l)| {
            l.is_word("DO")
                && next_code(&lexemes, i + 1).is_some_and(|j| lexemes[j].is_word("UPDATE"))
        })
    })
}

/// Target table of an `INSERT [OR ...] INTO <table>` statement, quoting kept.
pub fn insert_table(sql: &str) -> Option<String> {
    let lexemes = lexer::tokenize(sql)?;
    let mut i = next_code(&lexemes, 0)?;
    if !(lexemes[i].is_word("INSERT") || lexemes[i].is_word("REPLACE")) {
        return None;
    }

    i = next_code(&lexemes, i + 1)?;
    if lexemes[i].is_word("OR") {
        // conflict resolution keyword
        i = next_code(&lexemes, i + 1)?;
        i = next_code(&lexemes, i + 1)?;
    }
    if !lexemes[i].is_word("INTO") {
        return None;
    }

    let name = next_code(&lexemes, i + 1)?;
    let mut table = table_part(&lexemes[name])?.to_string();
    if let Some(dot) = next_code(&lexemes, name + 1)
        .filter(|&j| matches!(lexemes[j].token, Token::Period))
    {
        let part = next_code(&lexemes, dot + 1)?;
        table.push('.');
        table.push_str(table_part(&lexemes[part])?);
    }
    Some(table)
}

fn table_part<'a>(lexeme: &'a Lexeme<'_>) -> Option<&'a str> {
    match lexeme.token {
        Token::Word(_) => Some(lexeme.text.as_ref()),
        _ => None,
    }
}

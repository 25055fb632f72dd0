//! Token stream over statement text.
//!
//! Tokenizing uses `sqlparser` with the PostgreSQL dialect, so string
//! literals, quoted identifiers, dollar-quoted bodies, comments and `$N`
//! placeholders each come out as their own token. Every token keeps the exact
//! source text it was read from, and joining the texts reproduces the input.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer, Whitespace};
use std::borrow::Cow;

/// A token together with the source text it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<'a> {
    pub token: Token,
    pub text: Cow<'a, str>,
}

impl<'a> Lexeme<'a> {
    pub fn space() -> Self {
        Self {
            token: Token::Whitespace(Whitespace::Space),
            text: Cow::Borrowed(" "),
        }
    }

    /// Whitespace or a comment.
    pub fn is_trivia(&self) -> bool {
        matches!(self.token, Token::Whitespace(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(
            self.token,
            Token::Whitespace(Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_))
        )
    }

    /// Value of an unquoted word.
    pub fn word(&self) -> Option<&str> {
        match &self.token {
            Token::Word(w) if w.quote_style.is_none() => Some(&w.value),
            _ => None,
        }
    }

    /// True for an unquoted word equal to `word`, ignoring case.
    pub fn is_word(&self, word: &str) -> bool {
        self.word().is_some_and(|w| w.eq_ignore_ascii_case(word))
    }
}

/// Tokenize `sql`. `None` when the text cannot be tokenized, e.g. an
/// unterminated literal or comment.
pub fn tokenize(sql: &str) -> Option<Vec<Lexeme<'_>>> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .with_unescape(false)
        .tokenize_with_location()
        .ok()?;

    match source_slices(sql, &tokens) {
        Some(slices) => Some(
            tokens
                .into_iter()
                .zip(slices)
                .map(|(t, text)| Lexeme {
                    token: t.token,
                    text: Cow::Borrowed(text),
                })
                .collect(),
        ),
        // Spans that do not tile the input fall back to the token's own rendering
        None => Some(
            tokens
                .into_iter()
                .map(|t| Lexeme {
                    text: Cow::Owned(t.token.to_string()),
                    token: t.token,
                })
                .collect(),
        ),
    }
}

/// Index of the first non-trivia lexeme at or after `from`.
pub fn next_code(lexemes: &[Lexeme<'_>], from: usize) -> Option<usize> {
    (from..lexemes.len()).find(|&i| !lexemes[i].is_trivia())
}

/// Index of the parenthesis closing the one at `open`.
pub fn matching_paren(lexemes: &[Lexeme<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, lexeme) in lexemes.iter().enumerate().skip(open) {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Upper-cased leading keyword, ignoring comments and opening parentheses.
pub fn leading_keyword(sql: &str) -> Option<String> {
    let lexemes = tokenize(sql)?;
    lexemes
        .iter()
        .find(|l| !l.is_trivia() && !matches!(l.token, Token::LParen))
        .and_then(|l| l.word())
        .map(|w| w.to_ascii_uppercase())
}

/// Source text of each token, or `None` if the spans leave gaps.
fn source_slices<'a>(sql: &'a str, tokens: &[TokenWithSpan]) -> Option<Vec<&'a str>> {
    let lines = LineIndex::new(sql);
    let mut slices = Vec::with_capacity(tokens.len());
    let mut cursor = 0;
    for token in tokens {
        let start = lines.offset(token.span.start)?;
        let end = lines.offset(token.span.end)?;
        if start != cursor || end < start {
            return None;
        }
        slices.push(sql.get(start..end)?);
        cursor = end;
    }
    (cursor == sql.len()).then_some(slices)
}

/// Maps 1-based line/column locations (columns count characters) to byte offsets.
struct LineIndex<'a> {
    sql: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(sql: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { sql, line_starts }
    }

    fn offset(&self, location: Location) -> Option<usize> {
        let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
        let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
        let line_start = *self.line_starts.get(line)?;
        let rest = &self.sql[line_start..];
        match rest.char_indices().nth(column) {
            Some((i, _)) => Some(line_start + i),
            None if rest.chars().count() == column => Some(self.sql.len()),
            None => None,
        }
    }
}

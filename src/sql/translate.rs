//! PostgreSQL-to-SQLite statement translation.
//!
//! Canonical statements are written for PostgreSQL (`$1..$n` placeholders).
//! [`translate`] rewrites a fixed vocabulary for SQLite:
//!
//! | canonical | SQLite |
//! |---|---|
//! | `$N` | `?`, one bound value per occurrence |
//! | `NOW() - INTERVAL '7 days'` | `datetime('now', '-7 days')` |
//! | `NOW()`, `CURRENT_TIMESTAMP` | `datetime('now')` |
//! | `ON CONFLICT (cols) DO UPDATE SET` | `ON CONFLICT DO UPDATE SET` |
//! | `x::text`, `'{}'::jsonb` | `x`, `'{}'` |
//! | `jsonb_build_object(..)` and friends | `json_object(..)` and friends |
//! | `... RETURNING id` | clause removed, reported in [`TranslatedQuery::returning`] |
//! | `JSONB` column type | `TEXT` |
//! | `SERIAL PRIMARY KEY` | `INTEGER PRIMARY KEY AUTOINCREMENT` |
//! | `ILIKE` | `LIKE` |
//!
//! This is not a general translator. Anything outside the table passes through
//! unchanged and surfaces as a statement error at execution time, if at all.
//! Rewrites match tokens, so literals, quoted identifiers and comments are
//! never altered. Text the tokenizer rejects is returned as is.

use crate::models::QueryParam;
use crate::sql::lexer::{self, Lexeme, matching_paren, next_code};
use sqlparser::tokenizer::Token;

/// SQLite text with parameters aligned to its `?` markers.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
    /// Column list of a removed `RETURNING` clause (already translated).
    pub returning: Option<String>,
}

/// Translate a canonical statement and its parameters for SQLite.
///
/// Pure and infallible. Each `$N` occurrence, in textual order, becomes one `?`
/// bound to `params[N - 1]`; a placeholder with no bound value binds `NULL`.
pub fn translate(sql: &str, params: &[QueryParam]) -> TranslatedQuery {
    let Some(lexemes) = lexer::tokenize(sql) else {
        return TranslatedQuery {
            sql: sql.to_string(),
            params: params.to_vec(),
            returning: None,
        };
    };

    let mut bound = Vec::new();
    let mut returning = None;
    let sql = rewrite(&lexemes, params, &mut bound, &mut returning);
    TranslatedQuery {
        sql,
        params: bound,
        returning,
    }
}

fn rewrite(
    lexemes: &[Lexeme<'_>],
    params: &[QueryParam],
    bound: &mut Vec<QueryParam>,
    returning: &mut Option<String>,
) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut prev_code: Option<usize> = None;
    let mut i = 0;

    while i < lexemes.len() {
        let lexeme = &lexemes[i];
        if lexeme.is_trivia() {
            out.push_str(&lexeme.text);
            i += 1;
            continue;
        }

        if let Some(end) = now_call_end(lexemes, i) {
            match interval_after(lexemes, end) {
                Some((modifier, next)) => {
                    out.push_str(&format!("datetime('now', '{}')", modifier));
                    i = next;
                }
                None => {
                    let after_default = prev_code.is_some_and(|p| lexemes[p].is_word("DEFAULT"));
                    out.push_str(if after_default {
                        "(datetime('now'))"
                    } else {
                        "datetime('now')"
                    });
                    i = end;
                }
            }
        } else if let Some(end) = on_conflict_update_end(lexemes, i) {
            out.push_str("ON CONFLICT DO UPDATE SET");
            i = end;
        } else if let Some(end) = type_cast_end(lexemes, i) {
            i = end;
        } else if let Some(end) = serial_key_end(lexemes, i) {
            out.push_str("INTEGER PRIMARY KEY AUTOINCREMENT");
            i = end;
        } else if depth == 0 && lexeme.is_word("RETURNING") {
            let end = statement_end(lexemes, i + 1);
            let columns = returning_columns(&lexemes[i + 1..end], params);
            if returning.is_none() && !columns.is_empty() {
                *returning = Some(columns);
            }
            out.truncate(out.trim_end_matches([' ', '\t']).len());
            i = end;
        } else {
            match &lexeme.token {
                Token::Placeholder(p) => match positional_index(p) {
                    Some(n) => {
                        let value = n
                            .checked_sub(1)
                            .and_then(|i| params.get(i))
                            .cloned()
                            .unwrap_or(QueryParam::Null);
                        bound.push(value);
                        out.push('?');
                    }
                    None => out.push_str(&lexeme.text),
                },
                Token::LParen => {
                    depth += 1;
                    out.push_str(&lexeme.text);
                }
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    out.push_str(&lexeme.text);
                }
                Token::Word(_) => out.push_str(renamed_word(lexemes, i)),
                _ => out.push_str(&lexeme.text),
            }
            i += 1;
        }
        prev_code = Some(i.saturating_sub(1).min(lexemes.len() - 1));
    }
    out
}

/// `NOW()` or `CURRENT_TIMESTAMP` at `i`; returns the index past it.
fn now_call_end(lexemes: &[Lexeme<'_>], i: usize) -> Option<usize> {
    let lexeme = &lexemes[i];
    if lexeme.is_word("CURRENT_TIMESTAMP") {
        return Some(i + 1);
    }
    if !lexeme.is_word("NOW") {
        return None;
    }
    let open = next_code(lexemes, i + 1).filter(|&j| matches!(lexemes[j].token, Token::LParen))?;
    let close =
        next_code(lexemes, open + 1).filter(|&j| matches!(lexemes[j].token, Token::RParen))?;
    Some(close + 1)
}

/// `± INTERVAL 'N unit'` starting at `from`, as a datetime modifier.
fn interval_after(lexemes: &[Lexeme<'_>], from: usize) -> Option<(String, usize)> {
    let op = next_code(lexemes, from)?;
    let operator = match lexemes[op].token {
        Token::Plus => "+",
        Token::Minus => "-",
        _ => return None,
    };
    let keyword = next_code(lexemes, op + 1).filter(|&j| lexemes[j].is_word("INTERVAL"))?;
    let literal = next_code(lexemes, keyword + 1)
        .filter(|&j| matches!(lexemes[j].token, Token::SingleQuotedString(_)))?;
    let modifier = interval_modifier(operator, &lexemes[literal].text)?;
    Some((modifier, literal + 1))
}

/// `ON CONFLICT (cols) DO UPDATE SET` at `i`; returns the index past `SET`.
fn on_conflict_update_end(lexemes: &[Lexeme<'_>], i: usize) -> Option<usize> {
    if !lexemes[i].is_word("ON") {
        return None;
    }
    let conflict = next_code(lexemes, i + 1).filter(|&j| lexemes[j].is_word("CONFLICT"))?;
    let open = next_code(lexemes, conflict + 1)
        .filter(|&j| matches!(lexemes[j].token, Token::LParen))?;
    let mut end = matching_paren(lexemes, open)? + 1;
    for word in ["DO", "UPDATE", "SET"] {
        end = next_code(lexemes, end).filter(|&j| lexemes[j].is_word(word))? + 1;
    }
    Some(end)
}

/// `::type` suffix at `i`, including multi-word names, modifiers and `[]`.
fn type_cast_end(lexemes: &[Lexeme<'_>], i: usize) -> Option<usize> {
    if !matches!(lexemes[i].token, Token::DoubleColon) {
        return None;
    }
    let name = next_code(lexemes, i + 1)?;
    let type_name = lexemes[name].word()?.to_ascii_lowercase();
    let mut end = name + 1;

    let tail = match type_name.as_str() {
        "double" => Some("PRECISION"),
        "character" => Some("VARYING"),
        _ => None,
    };
    if let Some(next) = tail.and_then(|word| words_end(lexemes, end, &[word])) {
        end = next;
    }
    if matches!(type_name.as_str(), "timestamp" | "time") {
        let zone = words_end(lexemes, end, &["WITH", "TIME", "ZONE"])
            .or_else(|| words_end(lexemes, end, &["WITHOUT", "TIME", "ZONE"]));
        if let Some(next) = zone {
            end = next;
        }
    }
    if let Some(next) = type_modifier_end(lexemes, end) {
        end = next;
    }
    if let Some(next) = array_suffix_end(lexemes, end) {
        end = next;
    }
    Some(end)
}

/// Index past the exact word sequence starting at `from`, if present.
fn words_end(lexemes: &[Lexeme<'_>], from: usize, words: &[&str]) -> Option<usize> {
    let mut end = from;
    for word in words {
        end = next_code(lexemes, end).filter(|&j| lexemes[j].is_word(word))? + 1;
    }
    Some(end)
}

/// `(n)` or `(n, m)` after a type name.
fn type_modifier_end(lexemes: &[Lexeme<'_>], from: usize) -> Option<usize> {
    let open = next_code(lexemes, from).filter(|&j| matches!(lexemes[j].token, Token::LParen))?;
    let close = matching_paren(lexemes, open)?;
    let numeric_only = lexemes[open + 1..close]
        .iter()
        .filter(|l| !l.is_trivia())
        .all(|l| matches!(l.token, Token::Number(..) | Token::Comma));
    numeric_only.then_some(close + 1)
}

fn array_suffix_end(lexemes: &[Lexeme<'_>], from: usize) -> Option<usize> {
    let open =
        next_code(lexemes, from).filter(|&j| matches!(lexemes[j].token, Token::LBracket))?;
    let close =
        next_code(lexemes, open + 1).filter(|&j| matches!(lexemes[j].token, Token::RBracket))?;
    Some(close + 1)
}

/// `SERIAL PRIMARY KEY` (and the BIG/SMALL variants) at `i`.
fn serial_key_end(lexemes: &[Lexeme<'_>], i: usize) -> Option<usize> {
    let word = lexemes[i].word()?;
    if !["SERIAL", "BIGSERIAL", "SMALLSERIAL"]
        .iter()
        .any(|w| word.eq_ignore_ascii_case(w))
    {
        return None;
    }
    words_end(lexemes, i + 1, &["PRIMARY", "KEY"])
}

/// Index of the `;` ending the statement that contains `from`, or the end.
fn statement_end(lexemes: &[Lexeme<'_>], from: usize) -> usize {
    let mut depth = 0usize;
    for (i, lexeme) in lexemes.iter().enumerate().skip(from) {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::SemiColon if depth == 0 => return i,
            _ => {}
        }
    }
    lexemes.len()
}

/// Translated `RETURNING` column list with comments dropped.
fn returning_columns(lexemes: &[Lexeme<'_>], params: &[QueryParam]) -> String {
    let columns: Vec<Lexeme<'_>> = lexemes
        .iter()
        .map(|l| if l.is_comment() { Lexeme::space() } else { l.clone() })
        .collect();
    rewrite(&columns, params, &mut Vec::new(), &mut None)
        .trim()
        .to_string()
}

/// Word at `i`, with PostgreSQL-only names replaced.
fn renamed_word<'a>(lexemes: &'a [Lexeme<'_>], i: usize) -> &'a str {
    let lexeme = &lexemes[i];
    let Some(word) = lexeme.word() else {
        return lexeme.text.as_ref();
    };
    let next_is_call = next_code(lexemes, i + 1)
        .is_some_and(|j| matches!(lexemes[j].token, Token::LParen));

    if next_is_call {
        if let Some(renamed) = sqlite_json_function(word) {
            return renamed;
        }
    } else if word.eq_ignore_ascii_case("JSONB") {
        return "TEXT";
    }
    if word.eq_ignore_ascii_case("ILIKE") {
        return "LIKE";
    }
    lexeme.text.as_ref()
}

/// `$N` placeholders; other placeholder styles are left alone.
fn positional_index(placeholder: &str) -> Option<usize> {
    placeholder.strip_prefix('$')?.parse().ok()
}

/// `'7 days'` with operator `-` becomes `-7 days`.
fn interval_modifier(operator: &str, literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut parts = inner.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?.to_ascii_lowercase();
    if parts.next().is_some() {
        return None;
    }

    let (amount, unit) = match unit.trim_end_matches('s') {
        "second" => (amount, "seconds"),
        "minute" => (amount, "minutes"),
        "hour" => (amount, "hours"),
        "day" => (amount, "days"),
        "week" => (amount.checked_mul(7)?, "days"),
        "month" => (amount, "months"),
        "year" => (amount, "years"),
        _ => return None,
    };
    let signed = if operator == "-" { amount.checked_neg()? } else { amount };
    Some(format!("{:+} {}", signed, unit))
}

fn sqlite_json_function(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "json_build_object" | "jsonb_build_object" => Some("json_object"),
        "json_build_array" | "jsonb_build_array" => Some("json_array"),
        "json_object_agg" | "jsonb_object_agg" => Some("json_group_object"),
        "json_agg" | "jsonb_agg" => Some("json_group_array"),
        "jsonb_set" => Some("json_set"),
        "jsonb_array_length" => Some("json_array_length"),
        "json_typeof" | "jsonb_typeof" => Some("json_type"),
        _ => None,
    }
}

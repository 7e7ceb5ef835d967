//! Response normalization.
//!
//! Everything a provider returns passes through here before any rail looks
//! at it. Normalization is total: it never panics and never returns an
//! error. Malformed JSON and broken SQL come out as payloads with
//! `parse_error` set, so validators can turn them into verdicts instead of
//! the engine falling over.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{
    ExpectedShape, FieldType, JsonPayload, NormalizedResponse, Rail, RawResponse, SqlClause,
    SqlSkeleton,
};

/// Characters of raw body kept for evidence excerpts.
const EXCERPT_CHARS: usize = 120;

lazy_static! {
    /// Markdown code fences, with or without a language tag.
    static ref CODE_FENCE: Regex = Regex::new(r"```[a-zA-Z]*\r?\n?").unwrap();
}

/// Clause keywords recognized by the SQL tokenizer, single-token ones only.
/// `GROUP BY` and `ORDER BY` are merged during the scan.
const CLAUSE_KEYWORDS: &[&str] = &[
    "FROM", "INTO", "SET", "VALUES", "WHERE", "HAVING", "LIMIT", "JOIN", "ON",
];

/// Normalize a raw response for the given expected shape.
///
/// Timed-out and whitespace-only responses collapse to
/// [`NormalizedResponse::Empty`] regardless of shape.
pub fn normalize(raw: &RawResponse, shape: ExpectedShape) -> NormalizedResponse {
    let body = match raw {
        RawResponse::TimedOut => return NormalizedResponse::Empty,
        RawResponse::Content(body) => body,
    };

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return NormalizedResponse::Empty;
    }

    match shape {
        ExpectedShape::FreeText => NormalizedResponse::PlainText(trimmed.to_string()),
        ExpectedShape::Json => {
            let cleaned = strip_code_fences(trimmed);
            if cleaned.is_empty() {
                return NormalizedResponse::Empty;
            }
            NormalizedResponse::ParsedJson(parse_json(&cleaned))
        }
        ExpectedShape::Sql => {
            let cleaned = strip_code_fences(trimmed);
            if cleaned.is_empty() {
                return NormalizedResponse::Empty;
            }
            NormalizedResponse::ParsedSql(parse_sql(&cleaned))
        }
    }
}

/// Normalize for a specific rail.
///
/// Shape selection comes from [`Rail::expected_shape`]. For the data-type
/// rail a cleanly parsed object is lifted to
/// [`NormalizedResponse::TypedFields`]; parse failures stay as
/// [`NormalizedResponse::ParsedJson`] so the error flag survives.
pub fn normalize_for_rail(raw: &RawResponse, rail: Rail) -> NormalizedResponse {
    let normalized = normalize(raw, rail.expected_shape());
    match (rail, normalized) {
        (Rail::UnexpectedDataTypes, NormalizedResponse::ParsedJson(payload))
            if !payload.has_parse_error() =>
        {
            NormalizedResponse::TypedFields(payload.observed_types())
        }
        (_, normalized) => normalized,
    }
}

/// Remove markdown code fences that models like to wrap payloads in.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

fn excerpt_of(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

fn parse_json(text: &str) -> JsonPayload {
    let excerpt = excerpt_of(text);
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => JsonPayload {
            fields: map.into_iter().collect(),
            parse_error: None,
            excerpt,
        },
        Ok(other) => JsonPayload {
            fields: BTreeMap::new(),
            parse_error: Some(format!(
                "top-level value is not an object (found {})",
                FieldType::of(&other)
            )),
            excerpt,
        },
        Err(e) => {
            tracing::debug!(error = %e, "json parse failed");
            JsonPayload {
                fields: BTreeMap::new(),
                parse_error: Some(e.to_string()),
                excerpt,
            }
        }
    }
}

fn parse_sql(text: &str) -> SqlSkeleton {
    // Unterminated literals make every later split unreliable, so they
    // short-circuit tokenization entirely.
    if text.matches('\'').count() % 2 != 0 {
        return SqlSkeleton {
            statement: text.to_string(),
            statement_count: 1,
            parse_error: Some("unterminated string literal".to_string()),
            ..SqlSkeleton::default()
        };
    }

    let statements = split_statements(text);
    let statement_count = statements.len();
    let statement = statements.first().cloned().unwrap_or_default();

    let mut skeleton = SqlSkeleton {
        statement: statement.clone(),
        statement_count,
        ..SqlSkeleton::default()
    };

    if let Some(error) = check_paren_balance(&statement) {
        skeleton.parse_error = Some(error);
        return skeleton;
    }

    skeleton.tokens = tokenize(&statement);

    let verb = match skeleton.tokens.first() {
        Some(word) if word.chars().all(|c| c.is_ascii_alphabetic()) => word.to_uppercase(),
        Some(word) => {
            skeleton.parse_error = Some(format!("statement starts with '{}', not a verb", word));
            return skeleton;
        }
        None => {
            skeleton.parse_error = Some("statement has no tokens".to_string());
            return skeleton;
        }
    };

    if skeleton.tokens.len() < 2 {
        skeleton.verb = Some(verb);
        skeleton.parse_error = Some("statement is incomplete".to_string());
        return skeleton;
    }

    skeleton.clauses = scan_clauses(&skeleton.tokens[1..]);

    if let Some(dangling) = skeleton.clauses.iter().find(|c| c.body.is_empty()) {
        skeleton.verb = Some(verb);
        skeleton.parse_error = Some(format!("dangling {} clause", dangling.keyword));
        return skeleton;
    }

    skeleton.target = find_target(&verb, &skeleton.tokens, &skeleton.clauses);
    skeleton.verb = Some(verb);
    skeleton
}

/// Split on `;` outside string literals, dropping blank segments.
fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_literal = false;

    for c in text.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                current.push(c);
            }
            ';' if !in_literal => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    statements.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    statements
}

fn check_paren_balance(statement: &str) -> Option<String> {
    let mut depth: i32 = 0;
    let mut in_literal = false;
    for c in statement.chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => {
                depth -= 1;
                if depth < 0 {
                    return Some("unbalanced parentheses".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Some("unbalanced parentheses".to_string());
    }
    None
}

/// Whitespace-and-symbol tokenizer. Quoted literals stay whole.
fn tokenize(statement: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = statement.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                let mut literal = String::from('\'');
                for q in chars.by_ref() {
                    literal.push(q);
                    if q == '\'' {
                        break;
                    }
                }
                tokens.push(literal);
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '(' | ')' | ',' | '=' | '<' | '>' | '+' | '-' | '/' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Walk the tokens after the verb and group them into clauses.
fn scan_clauses(tokens: &[String]) -> Vec<SqlClause> {
    let mut clauses = Vec::new();
    let mut current: Option<SqlClause> = None;
    let mut i = 0;

    while i < tokens.len() {
        let upper = tokens[i].to_uppercase();
        let next_upper = tokens.get(i + 1).map(|t| t.to_uppercase());

        let keyword = if (upper == "GROUP" || upper == "ORDER")
            && next_upper.as_deref() == Some("BY")
        {
            i += 1;
            Some(format!("{} BY", upper))
        } else if CLAUSE_KEYWORDS.contains(&upper.as_str()) {
            Some(upper)
        } else {
            None
        };

        match keyword {
            Some(keyword) => {
                if let Some(clause) = current.take() {
                    clauses.push(clause);
                }
                current = Some(SqlClause {
                    keyword,
                    body: String::new(),
                });
            }
            None => {
                if let Some(clause) = current.as_mut() {
                    if !clause.body.is_empty() {
                        clause.body.push(' ');
                    }
                    clause.body.push_str(&tokens[i]);
                }
            }
        }
        i += 1;
    }

    if let Some(clause) = current.take() {
        clauses.push(clause);
    }
    clauses
}

fn find_target(verb: &str, tokens: &[String], clauses: &[SqlClause]) -> Option<String> {
    let first_word = |body: &str| body.split_whitespace().next().map(|s| s.to_string());

    match verb {
        "SELECT" | "DELETE" => clauses
            .iter()
            .find(|c| c.keyword == "FROM")
            .and_then(|c| first_word(&c.body)),
        "INSERT" => clauses
            .iter()
            .find(|c| c.keyword == "INTO")
            .and_then(|c| first_word(&c.body)),
        "UPDATE" => tokens.get(1).cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(body: &str) -> RawResponse {
        RawResponse::text(body)
    }

    #[test]
    fn test_timed_out_normalizes_to_empty() {
        for shape in [ExpectedShape::FreeText, ExpectedShape::Json, ExpectedShape::Sql] {
            assert_eq!(
                normalize(&RawResponse::TimedOut, shape),
                NormalizedResponse::Empty
            );
        }
    }

    #[test]
    fn test_blank_content_normalizes_to_empty() {
        assert_eq!(
            normalize(&text("   \n\t  "), ExpectedShape::Json),
            NormalizedResponse::Empty
        );
    }

    #[test]
    fn test_free_text_is_trimmed() {
        let normalized = normalize(&text("  The answer is 42.  "), ExpectedShape::FreeText);
        assert_eq!(
            normalized,
            NormalizedResponse::PlainText("The answer is 42.".to_string())
        );
    }

    #[test]
    fn test_fenced_json_parses() {
        let body = "```json\n{\"id\": 1, \"name\": \"Alice Wonderland\"}\n```";
        let normalized = normalize(&text(body), ExpectedShape::Json);
        match normalized {
            NormalizedResponse::ParsedJson(payload) => {
                assert!(payload.parse_error.is_none());
                assert_eq!(payload.fields.len(), 2);
                assert_eq!(
                    payload.fields.get("name"),
                    Some(&serde_json::json!("Alice Wonderland"))
                );
            }
            other => panic!("expected ParsedJson, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_sets_parse_error_in_band() {
        let normalized = normalize(&text("{\"id\": 1,"), ExpectedShape::Json);
        match normalized {
            NormalizedResponse::ParsedJson(payload) => {
                assert!(payload.has_parse_error());
                assert!(payload.fields.is_empty());
                assert_eq!(payload.excerpt, "{\"id\": 1,");
            }
            other => panic!("expected ParsedJson, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_top_level_is_a_parse_error() {
        let normalized = normalize(&text("[1, 2, 3]"), ExpectedShape::Json);
        let error = normalized.parse_error().unwrap().to_string();
        assert!(error.contains("not an object"));
        assert!(error.contains("array"));
    }

    #[test]
    fn test_select_statement_skeleton() {
        let normalized = normalize(
            &text("SELECT id, name FROM users WHERE age > 30 ORDER BY name"),
            ExpectedShape::Sql,
        );
        match normalized {
            NormalizedResponse::ParsedSql(skeleton) => {
                assert_eq!(skeleton.verb.as_deref(), Some("SELECT"));
                assert_eq!(skeleton.target.as_deref(), Some("users"));
                assert!(skeleton.parse_error.is_none());
                assert!(skeleton.has_clause("WHERE"));
                assert!(skeleton.has_clause("ORDER BY"));
                assert_eq!(skeleton.statement_count, 1);
            }
            other => panic!("expected ParsedSql, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_where_clause_is_a_parse_error() {
        let normalized = normalize(&text("SELECT * FROM users WHERE"), ExpectedShape::Sql);
        assert_eq!(
            normalized.parse_error(),
            Some("dangling WHERE clause")
        );
    }

    #[test]
    fn test_unbalanced_parentheses_are_a_parse_error() {
        let normalized = normalize(
            &text("INSERT INTO users (id, name VALUES (1, 'Alice')"),
            ExpectedShape::Sql,
        );
        assert_eq!(normalized.parse_error(), Some("unbalanced parentheses"));
    }

    #[test]
    fn test_unterminated_literal_is_a_parse_error() {
        let normalized = normalize(
            &text("SELECT * FROM users WHERE name = 'Alice"),
            ExpectedShape::Sql,
        );
        assert_eq!(normalized.parse_error(), Some("unterminated string literal"));
    }

    #[test]
    fn test_multiple_statements_are_counted() {
        let normalized = normalize(
            &text("SELECT * FROM users; DROP TABLE users;"),
            ExpectedShape::Sql,
        );
        match normalized {
            NormalizedResponse::ParsedSql(skeleton) => {
                assert_eq!(skeleton.statement_count, 2);
                assert_eq!(skeleton.verb.as_deref(), Some("SELECT"));
            }
            other => panic!("expected ParsedSql, got {:?}", other),
        }
    }

    #[test]
    fn test_semicolon_inside_literal_does_not_split() {
        let normalized = normalize(
            &text("SELECT * FROM users WHERE note = 'a;b'"),
            ExpectedShape::Sql,
        );
        match normalized {
            NormalizedResponse::ParsedSql(skeleton) => {
                assert_eq!(skeleton.statement_count, 1);
                assert!(skeleton.parse_error.is_none());
            }
            other => panic!("expected ParsedSql, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_target() {
        let normalized = normalize(
            &text("INSERT INTO users (id, name) VALUES (1, 'Alice')"),
            ExpectedShape::Sql,
        );
        match normalized {
            NormalizedResponse::ParsedSql(skeleton) => {
                assert_eq!(skeleton.target.as_deref(), Some("users"));
            }
            other => panic!("expected ParsedSql, got {:?}", other),
        }
    }

    #[test]
    fn test_update_target() {
        let normalized = normalize(
            &text("UPDATE users SET age = 31 WHERE id = 1"),
            ExpectedShape::Sql,
        );
        match normalized {
            NormalizedResponse::ParsedSql(skeleton) => {
                assert_eq!(skeleton.target.as_deref(), Some("users"));
                assert_eq!(skeleton.clause("SET"), Some("age = 31"));
            }
            other => panic!("expected ParsedSql, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_verb_is_incomplete() {
        let normalized = normalize(&text("SELECT"), ExpectedShape::Sql);
        assert_eq!(normalized.parse_error(), Some("statement is incomplete"));
    }

    #[test]
    fn test_prose_as_sql_is_not_a_verb() {
        let normalized = normalize(&text("42 rows, probably"), ExpectedShape::Sql);
        assert!(normalized
            .parse_error()
            .unwrap()
            .contains("not a verb"));
    }

    #[test]
    fn test_typed_fields_elevation_for_data_type_rail() {
        let body = "{\"id\": 1, \"age\": \"30\"}";
        let normalized = normalize_for_rail(&text(body), Rail::UnexpectedDataTypes);
        match normalized {
            NormalizedResponse::TypedFields(types) => {
                assert_eq!(types.get("id"), Some(&FieldType::Number));
                assert_eq!(types.get("age"), Some(&FieldType::String));
            }
            other => panic!("expected TypedFields, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_survives_data_type_rail() {
        let normalized = normalize_for_rail(&text("not json"), Rail::UnexpectedDataTypes);
        assert!(matches!(normalized, NormalizedResponse::ParsedJson(_)));
        assert!(normalized.parse_error().is_some());
    }

    #[test]
    fn test_strip_code_fences_handles_language_tags() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT 1\n```"),
            "SELECT 1"
        );
        assert_eq!(strip_code_fences("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    proptest! {
        #[test]
        fn prop_whitespace_only_input_is_empty(ws in "[ \t\r\n]{0,64}") {
            for shape in [ExpectedShape::FreeText, ExpectedShape::Json, ExpectedShape::Sql] {
                prop_assert_eq!(
                    normalize(&RawResponse::text(ws.clone()), shape),
                    NormalizedResponse::Empty
                );
            }
        }

        #[test]
        fn prop_normalize_is_total(body in ".{0,256}") {
            for shape in [ExpectedShape::FreeText, ExpectedShape::Json, ExpectedShape::Sql] {
                let _ = normalize(&RawResponse::text(body.clone()), shape);
            }
        }

        #[test]
        fn prop_sql_tokenizer_is_total(body in "[a-zA-Z0-9 '();,=<>*._-]{1,128}") {
            let _ = normalize(&RawResponse::text(body.clone()), ExpectedShape::Sql);
        }
    }
}

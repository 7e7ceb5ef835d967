//! Invalid-SQL rail.
//!
//! Judges the skeleton the normalizer produced: tokenization failures,
//! disallowed verbs, multi-statement payloads, and mutations that forgot
//! their `WHERE` clause. These are keyword checks against the skeleton,
//! not a SQL grammar; they catch a model that answered prose (or danger)
//! when SQL was asked for.

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::types::{NormalizedResponse, Rail, RequestContext, SqlSkeleton, Verdict};

use super::{clip, Validator};

const EVIDENCE_CHARS: usize = 120;

/// Verbs that mutate rows and therefore want a `WHERE` clause.
const MUTATION_VERBS: &[&str] = &["DELETE", "UPDATE"];

#[derive(Debug, Default)]
pub struct SqlValidator;

impl SqlValidator {
    pub fn new() -> Self {
        Self
    }

    fn statement_evidence(skeleton: &SqlSkeleton) -> Vec<Evidence> {
        vec![Evidence::from_response_body(clip(
            &skeleton.statement,
            EVIDENCE_CHARS,
        ))]
    }

    fn verb_allowed(verb: &str, config: &RailConfig) -> bool {
        config
            .sql
            .allowed_verbs
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(verb))
    }
}

impl Validator for SqlValidator {
    fn rail(&self) -> Rail {
        Rail::InvalidSql
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        let skeleton = match response {
            NormalizedResponse::Empty => {
                return Verdict::fail(self.rail(), "no SQL statement arrived to check");
            }
            NormalizedResponse::ParsedSql(skeleton) => skeleton,
            _ => {
                return Verdict::inconclusive(self.rail(), "expected a SQL-shaped response");
            }
        };

        if let Some(error) = &skeleton.parse_error {
            return Verdict::fail(
                self.rail(),
                format!("response does not hold up as SQL: {}", error),
            )
            .with_evidence(Self::statement_evidence(skeleton));
        }

        if skeleton.statement_count > 1 && !config.sql.allow_multiple_statements {
            return Verdict::fail(
                self.rail(),
                format!(
                    "response contains {} statements; only one is allowed",
                    skeleton.statement_count
                ),
            )
            .with_evidence(Self::statement_evidence(skeleton));
        }

        let verb = skeleton.verb.as_deref().unwrap_or_default();
        if !Self::verb_allowed(verb, config) {
            return Verdict::fail(
                self.rail(),
                format!(
                    "statement verb {} is not in the allowed set ({})",
                    verb,
                    config.sql.allowed_verbs.join(", ")
                ),
            )
            .with_evidence(Self::statement_evidence(skeleton));
        }

        if config.sql.require_where_for_mutations
            && MUTATION_VERBS.contains(&verb)
            && !skeleton.has_clause("WHERE")
        {
            return Verdict::fail(
                self.rail(),
                format!("{} statement has no WHERE clause", verb),
            )
            .with_evidence(Self::statement_evidence(skeleton));
        }

        let target = skeleton
            .target
            .as_deref()
            .map(|t| format!(" targeting {}", t))
            .unwrap_or_default();
        Verdict::pass(
            self.rail(),
            format!("statement parses as {}{}", verb, target),
        )
    }
}

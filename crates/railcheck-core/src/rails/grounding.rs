//! Phantom-data rail.
//!
//! Flags responses that name entities absent from the reference data,
//! the classic hallucination where a model invents a plausible person
//! rather than admitting it has no record. A response that discloses the
//! missing data honestly passes.

use std::collections::BTreeSet;

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::rails::patterns;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::Validator;

#[derive(Debug, Default)]
pub struct GroundingValidator;

impl GroundingValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for GroundingValidator {
    fn rail(&self) -> Rail {
        Rail::PhantomData
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        let text = match response.flattened_text() {
            Some(text) if !response.is_empty() => text,
            _ => {
                return Verdict::inconclusive(
                    self.rail(),
                    "no text to check for fabricated entities",
                );
            }
        };

        let lowered = text.to_lowercase();
        for phrase in &config.reference.disclaimer_phrases {
            if lowered.contains(&phrase.to_lowercase()) {
                return Verdict::pass(
                    self.rail(),
                    format!("response discloses it has no data (\"{}\")", phrase),
                );
            }
        }

        let entities = named_entities(&text);
        if entities.is_empty() {
            return Verdict::pass(self.rail(), "response names no entities");
        }

        let known = &config.reference.known_entities;
        let unknown: Vec<&String> = entities
            .iter()
            .filter(|entity| !known.iter().any(|k| k.eq_ignore_ascii_case(entity)))
            .collect();
        if unknown.is_empty() {
            return Verdict::pass(
                self.rail(),
                format!(
                    "all {} named entities appear in the reference data",
                    entities.len()
                ),
            );
        }

        let evidence = unknown
            .iter()
            .map(|entity| match patterns::first_occurrence(&text, entity) {
                Some((start, end)) => Evidence::from_response(entity.as_str(), start, end),
                None => Evidence::from_response_body(entity.as_str()),
            })
            .collect();
        Verdict::fail(
            self.rail(),
            format!(
                "response names entities absent from the reference data: {}",
                unknown
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )
        .with_evidence(evidence)
    }
}

/// Candidate entity names: quoted strings and capitalized multi-word runs,
/// deduplicated case-insensitively. Quoted text that does not start with a
/// capital letter is not treated as a name.
fn named_entities(text: &str) -> Vec<String> {
    let mut candidates = patterns::quoted_names(text);
    candidates.extend(patterns::proper_names(text));

    let mut seen = BTreeSet::new();
    let mut entities = Vec::new();
    for candidate in candidates {
        if !candidate
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase())
        {
            continue;
        }
        if seen.insert(candidate.to_lowercase()) {
            entities.push(candidate);
        }
    }
    entities
}

//! Contradiction rail.
//!
//! Two signals, with different weights. Configured exclusivity pairs are
//! hard evidence: a response asserting both members fails. Hedging
//! keywords only suggest trouble, so crossing the keyword threshold
//! reports Inconclusive rather than Fail.

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::rails::patterns;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::Validator;

#[derive(Debug, Default)]
pub struct ContradictionValidator;

impl ContradictionValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for ContradictionValidator {
    fn rail(&self) -> Rail {
        Rail::Contradiction
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
                return Verdict::inconclusive(self.rail(), "no text to scan for contradictions");
            }
        };

        let mut conflicts = Vec::new();
        let mut evidence = Vec::new();
        for (first, second) in &config.contradiction.exclusivity_pairs {
            if pair_conflicts(&text, first, second) {
                conflicts.push(format!("\"{}\" with \"{}\"", first, second));
                for member in [first, second] {
                    if let Some((start, end)) = patterns::first_occurrence(&text, member) {
                        let shown = text.get(start..end).unwrap_or(member.as_str());
                        evidence.push(Evidence::from_response(shown, start, end));
                    }
                }
            }
        }
        if !conflicts.is_empty() {
            return Verdict::fail(
                self.rail(),
                format!(
                    "response asserts mutually exclusive statements: {}",
                    conflicts.join("; ")
                ),
            )
            .with_evidence(evidence);
        }

        let hits = patterns::term_hits(&text, &config.contradiction.negation_keywords);
        let total: usize = hits.iter().map(|(_, count)| count).sum();
        if total >= config.contradiction.min_keyword_hits {
            let listed = hits
                .iter()
                .map(|(term, _)| term.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Verdict::inconclusive(
                self.rail(),
                format!("hedging language suggests a possible contradiction: {}", listed),
            );
        }

        Verdict::pass(self.rail(), "no contradictory statements detected")
    }
}

/// Whether a response asserts both members of an exclusivity pair. When one
/// member is a phrase containing the other ("open" inside "no open"), a bare
/// presence check would see a phantom first member inside every second-member
/// hit, so the shorter member must occur more often than the longer one.
fn pair_conflicts(text: &str, first: &str, second: &str) -> bool {
    let first_hits = patterns::count_occurrences(text, first);
    let second_hits = patterns::count_occurrences(text, second);
    if first_hits == 0 || second_hits == 0 {
        return false;
    }
    if patterns::contains_term(second, first) {
        return first_hits > second_hits;
    }
    if patterns::contains_term(first, second) {
        return second_hits > first_hits;
    }
    true
}

//! Bias-detection and sensitivity rails.
//!
//! Both scan response text for configured term lists. Bias tolerates
//! scattered mentions and fails only when indicator terms accumulate past
//! a frequency threshold; sensitivity fails on the first restricted term.

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::rails::patterns;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::Validator;

#[derive(Debug, Default)]
pub struct BiasValidator;

impl BiasValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BiasValidator {
    fn rail(&self) -> Rail {
        Rail::BiasDetection
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        let Some(text) = scan_text(response) else {
            return Verdict::inconclusive(self.rail(), "no text to scan for indicator terms");
        };

        let hits = patterns::term_hits(&text, &config.bias.indicator_terms);
        let total: usize = hits.iter().map(|(_, count)| count).sum();
        let threshold = config.bias.frequency_threshold;

        if total >= threshold {
            let mut evidence = term_evidence(&text, &hits);
            evidence.push(Evidence::from_config(
                threshold.to_string(),
                "bias.frequency_threshold",
            ));
            return Verdict::fail(
                self.rail(),
                format!(
                    "indicator terms occur {} times, reaching the threshold of {}: {}",
                    total,
                    threshold,
                    list_hits(&hits)
                ),
            )
            .with_evidence(evidence);
        }
        if total == 0 {
            return Verdict::pass(self.rail(), "no indicator terms appear");
        }
        Verdict::pass(
            self.rail(),
            format!(
                "indicator terms occur {} times, below the threshold of {}",
                total, threshold
            ),
        )
    }
}

#[derive(Debug, Default)]
pub struct SensitivityValidator;

impl SensitivityValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for SensitivityValidator {
    fn rail(&self) -> Rail {
        Rail::Sensitivity
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        let Some(text) = scan_text(response) else {
            return Verdict::inconclusive(self.rail(), "no text to scan for restricted terms");
        };

        let hits = patterns::term_hits(&text, &config.sensitivity.terms);
        if hits.is_empty() {
            return Verdict::pass(self.rail(), "no restricted terms appear");
        }
        Verdict::fail(
            self.rail(),
            format!("response touches restricted terms: {}", list_hits(&hits)),
        )
        .with_evidence(term_evidence(&text, &hits))
    }
}

fn scan_text(response: &NormalizedResponse) -> Option<String> {
    if response.is_empty() {
        return None;
    }
    response.flattened_text()
}

fn list_hits(hits: &[(String, usize)]) -> String {
    hits.iter()
        .map(|(term, count)| {
            if *count > 1 {
                format!("{} (x{})", term, count)
            } else {
                term.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn term_evidence(text: &str, hits: &[(String, usize)]) -> Vec<Evidence> {
    hits.iter()
        .filter_map(|(term, _)| {
            patterns::first_occurrence(text, term).map(|(start, end)| {
                let shown = text.get(start..end).unwrap_or(term.as_str());
                Evidence::from_response(shown, start, end)
            })
        })
        .collect()
}

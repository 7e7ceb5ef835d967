//! Evidence attached to rail verdicts.
//!
//! A Fail verdict should point at the data that failed, not just assert
//! that something did. Evidence pairs an excerpt of the offending data
//! with a pointer to where it was observed.

use serde::{Deserialize, Serialize};

use crate::types::EvidenceSource;

/// A piece of evidence supporting a verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    /// Excerpt of the offending data.
    pub excerpt: String,

    /// Where the excerpt was observed.
    pub source: EvidenceSource,

    /// Pointer to the location (e.g., "response[47:72]").
    pub pointer: String,
}

impl Evidence {
    /// Evidence from a span of the response body.
    pub fn from_response(excerpt: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            excerpt: excerpt.into(),
            source: EvidenceSource::Response,
            pointer: format!("response[{}:{}]", start, end),
        }
    }

    /// Evidence from the response body with no meaningful span.
    pub fn from_response_body(excerpt: impl Into<String>) -> Self {
        Self {
            excerpt: excerpt.into(),
            source: EvidenceSource::Response,
            pointer: "response".to_string(),
        }
    }

    /// Evidence from a named field of a parsed JSON response.
    pub fn from_field(excerpt: impl Into<String>, field: &str) -> Self {
        Self {
            excerpt: excerpt.into(),
            source: EvidenceSource::Field,
            pointer: format!("response.{}", field),
        }
    }

    /// Evidence from the prompt that was sent.
    pub fn from_prompt(excerpt: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            excerpt: excerpt.into(),
            source: EvidenceSource::Prompt,
            pointer: format!("prompt[{}:{}]", start, end),
        }
    }

    /// Evidence from a configuration value.
    pub fn from_config(excerpt: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            excerpt: excerpt.into(),
            source: EvidenceSource::Config,
            pointer: path.into(),
        }
    }
}

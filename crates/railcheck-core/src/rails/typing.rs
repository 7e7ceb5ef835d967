//! Unexpected-data-types rail.
//!
//! Compares the runtime type of each field the response carries against
//! the type declared for it in the configuration. Fields the response
//! does not carry are the mismatched-json rail's concern, not this one's.

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::types::{FieldType, NormalizedResponse, Rail, RequestContext, Verdict};

use super::{clip, Validator};

const EVIDENCE_CHARS: usize = 120;

#[derive(Debug, Default)]
pub struct DataTypeValidator;

impl DataTypeValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for DataTypeValidator {
    fn rail(&self) -> Rail {
        Rail::UnexpectedDataTypes
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        let required = &config.json_shape.required;
        let mut checked = 0usize;
        let mut mismatched: Vec<String> = Vec::new();
        let mut evidence: Vec<Evidence> = Vec::new();

        match response {
            NormalizedResponse::Empty => {
                return Verdict::fail(self.rail(), "empty response carries no fields to type-check");
            }
            NormalizedResponse::TypedFields(fields) => {
                for (field, expected) in required {
                    if let Some(observed) = fields.get(field) {
                        checked += 1;
                        if observed != expected {
                            mismatched.push(field.clone());
                            evidence.push(Evidence::from_field(
                                format!("expected {}, observed {}", expected, observed),
                                field,
                            ));
                        }
                    }
                }
            }
            NormalizedResponse::ParsedJson(payload) => {
                if let Some(error) = &payload.parse_error {
                    return Verdict::fail(
                        self.rail(),
                        format!("response is not valid JSON: {}", error),
                    )
                    .with_evidence(vec![Evidence::from_response_body(clip(
                        &payload.excerpt,
                        EVIDENCE_CHARS,
                    ))]);
                }
                for (field, expected) in required {
                    if let Some(value) = payload.fields.get(field) {
                        checked += 1;
                        let observed = FieldType::of(value);
                        if observed != *expected {
                            let rendered = clip(&value.to_string(), EVIDENCE_CHARS);
                            let excerpt = match coercion_target(value, *expected) {
                                Some(target) => format!(
                                    "{} is a {} that would parse as a {}",
                                    rendered, observed, target
                                ),
                                None => {
                                    format!("{} is a {}, expected {}", rendered, observed, expected)
                                }
                            };
                            mismatched.push(field.clone());
                            evidence.push(Evidence::from_field(excerpt, field));
                        }
                    }
                }
            }
            _ => {
                return Verdict::inconclusive(self.rail(), "expected a JSON-shaped response");
            }
        }

        if checked == 0 {
            return Verdict::inconclusive(
                self.rail(),
                "none of the required fields appear in the response",
            );
        }
        if mismatched.is_empty() {
            return Verdict::pass(
                self.rail(),
                format!("all {} checked fields carry their declared types", checked),
            );
        }
        Verdict::fail(
            self.rail(),
            format!(
                "{} of {} checked fields carry unexpected types: {}",
                mismatched.len(),
                checked,
                mismatched.join(", ")
            ),
        )
        .with_evidence(evidence)
    }
}

/// The declared type a mismatched string value would still parse as, if any.
fn coercion_target(value: &serde_json::Value, expected: FieldType) -> Option<&'static str> {
    let text = value.as_str()?;
    match expected {
        FieldType::Number if text.trim().parse::<f64>().is_ok() => Some("number"),
        FieldType::Boolean if text.trim().eq_ignore_ascii_case("true") => Some("boolean"),
        FieldType::Boolean if text.trim().eq_ignore_ascii_case("false") => Some("boolean"),
        _ => None,
    }
}

//! Mismatched-JSON rail.
//!
//! Checks a parsed payload against the configured field set: malformed
//! documents fail citing the parser, then missing and unexpected keys are
//! listed by name.

use crate::config::RailConfig;
use crate::evidence::Evidence;
use crate::types::{NormalizedResponse, Rail, RequestContext, Verdict};

use super::{clip, Validator};

const EVIDENCE_CHARS: usize = 120;

#[derive(Debug, Default)]
pub struct JsonShapeValidator;

impl JsonShapeValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for JsonShapeValidator {
    fn rail(&self) -> Rail {
        Rail::MismatchedJson
    }

    fn evaluate(
        &self,
        response: &NormalizedResponse,
        _ctx: &RequestContext,
        config: &RailConfig,
    ) -> Verdict {
        let payload = match response {
            NormalizedResponse::Empty => {
                return Verdict::fail(
                    self.rail(),
                    "empty response cannot satisfy the required schema",
                );
            }
            NormalizedResponse::ParsedJson(payload) => payload,
            _ => {
                return Verdict::inconclusive(self.rail(), "expected a JSON-shaped response");
            }
        };

        if let Some(error) = &payload.parse_error {
            return Verdict::fail(
                self.rail(),
                format!("response is not a valid JSON object: {}", error),
            )
            .with_evidence(vec![Evidence::from_response_body(clip(
                &payload.excerpt,
                EVIDENCE_CHARS,
            ))]);
        }

        let required = &config.json_shape.required;
        let missing: Vec<&String> = required
            .keys()
            .filter(|key| !payload.fields.contains_key(*key))
            .collect();
        let extra: Vec<&String> = if config.json_shape.allow_extra_keys {
            vec![]
        } else {
            payload
                .fields
                .keys()
                .filter(|key| !required.contains_key(*key))
                .collect()
        };

        if missing.is_empty() && extra.is_empty() {
            return Verdict::pass(
                self.rail(),
                format!("all {} required fields present", required.len()),
            );
        }

        let mut problems = Vec::new();
        let mut evidence = Vec::new();
        if !missing.is_empty() {
            problems.push(format!(
                "missing required fields: {}",
                missing
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            for field in &missing {
                evidence.push(Evidence::from_config(
                    "required field absent from response",
                    format!("schema.required.{}", field),
                ));
            }
        }
        if !extra.is_empty() {
            problems.push(format!(
                "unexpected fields: {}",
                extra
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            for field in &extra {
                let value = payload
                    .fields
                    .get(*field)
                    .map(|v| clip(&v.to_string(), EVIDENCE_CHARS))
                    .unwrap_or_default();
                evidence.push(Evidence::from_field(value, field));
            }
        }

        Verdict::fail(self.rail(), problems.join("; ")).with_evidence(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawResponse;

    fn evaluate(body: &str) -> Verdict {
        evaluate_with(body, &RailConfig::default())
    }

    fn evaluate_with(body: &str, config: &RailConfig) -> Verdict {
        let ctx = RequestContext::new(
            Rail::MismatchedJson,
            "Return the user as JSON.",
            "openai",
            "gpt-3.5-turbo",
        );
        let response =
            crate::normalize::normalize_for_rail(&RawResponse::text(body), Rail::MismatchedJson);
        JsonShapeValidator::new().evaluate(&response, &ctx, config)
    }

    const COMPLETE_USER: &str = r#"{
        "id": 1,
        "name": "Alice Wonderland",
        "age": 30,
        "email": "alice@example.com"
    }"#;

    #[test]
    fn test_complete_object_passes() {
        let verdict = evaluate(COMPLETE_USER);
        assert!(verdict.is_pass());
        assert!(verdict.reason.contains("4 required fields"));
    }

    #[test]
    fn test_malformed_json_fails_citing_parse_failure() {
        let verdict = evaluate("{\"id\": 1, \"name\": ");
        assert!(verdict.is_fail());
        assert!(verdict.reason.contains("not a valid JSON object"));
        assert_eq!(verdict.evidence.len(), 1);
        assert!(verdict.evidence[0].excerpt.starts_with("{\"id\": 1"));
    }

    #[test]
    fn test_truncated_fenced_json_fails() {
        let verdict = evaluate("```json\n{\"id\": 1, \"name\": \"Alice\"");
        assert!(verdict.is_fail());
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let verdict = evaluate(r#"{"id": 1, "name": "Alice Wonderland"}"#);
        assert!(verdict.is_fail());
        assert!(verdict.reason.contains("missing required fields"));
        assert!(verdict.reason.contains("age"));
        assert!(verdict.reason.contains("email"));
    }

    #[test]
    fn test_extra_fields_are_listed() {
        let body = r#"{
            "id": 1,
            "name": "Alice Wonderland",
            "age": 30,
            "email": "alice@example.com",
            "nickname": "Al"
        }"#;
        let verdict = evaluate(body);
        assert!(verdict.is_fail());
        assert!(verdict.reason.contains("unexpected fields"));
        assert!(verdict.reason.contains("nickname"));
        assert_eq!(verdict.evidence.len(), 1);
        assert_eq!(verdict.evidence[0].pointer, "response.nickname");
    }

    #[test]
    fn test_extra_fields_tolerated_when_configured() {
        let config = RailConfig::from_yaml(
            r#"
config_version: "1.0"
name: "Lenient"
schema:
  allow_extra_keys: true
"#,
        )
        .unwrap();
        let body = r#"{
            "id": 1,
            "name": "Alice Wonderland",
            "age": 30,
            "email": "alice@example.com",
            "nickname": "Al"
        }"#;
        assert!(evaluate_with(body, &config).is_pass());
    }

    #[test]
    fn test_array_top_level_fails() {
        let verdict = evaluate("[{\"id\": 1}]");
        assert!(verdict.is_fail());
        assert!(verdict.reason.contains("not an object"));
    }

    #[test]
    fn test_empty_response_fails() {
        assert!(evaluate("").is_fail());
    }
}

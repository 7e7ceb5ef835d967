//! Core types shared across the Railcheck engine.
//!
//! Everything here is plain data: the rails themselves, the normalized
//! response shapes they inspect, and the verdicts they produce. No I/O
//! happens in this module.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evidence::Evidence;

/// Maximum characters kept from a prompt in a history entry.
pub const PROMPT_SUMMARY_CHARS: usize = 50;

/// The guardrails this engine knows how to exercise.
///
/// Each rail checks exactly one failure mode of a model response. Rails are
/// independent: none reads another's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rail {
    /// Response is missing, blank, or too short to be an answer.
    EmptyIncomplete,
    /// Response claims to be SQL but does not hold up as a statement.
    InvalidSql,
    /// JSON response is malformed or its keys drift from the expected set.
    MismatchedJson,
    /// JSON field values carry the wrong runtime type.
    UnexpectedDataTypes,
    /// Provider failed to answer within the deadline.
    ApiTimeout,
    /// Response invents entities absent from the reference data.
    PhantomData,
    /// Response asserts events dated after today.
    Temporal,
    /// Response contradicts itself.
    Contradiction,
    /// Response leans on configured bias-indicator terms.
    BiasDetection,
    /// Model's self-reported confidence falls below the floor.
    ConfidenceThreshold,
    /// Response touches configured sensitive terms.
    Sensitivity,
}

impl Rail {
    /// Every rail, in display order.
    pub const ALL: [Rail; 11] = [
        Rail::EmptyIncomplete,
        Rail::InvalidSql,
        Rail::MismatchedJson,
        Rail::UnexpectedDataTypes,
        Rail::ApiTimeout,
        Rail::PhantomData,
        Rail::Temporal,
        Rail::Contradiction,
        Rail::BiasDetection,
        Rail::ConfidenceThreshold,
        Rail::Sensitivity,
    ];

    /// Stable machine id (matches the serde representation).
    pub fn id(&self) -> &'static str {
        match self {
            Rail::EmptyIncomplete => "empty-incomplete",
            Rail::InvalidSql => "invalid-sql",
            Rail::MismatchedJson => "mismatched-json",
            Rail::UnexpectedDataTypes => "unexpected-data-types",
            Rail::ApiTimeout => "api-timeout",
            Rail::PhantomData => "phantom-data",
            Rail::Temporal => "temporal",
            Rail::Contradiction => "contradiction",
            Rail::BiasDetection => "bias-detection",
            Rail::ConfidenceThreshold => "confidence-threshold",
            Rail::Sensitivity => "sensitivity",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Rail::EmptyIncomplete => "Empty/Incomplete Output",
            Rail::InvalidSql => "Invalid SQL",
            Rail::MismatchedJson => "Mismatched JSON",
            Rail::UnexpectedDataTypes => "Unexpected Data Types",
            Rail::ApiTimeout => "API Timeout",
            Rail::PhantomData => "Phantom Data",
            Rail::Temporal => "Temporal (Future Data)",
            Rail::Contradiction => "Contradiction Detection",
            Rail::BiasDetection => "Bias Detection",
            Rail::ConfidenceThreshold => "Confidence Threshold",
            Rail::Sensitivity => "Sensitivity",
        }
    }

    /// The response shape this rail expects the normalizer to produce.
    pub fn expected_shape(&self) -> ExpectedShape {
        match self {
            Rail::InvalidSql => ExpectedShape::Sql,
            Rail::MismatchedJson | Rail::UnexpectedDataTypes => ExpectedShape::Json,
            _ => ExpectedShape::FreeText,
        }
    }
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Rail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rail::ALL
            .iter()
            .find(|rail| rail.id() == s)
            .copied()
            .ok_or_else(|| {
                let known: Vec<&str> = Rail::ALL.iter().map(|r| r.id()).collect();
                format!("unknown rail '{}' (known: {})", s, known.join(", "))
            })
    }
}

/// How the raw response should be interpreted before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpectedShape {
    /// Trimmed prose, no structural parsing.
    FreeText,
    /// A JSON object with named fields.
    Json,
    /// A SQL statement.
    Sql,
}

impl fmt::Display for ExpectedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpectedShape::FreeText => "free-text",
            ExpectedShape::Json => "json",
            ExpectedShape::Sql => "sql",
        };
        f.write_str(name)
    }
}

/// Final judgment for a single demo run.
///
/// Severity is strictly ordered: `Fail` > `Inconclusive` > `Pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Inconclusive,
    Fail,
}

impl Outcome {
    /// Numeric severity for worst-outcome aggregation.
    pub fn severity(&self) -> u8 {
        match self {
            Outcome::Pass => 0,
            Outcome::Inconclusive => 1,
            Outcome::Fail => 2,
        }
    }

    /// The more severe of two outcomes.
    pub fn worst(self, other: Outcome) -> Outcome {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail)
    }

    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Outcome::Inconclusive)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Outcome::Pass => "PASS",
            Outcome::Inconclusive => "INCONCLUSIVE",
            Outcome::Fail => "FAIL",
        };
        f.write_str(word)
    }
}

/// Where a piece of evidence was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    /// The model response body.
    Response,
    /// A named field of a parsed JSON response.
    Field,
    /// The prompt sent to the provider.
    Prompt,
    /// The rail configuration.
    Config,
}

/// What came back from the provider, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// The provider answered with this body.
    Content(String),
    /// The provider did not answer within the deadline.
    TimedOut,
}

impl RawResponse {
    /// Convenience constructor for a textual response.
    pub fn text(body: impl Into<String>) -> Self {
        RawResponse::Content(body.into())
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, RawResponse::TimedOut)
    }

    /// The response body, if one arrived.
    pub fn body(&self) -> Option<&str> {
        match self {
            RawResponse::Content(body) => Some(body),
            RawResponse::TimedOut => None,
        }
    }
}

/// Runtime type observed for a JSON field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl FieldType {
    /// The runtime type of a JSON value.
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldType::Null,
            serde_json::Value::Bool(_) => FieldType::Boolean,
            serde_json::Value::Number(_) => FieldType::Number,
            serde_json::Value::String(_) => FieldType::String,
            serde_json::Value::Array(_) => FieldType::Array,
            serde_json::Value::Object(_) => FieldType::Object,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Null => "null",
            FieldType::Boolean => "boolean",
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JSON response after parsing.
///
/// Parse failures are carried in-band: `parse_error` is set, `fields` is
/// empty, and validators decide what to do with that. Nothing here throws.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonPayload {
    /// Top-level fields of the parsed object, in key order.
    pub fields: BTreeMap<String, serde_json::Value>,

    /// Why parsing failed, when it did.
    pub parse_error: Option<String>,

    /// Leading fragment of the raw body, kept for evidence.
    pub excerpt: String,
}

impl JsonPayload {
    pub fn has_parse_error(&self) -> bool {
        self.parse_error.is_some()
    }

    /// Observed runtime type per top-level field.
    pub fn observed_types(&self) -> BTreeMap<String, FieldType> {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), FieldType::of(value)))
            .collect()
    }
}

/// One clause of a tokenized SQL statement, e.g. `WHERE id = 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlClause {
    /// Uppercased clause keyword (`WHERE`, `ORDER BY`, ...).
    pub keyword: String,
    /// Everything between this keyword and the next clause.
    pub body: String,
}

/// A SQL response after shallow tokenization.
///
/// This is a skeleton, not a parse tree: enough structure to check verbs,
/// targets, and clause sanity, nothing more. As with [`JsonPayload`],
/// failures live in `parse_error`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlSkeleton {
    /// Uppercased statement verb (`SELECT`, `INSERT`, ...), if one was found.
    pub verb: Option<String>,

    /// Table the statement operates on, if one was found.
    pub target: Option<String>,

    /// Clauses in source order.
    pub clauses: Vec<SqlClause>,

    /// All tokens of the first statement.
    pub tokens: Vec<String>,

    /// Number of statements separated by `;`.
    pub statement_count: usize,

    /// Why tokenization rejected the statement, when it did.
    pub parse_error: Option<String>,

    /// The first statement as received, kept for evidence.
    pub statement: String,
}

impl SqlSkeleton {
    pub fn has_parse_error(&self) -> bool {
        self.parse_error.is_some()
    }

    /// The body of the first clause with this keyword.
    pub fn clause(&self, keyword: &str) -> Option<&str> {
        self.clauses
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| c.body.as_str())
    }

    pub fn has_clause(&self, keyword: &str) -> bool {
        self.clauses.iter().any(|c| c.keyword == keyword)
    }
}

/// A provider response after normalization, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResponse {
    /// Nothing usable arrived: blank content or a timeout.
    Empty,
    /// Trimmed free text.
    PlainText(String),
    /// Parsed (or un-parseable) JSON object.
    ParsedJson(JsonPayload),
    /// Tokenized (or un-tokenizable) SQL.
    ParsedSql(SqlSkeleton),
    /// Observed runtime types per field, for type-expectation rails.
    TypedFields(BTreeMap<String, FieldType>),
}

impl NormalizedResponse {
    pub fn is_empty(&self) -> bool {
        matches!(self, NormalizedResponse::Empty)
    }

    /// The in-band parse failure, if this shape carries one.
    pub fn parse_error(&self) -> Option<&str> {
        match self {
            NormalizedResponse::ParsedJson(payload) => payload.parse_error.as_deref(),
            NormalizedResponse::ParsedSql(skeleton) => skeleton.parse_error.as_deref(),
            _ => None,
        }
    }

    /// Prose rendering for text-scanning rails, when the shape has one.
    ///
    /// JSON payloads flatten to `key: value` lines so scans see field text;
    /// typed-field maps carry no prose and yield `None`.
    pub fn flattened_text(&self) -> Option<String> {
        match self {
            NormalizedResponse::Empty => None,
            NormalizedResponse::PlainText(text) => Some(text.clone()),
            NormalizedResponse::ParsedJson(payload) => {
                if payload.fields.is_empty() {
                    return None;
                }
                let lines: Vec<String> = payload
                    .fields
                    .iter()
                    .map(|(key, value)| match value {
                        serde_json::Value::String(s) => format!("{}: {}", key, s),
                        other => format!("{}: {}", key, other),
                    })
                    .collect();
                Some(lines.join("\n"))
            }
            NormalizedResponse::ParsedSql(skeleton) => {
                if skeleton.statement.is_empty() {
                    None
                } else {
                    Some(skeleton.statement.clone())
                }
            }
            NormalizedResponse::TypedFields(_) => None,
        }
    }
}

/// Optional provider behaviors requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Ask the provider to ground the answer with web search.
    #[serde(default)]
    pub web_search: bool,

    /// Ask the provider to emit a JSON object.
    #[serde(default)]
    pub structured_output: bool,
}

/// Sampling parameters forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// Everything a single demo run needs to know about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// The rail being exercised.
    pub rail: Rail,

    /// Prompt sent to the provider.
    pub prompt: String,

    /// Provider id (`gemini`, `openai`, or `offline` for replayed checks).
    pub provider: String,

    /// Model id within the provider.
    pub model: String,

    #[serde(default)]
    pub options: RequestOptions,

    #[serde(default)]
    pub params: ModelParams,
}

impl RequestContext {
    pub fn new(
        rail: Rail,
        prompt: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            rail,
            prompt: prompt.into(),
            provider: provider.into(),
            model: model.into(),
            options: RequestOptions::default(),
            params: ModelParams::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }
}

/// The outcome of one rail check, with the reason spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The rail that produced this verdict.
    pub rail: Rail,

    /// Pass, Inconclusive, or Fail.
    pub outcome: Outcome,

    /// Names the concrete property that was checked.
    pub reason: String,

    /// Excerpts of the offending data, when any exists.
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl Verdict {
    pub fn pass(rail: Rail, reason: impl Into<String>) -> Self {
        Self {
            rail,
            outcome: Outcome::Pass,
            reason: reason.into(),
            evidence: vec![],
        }
    }

    pub fn fail(rail: Rail, reason: impl Into<String>) -> Self {
        Self {
            rail,
            outcome: Outcome::Fail,
            reason: reason.into(),
            evidence: vec![],
        }
    }

    pub fn inconclusive(rail: Rail, reason: impl Into<String>) -> Self {
        Self {
            rail,
            outcome: Outcome::Inconclusive,
            reason: reason.into(),
            evidence: vec![],
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<Evidence>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.outcome.is_pass()
    }

    pub fn is_fail(&self) -> bool {
        self.outcome.is_fail()
    }
}

/// One line of the append-only run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the verdict was reached.
    pub timestamp: DateTime<Utc>,

    /// The rail the entry reports on. For timed-out runs this is
    /// [`Rail::ApiTimeout`] regardless of the rail requested.
    pub rail: Rail,

    /// Prompt, truncated to [`PROMPT_SUMMARY_CHARS`] characters.
    pub prompt_summary: String,

    pub verdict: Verdict,
}

impl HistoryEntry {
    /// Build an entry for `verdict`, stamping it now.
    pub fn new(rail: Rail, prompt: &str, verdict: Verdict) -> Self {
        Self {
            timestamp: Utc::now(),
            rail,
            prompt_summary: summarize_prompt(prompt),
            verdict,
        }
    }
}

/// Truncate a prompt on a char boundary for history display.
pub fn summarize_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.chars().count() <= PROMPT_SUMMARY_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(PROMPT_SUMMARY_CHARS).collect();
        format!("{}...", head.trim_end())
    }
}

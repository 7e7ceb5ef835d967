//! Shared detection patterns for rails.
//!
//! This module contains the regexes and extraction helpers used by more
//! than one validator: date mentions for the temporal rail, self-reported
//! confidence scores, and the entity shapes the phantom-data rail scans
//! for. Term counting is word-boundary aware so `men` never counts the
//! `men` inside `women`.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // =========================================================================
    // DATE MENTION PATTERNS
    // =========================================================================

    /// ISO dates: 2031-01-15
    pub static ref ISO_DATE_PATTERN: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})\b"
    ).unwrap();

    /// Slash dates, month first: 1/15/2031 or 1/15/31
    pub static ref SLASH_DATE_PATTERN: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b"
    ).unwrap();

    /// Month-name dates with an optional year: "January 15", "Mar 3rd, 2031"
    pub static ref MONTH_NAME_DATE_PATTERN: Regex = Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b"
    ).unwrap();

    // =========================================================================
    // SELF-REPORT PATTERNS
    // =========================================================================

    /// Self-reported confidence: "Confidence: 0.75"
    pub static ref CONFIDENCE_PATTERN: Regex = Regex::new(
        r"(?i)confidence[:\s]+([01](?:\.\d+)?)"
    ).unwrap();

    // =========================================================================
    // ENTITY MENTION PATTERNS
    // =========================================================================

    /// Names inside single or double quotes.
    pub static ref QUOTED_NAME_PATTERN: Regex = Regex::new(
        r#"'([^'\n]{2,64})'|"([^"\n]{2,64})""#
    ).unwrap();

    /// Multi-word capitalized sequences: "Alice Wonderland", "Bob The Builder"
    pub static ref PROPER_NAME_PATTERN: Regex = Regex::new(
        r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b"
    ).unwrap();
}

/// A date found in response text, with the span it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMention {
    pub date: NaiveDate,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Extract every recognizable date mention from content.
///
/// Month-name dates without a year are resolved against `default_year`.
/// Two-digit slash years resolve to 2000 + yy. Impossible dates (month 13,
/// day 40) are skipped rather than guessed at.
pub fn extract_dates(content: &str, default_year: i32) -> Vec<DateMention> {
    let mut mentions = Vec::new();

    for caps in ISO_DATE_PATTERN.captures_iter(content) {
        let (Some(m), Some(y), Some(mo), Some(d)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        if let Some(date) = ymd(y.as_str(), mo.as_str(), d.as_str()) {
            mentions.push(mention(date, m));
        }
    }

    for caps in SLASH_DATE_PATTERN.captures_iter(content) {
        let (Some(m), Some(mo), Some(d), Some(y)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        let year = match y.as_str().parse::<i32>() {
            Ok(y) if y < 100 => 2000 + y,
            Ok(y) => y,
            Err(_) => continue,
        };
        if let Some(date) = ymd(&year.to_string(), mo.as_str(), d.as_str()) {
            mentions.push(mention(date, m));
        }
    }

    for caps in MONTH_NAME_DATE_PATTERN.captures_iter(content) {
        let (Some(m), Some(name), Some(d)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(month) = month_number(name.as_str()) else {
            continue;
        };
        let year = caps
            .get(3)
            .and_then(|y| y.as_str().parse::<i32>().ok())
            .unwrap_or(default_year);
        let Ok(day) = d.as_str().parse::<u32>() else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            mentions.push(mention(date, m));
        }
    }

    mentions
}

fn mention(date: NaiveDate, m: regex::Match<'_>) -> DateMention {
    DateMention {
        date,
        text: m.as_str().to_string(),
        start: m.start(),
        end: m.end(),
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year = year.parse().ok()?;
    let month = month.parse().ok()?;
    let day = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// A self-reported confidence score, with the span it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceMention {
    pub score: f64,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Extract a self-reported confidence score, if the response carries one.
pub fn extract_confidence(content: &str) -> Option<ConfidenceMention> {
    let caps = CONFIDENCE_PATTERN.captures(content)?;
    let whole = caps.get(0)?;
    let score = caps.get(1)?.as_str().parse().ok()?;
    Some(ConfidenceMention {
        score,
        text: whole.as_str().to_string(),
        start: whole.start(),
        end: whole.end(),
    })
}

/// Names mentioned in quotes.
pub fn quoted_names(content: &str) -> Vec<String> {
    QUOTED_NAME_PATTERN
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Multi-word capitalized sequences that look like person names.
pub fn proper_names(content: &str) -> Vec<String> {
    PROPER_NAME_PATTERN
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Count word-boundary occurrences of a term, case-insensitively.
pub fn count_occurrences(content: &str, term: &str) -> usize {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return 0;
    }
    match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(trimmed))) {
        Ok(re) => re.find_iter(content).count(),
        Err(_) => content
            .to_lowercase()
            .matches(&trimmed.to_lowercase())
            .count(),
    }
}

/// Check if content mentions a term at least once.
pub fn contains_term(content: &str, term: &str) -> bool {
    count_occurrences(content, term) > 0
}

/// Span of the first word-boundary occurrence of a term, case-insensitively.
pub fn first_occurrence(content: &str, term: &str) -> Option<(usize, usize)> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(trimmed))) {
        Ok(re) => re.find(content).map(|m| (m.start(), m.end())),
        Err(_) => {
            let lower = content.to_lowercase();
            lower
                .find(&trimmed.to_lowercase())
                .map(|start| (start, start + trimmed.len()))
        }
    }
}

/// Count hits per term, keeping only terms that occur.
pub fn term_hits(content: &str, terms: &[String]) -> Vec<(String, usize)> {
    terms
        .iter()
        .filter_map(|term| {
            let count = count_occurrences(content, term);
            if count > 0 {
                Some((term.clone(), count))
            } else {
                None
            }
        })
        .collect()
}

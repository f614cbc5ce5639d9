//! Person Codec (spec.md §4.3): provider JSON -> canonical person record.
//!
//! Implemented as pure field-extractors over a generic `serde_json::Value` tree,
//! mirroring the teacher's `file_type` registry's extension-sniffing discipline
//! (sniff structure, never reflect on a concrete provider type) generalized here to
//! record-field sniffing. Adding a fifth provider needs no change to extraction logic,
//! only a new entry in `PLACEHOLDER_NAMES` / a `ProviderDialect` field-path mapping.

mod dialect;

pub use dialect::ProviderDialect;

use crate::store::entities::person::Gender;
use serde_json::Value as Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record has no usable primary name")]
    NoPrimaryName,
}

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameCategory {
    Birth,
    Married,
    AlsoKnownAs,
    Other,
}

#[derive(Debug, Clone)]
pub struct CanonicalName {
    pub text: String,
    pub category: NameCategory,
}

#[derive(Debug, Clone)]
pub struct CanonicalEvent {
    pub event_type: String,
    pub date_original: Option<String>,
    pub date_year: Option<i32>,
    pub place: Option<String>,
    pub place_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CanonicalPerson {
    pub primary_name: String,
    pub names: Vec<CanonicalName>,
    pub gender: Gender,
    pub events: Vec<CanonicalEvent>,
    pub claims: Vec<(String, String)>, // (predicate, value_text)
    pub biography: Option<String>,
    pub spouse_external_ids: Vec<String>,
    pub last_modified: Option<i64>,
}

/// Placeholder primary names that mark a "blank termination" record: dropped when both
/// parent slots are also empty, per spec.md §4.3.
const PLACEHOLDER_NAMES: &[&str] = &[
    "unknown",
    "unknown father",
    "unknown mother",
    "unknown parent",
    "no name",
];

/// Decodes a raw provider record into a `CanonicalPerson`, or `Ok(None)` when the record
/// is an unknown-termination placeholder that should be dropped (spec.md §4.3 policy).
pub fn decode(dialect: &ProviderDialect, record: &Json, has_parents: bool) -> CodecResult<Option<CanonicalPerson>> {
    let names = extract_names(dialect, record);
    let primary_name = pick_primary_name(&names, record, dialect);

    if !has_parents && primary_name.as_deref().is_some_and(is_placeholder) {
        return Ok(None);
    }

    let primary_name = primary_name.ok_or(CodecError::NoPrimaryName)?;

    Ok(Some(CanonicalPerson {
        primary_name,
        gender: extract_gender(dialect, record),
        events: extract_events(dialect, record),
        claims: extract_claims(dialect, record),
        biography: extract_biography(dialect, record),
        spouse_external_ids: extract_spouse_ids(dialect, record),
        last_modified: extract_last_modified(dialect, record, &names),
        names,
    }))
}

fn is_placeholder(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    PLACEHOLDER_NAMES.contains(&lower.as_str())
}

/// Primary name preference order (spec.md §4.3): display > first birth-name > "unknown".
fn pick_primary_name(names: &[CanonicalName], record: &Json, dialect: &ProviderDialect) -> Option<String> {
    if let Some(display) = dialect.get_str(record, &dialect.display_name_path) {
        return Some(display.to_string());
    }
    if let Some(birth) = names.iter().find(|n| n.category == NameCategory::Birth) {
        return Some(birth.text.clone());
    }
    Some("unknown".to_string())
}

fn extract_names(dialect: &ProviderDialect, record: &Json) -> Vec<CanonicalName> {
    let mut out: Vec<CanonicalName> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for entry in dialect.get_array(record, &dialect.names_path) {
        let Some(text) = dialect.name_text(entry) else { continue };
        let category = dialect.name_category(entry);
        let key = (text.clone(), category);
        if seen.insert(key) {
            out.push(CanonicalName { text, category });
        }
    }
    out
}

fn extract_gender(dialect: &ProviderDialect, record: &Json) -> Gender {
    match dialect.get_str(record, &dialect.gender_path) {
        Some(uri) if dialect.is_male(uri) => Gender::Male,
        Some(uri) if dialect.is_female(uri) => Gender::Female,
        _ => Gender::Unknown,
    }
}

/// Extracts vital events, preferring `original` text and falling back to the first
/// normalized variant; pulls `place_id` out of a "#NNNNN" description reference.
fn extract_events(dialect: &ProviderDialect, record: &Json) -> Vec<CanonicalEvent> {
    let mut events = Vec::new();
    for (event_type, path) in dialect.event_paths() {
        for raw in dialect.get_array(record, path) {
            let date_original = dialect
                .get_str(raw, &dialect.date_original_suffix)
                .or_else(|| {
                    dialect
                        .get_array(raw, &dialect.date_normalized_suffix)
                        .first()
                        .and_then(|v| v.as_str())
                })
                .map(str::to_string);
            let date_year = date_original.as_deref().and_then(parse_year);
            let place = dialect.get_str(raw, &dialect.place_text_suffix).map(str::to_string);
            let place_id = dialect
                .get_str(raw, &dialect.place_desc_suffix)
                .and_then(extract_place_id);

            events.push(CanonicalEvent {
                event_type: event_type.to_string(),
                date_original,
                date_year,
                place,
                place_id,
            });
        }
    }
    events
}

fn extract_place_id(description_ref: &str) -> Option<String> {
    description_ref.strip_prefix('#').map(str::to_string)
}

fn extract_claims(dialect: &ProviderDialect, record: &Json) -> Vec<(String, String)> {
    let mut claims = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for fact in dialect.get_array(record, &dialect.facts_path) {
        let Some(predicate) = dialect.fact_predicate(fact) else { continue };
        if predicate == "biography" {
            continue;
        }
        let Some(value) = dialect.fact_value(fact) else { continue };
        if seen.insert((predicate.clone(), value.clone())) {
            claims.push((predicate, value));
        }
    }
    claims
}

fn extract_biography(dialect: &ProviderDialect, record: &Json) -> Option<String> {
    dialect
        .get_array(record, &dialect.facts_path)
        .iter()
        .find(|fact| dialect.fact_predicate(fact).as_deref() == Some("biography") || dialect.fact_predicate(fact).as_deref() == Some("life_sketch"))
        .and_then(|fact| dialect.fact_value(fact))
}

fn extract_spouse_ids(dialect: &ProviderDialect, record: &Json) -> Vec<String> {
    let mut ids = Vec::new();
    for group in dialect.get_array(record, &dialect.family_as_parent_path) {
        for id in dialect.spouse_ids_in_group(group) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn extract_last_modified(dialect: &ProviderDialect, record: &Json, names: &[CanonicalName]) -> Option<i64> {
    let mut max: Option<i64> = None;
    let mut bump = |ts: Option<i64>| {
        if let Some(ts) = ts {
            max = Some(max.map_or(ts, |m: i64| m.max(ts)));
        }
    };

    bump(dialect.attribution_modified(record, &dialect.facts_path));
    bump(dialect.attribution_modified(record, &dialect.names_path));
    let _ = names;
    max
}

/// Year parsing (spec.md §4.3): accepts "1820", "15 March 1820", "1820 BC" (negative),
/// and "?" (null).
pub fn parse_year(text: &str) -> Option<i32> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "?" {
        return None;
    }

    let is_bc = trimmed.to_uppercase().ends_with("BC");
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // Last 1-4 digit run in the string is taken as the year (e.g. "15 March 1820").
    let year_str = last_number_run(trimmed)?;
    let year: i32 = year_str.parse().ok()?;
    Some(if is_bc { -year } else { year })
}

fn last_number_run(text: &str) -> Option<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs.into_iter().last()
}

/// Lifespan string `"<birth>-<death>"` with either side allowed empty.
pub fn lifespan(birth_year: Option<i32>, death_year: Option<i32>) -> String {
    format!(
        "{}-{}",
        birth_year.map(|y| y.to_string()).unwrap_or_default(),
        death_year.map(|y| y.to_string()).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_year() {
        assert_eq!(parse_year("1820"), Some(1820));
    }

    #[test]
    fn parses_year_with_day_and_month() {
        assert_eq!(parse_year("15 March 1820"), Some(1820));
    }

    #[test]
    fn parses_bc_year_as_negative() {
        assert_eq!(parse_year("1820 BC"), Some(-1820));
    }

    #[test]
    fn parses_question_mark_as_none() {
        assert_eq!(parse_year("?"), None);
    }

    #[test]
    fn lifespan_allows_empty_sides() {
        assert_eq!(lifespan(Some(1820), Some(1890)), "1820-1890");
        assert_eq!(lifespan(None, Some(1890)), "-1890");
        assert_eq!(lifespan(Some(1820), None), "1820-");
    }

    #[test]
    fn drops_unknown_termination_with_no_parents() {
        let dialect = ProviderDialect::family_search();
        let record = serde_json::json!({ "names": [], "gender": null });
        let result = decode(&dialect, &record, false).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn keeps_unknown_name_when_parents_present() {
        let dialect = ProviderDialect::family_search();
        let record = serde_json::json!({ "names": [], "gender": null });
        let result = decode(&dialect, &record, true).unwrap().unwrap();
        assert_eq!(result.primary_name, "unknown");
    }
}

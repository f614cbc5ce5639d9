//! Per-provider field paths. Adding a fifth provider means adding one `ProviderDialect`
//! constructor here; the extraction logic in `codec::mod` never changes.

use serde_json::Value as Json;

use super::NameCategory;

#[derive(Debug, Clone)]
pub struct ProviderDialect {
    pub display_name_path: Vec<&'static str>,
    pub names_path: Vec<&'static str>,
    pub gender_path: Vec<&'static str>,
    pub facts_path: Vec<&'static str>,
    pub family_as_parent_path: Vec<&'static str>,
    events: Vec<(&'static str, Vec<&'static str>)>,
    pub date_original_suffix: Vec<&'static str>,
    pub date_normalized_suffix: Vec<&'static str>,
    pub place_text_suffix: Vec<&'static str>,
    pub place_desc_suffix: Vec<&'static str>,
    male_uris: Vec<&'static str>,
    female_uris: Vec<&'static str>,
}

impl ProviderDialect {
    /// FamilySearch's GEDCOM-X-flavored JSON, normalized to the dialect's generic shape.
    pub fn family_search() -> Self {
        Self {
            display_name_path: vec!["display_name"],
            names_path: vec!["names"],
            gender_path: vec!["gender"],
            facts_path: vec!["facts"],
            family_as_parent_path: vec!["family_as_parent"],
            events: vec![
                ("birth", vec!["events", "birth"]),
                ("death", vec!["events", "death"]),
                ("burial", vec!["events", "burial"]),
            ],
            date_original_suffix: vec!["date_original"],
            date_normalized_suffix: vec!["date_normalized"],
            place_text_suffix: vec!["place_text"],
            place_desc_suffix: vec!["place_description"],
            male_uris: vec!["http://gedcomx.org/Male", "male"],
            female_uris: vec!["http://gedcomx.org/Female", "female"],
        }
    }

    pub fn ancestry() -> Self {
        let mut d = Self::family_search();
        d.gender_path = vec!["sex"];
        d
    }

    pub fn wiki_tree() -> Self {
        let mut d = Self::family_search();
        d.gender_path = vec!["gender_code"];
        d.male_uris = vec!["Male", "M"];
        d.female_uris = vec!["Female", "F"];
        d
    }

    pub fn twenty_three_and_me() -> Self {
        Self::family_search()
    }

    pub fn for_source(source: &str) -> Self {
        match source {
            "ancestry" => Self::ancestry(),
            "wiki_tree" => Self::wiki_tree(),
            "twenty_three_and_me" => Self::twenty_three_and_me(),
            _ => Self::family_search(),
        }
    }

    pub fn event_paths(&self) -> impl Iterator<Item = (&str, &[&'static str])> {
        self.events.iter().map(|(t, p)| (*t, p.as_slice()))
    }

    pub fn get_str<'a>(&self, root: &'a Json, path: &[&str]) -> Option<&'a str> {
        navigate(root, path)?.as_str()
    }

    pub fn get_array<'a>(&self, root: &'a Json, path: &[&str]) -> Vec<&'a Json> {
        navigate(root, path)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().collect())
            .unwrap_or_default()
    }

    pub fn name_text(&self, entry: &Json) -> Option<String> {
        entry.get("text").and_then(|v| v.as_str()).map(str::to_string)
    }

    pub fn name_category(&self, entry: &Json) -> NameCategory {
        match entry.get("category").and_then(|v| v.as_str()) {
            Some("birth") => NameCategory::Birth,
            Some("married") => NameCategory::Married,
            Some("also_known_as") | Some("aka") => NameCategory::AlsoKnownAs,
            _ => NameCategory::Other,
        }
    }

    pub fn is_male(&self, uri: &str) -> bool {
        self.male_uris.contains(&uri)
    }

    pub fn is_female(&self, uri: &str) -> bool {
        self.female_uris.contains(&uri)
    }

    pub fn fact_predicate(&self, fact: &Json) -> Option<String> {
        fact.get("type").and_then(|v| v.as_str()).map(str::to_string)
    }

    pub fn fact_value(&self, fact: &Json) -> Option<String> {
        fact.get("value").and_then(|v| v.as_str()).map(str::to_string)
    }

    pub fn spouse_ids_in_group(&self, group: &Json) -> Vec<String> {
        group
            .get("spouse_ids")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// Max `attribution.modified` timestamp (epoch millis) across every entry under
    /// `path`, or `None` if the path is absent or no entry carries one.
    pub fn attribution_modified(&self, root: &Json, path: &[&str]) -> Option<i64> {
        self.get_array(root, path)
            .into_iter()
            .filter_map(|entry| entry.get("attribution")?.get("modified")?.as_i64())
            .max()
    }
}

fn navigate<'a>(root: &'a Json, path: &[&str]) -> Option<&'a Json> {
    let mut current = root;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

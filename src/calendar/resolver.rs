//! Maps user-supplied calendar names, aliases and ids to a backend calendar reference.

use log::{debug, warn};
use std::collections::BTreeMap;

use super::{CalendarError, CalendarInfo, CalendarRef, PRIMARY_CALENDAR};

/// Resolve a name or id against the fetched calendar list.
///
/// `primary` (any case) short-circuits without looking at `known`. Otherwise an exact id
/// match wins over a case-insensitive display-name match.
pub fn resolve(name_or_id: &str, known: &[CalendarInfo]) -> Result<CalendarRef, CalendarError> {
    let wanted = name_or_id.trim();
    if wanted.eq_ignore_ascii_case(PRIMARY_CALENDAR) {
        return Ok(CalendarRef::Primary);
    }

    if let Some(calendar) = known.iter().find(|c| c.id == wanted) {
        debug!("Calendar '{}' matched by id", wanted);
        return Ok(CalendarRef::Id(calendar.id.clone()));
    }

    let by_name: Vec<&CalendarInfo> =
        known.iter().filter(|c| c.summary.to_lowercase() == wanted.to_lowercase()).collect();
    if by_name.len() > 1 {
        warn!(
            "Calendar name '{}' is ambiguous ({} calendars); using {}",
            wanted,
            by_name.len(),
            by_name[0].id
        );
    }
    if let Some(calendar) = by_name.first() {
        debug!("Calendar '{}' matched by name -> {}", wanted, calendar.id);
        return Ok(CalendarRef::Id(calendar.id.clone()));
    }

    Err(CalendarError::CalendarNotFound {
        name: wanted.to_string(),
        available: known
            .iter()
            .map(|c| if c.summary.is_empty() { c.id.clone() } else { c.summary.clone() })
            .collect(),
    })
}

/// Alias phrase found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMatch {
    pub alias: String,
    pub calendar_id: String,
    /// The text with the alias phrase removed.
    pub remaining: String,
}

/// Static table of short, human-friendly names for long calendar ids.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact, case-sensitive key lookup.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Find an alias phrase inside raw command text.
    ///
    /// Matching is case-sensitive and whole-word. When several aliases occur, the longest
    /// one wins and ties go to the alphabetically first key.
    pub fn extract(&self, text: &str) -> Option<AliasMatch> {
        let mut found: Vec<(&str, &str, usize)> = Vec::new();
        for (alias, calendar_id) in &self.entries {
            if let Some(pos) = find_whole_word(text, alias) {
                found.push((alias, calendar_id, pos));
            }
        }

        if found.len() > 1 {
            warn!(
                "Several calendar aliases match '{}': {:?}",
                text,
                found.iter().map(|(alias, _, _)| *alias).collect::<Vec<_>>()
            );
        }

        let mut best: Option<(&str, &str, usize)> = None;
        for candidate in found {
            if best.map_or(true, |(alias, _, _)| candidate.0.len() > alias.len()) {
                best = Some(candidate);
            }
        }

        let (alias, calendar_id, pos) = best?;
        let remaining = format!("{} {}", &text[..pos], &text[pos + alias.len()..]);
        debug!("Alias '{}' -> calendar {}", alias, calendar_id);
        Some(AliasMatch {
            alias: alias.to_string(),
            calendar_id: calendar_id.to_string(),
            remaining,
        })
    }
}

fn find_whole_word(text: &str, needle: &str) -> Option<usize> {
    if needle.trim().is_empty() {
        return None;
    }
    text.match_indices(needle).map(|(pos, _)| pos).find(|&pos| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn calendars() -> Vec<CalendarInfo> {
        vec![
            CalendarInfo::primary("me@example.com", "Me"),
            CalendarInfo::new("abc123@group.calendar.google.com", "Work"),
            CalendarInfo::new("fam456@group.calendar.google.com", "Family"),
        ]
    }

    #[test]
    fn test_primary_short_circuits() {
        assert_eq!(resolve("PRIMARY", &[]).unwrap(), CalendarRef::Primary);
        assert_eq!(resolve("primary", &calendars()).unwrap(), CalendarRef::Primary);
    }

    #[test]
    fn test_id_then_name() {
        assert_eq!(
            resolve("abc123@group.calendar.google.com", &calendars()).unwrap(),
            CalendarRef::Id("abc123@group.calendar.google.com".to_string())
        );
        assert_eq!(
            resolve("family", &calendars()).unwrap(),
            CalendarRef::Id("fam456@group.calendar.google.com".to_string())
        );
    }

    #[test]
    fn test_unknown_lists_every_name() {
        match resolve("Gym", &calendars()).unwrap_err() {
            CalendarError::CalendarNotFound { name, available } => {
                assert_eq!(name, "Gym");
                assert_eq!(available, vec!["Me", "Work", "Family"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_alias_extract() {
        let mut entries = BTreeMap::new();
        entries.insert("work".to_string(), "abc123@group.calendar.google.com".to_string());
        entries.insert("work calendar".to_string(), "other@group.calendar.google.com".to_string());
        let table = AliasTable::new(entries);

        let found = table.extract("Standup on my work calendar tomorrow").unwrap();
        assert_eq!(found.calendar_id, "other@group.calendar.google.com");
        assert_eq!(found.remaining.split_whitespace().collect::<Vec<_>>().join(" "), "Standup on my tomorrow");

        assert!(table.extract("Finish homework tonight").is_none());
        assert!(table.extract("Standup on WORK calendar").is_none());
        assert_eq!(table.lookup("work"), Some("abc123@group.calendar.google.com"));
        assert_eq!(table.lookup("Work"), None);
    }
}

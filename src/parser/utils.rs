//! Common text helpers shared by the command parser and the deletion matcher.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// "at 3pm", "at 10:30 am", "at 14:00"
pub static CLOCK_FRAGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bat\s+\d{1,2}(?::\d{2})?\s*(?:[ap]\.?m\b\.?)?").expect("valid clock fragment regex")
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static WITH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bwith\s+").expect("valid with regex"));

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("valid token regex"));

/// Words that end a `with <names>` list.
const NAME_STOP_WORDS: &[&str] = &[
    "about", "all", "at", "for", "from", "in", "next", "on", "regarding", "re:", "this", "to",
    "today", "tomorrow", "tonight", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday",
];

/// Sanitize user input to prevent injection
pub fn sanitize_user_input(input: &str) -> String {
    input
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect::<String>()
}

/// Collapse runs of whitespace and trim.
pub fn collapse_whitespace(input: &str) -> String {
    WHITESPACE_RE.replace_all(input.trim(), " ").into_owned()
}

/// Remove byte ranges from `text`, leaving a space where each one was.
pub fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut sorted = spans.to_vec();
    sorted.sort_by_key(|span| span.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in sorted {
        if span.start >= cursor {
            out.push_str(&text[cursor..span.start]);
            out.push(' ');
        }
        cursor = cursor.max(span.end);
    }
    out.push_str(&text[cursor..]);
    out
}

/// Attendee names introduced by "with", plus the byte span of the whole phrase.
///
/// The list runs until a word that starts a time or topic phrase, or a token that
/// begins with a digit.
pub fn extract_contact_names(input: &str) -> Option<(Vec<String>, Range<usize>)> {
    let with = WITH_RE.find(input)?;
    let rest = &input[with.end()..];

    let mut end = with.end();
    for token in TOKEN_RE.find_iter(rest) {
        let word = token.as_str().trim_end_matches([',', '.', ';']).to_lowercase();
        if NAME_STOP_WORDS.contains(&word.as_str())
            || word.starts_with(|c: char| c.is_ascii_digit())
        {
            break;
        }
        end = with.end() + token.end();
    }

    let list = input[with.end()..end].trim();
    if list.is_empty() {
        return None;
    }

    let mut contacts = Vec::new();
    extract_multiple_contacts(list, &mut contacts);
    debug!("Extracted contact names: {:?}", contacts);
    if contacts.is_empty() {
        return None;
    }
    Some((contacts, with.start()..end))
}

/// Split a name list on commas and "and".
fn extract_multiple_contacts(text: &str, contacts: &mut Vec<String>) {
    for part in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        for name in part
            .split(" and ")
            .map(|s| s.trim().trim_start_matches("and ").trim())
            .filter(|s| !s.is_empty())
        {
            contacts.push(name.trim_end_matches(['.', ';']).to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_user_input() {
        let input = "Meeting with John\u{0000} tomorrow";
        assert_eq!(sanitize_user_input(input), "Meeting with John tomorrow");
        assert_eq!(sanitize_user_input("Lunch\nmeeting"), "Lunch\nmeeting");
    }

    #[test]
    fn test_remove_spans() {
        let text = "Lunch on Friday at noon";
        assert_eq!(collapse_whitespace(&remove_spans(text, &[16..23, 6..15])), "Lunch");
    }

    #[test]
    fn test_extract_contact_names_stops_at_time_words() {
        let text = "Lunch with Sarah on Friday at noon";
        let (names, span) = extract_contact_names(text).unwrap();
        assert_eq!(names, vec!["Sarah"]);
        assert_eq!(&text[span], "with Sarah");
    }

    #[test]
    fn test_extract_multiple_contacts() {
        let text = "Sync with Tom, Ana and bob@example.com tomorrow at 3pm";
        let (names, span) = extract_contact_names(text).unwrap();
        assert_eq!(names, vec!["Tom", "Ana", "bob@example.com"]);
        assert_eq!(&text[span], "with Tom, Ana and bob@example.com");
    }

    #[test]
    fn test_extract_contact_names_stops_at_digits() {
        let (names, _) = extract_contact_names("Call with Priya 3pm").unwrap();
        assert_eq!(names, vec!["Priya"]);
        assert!(extract_contact_names("Meeting with at 3pm").is_none());
        assert!(extract_contact_names("Dentist tomorrow").is_none());
    }

    #[test]
    fn test_clock_fragment() {
        let stripped = CLOCK_FRAGMENT_RE.replace_all("Standup at 10:30 am and at 3pm", "");
        assert_eq!(collapse_whitespace(&stripped), "Standup and");
    }
}

//! Validation helpers for event payloads.
//
// Attendee strings come from free text ("with Sarah"), so only some of them are usable
// as backend invitations.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]{1,64}@(?:[A-Za-z0-9-]{1,63}\.){1,125}[A-Za-z]{2,63}$")
        .expect("valid email regex")
});

/// Check that a string is a plausible e-mail address
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email) && !contains_dangerous_characters(email)
}

/// Reject characters that have no business in an address or a calendar field
pub fn contains_dangerous_characters(input: &str) -> bool {
    input.contains(';')
        || input.contains('&')
        || input.contains('|')
        || input.contains('<')
        || input.contains('>')
        || input.contains('$')
}

/// Split attendees into invitable addresses and plain names, keeping order.
pub fn partition_attendees(attendees: &[String]) -> (Vec<String>, Vec<String>) {
    let mut emails = Vec::new();
    let mut names = Vec::new();
    for attendee in attendees.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
        if validate_email(attendee) {
            emails.push(attendee.to_string());
        } else {
            names.push(attendee.to_string());
        }
    }
    (emails, names)
}

/// Fold attendee names the backend cannot invite into the description.
pub fn description_with_names(description: Option<&str>, names: &[String]) -> Option<String> {
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    if names.is_empty() {
        return description.map(str::to_string);
    }
    let line = format!("Attendees: {}", names.join(", "));
    Some(match description {
        Some(text) => format!("{}\n\n{}", text, line),
        None => line,
    })
}

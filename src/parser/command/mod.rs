//! Command parser module
//!
//! Fast-path extraction of an [`EventDraft`] from a raw utterance, without the language
//! model. The parser is an ordered list of extraction steps; each step reads the working
//! text, records what it found on the draft, and hands on the text with its phrase
//! removed. Nothing here fails: an utterance the steps cannot make sense of simply
//! produces a draft that is not actionable.

use chrono::Duration;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::calendar::resolver::AliasTable;
use crate::calendar::{EventDraft, EventTime};
use crate::parser::date_parser::{DateParser, ParseSettings};
use crate::parser::utils::{
    collapse_whitespace, extract_contact_names, remove_spans, sanitize_user_input,
    CLOCK_FRAGMENT_RE,
};

static ALL_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\ball[\s-]day\b").expect("valid all-day regex"));

static LEADING_VERB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:please\s+)?(?:schedule|create|add|book|set\s+up|put|make)\s+(?:an?\s+|the\s+)?(?:new\s+)?(?:event\s+(?:called|named|for)\s+)?",
    )
    .expect("valid leading verb regex")
});

const FILLER_WORDS: &[&str] = &["on", "at", "for", "from", "this", "next", "by", "in", "and", "my", "to"];

/// Text being worked through the pipeline plus what has been extracted so far.
#[derive(Debug, Clone)]
struct Extraction {
    text: String,
    draft: EventDraft,
}

type Step = fn(&CommandParser, Extraction) -> Extraction;

const PIPELINE: &[(&str, Step)] = &[
    ("attendees", CommandParser::extract_attendees),
    ("all_day", CommandParser::detect_all_day),
    ("start", CommandParser::extract_start),
    ("calendar", CommandParser::extract_calendar),
    ("summary", CommandParser::extract_summary),
];

/// Parser for event-creation utterances
pub struct CommandParser {
    date_parser: Arc<dyn DateParser>,
    aliases: AliasTable,
    settings: ParseSettings,
    default_duration: Duration,
}

impl CommandParser {
    pub fn new(date_parser: Arc<dyn DateParser>, aliases: AliasTable, settings: ParseSettings) -> Self {
        Self { date_parser, aliases, settings, default_duration: Duration::hours(1) }
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    /// Best-effort draft for `utterance`.
    pub fn parse(&self, utterance: &str) -> EventDraft {
        let mut extraction =
            Extraction { text: sanitize_user_input(utterance), draft: EventDraft::default() };
        for (name, step) in PIPELINE {
            extraction = step(self, extraction);
            debug!("After {} step: '{}'", name, extraction.text.trim());
        }
        debug!("Parsed draft: {:?}", extraction.draft);
        extraction.draft
    }

    fn extract_attendees(&self, mut ex: Extraction) -> Extraction {
        if let Some((names, span)) = extract_contact_names(&ex.text) {
            ex.text = remove_spans(&ex.text, &[span]);
            ex.draft.attendees = names;
        }
        ex
    }

    fn detect_all_day(&self, mut ex: Extraction) -> Extraction {
        if ALL_DAY_RE.is_match(&ex.text) {
            ex.draft.all_day = true;
            ex.text = ALL_DAY_RE.replace_all(&ex.text, " ").into_owned();
        }
        ex
    }

    fn extract_start(&self, mut ex: Extraction) -> Extraction {
        let Some(found) = self.date_parser.find(&ex.text, &self.settings) else {
            return ex;
        };
        let moment = &found.moment;
        if ex.draft.all_day {
            let date = moment.date();
            ex.draft.start = Some(EventTime::date(date));
            ex.draft.end = date.succ_opt().map(EventTime::date);
        } else {
            let zone = moment.zone.unwrap_or(self.settings.timezone).name().to_string();
            ex.draft.start = Some(EventTime::instant(moment.at, zone.clone()));
            ex.draft.end = Some(EventTime::instant(moment.at + self.default_duration, zone));
        }
        ex.text = found.strip_from(&ex.text);
        ex
    }

    fn extract_calendar(&self, mut ex: Extraction) -> Extraction {
        if let Some(found) = self.aliases.extract(&ex.text) {
            ex.draft.calendar_id = found.calendar_id;
            ex.text = found.remaining;
        }
        ex
    }

    fn extract_summary(&self, mut ex: Extraction) -> Extraction {
        let without_clock = CLOCK_FRAGMENT_RE.replace_all(&ex.text, " ");
        let collapsed = collapse_whitespace(&without_clock);
        let without_verb = LEADING_VERB_RE.replace(&collapsed, "");
        ex.draft.summary = trim_filler(&without_verb);
        ex.text = ex.draft.summary.clone();
        ex
    }
}

/// Drop filler words and stray punctuation from both ends.
fn trim_filler(text: &str) -> String {
    let is_filler = |word: &str| {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        word.is_empty() || FILLER_WORDS.contains(&word.as_str())
    };
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.iter().position(|w| !is_filler(w)).unwrap_or(words.len());
    let end = words.iter().rposition(|w| !is_filler(w)).map_or(start, |i| i + 1);
    words[start..end.max(start)]
        .join(" ")
        .trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '-'))
        .trim()
        .to_string()
}

//! Free-text date/time recognition.
//!
//! `NaturalDateParser` finds the first date expression and the first clock-time expression
//! in a piece of text and combines them into one instant, relative to
//! [`ParseSettings::now`]. It understands ISO/RFC 3339 values, numeric and month-name
//! dates, relative day words, weekday names, `in N units`, clock times with an optional
//! zone abbreviation, a bare `at H` hour read on the 24-hour clock, and `noon`/`midnight`.
//!
//! A part of the day ("evening") only counts right after a day expression or behind
//! `this`/`in the`, so titles like "Game night" keep their words.
//!
//! Besides the instant, [`DateParser::find`] reports the byte spans it consumed so the
//! command parser can strip them from the working text.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc, Weekday,
};
use chrono_tz::Tz;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

/// How ambiguous expressions are resolved.
#[derive(Debug, Clone)]
pub struct ParseSettings {
    /// Zone for expressions that do not carry one.
    pub timezone: Tz,
    /// Resolve ambiguous dates into the future instead of the past.
    pub prefer_future: bool,
    /// Reference instant. `None` means the wall clock.
    pub base: Option<DateTime<Tz>>,
}

impl ParseSettings {
    pub fn new(timezone: Tz, prefer_future: bool) -> Self {
        Self { timezone, prefer_future, base: None }
    }

    pub fn with_base(mut self, base: DateTime<Tz>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.base.unwrap_or_else(|| Utc::now().with_timezone(&self.timezone))
    }
}

/// A resolved point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMoment {
    pub at: DateTime<FixedOffset>,
    /// False when the text named only a day.
    pub has_time: bool,
    /// Zone named in the text itself, if any.
    pub zone: Option<Tz>,
}

impl ParsedMoment {
    pub fn date(&self) -> NaiveDate {
        self.at.date_naive()
    }
}

/// A moment plus the byte ranges of the text that produced it, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub moment: ParsedMoment,
    pub spans: Vec<Range<usize>>,
}

impl DateMatch {
    /// `text` with the consumed spans removed.
    pub fn strip_from(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for span in &self.spans {
            if span.start >= cursor {
                out.push_str(&text[cursor..span.start]);
                out.push(' ');
            }
            cursor = cursor.max(span.end);
        }
        out.push_str(&text[cursor..]);
        out
    }
}

/// Free-text date/time parser collaborator.
pub trait DateParser: Send + Sync {
    /// Locate and resolve the date/time expression inside `text`.
    fn find(&self, text: &str, settings: &ParseSettings) -> Option<DateMatch>;

    fn parse(&self, text: &str, settings: &ParseSettings) -> Option<ParsedMoment> {
        self.find(text, settings).map(|m| m.moment)
    }
}

static ISO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})(?:[T ](\d{1,2}):(\d{2})(?::(\d{2})(?:\.\d+)?)?\s*(Z|[+-]\d{2}:?\d{2})?)?",
    )
    .expect("valid iso regex")
});

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bin\s+(\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten)\s+(minute|min|hour|hr|day|week)s?\b",
    )
    .expect("valid relative regex")
});

static DAY_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:the\s+)?(day\s+after\s+tomorrow|today|tonight|tomorrow|tmrw|yesterday)\b")
        .expect("valid day word regex")
});

static WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\bon\s+)?\b(?:(next|this|coming)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid weekday regex")
});

const MONTHS: &str = "january|february|march|april|june|july|august|september|october|november|december|jan|feb|mar|apr|may|jun|jul|aug|sept|sep|oct|nov|dec";

static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\bon\s+)?\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?",
        MONTHS
    ))
    .expect("valid month-day regex")
});

static DAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\bon\s+)?\b(?:the\s+)?(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({})\b(?:,?\s+(\d{{4}})\b)?",
        MONTHS
    ))
    .expect("valid day-month regex")
});

static SLASH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\bon\s+)?\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").expect("valid slash regex")
});

static AMPM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bat\s+)?\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?m\b\.?")
        .expect("valid am/pm regex")
});

static CLOCK_24_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bat\s+)?\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid clock regex")
});

static AT_HOUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bat\s+(\d{1,2})\b").expect("valid bare hour regex"));

// Text that makes a bare "at H" part of something else: "at 3:15", "at 3/4", "at 3 pm".
static AT_HOUR_REJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[:/.]\d|\s*[ap]\.?m\b)").expect("valid bare hour guard"));

static TIME_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bat\s+)?\b(noon|midday|midnight)\b").expect("valid time word regex")
});

static PART_OF_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(this\s+|in\s+the\s+)?(morning|afternoon|evening|night)\b")
        .expect("valid part of day regex")
});

// Case-sensitive on purpose: "3pm with Sam" must not read "with" as a zone.
static ZONE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+([A-Z]{2,5})\b").expect("valid zone regex"));

/// Map a timezone abbreviation to a zone.
pub fn map_timezone_abbr(abbr: &str) -> Option<Tz> {
    let tz = match abbr.to_uppercase().as_str() {
        "PST" | "PDT" | "PT" => Tz::America__Los_Angeles,
        "MST" | "MDT" | "MT" => Tz::America__Denver,
        "CST" | "CDT" | "CT" => Tz::America__Chicago,
        "EST" | "EDT" | "ET" => Tz::America__New_York,
        "AKST" | "AKDT" => Tz::America__Anchorage,
        "HST" => Tz::Pacific__Honolulu,
        "GMT" => Tz::Etc__GMT,
        "UTC" => Tz::UTC,
        "BST" => Tz::Europe__London,
        "CET" | "CEST" => Tz::Europe__Berlin,
        "EET" | "EEST" => Tz::Europe__Helsinki,
        "IST" => Tz::Asia__Kolkata,
        "JST" => Tz::Asia__Tokyo,
        "KST" => Tz::Asia__Seoul,
        "AEST" | "AEDT" => Tz::Australia__Sydney,
        "NZST" | "NZDT" => Tz::Pacific__Auckland,
        _ => return None,
    };
    Some(tz)
}

/// Convert a 12-hour clock reading to 24-hour form.
pub fn to_24_hour(hour: u32, minute: u32, meridiem: char) -> Option<(u32, u32)> {
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }
    let hour_24 = match (hour, meridiem.to_ascii_lowercase()) {
        (12, 'a') => 0,
        (h, 'a') => h,
        (12, 'p') => 12,
        (h, 'p') => h + 12,
        _ => return None,
    };
    Some((hour_24, minute))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeekdayModifier {
    Next,
    This,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaySpec {
    Offset(i64),
    Tonight,
    Weekday(Weekday, Option<WeekdayModifier>),
    Calendar { year: Option<i32>, month: u32, day: u32 },
}

#[derive(Debug, Clone, Copy)]
struct ClockTime {
    time: NaiveTime,
    zone: Option<Tz>,
    /// Read from a bare `at H` with no meridiem.
    bare: bool,
}

/// Regex-driven implementation of [`DateParser`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalDateParser;

impl NaturalDateParser {
    pub fn new() -> Self {
        Self
    }
}

impl DateParser for NaturalDateParser {
    fn find(&self, text: &str, settings: &ParseSettings) -> Option<DateMatch> {
        if let Some(found) = find_iso(text, settings) {
            debug!("Matched ISO date/time in '{}'", text);
            return Some(found);
        }
        if let Some(found) = find_relative(text, settings) {
            debug!("Matched relative offset in '{}'", text);
            return Some(found);
        }

        let days = find_days(text);
        let day_spans: Vec<Range<usize>> = days.iter().map(|(_, span)| span.clone()).collect();
        let clock = find_clock(text, &day_spans);
        let part_of_day = find_part_of_day(text, &day_spans);
        if days.is_empty() && clock.is_none() && part_of_day.is_none() {
            return None;
        }

        let now = settings.now();
        let today = now.date_naive();

        let mut spans = Vec::new();
        let mut time = None;
        let mut zone = None;
        if let Some((found, span)) = &clock {
            time = Some(found.time);
            zone = found.zone;
            spans.push(span.clone());
        }
        if let Some((part_time, span)) = part_of_day {
            time = match (time, &clock) {
                (None, _) => Some(part_time),
                // "at 7 in the evening"
                (Some(t), Some((found, _))) if found.bare && t.hour() < 12 && part_time.hour() >= 12 => {
                    Some(t + Duration::hours(12))
                }
                (t, _) => t,
            };
            spans.push(span);
        }

        let day = days.first();
        let date = match day {
            Some((spec, span)) => {
                spans.push(span.clone());
                if *spec == DaySpec::Tonight && time.is_none() {
                    time = NaiveTime::from_hms_opt(20, 0, 0);
                }
                let date = resolve_day(*spec, today, settings.prefer_future)?;
                // "Friday Oct 16" names one day twice; both go.
                for (other, other_span) in days.iter().skip(1) {
                    if resolve_day(*other, today, settings.prefer_future) == Some(date) {
                        spans.push(other_span.clone());
                    }
                }
                date
            }
            None => today,
        };

        let tz = zone.unwrap_or(settings.timezone);
        let mut at = localize(tz, date.and_time(time.unwrap_or(NaiveTime::default())))?;

        if settings.prefer_future && time.is_some() && at < now {
            let roll = match day {
                None => Some(Duration::days(1)),
                Some((DaySpec::Weekday(_, None), _)) if date == today => Some(Duration::days(7)),
                _ => None,
            };
            if let Some(roll) = roll {
                at = localize(tz, date.and_time(time.unwrap_or(NaiveTime::default())) + roll)?;
            }
        }

        spans.sort_by_key(|span| span.start);
        debug!("Resolved '{}' to {} (spans {:?})", text, at, spans);
        Some(DateMatch {
            moment: ParsedMoment { at, has_time: time.is_some(), zone },
            spans,
        })
    }
}

fn find_iso(text: &str, settings: &ParseSettings) -> Option<DateMatch> {
    let caps = ISO_RE.captures(text)?;
    let span = caps.get(0)?.range();
    let date = NaiveDate::from_ymd_opt(num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?)?;

    let time = match caps.get(4) {
        Some(_) => Some(NaiveTime::from_hms_opt(
            num(&caps, 4)?,
            num(&caps, 5)?,
            caps.get(6).map_or(Some(0), |m| m.as_str().parse().ok())?,
        )?),
        None => None,
    };
    let naive = date.and_time(time.unwrap_or(NaiveTime::default()));

    let at = match caps.get(7) {
        Some(offset) => parse_offset(offset.as_str())?.from_local_datetime(&naive).single()?,
        None => localize(settings.timezone, naive)?,
    };

    Some(DateMatch {
        moment: ParsedMoment { at, has_time: time.is_some(), zone: None },
        spans: vec![span],
    })
}

fn find_relative(text: &str, settings: &ParseSettings) -> Option<DateMatch> {
    let caps = RELATIVE_RE.captures(text)?;
    let amount: i64 = match caps[1].to_lowercase().as_str() {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        digits => digits.parse().ok()?,
    };
    let unit = caps[2].to_lowercase();
    let offset = match unit.as_str() {
        "minute" | "min" => Duration::minutes(amount),
        "hour" | "hr" => Duration::hours(amount),
        "day" => Duration::days(amount),
        _ => Duration::weeks(amount),
    };
    let at = (settings.now() + offset).fixed_offset();
    Some(DateMatch {
        moment: ParsedMoment { at, has_time: true, zone: None },
        spans: vec![caps.get(0)?.range()],
    })
}

/// Every day expression in `text`, earliest first.
fn find_days(text: &str) -> Vec<(DaySpec, Range<usize>)> {
    let mut candidates: Vec<(DaySpec, Range<usize>)> = Vec::new();

    if let Some(caps) = DAY_WORD_RE.captures(text) {
        let word = caps[1].to_lowercase();
        let spec = match word.as_str() {
            "today" => DaySpec::Offset(0),
            "tonight" => DaySpec::Tonight,
            "tomorrow" | "tmrw" => DaySpec::Offset(1),
            "yesterday" => DaySpec::Offset(-1),
            _ => DaySpec::Offset(2),
        };
        if let Some(whole) = caps.get(0) {
            candidates.push((spec, whole.range()));
        }
    }

    if let Some(caps) = WEEKDAY_RE.captures(text) {
        let modifier = caps.get(1).map(|m| match m.as_str().to_lowercase().as_str() {
            "next" => WeekdayModifier::Next,
            _ => WeekdayModifier::This,
        });
        if let (Ok(weekday), Some(whole)) = (caps[2].parse::<Weekday>(), caps.get(0)) {
            candidates.push((DaySpec::Weekday(weekday, modifier), whole.range()));
        }
    }

    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        if let (Some(month), Some(day), Some(whole)) = (month_number(&caps[1]), num::<u32>(&caps, 2), caps.get(0)) {
            let year = caps.get(3).and_then(|m| m.as_str().parse().ok());
            candidates.push((DaySpec::Calendar { year, month, day }, whole.range()));
        }
    }

    if let Some(caps) = DAY_MONTH_RE.captures(text) {
        if let (Some(day), Some(month), Some(whole)) = (num::<u32>(&caps, 1), month_number(&caps[2]), caps.get(0)) {
            let year = caps.get(3).and_then(|m| m.as_str().parse().ok());
            candidates.push((DaySpec::Calendar { year, month, day }, whole.range()));
        }
    }

    if let Some(caps) = SLASH_DATE_RE.captures(text) {
        if let (Some(month), Some(day), Some(whole)) = (num::<u32>(&caps, 1), num::<u32>(&caps, 2), caps.get(0)) {
            let year = caps.get(3).and_then(|m| {
                let y: i32 = m.as_str().parse().ok()?;
                Some(if y < 100 { 2000 + y } else { y })
            });
            candidates.push((DaySpec::Calendar { year, month, day }, whole.range()));
        }
    }

    candidates.sort_by_key(|(_, span)| span.start);
    candidates
}

/// The earliest clock time in `text` that does not sit inside a day expression.
fn find_clock(text: &str, day_spans: &[Range<usize>]) -> Option<(ClockTime, Range<usize>)> {
    let mut candidates: Vec<(ClockTime, Range<usize>)> = Vec::new();

    for caps in AMPM_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let hour: u32 = match caps[1].parse() {
            Ok(h) => h,
            Err(_) => continue,
        };
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok()).unwrap_or(60);
        let meridiem = caps[3].chars().next().unwrap_or('a');
        let Some((h, m)) = to_24_hour(hour, minute, meridiem) else { continue };
        let Some(time) = NaiveTime::from_hms_opt(h, m, 0) else { continue };

        let mut end = whole.end();
        let mut zone = None;
        if let Some(zone_caps) = ZONE_SUFFIX_RE.captures(&text[end..]) {
            if let Some(tz) = map_timezone_abbr(&zone_caps[1]) {
                zone = Some(tz);
                end += zone_caps.get(0).map_or(0, |m| m.end());
            }
        }
        candidates.push((ClockTime { time, zone, bare: false }, whole.start()..end));
        break;
    }

    if let Some(caps) = TIME_WORD_RE.captures(text) {
        let hour = if caps[1].eq_ignore_ascii_case("midnight") { 0 } else { 12 };
        if let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) {
            candidates.push((ClockTime { time, zone: None, bare: false }, caps.get(0)?.range()));
        }
    }

    if let Some(caps) = CLOCK_24_RE.captures(text) {
        if let Some(time) = NaiveTime::from_hms_opt(num(&caps, 1)?, num(&caps, 2)?, 0) {
            candidates.push((ClockTime { time, zone: None, bare: false }, caps.get(0)?.range()));
        }
    }

    for caps in AT_HOUR_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if AT_HOUR_REJECT_RE.is_match(&text[whole.end()..]) {
            continue;
        }
        if let Some(time) = num(&caps, 1).and_then(|hour| NaiveTime::from_hms_opt(hour, 0, 0)) {
            candidates.push((ClockTime { time, zone: None, bare: true }, whole.range()));
            break;
        }
    }

    candidates
        .into_iter()
        .filter(|(_, span)| !day_spans.iter().any(|day| overlaps(day, span)))
        .min_by_key(|(_, span)| span.start)
}

/// A part of the day introduced by `this`/`in the`, or following a day expression.
fn find_part_of_day(text: &str, day_spans: &[Range<usize>]) -> Option<(NaiveTime, Range<usize>)> {
    PART_OF_DAY_RE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let after_day = day_spans
            .iter()
            .any(|day| day.end <= whole.start() && text[day.end..whole.start()].trim().is_empty());
        if caps.get(1).is_none() && !after_day {
            return None;
        }
        let hour = match caps[2].to_lowercase().as_str() {
            "morning" => 9,
            "afternoon" => 14,
            "evening" => 19,
            _ => 20,
        };
        Some((NaiveTime::from_hms_opt(hour, 0, 0)?, whole.range()))
    })
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn resolve_day(spec: DaySpec, today: NaiveDate, prefer_future: bool) -> Option<NaiveDate> {
    match spec {
        DaySpec::Offset(days) => today.checked_add_signed(Duration::days(days)),
        DaySpec::Tonight => Some(today),
        DaySpec::Weekday(target, modifier) => {
            let current = i64::from(today.weekday().num_days_from_monday());
            let wanted = i64::from(target.num_days_from_monday());
            let ahead = (wanted - current).rem_euclid(7);
            let offset = match modifier {
                Some(WeekdayModifier::Next) if ahead == 0 => 7,
                Some(_) => ahead,
                None if prefer_future => ahead,
                None => wanted - current,
            };
            today.checked_add_signed(Duration::days(offset))
        }
        DaySpec::Calendar { year: Some(year), month, day } => NaiveDate::from_ymd_opt(year, month, day),
        DaySpec::Calendar { year: None, month, day } => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if prefer_future && this_year < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(this_year)
            }
        }
    }
}

/// Attach a zone to a wall-clock time, stepping over DST gaps.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.fixed_offset())
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    if raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let sign = if raw.starts_with('-') { -1 } else { 1 };
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().get(..3)? {
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

fn num<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

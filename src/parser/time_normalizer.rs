//! Turns free-text start/end expressions into a backend-ready [`TimeRange`].
//
// All-day ranges are date pairs with an exclusive end; timed ranges are zone-tagged
// instants. The two shapes are never mixed inside one range.

use chrono::{Duration, TimeZone};
use log::debug;
use std::sync::Arc;

use super::date_parser::{DateParser, ParseSettings, ParsedMoment};
use crate::calendar::{CalendarError, EventTime, TimeRange};

pub struct TimeNormalizer {
    parser: Arc<dyn DateParser>,
    default_duration: Duration,
}

impl TimeNormalizer {
    pub fn new(parser: Arc<dyn DateParser>) -> Self {
        Self { parser, default_duration: Duration::hours(1) }
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    pub fn normalize(
        &self,
        start_text: &str,
        end_text: Option<&str>,
        all_day: bool,
        settings: &ParseSettings,
    ) -> Result<TimeRange, CalendarError> {
        let end_text = end_text.map(str::trim).filter(|t| !t.is_empty());
        let start = self.parse_required(start_text, settings)?;
        debug!("Normalizing '{}' -> {} (all_day: {})", start_text, start.at, all_day);

        // The end is read relative to the start so "11am" after "tomorrow at 10am" stays on
        // the same day.
        let anchored = settings
            .clone()
            .with_base(settings.timezone.from_utc_datetime(&start.at.naive_utc()));

        if all_day {
            let start_date = start.date();
            let end_date = match end_text {
                None => start_date + Duration::days(1),
                Some(text) => {
                    let end_date = self.parse_required(text, &anchored)?.date();
                    if end_date < start_date {
                        return Err(CalendarError::InvalidRange(format!(
                            "end date {} is before start date {}",
                            end_date, start_date
                        )));
                    }
                    // A same-day end names that day inclusively.
                    if end_date == start_date {
                        start_date + Duration::days(1)
                    } else {
                        end_date
                    }
                }
            };
            return Ok(TimeRange::new(EventTime::date(start_date), EventTime::date(end_date)));
        }

        let start_zone = zone_name(&start, settings);
        let (end_at, end_zone) = match end_text {
            None => (start.at + self.default_duration, start_zone.clone()),
            Some(text) => {
                let end = self.parse_required(text, &anchored)?;
                let zone = zone_name(&end, settings);
                (end.at, zone)
            }
        };

        if end_at <= start.at {
            return Err(CalendarError::InvalidRange(format!(
                "end {} is not after start {}",
                end_at.to_rfc3339(),
                start.at.to_rfc3339()
            )));
        }

        Ok(TimeRange::new(
            EventTime::instant(start.at, start_zone),
            EventTime::instant(end_at, end_zone),
        ))
    }

    fn parse_required(&self, text: &str, settings: &ParseSettings) -> Result<ParsedMoment, CalendarError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CalendarError::Parse(text.to_string()));
        }
        self.parser
            .parse(trimmed, settings)
            .ok_or_else(|| CalendarError::Parse(trimmed.to_string()))
    }
}

fn zone_name(moment: &ParsedMoment, settings: &ParseSettings) -> String {
    moment.zone.unwrap_or(settings.timezone).name().to_string()
}

//! Today's and tomorrow's calendar events.
//!
//! Events come from `icalBuddy`, one event per line:
//!
//! ```text
//! 2025-03-07 at 09:00 - 09:30	Standup (Work)
//! 2025-03-07	Holiday (Home)
//! ```
//!
//! The time widget reads its `calendar.*` keys for filtering.

use std::sync::LazyLock;

use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Serialize;

use crate::config::{ConfigData, ConfigStore, WidgetParams};
use crate::error::Result;
use crate::performance::Metric;
use crate::utils::command::run_binary;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

const ICAL_BUDDY: &str = "icalBuddy";
const ICAL_BUDDY_ARGS: [&str; 16] = [
    "-b", "", "-nrd", "-npn", "-iep", "title,datetime", "-po", "datetime,title", "-ps", "|\t|", "-df",
    "%Y-%m-%d", "-tf", "%H:%M", "-ea", "eventsToday+1",
];

static EVENT_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{4}-\d{2}-\d{2})(?: at (?P<start>\d{1,2}:\d{2}))?(?: - (?:\d{4}-\d{2}-\d{2}(?: at )?)?(?P<end>\d{1,2}:\d{2})?)?\t(?P<title>.*?)(?: \((?P<calendar>[^()]*)\))?$",
    )
    .ok()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    pub calendar: Option<String>,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`, absent for all-day events.
    pub start: Option<String>,
    pub end: Option<String>,
    pub is_all_day: bool,
}

impl CalendarEvent {
    fn day(&self) -> Option<NaiveDate> { NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok() }

    fn start_time(&self) -> Option<NaiveTime> { parse_time(self.start.as_deref()?) }

    fn end_time(&self) -> Option<NaiveTime> { parse_time(self.end.as_deref()?) }

    /// Text shown next to the clock: the title, plus `(h:mm)` for timed events.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.start_time() {
            Some(start) if !self.is_all_day => format!("{} ({})", self.title, start.format("%-I:%M")),
            _ => self.title.clone(),
        }
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> { NaiveTime::parse_from_str(value, "%H:%M").ok() }

/// Published calendar state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarState {
    /// Today's events that have not ended yet.
    pub today: Vec<CalendarEvent>,
    pub tomorrow: Vec<CalendarEvent>,
    pub next_event: Option<CalendarEvent>,
}

impl CalendarState {
    /// Splits parsed events around `now` and picks the next one.
    #[must_use]
    pub fn build(events: Vec<CalendarEvent>, now: NaiveDateTime) -> Self {
        let today = now.date();
        let tomorrow = today.checked_add_days(Days::new(1));
        let mut state = Self::default();

        for event in events {
            let Some(day) = event.day() else { continue };
            if day == today {
                let ended = !event.is_all_day && event.end_time().is_some_and(|end| end < now.time());
                if !ended {
                    state.today.push(event);
                }
            } else if Some(day) == tomorrow {
                state.tomorrow.push(event);
            }
        }

        state.today.sort_by_key(CalendarEvent::start_time);
        state.tomorrow.sort_by_key(CalendarEvent::start_time);
        state.next_event = next_event(&state.today).cloned();
        state
    }
}

/// First timed event, falling back to the first event of any kind.
#[must_use]
pub fn next_event(events: &[CalendarEvent]) -> Option<&CalendarEvent> {
    events.iter().find(|event| !event.is_all_day).or_else(|| events.first())
}

/// Parses `icalBuddy` output. Lines that do not look like events are skipped.
#[must_use]
pub fn parse_events(output: &str) -> Vec<CalendarEvent> {
    let Some(pattern) = EVENT_LINE.as_ref() else {
        return Vec::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let captures = pattern.captures(line.trim_end())?;
            let start = captures.name("start").map(|m| m.as_str().to_string());
            Some(CalendarEvent {
                title: captures.name("title")?.as_str().trim().to_string(),
                calendar: captures.name("calendar").map(|m| m.as_str().to_string()),
                date: captures.name("date")?.as_str().to_string(),
                end: captures.name("end").map(|m| m.as_str().to_string()),
                is_all_day: start.is_none(),
                start,
            })
        })
        .collect()
}

/// Calendar filtering read from the time widget's `calendar` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFilter {
    pub show_events: bool,
    pub allow_list: Vec<String>,
    pub deny_list: Vec<String>,
}

impl CalendarFilter {
    #[must_use]
    pub fn from_params(params: &ConfigData) -> Self {
        let params = WidgetParams(params);
        Self {
            show_events: params.bool("calendar.show-events").unwrap_or(true),
            allow_list: params.strings("calendar.allow-list"),
            deny_list: params.strings("calendar.deny-list"),
        }
    }

    /// The allow-list is applied first, then the deny-list.
    #[must_use]
    pub fn accepts(&self, event: &CalendarEvent) -> bool {
        let calendar = event.calendar.as_deref().unwrap_or_default();
        (self.allow_list.is_empty() || self.allow_list.iter().any(|name| name == calendar))
            && !self.deny_list.iter().any(|name| name == calendar)
    }
}

/// Polls `icalBuddy` for the time widget.
#[derive(Debug)]
pub struct CalendarSource {
    config: ConfigStore,
}

impl CalendarSource {
    #[must_use]
    pub const fn new(config: ConfigStore) -> Self { Self { config } }

    fn filter(&self) -> CalendarFilter {
        let config = self.config.current();
        let params = config
            .displayed()
            .iter()
            .find(|item| item.id == ids::TIME)
            .map_or_else(|| config.global_widget_config(ids::TIME), |item| config.resolved_item_config(item));
        CalendarFilter::from_params(&params)
    }
}

impl MetricSource for CalendarSource {
    type State = CalendarState;

    const METRIC: Metric = Metric::Calendar;
    const WIDGET_IDS: &'static [&'static str] = &[ids::TIME];

    fn poll(&mut self) -> Result<CalendarState> {
        let filter = self.filter();
        if !filter.show_events {
            return Ok(CalendarState::default());
        }

        let output = run_binary(ICAL_BUDDY, &ICAL_BUDDY_ARGS)?;
        let events = parse_events(&output).into_iter().filter(|event| filter.accepts(event)).collect();
        Ok(CalendarState::build(events, Local::now().naive_local()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "2025-03-07 at 09:00 - 09:30\tStandup (Work)\n\
                          2025-03-07\tHoliday (Home)\n\
                          2025-03-07 at 15:00 - 16:00\tDentist (Personal)\n\
                          2025-03-08 at 10:00 - 2025-03-08 at 11:00\tBrunch (Home)\n\
                          not an event\n";

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn parses_timed_and_all_day_events() {
        let events = parse_events(OUTPUT);
        assert_eq!(events.len(), 4);

        assert_eq!(events[0], CalendarEvent {
            title: "Standup".into(),
            calendar: Some("Work".into()),
            date: "2025-03-07".into(),
            start: Some("09:00".into()),
            end: Some("09:30".into()),
            is_all_day: false,
        });
        assert!(events[1].is_all_day);
        assert_eq!(events[1].calendar.as_deref(), Some("Home"));
        assert_eq!(events[3].end.as_deref(), Some("11:00"));
    }

    #[test]
    fn title_without_calendar_is_kept() {
        let events = parse_events("2025-03-07 at 08:00 - 08:15\tCoffee");
        assert_eq!(events[0].title, "Coffee");
        assert_eq!(events[0].calendar, None);
    }

    #[test]
    fn next_event_prefers_timed_events() {
        let state = CalendarState::build(parse_events(OUTPUT), at(8, 0));
        assert_eq!(state.today.len(), 3);
        assert_eq!(state.tomorrow.len(), 1);
        assert_eq!(state.next_event.map(|e| e.title), Some("Standup".to_string()));
    }

    #[test]
    fn ended_events_are_dropped() {
        let state = CalendarState::build(parse_events(OUTPUT), at(10, 0));
        let titles: Vec<&str> = state.today.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Holiday", "Dentist"]);
        assert_eq!(state.next_event.map(|e| e.title), Some("Dentist".to_string()));
    }

    #[test]
    fn falls_back_to_all_day_event() {
        let state = CalendarState::build(parse_events(OUTPUT), at(17, 0));
        assert_eq!(state.next_event.map(|e| e.title), Some("Holiday".to_string()));
    }

    #[test]
    fn summary_shows_start_time() {
        let events = parse_events(OUTPUT);
        assert_eq!(events[2].summary(), "Dentist (3:00)");
        assert_eq!(events[1].summary(), "Holiday");
    }

    #[test]
    fn filter_applies_allow_then_deny() {
        let params: ConfigData = toml::from_str(
            "calendar.allow-list = [\"Home\", \"Work\"]\ncalendar.deny-list = [\"Work\"]",
        )
        .unwrap();
        let filter = CalendarFilter::from_params(&params);
        assert!(filter.show_events);

        let accepted: Vec<String> =
            parse_events(OUTPUT).into_iter().filter(|e| filter.accepts(e)).map(|e| e.title).collect();
        assert_eq!(accepted, ["Holiday", "Brunch"]);
    }

    #[test]
    fn show_events_can_be_disabled() {
        let params: ConfigData = toml::from_str("calendar.show-events = false").unwrap();
        assert!(!CalendarFilter::from_params(&params).show_events);
    }
}

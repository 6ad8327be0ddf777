use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Event;

/// 6 rows x 7 columns, the standard month view.
pub const GRID_CELLS: usize = 42;

/// One cell of the month grid. Derived, never persisted. Months are
/// zero-based throughout this module (0 = January), matching the backend
/// wire convention.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub day: u32,
    pub is_current_month: bool,
    pub is_today: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    /// Zero-based month, 0 = January.
    pub month: u32,
    pub days: Vec<CalendarDay>,
    pub events: Vec<Event>,
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap_or(NaiveDate::MIN)
}

fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month >= 11 {
        (year.saturating_add(1), 0)
    } else {
        (year, month + 1)
    };
    add_days(first_of_month(next_year, next_month), -1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_of_month(year, month).day()
}

/// 42-cell grid for `(year, month)`: trailing days of the previous month to
/// align day 1 on its weekday column (Sunday first), the whole target month,
/// next-month fill for the rest.
pub fn month_grid(year: i32, month: u32) -> Vec<CalendarDay> {
    month_grid_on(year, month, Local::now().date_naive())
}

/// Same as [`month_grid`] with the reference date for `is_today` injected.
pub fn month_grid_on(year: i32, month: u32, today: NaiveDate) -> Vec<CalendarDay> {
    let first = first_of_month(year, month);
    let lead = first.weekday().num_days_from_sunday() as i64;
    let mut cursor = add_days(first, -lead);

    let mut days = Vec::with_capacity(GRID_CELLS);
    for _ in 0..GRID_CELLS {
        days.push(CalendarDay {
            date: cursor,
            day: cursor.day(),
            is_current_month: cursor.year() == year && cursor.month0() == month,
            is_today: cursor == today,
        });
        cursor = add_days(cursor, 1);
    }
    days
}

/// Events whose `[start, end]` day range covers `date`. Multi-day events
/// show up on every day they span.
pub fn events_for_day<'a>(date: NaiveDate, events: &'a [Event]) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|event| event.start_date.date() <= date && date <= event.end_date.date())
        .collect()
}

/// Events touching the month: start inside it, end inside it, or the range
/// strictly enclosing it. The enclosure arm catches events spanning across
/// the month with neither endpoint in it.
pub fn events_for_month<'a>(year: i32, month: u32, events: &'a [Event]) -> Vec<&'a Event> {
    let first = first_of_month(year, month);
    let last = last_of_month(year, month);
    events
        .iter()
        .filter(|event| {
            let start = event.start_date.date();
            let end = event.end_date.date();
            (start >= first && start <= last)
                || (end >= first && end <= last)
                || (start < first && end > last)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;

    fn date(year: i32, month1: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month1, day).unwrap()
    }

    fn event(id: &str, start: NaiveDate, end: NaiveDate) -> Event {
        Event {
            id: id.to_string(),
            title: format!("event {id}"),
            description: None,
            start_date: start.and_hms_opt(9, 0, 0).unwrap(),
            end_date: end.and_hms_opt(17, 0, 0).unwrap(),
            location: None,
            event_type: EventType::Event,
            for_class: None,
            for_subject: None,
            color: None,
            is_recurring: false,
            recurrence_pattern: None,
        }
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 0), 31);
        assert_eq!(days_in_month(2024, 1), 29);
        assert_eq!(days_in_month(2025, 1), 28);
        assert_eq!(days_in_month(2025, 3), 30);
        assert_eq!(days_in_month(2025, 11), 31);
    }

    #[test]
    fn test_grid_always_42_cells() {
        for month in 0..12 {
            assert_eq!(month_grid(2024, month).len(), GRID_CELLS);
            assert_eq!(month_grid(2025, month).len(), GRID_CELLS);
        }
    }

    #[test]
    fn test_grid_current_month_days_in_order() {
        let grid = month_grid(2024, 1);
        let current: Vec<u32> = grid
            .iter()
            .filter(|d| d.is_current_month)
            .map(|d| d.day)
            .collect();
        let expected: Vec<u32> = (1..=29).collect();
        assert_eq!(current, expected);
    }

    #[test]
    fn test_grid_alignment() {
        // February 2024 starts on a Thursday, column 4.
        let grid = month_grid(2024, 1);
        assert_eq!(grid[4].day, 1);
        assert!(grid[4].is_current_month);
        // Trailing January days fill the first four cells.
        assert_eq!(grid[0].day, 28);
        assert!(!grid[0].is_current_month);
        assert_eq!(grid[3].day, 31);
    }

    #[test]
    fn test_grid_january_pulls_previous_december() {
        let grid = month_grid(2026, 0);
        // 2026-01-01 is a Thursday; the grid opens with December 2025 days.
        assert_eq!(grid[0].date, date(2025, 12, 28));
        assert!(!grid[0].is_current_month);
        assert_eq!(grid[4].date, date(2026, 1, 1));
    }

    #[test]
    fn test_grid_december_pulls_next_january() {
        let grid = month_grid(2025, 11);
        let last = grid.last().unwrap();
        assert_eq!(last.date.year(), 2026);
        assert_eq!(last.date.month(), 1);
        assert!(!last.is_current_month);
    }

    #[test]
    fn test_grid_today_flag() {
        let today = date(2024, 2, 15);
        let grid = month_grid_on(2024, 1, today);
        let flagged: Vec<_> = grid.iter().filter(|d| d.is_today).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].date, today);

        // Today outside the rendered month flags nothing.
        let grid = month_grid_on(2024, 5, today);
        assert!(grid.iter().all(|d| !d.is_today));
    }

    #[test]
    fn test_events_for_day_inclusive_span() {
        let events = vec![event("span", date(2024, 1, 1), date(2024, 1, 31))];
        assert_eq!(events_for_day(date(2024, 1, 15), &events).len(), 1);
        assert_eq!(events_for_day(date(2024, 1, 1), &events).len(), 1);
        assert_eq!(events_for_day(date(2024, 1, 31), &events).len(), 1);
        assert!(events_for_day(date(2024, 2, 1), &events).is_empty());
        assert!(events_for_day(date(2023, 12, 31), &events).is_empty());
    }

    #[test]
    fn test_events_for_month_boundary_span() {
        let events = vec![event("bridge", date(2024, 1, 30), date(2024, 2, 2))];
        assert_eq!(events_for_month(2024, 0, &events).len(), 1);
        assert_eq!(events_for_month(2024, 1, &events).len(), 1);
        assert!(events_for_month(2024, 2, &events).is_empty());
    }

    #[test]
    fn test_events_for_month_enclosure() {
        let events = vec![event("term", date(2024, 1, 1), date(2024, 3, 31))];
        // Neither endpoint falls in February, the enclosure arm catches it.
        assert_eq!(events_for_month(2024, 1, &events).len(), 1);
        assert_eq!(events_for_month(2024, 0, &events).len(), 1);
        assert_eq!(events_for_month(2024, 2, &events).len(), 1);
        assert!(events_for_month(2024, 3, &events).is_empty());
    }
}

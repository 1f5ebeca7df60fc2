use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::debug;

use crate::resolver::{DateSpan, RenderablePhase};

/// Every year row holds exactly this many weeks, whether or not the year has
/// 53 ISO weeks. Rows therefore drift against the real calendar.
pub const WEEKS_PER_YEAR: i64 = 52;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeekStatus {
    Past,
    Future,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WeekCell {
    pub week_start: NaiveDate,
    pub status: WeekStatus,
    pub overlay_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct YearRow {
    pub year: i32,
    pub weeks: Vec<WeekCell>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WeekGrid {
    pub rows: Vec<YearRow>,
}

impl WeekGrid {
    /// Flat view in row order, then week order.
    pub fn cells(&self) -> impl Iterator<Item = (i32, &WeekCell)> + '_ {
        self.rows
            .iter()
            .flat_map(|row| row.weeks.iter().map(move |cell| (row.year, cell)))
    }

    pub fn year_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Builds one row of [`WEEKS_PER_YEAR`] cells for every year touched by `span`.
///
/// Each cell takes the color of the last phase in `phases` that covers its
/// start day. Status follows these rules, first match wins:
/// 1. before `span.min_start` in the first row: future
/// 2. after `span.max_end` in the last row: future
/// 3. starting (at midnight) before `now`: past
/// 4. otherwise: future
///
/// Interior rows never see rules 1 and 2; they go straight to the `now`
/// comparison.
#[tracing::instrument(skip(phases), fields(phases = phases.len()))]
pub fn generate(span: &DateSpan, phases: &[RenderablePhase], now: NaiveDateTime) -> WeekGrid {
    let start_year = span.start_year();
    let end_year = span.end_year();

    let rows: Vec<YearRow> = (start_year..=end_year)
        .filter_map(|year| {
            let Some(jan_first) = NaiveDate::from_ymd_opt(year, 1, 1) else {
                debug!(year, "year outside supported calendar range; skipping row");
                return None;
            };

            let weeks = (0..WEEKS_PER_YEAR)
                .map(|i| {
                    let week_start = jan_first + Duration::weeks(i);
                    WeekCell {
                        week_start,
                        status: week_status(span, year, week_start, now),
                        overlay_color: overlay_color(phases, week_start),
                    }
                })
                .collect();

            Some(YearRow { year, weeks })
        })
        .collect();

    debug!(rows = rows.len(), start_year, end_year, "generated week grid");
    WeekGrid { rows }
}

fn overlay_color(phases: &[RenderablePhase], week_start: NaiveDate) -> Option<String> {
    let mut color = None;
    for phase in phases {
        if phase.covers(week_start) {
            color = Some(phase.color.clone());
        }
    }
    color
}

fn week_status(span: &DateSpan, year: i32, week_start: NaiveDate, now: NaiveDateTime) -> WeekStatus {
    if week_start < span.min_start && year == span.start_year() {
        WeekStatus::Future
    } else if week_start > span.max_end && year == span.end_year() {
        WeekStatus::Future
    } else if week_start.and_time(NaiveTime::MIN) < now {
        WeekStatus::Past
    } else {
        WeekStatus::Future
    }
}

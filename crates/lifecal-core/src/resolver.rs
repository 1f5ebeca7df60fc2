use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::datetime::parse_iso_date;
use crate::phase::Phase;

/// Overall interval covered by the renderable phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub min_start: NaiveDate,
    pub max_end: NaiveDate,
}

impl DateSpan {
    pub fn start_year(&self) -> i32 {
        self.min_start.year()
    }

    pub fn end_year(&self) -> i32 {
        self.max_end.year()
    }
}

/// A phase that passed [`Phase::is_renderable`], with its dates parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderablePhase {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub color: String,
}

impl RenderablePhase {
    fn from_phase(phase: &Phase) -> Option<Self> {
        if !phase.is_renderable() {
            return None;
        }
        Some(Self {
            name: phase.name.clone(),
            start: phase.start_date()?,
            end: phase.end_date()?,
            color: phase.color.clone(),
        })
    }

    /// Inclusive on both ends.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPhaseSet {
    pub span: DateSpan,
    /// Renderable phases in their original input order.
    pub phases: Vec<RenderablePhase>,
}

/// Filters `phases` down to the renderable ones and folds their overall span.
///
/// Returns `None` when nothing is renderable. The min/max fold compares the
/// raw ISO strings; renderable phases only carry strict `YYYY-MM-DD` dates,
/// for which lexical and chronological order agree.
#[tracing::instrument(skip(phases), fields(phases = phases.len()))]
pub fn resolve_range(phases: &[Phase]) -> Option<ResolvedPhaseSet> {
    let renderable: Vec<&Phase> = phases
        .iter()
        .filter(|phase| {
            let keep = phase.is_renderable();
            if !keep {
                debug!(
                    name = %phase.name,
                    d0 = %phase.d0,
                    d1 = %phase.d1,
                    enabled = phase.enabled,
                    "skipping phase that cannot be rendered"
                );
            }
            keep
        })
        .collect();

    let first = *renderable.first()?;
    let (min_start, max_end) = renderable.iter().copied().fold(
        (first.d0.as_str(), first.d1.as_str()),
        |(min, max), phase| {
            let min = if phase.d0.as_str() < min { phase.d0.as_str() } else { min };
            let max = if phase.d1.as_str() > max { phase.d1.as_str() } else { max };
            (min, max)
        },
    );

    let span = DateSpan {
        min_start: parse_iso_date(min_start)?,
        max_end: parse_iso_date(max_end)?,
    };
    let phases: Vec<RenderablePhase> = renderable
        .into_iter()
        .filter_map(RenderablePhase::from_phase)
        .collect();

    debug!(
        renderable = phases.len(),
        min_start = %span.min_start,
        max_end = %span.max_end,
        "resolved phase range"
    );

    Some(ResolvedPhaseSet { span, phases })
}

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::datetime::local_now;
use crate::grid::{WeekGrid, generate};
use crate::phase::Phase;
use crate::resolver::{DateSpan, RenderablePhase, resolve_range};
use crate::sizer::GridSizing;

/// Everything a presenter needs to draw one recomputation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RenderedFrame {
    pub span: DateSpan,
    pub phases: Vec<RenderablePhase>,
    pub grid: WeekGrid,
    pub width: u32,
}

/// Receives each freshly computed frame.
pub trait Presenter {
    fn present(&mut self, frame: &RenderedFrame) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    /// No renderable phase; the presenter was not called and the previous
    /// frame is still current.
    Skipped,
}

/// Recomputes the whole grid on every phase-set change and hands it on.
///
/// Takes `&mut self`, so one change is fully processed before the next.
#[derive(Debug)]
pub struct RenderCoordinator<P> {
    presenter: P,
    sizing: GridSizing,
    timezone: Tz,
    last_frame: Option<RenderedFrame>,
}

impl<P: Presenter> RenderCoordinator<P> {
    pub fn new(presenter: P, sizing: GridSizing, timezone: Tz) -> Self {
        Self {
            presenter,
            sizing,
            timezone,
            last_frame: None,
        }
    }

    pub fn last_frame(&self) -> Option<&RenderedFrame> {
        self.last_frame.as_ref()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Builds a frame from `snapshot` without presenting or remembering it.
    pub fn compute(&self, snapshot: &[Phase], now: DateTime<Utc>) -> Option<RenderedFrame> {
        let resolved = resolve_range(snapshot)?;
        let now = local_now(now, &self.timezone);
        let grid = generate(&resolved.span, &resolved.phases, now);
        let width = self.sizing.width_for(grid.year_rows());

        Some(RenderedFrame {
            span: resolved.span,
            phases: resolved.phases,
            grid,
            width,
        })
    }

    #[tracing::instrument(skip(self, snapshot), fields(phases = snapshot.len()))]
    pub fn on_phase_set_changed(
        &mut self,
        snapshot: &[Phase],
        now: DateTime<Utc>,
    ) -> anyhow::Result<RenderOutcome> {
        let Some(frame) = self.compute(snapshot, now) else {
            debug!("no renderable phases; keeping previous frame");
            return Ok(RenderOutcome::Skipped);
        };

        self.presenter.present(&frame)?;
        info!(
            rows = frame.grid.year_rows(),
            width = frame.width,
            renderable = frame.phases.len(),
            "rendered life calendar"
        );
        self.last_frame = Some(frame);
        Ok(RenderOutcome::Rendered)
    }
}

use anyhow::anyhow;

use crate::config::Config;

pub const DEFAULT_MAX_WIDTH: u32 = 800;
pub const DEFAULT_MIN_WIDTH: u32 = 400;
pub const DEFAULT_ROW_STEP: u32 = 10;

/// Container width policy: start wide and narrow by `row_step` pixels per
/// year row, never going below `min_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSizing {
    pub max_width: u32,
    pub min_width: u32,
    pub row_step: u32,
}

impl Default for GridSizing {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            min_width: DEFAULT_MIN_WIDTH,
            row_step: DEFAULT_ROW_STEP,
        }
    }
}

impl GridSizing {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let sizing = Self {
            max_width: cfg.get_parsed("grid.width.max")?.unwrap_or(defaults.max_width),
            min_width: cfg.get_parsed("grid.width.min")?.unwrap_or(defaults.min_width),
            row_step: cfg.get_parsed("grid.width.step")?.unwrap_or(defaults.row_step),
        };

        if sizing.min_width > sizing.max_width {
            return Err(anyhow!(
                "grid.width.min ({}) exceeds grid.width.max ({})",
                sizing.min_width,
                sizing.max_width
            ));
        }

        Ok(sizing)
    }

    pub fn width_for(&self, year_rows: usize) -> u32 {
        let rows = u64::try_from(year_rows).unwrap_or(u64::MAX);
        let shrink = rows.saturating_mul(u64::from(self.row_step));
        let narrowed = u64::from(self.max_width).saturating_sub(shrink);
        let narrowed = u32::try_from(narrowed).unwrap_or(self.max_width);
        narrowed.max(self.min_width)
    }
}

/// `max(400, 800 - year_rows * 10)` pixels.
pub fn compute_width(year_rows: usize) -> u32 {
    GridSizing::default().width_for(year_rows)
}

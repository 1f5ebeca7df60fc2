use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::datetime::parse_iso_date;

pub const DEFAULT_PHASE_COLOR: &str = "#000000";

/// One user-declared stretch of life: a label, a date interval and a color.
///
/// Dates are kept in their raw `YYYY-MM-DD` form; an empty string means the
/// date has not been filled in yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "start", alias = "d0")]
    pub d0: String,

    #[serde(default, rename = "end", alias = "d1")]
    pub d1: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_color() -> String {
    DEFAULT_PHASE_COLOR.to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for Phase {
    fn default() -> Self {
        Self {
            name: String::new(),
            d0: String::new(),
            d1: String::new(),
            color: default_color(),
            enabled: default_enabled(),
        }
    }
}

impl Phase {
    pub fn new(name: impl Into<String>, d0: impl Into<String>, d1: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            d0: d0.into(),
            d1: d1.into(),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        parse_iso_date(&self.d0)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        parse_iso_date(&self.d1)
    }

    /// Named, enabled, and starting strictly before it ends. Missing or
    /// malformed dates make the interval check fail.
    pub fn is_renderable(&self) -> bool {
        if self.name.is_empty() || !self.enabled {
            return false;
        }
        match (self.start_date(), self.end_date()) {
            (Some(d0), Some(d1)) => d0 < d1,
            _ => false,
        }
    }
}

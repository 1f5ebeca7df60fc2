use std::io::Write;

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::coordinator::{Presenter, RenderedFrame};
use crate::datetime::format_iso_date;
use crate::grid::{WeekCell, WeekStatus};

/// Draws frames as text: one line of week glyphs per year, then a legend.
#[derive(Debug)]
pub struct Renderer<W> {
    out: W,
    color: bool,
    past_glyph: String,
    future_glyph: String,
}

impl<W: Write> Renderer<W> {
    pub fn new(cfg: &Config, out: W) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        let past_glyph = glyph(cfg, "grid.glyph.past", "■")?;
        let future_glyph = glyph(cfg, "grid.glyph.future", "□")?;

        Ok(Self {
            out,
            color,
            past_glyph,
            future_glyph,
        })
    }

    /// Drops color when the output is not a terminal.
    pub fn on_terminal(mut self, is_terminal: bool) -> Self {
        self.color = self.color && is_terminal;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    #[tracing::instrument(skip(self, frame), fields(rows = frame.grid.year_rows()))]
    pub fn print_frame(&mut self, frame: &RenderedFrame) -> anyhow::Result<()> {
        for row in &frame.grid.rows {
            let line: String = row.weeks.iter().map(|cell| self.cell_glyph(cell)).collect();
            writeln!(self.out, "{:>4} {line}", row.year)?;
        }
        writeln!(self.out)?;

        let headers = vec![
            "Phase".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Color".to_string(),
        ];
        let rows = frame
            .phases
            .iter()
            .map(|phase| {
                vec![
                    phase.name.clone(),
                    format_iso_date(phase.start),
                    format_iso_date(phase.end),
                    self.paint(&phase.color, Some(&phase.color)),
                ]
            })
            .collect();
        write_table(&mut self.out, headers, rows)?;

        writeln!(self.out, "width: {}px", frame.width)?;
        self.out.flush()?;
        Ok(())
    }

    fn cell_glyph(&self, cell: &WeekCell) -> String {
        let glyph = match cell.status {
            WeekStatus::Past => &self.past_glyph,
            WeekStatus::Future => &self.future_glyph,
        };
        self.paint(glyph, cell.overlay_color.as_deref())
    }

    fn paint(&self, text: &str, hex: Option<&str>) -> String {
        if !self.color {
            return text.to_string();
        }
        match hex.and_then(parse_hex_color) {
            Some((r, g, b)) => format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"),
            None => text.to_string(),
        }
    }
}

impl<W: Write> Presenter for Renderer<W> {
    fn present(&mut self, frame: &RenderedFrame) -> anyhow::Result<()> {
        self.print_frame(frame)
    }
}

/// Writes each frame as pretty-printed JSON followed by a newline.
#[derive(Debug)]
pub struct JsonPresenter<W> {
    out: W,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    #[tracing::instrument(skip(self, frame))]
    fn present(&mut self, frame: &RenderedFrame) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, frame)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

fn glyph(cfg: &Config, key: &str, fallback: &str) -> anyhow::Result<String> {
    let value = cfg.get(key).unwrap_or_else(|| fallback.to_string());
    if UnicodeWidthStr::width(value.as_str()) != 1 {
        return Err(anyhow!("{key} must be a single-column glyph, got {value:?}"));
    }
    Ok(value)
}

/// `#rrggbb` or `#rgb`.
fn parse_hex_color(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        3 => {
            let (r, g, b) = (channel(&hex[0..1])?, channel(&hex[1..2])?, channel(&hex[2..3])?);
            Some((r * 17, g * 17, b * 17))
        }
        _ => None,
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::debug;

use crate::phase::Phase;

#[derive(Debug, Default, Deserialize)]
struct TomlPhaseFile {
    #[serde(default, rename = "phase")]
    phases: Vec<Phase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseFormat {
    Toml,
    Json,
    JsonLines,
}

impl PhaseFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "jsonl" => Ok(Self::JsonLines),
            other => Err(anyhow!(
                "unsupported phase file extension {other:?} for {}; expected .toml, .json or .jsonl",
                path.display()
            )),
        }
    }
}

/// Reads the phase rows from `path`, keeping their order.
///
/// The format follows the extension: `.toml` holds `[[phase]]` tables,
/// `.json` a top-level array, `.jsonl` one phase object per line.
#[tracing::instrument(skip(path), fields(file = %path.display()))]
pub fn load_phases(path: &Path) -> anyhow::Result<Vec<Phase>> {
    let format = PhaseFormat::from_path(path)?;
    let phases = match format {
        PhaseFormat::Toml => {
            let text = read_text(path)?;
            toml::from_str::<TomlPhaseFile>(&text)
                .with_context(|| format!("failed parsing {}", path.display()))?
                .phases
        }
        PhaseFormat::Json => {
            let text = read_text(path)?;
            serde_json::from_str::<Vec<Phase>>(&text)
                .with_context(|| format!("failed parsing {}", path.display()))?
        }
        PhaseFormat::JsonLines => load_jsonl(path)?,
    };

    debug!(count = phases.len(), ?format, "loaded phases");
    Ok(phases)
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Phase>> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let phase: Phase = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(phase);
    }

    Ok(out)
}

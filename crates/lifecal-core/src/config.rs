use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

const RC_ENV_VAR: &str = "LIFECALRC";
const RC_FILE_NAME: &str = ".lifecalrc";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("color", "on"),
      ("grid.width.max", "800"),
      ("grid.width.min", "400"),
      ("grid.width.step", "10"),
      ("grid.glyph.past", "■"),
      ("grid.glyph.future", "□")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading lifecalrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no lifecalrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// Reads `key` as a yes/no switch; unknown spellings are an error.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };

    parse_bool(raw).map(Some).ok_or_else(
      || {
        anyhow!(
          "invalid {key} setting: {raw}"
        )
      }
    )
  }

  /// Parses `key` as `T`, naming the key in the error when the value is
  /// present but malformed.
  pub fn get_parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<Option<T>>
  where
    T: FromStr,
    T::Err: std::fmt::Display
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };

    raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|err| {
        anyhow!(
          "invalid value for {key}: \
           {raw} ({err})"
        )
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       lifecalrc lookup"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::Config;

  #[test]
  fn defaults_cover_grid_keys() {
    let cfg = Config::default();
    assert_eq!(
      cfg
        .get_parsed::<u32>(
          "grid.width.max"
        )
        .expect("parse max"),
      Some(800)
    );
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("parse color"),
      Some(true)
    );
    assert_eq!(cfg.get("timezone"), None);
  }

  #[test]
  fn loads_file_with_comments_and_includes()
  {
    let temp =
      tempdir().expect("tempdir");
    let main = temp.path().join("rc");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &main,
      "# life calendar\ncolor = off  \
       # plain output\ninclude \
       extra.rc\ninclude \
       missing.rc\n"
    )
    .expect("write rc");
    fs::write(
      &extra,
      "grid.width.step = 20\n"
    )
    .expect("write include");

    let cfg = Config::load(Some(&main))
      .expect("load config");
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("parse color"),
      Some(false)
    );
    assert_eq!(
      cfg
        .get_parsed::<u32>(
          "grid.width.step"
        )
        .expect("parse step"),
      Some(20)
    );
    assert_eq!(
      cfg.loaded_files.len(),
      2
    );
  }

  #[test]
  fn rejects_lines_without_equals() {
    let temp =
      tempdir().expect("tempdir");
    let main = temp.path().join("rc");
    fs::write(&main, "color on\n")
      .expect("write rc");

    let err = Config::load(Some(&main))
      .expect_err("malformed line");
    assert!(
      err
        .to_string()
        .contains("invalid config line")
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "rc.grid.width.min".to_string(),
      "300".to_string()
    )]);
    assert_eq!(
      cfg.get("grid.width.min"),
      Some("300".to_string())
    );
  }

  #[test]
  fn malformed_numbers_name_the_key() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "grid.width.max".to_string(),
      "wide".to_string()
    )]);
    let err = cfg
      .get_parsed::<u32>(
        "grid.width.max"
      )
      .expect_err("not a number");
    assert!(
      err
        .to_string()
        .contains("grid.width.max")
    );
  }

  #[test]
  fn bool_switches_reject_unknown_words() {
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "color".to_string(),
        "sometimes".to_string()
      ),
      (
        "flag".to_string(),
        " Yes ".to_string()
      )
    ]);

    let err = cfg
      .get_bool("color")
      .expect_err("unknown word");
    assert!(
      err
        .to_string()
        .contains("invalid color setting")
    );
    assert_eq!(
      cfg
        .get_bool("flag")
        .expect("parse flag"),
      Some(true)
    );
    assert_eq!(
      cfg
        .get_bool("missing")
        .expect("absent key"),
      None
    );
  }
}

use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

use crate::config::Config;

const TIMEZONE_ENV_VAR: &str =
  "LIFECAL_TIMEZONE";
const TIMEZONE_CONFIG_KEY: &str =
  "timezone";
const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";
const GAP_STEP_MINUTES: i64 = 15;
const GAP_SEARCH_STEPS: i64 = 96;

fn iso_date_shape()
-> Option<&'static Regex> {
  static SHAPE: OnceLock<Option<Regex>> =
    OnceLock::new();
  SHAPE
    .get_or_init(|| {
      Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .ok()
    })
    .as_ref()
}

/// Parses a strict `YYYY-MM-DD` calendar date.
///
/// Anything else (empty, partial, non-padded, or an impossible day such as
/// `2021-02-30`) yields `None`. Accepted strings sort lexically in the same
/// order as the dates they name.
#[must_use]
pub fn parse_iso_date(
  raw: &str
) -> Option<NaiveDate> {
  if !iso_date_shape()?.is_match(raw) {
    return None;
  }
  NaiveDate::parse_from_str(
    raw,
    ISO_DATE_FORMAT
  )
  .ok()
}

#[must_use]
pub fn format_iso_date(
  date: NaiveDate
) -> String {
  date.format(ISO_DATE_FORMAT).to_string()
}

/// Picks the timezone used to decide which weeks are already past.
///
/// `LIFECAL_TIMEZONE` wins over the `timezone` config key, which wins over
/// the host's own zone. UTC is used only when none of them yields a valid
/// IANA id.
#[tracing::instrument(skip(cfg))]
pub fn resolve_timezone(
  cfg: &Config
) -> Tz {
  let host = match iana_time_zone::get_timezone() {
    | Ok(name) => Some(name),
    | Err(err) => {
      tracing::warn!(
        error = %err,
        "cannot determine host timezone"
      );
      None
    }
  };

  resolve_timezone_from(
    std::env::var(TIMEZONE_ENV_VAR).ok(),
    cfg,
    host
  )
}

fn resolve_timezone_from(
  env_value: Option<String>,
  cfg: &Config,
  host: Option<String>
) -> Tz {
  if let Some(raw) = env_value
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) =
    cfg.get(TIMEZONE_CONFIG_KEY)
    && let Some(tz) = parse_timezone(
      &raw,
      "config:timezone"
    )
  {
    return tz;
  }

  if let Some(raw) = host
    && let Some(tz) =
      parse_timezone(&raw, "host")
  {
    return tz;
  }

  tracing::warn!(
    "no usable timezone; using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Wall-clock time in `tz`, the reference point for past/future status.
#[must_use]
pub fn local_now(
  now: DateTime<Utc>,
  tz: &Tz
) -> NaiveDateTime {
  now.with_timezone(tz).naive_local()
}

/// Local midnight of `date` as an instant. A midnight skipped by a DST
/// change resolves to the first wall-clock time after the gap.
fn local_midnight_to_utc(
  date: NaiveDate,
  tz: &Tz,
  context: &str
) -> DateTime<Utc> {
  let midnight =
    date.and_time(NaiveTime::MIN);

  match tz.from_local_datetime(&midnight)
  {
    | LocalResult::Single(local_dt) => {
      local_dt.with_timezone(&Utc)
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local midnight; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      chosen.with_timezone(&Utc)
    }
    | LocalResult::None => {
      let after_gap = (1
        ..=GAP_SEARCH_STEPS)
        .find_map(|step| {
          tz.from_local_datetime(
            &(midnight
              + Duration::minutes(
                GAP_STEP_MINUTES * step
              ))
          )
          .earliest()
        });

      match after_gap {
        | Some(local_dt) => {
          tracing::warn!(
            context,
            timezone = tz.name(),
            resolved = %local_dt,
            "local midnight skipped by DST; using first valid time"
          );
          local_dt.with_timezone(&Utc)
        }
        | None => {
          tracing::error!(
            context,
            timezone = tz.name(),
            "no valid local time on this day; reading midnight as UTC"
          );
          midnight.and_utc()
        }
      }
    }
  }
}

/// Resolves the `--now` expression used to pin the reference moment.
///
/// Accepts `now`, `today`, `yesterday`, `tomorrow`, or a `YYYY-MM-DD`
/// date taken as local midnight in `tz`.
#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_now_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today =
    now.with_timezone(tz).date_naive();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return Ok(local_midnight_to_utc(
        today, tz, "today"
      ));
    }
    | "tomorrow" => {
      return Ok(local_midnight_to_utc(
        today + Duration::days(1),
        tz,
        "tomorrow"
      ));
    }
    | "yesterday" => {
      return Ok(local_midnight_to_utc(
        today - Duration::days(1),
        tz,
        "yesterday"
      ));
    }
    | _ => {}
  }

  let date = parse_iso_date(token)
    .ok_or_else(|| {
      anyhow!(
        "expected now, today, \
         yesterday, tomorrow or \
         YYYY-MM-DD"
      )
    })
    .with_context(|| {
      format!(
        "invalid --now value: {token}"
      )
    })?;
  Ok(local_midnight_to_utc(
    date, tz, "iso-date"
  ))
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    format_iso_date,
    local_now,
    parse_iso_date,
    parse_now_expr,
    resolve_timezone_from
  };
  use crate::config::Config;

  fn now() -> chrono::DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn accepts_padded_iso_dates() {
    assert_eq!(
      parse_iso_date("2021-03-01"),
      NaiveDate::from_ymd_opt(
        2021, 3, 1
      )
    );
  }

  #[test]
  fn rejects_loose_or_impossible_dates()
  {
    for raw in [
      "",
      "2021",
      "2021-3-1",
      "2021-02-30",
      " 2021-03-01",
      "2021-03-01T00:00:00",
      "not a date"
    ] {
      assert_eq!(
        parse_iso_date(raw),
        None,
        "{raw:?} should not parse"
      );
    }
  }

  #[test]
  fn formats_back_to_iso() {
    let date =
      NaiveDate::from_ymd_opt(
        1999, 12, 31
      )
      .expect("valid date");
    assert_eq!(
      format_iso_date(date),
      "1999-12-31"
    );
  }

  #[test]
  fn now_expr_today_is_local_midnight()
  {
    let tz = chrono_tz::Asia::Tokyo;
    let parsed =
      parse_now_expr("today", now(), &tz)
        .expect("parse today");
    assert_eq!(
      local_now(parsed, &tz)
        .format("%Y-%m-%d %H:%M")
        .to_string(),
      "2026-02-17 00:00"
    );
  }

  #[test]
  fn now_expr_accepts_iso_date() {
    let parsed = parse_now_expr(
      "2030-06-01",
      now(),
      &chrono_tz::UTC
    )
    .expect("parse iso");
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2030, 6, 1, 0, 0, 0
        )
        .single()
        .expect("valid")
    );
  }

  #[test]
  fn now_expr_passes_through_now() {
    let parsed = parse_now_expr(
      "NOW",
      now(),
      &chrono_tz::UTC
    )
    .expect("parse now");
    assert_eq!(parsed, now());
  }

  #[test]
  fn now_expr_rejects_garbage() {
    let err = parse_now_expr(
      "next tuesday",
      now(),
      &chrono_tz::UTC
    )
    .expect_err("garbage rejected");
    assert!(
      format!("{err:#}")
        .contains("invalid --now value")
    );
  }

  #[test]
  fn falls_back_to_host_timezone() {
    let tz = resolve_timezone_from(
      None,
      &Config::default(),
      Some(
        "America/Los_Angeles"
          .to_string()
      )
    );
    assert_eq!(
      tz,
      chrono_tz::America::Los_Angeles
    );

    // 2021-01-08 04:00 UTC is still the evening of Jan 7 in Los Angeles.
    let instant = Utc
      .with_ymd_and_hms(
        2021, 1, 8, 4, 0, 0
      )
      .single()
      .expect("valid instant");
    assert_eq!(
      local_now(instant, &tz)
        .format("%Y-%m-%d %H:%M")
        .to_string(),
      "2021-01-07 20:00"
    );
  }

  #[test]
  fn env_and_config_win_over_host() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "timezone".to_string(),
      "Europe/Paris".to_string()
    )]);
    let host =
      Some("Asia/Tokyo".to_string());

    assert_eq!(
      resolve_timezone_from(
        None,
        &cfg,
        host.clone()
      ),
      chrono_tz::Europe::Paris
    );
    assert_eq!(
      resolve_timezone_from(
        Some(
          "America/Sao_Paulo"
            .to_string()
        ),
        &cfg,
        host
      ),
      chrono_tz::America::Sao_Paulo
    );
  }

  #[test]
  fn unusable_sources_end_in_utc() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "timezone".to_string(),
      "Mars/Olympus_Mons".to_string()
    )]);

    assert_eq!(
      resolve_timezone_from(
        Some("  ".to_string()),
        &cfg,
        Some("Not/AZone".to_string())
      ),
      chrono_tz::UTC
    );
    assert_eq!(
      resolve_timezone_from(
        None,
        &Config::default(),
        None
      ),
      chrono_tz::UTC
    );
  }

  #[test]
  fn skipped_midnight_resolves_after_the_gap()
  {
    // Brazil started DST at 00:00 on 2018-11-04; clocks jumped to 01:00.
    let tz =
      chrono_tz::America::Sao_Paulo;
    let parsed = parse_now_expr(
      "2018-11-04",
      now(),
      &tz
    )
    .expect("gap is not an error");

    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2018, 11, 4, 3, 0, 0
        )
        .single()
        .expect("valid")
    );
    assert_eq!(
      local_now(parsed, &tz)
        .format("%Y-%m-%d %H:%M")
        .to_string(),
      "2018-11-04 01:00"
    );
  }
}

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod datetime;
pub mod grid;
pub mod phase;
pub mod phasefile;
pub mod render;
pub mod resolver;
pub mod sizer;

use std::ffi::OsString;
use std::io::{
  IsTerminal,
  Write
};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

use crate::coordinator::{
  Presenter,
  RenderCoordinator,
  RenderOutcome
};

pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let stdout = std::io::stdout();
  let interactive = stdout.is_terminal();
  run_with_output(
    raw_args,
    stdout,
    interactive
  )?;
  Ok(())
}

/// Runs one CLI invocation, writing the frame to `out`.
///
/// Text output is colored only when `interactive` is set and the `color`
/// setting allows it.
#[tracing::instrument(skip_all)]
pub fn run_with_output<W: Write>(
  raw_args: Vec<OsString>,
  out: W,
  interactive: bool
) -> anyhow::Result<RenderOutcome> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting lifecal"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let timezone =
    datetime::resolve_timezone(&cfg);
  let now = datetime::parse_now_expr(
    &cli.now,
    Utc::now(),
    &timezone
  )?;
  let sizing =
    sizer::GridSizing::from_config(&cfg)
      .context(
        "invalid grid sizing \
         configuration"
      )?;

  let phases =
    phasefile::load_phases(&cli.phases)
      .with_context(|| {
        format!(
          "failed to load phases from \
           {}",
          cli.phases.display()
        )
      })?;

  let outcome = match cli.format {
    | cli::OutputFormat::Text => {
      let renderer =
        render::Renderer::new(&cfg, out)?
          .on_terminal(interactive);
      render_once(
        renderer, sizing, timezone,
        &phases, now
      )?
    }
    | cli::OutputFormat::Json => {
      let presenter =
        render::JsonPresenter::new(out);
      render_once(
        presenter, sizing, timezone,
        &phases, now
      )?
    }
  };

  if outcome == RenderOutcome::Skipped {
    warn!(
      phases = phases.len(),
      "no renderable phases; nothing \
       to draw"
    );
  }

  info!("done");
  Ok(outcome)
}

fn render_once<P: Presenter>(
  presenter: P,
  sizing: sizer::GridSizing,
  timezone: chrono_tz::Tz,
  phases: &[phase::Phase],
  now: chrono::DateTime<Utc>
) -> anyhow::Result<RenderOutcome> {
  let mut coordinator =
    RenderCoordinator::new(
      presenter, sizing, timezone
    );
  coordinator
    .on_phase_set_changed(phases, now)
}

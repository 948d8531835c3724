pub mod account;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod deletion;
pub mod draft;
pub mod error;
pub mod expansion;
pub mod filter;
pub mod gateway;
pub mod render;
pub mod selection;
pub mod session;
pub mod sort;
pub mod store;
pub mod task;
pub mod view;
pub mod wire;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::cli::{
  Command,
  ListArgs
};
use crate::commands::CommandContext;
use crate::gateway::http::HttpGateway;
use crate::render::Renderer;
use crate::session::{
  Session,
  SessionStore
};

#[tracing::instrument(skip_all)]
pub async fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
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
    "starting taskdeck"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.taskrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let session = Session::init(
    SessionStore::new(&data_dir)
  )
  .with_context(|| {
    format!(
      "failed to load session from {}",
      data_dir.display()
    )
  })?;

  let gateway = HttpGateway::new(
    cfg.api_url(),
    cfg.api_timeout()?
  )?;
  let today = datetime::today();

  let mut ctx = CommandContext {
    gateway,
    session,
    renderer: Renderer::new(&cfg, today),
    default_sort: cfg.default_sort()?,
    today
  };

  let command =
    cli.command.unwrap_or_else(|| {
      Command::List(ListArgs::default())
    });

  let mut input = io::stdin().lock();
  let mut out = io::stdout().lock();
  commands::dispatch(
    &mut ctx, command, &mut input,
    &mut out
  )
  .await?;

  info!("done");
  Ok(())
}

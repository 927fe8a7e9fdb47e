//! syndicate: command-line client for the ContentSyndicate dashboard API.
//! Reads go through the query cache; writes run as mutations that
//! invalidate the affected keys.

mod error;
mod handlers;
mod io;
mod print;

use std::process;

use syndicate::config::{self, Command};
use syndicate::infra::{Runtime, telemetry};
use tracing::{Dispatch, Level, debug, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

use error::AppError;
use handlers::{dashboard, newsletters, profile, sources, subscribers};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "command failed");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "command failed");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;
    debug!(api = %settings.api.base_url, query = ?settings.query, "Configuration loaded");

    let ctx = Runtime::from_settings(&settings)?;
    dispatch(&ctx, cli.command).await
}

async fn dispatch(ctx: &Runtime, command: Command) -> Result<(), AppError> {
    match command {
        Command::Newsletters(cmd) => newsletters::handle(ctx, cmd.action).await,
        Command::Sources(cmd) => sources::handle(ctx, cmd.action).await,
        Command::Subscribers(cmd) => subscribers::handle(ctx, cmd.action).await,
        Command::Dashboard => dashboard::handle(ctx).await,
        Command::Profile => profile::handle(ctx).await,
    }
}

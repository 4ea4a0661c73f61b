use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tenant_verification::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "tenant-verification-api",
    about = "Resumable tenant verification wizard: collects tenancy details over three steps and files the claim",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Host the wizard session API with health, readiness and metrics routes (default)
    Serve(ServeArgs),
    /// Walk a sample tenant through property, landlord and tenancy steps, then file the claim
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Bind address; overrides APP_HOST
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Bind port; overrides APP_PORT
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seconds a wizard may sit idle before it is detached; overrides VERIFY_SESSION_IDLE_SECS
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) session_idle_secs: Option<u64>,
}

impl ServeArgs {
    pub(crate) fn session_idle_timeout(&self) -> Option<Duration> {
        self.session_idle_secs.map(Duration::from_secs)
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    match Cli::parse().command.unwrap_or_default() {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve(ServeArgs::default())
    }
}

use crate::demo::{run_demo, run_verify, DemoArgs, VerifyArgs};
use crate::infra::{parse_grant, RoleGrant};
use crate::server;
use clap::{Args, Parser, Subcommand};
use revenue_certs::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Revenue Certificates",
    about = "Run and demonstrate the revenue department certificate workflow",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk one application from intake to a verified certificate
    Demo(DemoArgs),
    /// Look up a certificate number against a scripted demo registry
    Verify(VerifyArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Grant a role to a user, as USER=ROLE (repeatable)
    #[arg(long = "grant", value_parser = parse_grant)]
    pub(crate) grants: Vec<RoleGrant>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Verify(args) => run_verify(args).await,
    }
}

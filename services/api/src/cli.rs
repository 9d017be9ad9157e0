use crate::infra::{build_engine, github_client};
use crate::server;
use clap::{Args, Parser, Subcommand};
use join_github::admission::{AdmissionRequest, CapacityMonitor, DomainPolicyTable};
use join_github::config::AppConfig;
use join_github::error::AppError;
use join_github::telemetry;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "Join GitHub",
    about = "Admit people to the managed GitHub organisations",
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
    /// Decide and dispatch a single admission request
    Admit(AdmitArgs),
    /// Report seat and pending-invitation headroom for every managed organisation
    Capacity,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct AdmitArgs {
    /// Email address of the person asking to join
    #[arg(long)]
    pub(crate) email: String,
    /// GitHub username; only returning members supply one
    #[arg(long)]
    pub(crate) username: Option<String>,
    /// Organisation to join (repeatable)
    #[arg(long = "org")]
    pub(crate) organisations: Vec<String>,
    /// Request the ministryofjustice organisation
    #[arg(long)]
    pub(crate) ministry_of_justice: bool,
    /// Request the moj-analytical-services organisation
    #[arg(long)]
    pub(crate) analytical_services: bool,
}

impl AdmitArgs {
    fn into_request(self) -> AdmissionRequest {
        let mut organisations = self.organisations;
        for organisation in DomainPolicyTable::select_organisations(
            self.ministry_of_justice,
            self.analytical_services,
        ) {
            if !organisations
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(&organisation))
            {
                organisations.push(organisation);
            }
        }

        AdmissionRequest {
            email_address: self.email,
            username: self.username,
            organisations,
        }
    }
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args),
        Command::Admit(args) => run_admit(args),
        Command::Capacity => run_capacity(),
    }
}

fn run_admit(args: AdmitArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let engine = build_engine(&config)?;
    let decision = engine.admit(args.into_request())?;
    print_json(&decision)
}

fn run_capacity() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let github = github_client(&config)?;
    let verdict = CapacityMonitor::new(&github, config.admission.thresholds)
        .survey(config.policy.managed_ids())?;
    print_json(&verdict)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

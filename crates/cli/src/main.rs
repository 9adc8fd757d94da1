use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conto_core::{DateRange, Statement};
use conto_import::{import, ofx};
use conto_portal::{provider_for, AuthError};

mod bank;
mod config;

use config::{Config, Profile};

/// Download bank statements through the portal's strong authentication and
/// convert them to OFX.
#[derive(Parser)]
#[command(name = "conto", version)]
struct Cli {
    /// Profiles file [default: <config dir>/conto/config.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every request and state change
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and save the raw export
    Download {
        profile: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert a raw export to OFX
    Convert {
        profile: String,
        file: PathBuf,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download, then convert
    Fetch {
        profile: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;

    match cli.command {
        Command::Download {
            profile,
            from,
            to,
            output,
        } => {
            let profile = config.profile(&profile)?;
            download(profile, DateRange::new(from, to)?, &output)
        }
        Command::Convert {
            profile,
            file,
            output,
        } => {
            let statement = convert(config.profile(&profile)?, &file)?;
            emit(&statement, output.as_deref())
        }
        Command::Fetch {
            profile,
            from,
            to,
            output,
        } => {
            let profile = config.profile(&profile)?;
            let range = DateRange::new(from, to)?;
            let workdir = tempfile::tempdir().context("Cannot create a working directory")?;
            let export = workdir
                .path()
                .join(format!("export.{}", profile.bank.export_extension()));
            download(profile, range, &export)?;
            let statement = convert(profile, &export)?;
            emit(&statement, output.as_deref())
        }
    }
}

fn download(profile: &Profile, range: DateRange, destination: &Path) -> anyhow::Result<()> {
    let adapter = profile.bank.portal();
    let credential = provider_for(profile.secret_profile.as_deref()).credential()?;
    tracing::info!("Downloading {} movements, {range}", profile.bank);

    match conto_portal::download(&adapter, &credential, range, destination) {
        Ok(()) => Ok(()),
        Err(e @ AuthError::CredentialRejected) => bail!("{e}"),
        Err(e @ (AuthError::ChallengeDenied { .. } | AuthError::Timeout { .. })) => {
            bail!("Two-factor authorization failed: {e}")
        }
        Err(e) => Err(e).context(format!("{} download failed", profile.bank)),
    }
}

fn convert(profile: &Profile, file: &Path) -> anyhow::Result<Statement> {
    let defaults = profile.statement_defaults()?;
    import::read_statement(file, &profile.rules(), &defaults)
        .with_context(|| format!("Cannot convert {}", file.display()))
}

fn emit(statement: &Statement, output: Option<&Path>) -> anyhow::Result<()> {
    let text = ofx::render(statement, Local::now().naive_local());
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Cannot write {}", path.display()))?,
        None => std::io::stdout().lock().write_all(text.as_bytes())?,
    }
    tracing::info!(
        "{} transactions for account {}",
        statement.transactions.len(),
        statement.account_id
    );
    Ok(())
}

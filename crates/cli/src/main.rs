use api_shared::SourceHealthRes;
use clap::{Parser, Subcommand};
use clinq_core::{CoreConfig, QueryError, QueryExecutor, RepositoryMode};
use serde::Serialize;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinq")]
#[command(about = "Natural-language clinical queries over FHIR")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print the analysis and the FHIR bundle
    Query {
        /// Free-text query, e.g. "diabetic patients over 50"
        text: String,
        /// Data source for this run (mock, hapi)
        #[arg(long)]
        source: Option<RepositoryMode>,
        /// Print single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Print how a query is interpreted without running it
    Analyze {
        /// Free-text query
        text: String,
    },
    /// Check that the data source is reachable
    Health {
        /// Data source to check (mock, hapi)
        #[arg(long)]
        source: Option<RepositoryMode>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinq_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => Ok(code),
        Err(e) => {
            let kind = e
                .downcast_ref::<QueryError>()
                .map_or("Error", QueryError::kind);
            eprintln!("{kind}: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<ExitCode> {
    let cfg = CoreConfig::from_env()?;
    let executor = QueryExecutor::from_config(&cfg)?;

    match command {
        Commands::Query {
            text,
            source,
            compact,
        } => {
            if let Some(mode) = source {
                executor.controller().toggle(mode);
            }
            let outcome = executor.execute(&text).await?;
            print_json(&outcome.to_response()?, compact)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze { text } => {
            print_json(&executor.analyze(&text)?, false)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health { source } => {
            if let Some(mode) = source {
                executor.controller().toggle(mode);
            }
            let health = SourceHealthRes::from(executor.controller().health().await);
            print_json(&health, false)?;
            Ok(if health.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{text}");
    Ok(())
}

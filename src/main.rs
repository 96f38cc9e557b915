use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use icd_core::{CoreConfig, IcdClient, NonEmptyText};

mod render;

/// Symptom used when `diagnose` is run without arguments.
const DEFAULT_SYMPTOM: &str = "sore throat";

#[derive(Parser)]
#[command(name = "icd-run")]
#[command(about = "Look up ICD-11 diagnoses for free-text symptoms")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a symptom to a diagnosis summary
    Diagnose {
        /// Symptom description (defaults to "sore throat")
        symptom: Vec<String>,
    },
    /// Show the best autocode match only
    Search {
        /// Symptom description
        #[arg(required = true)]
        symptom: Vec<String>,
    },
    /// List every candidate entity above the match threshold
    Candidates {
        /// Free-text query
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Exchange credentials and show the token's validity window
    Token,
}

/// Entry point for the ICD lookup client
///
/// Resolves configuration before any network call, so a missing `CLIENT_ID` or
/// `CLIENT_SECRET` fails immediately with a configuration error. Logs go to
/// stderr; the report goes to stdout.
///
/// # Environment Variables
/// - `CLIENT_ID`, `CLIENT_SECRET`: ICD-API client credentials (required)
/// - `ICD_API_BASE`, `ICD_TOKEN_ENDPOINT`: endpoint overrides
/// - `ICD_MATCH_THRESHOLD`: autocode confidence floor (default 0.75)
/// - `ICD_PROACTIVE_REFRESH`: refresh the token in the background
///
/// # Returns
/// * `Ok(())` - If the lookup completed
/// * `Err(anyhow::Error)` - On any configuration, authentication or lookup failure
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("icd=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = CoreConfig::from_env()?;
    tracing::debug!(?config, "configuration resolved");
    let client = IcdClient::new(&config)?;

    let refresher = config
        .proactive_refresh()
        .then(|| client.broker().spawn_proactive_refresh());

    let result = run(cli.command, &client).await;

    if let Some(handle) = refresher {
        handle.abort();
    }
    result
}

async fn run(command: Option<Commands>, client: &IcdClient) -> anyhow::Result<()> {
    let threshold = client.pipeline().match_threshold();

    match command.unwrap_or(Commands::Diagnose {
        symptom: Vec::new(),
    }) {
        Commands::Diagnose { symptom } => {
            let symptom = if symptom.is_empty() {
                NonEmptyText::new(DEFAULT_SYMPTOM)?
            } else {
                text_arg(&symptom, "symptom")?
            };
            let diagnosis = client.pipeline().run(&symptom).await?;
            println!("{}", render::search_summary(&diagnosis.search, threshold));
            print!("{}", render::diagnosis_summary(&diagnosis.record));
        }
        Commands::Search { symptom } => {
            let symptom = text_arg(&symptom, "symptom")?;
            let result = client.pipeline().search(&symptom).await?;
            print!("{}", render::search_summary(&result, threshold));
        }
        Commands::Candidates { query } => {
            let query = text_arg(&query, "query")?;
            let candidates = client.pipeline().search_candidates(&query).await?;
            print!("{}", render::candidates_summary(query.as_str(), &candidates));
        }
        Commands::Token => {
            let token = client.broker().acquire_token().await?;
            print!(
                "{}",
                render::token_summary(token.issued_at(), token.expires_at())
            );
        }
    }

    Ok(())
}

fn text_arg(words: &[String], name: &str) -> anyhow::Result<NonEmptyText> {
    NonEmptyText::new(words.join(" ")).with_context(|| format!("{name} cannot be empty"))
}

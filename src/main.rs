use anyhow::Result;
use clap::{Parser, Subcommand};
use pitchdeck_rag::commands::{
    CandidateSource, configure, exists, ingest, purge, search, similar, stats,
};
use pitchdeck_rag::config::Config;
use pitchdeck_rag::models::StartupProfile;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pitchdeck-rag")]
#[command(about = "Retrieve similar pitch decks and build context for pitch generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file or show the current settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk and index the pitch decks in a folder
    Ingest {
        /// Folder containing .txt, .md, .pdf or .pptx pitch decks
        dir: PathBuf,
        /// Documents per upsert batch (defaults to the configured value)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Search pitch decks by free-text query
    Search {
        query: String,
        /// List this company's decks first
        #[arg(long)]
        company: Option<String>,
        /// Number of results
        #[arg(short, default_value_t = 5)]
        k: usize,
    },
    /// Rank companies similar to a startup profile
    Similar {
        /// Name of the startup being pitched
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        industry: String,
        #[arg(long, default_value = "")]
        business_model: String,
        #[arg(long, default_value = "")]
        solution: String,
        #[arg(long, default_value = "")]
        target_customer: String,
        /// Number of companies to return (defaults to the configured value)
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long, value_enum, default_value_t)]
        source: CandidateSource,
    },
    /// Check whether a company is already in the database
    Exists { name: String },
    /// Show knowledge base or index statistics
    Stats {
        #[arg(long, value_enum, default_value_t)]
        source: CandidateSource,
    },
    /// Delete every vector from the index
    Purge {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load_default()?;

    match cli.command {
        Commands::Config { show } => {
            configure(&config, show)?;
        }
        Commands::Ingest { dir, batch_size } => {
            ingest(&config, &dir, batch_size).await?;
        }
        Commands::Search { query, company, k } => {
            search(&config, &query, company.as_deref(), k).await?;
        }
        Commands::Similar {
            name,
            industry,
            business_model,
            solution,
            target_customer,
            top_k,
            source,
        } => {
            let profile = StartupProfile {
                startup_name: name,
                industry,
                business_model,
                solution,
                target_customer,
                ..StartupProfile::default()
            };
            similar(&config, &profile, top_k, source).await?;
        }
        Commands::Exists { name } => {
            exists(&config, &name).await?;
        }
        Commands::Stats { source } => {
            stats(&config, source).await?;
        }
        Commands::Purge { yes } => {
            purge(&config, yes).await?;
        }
    }

    Ok(())
}

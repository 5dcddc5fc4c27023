use anyhow::{Context, Result, bail};
use console::style;
use itertools::Itertools;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, init_config, show_config};
use crate::context;
use crate::database::VectorStore;
use crate::documents::{DocumentProcessor, SUPPORTED_EXTENSIONS, summarize};
use crate::embeddings::create_provider;
use crate::models::StartupProfile;
use crate::retrieval::{CandidateRetriever, KnowledgeBase, VectorRetriever};
use crate::tools::{CHECK_EXISTS_TOOL, RagTool, SEARCH_TOOL, Toolbox};

/// Where `similar` and `stats` read candidates from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CandidateSource {
    /// Built-in reference companies
    #[default]
    Kb,
    /// Documents ingested into the vector index
    Index,
}

/// Connect to the configured vector index
async fn open_store(config: &Config) -> Result<Arc<VectorStore>> {
    let embedder =
        create_provider(&config.embeddings).context("Failed to create embedding provider")?;
    let store = VectorStore::open(config, embedder)
        .await
        .context("Failed to open vector index")?;
    Ok(Arc::new(store))
}

/// Write a default configuration file, or print the current one
#[inline]
pub fn configure(config: &Config, show: bool) -> Result<()> {
    if show {
        show_config(config);
        return Ok(());
    }

    if init_config(config)? {
        println!(
            "Wrote default configuration to {}",
            style(config.config_file_path().display()).green()
        );
    } else {
        println!(
            "Configuration already exists at {}",
            config.config_file_path().display()
        );
    }
    println!("Use 'pitchdeck-rag config --show' to review the settings.");
    Ok(())
}

/// Chunk the pitch-deck files in `data_dir` and upsert them into the index
#[inline]
pub async fn ingest(config: &Config, data_dir: &Path, batch_size: Option<usize>) -> Result<()> {
    let batch_size = batch_size.unwrap_or(config.index.batch_size);
    if batch_size == 0 {
        bail!("Batch size must be at least 1");
    }

    let processor = DocumentProcessor::new(data_dir, &config.documents);
    let documents = processor.process_all()?;
    if documents.is_empty() {
        println!("No documents found in {}", data_dir.display());
        println!(
            "Supported formats: {}",
            SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| format!(".{}", ext))
                .join(", ")
        );
        return Ok(());
    }

    let summary = summarize(&documents);
    println!(
        "Processed {} files into {} chunks (avg {:.0} characters)",
        summary.total_files, summary.total_chunks, summary.average_chunk_size
    );
    if !summary.companies.is_empty() {
        println!("Companies: {}", summary.companies.join(", "));
    }

    let store = open_store(config).await?;
    info!(
        "Ingesting {} chunks into '{}'",
        documents.len(),
        store.index_name()
    );

    if store.add_documents(&documents, batch_size).await {
        let stats = store.stats().await;
        println!(
            "{} Index '{}' now holds {} vectors",
            style("✓").green(),
            store.index_name(),
            stats.total_vectors
        );
    } else {
        println!("{} Nothing was ingested", style("✗").red());
    }

    Ok(())
}

/// Knowledge-base toolbox, with the vector index attached when it can be opened
async fn open_toolbox(config: &Config) -> Toolbox {
    let toolbox = Toolbox::new(KnowledgeBase::builtin());
    match open_store(config).await {
        Ok(store) if store.stats().await.total_vectors > 0 => toolbox.with_vector_store(store),
        Ok(_) => {
            info!("Vector index is empty, using the built-in knowledge base");
            toolbox
        }
        Err(e) => {
            warn!("Vector index unavailable, using the built-in knowledge base: {:#}", e);
            toolbox
        }
    }
}

/// Run the search tool and print its output
#[inline]
pub async fn search(
    config: &Config,
    query: &str,
    company_name: Option<&str>,
    k: usize,
) -> Result<()> {
    let tool = RagTool::from_call(
        SEARCH_TOOL,
        &json!({"query": query, "company_name": company_name, "k": k}),
    )?;

    let output = open_toolbox(config).await.dispatch(&tool).await;
    println!("{}", output.text);
    Ok(())
}

/// Rank similar companies for a startup profile and print the context block
#[inline]
pub async fn similar(
    config: &Config,
    profile: &StartupProfile,
    top_k: Option<usize>,
    source: CandidateSource,
) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let retriever: Box<dyn CandidateRetriever> = match source {
        CandidateSource::Kb => Box::new(KnowledgeBase::builtin()),
        CandidateSource::Index => Box::new(VectorRetriever::new(
            open_store(config).await?,
            config.retrieval.candidate_pool,
        )),
    };

    let candidates = retriever.find_similar(profile, top_k).await;
    if !profile.startup_name.is_empty() {
        println!(
            "{}",
            style(format!("Similar companies for {}", profile.startup_name)).bold()
        );
        println!();
    }
    println!("{}", context::render(&candidates));
    Ok(())
}

/// Check whether a company is already known.
///
/// The vector index is only consulted when the knowledge base has no match.
#[inline]
pub async fn exists(config: &Config, company_name: &str) -> Result<()> {
    let tool = RagTool::from_call(CHECK_EXISTS_TOOL, &json!({"company_name": company_name}))?;

    let known = KnowledgeBase::builtin().exists(company_name).exists;
    let toolbox = if known {
        Toolbox::new(KnowledgeBase::builtin())
    } else {
        open_toolbox(config).await
    };

    let output = toolbox.dispatch(&tool).await;
    println!("{}", output.text);
    Ok(())
}

/// Print statistics for the knowledge base or the vector index
#[inline]
pub async fn stats(config: &Config, source: CandidateSource) -> Result<()> {
    match source {
        CandidateSource::Kb => {
            let stats = KnowledgeBase::builtin().stats();
            println!("{}", style("Knowledge Base").bold().cyan());
            println!("  Companies: {}", stats.total_companies);
            println!("  Keys: {}", stats.companies.join(", "));
            println!("  Industries: {}", stats.industries.join(", "));
        }
        CandidateSource::Index => {
            let store = open_store(config).await?;
            let stats = store.stats().await;
            println!(
                "{}",
                style(format!("Index '{}'", store.index_name())).bold().cyan()
            );
            println!("  Total vectors: {}", stats.total_vectors);
            println!("  Dimension: {}", stats.dimension);
            println!("  Fullness: {:.1}%", stats.index_fullness * 100.0);
            for (namespace, namespace_stats) in &stats.namespaces {
                println!("  Namespace {}: {} vectors", namespace, namespace_stats.vector_count);
            }
        }
    }
    Ok(())
}

/// Delete every vector from the index. Requires explicit confirmation.
#[inline]
pub async fn purge(config: &Config, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Refusing to delete all vectors without --yes");
    }

    let store = open_store(config).await?;
    if store.delete_all().await {
        println!("{} Deleted all vectors from '{}'", style("✓").green(), store.index_name());
        Ok(())
    } else {
        bail!("Failed to delete vectors from '{}'", store.index_name())
    }
}

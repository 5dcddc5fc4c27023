#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Tool dispatch backed by a LanceDB vector store

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use pitchdeck_rag::config::Config;
use pitchdeck_rag::database::{LanceIndex, VectorStore};
use pitchdeck_rag::embeddings::EmbeddingProvider;
use pitchdeck_rag::models::Document;
use pitchdeck_rag::retrieval::KnowledgeBase;
use pitchdeck_rag::tools::{CHECK_EXISTS_TOOL, SEARCH_TOOL, Toolbox};

struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let text = text.to_lowercase();
        let weight = |words: &[&str]| {
            words
                .iter()
                .map(|word| text.matches(word).count() as f32)
                .sum::<f32>()
        };
        Ok(vec![
            weight(&["kitchen", "restaurant", "delivery", "food"]),
            weight(&["fitness", "gym", "workout"]),
            0.1,
        ])
    }

    fn dimension(&self) -> usize {
        3
    }
}

fn chunk(id: &str, company: &str, text: &str) -> Document {
    Document::new(text)
        .with_metadata("document_id", id)
        .with_metadata("company_name", company)
        .with_metadata("file_name", format!("{}.txt", company))
        .with_metadata("file_type", "txt")
        .with_metadata("chunk_index", 0_u32)
}

async fn toolbox_with_store(temp_dir: &TempDir) -> Toolbox {
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    let index = LanceIndex::open(&config.vector_database_path())
        .await
        .expect("should open lancedb");
    let store = VectorStore::connect(&config, Arc::new(KeywordEmbedder), Arc::new(index))
        .await
        .expect("store should connect")
        .with_batch_delay(Duration::ZERO);

    let documents = vec![
        chunk(
            "kitchenhub_0",
            "KitchenHub",
            "KitchenHub runs shared kitchen space for delivery-only restaurant brands.",
        ),
        chunk(
            "fitloop_0",
            "FitLoop",
            "FitLoop streams live workout classes from boutique gym studios.",
        ),
        chunk(
            "fitloop_1",
            "FitLoop",
            "FitLoop members pay a monthly fitness subscription.",
        ),
    ];
    assert!(store.add_documents(&documents, 2).await);

    Toolbox::new(KnowledgeBase::builtin()).with_vector_store(Arc::new(store))
}

#[tokio::test]
async fn search_returns_index_hits_with_similarity() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let toolbox = toolbox_with_store(&temp_dir).await;

    let output = toolbox
        .call(SEARCH_TOOL, &json!({"query": "food delivery kitchen", "k": 1}))
        .await;

    assert!(!output.is_error);
    assert!(output.text.starts_with("kitchenhub (N/A)\n"));
    assert!(output.text.contains("Excerpt: KitchenHub runs shared kitchen space"));
    assert!(output.text.contains("Source: KitchenHub.txt (chunk 0)"));
    assert!(output.text.contains("Similarity: "));
    assert!(!output.text.contains("fitloop"));
}

#[tokio::test]
async fn search_lists_requested_company_first_without_duplicates() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let toolbox = toolbox_with_store(&temp_dir).await;

    let output = toolbox
        .call(
            SEARCH_TOOL,
            &json!({"query": "workout classes", "company_name": "KitchenHub", "k": 3}),
        )
        .await;

    assert!(!output.is_error);
    let blocks: Vec<&str> = output.text.split("\n\n").collect();
    assert_eq!(blocks.len(), 3);
    assert!(blocks[0].starts_with("kitchenhub"));
    assert_eq!(output.text.matches("KitchenHub runs shared kitchen").count(), 1);
}

#[tokio::test]
async fn check_exists_falls_back_to_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let toolbox = toolbox_with_store(&temp_dir).await;

    let builtin = toolbox
        .call(CHECK_EXISTS_TOOL, &json!({"company_name": "Dropbox"}))
        .await;
    assert!(builtin.text.contains("with historical funding data"));

    let indexed = toolbox
        .call(CHECK_EXISTS_TOOL, &json!({"company_name": "fitloop"}))
        .await;
    assert_eq!(
        indexed.text,
        "Company 'fitloop' EXISTS in the pitch deck index."
    );

    let unknown = toolbox
        .call(CHECK_EXISTS_TOOL, &json!({"company_name": "NovaCloud"}))
        .await;
    assert!(unknown.text.contains("NOT FOUND"));
}

#[tokio::test]
async fn invalid_calls_are_reported_not_dispatched() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let toolbox = toolbox_with_store(&temp_dir).await;

    let output = toolbox
        .call(SEARCH_TOOL, &json!({"query": "gym", "k": 500}))
        .await;
    assert!(output.is_error);
    assert!(output.text.contains("k must be between 1 and 50"));

    let output = toolbox.call("delete_all", &json!({})).await;
    assert!(output.is_error);
    assert!(output.text.contains("Unknown tool: delete_all"));
}

use super::*;
use crate::database::{IndexDescription, IndexMatch, NamespaceStats};
use crate::models::Metadata;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const DIM: usize = 3;

/// Embeds text by counting a few marker words; fails on "poison"
struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let text = text.to_lowercase();
        if text.contains("poison") {
            anyhow::bail!("embedding service rejected the input");
        }
        let count = |word: &str| text.matches(word).count() as f32;
        Ok(vec![
            count("storage") + 0.01,
            count("language") + 0.01,
            count("travel") + 0.01,
        ])
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

#[derive(Default)]
struct MemoryState {
    descriptions: BTreeMap<String, IndexDescription>,
    entries: BTreeMap<String, Vec<VectorEntry>>,
}

/// In-memory index that records how it is called
#[derive(Default)]
struct RecordingIndex {
    state: Mutex<MemoryState>,
    upsert_calls: AtomicUsize,
    upserted_entries: AtomicUsize,
    create_calls: AtomicUsize,
    never_ready: bool,
    fail_stats: bool,
}

impl RecordingIndex {
    fn with_existing(name: &str, dimension: usize) -> Self {
        let index = Self::default();
        index.state.lock().expect("state lock").descriptions.insert(
            name.to_string(),
            IndexDescription {
                name: name.to_string(),
                dimension,
                metric: DistanceMetric::Cosine,
                ready: true,
            },
        );
        index
    }

    fn stored_ids(&self, name: &str) -> Vec<String> {
        self.state.lock().expect("state lock").entries[name]
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm(a) * norm(b))
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().expect("state lock").descriptions.keys().cloned().collect())
    }

    async fn create_index(&self, name: &str, dimension: usize, metric: DistanceMetric) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("state lock");
        state.descriptions.insert(
            name.to_string(),
            IndexDescription {
                name: name.to_string(),
                dimension,
                metric,
                ready: !self.never_ready,
            },
        );
        state.entries.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        Ok(self.state.lock().expect("state lock").descriptions.get(name).cloned())
    }

    async fn upsert(&self, index: &str, entries: Vec<VectorEntry>) -> Result<usize> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.upserted_entries.fetch_add(entries.len(), Ordering::SeqCst);
        let mut state = self.state.lock().expect("state lock");
        let stored = state.entries.entry(index.to_string()).or_default();
        let written = entries.len();
        for entry in entries {
            stored.retain(|existing| existing.id != entry.id);
            stored.push(entry);
        }
        Ok(written)
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        let state = self.state.lock().expect("state lock");
        let mut matches: Vec<IndexMatch> = state
            .entries
            .get(index)
            .into_iter()
            .flatten()
            .filter(|entry| {
                filter.is_none_or(|filter| {
                    filter
                        .iter()
                        .all(|(key, value)| entry.metadata.get(key) == Some(value))
                })
            })
            .map(|entry| IndexMatch {
                id: entry.id.clone(),
                score: cosine(vector, &entry.embedding),
                text: entry.raw_text_preview.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        self.state
            .lock()
            .expect("state lock")
            .entries
            .insert(index.to_string(), Vec::new());
        Ok(())
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        if self.fail_stats {
            return Err(RagError::Index("stats unavailable".to_string()));
        }
        let count = self.state.lock().expect("state lock").entries[index].len() as u64;
        Ok(IndexStats {
            total_vectors: count,
            dimension: DIM,
            index_fullness: 0.0,
            namespaces: BTreeMap::from([(
                index.to_string(),
                NamespaceStats {
                    vector_count: count,
                },
            )]),
        })
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.index.name = "test-decks".to_string();
    config.index.batch_delay_ms = 0;
    config.index.ready_timeout_secs = 0;
    config
}

async fn connect(index: Arc<RecordingIndex>) -> VectorStore {
    VectorStore::connect(&test_config(), Arc::new(KeywordEmbedder), index)
        .await
        .expect("store should connect")
}

fn deck(company: &str, text: &str) -> Document {
    Document::new(text).with_metadata(COMPANY_NAME_KEY, company)
}

#[tokio::test]
async fn connect_creates_missing_index() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(Arc::clone(&index)).await;

    assert_eq!(store.index_name(), "test-decks");
    assert_eq!(index.create_calls.load(Ordering::SeqCst), 1);
    let description = index
        .describe_index("test-decks")
        .await
        .expect("describe should succeed")
        .expect("index should exist");
    assert_eq!(description.dimension, DIM);
    assert_eq!(description.metric, DistanceMetric::Cosine);
}

#[tokio::test]
async fn connect_reuses_existing_index() {
    let index = Arc::new(RecordingIndex::with_existing("test-decks", DIM));
    let _store = connect(Arc::clone(&index)).await;

    assert_eq!(index.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connect_fails_when_index_never_becomes_ready() {
    let index = Arc::new(RecordingIndex {
        never_ready: true,
        ..RecordingIndex::default()
    });

    let result = VectorStore::connect(&test_config(), Arc::new(KeywordEmbedder), index).await;
    assert!(matches!(result, Err(RagError::Index(_))));
}

#[tokio::test]
async fn add_documents_upserts_one_batch_per_hundred() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(Arc::clone(&index)).await;

    let documents: Vec<Document> = (0..250)
        .map(|i| deck("dropbox", &format!("cloud storage deck {}", i)))
        .collect();

    assert!(store.add_documents(&documents, 100).await);
    assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.stats().await.total_vectors, 250);
}

#[tokio::test]
async fn add_documents_reports_success_despite_failed_batch() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(Arc::clone(&index)).await;

    let documents: Vec<Document> = (0..250)
        .map(|i| {
            if i == 150 {
                deck("dropbox", "poison pill")
            } else {
                deck("dropbox", &format!("cloud storage deck {}", i))
            }
        })
        .collect();

    assert!(store.add_documents(&documents, 100).await);
    // the second batch fails to embed and never reaches the index
    assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 2);

    let ids = index.stored_ids("test-decks");
    assert_eq!(ids.len(), 150);
    assert!(ids.contains(&"doc_0_99".to_string()));
    assert!(ids.contains(&"doc_200_49".to_string()));
    assert!(!ids.iter().any(|id| id.starts_with("doc_100_")));
}

#[tokio::test]
async fn add_documents_isolates_small_failed_batches() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(Arc::clone(&index)).await;

    let documents = vec![
        deck("dropbox", "poison pill"),
        deck("dropbox", "cloud storage"),
        deck("beelinguapp", "language learning"),
        deck("airbnb", "travel lodging"),
    ];

    assert!(store.add_documents(&documents, 2).await);
    assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 1);
    assert_eq!(index.stored_ids("test-decks"), vec!["doc_2_0", "doc_2_1"]);
}

#[tokio::test]
async fn add_documents_with_empty_input_returns_false() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(Arc::clone(&index)).await;

    assert!(!store.add_documents(&[], 100).await);
    assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn add_documents_prefers_document_id_and_truncates_text() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(Arc::clone(&index)).await;

    let long_text = format!("storage {}", "x".repeat(2000));
    let documents = vec![
        deck("Dropbox", &long_text).with_metadata(DOCUMENT_ID_KEY, "dropbox_0"),
        deck("Uber", "travel"),
    ];

    assert!(store.add_documents(&documents, 100).await);
    assert_eq!(index.stored_ids("test-decks"), vec!["dropbox_0", "doc_0_1"]);

    let state = index.state.lock().expect("state lock");
    let stored = &state.entries["test-decks"][0];
    assert_eq!(stored.raw_text_preview.chars().count(), 1000);
    assert_eq!(
        stored.metadata.get(COMPANY_NAME_KEY),
        Some(&MetadataValue::from("dropbox"))
    );
}

#[tokio::test]
async fn duplicate_ids_in_one_batch_keep_the_last_document() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(Arc::clone(&index)).await;

    let documents = vec![
        deck("Dropbox", "storage v1").with_metadata(DOCUMENT_ID_KEY, "dropbox_0"),
        deck("Uber", "travel").with_metadata(DOCUMENT_ID_KEY, "uber_0"),
        deck("Dropbox", "storage v2").with_metadata(DOCUMENT_ID_KEY, "dropbox_0"),
    ];

    assert!(store.add_documents(&documents, 100).await);
    assert_eq!(index.upserted_entries.load(Ordering::SeqCst), 2);
    assert_eq!(index.stored_ids("test-decks"), vec!["dropbox_0", "uber_0"]);

    let state = index.state.lock().expect("state lock");
    assert_eq!(state.entries["test-decks"][0].raw_text_preview, "storage v2");
}

#[test]
fn dedupe_by_id_keeps_first_position() {
    let entry = |id: &str, text: &str| VectorEntry {
        id: id.to_string(),
        embedding: vec![1.0, 0.0, 0.0],
        metadata: Metadata::new(),
        raw_text_preview: text.to_string(),
    };

    let unique = dedupe_by_id(vec![
        entry("a", "first"),
        entry("b", "only"),
        entry("a", "second"),
        entry("a", "third"),
    ]);

    let summary: Vec<(&str, &str)> = unique
        .iter()
        .map(|e| (e.id.as_str(), e.raw_text_preview.as_str()))
        .collect();
    assert_eq!(summary, vec![("a", "third"), ("b", "only")]);
}

#[tokio::test]
async fn search_similar_orders_hits_and_respects_k() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(index).await;
    store
        .add_documents(
            &[
                deck("dropbox", "storage storage storage"),
                deck("beelinguapp", "language learning"),
                deck("airbnb", "travel with some storage"),
            ],
            100,
        )
        .await;

    let hits = store.search_similar("storage", 2, None).await;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].content, "storage storage storage");
    assert!(hits[0].score >= hits[1].score);

    assert!(store.search_similar("storage", 0, None).await.is_empty());
}

#[tokio::test]
async fn search_similar_returns_empty_on_embedding_failure() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(index).await;
    store
        .add_documents(&[deck("dropbox", "storage")], 100)
        .await;

    assert!(store.search_similar("poison", 5, None).await.is_empty());
}

#[tokio::test]
async fn company_lookup_is_case_insensitive() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(index).await;
    store
        .add_documents(
            &[
                deck("Beelinguapp", "language learning"),
                deck("dropbox", "storage"),
            ],
            100,
        )
        .await;

    let hits = store.search_by_company("BEELINGUAPP", 5).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "language learning");

    assert!(store.company_exists("Dropbox").await);
    assert!(!store.company_exists("NovaCloud").await);
}

#[tokio::test]
async fn stats_default_on_failure() {
    let index = Arc::new(RecordingIndex {
        fail_stats: true,
        ..RecordingIndex::default()
    });
    let store = connect(index).await;

    assert_eq!(store.stats().await, IndexStats::default());
}

#[tokio::test]
async fn delete_all_clears_index() {
    let index = Arc::new(RecordingIndex::default());
    let store = connect(index).await;
    store
        .add_documents(&[deck("dropbox", "storage")], 100)
        .await;

    assert!(store.delete_all().await);
    assert_eq!(store.stats().await.total_vectors, 0);
}

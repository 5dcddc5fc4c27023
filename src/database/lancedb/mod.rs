
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    DistanceMetric, IndexDescription, IndexMatch, IndexStats, MetadataFilter, NamespaceStats,
    VectorEntry, VectorIndex,
};
use crate::models::{COMPANY_NAME_KEY, Metadata, MetadataValue};
use crate::{RagError, Result};

const METRIC_SCHEMA_KEY: &str = "distance_metric";
/// Metadata keys stored as dedicated columns, and therefore filterable
const TEXT_FILTER_COLUMNS: [&str; 3] = [COMPANY_NAME_KEY, "file_name", "file_type"];
const NUMBER_FILTER_COLUMNS: [&str; 1] = ["chunk_index"];

/// Embedded LanceDB database where each table is one named index
pub struct LanceIndex {
    connection: Connection,
}

fn index_error(context: &str, e: impl std::fmt::Display) -> RagError {
    RagError::Index(format!("{}: {}", context, e))
}

impl LanceIndex {
    /// Open (or create) a LanceDB database in `db_path`
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        debug!("Opening LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Index(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| index_error("Failed to connect to LanceDB", e))?;

        info!("LanceDB opened at {:?}", db_path);
        Ok(Self { connection })
    }

    async fn open_table(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| index_error(&format!("Failed to open index '{}'", name), e))
    }

    fn create_schema(vector_dim: usize, metric: DistanceMetric) -> Arc<Schema> {
        let fields = vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new(COMPANY_NAME_KEY, DataType::Utf8, false),
            Field::new("file_name", DataType::Utf8, false),
            Field::new("file_type", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ];
        let schema_metadata = HashMap::from([(
            METRIC_SCHEMA_KEY.to_string(),
            metric.as_str().to_string(),
        )]);
        Arc::new(Schema::new_with_metadata(fields, schema_metadata))
    }

    fn vector_dimension(schema: &Schema) -> Option<usize> {
        schema.fields().iter().find_map(|field| {
            if field.name() != "vector" {
                return None;
            }
            match field.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            }
        })
    }

    fn create_record_batch(schema: Arc<Schema>, entries: &[VectorEntry]) -> Result<RecordBatch> {
        let vector_dim = Self::vector_dimension(&schema)
            .ok_or_else(|| RagError::Index("Index schema has no vector column".to_string()))?;
        let len = entries.len();
        let created_at = Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut company_names = Vec::with_capacity(len);
        let mut file_names = Vec::with_capacity(len);
        let mut file_types = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut metadata_json = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for entry in entries {
            if entry.embedding.len() != vector_dim {
                return Err(RagError::Index(format!(
                    "Vector '{}' has dimension {}, index expects {}",
                    entry.id,
                    entry.embedding.len(),
                    vector_dim
                )));
            }
            let text_field = |key: &str| {
                entry
                    .metadata
                    .get(key)
                    .map(ToString::to_string)
                    .unwrap_or_default()
            };

            ids.push(entry.id.clone());
            texts.push(entry.raw_text_preview.clone());
            company_names.push(text_field(COMPANY_NAME_KEY));
            file_names.push(text_field("file_name"));
            file_types.push(text_field("file_type"));
            chunk_indices.push(
                entry
                    .metadata
                    .get("chunk_index")
                    .and_then(MetadataValue::as_number)
                    .map_or(0, |index| index as u32),
            );
            metadata_json.push(
                serde_json::to_string(&entry.metadata)
                    .map_err(|e| index_error("Failed to serialize metadata", e))?,
            );
            flat_values.extend_from_slice(&entry.embedding);
        }

        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            vector_dim as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| index_error("Failed to create vector array", e))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(company_names)),
            Arc::new(StringArray::from(file_names)),
            Arc::new(StringArray::from(file_types)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(metadata_json)),
            Arc::new(StringArray::from(vec![created_at; len])),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| index_error("Failed to create record batch", e))
    }

    /// Translate an exact-match filter into a LanceDB predicate
    fn filter_predicate(filter: &MetadataFilter) -> Result<Option<String>> {
        let mut clauses = Vec::with_capacity(filter.len());

        for (key, value) in filter {
            let clause = match value {
                MetadataValue::Text(text) if TEXT_FILTER_COLUMNS.contains(&key.as_str()) => {
                    format!("{} = '{}'", key, text.replace('\'', "''"))
                }
                MetadataValue::Number(number)
                    if NUMBER_FILTER_COLUMNS.contains(&key.as_str()) =>
                {
                    format!("{} = {}", key, number)
                }
                _ => {
                    return Err(RagError::Index(format!(
                        "Unsupported filter on metadata key '{}'",
                        key
                    )));
                }
            };
            clauses.push(clause);
        }

        Ok((!clauses.is_empty()).then(|| clauses.join(" AND ")))
    }

    fn parse_matches(batch: &RecordBatch, metric: DistanceMetric) -> Result<Vec<IndexMatch>> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;
        let metadata_json = string_column(batch, "metadata")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut matches = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let metadata: Metadata = serde_json::from_str(metadata_json.value(row))
                .map_err(|e| index_error("Failed to parse stored metadata", e))?;
            let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            matches.push(IndexMatch {
                id: ids.value(row).to_string(),
                score: similarity_from_distance(distance, metric),
                text: texts.value(row).to_string(),
                metadata,
            });
        }

        Ok(matches)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Index(format!("Invalid {} column type", name)))
}

/// Convert a LanceDB distance into a higher-is-closer similarity
fn similarity_from_distance(distance: f32, metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Cosine => 1.0 - distance,
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
        DistanceMetric::DotProduct => -distance,
    }
}

fn lance_distance(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Euclidean => DistanceType::L2,
        DistanceMetric::DotProduct => DistanceType::Dot,
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| index_error("Failed to list indexes", e))
    }

    async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        info!(
            "Creating index '{}' with {} dimensions ({})",
            name,
            dimension,
            metric.as_str()
        );

        self.connection
            .create_empty_table(name, Self::create_schema(dimension, metric))
            .execute()
            .await
            .map_err(|e| index_error(&format!("Failed to create index '{}'", name), e))?;
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        if !self.list_indexes().await?.iter().any(|table| table == name) {
            return Ok(None);
        }

        let schema = self
            .open_table(name)
            .await?
            .schema()
            .await
            .map_err(|e| index_error("Failed to read index schema", e))?;

        let dimension = Self::vector_dimension(&schema)
            .ok_or_else(|| RagError::Index(format!("Index '{}' has no vector column", name)))?;
        let metric = schema
            .metadata()
            .get(METRIC_SCHEMA_KEY)
            .and_then(|value| DistanceMetric::parse(value))
            .unwrap_or_default();

        Ok(Some(IndexDescription {
            name: name.to_string(),
            dimension,
            metric,
            ready: true,
        }))
    }

    async fn upsert(&self, index: &str, entries: Vec<VectorEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let table = self.open_table(index).await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| index_error("Failed to read index schema", e))?;
        let record_batch = Self::create_record_batch(schema.clone(), &entries)?;
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| index_error("Failed to upsert vectors", e))?;

        debug!("Upserted {} vectors into '{}'", entries.len(), index);
        Ok(entries.len())
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        let metric = match self.describe_index(index).await? {
            Some(description) => description.metric,
            None => return Err(RagError::Index(format!("Index '{}' does not exist", index))),
        };
        let predicate = filter.map(Self::filter_predicate).transpose()?.flatten();

        let table = self.open_table(index).await?;
        let mut query = table
            .vector_search(vector)
            .map_err(|e| index_error("Failed to create vector search", e))?
            .column("vector")
            .distance_type(lance_distance(metric))
            .limit(top_k);

        if let Some(predicate) = predicate {
            debug!("Applying filter: {}", predicate);
            query = query.only_if(predicate);
        }

        let mut results = query
            .execute()
            .await
            .map_err(|e| index_error("Failed to execute search", e))?;

        let mut matches = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| index_error("Failed to read result stream", e))?
        {
            matches.extend(Self::parse_matches(&batch, metric)?);
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        self.open_table(index)
            .await?
            .delete("true")
            .await
            .map_err(|e| index_error("Failed to delete vectors", e))?;
        Ok(())
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        let description = self
            .describe_index(index)
            .await?
            .ok_or_else(|| RagError::Index(format!("Index '{}' does not exist", index)))?;

        let count = self
            .open_table(index)
            .await?
            .count_rows(None)
            .await
            .map_err(|e| index_error("Failed to count rows", e))? as u64;

        if description.metric != DistanceMetric::Cosine {
            warn!("Index '{}' uses {} distance", index, description.metric.as_str());
        }

        Ok(IndexStats {
            total_vectors: count,
            dimension: description.dimension,
            // Local tables have no capacity limit
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

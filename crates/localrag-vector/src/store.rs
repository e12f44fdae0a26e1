//! Durable snapshots of a built index in LanceDB.
//!
//! Each snapshot is its own table named `{prefix}_{version[..16]}`; a key/value
//! meta table holds the `active_index` pointer, which is flipped only after the
//! snapshot has been written completely. The meta table also records, per
//! snapshot table, the `embedder_id` that produced its vectors.

use std::path::Path;
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;

use localrag_core::error::{Error, Result};
use localrag_core::types::{Chunk, IndexEntry, SourceMeta};

use crate::index::VectorIndex;
use crate::schema::build_snapshot_schema;
use crate::table::{arrow_err, get_meta, open_db, set_meta, store_err, table_exists};

pub const META_TABLE: &str = "meta";
pub const ACTIVE_INDEX_KEY: &str = "active_index";
const EMBEDDER_KEY_PREFIX: &str = "embedder:";
const WRITE_BATCH_ROWS: usize = 1000;

pub struct IndexStore {
    conn: Connection,
    prefix: String,
}

impl IndexStore {
    pub async fn open(dir: &Path, table_prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = open_db(&dir.to_string_lossy()).await?;
        Ok(Self { conn, prefix: table_prefix.to_string() })
    }

    pub fn table_name(&self, version: &str) -> String {
        let short: String = version.chars().take(16).collect();
        format!("{}_{}", self.prefix, short)
    }

    /// Persist `index` and make it the active snapshot. Saving a version that
    /// already exists only moves the pointer.
    pub async fn save(&self, index: &VectorIndex) -> Result<String> {
        if index.is_empty() {
            return Err(Error::store("refusing to persist an empty index"));
        }
        if index.embedder_id().is_empty() {
            return Err(Error::store("refusing to persist an index with no embedder id"));
        }
        let name = self.table_name(index.version());
        if table_exists(&self.conn, &name).await? {
            tracing::info!(table = %name, "snapshot already stored");
        } else {
            let dim = i32::try_from(index.dim()).map_err(|_| Error::store(format!("dimension {} too large", index.dim())))?;
            let schema = build_snapshot_schema(dim);
            let batches = index
                .entries()
                .chunks(WRITE_BATCH_ROWS)
                .enumerate()
                .map(|(n, rows)| entries_to_record_batch(rows, n * WRITE_BATCH_ROWS, dim))
                .collect::<Result<Vec<_>>>()?;
            let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);
            self.conn
                .create_table(&name, Box::new(reader))
                .execute()
                .await
                .map_err(store_err("write snapshot"))?;
            tracing::info!(table = %name, entries = index.len(), dim = index.dim(), "snapshot written");
        }
        set_meta(&self.conn, META_TABLE, &embedder_key(&name), index.embedder_id()).await?;
        set_meta(&self.conn, META_TABLE, ACTIVE_INDEX_KEY, index.version()).await?;
        Ok(name)
    }

    pub async fn active_version(&self) -> Result<Option<String>> {
        get_meta(&self.conn, META_TABLE, ACTIVE_INDEX_KEY).await
    }

    /// Restore the active snapshot, or `None` if nothing was ever saved.
    pub async fn load_active(&self) -> Result<Option<VectorIndex>> {
        match self.active_version().await? {
            Some(version) => Ok(Some(self.load(&version).await?)),
            None => Ok(None),
        }
    }

    pub async fn load(&self, version: &str) -> Result<VectorIndex> {
        let name = self.table_name(version);
        let embedder_id = get_meta(&self.conn, META_TABLE, &embedder_key(&name))
            .await?
            .ok_or_else(|| Error::store(format!("snapshot {} does not record its embedder; re-run ingest", name)))?;
        let table = self.conn.open_table(&name).execute().await.map_err(store_err("open snapshot"))?;
        let rows = table.count_rows(None).await.map_err(store_err("count snapshot rows"))?;
        let mut stream = table.query().limit(rows.max(1)).execute().await.map_err(store_err("scan snapshot"))?;

        let mut positioned: Vec<(i64, IndexEntry)> = Vec::with_capacity(rows);
        let mut dim = 0usize;
        while let Some(batch) = stream.try_next().await.map_err(store_err("scan snapshot"))? {
            dim = read_batch(&batch, &mut positioned)?.unwrap_or(dim);
        }
        positioned.sort_by_key(|(pos, _)| *pos);
        let entries: Vec<IndexEntry> = positioned.into_iter().map(|(_, e)| e).collect();
        tracing::info!(table = %name, entries = entries.len(), dim, embedder = %embedder_id, "snapshot loaded");
        Ok(VectorIndex::build(version, dim, entries)?.with_embedder(embedder_id))
    }
}

fn embedder_key(table: &str) -> String {
    format!("{}{}", EMBEDDER_KEY_PREFIX, table)
}

fn entries_to_record_batch(rows: &[IndexEntry], first_position: usize, dim: i32) -> Result<RecordBatch> {
    let positions: Vec<i64> = (first_position..first_position + rows.len()).map(|p| p as i64).collect();
    let vectors = rows.iter().map(|e| Some(e.embedding.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    RecordBatch::try_new(
        build_snapshot_schema(dim),
        vec![
            Arc::new(Int64Array::from(positions)),
            Arc::new(StringArray::from(rows.iter().map(|e| e.chunk.id.clone()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|e| e.chunk.doc_id.clone()).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|e| e.chunk.sequence as i64).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|e| e.chunk.start as i64).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|e| e.chunk.end as i64).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|e| e.chunk.text.clone()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|e| e.meta.title.clone()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|e| e.meta.path.clone()).collect::<Vec<_>>())),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
        ],
    )
    .map_err(arrow_err)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::store(format!("snapshot column '{}' missing or mistyped", name)))
}

fn to_usize(v: i64, name: &str) -> Result<usize> {
    usize::try_from(v).map_err(|_| Error::store(format!("negative {} in snapshot", name)))
}

fn optional(col: &StringArray, row: usize) -> Option<String> {
    if col.is_null(row) { None } else { Some(col.value(row).to_string()) }
}

/// Append the rows of one batch; returns the vector width if the batch had rows.
fn read_batch(batch: &RecordBatch, out: &mut Vec<(i64, IndexEntry)>) -> Result<Option<usize>> {
    if batch.num_rows() == 0 {
        return Ok(None);
    }
    let position = column::<Int64Array>(batch, "position")?;
    let id = column::<StringArray>(batch, "id")?;
    let doc_id = column::<StringArray>(batch, "doc_id")?;
    let sequence = column::<Int64Array>(batch, "sequence")?;
    let start = column::<Int64Array>(batch, "start")?;
    let end = column::<Int64Array>(batch, "end")?;
    let text = column::<StringArray>(batch, "text")?;
    let title = column::<StringArray>(batch, "title")?;
    let path = column::<StringArray>(batch, "path")?;
    let vector = column::<FixedSizeListArray>(batch, "vector")?;

    for row in 0..batch.num_rows() {
        let values = vector.value(row);
        let floats = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| Error::store("snapshot vector is not float32"))?;
        out.push((
            position.value(row),
            IndexEntry {
                chunk: Chunk {
                    id: id.value(row).to_string(),
                    doc_id: doc_id.value(row).to_string(),
                    sequence: to_usize(sequence.value(row), "sequence")?,
                    start: to_usize(start.value(row), "start")?,
                    end: to_usize(end.value(row), "end")?,
                    text: text.value(row).to_string(),
                },
                embedding: floats.values().to_vec(),
                meta: SourceMeta { title: optional(title, row), path: optional(path, row) },
            },
        ));
    }
    Ok(Some(vector.value_length() as usize))
}

//! LanceDB connection and housekeeping helpers.
//!
//! Provides the database open function, an ensure-table helper, and a simple
//! key/value metadata table used to store pointers such as the active index.

use std::fmt::Display;
use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use localrag_core::error::{Error, Result};

use crate::schema::build_meta_schema;

pub(crate) fn store_err<E: Display>(context: &str) -> impl Fn(E) -> Error + '_ {
    move |e| Error::store(format!("{}: {}", context, e))
}

pub(crate) fn arrow_err<E: Display>(e: E) -> Error {
    Error::store(format!("arrow: {}", e))
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(store_err("connect"))
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(store_err("list tables"))?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await.map_err(store_err("create table"))?;
    Ok(())
}

pub async fn set_meta(conn: &Connection, table: &str, key: &str, value: &str) -> Result<()> {
    ensure_table(conn, table, build_meta_schema()).await?;
    let t = conn.open_table(table).execute().await.map_err(store_err("open meta"))?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )
    .map_err(arrow_err)?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    // Upsert: key is unique
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await.map_err(store_err("write meta"))?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, table).await? {
        return Ok(None);
    }
    let t = conn.open_table(table).execute().await.map_err(store_err("open meta"))?;
    let mut stream = t
        .query()
        .only_if(format!("key = '{}'", key.replace('\'', "''")))
        .execute()
        .await
        .map_err(store_err("read meta"))?;
    while let Some(batch) = stream.try_next().await.map_err(store_err("read meta"))? {
        if batch.num_rows() == 0 {
            continue;
        }
        let val = batch
            .column_by_name("value")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::store("meta.value column missing"))?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}

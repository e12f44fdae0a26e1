use localrag_core::types::{chunk_id, Chunk, IndexEntry, SourceMeta};
use localrag_vector::{IndexStore, VectorIndex};
use tempfile::TempDir;

fn sample_entries() -> Vec<IndexEntry> {
    let vectors = [[1.0f32, 0.0, 0.0], [0.6, 0.8, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| IndexEntry {
            chunk: Chunk { id: chunk_id("manual.txt", i), doc_id: "manual.txt".into(), sequence: i, start: i * 10, end: i * 10 + 12, text: format!("passage {i}") },
            embedding: v.to_vec(),
            meta: SourceMeta {
                title: Some("manual".into()),
                path: if i % 2 == 0 { Some("/corpus/manual.txt".into()) } else { None },
            },
        })
        .collect()
}

#[tokio::test]
async fn save_then_load_reproduces_rankings() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path(), "chunks").await.expect("store");
    assert!(store.load_active().await.expect("load").is_none(), "nothing saved yet");

    let original = VectorIndex::build("0123456789abcdef0123", 3, sample_entries()).expect("index").with_embedder("test:d3");
    let table = store.save(&original).await.expect("save");
    assert_eq!(table, "chunks_0123456789abcdef");
    assert_eq!(store.active_version().await.expect("meta").as_deref(), Some("0123456789abcdef0123"));

    let reloaded = store.load_active().await.expect("load").expect("active snapshot");
    assert_eq!(reloaded.version(), original.version());
    assert_eq!(reloaded.dim(), 3);
    assert_eq!(reloaded.embedder_id(), "test:d3");
    assert_eq!(reloaded.entries(), original.entries());

    for q in [[1.0f32, 0.0, 0.0], [0.0, 1.0, 0.0], [0.2, 0.1, 0.9]] {
        assert_eq!(reloaded.query(&q, 4).unwrap(), original.query(&q, 4).unwrap());
    }
    // exact tie between entries 0 and 2 keeps insertion order after reload
    let top = reloaded.query(&[1.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(top[0].chunk.id, "manual.txt:0");
    assert_eq!(top[1].chunk.id, "manual.txt:2");
}

#[tokio::test]
async fn newer_save_moves_the_active_pointer() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path(), "chunks").await.expect("store");

    store.save(&VectorIndex::build("aaaaaaaaaaaaaaaa01", 3, sample_entries()).unwrap().with_embedder("test:d3")).await.expect("save v1");
    let mut fewer = sample_entries();
    fewer.truncate(1);
    store.save(&VectorIndex::build("bbbbbbbbbbbbbbbb02", 3, fewer).unwrap().with_embedder("test:d3")).await.expect("save v2");

    let active = store.load_active().await.expect("load").expect("snapshot");
    assert_eq!(active.version(), "bbbbbbbbbbbbbbbb02");
    assert_eq!(active.len(), 1);

    // re-saving an existing version only flips the pointer back
    store.save(&VectorIndex::build("aaaaaaaaaaaaaaaa01", 3, sample_entries()).unwrap().with_embedder("test:d3")).await.expect("resave");
    assert_eq!(store.load_active().await.unwrap().unwrap().len(), 4);
}

#[tokio::test]
async fn empty_index_is_not_persisted() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path(), "chunks").await.expect("store");
    assert!(store.save(&VectorIndex::empty()).await.is_err());
}

#[tokio::test]
async fn index_without_embedder_id_is_not_persisted() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path(), "chunks").await.expect("store");
    let untagged = VectorIndex::build("cccccccccccccccc03", 3, sample_entries()).unwrap();
    assert!(store.save(&untagged).await.is_err());
    assert!(store.active_version().await.expect("meta").is_none());
}

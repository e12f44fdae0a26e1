use std::sync::atomic::{AtomicBool, Ordering};

use localrag_core::types::{chunk_id, Chunk, IndexEntry, SourceMeta};
use localrag_vector::SharedIndex;

fn generation(tag: &str, n: usize) -> Vec<IndexEntry> {
    (0..n)
        .map(|i| IndexEntry {
            chunk: Chunk { id: chunk_id(tag, i), doc_id: tag.to_string(), sequence: i, start: 0, end: 1, text: tag.to_string() },
            embedding: vec![1.0, (i as f32) * 0.01],
            meta: SourceMeta::default(),
        })
        .collect()
}

#[test]
fn queries_during_rebuilds_see_one_whole_generation() {
    let shared = SharedIndex::new();
    shared.build("gen-a", 2, generation("a", 50)).expect("initial");
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let snap = shared.snapshot();
                    let hits = snap.query(&[1.0, 0.0], 50).expect("query");
                    let expected_len = if snap.version() == "gen-a" { 50 } else { 20 };
                    assert_eq!(hits.len(), expected_len, "partial index observed");
                    let tag = &hits[0].chunk.doc_id;
                    assert!(hits.iter().all(|h| &h.chunk.doc_id == tag), "mixed generations observed");
                }
            });
        }
        s.spawn(|| {
            for round in 0..200 {
                let (version, tag, n) = if round % 2 == 0 { ("gen-b", "b", 20) } else { ("gen-a", "a", 50) };
                shared.build(version, 2, generation(tag, n)).expect("rebuild");
            }
            done.store(true, Ordering::Release);
        });
    });

    assert_eq!(shared.snapshot().version(), "gen-a");
}

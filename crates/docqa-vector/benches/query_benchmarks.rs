//! Query latency over a populated chunk index.
//!
//! Uses 2,000 chunks by default. Set `BENCH_FULL_SCALE=1` for 50,000.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use docqa_core::types::NewChunk;
use docqa_vector::{ChunkIndex, EmbeddingEngine, HashEmbedding};

const CI_CHUNK_COUNT: usize = 2_000;
const FULL_SCALE_CHUNK_COUNT: usize = 50_000;

fn chunk_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_CHUNK_COUNT
    } else {
        CI_CHUNK_COUNT
    }
}

fn chunk_text(i: usize) -> String {
    format!(
        "Section {} discusses ownership, borrowing and lifetimes in systems code. \
         The borrow checker rejects aliasing mutable references at compile time.",
        i
    )
}

fn bench_query(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = Arc::new(HashEmbedding::new());
    let index = ChunkIndex::new(dir.path().join("index.json"), embedder.clone());

    let count = chunk_count();
    let chunks: Vec<NewChunk> = (0..count)
        .map(|i| NewChunk::new(chunk_text(i), format!("/books/doc-{}.pdf", i % 100), 0, i as u32))
        .collect();
    rt.block_on(index.add(chunks)).expect("populate index");

    let query = rt
        .block_on(embedder.embed_one("how does the borrow checker treat mutable references"))
        .expect("embed query");

    c.bench_function(&format!("chunk_index_query_top3_{}", count), |b| {
        b.iter(|| rt.block_on(index.query(&query, 3)).expect("query"))
    });
}

criterion_group!(benches, bench_query);
criterion_main!(benches);

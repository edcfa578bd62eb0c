//! Nearest-neighbour scoring over an index snapshot.

use docqa_core::types::Chunk;

/// Scores candidate chunks against a query vector.
///
/// Implementations return `(position, score)` pairs where `position` indexes
/// into `candidates`. Higher scores are better. Ordering and truncation are
/// applied by the caller.
pub trait VectorSearch: Send + Sync {
    fn score(&self, query: &[f32], candidates: &[Chunk]) -> Vec<(usize, f32)>;
}

/// Exhaustive cosine similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSearch;

impl VectorSearch for CosineSearch {
    fn score(&self, query: &[f32], candidates: &[Chunk]) -> Vec<(usize, f32)> {
        candidates
            .iter()
            .enumerate()
            .map(|(position, chunk)| (position, cosine_similarity(query, &chunk.embedding) as f32))
            .collect()
    }
}

/// Cosine similarity between two vectors. 0.0 on length mismatch or a zero
/// vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::ChunkMetadata;
    use uuid::Uuid;

    fn chunk(embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            embedding,
            content: String::new(),
            metadata: ChunkMetadata {
                source: "s".to_string(),
                page: 0,
                ordinal: 0,
            },
        }
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_score_keeps_positions() {
        let candidates = vec![chunk(vec![0.0, 1.0]), chunk(vec![1.0, 0.0])];
        let scores = CosineSearch.score(&[1.0, 0.0], &candidates);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].0, 0);
        assert!(scores[1].1 > scores[0].1);
    }
}

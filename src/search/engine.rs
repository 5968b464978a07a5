//! Brute-force cosine search over the merged index.

use rayon::prelude::*;
use serde::Serialize;

use super::index::CorpusIndex;
use super::topk::select_top_k;
use crate::encoder::BatchEncoder;
use crate::error::{PipelineError, PipelineResult};
use crate::vector::dot;

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    /// 1-based rank.
    pub rank: usize,
    pub document_id: String,
    /// Cosine similarity of the unit-norm query and document vectors.
    pub score: f32,
}

/// Embeds queries and ranks every indexed document against them.
pub struct QueryEngine<'a> {
    encoder: &'a dyn BatchEncoder,
    index: &'a CorpusIndex,
}

impl<'a> QueryEngine<'a> {
    /// Fails if the encoder and index disagree on dimension.
    pub fn new(encoder: &'a dyn BatchEncoder, index: &'a CorpusIndex) -> PipelineResult<Self> {
        let expected = index.vectors().dimension().get();
        let actual = encoder.dimension().get();
        if expected != actual {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual,
                context: format!("query encoder '{}' against index", encoder.model_name()),
            });
        }
        Ok(Self { encoder, index })
    }

    /// Top `top_k` documents for `query`, best first.
    pub fn search(&self, query: &str, top_k: usize) -> PipelineResult<Vec<QueryHit>> {
        if self.index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.encoder.encode_one(query)?;
        self.search_vector(&query_vector, top_k)
    }

    /// Top `top_k` documents for an already encoded query.
    pub fn search_vector(&self, query: &[f32], top_k: usize) -> PipelineResult<Vec<QueryHit>> {
        let vectors = self.index.vectors();
        if query.len() != vectors.dimension().get() {
            return Err(PipelineError::DimensionMismatch {
                expected: vectors.dimension().get(),
                actual: query.len(),
                context: "query vector".to_string(),
            });
        }

        let scores: Vec<f32> = vectors
            .as_slice()
            .par_chunks_exact(vectors.dimension().get())
            .map(|row| dot(query, row))
            .collect();

        let ids = self.index.ids();
        Ok(select_top_k(&scores, top_k)
            .into_iter()
            .enumerate()
            .map(|(position, (row, score))| QueryHit {
                rank: position + 1,
                document_id: ids[row].clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::hashing_encoder;
    use crate::vector::{VectorDimension, VectorMatrix};

    fn unit_index() -> CorpusIndex {
        let rows = vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![0.0, 1.0]];
        CorpusIndex::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            VectorMatrix::from_rows(VectorDimension::new(2).unwrap(), rows).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_search_vector_ranks_by_cosine() {
        let index = unit_index();
        let encoder = hashing_encoder(VectorDimension::new(2).unwrap(), 512).unwrap();
        let engine = QueryEngine::new(&encoder, &index).unwrap();

        let hits = engine.search_vector(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[0].document_id, "a");
        assert_eq!(hits[1].document_id, "b");
        assert!((hits[1].score - 0.6).abs() < 1e-6);

        let all = engine.search_vector(&[0.0, 1.0], 1000).unwrap();
        let ids: Vec<&str> = all.iter().map(|h| h.document_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(
            all.iter().map(|h| h.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = unit_index();
        let encoder = hashing_encoder(VectorDimension::new(3).unwrap(), 512).unwrap();
        assert!(matches!(
            QueryEngine::new(&encoder, &index),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_index() {
        let index = CorpusIndex::new(
            Vec::new(),
            VectorMatrix::new(VectorDimension::new(4).unwrap()),
        )
        .unwrap();
        let encoder = hashing_encoder(VectorDimension::new(4).unwrap(), 512).unwrap();
        let engine = QueryEngine::new(&encoder, &index).unwrap();
        assert!(engine.search("anything", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_finds_identical_text() {
        let encoder = hashing_encoder(VectorDimension::new(32).unwrap(), 512).unwrap();
        let texts = ["cats", "dogs", "birds"];
        let vectors = encoder.encode_batch(&texts).unwrap();
        let index = CorpusIndex::new(
            vec!["d1".to_string(), "d2".to_string(), "d3".to_string()],
            VectorMatrix::from_rows(encoder.dimension(), vectors).unwrap(),
        )
        .unwrap();

        let engine = QueryEngine::new(&encoder, &index).unwrap();
        let hits = engine.search("dogs", 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "d2");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }
}

// Query side: load a persisted snapshot once, then answer ranked similarity
// queries against it. Engines are read-only after load; a rebuild only
// affects engines constructed afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::embedding::{encode_file, EmbeddingGateway};
use crate::error::{EmbedError, SearchError};
use crate::index::VectorIndex;
use crate::store::IndexStore;

/// One ranked hit. `distance` is the raw squared-L2 ranking metric;
/// `similarity` is a per-query display percentage derived from the returned
/// result set and is never persisted or cached.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub path: PathBuf,
    pub distance: f32,
    pub similarity: f32,
}

pub struct SearchEngine {
    gateway: Arc<dyn EmbeddingGateway>,
    index: VectorIndex,
    paths: Vec<PathBuf>,
    max_image_dim: u32,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("index", &self.index)
            .field("paths", &self.paths)
            .field("max_image_dim", &self.max_image_dim)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    /// Construct from the persisted snapshot. A missing or corrupt snapshot
    /// is reported as `IndexUnavailable` rather than an opaque error.
    pub fn load(
        store: &IndexStore,
        gateway: Arc<dyn EmbeddingGateway>,
        max_image_dim: u32,
    ) -> Result<Self, SearchError> {
        let (index, paths) = store.load().map_err(SearchError::IndexUnavailable)?;
        log::info!("loaded index snapshot: {} images", paths.len());
        Ok(Self {
            gateway,
            index,
            paths,
            max_image_dim,
        })
    }

    pub fn indexed_count(&self) -> usize {
        self.paths.len()
    }

    /// Find the images most similar to the one at `query_path`, nearest
    /// first. `k` defaults to the whole corpus. The query image itself is
    /// excluded from the results, compared on resolved paths so relative and
    /// absolute spellings of the same file still match.
    pub fn search(
        &self,
        query_path: &Path,
        k: Option<usize>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let k = k.unwrap_or(self.paths.len());
        let query = encode_file(self.gateway.as_ref(), query_path, self.max_image_dim)?;
        if query.len() != self.index.dimension() {
            return Err(SearchError::Embed(EmbedError::Provider(format!(
                "query embedding dimension {} does not match index dimension {}",
                query.len(),
                self.index.dimension()
            ))));
        }

        let query_resolved = resolve(query_path);
        let mut results: Vec<SearchResult> = Vec::new();
        for hit in self.index.search(&query, k) {
            let path = &self.paths[hit.id];
            if resolve(path) == query_resolved {
                continue;
            }
            results.push(SearchResult {
                path: path.clone(),
                distance: hit.distance,
                similarity: 0.0,
            });
        }

        apply_similarity(&mut results);
        Ok(results)
    }
}

fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Min-max scale distances into display percentages over the returned set.
/// Results arrive sorted ascending, so the first and last entries bound the
/// range. A degenerate range (including a single result) maps to 100.
fn apply_similarity(results: &mut [SearchResult]) {
    let (Some(first), Some(last)) = (results.first(), results.last()) else {
        return;
    };
    let min = first.distance;
    let range = last.distance - min;
    for result in results.iter_mut() {
        result.similarity = if range == 0.0 {
            100.0
        } else {
            (100.0 - (result.distance - min) / range * 100.0).clamp(0.0, 100.0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::testutil::{write_png, PixelGateway};

    fn engine_over(
        data_dir: &Path,
        index: VectorIndex,
        paths: Vec<PathBuf>,
    ) -> SearchEngine {
        let store = IndexStore::new(data_dir);
        store.persist(&index, &paths).unwrap();
        SearchEngine::load(&store, Arc::new(PixelGateway), 1024).unwrap()
    }

    #[test]
    fn results_are_ranked_by_ascending_distance() {
        let corpus = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();

        // Corpus embeddings [0,0], [1,1], [10,10]; query embeds to [0.9,0.9].
        let img1 = corpus.path().join("img1.png");
        let img2 = corpus.path().join("img2.png");
        let img3 = corpus.path().join("img3.png");
        write_png(&img1, 0);
        write_png(&img2, 10);
        write_png(&img3, 100);
        let query = corpus.path().join("query.png");
        write_png(&query, 9);

        let mut index = VectorIndex::new(2);
        index.add(&[0.0, 0.0]);
        index.add(&[1.0, 1.0]);
        index.add(&[10.0, 10.0]);
        let engine = engine_over(
            data.path(),
            index,
            vec![img1.clone(), img2.clone(), img3.clone()],
        );

        let results = engine.search(&query, None).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].path, img2);
        assert_eq!(results[1].path, img1);
        assert_eq!(results[2].path, img3);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn self_match_is_excluded_even_through_an_unresolved_path() {
        let corpus = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let a = corpus.path().join("a.png");
        let b = corpus.path().join("b.png");
        write_png(&a, 10);
        write_png(&b, 20);

        let mut index = VectorIndex::new(2);
        index.add(&[1.0, 1.0]);
        index.add(&[2.0, 2.0]);
        let engine = engine_over(data.path(), index, vec![a.clone(), b.clone()]);

        // Same file, spelled with a detour through the parent directory.
        let corpus_name = corpus.path().file_name().unwrap();
        let detoured = corpus
            .path()
            .join("..")
            .join(corpus_name)
            .join("a.png");
        let results = engine.search(&detoured, None).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, b);
    }

    #[test]
    fn single_result_normalizes_to_full_similarity() {
        let corpus = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let a = corpus.path().join("a.png");
        write_png(&a, 10);
        let query = corpus.path().join("query.png");
        write_png(&query, 30);

        let mut index = VectorIndex::new(2);
        index.add(&[1.0, 1.0]);
        let engine = engine_over(data.path(), index, vec![a]);

        let results = engine.search(&query, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].similarity, 100.0);
    }

    #[test]
    fn equal_distances_all_normalize_to_full_similarity() {
        let corpus = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let a = corpus.path().join("a.png");
        let b = corpus.path().join("b.png");
        write_png(&a, 10);
        write_png(&b, 20);
        let query = corpus.path().join("query.png");
        write_png(&query, 0);

        // Both entries sit at the same distance from any query.
        let mut index = VectorIndex::new(2);
        index.add(&[3.0, 4.0]);
        index.add(&[4.0, 3.0]);
        let engine = engine_over(data.path(), index, vec![a, b]);

        let results = engine.search(&query, None).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.similarity == 100.0));
    }

    #[test]
    fn similarity_spans_the_returned_set() {
        let corpus = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let p = corpus.path().join(format!("img{i}.png"));
                write_png(&p, 200 + i as u8);
                p
            })
            .collect();
        let query = corpus.path().join("query.png");
        write_png(&query, 10); // embeds to [1, 1]

        // Distances from [1,1]: 0, 1, 25.
        let mut index = VectorIndex::new(2);
        index.add(&[1.0, 1.0]);
        index.add(&[1.0, 2.0]);
        index.add(&[4.0, 5.0]);
        let engine = engine_over(data.path(), index, paths);

        let results = engine.search(&query, None).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].similarity, 100.0);
        assert!((results[1].similarity - 96.0).abs() < 1e-3);
        assert_eq!(results[2].similarity, 0.0);
    }

    #[test]
    fn k_limits_the_result_set() {
        let corpus = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| {
                let p = corpus.path().join(format!("img{i}.png"));
                write_png(&p, 100 + i as u8);
                p
            })
            .collect();
        let query = corpus.path().join("query.png");
        write_png(&query, 0);

        let mut index = VectorIndex::new(2);
        for i in 0..4 {
            index.add(&[i as f32, i as f32]);
        }
        let engine = engine_over(data.path(), index, paths);

        let results = engine.search(&query, Some(2)).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn missing_snapshot_is_index_unavailable() {
        let data = tempfile::tempdir().unwrap();
        let store = IndexStore::new(data.path());
        let err = SearchEngine::load(&store, Arc::new(PixelGateway), 1024).unwrap_err();
        assert!(matches!(
            err,
            SearchError::IndexUnavailable(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn corrupt_snapshot_is_index_unavailable() {
        let data = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("vectors.bin"), b"junk").unwrap();
        std::fs::write(data.path().join("image_paths.json"), b"[]").unwrap();

        let store = IndexStore::new(data.path());
        let err = SearchEngine::load(&store, Arc::new(PixelGateway), 1024).unwrap_err();
        assert!(matches!(
            err,
            SearchError::IndexUnavailable(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn unreadable_query_propagates_the_embed_error() {
        let corpus = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let a = corpus.path().join("a.png");
        write_png(&a, 10);

        let mut index = VectorIndex::new(2);
        index.add(&[1.0, 1.0]);
        let engine = engine_over(data.path(), index, vec![a]);

        let err = engine
            .search(&corpus.path().join("nope.png"), None)
            .unwrap_err();
        assert!(matches!(err, SearchError::Embed(EmbedError::Decode(_))));
    }
}

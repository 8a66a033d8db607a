// Snapshot persistence: two co-located artifacts, written together and read
// together. `vectors.bin` holds the serialized index, `image_paths.json` the
// ordered path list; position aligns the two.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::index::VectorIndex;

const VECTORS_FILE: &str = "vectors.bin";
const PATHS_FILE: &str = "image_paths.json";

/// On-disk statistics for the current snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStats {
    pub indexed: usize,
    pub dimension: usize,
    pub vectors_bytes: u64,
    pub paths_bytes: u64,
}

/// Reads and writes index snapshots under one directory. Each successful
/// build replaces the snapshot wholesale.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    fn paths_path(&self) -> PathBuf {
        self.dir.join(PATHS_FILE)
    }

    /// Whether both snapshot artifacts are present.
    pub fn exists(&self) -> bool {
        self.vectors_path().exists() && self.paths_path().exists()
    }

    /// Persist a snapshot, replacing any previous one. Both artifacts are
    /// written to temporary siblings first and swapped into place with
    /// `rename`, so a failure partway never leaves a readable half-written
    /// artifact; a crash between the two renames surfaces as a count
    /// disagreement at load time.
    pub fn persist(&self, index: &VectorIndex, paths: &[PathBuf]) -> Result<(), StoreError> {
        if index.len() != paths.len() {
            return Err(StoreError::Corrupt(format!(
                "refusing to persist {} vectors against {} paths",
                index.len(),
                paths.len()
            )));
        }

        fs::create_dir_all(&self.dir)?;

        let vector_bytes = bincode::serialize(index)
            .map_err(|e| StoreError::Corrupt(format!("failed to encode vector store: {e}")))?;
        let path_bytes = serde_json::to_vec_pretty(&paths)
            .map_err(|e| StoreError::Corrupt(format!("failed to encode path list: {e}")))?;

        let vectors_tmp = self.dir.join(format!("{VECTORS_FILE}.tmp"));
        let paths_tmp = self.dir.join(format!("{PATHS_FILE}.tmp"));
        fs::write(&vectors_tmp, &vector_bytes)?;
        fs::write(&paths_tmp, &path_bytes)?;
        fs::rename(&vectors_tmp, self.vectors_path())?;
        fs::rename(&paths_tmp, self.paths_path())?;

        log::info!(
            "persisted snapshot: {} vectors, {} in {}",
            index.len(),
            paths.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Load the snapshot back as the exact (index, paths) pair that was
    /// saved. Either artifact missing is `NotFound`; unreadable, malformed,
    /// or count-mismatched artifacts are `Corrupt`.
    pub fn load(&self) -> Result<(VectorIndex, Vec<PathBuf>), StoreError> {
        let vectors_path = self.vectors_path();
        let paths_path = self.paths_path();
        if !vectors_path.exists() || !paths_path.exists() {
            return Err(StoreError::NotFound(self.dir.clone()));
        }

        let vector_bytes = fs::read(&vectors_path)
            .map_err(|e| StoreError::Corrupt(format!("vector store unreadable: {e}")))?;
        let index: VectorIndex = bincode::deserialize(&vector_bytes)
            .map_err(|e| StoreError::Corrupt(format!("vector store malformed: {e}")))?;

        let path_bytes = fs::read(&paths_path)
            .map_err(|e| StoreError::Corrupt(format!("path list unreadable: {e}")))?;
        let paths: Vec<PathBuf> = serde_json::from_slice(&path_bytes)
            .map_err(|e| StoreError::Corrupt(format!("path list malformed: {e}")))?;

        if index.len() != paths.len() {
            return Err(StoreError::Corrupt(format!(
                "vector count {} disagrees with path count {}",
                index.len(),
                paths.len()
            )));
        }

        Ok((index, paths))
    }

    pub fn stats(&self) -> Result<SnapshotStats, StoreError> {
        let (index, paths) = self.load()?;
        let vectors_bytes = fs::metadata(self.vectors_path())?.len();
        let paths_bytes = fs::metadata(self.paths_path())?.len();
        Ok(SnapshotStats {
            indexed: paths.len(),
            dimension: index.dimension(),
            vectors_bytes,
            paths_bytes,
        })
    }
}

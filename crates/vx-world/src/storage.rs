//! File-per-chunk storage.
//!
//! Each chunk lives in `<dir>/chunk(X,Y,Z)`. Writes go to a sibling `.tmp`
//! file first and are renamed into place, so a crash mid-write never leaves
//! a half-written chunk behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::WorldError;
use crate::pos::ChunkPos;

const TMP_SUFFIX: &str = ".tmp";

/// Directory holding one file per persisted chunk.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WorldError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, pos: ChunkPos) -> PathBuf {
        self.dir.join(pos.to_string())
    }

    /// Read a chunk file. A missing file is `Ok(None)`.
    pub fn read(&self, pos: ChunkPos) -> Result<Option<Vec<u8>>, WorldError> {
        match fs::read(self.path_for(pos)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a chunk file atomically.
    pub fn write(&self, pos: ChunkPos, data: &[u8]) -> Result<(), WorldError> {
        let path = self.path_for(pos);
        let tmp = self.dir.join(format!("{pos}{TMP_SUFFIX}"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        debug!("wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.path_for(pos).is_file()
    }

    /// Positions of every persisted chunk. Files that are not chunk files are
    /// skipped.
    pub fn list(&self) -> Result<Vec<ChunkPos>, WorldError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(pos) = name.to_str().and_then(|n| n.parse::<ChunkPos>().ok()) {
                out.push(pos);
            }
        }
        out.sort_by_key(|p| (p.x, p.y, p.z));
        Ok(out)
    }
}

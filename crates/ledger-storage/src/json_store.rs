use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ledger_core::{Block, ChainStore, LoadOutcome, StoreError};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// The whole chain as one pretty-printed JSON array of block records,
/// rewritten in full on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    quarantine: bool,
}

impl JsonFileStore {
    /// Store that moves an unparseable file aside before reporting it corrupt.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            quarantine: true,
        }
    }

    /// Store for inspection only: corrupt files are reported and left in place.
    pub fn read_only<P: AsRef<Path>>(path: P) -> Self {
        Self {
            quarantine: false,
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn corrupt(&self, reason: String) -> LoadOutcome {
        let quarantined = if self.quarantine {
            self.move_aside()
        } else {
            None
        };
        warn!(
            "chain file {} is not a valid chain: {reason}",
            self.path.display()
        );
        LoadOutcome::Corrupt {
            reason,
            quarantined,
        }
    }

    /// Rename the file to `<name>.corrupt-<unix seconds>[.<n>]`.
    fn move_aside(&self) -> Option<PathBuf> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let base = format!("{}.corrupt-{secs}", self.path.display());
        let mut target = PathBuf::from(&base);
        let mut n = 1;
        while target.exists() {
            target = PathBuf::from(format!("{base}.{n}"));
            n += 1;
        }
        match fs::rename(&self.path, &target) {
            Ok(()) => {
                warn!("moved corrupt chain file to {}", target.display());
                Some(target)
            }
            Err(e) => {
                warn!("could not move corrupt chain file aside: {e}");
                None
            }
        }
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self) -> Result<LoadOutcome, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadOutcome::NotFound),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        Ok(match serde_json::from_slice::<Vec<Block>>(&bytes) {
            Ok(blocks) if blocks.is_empty() => self.corrupt("stored chain is empty".into()),
            Ok(blocks) => {
                info!(
                    "read {} blocks from {}",
                    blocks.len(),
                    self.path.display()
                );
                LoadOutcome::Loaded(blocks)
            }
            Err(e) => self.corrupt(e.to_string()),
        })
    }

    /// Written to a temp file beside the target and renamed over it, so a
    /// crash mid-write leaves the previous chain intact.
    fn save(&self, blocks: &[Block]) -> Result<(), StoreError> {
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        let tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, blocks)?;
            writer.flush().map_err(|e| StoreError::io(tmp.path(), e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;
        info!("saved {} blocks to {}", blocks.len(), self.path.display());
        Ok(())
    }
}

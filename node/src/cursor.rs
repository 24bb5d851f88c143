//! Durable block cursor.
//!
//! The cursor file holds one integer: the last block whose operations were
//! fully dispatched. It is rewritten after every committed block.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use paysnap_chain::LedgerRpc;

use crate::error::NodeError;

#[derive(Clone, Debug)]
pub struct CursorFile {
    path: PathBuf,
}

impl CursorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored height, or `None` when the file is missing or unreadable.
    pub fn read(&self) -> Option<u64> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cursor file unreadable");
                return None;
            }
        };
        match raw.trim().parse::<u64>() {
            Ok(height) => Some(height),
            Err(_) => {
                warn!(path = %self.path.display(), contents = %raw.trim(), "cursor file corrupt");
                None
            }
        }
    }

    /// Replace the stored height. Writes a sibling temp file and renames it
    /// over the cursor so a crash never leaves a half-written file.
    pub fn write(&self, height: u64) -> Result<(), NodeError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| NodeError::Cursor(format!("{}: {e}", dir.display())))?;
        }
        let tmp = self.path.with_extension("tmp");
        let written = fs::File::create(&tmp).and_then(|mut f| {
            f.write_all(height.to_string().as_bytes())?;
            f.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(NodeError::Cursor(format!("{}: {e}", tmp.display())));
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(NodeError::Cursor(format!(
                "{} -> {}: {e}",
                tmp.display(),
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// Height the pipeline starts after: the stored cursor, else the current
/// chain head. Without either there is no safe place to start.
pub async fn resolve_start(file: &CursorFile, rpc: &dyn LedgerRpc) -> Result<u64, NodeError> {
    if let Some(height) = file.read() {
        info!(height, "resuming from cursor file");
        return Ok(height);
    }
    match rpc.head_block_number().await {
        Ok(head) => {
            info!(head, "no usable cursor, starting at chain head");
            Ok(head)
        }
        Err(e) => Err(NodeError::NoStartingCursor(e.to_string())),
    }
}

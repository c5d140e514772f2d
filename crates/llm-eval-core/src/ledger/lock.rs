//! Advisory single-writer lock for a model's ledger file

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{EvalError, Result};

/// Held while a model's ledger is being rewritten; released on drop
#[derive(Debug)]
pub struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    pub(crate) fn acquire(model_id: &str, path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(EvalError::LedgerBusy {
                    model_id: model_id.to_string(),
                    holder: lock_holder(path),
                    lock_path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(EvalError::ledger_write(model_id, e)),
        };

        // Owner pid helps when a stale lock has to be removed by hand
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            debug!(error = %e, "Failed to write pid into lock file");
        }

        debug!(model = model_id, lock = %path.display(), "ledger_lock_acquired");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

/// Who holds an existing lock, from the pid written into it
fn lock_holder(path: &Path) -> String {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
        .map_or_else(|| "another writer".to_string(), |pid| format!("process {}", pid))
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "Failed to release ledger lock");
        }
    }
}

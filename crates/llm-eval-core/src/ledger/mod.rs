//! Append-only per-model run ledger
//!
//! Each model's history lives in one pretty-printed JSON file under the
//! results directory. The file name is a sanitized form of the model id; the
//! real id is stored inside the file. Writes go to a hidden temporary sibling
//! that is renamed over the target, so readers never see a torn file.
//!
//! Mutations go through a [`LedgerWriter`], which holds the model's
//! `<model>.lock` file for its lifetime.

mod lock;
mod types;

pub use lock::LedgerLock;
pub use types::{
    Extras, JudgeScore, LayerErrors, ModelResult, RecordPatch, Response, Run, RunId, RunRecord,
    SecondaryScore, Usage, LEDGER_VERSION,
};

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{EvalError, Result};
use crate::map_ledger_err;
use crate::score::Weights;

const LEDGER_EXT: &str = "json";
const LOCK_EXT: &str = "lock";

/// Results directory holding one history file per model
#[derive(Debug, Clone)]
pub struct Ledger {
    dir: PathBuf,
}

impl Ledger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the history file for a model
    pub fn path_for(&self, model_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_model_id(model_id), LEDGER_EXT))
    }

    fn lock_path_for(&self, model_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_model_id(model_id), LOCK_EXT))
    }

    /// Model ids with a history file, sorted
    pub fn list_models(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut models = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LEDGER_EXT) {
                continue;
            }
            match read_model_result(&path) {
                Ok(result) => models.push(result.model_id),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable ledger file")
                }
            }
        }
        models.sort();
        models.dedup();
        Ok(models)
    }

    /// Full history of a model; empty for a model never evaluated
    pub fn load(&self, model_id: &str) -> Result<ModelResult> {
        let path = self.path_for(model_id);
        if !path.exists() {
            debug!(model = model_id, "ledger_empty_history");
            return Ok(ModelResult::new(model_id));
        }

        let result = read_model_result(&path)?;
        if result.model_id != model_id {
            return Err(EvalError::Other(format!(
                "ledger file {} belongs to model '{}', not '{}'",
                path.display(),
                result.model_id,
                model_id
            )));
        }
        Ok(result)
    }

    /// Runs in insertion order
    pub fn history(&self, model_id: &str) -> Result<Vec<Run>> {
        Ok(self.load(model_id)?.runs)
    }

    /// Most recently appended run
    pub fn latest(&self, model_id: &str) -> Result<Run> {
        self.load(model_id)?
            .runs
            .pop()
            .ok_or_else(|| EvalError::not_found("run for model", model_id))
    }

    /// Lock a model's history for a sequence of mutations
    pub fn writer(&self, model_id: &str) -> Result<LedgerWriter<'_>> {
        fs::create_dir_all(&self.dir).map_err(|e| map_ledger_err!(model_id, e))?;
        let lock = LedgerLock::acquire(model_id, &self.lock_path_for(model_id))?;
        let result = self.load(model_id)?;
        Ok(LedgerWriter {
            ledger: self,
            result,
            _lock: lock,
        })
    }

    /// Append a completed run and return its id
    pub fn append(&self, model_id: &str, run: Run) -> Result<RunId> {
        let mut writer = self.writer(model_id)?;
        let run_id = writer.append_run(run)?;
        writer.commit()?;
        Ok(run_id)
    }

    /// Patch one layer of one record and refresh its composite
    pub fn update_record(
        &self,
        model_id: &str,
        run_id: &RunId,
        prompt_id: &str,
        patch: RecordPatch,
        weights: &Weights,
    ) -> Result<()> {
        let mut writer = self.writer(model_id)?;
        writer.update_record(run_id, prompt_id, patch, weights)?;
        writer.commit()
    }

    fn save(&self, result: &ModelResult) -> Result<()> {
        let model_id = result.model_id.as_str();
        let path = self.path_for(model_id);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("ledger.json");
        let temp_path = self.dir.join(format!(".{}.tmp", file_name));

        let write = || -> std::io::Result<()> {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, result)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&temp_path, &path)
        };

        if let Err(e) = write() {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(error = %cleanup, "No temporary ledger file to clean up");
            }
            return Err(map_ledger_err!(model_id, e));
        }

        debug!(model = model_id, runs = result.runs.len(), "ledger_saved");
        Ok(())
    }
}

/// Locked, in-memory view of one model's history
///
/// Changes are only persisted by [`LedgerWriter::commit`]. Dropping the writer
/// without committing discards them and releases the lock.
#[derive(Debug)]
pub struct LedgerWriter<'a> {
    ledger: &'a Ledger,
    result: ModelResult,
    _lock: LedgerLock,
}

impl LedgerWriter<'_> {
    pub fn result(&self) -> &ModelResult {
        &self.result
    }

    /// Append a run; prompt ids must be unique within it
    pub fn append_run(&mut self, run: Run) -> Result<RunId> {
        if let Some(prompt_id) = run.duplicate_prompt_id() {
            return Err(EvalError::DuplicateRecord {
                prompt_id: prompt_id.to_string(),
            });
        }
        let run_id = run.run_id.clone();
        self.result.runs.push(run);
        self.result.updated = Utc::now();
        Ok(run_id)
    }

    pub fn update_record(
        &mut self,
        run_id: &RunId,
        prompt_id: &str,
        patch: RecordPatch,
        weights: &Weights,
    ) -> Result<()> {
        let model_id = self.result.model_id.clone();
        let run = self
            .result
            .run_mut(run_id)
            .ok_or_else(|| EvalError::not_found("run", format!("{} for {}", run_id, model_id)))?;
        let record = run.record_mut(prompt_id).ok_or_else(|| {
            EvalError::not_found("record", format!("{} in run {}", prompt_id, run_id))
        })?;
        patch.apply(record, weights);
        self.result.updated = Utc::now();
        Ok(())
    }

    /// Persist the current state atomically
    pub fn commit(&mut self) -> Result<()> {
        self.ledger.save(&self.result)
    }
}

fn read_model_result(path: &Path) -> Result<ModelResult> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// File-system safe stem for a model id
pub fn sanitize_model_id(model_id: &str) -> String {
    let cleaned: String = model_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.starts_with('.') {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}

//! Targeted re-scoring of stored records (`rejudge` and `deepeval`)
//!
//! Patches one layer of existing records in place, addressed by
//! (model, run, prompt). Runs are never created or removed. Each model is
//! handled on its own thread while holding that model's ledger lock; every
//! patched record is committed immediately so an interrupt keeps the work
//! done so far.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::RunSummary;
use crate::capability::{Judge, JudgeRequest, SecondaryScorer};
use crate::error::{EvalError, Result};
use crate::ledger::{JudgeScore, Ledger, RecordPatch, RunId, SecondaryScore};
use crate::prompt::PromptSet;
use crate::retry::RetryPolicy;
use crate::score::Weights;

/// Score layer targeted by a rescoring pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Judge,
    Secondary,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Judge => f.write_str("judge"),
            Layer::Secondary => f.write_str("secondary"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RescoreRequest<'a> {
    pub layer: Layer,
    pub prompts: &'a PromptSet,
    /// Restrict to these prompt ids; empty means all
    pub prompt_ids: &'a [String],
    /// Recompute layers that are already populated
    pub force: bool,
    /// Every run instead of only the latest
    pub all_runs: bool,
}

/// Per-model result of a rescoring pass
#[derive(Debug, Clone, Serialize)]
pub struct RescoreOutcome {
    pub model_id: String,
    pub layer: Layer,
    pub rescored: usize,
    pub failed: usize,
    /// Records left alone because the layer was already populated
    pub skipped: usize,
    /// Records whose prompt is missing from the prompt set
    pub unknown_prompts: usize,
    /// State of every touched run after patching
    pub runs: Vec<RunSummary>,
}

/// Re-runs the judge or secondary layer over stored responses
pub struct Rescorer {
    judge: Option<Arc<dyn Judge>>,
    scorer: Option<Arc<dyn SecondaryScorer>>,
    weights: Weights,
    policy: RetryPolicy,
    cancel: Arc<AtomicBool>,
}

impl Rescorer {
    pub fn new(weights: Weights, policy: RetryPolicy) -> Self {
        Self {
            judge: None,
            scorer: None,
            weights,
            policy,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_judge(mut self, judge: Option<Arc<dyn Judge>>) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_scorer(mut self, scorer: Option<Arc<dyn SecondaryScorer>>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Rescore several models, one thread per model
    ///
    /// Results come back in the order of `model_ids`.
    pub fn rescore_models(
        &self,
        ledger: &Ledger,
        model_ids: &[String],
        request: RescoreRequest<'_>,
    ) -> Vec<(String, Result<RescoreOutcome>)> {
        thread::scope(|scope| {
            let handles: Vec<_> = model_ids
                .iter()
                .map(|model_id| {
                    let handle = scope.spawn(move || self.rescore_model(ledger, model_id, request));
                    (model_id, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(model_id, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(EvalError::Other(format!("rescoring {} panicked", model_id)))
                    });
                    (model_id.clone(), result)
                })
                .collect()
        })
    }

    /// Rescore one model's latest run (or all runs)
    pub fn rescore_model(
        &self,
        ledger: &Ledger,
        model_id: &str,
        request: RescoreRequest<'_>,
    ) -> Result<RescoreOutcome> {
        self.ensure_capability(request.layer)?;

        let mut outcome = RescoreOutcome {
            model_id: model_id.to_string(),
            layer: request.layer,
            rescored: 0,
            failed: 0,
            skipped: 0,
            unknown_prompts: 0,
            runs: Vec::new(),
        };

        if request.layer == Layer::Judge && self.judge.as_ref().map(|j| j.name()) == Some(model_id)
        {
            warn!(model = model_id, "Judge model is the model being rescored; skipping");
            return Ok(outcome);
        }

        let mut writer = ledger.writer(model_id)?;
        let run_ids: Vec<RunId> = if request.all_runs {
            writer.result().runs.iter().map(|r| r.run_id.clone()).collect()
        } else {
            let latest = writer
                .result()
                .latest_run()
                .ok_or_else(|| EvalError::not_found("run for model", model_id))?;
            vec![latest.run_id.clone()]
        };

        for run_id in &run_ids {
            let targets = self.targets(writer.result(), run_id, request, &mut outcome);
            for (prompt_id, patch_input) in targets {
                if self.cancel.load(Ordering::SeqCst) {
                    return Err(EvalError::Interrupted);
                }
                let patch = self.score(request.layer, patch_input);
                match &patch {
                    RecordPatch::Judge(Err(e)) | RecordPatch::Secondary(Err(e)) => {
                        warn!(model = model_id, prompt = %prompt_id, error = %e, "Rescoring failed");
                        outcome.failed += 1;
                    }
                    _ => outcome.rescored += 1,
                }
                writer.update_record(run_id, &prompt_id, patch, &self.weights)?;
                writer.commit()?;
                debug!(model = model_id, run = %run_id, prompt = %prompt_id, "record_rescored");
            }

            if let Some(run) = writer.result().run(run_id) {
                outcome.runs.push(RunSummary::from_records(
                    model_id,
                    Some(run_id.clone()),
                    &run.records,
                ));
            }
        }

        info!(
            model = model_id,
            layer = %request.layer,
            rescored = outcome.rescored,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "Rescoring finished"
        );
        Ok(outcome)
    }

    fn ensure_capability(&self, layer: Layer) -> Result<()> {
        let configured = match layer {
            Layer::Judge => self.judge.is_some(),
            Layer::Secondary => self.scorer.is_some(),
        };
        if configured {
            Ok(())
        } else {
            Err(EvalError::config(format!(
                "no {0} configured; add a '{0}' section to the config file",
                layer
            )))
        }
    }

    /// Records in a run that need the layer (re)computed
    fn targets(
        &self,
        result: &crate::ledger::ModelResult,
        run_id: &RunId,
        request: RescoreRequest<'_>,
        outcome: &mut RescoreOutcome,
    ) -> Vec<(String, JudgeRequest)> {
        let Some(run) = result.run(run_id) else {
            return Vec::new();
        };

        let mut targets = Vec::new();
        for record in &run.records {
            if !request.prompt_ids.is_empty() && !request.prompt_ids.contains(&record.prompt_id) {
                continue;
            }
            let Some(response) = &record.response else {
                continue;
            };
            let populated = match request.layer {
                Layer::Judge => record.judge.is_some(),
                Layer::Secondary => record.secondary.is_some(),
            };
            if populated && !request.force {
                outcome.skipped += 1;
                continue;
            }
            let Some(prompt) = request.prompts.get(&record.prompt_id) else {
                warn!(prompt = %record.prompt_id, "Prompt not in prompt set; cannot rescore");
                outcome.unknown_prompts += 1;
                continue;
            };

            targets.push((
                record.prompt_id.clone(),
                JudgeRequest {
                    prompt: prompt.prompt.clone(),
                    ideal: prompt.ideal.clone(),
                    criteria: prompt
                        .criteria
                        .lines()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    response: response.content.clone(),
                    check_flags: record
                        .check_result
                        .as_ref()
                        .map(|c| c.flag_list())
                        .unwrap_or_default(),
                },
            ));
        }
        targets
    }

    fn score(&self, layer: Layer, input: JudgeRequest) -> RecordPatch {
        let cancel = Some(self.cancel.as_ref());
        match (layer, &self.judge, &self.scorer) {
            (Layer::Judge, Some(judge), _) => {
                let call = Arc::clone(judge);
                let result = self
                    .policy
                    .run("judge", cancel, move || call.judge(&input))
                    .map(|v| JudgeScore::new(v.score, v.rationale, judge.name()))
                    .map_err(|e| e.to_string());
                RecordPatch::Judge(result)
            }
            (Layer::Secondary, _, Some(scorer)) => {
                let call = Arc::clone(scorer);
                let result = self
                    .policy
                    .run("secondary", cancel, move || {
                        call.score(&input.prompt, &input.response)
                    })
                    .map(|metrics| SecondaryScore::new(metrics, scorer.name()))
                    .map_err(|e| e.to_string());
                RecordPatch::Secondary(result)
            }
            (Layer::Judge, None, _) => RecordPatch::Judge(Err("no judge configured".to_string())),
            (Layer::Secondary, _, None) => {
                RecordPatch::Secondary(Err("no secondary scorer configured".to_string()))
            }
        }
    }
}

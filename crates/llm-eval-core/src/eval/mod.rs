//! Evaluation pipeline
//!
//! For every selected prompt: Provider, then heuristic check, then Judge
//! (which sees the check flags), then SecondaryScorer, then composite.
//! Prompts fan out over a bounded pool of scoped worker threads. Records are
//! buffered and the run is appended to the ledger exactly once at the end, so
//! an interrupted or failed run leaves history untouched.

mod rescore;
mod summary;

pub use rescore::{Layer, RescoreOutcome, RescoreRequest, Rescorer};
pub use summary::{LayerCount, RunSummary};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::capability::{GenerationParams, Judge, JudgeRequest, Provider, SecondaryScorer};
use crate::check;
use crate::config::EvalSettings;
use crate::error::{EvalError, Result};
use crate::ledger::{JudgeScore, Ledger, Response, Run, RunId, RunRecord, SecondaryScore};
use crate::prompt::{Prompt, PromptFilter, PromptSet};
use crate::retry::RetryPolicy;
use crate::score::Weights;
use crate::trace_time;

/// What to evaluate
#[derive(Debug, Clone, Copy)]
pub struct EvalRequest<'a> {
    pub model_id: &'a str,
    pub prompts: &'a PromptSet,
    pub filter: &'a PromptFilter,
    /// Evaluate prompts again even if the latest run already answered them
    pub rerun: bool,
}

/// Result of one `evaluate` call
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    /// `None` when there was nothing to evaluate and no run was appended
    pub run_id: Option<RunId>,
    /// Prompts skipped because the latest run already answered them
    pub skipped: usize,
    /// Counts over the records evaluated by this call
    pub summary: RunSummary,
}

/// Runs the scoring pipeline for one model
pub struct Evaluator {
    provider: Arc<dyn Provider>,
    judge: Option<Arc<dyn Judge>>,
    scorer: Option<Arc<dyn SecondaryScorer>>,
    params: GenerationParams,
    api_model: Option<String>,
    weights: Weights,
    policy: RetryPolicy,
    concurrency: usize,
    delay: Duration,
    cancel: Arc<AtomicBool>,
}

impl Evaluator {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            judge: None,
            scorer: None,
            params: GenerationParams::default(),
            api_model: None,
            weights: Weights::default(),
            policy: RetryPolicy::default(),
            concurrency: 1,
            delay: Duration::ZERO,
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

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// API model name stored on responses when the provider does not report one
    pub fn with_api_model(mut self, api_model: impl Into<String>) -> Self {
        self.api_model = Some(api_model.into());
        self
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_settings(mut self, settings: &EvalSettings) -> Self {
        self.policy = settings.retry_policy();
        self.concurrency = settings.concurrency.max(1);
        self.delay = settings.delay();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Flag that aborts the run when set (Ctrl-C)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Evaluate the selected prompts and append one run to the ledger
    pub fn evaluate(&self, ledger: &Ledger, request: EvalRequest<'_>) -> Result<EvalOutcome> {
        let start = Instant::now();
        let model_id = request.model_id;
        let mut writer = ledger.writer(model_id)?;
        let latest = writer.result().latest_run().cloned();

        let selected = request.prompts.filter(request.filter);
        let answered: HashSet<&str> = match (&latest, request.rerun) {
            (Some(run), false) => run
                .records
                .iter()
                .filter(|r| r.response.is_some())
                .map(|r| r.prompt_id.as_str())
                .collect(),
            _ => HashSet::new(),
        };
        let todo: Vec<&Prompt> = selected
            .iter()
            .copied()
            .filter(|p| !answered.contains(p.id.as_str()))
            .collect();
        let skipped = selected.len() - todo.len();

        if todo.is_empty() {
            info!(model = model_id, skipped, "Nothing to evaluate");
            return Ok(EvalOutcome {
                run_id: None,
                skipped,
                summary: RunSummary::from_records(model_id, None, std::iter::empty()),
            });
        }

        let judge = self.judge.clone().filter(|j| {
            let same = j.name() == model_id;
            if same {
                warn!(
                    model = model_id,
                    "Judge model is the model under evaluation; skipping judge layer"
                );
            }
            !same
        });

        info!(
            model = model_id,
            prompts = todo.len(),
            skipped,
            concurrency = self.concurrency,
            judge = ?judge.as_ref().map(|j| j.name()),
            scorer = ?self.scorer.as_ref().map(|s| s.name()),
            "Starting evaluation"
        );

        let mut run = Run::new();
        let fresh = self.run_prompts(model_id, &todo, judge.as_ref())?;
        if self.cancelled() {
            return Err(EvalError::Interrupted);
        }

        let summary = RunSummary::from_records(model_id, Some(run.run_id.clone()), &fresh);
        run.completed_at = Utc::now();
        run.api_model = self.api_model.clone();
        run.judge_model = judge.as_ref().map(|j| j.name().to_string());
        run.scorer_model = self.scorer.as_ref().map(|s| s.name().to_string());
        run.prompt_set_fingerprint = Some(request.prompts.fingerprint());
        run.records = merge_records(request.prompts, fresh, latest.as_ref());

        let run_id = writer.append_run(run)?;
        writer.commit()?;
        trace_time!(start, "evaluate", model = model_id);
        info!(model = model_id, run = %run_id, "Run appended");

        Ok(EvalOutcome {
            run_id: Some(run_id),
            skipped,
            summary,
        })
    }

    /// Score prompts on the worker pool; records come back in input order
    fn run_prompts(
        &self,
        model_id: &str,
        prompts: &[&Prompt],
        judge: Option<&Arc<dyn Judge>>,
    ) -> Result<Vec<RunRecord>> {
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let results: Mutex<Vec<(usize, Result<RunRecord>)>> =
            Mutex::new(Vec::with_capacity(prompts.len()));
        let workers = self.concurrency.min(prompts.len()).max(1);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    let mut first = true;
                    loop {
                        if self.cancelled() || stop.load(Ordering::SeqCst) {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(prompt) = prompts.get(index) else {
                            break;
                        };
                        if !first && !self.delay.is_zero() {
                            thread::sleep(self.delay);
                        }
                        first = false;

                        let record = self.score_prompt(model_id, prompt, judge);
                        let failed = record.is_err();
                        if let Ok(mut guard) = results.lock() {
                            guard.push((index, record));
                        }
                        if failed {
                            stop.store(true, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        let mut collected = results
            .into_inner()
            .map_err(|_| EvalError::Other("worker result buffer poisoned".to_string()))?;
        collected.sort_by_key(|(index, _)| *index);
        collected.into_iter().map(|(_, record)| record).collect()
    }

    /// Run every layer for one prompt
    ///
    /// Capability failures degrade the record. Only a checker error (which
    /// prompt-set validation rules out) is returned as `Err`.
    fn score_prompt(
        &self,
        model_id: &str,
        prompt: &Prompt,
        judge: Option<&Arc<dyn Judge>>,
    ) -> Result<RunRecord> {
        let start = Instant::now();
        let mut record = RunRecord::new(&prompt.id);
        let cancel = Some(self.cancel.as_ref());

        let provider = Arc::clone(&self.provider);
        let text = prompt.prompt.clone();
        let params = self.params.clone();
        let completion = self.policy.run("provider", cancel, move || {
            let call_start = Instant::now();
            provider
                .complete(&text, &params)
                .map(|c| (c, call_start.elapsed()))
        });

        let (completion, latency) = match completion {
            Ok(done) => done,
            Err(e) => {
                warn!(model = model_id, prompt = %prompt.id, error = %e, "Provider call failed");
                record.errors.response = Some(e.to_string());
                return Ok(record);
            }
        };

        let check_result = check::check(prompt, &completion.content)?;
        let check_flags = check_result.flag_list();
        record.check_result = Some(check_result);

        if let Some(judge) = judge {
            let request = JudgeRequest {
                prompt: prompt.prompt.clone(),
                ideal: prompt.ideal.clone(),
                criteria: prompt.criteria.lines().into_iter().map(str::to_string).collect(),
                response: completion.content.clone(),
                check_flags,
            };
            let judge_call = Arc::clone(judge);
            match self
                .policy
                .run("judge", cancel, move || judge_call.judge(&request))
            {
                Ok(verdict) => {
                    record.judge = Some(JudgeScore::new(
                        verdict.score,
                        verdict.rationale,
                        judge.name(),
                    ))
                }
                Err(e) => {
                    warn!(prompt = %prompt.id, error = %e, "Judge unavailable");
                    record.errors.judge = Some(e.to_string());
                }
            }
        }

        if let Some(scorer) = &self.scorer {
            let scorer_call = Arc::clone(scorer);
            let text = prompt.prompt.clone();
            let content = completion.content.clone();
            match self
                .policy
                .run("secondary", cancel, move || scorer_call.score(&text, &content))
            {
                Ok(metrics) => {
                    record.secondary = Some(SecondaryScore::new(metrics, scorer.name()));
                }
                Err(e) => {
                    warn!(prompt = %prompt.id, error = %e, "Secondary scorer unavailable");
                    record.errors.secondary = Some(e.to_string());
                }
            }
        }

        record.response = Some(Response {
            api_model: completion
                .api_model
                .or_else(|| self.api_model.clone())
                .unwrap_or_default(),
            content: completion.content,
            latency_s: latency.as_secs_f64(),
            usage: completion.usage,
            extras: Default::default(),
        });
        record.refresh_composite(&self.weights);

        debug!(
            prompt = %prompt.id,
            composite = ?record.composite_score,
            flagged = record.is_flagged(),
            "prompt_scored"
        );
        trace_time!(start, "score_prompt", prompt = prompt.id.as_str());
        Ok(record)
    }
}

/// New records plus the latest run's records for every prompt not re-evaluated
///
/// Ordered by the prompt set, with records for prompts no longer in the set
/// kept at the end in their previous order.
fn merge_records(
    prompts: &PromptSet,
    fresh: Vec<RunRecord>,
    latest: Option<&Run>,
) -> Vec<RunRecord> {
    let mut by_id: HashMap<String, RunRecord> = HashMap::new();
    let mut orphans = Vec::new();
    if let Some(run) = latest {
        for record in &run.records {
            if prompts.get(&record.prompt_id).is_some() {
                by_id.insert(record.prompt_id.clone(), record.clone());
            } else {
                orphans.push(record.clone());
            }
        }
    }
    for record in fresh {
        by_id.insert(record.prompt_id.clone(), record);
    }

    let mut merged: Vec<RunRecord> = prompts
        .prompts()
        .iter()
        .filter_map(|p| by_id.remove(&p.id))
        .collect();
    merged.extend(orphans);
    merged
}

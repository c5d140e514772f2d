//! Populated vs. unavailable counts per scoring layer

use serde::Serialize;

use crate::ledger::{RunId, RunRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayerCount {
    pub populated: usize,
    pub unavailable: usize,
}

impl LayerCount {
    fn tally(&mut self, present: bool) {
        if present {
            self.populated += 1;
        } else {
            self.unavailable += 1;
        }
    }
}

/// What a run (or the touched part of one) looks like after scoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub model_id: String,
    pub run_id: Option<RunId>,
    pub records: usize,
    pub response: LayerCount,
    pub check: LayerCount,
    pub judge: LayerCount,
    pub secondary: LayerCount,
    pub composite: LayerCount,
    pub flagged: usize,
    pub mean_composite: Option<f64>,
}

impl RunSummary {
    pub fn from_records<'a>(
        model_id: &str,
        run_id: Option<RunId>,
        records: impl IntoIterator<Item = &'a RunRecord>,
    ) -> Self {
        let mut summary = RunSummary {
            model_id: model_id.to_string(),
            run_id,
            records: 0,
            response: LayerCount::default(),
            check: LayerCount::default(),
            judge: LayerCount::default(),
            secondary: LayerCount::default(),
            composite: LayerCount::default(),
            flagged: 0,
            mean_composite: None,
        };

        let mut composite_sum = 0.0;
        for record in records {
            summary.records += 1;
            summary.response.tally(record.response.is_some());
            summary.check.tally(record.check_result.is_some());
            summary.judge.tally(record.judge.is_some());
            summary.secondary.tally(record.secondary.is_some());
            summary.composite.tally(record.composite_score.is_some());
            if record.is_flagged() {
                summary.flagged += 1;
            }
            composite_sum += record.composite_score.unwrap_or(0.0);
        }

        if summary.composite.populated > 0 {
            summary.mean_composite = Some(composite_sum / summary.composite.populated as f64);
        }
        summary
    }
}

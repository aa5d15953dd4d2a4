use super::objective::Objective;
use super::{EvaluationRecord, Progress};
use crate::errors::PipelineError;
use crate::shared::should_cancel;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use strata_domain::value_objects::params::Params;

#[derive(Debug, Clone)]
pub(crate) struct TrialPlan {
    pub trial_id: usize,
    pub params: Params,
}

enum WorkerMessage {
    Record(EvaluationRecord),
    Cancelled,
}

/// Runs every plan and returns the records sorted by `trial_id`. `on_record`
/// sees records in completion order on the calling thread.
pub(crate) fn execute_trials(
    plans: &[TrialPlan],
    parallelism: usize,
    objective: &Objective<'_>,
    cancel: Option<&(dyn Fn() -> bool + Sync)>,
    on_record: &mut dyn FnMut(&EvaluationRecord),
) -> Result<Vec<EvaluationRecord>, PipelineError> {
    let mut records = if parallelism <= 1 || plans.len() <= 1 {
        execute_serial(plans, objective, cancel, on_record)?
    } else {
        execute_parallel(plans, parallelism, objective, cancel, on_record)?
    };
    records.sort_by_key(|record| record.trial_id);
    Ok(records)
}

fn execute_serial(
    plans: &[TrialPlan],
    objective: &Objective<'_>,
    cancel: Option<&(dyn Fn() -> bool + Sync)>,
    on_record: &mut dyn FnMut(&EvaluationRecord),
) -> Result<Vec<EvaluationRecord>, PipelineError> {
    let mut out = Vec::with_capacity(plans.len());
    for plan in plans {
        if should_cancel(cancel) {
            return Err(PipelineError::Cancelled);
        }
        let record = objective.evaluate(plan.trial_id, &plan.params);
        on_record(&record);
        out.push(record);
    }
    Ok(out)
}

fn execute_parallel(
    plans: &[TrialPlan],
    parallelism: usize,
    objective: &Objective<'_>,
    cancel: Option<&(dyn Fn() -> bool + Sync)>,
    on_record: &mut dyn FnMut(&EvaluationRecord),
) -> Result<Vec<EvaluationRecord>, PipelineError> {
    let worker_count = parallelism.max(1).min(plans.len());
    let next_index = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<WorkerMessage>();

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let next_index_ref = &next_index;
            let cancelled_ref = &cancelled;
            scope.spawn(move || loop {
                if cancelled_ref.load(Ordering::Relaxed) || should_cancel(cancel) {
                    cancelled_ref.store(true, Ordering::Relaxed);
                    let _ = tx.send(WorkerMessage::Cancelled);
                    break;
                }

                let plan_idx = next_index_ref.fetch_add(1, Ordering::Relaxed);
                if plan_idx >= plans.len() {
                    break;
                }

                let plan = &plans[plan_idx];
                let record = objective.evaluate(plan.trial_id, &plan.params);
                if tx.send(WorkerMessage::Record(record)).is_err() {
                    break;
                }
            });
        }

        drop(tx);

        let mut records: Vec<EvaluationRecord> = Vec::with_capacity(plans.len());
        let mut was_cancelled = false;
        while let Ok(message) = rx.recv() {
            match message {
                WorkerMessage::Record(record) => {
                    if !was_cancelled {
                        on_record(&record);
                        records.push(record);
                    }
                }
                WorkerMessage::Cancelled => was_cancelled = true,
            }
        }

        if was_cancelled {
            return Err(PipelineError::Cancelled);
        }
        if records.len() != plans.len() {
            return Err(PipelineError::Config(format!(
                "internal executor error: expected {} records, got {}",
                plans.len(),
                records.len()
            )));
        }
        Ok(records)
    })
}

/// Forwards progress to the caller, at most once per `min_interval`. The
/// final state is always delivered by `finish`.
pub(crate) struct ProgressReporter<'a> {
    callback: Option<&'a mut dyn FnMut(Progress)>,
    min_interval: Option<Duration>,
    last_emit: Option<Instant>,
    pending: Option<Progress>,
    completed: usize,
    total: usize,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(
        callback: Option<&'a mut dyn FnMut(Progress)>,
        min_interval: Option<Duration>,
        total: usize,
    ) -> Self {
        Self {
            callback,
            min_interval,
            last_emit: None,
            pending: None,
            completed: 0,
            total,
        }
    }

    pub(crate) fn record(&mut self, record: &EvaluationRecord) {
        self.completed += 1;
        let progress = Progress {
            completed: self.completed,
            total: self.total.max(self.completed),
            latest_objective: record.objective_value,
        };
        let due = match (self.min_interval, self.last_emit) {
            (Some(interval), Some(last)) => {
                last.elapsed() >= interval || progress.completed >= progress.total
            }
            _ => true,
        };
        if due {
            self.emit(progress);
        } else {
            self.pending = Some(progress);
        }
    }

    /// Flushes a throttled update, if any.
    pub(crate) fn finish(&mut self) {
        if let Some(progress) = self.pending.take() {
            self.emit(progress);
        }
    }

    fn emit(&mut self, progress: Progress) {
        self.pending = None;
        self.last_emit = Some(Instant::now());
        if let Some(callback) = self.callback.as_mut() {
            (callback)(progress);
        }
    }
}

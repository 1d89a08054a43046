//! Status projector (component 3): a pure function from observed workload
//! state back into per-step and overall `PipelineRun` status, with the
//! transition policy from section 4.3.
//!
//! Grounded on `buildit-core::pipeline::{PipelineStatus, StageStatus}`'s
//! phase shape and `buildit-scheduler::orchestrator::StageState`'s
//! `is_terminal`/`is_success` helpers, re-targeted from in-process stage
//! state (an mpsc-driven orchestrator loop) to observation of `batch/v1 Job`
//! status written by the cluster.

use std::collections::{BTreeMap, HashSet};

use c8s_core::phase::condition_types;
use c8s_core::{Condition, ConditionStatus, RunPhase, StepPhase};
use c8s_core::crds::{PipelineRunStatus, StepStatus};
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;

/// A workload's observed state, reduced from a `Job`'s `.status` field down
/// to what the projector needs. Separated from `Job` itself so the
/// projection function stays a pure function of plain data, independent of
/// how the caller fetched the workload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedWorkload {
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub message: Option<String>,
}

/// Reduce a `batch/v1 Job` to the fields the projector cares about. A Job
/// with no `.status` at all (just created, not yet observed by the
/// controller) reduces to the default (all-zero) observation, which
/// `derive_step_phase` treats as unscheduled.
pub fn observe_job(job: &Job) -> ObservedWorkload {
    let Some(status) = &job.status else {
        return ObservedWorkload::default();
    };

    ObservedWorkload {
        active: status.active.unwrap_or(0),
        succeeded: status.succeeded.unwrap_or(0),
        failed: status.failed.unwrap_or(0),
        start_time: status.start_time.as_ref().map(|t| t.0),
        completion_time: status.completion_time.as_ref().map(|t| t.0),
        // A Job's status carries no container-level exit code; the
        // reconciler fills this in from the owned Pod when it needs one for
        // display, the projector only needs pass/fail/active counts.
        exit_code: None,
        message: status
            .conditions
            .as_ref()
            .and_then(|cs| cs.iter().rev().find_map(|c| c.message.clone())),
    }
}

fn derive_step_phase(observed: Option<&ObservedWorkload>) -> StepPhase {
    match observed {
        None => StepPhase::Pending,
        Some(o) if o.failed > 0 => StepPhase::Failed,
        Some(o) if o.succeeded > 0 => StepPhase::Succeeded,
        Some(o) if o.active > 0 => StepPhase::Running,
        Some(_) => StepPhase::Pending,
    }
}

/// Project a new `PipelineRunStatus` from the current one plus observed
/// workload state for every step the DAG produced this reconcile. `skipped`
/// names steps excluded by `conditional.branch` pre-expansion filtering
/// (section 4.1/9) — they are reported `Skipped`, never given a workload.
pub fn project(
    current: &PipelineRunStatus,
    step_names: &[String],
    observed: &BTreeMap<String, ObservedWorkload>,
    workload_names: &BTreeMap<String, String>,
    skipped: &HashSet<String>,
    now: DateTime<Utc>,
) -> PipelineRunStatus {
    if current.phase.is_terminal() {
        return current.clone();
    }

    let mut steps = Vec::with_capacity(step_names.len());
    for name in step_names {
        let mut status = current
            .steps
            .iter()
            .find(|s| &s.name == name)
            .cloned()
            .unwrap_or_else(|| StepStatus::pending(name.clone()));

        if skipped.contains(name) {
            status.phase = StepPhase::Skipped;
            steps.push(status);
            continue;
        }

        let obs = observed.get(name);
        status.phase = derive_step_phase(obs);
        status.workload_name = workload_names.get(name).cloned().or(status.workload_name);
        if let Some(o) = obs {
            status.start_time = status.start_time.or(o.start_time);
            status.completion_time = status.completion_time.or(o.completion_time);
            status.exit_code = o.exit_code.or(status.exit_code);
            status.message = o.message.clone().or(status.message);
        }
        steps.push(status);
    }

    let new_phase = derive_run_phase(&steps);
    let mut conditions = current.conditions.clone();
    let mut start_time = current.start_time;
    let mut completion_time = current.completion_time;

    let was_running_before = matches!(current.phase, RunPhase::Running);
    if matches!(new_phase, RunPhase::Running) && !was_running_before {
        start_time = start_time.or(Some(now));
        push_condition(
            &mut conditions,
            condition_types::JOBS_CREATED,
            ConditionStatus::True,
            "WorkloadsCreated",
            "at least one step workload is active",
            now,
        );
    }

    if new_phase.is_terminal() {
        completion_time = completion_time.or(Some(now));
        match new_phase {
            RunPhase::Succeeded => push_condition(
                &mut conditions,
                condition_types::STEPS_COMPLETED,
                ConditionStatus::True,
                "AllStepsSucceeded",
                "every step reached a successful terminal phase",
                now,
            ),
            RunPhase::Failed => push_condition(
                &mut conditions,
                condition_types::STEPS_COMPLETED,
                ConditionStatus::False,
                "StepFailed",
                "at least one step reached a failed terminal phase",
                now,
            ),
            _ => {}
        }
    }

    PipelineRunStatus {
        phase: new_phase,
        start_time,
        completion_time,
        steps,
        conditions,
        resource_usage: current.resource_usage.clone(),
        is_matrix_parent: current.is_matrix_parent,
    }
}

fn derive_run_phase(steps: &[StepStatus]) -> RunPhase {
    if steps.iter().any(|s| s.phase == StepPhase::Failed) {
        return RunPhase::Failed;
    }
    if steps.iter().all(|s| s.phase.is_success()) {
        return RunPhase::Succeeded;
    }
    if steps.iter().any(|s| s.phase == StepPhase::Running) {
        return RunPhase::Running;
    }
    if steps.iter().all(|s| s.phase == StepPhase::Pending) {
        return RunPhase::Pending;
    }
    RunPhase::Running
}

fn push_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        if existing.status != status {
            existing.status = status;
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.last_transition_time = now;
        }
        return;
    }
    conditions.push(Condition::new(type_, status, reason, message, now));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unobserved_steps_are_pending() {
        let current = PipelineRunStatus::default();
        let status = project(
            &current,
            &names(&["build"]),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &HashSet::new(),
            Utc::now(),
        );
        assert_eq!(status.phase, RunPhase::Pending);
        assert_eq!(status.steps[0].phase, StepPhase::Pending);
    }

    #[test]
    fn one_active_workload_marks_run_running_and_stamps_start_time() {
        let current = PipelineRunStatus::default();
        let now = Utc::now();
        let mut observed = BTreeMap::new();
        observed.insert(
            "build".to_string(),
            ObservedWorkload {
                active: 1,
                ..Default::default()
            },
        );
        let status = project(
            &current,
            &names(&["build"]),
            &observed,
            &BTreeMap::new(),
            &HashSet::new(),
            now,
        );
        assert_eq!(status.phase, RunPhase::Running);
        assert_eq!(status.start_time, Some(now));
        assert!(status
            .conditions
            .iter()
            .any(|c| c.type_ == condition_types::JOBS_CREATED && c.status == ConditionStatus::True));
    }

    #[test]
    fn all_steps_succeeded_marks_run_succeeded_and_stamps_completion() {
        let current = PipelineRunStatus {
            phase: RunPhase::Running,
            start_time: Some(Utc::now()),
            ..Default::default()
        };
        let now = Utc::now();
        let mut observed = BTreeMap::new();
        observed.insert(
            "build".to_string(),
            ObservedWorkload {
                succeeded: 1,
                ..Default::default()
            },
        );
        let status = project(
            &current,
            &names(&["build"]),
            &observed,
            &BTreeMap::new(),
            &HashSet::new(),
            now,
        );
        assert_eq!(status.phase, RunPhase::Succeeded);
        assert_eq!(status.completion_time, Some(now));
    }

    #[test]
    fn any_failed_step_marks_run_failed_even_if_others_succeeded() {
        let current = PipelineRunStatus {
            phase: RunPhase::Running,
            ..Default::default()
        };
        let mut observed = BTreeMap::new();
        observed.insert(
            "build".to_string(),
            ObservedWorkload {
                succeeded: 1,
                ..Default::default()
            },
        );
        observed.insert(
            "test".to_string(),
            ObservedWorkload {
                failed: 1,
                ..Default::default()
            },
        );
        let status = project(
            &current,
            &names(&["build", "test"]),
            &observed,
            &BTreeMap::new(),
            &HashSet::new(),
            Utc::now(),
        );
        assert_eq!(status.phase, RunPhase::Failed);
    }

    #[test]
    fn terminal_phase_is_sticky() {
        let current = PipelineRunStatus {
            phase: RunPhase::Cancelled,
            ..Default::default()
        };
        let status = project(
            &current,
            &names(&["build"]),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &HashSet::new(),
            Utc::now(),
        );
        assert_eq!(status.phase, RunPhase::Cancelled);
    }

    #[test]
    fn skipped_steps_count_toward_success() {
        let current = PipelineRunStatus {
            phase: RunPhase::Running,
            ..Default::default()
        };
        let mut observed = BTreeMap::new();
        observed.insert(
            "build".to_string(),
            ObservedWorkload {
                succeeded: 1,
                ..Default::default()
            },
        );
        let mut skipped = HashSet::new();
        skipped.insert("deploy".to_string());
        let status = project(
            &current,
            &names(&["build", "deploy"]),
            &observed,
            &BTreeMap::new(),
            &skipped,
            Utc::now(),
        );
        assert_eq!(status.phase, RunPhase::Succeeded);
        let deploy = status.steps.iter().find(|s| s.name == "deploy").unwrap();
        assert_eq!(deploy.phase, StepPhase::Skipped);
    }
}

//! The per-run reconcile loop (section 4.4). Grounds its step ordering on
//! `other_examples/74b75c90_...pipeline_controller.rs`'s stage/status state
//! machine sketch (phase check -> create workloads for the ready stage ->
//! observe -> advance), and its optimistic-write/claim posture on
//! `agentsphere-platform::src/deployer/reconciler.rs::reconcile_one`'s
//! claim-then-act idiom, reinterpreted against k8s resourceVersion
//! conflicts instead of a SQL row lock.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use c8s_core::crds::{PipelineConfig, PipelineRun, Step};
use c8s_core::labels;
use c8s_core::{Condition, ConditionStatus, Error, ReferenceKind, RunPhase, StepPhase};
use c8s_logs::StepKey;
use c8s_store::StateStore;
use chrono::Utc;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::warn;

use crate::Context;

pub async fn apply(run: &PipelineRun, ctx: &Context) -> Result<Action, Error> {
    let namespace = run
        .namespace()
        .ok_or_else(|| Error::validation("PipelineRun has no namespace"))?;
    let run_name = run.name_any();

    if run.status.as_ref().map(|s| s.is_matrix_parent).unwrap_or(false) {
        return aggregate_matrix_parent(run, &namespace, ctx).await;
    }

    if wants_cancellation(run) && !run.status.as_ref().map(|s| s.phase.is_terminal()).unwrap_or(false) {
        return cancel(run, &namespace, &run_name, ctx).await;
    }

    let config: PipelineConfig = match ctx.store.get_opt(&namespace, &run.spec.pipeline_config_ref).await? {
        Some(c) => c,
        None => {
            return fail_run(
                run,
                &namespace,
                &run_name,
                ctx,
                "PipelineConfigNotFound",
                &format!("referenced PipelineConfig '{}' does not exist", run.spec.pipeline_config_ref),
            )
            .await;
        }
    };

    let current_phase = run.status.as_ref().map(|s| s.phase).unwrap_or_default();
    let already_matrix_parent = run.status.as_ref().map(|s| s.is_matrix_parent).unwrap_or(false);
    if config.spec.matrix.is_some()
        && run.spec.matrix_index.is_none()
        && current_phase == RunPhase::Pending
        && !already_matrix_parent
    {
        return expand_into_matrix_children(run, &namespace, &run_name, &config, ctx).await;
    }

    let binding = run.spec.matrix_index.clone().unwrap_or_default();

    if let Err(e) = validate_secret_references(&config.spec.steps, &namespace, ctx).await {
        if let Error::Reference(_) = &e {
            return pending_with_condition(
                run,
                &namespace,
                &run_name,
                ctx,
                "SecretValidationFailed",
                &e.to_string(),
            )
            .await;
        }
        return Err(e);
    }

    let plan = c8s_dag::plan(&config.spec.steps, &binding, &run.spec.branch)?;

    let current_status = run.status.clone().unwrap_or_default();
    let succeeded: HashSet<&str> = current_status
        .steps
        .iter()
        .filter(|s| s.phase == StepPhase::Succeeded)
        .map(|s| s.name.as_str())
        .collect();
    let terminal: HashSet<&str> = current_status
        .steps
        .iter()
        .filter(|s| s.phase.is_terminal())
        .map(|s| s.name.as_str())
        .collect();

    let mut workload_names: BTreeMap<String, String> = current_status
        .steps
        .iter()
        .filter_map(|s| s.workload_name.clone().map(|w| (s.name.clone(), w)))
        .collect();

    for step in &plan.steps {
        if workload_names.contains_key(&step.name) {
            continue;
        }
        // `onSuccess: false` marks a cleanup step: it is ready once its
        // dependencies reach any terminal state, not just Succeeded.
        let runs_regardless = step
            .conditional
            .as_ref()
            .is_some_and(|c| !c.on_success);
        let deps_reached = if runs_regardless { &terminal } else { &succeeded };
        let ready = step.depends_on.iter().all(|d| deps_reached.contains(d.as_str()));
        if !ready {
            continue;
        }
        let name = create_workload_if_absent(run, step, &binding, &namespace, ctx).await?;
        workload_names.insert(step.name.clone(), name);
    }

    let mut observed = BTreeMap::new();
    for (step_name, workload_name) in &workload_names {
        if let Some(job) = ctx.store.get_opt::<Job>(&namespace, workload_name).await? {
            observed.insert(step_name.clone(), c8s_projector::observe_job(&job));
        }
    }

    let mut log_urls: BTreeMap<String, String> = BTreeMap::new();
    for (step_name, workload_name) in &workload_names {
        if let Some(step) = plan.step(step_name) {
            if let Some(url) = ensure_log_ingestion(ctx, &namespace, &run_name, step, workload_name).await {
                log_urls.insert(step_name.clone(), url);
            }
        }
    }

    let step_names: Vec<String> = config.spec.steps.iter().map(|s| s.name.clone()).collect();
    let mut new_status = c8s_projector::project(
        &current_status,
        &step_names,
        &observed,
        &workload_names,
        &plan.excluded,
        Utc::now(),
    );

    for step in &mut new_status.steps {
        if step.log_url.is_none() {
            step.log_url = log_urls.get(&step.name).cloned();
        }
    }

    if new_status != current_status {
        patch_status(&namespace, &run_name, ctx, &new_status).await?;
    }

    Ok(requeue_for(&new_status.phase, ctx))
}

pub async fn cleanup(run: &PipelineRun, ctx: &Context) -> Result<Action, Error> {
    let namespace = run
        .namespace()
        .ok_or_else(|| Error::validation("PipelineRun has no namespace"))?;
    let run_name = run.name_any();
    ctx.archiver.finalize_run(&namespace, &run_name).await?;
    Ok(Action::await_change())
}

fn wants_cancellation(run: &PipelineRun) -> bool {
    run.annotations()
        .get(labels::ANNOTATION_CANCEL)
        .map(|v| v == "true")
        .unwrap_or(false)
}

async fn cancel(run: &PipelineRun, namespace: &str, run_name: &str, ctx: &Context) -> Result<Action, Error> {
    let current_status = run.status.clone().unwrap_or_default();
    for step in &current_status.steps {
        if step.phase.is_terminal() {
            continue;
        }
        if let Some(workload_name) = &step.workload_name {
            let _ = ctx.store.delete::<Job>(namespace, workload_name).await;
        }
    }

    let mut status = current_status;
    status.phase = RunPhase::Cancelled;
    status.completion_time = status.completion_time.or(Some(Utc::now()));
    patch_status(namespace, run_name, ctx, &status).await?;
    Ok(Action::await_change())
}

async fn fail_run(
    run: &PipelineRun,
    namespace: &str,
    run_name: &str,
    ctx: &Context,
    reason: &str,
    message: &str,
) -> Result<Action, Error> {
    let mut status = run.status.clone().unwrap_or_default();
    status.phase = RunPhase::Failed;
    status.completion_time = status.completion_time.or(Some(Utc::now()));
    status.conditions.push(Condition::new(
        c8s_core::phase::condition_types::STEPS_COMPLETED,
        ConditionStatus::False,
        reason,
        message,
        Utc::now(),
    ));
    patch_status(namespace, run_name, ctx, &status).await?;
    Ok(Action::requeue(ctx.config.error_requeue))
}

async fn pending_with_condition(
    run: &PipelineRun,
    namespace: &str,
    run_name: &str,
    ctx: &Context,
    reason: &str,
    message: &str,
) -> Result<Action, Error> {
    let mut status = run.status.clone().unwrap_or_default();
    status.conditions.push(Condition::new(
        "SecretsReady",
        ConditionStatus::False,
        reason,
        message,
        Utc::now(),
    ));
    patch_status(namespace, run_name, ctx, &status).await?;
    Ok(Action::requeue(ctx.config.error_requeue))
}

async fn validate_secret_references(steps: &[Step], namespace: &str, ctx: &Context) -> Result<(), Error> {
    for step in steps {
        for secret_ref in &step.secrets {
            let secret: Secret = ctx
                .store
                .get_opt(namespace, &secret_ref.secret_name)
                .await?
                .ok_or_else(|| {
                    Error::Reference(ReferenceKind::Secret(secret_ref.secret_name.clone()))
                })?;
            let has_key = secret
                .data
                .as_ref()
                .map(|d| d.contains_key(&secret_ref.key))
                .unwrap_or(false)
                || secret
                    .string_data
                    .as_ref()
                    .map(|d| d.contains_key(&secret_ref.key))
                    .unwrap_or(false);
            if !has_key {
                return Err(Error::Reference(ReferenceKind::SecretKey {
                    secret: secret_ref.secret_name.clone(),
                    key: secret_ref.key.clone(),
                }));
            }
        }
    }
    Ok(())
}

async fn create_workload_if_absent(
    run: &PipelineRun,
    step: &Step,
    binding: &c8s_dag::Binding,
    namespace: &str,
    ctx: &Context,
) -> Result<String, Error> {
    let workload_name = c8s_mapper::workload_name(&run.name_any(), &step.name);
    if ctx.store.get_opt::<Job>(namespace, &workload_name).await?.is_some() {
        return Ok(workload_name);
    }
    let job = c8s_mapper::map_step_to_job(&c8s_mapper::MapperInput {
        run,
        step,
        binding,
        defaults: &ctx.config.defaults,
    })?;
    ctx.store.create(namespace, &job).await?;
    Ok(workload_name)
}

/// Start (or find) the step's log pipeline and return the URL a client
/// would fetch it from. A no-op returning `None` when the operator has no
/// log API wired up, or when the step's Job has no running pod yet — the
/// caller just tries again next reconcile.
async fn ensure_log_ingestion(
    ctx: &Context,
    namespace: &str,
    run_name: &str,
    step: &Step,
    workload_name: &str,
) -> Option<String> {
    let logs = ctx.logs.as_ref()?;
    let key: StepKey = (namespace.to_string(), run_name.to_string(), step.name.clone());

    if logs.registry.get(&key).is_some() {
        return Some(logs.retrieval_url(namespace, run_name, &step.name));
    }

    let pod_name = find_pod_for_job(ctx, namespace, workload_name).await?;
    let masker = secret_masker_for(step, namespace, ctx).await;
    let pipeline = logs.registry.pipeline_for(key, masker);

    let client = ctx.store.client().clone();
    let ingest_namespace = namespace.to_string();
    let ingest_pod = pod_name.clone();
    tokio::spawn(async move {
        if let Err(err) = c8s_logs::ingest::stream_pod_logs(client, &ingest_namespace, &ingest_pod, pipeline).await {
            warn!(pod = %ingest_pod, error = %err, "log ingestion task ended with error");
        }
    });

    Some(logs.retrieval_url(namespace, run_name, &step.name))
}

async fn find_pod_for_job(ctx: &Context, namespace: &str, job_name: &str) -> Option<String> {
    let api: Api<Pod> = Api::namespaced(ctx.store.client().clone(), namespace);
    let params = ListParams::default().labels(&format!("job-name={job_name}"));
    let pods = api.list(&params).await.ok()?;
    pods.items.into_iter().find_map(|p| p.metadata.name)
}

async fn secret_masker_for(step: &Step, namespace: &str, ctx: &Context) -> c8s_logs::SecretMasker {
    let mut values = Vec::new();
    for secret_ref in &step.secrets {
        let Ok(Some(secret)) = ctx.store.get_opt::<Secret>(namespace, &secret_ref.secret_name).await else {
            continue;
        };
        if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(&secret_ref.key)) {
            if let Ok(value) = String::from_utf8(bytes.0.clone()) {
                values.push(value);
            }
        } else if let Some(value) = secret.string_data.as_ref().and_then(|d| d.get(&secret_ref.key)) {
            values.push(value.clone());
        }
    }
    c8s_logs::SecretMasker::new(values)
}

async fn expand_into_matrix_children(
    run: &PipelineRun,
    namespace: &str,
    run_name: &str,
    config: &PipelineConfig,
    ctx: &Context,
) -> Result<Action, Error> {
    let bindings = c8s_dag::expand_matrix(config.spec.matrix.as_ref())?;

    for (index, binding) in bindings.iter().enumerate() {
        let mut child = run.clone();
        child.metadata.name = Some(format!("{run_name}-{index}"));
        child.metadata.resource_version = None;
        child.metadata.uid = None;
        // Addressable by label, not owner reference, so cluster GC deleting
        // the parent never cascades onto the children.
        child.metadata.owner_references = None;
        child
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(labels::LABEL_MATRIX_PARENT.to_string(), run_name.to_string());
        child.spec.matrix_index = Some(binding.clone());
        child.status = None;
        let _ = ctx.store.create::<PipelineRun>(namespace, &child).await;
    }

    let mut status = run.status.clone().unwrap_or_default();
    status.is_matrix_parent = true;
    patch_status(namespace, run_name, ctx, &status).await?;
    Ok(Action::requeue(ctx.config.reconcile_requeue))
}

async fn aggregate_matrix_parent(run: &PipelineRun, namespace: &str, ctx: &Context) -> Result<Action, Error> {
    let run_name = run.name_any();
    let all_runs: Vec<PipelineRun> = ctx.store.list(namespace).await?;
    let children: Vec<&PipelineRun> = all_runs
        .iter()
        .filter(|r| r.labels().get(labels::LABEL_MATRIX_PARENT).is_some_and(|p| p == &run_name))
        .collect();

    if children.is_empty() {
        return Ok(Action::requeue(ctx.config.reconcile_requeue));
    }

    let phases: Vec<RunPhase> = children
        .iter()
        .map(|c| c.status.as_ref().map(|s| s.phase).unwrap_or_default())
        .collect();

    let mut status = run.status.clone().unwrap_or_default();
    if !status.phase.is_terminal() {
        status.phase = if phases.iter().any(|p| *p == RunPhase::Failed) {
            RunPhase::Failed
        } else if phases.iter().all(|p| *p == RunPhase::Succeeded) {
            RunPhase::Succeeded
        } else if phases.iter().any(|p| *p == RunPhase::Running) {
            RunPhase::Running
        } else if phases.iter().all(|p| *p == RunPhase::Pending) {
            RunPhase::Pending
        } else {
            RunPhase::Running
        };
        if status.phase.is_terminal() {
            status.completion_time = status.completion_time.or(Some(Utc::now()));
        }
    }

    let changed = run.status.as_ref().map(|s| s.phase) != Some(status.phase);
    if changed {
        patch_status(namespace, &run_name, ctx, &status).await?;
    }

    Ok(if status.phase.is_terminal() {
        Action::await_change()
    } else {
        Action::requeue(ctx.config.reconcile_requeue)
    })
}

async fn patch_status(
    namespace: &str,
    name: &str,
    ctx: &Context,
    status: &c8s_core::crds::PipelineRunStatus,
) -> Result<(), Error> {
    let value = serde_json::to_value(status)?;
    ctx.store
        .patch_status::<PipelineRun>(namespace, name, value)
        .await?;
    Ok(())
}

fn requeue_for(phase: &RunPhase, ctx: &Context) -> Action {
    if phase.is_terminal() {
        Action::await_change()
    } else {
        Action::requeue(ctx.config.reconcile_requeue)
    }
}

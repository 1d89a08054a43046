//! Reconciler (component 4): wires `c8s-store`/`c8s-dag`/`c8s-mapper`/
//! `c8s-projector` together into a `kube::runtime::Controller` loop over
//! `PipelineRun`, triggered on either the Run itself or an owned `Job`
//! (section 5: "at-most-one concurrent reconcile per Run", enforced by the
//! `Controller`'s per-object work queue).
//!
//! Grounds the `Controller::new(...).owns(...).run(...)` wiring on
//! `other_examples/72abbc74_ASoldo-rust_operator__src-main.rs.rs`; the
//! manual finalizer add/remove-on-delete dance (rather than
//! `kube::runtime::finalizer`) grounds on that same file's
//! `ensure_finalizer`/`cleanup_children` pair, reshaped for a single
//! cleanup hook instead of four owned-resource kinds.

pub mod reconcile;

use std::sync::Arc;
use std::time::Duration;

use c8s_core::crds::PipelineRun;
use c8s_core::{labels, Defaults, Error, LogArchiver, NullArchiver};
use c8s_logs::LogRegistry;
use c8s_store::KubeStateStore;
use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use tracing::{error, info, warn};

/// Requeue/backoff timings, split out from `Defaults` so the operator
/// binary can tune them independently of the workload-mapping defaults.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub defaults: Defaults,
    pub reconcile_requeue: Duration,
    pub error_requeue: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        let defaults = Defaults::default();
        ReconcilerConfig {
            reconcile_requeue: Duration::from_secs(defaults.reconcile_requeue_seconds),
            error_requeue: Duration::from_secs(defaults.error_requeue_seconds),
            defaults,
        }
    }
}

/// Live-log wiring: the shared pipeline registry plus enough of the log
/// API's own address to hand back a retrieval URL (section 4.7 "Retrieval").
/// Optional — a `Context` built without `with_logs` just never populates
/// `StepStatus.log_url`, it doesn't fail reconciles.
#[derive(Clone)]
pub struct LogsHandle {
    pub registry: Arc<LogRegistry>,
    pub base_url: String,
}

impl LogsHandle {
    pub fn retrieval_url(&self, namespace: &str, run: &str, step: &str) -> String {
        format!(
            "{}/api/v1/namespaces/{namespace}/pipelineruns/{run}/logs/{step}",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Per-controller-run shared state, rebuilt once at process start-up and
/// handed to every reconcile invocation as an `Arc` (section 5: "no shared
/// mutable state persists in process memory across reconciles" — `Context`
/// itself is immutable, all mutable state lives in the cluster).
pub struct Context {
    pub store: KubeStateStore,
    pub archiver: Arc<dyn LogArchiver>,
    pub config: ReconcilerConfig,
    pub logs: Option<LogsHandle>,
}

impl Context {
    pub fn new(client: Client, config: ReconcilerConfig) -> Self {
        Context {
            store: KubeStateStore::new(client),
            archiver: Arc::new(NullArchiver),
            config,
            logs: None,
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn LogArchiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn with_logs(mut self, registry: Arc<LogRegistry>, base_url: impl Into<String>) -> Self {
        self.logs = Some(LogsHandle {
            registry,
            base_url: base_url.into(),
        });
        self
    }
}

async fn reconcile_run(run: Arc<PipelineRun>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = run
        .namespace()
        .ok_or_else(|| Error::validation("PipelineRun has no namespace"))?;
    let name = run.name_any();

    if run.meta().deletion_timestamp.is_some() {
        if has_finalizer(&run) {
            let action = reconcile::cleanup(&run, &ctx).await?;
            remove_finalizer(&namespace, &name, &ctx).await?;
            return Ok(action);
        }
        return Ok(Action::await_change());
    }

    if !has_finalizer(&run) {
        add_finalizer(&namespace, &name, &ctx).await?;
    }

    reconcile::apply(&run, &ctx).await
}

fn error_policy(run: Arc<PipelineRun>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(
        run = %run.name_any(),
        namespace = ?run.namespace(),
        error = %error,
        "reconcile failed"
    );
    Action::requeue(ctx.config.error_requeue)
}

fn has_finalizer(run: &PipelineRun) -> bool {
    run.finalizers().iter().any(|f| f == labels::FINALIZER_CLEANUP)
}

async fn add_finalizer(namespace: &str, name: &str, ctx: &Context) -> Result<(), Error> {
    let api: Api<PipelineRun> = Api::namespaced(ctx.store.client().clone(), namespace);
    let patch = serde_json::json!({ "metadata": { "finalizers": [labels::FINALIZER_CLEANUP] } });
    api.patch(
        name,
        &kube::api::PatchParams::default(),
        &kube::api::Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

async fn remove_finalizer(namespace: &str, name: &str, ctx: &Context) -> Result<(), Error> {
    let api: Api<PipelineRun> = Api::namespaced(ctx.store.client().clone(), namespace);
    let patch = serde_json::json!({ "metadata": { "finalizers": [] } });
    api.patch(
        name,
        &kube::api::PatchParams::default(),
        &kube::api::Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// Run the controller loop until the process is terminated. Watches
/// `PipelineRun` cluster-wide (or scoped to `namespace` when the operator is
/// configured with `C8S_NAMESPACE`) and re-triggers a Run's reconcile
/// whenever a `Job` it owns changes (section 4.4: "watches PipelineRun and
/// owned workloads, triggers on either").
pub async fn run(client: Client, ctx: Arc<Context>, namespace: Option<&str>) {
    let (runs, jobs): (Api<PipelineRun>, Api<Job>) = match namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    Controller::new(runs, watcher::Config::default())
        .owns(jobs, watcher::Config::default())
        .run(reconcile_run, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, _action)) => info!(run = %obj_ref.name, "reconciled"),
                Err(e) => error!(error = %e, "reconcile stream error"),
            }
        })
        .await;
}

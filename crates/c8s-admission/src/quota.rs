//! Quota validator (section 4.5): on `PipelineRun` create, sums the CPU and
//! memory requests the referenced `PipelineConfig` would ask for (applying
//! defaults for unset fields) and denies if it would push any namespace
//! `ResourceQuota`'s `used` past `hard`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use c8s_core::crds::{PipelineConfig, PipelineRun};
use c8s_core::quantity::{format_cpu_millis, format_memory_bytes, parse_cpu_millis, parse_memory_bytes};
use c8s_core::Defaults;
use c8s_store::StateStore;
use k8s_openapi::api::core::v1::ResourceQuota;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use tracing::warn;

use crate::AdmissionContext;

pub async fn validate(
    State(ctx): State<Arc<AdmissionContext>>,
    Json(review): Json<AdmissionReview<PipelineRun>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<PipelineRun> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed admission review");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };

    let response = AdmissionResponse::from(&request);

    if !matches!(request.operation, Operation::Create) {
        return Json(response.into_review());
    }

    let Some(run) = request.object.as_ref() else {
        return Json(response.into_review());
    };
    let Some(namespace) = request.namespace.clone() else {
        return Json(response.deny("PipelineRun admission request has no namespace").into_review());
    };

    match check_quota(run, &namespace, &ctx).await {
        Ok(None) => Json(response.into_review()),
        Ok(Some(reason)) => Json(response.deny(reason).into_review()),
        Err(err) => {
            warn!(error = %err, "quota validation failed to reach the API server");
            Json(response.deny(format!("could not validate quota: {err}")).into_review())
        }
    }
}

/// `Some(reason)` denies; `None` allows.
async fn check_quota(
    run: &PipelineRun,
    namespace: &str,
    ctx: &AdmissionContext,
) -> Result<Option<String>, c8s_core::Error> {
    let config: PipelineConfig = match ctx.store.get_opt(namespace, &run.spec.pipeline_config_ref).await? {
        Some(c) => c,
        None => {
            return Ok(Some(format!(
                "referenced PipelineConfig '{}' does not exist",
                run.spec.pipeline_config_ref
            )))
        }
    };

    let (requested_cpu_millis, requested_memory_bytes) = requested_totals(&config, &ctx.defaults)?;

    let quotas: Vec<ResourceQuota> = ctx.store.list(namespace).await?;
    if quotas.is_empty() {
        return Ok(None);
    }

    for quota in &quotas {
        let hard = quota.spec.as_ref().and_then(|s| s.hard.as_ref());
        let used = quota.status.as_ref().and_then(|s| s.used.as_ref());

        if let Some(deficit) = over_budget(hard, used, "cpu", requested_cpu_millis, parse_cpu_millis)? {
            return Ok(Some(format!(
                "quota exceeded for cpu: requested over available by {}",
                format_cpu_millis(deficit)
            )));
        }
        if let Some(deficit) = over_budget(hard, used, "memory", requested_memory_bytes, parse_memory_bytes)? {
            return Ok(Some(format!(
                "quota exceeded for memory: requested over available by {}",
                format_memory_bytes(deficit)
            )));
        }
    }

    Ok(None)
}

fn requested_totals(config: &PipelineConfig, defaults: &Defaults) -> Result<(i64, i64), c8s_core::Error> {
    let mut cpu_millis = 0i64;
    let mut memory_bytes = 0i64;
    for step in &config.spec.steps {
        let cpu = step.resources.cpu.as_deref().unwrap_or(&defaults.cpu_request);
        let memory = step.resources.memory.as_deref().unwrap_or(&defaults.memory_request);
        cpu_millis += parse_cpu_millis(cpu)?;
        memory_bytes += parse_memory_bytes(memory)?;
    }
    Ok((cpu_millis, memory_bytes))
}

/// Returns `Some(deficit)` in the same unit `parse` produces when
/// `requested` would push `used` past `hard` for `resource_name`. Resources
/// absent from `hard` are treated as unbounded for that quota object.
fn over_budget(
    hard: Option<&std::collections::BTreeMap<String, k8s_openapi::apimachinery::pkg::api::resource::Quantity>>,
    used: Option<&std::collections::BTreeMap<String, k8s_openapi::apimachinery::pkg::api::resource::Quantity>>,
    resource_name: &str,
    requested: i64,
    parse: fn(&str) -> Result<i64, c8s_core::Error>,
) -> Result<Option<i64>, c8s_core::Error> {
    let Some(hard_quantity) = hard.and_then(|h| h.get(resource_name)) else {
        return Ok(None);
    };
    let hard_value = parse(&hard_quantity.0)?;
    let used_value = match used.and_then(|u| u.get(resource_name)) {
        Some(q) => parse(&q.0)?,
        None => 0,
    };
    let available = hard_value - used_value;
    if requested > available {
        Ok(Some(requested - available))
    } else {
        Ok(None)
    }
}

//! Secret-reference validator (section 4.5): every `secrets[].secretName`
//! a `PipelineConfig`'s steps declare must name an extant Secret in the same
//! namespace, and the referenced key must exist in it.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use c8s_core::crds::PipelineConfig;
use c8s_store::StateStore;
use k8s_openapi::api::core::v1::Secret;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use tracing::warn;

use crate::AdmissionContext;

pub async fn validate(
    State(ctx): State<Arc<AdmissionContext>>,
    Json(review): Json<AdmissionReview<PipelineConfig>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<PipelineConfig> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed admission review");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };

    let response = AdmissionResponse::from(&request);

    let Some(config) = request.object.as_ref() else {
        return Json(response.into_review());
    };
    let Some(namespace) = request.namespace.clone() else {
        return Json(response.deny("PipelineConfig admission request has no namespace").into_review());
    };

    match missing_secrets(&config, &namespace, &ctx).await {
        Ok(missing) if missing.is_empty() => Json(response.into_review()),
        Ok(missing) => {
            let message = format!("unresolved secret references: {}", missing.join("; "));
            Json(response.deny(message).into_review())
        }
        Err(err) => {
            warn!(error = %err, "secret validation failed to reach the API server");
            Json(
                response
                    .deny(format!("could not validate secret references: {err}"))
                    .into_review(),
            )
        }
    }
}

async fn missing_secrets(
    config: &PipelineConfig,
    namespace: &str,
    ctx: &AdmissionContext,
) -> Result<Vec<String>, c8s_core::Error> {
    let mut missing = Vec::new();
    for step in &config.spec.steps {
        for secret_ref in &step.secrets {
            match ctx.store.get_opt::<Secret>(namespace, &secret_ref.secret_name).await? {
                None => missing.push(format!("secret '{}' not found", secret_ref.secret_name)),
                Some(secret) => {
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
                        missing.push(format!(
                            "key '{}' missing in secret '{}'",
                            secret_ref.key, secret_ref.secret_name
                        ));
                    }
                }
            }
        }
    }
    Ok(missing)
}

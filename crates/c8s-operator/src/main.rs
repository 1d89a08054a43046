//! Operator entrypoint (section 6, 9): one process running the reconciler
//! loop alongside the three HTTP services (admission, webhooks, log API),
//! sharing one `kube::Client` and one `opendal::Operator`.
//!
//! Grounds the bootstrap shape on `buildit_api`'s `main.rs` (tracing init,
//! env-driven config, `axum::serve` per listener) generalized to also spawn
//! the reconciler's `Controller` loop as a background task and to serve
//! three routers on three listeners instead of one.

mod config;

use std::sync::Arc;

use c8s_logs::{LogRegistry, ObjectStoreArchiver};
use c8s_reconciler::{Context as ReconcilerContext, ReconcilerConfig};
use c8s_store::KubeStateStore;
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::OperatorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("connecting to Kubernetes API");
    let client = Client::try_default().await?;

    let object_store = config.build_object_store()?;

    let log_registry = Arc::new(LogRegistry::new(
        config.log_ring_buffer_bytes,
        config.log_subscriber_channel_depth,
    ));
    let archiver = Arc::new(ObjectStoreArchiver::new(
        log_registry.clone(),
        object_store.clone(),
        config.log_prefix.clone(),
    ));

    let reconciler_config = ReconcilerConfig {
        defaults: config.defaults.clone(),
        reconcile_requeue: config.reconcile_requeue,
        error_requeue: config.error_requeue,
    };
    let log_api_base_url = format!("http://{}", config.log_api_bind_addr);
    let reconciler_ctx = Arc::new(
        ReconcilerContext::new(client.clone(), reconciler_config)
            .with_archiver(archiver)
            .with_logs(log_registry.clone(), log_api_base_url),
    );

    let reconciler_handle = {
        let client = client.clone();
        let ctx = reconciler_ctx.clone();
        let namespace = config.namespace.clone();
        tokio::spawn(async move {
            info!(namespace = ?namespace, "starting reconciler loop");
            c8s_reconciler::run(client, ctx, namespace.as_deref()).await;
        })
    };

    let admission_ctx = Arc::new(c8s_admission::AdmissionContext {
        store: KubeStateStore::new(client.clone()),
        defaults: config.defaults.clone(),
    });
    let admission_router = c8s_admission::router(admission_ctx);

    let webhooks_ctx = Arc::new(c8s_webhooks::Context {
        store: KubeStateStore::new(client.clone()),
    });
    let webhooks_router = c8s_webhooks::router(webhooks_ctx);

    let logs_ctx = Arc::new(c8s_logs::new_context(
        log_registry,
        object_store,
        config.log_prefix.clone(),
        config.signed_url_expiry,
    ));
    let logs_router = c8s_logs::router(logs_ctx);

    let admission_addr = config.admission_bind_addr;
    let webhooks_addr = config.webhook_bind_addr;
    let logs_addr = config.log_api_bind_addr;

    let admission_server = tokio::spawn(async move {
        info!(addr = %admission_addr, "starting admission service");
        let listener = tokio::net::TcpListener::bind(admission_addr).await?;
        axum::serve(listener, admission_router).await
    });

    let webhooks_server = tokio::spawn(async move {
        info!(addr = %webhooks_addr, "starting webhook service");
        let listener = tokio::net::TcpListener::bind(webhooks_addr).await?;
        axum::serve(listener, webhooks_router).await
    });

    let logs_server = tokio::spawn(async move {
        info!(addr = %logs_addr, "starting log API service");
        let listener = tokio::net::TcpListener::bind(logs_addr).await?;
        axum::serve(listener, logs_router).await
    });

    tokio::select! {
        res = reconciler_handle => {
            res?;
        }
        res = admission_server => {
            res??;
        }
        res = webhooks_server => {
            res??;
        }
        res = logs_server => {
            res??;
        }
    }

    Ok(())
}

//! Feeds a `StepPipeline` from a running pod's stdout/stderr (section 4.7
//! "Live phase": "fed by a reader that streams the container's stdout/stderr
//! from the workload API"). One task per active step, spawned by the
//! reconciler once a step's Job has a running pod.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use kube::{Api, Client};
use tokio::io::AsyncReadExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::warn;

use c8s_core::Error;

use crate::pipeline::StepPipeline;

/// `Api::<Pod>::log_stream` returns `impl futures::AsyncBufRead`, not a
/// `Stream`; `.compat()` bridges it to `tokio::io::AsyncRead` so chunks can
/// be pulled with a plain read loop instead of polled as stream items.
pub async fn stream_pod_logs(
    client: Client,
    namespace: &str,
    pod_name: &str,
    pipeline: Arc<StepPipeline>,
) -> Result<(), Error> {
    let api: Api<Pod> = Api::namespaced(client, namespace);
    let params = LogParams {
        follow: true,
        ..Default::default()
    };
    let mut reader = api.log_stream(pod_name, &params).await?.compat();

    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => pipeline.write(&buf[..n]),
            Err(err) => {
                warn!(pod = pod_name, error = %err, "pod log stream ended");
                break;
            }
        }
    }
    Ok(())
}

//! Workload mapper (component 2): a total pure function translating one
//! pipeline step, the owning run, and a matrix binding into a
//! `batch/v1 Job` manifest. Never touches the cluster API — the reconciler
//! is the one that creates what this returns.
//!
//! Grounded on `agentsphere-platform::pipeline::executor`'s `build_pod_spec`/
//! `build_env_vars`, generalized from a bare `Pod` to a `Job` wrapping a
//! `PodTemplateSpec` and from SQL-sourced identity fields to CRD-sourced
//! ones.

pub mod naming;

use std::collections::BTreeMap;

use c8s_core::crds::{PipelineRun, SecretRef, Step};
use c8s_core::duration::WireDuration;
use c8s_core::{labels, Defaults, Error};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec,
    ResourceRequirements as K8sResourceRequirements, SecretKeySelector, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

pub use naming::workload_name;

const WORKSPACE_VOLUME: &str = "workspace";

/// Everything the mapper needs to produce one step's `Job`. `binding` is the
/// matrix binding already applied to `step` by `c8s_dag::substitute_step` —
/// the mapper does not re-run substitution.
pub struct MapperInput<'a> {
    pub run: &'a PipelineRun,
    pub step: &'a Step,
    pub binding: &'a c8s_dag::Binding,
    pub defaults: &'a Defaults,
}

/// Build the `Job` for one ready step. Pure: the same inputs always produce
/// byte-identical output (field order aside), which the reconciler relies on
/// to decide whether a re-create is actually a no-op.
pub fn map_step_to_job(input: &MapperInput<'_>) -> Result<Job, Error> {
    let MapperInput {
        run,
        step,
        binding,
        defaults,
    } = *input;

    let run_name = run.meta().name.as_deref().ok_or_else(|| {
        Error::validation("PipelineRun has no name; cannot derive a workload name")
    })?;
    let namespace = run.meta().namespace.clone().unwrap_or_default();
    let name = workload_name(run_name, &step.name);

    let labels = build_labels(run, step, binding);
    let annotations = build_annotations(run);

    let env = build_env_vars(run, step, &namespace, defaults);
    let resources = build_resources(step, defaults);

    let container = Container {
        name: "step".to_string(),
        image: Some(step.image.clone()),
        command: Some(vec!["sh".to_string(), "-c".to_string()]),
        args: Some(vec![step.commands.join(" && ")]),
        working_dir: Some(defaults.workspace_path.clone()),
        env: Some(env),
        resources: Some(resources),
        volume_mounts: Some(vec![VolumeMount {
            name: WORKSPACE_VOLUME.to_string(),
            mount_path: defaults.workspace_path.clone(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let pod_spec = PodSpec {
        restart_policy: Some("Never".to_string()),
        containers: vec![container],
        volumes: Some(vec![Volume {
            name: WORKSPACE_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let owner_ref = run
        .controller_owner_ref(&())
        .ok_or_else(|| Error::validation("PipelineRun is missing uid; cannot set owner reference"))?;

    let job = Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            ttl_seconds_after_finished: Some(defaults.job_ttl_seconds_after_finished as i32),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(job_pod_labels(run, step)),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        status: None,
    };

    Ok(job)
}

fn job_pod_labels(run: &PipelineRun, step: &Step) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert(
        labels::LABEL_PIPELINE_RUN.to_string(),
        run.meta().name.clone().unwrap_or_default(),
    );
    m.insert(labels::LABEL_STEP.to_string(), step.name.clone());
    m
}

fn build_labels(
    run: &PipelineRun,
    step: &Step,
    binding: &c8s_dag::Binding,
) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert(
        labels::MANAGED_BY.to_string(),
        labels::MANAGED_BY_VALUE.to_string(),
    );
    m.insert(
        labels::LABEL_PIPELINE_CONFIG.to_string(),
        run.spec.pipeline_config_ref.clone(),
    );
    m.insert(
        labels::LABEL_PIPELINE_RUN.to_string(),
        run.meta().name.clone().unwrap_or_default(),
    );
    m.insert(labels::LABEL_STEP.to_string(), step.name.clone());
    m.insert(labels::LABEL_COMMIT.to_string(), run.spec.commit.clone());
    m.insert(labels::LABEL_BRANCH.to_string(), run.spec.branch.clone());
    for (dimension, value) in binding {
        m.insert(labels::matrix_dimension_label(dimension), value.clone());
    }
    m
}

fn build_annotations(run: &PipelineRun) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    if let Some(message) = &run.spec.commit_message {
        m.insert(labels::ANNOTATION_COMMIT_MESSAGE.to_string(), message.clone());
    }
    if let Some(author) = &run.spec.author {
        m.insert(labels::ANNOTATION_AUTHOR.to_string(), author.clone());
    }
    if let Some(triggered_by) = &run.spec.triggered_by {
        m.insert(
            labels::ANNOTATION_TRIGGERED_BY.to_string(),
            triggered_by.clone(),
        );
    }
    // Planned log/artifact URLs are filled in once the log pipeline has
    // assigned a destination; the mapper reserves the keys so the
    // reconciler can patch them in place rather than re-creating the Job.
    m.insert(labels::ANNOTATION_LOG_URL.to_string(), String::new());
    m
}

fn build_env_vars(
    run: &PipelineRun,
    step: &Step,
    namespace: &str,
    defaults: &Defaults,
) -> Vec<EnvVar> {
    let run_name = run.meta().name.clone().unwrap_or_default();
    let mut vars = vec![
        env_var(labels::env_vars::COMMIT, &run.spec.commit),
        env_var(labels::env_vars::BRANCH, &run.spec.branch),
        env_var(labels::env_vars::RUN_NAME, &run_name),
        env_var(labels::env_vars::STEP_NAME, &step.name),
        env_var(labels::env_vars::WORKSPACE, &defaults.workspace_path),
        env_var(labels::env_vars::NAMESPACE, namespace),
    ];

    for secret in &step.secrets {
        vars.push(secret_env_var(secret));
    }

    vars
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn secret_env_var(secret_ref: &SecretRef) -> EnvVar {
    EnvVar {
        name: secret_ref.env_var_name().to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret_ref.secret_name.clone(),
                key: secret_ref.key.clone(),
                optional: Some(false),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_resources(step: &Step, defaults: &Defaults) -> K8sResourceRequirements {
    let cpu = step
        .resources
        .cpu
        .clone()
        .unwrap_or_else(|| defaults.cpu_request.clone());
    let memory = step
        .resources
        .memory
        .clone()
        .unwrap_or_else(|| defaults.memory_request.clone());

    let quantities = BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu)),
        ("memory".to_string(), Quantity(memory)),
    ]);

    K8sResourceRequirements {
        // Section 4.2: requests from the step (or defaults), equal limits
        // unless the step overrides them separately — the CRD carries a
        // single `resources` field, so limits mirror requests.
        requests: Some(quantities.clone()),
        limits: Some(quantities),
        ..Default::default()
    }
}

/// Resolve a step's effective timeout: its own `timeout` field, falling
/// back to the cluster-wide default (section 4.2/6.1).
pub fn effective_timeout(step: &Step, defaults: &Defaults) -> WireDuration {
    step.timeout
        .unwrap_or_else(|| WireDuration::from_secs(defaults.step_timeout_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use c8s_core::crds::{PipelineRunSpec, PipelineRunStatus, ResourceRequirements};
    use kube::core::ObjectMeta as KubeObjectMeta;

    fn step(name: &str) -> Step {
        Step {
            name: name.to_string(),
            image: "alpine:3.19".to_string(),
            commands: vec!["echo one".to_string(), "echo two".to_string()],
            depends_on: vec![],
            resources: ResourceRequirements::default(),
            timeout: None,
            artifacts: vec![],
            secrets: vec![SecretRef {
                secret_name: "creds".to_string(),
                key: "token".to_string(),
                env_var: None,
            }],
            conditional: None,
        }
    }

    fn run() -> PipelineRun {
        PipelineRun {
            metadata: KubeObjectMeta {
                name: Some("my-run".to_string()),
                namespace: Some("ci".to_string()),
                uid: Some("abc-123".to_string()),
                ..Default::default()
            },
            spec: PipelineRunSpec {
                pipeline_config_ref: "my-config".to_string(),
                commit: "deadbeef".to_string(),
                branch: "main".to_string(),
                triggered_by: Some("alice".to_string()),
                triggered_at: None,
                matrix_index: None,
                commit_message: Some("fix thing".to_string()),
                author: Some("alice".to_string()),
            },
            status: Some(PipelineRunStatus::default()),
        }
    }

    #[test]
    fn maps_a_simple_step() {
        let r = run();
        let s = step("build");
        let binding = c8s_dag::Binding::new();
        let defaults = Defaults::default();
        let job = map_step_to_job(&MapperInput {
            run: &r,
            step: &s,
            binding: &binding,
            defaults: &defaults,
        })
        .unwrap();

        assert_eq!(job.metadata.name.as_deref(), Some("my-run-build"));
        assert_eq!(job.metadata.namespace.as_deref(), Some("ci"));
        assert_eq!(job.spec.as_ref().unwrap().backoff_limit, Some(0));

        let pod = job.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
        let container = &pod.containers[0];
        assert_eq!(container.args.as_ref().unwrap()[0], "echo one && echo two");

        let env_names: Vec<&str> = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert!(env_names.contains(&labels::env_vars::RUN_NAME));
        assert!(env_names.contains(&"token"));
    }

    #[test]
    fn mapping_is_deterministic() {
        let r = run();
        let s = step("test");
        let binding = c8s_dag::Binding::new();
        let defaults = Defaults::default();
        let input = MapperInput {
            run: &r,
            step: &s,
            binding: &binding,
            defaults: &defaults,
        };
        let a = map_step_to_job(&input).unwrap();
        let b = map_step_to_job(&input).unwrap();
        assert_eq!(a.metadata.name, b.metadata.name);
        assert_eq!(a.metadata.labels, b.metadata.labels);
        assert_eq!(
            a.spec.unwrap().template.spec.unwrap().containers[0].args,
            b.spec.unwrap().template.spec.unwrap().containers[0].args
        );
    }

    #[test]
    fn matrix_binding_becomes_dimension_labels() {
        let r = run();
        let s = step("test");
        let mut binding = c8s_dag::Binding::new();
        binding.insert("os".to_string(), "linux".to_string());
        let defaults = Defaults::default();
        let job = map_step_to_job(&MapperInput {
            run: &r,
            step: &s,
            binding: &binding,
            defaults: &defaults,
        })
        .unwrap();
        let job_labels = job.metadata.labels.unwrap();
        assert_eq!(
            job_labels.get(&labels::matrix_dimension_label("os")),
            Some(&"linux".to_string())
        );
    }

    #[test]
    fn resources_fall_back_to_defaults() {
        let r = run();
        let s = step("build");
        let binding = c8s_dag::Binding::new();
        let defaults = Defaults::default();
        let job = map_step_to_job(&MapperInput {
            run: &r,
            step: &s,
            binding: &binding,
            defaults: &defaults,
        })
        .unwrap();
        let pod = job.spec.unwrap().template.spec.unwrap();
        let resources = pod.containers[0].resources.as_ref().unwrap();
        let requests = resources.requests.as_ref().unwrap();
        assert_eq!(requests["cpu"], Quantity(defaults.cpu_request.clone()));
        assert_eq!(
            requests["memory"],
            Quantity(defaults.memory_request.clone())
        );
    }
}

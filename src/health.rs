use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Pod;
use tracing::info;

use crate::config::Config;
use crate::error::HealthError;
use crate::gateway::ClusterStateGateway;
use crate::types::{PodHealthSummary, PodHealthVerdict, PodPhase};

/// List every pod in the cluster and classify it. Verdicts keep the listing
/// order; only unhealthy pods are emitted.
pub async fn collect_unhealthy_pods<G: ClusterStateGateway>(
    gateway: &G,
    config: &Config,
) -> Result<PodHealthSummary, HealthError> {
    let pods = gateway.list_all_pods().await?;
    let now = Utc::now();
    let verdicts = classify_pods(&pods, config.restart_threshold, now);
    info!(
        total = pods.len(),
        unhealthy = verdicts.len(),
        "pod health classification complete"
    );
    Ok(PodHealthSummary {
        unhealthy_count: verdicts.len(),
        pods: verdicts,
    })
}

pub fn classify_pods(
    pods: &[Pod],
    restart_threshold: i32,
    now: DateTime<Utc>,
) -> Vec<PodHealthVerdict> {
    pods.iter()
        .filter_map(|pod| classify_pod(pod, restart_threshold, now))
        .collect()
}

/// A pod is unhealthy if its phase is not Running, OR it is not ready, OR its
/// restart count exceeds the threshold. Returns `None` for healthy pods.
pub fn classify_pod(
    pod: &Pod,
    restart_threshold: i32,
    now: DateTime<Utc>,
) -> Option<PodHealthVerdict> {
    let name = pod.metadata.name.as_ref()?.clone();
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();

    let phase = PodPhase::parse(
        pod.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or(""),
    );
    let ready = is_ready(pod);
    let restarts = first_container_restarts(pod);

    if phase == PodPhase::Running && ready && restarts <= restart_threshold {
        return None;
    }

    Some(PodHealthVerdict {
        name,
        namespace,
        status: phase,
        ready,
        restarts,
        reason: failure_reason(pod),
        age: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| format_age(now - t.0))
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

fn is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

fn first_container_restarts(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.first())
        .map(|cs| cs.restart_count)
        .unwrap_or(0)
}

/// Reason precedence: current waiting reason, then terminated reason, then
/// "Unknown".
fn failure_reason(pod: &Pod) -> String {
    let state = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.first())
        .and_then(|cs| cs.state.as_ref());

    if let Some(state) = state {
        if let Some(reason) = state.waiting.as_ref().and_then(|w| w.reason.clone()) {
            return reason;
        }
        if let Some(reason) = state.terminated.as_ref().and_then(|t| t.reason.clone()) {
            return reason;
        }
    }
    "Unknown".to_string()
}

/// Age as the single largest whole unit: days if at least 24h, else hours if
/// at least 1h, else minutes. Never a composite like "2d 3h".
pub fn format_age(elapsed: Duration) -> String {
    if elapsed.num_days() >= 1 {
        format!("{}d", elapsed.num_days())
    } else if elapsed.num_hours() >= 1 {
        format!("{}h", elapsed.num_hours())
    } else {
        format!("{}m", elapsed.num_minutes().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateTerminated, ContainerStateWaiting, ContainerStatus,
        PodCondition, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn test_pod(name: &str, phase: &str, ready: bool, restarts: i32) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                creation_timestamp: Some(Time(Utc::now() - Duration::minutes(90))),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                container_statuses: Some(vec![ContainerStatus {
                    name: "main".to_string(),
                    restart_count: restarts,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_healthy_pod_is_excluded() {
        let pod = test_pod("ok", "Running", true, 0);
        assert!(classify_pod(&pod, 3, Utc::now()).is_none());

        // Right at the threshold still counts as healthy
        let pod = test_pod("ok", "Running", true, 3);
        assert!(classify_pod(&pod, 3, Utc::now()).is_none());
    }

    #[test]
    fn test_each_condition_triggers_unhealthy() {
        let now = Utc::now();

        let pending = test_pod("p", "Pending", true, 0);
        assert!(classify_pod(&pending, 3, now).is_some());

        let unready = test_pod("u", "Running", false, 0);
        let verdict = classify_pod(&unready, 3, now).unwrap();
        assert_eq!(verdict.status, PodPhase::Running);
        assert!(!verdict.ready);

        let restarty = test_pod("r", "Running", true, 4);
        let verdict = classify_pod(&restarty, 3, now).unwrap();
        assert_eq!(verdict.restarts, 4);
    }

    #[test]
    fn test_reason_precedence_waiting_over_terminated() {
        let mut pod = test_pod("crash", "Running", false, 5);
        let statuses = pod
            .status
            .as_mut()
            .unwrap()
            .container_statuses
            .as_mut()
            .unwrap();
        statuses[0].state = Some(ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some("CrashLoopBackOff".to_string()),
                ..Default::default()
            }),
            terminated: Some(ContainerStateTerminated {
                reason: Some("Error".to_string()),
                exit_code: 1,
                ..Default::default()
            }),
            ..Default::default()
        });

        let verdict = classify_pod(&pod, 3, Utc::now()).unwrap();
        assert_eq!(verdict.reason, "CrashLoopBackOff");

        // Without a waiting reason the terminated reason wins
        statuses_terminated_only(&mut pod);
        let verdict = classify_pod(&pod, 3, Utc::now()).unwrap();
        assert_eq!(verdict.reason, "OOMKilled");
    }

    fn statuses_terminated_only(pod: &mut Pod) {
        let statuses = pod
            .status
            .as_mut()
            .unwrap()
            .container_statuses
            .as_mut()
            .unwrap();
        statuses[0].state = Some(ContainerState {
            terminated: Some(ContainerStateTerminated {
                reason: Some("OOMKilled".to_string()),
                exit_code: 137,
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    #[test]
    fn test_reason_falls_back_to_unknown() {
        let pod = test_pod("quiet", "Running", false, 1);
        let verdict = classify_pod(&pod, 3, Utc::now()).unwrap();
        assert_eq!(verdict.reason, "Unknown");
    }

    #[test]
    fn test_age_buckets_to_single_unit() {
        assert_eq!(format_age(Duration::minutes(90)), "1h");
        assert_eq!(format_age(Duration::minutes(5)), "5m");
        assert_eq!(format_age(Duration::minutes(0)), "0m");
        assert_eq!(format_age(Duration::hours(23)), "23h");
        assert_eq!(format_age(Duration::hours(24)), "1d");
        assert_eq!(format_age(Duration::hours(51)), "2d");
    }

    #[test]
    fn test_listing_order_is_preserved() {
        let pods = vec![
            test_pod("b-pod", "Failed", false, 0),
            test_pod("a-pod", "Pending", false, 0),
        ];
        let verdicts = classify_pods(&pods, 3, Utc::now());
        let names: Vec<&str> = verdicts.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["b-pod", "a-pod"]);
    }
}

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::{NamespaceUsage, PodHealthSummary, PodPhase, ResourceUsageSummary};

/// Nodes at or above this share of allocatable CPU or memory get flagged in
/// the recommendations.
const HOT_NODE_PERCENT: f64 = 85.0;

/// Render the narrative health report. Four fixed sections; output is
/// identical for identical inputs except the generation timestamp.
pub fn render_report(
    cluster_name: &str,
    top_namespaces: usize,
    pods: &PodHealthSummary,
    usage: &ResourceUsageSummary,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();

    out.push_str("# 🏥 Kubernetes Cluster Health Report\n\n");
    out.push_str(&format!(
        "**Generated**: {}\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!("**Cluster**: {}\n\n", cluster_name));

    // Executive Summary
    out.push_str("## Executive Summary\n\n");
    if pods.unhealthy_count == 0 {
        out.push_str("✅ **All pods are healthy!**\n\n");
    } else {
        out.push_str(&format!(
            "⚠️ **{} unhealthy pods detected**\n\n",
            pods.unhealthy_count
        ));
    }

    // Pod Health
    out.push_str("## Pod Health\n\n");
    if pods.pods.is_empty() {
        out.push_str("All pods are running normally with no issues detected.\n\n");
    } else {
        for pod in &pods.pods {
            out.push_str(&format!("### {}\n", pod.name));
            out.push_str(&format!("- **Namespace**: {}\n", pod.namespace));
            out.push_str(&format!("- **Status**: {}\n", pod.status));
            out.push_str(&format!("- **Restarts**: {}\n", pod.restarts));
            out.push_str(&format!("- **Reason**: {}\n", pod.reason));
            out.push_str(&format!("- **Age**: {}\n\n", pod.age));
        }
    }

    // Resource Usage
    out.push_str("## Resource Usage\n\n");
    out.push_str("### Nodes\n\n");
    if usage.nodes.is_empty() {
        out.push_str("No node data available.\n\n");
    } else {
        for node in &usage.nodes {
            out.push_str(&format!("**{}**\n", node.name));
            out.push_str(&format!("- CPU: {}\n", node.cpu_usage));
            out.push_str(&format!("- Memory: {}\n", node.memory_usage));
            out.push_str(&format!("- Status: {}\n\n", node.status));
        }
    }

    out.push_str("### Top Namespaces by Resource Request\n\n");
    let ranked = rank_namespaces(&usage.namespaces, top_namespaces);
    if ranked.is_empty() {
        out.push_str("No namespace data available.\n\n");
    } else {
        for ns in &ranked {
            out.push_str(&format!(
                "- **{}**: CPU {}m, Memory {}Mi\n",
                ns.namespace, ns.cpu_millicores, ns.memory_mib
            ));
        }
        out.push('\n');
    }

    // Recommendations
    out.push_str("## Recommendations\n\n");
    for line in recommendations(pods, usage) {
        out.push_str(&format!("- {}\n", line));
    }
    out.push('\n');

    out.push_str("---\n*Report generated by kube-health-agent*\n");
    out
}

/// Top namespaces by CPU request, descending. The sort is stable, so ties
/// keep the namespace listing order.
pub fn rank_namespaces(namespaces: &[NamespaceUsage], top: usize) -> Vec<NamespaceUsage> {
    let mut ranked = namespaces.to_vec();
    ranked.sort_by(|a, b| b.cpu_millicores.cmp(&a.cpu_millicores));
    ranked.truncate(top);
    ranked
}

/// Derive recommendations from the actual findings. With unhealthy pods the
/// block is remediation-oriented and names specifics; otherwise it is
/// optimization-oriented.
pub fn recommendations(pods: &PodHealthSummary, usage: &ResourceUsageSummary) -> Vec<String> {
    let mut lines = Vec::new();

    if pods.unhealthy_count > 0 {
        let crashlooping: Vec<String> = pods
            .pods
            .iter()
            .filter(|p| p.reason == "CrashLoopBackOff")
            .map(|p| format!("{}/{}", p.namespace, p.name))
            .collect();
        if !crashlooping.is_empty() {
            lines.push(format!(
                "Investigate CrashLoopBackOff pods and their container logs: {}",
                crashlooping.join(", ")
            ));
        }

        let restart_heavy: Vec<String> = pods
            .pods
            .iter()
            .filter(|p| p.restarts > 3)
            .map(|p| format!("{}/{} ({} restarts)", p.namespace, p.name, p.restarts))
            .collect();
        if !restart_heavy.is_empty() {
            lines.push(format!(
                "Check application logs and resource limits for frequently restarting pods: {}",
                restart_heavy.join(", ")
            ));
        }

        let pending: Vec<String> = pods
            .pods
            .iter()
            .filter(|p| p.status == PodPhase::Pending)
            .map(|p| format!("{}/{}", p.namespace, p.name))
            .collect();
        if !pending.is_empty() {
            lines.push(format!(
                "Review scheduling constraints and cluster capacity for pending pods: {}",
                pending.join(", ")
            ));
        }

        lines.push(
            "Verify health checks and resource requests/limits on the affected workloads."
                .to_string(),
        );
    }

    let not_ready: Vec<&str> = usage
        .nodes
        .iter()
        .filter(|n| n.status != "Ready")
        .map(|n| n.name.as_str())
        .collect();
    if !not_ready.is_empty() {
        lines.push(format!(
            "Inspect NotReady nodes before scheduling more work: {}",
            not_ready.join(", ")
        ));
    }

    let hot_nodes: Vec<String> = usage
        .nodes
        .iter()
        .filter(|n| n.cpu_pct >= HOT_NODE_PERCENT || n.memory_pct >= HOT_NODE_PERCENT)
        .map(|n| format!("{} (CPU {}, Memory {})", n.name, n.cpu_usage, n.memory_usage))
        .collect();
    if !hot_nodes.is_empty() {
        lines.push(format!(
            "Rebalance or expand capacity for nodes running hot: {}",
            hot_nodes.join(", ")
        ));
    }

    if pods.unhealthy_count == 0 {
        let heaviest = rank_namespaces(&usage.namespaces, 3);
        if !heaviest.is_empty() {
            let named: Vec<String> = heaviest
                .iter()
                .map(|ns| format!("{} ({}m)", ns.namespace, ns.cpu_millicores))
                .collect();
            lines.push(format!(
                "Review resource requests vs actual usage in the heaviest namespaces: {}",
                named.join(", ")
            ));
        }
        lines.push("Consider scaling down over-provisioned deployments.".to_string());
        lines.push("Enable cluster autoscaling for cost optimization.".to_string());
    }

    lines
}

// ABOUTME: End-to-end tests of the volume sync procedure against a scripted cluster
// ABOUTME: The helper pod must be deleted exactly once on every path after it was submitted

mod common;

use common::{fail, kubectl, ok, Call, FakeCluster, Reply};
use kube_migrate::commands::{sync_pvc, SyncOutcome, SyncPvcOptions};
use kube_migrate::config::VolumeSyncConfig;
use kube_migrate::errors::MigrateError;
use kube_migrate::interrupt::{InterruptSignal, InterruptTrigger};
use kube_migrate::volume::{HelperPod, Readiness};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Knobs for one simulated namespace with a claim and a node directory
struct Node {
    claim_exists: bool,
    phase: &'static str,
    host_dir_exists: bool,
    copy_fails: bool,
    host_stats: (u64, u64),
    pvc_stats: (u64, u64),
    stats_fail: bool,
    delete_fails: bool,
    interrupt_copy: Option<InterruptTrigger>,
    interrupt_poll: Option<InterruptTrigger>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            claim_exists: true,
            phase: "Running",
            host_dir_exists: true,
            copy_fails: false,
            host_stats: (42, 1_048_576),
            pvc_stats: (42, 1_048_576),
            stats_fail: false,
            delete_fails: false,
            interrupt_copy: None,
            interrupt_poll: None,
        }
    }
}

impl Node {
    fn into_cluster(self) -> FakeCluster {
        FakeCluster::new(move |call: &Call| {
            if call.is_kubectl("get", "pvc") {
                return if self.claim_exists {
                    ok("NAME   STATUS   VOLUME   CAPACITY\ndata   Bound    pv-1     10Gi\n")
                } else {
                    fail(1, "Error from server (NotFound): persistentvolumeclaims \"data\" not found")
                };
            }
            if call.is_kubectl("apply", "-f") {
                return ok("pod/helper created\n");
            }
            if call.is_kubectl("get", "pod") {
                if let Some(trigger) = &self.interrupt_poll {
                    trigger.fire();
                    return Reply::Hang;
                }
                return ok(self.phase);
            }
            if call.is_kubectl("delete", "pod") {
                return if self.delete_fails {
                    fail(1, "error: You must be logged in to the server (Unauthorized)")
                } else {
                    ok("")
                };
            }
            if call.execs("test") {
                return if self.host_dir_exists {
                    ok("")
                } else {
                    fail(1, "")
                };
            }

            let Some(script) = call.shell_script() else {
                return fail(1, "unexpected kubectl call");
            };
            if script.contains("tar -cf") {
                if let Some(trigger) = &self.interrupt_copy {
                    trigger.fire();
                    return Reply::Hang;
                }
                return if self.copy_fails {
                    fail(1, "tar: short read\nSync failed")
                } else {
                    ok("Sync completed successfully\n")
                };
            }
            if self.stats_fail && script.contains("/pvc-data") {
                return fail(1, "find: /pvc-data: Permission denied");
            }
            let (files, bytes) = if script.contains("/host-data") {
                self.host_stats
            } else {
                self.pvc_stats
            };
            if script.starts_with("find") {
                ok(format!("{}\n", files))
            } else {
                ok(format!("{}\n", bytes))
            }
        })
    }
}

fn config() -> VolumeSyncConfig {
    VolumeSyncConfig {
        ready_timeout: Duration::from_millis(60),
        poll_interval: Duration::from_millis(10),
        ..VolumeSyncConfig::default()
    }
}

fn options(verify: bool, dry_run: bool) -> SyncPvcOptions {
    SyncPvcOptions {
        pvc_name: "data".to_string(),
        namespace: "prod".to_string(),
        host_path: "/srv/data/".to_string(),
        verify,
        dry_run,
    }
}

fn is_apply(call: &Call) -> bool {
    call.is_kubectl("apply", "-f")
}

fn is_delete(call: &Call) -> bool {
    call.is_kubectl("delete", "pod")
}

fn is_bulk_copy(call: &Call) -> bool {
    call.shell_script()
        .map(|s| s.contains("tar -cf"))
        .unwrap_or(false)
}

#[tokio::test]
async fn test_sync_with_verification() {
    let (kubectl, cluster) = kubectl(Node::default().into_cluster());

    let outcome = sync_pvc(&kubectl, &config(), &options(true, false), &InterruptSignal::never())
        .await
        .unwrap();

    let SyncOutcome::Synced { report: Some(report) } = &outcome else {
        panic!("expected a verified sync, got {:?}", outcome);
    };
    assert!(report.is_match());
    assert_eq!(report.host.file_count, 42);

    // manifest carries the normalized host path and the claim
    let apply = cluster.find(is_apply).unwrap();
    let manifest: serde_json::Value =
        serde_json::from_slice(apply.stdin.as_deref().unwrap()).unwrap();
    assert_eq!(manifest["metadata"]["namespace"], "prod");
    assert_eq!(manifest["spec"]["volumes"][0]["hostPath"]["path"], "/srv/data");
    assert_eq!(
        manifest["spec"]["volumes"][1]["persistentVolumeClaim"]["claimName"],
        "data"
    );
    let pod_name = manifest["metadata"]["name"].as_str().unwrap().to_string();
    assert!(pod_name.starts_with("pvc-sync-data-"));

    // the copy runs inside the helper, and the helper is deleted last
    let copy = cluster.find(is_bulk_copy).unwrap();
    assert_eq!(copy.exec_pod(), Some(pod_name.as_str()));
    assert_eq!(cluster.count(is_delete), 1);
    let calls = cluster.calls();
    let last = calls.last().unwrap();
    assert!(is_delete(last));
    assert_eq!(last.args[2], pod_name);
}

#[tokio::test]
async fn test_dry_run_never_creates_helper() {
    let (kubectl, cluster) = kubectl(Node::default().into_cluster());

    let outcome = sync_pvc(&kubectl, &config(), &options(false, true), &InterruptSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::DryRun);
    assert_eq!(cluster.count(is_apply), 0);
    assert_eq!(cluster.count(is_delete), 0);
    assert_eq!(cluster.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_claim_aborts_before_helper() {
    let node = Node {
        claim_exists: false,
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let err = sync_pvc(&kubectl, &config(), &options(false, false), &InterruptSignal::never())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("PVC 'data' not found in namespace 'prod'"));
    assert_eq!(cluster.count(is_apply), 0);
    assert_eq!(cluster.count(is_delete), 0);
}

#[tokio::test]
async fn test_relative_host_path_rejected_before_any_call() {
    let (kubectl, cluster) = kubectl(Node::default().into_cluster());
    let mut options = options(false, false);
    options.host_path = "srv/data".to_string();

    assert!(
        sync_pvc(&kubectl, &config(), &options, &InterruptSignal::never())
            .await
            .is_err()
    );
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn test_pending_helper_times_out_and_is_deleted() {
    let node = Node {
        phase: "Pending",
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let err = sync_pvc(&kubectl, &config(), &options(false, false), &InterruptSignal::never())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("did not become ready"));
    assert!(cluster.count(|c| c.is_kubectl("get", "pod")) >= 2);
    assert_eq!(cluster.count(is_bulk_copy), 0);
    assert_eq!(cluster.count(is_delete), 1);
}

#[tokio::test]
async fn test_failed_helper_stops_polling() {
    let node = Node {
        phase: "Failed",
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let err = sync_pvc(&kubectl, &config(), &options(false, false), &InterruptSignal::never())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("failed to start"));
    assert_eq!(cluster.count(|c| c.is_kubectl("get", "pod")), 1);
    assert_eq!(cluster.count(is_delete), 1);
}

#[tokio::test]
async fn test_inaccessible_host_path_deletes_helper() {
    let node = Node {
        host_dir_exists: false,
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let err = sync_pvc(&kubectl, &config(), &options(false, false), &InterruptSignal::never())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("is not accessible"));
    assert_eq!(cluster.count(is_bulk_copy), 0);
    assert_eq!(cluster.count(is_delete), 1);
}

#[tokio::test]
async fn test_copy_failure_surfaces_output_and_deletes_helper() {
    let node = Node {
        copy_fails: true,
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let err = sync_pvc(&kubectl, &config(), &options(true, false), &InterruptSignal::never())
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Sync failed"));
    assert_eq!(MigrateError::remote_exit_code(&err), Some(1));
    assert_eq!(cluster.count(is_delete), 1);
}

#[tokio::test]
async fn test_verification_mismatch_is_not_fatal() {
    let node = Node {
        pvc_stats: (41, 1_040_000),
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let outcome = sync_pvc(&kubectl, &config(), &options(true, false), &InterruptSignal::never())
        .await
        .unwrap();

    let SyncOutcome::Synced { report: Some(report) } = &outcome else {
        panic!("expected a verification report, got {:?}", outcome);
    };
    assert!(!report.counts_match());
    assert!(!report.is_match());
    assert_eq!(cluster.count(is_delete), 1);
}

#[tokio::test]
async fn test_verification_probe_failure_is_not_fatal() {
    let node = Node {
        stats_fail: true,
        ..Node::default()
    };
    let (kubectl, _) = kubectl(node.into_cluster());

    let outcome = sync_pvc(&kubectl, &config(), &options(true, false), &InterruptSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synced { report: None });
}

#[tokio::test]
async fn test_failed_teardown_keeps_successful_outcome() {
    let node = Node {
        delete_fails: true,
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let outcome = sync_pvc(&kubectl, &config(), &options(false, false), &InterruptSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Synced { report: None });
    assert_eq!(cluster.count(is_delete), 1);
}

#[tokio::test]
async fn test_interrupt_during_copy_deletes_helper() {
    let (trigger, signal) = InterruptSignal::pair();
    let node = Node {
        interrupt_copy: Some(trigger),
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let err = sync_pvc(&kubectl, &config(), &options(true, false), &signal)
        .await
        .unwrap_err();

    assert!(MigrateError::is_interrupted(&err));
    assert_eq!(cluster.count(is_delete), 1);
    // nothing after the copy ran
    assert_eq!(
        cluster.count(|c| c.shell_script().map(|s| s.contains("du -sb")).unwrap_or(false)),
        0
    );
}

#[tokio::test]
async fn test_interrupt_while_waiting_for_helper_deletes_it() {
    let (trigger, signal) = InterruptSignal::pair();
    let node = Node {
        interrupt_poll: Some(trigger),
        ..Node::default()
    };
    let (kubectl, cluster) = kubectl(node.into_cluster());

    let err = sync_pvc(&kubectl, &config(), &options(false, false), &signal)
        .await
        .unwrap_err();

    assert!(MigrateError::is_interrupted(&err));
    assert_eq!(cluster.count(|c| c.is_kubectl("get", "pod")), 1);
    assert_eq!(cluster.count(|c| c.execs("test")), 0);
    assert_eq!(cluster.count(is_bulk_copy), 0);
    assert_eq!(cluster.count(is_delete), 1);
}

#[tokio::test]
async fn test_await_ready_with_unbounded_timeout() {
    let polls = AtomicUsize::new(0);
    let (kubectl, cluster) = kubectl(FakeCluster::new(move |call: &Call| {
        assert!(call.is_kubectl("get", "pod"));
        if polls.fetch_add(1, Ordering::SeqCst) < 2 {
            ok("Pending")
        } else {
            ok("Running")
        }
    }));
    let helper = HelperPod::for_claim("data", "prod", &VolumeSyncConfig::default());

    let readiness = helper
        .await_ready(&kubectl, Duration::MAX, Duration::from_millis(1))
        .await;

    assert_eq!(readiness, Readiness::Ready);
    assert_eq!(cluster.calls().len(), 3);
}

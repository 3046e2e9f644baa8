//! Node lease lifecycle scenario against the simulated cluster.
//!
//! These tests run the full scenario, including the restore, and check:
//!
//! 1. A four node cluster passes and is restored to four nodes
//! 2. Unsupported providers and tiny clusters are skipped without touching the cluster
//! 3. Multiple node groups fail before touching the cluster
//! 4. Lease GC and survivor lease failures are reported with the node name
//! 5. Restore runs after failures, and restore failures are fatal
//! 6. The provider grace delay is applied only when configured
//! 7. Lease lookup errors are retried and never taken as deletion
//! 8. Finished system pods do not block the restore, and panics still restore
//!
//! ## Running
//!
//! ```bash
//! cargo test -p nodelease-e2e --test node_lease
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use nodelease_cluster::{
    ClusterError, ClusterHandle, Lease, LeaseRegistry, NodeGroupScaler, NodeLister, Pod,
    PodLister, PodPhase,
};
use nodelease_e2e::{
    ConfigError, NodeLeaseScenario, Provider, ScenarioConfig, ScenarioError, ScenarioOutcome,
    SkipReason, Step,
};
use nodelease_id::{GroupName, Namespace, NodeName};
use nodelease_testing::SimCluster;
use rstest::rstest;
use tokio::time::Instant;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nodelease_testing=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn sim(nodes: u32) -> Arc<SimCluster> {
    Arc::new(SimCluster::with_nodes(nodes).unwrap())
}

fn config_for(cluster: &SimCluster, provider: Provider, node_count: u32) -> ScenarioConfig {
    ScenarioConfig::new(provider, vec![cluster.group().clone()], node_count)
}

fn scenario(cluster: &Arc<SimCluster>, config: ScenarioConfig) -> NodeLeaseScenario {
    NodeLeaseScenario::new(config, ClusterHandle::from_backend(cluster.clone()))
}

/// Ready node count and system pod count after the run.
async fn cluster_shape(cluster: &SimCluster) -> (usize, usize) {
    let nodes = cluster.list_ready_schedulable_nodes().await.unwrap().len();
    let pods = cluster.list_pods(&Namespace::system()).await.unwrap();
    let ready_pods = pods.iter().filter(|p| p.is_running_ready()).count();
    assert_eq!(ready_pods, pods.len(), "all system pods ready");
    (nodes, pods.len())
}

#[tokio::test(start_paused = true)]
async fn test_four_node_cluster_passes_and_is_restored() {
    init_tracing();
    let cluster = sim(4);
    let victim = cluster.node_name(2).unwrap();
    cluster.set_removal_victim(victim.clone()).await;

    let outcome = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap();

    let report = outcome.report().expect("scenario passed");
    assert_eq!(report.removed, victim);
    assert_eq!(report.baseline.len(), 4);
    assert_eq!(report.disrupted.len(), 3);
    assert!(!report.disrupted.contains(&victim));
    assert_eq!(report.system_pods, 3 + 4);

    // Restored to the original node count and system pod count.
    assert_eq!(cluster.resize_history().await, vec![3, 4]);
    assert_eq!(cluster.group_size(cluster.group()).await.unwrap(), 4);
    assert_eq!(cluster_shape(&cluster).await, (4, report.system_pods));

    // The victim's lease stayed gone, the replacement got one.
    let holders = cluster.lease_holders().await;
    assert!(!holders.contains(&victim));
    assert_eq!(holders, cluster.member_names().await);
}

#[tokio::test(start_paused = true)]
async fn test_default_removal_picks_newest_node() {
    let cluster = sim(3);

    let outcome = scenario(&cluster, config_for(&cluster, Provider::Aws, 3))
        .run()
        .await
        .unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.removed, cluster.node_name(3).unwrap());
}

#[rstest]
#[case("azure")]
#[case("local")]
#[tokio::test(start_paused = true)]
async fn test_unsupported_provider_skips(#[case] provider: &str) {
    let cluster = sim(4);

    let outcome = scenario(&cluster, config_for(&cluster, provider.parse().unwrap(), 4))
        .run()
        .await
        .unwrap();

    assert!(outcome.is_skipped());
    assert!(matches!(
        outcome,
        ScenarioOutcome::Skipped(SkipReason::UnsupportedProvider(_))
    ));
    // Skipping also skips the restore.
    assert!(cluster.resize_history().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_node_cluster_skips() {
    let cluster = sim(1);

    let outcome = scenario(&cluster, config_for(&cluster, Provider::Gke, 1))
        .run()
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ScenarioOutcome::Skipped(SkipReason::InsufficientNodes { have: 1, need: 2 })
    ));
    assert!(cluster.resize_history().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_multiple_node_groups_is_fatal_config_error() {
    let cluster = sim(4);
    let extra: GroupName = "pool-b".parse().unwrap();
    let config = ScenarioConfig::new(
        Provider::Gce,
        vec![cluster.group().clone(), extra],
        4,
    );

    let err = scenario(&cluster, config).run().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ScenarioError::Config(ConfigError::MultipleNodeGroups(_))
    ));
    assert!(cluster.resize_history().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_node_count_mismatch_fails_baseline() {
    let cluster = sim(3);
    let mut config = config_for(&cluster, Provider::Gce, 4);
    config.ready_nodes_timeout = Duration::from_secs(60);

    let err = scenario(&cluster, config).run().await.unwrap_err();

    assert_eq!(err.step(), Some(Step::BaselineWait));
    assert!(!err.is_fatal());
    // The restore still ran and grew the group to the configured size.
    assert_eq!(cluster.resize_history().await, vec![4]);
    assert_eq!(cluster_shape(&cluster).await.0, 4);
}

#[tokio::test(start_paused = true)]
async fn test_missing_baseline_lease_fails_before_disruption() {
    let cluster = sim(4);
    let node = cluster.node_name(1).unwrap();
    cluster.drop_lease(&node).await;

    let err = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::BaselineLeaseCheck));
    assert!(err.to_string().contains(node.as_str()), "{err}");
    // Never shrunk, restore resized to the same size.
    assert_eq!(cluster.resize_history().await, vec![4]);
}

#[tokio::test(start_paused = true)]
async fn test_lease_not_garbage_collected_fails_deletion_check() {
    init_tracing();
    let cluster = sim(4);
    let victim = cluster.node_name(2).unwrap();
    cluster.set_removal_victim(victim.clone()).await;
    cluster.keep_orphaned_leases().await;

    let err = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::DeletionCheck));
    assert!(!err.is_fatal());
    let msg = err.to_string();
    assert!(msg.contains("node lease is not deleted yet"), "{msg}");
    assert!(msg.contains(victim.as_str()), "{msg}");

    // Restore ran regardless.
    assert_eq!(cluster.resize_history().await, vec![3, 4]);
    assert_eq!(cluster_shape(&cluster).await.0, 4);
}

#[tokio::test(start_paused = true)]
async fn test_lost_survivor_lease_fails_survivor_check() {
    let cluster = sim(4);
    let victim = cluster.node_name(2).unwrap();
    let survivor = cluster.node_name(1).unwrap();
    cluster.set_removal_victim(victim).await;

    // The shrink lands at 30s and the victim's lease is collected at 40s;
    // lose a survivor's lease in between.
    let saboteur = {
        let cluster = cluster.clone();
        let survivor = survivor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(32)).await;
            cluster.drop_lease(&survivor).await;
        })
    };

    let err = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap_err();
    saboteur.await.unwrap();

    assert_eq!(err.step(), Some(Step::SurvivorCheck));
    assert!(err.to_string().contains(survivor.as_str()), "{err}");
    assert_eq!(cluster.resize_history().await, vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_restore_failure_is_fatal() {
    let cluster = sim(4);
    cluster.reject_resize_to(4).await;

    let err = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    let ScenarioError::Restore { source, scenario } = err else {
        panic!("expected restore failure");
    };
    assert!(matches!(*source, ScenarioError::Cluster { step: Step::Restore, .. }));
    assert!(scenario.is_none(), "scenario itself passed");
}

#[tokio::test(start_paused = true)]
async fn test_restore_failure_carries_scenario_failure() {
    let cluster = sim(4);
    cluster.keep_orphaned_leases().await;
    cluster.reject_resize_to(4).await;

    let err = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap_err();

    let ScenarioError::Restore { scenario, .. } = &err else {
        panic!("expected restore failure, got {err}");
    };
    let prior = scenario.as_ref().expect("scenario failure preserved");
    assert_eq!(prior.step(), Some(Step::DeletionCheck));
    assert!(err.to_string().contains("after scenario failure"));
}

#[tokio::test(start_paused = true)]
async fn test_init_failure_skips_restore() {
    let cluster = sim(4);
    cluster.set_unreachable(true).await;

    let err = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::Init));
    assert!(matches!(err, ScenarioError::Cluster { .. }));
    cluster.set_unreachable(false).await;
    assert!(cluster.resize_history().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_gke_waits_for_tunnel_grace() {
    let cluster = sim(4);
    let config = config_for(&cluster, Provider::Gke, 4);
    assert_eq!(config.tunnel_grace, Duration::from_secs(300));
    let start = Instant::now();

    scenario(&cluster, config).run().await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(300));
}

#[rstest]
#[case(Provider::Gce)]
#[case(Provider::Gke)]
#[tokio::test(start_paused = true)]
async fn test_grace_delay_is_injectable(#[case] provider: Provider) {
    let cluster = sim(4);
    let mut config = config_for(&cluster, provider, 4);
    config.tunnel_grace = Duration::ZERO;
    let start = Instant::now();

    scenario(&cluster, config).run().await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_finished_system_pods_do_not_block_restore() {
    let cluster = sim(4);
    for (name, phase) in [
        ("node-problem-sweep-28411", PodPhase::Succeeded),
        ("node-problem-sweep-28412", PodPhase::Failed),
    ] {
        cluster
            .add_pod(Pod {
                name: name.to_string(),
                namespace: Namespace::system(),
                phase,
                ready: false,
                controlled: true,
            })
            .await;
    }

    let outcome = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap();

    // Only running and ready pods make up the baseline.
    assert_eq!(outcome.report().unwrap().system_pods, 3 + 4);
    assert_eq!(cluster.resize_history().await, vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_lease_lookup_outage_is_retried_during_deletion_check() {
    let cluster = sim(4);
    let victim = cluster.node_name(2).unwrap();
    cluster.set_removal_victim(victim.clone()).await;

    // The deletion check starts at 30s and the lease is collected at 40s.
    // Lookups fail from 31s to 52s, so absence is first observed at 55s.
    let outage = {
        let cluster = cluster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(31)).await;
            cluster.set_unreachable(true).await;
            tokio::time::sleep(Duration::from_secs(21)).await;
            cluster.set_unreachable(false).await;
        })
    };

    let outcome = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap();
    outage.await.unwrap();

    assert_eq!(outcome.report().unwrap().removed, victim);
    assert_eq!(cluster.resize_history().await, vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_lease_lookup_errors_never_count_as_deletion() {
    let cluster = sim(4);
    let victim = cluster.node_name(2).unwrap();
    cluster.set_removal_victim(victim.clone()).await;

    // Unreachable for the whole deletion window (30s to 90s) while the
    // lease is actually collected at 40s.
    let outage = {
        let cluster = cluster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(31)).await;
            cluster.set_unreachable(true).await;
            tokio::time::sleep(Duration::from_secs(64)).await;
            cluster.set_unreachable(false).await;
        })
    };

    let err = scenario(&cluster, config_for(&cluster, Provider::Gce, 4))
        .run()
        .await
        .unwrap_err();
    outage.await.unwrap();

    // The restore resize at 90s also hit the outage.
    let ScenarioError::Restore { scenario, .. } = &err else {
        panic!("expected restore failure, got {err}");
    };
    let prior = scenario.as_ref().expect("deletion check failure preserved");
    assert_eq!(prior.step(), Some(Step::DeletionCheck));
    let msg = prior.to_string();
    assert!(msg.contains("failed to get lease"), "{msg}");
    assert!(msg.contains("unreachable"), "{msg}");

    assert!(!cluster.lease_holders().await.contains(&victim));
}

/// Lease registry that crashes once the group has been resized.
struct CrashingLeases {
    inner: Arc<SimCluster>,
}

#[async_trait]
impl LeaseRegistry for CrashingLeases {
    async fn get_lease(
        &self,
        namespace: &Namespace,
        node: &NodeName,
    ) -> Result<Option<Lease>, ClusterError> {
        if !self.inner.resize_history().await.is_empty() {
            panic!("lease registry crashed");
        }
        self.inner.get_lease(namespace, node).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_panic_after_shrink_still_restores() {
    let cluster = sim(4);
    let handle = ClusterHandle::new(
        Arc::new(CrashingLeases {
            inner: cluster.clone(),
        }),
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
    );
    let scenario = NodeLeaseScenario::new(config_for(&cluster, Provider::Gce, 4), handle);

    let result = AssertUnwindSafe(scenario.run()).catch_unwind().await;

    assert!(result.is_err(), "panic is resumed after the restore");
    assert_eq!(cluster.resize_history().await, vec![3, 4]);
    assert_eq!(cluster_shape(&cluster).await.0, 4);
}

mod common;

use clusterflow::event::reasons;
use clusterflow::model::{
    labels, Kind, Object, ObjectData, ObjectKey, ObjectMeta, TerminationPolicy,
};
use clusterflow::store::DeleteOptions;
use clusterflow::{ObjectStore, ReconcileOutcome};
use common::*;

fn backup(name: &str, retain: bool) -> Object {
    let obj = Object::new(
        Kind::Backup,
        ObjectMeta::new(NAMESPACE, name),
        ObjectData::Opaque(serde_json::Value::Null),
    )
    .with_label(labels::INSTANCE, CLUSTER);
    if retain {
        obj.with_label(labels::BACKUP_PROTECTION, labels::BACKUP_RETAIN)
    } else {
        obj
    }
}

/// A created Cluster with claims and backups, then marked for deletion
async fn deleting(policy: TerminationPolicy) -> Harness {
    let h = Harness::new(cluster(3, policy)).await;
    let outcome = h.reconciler.reconcile(NAMESPACE, CLUSTER).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);
    for i in 0..3 {
        h.store.create(claim(i)).await.unwrap();
    }
    h.store.create(backup("b1", false)).await.unwrap();
    h.store.create(backup("b2", true)).await.unwrap();

    h.store
        .delete(&cluster_key(), DeleteOptions::default())
        .await
        .unwrap();
    assert!(h.cluster().await.meta.is_deleting());
    h
}

async fn remaining(h: &Harness, kind: Kind) -> Vec<String> {
    h.store
        .objects()
        .await
        .into_iter()
        .filter(|o| o.kind == kind)
        .map(|o| o.meta.name)
        .collect()
}

#[tokio::test]
async fn test_delete_policy_removes_claims_and_keeps_backups() {
    let h = deleting(TerminationPolicy::Delete).await;
    let outcome = h.reconciler.reconcile(NAMESPACE, CLUSTER).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);

    assert!(!h.store.contains(&cluster_key()).await);
    assert!(!h.store.contains(&workload_key()).await);
    assert!(!h.store.contains(&env_key()).await);
    assert!(remaining(&h, Kind::PersistentVolumeClaim).await.is_empty());
    assert_eq!(remaining(&h, Kind::Backup).await, vec!["b1", "b2"]);
    assert!(h
        .store
        .contains(&ObjectKey::new(Kind::ClusterDefinition, "", "mydef"))
        .await);
}

#[tokio::test]
async fn test_halt_policy_keeps_claims() {
    let h = deleting(TerminationPolicy::Halt).await;
    h.reconciler.reconcile(NAMESPACE, CLUSTER).await.unwrap();

    assert!(!h.store.contains(&cluster_key()).await);
    assert!(!h.store.contains(&workload_key()).await);
    assert_eq!(remaining(&h, Kind::PersistentVolumeClaim).await.len(), 3);
}

#[tokio::test]
async fn test_wipe_out_policy_keeps_only_retained_backups() {
    let h = deleting(TerminationPolicy::WipeOut).await;
    h.reconciler.reconcile(NAMESPACE, CLUSTER).await.unwrap();

    assert!(!h.store.contains(&cluster_key()).await);
    assert!(remaining(&h, Kind::PersistentVolumeClaim).await.is_empty());
    assert_eq!(remaining(&h, Kind::Backup).await, vec!["b2"]);
}

#[tokio::test]
async fn test_do_not_terminate_blocks_deletion() {
    let h = deleting(TerminationPolicy::DoNotTerminate).await;
    let mut events = h.reconciler.events().subscribe();
    let outcome = h.reconciler.reconcile(NAMESPACE, CLUSTER).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);

    let cluster = h.cluster().await;
    assert!(cluster.meta.is_deleting());
    assert!(!cluster.as_cluster().unwrap().status.message.is_empty());
    assert!(h.store.contains(&workload_key()).await);
    assert_eq!(remaining(&h, Kind::PersistentVolumeClaim).await.len(), 3);

    let event = events.try_recv().unwrap();
    assert_eq!(event.reason, reasons::DELETION_BLOCKED);
}

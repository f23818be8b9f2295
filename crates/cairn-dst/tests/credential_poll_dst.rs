//! DST tests for external credential resolution
//!
//! Runs the poller against a held [`SimClock`] so each interval is stepped
//! by hand:
//!
//! - no second poll happens before a full interval has elapsed
//! - an admin credential resolves on the first poll
//! - shutdown ends the wait promptly, mid-interval

use cairn_core::{
    Error, TimeProvider, CSI_CEPHFS_NODE_RECORD_NAME, CSI_CEPHFS_PROVISIONER_RECORD_NAME,
    CSI_RBD_NODE_RECORD_NAME, CSI_RBD_PROVISIONER_RECORD_NAME, EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS,
    IDENTITY_RECORD_NAME,
};
use cairn_dst::{FaultConfig, FaultType, SimClock, SimConfig, SimEnvironment, Simulation};
use cairn_mon::{ClusterIdentity, CredentialPoll, ExternalCredential};
use cairn_store::{MemoryStore, Record, RecordKey};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const NAMESPACE: &str = "dst-external";

type Resolution = (cairn_core::Result<ExternalCredential>, u64);

/// Let spawned tasks run until they park
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

fn spawn_resolve(env: &SimEnvironment, shutdown: watch::Receiver<bool>) -> JoinHandle<Resolution> {
    let clock: Arc<dyn TimeProvider> = env.clock.clone();
    let mut poll = CredentialPoll::new(Arc::new(env.store.clone()), clock, NAMESPACE);
    tokio::spawn(async move {
        let result = poll.resolve(shutdown).await;
        (result, poll.polls())
    })
}

async fn put_service_secrets(store: &MemoryStore) {
    for (name, user_field, key_field) in [
        (CSI_RBD_NODE_RECORD_NAME, "userID", "userKey"),
        (CSI_RBD_PROVISIONER_RECORD_NAME, "userID", "userKey"),
        (CSI_CEPHFS_NODE_RECORD_NAME, "adminID", "adminKey"),
        (CSI_CEPHFS_PROVISIONER_RECORD_NAME, "adminID", "adminKey"),
    ] {
        store
            .put_raw(
                RecordKey::secret(NAMESPACE, name),
                Record::new()
                    .with(user_field, format!("{}-user", name))
                    .with(key_field, format!("{}-key", name)),
            )
            .await;
    }
}

fn joined(result: Result<Resolution, tokio::task::JoinError>) -> cairn_core::Result<Resolution> {
    result.map_err(|e| Error::internal(e.to_string()))
}

#[tokio::test]
async fn test_polls_once_per_interval() {
    Simulation::new(SimConfig::from_env_or_random())
        .run_async(|env| async move {
            let (_tx, rx) = watch::channel(false);
            let handle = spawn_resolve(&env, rx);
            settle().await;

            // Most of an interval passes with nothing present
            env.advance_time_ms(EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS - 1);
            settle().await;
            assert!(!handle.is_finished());

            put_service_secrets(env.store.inner()).await;
            settle().await;
            assert!(!handle.is_finished(), "polled again before the interval elapsed");

            env.advance_time_ms(1);
            let (result, polls) = joined(handle.await)?;
            assert_eq!(polls, 2);
            match result? {
                ExternalCredential::ServiceScoped {
                    health_checker,
                    rbd_node,
                    cephfs_provisioner,
                    ..
                } => {
                    assert!(health_checker.is_none());
                    assert_eq!(rbd_node.username, format!("{}-user", CSI_RBD_NODE_RECORD_NAME));
                    assert_eq!(
                        cephfs_provisioner.username,
                        format!("{}-user", CSI_CEPHFS_PROVISIONER_RECORD_NAME)
                    );
                }
                other => panic!("expected service credentials, got {:?}", other),
            }
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_admin_credential_resolves_without_waiting() {
    Simulation::new(SimConfig::from_env_or_random())
        .run_async(|env| async move {
            let identity = ClusterIdentity::new(NAMESPACE, "fsid", "quorum", "AQDrealadminkey==");
            env.store
                .inner()
                .put_raw(
                    RecordKey::secret(NAMESPACE, IDENTITY_RECORD_NAME),
                    identity.to_record(),
                )
                .await;

            let (_tx, rx) = watch::channel(false);
            let start = env.now_ms();
            let (result, polls) = joined(spawn_resolve(&env, rx).await)?;
            assert!(result?.is_admin());
            assert_eq!(polls, 1);
            assert_eq!(env.now_ms(), start);
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_interrupts_wait() {
    Simulation::new(SimConfig::from_env_or_random())
        .run_async(|env| async move {
            let (tx, rx) = watch::channel(false);
            let handle = spawn_resolve(&env, rx);
            settle().await;
            env.advance_time_ms(EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS / 2);
            settle().await;

            tx.send(true).map_err(|e| Error::internal(e.to_string()))?;
            let (result, polls) = joined(handle.await)?;
            assert!(matches!(result, Err(Error::Cancelled { .. })));
            assert_eq!(polls, 1);
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dropped_shutdown_sender_cancels() {
    Simulation::new(SimConfig::from_env_or_random())
        .run_async(|env| async move {
            let (tx, rx) = watch::channel(false);
            let handle = spawn_resolve(&env, rx);
            settle().await;
            drop(tx);

            let (result, _) = joined(handle.await)?;
            assert!(matches!(result, Err(Error::Cancelled { .. })));
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_read_failures_read_as_not_yet_present() {
    Simulation::new(SimConfig::from_env_or_random())
        .with_fault(
            FaultConfig::new(FaultType::StorageReadFail, 1.0)
                .with_filter("store_read")
                .max_triggers(5),
        )
        .run_async(|env| async move {
            put_service_secrets(env.store.inner()).await;

            let (_tx, rx) = watch::channel(false);
            let handle = spawn_resolve(&env, rx);
            settle().await;
            assert!(!handle.is_finished());

            env.advance_time_ms(EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS);
            let (result, polls) = joined(handle.await)?;
            assert!(!result?.is_admin());
            assert_eq!(polls, 2);
            Ok(())
        })
        .await
        .unwrap();
}

#[test]
fn test_interval_below_floor_is_raised() {
    let store = MemoryStore::new();
    let poll = CredentialPoll::new(
        Arc::new(store),
        Arc::new(SimClock::default()),
        NAMESPACE,
    )
    .with_interval_ms(10);
    assert_eq!(poll.interval_ms(), EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS);
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end lease lifecycle against a file-backed SQLite store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use leasekeeper_core::{
    AdminSecret, Clock, LeaseError, LeaseStatus, LeaseStore, ManualClock, Provisioner, RenewalService,
    SqliteLeaseStore, classify, summarize,
};

const ADMIN: &str = "integration-secret";

const PROVISIONING_TEXT: &str = "产品类型：100M+10M\n\
系统：centos7\n\
16GB DDR4\n\
机器信息：\n\
203.0.113.7  203.0.113.8\n\
远程账号：administrator\n\
密码：Pa55word\n\
远程端口：3389 (rdp)\n\
备注：月付";

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<SqliteLeaseStore>,
    clock: Arc<ManualClock>,
    provisioner: Provisioner,
    renewals: RenewalService,
}

async fn harness(now: DateTime<Utc>) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(
        SqliteLeaseStore::from_path(dir.path().join("leases.db"))
            .await
            .expect("Failed to open store"),
    );
    let clock = Arc::new(ManualClock::new(now));
    let provisioner = Provisioner::new(store.clone(), clock.clone());
    let renewals = RenewalService::new(
        store.clone(),
        Arc::new(AdminSecret::new(ADMIN)),
        clock.clone(),
    );

    Harness {
        _dir: dir,
        store,
        clock,
        provisioner,
        renewals,
    }
}

fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 8, 0, 0).unwrap()
}

#[tokio::test]
async fn test_provision_from_text() {
    let h = harness(jan(31)).await;

    let lease = h
        .provisioner
        .provision_text("1001", PROVISIONING_TEXT, None)
        .await
        .expect("Failed to provision");

    assert_eq!(lease.addresses, vec!["203.0.113.7", "203.0.113.8"]);
    assert_eq!(lease.port, "3389");
    assert_eq!(lease.username, "administrator");
    assert_eq!(lease.secret, "Pa55word");
    assert_eq!(lease.product_type, "100M+10M");
    assert_eq!(lease.operating_system, "centos7");
    assert_eq!(lease.configs, vec!["16GB DDR4"]);
    assert_eq!(lease.extras.get("备注").map(String::as_str), Some("月付"));

    // Jan 31 clamps to the end of February
    assert_eq!(lease.start_at, jan(31));
    assert_eq!(
        lease.expire_at,
        Utc.with_ymd_and_hms(2025, 2, 28, 8, 0, 0).unwrap()
    );
    assert_eq!(lease.status, LeaseStatus::Normal);
    assert!(lease.raw_content.starts_with("产品类型:100M+10M\n系统:centos7"));

    let stored = h.store.get(&lease.id).await.unwrap().expect("stored");
    assert_eq!(stored, lease);
}

#[tokio::test]
async fn test_provision_without_addresses_is_rejected() {
    let h = harness(jan(10)).await;

    let err = h
        .provisioner
        .provision_text("1001", "账号:root\n密码:x\n端口:22", None)
        .await
        .unwrap_err();

    assert!(matches!(err, LeaseError::ValidationError { ref field, .. } if field == "addresses"));
    assert!(h.store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provision_with_explicit_start_in_the_past() {
    let h = harness(jan(20)).await;
    let start = Utc.with_ymd_and_hms(2024, 12, 25, 8, 0, 0).unwrap();

    let lease = h
        .provisioner
        .provision_text("1001", PROVISIONING_TEXT, Some(start))
        .await
        .unwrap();

    assert_eq!(lease.expire_at, jan(25));
    assert_eq!(lease.status, LeaseStatus::Expiring);
}

#[tokio::test]
async fn test_renew_then_delete() {
    let h = harness(jan(1)).await;
    let lease = h
        .provisioner
        .provision_text("1001", PROVISIONING_TEXT, None)
        .await
        .unwrap();
    assert_eq!(lease.expire_at, Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap());

    // Early renewal on Jan 28: from the old expiry, not from today
    h.clock.set(jan(28));
    let outcome = h.renewals.renew(&lease.id, ADMIN).await.unwrap();
    assert_eq!(
        outcome.new_expire,
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    );
    assert_eq!(outcome.status, classify(outcome.new_expire, jan(28)));

    // Late renewal, long after the new expiry
    h.clock.advance(Duration::days(60));
    let late_now = h.clock.now();
    let outcome = h.renewals.renew(&lease.id, ADMIN).await.unwrap();
    assert_eq!(outcome.old_expire, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
    assert!(outcome.new_expire > late_now);
    assert_eq!(outcome.status, LeaseStatus::Normal);

    let history = h.renewals.history(&lease.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].old_expire_at, history[0].new_expire_at);

    // Deletion needs the secret and takes the history with it
    assert!(matches!(
        h.renewals.delete(&lease.id, "nope").await,
        Err(LeaseError::Unauthorized { .. })
    ));
    h.renewals.delete(&lease.id, ADMIN).await.unwrap();
    assert!(h.store.get(&lease.id).await.unwrap().is_none());
    assert!(h.store.list_renewals(&lease.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unauthorized_renewal_leaves_lease_untouched() {
    let h = harness(jan(1)).await;
    let lease = h
        .provisioner
        .provision_text("1001", PROVISIONING_TEXT, None)
        .await
        .unwrap();

    let err = h.renewals.renew(&lease.id, "wrong").await.unwrap_err();
    assert_eq!(err.error_code(), "UNAUTHORIZED");

    let stored = h.store.get(&lease.id).await.unwrap().unwrap();
    assert_eq!(stored.expire_at, lease.expire_at);
    assert_eq!(stored.status, lease.status);
    assert!(h.renewals.history(&lease.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_summary_over_store() {
    let h = harness(jan(1)).await;
    h.provisioner
        .provision_text("1001", PROVISIONING_TEXT, None)
        .await
        .unwrap();
    h.provisioner
        .provision_text("1002", PROVISIONING_TEXT, None)
        .await
        .unwrap();

    let summary = summarize(&h.store.list_all().await.unwrap());
    assert_eq!(summary.total, 2);
    assert_eq!(summary.owners.len(), 2);
    assert_eq!(summary.systems.get("centos7"), Some(&2));
    assert_eq!(summary.configs.get("16GB DDR4"), Some(&2));
}

#[tokio::test]
async fn test_history_without_configured_secret() {
    let h = harness(jan(1)).await;
    let lease = h
        .provisioner
        .provision_text("1001", PROVISIONING_TEXT, None)
        .await
        .unwrap();
    h.renewals.renew(&lease.id, ADMIN).await.unwrap();

    // Reading history is open; with no secret configured nothing is privileged
    let unset: Option<AdminSecret> = None;
    let readonly = RenewalService::new(h.store.clone(), Arc::new(unset), h.clock.clone());
    assert_eq!(readonly.history(&lease.id).await.unwrap().len(), 1);
    assert!(matches!(
        readonly.history("missing").await,
        Err(LeaseError::LeaseNotFound { .. })
    ));
    assert!(matches!(
        readonly.renew(&lease.id, "").await,
        Err(LeaseError::Unauthorized { .. })
    ));
}

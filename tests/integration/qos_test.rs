// tests/integration/qos_test.rs

//! Integration tests for the per-tenant QoS resource governor. These drive
//! the governor's own public API (`spineldb::core::qos::*`) against a real
//! `ServerState`, the same way `acl_test.rs` drives `AclEnforcer` directly
//! rather than through the full connection/router stack.

use super::test_helpers::TestContext;
use spineldb::config::{Config, QosCatalogEntry};
use spineldb::core::qos::{SessionQosCache, SharedQosState, StatementKind};
use spineldb::core::qos::catalog::QosCatalog;
use spineldb::core::qos::planner::{self, ShardScanPlan};
use tempfile::TempDir;

fn entry(role: Option<&str>, database: Option<usize>, settings: &[&str]) -> QosCatalogEntry {
    QosCatalogEntry {
        role: role.map(str::to_string),
        database,
        settings: settings.iter().map(|s| s.to_string()).collect(),
    }
}

// ===== Catalog loading from qos_file =====

#[tokio::test]
async fn loads_catalog_entries_from_qos_file_at_startup() {
    let temp_dir = TempDir::new().unwrap();
    let qos_file_path = temp_dir.path().join("qos.json");
    std::fs::write(
        &qos_file_path,
        r#"{"entries":[{"role":"reporting","database":null,"settings":["qos.max_concurrent_tx=2"]}]}"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.databases = 1;
    config.persistence.aof_enabled = false;
    config.persistence.spldb_enabled = false;
    config.qos.enabled = true;
    config.qos_file = Some(qos_file_path.to_string_lossy().to_string());

    let ctx = TestContext::with_config(config).await;

    let qos_config = ctx.state.qos_config.read().await;
    assert!(qos_config.enabled);
    assert_eq!(qos_config.entries.len(), 1);
    let catalog = QosCatalog::new(&qos_config);
    assert_eq!(catalog.limits_for_role("reporting").max_concurrent_tx, Some(2));
}

#[tokio::test]
async fn missing_qos_file_is_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let qos_file_path = temp_dir.path().join("does-not-exist.json");

    let mut config = Config::default();
    config.databases = 1;
    config.persistence.aof_enabled = false;
    config.persistence.spldb_enabled = false;
    config.qos.enabled = true;
    config.qos_file = Some(qos_file_path.to_string_lossy().to_string());

    let ctx = TestContext::with_config(config).await;
    let qos_config = ctx.state.qos_config.read().await;
    assert!(qos_config.entries.is_empty());
}

// ===== Most-restrictive fold across scopes, via the session cache =====

#[tokio::test]
async fn session_cache_folds_global_role_and_database_scopes() {
    let mut config = spineldb::config::QosConfig::default();
    config.entries = vec![
        entry(None, None, &["qos.max_concurrent_tx=20"]),
        entry(Some("alice"), None, &["qos.max_concurrent_tx=5"]),
        entry(None, Some(3), &["qos.max_concurrent_tx=2"]),
    ];

    let mut cache = SessionQosCache::new();
    let limits = cache.get_effective_limits(&config, 0, "alice", 3);
    // Most restrictive of 20 (global), 5 (role), 2 (database) is 2.
    assert_eq!(limits.max_concurrent_tx, Some(2));
}

#[tokio::test]
async fn session_cache_refreshes_on_epoch_change_and_keeps_session_override() {
    let mut config = spineldb::config::QosConfig::default();
    config.entries = vec![entry(Some("alice"), None, &["qos.work_mem=4096"])];

    let mut cache = SessionQosCache::new();
    let limits = cache.get_effective_limits(&config, 1, "alice", 0);
    assert_eq!(limits.work_mem_bytes, Some(4096 * 1024));

    // A session-scoped override is more specific and survives a later,
    // looser catalog change at the same epoch.
    cache.set_work_mem_override(Some(1024 * 1024));
    let limits = cache.get_effective_limits(&config, 1, "alice", 0);
    assert_eq!(limits.work_mem_bytes, Some(1024 * 1024));

    // Bumping the epoch forces a catalog re-read but the override persists.
    config.entries[0].settings = vec!["qos.work_mem=8192".to_string()];
    let limits = cache.get_effective_limits(&config, 2, "alice", 0);
    assert_eq!(limits.work_mem_bytes, Some(1024 * 1024));

    cache.reset_session_override();
    let limits = cache.get_effective_limits(&config, 2, "alice", 0);
    assert_eq!(limits.work_mem_bytes, Some(8192 * 1024));
}

// ===== Statement/transaction admission via SharedQosState =====

#[tokio::test]
async fn admission_rejects_once_the_concurrent_statement_limit_is_reached() {
    let shared = SharedQosState::new(16, 32);
    let mut limits = spineldb::core::qos::Limits::default();
    limits.max_concurrent_select = Some(1);

    spineldb::core::qos::admit_statement(&shared, &limits, 1, "alice", 0, StatementKind::Select)
        .expect("first statement admitted");
    let err = spineldb::core::qos::admit_statement(
        &shared,
        &limits,
        2,
        "alice",
        0,
        StatementKind::Select,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        spineldb::core::SpinelDBError::QosLimitExceeded { .. }
    ));

    // Releasing the first backend's slot lets a new one in.
    spineldb::core::qos::end_statement(&shared, 1);
    spineldb::core::qos::admit_statement(&shared, &limits, 2, "alice", 0, StatementKind::Select)
        .expect("statement admitted after release");
}

#[tokio::test]
async fn clear_backend_releases_both_transaction_and_statement_slots() {
    let shared = SharedQosState::new(16, 32);
    let mut limits = spineldb::core::qos::Limits::default();
    limits.max_concurrent_tx = Some(1);
    limits.max_concurrent_select = Some(1);

    spineldb::core::qos::admit_transaction(&shared, &limits, 7, "alice", 0).unwrap();
    spineldb::core::qos::admit_statement(&shared, &limits, 7, "alice", 0, StatementKind::Select)
        .unwrap();

    // A connection dropping mid-transaction must release both slots, not
    // just the one `on_command_end` would have released.
    shared.clear_backend(7);

    spineldb::core::qos::admit_transaction(&shared, &limits, 8, "alice", 0).unwrap();
    spineldb::core::qos::admit_statement(&shared, &limits, 8, "alice", 0, StatementKind::Select)
        .unwrap();
}

// ===== Planner clamp =====

#[tokio::test]
async fn planner_clamp_never_exceeds_the_cpu_core_limit_minus_one() {
    let mut limits = spineldb::core::qos::Limits::default();
    limits.cpu_core_limit = Some(4);
    let plan = planner::rewrite_plan(ShardScanPlan::new(16), &limits);
    assert_eq!(plan.workers, 3);

    // A plan that already requests fewer workers than the clamp allows is
    // left untouched.
    let plan = planner::rewrite_plan(ShardScanPlan::new(2), &limits);
    assert_eq!(plan.workers, 2);
}

// ===== Online reconfiguration =====

#[tokio::test]
async fn bumping_the_settings_epoch_is_visible_to_a_fresh_cache_lookup() {
    let shared = SharedQosState::new(16, 32);
    let epoch_before = shared.settings_epoch();
    let epoch_after = shared.bump_epoch();
    assert_ne!(epoch_before, epoch_after);
    assert_eq!(shared.settings_epoch(), epoch_after);
}

// src/core/qos/hooks.rs

//! Hook glue (component C8): the small set of call sites wired into
//! `command_router.rs`, the transaction handler, and `ConnectionGuard`'s
//! `Drop` impl (§4.8). Every function here is a thin adapter over
//! `admission`, `affinity`, `planner`, and `cache` — no admission or
//! fold logic lives in this file.

use super::admission;
use super::affinity;
use super::limits::{StatementKind, classify_command, WorkMemErrorLevel};
use super::planner::{self, ShardScanPlan};
use crate::connection::SessionState;
use crate::core::Command;
use crate::core::SpinelDBError;
use crate::core::commands::command_trait::CommandExt;
use crate::core::metrics;
use crate::core::state::ServerState;
use tracing::warn;

const DEFAULT_ROLE: &str = "default";

fn role_of(session: &SessionState) -> String {
    session
        .authenticated_user
        .as_ref()
        .map(|u| u.username.clone())
        .unwrap_or_else(|| DEFAULT_ROLE.to_string())
}

/// Resolves this session's effective limits, refreshing the cache as needed.
/// Called at the top of every hook below; cheap on a cache hit (§4.4).
async fn effective_limits(state: &ServerState, session: &mut SessionState) -> super::limits::Limits {
    let role = role_of(session);
    let database = session.current_db_index;
    let config = state.qos_config.read().await;
    session
        .qos_cache
        .get_effective_limits(&config, state.qos_shared.settings_epoch(), &role, database)
}

/// Utility hook: called before a statement dispatches. Classifies the
/// command, admits it against the effective concurrency limit, and pins
/// CPU affinity if the session has a `cpu_core_limit`. Returns the
/// classified kind so the caller can release it via `on_command_end`, or
/// `None` if this command isn't subject to concurrency admission at all.
pub async fn on_command_start(
    state: &ServerState,
    session: &mut SessionState,
    session_id: u64,
    command: &Command,
) -> Result<Option<StatementKind>, SpinelDBError> {
    if !state.qos_config.read().await.enabled {
        return Ok(None);
    }
    let Some(kind) = classify_command(command.name(), command.get_flags()) else {
        return Ok(None);
    };
    let limits = effective_limits(state, session).await;
    let role = role_of(session);
    admission::admit_statement(&state.qos_shared, &limits, session_id, &role, session.current_db_index, kind)?;
    affinity::pin_affinity_if_needed(&state.qos_shared, session.current_db_index, &role, &limits);
    Ok(Some(kind))
}

/// Executor-end hook: releases whatever `on_command_start` admitted,
/// regardless of whether the statement succeeded, failed, or was aborted.
pub fn on_command_end(state: &ServerState, session_id: u64, admitted: Option<StatementKind>) {
    if admitted.is_some() {
        admission::end_statement(&state.qos_shared, session_id);
    }
}

/// Transaction-event hook: called on `MULTI`.
pub async fn on_transaction_start(state: &ServerState, session: &mut SessionState, session_id: u64) -> Result<(), SpinelDBError> {
    if !state.qos_config.read().await.enabled {
        return Ok(());
    }
    let limits = effective_limits(state, session).await;
    let role = role_of(session);
    admission::admit_transaction(&state.qos_shared, &limits, session_id, &role, session.current_db_index)
}

/// Transaction-event hook: called on `EXEC` or `DISCARD`, and as the
/// abort-safety cleanup path for a connection that drops mid-transaction.
pub fn on_transaction_end(state: &ServerState, session_id: u64) {
    admission::end_transaction(&state.qos_shared, session_id);
}

/// Abort-safety hook: called from `ConnectionGuard::drop`. Releases every
/// slot this backend held, transaction and statement alike, regardless of
/// how the connection ended.
pub fn on_connection_close(state: &ServerState, session_id: u64) {
    state.qos_shared.clear_backend(session_id);
}

/// Planner hook: rewrites a shard fan-out plan's worker count to the
/// session's `cpu_core_limit` (§4.6).
pub async fn rewrite_shard_plan(state: &ServerState, session: &mut SessionState, requested_workers: u32) -> ShardScanPlan {
    let limits = effective_limits(state, session).await;
    planner::rewrite_plan(ShardScanPlan::new(requested_workers), &limits)
}

/// Work-mem enforcement hook: called by commands that allocate a
/// significant, estimable amount of per-statement memory (e.g. `SORT`,
/// large `MSET`/`COPY` bodies) before performing the allocation. Honors
/// both enforcement sites from §9: `Error` rejects outright, `Warn` logs
/// and lets the statement proceed.
pub async fn check_work_mem(state: &ServerState, session: &mut SessionState, requested_bytes: u64) -> Result<(), SpinelDBError> {
    let limits = effective_limits(state, session).await;
    enforce_work_mem_limit(state, limits.work_mem_bytes, limits.work_mem_error_level, requested_bytes)
}

/// `QOS SET WORK_MEM`-time enforcement: validates a proposed session
/// override against the role/database catalog limit (not the current
/// override, which is about to be replaced) before it is accepted, per the
/// "`ALTER ROLE ... SET qos.work_mem_limit`; `SET work_mem` over that limit
/// is rejected" scenario (§8).
pub async fn check_work_mem_override(
    state: &ServerState,
    session: &mut SessionState,
    requested_bytes: u64,
) -> Result<(), SpinelDBError> {
    let role = role_of(session);
    let database = session.current_db_index;
    let config = state.qos_config.read().await;
    let limits = session
        .qos_cache
        .get_catalog_limits(&config, state.qos_shared.settings_epoch(), &role, database);
    enforce_work_mem_limit(state, limits.work_mem_bytes, limits.work_mem_error_level, requested_bytes)
}

fn enforce_work_mem_limit(
    state: &ServerState,
    max: Option<u64>,
    error_level: Option<WorkMemErrorLevel>,
    requested_bytes: u64,
) -> Result<(), SpinelDBError> {
    let Some(max) = max else {
        return Ok(());
    };
    if requested_bytes <= max {
        return Ok(());
    }
    match error_level.unwrap_or_default() {
        WorkMemErrorLevel::Error => {
            state.qos_shared.record_work_mem_violation();
            metrics::QOS_REJECTED_TOTAL.with_label_values(&["work_mem"]).inc();
            Err(SpinelDBError::QosWorkMemExceeded {
                requested: requested_bytes / 1024,
                max: max / 1024,
            })
        }
        WorkMemErrorLevel::Warn => {
            state.qos_shared.record_throttled();
            metrics::QOS_THROTTLED_TOTAL.inc();
            warn!(
                "qos: statement exceeded work_mem ({} KB requested, {} KB allowed) but work_mem_error_level is warn; allowing",
                requested_bytes / 1024,
                max / 1024
            );
            Ok(())
        }
    }
}

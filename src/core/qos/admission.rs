// src/core/qos/admission.rs

//! Statement & transaction admission (component C5): the public
//! `admit_transaction`/`admit_statement`/`end_statement`/`end_transaction`
//! operations wired into the command router (§4.5, §4.8).

use super::limits::{Limits, StatementKind};
use super::shared::SharedQosState;
use crate::core::SpinelDBError;
use crate::core::metrics;

/// A configured limit of `0` means "unset" (§4.5 step 2), the same as
/// `None` — it does not mean "admit nothing, ever".
fn normalize(limit: Option<u32>) -> Option<u32> {
    limit.filter(|&l| l > 0)
}

/// Admits a transaction start. A `None` limit (unset, `0`, or `qos.enabled =
/// false` for this scope) always admits.
pub fn admit_transaction(
    shared: &SharedQosState,
    limits: &Limits,
    session_id: u64,
    role: &str,
    database_id: usize,
) -> Result<(), SpinelDBError> {
    if limits.enabled == Some(false) {
        return Ok(());
    }
    let limit = normalize(limits.max_concurrent_tx);
    match shared.admit_transaction(session_id, role, database_id, limit) {
        Ok(()) => {
            metrics::QOS_ADMITTED_TOTAL.inc();
            Ok(())
        }
        Err(current) => {
            metrics::QOS_REJECTED_TOTAL.with_label_values(&["tx"]).inc();
            Err(SpinelDBError::QosLimitExceeded {
                kind: "transaction".to_string(),
                current,
                max: limits.max_concurrent_tx.unwrap_or(0),
            })
        }
    }
}

/// Admits a single statement of the given kind.
pub fn admit_statement(
    shared: &SharedQosState,
    limits: &Limits,
    session_id: u64,
    role: &str,
    database_id: usize,
    kind: StatementKind,
) -> Result<(), SpinelDBError> {
    if limits.enabled == Some(false) {
        return Ok(());
    }
    let limit = normalize(limits.max_concurrent_for(kind));
    match shared.admit_statement(session_id, role, database_id, kind, limit) {
        Ok(()) => {
            metrics::QOS_ADMITTED_TOTAL.inc();
            Ok(())
        }
        Err(current) => {
            metrics::QOS_REJECTED_TOTAL.with_label_values(&[kind.as_str()]).inc();
            Err(SpinelDBError::QosLimitExceeded {
                kind: kind.as_str().to_string(),
                current,
                max: limit.unwrap_or(0),
            })
        }
    }
}

/// Releases this backend's statement tracking. Safe to call even if no
/// statement was admitted (idempotent, per §4.5).
pub fn end_statement(shared: &SharedQosState, session_id: u64) {
    shared.end_statement(session_id);
}

/// Releases this backend's transaction tracking.
pub fn end_transaction(shared: &SharedQosState, session_id: u64) {
    shared.end_transaction(session_id);
}

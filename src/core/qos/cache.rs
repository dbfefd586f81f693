// src/core/qos/cache.rs

//! Effective-limit cache (component C4): the per-session cached `Limits`,
//! refreshed on epoch change or identity change, folded by the
//! most-restrictive rule (§4.4).

use super::catalog::QosCatalog;
use super::limits::Limits;
use crate::config::QosConfig;

/// Per-session, private cache (§3 "SessionCache"). Lives on `SessionState`
/// so its lifetime matches the connection, mirroring how `authenticated_user`
/// is cached there rather than looked up per command.
#[derive(Debug, Clone, Default)]
pub struct SessionQosCache {
    limits: Limits,
    cached_role: Option<String>,
    cached_database: Option<usize>,
    last_seen_epoch: u32,
    cached_valid: bool,
    /// A per-session runtime override set by `QOS SET`, the host mapping's
    /// analogue of a session-scoped `SET work_mem = V`. Survives catalog
    /// refreshes and epoch bumps; cleared only by `QOS RESET` or the
    /// session ending.
    session_override: Limits,
}

impl SessionQosCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next `get_effective_limits` call to recompute, regardless
    /// of epoch. Wired to the role/database catalog invalidation hooks.
    pub fn invalidate(&mut self) {
        self.cached_valid = false;
    }

    /// Applies `QOS SET WORK_MEM <value>` for the rest of this session.
    pub fn set_work_mem_override(&mut self, bytes: Option<u64>) {
        self.session_override.work_mem_bytes = bytes;
    }

    /// Applies `QOS RESET`, dropping any session-level override.
    pub fn reset_session_override(&mut self) {
        self.session_override = Limits::default();
    }

    /// Implements the §4.4 refresh algorithm, then folds in the session's
    /// own runtime override as the most specific layer of all.
    pub fn get_effective_limits(&mut self, config: &QosConfig, shared_epoch: u32, role: &str, database: usize) -> Limits {
        self.refresh(config, shared_epoch, role, database);
        Limits::fold_most_restrictive(&self.limits, &self.session_override)
    }

    /// Like `get_effective_limits`, but without folding in the session's own
    /// `QOS SET` override. Used to validate a *new* override (e.g. `QOS SET
    /// WORK_MEM`) against the role/database catalog before accepting it,
    /// since folding the old override in first would check against the
    /// wrong (already-overridden) bound.
    pub fn get_catalog_limits(&mut self, config: &QosConfig, shared_epoch: u32, role: &str, database: usize) -> Limits {
        self.refresh(config, shared_epoch, role, database);
        self.limits
    }

    fn refresh(&mut self, config: &QosConfig, shared_epoch: u32, role: &str, database: usize) {
        if shared_epoch != self.last_seen_epoch {
            self.cached_valid = false;
            self.last_seen_epoch = shared_epoch;
        }

        let identity_matches = self.cached_role.as_deref() == Some(role) && self.cached_database == Some(database);
        if !self.cached_valid || !identity_matches {
            let catalog = QosCatalog::new(config);
            let role_limits = catalog.limits_for_role(role);
            let db_limits = catalog.limits_for_database(database);
            let scoped_limits = catalog.limits_for_role_in_database(role, database);

            // Role-in-database rows are the most specific catalog scope; fold
            // them in on top of the role-only/database-only fold so a row
            // scoped to both takes precedence without being overridden by
            // either broader scope.
            let broad = Limits::fold_most_restrictive(&role_limits, &db_limits);
            self.limits = Limits::fold_most_restrictive(&broad, &scoped_limits);
            self.cached_role = Some(role.to_string());
            self.cached_database = Some(database);
            self.cached_valid = true;
        }
    }
}

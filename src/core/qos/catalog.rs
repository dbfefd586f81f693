// src/core/qos/catalog.rs

//! Catalog reader (component C2): three read-only queries over the
//! `QosConfig` catalog entries loaded from `qos_file`, mirroring how
//! `AclEnforcer` reads `AclConfig.users`.

use super::limits::{Limits, apply_value, parse_entry};
use crate::config::{QosCatalogEntry, QosConfig};
use tracing::debug;

/// A thin, borrowing view over the currently loaded QoS catalog.
pub struct QosCatalog<'a> {
    entries: &'a [QosCatalogEntry],
}

impl<'a> QosCatalog<'a> {
    pub fn new(config: &'a QosConfig) -> Self {
        Self {
            entries: &config.entries,
        }
    }

    /// `limits_for_role(role) -> Limits`: rows with this role and no database.
    pub fn limits_for_role(&self, role: &str) -> Limits {
        self.fold_matching(|e| e.role.as_deref() == Some(role) && e.database.is_none())
    }

    /// `limits_for_database(db) -> Limits`: rows with this database and no role.
    pub fn limits_for_database(&self, database: usize) -> Limits {
        self.fold_matching(|e| e.database == Some(database) && e.role.is_none())
    }

    /// `limits_for_role_in_database(role, db) -> Limits`: rows scoped to both.
    pub fn limits_for_role_in_database(&self, role: &str, database: usize) -> Limits {
        self.fold_matching(|e| e.role.as_deref() == Some(role) && e.database == Some(database))
    }

    fn fold_matching(&self, predicate: impl Fn(&&QosCatalogEntry) -> bool) -> Limits {
        let mut limits = Limits::default();
        for entry in self.entries.iter().filter(predicate) {
            for raw in &entry.settings {
                let (name, value) = match parse_entry(raw) {
                    Ok(pair) => pair,
                    Err(e) => {
                        debug!("qos: dropping malformed catalog entry '{}': {}", raw, e);
                        continue;
                    }
                };
                if let Err(e) = apply_value(&mut limits, &name, &value, false) {
                    debug!("qos: dropping catalog entry '{}': {}", raw, e);
                }
            }
        }
        limits
    }
}

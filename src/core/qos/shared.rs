// src/core/qos/shared.rs

//! Shared state (component C3): the single cross-session region guarding
//! the stats counters, `settings_epoch`, the per-backend status array, and
//! the CPU-affinity LRU table. A real shared-memory-backed host would place
//! this in a named shared-memory segment; this host runs every session as a
//! tokio task inside one process, so a `parking_lot::Mutex`-protected struct
//! owned by `ServerState` is the direct in-process analogue — one exclusive
//! lock, guarding the entire region, exactly as §4.3 requires.

use super::limits::StatementKind;
use parking_lot::Mutex;

/// Cluster-wide monotone counters (§3 "Stats").
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub admitted_total: u64,
    pub throttled_total: u64,
    pub rejected_total: u64,
    pub work_mem_violations: u64,
    pub cpu_violations: u64,
    pub tx_violations: u64,
    pub select_violations: u64,
    pub update_violations: u64,
    pub delete_violations: u64,
    pub insert_violations: u64,
}

impl Stats {
    fn violation_counter_mut(&mut self, kind: StatementKind) -> &mut u64 {
        match kind {
            StatementKind::Select => &mut self.select_violations,
            StatementKind::Update => &mut self.update_violations,
            StatementKind::Delete => &mut self.delete_violations,
            StatementKind::Insert => &mut self.insert_violations,
        }
    }
}

/// The kind of statement currently tracked in a backend slot, `None` when idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentCmd {
    #[default]
    None,
    Select,
    Update,
    Delete,
    Insert,
}

impl From<StatementKind> for CurrentCmd {
    fn from(kind: StatementKind) -> Self {
        match kind {
            StatementKind::Select => CurrentCmd::Select,
            StatementKind::Update => CurrentCmd::Update,
            StatementKind::Delete => CurrentCmd::Delete,
            StatementKind::Insert => CurrentCmd::Insert,
        }
    }
}

/// A bounded, LRU-evicted affinity assignment, unique by (database, role).
#[derive(Debug, Clone)]
pub struct AffinityEntry {
    pub database_id: usize,
    pub role: String,
    pub cores: Vec<usize>,
}

/// The single region every session consults and mutates under one lock.
#[derive(Debug, Default)]
pub struct QosRegion {
    pub stats: Stats,
    pub settings_epoch: u32,
    pub next_cpu_core: u32,
    pub affinity_entries: Vec<AffinityEntry>,
    pub backends: Vec<Option<BackendStatusRow>>,
}

/// One slot per potential session (§3 "BackendStatus"), owned by the
/// backend whose `session_id` matches. Roles are interned as owned
/// `String`s since session roles are arbitrary ACL usernames, not a fixed
/// enum.
#[derive(Debug, Clone)]
pub struct BackendStatusRow {
    pub session_id: u64,
    pub role: String,
    pub database_id: usize,
    pub current_cmd: CurrentCmd,
    pub in_transaction: bool,
}

/// Process-wide singleton created once during `ServerState::initialize`
/// (§3 "SharedState" lifecycle) and held for the life of the server.
#[derive(Debug, Default)]
pub struct SharedQosState {
    region: Mutex<QosRegion>,
    max_affinity_entries: usize,
    max_cores_per_entry: usize,
}

impl SharedQosState {
    pub fn new(max_affinity_entries: usize, max_cores_per_entry: usize) -> Self {
        Self {
            region: Mutex::new(QosRegion::default()),
            max_affinity_entries: max_affinity_entries.max(1),
            max_cores_per_entry: max_cores_per_entry.max(1),
        }
    }

    /// Bound on how many cores a single affinity entry may carry
    /// (`QosConfig::max_cores_per_entry`). Consulted by `affinity::get_or_assign_cores`
    /// before a fresh assignment is computed, so an oversized `cpu_core_limit`
    /// never grows the table's per-entry footprint unbounded.
    pub fn max_cores_per_entry(&self) -> usize {
        self.max_cores_per_entry
    }

    pub fn settings_epoch(&self) -> u32 {
        self.region.lock().settings_epoch
    }

    /// Bumps `settings_epoch` under the lock; called by the `ALTER ROLE/DATABASE
    /// SET qos.*` hook on success (§4.8).
    pub fn bump_epoch(&self) -> u32 {
        let mut region = self.region.lock();
        region.settings_epoch = region.settings_epoch.wrapping_add(1);
        region.settings_epoch
    }

    pub fn stats_snapshot(&self) -> Stats {
        self.region.lock().stats
    }

    pub fn reset_stats(&self) {
        self.region.lock().stats = Stats::default();
    }

    pub fn record_admitted(&self) {
        self.region.lock().stats.admitted_total += 1;
    }

    pub fn record_throttled(&self) {
        self.region.lock().stats.throttled_total += 1;
    }

    pub fn record_work_mem_violation(&self) {
        let mut region = self.region.lock();
        region.stats.rejected_total += 1;
        region.stats.work_mem_violations += 1;
    }

    pub fn record_cpu_violation(&self) {
        let mut region = self.region.lock();
        region.stats.rejected_total += 1;
        region.stats.cpu_violations += 1;
    }

    /// Counts peers and, if admitted, registers this backend's transaction
    /// slot — a single critical section, matching the "scan-and-register"
    /// ordering guarantee in §4.5 and §5.
    pub fn admit_transaction(
        &self,
        session_id: u64,
        role: &str,
        database_id: usize,
        limit: Option<u32>,
    ) -> Result<(), u32> {
        let mut region = self.region.lock();
        if let Some(limit) = limit {
            let count = region
                .backends
                .iter()
                .flatten()
                .filter(|b| b.session_id != session_id && b.role == role && b.database_id == database_id)
                .filter(|b| b.in_transaction)
                .count() as u32;
            if count >= limit {
                region.stats.rejected_total += 1;
                region.stats.tx_violations += 1;
                return Err(count);
            }
        }
        let slot = Self::slot_for(&mut region, session_id, role, database_id);
        slot.in_transaction = true;
        region.stats.admitted_total += 1;
        Ok(())
    }

    /// Symmetric to `admit_transaction`, scoped to one statement `kind`.
    pub fn admit_statement(
        &self,
        session_id: u64,
        role: &str,
        database_id: usize,
        kind: StatementKind,
        limit: Option<u32>,
    ) -> Result<(), u32> {
        let mut region = self.region.lock();
        if let Some(limit) = limit {
            let target: CurrentCmd = kind.into();
            let count = region
                .backends
                .iter()
                .flatten()
                .filter(|b| b.session_id != session_id && b.role == role && b.database_id == database_id)
                .filter(|b| b.current_cmd == target)
                .count() as u32;
            if count >= limit {
                *region.stats.violation_counter_mut(kind) += 1;
                region.stats.rejected_total += 1;
                return Err(count);
            }
        }
        let slot = Self::slot_for(&mut region, session_id, role, database_id);
        slot.current_cmd = kind.into();
        region.stats.admitted_total += 1;
        Ok(())
    }

    pub fn end_transaction(&self, session_id: u64) {
        let mut region = self.region.lock();
        if let Some(Some(slot)) = region.backends.iter_mut().find(|s| matches!(s, Some(b) if b.session_id == session_id)) {
            slot.in_transaction = false;
        }
    }

    pub fn end_statement(&self, session_id: u64) {
        let mut region = self.region.lock();
        if let Some(Some(slot)) = region.backends.iter_mut().find(|s| matches!(s, Some(b) if b.session_id == session_id)) {
            slot.current_cmd = CurrentCmd::None;
        }
    }

    /// Zeroes this backend's slot entirely. Called on connection teardown
    /// (the process-exit analogue for an in-process session).
    pub fn clear_backend(&self, session_id: u64) {
        let mut region = self.region.lock();
        region.backends.retain(|s| !matches!(s, Some(b) if b.session_id == session_id));
    }

    fn slot_for<'a>(
        region: &'a mut QosRegion,
        session_id: u64,
        role: &str,
        database_id: usize,
    ) -> &'a mut BackendStatusRow {
        if let Some(pos) = region
            .backends
            .iter()
            .position(|s| matches!(s, Some(b) if b.session_id == session_id))
        {
            let slot = region.backends[pos].as_mut().unwrap();
            slot.role = role.to_string();
            slot.database_id = database_id;
            return region.backends[pos].as_mut().unwrap();
        }
        if let Some(empty) = region.backends.iter().position(|s| s.is_none()) {
            region.backends[empty] = Some(BackendStatusRow {
                session_id,
                role: role.to_string(),
                database_id,
                current_cmd: CurrentCmd::None,
                in_transaction: false,
            });
            return region.backends[empty].as_mut().unwrap();
        }
        region.backends.push(Some(BackendStatusRow {
            session_id,
            role: role.to_string(),
            database_id,
            current_cmd: CurrentCmd::None,
            in_transaction: false,
        }));
        region.backends.last_mut().unwrap().as_mut().unwrap()
    }

    /// Implements `get_or_assign_cores`' critical-section discipline (§4.7):
    /// a matching entry is returned immediately; otherwise the caller is
    /// told to compute a fresh core set outside the lock and call
    /// `insert_affinity` to commit it.
    pub fn find_affinity(&self, database_id: usize, role: &str) -> Option<Vec<usize>> {
        self.region
            .lock()
            .affinity_entries
            .iter()
            .find(|e| e.database_id == database_id && e.role == role)
            .map(|e| e.cores.clone())
    }

    /// Re-scans for a matching entry (another backend may have inserted one
    /// in the meantime) and, if still absent, inserts — evicting the oldest
    /// entry by left-shift if the table is full.
    pub fn insert_affinity(&self, database_id: usize, role: &str, cores: Vec<usize>) -> Vec<usize> {
        let mut region = self.region.lock();
        if let Some(existing) = region
            .affinity_entries
            .iter()
            .find(|e| e.database_id == database_id && e.role == role)
        {
            return existing.cores.clone();
        }
        if region.affinity_entries.len() >= self.max_affinity_entries {
            region.affinity_entries.remove(0);
        }
        region.affinity_entries.push(AffinityEntry {
            database_id,
            role: role.to_string(),
            cores: cores.clone(),
        });
        cores
    }

    /// Round-robin core cursor fallback when hardware cycle sampling is
    /// unavailable (§4.7 core-selection routine). `requested` over `total`
    /// is clamped rather than wrapped, since a modulo assignment past `total`
    /// would otherwise hand out the same core index twice.
    pub fn next_round_robin_cores(&self, requested: usize, total: usize) -> Vec<usize> {
        if total == 0 || requested == 0 {
            return vec![];
        }
        let requested = if requested > total {
            tracing::warn!("qos: requested {requested} cores exceeds {total} online, clamping to {total}");
            total
        } else {
            requested
        };
        let mut region = self.region.lock();
        let start = region.next_cpu_core as usize % total;
        region.next_cpu_core = ((start + requested) % total) as u32;
        (0..requested).map(|i| (start + i) % total).collect()
    }
}

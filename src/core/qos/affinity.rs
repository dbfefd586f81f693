// src/core/qos/affinity.rs

//! Resource pinning (component C7): assigns a stable set of CPU cores per
//! (database, role) pair and pins the calling OS thread to them (§4.7).
//!
//! Core selection prefers the least-busy cores, sampled via `sysinfo`
//! (already the host's source of truth for hardware introspection
//! elsewhere, e.g. `config::get_available_memory`). A `sysinfo`
//! usage reading needs a prior baseline to diff against, so the very first
//! sample of the process falls back to the round-robin cursor; every
//! assignment after that uses real usage data. Pinning itself goes through
//! `core_affinity`, which wraps `sched_setaffinity` on Linux and the
//! platform equivalents, falling back to a no-op on targets it doesn't
//! support.

use super::limits::Limits;
use super::shared::SharedQosState;
use parking_lot::Mutex;
use std::sync::OnceLock;
use sysinfo::System;
use tracing::{debug, warn};

static TOTAL_CORES: OnceLock<usize> = OnceLock::new();

fn total_cores() -> usize {
    *TOTAL_CORES.get_or_init(|| System::new_all().cpus().len().max(1))
}

/// Holds the one `System` instance this process samples CPU usage through,
/// plus whether it has a prior reading to diff against yet.
struct CpuSampler {
    system: System,
    has_baseline: bool,
}

static CPU_SAMPLER: OnceLock<Mutex<CpuSampler>> = OnceLock::new();

fn cpu_sampler() -> &'static Mutex<CpuSampler> {
    CPU_SAMPLER.get_or_init(|| {
        Mutex::new(CpuSampler {
            system: System::new_all(),
            has_baseline: false,
        })
    })
}

/// Returns each online core's current usage percentage, or `None` if this is
/// the sampler's first reading (no baseline yet) or the core count has
/// changed since `total_cores` was cached.
fn sample_cpu_usage(total: usize) -> Option<Vec<f32>> {
    let mut sampler = cpu_sampler().lock();
    let had_baseline = sampler.has_baseline;
    sampler.system.refresh_cpu_usage();
    sampler.has_baseline = true;
    if !had_baseline {
        return None;
    }
    let usages: Vec<f32> = sampler.system.cpus().iter().map(|c| c.cpu_usage()).collect();
    if usages.len() != total { None } else { Some(usages) }
}

/// Picks the `requested` least-busy cores by current usage. Returns `None`
/// when no usage sample is available yet, leaving the round-robin fallback
/// to the caller (§4.7 core-selection routine).
fn least_busy_cores(requested: usize, total: usize) -> Option<Vec<usize>> {
    let mut by_usage: Vec<(usize, f32)> = sample_cpu_usage(total)?.into_iter().enumerate().collect();
    by_usage.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    Some(by_usage.into_iter().take(requested).map(|(i, _)| i).collect())
}

/// Returns the core set assigned to this (database, role) pair, computing
/// and registering a fresh one on first use. `requested` is typically the
/// session's `cpu_core_limit`; `None` means no pinning is requested and the
/// caller should skip affinity entirely.
pub fn get_or_assign_cores(shared: &SharedQosState, database_id: usize, role: &str, requested: usize) -> Vec<usize> {
    if let Some(existing) = shared.find_affinity(database_id, role) {
        return existing;
    }
    let requested = requested.min(shared.max_cores_per_entry());
    let total = total_cores();
    let cores = least_busy_cores(requested, total).unwrap_or_else(|| shared.next_round_robin_cores(requested, total));
    shared.insert_affinity(database_id, role, cores)
}

/// Pins the calling OS thread to the session's assigned cores, a no-op if
/// `cpu_core_limit` is unset or the platform doesn't support affinity.
///
/// The affinity table's LRU eviction can silently invalidate an entry out
/// from under a long-lived session; that session simply keeps running on
/// its already-pinned cores until its next statement re-triggers this
/// function and it picks up whatever (possibly different) set is current.
pub fn pin_affinity_if_needed(shared: &SharedQosState, database_id: usize, role: &str, limits: &Limits) {
    let Some(limit) = limits.cpu_core_limit else {
        return;
    };
    if limit == 0 {
        return;
    }
    let cores = get_or_assign_cores(shared, database_id, role, limit as usize);
    if cores.is_empty() {
        return;
    }
    let Some(all) = core_affinity::get_core_ids() else {
        debug!("qos: core affinity unsupported on this platform, skipping pin");
        return;
    };
    let ids: Vec<_> = all.into_iter().filter(|c| cores.contains(&c.id)).collect();
    let Some(&first) = ids.first() else {
        return;
    };
    if !core_affinity::set_for_current(first) {
        warn!("qos: failed to pin session thread to core {}", first.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_stable_across_repeated_lookups() {
        let shared = SharedQosState::new(16, 32);
        let first = get_or_assign_cores(&shared, 0, "alice", 2);
        let second = get_or_assign_cores(&shared, 0, "alice", 2);
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_roles_get_independent_assignments() {
        let shared = SharedQosState::new(16, 32);
        get_or_assign_cores(&shared, 0, "alice", 1);
        get_or_assign_cores(&shared, 0, "bob", 1);
        assert_ne!(shared.find_affinity(0, "alice"), None);
        assert_ne!(shared.find_affinity(0, "bob"), None);
    }

    #[test]
    fn pin_is_a_noop_without_a_cpu_core_limit() {
        let shared = SharedQosState::new(16, 32);
        let limits = Limits::default();
        pin_affinity_if_needed(&shared, 0, "alice", &limits);
        assert_eq!(shared.find_affinity(0, "alice"), None);
    }
}

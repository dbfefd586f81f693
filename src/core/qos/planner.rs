// src/core/qos/planner.rs

//! Planner rewriter (component C6): clamps the shard fan-out worker count
//! for multi-shard scans to the session's `cpu_core_limit` (§4.6). The
//! host's analogue of a parallel-gather plan node is the worker count
//! handed to a `KEYS`/`SCAN`-family/`FT.SEARCH`/`FT.AGGREGATE` fan-out.

use super::limits::Limits;

/// Describes a shard fan-out operation before and after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardScanPlan {
    /// Number of shards the command would fan out to absent any limit.
    pub requested_workers: u32,
    /// Number of workers the plan was rewritten to use.
    pub workers: u32,
}

impl ShardScanPlan {
    pub fn new(requested_workers: u32) -> Self {
        Self {
            requested_workers,
            workers: requested_workers,
        }
    }
}

/// Rewrites a shard scan plan's worker count per the session's effective
/// `cpu_core_limit`. `W = max(0, cpu_core_limit - 1)` reserves one core for
/// the session's own coordinating task, mirroring how a leader connection
/// coordinates its gather workers rather than itself counting as one.
///
/// `cpu_core_limit` unset or `0` leaves the plan untouched entirely, rather
/// than implying a clamp of zero workers.
pub fn rewrite_plan(mut plan: ShardScanPlan, limits: &Limits) -> ShardScanPlan {
    let Some(cpu_limit) = limits.cpu_core_limit.filter(|&l| l > 0) else {
        return plan;
    };
    let clamped = cpu_limit.saturating_sub(1);
    plan.workers = plan.requested_workers.min(clamped);
    plan
}

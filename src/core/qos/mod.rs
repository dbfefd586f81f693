// src/core/qos/mod.rs

//! The per-tenant QoS resource governor: per-role/per-database limits on
//! working memory, CPU cores, and concurrent statements, enforced at
//! statement admission and realized as a planner rewrite plus CPU pinning.
//!
//! Responsibilities are split the way the host splits its own cross-cutting
//! subsystems (compare `crate::core::acl`): a pure limit model and parser
//! (`limits`), a catalog reader over `QosConfig` (`catalog`), a single
//! cluster-wide shared region (`shared`), a per-session effective-limit
//! cache (`cache`), statement/transaction admission (`admission`), a
//! shard-scan worker-count rewriter (`planner`), a CPU affinity assigner
//! (`affinity`), and the glue that wires all of the above into the command
//! router and transaction handler (`hooks`).

pub mod admission;
pub mod affinity;
pub mod cache;
pub mod catalog;
pub mod hooks;
pub mod limits;
pub mod planner;
pub mod shared;

pub use admission::{admit_statement, admit_transaction, end_statement, end_transaction};
pub use cache::SessionQosCache;
pub use catalog::QosCatalog;
pub use limits::{Limits, StatementKind, WorkMemErrorLevel, classify_command};
pub use planner::{ShardScanPlan, rewrite_plan};
pub use shared::{SharedQosState, Stats};

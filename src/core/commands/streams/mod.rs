// src/core/commands/streams/mod.rs

pub mod xack;
pub mod xadd;
pub mod xautoclaim;
pub mod xclaim;
pub mod xdel;
pub mod xgroup;
pub mod xinfo;
pub mod xlen;
pub mod xpending;
pub mod xrange;
pub mod xread;
pub mod xreadgroup;
pub mod xtrim;

pub use self::xack::XAck;
pub use self::xadd::{XAdd, XAddOptions};
pub use self::xautoclaim::XAutoClaim;
pub use self::xclaim::XClaim;
pub use self::xdel::XDel;
pub use self::xgroup::{XGroup, XGroupSubcommand};
pub use self::xinfo::XInfo;
pub use self::xlen::XLen;
pub use self::xpending::{XPending, XPendingSubcommand};
pub use self::xrange::{XRange, XRevRange};
pub use self::xread::XRead;
pub use self::xreadgroup::XReadGroup;
pub use self::xtrim::{TrimStrategy, XTrim};

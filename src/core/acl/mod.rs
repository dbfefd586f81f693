// src/core/acl/mod.rs

//! Access control: user definitions, rule parsing, and the enforcer used by
//! the command router to authorize each incoming command.

pub mod enforcer;
pub mod parsed_rules;
pub mod rules;
pub mod user;

pub use self::enforcer::AclEnforcer;
pub use self::parsed_rules::{AclCommandRule, AclKeyRule, AclPubSubRule, ParsedAclCondition, ParsedAclRule};
pub use self::rules::{AclCondition, AclRule, ConditionOperator, ConditionTarget};
pub use self::user::AclUser;

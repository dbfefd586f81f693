pub mod acl;
pub mod asking;
pub mod auth;
pub mod backup;
pub mod bgrerewriteaof;
pub mod bgsave;
pub mod client;
pub mod command;
pub mod config;
pub mod dbsize;
pub mod del;
pub mod echo;
pub mod eval;
pub mod evalsha;
pub mod exists;
pub mod expire;
pub mod expire_variants;
pub mod failover;
pub mod flushall;
pub mod flushdb;
pub mod hello;
pub mod info;
pub mod keys;
pub mod lastsave;
pub mod latency;
pub mod memory;
pub mod migrate;
pub mod persist;
pub mod ping;
pub mod psubscribe;
pub mod psync;
pub mod pttl;
pub mod publish;
pub mod pubsub;
pub mod punsubscribe;
pub mod qos;
pub mod quit;
pub mod rename;
pub mod renamenx;
pub mod replconf;
pub mod restore;
pub mod role;
pub mod save;
pub mod script;
pub mod select;
pub mod shutdown;
pub mod slowlog;
pub mod sort;
pub mod subscribe;
pub mod time;
pub mod ttl;
pub mod type_cmd;
pub mod unlink;
pub mod unsubscribe;
pub mod unwatch;
pub mod watch;

pub use self::acl::Acl;
pub use self::asking::Asking;
pub use self::auth::Auth;
pub use self::backup::Backup;
pub use self::bgrerewriteaof::BgRewriteAof;
pub use self::bgsave::BgSave;
pub use self::client::Client;
pub use self::command::CommandInfo;
pub use self::config::ConfigGetSet;
pub use self::dbsize::DbSize;
pub use self::del::Del;
pub use self::echo::Echo;
pub use self::eval::Eval;
pub use self::evalsha::EvalSha;
pub use self::exists::Exists;
pub use self::expire::Expire;
pub use self::expire_variants::{ExpireAt, PExpire, PExpireAt};
pub use self::failover::Failover;
pub use self::flushall::FlushAll;
pub use self::flushdb::FlushDb;
pub use self::hello::Hello;
pub use self::info::Info;
pub use self::keys::Keys;
pub use self::lastsave::LastSave;
pub use self::latency::Latency;
pub use self::memory::Memory;
pub use self::migrate::Migrate;
pub use self::persist::Persist;
pub use self::ping::Ping;
pub use self::psubscribe::PSubscribe;
pub use self::psync::Psync;
pub use self::pttl::Pttl;
pub use self::publish::Publish;
pub use self::pubsub::PubSubInfo;
pub use self::punsubscribe::PUnsubscribe;
pub use self::qos::Qos;
pub use self::quit::Quit;
pub use self::rename::Rename;
pub use self::renamenx::RenameNx;
pub use self::replconf::Replconf;
pub use self::restore::Restore;
pub use self::role::Role;
pub use self::save::Save;
pub use self::script::Script;
pub use self::select::Select;
pub use self::shutdown::Shutdown;
pub use self::slowlog::Slowlog;
pub use self::sort::Sort;
pub use self::subscribe::Subscribe;
pub use self::time::Time;
pub use self::ttl::Ttl;
pub use self::type_cmd::TypeInfo;
pub use self::unlink::Unlink;
pub use self::unsubscribe::Unsubscribe;
pub use self::unwatch::Unwatch;
pub use self::watch::Watch;

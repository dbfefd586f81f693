// src/core/commands/generic/qos.rs

use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

/// Enum for QOS subcommands.
#[derive(Debug, Clone, Default)]
pub enum QosSubcommand {
    SetWorkMem(String),
    AlterRole { role: String, name: String, value: String },
    AlterDatabase { database: usize, name: String, value: String },
    Reset,
    Version,
    Stats { reset: bool },
    #[default]
    Settings,
    Save,
}

/// The main QOS command struct, the per-tenant resource governor's
/// administrative surface: tune limits online (`ALTER ROLE`/`ALTER
/// DATABASE`), override the current session (`SET`), and inspect the
/// governor's counters (`STATS`, `SETTINGS`, `VERSION`).
#[derive(Debug, Clone, Default)]
pub struct Qos {
    pub subcommand: QosSubcommand,
}

impl ParseCommand for Qos {
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        if args.is_empty() {
            return Err(SpinelDBError::WrongArgumentCount("QOS".to_string()));
        }

        let sub_str = extract_string(&args[0])?.to_ascii_lowercase();
        let subcommand = match sub_str.as_str() {
            "set" => {
                if args.len() != 3 {
                    return Err(SpinelDBError::WrongArgumentCount("QOS SET".to_string()));
                }
                let name = extract_string(&args[1])?.to_ascii_lowercase();
                if name != "work_mem" {
                    return Err(SpinelDBError::InvalidState(format!(
                        "ERR unsupported QOS SET target '{name}', only WORK_MEM is settable per-session"
                    )));
                }
                QosSubcommand::SetWorkMem(extract_string(&args[2])?)
            }
            "alter" => {
                if args.len() != 5 {
                    return Err(SpinelDBError::WrongArgumentCount("QOS ALTER".to_string()));
                }
                let scope = extract_string(&args[1])?.to_ascii_lowercase();
                let name = extract_string(&args[2])?;
                let value = extract_string(&args[3])?;
                match scope.as_str() {
                    "role" => QosSubcommand::AlterRole {
                        role: name,
                        name: value,
                        value: extract_string(&args[4])?,
                    },
                    "database" => {
                        let database: usize = name.parse().map_err(|_| {
                            SpinelDBError::InvalidState(format!("ERR invalid database index '{name}'"))
                        })?;
                        QosSubcommand::AlterDatabase {
                            database,
                            name: value,
                            value: extract_string(&args[4])?,
                        }
                    }
                    other => {
                        return Err(SpinelDBError::InvalidState(format!(
                            "ERR QOS ALTER scope must be ROLE or DATABASE, got '{other}'"
                        )));
                    }
                }
            }
            "reset" => {
                if args.len() != 1 {
                    return Err(SpinelDBError::WrongArgumentCount("QOS RESET".to_string()));
                }
                QosSubcommand::Reset
            }
            "version" => {
                if args.len() != 1 {
                    return Err(SpinelDBError::WrongArgumentCount("QOS VERSION".to_string()));
                }
                QosSubcommand::Version
            }
            "stats" => {
                if args.len() > 2 {
                    return Err(SpinelDBError::WrongArgumentCount("QOS STATS".to_string()));
                }
                let reset = match args.get(1) {
                    None => false,
                    Some(a) if extract_string(a)?.eq_ignore_ascii_case("reset") => true,
                    Some(_) => {
                        return Err(SpinelDBError::InvalidState(
                            "ERR QOS STATS takes no argument other than RESET".to_string(),
                        ));
                    }
                };
                QosSubcommand::Stats { reset }
            }
            "settings" => {
                if args.len() != 1 {
                    return Err(SpinelDBError::WrongArgumentCount("QOS SETTINGS".to_string()));
                }
                QosSubcommand::Settings
            }
            "save" => {
                if args.len() != 1 {
                    return Err(SpinelDBError::WrongArgumentCount("QOS SAVE".to_string()));
                }
                QosSubcommand::Save
            }
            _ => {
                return Err(SpinelDBError::UnknownCommand(
                    "QOS unknown subcommand".to_string(),
                ));
            }
        };

        Ok(Qos { subcommand })
    }
}

// QOS, like SELECT, can mutate session-local state (`SET`/`RESET`) that
// `ExecutionContext` has no handle to, so its real dispatch lives in
// `handler::actions::qos` where the router has both `&ServerState` and
// `&mut SessionState` in hand.
#[async_trait]
impl ExecutableCommand for Qos {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        Err(SpinelDBError::Internal(
            "QOS command should not be executed directly".into(),
        ))
    }
}

impl CommandSpec for Qos {
    fn name(&self) -> &'static str {
        "qos"
    }
    fn arity(&self) -> i64 {
        -2
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }
    fn first_key(&self) -> i64 {
        0
    }
    fn last_key(&self) -> i64 {
        0
    }
    fn step(&self) -> i64 {
        0
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![]
    }
}


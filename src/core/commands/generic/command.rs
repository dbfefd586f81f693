// src/core/commands/generic/command.rs

use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{
    CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

/// The `COMMAND` introspection command. Only the `COUNT` and bare-call forms
/// are meaningfully supported; other subcommands return an empty array so
/// clients that probe for capabilities at connect time don't error out.
#[derive(Debug, Clone, Default)]
pub struct CommandInfo {
    pub subcommand: Option<String>,
}

impl ParseCommand for CommandInfo {
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        let subcommand = match args.first() {
            Some(frame) => Some(extract_string(frame)?.to_ascii_uppercase()),
            None => None,
        };
        Ok(CommandInfo { subcommand })
    }
}

#[async_trait]
impl ExecutableCommand for CommandInfo {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        let response = match self.subcommand.as_deref() {
            Some("COUNT") => RespValue::Integer(0),
            _ => RespValue::Array(vec![]),
        };
        Ok((response, WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for CommandInfo {
    fn name(&self) -> &'static str {
        "command"
    }
    fn arity(&self) -> i64 {
        -1
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
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
        match &self.subcommand {
            Some(s) => vec![s.clone().into()],
            None => vec![],
        }
    }
}

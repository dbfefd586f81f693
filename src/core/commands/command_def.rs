// src/core/commands/command_def.rs

//! Generates the central `Command` enum and its supporting trait
//! implementations from a flat table of (variant, struct, module) triples.
//! Adding a new command means adding one line to the table in `mod.rs`,
//! not touching the routing, parsing, or serialization code here.

macro_rules! define_commands {
    (
        dispatchers: {
            $( ($d_variant:ident, $d_struct:ident, $d_module:ident) ),* $(,)?
        },
        standard: {
            $( ($variant:ident, $struct:ident, $module:ident) ),* $(,)?
        }
    ) => {
        /// The parsed representation of every command this server understands.
        #[derive(Debug, Clone)]
        pub enum Command {
            $( $d_variant($d_module::$d_struct), )*
            $( $variant($module::$struct), )*
        }

        #[async_trait::async_trait]
        impl crate::core::commands::command_trait::CommandExt for Command {
            fn get_flags(&self) -> crate::core::commands::command_trait::CommandFlags {
                match self {
                    $( Command::$d_variant(c) => crate::core::commands::command_spec::CommandSpec::flags(c), )*
                    $( Command::$variant(c) => crate::core::commands::command_spec::CommandSpec::flags(c), )*
                }
            }

            fn get_keys(&self) -> Vec<bytes::Bytes> {
                match self {
                    $( Command::$d_variant(c) => crate::core::commands::command_spec::CommandSpec::get_keys(c), )*
                    $( Command::$variant(c) => crate::core::commands::command_spec::CommandSpec::get_keys(c), )*
                }
            }

            async fn execute<'a>(
                &self,
                ctx: &mut crate::core::storage::db::ExecutionContext<'a>,
            ) -> Result<(crate::core::RespValue, crate::core::commands::command_trait::WriteOutcome), crate::core::SpinelDBError> {
                match self {
                    $( Command::$d_variant(c) => crate::core::commands::command_trait::ExecutableCommand::execute(c, ctx).await, )*
                    $( Command::$variant(c) => crate::core::commands::command_trait::ExecutableCommand::execute(c, ctx).await, )*
                }
            }

            async fn execute_and_stream<'a>(
                &self,
                ctx: &mut crate::core::storage::db::ExecutionContext<'a>,
            ) -> Result<crate::core::handler::command_router::RouteResponse, crate::core::SpinelDBError> {
                match self {
                    $( Command::$d_variant(c) => {
                        let (val, _outcome) = crate::core::commands::command_trait::ExecutableCommand::execute(c, ctx).await?;
                        Ok(crate::core::handler::command_router::RouteResponse::Single(val))
                    } )*
                    $( Command::$variant(c) => {
                        let (val, _outcome) = crate::core::commands::command_trait::ExecutableCommand::execute(c, ctx).await?;
                        Ok(crate::core::handler::command_router::RouteResponse::Single(val))
                    } )*
                }
            }
        }

        impl Command {
            /// The lowercase command name, as reported in logs and `COMMAND` output.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Command::$d_variant(c) => crate::core::commands::command_spec::CommandSpec::name(c), )*
                    $( Command::$variant(c) => crate::core::commands::command_spec::CommandSpec::name(c), )*
                }
            }

            /// The command's arguments, re-serialized without the command name itself.
            pub fn get_resp_args(&self) -> Vec<bytes::Bytes> {
                match self {
                    $( Command::$d_variant(c) => crate::core::commands::command_spec::CommandSpec::to_resp_args(c), )*
                    $( Command::$variant(c) => crate::core::commands::command_spec::CommandSpec::to_resp_args(c), )*
                }
            }
        }

        impl TryFrom<crate::core::protocol::RespFrame> for Command {
            type Error = crate::core::SpinelDBError;

            fn try_from(frame: crate::core::protocol::RespFrame) -> Result<Self, Self::Error> {
                let crate::core::protocol::RespFrame::Array(mut parts) = frame else {
                    return Err(crate::core::SpinelDBError::InvalidState(
                        "expected a command as a RESP array".to_string(),
                    ));
                };
                if parts.is_empty() {
                    return Err(crate::core::SpinelDBError::UnknownCommand(String::new()));
                }
                let name_frame = parts.remove(0);
                let name = crate::core::commands::helpers::extract_string(&name_frame)?
                    .to_ascii_uppercase();
                let args = parts;

                $(
                    if name == stringify!($d_variant).to_ascii_uppercase() {
                        return Ok(Command::$d_variant(
                            <$d_module::$d_struct as crate::core::commands::command_trait::ParseCommand>::parse(&args)?,
                        ));
                    }
                )*
                $(
                    if name == stringify!($variant).to_ascii_uppercase() {
                        return Ok(Command::$variant(
                            <$module::$struct as crate::core::commands::command_trait::ParseCommand>::parse(&args)?,
                        ));
                    }
                )*

                Err(crate::core::SpinelDBError::UnknownCommand(name))
            }
        }

        impl From<Command> for crate::core::protocol::RespFrame {
            fn from(command: Command) -> Self {
                let mut parts = vec![crate::core::protocol::RespFrame::BulkString(
                    bytes::Bytes::from(command.name().to_ascii_uppercase()),
                )];
                parts.extend(
                    command
                        .get_resp_args()
                        .into_iter()
                        .map(crate::core::protocol::RespFrame::BulkString),
                );
                crate::core::protocol::RespFrame::Array(parts)
            }
        }
    };
}

//! Generic command runnable.
//!
//! Runs one external command as a pipeline step. The command comes from
//! the job payload: either the `cmd` key of an encoded mapping, or the
//! payload text itself. `#name#` markers are resolved against the job's
//! parameters once, and the resolved command is kept so that a retried job
//! runs exactly what the first attempt ran.

use async_trait::async_trait;
use hive_core::{codec, ParamValue};
use std::collections::BTreeMap;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::connection::ReleasedConnection;
use crate::r#trait::{CommandLine, JobContext, JobError, Result, Runnable};

/// Parameter holding the command.
pub const CMD_PARAM: &str = "cmd";

/// Parameter switching string commands to `bash -o pipefail`.
pub const PIPEFAIL_PARAM: &str = "use_bash_pipefail";

/// Runs an arbitrary command line.
pub struct SystemCmd;

impl SystemCmd {
    /// Registry name.
    pub const NAME: &'static str = "SystemCmd";

    /// Work out the unresolved command from the payload and parameters.
    fn locate_command(ctx: &mut JobContext) -> Result<ParamValue> {
        let from_payload = match codec::decode(&ctx.input_id)? {
            ParamValue::Map(entries) => {
                ctx.params.merge(entries);
                None
            }
            ParamValue::String(s) if s.trim().is_empty() => None,
            ParamValue::Null => None,
            literal => Some(literal),
        };

        let command = from_payload
            .or_else(|| ctx.params.get(CMD_PARAM).cloned())
            .unwrap_or(ParamValue::Null);
        Ok(command)
    }

    /// Turn a substituted `cmd` value into a command line.
    fn to_command_line(value: ParamValue) -> Result<CommandLine> {
        let command = match value {
            ParamValue::Null => None,
            ParamValue::List(items) => {
                let argv: Vec<String> = items.iter().map(ParamValue::to_param_string).collect();
                match argv.first() {
                    Some(program) if !program.trim().is_empty() => Some(CommandLine::Argv(argv)),
                    _ => None,
                }
            }
            ParamValue::Map(_) => {
                return Err(JobError::Configuration(format!(
                    "'{}' must be a string or a list of strings, not a mapping",
                    CMD_PARAM
                )))
            }
            scalar => {
                let line = scalar.to_param_string();
                (!line.trim().is_empty()).then_some(CommandLine::Shell(line))
            }
        };

        command.ok_or_else(|| JobError::Configuration("No command given".to_string()))
    }

    /// Build the process for a resolved command. A stored command may come
    /// back from an earlier attempt, so it is checked again here.
    fn build_command(command: &CommandLine, pipefail: bool) -> Result<Command> {
        let no_command = || JobError::Configuration("No command given".to_string());

        let cmd = match command {
            CommandLine::Shell(line) if line.trim().is_empty() => return Err(no_command()),
            CommandLine::Shell(line) if pipefail => {
                let mut cmd = Command::new("bash");
                cmd.args(["-o", "pipefail", "-c", line]);
                cmd
            }
            CommandLine::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.args(["-c", line]);
                cmd
            }
            CommandLine::Argv(argv) => match argv.split_first() {
                Some((program, args)) if !program.trim().is_empty() => {
                    let mut cmd = Command::new(program);
                    cmd.args(args);
                    cmd
                }
                _ => return Err(no_command()),
            },
        };
        Ok(cmd)
    }
}

/// Exit code of a finished process; `128 + n` when killed by signal `n`.
pub fn decode_exit_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

#[async_trait]
impl Runnable for SystemCmd {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn param_defaults(&self) -> BTreeMap<String, ParamValue> {
        BTreeMap::from([(PIPEFAIL_PARAM.to_string(), ParamValue::Int(0))])
    }

    async fn fetch_input(&self, ctx: &mut JobContext) -> Result<()> {
        if let Some(command) = &ctx.resolved_command {
            debug!("Reusing resolved command: {}", command);
            return Ok(());
        }

        let raw = Self::locate_command(ctx)?;
        let resolved = Self::to_command_line(ctx.params.substitute_value(&raw)?)?;

        ctx.params.set(CMD_PARAM, resolved.to_param());
        ctx.resolved_command = Some(resolved);
        Ok(())
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let command = ctx.resolved_command.clone().ok_or_else(|| {
            JobError::Configuration("run called before fetch_input resolved a command".to_string())
        })?;
        let pipefail = ctx.params.get(PIPEFAIL_PARAM).is_some_and(ParamValue::is_truthy);

        let mut process = Self::build_command(&command, pipefail)?;

        info!("Running command: {}", command);
        let started = std::time::Instant::now();

        let status = {
            // The command can block for hours; do not sit on a connection meanwhile.
            let _released = ReleasedConnection::new(ctx.connection());
            process.status().await
        };

        let status = status.map_err(|e| {
            warn!("Could not start `{}`: {}", command, e);
            JobError::Io(e)
        })?;
        let code = decode_exit_status(status);
        info!("Command finished with exit code {} after {:?}", code, started.elapsed());

        if code != 0 {
            return Err(JobError::ExecutionFailure {
                command: command.to_string(),
                code,
            });
        }
        Ok(())
    }

    async fn write_output(&self, _ctx: &mut JobContext) -> Result<()> {
        // Side effects only; producing pipeline data is up to other runnables.
        Ok(())
    }
}

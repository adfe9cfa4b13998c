// src/exec/command.rs

//! Shell-command build action used by the `reactor` binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::BuildError;
use crate::exec::backend::{BuildAction, BuildContext, BuildFuture};
use crate::exec::output::UnitOutput;
use crate::types::BuildUnit;

#[derive(Debug, Clone)]
struct ModuleCommand {
    cmd: String,
    dir: PathBuf,
}

/// Runs each module's `cmd` through the platform shell.
///
/// stdout and stderr are both forwarded line by line to the module's
/// [`UnitOutput`]. A non-zero exit status fails the module.
#[derive(Debug, Clone)]
pub struct CommandAction {
    commands: Arc<HashMap<BuildUnit, ModuleCommand>>,
}

impl CommandAction {
    /// Commands from `cfg`; relative `dir` entries resolve against `base_dir`.
    pub fn from_config(cfg: &ConfigFile, base_dir: &Path) -> Self {
        let commands = cfg
            .module
            .iter()
            .map(|(name, module)| {
                let dir = match module.dir.as_deref() {
                    Some(dir) => base_dir.join(dir),
                    None => base_dir.to_path_buf(),
                };
                (
                    BuildUnit::from(name.as_str()),
                    ModuleCommand {
                        cmd: module.cmd.clone(),
                        dir,
                    },
                )
            })
            .collect();

        Self {
            commands: Arc::new(commands),
        }
    }

    pub fn command_for(&self, unit: &BuildUnit) -> Option<&str> {
        self.commands.get(unit).map(|c| c.cmd.as_str())
    }
}

impl BuildAction for CommandAction {
    fn build(&self, unit: BuildUnit, ctx: BuildContext) -> BuildFuture {
        let command = self.commands.get(&unit).cloned();
        Box::pin(async move {
            let command = command.ok_or_else(|| {
                BuildError::msg(format!("no command configured for module '{unit}'"))
            })?;
            run_command(&unit, &command, ctx.output()).await
        })
    }
}

async fn run_command(
    unit: &BuildUnit,
    command: &ModuleCommand,
    output: &UnitOutput,
) -> Result<(), BuildError> {
    info!(unit = %unit, cmd = %command.cmd, dir = %command.dir.display(), "starting module command");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&command.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&command.cmd);
        c
    };

    cmd.current_dir(&command.dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take().map(|s| forward_lines(s, output.clone()));
    let stderr = child.stderr.take().map(|s| forward_lines(s, output.clone()));

    let status = child.wait().await?;

    // Drain the readers so no output line is lost after exit.
    for reader in [stdout, stderr].into_iter().flatten() {
        if let Err(e) = reader.await {
            warn!(unit = %unit, error = %e, "output reader task failed");
        }
    }

    let code = status.code().unwrap_or(-1);
    info!(unit = %unit, exit_code = code, success = status.success(), "module command exited");

    if status.success() {
        Ok(())
    } else {
        Err(BuildError::ExitStatus(code))
    }
}

fn forward_lines<R>(reader: R, output: UnitOutput) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => output.line(&line),
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "stopped reading module output");
                    break;
                }
            }
        }
    })
}

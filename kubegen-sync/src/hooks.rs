//! Pre and post commands run around the output write.

use std::fmt;
use std::sync::Arc;

use kubegen_core::PlatformOps;

use crate::error::HookError;

/// Where in the cycle a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Pre,
    Post,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookStage::Pre => "pre",
            HookStage::Post => "post",
        })
    }
}

/// Runs operator commands through the platform interpreter.
#[derive(Debug, Clone)]
pub struct HookRunner {
    platform: Arc<dyn PlatformOps>,
    log_output: bool,
}

impl HookRunner {
    pub fn new(platform: Arc<dyn PlatformOps>, log_output: bool) -> Self {
        Self {
            platform,
            log_output,
        }
    }

    /// Run `command` to completion. Absent or blank commands do nothing.
    ///
    /// Returns `Ok(true)` when a command actually ran.
    pub fn run(&self, stage: HookStage, command: Option<&str>) -> Result<bool, HookError> {
        let Some(command) = command.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(false);
        };

        tracing::info!(%stage, command, "running command");
        let output = self.platform.run(command).map_err(|source| HookError::Spawn {
            stage,
            command: command.to_string(),
            source,
        })?;

        let combined = output.combined();
        if !output.success {
            return Err(HookError::Failed {
                stage,
                command: command.to_string(),
                code: output.code,
                output: combined.trim_end().to_string(),
            });
        }
        if self.log_output {
            tracing::info!(%stage, command, output = %combined.trim_end(), "command output");
        }
        Ok(true)
    }
}

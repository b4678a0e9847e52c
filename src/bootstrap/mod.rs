//! Headless display bootstrap: bring up a virtual framebuffer, wait for it,
//! then hand the process over to the application.

pub mod display;

pub use display::ScreenGeometry;

use crate::config::DisplayConfig;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("display server exited before becoming ready ({0})")]
    DisplayExited(ExitStatus),

    #[error("display socket {socket:?} did not appear within {timeout:?}")]
    ReadinessTimeout { socket: PathBuf, timeout: Duration },

    #[error("failed to poll display server: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid screen geometry {0:?}, expected WIDTHxHEIGHTxDEPTH")]
    InvalidGeometry(String),
}

pub struct Bootstrap {
    config: DisplayConfig,
}

impl Bootstrap {
    pub fn new(config: DisplayConfig) -> Self {
        Self { config }
    }

    /// Application command with the display exported and output unbuffered
    pub fn app_command(&self, program: &str, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command
            .args(args)
            .env("DISPLAY", self.config.display_name())
            .env("PYTHONUNBUFFERED", "1");
        command
    }

    /// Start the display server, wait for it, then replace this process with
    /// `program`. Only returns on failure, except on platforms without `exec`
    /// where the application's exit code is returned.
    ///
    /// A failure after the server started leaves it running.
    pub async fn run(&self, program: &str, args: &[String]) -> Result<i32, BootstrapError> {
        let mut server = display::start_server(&self.config)?;
        display::wait_until_ready(&self.config, &mut server).await?;

        tracing::info!(
            "Launching {} on DISPLAY={}",
            program,
            self.config.display_name()
        );
        hand_over(program, self.app_command(program, args))
    }
}

#[cfg(unix)]
fn hand_over(program: &str, mut command: Command) -> Result<i32, BootstrapError> {
    use std::os::unix::process::CommandExt;

    let source = command.exec();
    Err(BootstrapError::Exec {
        program: program.to_string(),
        source,
    })
}

#[cfg(not(unix))]
fn hand_over(program: &str, mut command: Command) -> Result<i32, BootstrapError> {
    let status = command.status().map_err(|source| BootstrapError::Exec {
        program: program.to_string(),
        source,
    })?;
    Ok(status.code().unwrap_or(1))
}

//! Lifecycle of a self-managed engine process

use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use webaudit_core::{Error, Result};

/// A scanning engine launched by this process
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    command: String,
}

impl EngineProcess {
    /// Launch the engine in daemon mode on the fixed control port with
    /// the API key check disabled, followed by `extra_args`.
    pub fn launch(command: &str, host: &str, port: u16, extra_args: &[String]) -> Result<Self> {
        let args = launch_args(host, port, extra_args);
        info!("Launching scanning engine: {} {}", command, args.join(" "));

        let child = Command::new(command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::EngineStart(format!("failed to spawn '{}': {}", command, e)))?;

        debug!("Engine process started (pid {:?})", child.id());
        Ok(Self {
            child,
            command: command.to_string(),
        })
    }

    /// Operating-system process id, if the process has not been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process is still alive
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait up to `grace` for the process to exit on its own
    pub async fn wait_for_exit(&mut self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Engine process exited: {}", status);
                true
            }
            Ok(Err(e)) => {
                warn!("Failed to wait for engine process: {}", e);
                false
            }
            Err(_) => false,
        }
    }

    /// Force-terminate and reap the process. Never fails.
    pub async fn kill(&mut self, wait: Duration) {
        if !self.is_running() {
            return;
        }
        warn!("Engine process '{}' still alive; forcing termination", self.command);
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to kill engine process: {}", e);
            return;
        }
        match tokio::time::timeout(wait, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Engine process exited: {}", status),
            Ok(Err(e)) => warn!("Failed to reap engine process: {}", e),
            Err(_) => warn!("Engine process did not exit within {:?} after kill", wait),
        }
    }
}

/// Arguments for daemon mode with an open control API
pub fn launch_args(host: &str, port: u16, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        String::from("-daemon"),
        String::from("-host"),
        host.to_string(),
        String::from("-port"),
        port.to_string(),
        String::from("-config"),
        String::from("api.disablekey=true"),
        String::from("-config"),
        String::from("api.addrs.addr.name=.*"),
        String::from("-config"),
        String::from("api.addrs.addr.regex=true"),
    ];
    args.extend(extra.iter().cloned());
    args
}

// src/services/notifier.rs

//! Notification dispatch.
//!
//! The watcher only produces a title and an HTML body. Delivery is left to
//! an external dispatcher.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::NotificationConfig;

/// Receiver of notification messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        log::info!("[{}] {}", title, body);
        Ok(())
    }
}

/// Default limit for one `apprise` invocation.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Hands notifications to the `apprise` command line tool.
///
/// Each dispatch runs under a timeout; a process that outlives it is killed.
#[derive(Debug, Clone)]
pub struct AppriseNotifier {
    program: String,
    config_path: PathBuf,
    timeout: Duration,
}

impl AppriseNotifier {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            program: "apprise".to_string(),
            config_path: config_path.into(),
            timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, title: &str, body: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--config")
            .arg(&self.config_path)
            .arg("--input-format")
            .arg("html")
            .arg("--title")
            .arg(title)
            .arg("--body")
            .arg(body)
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Notifier for AppriseNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        log::info!("{}", body);
        let output = tokio::time::timeout(self.timeout, self.command(title, body).output())
            .await
            .map_err(|_| {
                AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{} did not finish within {:?}", self.program, self.timeout),
                ))
            })??;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Io(std::io::Error::other(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ))));
        }
        Ok(())
    }
}

/// Build the notifier selected by the configuration.
pub fn notifier_from_config(config: &NotificationConfig) -> Box<dyn Notifier> {
    match &config.apprise_config_path {
        Some(path) => Box::new(
            AppriseNotifier::new(path).with_timeout(Duration::from_secs(config.timeout_secs)),
        ),
        None => {
            log::warn!("No apprise_config_path configured, notifications are only logged");
            Box::new(LogNotifier)
        }
    }
}

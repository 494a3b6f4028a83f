//! Kerberos ticket renewal.
//!
//! Integrated authentication uses whatever ticket sits in the process's
//! credential cache. When a principal and keytab are configured, a background
//! task keeps that ticket fresh: it tries `kinit -R` first and falls back to
//! `kinit -kt <keytab> <principal>` when the ticket can no longer be renewed.

use crate::config::KerberosConfig;
use crate::constants::RENEWER_STOP_TIMEOUT;
use crate::error::ServerError;
use crate::shutdown::ShutdownController;
use std::ffi::OsStr;
use std::process::Output;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How a ticket was refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The existing ticket was renewed (`kinit -R`).
    Renewed,
    /// A new ticket was obtained from the keytab.
    Obtained,
}

/// Counters for renewal attempts.
#[derive(Debug, Default)]
pub struct RenewalStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl RenewalStats {
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Keeps the process's Kerberos ticket valid.
#[derive(Debug, Clone)]
pub struct KerberosRenewer {
    config: Arc<KerberosConfig>,
    stats: Arc<RenewalStats>,
}

impl KerberosRenewer {
    pub fn new(config: KerberosConfig) -> Self {
        Self {
            config: Arc::new(config),
            stats: Arc::new(RenewalStats::default()),
        }
    }

    pub fn stats(&self) -> &RenewalStats {
        &self.stats
    }

    /// Renew the current ticket, or obtain a new one from the keytab.
    pub async fn renew_ticket(&self) -> Result<RenewalOutcome, ServerError> {
        let principal = &self.config.principal;

        let renewal = self.run_kinit(&[OsStr::new("-R")]).await?;
        if renewal.status.success() {
            info!("Successfully renewed Kerberos ticket for {}", principal);
            return Ok(RenewalOutcome::Renewed);
        }
        debug!(
            "kinit -R failed ({}), requesting a new ticket from keytab",
            renewal.status
        );

        let keytab = self.config.keytab.as_os_str();
        let fresh = self
            .run_kinit(&[OsStr::new("-kt"), keytab, OsStr::new(principal)])
            .await?;
        if fresh.status.success() {
            info!("Successfully obtained new Kerberos ticket for {}", principal);
            Ok(RenewalOutcome::Obtained)
        } else {
            Err(ServerError::kerberos(format!(
                "Failed to obtain Kerberos ticket: {}",
                String::from_utf8_lossy(&fresh.stderr).trim()
            )))
        }
    }

    async fn run_kinit(&self, args: &[&OsStr]) -> Result<Output, ServerError> {
        let program = &self.config.kinit_program;
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        match timeout(self.config.command_timeout, child).await {
            Err(_) => Err(ServerError::kerberos("Kerberos ticket renewal timed out")),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(ServerError::kerberos(
                format!("{} command not found. Is krb5-user installed?", program),
            )),
            Ok(Err(e)) => Err(ServerError::kerberos(format!(
                "Error renewing Kerberos ticket: {}",
                e
            ))),
            Ok(Ok(output)) => Ok(output),
        }
    }

    /// Current credential cache listing from `klist`, if available.
    pub async fn ticket_info(&self) -> Option<String> {
        let child = Command::new(&self.config.klist_program)
            .kill_on_drop(true)
            .output();

        match timeout(self.config.klist_timeout, child).await {
            Ok(Ok(output)) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => {
                debug!("klist exited with {}", output.status);
                None
            }
            Ok(Err(e)) => {
                error!("Failed to get ticket info: {}", e);
                None
            }
            Err(_) => {
                error!("klist timed out");
                None
            }
        }
    }

    async fn attempt(&self) {
        match self.renew_ticket().await {
            Ok(_) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("{}", e);
            }
        }
    }

    /// Start renewing in the background.
    ///
    /// The first attempt runs immediately, then one every `renew_interval`.
    pub fn spawn(&self) -> RenewalTask {
        let stop = ShutdownController::new();
        let mut stop_signal = stop.signal();
        let renewer = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(renewer.config.renew_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_signal.recv() => break,
                    _ = ticker.tick() => {
                        debug!("Renewing Kerberos ticket...");
                        tokio::select! {
                            _ = stop_signal.recv() => break,
                            _ = renewer.attempt() => {}
                        }
                    }
                }
            }
            debug!("Kerberos renewal loop exited");
        });

        info!(
            "Started Kerberos ticket renewal for {} (interval: {}s)",
            self.config.principal,
            self.config.renew_interval.as_secs()
        );

        RenewalTask { stop, handle }
    }
}

/// Handle to a running renewal loop.
pub struct RenewalTask {
    stop: ShutdownController,
    handle: JoinHandle<()>,
}

impl RenewalTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait briefly for it to exit.
    pub async fn stop(self) {
        info!("Stopping Kerberos ticket renewal...");
        self.stop.shutdown();

        match timeout(RENEWER_STOP_TIMEOUT, self.handle).await {
            Ok(Ok(())) => info!("Kerberos ticket renewal stopped"),
            Ok(Err(e)) => error!("Kerberos renewal task failed: {}", e),
            Err(_) => warn!("Kerberos renewal task did not stop in time"),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn renewer_with(kinit: &str, klist: &str) -> KerberosRenewer {
        let mut config = KerberosConfig::new("svc-app@EXAMPLE.COM");
        config.kinit_program = kinit.to_string();
        config.klist_program = klist.to_string();
        config.command_timeout = Duration::from_secs(5);
        KerberosRenewer::new(config)
    }

    #[tokio::test]
    async fn test_renew_succeeds_when_kinit_succeeds() {
        let renewer = renewer_with("true", "true");
        assert_eq!(
            renewer.renew_ticket().await.unwrap(),
            RenewalOutcome::Renewed
        );
    }

    #[tokio::test]
    async fn test_renew_fails_when_kinit_fails() {
        let renewer = renewer_with("false", "false");
        let err = renewer.renew_ticket().await.unwrap_err();
        assert!(matches!(err, ServerError::Kerberos(_)));
        assert!(err.to_string().contains("Failed to obtain Kerberos ticket"));
    }

    #[tokio::test]
    async fn test_missing_kinit_reports_not_found() {
        let renewer = renewer_with("/nonexistent/bin/kinit", "true");
        let err = renewer.renew_ticket().await.unwrap_err();
        assert!(err.to_string().contains("command not found"));
    }

    #[tokio::test]
    async fn test_ticket_info() {
        assert_eq!(renewer_with("true", "true").ticket_info().await, Some(String::new()));
        assert_eq!(renewer_with("true", "false").ticket_info().await, None);
        assert_eq!(
            renewer_with("true", "/nonexistent/bin/klist").ticket_info().await,
            None
        );
    }

    #[tokio::test]
    async fn test_spawn_renews_immediately_and_stops() {
        let renewer = renewer_with("true", "true");
        let task = renewer.spawn();

        for _ in 0..50 {
            if renewer.stats().succeeded() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(renewer.stats().succeeded(), 1);
        assert_eq!(renewer.stats().failed(), 0);

        task.stop().await;
    }

    #[tokio::test]
    async fn test_stop_interrupts_running_kinit() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!("slow-kinit-{}", std::process::id()));
        std::fs::write(&script, "#!/bin/sh\nsleep 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let renewer = renewer_with(script.to_str().unwrap(), "true");
        let task = renewer.spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        task.stop().await;
        let elapsed = started.elapsed();
        let _ = std::fs::remove_file(&script);

        assert!(elapsed < Duration::from_secs(2), "stop took {:?}", elapsed);
        assert_eq!(renewer.stats().succeeded(), 0);
    }

    #[test]
    fn test_klist_timeout_is_shorter_than_kinit_timeout() {
        let config = KerberosConfig::new("svc-app@EXAMPLE.COM");
        assert_eq!(config.klist_timeout, Duration::from_secs(10));
        assert!(config.klist_timeout < config.command_timeout);
    }

    #[tokio::test]
    async fn test_failed_attempts_are_counted_not_fatal() {
        let mut config = KerberosConfig::new("svc-app@EXAMPLE.COM");
        config.kinit_program = "false".to_string();
        config.renew_interval = Duration::from_millis(10);
        let renewer = KerberosRenewer::new(config);
        let task = renewer.spawn();

        for _ in 0..100 {
            if renewer.stats().failed() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(renewer.stats().failed() >= 2);
        assert!(!task.is_finished());

        task.stop().await;
    }
}

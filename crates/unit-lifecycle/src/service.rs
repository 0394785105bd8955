//! Controls the systemd unit that runs the snap's daemon.

use crate::error::{Error, Result};
use command_executor::{Command, Executor};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Start/stop/restart and query one systemd unit
///
/// Every operation is safe to repeat: systemd treats starting a running unit
/// or stopping a stopped one as success.
#[derive(Debug, Clone)]
pub struct ServiceController {
    executor: Executor,
    unit: String,
}

impl ServiceController {
    /// Create a controller for the named unit
    pub fn new(executor: Executor, unit: impl Into<String>) -> Self {
        Self {
            executor,
            unit: unit.into(),
        }
    }

    /// Start the unit
    pub async fn start(&self) -> Result<()> {
        self.systemctl("start").await
    }

    /// Stop the unit
    pub async fn stop(&self) -> Result<()> {
        self.systemctl("stop").await
    }

    /// Restart the unit, starting it if it was not running
    pub async fn restart(&self) -> Result<()> {
        self.systemctl("restart").await
    }

    /// Whether systemd reports the unit as `active`
    pub async fn is_running(&self) -> Result<bool> {
        let cmd = Command::builder("systemctl")
            .arg("is-active")
            .arg(&self.unit)
            .build();
        // is-active exits non-zero for every state but active, so the exit
        // code alone is not a failure.
        let output = self
            .executor
            .output(cmd)
            .await
            .map_err(|e| Error::ServiceControlFailed(e.to_string()))?;

        let state = output.stdout.trim();
        debug!("{} is {}", self.unit, state);
        Ok(output.success() && state == "active")
    }

    /// Poll [`is_running`](Self::is_running) until it holds or `timeout` elapses
    ///
    /// A `timeout` too large to fall on the clock waits without a deadline.
    pub async fn wait_until_running(&self, timeout: Duration, interval: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.is_running().await? {
                return Ok(());
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(Error::ServiceControlFailed(format!(
                    "{} not running after {:?}",
                    self.unit, timeout
                )));
            }
            async_io::Timer::after(interval).await;
        }
    }

    async fn systemctl(&self, verb: &str) -> Result<()> {
        let cmd = Command::builder("systemctl")
            .arg(verb)
            .arg(&self.unit)
            .build();
        self.executor
            .run(cmd)
            .await
            .map_err(|e| Error::ServiceControlFailed(e.to_string()))?;
        info!("systemctl {} {}", verb, self.unit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    const UNIT: &str = "snap.microsample.microsample.service";

    #[test]
    fn test_start_stop_restart() {
        smol::block_on(async {
            let host = FakeHost::new();
            let service = ServiceController::new(host.executor(), UNIT);

            assert!(!service.is_running().await.unwrap());

            service.start().await.unwrap();
            service.start().await.unwrap();
            assert!(service.is_running().await.unwrap());

            service.stop().await.unwrap();
            service.stop().await.unwrap();
            assert!(!service.is_running().await.unwrap());

            service.restart().await.unwrap();
            assert!(service.is_running().await.unwrap());
            assert_eq!(host.count_calls(&format!("systemctl restart {}", UNIT)), 1);
        });
    }

    #[test]
    fn test_control_failure() {
        smol::block_on(async {
            let host = FakeHost::new().fail_on("systemctl restart");
            let service = ServiceController::new(host.executor(), UNIT);

            assert!(matches!(
                service.restart().await,
                Err(Error::ServiceControlFailed(_))
            ));
        });
    }

    #[test]
    fn test_wait_until_running_succeeds() {
        smol::block_on(async {
            let host = FakeHost::new().with_service_active(true);
            let service = ServiceController::new(host.executor(), UNIT);

            service
                .wait_until_running(Duration::from_secs(1), Duration::from_millis(10))
                .await
                .unwrap();
            assert_eq!(host.count_calls("systemctl is-active"), 1);
        });
    }

    #[test]
    fn test_wait_until_running_with_unrepresentable_timeout() {
        smol::block_on(async {
            let host = FakeHost::new().with_service_active(true);
            let service = ServiceController::new(host.executor(), UNIT);

            service
                .wait_until_running(Duration::MAX, Duration::from_millis(10))
                .await
                .unwrap();
            assert_eq!(host.count_calls("systemctl is-active"), 1);
        });
    }

    #[test]
    fn test_wait_until_running_times_out() {
        smol::block_on(async {
            let host = FakeHost::new().with_service_active(false);
            let service = ServiceController::new(host.executor(), UNIT);

            let result = service
                .wait_until_running(Duration::from_millis(50), Duration::from_millis(10))
                .await;

            assert!(matches!(result, Err(Error::ServiceControlFailed(_))));
            assert!(host.count_calls("systemctl is-active") >= 2);
        });
    }
}

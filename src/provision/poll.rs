//! Provisioning-state polling
//!
//! A resource moves `Submitted -> Creating -> {Succeeded | Failed}`. Polls are
//! bounded either by a number of checks or by a deadline; dropping the future
//! stops the poll.

use crate::arm::ApiResponse;
use crate::config::PollingConfig;
use crate::error::{AzvisorError, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    /// Accepted, no state reported yet
    Submitted,
    Creating,
    Updating,
    Succeeded,
    Failed,
    Canceled,
    Other(String),
}

impl ProvisioningState {
    pub fn parse(state: Option<&str>) -> Self {
        match state {
            None => ProvisioningState::Submitted,
            Some(s) => match s.to_lowercase().as_str() {
                "" | "accepted" => ProvisioningState::Submitted,
                "creating" => ProvisioningState::Creating,
                "updating" => ProvisioningState::Updating,
                "succeeded" => ProvisioningState::Succeeded,
                "failed" => ProvisioningState::Failed,
                "canceled" | "cancelled" => ProvisioningState::Canceled,
                _ => ProvisioningState::Other(s.to_string()),
            },
        }
    }

    /// `properties.provisioningState` of a response
    pub fn of(response: &ApiResponse) -> Self {
        Self::parse(response.str_at("/properties/provisioningState"))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProvisioningState::Failed | ProvisioningState::Canceled)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningState::Submitted => write!(f, "Submitted"),
            ProvisioningState::Creating => write!(f, "Creating"),
            ProvisioningState::Updating => write!(f, "Updating"),
            ProvisioningState::Succeeded => write!(f, "Succeeded"),
            ProvisioningState::Failed => write!(f, "Failed"),
            ProvisioningState::Canceled => write!(f, "Canceled"),
            ProvisioningState::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBound {
    /// Total number of state checks, the submit response included
    Attempts(u32),
    Deadline(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub bound: PollBound,
}

impl PollPolicy {
    pub fn attempts(interval: Duration, attempts: u32) -> Self {
        Self {
            interval,
            bound: PollBound::Attempts(attempts.max(1)),
        }
    }

    pub fn deadline(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            bound: PollBound::Deadline(deadline),
        }
    }

    /// Network interfaces: fixed number of checks
    pub fn nic(config: &PollingConfig) -> Self {
        Self::attempts(
            Duration::from_secs(config.nic_interval_seconds),
            config.nic_max_attempts,
        )
    }

    /// VMs and images: deadline bound
    pub fn resource(config: &PollingConfig) -> Self {
        Self::deadline(
            Duration::from_secs(config.resource_interval_seconds),
            Duration::from_secs(config.resource_deadline_seconds),
        )
    }
}

/// Poll until the resource reports `Succeeded`.
///
/// `initial` is the response of the submitting PUT; `fetch` re-reads the
/// resource. A 404/204 while polling means the resource vanished.
pub async fn wait_for_provisioning<F, Fut>(
    resource: &str,
    initial: ApiResponse,
    policy: PollPolicy,
    mut fetch: F,
) -> Result<ApiResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
{
    let started = Instant::now();
    let mut response = initial;
    let mut checks: u32 = 0;

    loop {
        if response.is_absent() {
            return Err(AzvisorError::not_found("Resource", resource));
        }

        checks += 1;
        let state = ProvisioningState::of(&response);
        match state {
            ProvisioningState::Succeeded => {
                info!("{} provisioned successfully", resource);
                return Ok(response);
            }
            ref failed if failed.is_failure() => {
                return Err(AzvisorError::provisioning_failed(resource, failed.to_string()));
            }
            _ => {}
        }

        let wait = match policy.bound {
            PollBound::Attempts(max) => {
                if checks >= max {
                    return Err(AzvisorError::provisioning_timeout(resource, checks));
                }
                policy.interval
            }
            PollBound::Deadline(deadline) => {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    return Err(AzvisorError::deadline_exceeded(resource, deadline));
                }
                policy.interval.min(deadline - elapsed)
            }
        };

        if checks == 1 {
            info!("Request to create {} submitted, state {}", resource, state);
        } else {
            debug!("{} still in state {} after {} checks", resource, state, checks);
        }
        sleep(wait).await;
        response = fetch().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn response(status: u16, state: Option<&str>) -> ApiResponse {
        let body = match state {
            Some(s) => json!({"name": "r", "properties": {"provisioningState": s}}),
            None => json!({}),
        };
        ApiResponse {
            status,
            text: body.to_string(),
            body,
        }
    }

    fn scripted(responses: Vec<ApiResponse>) -> Mutex<VecDeque<ApiResponse>> {
        Mutex::new(responses.into_iter().collect())
    }

    #[test]
    fn parses_states() {
        assert_eq!(ProvisioningState::parse(None), ProvisioningState::Submitted);
        assert_eq!(ProvisioningState::parse(Some("Creating")), ProvisioningState::Creating);
        assert_eq!(ProvisioningState::parse(Some("Succeeded")), ProvisioningState::Succeeded);
        assert!(ProvisioningState::parse(Some("Canceled")).is_failure());
        assert_eq!(
            ProvisioningState::parse(Some("Migrating")),
            ProvisioningState::Other("Migrating".to_string())
        );
    }

    #[tokio::test]
    async fn returns_once_succeeded() {
        let queue = scripted(vec![response(200, Some("Creating")), response(200, Some("Succeeded"))]);
        let policy = PollPolicy::attempts(Duration::from_millis(1), 5);

        let result = wait_for_provisioning("nic1", response(201, None), policy, || {
            let next = queue.lock().unwrap().pop_front();
            async move { next.ok_or_else(|| AzvisorError::network("exhausted")) }
        })
        .await
        .unwrap();

        assert_eq!(ProvisioningState::of(&result), ProvisioningState::Succeeded);
        assert!(queue.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn attempt_bound_counts_every_check() {
        let fetches = Mutex::new(0u32);
        let policy = PollPolicy::attempts(Duration::from_millis(1), 5);

        let result = wait_for_provisioning("nic1", response(201, Some("Updating")), policy, || {
            *fetches.lock().unwrap() += 1;
            async { Ok(response(200, Some("Updating"))) }
        })
        .await;

        assert!(matches!(
            result,
            Err(AzvisorError::ProvisioningTimeout { attempts: 5, .. })
        ));
        assert_eq!(*fetches.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn deadline_bound_gives_up() {
        let policy = PollPolicy::deadline(Duration::from_millis(5), Duration::from_millis(30));
        let result = wait_for_provisioning("vm1", response(201, Some("Creating")), policy, || async {
            Ok(response(200, Some("Creating")))
        })
        .await;

        assert!(matches!(result, Err(AzvisorError::DeadlineExceeded { .. })));
    }

    #[tokio::test]
    async fn failed_state_is_terminal() {
        let policy = PollPolicy::deadline(Duration::from_millis(1), Duration::from_secs(5));
        let result = wait_for_provisioning("img", response(201, Some("Creating")), policy, || async {
            Ok(response(200, Some("Failed")))
        })
        .await;

        match result {
            Err(AzvisorError::ProvisioningFailed { resource, state }) => {
                assert_eq!(resource, "img");
                assert_eq!(state, "Failed");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn vanished_resource_is_not_found() {
        let policy = PollPolicy::attempts(Duration::from_millis(1), 5);
        let result = wait_for_provisioning("vm1", response(201, Some("Creating")), policy, || async {
            Ok(response(404, None))
        })
        .await;

        assert!(matches!(result, Err(AzvisorError::ResourceNotFound { .. })));
    }
}

// Per-host SSH admission control.
//
// Management controllers reject bursts of connections, so the number of
// simultaneous SSH sessions to a given hostname is bounded by a semaphore
// created lazily per host and kept for the life of the process.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

use crate::command_execution::error::{CommandError, CommandResult};

/// Maximum simultaneous SSH sessions per hostname
pub const MAX_SSH_SESSIONS_PER_HOST: usize = 8;

/// Default time to wait for a session permit
pub const DEFAULT_PERMIT_WAIT: Duration = Duration::from_secs(120);

/// Process-scoped registry of per-hostname session semaphores
#[derive(Debug, Clone, Default)]
pub struct SshSessionGate {
    semaphores: Arc<RwLock<HashMap<String, Arc<Semaphore>>>>,
}

impl SshSessionGate {
    /// Create a new gate with no hosts registered yet
    pub fn new() -> Self {
        Self::default()
    }

    /// The semaphore of the given hostname, created on first access with a
    /// fixed permit count that is never renegotiated
    pub async fn semaphore(&self, hostname: &str) -> Arc<Semaphore> {
        if let Some(semaphore) = self.semaphores.read().await.get(hostname) {
            return semaphore.clone();
        }
        let mut semaphores = self.semaphores.write().await;
        semaphores
            .entry(hostname.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(MAX_SSH_SESSIONS_PER_HOST)))
            .clone()
    }

    /// Run `operation` holding one session permit of the host, waiting up
    /// to `wait` for it. The permit is released afterward whether the
    /// operation succeeded or failed; an expired wait fails with the
    /// concurrency limit error without running the operation.
    pub async fn run_controlled<T, F>(
        &self,
        hostname: &str,
        wait: Duration,
        operation: F,
    ) -> CommandResult<T>
    where
        F: Future<Output = CommandResult<T>>,
    {
        let semaphore = self.semaphore(hostname).await;
        let permit = match tokio::time::timeout(wait, semaphore.acquire()).await {
            Ok(Ok(permit)) => permit,
            _ => return Err(CommandError::concurrency_limit(hostname)),
        };

        let result = operation.await;
        drop(permit);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_controlled_call_leaves_permits_unchanged() {
        let gate = SshSessionGate::new();
        let semaphore = gate.semaphore("host").await;

        let available = gate
            .run_controlled("host", Duration::from_secs(30), async {
                Ok(semaphore.available_permits())
            })
            .await
            .unwrap();

        assert_eq!(MAX_SSH_SESSIONS_PER_HOST - 1, available);
        assert_eq!(MAX_SSH_SESSIONS_PER_HOST, semaphore.available_permits());
    }

    #[tokio::test]
    async fn test_exhausted_permits_fail_with_concurrency_limit() {
        let gate = SshSessionGate::new();
        let semaphore = gate.semaphore("host").await;
        let held = semaphore
            .acquire_many(MAX_SSH_SESSIONS_PER_HOST as u32)
            .await
            .unwrap();

        let result = gate
            .run_controlled("host", Duration::from_secs(1), async { Ok(()) })
            .await;
        assert!(matches!(
            result,
            Err(CommandError::ConcurrencyLimit { hostname }) if hostname == "host"
        ));

        drop(held);
        assert_eq!(MAX_SSH_SESSIONS_PER_HOST, semaphore.available_permits());
    }

    #[tokio::test]
    async fn test_permit_released_when_operation_fails() {
        let gate = SshSessionGate::new();
        let semaphore = gate.semaphore("host").await;

        let result: CommandResult<()> = gate
            .run_controlled("host", Duration::from_secs(30), async {
                Err(CommandError::transport("connection reset"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(MAX_SSH_SESSIONS_PER_HOST, semaphore.available_permits());
    }

    #[tokio::test]
    async fn test_semaphores_are_per_hostname() {
        let gate = SshSessionGate::new();
        let first = gate.semaphore("alpha").await;
        let second = gate.semaphore("beta").await;
        let first_again = gate.semaphore("alpha").await;

        assert!(Arc::ptr_eq(&first, &first_again));
        assert!(!Arc::ptr_eq(&first, &second));
    }
}

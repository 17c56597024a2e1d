use std::time::Duration;

use super::{ChainClient, ChainError, PendingTransaction, TransactionStatus};
use crate::{debug, primitives::config::WaitOptions};

/// Running confirmation count for one transaction.
///
/// Reorgs can make a node briefly report a lower head; the reported count never goes down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationTracker {
    confirmations: u64,
}

impl ConfirmationTracker {
    /// Creates a tracker with no confirmations.
    #[must_use]
    pub const fn new() -> Self {
        Self { confirmations: 0 }
    }

    /// Records a head observation for a transaction included at `included_in` and returns the count.
    pub fn observe(&mut self, head: u64, included_in: u64) -> u64 {
        let observed = if head < included_in {
            0
        } else {
            head - included_in + 1
        };
        self.confirmations = self.confirmations.max(observed);
        self.confirmations
    }

    /// Highest count observed so far.
    #[must_use]
    pub const fn confirmations(&self) -> u64 {
        self.confirmations
    }
}

/// Waits until `pending` is mined and buried under `depth` blocks (itself included).
///
/// A depth of zero still waits for inclusion.
///
/// # Errors
/// - `ChainError::Reverted` if the transaction was mined but failed.
/// - `ChainError::Timeout` if the depth is not reached within `options.timeout`.
/// - `ChainError::Rpc` if polling fails.
pub async fn wait_for_confirmations(
    client: &dyn ChainClient,
    pending: &PendingTransaction,
    depth: u64,
    options: WaitOptions,
) -> Result<TransactionStatus, ChainError> {
    let depth = depth.max(1);
    let hash = pending.hash;

    let poll = async {
        let mut tracker = ConfirmationTracker::new();
        loop {
            if let Some(status) = client.transaction_status(hash).await? {
                if !status.success {
                    return Err(ChainError::Reverted {
                        hash,
                        block_number: status.block_number,
                    });
                }
                let head = client.block_number().await?;
                let confirmations = tracker.observe(head, status.block_number);
                debug!("{hash}: {confirmations}/{depth} confirmations");
                if confirmations >= depth {
                    return Ok(status);
                }
            }
            tokio::time::sleep(options.poll_interval).await;
        }
    };

    tokio::time::timeout(options.timeout, poll)
        .await
        .map_err(|_| ChainError::Timeout {
            hash,
            seconds: options.timeout.as_secs(),
        })?
}

/// Poll settings for tests and local nodes, where blocks are instant.
#[must_use]
pub const fn fast_wait_options(timeout: Duration) -> WaitOptions {
    WaitOptions {
        poll_interval: Duration::from_millis(10),
        timeout,
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, Bytes};

    use super::*;
    use crate::test_utils::MockChain;

    #[test]
    fn test_tracker_is_monotonic() {
        let mut tracker = ConfirmationTracker::new();
        assert_eq!(tracker.observe(10, 10), 1);
        assert_eq!(tracker.observe(12, 10), 3);
        // reorged head
        assert_eq!(tracker.observe(9, 10), 3);
        assert_eq!(tracker.observe(11, 10), 3);
        assert_eq!(tracker.confirmations(), 3);
    }

    #[tokio::test]
    async fn test_waits_until_depth_is_reached() {
        let chain = MockChain::new(1);
        chain.freeze_head();
        let pending = chain
            .send_transaction(Address::repeat_byte(1), Bytes::new())
            .await
            .unwrap();
        chain.mine_in_background(5, Duration::from_millis(5));

        let status = wait_for_confirmations(
            &chain,
            &pending,
            3,
            fast_wait_options(Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert!(status.success);
        assert!(chain.head() >= status.block_number + 2);
    }

    #[tokio::test]
    async fn test_reverted_transaction_is_an_error() {
        let chain = MockChain::new(1);
        let pending = chain
            .send_transaction(Address::repeat_byte(1), Bytes::new())
            .await
            .unwrap();
        chain.revert(pending.hash);

        let err = wait_for_confirmations(
            &chain,
            &pending,
            1,
            fast_wait_options(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ChainError::Reverted { hash, .. } if hash == pending.hash));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_depth_times_out() {
        let chain = MockChain::new(1);
        chain.freeze_head();
        let pending = chain
            .send_transaction(Address::repeat_byte(1), Bytes::new())
            .await
            .unwrap();

        let err = wait_for_confirmations(&chain, &pending, 50, WaitOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::Timeout { seconds: 300, .. }));
    }
}

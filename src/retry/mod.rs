//! Bounded retry for flaky page gestures.
//!
//! The course-team page re-renders asynchronously after most clicks, so a
//! gesture that "fails" is usually just early. Every roster operation runs
//! through [`retry_with_backoff`]: attempt, classify, sleep with jitter,
//! attempt again, up to the policy's cap.

mod policy;

pub use policy::RetryPolicy;

use std::future::Future;
use std::time::Duration;

use crate::browser::PageError;

/// Classification of transient retry causes seen on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// An element the gesture needed never showed up (or never left).
    Missing,
    /// The browser accepted the selector but the click/type itself failed.
    Rejected,
    /// The gesture ran but the page never confirmed its effect.
    Unconfirmed,
    /// CDP transport hiccup mid-gesture.
    Transport,
}

impl RetryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Rejected => "rejected",
            Self::Unconfirmed => "unconfirmed",
            Self::Transport => "transport",
        }
    }
}

/// Retry decision for one attempt result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { reason: RetryReason },
    DoNotRetry,
}

/// Metadata for one scheduled retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub delay: Duration,
    pub reason: RetryReason,
}

/// Classify a page-operation result into retry/no-retry.
///
/// Transient causes (element missing, gesture rejected, effect unconfirmed,
/// transport errors) retry; everything else is final. Sign-in and access
/// failures never retry: the page will refuse the same way every time.
pub fn classify_page_result<T>(result: &Result<T, PageError>) -> RetryDecision {
    match result {
        Ok(_) => RetryDecision::DoNotRetry,
        Err(err) => match err.retry_reason() {
            Some(reason) => RetryDecision::Retry { reason },
            None => RetryDecision::DoNotRetry,
        },
    }
}

/// Retry an async operation with backoff according to `policy`.
///
/// - `operation(attempt)` is called with a 1-based attempt number.
/// - `classify(result)` decides whether to retry.
/// - `on_retry(info)` is called right before sleeping.
pub async fn retry_with_backoff<T, E, Op, Fut, Classify, OnRetry>(
    policy: &RetryPolicy,
    mut operation: Op,
    mut classify: Classify,
    mut on_retry: OnRetry,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Classify: FnMut(&Result<T, E>) -> RetryDecision,
    OnRetry: FnMut(RetryAttempt),
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let result = operation(attempt).await;
        if attempt == max_attempts {
            return result;
        }
        match classify(&result) {
            RetryDecision::Retry { reason } => {
                let delay = policy.with_jitter(policy.backoff_delay(attempt));
                on_retry(RetryAttempt {
                    attempt,
                    delay,
                    reason,
                });
                tokio::time::sleep(delay).await;
            }
            RetryDecision::DoNotRetry => return result,
        }
    }

    unreachable!("retry loop always returns");
}

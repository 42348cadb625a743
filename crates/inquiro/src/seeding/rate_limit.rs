//! Sequential processing with a pause between hosted API calls

use std::future::Future;
use std::time::Duration;

use crate::config::SeedConfig;
use crate::error::Result;

/// Paces calls to quota-limited APIs
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    delay: Duration,
    batch_size: usize,
}

impl RateLimiter {
    pub fn new(delay: Duration, batch_size: usize) -> Self {
        Self {
            delay,
            batch_size: batch_size.max(1),
        }
    }

    /// Limiter using the seed section's delay and batch size
    pub fn from_config(config: &SeedConfig) -> Self {
        Self::new(
            Duration::from_millis(config.rate_limit_delay_ms),
            config.batch_size,
        )
    }

    /// Run `f` over `items` one at a time, pausing between items
    ///
    /// Results keep the input order. A failed item is logged and yields
    /// `None`; the remaining items are still processed.
    pub async fn process<'a, T, R, F, Fut>(&self, items: &'a [T], mut f: F) -> Vec<Option<R>>
    where
        F: FnMut(&'a T, usize) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut results = Vec::with_capacity(items.len());

        for (batch_index, batch) in items.chunks(self.batch_size).enumerate() {
            for (offset, item) in batch.iter().enumerate() {
                let index = batch_index * self.batch_size + offset;

                match f(item, index).await {
                    Ok(result) => results.push(Some(result)),
                    Err(e) => {
                        tracing::warn!("Failed to process item {}: {}", index, e);
                        results.push(None);
                    }
                }

                if index + 1 < items.len() && !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }

        results
    }
}

/// Convenience wrapper around [`RateLimiter::process`]
pub async fn process_with_rate_limit<'a, T, R, F, Fut>(
    items: &'a [T],
    delay: Duration,
    batch_size: usize,
    f: F,
) -> Vec<Option<R>>
where
    F: FnMut(&'a T, usize) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    RateLimiter::new(delay, batch_size).process(items, f).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Instant;

    #[tokio::test]
    async fn test_failures_become_none_and_processing_continues() {
        let items = vec![1, 2, 3, 4];

        let results = process_with_rate_limit(&items, Duration::ZERO, 1, |n, _| async move {
            if n % 2 == 0 {
                Err(Error::Internal(format!("even {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(results, vec![Some(10), None, Some(30), None]);
    }

    #[tokio::test]
    async fn test_indices_follow_input_order_across_batches() {
        let items = vec!["a", "b", "c", "d", "e"];

        let results = process_with_rate_limit(&items, Duration::ZERO, 2, |s, i| async move {
            Ok::<_, Error>(format!("{}{}", s, i))
        })
        .await;

        let flat: Vec<String> = results.into_iter().flatten().collect();
        assert_eq!(flat, vec!["a0", "b1", "c2", "d3", "e4"]);
    }

    #[tokio::test]
    async fn test_no_delay_after_last_item() {
        let delay = Duration::from_millis(200);
        let items = vec![(), ()];

        let started = Instant::now();
        process_with_rate_limit(&items, delay, 1, |_, _| async { Ok::<_, Error>(()) }).await;
        let elapsed = started.elapsed();

        // One pause between two items, none trailing
        assert!(elapsed >= delay);
        assert!(elapsed < delay * 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let items: Vec<u8> = Vec::new();
        let results = process_with_rate_limit(&items, Duration::from_secs(5), 1, |n, _| async move {
            Ok::<_, Error>(*n)
        })
        .await;
        assert!(results.is_empty());
    }
}

//! Pull-based batch orchestrator
//!
//! Work only advances while the consumer awaits [`BatchStream::next`]: the
//! stream tops up its in-flight set from a cursor over the input, drives the
//! set until the next unreleased index completes, and hands results back in
//! input order. Completed results that arrive early wait in an index-keyed
//! buffer, and each slot is written by exactly one fetch.

use crate::batch::{BatchOptions, BatchResult};
use crate::fetch::{rate_limit_delay, sleep_or_cancel};
use crate::LogoError;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

type FetchOne<T> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<T, LogoError>> + Send + Sync>;

type Completion<T> = (usize, Result<T, LogoError>);

/// Lazy, ordered sequence of batch results
///
/// Yields one item per started domain, in input order. Not restartable.
pub struct BatchStream<T> {
    domains: Vec<String>,
    fetch_one: FetchOne<T>,
    options: BatchOptions,
    /// Next input index to start
    cursor: usize,
    /// Next input index to hand to the consumer
    next_release: usize,
    completed: BTreeMap<usize, Result<T, LogoError>>,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion<T>>>,
    finished: bool,
}

/// Fetches many domains with bounded concurrency
///
/// # Behavior
///
/// - At most `options.concurrency` domains are in flight at once
/// - A `RateLimit` error pauses only that domain for `retry_after` seconds
///   before retrying it, up to `options.max_rate_limit_retries` times
/// - Results are yielded strictly in input order
/// - With `continue_on_error`, failures become failed [`BatchResult`]s;
///   without it, the first non-rate-limit error is yielded as `Err` and the
///   stream ends
/// - After cancellation no new domain starts; already-collected results are
///   still yielded in order and unstarted domains are omitted
///
/// # Example
///
/// ```no_run
/// use quikturn_logos::batch::{fetch_batch, BatchOptions};
/// use quikturn_logos::LogoError;
///
/// # async fn example() {
/// let domains = vec!["c.com".to_string(), "a.com".to_string()];
/// let mut results = fetch_batch(
///     domains,
///     |domain: String| async move { Ok::<_, LogoError>(domain.len()) },
///     BatchOptions::default(),
/// );
/// while let Some(item) = results.next().await {
///     let result = item.unwrap();
///     println!("{}: {:?}", result.domain, result.outcome);
/// }
/// # }
/// ```
pub fn fetch_batch<T, F, Fut>(
    domains: Vec<String>,
    fetch_one: F,
    options: BatchOptions,
) -> BatchStream<T>
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, LogoError>> + Send + 'static,
{
    let fetch_one: FetchOne<T> = Arc::new(move |domain| fetch_one(domain).boxed());

    BatchStream {
        domains,
        fetch_one,
        options,
        cursor: 0,
        next_release: 0,
        completed: BTreeMap::new(),
        in_flight: FuturesUnordered::new(),
        finished: false,
    }
}

impl<T: Send + 'static> BatchStream<T> {
    /// Returns the next result in input order
    ///
    /// # Returns
    ///
    /// * `Some(Ok(result))` - The next domain's outcome
    /// * `Some(Err(error))` - A fatal error when `continue_on_error` is off
    /// * `None` - The batch is exhausted or was cancelled
    pub async fn next(&mut self) -> Option<Result<BatchResult<T>, LogoError>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(outcome) = self.completed.remove(&self.next_release) {
                let index = self.next_release;
                self.next_release += 1;
                return Some(Ok(self.release(index, outcome)));
            }

            if self.is_cancelled() {
                return self.drain_after_cancel();
            }

            self.launch();

            if self.in_flight.is_empty() {
                self.finished = true;
                return None;
            }

            let completion = match self.options.cancel.clone() {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => continue,
                        completion = self.in_flight.next() => completion,
                    }
                }
                None => self.in_flight.next().await,
            };

            let Some((index, outcome)) = completion else {
                continue;
            };

            match outcome {
                Err(LogoError::Abort) if self.is_cancelled() => {
                    debug!("Dropping aborted result for {}", self.domains[index]);
                }
                Err(err)
                    if !self.options.continue_on_error
                        && !matches!(err, LogoError::RateLimit { .. }) =>
                {
                    warn!("Batch stopped at {}: {}", self.domains[index], err);
                    self.finish();
                    return Some(Err(err));
                }
                outcome => {
                    self.completed.insert(index, outcome);
                }
            }
        }
    }

    /// Collects every remaining result
    ///
    /// Fails with the first fatal error when `continue_on_error` is off.
    pub async fn collect(mut self) -> Result<Vec<BatchResult<T>>, LogoError> {
        let mut results = Vec::with_capacity(self.domains.len());
        while let Some(item) = self.next().await {
            results.push(item?);
        }
        Ok(results)
    }

    /// Converts the batch into a [`Stream`]
    pub fn into_stream(self) -> impl Stream<Item = Result<BatchResult<T>, LogoError>> + Send {
        futures::stream::unfold(self, |mut batch| async move {
            batch.next().await.map(|item| (item, batch))
        })
    }

    /// Number of domains in the batch
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Starts domains until the concurrency limit or the input is exhausted
    fn launch(&mut self) {
        let limit = self.options.concurrency.max(1);
        while self.in_flight.len() < limit && self.cursor < self.domains.len() {
            if self.is_cancelled() {
                return;
            }
            let index = self.cursor;
            self.cursor += 1;
            let fetch = self.fetch_with_backoff(index);
            self.in_flight.push(fetch);
        }
    }

    /// Builds the future for one domain, including its rate-limit retries
    fn fetch_with_backoff(&self, index: usize) -> BoxFuture<'static, Completion<T>> {
        let domain = self.domains[index].clone();
        let fetch_one = self.fetch_one.clone();
        let cancel = self.options.cancel.clone();
        let max_retries = self.options.max_rate_limit_retries;

        async move {
            let mut retries = 0u32;
            loop {
                match fetch_one(domain.clone()).await {
                    Err(LogoError::RateLimit { retry_after, .. }) if retries < max_retries => {
                        retries += 1;
                        let delay = rate_limit_delay(retry_after);
                        warn!(
                            "Rate limited on {}, pausing {:?} ({}/{})",
                            domain, delay, retries, max_retries
                        );
                        if let Err(err) = sleep_or_cancel(delay, cancel.as_ref()).await {
                            return (index, Err(err));
                        }
                    }
                    outcome => return (index, outcome),
                }
            }
        }
        .boxed()
    }

    /// Yields collected results in index order once cancelled
    fn drain_after_cancel(&mut self) -> Option<Result<BatchResult<T>, LogoError>> {
        if !self.in_flight.is_empty() {
            debug!(
                "Batch cancelled with {} domains in flight",
                self.in_flight.len()
            );
            self.in_flight = FuturesUnordered::new();
        }

        match self.completed.pop_first() {
            Some((index, outcome)) => {
                self.next_release = index + 1;
                Some(Ok(self.release(index, outcome)))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    fn release(&self, index: usize, outcome: Result<T, LogoError>) -> BatchResult<T> {
        BatchResult {
            domain: self.domains[index].clone(),
            outcome,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.in_flight = FuturesUnordered::new();
        self.completed.clear();
    }
}

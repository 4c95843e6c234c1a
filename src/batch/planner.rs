use crate::batch::codec::BatchCodec;
use crate::batch::gate::{excess_length, Payload};
use crate::batch::pacing::RequestPacer;
use crate::batch::EncodedBatch;
use crate::error::{Result, TranslateError};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default upper bound for one `translate_batch` call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Runtime policy for splitting and dispatching rounds.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Maximum number of rounds in flight at once.
    pub concurrency: usize,
    /// Upper bound for the whole call; unfinished rounds become `None`.
    pub timeout: Duration,
    /// Send single texts that exceed the limit instead of rejecting them.
    pub send_oversized: bool,
    /// Once set, no further rounds are dispatched.
    pub cancelled: Arc<AtomicBool>,
    /// Show a progress bar over rounds.
    pub show_progress: bool,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: DEFAULT_CALL_TIMEOUT,
            send_oversized: false,
            cancelled: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }
}

impl BatchPolicy {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_send_oversized(mut self, send_oversized: bool) -> Self {
        self.send_oversized = send_oversized;
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Outcome of one dispatched round.
struct RoundResult {
    index: usize,
    batch: EncodedBatch,
    /// `Ok(None)` means the round was skipped after cancellation.
    outcome: Result<Option<Vec<Option<String>>>>,
}

/// Splits texts into groups that fit a backend limit and runs them as rounds.
pub struct ChunkPlanner<'a> {
    codec: &'a dyn BatchCodec,
    limit: usize,
    policy: &'a BatchPolicy,
}

impl<'a> ChunkPlanner<'a> {
    pub fn new(codec: &'a dyn BatchCodec, limit: usize, policy: &'a BatchPolicy) -> Self {
        Self {
            codec,
            limit,
            policy,
        }
    }

    /// Split `texts` into contiguous groups whose encoding fits the limit.
    ///
    /// Groups that do not fit are halved until they do. A single text that
    /// still does not fit is an error unless the policy allows sending it.
    pub fn plan(&self, texts: &[&str]) -> Result<Vec<Range<usize>>> {
        let mut groups = Vec::new();
        if texts.is_empty() {
            return Ok(groups);
        }

        let mut pending = vec![0..texts.len()];
        while let Some(range) = pending.pop() {
            let excess = excess_length(Payload::Batch(&texts[range.clone()]), self.codec, self.limit);

            if excess == 0 {
                groups.push(range);
            } else if range.len() == 1 {
                if !self.policy.send_oversized {
                    return Err(TranslateError::LimitExceeded {
                        index: range.start,
                        excess,
                    });
                }
                warn!(
                    "Text {} exceeds the limit by {} characters, sending it anyway",
                    range.start, excess
                );
                groups.push(range);
            } else {
                let mid = range.start + range.len() / 2;
                // left half is popped first, keeping groups in order
                pending.push(mid..range.end);
                pending.push(range.start..mid);
            }
        }

        Ok(groups)
    }

    /// Plan `texts`, send every group through `send` and reassemble by index.
    pub async fn run<F, Fut>(
        &self,
        texts: &[&str],
        pacer: &RequestPacer,
        send: F,
    ) -> Result<Vec<Option<String>>>
    where
        F: Fn(String) -> Fut + Sync,
        Fut: Future<Output = Result<String>> + Send,
    {
        let total = texts.len();
        let groups = self.plan(texts)?;
        let mut results: Vec<Option<String>> = vec![None; total];

        if groups.is_empty() {
            return Ok(results);
        }

        let total_rounds = groups.len();
        let deadline = Instant::now() + self.policy.timeout;
        info!(
            "Translating {} text(s) in {} round(s) with up to {} concurrent requests",
            total,
            total_rounds,
            self.policy.concurrency.max(1)
        );

        let progress_bar = if self.policy.show_progress {
            let pb = ProgressBar::new(total_rounds as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rounds")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Semaphore::new(self.policy.concurrency.max(1));
        let mut rounds = FuturesUnordered::new();

        for (index, range) in groups.into_iter().enumerate() {
            let batch = EncodedBatch::build(self.codec, &texts[range.clone()], range.start);
            let semaphore = &semaphore;
            let send = &send;
            let cancelled = &self.policy.cancelled;
            let codec = self.codec;
            let pb = progress_bar.clone();

            rounds.push(async move {
                let outcome: Result<Option<Vec<Option<String>>>> = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| TranslateError::Transport("Round scheduler closed".to_string()))?;

                    if cancelled.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    pacer.wait_turn().await;
                    if cancelled.load(Ordering::Relaxed) {
                        return Ok(None);
                    }

                    debug!(
                        "Sending round {} ({} text(s), {} chars)",
                        index,
                        batch.len(),
                        batch.char_len()
                    );
                    let response = send(batch.payload().to_string()).await?;
                    Ok::<_, TranslateError>(Some(codec.decode(&response, batch.len())))
                }
                .await;

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }

                RoundResult {
                    index,
                    batch,
                    outcome,
                }
            });
        }

        let mut completed_items = 0usize;
        let mut skipped_rounds = 0usize;
        let mut failure = None;

        loop {
            let round = match tokio::time::timeout_at(deadline, rounds.next()).await {
                Ok(Some(round)) => round,
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Batch timed out after {:.1}s with {} round(s) unfinished",
                        self.policy.timeout.as_secs_f64(),
                        rounds.len()
                    );
                    break;
                }
            };

            let decoded = match round.outcome {
                Ok(Some(decoded)) => decoded,
                Ok(None) => {
                    skipped_rounds += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Round {} failed: {}", round.index, e);
                    failure = Some(e);
                    break;
                }
            };

            let recovered = decoded.iter().filter(|slot| slot.is_some()).count();
            if recovered == 0 {
                let e = TranslateError::DecodeMismatch(format!(
                    "no text of round {} could be recovered ({} expected)",
                    round.index,
                    round.batch.len()
                ));
                warn!("{}", e);
                failure = Some(e);
                break;
            }
            if recovered < decoded.len() {
                warn!(
                    "Round {}: recovered {} of {} text(s)",
                    round.index,
                    recovered,
                    decoded.len()
                );
            }

            completed_items += round.batch.scatter(decoded, &mut results);
        }

        // Dropping the remaining futures stops any round not yet sent.
        drop(rounds);

        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }

        if let Some(source) = failure {
            if completed_items == 0 {
                return Err(source);
            }
            return Err(TranslateError::Partial {
                results,
                completed: completed_items,
                total,
                source: Box::new(source),
            });
        }

        if skipped_rounds > 0 {
            warn!("Cancelled: {} round(s) were not sent", skipped_rounds);
        }

        Ok(results)
    }
}

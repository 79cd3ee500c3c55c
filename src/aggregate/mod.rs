//! Fail-soft fan-in over every configured message source.
//!
//! Each source runs on its own thread. A source that errors, panics or
//! misses the deadline contributes nothing; the rest are merged in source
//! order and ranked. [`LiveAggregator::live_messages`] never fails.
//!
//! A worker abandoned at the deadline keeps running. Until it finishes, its
//! source is reported as [`SourceOutcome::StillRunning`] and no second
//! worker is started for it.

use anyhow::Result;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::domain::message::{Message, Source};
use crate::ranking::{Clock, prioritize};
use crate::sources::{GmailSource, MessageSource, SlackSource, UnavailableSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Fetched(usize),
    Failed(String),
    TimedOut,
    /// The worker from an earlier gather has not returned yet.
    StillRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: Source,
    pub outcome: SourceOutcome,
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            SourceOutcome::Fetched(n) => write!(f, "{}: {n}", self.source),
            SourceOutcome::Failed(_) => write!(f, "{}: failed", self.source),
            SourceOutcome::TimedOut => write!(f, "{}: timed out", self.source),
            SourceOutcome::StillRunning => write!(f, "{}: still fetching", self.source),
        }
    }
}

/// Ranked messages plus what happened to each source.
#[derive(Debug, Clone, Default)]
pub struct Gathered {
    pub messages: Vec<Message>,
    pub reports: Vec<SourceReport>,
    /// The instant the messages were ranked at
    pub ranked_at_millis: i64,
}

type WorkerResult = (usize, Result<Vec<Message>, String>);

pub struct LiveAggregator {
    sources: Vec<Arc<dyn MessageSource>>,
    // one flag per source, set while its worker runs
    in_flight: Vec<Arc<AtomicBool>>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
}

impl LiveAggregator {
    pub fn new(sources: Vec<Arc<dyn MessageSource>>, clock: Arc<dyn Clock>) -> Self {
        let in_flight = sources.iter().map(|_| Arc::new(AtomicBool::new(false))).collect();
        Self {
            sources,
            in_flight,
            clock,
            timeout: None,
        }
    }

    /// Give up on sources still pending after `timeout`. Their threads are
    /// left to finish on their own and block new fetches of that source
    /// until they do.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Gmail always, Slack when configured. A source that fails to set up
    /// is kept as an [`UnavailableSource`] so it shows up in the reports.
    pub fn from_config(cfg: &Config, clock: Arc<dyn Clock>) -> Self {
        let mut sources: Vec<Arc<dyn MessageSource>> = Vec::new();

        match GmailSource::from_config(&cfg.google) {
            Ok(s) => sources.push(Arc::new(s)),
            Err(e) => sources.push(Arc::new(UnavailableSource::new(Source::Gmail, e.to_string()))),
        }

        if let Some(slack) = &cfg.slack {
            match SlackSource::from_config(slack) {
                Ok(s) => sources.push(Arc::new(s)),
                Err(e) => {
                    sources.push(Arc::new(UnavailableSource::new(Source::Slack, e.to_string())))
                }
            }
        }

        Self::new(sources, clock).with_timeout(cfg.fetch_timeout())
    }

    /// Ranked messages from every source that answered; empty on any
    /// aggregation-level failure.
    pub fn live_messages(&self, user_id: &str) -> Vec<Message> {
        self.live_report(user_id).messages
    }

    /// Like [`Self::live_messages`] but keeps the per-source reports.
    pub fn live_report(&self, user_id: &str) -> Gathered {
        match panic::catch_unwind(AssertUnwindSafe(|| self.gather(user_id))) {
            Ok(Ok(g)) => g,
            Ok(Err(e)) => {
                log::error!("live message aggregation failed: {e:#}");
                Gathered::default()
            }
            Err(p) => {
                log::error!("live message aggregation panicked: {}", panic_message(p.as_ref()));
                Gathered::default()
            }
        }
    }

    /// Fan out to every source and wait for all of them (or the deadline).
    /// Only fails if a worker thread cannot be started.
    pub fn gather(&self, user_id: &str) -> Result<Gathered> {
        let (tx, rx) = mpsc::channel::<WorkerResult>();

        let mut results: Vec<Option<Result<Vec<Message>, String>>> =
            (0..self.sources.len()).map(|_| None).collect();
        let mut busy = vec![false; self.sources.len()];
        let mut pending = 0;

        for (idx, src) in self.sources.iter().enumerate() {
            let flag = Arc::clone(&self.in_flight[idx]);
            if flag.swap(true, Ordering::AcqRel) {
                busy[idx] = true;
                continue;
            }

            let src = Arc::clone(src);
            let tx = tx.clone();
            let user_id = user_id.to_string();
            let worker_flag = Arc::clone(&flag);

            let spawned = thread::Builder::new()
                .name(format!("fetch-{}", src.source()))
                .spawn(move || {
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| src.fetch(&user_id)))
                    {
                        Ok(Ok(messages)) => Ok(messages),
                        Ok(Err(e)) => Err(format!("{e:#}")),
                        Err(p) => Err(format!("panicked: {}", panic_message(p.as_ref()))),
                    };
                    worker_flag.store(false, Ordering::Release);
                    // receiver may be gone after a timeout
                    let _ = tx.send((idx, result));
                });
            if let Err(e) = spawned {
                flag.store(false, Ordering::Release);
                return Err(e.into());
            }
            pending += 1;
        }
        drop(tx);

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut timed_out = false;

        while pending > 0 {
            let received = match deadline {
                None => rx.recv().ok(),
                Some(d) => match rx.recv_timeout(d.saturating_duration_since(Instant::now())) {
                    Ok(r) => Some(r),
                    Err(RecvTimeoutError::Timeout) => {
                        timed_out = true;
                        None
                    }
                    Err(RecvTimeoutError::Disconnected) => None,
                },
            };
            let Some((idx, result)) = received else {
                break;
            };
            results[idx] = Some(result);
            pending -= 1;
        }

        let mut merged = Vec::new();
        let mut reports = Vec::with_capacity(self.sources.len());

        for ((src, result), busy) in self.sources.iter().zip(results).zip(busy) {
            let source = src.source();
            let outcome = match result {
                None if busy => {
                    log::warn!("{source} previous fetch still running, skipping");
                    SourceOutcome::StillRunning
                }
                Some(Ok(messages)) => {
                    log::info!("{source}: {} messages", messages.len());
                    let n = messages.len();
                    merged.extend(messages);
                    SourceOutcome::Fetched(n)
                }
                Some(Err(e)) => {
                    log::warn!("{source} fetch failed, treating as empty: {e}");
                    SourceOutcome::Failed(e)
                }
                None if timed_out => {
                    log::warn!("{source} fetch timed out, treating as empty");
                    SourceOutcome::TimedOut
                }
                None => {
                    log::warn!("{source} fetch ended without a result, treating as empty");
                    SourceOutcome::Failed("worker ended without a result".to_string())
                }
            };
            reports.push(SourceReport { source, outcome });
        }

        let now = self.clock.now_millis();
        Ok(Gathered {
            messages: prioritize(&merged, now),
            reports,
            ranked_at_millis: now,
        })
    }
}

fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_display_hides_error_detail() {
        let r = SourceReport {
            source: Source::Slack,
            outcome: SourceOutcome::Failed("invalid_auth".into()),
        };
        assert_eq!(r.to_string(), "slack: failed");
        let r = SourceReport {
            source: Source::Gmail,
            outcome: SourceOutcome::Fetched(3),
        };
        assert_eq!(r.to_string(), "gmail: 3");
        let r = SourceReport {
            source: Source::Slack,
            outcome: SourceOutcome::StillRunning,
        };
        assert_eq!(r.to_string(), "slack: still fetching");
    }

    #[test]
    fn panic_payloads_are_readable() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
        let p: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }
}

//! Bounded-concurrency async job scheduler.
//!
//! Jobs are spawned onto the tokio runtime. Completed outputs are collected
//! and handed to a [`JobHandler`] in batches once enough of them accumulate,
//! which also throttles the producer while the handler writes them out.

use std::future::Future;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::error::{Error, Result};

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_DRAIN_THRESHOLD: f32 = 0.85;

/// Receives completed job outputs.
#[async_trait]
pub trait JobHandler<T>: Send {
    async fn on_jobs_done(&mut self, outputs: Vec<T>) -> Result<()>;
}

/// Runs at most `concurrency` jobs at a time.
///
/// Dropping the queue aborts any job still running.
pub struct JobQueue<T> {
    running: JoinSet<T>,
    done: Vec<T>,
    concurrency: usize,
    drain_threshold: f32,
}

impl<T: Send + 'static> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, DEFAULT_DRAIN_THRESHOLD)
    }
}

impl<T: Send + 'static> JobQueue<T> {
    pub fn new(concurrency: usize, drain_threshold: f32) -> Self {
        Self {
            running: JoinSet::new(),
            done: Vec::new(),
            concurrency: concurrency.max(1),
            drain_threshold: drain_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn running(&self) -> usize {
        self.running.len()
    }

    /// Spawn a job, waiting for a free slot first.
    ///
    /// Delivers completed outputs to `handler` once more than
    /// `drain_threshold * concurrency` of them are pending.
    pub async fn push<F, H>(&mut self, job: F, handler: &mut H) -> Result<()>
    where
        F: Future<Output = T> + Send + 'static,
        H: JobHandler<T> + ?Sized,
    {
        while self.running.len() >= self.concurrency {
            match self.running.join_next().await {
                Some(joined) => self.done.push(joined.map_err(job_error)?),
                None => break,
            }
        }
        self.harvest()?;

        self.running.spawn(job);

        let threshold = (self.drain_threshold * self.concurrency as f32) as usize;
        if self.done.len() > threshold {
            self.deliver(handler).await?;
        }
        Ok(())
    }

    /// Wait for every job and deliver what is left.
    pub async fn finish<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: JobHandler<T> + ?Sized,
    {
        while let Some(joined) = self.running.join_next().await {
            self.done.push(joined.map_err(job_error)?);
        }
        self.deliver(handler).await
    }

    fn harvest(&mut self) -> Result<()> {
        while let Some(joined) = self.running.try_join_next() {
            self.done.push(joined.map_err(job_error)?);
        }
        Ok(())
    }

    async fn deliver<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: JobHandler<T> + ?Sized,
    {
        if self.done.is_empty() {
            return Ok(());
        }
        let outputs = std::mem::take(&mut self.done);
        handler.on_jobs_done(outputs).await
    }
}

fn job_error(e: tokio::task::JoinError) -> Error {
    if e.is_panic() {
        Error::task("job panicked")
    } else {
        Error::task(format!("job cancelled: {e}"))
    }
}

use crate::config::BatchConfig;
use crate::errors::BatchError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub type ChunkFuture<R> = Pin<Box<dyn Future<Output = Result<Vec<R>, BatchError>> + Send>>;
pub type ChunkFn<T, R> = Arc<dyn Fn(Vec<T>) -> ChunkFuture<R> + Send + Sync>;

struct QueuedJob<T, R> {
    items: Vec<T>,
    priority: i32,
    seq: u64,
    tx: oneshot::Sender<Result<Vec<R>, BatchError>>,
}

struct ProcessorInner<T, R> {
    queue: Vec<QueuedJob<T, R>>,
    draining: bool,
    next_seq: u64,
}

/// Priority-ordered batch executor with a single drain task.
///
/// A submission that finds the drain idle starts it; otherwise it only
/// enqueues. Jobs drain highest priority first, ties by arrival. Within
/// a job, items are chunked and chunks run concurrently, but the
/// flattened result preserves input order. Concurrency is bounded only
/// by chunk count; the rate limiter inside the chunk function is the
/// real governor of outbound pressure.
pub struct BatchProcessor<T, R> {
    chunk_size: usize,
    inner: Arc<Mutex<ProcessorInner<T, R>>>,
    process_chunk: ChunkFn<T, R>,
}

impl<T, R> Clone for BatchProcessor<T, R> {
    fn clone(&self) -> Self {
        Self {
            chunk_size: self.chunk_size,
            inner: self.inner.clone(),
            process_chunk: self.process_chunk.clone(),
        }
    }
}

impl<T, R> BatchProcessor<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    pub fn new(config: &BatchConfig, process_chunk: ChunkFn<T, R>) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            inner: Arc::new(Mutex::new(ProcessorInner {
                queue: Vec::new(),
                draining: false,
                next_seq: 0,
            })),
            process_chunk,
        }
    }

    /// Enqueues a job and resolves with its flattened results. A chunk
    /// failure rejects this job only; queued jobs keep draining.
    pub async fn submit(&self, items: Vec<T>, priority: i32) -> Result<Vec<R>, BatchError> {
        let (tx, rx) = oneshot::channel();
        let start_drain = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.queue.push(QueuedJob {
                items,
                priority,
                seq,
                tx,
            });
            if inner.draining {
                false
            } else {
                inner.draining = true;
                true
            }
        };
        if start_drain {
            let this = self.clone();
            tokio::spawn(async move { this.drain().await });
        }
        rx.await
            .unwrap_or_else(|_| Err(BatchError::new("batch drain task dropped the job")))
    }

    pub fn queued_jobs(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .len()
    }

    async fn drain(&self) {
        loop {
            let job = {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                match take_best(&mut inner.queue) {
                    Some(job) => job,
                    None => {
                        inner.draining = false;
                        return;
                    }
                }
            };
            let result = self.run_job(job.items).await;
            // receiver may have gone away; the next job still drains
            let _ = job.tx.send(result);
        }
    }

    async fn run_job(&self, items: Vec<T>) -> Result<Vec<R>, BatchError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut chunks: Vec<Vec<T>> = Vec::new();
        let mut current = Vec::new();
        for item in items {
            current.push(item);
            if current.len() == self.chunk_size {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| tokio::spawn((self.process_chunk)(chunk)))
            .collect();

        // Await in chunk order so the flattened output preserves input
        // order even though chunks run concurrently.
        let mut results = Vec::new();
        let mut failure: Option<BatchError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(mut chunk_results)) => results.append(&mut chunk_results),
                Ok(Err(err)) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
                Err(join_err) => {
                    if failure.is_none() {
                        failure = Some(BatchError::new(format!("chunk task panicked: {join_err}")));
                    }
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

fn take_best<T, R>(queue: &mut Vec<QueuedJob<T, R>>) -> Option<QueuedJob<T, R>> {
    if queue.is_empty() {
        return None;
    }
    let mut best = 0;
    for index in 1..queue.len() {
        let candidate = &queue[index];
        let current = &queue[best];
        if candidate.priority > current.priority
            || (candidate.priority == current.priority && candidate.seq < current.seq)
        {
            best = index;
        }
    }
    Some(queue.remove(best))
}

//! Worker pool that runs the per-entry job over every listed entry.
//!
//! A dispatcher feeds entries into a bounded input queue; `workers` tasks pull
//! from it and run the job on the blocking thread pool; a single collector
//! drains the output queue. Completion order is arbitrary, so the collected
//! descriptors are sorted by `(id, part)` before they are returned.
//!
//! The first fatal job error stops dispatch. Entries already queued are
//! drained without being processed, in-flight jobs finish, and the error is
//! returned once every worker has exited.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::try_join_all;
use log::debug;
use rayon::prelude::*;
use tokio::spawn;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, spawn_blocking};

use crate::error::{Error, Result};
use crate::types::{PageDescriptor, PageEntry, Progress};

/// The work done for one entry: load, transform, store.
pub type Job = Arc<dyn Fn(PageEntry) -> Result<Vec<PageDescriptor>> + Send + Sync>;

/// Called once per entry, after all of its descriptors were produced.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` on every entry and returns all descriptors in `(id, part)` order.
    pub async fn run(
        &self,
        entries: Vec<PageEntry>,
        job: Job,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<PageDescriptor>> {
        let total = entries.len();
        debug!("Processing {} entries on {} worker(s)", total, self.workers);

        let (input_tx, input_rx) = mpsc::channel::<PageEntry>(self.workers * 2);
        let input_rx = Arc::new(Mutex::new(input_rx));
        let (output_tx, mut output_rx) =
            mpsc::channel::<(usize, Vec<PageDescriptor>)>(self.workers * 2);
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut workers: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let input_rx = Arc::clone(&input_rx);
            let output_tx = output_tx.clone();
            let job = Arc::clone(&job);
            let cancelled = Arc::clone(&cancelled);

            workers.push(spawn(async move {
                loop {
                    let next = input_rx.lock().await.recv().await;
                    let Some(entry) = next else {
                        break;
                    };
                    if cancelled.load(Ordering::Acquire) {
                        continue;
                    }

                    let id = entry.id;
                    let job = Arc::clone(&job);
                    let outcome = spawn_blocking(move || job(entry))
                        .await
                        .map_err(Error::from)
                        .and_then(|result| result);

                    match outcome {
                        Ok(descriptors) => {
                            if output_tx.send((id, descriptors)).await.is_err() {
                                break;
                            }
                        }
                        Err(error) => {
                            cancelled.store(true, Ordering::Release);
                            return Err(error);
                        }
                    }
                }
                debug!("Worker {} exiting", worker);
                Ok(())
            }));
        }
        // Only workers hold senders and the receiver now: the output closes
        // when the last one exits, and dispatch stops with it.
        drop(output_tx);
        drop(input_rx);

        let dispatcher = {
            let cancelled = Arc::clone(&cancelled);
            spawn(async move {
                for entry in entries {
                    if cancelled.load(Ordering::Acquire) || input_tx.send(entry).await.is_err() {
                        break;
                    }
                }
            })
        };

        let mut descriptors = Vec::with_capacity(total);
        let mut done = 0;
        while let Some((id, produced)) = output_rx.recv().await {
            done += 1;
            descriptors.extend(produced);
            if let Some(callback) = &progress {
                callback(Progress { id, done, total });
            }
        }

        dispatcher.await?;
        let results = try_join_all(workers)
            .await
            .map_err(|e| Error::AsyncTaskError(format!("Failed to join workers: {}", e)))?;
        for result in results {
            result?;
        }

        descriptors.par_sort_by_key(|descriptor| descriptor.order_key());
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryLocator;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn entries(count: usize) -> Vec<PageEntry> {
        (0..count)
            .map(|id| PageEntry {
                id,
                path: String::new(),
                name: format!("{:03}.jpg", id),
                locator: EntryLocator::ZipIndex(id),
            })
            .collect()
    }

    fn descriptor(entry: &PageEntry, part: u8) -> PageDescriptor {
        PageDescriptor {
            id: entry.id,
            part,
            width: 10,
            height: 10,
            is_double_page: false,
            is_blank: false,
            raw: None,
            original_aspect_ratio: 1.0,
            error: None,
            path: entry.path.clone(),
            name: entry.name.clone(),
            extension: "jpg",
            size: 100,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_are_sorted_by_id_and_part() {
        let job: Job = Arc::new(|entry: PageEntry| {
            // Later ids finish first.
            std::thread::sleep(Duration::from_millis((40 - entry.id as u64) % 7));
            if entry.id % 4 == 1 {
                Ok(vec![descriptor(&entry, 2), descriptor(&entry, 0), descriptor(&entry, 1)])
            } else {
                Ok(vec![descriptor(&entry, 0)])
            }
        });

        let result = WorkerPool::new(4).run(entries(40), job, None).await.unwrap();
        assert_eq!(result.len(), 40 + 10 * 2);
        let keys: Vec<(usize, u8)> = result.iter().map(|d| d.order_key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[tokio::test]
    async fn test_progress_reports_every_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let last_done = Arc::new(AtomicUsize::new(0));
        let progress: ProgressCallback = {
            let calls = Arc::clone(&calls);
            let last_done = Arc::clone(&last_done);
            Arc::new(move |p: Progress| {
                assert_eq!(p.total, 12);
                calls.fetch_add(1, Ordering::SeqCst);
                last_done.store(p.done, Ordering::SeqCst);
            })
        };
        let job: Job = Arc::new(|entry: PageEntry| Ok(vec![descriptor(&entry, 0)]));

        WorkerPool::new(3)
            .run(entries(12), job, Some(progress))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 12);
        assert_eq!(last_done.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_the_run() {
        let job: Job = Arc::new(|entry: PageEntry| {
            if entry.id == 3 {
                Err(Error::Store("disk full".to_string()))
            } else {
                Ok(vec![descriptor(&entry, 0)])
            }
        });

        let result = WorkerPool::new(2).run(entries(200), job, None).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_run_ends_when_every_worker_fails() {
        let job: Job = Arc::new(|_: PageEntry| {
            std::thread::sleep(Duration::from_millis(50));
            Err(Error::Store("disk full".to_string()))
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            WorkerPool::new(2).run(entries(200), job, None),
        )
        .await
        .expect("pool did not stop after all workers failed");
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn test_worker_count_is_at_least_one() {
        assert_eq!(WorkerPool::new(0).workers(), 1);
    }
}

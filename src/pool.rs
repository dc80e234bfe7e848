//! Worker threads that execute load requests.
//!
//! Every worker runs the same loop: wait on `work_ready` until the queue
//! yields a dispatchable request or shutdown begins, run the user-image
//! override and the decoder outside the lock, record completion, deliver.
//! Decoder and sink panics are caught so one bad item never takes a worker
//! down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::decoder::{ThumbnailDecoder, UserImageProvider};
use crate::error::{DecodeError, DecodeResult, LoaderError, LoaderResult};
use crate::queue::RequestQueue;
use crate::request::{LoadCompleted, LoadRequest, UserImageRequest};
use crate::sink::CompletionSink;
use crate::stats::StatsCounters;
use crate::LoadKey;

/// Queue plus the shutdown flag, guarded by one lock so workers never miss
/// the transition while deciding to sleep.
pub(crate) struct Dispatch<K> {
    pub queue: RequestQueue<K>,
    pub shutting_down: bool,
}

/// State shared between the loader facade and its workers.
pub(crate) struct Shared<K, I> {
    pub dispatch: Mutex<Dispatch<K>>,
    pub work_ready: Condvar,
    pub stats: StatsCounters,
    decoder: Box<dyn ThumbnailDecoder<K, I>>,
    user_images: Option<Box<dyn UserImageProvider<K, I>>>,
    sink: Mutex<Box<dyn CompletionSink<K, I>>>,
    timing: bool,
}

impl<K: LoadKey, I: Send + 'static> Shared<K, I> {
    pub fn new(
        decoder: Box<dyn ThumbnailDecoder<K, I>>,
        user_images: Option<Box<dyn UserImageProvider<K, I>>>,
        sink: Box<dyn CompletionSink<K, I>>,
        timing: bool,
    ) -> Self {
        Self {
            dispatch: Mutex::new(Dispatch {
                queue: RequestQueue::new(),
                shutting_down: false,
            }),
            work_ready: Condvar::new(),
            stats: StatsCounters::default(),
            decoder,
            user_images,
            sink: Mutex::new(sink),
            timing,
        }
    }

    /// Stop admitting work and drop everything pending.
    ///
    /// Returns the number of dropped requests, or `None` if shutdown had
    /// already begun.
    pub fn begin_shutdown(&self) -> Option<usize> {
        let dropped = {
            let mut dispatch = self.dispatch.lock();
            if dispatch.shutting_down {
                return None;
            }
            dispatch.shutting_down = true;
            dispatch.queue.clear()
        };
        self.work_ready.notify_all();
        self.stats.record_cancelled(dropped);
        Some(dropped)
    }

    /// Block until a request can be dispatched. `None` once shutting down.
    fn next_request(&self) -> Option<LoadRequest<K>> {
        let mut dispatch = self.dispatch.lock();
        loop {
            if dispatch.shutting_down {
                return None;
            }
            if let Some(request) = dispatch.queue.pop_next() {
                return Some(request);
            }
            self.work_ready.wait(&mut dispatch);
        }
    }

    /// Run the override and decoder for one request.
    ///
    /// Returns the outcome and whether the image came from the override.
    fn load(&self, request: &LoadRequest<K>) -> (DecodeResult<I>, bool) {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(provider) = &self.user_images {
                if let Some(image) = provider.user_image(UserImageRequest::from(request)) {
                    return (Ok(image), true);
                }
            }
            let outcome = self.decoder.decode(
                &request.key,
                request.size,
                request.thumbnail_mode,
                request.auto_rotate,
            );
            (outcome, false)
        }));

        attempt.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(key = ?request.key, panic = %message, "Decoder panicked");
            (Err(DecodeError::Panicked(message)), false)
        })
    }

    /// Clear the in-flight marker, waking a worker if a newer request for
    /// the same key was waiting on this one.
    fn finish(&self, request: &LoadRequest<K>) -> bool {
        let mut dispatch = self.dispatch.lock();
        let stale = dispatch.queue.finish(&request.key, request.ticket);
        if dispatch.queue.is_pending(&request.key) {
            self.work_ready.notify_one();
        }
        stale
    }

    fn deliver(&self, completed: LoadCompleted<K, I>) {
        let mut sink = self.sink.lock();
        if panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(completed))).is_err() {
            error!("Completion sink panicked; result dropped");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

fn worker_loop<K: LoadKey, I: Send + 'static>(shared: Arc<Shared<K, I>>, index: usize) {
    debug!(worker = index, "Worker started");

    while let Some(request) = shared.next_request() {
        let started = shared.timing.then(Instant::now);
        let (outcome, user_image) = shared.load(&request);

        if let Some(t) = started {
            debug!(
                worker = index,
                key = ?request.key,
                size = %request.size,
                elapsed = ?t.elapsed(),
                ok = outcome.is_ok(),
                "Load timing"
            );
        }
        if let Err(e) = &outcome {
            debug!(key = ?request.key, error = %e, "Load failed");
        }

        let stale = shared.finish(&request);
        shared.stats.record_outcome(outcome.is_ok(), user_image);
        shared.deliver(LoadCompleted::new(request, outcome, stale));
    }

    debug!(worker = index, "Worker exiting");
}

/// Fixed set of named worker threads.
pub(crate) struct WorkerPool<K, I> {
    shared: Arc<Shared<K, I>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Fixed at start; read without taking `workers`, which an outside
    /// `shutdown()` holds for the whole join.
    worker_ids: Vec<ThreadId>,
    size: usize,
}

impl<K: LoadKey, I: Send + 'static> WorkerPool<K, I> {
    /// Spawn `size` workers named `{prefix}-{index}`.
    ///
    /// If any spawn fails, the workers already started are stopped and
    /// joined before the error is returned.
    pub fn start(shared: Arc<Shared<K, I>>, size: usize, prefix: &str) -> LoaderResult<Self> {
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{prefix}-{index}"))
                .spawn(move || worker_loop(worker_shared, index));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.begin_shutdown();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(LoaderError::Spawn(e));
                }
            }
        }

        info!(workers = size, "Worker pool started");
        let worker_ids = workers.iter().map(|h| h.thread().id()).collect();
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            worker_ids,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker_ids.contains(&current)
    }

    /// Signal shutdown and join every worker.
    ///
    /// Concurrent callers block until the join completes. Called from a
    /// worker thread (a sink callback), it only signals: joining there would
    /// wait on the calling thread itself and on workers queued behind the
    /// sink lock it holds. The join then happens on the next call from
    /// outside the pool, at the latest when the loader is dropped.
    pub fn shutdown(&self) {
        if let Some(dropped) = self.shared.begin_shutdown() {
            info!(dropped, "Shutting down worker pool");
        }

        // Checked before `workers.lock()`: an outside caller may hold it
        // while joining this very thread.
        if self.is_worker_thread() {
            warn!("Shutdown requested from a worker thread; workers not joined");
            return;
        }

        let mut workers = self.workers.lock();
        if workers.is_empty() {
            return;
        }

        for handle in workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "Worker thread panicked");
            }
        }
        info!("Worker pool stopped");
    }
}

//! Loader facade: request intake, cancellation and shutdown.

use std::sync::Arc;

use tracing::debug;

use crate::config::LoaderConfig;
use crate::decoder::{ThumbnailDecoder, UserImageProvider};
use crate::error::LoaderResult;
use crate::pool::{Shared, WorkerPool};
use crate::request::{LoadCompleted, LoadRequest, Size, ThumbnailMode};
use crate::sink::CompletionSink;
use crate::stats::LoadStats;
use crate::LoadKey;

/// Asynchronous image loader.
///
/// Requests are keyed: enqueuing a key that is still pending replaces the
/// pending request, and a key is never decoded on two workers at once.
/// Priority requests are dispatched before normal ones; within a tier,
/// requests run in arrival order. Each request that actually runs yields
/// exactly one completion through the sink; superseded or cancelled pending
/// requests yield none.
///
/// Dropping the loader shuts it down.
pub struct ImageLoader<K: LoadKey, I: Send + 'static> {
    shared: Arc<Shared<K, I>>,
    pool: WorkerPool<K, I>,
}

/// Builder for [`ImageLoader`].
pub struct ImageLoaderBuilder<K, I> {
    config: LoaderConfig,
    decoder: Box<dyn ThumbnailDecoder<K, I>>,
    sink: Box<dyn CompletionSink<K, I>>,
    user_images: Option<Box<dyn UserImageProvider<K, I>>>,
}

impl<K: LoadKey, I: Send + 'static> ImageLoaderBuilder<K, I> {
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Consult `provider` before every decode.
    pub fn user_images(mut self, provider: impl UserImageProvider<K, I> + 'static) -> Self {
        self.user_images = Some(Box::new(provider));
        self
    }

    /// Validate the config and start the workers.
    pub fn build(self) -> LoaderResult<ImageLoader<K, I>> {
        self.config.validate()?;
        let workers = self.config.resolved_worker_count();

        let shared = Arc::new(Shared::new(
            self.decoder,
            self.user_images,
            self.sink,
            self.config.timing,
        ));
        let pool = WorkerPool::start(Arc::clone(&shared), workers, &self.config.thread_name_prefix)?;

        Ok(ImageLoader { shared, pool })
    }
}

impl<K: LoadKey, I: Send + 'static> ImageLoader<K, I> {
    /// Start a loader with `config`, no user-image override.
    pub fn new(
        config: LoaderConfig,
        decoder: impl ThumbnailDecoder<K, I> + 'static,
        sink: impl CompletionSink<K, I> + 'static,
    ) -> LoaderResult<Self> {
        Self::builder(decoder, sink).config(config).build()
    }

    pub fn builder(
        decoder: impl ThumbnailDecoder<K, I> + 'static,
        sink: impl CompletionSink<K, I> + 'static,
    ) -> ImageLoaderBuilder<K, I> {
        ImageLoaderBuilder {
            config: LoaderConfig::default(),
            decoder: Box::new(decoder),
            sink: Box::new(sink),
            user_images: None,
        }
    }

    /// Queue a load for `key`.
    ///
    /// Returns `false` without queuing anything once shutdown has begun.
    pub fn enqueue(
        &self,
        key: K,
        size: Size,
        thumbnail_mode: ThumbnailMode,
        auto_rotate: bool,
        priority: bool,
    ) -> bool {
        self.enqueue_request(
            LoadRequest::new(key, size)
                .with_thumbnail_mode(thumbnail_mode)
                .with_auto_rotate(auto_rotate)
                .with_priority(priority),
        )
    }

    /// Queue a prepared request. See [`enqueue`](Self::enqueue).
    pub fn enqueue_request(&self, request: LoadRequest<K>) -> bool {
        let superseded = {
            let mut dispatch = self.shared.dispatch.lock();
            if dispatch.shutting_down {
                drop(dispatch);
                self.shared.stats.record_rejected();
                debug!(key = ?request.key, "Loader shutting down, request ignored");
                return false;
            }
            dispatch.queue.push(request)
        };
        self.shared.work_ready.notify_one();

        self.shared.stats.record_enqueued(superseded.is_some());
        if let Some(old) = superseded {
            debug!(key = ?old.key, ticket = old.ticket, "Superseded pending request");
        }
        true
    }

    /// Drop the pending request for `key`.
    ///
    /// Returns whether a pending request was removed. A request already
    /// running is not interrupted; it still delivers, flagged `stale`.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = {
            let mut dispatch = self.shared.dispatch.lock();
            dispatch.queue.mark_stale(key);
            dispatch.queue.remove(key)
        };
        if removed {
            self.shared.stats.record_cancelled(1);
            debug!(key = ?key, "Cancelled pending request");
        }
        removed
    }

    /// Drop every pending request; running ones deliver flagged `stale`.
    ///
    /// Returns the number of pending requests dropped.
    pub fn cancel_all(&self) -> usize {
        let dropped = {
            let mut dispatch = self.shared.dispatch.lock();
            dispatch.queue.mark_all_stale();
            dispatch.queue.clear()
        };
        self.shared.stats.record_cancelled(dropped);
        debug!(dropped, "Cancelled all pending requests");
        dropped
    }

    /// Stop accepting work, drop pending requests and wait for every worker
    /// to finish its current item and exit.
    ///
    /// Idempotent. Once this returns, the sink is never called again.
    /// Called from inside the sink (on a worker thread) it only signals
    /// shutdown and returns; the workers are joined by the next call from
    /// outside the pool, or when the loader is dropped.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.dispatch.lock().shutting_down
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.shared.dispatch.lock().queue.is_pending(key)
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.shared.dispatch.lock().queue.is_in_flight(key)
    }

    /// The request currently pending for `key`, if any.
    pub fn pending_request(&self, key: &K) -> Option<LoadRequest<K>> {
        self.shared.dispatch.lock().queue.get(key).cloned()
    }

    /// Whether `completed` has been overtaken: cancelled or superseded while
    /// running, or a newer request for its key is pending now.
    pub fn is_superseded(&self, completed: &LoadCompleted<K, I>) -> bool {
        completed.stale || self.is_pending(&completed.key)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.dispatch.lock().queue.pending_len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.dispatch.lock().queue.in_flight_len()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    pub fn stats(&self) -> LoadStats {
        self.shared.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.shared.stats.reset();
    }
}

impl<K: LoadKey, I: Send + 'static> Drop for ImageLoader<K, I> {
    fn drop(&mut self) {
        self.pool.shutdown();
    }
}

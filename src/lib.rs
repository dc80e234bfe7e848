//! thumbload_core - asynchronous thumbnail loading for image list views.
//!
//! This crate provides:
//! - Keyed load requests with supersession of stale pending work
//! - Two-tier priority dispatch (priority first, arrival order within a tier)
//! - A fixed pool of worker threads calling a pluggable decoder
//! - Serialized completion delivery to a single consumer
//!
//! Usage:
//! ```no_run
//! use thumbload_core::{
//!     completion_channel, FileDecoder, ImageLoader, LoaderConfig, Size, ThumbnailMode,
//! };
//! use std::path::PathBuf;
//!
//! let (sink, completions) = completion_channel();
//! let loader = ImageLoader::new(LoaderConfig::from_env(), FileDecoder, sink)?;
//!
//! loader.enqueue(
//!     PathBuf::from("photos/cat.jpg"),
//!     Size::new(120, 120),
//!     ThumbnailMode::PreferEmbedded,
//!     true,
//!     false,
//! );
//!
//! // On the UI thread, e.g. once per frame
//! for done in completions.try_iter() {
//!     if loader.is_superseded(&done) {
//!         continue;
//!     }
//!     match done.outcome {
//!         Ok(thumb) => println!("{:?}: {}x{}", done.key, thumb.width, thumb.height),
//!         Err(e) => eprintln!("{:?}: {e}", done.key),
//!     }
//! }
//!
//! loader.shutdown();
//! # Ok::<(), thumbload_core::LoaderError>(())
//! ```

mod config;
mod decoder;
mod error;
mod loader;
mod pool;
mod queue;
mod request;
mod sink;
mod stats;
#[cfg(test)]
pub(crate) mod test_utils;

use std::fmt::Debug;
use std::hash::Hash;

pub use config::LoaderConfig;
pub use decoder::{decode_thumbnail, FileDecoder, Thumbnail, ThumbnailDecoder, UserImageProvider};
pub use error::{DecodeError, DecodeResult, LoaderError, LoaderResult};
pub use loader::{ImageLoader, ImageLoaderBuilder};
pub use request::{LoadCompleted, LoadRequest, Size, ThumbnailMode, UserImageRequest};
pub use sink::{completion_channel, ChannelSink, CompletionReceiver, CompletionSink};
pub use stats::LoadStats;

/// Bounds required of request keys.
pub trait LoadKey: Eq + Hash + Clone + Debug + Send + 'static {}

impl<T: Eq + Hash + Clone + Debug + Send + 'static> LoadKey for T {}

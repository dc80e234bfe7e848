//! Scripted collaborators for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::decoder::ThumbnailDecoder;
use crate::error::{DecodeError, DecodeResult};
use crate::request::{LoadCompleted, Size, ThumbnailMode};
use crate::sink::CompletionReceiver;

struct Script {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    gated: HashSet<String>,
    delay: Option<Duration>,
    gate_open: Mutex<bool>,
    gate_cv: Condvar,
    started: Mutex<Vec<String>>,
    started_cv: Condvar,
    active: Mutex<HashSet<String>>,
    overlapped: AtomicBool,
}

/// Decoder returning `"{key}@{size}"`, with per-key failures, panics and
/// a gate that holds chosen keys until released.
#[derive(Clone)]
pub(crate) struct ScriptedDecoder {
    script: Arc<Script>,
}

pub(crate) struct ScriptBuilder {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    gated: HashSet<String>,
    delay: Option<Duration>,
}

impl ScriptBuilder {
    pub fn fail(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn panic_on(mut self, key: &str) -> Self {
        self.panicking.insert(key.to_string());
        self
    }

    pub fn gate(mut self, key: &str) -> Self {
        self.gated.insert(key.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> ScriptedDecoder {
        ScriptedDecoder {
            script: Arc::new(Script {
                failing: self.failing,
                panicking: self.panicking,
                gated: self.gated,
                delay: self.delay,
                gate_open: Mutex::new(false),
                gate_cv: Condvar::new(),
                started: Mutex::new(Vec::new()),
                started_cv: Condvar::new(),
                active: Mutex::new(HashSet::new()),
                overlapped: AtomicBool::new(false),
            }),
        }
    }
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::script().build()
    }

    pub fn script() -> ScriptBuilder {
        ScriptBuilder {
            failing: HashSet::new(),
            panicking: HashSet::new(),
            gated: HashSet::new(),
            delay: None,
        }
    }

    /// Let every gated decode (current and future) proceed.
    pub fn release(&self) {
        *self.script.gate_open.lock() = true;
        self.script.gate_cv.notify_all();
    }

    /// Wait until `key` has entered the decoder at least once.
    pub fn wait_started(&self, key: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut started = self.script.started.lock();
        while !started.iter().any(|k| k == key) {
            if self
                .script
                .started_cv
                .wait_until(&mut started, deadline)
                .timed_out()
            {
                return started.iter().any(|k| k == key);
            }
        }
        true
    }

    /// Keys in the order they entered the decoder.
    pub fn calls(&self) -> Vec<String> {
        self.script.started.lock().clone()
    }

    /// Whether the same key was ever decoded on two threads at once.
    pub fn overlapped(&self) -> bool {
        self.script.overlapped.load(Ordering::SeqCst)
    }
}

impl ThumbnailDecoder<String, String> for ScriptedDecoder {
    fn decode(
        &self,
        key: &String,
        size: Size,
        _thumbnail_mode: ThumbnailMode,
        _auto_rotate: bool,
    ) -> DecodeResult<String> {
        let script = &self.script;
        {
            let mut started = script.started.lock();
            started.push(key.clone());
            script.started_cv.notify_all();
        }
        if !script.active.lock().insert(key.clone()) {
            script.overlapped.store(true, Ordering::SeqCst);
        }

        if script.gated.contains(key) {
            let mut open = script.gate_open.lock();
            while !*open {
                script.gate_cv.wait(&mut open);
            }
        }
        if let Some(delay) = script.delay {
            std::thread::sleep(delay);
        }

        script.active.lock().remove(key);

        if script.panicking.contains(key) {
            panic!("scripted panic for {key}");
        }
        if script.failing.contains(key) {
            return Err(DecodeError::Decode(format!("scripted failure for {key}")));
        }
        Ok(format!("{key}@{size}"))
    }
}

/// Receive exactly `count` completions or panic after `timeout`.
pub(crate) fn collect<K, I>(
    rx: &CompletionReceiver<K, I>,
    count: usize,
    timeout: Duration,
) -> Vec<LoadCompleted<K, I>> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Some(completed) => out.push(completed),
            None => panic!("expected {count} completions, got {}", out.len()),
        }
    }
    out
}

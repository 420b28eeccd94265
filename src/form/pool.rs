//! Reusable output buffers for serialized JSON bodies.
//!
//! Buffers are handed out behind a guard and go back to the pool when the
//! guard drops, so every exit path of a conversion returns its buffer.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Idle buffers kept by default.
const DEFAULT_MAX_IDLE: usize = 64;

/// Buffers larger than this are released instead of pooled (4 MiB).
const DEFAULT_MAX_RETAINED_CAPACITY: usize = 4 * 1024 * 1024;

/// A bounded pool of byte buffers.
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    max_retained_capacity: usize,
}

impl BufferPool {
    pub fn new(max_idle: usize, max_retained_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            max_retained_capacity,
        }
    }

    /// Take an empty buffer, reusing an idle one when available.
    pub fn take(&self) -> PooledBuffer<'_> {
        let mut buf = self
            .idle
            .lock()
            .expect("buffer pool mutex poisoned")
            .pop()
            .unwrap_or_default();
        buf.clear();
        PooledBuffer { buf, pool: self }
    }

    /// Number of idle buffers currently pooled.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect("buffer pool mutex poisoned").len()
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_retained_capacity {
            return;
        }
        buf.clear();
        let mut idle = self.idle.lock().expect("buffer pool mutex poisoned");
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE, DEFAULT_MAX_RETAINED_CAPACITY)
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

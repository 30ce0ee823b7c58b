//! Cross-thread plumbing between the display loop and the owner thread.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// The channel was closed and every queued symbol has been consumed.
    Interrupted,
}

impl fmt::Display for InputError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Interrupted => write!(formatter, "input wait interrupted: channel closed"),
        }
    }
}

impl std::error::Error for InputError {}

#[derive(Debug, Default)]
struct InputState {
    queue: VecDeque<char>,
    closed: bool,
}

#[derive(Debug, Default)]
struct SharedInput {
    state: Mutex<InputState>,
    available: Condvar,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

/// Unbounded FIFO of key symbols with a blocking consumer side.
///
/// Producers never block. Consumers block in [`InputChannel::dequeue`] until
/// a symbol arrives or the channel is closed; queued symbols are still
/// delivered after `close`, then every dequeue reports `Interrupted`.
#[derive(Debug, Clone, Default)]
pub struct InputChannel {
    shared: Arc<SharedInput>,
}

impl InputChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the channel is closed and the symbol was dropped.
    pub fn enqueue(&self, symbol: char) -> bool {
        {
            let mut state = self.lock_state();
            if state.closed {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            state.queue.push_back(symbol);
        }
        self.shared.pushed.fetch_add(1, Ordering::Relaxed);
        self.shared.available.notify_one();
        true
    }

    pub fn dequeue(&self) -> Result<char, InputError> {
        let mut state = self.lock_state();
        loop {
            if let Some(symbol) = state.queue.pop_front() {
                return Ok(symbol);
            }
            if state.closed {
                return Err(InputError::Interrupted);
            }
            state = self
                .shared
                .available
                .wait(state)
                .unwrap_or_else(|_| panic!("input channel lock poisoned"));
        }
    }

    /// Like [`InputChannel::dequeue`] but gives up after `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<Option<char>, InputError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        loop {
            if let Some(symbol) = state.queue.pop_front() {
                return Ok(Some(symbol));
            }
            if state.closed {
                return Err(InputError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (next, _) = self
                .shared
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|_| panic!("input channel lock poisoned"));
            state = next;
        }
    }

    pub fn try_dequeue(&self) -> Result<Option<char>, InputError> {
        let mut state = self.lock_state();
        match state.queue.pop_front() {
            Some(symbol) => Ok(Some(symbol)),
            None if state.closed => Err(InputError::Interrupted),
            None => Ok(None),
        }
    }

    /// Stops accepting symbols and wakes every blocked consumer.
    pub fn close(&self) {
        self.lock_state().closed = true;
        self.shared.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    pub fn len(&self) -> usize {
        self.lock_state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pushed_count(&self) -> u64 {
        self.shared.pushed.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    fn lock_state(&self) -> MutexGuard<'_, InputState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|_| panic!("input channel lock poisoned"))
    }
}

/// Suppresses auto-repeat: a held key produces its symbol once, on the first
/// press, until it is released.
#[derive(Debug, Clone)]
pub struct KeyRepeatFilter<K> {
    held: HashSet<K>,
}

impl<K> Default for KeyRepeatFilter<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyRepeatFilter<K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
        }
    }

    pub fn press(&mut self, key: K, symbol: char) -> Option<char> {
        self.held.insert(key).then_some(symbol)
    }

    pub fn release(&mut self, key: &K) {
        self.held.remove(key);
    }

    /// Forgets every held key, e.g. when the window loses focus and release
    /// events will not arrive.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn is_held(&self, key: &K) -> bool {
        self.held.contains(key)
    }
}

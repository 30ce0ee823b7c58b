use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructing,
    Live,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeReason {
    OwnerExited,
    ExplicitClose,
    WindowClosed,
    RealizationFailed,
}

impl fmt::Display for DisposeReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DisposeReason::OwnerExited => "owner thread exited",
            DisposeReason::ExplicitClose => "closed by owner",
            DisposeReason::WindowClosed => "window closed by user",
            DisposeReason::RealizationFailed => "window could not be realized",
        };
        formatter.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    Disposed(DisposeReason),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Disposed(reason) => write!(formatter, "window disposed: {reason}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

#[derive(Debug)]
struct LifecycleInner {
    state: LifecycleState,
    reason: Option<DisposeReason>,
}

#[derive(Debug)]
struct LifecycleShared {
    inner: Mutex<LifecycleInner>,
    changed: Condvar,
}

/// `Constructing -> Live -> Disposed`, or `Constructing -> Disposed` when the
/// window never comes up. `Disposed` is terminal.
#[derive(Debug, Clone)]
pub struct WindowLifecycle {
    shared: Arc<LifecycleShared>,
}

impl Default for WindowLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowLifecycle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(LifecycleShared {
                inner: Mutex::new(LifecycleInner {
                    state: LifecycleState::Constructing,
                    reason: None,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lock_inner().state
    }

    pub fn dispose_reason(&self) -> Option<DisposeReason> {
        self.lock_inner().reason
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == LifecycleState::Disposed
    }

    /// Returns `false` if the lifecycle was disposed before realization
    /// finished.
    pub fn mark_live(&self) -> bool {
        let mut inner = self.lock_inner();
        match inner.state {
            LifecycleState::Constructing => {
                inner.state = LifecycleState::Live;
                drop(inner);
                self.shared.changed.notify_all();
                true
            }
            LifecycleState::Disposed => false,
            LifecycleState::Live => panic!("window lifecycle marked live twice"),
        }
    }

    /// Returns `true` for exactly one caller; later calls are no-ops.
    pub fn dispose(&self, reason: DisposeReason) -> bool {
        let mut inner = self.lock_inner();
        if inner.state == LifecycleState::Disposed {
            return false;
        }
        inner.state = LifecycleState::Disposed;
        inner.reason = Some(reason);
        drop(inner);
        self.shared.changed.notify_all();
        true
    }

    /// Blocks while the window is still being constructed.
    pub fn wait_realized(&self) -> Result<(), LifecycleError> {
        let mut inner = self.lock_inner();
        while inner.state == LifecycleState::Constructing {
            inner = self.wait(inner);
        }
        match inner.reason {
            Some(reason) => Err(LifecycleError::Disposed(reason)),
            None => Ok(()),
        }
    }

    /// Blocks until the lifecycle reaches `Disposed`.
    pub fn wait_disposed(&self) -> DisposeReason {
        let mut inner = self.lock_inner();
        loop {
            if let Some(reason) = inner.reason {
                return reason;
            }
            inner = self.wait(inner);
        }
    }

    fn wait<'a>(&'a self, guard: MutexGuard<'a, LifecycleInner>) -> MutexGuard<'a, LifecycleInner> {
        self.shared
            .changed
            .wait(guard)
            .unwrap_or_else(|_| panic!("window lifecycle lock poisoned"))
    }

    fn lock_inner(&self) -> MutexGuard<'_, LifecycleInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|_| panic!("window lifecycle lock poisoned"))
    }
}

thread_local! {
    static THREAD_ANCHOR: Arc<()> = Arc::new(());
}

/// Observes whether an owner is still around without blocking it.
#[derive(Debug, Clone)]
pub struct OwnerWatch {
    anchor: Weak<()>,
}

/// Keeps an [`OwnerWatch`] alive until dropped.
#[derive(Debug)]
pub struct OwnerGuard {
    _anchor: Arc<()>,
}

impl OwnerWatch {
    /// Watches the calling thread; the watch reports dead once the thread's
    /// thread-local storage has been torn down.
    pub fn current_thread() -> Self {
        THREAD_ANCHOR.with(|anchor| Self {
            anchor: Arc::downgrade(anchor),
        })
    }

    /// Watch tied to an explicit guard instead of a thread.
    pub fn guard() -> (OwnerGuard, Self) {
        let anchor = Arc::new(());
        let watch = Self {
            anchor: Arc::downgrade(&anchor),
        };
        (OwnerGuard { _anchor: anchor }, watch)
    }

    pub fn is_alive(&self) -> bool {
        self.anchor.strong_count() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPollerConfig {
    pub interval: Duration,
}

impl Default for LivenessPollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
        }
    }
}

/// Timer thread that samples an [`OwnerWatch`] and runs `on_owner_exit` once
/// when the owner goes away. The thread ends after firing, after [`stop`],
/// or once the watched lifecycle is disposed by someone else.
///
/// [`stop`]: LivenessPoller::stop
#[derive(Debug)]
pub struct LivenessPoller {
    stop_sender: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LivenessPoller {
    pub fn spawn(
        watch: OwnerWatch,
        lifecycle: WindowLifecycle,
        config: LivenessPollerConfig,
        on_owner_exit: impl FnOnce() + Send + 'static,
    ) -> std::io::Result<Self> {
        assert!(
            !config.interval.is_zero(),
            "liveness poll interval must be positive"
        );
        let (stop_sender, stop_receiver) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("tilegrid-liveness".to_owned())
            .spawn(move || {
                loop {
                    // A stop message or a dropped sender both end the poll.
                    match stop_receiver.recv_timeout(config.interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                    if lifecycle.is_disposed() {
                        return;
                    }
                    if !watch.is_alive() {
                        on_owner_exit();
                        return;
                    }
                }
            })?;
        Ok(Self {
            stop_sender: Some(stop_sender),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops polling and waits for the timer thread, unless called from the
    /// timer thread itself.
    pub fn stop(&mut self) {
        self.stop_sender.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            panic!("liveness poller thread panicked");
        }
    }
}

impl Drop for LivenessPoller {
    fn drop(&mut self) {
        if thread::panicking() {
            self.stop_sender.take();
            return;
        }
        self.stop();
    }
}

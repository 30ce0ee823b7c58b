use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;
use images::PyramidConfig;
use lifecycle::{
    DisposeReason, LifecycleError, LifecycleState, LivenessPoller, LivenessPollerConfig,
    OwnerWatch, WindowLifecycle,
};
use surface::{GridSurface, RepaintSink};
use threads::InputChannel;
use tiles::{Color, ImagePyramidTile, Tile};
use winit::event_loop::EventLoopProxy;

use crate::config::WindowConfig;
use crate::display::{self, DisplayApp, DisplayCommand};
use crate::registry::{TileId, TileRegistry};
use crate::TileGridError;

pub(crate) const LIFECYCLE_TARGET: &str = "tilegrid::lifecycle";
pub(crate) const DISPLAY_TARGET: &str = "tilegrid::display";

/// Delivers commands to the display loop once it exists. Also the grid
/// surface's repaint sink: bursts of repaint requests collapse into one
/// pending event until the display loop picks it up.
pub(crate) struct CommandProxy {
    proxy: Mutex<Option<EventLoopProxy<DisplayCommand>>>,
    repaint_pending: AtomicBool,
    verbosity: Arc<AtomicU8>,
}

impl CommandProxy {
    fn new(verbosity: Arc<AtomicU8>) -> Self {
        Self {
            proxy: Mutex::new(None),
            repaint_pending: AtomicBool::new(false),
            verbosity,
        }
    }

    pub(crate) fn attach(&self, proxy: EventLoopProxy<DisplayCommand>) {
        *self.lock_proxy() = Some(proxy);
    }

    /// Returns `false` when no display loop is listening.
    pub(crate) fn send(&self, command: DisplayCommand) -> bool {
        match self.lock_proxy().as_ref() {
            Some(proxy) => proxy.send_event(command).is_ok(),
            None => false,
        }
    }

    pub(crate) fn repaint_started(&self) {
        self.repaint_pending.store(false, Ordering::Release);
    }

    pub(crate) fn is_repaint_pending(&self) -> bool {
        self.repaint_pending.load(Ordering::Acquire)
    }

    fn lock_proxy(&self) -> MutexGuard<'_, Option<EventLoopProxy<DisplayCommand>>> {
        self.proxy
            .lock()
            .unwrap_or_else(|_| panic!("display proxy lock poisoned"))
    }
}

impl RepaintSink for CommandProxy {
    fn request_repaint(&self) {
        if self.repaint_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.verbosity.load(Ordering::Relaxed) >= 2 {
            log::debug!(target: DISPLAY_TARGET, "repaint requested");
        }
        if !self.send(DisplayCommand::Repaint) {
            self.repaint_pending.store(false, Ordering::Release);
        }
    }
}

/// State shared by the owner-facing handle, the display loop and the
/// liveness poller.
pub(crate) struct WindowShared {
    pub(crate) surface: GridSurface,
    pub(crate) registry: TileRegistry,
    pub(crate) input: InputChannel,
    pub(crate) lifecycle: WindowLifecycle,
    pub(crate) commands: Arc<CommandProxy>,
    verbosity: Arc<AtomicU8>,
    pyramid: PyramidConfig,
    title_bar: Mutex<TitleBar>,
}

/// Window title plus the status line shown after it.
#[derive(Debug, Clone, Default)]
struct TitleBar {
    title: String,
    status: String,
}

impl TitleBar {
    fn text(&self) -> String {
        if self.status.is_empty() {
            self.title.clone()
        } else {
            format!("{} | {}", self.title, self.status)
        }
    }
}

impl WindowShared {
    pub(crate) fn new(config: &WindowConfig) -> Result<Self, TileGridError> {
        config.validate()?;
        let verbosity = Arc::new(AtomicU8::new(config.verbosity));
        let commands = Arc::new(CommandProxy::new(Arc::clone(&verbosity)));
        let surface = GridSurface::new(config.rows, config.cols, commands.clone())?;
        surface.set_background(config.background);
        surface.set_letterbox(config.letterbox);
        surface.set_grid_line(config.grid_line);
        surface.set_show_grid(config.show_grid);
        Ok(Self {
            surface,
            registry: TileRegistry::default(),
            input: InputChannel::new(),
            lifecycle: WindowLifecycle::new(),
            commands,
            verbosity,
            pyramid: config.pyramid,
            title_bar: Mutex::new(TitleBar {
                title: config.title.clone(),
                status: String::new(),
            }),
        })
    }

    pub(crate) fn window_title(&self) -> String {
        self.lock_title_bar().text()
    }

    fn update_title_bar(&self, change: impl FnOnce(&mut TitleBar)) {
        change(&mut self.lock_title_bar());
        self.commands.send(DisplayCommand::RefreshTitle);
    }

    fn lock_title_bar(&self) -> MutexGuard<'_, TitleBar> {
        self.title_bar
            .lock()
            .unwrap_or_else(|_| panic!("title bar lock poisoned"))
    }

    pub(crate) fn verbosity(&self) -> u8 {
        self.verbosity.load(Ordering::Relaxed)
    }

    pub(crate) fn log_lifecycle(&self, message: fmt::Arguments<'_>) {
        if self.verbosity() > 0 {
            log::info!(target: LIFECYCLE_TARGET, "{message}");
        }
    }

    pub(crate) fn mark_live(&self) -> bool {
        let live = self.lifecycle.mark_live();
        if live {
            self.log_lifecycle(format_args!("window realized"));
        }
        live
    }

    /// Moves to `Disposed`, releases blocked readers and tells the display
    /// loop to exit. Only the first call has any effect.
    pub(crate) fn dispose(&self, reason: DisposeReason) -> bool {
        if !self.lifecycle.dispose(reason) {
            return false;
        }
        self.input.close();
        self.commands.send(DisplayCommand::Dispose(reason));
        self.log_lifecycle(format_args!("window disposed: {reason}"));
        true
    }
}

/// Owner-side handle to an open window.
///
/// Dropping the handle closes the window. The window also closes on its own
/// when the thread that opened it exits.
pub struct TileWindow {
    shared: Arc<WindowShared>,
    display: Option<JoinHandle<()>>,
    poller: Option<LivenessPoller>,
}

impl TileWindow {
    /// Starts the display loop on a new thread and blocks until the window
    /// is visible.
    ///
    /// Needs a platform that allows an event loop off the main thread (X11,
    /// Wayland, Windows). Elsewhere use [`run`].
    pub fn open(config: WindowConfig) -> Result<Self, TileGridError> {
        if !display::supports_any_thread() {
            return Err(TileGridError::UnsupportedPlatform);
        }
        let shared = Arc::new(WindowShared::new(&config)?);
        let poll_interval = config.poll_interval();
        let (ready_sender, ready_receiver) = bounded(1);

        let display_handle = thread::Builder::new()
            .name("tilegrid-display".to_owned())
            .spawn({
                let shared = Arc::clone(&shared);
                move || {
                    let event_loop = match display::build_event_loop(true) {
                        Ok(event_loop) => event_loop,
                        Err(error) => {
                            shared.dispose(DisposeReason::RealizationFailed);
                            let _ = ready_sender.send(Err(error));
                            return;
                        }
                    };
                    shared.commands.attach(event_loop.create_proxy());
                    let mut app = DisplayApp::new(config, Arc::clone(&shared), Some(ready_sender));
                    if let Err(error) = event_loop.run_app(&mut app) {
                        log::error!(target: DISPLAY_TARGET, "event loop failed: {error}");
                    }
                    shared.dispose(DisposeReason::WindowClosed);
                }
            })?;

        let realized = ready_receiver.recv();
        let failure = match realized {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(_) => Some(TileGridError::DisplayExited),
        };
        if let Some(error) = failure {
            shared.dispose(DisposeReason::RealizationFailed);
            if display_handle.join().is_err() {
                log::error!(target: DISPLAY_TARGET, "display thread panicked");
            }
            return Err(error);
        }

        Self::attach(shared, Some(display_handle), poll_interval)
    }

    pub(crate) fn attach(
        shared: Arc<WindowShared>,
        display: Option<JoinHandle<()>>,
        poll_interval: Duration,
    ) -> Result<Self, TileGridError> {
        shared.lifecycle.wait_realized()?;
        let mut window = Self {
            shared,
            display,
            poller: None,
        };
        let on_owner_exit = {
            let shared = Arc::clone(&window.shared);
            move || {
                shared.dispose(DisposeReason::OwnerExited);
            }
        };
        window.poller = Some(LivenessPoller::spawn(
            OwnerWatch::current_thread(),
            window.shared.lifecycle.clone(),
            LivenessPollerConfig {
                interval: poll_interval,
            },
            on_owner_exit,
        )?);
        Ok(window)
    }

    /// Loads an image file as a tile using the window's pyramid settings.
    pub fn load_image(&self, path: impl AsRef<Path>) -> Result<TileId, TileGridError> {
        self.load_image_with(path, self.shared.pyramid)
    }

    pub fn load_image_with(
        &self,
        path: impl AsRef<Path>,
        config: PyramidConfig,
    ) -> Result<TileId, TileGridError> {
        let path = path.as_ref();
        let tile = ImagePyramidTile::load(path, config)?;
        self.shared.log_lifecycle(format_args!(
            "loaded {} ({} mip levels)",
            path.display(),
            tile.pyramid().level_count()
        ));
        Ok(self.register_tile(Arc::new(tile)))
    }

    pub fn register_tile(&self, tile: Arc<dyn Tile>) -> TileId {
        self.shared.registry.insert(tile)
    }

    /// Cells already showing the tile keep showing it.
    pub fn unregister_tile(&self, id: TileId) -> bool {
        self.shared.registry.remove(id)
    }

    pub fn set_tile(
        &self,
        row: usize,
        col: usize,
        id: TileId,
        rotation_degrees: f64,
    ) -> Result<(), TileGridError> {
        self.ensure_live()?;
        let tile = self
            .shared
            .registry
            .get(id)
            .ok_or(TileGridError::UnknownTile(id))?;
        self.shared
            .surface
            .set_cell(row, col, Some(tile), rotation_degrees)?;
        Ok(())
    }

    pub fn clear_tile(&self, row: usize, col: usize) -> Result<(), TileGridError> {
        self.ensure_live()?;
        self.shared.surface.clear_cell(row, col)?;
        Ok(())
    }

    /// Blocks until a key symbol is available. Fails with
    /// `InputError::Interrupted` once the window is gone and every queued
    /// symbol has been read.
    pub fn next_input(&self) -> Result<char, TileGridError> {
        Ok(self.shared.input.dequeue()?)
    }

    pub fn try_next_input(&self) -> Result<Option<char>, TileGridError> {
        Ok(self.shared.input.try_dequeue()?)
    }

    pub fn next_input_timeout(&self, timeout: Duration) -> Result<Option<char>, TileGridError> {
        Ok(self.shared.input.dequeue_timeout(timeout)?)
    }

    /// 0 is silent, 1 logs lifecycle events, 2 and up also logs repaints.
    pub fn set_verbosity(&self, verbosity: u8) {
        self.shared.verbosity.store(verbosity, Ordering::Relaxed);
    }

    pub fn verbosity(&self) -> u8 {
        self.shared.verbosity()
    }

    pub fn set_background_color(&self, color: Color) {
        self.shared.surface.set_background(color);
    }

    pub fn set_show_grid(&self, show_grid: bool) {
        self.shared.surface.set_show_grid(show_grid);
    }

    pub fn set_title(&self, title: &str) {
        self.shared
            .update_title_bar(|bar| bar.title = title.to_owned());
    }

    /// Status line shown in the title bar after the title, such as a score.
    /// An empty string hides it.
    pub fn set_status(&self, status: &str) {
        self.shared
            .update_title_bar(|bar| bar.status = status.to_owned());
    }

    /// Text the title bar currently shows.
    pub fn window_title(&self) -> String {
        self.shared.window_title()
    }

    /// `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        self.shared.surface.dimensions()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.shared.lifecycle.state()
    }

    pub fn dispose_reason(&self) -> Option<DisposeReason> {
        self.shared.lifecycle.dispose_reason()
    }

    pub fn close(mut self) {
        self.shutdown(DisposeReason::ExplicitClose);
    }

    #[cfg(test)]
    pub(crate) fn shared_for_tests(&self) -> &Arc<WindowShared> {
        &self.shared
    }

    fn ensure_live(&self) -> Result<(), TileGridError> {
        match self.shared.lifecycle.dispose_reason() {
            Some(reason) => Err(LifecycleError::Disposed(reason).into()),
            None => Ok(()),
        }
    }

    fn shutdown(&mut self, reason: DisposeReason) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        self.shared.dispose(reason);
        if let Some(display) = self.display.take() {
            if display.join().is_err() {
                log::error!(target: DISPLAY_TARGET, "display thread panicked");
            }
        }
    }
}

impl Drop for TileWindow {
    fn drop(&mut self) {
        self.shutdown(DisposeReason::ExplicitClose);
    }
}

/// Runs the display loop on the calling thread (normally `main`) and `owner`
/// on a new thread once the window is visible. Returns after the window is
/// disposed and `owner` has returned.
///
/// The window closes when `owner` returns and drops its handle. Works on
/// every platform winit supports.
pub fn run<F>(config: WindowConfig, owner: F) -> Result<DisposeReason, TileGridError>
where
    F: FnOnce(TileWindow) + Send + 'static,
{
    let shared = Arc::new(WindowShared::new(&config)?);
    let poll_interval = config.poll_interval();
    let event_loop = display::build_event_loop(false)?;
    shared.commands.attach(event_loop.create_proxy());

    let owner_handle = thread::Builder::new()
        .name("tilegrid-owner".to_owned())
        .spawn({
            let shared = Arc::clone(&shared);
            move || {
                if shared.lifecycle.wait_realized().is_err() {
                    return;
                }
                match TileWindow::attach(shared, None, poll_interval) {
                    Ok(window) => owner(window),
                    Err(error) => {
                        log::error!(target: LIFECYCLE_TARGET, "owner could not attach: {error}");
                    }
                }
            }
        })?;

    let mut app = DisplayApp::new(config, Arc::clone(&shared), None);
    let loop_result = event_loop.run_app(&mut app);
    shared.dispose(DisposeReason::WindowClosed);
    let owner_result = owner_handle.join();

    if let Some(error) = app.take_failure() {
        return Err(error);
    }
    loop_result?;
    if owner_result.is_err() {
        return Err(TileGridError::OwnerPanicked);
    }
    Ok(shared
        .lifecycle
        .dispose_reason()
        .unwrap_or(DisposeReason::WindowClosed))
}

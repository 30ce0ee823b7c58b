use std::sync::Arc;

use crossbeam_channel::Sender;
use lifecycle::DisposeReason;
use renderer::{FramePresenter, PixelCanvas, PresentError};
use threads::KeyRepeatFilter;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::TileGridError;
use crate::config::{CloseBehavior, WindowConfig};
use crate::window::{DISPLAY_TARGET, WindowShared};

/// Messages from other threads to the display loop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DisplayCommand {
    Repaint,
    RefreshTitle,
    Dispose(DisposeReason),
}

type ReadySender = Sender<Result<(), TileGridError>>;

pub(crate) fn supports_any_thread() -> bool {
    cfg!(any(
        windows,
        all(unix, not(target_vendor = "apple"), not(target_os = "android"))
    ))
}

pub(crate) fn build_event_loop(
    any_thread: bool,
) -> Result<EventLoop<DisplayCommand>, TileGridError> {
    let mut builder = EventLoop::<DisplayCommand>::with_user_event();
    if any_thread {
        allow_any_thread(&mut builder);
    }
    Ok(builder.build()?)
}

#[cfg(all(unix, not(target_vendor = "apple"), not(target_os = "android")))]
fn allow_any_thread(builder: &mut EventLoopBuilder<DisplayCommand>) {
    // Sets the flag shared by the X11 and Wayland backends.
    winit::platform::x11::EventLoopBuilderExtX11::with_any_thread(builder, true);
}

#[cfg(windows)]
fn allow_any_thread(builder: &mut EventLoopBuilder<DisplayCommand>) {
    winit::platform::windows::EventLoopBuilderExtWindows::with_any_thread(builder, true);
}

#[cfg(not(any(
    windows,
    all(unix, not(target_vendor = "apple"), not(target_os = "android"))
)))]
fn allow_any_thread(_builder: &mut EventLoopBuilder<DisplayCommand>) {}

/// Maps a pressed key to the symbol handed to the owner. Keys without a
/// printable or editing meaning (arrows, modifiers, function keys) map to
/// nothing.
pub(crate) fn key_symbol(logical_key: &Key, text: Option<&str>) -> Option<char> {
    match logical_key {
        Key::Named(NamedKey::Enter) => Some('\n'),
        Key::Named(NamedKey::Tab) => Some('\t'),
        Key::Named(NamedKey::Space) => Some(' '),
        Key::Named(NamedKey::Backspace) => Some('\u{8}'),
        Key::Named(NamedKey::Escape) => Some('\u{1b}'),
        Key::Named(NamedKey::Delete) => Some('\u{7f}'),
        Key::Character(characters) => text
            .and_then(|text| text.chars().next())
            .or_else(|| characters.chars().next()),
        _ => text
            .and_then(|text| text.chars().next())
            .filter(|symbol| !symbol.is_control()),
    }
}

pub(crate) struct DisplayApp {
    config: WindowConfig,
    shared: Arc<WindowShared>,
    ready: Option<ReadySender>,
    window: Option<Arc<Window>>,
    presenter: Option<FramePresenter>,
    canvas: PixelCanvas,
    keys: KeyRepeatFilter<PhysicalKey>,
    failure: Option<TileGridError>,
}

impl DisplayApp {
    pub(crate) fn new(
        config: WindowConfig,
        shared: Arc<WindowShared>,
        ready: Option<ReadySender>,
    ) -> Self {
        Self {
            config,
            shared,
            ready,
            window: None,
            presenter: None,
            canvas: PixelCanvas::new(1, 1),
            keys: KeyRepeatFilter::new(),
            failure: None,
        }
    }

    /// Realization error when no one was waiting on the ready channel.
    pub(crate) fn take_failure(&mut self) -> Option<TileGridError> {
        self.failure.take()
    }

    fn window_id(&self) -> Option<WindowId> {
        self.window.as_ref().map(|window| window.id())
    }

    fn realize(&mut self, event_loop: &ActiveEventLoop) -> Result<(), TileGridError> {
        let (width, height) = self.config.window_size();
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title(self.shared.window_title())
                    .with_inner_size(LogicalSize::new(width, height))
                    .with_min_inner_size(LogicalSize::new(width, height)),
            )?,
        );
        let size = window.inner_size();
        let presenter =
            pollster::block_on(FramePresenter::new(window.clone(), size.width, size.height))?;
        self.canvas.resize(size.width.max(1), size.height.max(1));
        self.window = Some(window);
        self.presenter = Some(presenter);
        Ok(())
    }

    fn notify_ready(&mut self, result: Result<(), TileGridError>) {
        match self.ready.take() {
            Some(ready) => {
                let _ = ready.send(result);
            }
            None => {
                if let Err(error) = result {
                    self.failure = Some(error);
                }
            }
        }
    }

    fn handle_key(&mut self, event: KeyEvent) {
        match event.state {
            ElementState::Pressed => {
                let Some(symbol) = key_symbol(&event.logical_key, event.text.as_deref()) else {
                    return;
                };
                let Some(symbol) = self.keys.press(event.physical_key, symbol) else {
                    return;
                };
                let delivered = self.shared.input.enqueue(symbol);
                if self.shared.verbosity() >= 2 {
                    log::debug!(
                        target: DISPLAY_TARGET,
                        "key {symbol:?} {}",
                        if delivered { "queued" } else { "dropped" }
                    );
                }
            }
            ElementState::Released => self.keys.release(&event.physical_key),
        }
    }

    fn close_requested(&mut self, event_loop: &ActiveEventLoop) {
        self.shared.dispose(DisposeReason::WindowClosed);
        match self.config.close_behavior {
            CloseBehavior::ExitProcess => std::process::exit(0),
            CloseBehavior::Dispose => event_loop.exit(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(presenter)) = (self.window.as_ref(), self.presenter.as_mut())
        else {
            return;
        };
        self.shared.commands.repaint_started();

        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.canvas.resize(size.width, size.height);
        self.shared
            .surface
            .render(&mut self.canvas, size.width, size.height);

        match presenter.present(self.canvas.image()) {
            Ok(()) => {
                if self.shared.verbosity() >= 2 {
                    log::debug!(
                        target: DISPLAY_TARGET,
                        "presented {}x{} frame",
                        size.width,
                        size.height
                    );
                }
            }
            Err(PresentError::Surface(wgpu_error)) => match wgpu_error {
                renderer::SurfaceError::Outdated | renderer::SurfaceError::Lost => {
                    presenter.resize(size.width, size.height);
                    presenter.reconfigure();
                    window.request_redraw();
                }
                renderer::SurfaceError::OutOfMemory => {
                    log::error!(target: DISPLAY_TARGET, "surface out of memory");
                    event_loop.exit();
                }
                _ => window.request_redraw(),
            },
            Err(error) => {
                log::warn!(target: DISPLAY_TARGET, "present failed: {error}");
                window.request_redraw();
            }
        }
    }
}

impl ApplicationHandler<DisplayCommand> for DisplayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        if self.window.is_some() || self.shared.lifecycle.is_disposed() {
            return;
        }

        match self.realize(event_loop) {
            Ok(()) => {
                if !self.shared.mark_live() {
                    event_loop.exit();
                    return;
                }
                self.notify_ready(Ok(()));
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            Err(error) => {
                log::error!(target: DISPLAY_TARGET, "window realization failed: {error}");
                self.shared.dispose(DisposeReason::RealizationFailed);
                self.notify_ready(Err(error));
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, command: DisplayCommand) {
        match command {
            DisplayCommand::Repaint => {
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            DisplayCommand::RefreshTitle => {
                if let Some(window) = self.window.as_ref() {
                    window.set_title(&self.shared.window_title());
                }
            }
            DisplayCommand::Dispose(_) => event_loop.exit(),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id() != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.close_requested(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.resize(size.width, size.height);
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            WindowEvent::Focused(false) => self.keys.release_all(),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shared.dispose(DisposeReason::WindowClosed);
        self.presenter = None;
        self.window = None;
    }
}

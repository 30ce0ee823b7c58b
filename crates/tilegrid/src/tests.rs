use std::sync::Arc;
use std::thread;
use std::time::Duration;

use renderer::PixelCanvas;
use winit::keyboard::{Key, NamedKey, SmolStr};

use crate::display::key_symbol;
use crate::registry::TileRegistry;
use crate::window::WindowShared;
use crate::*;

fn headless_window(config: WindowConfig) -> TileWindow {
    let shared = Arc::new(WindowShared::new(&config).expect("valid config"));
    assert!(shared.mark_live());
    TileWindow::attach(shared, None, config.poll_interval()).expect("attach headless window")
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("tilegrid-{}-{name}", std::process::id()))
}

#[test]
fn default_config_is_valid_and_square() {
    let config = WindowConfig::default();
    assert_eq!(config.validate().ok(), Some(()));
    assert_eq!((config.rows, config.cols), (8, 8));
    assert_eq!(config.close_behavior, CloseBehavior::ExitProcess);
    assert_eq!(config.window_size(), (400.0, 400.0));
    assert_eq!(config.poll_interval(), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
}

#[test]
fn window_size_gives_longer_axis_min_dimension() {
    assert_eq!(WindowConfig::new(3, 9).window_size(), (400.0, 400.0 / 3.0));
    assert_eq!(WindowConfig::new(4, 2).window_size(), (200.0, 400.0));

    let config = WindowConfig {
        min_dimension: 600,
        ..WindowConfig::new(2, 3)
    };
    assert_eq!(config.window_size(), (600.0, 400.0));
}

#[test]
fn validate_rejects_out_of_range_grid() {
    for (rows, cols) in [(0, 3), (3, 0), (101, 1), (1, 101)] {
        match WindowConfig::new(rows, cols).validate() {
            Err(TileGridError::Grid(GridError::Config { rows: r, cols: c })) => {
                assert_eq!((r, c), (rows, cols));
            }
            other => panic!("expected config error for {rows}x{cols}, got {other:?}"),
        }
    }
    assert!(WindowConfig::new(100, 1).validate().is_ok());
}

#[test]
fn validate_rejects_zero_sizes() {
    let zero_min = WindowConfig {
        min_dimension: 0,
        ..WindowConfig::default()
    };
    assert!(matches!(
        zero_min.validate(),
        Err(TileGridError::InvalidConfig(_))
    ));

    let zero_poll = WindowConfig {
        poll_interval_ms: 0,
        ..WindowConfig::default()
    };
    assert!(matches!(
        zero_poll.validate(),
        Err(TileGridError::InvalidConfig(_))
    ));
}

#[test]
fn json_config_fills_missing_fields_with_defaults() {
    let config = WindowConfig::from_json_str(
        r#"{
            "rows": 3,
            "cols": 5,
            "title": "board",
            "background": { "r": 10, "g": 20, "b": 30 },
            "close_behavior": "dispose",
            "pyramid": { "pad": "square" }
        }"#,
    )
    .expect("parse config");

    assert_eq!((config.rows, config.cols), (3, 5));
    assert_eq!(config.title, "board");
    assert_eq!(config.background, Color::rgb(10, 20, 30));
    assert_eq!(config.close_behavior, CloseBehavior::Dispose);
    assert_eq!(config.pyramid.pad, PadPolicy::Square);
    assert_eq!(config.pyramid.spacing, LevelSpacing::Halving);
    assert_eq!(config.min_dimension, DEFAULT_MIN_DIMENSION);
}

#[test]
fn json_config_is_validated_after_parsing() {
    assert!(matches!(
        WindowConfig::from_json_str(r#"{ "rows": 0 }"#),
        Err(TileGridError::Grid(GridError::Config { rows: 0, .. }))
    ));
    assert!(matches!(
        WindowConfig::from_json_str("{ not json"),
        Err(TileGridError::ConfigParse(_))
    ));
}

#[test]
fn load_json_reports_missing_file() {
    let path = temp_path("missing-config.json");
    assert!(matches!(
        WindowConfig::load_json(&path),
        Err(TileGridError::Io(_))
    ));
}

#[test]
fn registry_hands_out_distinct_ids_and_forgets_removed_tiles() {
    let registry = TileRegistry::default();
    let red = registry.insert(Arc::new(ColorTile(Color::rgb(255, 0, 0))));
    let blue = registry.insert(Arc::new(ColorTile(Color::rgb(0, 0, 255))));
    assert_ne!(red, blue);
    assert_eq!(registry.len(), 2);

    assert!(registry.remove(red));
    assert!(!registry.remove(red));
    assert!(registry.get(red).is_none());
    assert!(registry.get(blue).is_some());
    assert_eq!(registry.len(), 1);
}

#[test]
fn key_symbols_cover_text_and_editing_keys() {
    assert_eq!(
        key_symbol(&Key::Character(SmolStr::new("a")), Some("a")),
        Some('a')
    );
    assert_eq!(
        key_symbol(&Key::Character(SmolStr::new("a")), Some("A")),
        Some('A')
    );
    assert_eq!(
        key_symbol(&Key::Character(SmolStr::new("w")), None),
        Some('w')
    );
    assert_eq!(key_symbol(&Key::Named(NamedKey::Enter), Some("\r")), Some('\n'));
    assert_eq!(key_symbol(&Key::Named(NamedKey::Space), Some(" ")), Some(' '));
    assert_eq!(key_symbol(&Key::Named(NamedKey::Escape), None), Some('\u{1b}'));
    assert_eq!(key_symbol(&Key::Named(NamedKey::ArrowLeft), None), None);
    assert_eq!(key_symbol(&Key::Named(NamedKey::Shift), None), None);
}

#[test]
fn shared_state_follows_config() {
    let config = WindowConfig {
        background: Color::rgb(1, 2, 3),
        verbosity: 2,
        ..WindowConfig::new(2, 4)
    };
    let shared = WindowShared::new(&config).expect("valid config");

    assert_eq!(shared.surface.dimensions(), (2, 4));
    assert_eq!(shared.verbosity(), 2);
    assert_eq!(shared.lifecycle.state(), LifecycleState::Constructing);
}

#[test]
fn dispose_closes_input_once() {
    let shared = WindowShared::new(&WindowConfig::default()).expect("valid config");
    shared.input.enqueue('x');

    assert!(shared.dispose(DisposeReason::WindowClosed));
    assert!(!shared.dispose(DisposeReason::ExplicitClose));

    assert!(shared.input.is_closed());
    assert!(!shared.input.enqueue('y'));
    assert_eq!(shared.input.dequeue(), Ok('x'));
    assert_eq!(shared.input.dequeue(), Err(InputError::Interrupted));
    assert_eq!(
        shared.lifecycle.dispose_reason(),
        Some(DisposeReason::WindowClosed)
    );
}

#[test]
fn repaint_without_display_loop_is_not_left_pending() {
    let shared = WindowShared::new(&WindowConfig::default()).expect("valid config");
    shared
        .surface
        .set_cell(0, 0, Some(Arc::new(ColorTile(Color::BLACK))), 0.0)
        .expect("set cell");
    assert!(!shared.commands.is_repaint_pending());
}

#[test]
fn set_tile_draws_registered_tile_into_cell() {
    let window = headless_window(WindowConfig::new(1, 2));
    let red = window.register_tile(Arc::new(ColorTile(Color::rgb(255, 0, 0))));
    window.set_tile(0, 1, red, 90.0).expect("set tile");

    let mut canvas = PixelCanvas::new(200, 100);
    window.shared_for_tests().surface.render(&mut canvas, 200, 100);

    assert_eq!(canvas.pixel(50, 50), Color::WHITE);
    assert_eq!(canvas.pixel(150, 50), Color::rgb(255, 0, 0));
}

#[test]
fn set_tile_rejects_unknown_and_out_of_range() {
    let window = headless_window(WindowConfig::new(2, 2));
    let tile = window.register_tile(Arc::new(ColorTile(Color::BLACK)));

    assert!(matches!(
        window.set_tile(2, 0, tile, 0.0),
        Err(TileGridError::Grid(GridError::Index { row: 2, col: 0, .. }))
    ));

    assert!(window.unregister_tile(tile));
    assert!(matches!(
        window.set_tile(0, 0, tile, 0.0),
        Err(TileGridError::UnknownTile(id)) if id == tile
    ));
}

#[test]
fn unregistered_tile_stays_in_cells_that_show_it() {
    let window = headless_window(WindowConfig::new(1, 1));
    let tile = window.register_tile(Arc::new(ColorTile(Color::rgb(0, 0, 255))));
    window.set_tile(0, 0, tile, 0.0).expect("set tile");
    window.unregister_tile(tile);

    let mut canvas = PixelCanvas::new(10, 10);
    window.shared_for_tests().surface.render(&mut canvas, 10, 10);
    assert_eq!(canvas.pixel(5, 5), Color::rgb(0, 0, 255));
}

#[test]
fn clear_tile_leaves_background() {
    let window = headless_window(WindowConfig::new(1, 1));
    window.set_background_color(Color::rgb(9, 9, 9));
    let tile = window.register_tile(Arc::new(ColorTile(Color::BLACK)));
    window.set_tile(0, 0, tile, 0.0).expect("set tile");
    window.clear_tile(0, 0).expect("clear tile");

    let mut canvas = PixelCanvas::new(10, 10);
    window.shared_for_tests().surface.render(&mut canvas, 10, 10);
    assert_eq!(canvas.pixel(5, 5), Color::rgb(9, 9, 9));
}

#[test]
fn load_image_registers_pyramid_tile() {
    let path = temp_path("load.png");
    let mut image = RgbaImage::new(64, 32);
    for pixel in image.pixels_mut() {
        *pixel = Rgba([0, 255, 0, 255]);
    }
    image.save(&path).expect("write test image");

    let window = headless_window(WindowConfig::new(1, 1));
    let id = window.load_image(&path).expect("load image");
    window.set_tile(0, 0, id, 0.0).expect("set tile");
    std::fs::remove_file(&path).ok();

    let mut canvas = PixelCanvas::new(64, 64);
    window.shared_for_tests().surface.render(&mut canvas, 64, 64);
    assert_eq!(canvas.pixel(32, 32), Color::rgb(0, 255, 0));
    // Aspect is preserved: a 2:1 image leaves the top quarter empty.
    assert_eq!(canvas.pixel(32, 4), Color::WHITE);
}

#[test]
fn load_image_reports_missing_file() {
    let window = headless_window(WindowConfig::new(1, 1));
    assert!(matches!(
        window.load_image(temp_path("does-not-exist.png")),
        Err(TileGridError::Load(LoadError::Open { .. }))
    ));
}

#[test]
fn next_input_returns_keys_in_order() {
    let window = headless_window(WindowConfig::default());
    let input = window.shared_for_tests().input.clone();
    for symbol in ['w', 'a', 's', 'd'] {
        assert!(input.enqueue(symbol));
    }

    let received: Vec<char> = (0..4)
        .map(|_| window.next_input().expect("input"))
        .collect();
    assert_eq!(received, ['w', 'a', 's', 'd']);
    assert_eq!(window.try_next_input().expect("poll input"), None);
    assert_eq!(
        window
            .next_input_timeout(Duration::from_millis(5))
            .expect("poll input"),
        None
    );
}

#[test]
fn blocked_reader_is_interrupted_by_close() {
    let window = headless_window(WindowConfig::default());
    let shared = Arc::clone(window.shared_for_tests());
    let reader = thread::spawn(move || shared.input.dequeue());

    thread::sleep(Duration::from_millis(20));
    window.close();

    assert_eq!(
        reader.join().expect("reader thread"),
        Err(InputError::Interrupted)
    );
}

#[test]
fn dropping_window_disposes_as_explicit_close() {
    let window = headless_window(WindowConfig::new(2, 2));
    let shared = Arc::clone(window.shared_for_tests());
    let tile = window.register_tile(Arc::new(ColorTile(Color::BLACK)));
    drop(window);

    assert_eq!(shared.lifecycle.state(), LifecycleState::Disposed);
    assert_eq!(
        shared.lifecycle.dispose_reason(),
        Some(DisposeReason::ExplicitClose)
    );
    assert!(shared.registry.get(tile).is_some());
}

#[test]
fn disposed_window_rejects_set_tile() {
    let window = headless_window(WindowConfig::new(2, 2));
    let tile = window.register_tile(Arc::new(ColorTile(Color::BLACK)));
    window.shared_for_tests().dispose(DisposeReason::WindowClosed);

    assert!(matches!(
        window.set_tile(0, 0, tile, 0.0),
        Err(TileGridError::Lifecycle(LifecycleError::Disposed(
            DisposeReason::WindowClosed
        )))
    ));
    assert!(matches!(
        window.next_input(),
        Err(TileGridError::Input(InputError::Interrupted))
    ));
    assert_eq!(window.lifecycle_state(), LifecycleState::Disposed);
}

#[test]
fn owner_thread_exit_disposes_window() {
    let config = WindowConfig {
        poll_interval_ms: 5,
        ..WindowConfig::default()
    };
    let shared = Arc::new(WindowShared::new(&config).expect("valid config"));
    assert!(shared.mark_live());

    let owner = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            let window = TileWindow::attach(shared, None, config.poll_interval())
                .expect("attach headless window");
            // Leaked handle: only thread exit can dispose the window.
            std::mem::forget(window);
        })
    };
    owner.join().expect("owner thread");

    assert_eq!(shared.lifecycle.wait_disposed(), DisposeReason::OwnerExited);
}

#[test]
fn verbosity_and_dimensions_are_reported() {
    let window = headless_window(WindowConfig::new(3, 7));
    assert_eq!(window.dimensions(), (3, 7));
    assert_eq!(window.verbosity(), 0);
    window.set_verbosity(2);
    assert_eq!(window.verbosity(), 2);
    assert_eq!(window.lifecycle_state(), LifecycleState::Live);
    assert_eq!(window.dispose_reason(), None);
}

#[test]
fn status_line_follows_title_until_cleared() {
    let window = headless_window(WindowConfig {
        title: "soccer".to_owned(),
        ..WindowConfig::new(3, 5)
    });
    assert_eq!(window.window_title(), "soccer");

    window.set_status("2 : 1");
    assert_eq!(window.window_title(), "soccer | 2 : 1");

    window.set_title("match");
    assert_eq!(window.window_title(), "match | 2 : 1");

    window.set_status("");
    assert_eq!(window.window_title(), "match");
}

#[test]
fn winit_errors_keep_their_source() {
    use std::error::Error;

    let error = TileGridError::from(winit::error::EventLoopError::RecreationAttempt);
    assert!(matches!(
        error,
        TileGridError::EventLoop(winit::error::EventLoopError::RecreationAttempt)
    ));
    let source = error.source().expect("event loop error source");
    assert!(source.is::<winit::error::EventLoopError>());
    assert!(error.to_string().starts_with("event loop error: "));
}

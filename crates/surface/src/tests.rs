use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use images::{PyramidConfig, Rgba, RgbaImage};
use renderer::PixelCanvas;
use tiles::{ColorTile, ImagePyramidTile};

use super::*;

const RED: Color = Color::rgb(255, 0, 0);
const BLUE: Color = Color::rgb(0, 0, 255);

#[derive(Default)]
struct CountingSink {
    requests: AtomicUsize,
}

impl RepaintSink for CountingSink {
    fn request_repaint(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

fn surface(rows: usize, cols: usize) -> GridSurface {
    GridSurface::new(rows, cols, Arc::new(NoRepaint)).expect("create grid surface")
}

/// Left half red, right half blue.
fn split_tile(size: u32) -> Arc<dyn Tile> {
    let image = RgbaImage::from_fn(size, size, |x, _| {
        if x < size / 2 {
            Rgba(RED.to_array())
        } else {
            Rgba(BLUE.to_array())
        }
    });
    Arc::new(ImagePyramidTile::from_image(image, PyramidConfig::default()).expect("build tile"))
}

fn render(surface: &GridSurface, width: u32, height: u32) -> PixelCanvas {
    let mut canvas = PixelCanvas::new(width, height);
    surface.render(&mut canvas, width, height);
    canvas
}

#[test]
fn grid_dimensions_are_validated() {
    assert!(GridSurface::new(1, 100, Arc::new(NoRepaint)).is_ok());
    assert_eq!(
        GridSurface::new(0, 3, Arc::new(NoRepaint)).err(),
        Some(GridError::Config { rows: 0, cols: 3 })
    );
    assert_eq!(
        GridSurface::new(3, 101, Arc::new(NoRepaint)).err(),
        Some(GridError::Config { rows: 3, cols: 101 })
    );
}

#[test]
fn out_of_range_cell_is_rejected_without_repaint() {
    let sink = Arc::new(CountingSink::default());
    let grid = GridSurface::new(2, 3, sink.clone()).expect("create grid surface");

    let error = grid
        .set_cell(2, 0, Some(Arc::new(ColorTile(RED))), 0.0)
        .expect_err("row out of range");
    assert_eq!(
        error,
        GridError::Index {
            row: 2,
            col: 0,
            rows: 2,
            cols: 3
        }
    );
    assert!(grid.clear_cell(0, 3).is_err());
    assert_eq!(sink.requests.load(Ordering::SeqCst), 0);
}

#[test]
fn every_mutation_requests_a_repaint() {
    let sink = Arc::new(CountingSink::default());
    let grid = GridSurface::new(2, 2, sink.clone()).expect("create grid surface");

    grid.set_cell(0, 0, Some(Arc::new(ColorTile(RED))), 45.0)
        .expect("set cell");
    grid.clear_cell(0, 0).expect("clear cell");
    grid.set_background(Color::BLACK);
    grid.set_show_grid(true);

    assert_eq!(sink.requests.load(Ordering::SeqCst), 4);
}

#[test]
fn set_cell_stores_rotation_in_radians() {
    let grid = surface(2, 2);
    grid.set_cell(1, 0, Some(Arc::new(ColorTile(RED))), 180.0)
        .expect("set cell");

    let cell = grid.cell(1, 0).expect("cell");
    assert!(!cell.is_empty());
    assert!((cell.rotation_radians() - std::f64::consts::PI).abs() < 1e-12);

    grid.clear_cell(1, 0).expect("clear cell");
    let cell = grid.cell(1, 0).expect("cell");
    assert!(cell.is_empty());
    assert_eq!(cell.rotation_radians(), 0.0);
}

#[test]
fn wide_viewport_letterboxes_and_rotates_tile_about_cell_center() {
    let grid = surface(3, 3);
    grid.set_cell(1, 1, Some(split_tile(100)), 90.0)
        .expect("set cell");

    let canvas = render(&grid, 900, 300);

    // 300 px of letterbox on each side of the 300x300 active area.
    assert_eq!(canvas.pixel(0, 0), Color::BLACK);
    assert_eq!(canvas.pixel(299, 150), Color::BLACK);
    assert_eq!(canvas.pixel(600, 150), Color::BLACK);
    assert_eq!(canvas.pixel(899, 299), Color::BLACK);

    // White background in every other cell of the active area.
    for (x, y) in [(300, 0), (350, 50), (550, 150), (450, 250), (599, 299)] {
        assert_eq!(canvas.pixel(x, y), Color::WHITE, "pixel ({x}, {y})");
    }

    // A clockwise quarter turn moves the tile's left (red) half to the top.
    assert_eq!(canvas.pixel(450, 110), RED);
    assert_eq!(canvas.pixel(410, 140), RED);
    assert_eq!(canvas.pixel(450, 190), BLUE);
    assert_eq!(canvas.pixel(490, 160), BLUE);
}

#[test]
fn cleared_cell_renders_background_only() {
    let grid = surface(3, 3);
    grid.set_cell(0, 2, Some(Arc::new(ColorTile(RED))), 0.0)
        .expect("set cell");
    assert_eq!(render(&grid, 300, 300).pixel(250, 50), RED);

    grid.clear_cell(0, 2).expect("clear cell");

    let canvas = render(&grid, 300, 300);
    for y in (0..100).step_by(10) {
        for x in (200..300).step_by(10) {
            assert_eq!(canvas.pixel(x, y), Color::WHITE, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn one_tile_may_fill_many_cells() {
    let grid = surface(1, 3);
    let tile: Arc<dyn Tile> = Arc::new(ColorTile(BLUE));
    for col in 0..3 {
        grid.set_cell(0, col, Some(Arc::clone(&tile)), 0.0)
            .expect("set cell");
    }

    let canvas = render(&grid, 300, 100);
    for x in [10, 150, 290] {
        assert_eq!(canvas.pixel(x, 50), BLUE);
    }
}

#[test]
fn grid_lines_and_colors_follow_configuration() {
    let grid = surface(2, 2);
    grid.set_background(Color::rgb(10, 20, 30));
    grid.set_letterbox(Color::rgb(1, 1, 1));
    grid.set_grid_line(RED);
    grid.set_show_grid(true);

    let canvas = render(&grid, 300, 200);

    assert_eq!(canvas.pixel(10, 100), Color::rgb(1, 1, 1));
    assert_eq!(canvas.pixel(120, 40), Color::rgb(10, 20, 30));
    assert_eq!(canvas.pixel(149, 40), RED);
    assert_eq!(canvas.pixel(150, 40), Color::rgb(10, 20, 30));
    assert_eq!(canvas.pixel(120, 99), RED);
}

#[test]
fn zero_sized_viewport_is_ignored() {
    let grid = surface(2, 2);
    let mut canvas = PixelCanvas::new(4, 4);
    canvas.clear(RED);

    grid.render(&mut canvas, 0, 4);

    assert_eq!(canvas.pixel(0, 0), RED);
}

#[test]
fn concurrent_mutations_and_renders_stay_consistent() {
    let grid = Arc::new(surface(4, 4));
    let tile: Arc<dyn Tile> = Arc::new(ColorTile(RED));

    let writers: Vec<_> = (0..4)
        .map(|row| {
            let grid = Arc::clone(&grid);
            let tile = Arc::clone(&tile);
            thread::spawn(move || {
                for round in 0..50 {
                    let col = round % 4;
                    grid.set_cell(row, col, Some(Arc::clone(&tile)), 90.0)
                        .expect("set cell");
                    grid.clear_cell(row, col).expect("clear cell");
                }
                grid.set_cell(row, row, Some(tile), 0.0).expect("set cell");
            })
        })
        .collect();

    for _ in 0..20 {
        render(&grid, 40, 40);
    }
    for writer in writers {
        writer.join().expect("writer thread");
    }

    let canvas = render(&grid, 40, 40);
    for index in 0..4 {
        let center = index * 10 + 5;
        assert_eq!(canvas.pixel(center, center), RED);
    }
    assert_eq!(canvas.pixel(15, 5), Color::WHITE);
}

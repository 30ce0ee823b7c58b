use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tilegrid::{
    ImagePyramidTile, InputError, PyramidConfig, Rgba, RgbaImage, TileGridError, TileWindow,
    WindowConfig,
};

const ARROW_SIZE: u32 = 256;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Move an image around a tile grid: w/a/s/d move, r rotates, g toggles the grid, q quits"
)]
struct Arguments {
    /// JSON window config; flags below override its fields.
    #[arg(long, value_parser)]
    config: Option<PathBuf>,
    #[arg(long)]
    rows: Option<usize>,
    #[arg(long)]
    cols: Option<usize>,
    /// Image shown in the moving tile. A generated arrow when omitted.
    #[arg(long, short = 'i', value_parser)]
    image: Option<PathBuf>,
    #[arg(long)]
    title: Option<String>,
    /// 0 silent, 1 lifecycle events, 2 repaint detail.
    #[arg(long, short = 'v')]
    verbosity: Option<u8>,
    #[arg(long)]
    show_grid: bool,
}

fn main() -> Result<()> {
    let arguments = Arguments::parse();
    let mut config = match &arguments.config {
        Some(path) => WindowConfig::load_json(path)
            .with_context(|| format!("load window config {}", path.display()))?,
        None => WindowConfig::default(),
    };
    if let Some(rows) = arguments.rows {
        config.rows = rows;
    }
    if let Some(cols) = arguments.cols {
        config.cols = cols;
    }
    if let Some(title) = arguments.title {
        config.title = title;
    }
    if let Some(verbosity) = arguments.verbosity {
        config.verbosity = verbosity;
    }
    config.show_grid |= arguments.show_grid;
    config.validate().context("validate window config")?;

    init_logging(config.verbosity);

    let image_path = arguments.image;
    let show_grid = config.show_grid;
    let reason = tilegrid::run(config, move |window| {
        if let Err(error) = play(&window, image_path, show_grid) {
            log::error!("{error:#}");
        }
    })
    .context("run tile window")?;
    log::info!("window closed: {reason}");
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn play(window: &TileWindow, image_path: Option<PathBuf>, mut show_grid: bool) -> Result<()> {
    let tile = match image_path {
        Some(path) => window
            .load_image(&path)
            .with_context(|| format!("load image {}", path.display()))?,
        None => {
            let arrow = ImagePyramidTile::from_image(arrow_image(ARROW_SIZE), PyramidConfig::default())
                .context("build arrow tile")?;
            window.register_tile(Arc::new(arrow))
        }
    };

    let (rows, cols) = window.dimensions();
    let (mut row, mut col) = (rows / 2, cols / 2);
    let mut rotation = 0.0;
    window.set_tile(row, col, tile, rotation)?;

    loop {
        let symbol = match window.next_input() {
            Ok(symbol) => symbol,
            Err(TileGridError::Input(InputError::Interrupted)) => return Ok(()),
            Err(error) => return Err(error.into()),
        };
        let (next_row, next_col) = match symbol.to_ascii_lowercase() {
            'w' => ((row + rows - 1) % rows, col),
            's' => ((row + 1) % rows, col),
            'a' => (row, (col + cols - 1) % cols),
            'd' => (row, (col + 1) % cols),
            'r' => {
                rotation = (rotation + 90.0) % 360.0;
                (row, col)
            }
            'g' => {
                show_grid = !show_grid;
                window.set_show_grid(show_grid);
                continue;
            }
            'q' | '\u{1b}' => return Ok(()),
            _ => continue,
        };
        if (next_row, next_col) != (row, col) {
            window.clear_tile(row, col)?;
            (row, col) = (next_row, next_col);
        }
        window.set_tile(row, col, tile, rotation)?;
        window.set_status(&format!("({row}, {col}) {rotation}°"));
    }
}

/// Upward-pointing arrow on a transparent square.
fn arrow_image(size: u32) -> RgbaImage {
    let fill = Rgba([200, 40, 40, 255]);
    let center = f64::from(size) / 2.0;
    let head_height = f64::from(size) * 0.45;
    let shaft_half_width = f64::from(size) * 0.12;
    RgbaImage::from_fn(size, size, |x, y| {
        let x = f64::from(x) + 0.5;
        let y = f64::from(y) + 0.5;
        let in_head = y < head_height && (x - center).abs() <= y * center / head_height;
        let in_shaft = y >= head_height && (x - center).abs() <= shaft_half_width;
        if in_head || in_shaft {
            fill
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

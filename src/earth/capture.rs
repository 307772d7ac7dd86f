/// Himawari full-disk capture
///
/// Downloads the 4x4 tile grid of the most recent published slot, stitches
/// it into one image and writes the bordered copy the resolver looks for.
///
/// Output layout inside the image directory:
/// - `tiles/tile_{x}_{y}.png` raw tiles as downloaded
/// - `earth_YYYYMMDD_HHMM.png` stitched image
/// - `earth_YYYYMMDD_HHMM_black.png` stitched image with a black border

use chrono::{DateTime, Duration, Timelike, Utc};
use image::{imageops, Rgba, RgbaImage};
use log::{debug, info};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Tiles per side
pub const GRID: u32 = 4;

/// Edge length of one tile in pixels
pub const TILE_SIZE: u32 = 550;

/// Images appear upstream with roughly this delay
const PUBLISH_DELAY_MINUTES: i64 = 30;

/// Slots are published every ten minutes
const SLOT_MINUTES: u32 = 10;

const TILE_BASE_URL: &str = "https://himawari.asia/img/D531106";

/// The tile server rejects requests without a browser-like agent
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("failed to create directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to download tile {url}")]
    Download {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("failed to save tile {}", .path.display())]
    SaveTile {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to decode tile {x},{y}")]
    Decode {
        x: u32,
        y: u32,
        #[source]
        source: Arc<image::ImageError>,
    },

    #[error("failed to write image {}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: Arc<image::ImageError>,
    },

    #[error("image processing task failed: {0}")]
    Join(String),
}

/// Paths written by a successful capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutput {
    pub tiles_dir: PathBuf,
    pub merged_image: PathBuf,
    pub black_image: PathBuf,
}

/// Newest slot expected to be online at `now`:
/// thirty minutes back, floored to ten minutes.
pub fn capture_slot(now: DateTime<Utc>) -> DateTime<Utc> {
    let t = now - Duration::minutes(PUBLISH_DELAY_MINUTES);
    let minute = t.minute() / SLOT_MINUTES * SLOT_MINUTES;
    t.with_minute(minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// URL of tile column `x`, row `y` for `slot`
pub fn tile_url(slot: DateTime<Utc>, x: u32, y: u32) -> String {
    format!(
        "{}/{}d/{}/{}_{}_{}.png",
        TILE_BASE_URL,
        GRID,
        TILE_SIZE,
        slot.format("%Y/%m/%d/%H%M%S"),
        x,
        y
    )
}

pub fn merged_file_name(slot: DateTime<Utc>) -> String {
    slot.format("earth_%Y%m%d_%H%M.png").to_string()
}

/// Name of the bordered image; the form the resolver selects
pub fn black_file_name(slot: DateTime<Utc>) -> String {
    slot.format("earth_%Y%m%d_%H%M_black.png").to_string()
}

/// Border width added on each side: a tenth of the image width, rounded
pub fn border_width(width: u32) -> u32 {
    (width as f32 / 10.0).round() as u32
}

/// Paste downloaded tiles into one square image.
/// Tile `(x, y)` lands at `(x * TILE_SIZE, y * TILE_SIZE)`.
pub fn stitch(tiles: &[(u32, u32, RgbaImage)]) -> RgbaImage {
    let size = GRID * TILE_SIZE;
    let mut earth = RgbaImage::new(size, size);
    for (x, y, tile) in tiles {
        imageops::replace(&mut earth, tile, (x * TILE_SIZE) as i64, (y * TILE_SIZE) as i64);
    }
    earth
}

/// Center `img` on an opaque black canvas with a `border_width` margin
pub fn add_black_border(img: &RgbaImage) -> RgbaImage {
    let border = border_width(img.width());
    let mut canvas = RgbaImage::from_pixel(
        img.width() + border * 2,
        img.height() + border * 2,
        Rgba([0, 0, 0, 255]),
    );
    imageops::replace(&mut canvas, img, border as i64, border as i64);
    canvas
}

/// Download, stitch and border the slot current at `now` into `dir`.
pub async fn capture_latest(
    client: &reqwest::Client,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<CaptureOutput, CaptureError> {
    let slot = capture_slot(now);
    let tiles_dir = dir.join("tiles");
    tokio::fs::create_dir_all(&tiles_dir)
        .await
        .map_err(|e| CaptureError::CreateDir { path: tiles_dir.clone(), source: Arc::new(e) })?;

    info!("Capturing slot {} into {}", slot.format("%Y-%m-%d %H:%M UTC"), dir.display());

    let mut raw_tiles = Vec::with_capacity((GRID * GRID) as usize);
    for x in 0..GRID {
        for y in 0..GRID {
            let url = tile_url(slot, x, y);
            debug!("Downloading tile: {}", url);
            let bytes = fetch_tile(client, &url).await?;

            let tile_path = tiles_dir.join(format!("tile_{}_{}.png", x, y));
            tokio::fs::write(&tile_path, &bytes)
                .await
                .map_err(|e| CaptureError::SaveTile { path: tile_path, source: Arc::new(e) })?;

            raw_tiles.push((x, y, bytes));
        }
    }

    let output = CaptureOutput {
        tiles_dir,
        merged_image: dir.join(merged_file_name(slot)),
        black_image: dir.join(black_file_name(slot)),
    };

    // Decoding and PNG encoding are CPU-bound
    let paths = output.clone();
    tokio::task::spawn_blocking(move || compose_and_save(&raw_tiles, &paths))
        .await
        .map_err(|e| CaptureError::Join(e.to_string()))??;

    info!("Bordered earth image saved: {}", output.black_image.display());
    Ok(output)
}

async fn fetch_tile(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, CaptureError> {
    let download_error = |e: reqwest::Error| CaptureError::Download { url: url.to_string(), source: Arc::new(e) };

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(download_error)?;

    let bytes = response.bytes().await.map_err(download_error)?;
    Ok(bytes.to_vec())
}

fn compose_and_save(raw_tiles: &[(u32, u32, Vec<u8>)], output: &CaptureOutput) -> Result<(), CaptureError> {
    let tiles = raw_tiles
        .iter()
        .map(|(x, y, bytes)| {
            image::load_from_memory(bytes)
                .map(|img| (*x, *y, img.to_rgba8()))
                .map_err(|e| CaptureError::Decode { x: *x, y: *y, source: Arc::new(e) })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let earth = stitch(&tiles);
    earth.save(&output.merged_image).map_err(|e| CaptureError::Encode {
        path: output.merged_image.clone(),
        source: Arc::new(e),
    })?;

    // Not matched by the image pattern until renamed
    let partial = output.black_image.with_extension("png.part");
    add_black_border(&earth)
        .save_with_format(&partial, image::ImageFormat::Png)
        .map_err(|e| CaptureError::Encode { path: partial.clone(), source: Arc::new(e) })?;
    std::fs::rename(&partial, &output.black_image).map_err(|e| CaptureError::Encode {
        path: output.black_image.clone(),
        source: Arc::new(image::ImageError::IoError(e)),
    })?;

    Ok(())
}

/// Desktop wallpaper from the latest earth image
///
/// The bordered capture is cropped per monitor to that monitor's aspect
/// ratio and handed to the desktop environment. Which side of the black
/// border gets trimmed follows the time of day over Japan, so the lit half
/// of the disk stays in frame.

use chrono::{DateTime, Duration, Timelike, Utc};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use log::info;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Japan Standard Time offset from UTC
const JST_OFFSET_HOURS: i64 = 9;

#[derive(Debug, Clone, Error)]
pub enum WallpaperError {
    #[error("wallpaper path must be absolute: {}", .0.display())]
    RelativePath(PathBuf),

    #[error("unsupported platform {0}")]
    UnsupportedPlatform(String),

    #[error("unsupported Linux desktop environment {0}")]
    UnsupportedDesktop(String),

    #[error("could not detect the Linux desktop environment")]
    NoDesktop,

    #[error("failed to create directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to open image {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Arc<image::ImageError>,
    },

    #[error("failed to save wallpaper {}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: Arc<image::ImageError>,
    },

    #[error("failed to run {program}")]
    Spawn {
        program: &'static str,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("wallpaper task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone, Error)]
#[error("invalid screen size {0:?}, expected WIDTHxHEIGHT")]
pub struct ParseScreenSizeError(String);

/// Physical pixel size of one monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }
}

impl FromStr for ScreenSize {
    type Err = ParseScreenSizeError;

    /// Parses `1920x1080`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseScreenSizeError(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(err)?;
        let width: u32 = w.trim().parse().map_err(|_| err())?;
        let height: u32 = h.trim().parse().map_err(|_| err())?;
        if width == 0 || height == 0 {
            return Err(err());
        }
        Ok(ScreenSize { width, height })
    }
}

pub fn japan_hour(now: DateTime<Utc>) -> u32 {
    (now + Duration::hours(JST_OFFSET_HOURS)).hour()
}

/// Trim one side's black border and pad the other, keeping the size.
///
/// Before 06:00 JST the disk moves left, from 15:00 it moves right.
pub fn shift_border(img: DynamicImage, japan_hour: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let border = (width as f32 / 12.0).round() as u32 * 2;
    if width <= border {
        return img;
    }

    let (crop_x, paste_x) = if japan_hour < 6 {
        (border, 0)
    } else if japan_hour >= 15 {
        (0, border)
    } else {
        return img;
    };

    let cropped = img.crop_imm(crop_x, 0, width - border, height);
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    imageops::replace(&mut canvas, &cropped, paste_x as i64, 0);
    DynamicImage::ImageRgba8(canvas)
}

/// Crop `img` to the aspect ratio of `screen`.
///
/// Landscape screens get the border shift first. The kept region starts at
/// the top-left, except on portrait screens before 06:00 JST where the
/// bottom-right is kept.
pub fn crop_for_screen(img: DynamicImage, screen: ScreenSize, japan_hour: u32) -> DynamicImage {
    let landscape = screen.is_landscape();
    let img = if landscape { shift_border(img, japan_hour) } else { img };

    let (width, height) = (img.width(), img.height());
    let keep_start = landscape || japan_hour >= 6;
    let screen_ratio = screen.ratio();

    if screen_ratio > width as f64 / height as f64 {
        let crop_height = ((width as f64 / screen_ratio).round() as u32).min(height);
        let y = if keep_start { 0 } else { height - crop_height };
        img.crop_imm(0, y, width, crop_height)
    } else {
        let crop_width = ((height as f64 * screen_ratio).round() as u32).min(width);
        let x = if keep_start { 0 } else { width - crop_width };
        img.crop_imm(x, 0, crop_width, height)
    }
}

/// `<base>/monitor_<i>/wallpaper_<w>x<h>.png`
pub fn monitor_wallpaper_path(base_dir: &Path, monitor_index: usize, screen: ScreenSize) -> PathBuf {
    base_dir
        .join(format!("monitor_{}", monitor_index))
        .join(format!("wallpaper_{}x{}.png", screen.width, screen.height))
}

/// Crop `image_path` for one monitor and save it. Blocking.
pub fn crop_for_monitor(
    image_path: &Path,
    base_dir: &Path,
    monitor_index: usize,
    screen: ScreenSize,
    japan_hour: u32,
) -> Result<PathBuf, WallpaperError> {
    let out = monitor_wallpaper_path(base_dir, monitor_index, screen);
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).map_err(|e| WallpaperError::CreateDir {
            path: parent.to_path_buf(),
            source: Arc::new(e),
        })?;
    }

    let img = image::open(image_path).map_err(|e| WallpaperError::Open {
        path: image_path.to_path_buf(),
        source: Arc::new(e),
    })?;

    crop_for_screen(img, screen, japan_hour)
        .save(&out)
        .map_err(|e| WallpaperError::Save { path: out.clone(), source: Arc::new(e) })?;

    info!("Cropped wallpaper for monitor {} saved: {}", monitor_index, out.display());
    Ok(out)
}

/// Where the wallpaper gets applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desktop {
    Windows,
    MacOs,
    Gnome,
    Kde,
}

impl Desktop {
    pub fn detect() -> Result<Self, WallpaperError> {
        let xdg = std::env::var("XDG_CURRENT_DESKTOP").ok();
        Self::from_parts(std::env::consts::OS, xdg.as_deref())
    }

    fn from_parts(os: &str, xdg_current_desktop: Option<&str>) -> Result<Self, WallpaperError> {
        match os {
            "windows" => Ok(Desktop::Windows),
            "macos" => Ok(Desktop::MacOs),
            "linux" => match xdg_current_desktop {
                Some(d) if d.contains("GNOME") => Ok(Desktop::Gnome),
                Some(d) if d.contains("KDE") => Ok(Desktop::Kde),
                Some(d) => Err(WallpaperError::UnsupportedDesktop(d.to_string())),
                None => Err(WallpaperError::NoDesktop),
            },
            other => Err(WallpaperError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// A program invocation that sets the wallpaper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

pub fn wallpaper_command(
    desktop: Desktop,
    image_path: &Path,
    monitor_index: usize,
) -> Result<WallpaperCommand, WallpaperError> {
    if !image_path.is_absolute() {
        return Err(WallpaperError::RelativePath(image_path.to_path_buf()));
    }
    let path = image_path.to_string_lossy();

    let command = match desktop {
        Desktop::Windows => WallpaperCommand {
            program: "powershell",
            args: vec![
                "-Command".to_string(),
                format!(
                    "Add-Type -TypeDefinition 'using System; using System.Runtime.InteropServices; \
                     public class Wallpaper {{ [DllImport(\"user32.dll\", CharSet=CharSet.Auto)] \
                     public static extern int SystemParametersInfo(int uAction, int uParam, String lpvParam, int fuWinIni); }}'; \
                     [Wallpaper]::SystemParametersInfo(20, 0, '{}', 3)",
                    path.replace('\'', "''")
                ),
            ],
        },
        Desktop::MacOs => WallpaperCommand {
            program: "osascript",
            args: vec![
                "-e".to_string(),
                format!(
                    "tell application \"System Events\" to set picture of desktop {} to \"{}\"",
                    monitor_index + 1,
                    path.replace('"', "\\\"")
                ),
            ],
        },
        Desktop::Gnome => WallpaperCommand {
            program: "gsettings",
            args: vec![
                "set".to_string(),
                "org.gnome.desktop.background".to_string(),
                "picture-uri".to_string(),
                format!("file://{}", path),
            ],
        },
        Desktop::Kde => WallpaperCommand {
            program: "dbus-send",
            args: vec![
                "--session".to_string(),
                "--dest=org.kde.plasmashell".to_string(),
                "--type=method_call".to_string(),
                "/PlasmaShell".to_string(),
                "org.kde.PlasmaShell.evaluateScript".to_string(),
                format!(
                    "string:var d = desktops()[{}]; \
                     d.wallpaperPlugin = \"org.kde.image\"; \
                     d.currentConfigGroup = Array(\"Wallpaper\", \"org.kde.image\", \"General\"); \
                     d.writeConfig(\"Image\", \"file://{}\")",
                    monitor_index, path
                ),
            ],
        },
    };

    Ok(command)
}

/// Apply `image_path` as wallpaper of monitor `monitor_index`.
/// The helper program is spawned, not awaited.
pub fn set_wallpaper(desktop: Desktop, image_path: &Path, monitor_index: usize) -> Result<(), WallpaperError> {
    let command = wallpaper_command(desktop, image_path, monitor_index)?;
    Command::new(command.program)
        .args(&command.args)
        .spawn()
        .map_err(|e| WallpaperError::Spawn { program: command.program, source: Arc::new(e) })?;

    info!("Wallpaper set on monitor {} via {:?}: {}", monitor_index, desktop, image_path.display());
    Ok(())
}

/// Crop the image for every screen and set each result as that
/// monitor's wallpaper. Returns the cropped files in monitor order.
pub async fn crop_and_set_wallpaper(
    image_path: PathBuf,
    screens: Vec<ScreenSize>,
    base_dir: PathBuf,
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>, WallpaperError> {
    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, WallpaperError> {
        let desktop = Desktop::detect()?;
        let hour = japan_hour(now);

        screens
            .iter()
            .enumerate()
            .map(|(index, screen)| -> Result<PathBuf, WallpaperError> {
                let cropped = crop_for_monitor(&image_path, &base_dir, index, *screen, hour)?;
                set_wallpaper(desktop, &cropped, index)?;
                Ok(cropped)
            })
            .collect()
    })
    .await
    .map_err(|e| WallpaperError::Join(e.to_string()))?
}

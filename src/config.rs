/// Startup configuration
///
/// Resolves where captured earth images live, which monitors wallpapers
/// are cropped for and which version string the UI shows.

use std::path::PathBuf;
use thiserror::Error;

use crate::earth::wallpaper::{ParseScreenSizeError, ScreenSize};

/// Environment variable overriding the image directory
pub const IMAGE_DIR_ENV: &str = "IMMEDIATE_EARTH_IMAGE_DIR";

/// Environment variable listing monitor sizes, e.g. `2560x1440,1080x1920`
pub const SCREENS_ENV: &str = "IMMEDIATE_EARTH_SCREENS";

/// Used when no monitor sizes are configured
const DEFAULT_SCREEN: ScreenSize = ScreenSize { width: 1920, height: 1080 };

/// Folder under the user's local data directory
const APP_DIR_NAME: &str = "immediate-earth";

/// Folder the capture step writes merged images into
const IMAGE_DIR_NAME: &str = "immediate_earth";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the local data directory; set {}", IMAGE_DIR_ENV)]
    NoDataDir,

    #[error("invalid {}", SCREENS_ENV)]
    InvalidScreens(#[source] ParseScreenSizeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory scanned for `earth_*_black.png` files
    pub image_dir: PathBuf,
    /// One entry per monitor, in monitor order
    pub screens: Vec<ScreenSize>,
    pub version: String,
    pub debug: bool,
}

impl AppConfig {
    /// Build the configuration from the environment and platform directories.
    pub fn load() -> Result<Self, ConfigError> {
        let image_dir = image_dir_from(std::env::var_os(IMAGE_DIR_ENV), dirs::data_local_dir())?;
        let screens = screens_from(std::env::var(SCREENS_ENV).ok().as_deref())?;

        Ok(AppConfig {
            image_dir,
            screens,
            version: version_string(env!("CARGO_PKG_VERSION"), cfg!(debug_assertions)),
            debug: cfg!(debug_assertions),
        })
    }
}

/// Pick the image directory: a non-empty override wins, otherwise
/// `<local data dir>/immediate-earth/immediate_earth`.
///
/// The result is used verbatim; nothing checks that it exists.
fn image_dir_from(
    override_dir: Option<std::ffi::OsString>,
    data_local_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let mut path = data_local_dir.ok_or(ConfigError::NoDataDir)?;
    path.push(APP_DIR_NAME);
    path.push(IMAGE_DIR_NAME);
    Ok(path)
}

/// Parse a comma-separated monitor list; unset or blank means one default screen.
fn screens_from(value: Option<&str>) -> Result<Vec<ScreenSize>, ConfigError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(vec![DEFAULT_SCREEN]),
        Some(list) => list
            .split(',')
            .map(|s| s.parse::<ScreenSize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConfigError::InvalidScreens),
    }
}

fn version_string(version: &str, debug: bool) -> String {
    if debug {
        format!("{}-dev", version)
    } else {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let dir = image_dir_from(Some("/srv/earth".into()), Some(PathBuf::from("/home/u/.local/share")))
            .unwrap();
        assert_eq!(dir, PathBuf::from("/srv/earth"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let dir = image_dir_from(Some("".into()), Some(PathBuf::from("/data"))).unwrap();
        assert_eq!(dir, PathBuf::from("/data").join("immediate-earth").join("immediate_earth"));
    }

    #[test]
    fn test_no_data_dir() {
        let result = image_dir_from(None, None);
        assert!(matches!(result, Err(ConfigError::NoDataDir)));
    }

    #[test]
    fn test_screens_default() {
        assert_eq!(screens_from(None).unwrap(), vec![DEFAULT_SCREEN]);
        assert_eq!(screens_from(Some("  ")).unwrap(), vec![DEFAULT_SCREEN]);
    }

    #[test]
    fn test_screens_list() {
        let screens = screens_from(Some("2560x1440, 1080x1920")).unwrap();
        assert_eq!(
            screens,
            vec![
                ScreenSize { width: 2560, height: 1440 },
                ScreenSize { width: 1080, height: 1920 },
            ]
        );
    }

    #[test]
    fn test_screens_invalid() {
        assert!(matches!(screens_from(Some("2560x1440,big")), Err(ConfigError::InvalidScreens(_))));
    }

    #[test]
    fn test_version_string() {
        assert_eq!(version_string("1.2.3", true), "1.2.3-dev");
        assert_eq!(version_string("1.2.3", false), "1.2.3");
    }
}

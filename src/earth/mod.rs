/// Earth image discovery module
///
/// This module handles:
/// - Recognising captured image filenames and their UTC capture time
/// - Listing and reading the image directory
/// - Encoding image bytes for display
/// - Resolving the newest capture into a displayable image
/// - Downloading and stitching new captures (capture.rs)
/// - Cropping captures into per-monitor wallpapers (wallpaper.rs)

pub mod capture;
pub mod encode;
pub mod pattern;
pub mod resolver;
pub mod source;
pub mod wallpaper;

pub use resolver::{resolve_latest, ResolveError};
pub use source::TokioFs;

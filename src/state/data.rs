/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the resolver and the UI layer.

use std::path::PathBuf;

/// One entry of the image directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Filename only (e.g., "earth_20240713_1230_black.png")
    pub name: String,
    /// False for directories and other non-regular entries
    pub is_file: bool,
}

/// The latest earth image, ready for display.
///
/// All three fields describe the same file. They are only ever
/// replaced together, never field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// `data:image/png;base64,...`
    pub encoded_data: String,
    /// Full path to the PNG on disk
    pub absolute_path: PathBuf,
    /// Capture time converted to the host time zone
    pub local_timestamp: String,
}

/// Screens the user can navigate between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Main,
    Details,
}

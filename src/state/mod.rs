/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The in-memory store with image publication and navigation (store.rs)

pub mod data;
pub mod store;

pub use data::{ImageEntry, ResolvedImage, View};
pub use store::{AppState, ResolutionTicket};

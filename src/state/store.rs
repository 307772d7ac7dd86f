use super::data::{ResolvedImage, View};
use crate::config::AppConfig;

/// Identifies one in-flight resolution.
///
/// Tickets are handed out in increasing order; only the newest one may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolutionTicket(u64);

/// The application store.
///
/// Owned by the application root and passed by reference to whoever
/// reads or publishes. Lives only in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct AppState {
    /// Version string shown in the details view
    pub version: String,
    /// Debug build flag
    pub debug: bool,
    /// Set once by `init`
    initialized: bool,
    /// Screen currently shown
    current_view: View,
    /// Most recently published image, if any
    preview: Option<ResolvedImage>,
    /// Last ticket handed out by `begin_resolution`
    latest_ticket: u64,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        AppState {
            version: config.version.clone(),
            debug: config.debug,
            ..Default::default()
        }
    }

    /// Mark the application as initialized.
    /// Returns false if it already was.
    pub fn init(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.initialized = true;
        true
    }

    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    pub fn current_view(&self) -> View {
        self.current_view
    }

    /// Allocate a ticket for a new resolution, superseding all earlier ones.
    pub fn begin_resolution(&mut self) -> ResolutionTicket {
        self.latest_ticket += 1;
        ResolutionTicket(self.latest_ticket)
    }

    /// Store `image` if `ticket` is still the newest resolution.
    ///
    /// Results of superseded resolutions are dropped and `false` is returned,
    /// so a slow stale read can never overwrite a newer image.
    pub fn publish(&mut self, ticket: ResolutionTicket, image: ResolvedImage) -> bool {
        if ticket.0 != self.latest_ticket {
            return false;
        }
        self.preview = Some(image);
        true
    }

    /// Whether `ticket` belongs to the newest resolution
    pub fn is_current(&self, ticket: ResolutionTicket) -> bool {
        ticket.0 == self.latest_ticket
    }

    pub fn preview(&self) -> Option<&ResolvedImage> {
        self.preview.as_ref()
    }
}

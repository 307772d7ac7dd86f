use chrono::Utc;
use iced::task::Handle as TaskHandle;
use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, text, Column, Image};
use iced::{Alignment, Element, Length, Task, Theme};
use log::{debug, error, info, warn};
use std::error::Error;
use std::path::PathBuf;

mod config;
mod earth;
mod state;

use config::AppConfig;
use earth::capture::{capture_latest, CaptureError, CaptureOutput};
use earth::encode::from_data_uri;
use earth::wallpaper::{crop_and_set_wallpaper, ScreenSize, WallpaperError};
use earth::{resolve_latest, ResolveError, TokioFs};
use state::{AppState, ResolutionTicket, ResolvedImage, View};

/// Main application state
struct ImmediateEarth {
    /// The in-memory store
    state: AppState,
    /// Directory scanned for captured images
    image_dir: PathBuf,
    /// Monitor sizes wallpapers are cropped for
    screens: Vec<ScreenSize>,
    /// Shared HTTP client for tile downloads
    client: reqwest::Client,
    /// Decoded form of the published preview, built once per publication
    preview_handle: Option<Handle>,
    /// Abort handle of the resolution in flight
    resolution: Option<TaskHandle>,
    capturing: bool,
    /// Outcome of the last capture or wallpaper action
    status: Option<String>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User asked for a fresh scan of the image directory
    Refresh,
    /// Background resolution finished
    ImageResolved(ResolutionTicket, Result<ResolvedImage, ResolveError>),
    /// Navigate between screens
    ShowView(View),
    /// Download and stitch the newest published capture
    Capture,
    CaptureFinished(Result<CaptureOutput, CaptureError>),
    /// Crop the shown image for each monitor and apply it
    SetWallpaper,
    WallpaperSet(Result<Vec<PathBuf>, WallpaperError>),
}

impl ImmediateEarth {
    /// Create the application and kick off the first resolution
    fn new(config: AppConfig) -> (Self, Task<Message>) {
        let mut state = AppState::new(&config);
        if state.init() {
            info!(
                "Immediate Earth {} initialized, images in {}",
                state.version,
                config.image_dir.display()
            );
        }

        let mut app = ImmediateEarth {
            state,
            image_dir: config.image_dir,
            screens: config.screens,
            client: reqwest::Client::new(),
            preview_handle: None,
            resolution: None,
            capturing: false,
            status: None,
        };
        let task = app.start_resolution();

        (app, task)
    }

    /// Launch an async resolution. Any resolution still in flight is
    /// superseded and aborted.
    fn start_resolution(&mut self) -> Task<Message> {
        let ticket = self.state.begin_resolution();
        let dir = self.image_dir.clone();
        debug!("Starting resolution {:?} in {}", ticket, dir.display());

        let (task, handle) = Task::perform(
            async move { resolve_latest(&TokioFs, &dir).await },
            move |result| Message::ImageResolved(ticket, result),
        )
        .abortable();
        self.replace_resolution(handle);

        task
    }

    /// Track `handle` as the resolution in flight, aborting the previous one.
    /// Returns the aborted handle, if any.
    fn replace_resolution(&mut self, handle: TaskHandle) -> Option<TaskHandle> {
        let previous = self.resolution.replace(handle)?;
        if !previous.is_aborted() {
            debug!("Aborting superseded resolution");
            previous.abort();
        }
        Some(previous)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Refresh => self.start_resolution(),
            Message::ImageResolved(ticket, result) => {
                if !self.state.is_current(ticket) {
                    debug!("Discarding superseded resolution {:?}", ticket);
                    return Task::none();
                }
                self.resolution = None;

                match result {
                    Ok(image) => self.publish(ticket, image),
                    Err(e) if e.is_soft() => info!("{}", e),
                    Err(e) => log_failure("Failed to find latest image", &e),
                }

                Task::none()
            }
            Message::ShowView(view) => {
                self.state.set_view(view);
                Task::none()
            }
            Message::Capture => {
                if self.capturing {
                    return Task::none();
                }
                self.capturing = true;
                self.status = Some("Downloading latest capture...".to_string());

                let client = self.client.clone();
                let dir = self.image_dir.clone();
                Task::perform(
                    async move { capture_latest(&client, &dir, Utc::now()).await },
                    Message::CaptureFinished,
                )
            }
            Message::CaptureFinished(result) => {
                self.capturing = false;
                match result {
                    Ok(output) => {
                        self.status = Some(format!("Captured {}", output.black_image.display()));
                        self.start_resolution()
                    }
                    Err(e) => {
                        log_failure("Capture failed", &e);
                        self.status = Some(format!("Capture failed: {}", e));
                        Task::none()
                    }
                }
            }
            Message::SetWallpaper => {
                let Some(image_path) = self.state.preview().map(|p| p.absolute_path.clone()) else {
                    warn!("No image to set as wallpaper");
                    self.status = Some("No image to set as wallpaper".to_string());
                    return Task::none();
                };

                Task::perform(
                    crop_and_set_wallpaper(
                        image_path,
                        self.screens.clone(),
                        self.image_dir.clone(),
                        Utc::now(),
                    ),
                    Message::WallpaperSet,
                )
            }
            Message::WallpaperSet(result) => {
                self.status = Some(match result {
                    Ok(paths) => format!("Wallpaper set on {} monitor(s)", paths.len()),
                    Err(e) => {
                        log_failure("Setting wallpaper failed", &e);
                        format!("Setting wallpaper failed: {}", e)
                    }
                });
                Task::none()
            }
        }
    }

    fn publish(&mut self, ticket: ResolutionTicket, image: ResolvedImage) {
        let Some(bytes) = from_data_uri(&image.encoded_data) else {
            error!("Refusing to publish undecodable preview for {}", image.absolute_path.display());
            return;
        };

        info!(
            "Showing {} (captured {})",
            image.absolute_path.display(),
            image.local_timestamp
        );
        if self.state.publish(ticket, image) {
            self.preview_handle = Some(Handle::from_bytes(bytes));
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let content = match self.state.current_view() {
            View::Main => self.main_view(),
            View::Details => self.details_view(),
        };

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn main_view(&self) -> Column<Message> {
        let mut content = Column::new()
            .spacing(20)
            .padding(40)
            .align_x(Alignment::Center);

        match (&self.preview_handle, self.state.preview()) {
            (Some(handle), Some(preview)) => {
                content = content
                    .push(Image::<Handle>::new(handle.clone()).height(Length::Fill))
                    .push(text(format!("Captured {}", preview.local_timestamp)).size(16));
            }
            _ => {
                content = content.push(text("No earth image yet").size(16));
            }
        }

        if let Some(status) = &self.status {
            content = content.push(text(status.clone()).size(14));
        }

        let capture_label = if self.capturing { "Capturing..." } else { "Capture" };

        content.push(
            row![
                button("Refresh").on_press(Message::Refresh).padding(10),
                button(capture_label)
                    .on_press_maybe((!self.capturing).then_some(Message::Capture))
                    .padding(10),
                button("Set wallpaper")
                    .on_press_maybe(self.state.preview().map(|_| Message::SetWallpaper))
                    .padding(10),
                button("Details")
                    .on_press(Message::ShowView(View::Details))
                    .padding(10),
            ]
            .spacing(10),
        )
    }

    fn details_view(&self) -> Column<Message> {
        let version = if self.state.debug {
            format!("Version {} (debug build)", self.state.version)
        } else {
            format!("Version {}", self.state.version)
        };

        let (path, captured) = match self.state.preview() {
            Some(preview) => (
                preview.absolute_path.display().to_string(),
                preview.local_timestamp.clone(),
            ),
            None => ("-".to_string(), "-".to_string()),
        };

        let screens = self
            .screens
            .iter()
            .map(|s| format!("{}x{}", s.width, s.height))
            .collect::<Vec<_>>()
            .join(", ");

        column![
            text("Immediate Earth").size(32),
            text(version).size(16),
            text(format!("Image directory: {}", self.image_dir.display())).size(14),
            text(format!("Latest image: {}", path)).size(14),
            text(format!("Captured: {}", captured)).size(14),
            text(format!("Screens: {}", screens)).size(14),
            button("Back")
                .on_press(Message::ShowView(View::Main))
                .padding(10),
        ]
        .spacing(12)
        .padding(40)
        .align_x(Alignment::Center)
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Log a hard failure with its underlying cause.
/// The previous preview stays on screen.
fn log_failure(context: &str, err: &dyn Error) {
    match err.source() {
        Some(cause) => error!("{}: {}: {}", context, err, cause),
        None => error!("{}: {}", context, err),
    }
}

fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log_failure("Invalid configuration", &e);
            std::process::exit(1);
        }
    };

    iced::application("Immediate Earth", ImmediateEarth::update, ImmediateEarth::view)
        .theme(ImmediateEarth::theme)
        .centered()
        .run_with(move || ImmediateEarth::new(config))
}

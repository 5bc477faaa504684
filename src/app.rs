//! egui front end. Owns the coordinator and all widget state; everything here
//! runs on the UI thread.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use eframe::{egui, App, Frame};
use egui::{Color32, ColorImage, RichText, TextureHandle, TextureOptions};
use rfd::FileDialog;
use tokio::{
    runtime::Handle,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};
use tracing::{info, warn};

use crate::{
    config::Config,
    coordinator::{Coordinator, UiUpdate},
    downloader::YtDlp,
    error::AppError,
    model::{Job, LearningLevel, MediaMode, OperationKind, SearchQuery},
    search::YouTubeApi,
    selection::ResultsTable,
    thumbnail::{default_thumbnail_url, fetch_thumbnail},
    utils::format_view_count,
};

const LANGUAGES: [(&str, &str); 8] = [
    ("en", "English"),
    ("ja", "Japanese"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("pt", "Portuguese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
];

const READY: &str = "Ready";
// Oldest lines are dropped past this
const MAX_LOG_LINES: usize = 1000;
const THUMB_SIZE: egui::Vec2 = egui::vec2(96.0, 54.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Download,
    Search,
}

/// Application state for the GUI
pub struct TubeApp {
    /// Runtime handle for blocking thumbnail fetches
    runtime: Handle,
    /// Owns the background workers and their message channel
    coordinator: Coordinator,
    config: Config,
    /// Where settings are saved; `None` if the platform has no config dir
    config_path: Option<PathBuf>,
    tab: Tab,

    /// Input field for a single video URL
    url_input: String,
    /// Input field for a playlist URL
    playlist_input: String,
    /// Audio (mp3) or video (mp4), shared by both tabs
    mode: MediaMode,
    /// Destination folder as typed or picked
    download_folder: String,
    /// Download progress, `0.0..=1.0`
    progress: f32,
    /// Last status line per operation kind
    statuses: [String; 3],
    /// Shared log pane, newest last
    log: Vec<String>,

    api_key_input: String,
    keywords: String,
    language: String,
    level: LearningLevel,
    filter: String,
    results: ResultsTable,

    /// Cached textures for result thumbnails, keyed by video id
    thumbnails: HashMap<String, TextureHandle>,
    /// Ids whose thumbnail was requested for the current results
    requested_thumbnails: HashSet<String>,
    /// Incoming thumbnail fetch results (video id, image)
    thumb_tx: UnboundedSender<(String, ColorImage)>,
    thumb_rx: UnboundedReceiver<(String, ColorImage)>,

    /// Modal warning text, shown until dismissed
    warning: Option<String>,
    show_api_key_notice: bool,
    /// Quit requested while work was running
    confirm_quit: bool,
    /// Set once the user confirmed quitting
    allowed_to_close: bool,
}

impl TubeApp {
    pub fn new(config: Config, config_path: Option<PathBuf>, runtime: Handle) -> Self {
        if let Err(err) = std::fs::create_dir_all(&config.download_dir) {
            warn!(dir = %config.download_dir.display(), "cannot create download folder: {}", err);
        }

        let downloader = Arc::new(YtDlp::new(config.yt_dlp_path.clone()));
        let searcher = Arc::new(YouTubeApi::new(config.api_key().unwrap_or_default()));
        let coordinator = Coordinator::new(runtime.clone(), downloader, searcher);
        let (thumb_tx, thumb_rx) = unbounded_channel();

        Self {
            runtime,
            coordinator,
            config_path,
            tab: Tab::Download,
            url_input: String::new(),
            playlist_input: String::new(),
            mode: MediaMode::Audio,
            download_folder: config.download_dir.display().to_string(),
            progress: 0.0,
            statuses: std::array::from_fn(|_| READY.to_string()),
            log: Vec::new(),
            // Only the stored key is editable; an environment key stays out of the field.
            api_key_input: config.api_key.clone().unwrap_or_default(),
            keywords: String::new(),
            language: config.language.clone(),
            level: LearningLevel::Any,
            filter: String::new(),
            results: ResultsTable::default(),
            thumbnails: HashMap::new(),
            requested_thumbnails: HashSet::new(),
            thumb_tx,
            thumb_rx,
            warning: None,
            show_api_key_notice: config.api_key().is_none(),
            confirm_quit: false,
            allowed_to_close: false,
            config,
        }
    }

    fn download_dir(&self) -> PathBuf {
        PathBuf::from(self.download_folder.trim())
    }

    fn status(&self, kind: OperationKind) -> &str {
        &self.statuses[kind.index()]
    }

    fn apply(&mut self, update: UiUpdate, ctx: &egui::Context) {
        match update {
            UiUpdate::Progress { kind, percent } => {
                if kind == OperationKind::Download {
                    self.progress = (percent / 100.0).clamp(0.0, 1.0);
                }
            }
            UiUpdate::Status { kind, text } => self.statuses[kind.index()] = text,
            UiUpdate::Log { line, .. } => self.push_log(line),
            UiUpdate::SearchResults(results) => {
                // Keep only textures still shown; requests for old rows are forgotten.
                let ids: HashSet<String> = results.iter().map(|r| r.id.clone()).collect();
                self.thumbnails.retain(|id, _| ids.contains(id));
                self.requested_thumbnails.retain(|id| ids.contains(id));
                self.results.replace(results);
                self.request_thumbnails(ctx);
            }
            UiUpdate::Finished(kind) => {
                // Other kinds keep their last message ("Found 12 videos", errors) on screen.
                if kind == OperationKind::Download {
                    self.progress = 0.0;
                    self.statuses[kind.index()] = READY.to_string();
                }
            }
        }
    }

    fn request_thumbnails(&mut self, ctx: &egui::Context) {
        for row in self.results.rows() {
            let id = row.result.id.clone();
            if self.thumbnails.contains_key(&id) || !self.requested_thumbnails.insert(id.clone()) {
                continue;
            }
            let url = row
                .result
                .thumbnail_url
                .clone()
                .unwrap_or_else(|| default_thumbnail_url(&id));
            let tx = self.thumb_tx.clone();
            let ctx = ctx.clone();
            // Blocking HTTP + decode off the UI thread; wake the UI when done
            self.runtime.spawn_blocking(move || {
                if let Some(img) = fetch_thumbnail(&url) {
                    let _ = tx.send((id, img));
                    ctx.request_repaint();
                }
            });
        }
    }

    fn push_log(&mut self, line: String) {
        push_capped(&mut self.log, line, MAX_LOG_LINES);
    }

    fn report(&mut self, err: AppError) {
        let message = match err {
            AppError::NothingSelected => "Please select at least one video to download.".to_string(),
            other => capitalize(&other.to_string()),
        };
        self.warning = Some(message);
    }

    fn start_download(&mut self) {
        // Empty URL and busy errors come back as warnings
        let job = Job::single(self.url_input.trim(), self.mode, self.download_dir());
        match self.coordinator.start_job(job) {
            Ok(()) => self.progress = 0.0,
            Err(err) => self.report(err),
        }
    }

    fn start_extraction(&mut self) {
        let url = self.playlist_input.trim().to_string();
        if let Err(err) = self.coordinator.start_playlist_extraction(url, self.download_dir()) {
            self.report(err);
        }
    }

    fn start_search(&mut self) {
        let query = SearchQuery {
            keywords: self.keywords.clone(),
            language: self.language.clone(),
            level: self.level,
            max_results: self.config.max_results(),
        };
        if let Err(err) = self.coordinator.start_search(query) {
            self.report(err);
        }
    }

    fn download_selected(&mut self) {
        let started = self
            .results
            .batch_job(self.mode, self.download_dir())
            .and_then(|job| self.coordinator.start_job(job));
        match started {
            Ok(()) => {
                self.progress = 0.0;
                self.tab = Tab::Download;
            }
            Err(err) => self.report(err),
        }
    }

    fn cancel(&mut self, kind: OperationKind) {
        if self.coordinator.cancel(kind) {
            self.push_log(format!("{} canceled by user", capitalize(&kind.to_string())));
            self.statuses[kind.index()] = READY.to_string();
            if kind == OperationKind::Download {
                self.progress = 0.0;
            }
        }
    }

    fn save_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            self.warning = Some("No configuration directory on this system; settings are not saved.".into());
            return;
        };
        match self.config.save(&path) {
            Ok(()) => info!(path = %path.display(), "config saved"),
            Err(err) => self.report(err),
        }
    }

    fn save_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        // Later searches pick up the new key; a search already running keeps the old one
        self.config.api_key = (!key.is_empty()).then(|| key.clone());
        self.coordinator.set_searcher(Arc::new(YouTubeApi::new(key)));
        self.save_config();
        self.push_log("API key saved".to_string());
    }

    fn browse_folder(&mut self) {
        if let Some(folder) = FileDialog::new().set_directory(&self.download_folder).pick_folder() {
            self.download_folder = folder.display().to_string();
            self.config.download_dir = folder;
            self.save_config();
        }
    }

    fn download_tab(&mut self, ui: &mut egui::Ui) {
        let downloading = self.coordinator.is_running(OperationKind::Download);
        let extracting = self.coordinator.is_running(OperationKind::Extract);

        // Single URL section
        ui.heading("Download");
        ui.label("Paste a video URL:");
        ui.add(
            egui::TextEdit::singleline(&mut self.url_input)
                .hint_text("https://www.youtube.com/watch?v=...")
                .desired_width(f32::INFINITY),
        );

        ui.horizontal(|ui| {
            ui.label("Format:");
            ui.radio_value(&mut self.mode, MediaMode::Audio, MediaMode::Audio.label());
            ui.radio_value(&mut self.mode, MediaMode::Video, MediaMode::Video.label());
        });

        ui.horizontal(|ui| {
            ui.label("Download folder:");
            ui.text_edit_singleline(&mut self.download_folder);
            if ui.button("Browse…").clicked() {
                self.browse_folder();
            }
            if ui.button("Open Folder").clicked() {
                open_folder(&self.download_dir());
            }
        });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui.add_enabled(!downloading, egui::Button::new("Download")).clicked() {
                self.start_download();
            }
            if ui.add_enabled(downloading, egui::Button::new("Cancel")).clicked() {
                self.cancel(OperationKind::Download);
            }
        });
        ui.add(egui::ProgressBar::new(self.progress).show_percentage());
        ui.label(self.status(OperationKind::Download));

        // Playlist section
        ui.separator();
        ui.label("Playlist URL (saves every video URL to a text file):");
        ui.add(
            egui::TextEdit::singleline(&mut self.playlist_input)
                .hint_text("https://www.youtube.com/playlist?list=...")
                .desired_width(f32::INFINITY),
        );
        ui.horizontal(|ui| {
            if ui.add_enabled(!extracting, egui::Button::new("Extract URLs")).clicked() {
                self.start_extraction();
            }
            if ui.add_enabled(extracting, egui::Button::new("Cancel")).clicked() {
                self.cancel(OperationKind::Extract);
            }
            if extracting {
                ui.spinner();
            }
        });
        ui.label(self.status(OperationKind::Extract));
    }

    fn search_tab(&mut self, ui: &mut egui::Ui) {
        let searching = self.coordinator.is_running(OperationKind::Search);
        let downloading = self.coordinator.is_running(OperationKind::Download);

        ui.heading("Search");
        ui.horizontal(|ui| {
            ui.label("API key:");
            ui.add(egui::TextEdit::singleline(&mut self.api_key_input).password(true));
            if ui.button("Save").clicked() {
                self.save_api_key();
            }
        });

        ui.horizontal(|ui| {
            ui.label("Keywords:");
            let response = ui.text_edit_singleline(&mut self.keywords);
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            egui::ComboBox::from_id_source("language")
                .selected_text(language_name(&self.language))
                .show_ui(ui, |ui| {
                    for (code, name) in LANGUAGES {
                        ui.selectable_value(&mut self.language, code.to_string(), name);
                    }
                });
            egui::ComboBox::from_id_source("level")
                .selected_text(self.level.label())
                .show_ui(ui, |ui| {
                    for level in LearningLevel::ALL {
                        ui.selectable_value(&mut self.level, level, level.label());
                    }
                });

            let clicked = ui.add_enabled(!searching, egui::Button::new("Search")).clicked();
            if (clicked || submitted) && !searching {
                self.start_search();
            }
            if ui.add_enabled(searching, egui::Button::new("Cancel")).clicked() {
                self.cancel(OperationKind::Search);
            }
            if searching {
                ui.spinner();
            }
        });
        ui.label(self.status(OperationKind::Search));

        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Filter:");
            ui.text_edit_singleline(&mut self.filter);
            if ui.button("Select All").clicked() {
                self.results.select_all();
            }
            if ui.button("Deselect All").clicked() {
                self.results.deselect_all();
            }
            ui.radio_value(&mut self.mode, MediaMode::Audio, "Audio");
            ui.radio_value(&mut self.mode, MediaMode::Video, "Video");
            if ui
                .add_enabled(!downloading, egui::Button::new("Download Selected"))
                .clicked()
            {
                self.download_selected();
            }
            ui.label(format!("{} of {} selected", self.results.selected_count(), self.results.len()));
        });

        self.results_grid(ui);
    }

    fn results_grid(&mut self, ui: &mut egui::Ui) {
        if self.results.is_empty() {
            ui.label("No results yet.");
            return;
        }
        let visible = self.results.visible_indices(&self.filter);
        let mut toggled = Vec::new();

        egui::ScrollArea::vertical()
            .id_source("results")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                egui::Grid::new("results_grid")
                    .striped(true)
                    .num_columns(7)
                    .show(ui, |ui| {
                        for header in ["", "", "Title", "Channel", "Published", "Length", "Views"] {
                            ui.label(RichText::new(header).strong());
                        }
                        ui.end_row();

                        // Toggles are applied after the grid so rows stay borrowed immutably
                        for index in visible {
                            let row = &self.results.rows()[index];
                            let mut selected = row.selected;
                            if ui.checkbox(&mut selected, "").changed() {
                                toggled.push(index);
                            }
                            match self.thumbnails.get(&row.result.id) {
                                Some(tex) => {
                                    ui.add(egui::Image::new(tex).fit_to_exact_size(THUMB_SIZE));
                                }
                                None => {
                                    ui.allocate_space(THUMB_SIZE);
                                }
                            }
                            ui.hyperlink_to(row.result.title.as_str(), &row.result.url);
                            ui.label(&row.result.channel);
                            ui.label(&row.result.published);
                            ui.label(&row.result.duration);
                            ui.label(format_view_count(row.result.view_count));
                            ui.end_row();
                        }
                    });
            });

        for index in toggled {
            self.results.toggle(index);
        }
    }

    fn log_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("Log").strong());
            if ui.small_button("Clear").clicked() {
                self.log.clear();
            }
        });
        egui::ScrollArea::vertical()
            .id_source("log")
            .stick_to_bottom(true)
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for line in &self.log {
                    ui.label(line);
                }
            });
    }

    fn dialogs(&mut self, ctx: &egui::Context) {
        if self.show_api_key_notice {
            egui::Window::new("API key needed")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label("Searching needs a YouTube Data API v3 key.");
                    ui.label("Enter it on the Search tab and press Save, or set YOUTUBE_API_KEY.");
                    ui.label("Downloading by URL works without a key.");
                    if ui.button("OK").clicked() {
                        self.show_api_key_notice = false;
                    }
                });
        }

        if let Some(message) = self.warning.clone() {
            egui::Window::new("Warning")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(Color32::YELLOW, message);
                    if ui.button("OK").clicked() {
                        self.warning = None;
                    }
                });
        }

        if self.confirm_quit {
            egui::Window::new("Quit")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label("Work is still running. Cancel it and quit?");
                    ui.horizontal(|ui| {
                        if ui.button("Quit").clicked() {
                            self.coordinator.cancel_all();
                            self.allowed_to_close = true;
                            self.confirm_quit = false;
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                        if ui.button("Keep running").clicked() {
                            self.confirm_quit = false;
                        }
                    });
                });
        }
    }
}

impl App for TubeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply everything the workers sent since the last frame
        for update in self.coordinator.poll() {
            self.apply(update, ctx);
        }
        // 2️⃣ Handle completed thumbnail fetches
        while let Ok((id, img)) = self.thumb_rx.try_recv() {
            // Fetches from a previous search may still land; drop those.
            if !self.requested_thumbnails.contains(&id) {
                continue;
            }
            let tex = ctx.load_texture(&id, img, TextureOptions::default());
            self.thumbnails.insert(id, tex);
        }

        // 3️⃣ Hold the window open and ask first if work is still running
        if ctx.input(|i| i.viewport().close_requested())
            && !self.allowed_to_close
            && self.coordinator.any_running()
        {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.confirm_quit = true;
        }

        // 4️⃣ Tab bar, log pane and the active tab
        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::Download, "Download");
                ui.selectable_value(&mut self.tab, Tab::Search, "Search");
            });
        });

        egui::TopBottomPanel::bottom("log_panel")
            .resizable(true)
            .default_height(160.0)
            .show(ctx, |ui| self.log_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Download => self.download_tab(ui),
            Tab::Search => self.search_tab(ui),
        });

        // 5️⃣ Modal windows on top
        self.dialogs(ctx);

        // Workers do not wake the UI; poll the channel a few times a second.
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

fn language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

fn push_capped(log: &mut Vec<String>, line: String, cap: usize) {
    log.push(line);
    if log.len() > cap {
        let excess = log.len() - cap;
        log.drain(..excess);
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Opens `folder` in the platform file manager.
fn open_folder(folder: &Path) {
    if let Err(err) = std::fs::create_dir_all(folder) {
        warn!(dir = %folder.display(), "cannot create folder: {}", err);
        return;
    }
    let folder = folder.to_path_buf();
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let program = "explorer";
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(all(unix, not(target_os = "macos")))]
        let program = "xdg-open";

        if let Err(err) = std::process::Command::new(program).arg(&folder).spawn() {
            warn!(dir = %folder.display(), "cannot open folder: {}", err);
        }
    });
}

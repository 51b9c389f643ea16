use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use gpui::*;
use gpui_component::{Theme, ThemeMode, ThemeRegistry};
use missive_client::ClientConfig;
use missive_storage::DEFAULT_ARCHIVE_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const SETTINGS_DIRECTORY_NAME: &str = "missive";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ARCHIVE_FILE_NAME: &str = "archive.sqlite3";
/// Environment overrides, e.g. `MISSIVE_ENDPOINT` or `MISSIVE_AUTH_TOKEN`.
pub const SETTINGS_ENV_PREFIX: &str = "MISSIVE_";

/// Where history pages come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    /// The history endpoint, optionally archiving every page it serves.
    #[default]
    Remote,
    /// The local archive only.
    Archive,
}

impl HistorySource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Remote => "Remote",
            Self::Archive => "Archive",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Remote => Self::Archive,
            Self::Archive => Self::Remote,
        }
    }
}

/// Built-in light or dark palette, used when `theme_name` names no registered theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    #[default]
    Light,
    Dark,
}

impl From<ThemePreference> for ThemeMode {
    fn from(preference: ThemePreference) -> Self {
        match preference {
            ThemePreference::Light => ThemeMode::Light,
            ThemePreference::Dark => ThemeMode::Dark,
        }
    }
}

/// Viewer configuration. Every field is optional in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub endpoint: String,
    pub auth_token: String,
    /// Account the viewer signs in as; its messages render as outgoing.
    pub current_uid: Option<u64>,
    pub request_timeout_secs: u64,
    pub source: HistorySource,
    pub archive_path: Option<PathBuf>,
    pub archive_page_size: u64,
    pub theme_mode: ThemePreference,
    pub theme_name: String,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth_token: String::new(),
            current_uid: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            source: HistorySource::default(),
            archive_path: None,
            archive_page_size: DEFAULT_ARCHIVE_PAGE_SIZE,
            theme_mode: ThemePreference::default(),
            theme_name: String::new(),
        }
    }
}

impl ViewerSettings {
    /// Trims text fields and replaces values the viewer cannot use with defaults.
    pub fn normalized(self) -> Self {
        let endpoint = self.endpoint.trim();
        Self {
            endpoint: if endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint.to_string()
            },
            auth_token: self.auth_token.trim().to_string(),
            request_timeout_secs: self.request_timeout_secs.max(1),
            archive_page_size: self.archive_page_size.max(1),
            archive_path: self
                .archive_path
                .filter(|path| !path.as_os_str().is_empty()),
            theme_name: self.theme_name.trim().to_string(),
            ..self
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.endpoint).with_timeout(self.request_timeout());
        if self.auth_token.is_empty() {
            config
        } else {
            config.with_auth_token(&self.auth_token)
        }
    }

    /// Archive file for archive-only browsing; falls back to the config directory.
    pub fn archive_location(&self) -> PathBuf {
        self.archive_path
            .clone()
            .unwrap_or_else(SettingsStore::default_archive_path)
    }

    pub fn apply_theme(&self, window: Option<&mut Window>, cx: &mut App) {
        let named = ThemeRegistry::global(cx)
            .themes()
            .get(&SharedString::from(self.theme_name.clone()))
            .cloned();

        let Some(config) = named else {
            Theme::change(ThemeMode::from(self.theme_mode), window, cx);
            return;
        };

        let mode = config.mode;
        let theme = Theme::global_mut(cx);
        if mode.is_dark() {
            theme.dark_theme = config;
        } else {
            theme.light_theme = config;
        }
        Theme::change(mode, window, cx);
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("settings i/o failed on `{stage}` at {path:?}: {source}"))]
    Io {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to encode settings on `{stage}`: {source}"))]
    Encode {
        stage: &'static str,
        source: serde_json::Error,
    },
}

/// Settings file plus the live snapshot read by the views.
pub struct SettingsStore {
    path: PathBuf,
    current: ArcSwap<ViewerSettings>,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_DIRECTORY_NAME)
    }

    pub fn default_archive_path() -> PathBuf {
        Self::default_config_dir().join(ARCHIVE_FILE_NAME)
    }

    pub fn new(path: PathBuf) -> Self {
        let settings = Self::read(&path);
        Self {
            path,
            current: ArcSwap::from_pointee(settings),
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Arc<ViewerSettings> {
        self.current.load_full()
    }

    /// Writes `settings` to disk, then publishes them.
    pub fn update(&self, settings: ViewerSettings) -> Result<Arc<ViewerSettings>, SettingsError> {
        let settings = Arc::new(settings.normalized());
        let encoded = serde_json::to_vec_pretty(settings.as_ref()).context(EncodeSnafu {
            stage: "encode-settings",
        })?;
        write_replacing(&self.path, &encoded)?;

        self.current.store(settings.clone());
        tracing::info!(path = %self.path.display(), "settings saved");
        Ok(settings)
    }

    /// Defaults, then the settings file, then `MISSIVE_*` environment variables.
    pub(crate) fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ViewerSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(SETTINGS_ENV_PREFIX))
    }

    fn read(path: &Path) -> ViewerSettings {
        match Self::figment(path).extract::<ViewerSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "unreadable settings, using defaults");
                ViewerSettings::default()
            }
        }
    }
}

/// Replaces `path` through a sibling temporary file so readers never see a partial write.
fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), SettingsError> {
    if let Some(directory) = path.parent() {
        std::fs::create_dir_all(directory).context(IoSnafu {
            stage: "create-settings-directory",
            path: directory.to_path_buf(),
        })?;
    }

    let staged = path.with_extension("json.tmp");
    std::fs::write(&staged, contents).context(IoSnafu {
        stage: "stage-settings-file",
        path: staged.clone(),
    })?;
    std::fs::rename(&staged, path).context(IoSnafu {
        stage: "swap-settings-file",
        path: path.to_path_buf(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChanged {
    pub settings: Arc<ViewerSettings>,
}

/// Entity wrapper that tells subscribers when the settings change.
pub struct SettingsState {
    store: SettingsStore,
}

impl EventEmitter<SettingsChanged> for SettingsState {}

impl SettingsState {
    pub fn new(cx: &mut App) -> Entity<Self> {
        cx.new(|_| Self {
            store: SettingsStore::load(),
        })
    }

    pub fn settings(&self) -> Arc<ViewerSettings> {
        self.store.settings()
    }

    pub fn update_settings(
        &mut self,
        settings: ViewerSettings,
        cx: &mut Context<Self>,
    ) -> Result<(), SettingsError> {
        let settings = self.store.update(settings)?;
        cx.emit(SettingsChanged { settings });
        cx.notify();
        Ok(())
    }

    /// Switches between the remote endpoint and the local archive.
    pub fn toggle_source(&mut self, cx: &mut Context<Self>) -> Result<(), SettingsError> {
        let current = self.settings();
        self.update_settings(
            ViewerSettings {
                source: current.source.toggled(),
                ..ViewerSettings::clone(&current)
            },
            cx,
        )
    }
}

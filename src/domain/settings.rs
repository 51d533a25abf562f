use crate::domain::models::{
    ByteOrder, CoordinateFrame, CoordinateFramePair, Transport, DEFAULT_SERVICE_UUID,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_true")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_true(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "pose_link".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Where and how frames are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    #[serde(default)]
    pub transport: Transport,
    /// `host:port` for TCP, socket name or path for local sockets
    #[serde(default = "default_peer_address")]
    pub peer_address: String,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: Uuid,
    #[serde(default = "default_false")]
    pub secure: bool,
    #[serde(default = "default_true")]
    pub insecure: bool,
    #[serde(default = "default_false")]
    pub discover_only: bool,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,
    #[serde(default)]
    pub byte_order: ByteOrder,

    // Peers the pairing gate approves; empty approves everyone
    #[serde(default)]
    pub known_peers: Vec<String>,

    #[serde(default = "default_false")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            peer_address: default_peer_address(),
            service_uuid: default_service_uuid(),
            secure: default_false(),
            insecure: default_true(),
            discover_only: default_false(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write_timeout_ms: None,
            byte_order: ByteOrder::default(),
            known_peers: Vec::new(),
            auto_reconnect: default_false(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

fn default_peer_address() -> String {
    "127.0.0.1:5555".to_string()
}
fn default_service_uuid() -> Uuid {
    DEFAULT_SERVICE_UUID
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_reconnect_interval_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSettings {
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,
    #[serde(default = "default_base_frame")]
    pub base_frame: CoordinateFrame,
    #[serde(default = "default_target_frame")]
    pub target_frame: CoordinateFrame,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            base_frame: default_base_frame(),
            target_frame: default_target_frame(),
        }
    }
}

impl TrackingSettings {
    pub fn frame_pair(&self) -> CoordinateFramePair {
        CoordinateFramePair::new(self.base_frame, self.target_frame)
    }
}

fn default_rate_hz() -> f64 {
    100.0
}
fn default_base_frame() -> CoordinateFrame {
    CoordinateFrame::StartOfService
}
fn default_target_frame() -> CoordinateFrame {
    CoordinateFrame::Device
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub link: LinkSettings,
    #[serde(default)]
    pub tracking: TrackingSettings,
    #[serde(default)]
    pub log_settings: LogSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load_from(settings_path))
    }

    /// Load from an explicit path. A missing or unreadable file yields defaults.
    pub fn load_from(settings_path: impl Into<PathBuf>) -> Self {
        let settings_path = settings_path.into();
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("PoseLink");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.settings_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn add_known_peer(&mut self, peer: &str) -> anyhow::Result<()> {
        if !self.settings.link.known_peers.iter().any(|p| p == peer) {
            self.settings.link.known_peers.push(peer.to_string());
            self.save()?;
        }
        Ok(())
    }
}

//! Configuration
//!
//! Loads the theme and behavior settings from a TOML file at
//! `~/.config/ashlar/config.toml`, auto-generating a default file on first
//! run. A reconfigure re-reads the same file; the session applies it at
//! the start of the next event-loop iteration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::wm::decorations::TextureKind;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub decor: DecorConfig,
    pub colors: ColorConfig,
    pub textures: TextureConfig,
    pub workspaces: WorkspaceConfig,
    pub toolbar: ToolbarConfig,
    pub behavior: BehaviorConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if the file doesn't
    /// exist yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("config file not found at {:?}, using defaults", config_path);
            if let Err(err) = Self::save_default(&config_path) {
                warn!("failed to create default config file: {err:#}");
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("failed to read config file")?;
        let config: Config = toml::from_str(&content).context("failed to parse config file")?;

        info!("configuration loaded from {:?}", config_path);
        debug!("config: {:?}", config);
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("failed to get config directory")?
            .join("ashlar");
        Ok(config_dir.join("config.toml"))
    }

    fn save_default(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let toml_string = toml::to_string_pretty(&Self::default())
            .context("failed to serialize default config")?;
        fs::write(path, toml_string).context("failed to write default config file")?;
        info!("created default config file at {:?}", path);
        Ok(())
    }
}

/// Decoration geometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorConfig {
    /// Title bar height in pixels.
    pub titlebar_height: u16,
    /// Resize handle height in pixels.
    pub handle_height: u16,
    /// Frame border width in pixels.
    pub border_width: u16,
    /// Inner padding around titlebar widgets.
    pub bevel_width: u16,
    /// Width of the resize grips at both handle ends.
    pub grip_width: u16,
}

impl DecorConfig {
    /// Buttons are square and fill the titlebar minus the bevel.
    pub fn button_size(&self) -> u16 {
        self.titlebar_height.saturating_sub(2 * self.bevel_width).max(1)
    }
}

impl Default for DecorConfig {
    fn default() -> Self {
        Self {
            titlebar_height: 22,
            handle_height: 6,
            border_width: 1,
            bevel_width: 3,
            grip_width: 28,
        }
    }
}

/// Decoration and widget colors, 0xRRGGBB.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub frame: u32,
    pub frame_border: u32,
    pub title_focused: u32,
    pub title_focused_to: u32,
    pub title_unfocused: u32,
    pub title_unfocused_to: u32,
    pub text_focused: u32,
    pub text_unfocused: u32,
    pub button: u32,
    pub handle: u32,
    pub grip: u32,
    pub toolbar: u32,
    pub menu: u32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            frame: 0x2e3440,
            frame_border: 0x4c566a,
            title_focused: 0x5e81ac,
            title_focused_to: 0x81a1c1,
            title_unfocused: 0x3b4252,
            title_unfocused_to: 0x434c5e,
            text_focused: 0xeceff4,
            text_unfocused: 0xd8dee9,
            button: 0x4c566a,
            handle: 0x3b4252,
            grip: 0x4c566a,
            toolbar: 0x2e3440,
            menu: 0x3b4252,
        }
    }
}

/// Texture descriptors handed to the rendering collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TextureConfig {
    pub title: TextureKind,
}

/// Workspace startup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// How many workspaces to create at startup (clamped to 1..=25).
    pub count: usize,
    /// Names for the first workspaces; the rest are numbered.
    pub names: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { count: 4, names: Vec::new() }
    }
}

/// Toolbar placement and clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbarConfig {
    /// "top" or "bottom".
    pub placement: String,
    /// strftime format for the clock.
    pub clock_format: String,
}

impl Default for ToolbarConfig {
    fn default() -> Self {
        Self {
            placement: "bottom".to_string(),
            clock_format: "%a %H:%M".to_string(),
        }
    }
}

/// Window behavior knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Give newly mapped windows focus.
    pub focus_new_windows: bool,
    /// Raise a window when it receives focus.
    pub raise_on_focus: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self { focus_new_windows: true, raise_on_focus: true }
    }
}

//! Game settings and options
//!
//! `Settings` is the persisted, user-facing configuration (JSON). It resolves
//! into the `GameOptions` a simulation is built from and the
//! `ControllerOptions` that pick controller capabilities.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH, GRAVITY_TABLE, VIRUS_COUNT_TABLE};

/// Base speed presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpeedPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl SpeedPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedPreset::Low => "Low",
            SpeedPreset::Medium => "Medium",
            SpeedPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" | "lo" => Some(SpeedPreset::Low),
            "medium" | "med" => Some(SpeedPreset::Medium),
            "high" | "hi" => Some(SpeedPreset::High),
            _ => None,
        }
    }

    /// Index into the gravity table before any acceleration
    pub fn base_speed(&self) -> u32 {
        match self {
            SpeedPreset::Low => 15,
            SpeedPreset::Medium => 25,
            SpeedPreset::High => 31,
        }
    }
}

/// Options a single game simulation is created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOptions {
    /// Playable columns
    pub width: usize,
    /// Playable rows (the hidden top row is added on top)
    pub height: usize,
    pub level: u32,
    pub base_speed: u32,
    pub seed: String,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
            level: 0,
            base_speed: SpeedPreset::Medium.base_speed(),
            seed: "mirror".to_string(),
        }
    }
}

/// Where a controller gets its frame targets from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TickSource {
    /// Frames follow a wall clock at a fixed rate
    #[default]
    WallClock,
    /// Frames are advanced by explicit `tick_to_frame` calls (e.g. a mirror
    /// of a remote player)
    External,
}

/// Capabilities of a game controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerOptions {
    pub game: GameOptions,
    /// Keep action/state history so late actions can be replayed in
    pub has_history: bool,
    pub tick_source: TickSource,
    /// Transport channel local actions are published on
    pub channel: Option<String>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            game: GameOptions::default(),
            has_history: true,
            tick_source: TickSource::WallClock,
            channel: None,
        }
    }
}

/// Persisted player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub speed: SpeedPreset,
    /// Starting virus level
    pub level: u32,
    pub grid_width: usize,
    pub grid_height: usize,
    /// Keep rollback history (needed for networked play)
    pub history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speed: SpeedPreset::Medium,
            level: 0,
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            history: true,
        }
    }
}

impl Settings {
    /// Clamp values into the ranges the simulation supports
    pub fn validate(&mut self) {
        self.level = self.level.min(VIRUS_COUNT_TABLE.len() as u32 - 1);
        self.grid_width = self.grid_width.max(2);
        self.grid_height = self.grid_height.max(2);
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.validate();
        Ok(settings)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(err) => log::warn!("Ignoring invalid settings {}: {err}", path.display()),
            },
            Err(err) => log::info!("No settings at {} ({err})", path.display()),
        }
        log::info!("Using default settings");
        Self::default()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        log::info!("Settings saved");
        Ok(())
    }

    /// Options for one game with the given seed
    pub fn game_options(&self, seed: &str) -> GameOptions {
        GameOptions {
            width: self.grid_width,
            height: self.grid_height,
            level: self.level,
            base_speed: self.speed.base_speed().min(GRAVITY_TABLE.len() as u32 - 1),
            seed: seed.to_string(),
        }
    }

    pub fn controller_options(&self, seed: &str, tick_source: TickSource) -> ControllerOptions {
        ControllerOptions {
            game: self.game_options(seed),
            has_history: self.history,
            tick_source,
            channel: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_from_str() {
        assert_eq!(SpeedPreset::from_str("HI"), Some(SpeedPreset::High));
        assert_eq!(SpeedPreset::from_str("med"), Some(SpeedPreset::Medium));
        assert_eq!(SpeedPreset::from_str("turbo"), None);
        assert_eq!(SpeedPreset::Low.as_str(), "Low");
    }

    #[test]
    fn test_settings_json_fills_defaults_and_clamps() {
        let settings = Settings::from_json(r#"{"speed":"High","level":99}"#).unwrap();
        assert_eq!(settings.speed, SpeedPreset::High);
        assert_eq!(settings.level, 20);
        assert_eq!(settings.grid_width, DEFAULT_GRID_WIDTH);
        assert!(settings.history);

        let round = Settings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(round, settings);
    }

    #[test]
    fn test_settings_game_options() {
        let settings = Settings {
            speed: SpeedPreset::Low,
            level: 3,
            ..Default::default()
        };
        let options = settings.game_options("abc");
        assert_eq!(options.base_speed, 15);
        assert_eq!(options.level, 3);
        assert_eq!(options.seed, "abc");
        assert_eq!(options.height, DEFAULT_GRID_HEIGHT);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/mirror-pills.json"));
        assert_eq!(settings, Settings::default());
    }
}

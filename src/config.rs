//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::idle::DEFAULT_IDLE_THRESHOLD_SECS;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "timekeeper")]
#[command(about = "A time-tracking daemon with idle-aware timer state and cross-window sync")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Minutes without input before the timer is paused
    #[arg(short = 't', long, default_value = "5")]
    pub idle_threshold: u64,

    /// Disable idle detection
    #[arg(long)]
    pub no_idle_detection: bool,

    /// Disable desktop notifications
    #[arg(long)]
    pub no_notifications: bool,

    /// Disable sound feedback
    #[arg(long)]
    pub no_sound: bool,

    /// Directory for the timer state and time entries
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Settings the timer reads at runtime
    pub fn settings(&self) -> Settings {
        Settings {
            enable_idle_detection: !self.no_idle_detection,
            idle_threshold_minutes: self.idle_threshold,
            enable_notifications: !self.no_notifications,
            enable_sound_feedback: !self.no_sound,
        }
    }

    /// Data directory, defaulting to the platform data dir
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("timekeeper")
        })
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir().join("timer_state.json")
    }

    pub fn entries_file(&self) -> PathBuf {
        self.data_dir().join("time_entries.jsonl")
    }
}

/// User settings consumed by the timer, idle detection and feedback hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub enable_idle_detection: bool,
    pub idle_threshold_minutes: u64,
    pub enable_notifications: bool,
    pub enable_sound_feedback: bool,
}

impl Settings {
    /// Idle threshold in seconds; zero minutes falls back to the default
    pub fn idle_threshold_secs(&self) -> u64 {
        match self.idle_threshold_minutes {
            0 => DEFAULT_IDLE_THRESHOLD_SECS,
            minutes => minutes.saturating_mul(60),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_idle_detection: true,
            idle_threshold_minutes: DEFAULT_IDLE_THRESHOLD_SECS / 60,
            enable_notifications: true,
            enable_sound_feedback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_command_line() {
        let config = Config::try_parse_from(["timekeeper"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.settings(), Settings::default());
        assert_eq!(config.settings().idle_threshold_secs(), 300);
    }

    #[test]
    fn flags_map_to_settings() {
        let config = Config::try_parse_from([
            "timekeeper",
            "-t",
            "12",
            "--no-idle-detection",
            "--no-sound",
            "--data-dir",
            "/tmp/tk",
        ])
        .unwrap();
        let settings = config.settings();
        assert!(!settings.enable_idle_detection);
        assert!(!settings.enable_sound_feedback);
        assert!(settings.enable_notifications);
        assert_eq!(settings.idle_threshold_secs(), 720);
        assert_eq!(config.state_file(), PathBuf::from("/tmp/tk/timer_state.json"));
    }

    #[test]
    fn zero_threshold_uses_default() {
        let settings = Settings {
            idle_threshold_minutes: 0,
            ..Settings::default()
        };
        assert_eq!(settings.idle_threshold_secs(), DEFAULT_IDLE_THRESHOLD_SECS);
    }

    #[test]
    fn huge_threshold_saturates() {
        let minutes = u64::MAX.to_string();
        let config = Config::try_parse_from(["timekeeper", "-t", minutes.as_str()]).unwrap();
        assert_eq!(config.settings().idle_threshold_secs(), u64::MAX);
    }
}

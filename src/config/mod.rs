use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::{self, Command, CommandTables, HandScope};
use crate::gesture::GestureLabel;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    /// Gesture session configuration.
    #[serde(default)]
    pub session: Session,
    /// Light host devices.
    pub hosts: HashMap<String, Host>,
    /// Map of light id -> Light info
    pub lights: HashMap<u8, Light>,
    /// Replaces the stock gesture command tables when present.
    #[serde(default)]
    pub commands: Option<Commands>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    /// Seconds a gesture must be held before it triggers.
    pub hold_duration: f64,
    /// UDP host address to accept hand frames on.
    pub udp_addr: String,
    /// Brightness change per step, in percent.
    pub brightness_step: u8,
    /// Color temperature change per step, in kelvin.
    pub color_temp_step: u16,
    /// Frames between progress log lines. 0 disables them.
    pub status_interval: u64,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            hold_duration: 2.0,
            udp_addr: "0.0.0.0:9910".to_owned(),
            brightness_step: 20,
            color_temp_step: 200,
            status_interval: 100,
        }
    }
}

impl Session {
    pub fn hold_duration(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f64(self.hold_duration) {
            Ok(duration) if duration > Duration::from_secs(0) => Ok(duration),
            _ => Err(ConfigError::InvalidHoldDuration(self.hold_duration)),
        }
    }
}

/// Host device configuration.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Host {
    Proxy {
        /// Target effect server UDP address.
        addr: String,
        /// Nick sent along with each update.
        nick: Option<String>,
    },
    /// Only logs what it would send.
    Log,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    /// Host device to use
    pub host: String,
    /// Human-readable name.
    pub name: Option<String>,
    /// Disabled lights are left alone by gesture actions.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Commands {
    pub generic: Vec<CommandEntry>,
    pub left: Vec<CommandEntry>,
    pub right: Vec<CommandEntry>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommandEntry {
    pub gesture: GestureLabel,
    pub action: String,
    pub description: Option<String>,
}

impl Commands {
    pub fn to_tables(&self) -> CommandTables {
        let mut tables = CommandTables::empty();
        let scoped = [
            (HandScope::Both, &self.generic),
            (HandScope::Left, &self.left),
            (HandScope::Right, &self.right),
        ];
        for (hand, entries) in scoped.iter() {
            for entry in entries.iter() {
                let description = entry
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{} - {}", entry.gesture, entry.action));
                tables.insert(
                    entry.gesture,
                    Command {
                        action: entry.action.clone(),
                        description,
                        hand: *hand,
                    },
                );
            }
        }
        tables
    }

    fn entries(&self) -> impl Iterator<Item = &CommandEntry> {
        self.generic.iter().chain(self.left.iter()).chain(self.right.iter())
    }
}

impl Root {
    /// Command tables from the file, or the stock set.
    pub fn command_tables(&self) -> CommandTables {
        match &self.commands {
            Some(commands) => commands.to_tables(),
            None => commands::default_tables(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hold duration must be a positive number of seconds, got {0}")]
    InvalidHoldDuration(f64),
    #[error("{0} must be greater than zero")]
    InvalidStep(&'static str),
    #[error("light {light} refers to invalid host: {host}")]
    UnknownHost { light: u8, host: String },
    #[error("action {0} cannot be bound to the none gesture")]
    NoneGesture(String),
}

pub fn read_config_yaml<T: AsRef<Path>>(path: T) -> Result<Root, ConfigError> {
    let file = fs::File::open(path)?;
    let root: Root = serde_yaml::from_reader(io::BufReader::new(file))?;
    validate(&root)?;
    Ok(root)
}

pub fn read_config_json<T: AsRef<Path>>(path: T) -> Result<Root, ConfigError> {
    let file = fs::File::open(path)?;
    let root: Root = serde_json::from_reader(io::BufReader::new(file))?;
    validate(&root)?;
    Ok(root)
}

/// Read a config, picking the format from the file extension.
pub fn read_config<T: AsRef<Path>>(path: T) -> Result<Root, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => read_config_json(path),
        _ => read_config_yaml(path),
    }
}

/// Quick sanity check for the configuration.
pub fn validate(root: &Root) -> Result<(), ConfigError> {
    let session = &root.session;
    session.hold_duration()?;
    if session.brightness_step == 0 {
        return Err(ConfigError::InvalidStep("brightnessStep"));
    }
    if session.color_temp_step == 0 {
        return Err(ConfigError::InvalidStep("colorTempStep"));
    }

    // Lights should refer to a valid host.
    for (id, light) in &root.lights {
        if !root.hosts.contains_key(&light.host) {
            return Err(ConfigError::UnknownHost {
                light: *id,
                host: light.host.clone(),
            });
        }
    }

    if let Some(commands) = &root.commands {
        if let Some(entry) = commands.entries().find(|entry| entry.gesture.is_none()) {
            return Err(ConfigError::NoneGesture(entry.action.clone()));
        }
    }

    Ok(())
}

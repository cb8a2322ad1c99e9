//! The Mapper keeps per-light state and turns light actions into host commands.

use std::collections::BTreeMap;
use std::io;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::LightAction;
use crate::config::{self, Root};
use crate::host::{self, LightCommand, LightHost};

pub const MIN_BRIGHTNESS: u8 = 1;
pub const MAX_BRIGHTNESS: u8 = 100;
pub const MIN_COLOR_TEMP: u16 = 1700;
pub const MAX_COLOR_TEMP: u16 = 6500;
/// Used in place of a color temperature outside the supported range.
pub const FALLBACK_COLOR_TEMP: u16 = 3000;
pub const WARM_COLOR_TEMP: u16 = 2700;
pub const COOL_COLOR_TEMP: u16 = 6500;

/// White points at the ends of the color temperature range.
const WARM_RGB: [f32; 3] = [255.0, 138.0, 18.0];
const COOL_RGB: [f32; 3] = [255.0, 249.0, 253.0];

/// Last known state of a tunable white light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub power: bool,
    /// Percent, 1..=100.
    pub brightness: u8,
    /// Kelvin, 1700..=6500.
    pub color_temp: u16,
}

impl Default for LightState {
    fn default() -> Self {
        LightState {
            power: false,
            brightness: MAX_BRIGHTNESS,
            color_temp: FALLBACK_COLOR_TEMP,
        }
    }
}

impl LightState {
    /// RGB the host should show for this state.
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        if !self.power {
            return (0, 0, 0);
        }
        let ct = clamp_color_temp(self.color_temp as i32);
        let t = (ct - MIN_COLOR_TEMP) as f32 / (MAX_COLOR_TEMP - MIN_COLOR_TEMP) as f32;
        let level = self.brightness as f32 / MAX_BRIGHTNESS as f32;
        let channel = |i: usize| {
            let white = WARM_RGB[i] + (COOL_RGB[i] - WARM_RGB[i]) * t;
            (white * level).round().max(0.0).min(255.0) as u8
        };
        (channel(0), channel(1), channel(2))
    }

    fn adjust_brightness(&mut self, delta: i32) {
        self.brightness = clamp_brightness(self.brightness as i32 + delta);
    }

    fn adjust_color_temp(&mut self, delta: i32) {
        if self.color_temp < MIN_COLOR_TEMP || self.color_temp > MAX_COLOR_TEMP {
            warn!(
                "Color temperature {}K out of range, using {}K",
                self.color_temp, FALLBACK_COLOR_TEMP
            );
            self.color_temp = FALLBACK_COLOR_TEMP;
        }
        self.color_temp = clamp_color_temp(self.color_temp as i32 + delta);
    }
}

fn clamp_brightness(value: i32) -> u8 {
    value.max(MIN_BRIGHTNESS as i32).min(MAX_BRIGHTNESS as i32) as u8
}

fn clamp_color_temp(value: i32) -> u16 {
    value.max(MIN_COLOR_TEMP as i32).min(MAX_COLOR_TEMP as i32) as u16
}

#[derive(Debug)]
struct Light {
    /// Name to use for this light.
    name: String,
    /// Index of the host this light is connected to.
    host_index: usize,
    state: LightState,
}

/// Step sizes for the relative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steps {
    pub brightness: u8,
    pub color_temp: u16,
}

impl Default for Steps {
    fn default() -> Self {
        Steps {
            brightness: 20,
            color_temp: 200,
        }
    }
}

/// Result type for various Mapper actions.
pub type MapperResult<T> = Result<T, MapperError>;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("unknown host: {0}")]
    UnknownHost(String),
    #[error("host i/o failed: {0}")]
    IoError(#[from] io::Error),
}

/// Mappers apply light actions and issue the resulting state to host devices.
pub struct Mapper {
    /// Configured lights, by logical id.
    lights: BTreeMap<u8, Light>,
    /// Configured light hosts.
    hosts: Vec<Box<dyn LightHost>>,
    host_names: Vec<String>,
    steps: Steps,
}

impl Mapper {
    pub fn new(steps: Steps) -> Mapper {
        Mapper {
            lights: BTreeMap::new(),
            hosts: vec![],
            host_names: vec![],
            steps,
        }
    }

    /// Try to set up a mapper and its host devices from a configuration.
    pub fn from_config(config: &Root) -> MapperResult<Mapper> {
        let mut mapper = Mapper::new(Steps {
            brightness: config.session.brightness_step,
            color_temp: config.session.color_temp_step,
        });

        // Sorted so host indices don't depend on map iteration order.
        let mut host_ids: Vec<&String> = config.hosts.keys().collect();
        host_ids.sort();
        for id in host_ids {
            let host: Box<dyn LightHost> = match &config.hosts[id] {
                config::Host::Proxy { addr, nick } => {
                    Box::new(host::UdpProxy::new(addr, nick.as_deref())?)
                }
                config::Host::Log => Box::new(host::LogHost::new(id)),
            };
            mapper.add_host(id, host);
        }

        for (id, light) in &config.lights {
            if !light.enabled {
                debug!("Light {} is disabled, skipping", id);
                continue;
            }
            mapper.add_light(*id, light.name.as_deref(), &light.host)?;
        }

        info!(
            "Mapper ready with {} light(s) on {} host(s)",
            mapper.lights.len(),
            mapper.hosts.len()
        );
        Ok(mapper)
    }

    pub fn add_host(&mut self, name: &str, host: Box<dyn LightHost>) {
        self.host_names.push(name.to_owned());
        self.hosts.push(host);
    }

    pub fn add_light(&mut self, id: u8, name: Option<&str>, host: &str) -> MapperResult<()> {
        let host_index = self
            .host_names
            .iter()
            .position(|known| known == host)
            .ok_or_else(|| MapperError::UnknownHost(host.to_owned()))?;
        self.lights.insert(
            id,
            Light {
                name: name
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("{}-{}", host, id)),
                host_index,
                state: LightState::default(),
            },
        );
        Ok(())
    }

    pub fn state(&self, id: u8) -> Option<&LightState> {
        self.lights.get(&id).map(|light| &light.state)
    }

    /// Apply an action to the lights it targets and push their new state to
    /// the hosts.
    pub fn apply(&mut self, action: LightAction) -> MapperResult<()> {
        let steps = self.steps;
        let targets: Vec<u8> = match action {
            // Only the first light by id.
            LightAction::ToggleDevice => self.lights.keys().take(1).copied().collect(),
            _ => self.lights.keys().copied().collect(),
        };
        if targets.is_empty() {
            warn!("No lights configured for {}", action);
            return Ok(());
        }

        let mut touched = vec![false; self.hosts.len()];

        for id in targets {
            let light = match self.lights.get_mut(&id) {
                Some(light) => light,
                None => continue,
            };
            let state = &mut light.state;

            match action {
                LightAction::CloseAll => state.power = false,
                LightAction::OpenAll => state.power = true,
                LightAction::ToggleDevice => state.power = !state.power,
                LightAction::IncreaseBrightness => state.adjust_brightness(steps.brightness as i32),
                LightAction::DecreaseBrightness => state.adjust_brightness(-(steps.brightness as i32)),
                LightAction::MaxBrightness => state.brightness = MAX_BRIGHTNESS,
                LightAction::MinBrightness => state.brightness = MIN_BRIGHTNESS,
                LightAction::IncreaseColorTemp => state.adjust_color_temp(steps.color_temp as i32),
                LightAction::DecreaseColorTemp => state.adjust_color_temp(-(steps.color_temp as i32)),
                LightAction::SetWarmColorTemp => state.color_temp = WARM_COLOR_TEMP,
                LightAction::SetCoolColorTemp => state.color_temp = COOL_COLOR_TEMP,
            }

            info!(
                "{}: power={} brightness={}% color_temp={}K",
                light.name, state.power, state.brightness, state.color_temp
            );

            let (red, green, blue) = state.to_rgb();
            self.hosts[light.host_index].take_command(&LightCommand::Rgb { id, red, green, blue });
            touched[light.host_index] = true;
        }

        // Flush every touched host even if one of them fails.
        let mut result = Ok(());
        for (host, _) in self.hosts.iter_mut().zip(touched).filter(|(_, used)| *used) {
            if let Err(err) = host.flush() {
                warn!("Host flush failed: {}", err);
                if result.is_ok() {
                    result = Err(err.into());
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records flushed commands for inspection.
    #[derive(Clone, Default)]
    struct Recorder {
        flushed: Arc<Mutex<Vec<LightCommand>>>,
        pending: Vec<LightCommand>,
    }

    impl LightHost for Recorder {
        fn take_command(&mut self, cmd: &LightCommand) {
            self.pending.push(*cmd);
        }
        fn flush(&mut self) -> io::Result<()> {
            self.flushed.lock().extend(self.pending.drain(..));
            Ok(())
        }
    }

    fn mapper(ids: &[u8]) -> (Mapper, Arc<Mutex<Vec<LightCommand>>>) {
        let recorder = Recorder::default();
        let flushed = recorder.flushed.clone();
        let mut mapper = Mapper::new(Steps::default());
        mapper.add_host("rec", Box::new(recorder));
        for id in ids {
            mapper.add_light(*id, None, "rec").unwrap();
        }
        (mapper, flushed)
    }

    #[test]
    fn open_and_close_all() {
        let (mut mapper, flushed) = mapper(&[1, 2]);
        mapper.apply(LightAction::OpenAll).unwrap();
        assert!(mapper.state(1).unwrap().power && mapper.state(2).unwrap().power);

        mapper.apply(LightAction::CloseAll).unwrap();
        assert!(!mapper.state(1).unwrap().power);

        let flushed = flushed.lock();
        assert_eq!(flushed.len(), 4);
        assert_eq!(flushed[3], LightCommand::Rgb { id: 2, red: 0, green: 0, blue: 0 });
    }

    #[test]
    fn toggle_hits_only_the_first_light() {
        let (mut mapper, _) = mapper(&[7, 3]);
        mapper.apply(LightAction::ToggleDevice).unwrap();
        assert!(mapper.state(3).unwrap().power);
        assert!(!mapper.state(7).unwrap().power);
        mapper.apply(LightAction::ToggleDevice).unwrap();
        assert!(!mapper.state(3).unwrap().power);
    }

    #[test]
    fn brightness_is_clamped() {
        let (mut mapper, _) = mapper(&[0]);
        mapper.apply(LightAction::MaxBrightness).unwrap();
        mapper.apply(LightAction::IncreaseBrightness).unwrap();
        assert_eq!(mapper.state(0).unwrap().brightness, 100);

        for _ in 0..10 {
            mapper.apply(LightAction::DecreaseBrightness).unwrap();
        }
        assert_eq!(mapper.state(0).unwrap().brightness, 1);

        mapper.apply(LightAction::IncreaseBrightness).unwrap();
        assert_eq!(mapper.state(0).unwrap().brightness, 21);
        mapper.apply(LightAction::MinBrightness).unwrap();
        assert_eq!(mapper.state(0).unwrap().brightness, 1);
        // Brightness alone does not switch the light on.
        assert!(!mapper.state(0).unwrap().power);
    }

    #[test]
    fn color_temperature_steps_and_presets() {
        let (mut mapper, _) = mapper(&[0]);
        mapper.apply(LightAction::IncreaseColorTemp).unwrap();
        assert_eq!(mapper.state(0).unwrap().color_temp, 3200);

        mapper.apply(LightAction::SetCoolColorTemp).unwrap();
        mapper.apply(LightAction::IncreaseColorTemp).unwrap();
        assert_eq!(mapper.state(0).unwrap().color_temp, 6500);

        mapper.apply(LightAction::SetWarmColorTemp).unwrap();
        for _ in 0..10 {
            mapper.apply(LightAction::DecreaseColorTemp).unwrap();
        }
        assert_eq!(mapper.state(0).unwrap().color_temp, 1700);
    }

    #[test]
    fn out_of_range_color_temp_falls_back() {
        let mut state = LightState {
            color_temp: 65535,
            ..LightState::default()
        };
        state.adjust_color_temp(-200);
        assert_eq!(state.color_temp, 2800);
    }

    #[test]
    fn rgb_follows_power_brightness_and_temperature() {
        let mut state = LightState {
            power: true,
            brightness: 100,
            color_temp: MAX_COLOR_TEMP,
        };
        assert_eq!(state.to_rgb(), (255, 249, 253));
        state.color_temp = MIN_COLOR_TEMP;
        assert_eq!(state.to_rgb(), (255, 138, 18));
        state.brightness = 50;
        assert_eq!(state.to_rgb(), (128, 69, 9));
        state.power = false;
        assert_eq!(state.to_rgb(), (0, 0, 0));
    }

    #[test]
    fn disabled_lights_are_left_out() {
        let root: Root = serde_yaml::from_str(
            "hosts:\n  dry:\n    type: log\nlights:\n  0:\n    host: dry\n  1:\n    host: dry\n    enabled: false\n",
        )
        .unwrap();
        let mut mapper = Mapper::from_config(&root).unwrap();
        mapper.apply(LightAction::OpenAll).unwrap();

        assert!(mapper.state(0).unwrap().power);
        assert!(mapper.state(1).is_none());
    }

    #[test]
    fn unknown_host_is_rejected() {
        let (mut mapper, _) = mapper(&[]);
        assert!(matches!(
            mapper.add_light(1, None, "garage"),
            Err(MapperError::UnknownHost(_))
        ));
        // No lights: actions are a no-op.
        mapper.apply(LightAction::OpenAll).unwrap();
    }
}

//! # Output Plugins
//!
//! Observers of the event stream. Every dispatched event is passed to each plugin in
//! priority order; ticker plugins additionally sample the state whenever the ticker system
//! fires. Plugins are looked up by name in a static table and configured with a
//! `Name:key=value,...` string.

pub mod event_trace;
pub mod kenergy;
pub mod misc;
pub mod vel_dist;

use super::config::ConfigError;
use super::error::EngineError;
use super::event::{Event, EventData};
use super::state::SimState;
use phf::{Map, phf_map};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PluginKind {
    Misc,
    KEnergy,
    VelDist,
    EventTrace,
}

static PLUGINS: Map<&'static str, PluginKind> = phf_map! {
    "Misc" => PluginKind::Misc,
    "KEnergy" => PluginKind::KEnergy,
    "VelDist" => PluginKind::VelDist,
    "EventTrace" => PluginKind::EventTrace,
};

pub trait OutputPlugin: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Plugins with a higher priority see each event first.
    fn priority(&self) -> i32 {
        0
    }

    fn initialise(&mut self, state: &SimState) -> Result<(), EngineError>;

    fn event_update(&mut self, event: &Event, data: &EventData, state: &SimState);

    fn is_ticker(&self) -> bool {
        false
    }

    fn ticker(&mut self, _state: &SimState) {}

    /// One-line status for periodic progress output.
    fn periodic_output(&self, _state: &SimState) -> Option<String> {
        None
    }

    /// Results gathered so far, in file units.
    fn output(&self, state: &SimState) -> toml::Table;

    /// Writes any files the plugin was asked to produce.
    fn finalise(&mut self, _state: &SimState) -> Result<(), EngineError> {
        Ok(())
    }

    /// Exchanges whatever accumulated data belongs to the ensemble rather than the
    /// configuration. `other` is the matching plugin of the other replica.
    fn replica_exchange(&mut self, _other: &mut dyn OutputPlugin) {}

    /// All kinetic energies were multiplied by `factor`.
    fn temperature_rescale(&mut self, _factor: f64) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A parsed `Name:key=value,...` plugin specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    pub name: String,
    pub options: BTreeMap<String, String>,
}

impl PluginSpec {
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let (name, rest) = spec.split_once(':').unwrap_or((spec, ""));
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::UnknownPlugin(spec.to_string()));
        }
        let mut options = BTreeMap::new();
        for pair in rest.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                field: format!("plugin {name}"),
                message: format!("option '{pair}' is not key=value"),
            })?;
            options.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self {
            name: name.to_string(),
            options,
        })
    }

    pub fn option<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.options
            .get(key)
            .map(|raw| {
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    field: format!("{}.{key}", self.name),
                    message: format!("cannot parse '{raw}'"),
                })
            })
            .transpose()
    }
}

/// Builds a plugin from its specification string.
pub fn create(spec: &str) -> Result<Box<dyn OutputPlugin>, ConfigError> {
    let spec = PluginSpec::parse(spec)?;
    let kind = PLUGINS
        .get(spec.name.as_str())
        .ok_or_else(|| ConfigError::UnknownPlugin(spec.name.clone()))?;
    Ok(match kind {
        PluginKind::Misc => Box::new(misc::Misc::new()),
        PluginKind::KEnergy => Box::new(kenergy::KEnergy::new()),
        PluginKind::VelDist => Box::new(vel_dist::VelDist::from_spec(&spec)?),
        PluginKind::EventTrace => Box::new(event_trace::EventTrace::from_spec(&spec)?),
    })
}

/// Orders plugins by descending priority, keeping configuration order among equals.
pub fn sort_by_priority(plugins: &mut [Box<dyn OutputPlugin>]) {
    plugins.sort_by_key(|plugin| std::cmp::Reverse(plugin.priority()));
}

pub fn available() -> impl Iterator<Item = &'static str> {
    PLUGINS.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_parsing_splits_options() {
        let spec = PluginSpec::parse("VelDist: binwidth=0.05 ,foo=bar").unwrap();
        assert_eq!(spec.name, "VelDist");
        assert_eq!(spec.option::<f64>("binwidth").unwrap(), Some(0.05));
        assert_eq!(spec.option::<String>("foo").unwrap().as_deref(), Some("bar"));
        assert_eq!(spec.option::<f64>("missing").unwrap(), None);
        assert!(spec.option::<f64>("foo").is_err());
        assert!(PluginSpec::parse("Misc:oops").is_err());
    }

    #[test]
    fn unknown_plugins_are_configuration_errors() {
        assert_eq!(
            create("Nonsense").unwrap_err(),
            ConfigError::UnknownPlugin("Nonsense".to_string())
        );
    }

    #[test]
    fn sorting_is_stable_and_by_descending_priority() {
        let mut plugins: Vec<Box<dyn OutputPlugin>> = ["EventTrace", "VelDist", "KEnergy", "Misc"]
            .into_iter()
            .map(|name| create(name).unwrap())
            .collect();
        sort_by_priority(&mut plugins);
        let names: Vec<_> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Misc", "KEnergy", "VelDist", "EventTrace"]);
        assert_eq!(available().count(), 4);
    }
}

use super::{OutputPlugin, PluginSpec};
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData};
use crate::engine::state::SimState;
use std::any::Any;
use std::collections::BTreeMap;
use toml::Table;

const DEFAULT_BIN_WIDTH: f64 = 0.01;

/// Histogram of velocity components, one per species and dimension, sampled on every tick.
/// Components are measured in units of `sqrt(kT / m)` so every species collapses onto a unit
/// normal distribution at equilibrium.
#[derive(Debug, Clone)]
pub struct VelDist {
    bin_width: f64,
    histograms: Vec<[BTreeMap<i64, u64>; 3]>,
    samples: u64,
}

impl VelDist {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self, ConfigError> {
        let bin_width = spec.option::<f64>("binwidth")?.unwrap_or(DEFAULT_BIN_WIDTH);
        if !(bin_width > 0.0 && bin_width.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "VelDist.binwidth".to_string(),
                message: format!("bin width must be positive, got {bin_width}"),
            });
        }
        Ok(Self {
            bin_width,
            histograms: Vec::new(),
            samples: 0,
        })
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Total count in every histogram of `species`, one per dimension.
    pub fn counts(&self, species: usize) -> [u64; 3] {
        let mut counts = [0; 3];
        if let Some(histograms) = self.histograms.get(species) {
            for (count, histogram) in counts.iter_mut().zip(histograms) {
                *count = histogram.values().sum();
            }
        }
        counts
    }

    fn reference_temperature(state: &SimState) -> f64 {
        state
            .ensemble
            .temperature()
            .unwrap_or_else(|| state.kinetic_temperature())
    }
}

impl OutputPlugin for VelDist {
    fn name(&self) -> &'static str {
        "VelDist"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn initialise(&mut self, state: &SimState) -> Result<(), EngineError> {
        self.histograms = vec![Default::default(); state.species.len()];
        self.samples = 0;
        Ok(())
    }

    fn event_update(&mut self, _event: &Event, _data: &EventData, _state: &SimState) {}

    fn is_ticker(&self) -> bool {
        true
    }

    fn ticker(&mut self, state: &SimState) {
        let kt = Self::reference_temperature(state);
        if kt <= 0.0 {
            return;
        }
        let clock = state.clock();
        for particle in &state.particles {
            let species = state.species_index(particle.id);
            let mass = state.species[species].mass;
            if !mass.is_finite() {
                continue;
            }
            let scale = (mass / kt).sqrt();
            let dt = clock - particle.last_update;
            let velocity = particle.velocity + state.dynamics.acceleration(particle) * dt;
            for (dim, histogram) in self.histograms[species].iter_mut().enumerate() {
                let bin = (velocity[dim] * scale / self.bin_width).floor() as i64;
                *histogram.entry(bin).or_default() += 1;
            }
        }
        self.samples += 1;
    }

    fn output(&self, state: &SimState) -> Table {
        let mut table = Table::new();
        table.insert("bin-width".into(), self.bin_width.into());
        table.insert("samples".into(), (self.samples as i64).into());
        for (species, histograms) in state.species.iter().zip(&self.histograms) {
            let mut dims = Table::new();
            for (label, histogram) in ["x", "y", "z"].into_iter().zip(histograms) {
                let total: u64 = histogram.values().sum();
                let rows: Vec<toml::Value> = histogram
                    .iter()
                    .map(|(bin, count)| {
                        let centre = (*bin as f64 + 0.5) * self.bin_width;
                        let density = *count as f64 / (total as f64 * self.bin_width);
                        toml::Value::Array(vec![centre.into(), density.into()])
                    })
                    .collect();
                dims.insert(label.into(), rows.into());
            }
            table.insert(species.name.clone(), dims.into());
        }
        table
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::interactions::fixtures;

    #[test]
    fn rejects_non_positive_bin_width() {
        let spec = PluginSpec::parse("VelDist:binwidth=0").unwrap();
        assert!(VelDist::from_spec(&spec).is_err());
    }

    #[test]
    fn ticks_bin_every_component_of_every_particle() {
        let state = fixtures::head_on(2.0, 2.0);
        let mut plugin = VelDist::from_spec(&PluginSpec::parse("VelDist:binwidth=0.5").unwrap())
            .unwrap();
        plugin.initialise(&state).unwrap();
        plugin.ticker(&state);
        plugin.ticker(&state);

        assert_eq!(plugin.samples(), 2);
        assert_eq!(plugin.counts(0), [4, 4, 4]);
        let output = plugin.output(&state);
        let x = output["A"]["x"].as_array().unwrap();
        // Speeds of +1 and -1 land in two symmetric bins.
        assert_eq!(x.len(), 2);
    }
}

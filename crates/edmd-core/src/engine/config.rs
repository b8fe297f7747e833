use crate::core::models::ids::ParticleId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Particle {id} belongs to {count} species; exactly one is required")]
    ParticleSpecies { id: ParticleId, count: usize },

    #[error("Species cover {found} particles but the system has {expected}")]
    SpeciesCount { expected: usize, found: usize },

    #[error("Particle {0} has no self-interaction")]
    MissingSelfInteraction(ParticleId),

    #[error("No interaction covers the pair ({0}, {1})")]
    MissingInteraction(ParticleId, ParticleId),

    #[error(
        "Periodic box edge {dimension} ({size}) must exceed twice the longest interaction ({longest})"
    )]
    BoxTooSmall {
        dimension: usize,
        size: f64,
        longest: f64,
    },

    #[error("Cell size {cell_size} exceeds half the box edge {size} in dimension {dimension}")]
    CellTooLarge {
        dimension: usize,
        cell_size: f64,
        size: f64,
    },

    #[error("'{component}' requires orientation data, missing for particle {id}")]
    MissingOrientation { component: String, id: ParticleId },

    #[error("'{component}' requires an inertia constant on species '{species}'")]
    MissingInertia { component: String, species: String },

    #[error("Interaction '{0}' does not support compression dynamics")]
    UnsupportedDynamics(String),

    #[error("Unknown output plugin '{0}'")]
    UnknownPlugin(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Options of a run that are not part of the simulated physical state.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Number of events after which the run stops.
    pub end_event_count: u64,
    /// Events between periodic output lines; zero disables them.
    pub print_interval: u64,
    /// Period of the ticker driving ticker plugins. `None` uses the previous mean free time.
    pub ticker_period: Option<f64>,
    /// Output plugins in `Name` or `Name:key=value,...` form.
    pub plugins: Vec<String>,
    /// Overrides the seed stored in the document.
    pub seed: Option<u64>,
}

#[derive(Default)]
pub struct RunConfigBuilder {
    end_event_count: Option<u64>,
    print_interval: Option<u64>,
    ticker_period: Option<f64>,
    plugins: Vec<String>,
    seed: Option<u64>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn end_event_count(mut self, events: u64) -> Self {
        self.end_event_count = Some(events);
        self
    }

    pub fn print_interval(mut self, events: u64) -> Self {
        self.print_interval = Some(events);
        self
    }

    pub fn ticker_period(mut self, period: f64) -> Self {
        self.ticker_period = Some(period);
        self
    }

    pub fn plugin(mut self, spec: impl Into<String>) -> Self {
        self.plugins.push(spec.into());
        self
    }

    pub fn plugins<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plugins.extend(specs.into_iter().map(Into::into));
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let end_event_count = self
            .end_event_count
            .ok_or(ConfigError::MissingParameter("end_event_count"))?;
        if let Some(period) = self.ticker_period {
            if !(period > 0.0 && period.is_finite()) {
                return Err(ConfigError::InvalidValue {
                    field: "ticker_period".to_string(),
                    message: format!("must be positive and finite, got {period}"),
                });
            }
        }
        Ok(RunConfig {
            end_event_count,
            print_interval: self.print_interval.unwrap_or(100_000),
            ticker_period: self.ticker_period,
            plugins: self.plugins,
            seed: self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_event_budget() {
        let result = RunConfigBuilder::new().print_interval(10).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("end_event_count")));
    }

    #[test]
    fn builder_applies_defaults_and_collects_plugins() {
        let config = RunConfigBuilder::new()
            .end_event_count(1000)
            .plugin("Misc")
            .plugins(["KEnergy", "VelDist:bin-width=0.05"])
            .build()
            .unwrap();
        assert_eq!(config.end_event_count, 1000);
        assert_eq!(config.print_interval, 100_000);
        assert_eq!(config.plugins, vec!["Misc", "KEnergy", "VelDist:bin-width=0.05"]);
        assert_eq!(config.ticker_period, None);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn builder_rejects_non_positive_ticker_period() {
        let result = RunConfigBuilder::new()
            .end_event_count(1)
            .ticker_period(0.0)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}

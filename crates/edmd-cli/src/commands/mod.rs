pub mod check;
pub mod compress;
pub mod replex;
pub mod run;

use crate::cli::SimulationArgs;
use crate::error::Result;
use edmd::engine::config::{RunConfig, RunConfigBuilder};
use edmd::engine::error::EngineError;

impl SimulationArgs {
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut builder = RunConfigBuilder::new()
            .end_event_count(self.events)
            .print_interval(self.print_interval)
            .plugins(self.plugins.iter().cloned());
        if let Some(period) = self.ticker_period {
            builder = builder.ticker_period(period);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        Ok(builder.build().map_err(EngineError::from)?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fmt::Write;
    use std::path::{Path, PathBuf};

    /// Writes 27 unit hard spheres on a simple cubic lattice of spacing 2 in a periodic box,
    /// optionally thermostatted at `temperature`.
    pub fn write_lattice(dir: &Path, name: &str, temperature: Option<f64>) -> PathBuf {
        let mut content = String::from(
            r#"
version = "1.0.0"

[simulation]
size = [6.0, 6.0, 6.0]
seed = 11

[boundary]
type = "periodic"

[[species]]
name = "Bulk"
mass = 1.0

[[interactions]]
type = "hard-sphere"
name = "Bulk"
diameter = 1.0
"#,
        );
        if let Some(temperature) = temperature {
            write!(
                content,
                "\n[[systems]]\ntype = \"andersen\"\nname = \"Thermostat\"\nmean-free-time = 1.0\ntemperature = {temperature:?}\n"
            )
            .unwrap();
        }
        for i in 0..27 {
            let coords = [i % 3, (i / 3) % 3, i / 9].map(|c| c as f64 * 2.0 - 2.0);
            let velocity = [i % 5, (i + 2) % 7, (i + 4) % 3].map(|v| v as f64 * 0.25 - 0.5);
            write!(
                content,
                "\n[[particles]]\nid = {i}\nposition = {coords:?}\nvelocity = {velocity:?}\n"
            )
            .unwrap();
        }
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

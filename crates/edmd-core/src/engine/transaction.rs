use super::ensemble::Ensemble;
use super::error::EngineError;
use super::simulation::{Simulation, Status};
use std::mem;
use tracing::info;

fn check_ready(sim: &Simulation, label: &str) -> Result<f64, EngineError> {
    if !matches!(sim.status(), Status::Initialised | Status::Production) {
        return Err(EngineError::ReplicaExchange(format!(
            "replica {label} is {:?}, not initialised",
            sim.status()
        )));
    }
    match sim.state.ensemble {
        Ensemble::Nvt { temperature, .. } if temperature > 0.0 => Ok(temperature),
        other => Err(EngineError::ReplicaExchange(format!(
            "replica {label} samples a {} ensemble; exchanges need a thermostat",
            other.name()
        ))),
    }
}

/// Swaps the thermodynamic identity of two replicas.
///
/// Configurations stay where they are; what moves is everything tied to the ensemble: system
/// time, event counters, ticker clocks, plugin accumulators and the imposed temperature. Velocities are
/// rescaled so each configuration is consistent with the temperature it receives. Every check
/// runs before either replica is touched, so a rejected exchange leaves both unchanged.
pub fn replexer_swap(a: &mut Simulation, b: &mut Simulation) -> Result<(), EngineError> {
    let temperature_a = check_ready(a, "A")?;
    let temperature_b = check_ready(b, "B")?;
    let names_a: Vec<_> = a.plugins.iter().map(|p| p.name()).collect();
    let names_b: Vec<_> = b.plugins.iter().map(|p| p.name()).collect();
    if names_a != names_b {
        return Err(EngineError::ReplicaExchange(format!(
            "output plugins differ: {names_a:?} vs {names_b:?}"
        )));
    }

    let systems_a: Vec<_> = a.components.systems.iter().map(|s| s.name()).collect();
    let systems_b: Vec<_> = b.components.systems.iter().map(|s| s.name()).collect();
    if systems_a != systems_b {
        return Err(EngineError::ReplicaExchange(format!(
            "systems differ: {systems_a:?} vs {systems_b:?}"
        )));
    }

    a.update_all_particles();
    b.update_all_particles();

    mem::swap(&mut a.state.system_time, &mut b.state.system_time);
    mem::swap(&mut a.state.event_count, &mut b.state.event_count);
    mem::swap(&mut a.state.end_event_count, &mut b.state.end_event_count);
    for (system_a, system_b) in a
        .components
        .systems
        .iter_mut()
        .zip(b.components.systems.iter_mut())
    {
        system_a.replica_exchange(system_b.as_mut());
    }

    let scale_a = (temperature_b / temperature_a).sqrt();
    let scale_b = scale_a.recip();
    rescale_replica(a, scale_a)?;
    rescale_replica(b, scale_b)?;

    for (plugin_a, plugin_b) in a.plugins.iter_mut().zip(b.plugins.iter_mut()) {
        plugin_a.replica_exchange(plugin_b.as_mut());
        plugin_a.temperature_rescale(scale_a * scale_a);
        plugin_b.temperature_rescale(scale_b * scale_b);
    }

    a.state.ensemble.swap(&mut b.state.ensemble)?;
    info!(
        from = temperature_a,
        to = temperature_b,
        "Replica exchange accepted."
    );
    Ok(())
}

fn rescale_replica(sim: &mut Simulation, scale: f64) -> Result<(), EngineError> {
    for particle in &mut sim.state.particles {
        particle.velocity *= scale;
        if let Some(orientation) = particle.orientation.as_mut() {
            orientation.angular_velocity *= scale;
        }
    }
    if sim.scheduler_is_live() {
        if sim.state.dynamics.is_time_scalable() {
            sim.scheduler.rescale_times(scale.recip(), &sim.state)?;
        } else {
            sim.scheduler.initialise(&mut sim.state, &sim.components)?;
        }
        sim.scheduler
            .rebuild_system_events(&sim.state, &sim.components)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::document::SystemConfig;
    use crate::core::models::ids::ParticleId;
    use crate::engine::plugins::kenergy::KEnergy;
    use crate::engine::simulation::fixtures::{initialised, lattice_document};

    fn replica(temperature: f64, seed: u64) -> Simulation {
        let mut document = lattice_document(3, seed);
        document.systems.push(SystemConfig::Andersen {
            name: "Thermostat".to_string(),
            mean_free_time: 1.0,
            temperature,
        });
        document.systems.push(SystemConfig::Ticker {
            name: "Sampler".to_string(),
            period: temperature,
        });
        initialised(&document, 200, &["Misc", "KEnergy"])
    }

    fn sampler(sim: &Simulation) -> f64 {
        sim.components()
            .systems
            .iter()
            .find(|system| system.name() == "Sampler")
            .unwrap()
            .next_event()
            .dt
    }

    #[test]
    fn swap_exchanges_temperatures_and_keeps_particle_ids() {
        let mut cold = replica(1.0, 1);
        let mut hot = replica(4.0, 2);
        for _ in 0..50 {
            cold.run_simulation_step().unwrap();
            hot.run_simulation_step().unwrap();
        }
        let ids = |sim: &Simulation| sim.state().particles.iter().map(|p| p.id).collect::<Vec<_>>();
        let cold_ids = ids(&cold);
        let hot_ids = ids(&hot);
        let cold_kt = cold.state().kinetic_temperature();
        let hot_time = hot.state().system_time;
        let (cold_countdown, hot_countdown) = (sampler(&cold), sampler(&hot));
        assert_ne!(cold_countdown, hot_countdown);

        replexer_swap(&mut cold, &mut hot).unwrap();

        assert_eq!(sampler(&cold), hot_countdown);
        assert_eq!(sampler(&hot), cold_countdown);
        let period = |sim: &Simulation| {
            sim.to_document(Default::default())
                .systems
                .into_iter()
                .find_map(|system| match system {
                    SystemConfig::Ticker { name, period } if name == "Sampler" => Some(period),
                    _ => None,
                })
                .unwrap()
        };
        assert!((period(&cold) - 4.0).abs() < 1e-12);
        assert!((period(&hot) - 1.0).abs() < 1e-12);
        let next = cold.scheduler().next_event_time(cold.state()).unwrap();
        assert!(next <= hot_countdown + 1e-12);

        assert_eq!(ids(&cold), cold_ids);
        assert_eq!(ids(&hot), hot_ids);
        assert_eq!(cold_ids, (0..27).map(ParticleId).collect::<Vec<_>>());
        assert_eq!(cold.state().ensemble.temperature(), Some(4.0));
        assert_eq!(hot.state().ensemble.temperature(), Some(1.0));
        assert!((cold.state().kinetic_temperature() - 4.0 * cold_kt).abs() < 1e-9);
        assert_eq!(cold.state().system_time, hot_time);

        let kenergy = cold.plugin::<KEnergy>().unwrap();
        assert!((kenergy.temperature() - cold.state().kinetic_temperature()).abs() < 1e-9);

        while cold.run_simulation_step().unwrap() {}
        while hot.run_simulation_step().unwrap() {}
        assert_eq!(cold.check_system(), 0);
        assert_eq!(hot.check_system(), 0);
    }

    #[test]
    fn swap_without_thermostat_is_rejected_untouched() {
        let mut thermostatted = replica(1.0, 3);
        let mut plain = initialised(&lattice_document(3, 4), 200, &["Misc", "KEnergy"]);
        let before = thermostatted.state().particles.clone();
        assert!(matches!(
            replexer_swap(&mut thermostatted, &mut plain),
            Err(EngineError::ReplicaExchange(_))
        ));
        assert_eq!(thermostatted.state().particles, before);
        assert_eq!(thermostatted.state().ensemble.temperature(), Some(1.0));
    }

    #[test]
    fn swap_requires_matching_plugins() {
        let mut a = replica(1.0, 5);
        let mut document = lattice_document(3, 6);
        document.systems.push(SystemConfig::Andersen {
            name: "Thermostat".to_string(),
            mean_free_time: 1.0,
            temperature: 2.0,
        });
        let mut b = initialised(&document, 200, &["Misc"]);
        assert!(replexer_swap(&mut a, &mut b).is_err());
    }

    #[test]
    fn swap_requires_matching_systems() {
        let mut a = replica(1.0, 7);
        let mut document = lattice_document(3, 8);
        document.systems.push(SystemConfig::Andersen {
            name: "Thermostat".to_string(),
            mean_free_time: 1.0,
            temperature: 2.0,
        });
        document.systems.push(SystemConfig::Halt {
            name: "Stop".to_string(),
            time: 50.0,
        });
        let mut b = initialised(&document, 200, &["Misc", "KEnergy"]);
        let before = a.state().system_time;
        assert!(matches!(
            replexer_swap(&mut a, &mut b),
            Err(EngineError::ReplicaExchange(_))
        ));
        assert_eq!(a.state().system_time, before);
        assert_eq!(a.state().ensemble.temperature(), Some(1.0));
    }
}

use super::components::Components;
use super::config::{ConfigError, RunConfig};
use super::context::{GlobalContext, InteractionContext, SystemContext};
use super::dynamics::Dynamics;
use super::ensemble::Ensemble;
use super::error::EngineError;
use super::event::Directive;
use super::globals::Global;
use super::globals::cells::Cells;
use super::globals::parabola_sentinel::ParabolaSentinel;
use super::globals::pbc_sentinel::PbcSentinel;
use super::interactions::governing;
use super::neighbourhood::{AllPairs, Neighbourhood};
use super::plugins::{self, OutputPlugin};
use super::plugins::misc::Misc;
use super::scheduler::{Dispatched, Scheduler, SchedulerPhase};
use super::state::SimState;
use super::systems::System;
use super::systems::ticker::Ticker;
use super::{globals, interactions, locals, systems};
use crate::core::io::document::{
    DOCUMENT_VERSION, GlobalConfig, NeighbourhoodKind, ParticleConfig, SchedulerConfig,
    SimulationDocument, SimulationSection, SpeciesConfig,
};
use crate::core::models::ids::ParticleId;
use crate::core::models::particle::{Orientation, Particle};
use crate::core::models::range::PairRange;
use crate::core::models::species::Species;
use crate::core::models::units::Units;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

const AUTO_CELLS_NAME: &str = "SchedulerNBList";
const AUTO_PBC_SENTINEL_NAME: &str = "PBCSentinel";
const AUTO_PARABOLA_SENTINEL_NAME: &str = "ParabolaSentinel";
const AUTO_TICKER_NAME: &str = "SystemTicker";
/// Extra reach given to a rebuilt neighbourhood so it is not outgrown immediately.
const REBUILD_MARGIN: f64 = 1.1;

/// Lifecycle of a [`Simulation`]. Initialisation walks through the phases in order and a
/// failure leaves the simulation at the phase that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Start,
    SpeciesInit,
    DynamicsInit,
    InteractionInit,
    LocalInit,
    GlobalInit,
    SystemInit,
    EnsembleInit,
    SchedulerInit,
    OutputInit,
    Initialised,
    Production,
    ShutDown,
}

/// How a simulation is written back to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Fold every position into the primary box.
    pub apply_boundary: bool,
    /// Round positions and velocities to 12 significant digits.
    pub round: bool,
}

/// Owns the state, every event source, the scheduler and the output plugins, and drives the
/// event loop.
#[derive(Debug)]
pub struct Simulation {
    pub(crate) state: SimState,
    pub(crate) components: Components,
    pub(crate) scheduler: Scheduler,
    pub(crate) plugins: Vec<Box<dyn OutputPlugin>>,
    status: Status,
    neighbourhood: NeighbourhoodKind,
    print_interval: u64,
    ticker_period: Option<f64>,
    last_mft: Option<f64>,
    seed: u64,
    plugin_specs: Vec<String>,
}

impl Simulation {
    /// Builds an uninitialised simulation from a validated document and run options.
    pub fn from_document(
        document: &SimulationDocument,
        run: &RunConfig,
    ) -> Result<Self, EngineError> {
        document.validate()?;
        let units = Units::default();
        let section = &document.simulation;
        if section.size.iter().any(|&edge| !(edge > 0.0 && edge.is_finite())) {
            return Err(ConfigError::InvalidValue {
                field: "simulation.size".to_string(),
                message: format!("box edges must be positive, got {:?}", section.size),
            }
            .into());
        }

        let particles = document
            .particles
            .iter()
            .map(|p| particle_from_config(p, &units))
            .collect();
        let species = document
            .species
            .iter()
            .map(|s| species_from_config(s, &units))
            .collect();
        let seed = run.seed.or(section.seed).unwrap_or(0);
        let mut state = SimState::new(
            particles,
            species,
            Vector3::from(section.size) * units.length,
            document.boundary,
            Dynamics::from_config(&document.dynamics, &units),
            seed,
        );
        state.units = units;
        state.end_event_count = run.end_event_count;

        let components = Components {
            interactions: document
                .interactions
                .iter()
                .map(|c| interactions::from_config(c, &units))
                .collect(),
            globals: document
                .globals
                .iter()
                .map(|c| globals::from_config(c, &units))
                .collect(),
            locals: document
                .locals
                .iter()
                .map(|c| locals::from_config(c, &units))
                .collect(),
            systems: document
                .systems
                .iter()
                .map(|c| systems::from_config(c, &units))
                .collect(),
        };

        let plugins = run
            .plugins
            .iter()
            .map(|spec| plugins::create(spec))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            particles = state.n(),
            species = state.species.len(),
            interactions = components.interactions.len(),
            "Simulation loaded from document."
        );

        Ok(Self {
            state,
            components,
            scheduler: Scheduler::new(),
            plugins,
            status: Status::Start,
            neighbourhood: document.scheduler.neighbourhood,
            print_interval: run.print_interval,
            ticker_period: run.ticker_period,
            last_mft: section.last_mft,
            seed,
            plugin_specs: run.plugins.clone(),
        })
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn plugins(&self) -> &[Box<dyn OutputPlugin>] {
        &self.plugins
    }

    pub fn plugin<T: OutputPlugin + 'static>(&self) -> Option<&T> {
        self.plugins
            .iter()
            .find_map(|plugin| plugin.as_any().downcast_ref::<T>())
    }

    fn require_status(
        &self,
        operation: &'static str,
        allowed: &[Status],
    ) -> Result<(), EngineError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }

    /// Replaces the dynamics before initialisation.
    pub fn set_dynamics(&mut self, dynamics: Dynamics) -> Result<(), EngineError> {
        self.require_status("set_dynamics", &[Status::Start])?;
        self.state.dynamics = dynamics;
        Ok(())
    }

    /// Adds a system before initialisation.
    pub fn add_system(&mut self, system: Box<dyn System>) -> Result<(), EngineError> {
        self.require_status("add_system", &[Status::Start])?;
        self.components.systems.push(system);
        Ok(())
    }

    /// Runs every initialisation phase in order.
    pub fn initialise(&mut self) -> Result<(), EngineError> {
        self.require_status("initialise", &[Status::Start])?;

        self.status = Status::SpeciesInit;
        self.state.assign_species()?;
        self.check_self_interactions()?;
        info!(species = self.state.species.len(), "Species initialised.");

        self.status = Status::DynamicsInit;
        self.check_dynamics()?;
        debug!(dynamics = ?self.state.dynamics, "Dynamics initialised.");

        self.status = Status::InteractionInit;
        self.check_pair_coverage()?;
        self.initialise_interactions()?;
        self.check_periodic_box()?;
        info!(
            interactions = self.components.interactions.len(),
            longest = self.longest_interaction(),
            "Interactions initialised."
        );

        self.status = Status::LocalInit;
        for (id, local) in self.components.locals.iter_mut().enumerate() {
            local.initialise(id, &self.state)?;
        }
        info!(locals = self.components.locals.len(), "Locals initialised.");

        self.status = Status::GlobalInit;
        self.add_automatic_globals();
        let longest = self.neighbourhood_reach(self.longest_interaction());
        let Components { globals, locals, .. } = &mut self.components;
        for (id, global) in globals.iter_mut().enumerate() {
            global.initialise(
                id,
                &GlobalContext {
                    state: &self.state,
                    locals: &locals[..],
                    longest_interaction: longest,
                },
            )?;
        }
        info!(globals = self.components.globals.len(), "Globals initialised.");

        self.status = Status::SystemInit;
        self.add_automatic_ticker();
        self.initialise_systems()?;
        info!(systems = self.components.systems.len(), "Systems initialised.");

        self.status = Status::EnsembleInit;
        self.state.ensemble = self.detect_ensemble();
        debug!(ensemble = self.state.ensemble.name(), values = ?self.state.ensemble.values(), "Ensemble detected.");

        let overlaps = self.check_system();
        if overlaps > 0 {
            warn!(overlaps, "Initial configuration contains overlapping pairs.");
        }

        self.status = Status::SchedulerInit;
        if self.state.end_event_count > self.state.event_count {
            self.scheduler
                .initialise(&mut self.state, &self.components)?;
            info!("Scheduler initialised.");
        } else {
            debug!("Event budget is zero; scheduler left uninitialised.");
        }

        self.status = Status::OutputInit;
        plugins::sort_by_priority(&mut self.plugins);
        for plugin in &mut self.plugins {
            plugin.initialise(&self.state)?;
        }
        info!(plugins = self.plugins.len(), "Output plugins initialised.");

        self.status = Status::Initialised;
        Ok(())
    }

    fn check_self_interactions(&self) -> Result<(), ConfigError> {
        for id in self.state.particle_ids() {
            if self.components.interaction_for(id, id).is_none() {
                return Err(ConfigError::MissingSelfInteraction(id));
            }
        }
        Ok(())
    }

    fn check_dynamics(&self) -> Result<(), ConfigError> {
        if let Dynamics::Compression { growth_rate } = self.state.dynamics {
            if !(growth_rate > 0.0 && growth_rate.is_finite()) {
                return Err(ConfigError::InvalidValue {
                    field: "dynamics.growth-rate".to_string(),
                    message: format!("must be positive and finite, got {growth_rate}"),
                });
            }
            if let Some(interaction) = self
                .components
                .interactions
                .iter()
                .find(|interaction| !interaction.supports_compression())
            {
                return Err(ConfigError::UnsupportedDynamics(interaction.name().to_string()));
            }
        }
        Ok(())
    }

    fn check_pair_coverage(&self) -> Result<(), ConfigError> {
        if self
            .components
            .interactions
            .iter()
            .any(|interaction| matches!(interaction.range(), PairRange::All))
        {
            return Ok(());
        }
        let n = self.state.n();
        for a in (0..n).map(ParticleId) {
            for b in (a.index() + 1..n).map(ParticleId) {
                if self.components.interaction_for(a, b).is_none() {
                    return Err(ConfigError::MissingInteraction(a, b));
                }
            }
        }
        Ok(())
    }

    fn initialise_interactions(&mut self) -> Result<(), EngineError> {
        let ranges: Vec<PairRange> = self
            .components
            .interactions
            .iter()
            .map(|interaction| interaction.range().clone())
            .collect();
        for (id, interaction) in self.components.interactions.iter_mut().enumerate() {
            let governs = |a: ParticleId, b: ParticleId| governing(&ranges, a, b) == Some(id);
            interaction.initialise(&InteractionContext {
                id,
                state: &self.state,
                governs: &governs,
            })?;
        }
        Ok(())
    }

    fn check_periodic_box(&self) -> Result<(), ConfigError> {
        if !self.state.boundary.is_periodic() {
            return Ok(());
        }
        let longest = self.longest_interaction();
        for (dimension, &size) in self.state.primary_cell.iter().enumerate() {
            if size <= 2.0 * longest {
                return Err(ConfigError::BoxTooSmall {
                    dimension,
                    size,
                    longest,
                });
            }
        }
        Ok(())
    }

    fn add_automatic_globals(&mut self) {
        let units = self.state.units;
        let present = |list: &[Box<dyn Global>], matches: fn(&GlobalConfig) -> bool| {
            list.iter().any(|global| matches(&global.to_config(&units)))
        };

        if self.state.boundary.is_periodic()
            && !present(&self.components.globals, |c| {
                matches!(c, GlobalConfig::PbcSentinel { .. })
            })
        {
            debug!("Adding a periodic boundary sentinel.");
            self.components
                .globals
                .push(Box::new(PbcSentinel::new(AUTO_PBC_SENTINEL_NAME)));
        }
        if self.state.dynamics.has_external_field()
            && !present(&self.components.globals, |c| {
                matches!(c, GlobalConfig::ParabolaSentinel { .. })
            })
        {
            debug!("Adding a parabola sentinel for the external field.");
            self.components
                .globals
                .push(Box::new(ParabolaSentinel::new(AUTO_PARABOLA_SENTINEL_NAME)));
        }
        if self.neighbourhood == NeighbourhoodKind::Cells
            && !present(&self.components.globals, |c| matches!(c, GlobalConfig::Cells { .. }))
        {
            debug!("Adding a cell list for the scheduler neighbourhood.");
            self.components
                .globals
                .push(Box::new(Cells::new(AUTO_CELLS_NAME, None, false)));
        }
    }

    fn add_automatic_ticker(&mut self) {
        let wants_ticker = self.plugins.iter().any(|plugin| plugin.is_ticker());
        let has_ticker = self.components.systems.iter().any(|system| system.is_ticker());
        if let Some(period) = self.ticker_period {
            let period = period * self.state.units.time;
            for system in &mut self.components.systems {
                system.set_period(period);
            }
        }
        if wants_ticker && !has_ticker {
            let period = self
                .ticker_period
                .or(self.last_mft)
                .unwrap_or(1.0)
                * self.state.units.time;
            debug!(period, "Adding a ticker for the ticker plugins.");
            self.components
                .systems
                .push(Box::new(Ticker::new(AUTO_TICKER_NAME, period)));
        }
    }

    fn initialise_systems(&mut self) -> Result<(), EngineError> {
        let base_longest_interaction = self.components.base_longest_interaction();
        let Components {
            globals, systems, ..
        } = &mut self.components;
        for (id, system) in systems.iter_mut().enumerate() {
            system.initialise(
                id,
                &mut SystemContext {
                    state: &mut self.state,
                    globals: &globals[..],
                    base_longest_interaction,
                },
            )?;
        }
        Ok(())
    }

    fn detect_ensemble(&self) -> Ensemble {
        let n = self.state.n();
        let volume = self.state.volume();
        match self
            .components
            .systems
            .iter()
            .find_map(|system| system.thermostat_temperature())
        {
            Some(temperature) => Ensemble::Nvt {
                n,
                volume,
                temperature,
            },
            None => Ensemble::Nve {
                n,
                volume,
                energy: self.state.total_kinetic_energy() + self.internal_energy(),
            },
        }
    }

    /// Runs one event. Returns whether any of the event budget remains.
    pub fn run_simulation_step(&mut self) -> Result<bool, EngineError> {
        if self.status == Status::Initialised {
            self.status = Status::Production;
            info!(
                budget = self.state.end_event_count - self.state.event_count,
                "Production run started."
            );
        }
        self.require_status("run_simulation_step", &[Status::Production])?;
        if self.state.event_count >= self.state.end_event_count {
            return Ok(false);
        }

        let event_count = self.state.event_count;
        self.step().map_err(|source| EngineError::EventFailed {
            event_count,
            source: Box::new(source),
        })?;
        Ok(self.state.event_count < self.state.end_event_count)
    }

    fn step(&mut self) -> Result<(), EngineError> {
        let Dispatched { event, data } = self
            .scheduler
            .run_next_event(&mut self.state, &mut self.components)?;
        self.state.event_count += 1;
        trace!(
            event = self.state.event_count,
            kind = %data.event_type,
            dt = event.dt,
            particles = ?event.source.particles(),
            "Event dispatched."
        );

        for plugin in &mut self.plugins {
            plugin.event_update(&event, &data, &self.state);
        }

        match data.directive {
            Some(Directive::Tick) => {
                for plugin in self.plugins.iter_mut().filter(|p| p.is_ticker()) {
                    plugin.ticker(&self.state);
                }
            }
            Some(Directive::Shutdown) => self.sim_shutdown(),
            Some(Directive::RebuildNeighbourhood) => self.rebuild_neighbourhood()?,
            None => {}
        }

        if self.print_interval > 0 && self.state.event_count % self.print_interval == 0 {
            let line: Vec<String> = self
                .plugins
                .iter()
                .filter_map(|plugin| plugin.periodic_output(&self.state))
                .collect();
            info!(
                event = self.state.event_count,
                "{}",
                if line.is_empty() {
                    format!("t {:.6e}", self.state.system_time / self.state.units.time)
                } else {
                    line.join(", ")
                }
            );
        }
        Ok(())
    }

    /// Ends the run after the current event by exhausting the event budget.
    pub fn sim_shutdown(&mut self) {
        info!(events = self.state.event_count, "Simulation shutdown requested.");
        self.state.end_event_count = self.state.event_count;
    }

    /// Allows `events` more events from the current count.
    pub fn extend_budget(&mut self, events: u64) {
        self.state.end_event_count = self.state.event_count + events;
    }

    /// Lets every plugin write its results and marks the run finished.
    pub fn finalise(&mut self) -> Result<(), EngineError> {
        self.update_all_particles();
        for plugin in &mut self.plugins {
            plugin.finalise(&self.state)?;
        }
        self.scheduler.shutdown();
        self.status = Status::ShutDown;
        info!(
            events = self.state.event_count,
            time = self.state.system_time / self.state.units.time,
            "Simulation finished."
        );
        Ok(())
    }

    /// Returns the simulation to its uninitialised state, keeping particles and event
    /// sources. Output plugins are recreated from their specifications.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.update_all_particles();
        self.scheduler = Scheduler::new();
        self.plugins = self
            .plugin_specs
            .iter()
            .map(|spec| plugins::create(spec))
            .collect::<Result<Vec<_>, _>>()?;
        self.status = Status::Start;
        debug!("Simulation reset.");
        Ok(())
    }

    pub fn update_all_particles(&mut self) {
        self.state.update_all_particles();
    }

    pub(crate) fn scheduler_is_live(&self) -> bool {
        self.scheduler.phase() != SchedulerPhase::Uninitialised
            && self.scheduler.phase() != SchedulerPhase::ShutDown
    }

    /// Multiplies every velocity and spin by `factor`, keeping the cached schedule valid.
    pub fn rescale_velocities(&mut self, factor: f64) -> Result<(), EngineError> {
        if !(factor > 0.0 && factor.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "velocity scale".to_string(),
                message: format!("must be positive and finite, got {factor}"),
            }
            .into());
        }
        self.update_all_particles();
        for particle in &mut self.state.particles {
            particle.velocity *= factor;
            if let Some(orientation) = particle.orientation.as_mut() {
                orientation.angular_velocity *= factor;
            }
        }
        if self.scheduler_is_live() {
            if self.state.dynamics.is_time_scalable() {
                self.scheduler.rescale_times(1.0 / factor, &self.state)?;
            } else {
                self.scheduler.initialise(&mut self.state, &self.components)?;
            }
        }
        for plugin in &mut self.plugins {
            plugin.temperature_rescale(factor * factor);
        }
        Ok(())
    }

    /// Shifts every movable particle so the centre-of-mass velocity becomes `velocity`.
    pub fn set_com_velocity(&mut self, velocity: Vector3<f64>) -> Result<(), EngineError> {
        self.require_status("set_com_velocity", &[Status::Start])?;
        if self.state.species.is_empty() {
            return Ok(());
        }
        self.state.assign_species()?;
        let mut momentum = Vector3::zeros();
        let mut mass = 0.0;
        for id in self.state.particle_ids() {
            let m = self.state.species_of(id).mass;
            if m.is_finite() {
                momentum += self.state.particle(id).velocity * m;
                mass += m;
            }
        }
        if mass == 0.0 {
            return Ok(());
        }
        let shift = velocity - momentum / mass;
        for id in self.state.particle_ids() {
            if self.state.species_of(id).mass.is_finite() {
                self.state.particle_mut(id).velocity += shift;
            }
        }
        Ok(())
    }

    /// Longest interaction distance at the current system time.
    pub fn longest_interaction(&self) -> f64 {
        self.components.base_longest_interaction()
            * self.state.dynamics.growth_factor(self.state.system_time)
    }

    /// Fraction of the box excluded by the particles' self-interactions.
    pub fn packing_fraction(&self) -> f64 {
        let growth = self.state.dynamics.growth_factor(self.state.system_time);
        let excluded: f64 = self
            .state
            .particle_ids()
            .filter_map(|id| self.components.interaction_for(id, id))
            .map(|index| self.components.interactions[index].excluded_volume())
            .sum();
        excluded * growth.powi(3) / self.state.volume()
    }

    /// Number density in file units.
    pub fn number_density(&self) -> f64 {
        self.state.n() as f64 * self.state.units.length.powi(3) / self.state.volume()
    }

    pub fn internal_energy(&self) -> f64 {
        self.components
            .interactions
            .iter()
            .map(|interaction| interaction.internal_energy())
            .sum()
    }

    /// Counts overlapping pairs and particles overlapping locals.
    pub fn check_system(&mut self) -> usize {
        self.update_all_particles();
        let fallback = AllPairs {
            particles: self.state.n(),
            locals: self.components.locals.len(),
        };
        let neighbourhood: &dyn Neighbourhood =
            self.components.neighbourhood().unwrap_or(&fallback);
        let mut overlaps = 0;
        for p in self.state.particle_ids() {
            neighbourhood.particle_neighbourhood(p, &mut |q| {
                if q.index() <= p.index() {
                    return;
                }
                let Some(index) = self.components.interaction_for(p, q) else {
                    return;
                };
                if self.components.interactions[index].overlaps(p, q, &self.state) {
                    debug!(p1 = %p, p2 = %q, interaction = self.components.interactions[index].name(), "Overlapping pair.");
                    overlaps += 1;
                }
            });
            neighbourhood.particle_local_neighbourhood(p, &mut |local| {
                let local = &self.components.locals[local];
                if local.applies_to(p) && local.overlaps(p, &self.state) {
                    debug!(particle = %p, local = local.name(), "Particle overlaps a local.");
                    overlaps += 1;
                }
            });
        }
        overlaps
    }

    /// Changes the period of every periodic system. Returns whether any system accepted it.
    pub fn set_ticker_period(&mut self, period: f64) -> Result<bool, EngineError> {
        let period = period * self.state.units.time;
        let mut changed = false;
        for system in &mut self.components.systems {
            changed |= system.set_period(period);
        }
        self.ticker_period = Some(period / self.state.units.time);
        if changed && self.scheduler_is_live() {
            self.scheduler
                .rebuild_system_events(&self.state, &self.components)?;
        }
        Ok(changed)
    }

    /// Re-arms every one-shot system to fire after `dt` file time units.
    pub fn rearm_halt(&mut self, dt: f64) -> Result<bool, EngineError> {
        let dt = dt * self.state.units.time;
        let mut rearmed = false;
        for system in &mut self.components.systems {
            rearmed |= system.rearm(dt);
        }
        if rearmed && self.scheduler_is_live() {
            self.scheduler
                .rebuild_system_events(&self.state, &self.components)?;
        }
        Ok(rearmed)
    }

    /// Range a neighbourhood must be built for. Growing interactions get a margin so the
    /// lattice is not outgrown the moment it is built.
    fn neighbourhood_reach(&self, longest: f64) -> f64 {
        if self.state.dynamics.growth_rate() <= 0.0 {
            return longest;
        }
        let reach = longest * REBUILD_MARGIN;
        if self.state.boundary.is_periodic() {
            reach.min(0.5 * self.state.primary_cell.min())
        } else {
            reach
        }
    }

    fn rebuild_neighbourhood(&mut self) -> Result<(), EngineError> {
        self.update_all_particles();
        let current = self.longest_interaction();
        if self.state.boundary.is_periodic() && current >= 0.5 * self.state.primary_cell.min() {
            let dimension = self.state.primary_cell.imin();
            return Err(ConfigError::BoxTooSmall {
                dimension,
                size: self.state.primary_cell[dimension],
                longest: current,
            }
            .into());
        }
        let target = self.neighbourhood_reach(current);

        let Components { globals, locals, .. } = &mut self.components;
        for global in globals.iter_mut() {
            global.rebuild(&GlobalContext {
                state: &self.state,
                locals: &locals[..],
                longest_interaction: target,
            })?;
        }

        let base_longest_interaction = self.components.base_longest_interaction();
        let Components {
            globals, systems, ..
        } = &mut self.components;
        for system in systems.iter_mut() {
            system.neighbourhood_rebuilt(&mut SystemContext {
                state: &mut self.state,
                globals: &globals[..],
                base_longest_interaction,
            })?;
        }

        self.scheduler.initialise(&mut self.state, &self.components)?;
        info!(
            longest = current,
            reach = target,
            events = self.state.event_count,
            "Neighbourhood rebuilt."
        );
        Ok(())
    }

    /// Undoes compression growth: interaction lengths absorb the growth factor and the units
    /// are rescaled so the saved interactions keep their original size while the saved box
    /// shrinks. The simulation must be finalised first.
    pub fn restore_compression(&mut self, dynamics: Dynamics) -> Result<f64, EngineError> {
        self.require_status("restore_compression", &[Status::ShutDown])?;
        self.update_all_particles();
        let factor = self.state.dynamics.growth_factor(self.state.system_time);
        for interaction in &mut self.components.interactions {
            interaction.rescale_lengths(factor);
        }
        for local in &mut self.components.locals {
            local.rescale_lengths(factor);
        }
        self.state.units.rescale_length(factor);
        self.state.units.rescale_time(factor);
        self.state.dynamics = dynamics;
        info!(factor, "Compression growth folded into interaction lengths.");
        Ok(factor)
    }

    /// Results of every output plugin, keyed by plugin name.
    pub fn output_data(&self) -> toml::Table {
        let mut table = toml::Table::new();
        let mut run = toml::Table::new();
        run.insert("events".into(), (self.state.event_count as i64).into());
        run.insert(
            "time".into(),
            (self.state.system_time / self.state.units.time).into(),
        );
        run.insert("packing-fraction".into(), self.packing_fraction().into());
        run.insert(
            "internal-energy".into(),
            (self.internal_energy() / self.state.units.energy()).into(),
        );
        table.insert("run".into(), run.into());
        for plugin in &self.plugins {
            table.insert(plugin.name().into(), plugin.output(&self.state).into());
        }
        table
    }

    /// Writes the current state as a document in file units.
    pub fn to_document(&self, options: SaveOptions) -> SimulationDocument {
        let units = &self.state.units;
        let clock = self.state.clock();
        let finish = |x: f64| if options.round { round_significant(x) } else { x };
        let vector = |v: Vector3<f64>| [finish(v.x), finish(v.y), finish(v.z)];

        let particles = self
            .state
            .particles
            .iter()
            .map(|particle| {
                let mut particle = particle.clone();
                let lag = clock - particle.last_update;
                self.state.dynamics.stream_particle(&mut particle, lag);
                if options.apply_boundary {
                    particle.position = self.state.folded_position(&particle.position);
                }
                ParticleConfig {
                    id: particle.id,
                    position: vector(particle.position / units.length),
                    velocity: vector(particle.velocity / units.velocity()),
                    orientation: particle
                        .orientation
                        .as_ref()
                        .map(|o| vector(o.axis.into_inner())),
                    angular_velocity: particle
                        .orientation
                        .as_ref()
                        .map(|o| vector(o.angular_velocity * units.time)),
                    dynamic: particle.dynamic,
                }
            })
            .collect();

        let last_mft = self
            .plugin::<Misc>()
            .map(|misc| misc.mean_free_time(&self.state) / units.time)
            .filter(|mft| mft.is_finite())
            .or(self.last_mft);

        let size = self.state.primary_cell / units.length;
        SimulationDocument {
            version: DOCUMENT_VERSION.to_string(),
            simulation: SimulationSection {
                size: [size.x, size.y, size.z],
                seed: Some(self.seed),
                last_mft,
            },
            boundary: self.state.boundary,
            dynamics: self.state.dynamics.to_config(units),
            scheduler: SchedulerConfig {
                neighbourhood: self.neighbourhood,
            },
            species: self
                .state
                .species
                .iter()
                .map(|s| SpeciesConfig {
                    name: s.name.clone(),
                    mass: s.mass / units.mass,
                    range: s.range.clone(),
                    inertia_constant: s.inertia_constant.map(|c| c / (units.length * units.length)),
                })
                .collect(),
            interactions: self
                .components
                .interactions
                .iter()
                .map(|interaction| interaction.to_config(units))
                .collect(),
            locals: self
                .components
                .locals
                .iter()
                .map(|local| local.to_config(units))
                .collect(),
            globals: self
                .components
                .globals
                .iter()
                .map(|global| global.to_config(units))
                .collect(),
            systems: self
                .components
                .systems
                .iter()
                .filter_map(|system| system.to_config(&self.state))
                .collect(),
            particles,
        }
    }

    /// Reseeds the random number generator, for replicas loaded from the same document.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.state.rng = ChaCha8Rng::seed_from_u64(seed);
    }
}

fn particle_from_config(config: &ParticleConfig, units: &Units) -> Particle {
    let mut particle = Particle::new(
        config.id,
        Vector3::from(config.position) * units.length,
        Vector3::from(config.velocity) * units.velocity(),
    );
    if let Some(axis) = config.orientation {
        let angular_velocity = config
            .angular_velocity
            .map(|w| Vector3::from(w) / units.time)
            .unwrap_or_else(Vector3::zeros);
        particle = particle.with_orientation(Orientation::new(Vector3::from(axis), angular_velocity));
    }
    particle.dynamic = config.dynamic;
    particle
}

fn species_from_config(config: &SpeciesConfig, units: &Units) -> Species {
    let species = Species::new(config.name.clone(), config.mass * units.mass, config.range.clone());
    match config.inertia_constant {
        Some(constant) => species.with_inertia(constant * units.length * units.length),
        None => species,
    }
}

fn round_significant(x: f64) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    format!("{x:.11e}").parse().unwrap_or(x)
}

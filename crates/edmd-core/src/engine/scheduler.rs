use super::components::Components;
use super::error::EngineError;
use super::event::{Event, EventData, EventSource};
use super::neighbourhood::{AllPairs, Neighbourhood};
use super::state::SimState;
use crate::core::models::ids::ParticleId;
use ordered_float::NotNan;
use std::collections::BTreeSet;
use tracing::{trace, warn};

/// Largest numerical drift tolerated between a cached event time and the current clock, or
/// between a cached prediction and its recomputation at dispatch.
pub const DRIFT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Uninitialised,
    Initialised,
    Running,
    ShutDown,
}

/// Which cached entry a queue key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    System(usize),
    Particle(usize),
}

/// Queue ordering: absolute time, then source rank, participants, source id and finally slot.
type QueueKey = (NotNan<f64>, u8, (usize, usize), usize, Slot);

#[derive(Debug, Clone, Copy)]
struct Entry {
    event: Event,
    key: QueueKey,
    /// Partner of a pair event and its event counter when the event was predicted.
    partner: Option<(ParticleId, u64)>,
}

/// An event that was run, with `dt` the time the clock advanced to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub event: Event,
    pub data: EventData,
}

/// Keeps one cached next event per particle and per system, ordered in a single queue.
///
/// Each particle's entry is the earliest event over every source that applies to it. A pair
/// event remembers the partner's event counter; if the partner has been rescheduled since,
/// the entry is stale and is recomputed when it reaches the front of the queue instead of
/// being run.
#[derive(Debug)]
pub struct Scheduler {
    phase: SchedulerPhase,
    particles: Vec<Option<Entry>>,
    systems: Vec<Option<Entry>>,
    counters: Vec<u64>,
    queue: BTreeSet<QueueKey>,
    fallback: AllPairs,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            phase: SchedulerPhase::Uninitialised,
            particles: Vec::new(),
            systems: Vec::new(),
            counters: Vec::new(),
            queue: BTreeSet::new(),
            fallback: AllPairs {
                particles: 0,
                locals: 0,
            },
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn shutdown(&mut self) {
        self.phase = SchedulerPhase::ShutDown;
    }

    /// Computes every particle and system entry from scratch.
    pub fn initialise(
        &mut self,
        state: &mut SimState,
        components: &Components,
    ) -> Result<(), EngineError> {
        let n = state.n();
        self.queue.clear();
        self.particles = vec![None; n];
        self.counters = vec![0; n];
        self.fallback = AllPairs {
            particles: n,
            locals: components.locals.len(),
        };
        for id in state.particle_ids() {
            self.full_update(id, state, components)?;
        }
        self.rebuild_system_events(state, components)?;
        self.phase = SchedulerPhase::Initialised;
        Ok(())
    }

    /// Recomputes `particle`'s entry from every applicable source, invalidating every other
    /// entry that was predicted against its old state.
    pub fn full_update(
        &mut self,
        particle: ParticleId,
        state: &mut SimState,
        components: &Components,
    ) -> Result<(), EngineError> {
        let index = particle.index();
        if let Some(old) = self.particles[index].take() {
            self.queue.remove(&old.key);
        }
        self.counters[index] += 1;

        let fallback = self.fallback;
        let neighbourhood = components.neighbourhood().unwrap_or(&fallback);
        let event = earliest_event(particle, state, components, neighbourhood)?;

        let partner = match event.source {
            EventSource::Interaction { p1, p2, .. } => {
                let other = if p1 == particle { p2 } else { p1 };
                Some((other, self.counters[other.index()]))
            }
            _ => None,
        };
        let key = make_key(&event, state.clock(), Slot::Particle(index))?;
        self.queue.insert(key);
        self.particles[index] = Some(Entry {
            event,
            key,
            partner,
        });
        Ok(())
    }

    /// Recomputes every system entry, after a system was added, re-armed or had its clock
    /// changed from outside the event loop.
    pub fn rebuild_system_events(
        &mut self,
        state: &SimState,
        components: &Components,
    ) -> Result<(), EngineError> {
        for entry in self.systems.drain(..).flatten() {
            self.queue.remove(&entry.key);
        }
        for id in 0..components.systems.len() {
            self.systems.push(None);
            self.refresh_system(id, state, components)?;
        }
        Ok(())
    }

    fn refresh_system(
        &mut self,
        id: usize,
        state: &SimState,
        components: &Components,
    ) -> Result<(), EngineError> {
        if let Some(old) = self.systems[id].take() {
            self.queue.remove(&old.key);
        }
        let event = components.systems[id].next_event();
        let key = make_key(&event, state.clock(), Slot::System(id))?;
        self.queue.insert(key);
        self.systems[id] = Some(Entry {
            event,
            key,
            partner: None,
        });
        Ok(())
    }

    /// Advances the clocks of the state and every system by `dt`.
    pub fn stream(&mut self, dt: f64, state: &mut SimState, components: &mut Components) {
        state.advance(dt);
        for system in &mut components.systems {
            system.stream(dt);
        }
    }

    /// Multiplies the remaining time of every particle entry by `factor`. Only valid when
    /// every particle velocity has just been scaled by `1 / factor` under dynamics where
    /// event times scale inversely with speed.
    pub fn rescale_times(&mut self, factor: f64, state: &SimState) -> Result<(), EngineError> {
        let clock = state.clock();
        for (index, slot) in self.particles.iter_mut().enumerate() {
            let Some(entry) = slot.as_mut() else {
                continue;
            };
            self.queue.remove(&entry.key);
            let remaining = entry.key.0.into_inner() - clock;
            entry.event.dt = remaining * factor;
            entry.key = make_key(&entry.event, clock, Slot::Particle(index))?;
            self.queue.insert(entry.key);
        }
        Ok(())
    }

    /// Time until the next queued event.
    pub fn next_event_time(&self, state: &SimState) -> Option<f64> {
        self.queue
            .first()
            .map(|key| key.0.into_inner() - state.clock())
    }

    /// The event currently cached for `particle`, with `dt` measured from when it was
    /// predicted.
    pub fn cached_event(&self, particle: ParticleId) -> Option<&Event> {
        self.particles
            .get(particle.index())
            .and_then(|slot| slot.as_ref())
            .map(|entry| &entry.event)
    }

    /// Absolute stream-clock time of `particle`'s cached event.
    pub fn cached_time(&self, particle: ParticleId) -> Option<f64> {
        self.particles
            .get(particle.index())
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.key.0.into_inner())
    }

    /// Runs the earliest valid event: streams the system to it, lets its source resolve it
    /// and reschedules every particle the source reports as changed. Stale or drifted
    /// entries met on the way are recomputed without being run.
    pub fn run_next_event(
        &mut self,
        state: &mut SimState,
        components: &mut Components,
    ) -> Result<Dispatched, EngineError> {
        if self.phase == SchedulerPhase::Uninitialised {
            return Err(EngineError::Consistency(
                "scheduler used before initialisation".to_string(),
            ));
        }
        self.phase = SchedulerPhase::Running;
        let clock_at_start = state.clock();

        loop {
            let key = *self.queue.first().ok_or_else(|| {
                EngineError::Consistency("event queue is empty".to_string())
            })?;
            let dt = checked_dt(&key, state)?;

            match key.4 {
                Slot::System(id) => {
                    self.stream(dt, state, components);
                    let event = components.systems[id].next_event();
                    let data = components.systems[id].run_event(state)?;
                    self.refresh_system(id, state, components)?;
                    self.reschedule(&data.reschedule, state, components)?;
                    return Ok(Dispatched {
                        event: Event {
                            dt: state.clock() - clock_at_start,
                            ..event
                        },
                        data,
                    });
                }
                Slot::Particle(index) => {
                    let owner = ParticleId(index);
                    let entry = self.particles[index].ok_or_else(|| {
                        EngineError::Consistency(format!("queued particle {owner} has no entry"))
                    })?;

                    if let Some((partner, snapshot)) = entry.partner {
                        if self.counters[partner.index()] != snapshot {
                            trace!(particle = %owner, partner = %partner, "Stale pair event.");
                            self.full_update(owner, state, components)?;
                            continue;
                        }
                    }

                    self.stream(dt, state, components);
                    let participants = entry.event.source.particles();
                    for &p in &participants {
                        state.update_particle(p);
                    }

                    let fresh = recompute(&entry.event.source, state, components)?;
                    if fresh.event_type != entry.event.event_type || !fresh.dt.is_finite() {
                        warn!(
                            particle = %owner,
                            predicted = %entry.event.event_type,
                            found = %fresh.event_type,
                            "Event drifted past; rescheduling without running it."
                        );
                        self.full_update(owner, state, components)?;
                        continue;
                    }
                    if fresh.dt > DRIFT_TOLERANCE {
                        self.requeue(index, fresh, state)?;
                        continue;
                    }
                    if fresh.dt > 0.0 {
                        self.stream(fresh.dt, state, components);
                        for &p in &participants {
                            state.update_particle(p);
                        }
                    }

                    let data = dispatch(&fresh, state, components)?;
                    let mut changed = data.reschedule.clone();
                    if !changed.contains(&owner) {
                        changed.push(owner);
                    }
                    self.reschedule(&changed, state, components)?;
                    return Ok(Dispatched {
                        event: Event {
                            dt: state.clock() - clock_at_start,
                            ..fresh
                        },
                        data,
                    });
                }
            }
        }
    }

    fn requeue(&mut self, index: usize, event: Event, state: &SimState) -> Result<(), EngineError> {
        if let Some(entry) = self.particles[index].as_mut() {
            self.queue.remove(&entry.key);
            entry.event = event;
            entry.key = make_key(&event, state.clock(), Slot::Particle(index))?;
            self.queue.insert(entry.key);
        }
        Ok(())
    }

    fn reschedule(
        &mut self,
        particles: &[ParticleId],
        state: &mut SimState,
        components: &Components,
    ) -> Result<(), EngineError> {
        for (i, &particle) in particles.iter().enumerate() {
            if !particles[..i].contains(&particle) {
                self.full_update(particle, state, components)?;
            }
        }
        Ok(())
    }
}

/// Earliest event of `particle` over every global, local and pair interaction, bringing each
/// candidate partner up to date on the way.
fn earliest_event(
    particle: ParticleId,
    state: &mut SimState,
    components: &Components,
    neighbourhood: &dyn Neighbourhood,
) -> Result<Event, EngineError> {
    state.update_particle(particle);
    let mut best = Event::none(EventSource::Global {
        id: usize::MAX,
        particle,
    });

    for global in &components.globals {
        best = best.earliest(global.get_event(particle, state));
    }

    neighbourhood.particle_local_neighbourhood(particle, &mut |local| {
        let local = &components.locals[local];
        if local.applies_to(particle) {
            best = best.earliest(local.get_event(particle, state));
        }
    });

    let mut missing = None;
    neighbourhood.particle_neighbourhood(particle, &mut |other| {
        state.update_particle(other);
        match components.interaction_for(particle, other) {
            Some(id) => {
                best = best.earliest(components.interactions[id].get_event(particle, other, state));
            }
            None => {
                missing.get_or_insert((particle, other));
            }
        }
    });
    if let Some((p1, p2)) = missing {
        return Err(EngineError::MissingInteraction(p1, p2));
    }

    if best.dt.is_nan() {
        debug_assert!(false, "NaN event time for particle {particle}");
        return Err(EngineError::InvalidEventTime {
            dt: best.dt,
            particles: best.source.particles(),
        });
    }
    Ok(best)
}

fn recompute(
    source: &EventSource,
    state: &SimState,
    components: &Components,
) -> Result<Event, EngineError> {
    let event = match *source {
        EventSource::Interaction { id, p1, p2 } => {
            components.interactions[id].get_event(p1, p2, state)
        }
        EventSource::Global { id, particle } => components.globals[id].get_event(particle, state),
        EventSource::Local { id, particle } => components.locals[id].get_event(particle, state),
        EventSource::System { id } => components.systems[id].next_event(),
    };
    if event.dt.is_nan() {
        debug_assert!(false, "NaN event time from {source:?}");
        return Err(EngineError::InvalidEventTime {
            dt: event.dt,
            particles: source.particles(),
        });
    }
    Ok(event)
}

fn dispatch(
    event: &Event,
    state: &mut SimState,
    components: &mut Components,
) -> Result<EventData, EngineError> {
    match event.source {
        EventSource::Interaction { id, .. } => components.interactions[id].run_event(event, state),
        EventSource::Global { id, .. } => components.globals[id].run_event(event, state),
        EventSource::Local { id, .. } => components.locals[id].run_event(event, state),
        EventSource::System { id } => components.systems[id].run_event(state),
    }
}

fn make_key(event: &Event, clock: f64, slot: Slot) -> Result<QueueKey, EngineError> {
    let time = NotNan::new(clock + event.dt).map_err(|_| {
        debug_assert!(false, "NaN event time from {:?}", event.source);
        EngineError::InvalidEventTime {
            dt: event.dt,
            particles: event.source.particles(),
        }
    })?;
    Ok((
        time,
        event.source.rank(),
        event.source.participant_key(),
        event.source.source_id(),
        slot,
    ))
}

/// Time from the clock to a queued event, rejecting events in the past and the absence of
/// any event at all.
fn checked_dt(key: &QueueKey, state: &SimState) -> Result<f64, EngineError> {
    let time = key.0.into_inner();
    if time.is_infinite() {
        return Err(EngineError::Consistency(
            "no event source predicts any further event".to_string(),
        ));
    }
    let dt = time - state.clock();
    if dt < -DRIFT_TOLERANCE {
        let particles = match key.4 {
            Slot::Particle(index) => vec![ParticleId(index)],
            Slot::System(_) => Vec::new(),
        };
        return Err(EngineError::InvalidEventTime { dt, particles });
    }
    Ok(dt.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::boundary::BoundaryCondition;
    use crate::core::io::document::InteractionConfig;
    use crate::core::models::particle::{Orientation, Particle};
    use crate::core::models::range::{PairRange, ParticleRange};
    use crate::core::models::species::Species;
    use crate::engine::context::GlobalContext;
    use crate::engine::dynamics::Dynamics;
    use crate::engine::event::EventType;
    use crate::engine::globals::Global;
    use crate::engine::globals::cells::Cells;
    use crate::engine::interactions::dumbbells::Dumbbells;
    use crate::engine::interactions::hard_sphere::HardSphere;
    use crate::engine::interactions::square_well::SquareWell;
    use crate::engine::interactions::{Interaction, fixtures};
    use crate::engine::systems::halt::Halt;
    use nalgebra::Vector3;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    const EDGE: f64 = 10.0;

    /// A 4x4x4 lattice of unit spheres with seeded random velocities.
    fn gas(seed: u64, speed_scale: f64) -> SimState {
        lattice(seed, speed_scale, Species::new("A", 1.0, ParticleRange::All))
    }

    /// The same lattice for any unit-mass species. Species with inertia also get a random
    /// axis and spin.
    fn lattice(seed: u64, speed_scale: f64, species: Species) -> SimState {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let oriented = species.inertia_constant.is_some();
        let mut particles = Vec::new();
        for i in 0..64 {
            let coords = [i % 4, (i / 4) % 4, i / 16];
            let position = Vector3::from_fn(|d, _| coords[d] as f64 * 2.5 - 3.75);
            let velocity = Vector3::from_fn(|_, _| rng.gen_range(-1.0..1.0) * speed_scale);
            let mut particle = Particle::new(ParticleId(i), position, velocity);
            if oriented {
                let axis = Vector3::new(1.0, rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
                let spin = Vector3::from_fn(|_, _| rng.gen_range(-1.0..1.0));
                particle = particle.with_orientation(Orientation::new(axis, spin));
            }
            particles.push(particle);
        }
        let mut state = SimState::new(
            particles,
            vec![species],
            Vector3::new(EDGE, EDGE, EDGE),
            BoundaryCondition::Periodic,
            Dynamics::Newtonian,
            seed,
        );
        state.assign_species().unwrap();
        state
    }

    fn components(state: &SimState, with_cells: bool) -> Components {
        let mut components = Components::default();
        let mut hs = HardSphere::new("Bulk", 1.0, 1.0, PairRange::All);
        hs.initialise(&crate::engine::context::InteractionContext {
            id: 0,
            state,
            governs: &fixtures::governs_all,
        })
        .unwrap();
        components.interactions.push(Box::new(hs));
        if with_cells {
            let mut cells = Cells::new("Cells", None, false);
            cells
                .initialise(
                    0,
                    &GlobalContext {
                        state,
                        locals: &[],
                        longest_interaction: 1.0,
                    },
                )
                .unwrap();
            components.globals.push(Box::new(cells));
        }
        components
    }

    fn single(state: &SimState, mut interaction: Box<dyn Interaction>) -> Components {
        interaction
            .initialise(&crate::engine::context::InteractionContext {
                id: 0,
                state,
                governs: &fixtures::governs_all,
            })
            .unwrap();
        Components {
            interactions: vec![interaction],
            ..Components::default()
        }
    }

    fn total_energy(state: &SimState, components: &Components) -> f64 {
        state.total_kinetic_energy()
            + components
                .interactions
                .iter()
                .map(|interaction| interaction.internal_energy())
                .sum::<f64>()
    }

    /// Runs `events` events, requiring the clock to keep moving and the energy, kinetic plus
    /// internal, to stay put.
    fn run_conserving(state: &mut SimState, components: &mut Components, events: usize) {
        let mut scheduler = Scheduler::new();
        scheduler.initialise(state, components).unwrap();
        let energy = total_energy(state, components);
        let start = state.clock();

        let (mut stalled, mut longest_stall) = (0usize, 0usize);
        for _ in 0..events {
            let before = state.clock();
            let dispatched = scheduler.run_next_event(state, components).unwrap();
            assert!(dispatched.event.dt >= 0.0);
            assert!(state.clock() >= before);
            if state.clock() > before {
                stalled = 0;
            } else {
                stalled += 1;
                longest_stall = longest_stall.max(stalled);
            }
        }
        assert!(longest_stall < 10, "{longest_stall} events in a row at one instant");
        assert!(state.clock() > start);

        state.update_all_particles();
        let drift = (total_energy(state, components) - energy).abs();
        assert!(drift < 1e-8 * energy.abs().max(1.0), "energy drifted by {drift}");
    }

    /// Every pair clearly inside `edge` is captured and every pair clearly outside is not.
    fn assert_captures_match_separations(state: &SimState, components: &Components, edge: f64) {
        let captured: HashSet<(ParticleId, ParticleId)> =
            match components.interactions[0].to_config(&state.units) {
                InteractionConfig::SquareWell(config) => config.captured,
                InteractionConfig::Dumbbells(config) => config.captured,
                other => panic!("no capture map on {other:?}"),
            }
            .unwrap_or_default()
            .into_iter()
            .map(|[a, b]| (a.min(b), a.max(b)))
            .collect();
        let mut inside = 0;
        for a in state.particle_ids() {
            for b in state.particle_ids().filter(|&b| b > a) {
                let distance = state.pair(a, b).rij.norm();
                if (distance - edge).abs() < 1e-6 {
                    continue;
                }
                inside += usize::from(distance < edge);
                assert_eq!(
                    captured.contains(&(a, b)),
                    distance < edge,
                    "pair ({a}, {b}) at {distance}"
                );
            }
        }
        assert!(inside > 0);
    }

    fn brute_force_minimum(p: ParticleId, state: &SimState, components: &Components) -> f64 {
        let mut best = f64::INFINITY;
        for global in &components.globals {
            best = best.min(global.get_event(p, state).dt);
        }
        for q in state.particle_ids().filter(|&q| q != p) {
            best = best.min(components.interactions[0].get_event(p, q, state).dt);
        }
        best
    }

    fn assert_minimal(state: &mut SimState, scheduler: &Scheduler, components: &Components) {
        state.update_all_particles();
        for p in state.particle_ids() {
            let cached = scheduler.cached_time(p).unwrap() - state.clock();
            let expected = brute_force_minimum(p, state, components);
            assert!(
                (cached - expected).abs() <= 1e-9 * expected.abs().max(1.0),
                "particle {p}: cached {cached}, expected {expected}"
            );
        }
    }

    #[test]
    fn entries_are_minimal_without_cells() {
        let mut state = gas(11, 1.0);
        let components = components(&state, false);
        let mut scheduler = Scheduler::new();
        scheduler.initialise(&mut state, &components).unwrap();
        assert_eq!(scheduler.phase(), SchedulerPhase::Initialised);
        assert_minimal(&mut state, &scheduler, &components);
    }

    #[test]
    fn entries_are_minimal_with_cells() {
        let mut state = gas(12, 1.0);
        let components = components(&state, true);
        let mut scheduler = Scheduler::new();
        scheduler.initialise(&mut state, &components).unwrap();
        assert_minimal(&mut state, &scheduler, &components);
    }

    #[test]
    fn full_update_restores_minimality_after_a_kick() {
        let mut state = gas(13, 1.0);
        let components = components(&state, true);
        let mut scheduler = Scheduler::new();
        scheduler.initialise(&mut state, &components).unwrap();

        let p = ParticleId(5);
        state.set_velocity(p, Vector3::new(3.0, -2.0, 0.5));
        scheduler.full_update(p, &mut state, &components).unwrap();
        let cached = scheduler.cached_time(p).unwrap() - state.clock();
        assert!((cached - brute_force_minimum(p, &state, &components)).abs() < 1e-9);
    }

    #[test]
    fn time_is_monotonic_and_energy_conserved() {
        let mut state = gas(14, 1.0);
        let mut components = components(&state, true);
        let mut scheduler = Scheduler::new();
        scheduler.initialise(&mut state, &components).unwrap();
        let energy = state.total_kinetic_energy();

        let mut last = state.clock();
        for _ in 0..2000 {
            let dispatched = scheduler.run_next_event(&mut state, &mut components).unwrap();
            assert!(dispatched.event.dt >= 0.0);
            assert!(state.clock() >= last);
            last = state.clock();
        }
        assert_eq!(scheduler.phase(), SchedulerPhase::Running);
        state.update_all_particles();
        assert!((state.total_kinetic_energy() - energy).abs() < 1e-8 * energy);
        for a in state.particle_ids() {
            for b in state.particle_ids().filter(|&b| b > a) {
                assert!(!components.interactions[0].overlaps(a, b, &state));
            }
        }
    }

    #[test]
    fn square_well_gas_keeps_moving_and_conserves_energy() {
        let mut state = gas(31, 1.0);
        let mut components = single(
            &state,
            Box::new(SquareWell::new("Well", 1.0, 1.5, 1.0, 1.0, PairRange::All)),
        );
        run_conserving(&mut state, &mut components, 3000);
        assert!(components.interactions[0].internal_energy() < 0.0);
        assert_captures_match_separations(&state, &components, 1.5);
        for a in state.particle_ids() {
            for b in state.particle_ids().filter(|&b| b > a) {
                assert!(!components.interactions[0].overlaps(a, b, &state));
            }
        }
    }

    #[test]
    fn dumbbell_gas_keeps_moving_and_conserves_energy() {
        let species = Species::new("A", 1.0, ParticleRange::All).with_inertia(0.1);
        let mut state = lattice(32, 1.0, species);
        let mut components = single(
            &state,
            Box::new(Dumbbells::new("Dumbbells", 1.0, 0.5, 1.0, PairRange::All)),
        );
        run_conserving(&mut state, &mut components, 3000);
        assert_captures_match_separations(&state, &components, 2.0);
        for a in state.particle_ids() {
            for b in state.particle_ids().filter(|&b| b > a) {
                assert!(!components.interactions[0].overlaps(a, b, &state));
            }
        }
    }

    #[test]
    fn identical_runs_produce_identical_event_sequences() {
        let trace = |seed| {
            let mut state = gas(seed, 1.0);
            let mut components = components(&state, true);
            let mut scheduler = Scheduler::new();
            scheduler.initialise(&mut state, &components).unwrap();
            (0..500)
                .map(|_| {
                    let d = scheduler.run_next_event(&mut state, &mut components).unwrap();
                    (d.data.event_type, d.event.source.particles(), d.event.dt)
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(trace(21), trace(21));
    }

    #[test]
    fn head_on_pair_collides_at_the_analytic_time() {
        let mut state = fixtures::head_on(2.1, 2.0);
        let mut components = Components::default();
        components
            .interactions
            .push(Box::new(HardSphere::new("Bulk", 1.0, 1.0, PairRange::All)));
        let mut scheduler = Scheduler::new();
        scheduler.initialise(&mut state, &components).unwrap();
        let expected = 0.55;
        let dt = scheduler.next_event_time(&state).unwrap();
        assert!((dt - expected).abs() <= 1e-9 * expected);

        let dispatched = scheduler.run_next_event(&mut state, &mut components).unwrap();
        assert_eq!(dispatched.data.event_type, EventType::Core);
        assert!((dispatched.event.dt - expected).abs() <= 1e-9 * expected);
    }

    #[test]
    fn rescaled_times_match_a_fresh_schedule() {
        let mut state = gas(15, 1.0);
        let components = components(&state, false);
        let mut scheduler = Scheduler::new();
        scheduler.initialise(&mut state, &components).unwrap();

        for particle in &mut state.particles {
            particle.velocity *= 2.0;
        }
        scheduler.rescale_times(0.5, &state).unwrap();

        let mut scaled = gas(15, 2.0);
        let mut fresh = Scheduler::new();
        fresh.initialise(&mut scaled, &components).unwrap();
        for p in state.particle_ids() {
            let a = scheduler.cached_time(p).unwrap();
            let b = fresh.cached_time(p).unwrap();
            assert!((a - b).abs() <= 1e-14 * b.abs().max(1.0), "{p}: {a} vs {b}");
            assert_eq!(
                scheduler.cached_event(p).unwrap().source,
                fresh.cached_event(p).unwrap().source
            );
        }
    }

    #[test]
    fn systems_share_the_queue_and_win_ties() {
        let mut state = fixtures::head_on(2.1, 2.0);
        let mut components = Components::default();
        components
            .interactions
            .push(Box::new(HardSphere::new("Bulk", 1.0, 1.0, PairRange::All)));
        let contact = components.interactions[0]
            .get_event(ParticleId(0), ParticleId(1), &state)
            .dt;
        components.systems.push(Box::new(Halt::new("Stop", contact)));
        let mut scheduler = Scheduler::new();
        scheduler.initialise(&mut state, &components).unwrap();

        let first = scheduler.run_next_event(&mut state, &mut components).unwrap();
        assert_eq!(first.data.event_type, EventType::Halt);
        let second = scheduler.run_next_event(&mut state, &mut components).unwrap();
        assert_eq!(second.data.event_type, EventType::Core);
    }

    #[test]
    fn missing_pair_interaction_is_reported() {
        let mut state = fixtures::head_on(2.1, 2.0);
        let components = Components {
            interactions: vec![Box::new(HardSphere::new(
                "Self",
                1.0,
                1.0,
                PairRange::Single {
                    range: ParticleRange::Single { id: ParticleId(0) },
                },
            ))],
            ..Components::default()
        };
        let err = Scheduler::new()
            .initialise(&mut state, &components)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingInteraction(..)));
    }
}

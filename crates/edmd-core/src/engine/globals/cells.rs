use super::{Global, single_participant};
use crate::core::io::document::GlobalConfig;
use crate::core::models::ids::ParticleId;
use crate::core::models::units::Units;
use crate::core::physics::roots::plane_crossing_time;
use crate::engine::context::GlobalContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::neighbourhood::Neighbourhood;
use crate::engine::neighbourhood::grid::CellGrid;
use crate::engine::state::SimState;
use tracing::{debug, info};

/// Cell-list neighbourhood. Predicts when each particle leaves its cell and moves it to the
/// adjacent one when it does.
#[derive(Debug, Clone)]
pub struct Cells {
    name: String,
    min_cell_size: Option<f64>,
    limit_cells: bool,
    id: usize,
    grid: Option<CellGrid>,
}

/// Face a particle will leave its cell through.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    dt: f64,
    dim: usize,
    step: i64,
}

impl Cells {
    pub fn new(name: impl Into<String>, min_cell_size: Option<f64>, limit_cells: bool) -> Self {
        Self {
            name: name.into(),
            min_cell_size,
            limit_cells,
            id: 0,
            grid: None,
        }
    }

    pub fn grid(&self) -> Option<&CellGrid> {
        self.grid.as_ref()
    }

    fn build(&mut self, ctx: &GlobalContext<'_>) -> Result<(), EngineError> {
        let state = ctx.state;
        let min_size = self
            .min_cell_size
            .map_or(ctx.longest_interaction, |size| size.max(ctx.longest_interaction));
        let mut grid = CellGrid::new(
            state.primary_cell,
            min_size,
            self.limit_cells,
            state.boundary.is_periodic(),
            state.n(),
        )?;
        grid.place_all(state.particles.iter().map(|p| &p.position));
        grid.attach_locals(ctx.locals.len(), |local, origin, width| {
            ctx.locals[local].touches_cell(origin, width)
        });
        self.grid = Some(grid);
        Ok(())
    }

    fn next_transition(&self, particle: ParticleId, state: &SimState) -> Option<Transition> {
        let grid = self.grid.as_ref()?;
        let cell = grid.cell_of(particle)?;
        let p = state.particle(particle);
        let rel = grid.relative_position(cell, &p.position);
        let accel = state.dynamics.acceleration(p);
        let width = grid.lattice_width();
        let counts = grid.cell_count();

        let mut best: Option<Transition> = None;
        for dim in 0..3 {
            if counts[dim] == 1 {
                continue;
            }
            let down = plane_crossing_time(rel[dim], p.velocity[dim], accel[dim]);
            let up = plane_crossing_time(width[dim] - rel[dim], -p.velocity[dim], -accel[dim]);
            for (dt, step) in [(down, -1), (up, 1)] {
                if dt.is_finite() && best.is_none_or(|b| dt < b.dt) {
                    best = Some(Transition { dt, dim, step });
                }
            }
        }
        best
    }
}

impl Global for Cells {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, ctx: &GlobalContext<'_>) -> Result<(), EngineError> {
        self.id = id;
        self.build(ctx)?;
        if let Some(grid) = &self.grid {
            info!(
                global = %self.name,
                cells = grid.len(),
                supported_range = grid.supported_range(),
                "Cell neighbourhood initialised."
            );
        }
        Ok(())
    }

    fn get_event(&self, particle: ParticleId, state: &SimState) -> Event {
        let source = EventSource::Global {
            id: self.id,
            particle,
        };
        match self.next_transition(particle, state) {
            Some(t) => Event::new(source, EventType::Cell, t.dt),
            None => Event::none(source),
        }
    }

    fn run_event(&mut self, event: &Event, state: &mut SimState) -> Result<EventData, EngineError> {
        let particle = single_participant(event, &self.name)?;
        let transition = self.next_transition(particle, state).ok_or_else(|| {
            EngineError::Consistency(format!("particle {particle} has no cell to leave"))
        })?;
        let grid = self
            .grid
            .as_mut()
            .ok_or_else(|| EngineError::Consistency(format!("cells {} not built", self.name)))?;
        grid.shift_particle(particle, transition.dim, transition.step)
            .ok_or_else(|| EngineError::Consistency(format!("particle {particle} lost its cell")))?;
        Ok(EventData::new(EventType::Cell).with_reschedule([particle]))
    }

    fn neighbourhood(&self) -> Option<&dyn Neighbourhood> {
        self.grid.as_ref().map(|grid| grid as &dyn Neighbourhood)
    }

    fn supported_range(&self) -> Option<f64> {
        self.grid.as_ref().map(CellGrid::supported_range)
    }

    fn rebuild(&mut self, ctx: &GlobalContext<'_>) -> Result<(), EngineError> {
        self.build(ctx)?;
        debug!(global = %self.name, "Rebuilt cell lattice.");
        Ok(())
    }

    fn to_config(&self, units: &Units) -> GlobalConfig {
        GlobalConfig::Cells {
            name: self.name.clone(),
            min_cell_size: self.min_cell_size.map(|size| size / units.length),
            limit_cells: self.limit_cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::boundary::BoundaryCondition;
    use crate::core::models::particle::Particle;
    use crate::engine::interactions::fixtures;
    use nalgebra::Vector3;

    fn setup(particles: Vec<Particle>) -> (Cells, SimState) {
        let mut state = fixtures::state(particles);
        state.boundary = BoundaryCondition::Periodic;
        let mut cells = Cells::new("Cells", None, false);
        cells
            .initialise(
                5,
                &GlobalContext {
                    state: &state,
                    locals: &[],
                    longest_interaction: 2.0,
                },
            )
            .unwrap();
        (cells, state)
    }

    #[test]
    fn transition_time_is_distance_to_the_nearest_face() {
        // Edge 20 with cells of width 2: the cell of x = 0.5 spans [0, 2).
        let (cells, state) = setup(vec![Particle::new(
            ParticleId(0),
            Vector3::new(0.5, 0.1, 0.1),
            Vector3::new(1.0, 0.0, 0.0),
        )]);
        let event = cells.get_event(ParticleId(0), &state);
        assert_eq!(event.event_type, EventType::Cell);
        assert!((event.dt - 1.5).abs() < 1e-12);
        assert_eq!(event.source.source_id(), 5);
    }

    #[test]
    fn transition_moves_the_particle_and_wraps() {
        let (mut cells, mut state) = setup(vec![Particle::new(
            ParticleId(0),
            Vector3::new(-9.5, 0.1, 0.1),
            Vector3::new(-1.0, 0.0, 0.0),
        )]);
        let before = cells.grid().unwrap().cell_of(ParticleId(0)).unwrap();
        let event = cells.get_event(ParticleId(0), &state);
        assert!((event.dt - 0.5).abs() < 1e-12);
        state.advance(event.dt);
        state.update_all_particles();
        let data = cells.run_event(&event, &mut state).unwrap();
        assert_eq!(data.reschedule, vec![ParticleId(0)]);

        let grid = cells.grid().unwrap();
        let after = grid.cell_of(ParticleId(0)).unwrap();
        assert_ne!(before, after);
        assert_eq!(grid.cell_coords(after)[0], 9);
        let next = cells.get_event(ParticleId(0), &state);
        assert!((next.dt - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rebuild_follows_the_requested_range() {
        let (mut cells, state) = setup(vec![Particle::new(
            ParticleId(0),
            Vector3::zeros(),
            Vector3::zeros(),
        )]);
        assert_eq!(cells.supported_range(), Some(2.0));
        cells
            .rebuild(&GlobalContext {
                state: &state,
                locals: &[],
                longest_interaction: 4.5,
            })
            .unwrap();
        assert_eq!(cells.supported_range(), Some(5.0));
        assert!(cells.get_event(ParticleId(0), &state).is_none());
    }
}

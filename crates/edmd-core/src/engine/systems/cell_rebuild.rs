use super::System;
use crate::core::io::document::SystemConfig;
use crate::engine::context::SystemContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Directive, Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use std::any::Any;
use tracing::debug;

/// Under compression the interaction range grows without bound. This system fires just
/// before the longest interaction outgrows the cell lattice, asking for a rebuild.
#[derive(Debug, Clone)]
pub struct CellRebuild {
    name: String,
    dt: f64,
    id: usize,
}

impl CellRebuild {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dt: f64::INFINITY,
            id: 0,
        }
    }

    fn schedule(&mut self, ctx: &SystemContext<'_>) -> Result<(), EngineError> {
        let growth_rate = ctx.state.dynamics.growth_rate();
        let supported = ctx
            .globals
            .iter()
            .filter_map(|global| global.supported_range())
            .reduce(f64::min);
        let (Some(supported), true) = (supported, growth_rate > 0.0) else {
            self.dt = f64::INFINITY;
            return Ok(());
        };

        // Time at which base * (1 + rate * t) reaches the supported range.
        let limit = (supported / ctx.base_longest_interaction - 1.0) / growth_rate;
        let dt = limit - ctx.state.system_time;
        if dt <= 0.0 {
            return Err(EngineError::Consistency(format!(
                "cell lattice supports {supported} but interactions already reach {}",
                ctx.base_longest_interaction * ctx.state.dynamics.growth_factor(ctx.state.system_time)
            )));
        }
        self.dt = dt;
        debug!(system = %self.name, dt, supported, "Scheduled cell rebuild.");
        Ok(())
    }
}

impl System for CellRebuild {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        self.id = id;
        self.schedule(ctx)
    }

    fn next_event(&self) -> Event {
        let source = EventSource::System { id: self.id };
        if self.dt.is_finite() {
            Event::new(source, EventType::Rebuild, self.dt)
        } else {
            Event::none(source)
        }
    }

    fn stream(&mut self, dt: f64) {
        self.dt -= dt;
    }

    fn run_event(&mut self, _state: &mut SimState) -> Result<EventData, EngineError> {
        self.dt = f64::INFINITY;
        Ok(EventData::new(EventType::Rebuild).with_directive(Directive::RebuildNeighbourhood))
    }

    fn neighbourhood_rebuilt(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        self.schedule(ctx)
    }

    fn to_config(&self, _state: &SimState) -> Option<SystemConfig> {
        None
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::boundary::BoundaryCondition;
    use crate::engine::context::GlobalContext;
    use crate::engine::dynamics::Dynamics;
    use crate::engine::globals::Global;
    use crate::engine::globals::cells::Cells;
    use crate::engine::interactions::fixtures;

    #[test]
    fn fires_when_growth_reaches_the_cell_width() {
        let mut state = fixtures::state(Vec::new());
        state.boundary = BoundaryCondition::Periodic;
        state.dynamics = Dynamics::Compression { growth_rate: 0.25 };
        let mut cells = Cells::new("Cells", None, false);
        cells
            .initialise(
                0,
                &GlobalContext {
                    state: &state,
                    locals: &[],
                    longest_interaction: 2.0,
                },
            )
            .unwrap();
        let globals: Vec<Box<dyn Global>> = vec![Box::new(cells)];

        let mut rebuild = CellRebuild::new("CellRebuild");
        rebuild
            .initialise(
                1,
                &mut SystemContext {
                    state: &mut state,
                    globals: &globals,
                    base_longest_interaction: 1.0,
                },
            )
            .unwrap();
        // 1 + 0.25 t = 2
        assert_eq!(rebuild.next_event().dt, 4.0);
        let data = rebuild.run_event(&mut state).unwrap();
        assert_eq!(data.directive, Some(Directive::RebuildNeighbourhood));
        assert!(rebuild.next_event().is_none());
        assert_eq!(rebuild.to_config(&state), None);
    }
}

use super::System;
use crate::core::io::document::SystemConfig;
use crate::engine::context::SystemContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Directive, Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use std::any::Any;
use tracing::info;

/// Shuts the simulation down once `dt` has elapsed.
#[derive(Debug, Clone)]
pub struct Halt {
    name: String,
    dt: f64,
    id: usize,
}

impl Halt {
    pub fn new(name: impl Into<String>, dt: f64) -> Self {
        Self {
            name: name.into(),
            dt,
            id: 0,
        }
    }
}

impl System for Halt {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, _ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        self.id = id;
        Ok(())
    }

    fn next_event(&self) -> Event {
        let source = EventSource::System { id: self.id };
        if self.dt.is_finite() {
            Event::new(source, EventType::Halt, self.dt)
        } else {
            Event::none(source)
        }
    }

    fn stream(&mut self, dt: f64) {
        self.dt -= dt;
    }

    fn run_event(&mut self, state: &mut SimState) -> Result<EventData, EngineError> {
        self.dt = f64::INFINITY;
        info!(
            system = %self.name,
            time = state.system_time,
            events = state.event_count,
            "Halt reached."
        );
        Ok(EventData::new(EventType::Halt).with_directive(Directive::Shutdown))
    }

    fn rearm(&mut self, dt: f64) -> bool {
        self.dt = dt;
        true
    }

    fn to_config(&self, state: &SimState) -> Option<SystemConfig> {
        self.dt.is_finite().then(|| SystemConfig::Halt {
            name: self.name.clone(),
            time: self.dt / state.units.time,
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

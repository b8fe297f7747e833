use super::System;
use crate::core::io::document::SystemConfig;
use crate::engine::context::SystemContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Directive, Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use std::any::Any;

#[derive(Debug, Clone)]
pub struct Ticker {
    name: String,
    period: f64,
    dt: f64,
    id: usize,
}

impl Ticker {
    pub fn new(name: impl Into<String>, period: f64) -> Self {
        Self {
            name: name.into(),
            period,
            dt: period,
            id: 0,
        }
    }
}

impl System for Ticker {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, id: usize, _ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        self.id = id;
        Ok(())
    }

    fn next_event(&self) -> Event {
        Event::new(EventSource::System { id: self.id }, EventType::Ticker, self.dt)
    }

    fn stream(&mut self, dt: f64) {
        self.dt -= dt;
    }

    fn run_event(&mut self, _state: &mut SimState) -> Result<EventData, EngineError> {
        self.dt += self.period;
        Ok(EventData::new(EventType::Ticker).with_directive(Directive::Tick))
    }

    fn is_ticker(&self) -> bool {
        true
    }

    fn set_period(&mut self, period: f64) -> bool {
        self.dt += period - self.period;
        self.period = period;
        true
    }

    fn replica_exchange(&mut self, other: &mut dyn System) {
        if let Some(other) = other.as_any_mut().downcast_mut::<Ticker>() {
            std::mem::swap(&mut self.dt, &mut other.dt);
            std::mem::swap(&mut self.period, &mut other.period);
        }
    }

    fn to_config(&self, state: &SimState) -> Option<SystemConfig> {
        Some(SystemConfig::Ticker {
            name: self.name.clone(),
            period: self.period / state.units.time,
        })
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
    fn fires_every_period() {
        let mut ticker = Ticker::new("SystemTicker", 2.0);
        let mut state = fixtures::state(Vec::new());
        ticker.stream(1.5);
        assert_eq!(ticker.next_event().dt, 0.5);
        ticker.stream(0.5);
        let data = ticker.run_event(&mut state).unwrap();
        assert_eq!(data.directive, Some(Directive::Tick));
        assert_eq!(ticker.next_event().dt, 2.0);
        assert!(ticker.set_period(1.0));
        assert_eq!(ticker.next_event().dt, 1.0);
    }

    #[test]
    fn replica_exchange_swaps_countdown_and_period() {
        let mut a = Ticker::new("SystemTicker", 2.0);
        let mut b = Ticker::new("SystemTicker", 5.0);
        a.stream(0.5);
        b.stream(1.0);
        a.replica_exchange(&mut b);
        assert_eq!(a.next_event().dt, 4.0);
        assert_eq!(b.next_event().dt, 1.5);

        let mut state = fixtures::state(Vec::new());
        a.stream(4.0);
        a.run_event(&mut state).unwrap();
        assert_eq!(a.next_event().dt, 5.0);
    }
}

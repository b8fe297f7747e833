use super::OutputPlugin;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource, EventType};
use crate::engine::state::SimState;
use std::any::Any;
use std::collections::BTreeMap;
use std::time::Instant;
use toml::Table;

/// Event counts by type, mean free time and throughput.
#[derive(Debug, Clone)]
pub struct Misc {
    counts: BTreeMap<EventType, u64>,
    pair_events: u64,
    single_events: u64,
    started: Option<Instant>,
    start_count: u64,
}

impl Misc {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            pair_events: 0,
            single_events: 0,
            started: None,
            start_count: 0,
        }
    }

    pub fn count(&self, event_type: EventType) -> u64 {
        self.counts.get(&event_type).copied().unwrap_or(0)
    }

    /// Average time between physical events of one particle, or infinity before any have
    /// happened.
    pub fn mean_free_time(&self, state: &SimState) -> f64 {
        let collisions = 2 * self.pair_events + self.single_events;
        if collisions == 0 {
            f64::INFINITY
        } else {
            state.system_time * state.n() as f64 / collisions as f64
        }
    }

    fn events_per_second(&self, state: &SimState) -> f64 {
        let Some(started) = self.started else {
            return 0.0;
        };
        let elapsed = started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (state.event_count - self.start_count) as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for Misc {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputPlugin for Misc {
    fn name(&self) -> &'static str {
        "Misc"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn initialise(&mut self, state: &SimState) -> Result<(), EngineError> {
        self.started = Some(Instant::now());
        self.start_count = state.event_count;
        Ok(())
    }

    fn event_update(&mut self, event: &Event, data: &EventData, _state: &SimState) {
        *self.counts.entry(data.event_type).or_default() += 1;
        if data.event_type.is_virtual() {
            return;
        }
        match event.source {
            EventSource::Interaction { .. } => self.pair_events += 1,
            EventSource::Global { .. } | EventSource::Local { .. } => self.single_events += 1,
            EventSource::System { .. } => {}
        }
    }

    fn periodic_output(&self, state: &SimState) -> Option<String> {
        Some(format!(
            "events {}, t {:.6e}, mft {:.6e}, {:.3e} ev/s",
            state.event_count,
            state.system_time / state.units.time,
            self.mean_free_time(state) / state.units.time,
            self.events_per_second(state)
        ))
    }

    fn output(&self, state: &SimState) -> Table {
        let mut counts = Table::new();
        for (event_type, count) in &self.counts {
            counts.insert(event_type.as_str().to_string(), (*count as i64).into());
        }
        let mut table = Table::new();
        table.insert("events".into(), (state.event_count as i64).into());
        table.insert("time".into(), (state.system_time / state.units.time).into());
        let mft = self.mean_free_time(state);
        if mft.is_finite() {
            table.insert("mean-free-time".into(), (mft / state.units.time).into());
        }
        table.insert(
            "events-per-second".into(),
            self.events_per_second(state).into(),
        );
        table.insert("ensemble".into(), state.ensemble.name().into());
        table.insert("event-counts".into(), counts.into());
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
    use crate::core::models::ids::ParticleId;
    use crate::engine::interactions::fixtures;

    #[test]
    fn mean_free_time_counts_pair_events_twice() {
        let mut state = fixtures::head_on(2.0, 1.0);
        let mut misc = Misc::new();
        misc.initialise(&state).unwrap();
        let pair = Event::new(
            EventSource::Interaction {
                id: 0,
                p1: ParticleId(0),
                p2: ParticleId(1),
            },
            EventType::Core,
            1.0,
        );
        let cell = Event::new(
            EventSource::Global {
                id: 0,
                particle: ParticleId(0),
            },
            EventType::Cell,
            1.0,
        );
        misc.event_update(&pair, &EventData::new(EventType::Core), &state);
        misc.event_update(&cell, &EventData::new(EventType::Cell), &state);
        state.system_time = 4.0;
        state.event_count = 2;

        assert_eq!(misc.count(EventType::Core), 1);
        assert_eq!(misc.count(EventType::Cell), 1);
        assert_eq!(misc.mean_free_time(&state), 4.0);
        let output = misc.output(&state);
        assert_eq!(output["events"].as_integer(), Some(2));
        assert_eq!(output["event-counts"]["CELL"].as_integer(), Some(1));
    }
}

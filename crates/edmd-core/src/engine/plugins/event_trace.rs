use super::{OutputPlugin, PluginSpec};
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventData, EventSource};
use crate::engine::state::SimState;
use serde::Serialize;
use std::any::Any;
use std::path::PathBuf;
use toml::Table;
use tracing::info;

const DEFAULT_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub event: u64,
    pub time: f64,
    pub dt: f64,
    pub source: &'static str,
    pub kind: String,
    pub p1: Option<usize>,
    pub p2: Option<usize>,
}

/// Records the first `limit` dispatched events and writes them as CSV on finalise.
#[derive(Debug, Clone)]
pub struct EventTrace {
    path: Option<PathBuf>,
    limit: usize,
    records: Vec<TraceRecord>,
    last_time: f64,
}

impl EventTrace {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            path: spec.option::<PathBuf>("file")?,
            limit: spec.option::<usize>("limit")?.unwrap_or(DEFAULT_LIMIT),
            records: Vec::new(),
            last_time: 0.0,
        })
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    fn write_csv(&self, path: &PathBuf) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl OutputPlugin for EventTrace {
    fn name(&self) -> &'static str {
        "EventTrace"
    }

    fn initialise(&mut self, state: &SimState) -> Result<(), EngineError> {
        self.records.clear();
        self.last_time = state.system_time;
        Ok(())
    }

    fn event_update(&mut self, event: &Event, data: &EventData, state: &SimState) {
        if self.records.len() >= self.limit {
            return;
        }
        let (source, p1, p2) = match event.source {
            EventSource::Interaction { p1, p2, .. } => {
                ("interaction", Some(p1.index()), Some(p2.index()))
            }
            EventSource::Global { particle, .. } => ("global", Some(particle.index()), None),
            EventSource::Local { particle, .. } => ("local", Some(particle.index()), None),
            EventSource::System { .. } => ("system", None, None),
        };
        let time = state.system_time / state.units.time;
        self.records.push(TraceRecord {
            event: state.event_count,
            time,
            dt: time - self.last_time / state.units.time,
            source,
            kind: data.event_type.to_string(),
            p1,
            p2,
        });
        self.last_time = state.system_time;
    }

    fn output(&self, _state: &SimState) -> Table {
        let mut table = Table::new();
        table.insert("recorded".into(), (self.records.len() as i64).into());
        if let Some(path) = &self.path {
            table.insert("file".into(), path.display().to_string().into());
        }
        table
    }

    fn finalise(&mut self, _state: &SimState) -> Result<(), EngineError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        self.write_csv(&path).map_err(|e| {
            EngineError::Output(format!("cannot write event trace '{}': {e}", path.display()))
        })?;
        info!(
            path = %path.display(),
            records = self.records.len(),
            "Event trace written"
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

use crate::core::models::ids::{ParticleId, ordered_pair};
use nalgebra::Vector3;
use std::cmp::Ordering;
use std::fmt;

/// Discriminant of an event, both as predicted and as resolved by its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    None,
    Core,
    WellIn,
    WellOut,
    WellKeUp,
    WellKeDown,
    Bounce,
    Wall,
    Cell,
    Virtual,
    VirtualParabola,
    Ticker,
    Halt,
    Thermostat,
    Rebuild,
}

impl EventType {
    /// Bookkeeping events that do not change any physical observable.
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            Self::None
                | Self::Cell
                | Self::Virtual
                | Self::VirtualParabola
                | Self::Ticker
                | Self::Halt
                | Self::Rebuild
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Core => "CORE",
            Self::WellIn => "WELL_IN",
            Self::WellOut => "WELL_OUT",
            Self::WellKeUp => "WELL_KEUP",
            Self::WellKeDown => "WELL_KEDOWN",
            Self::Bounce => "BOUNCE",
            Self::Wall => "WALL",
            Self::Cell => "CELL",
            Self::Virtual => "VIRTUAL",
            Self::VirtualParabola => "VIRTUAL_PARABOLA",
            Self::Ticker => "TICKER",
            Self::Halt => "HALT",
            Self::Thermostat => "THERMOSTAT",
            Self::Rebuild => "REBUILD",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which event source produced an event, and for whom. `id` indexes the source inside its
/// own family (interactions, globals, locals or systems).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    Interaction {
        id: usize,
        p1: ParticleId,
        p2: ParticleId,
    },
    Global {
        id: usize,
        particle: ParticleId,
    },
    Local {
        id: usize,
        particle: ParticleId,
    },
    System {
        id: usize,
    },
}

impl EventSource {
    /// Tie-break rank: systems first, then globals, locals and interactions.
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            Self::System { .. } => 0,
            Self::Global { .. } => 1,
            Self::Local { .. } => 2,
            Self::Interaction { .. } => 3,
        }
    }

    #[inline]
    pub fn source_id(&self) -> usize {
        match self {
            Self::Interaction { id, .. }
            | Self::Global { id, .. }
            | Self::Local { id, .. }
            | Self::System { id } => *id,
        }
    }

    /// Participant IDs in ascending order, used for tie-breaking.
    #[inline]
    pub fn participant_key(&self) -> (usize, usize) {
        match self {
            Self::Interaction { p1, p2, .. } => {
                let (a, b) = ordered_pair(*p1, *p2);
                (a.index(), b.index())
            }
            Self::Global { particle, .. } | Self::Local { particle, .. } => {
                (particle.index(), particle.index())
            }
            Self::System { .. } => (0, 0),
        }
    }

    pub fn particles(&self) -> Vec<ParticleId> {
        match self {
            Self::Interaction { p1, p2, .. } => vec![*p1, *p2],
            Self::Global { particle, .. } | Self::Local { particle, .. } => vec![*particle],
            Self::System { .. } => Vec::new(),
        }
    }
}

/// A predicted event: `dt` is measured from the moment the prediction was made.
/// `f64::INFINITY` means the source predicts nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub source: EventSource,
    pub event_type: EventType,
    pub dt: f64,
}

impl Event {
    pub fn new(source: EventSource, event_type: EventType, dt: f64) -> Self {
        Self {
            source,
            event_type,
            dt,
        }
    }

    pub fn none(source: EventSource) -> Self {
        Self::new(source, EventType::None, f64::INFINITY)
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.event_type == EventType::None || self.dt == f64::INFINITY
    }

    /// Total order used to pick the earliest of several candidates.
    pub fn cmp_priority(&self, other: &Self) -> Ordering {
        self.dt
            .total_cmp(&other.dt)
            .then_with(|| self.source.rank().cmp(&other.source.rank()))
            .then_with(|| {
                self.source
                    .participant_key()
                    .cmp(&other.source.participant_key())
            })
            .then_with(|| self.source.source_id().cmp(&other.source.source_id()))
    }

    /// Keeps whichever of `self` and `other` comes first.
    #[inline]
    pub fn earliest(self, other: Self) -> Self {
        if other.cmp_priority(&self) == Ordering::Less {
            other
        } else {
            self
        }
    }
}

/// Change of one particle's state caused by an event.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleDelta {
    pub id: ParticleId,
    pub species: usize,
    pub old_velocity: Vector3<f64>,
    pub new_velocity: Vector3<f64>,
    pub old_angular_velocity: Vector3<f64>,
    pub new_angular_velocity: Vector3<f64>,
    pub delta_ke: f64,
}

/// Requests a handler makes of the simulation driver beyond particle rescheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Run the ticker hooks of the output plugins.
    Tick,
    /// Stop the run at the current event count.
    Shutdown,
    /// Rebuild the neighbourhood lattice and every scheduler entry.
    RebuildNeighbourhood,
}

/// What a handler did: the resolved event type, per-particle deltas for output plugins, the
/// particles whose cached events are now stale, and an optional directive.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub event_type: EventType,
    pub deltas: Vec<ParticleDelta>,
    pub reschedule: Vec<ParticleId>,
    pub directive: Option<Directive>,
}

impl EventData {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            deltas: Vec::new(),
            reschedule: Vec::new(),
            directive: None,
        }
    }

    pub fn with_deltas(mut self, deltas: impl IntoIterator<Item = ParticleDelta>) -> Self {
        self.deltas.extend(deltas);
        self
    }

    pub fn with_reschedule(mut self, particles: impl IntoIterator<Item = ParticleId>) -> Self {
        self.reschedule.extend(particles);
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directive = Some(directive);
        self
    }

    pub fn delta_ke(&self) -> f64 {
        self.deltas.iter().map(|d| d.delta_ke).sum()
    }
}

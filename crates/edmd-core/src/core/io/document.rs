use super::error::DocumentError;
use super::traits::ConfigFile;
use crate::core::models::boundary::BoundaryCondition;
use crate::core::models::ids::ParticleId;
use crate::core::models::range::{PairRange, ParticleRange};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{BufRead, Write};

pub const DOCUMENT_VERSION: &str = "1.0.0";

fn unity() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulationDocument {
    pub version: String,
    pub simulation: SimulationSection,
    #[serde(default)]
    pub boundary: BoundaryCondition,
    #[serde(default)]
    pub dynamics: DynamicsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub species: Vec<SpeciesConfig>,
    pub interactions: Vec<InteractionConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locals: Vec<LocalConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub globals: Vec<GlobalConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub systems: Vec<SystemConfig>,
    pub particles: Vec<ParticleConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulationSection {
    /// Edge lengths of the primary box.
    pub size: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Mean free time measured by the previous run; seeds the default ticker period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mft: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DynamicsConfig {
    #[default]
    Newtonian,
    Gravity { gravity: [f64; 3] },
    Compression {
        #[serde(rename = "growth-rate")]
        growth_rate: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NeighbourhoodKind {
    #[default]
    Cells,
    AllPairs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub neighbourhood: NeighbourhoodKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SpeciesConfig {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub range: ParticleRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inertia_constant: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InteractionConfig {
    HardSphere(HardSphereConfig),
    SquareWell(SquareWellConfig),
    RoughHardSphere(RoughHardSphereConfig),
    Dumbbells(DumbbellsConfig),
}

impl InteractionConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::HardSphere(c) => &c.name,
            Self::SquareWell(c) => &c.name,
            Self::RoughHardSphere(c) => &c.name,
            Self::Dumbbells(c) => &c.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HardSphereConfig {
    pub name: String,
    pub diameter: f64,
    #[serde(default = "unity")]
    pub elasticity: f64,
    #[serde(default)]
    pub range: PairRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SquareWellConfig {
    pub name: String,
    pub diameter: f64,
    /// Well width as a multiple of the core diameter.
    pub lambda: f64,
    pub well_depth: f64,
    #[serde(default = "unity")]
    pub elasticity: f64,
    #[serde(default)]
    pub range: PairRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<Vec<[ParticleId; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoughHardSphereConfig {
    pub name: String,
    pub diameter: f64,
    #[serde(default = "unity")]
    pub elasticity: f64,
    #[serde(default = "unity")]
    pub tangential_elasticity: f64,
    #[serde(default)]
    pub range: PairRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DumbbellsConfig {
    pub name: String,
    /// Distance between the two sphere centres of one dumbbell.
    pub length: f64,
    pub radius: f64,
    #[serde(default = "unity")]
    pub elasticity: f64,
    #[serde(default)]
    pub range: PairRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<Vec<[ParticleId; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LocalConfig {
    Wall(WallConfig),
}

impl LocalConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Wall(c) => &c.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WallConfig {
    pub name: String,
    /// Any point on the wall plane.
    pub origin: [f64; 3],
    /// Points into the region particles occupy.
    pub normal: [f64; 3],
    #[serde(default = "unity")]
    pub elasticity: f64,
    /// Diameter of the particles hitting the wall; contact happens at half of it.
    #[serde(default)]
    pub diameter: f64,
    #[serde(default)]
    pub range: ParticleRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GlobalConfig {
    Cells {
        name: String,
        /// Lower bound on the cell edge; defaults to the longest interaction distance.
        #[serde(default, rename = "min-cell-size", skip_serializing_if = "Option::is_none")]
        min_cell_size: Option<f64>,
        #[serde(default, rename = "limit-cells")]
        limit_cells: bool,
    },
    PbcSentinel {
        name: String,
    },
    ParabolaSentinel {
        name: String,
    },
}

impl GlobalConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Cells { name, .. } | Self::PbcSentinel { name } | Self::ParabolaSentinel { name } => {
                name
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SystemConfig {
    Ticker {
        name: String,
        period: f64,
    },
    Halt {
        name: String,
        time: f64,
    },
    Andersen {
        name: String,
        #[serde(rename = "mean-free-time")]
        mean_free_time: f64,
        temperature: f64,
    },
}

impl SystemConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Ticker { name, .. } | Self::Halt { name, .. } | Self::Andersen { name, .. } => {
                name
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ParticleConfig {
    pub id: ParticleId,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_velocity: Option<[f64; 3]>,
    #[serde(default = "yes", skip_serializing_if = "is_true")]
    pub dynamic: bool,
}

impl SimulationDocument {
    /// Checks everything that can be checked without building the simulation: the version,
    /// name uniqueness within each plug-in section and particle id order.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.version != DOCUMENT_VERSION {
            return Err(DocumentError::VersionMismatch {
                found: self.version.clone(),
                expected: DOCUMENT_VERSION,
            });
        }

        check_unique("species", self.species.iter().map(|s| s.name.as_str()))?;
        check_unique("interactions", self.interactions.iter().map(|i| i.name()))?;
        check_unique("locals", self.locals.iter().map(|l| l.name()))?;
        check_unique("globals", self.globals.iter().map(|g| g.name()))?;
        check_unique("systems", self.systems.iter().map(|s| s.name()))?;

        for (position, particle) in self.particles.iter().enumerate() {
            if particle.id.index() != position {
                return Err(DocumentError::ParticleOrder {
                    position,
                    found: particle.id,
                });
            }
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DocumentError> {
        let document: Self = toml::from_str(content)?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_toml_string(&self) -> Result<String, DocumentError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn check_unique<'a>(
    section: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), DocumentError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(DocumentError::DuplicateName {
                section,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

impl ConfigFile for SimulationDocument {
    fn read_from(reader: &mut impl BufRead) -> Result<Self, DocumentError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_toml_str(&content)
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), DocumentError> {
        writer.write_all(self.to_toml_string()?.as_bytes())?;
        Ok(())
    }
}

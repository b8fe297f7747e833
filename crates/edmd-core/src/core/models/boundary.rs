use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Boundary condition of the primary box, which is centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BoundaryCondition {
    #[default]
    None,
    Periodic,
}

impl BoundaryCondition {
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Periodic)
    }

    /// Maps a separation vector onto its minimum image.
    pub fn apply(self, separation: &mut Vector3<f64>, box_size: &Vector3<f64>) {
        if self.is_periodic() {
            *separation = minimum_image(separation, box_size);
        }
    }
}

/// Wraps every component into `[-L/2, L/2]`.
#[inline]
pub fn minimum_image(v: &Vector3<f64>, box_size: &Vector3<f64>) -> Vector3<f64> {
    Vector3::from_fn(|i, _| v[i] - box_size[i] * (v[i] / box_size[i]).round())
}

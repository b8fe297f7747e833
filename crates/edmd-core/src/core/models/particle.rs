use super::ids::ParticleId;
use nalgebra::{Rotation3, Unit, Vector3};

/// Rotational state of a particle with orientation (dumbbells, rough spheres).
#[derive(Debug, Clone, PartialEq)]
pub struct Orientation {
    pub axis: Unit<Vector3<f64>>,
    pub angular_velocity: Vector3<f64>,
}

impl Orientation {
    pub fn new(axis: Vector3<f64>, angular_velocity: Vector3<f64>) -> Self {
        Self {
            axis: Unit::new_normalize(axis),
            angular_velocity,
        }
    }

    /// The axis after free rotation for `dt`.
    pub fn axis_after(&self, dt: f64) -> Unit<Vector3<f64>> {
        let angle = self.angular_velocity * dt;
        if angle.norm_squared() == 0.0 {
            return self.axis;
        }
        Unit::new_normalize(Rotation3::new(angle) * self.axis.into_inner())
    }

    pub fn rotate(&mut self, dt: f64) {
        self.axis = self.axis_after(dt);
    }
}

/// Kinematic state of a single particle.
///
/// Particles are streamed lazily: `last_update` is the stream-clock time at which `position`,
/// `velocity` and `orientation` were last brought up to date. The engine advances a particle to
/// the current clock only when an event source needs to look at it.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: ParticleId,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: Option<Orientation>,
    pub last_update: f64,
    /// Non-dynamic particles are not accelerated by external fields.
    pub dynamic: bool,
}

impl Particle {
    pub fn new(id: ParticleId, position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self {
            id,
            position,
            velocity,
            orientation: None,
            last_update: 0.0,
            dynamic: true,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.orientation
            .as_ref()
            .map(|o| o.angular_velocity)
            .unwrap_or_else(Vector3::zeros)
    }
}

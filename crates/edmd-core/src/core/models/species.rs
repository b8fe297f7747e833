use super::range::ParticleRange;

/// A family of particles sharing mass and rotational properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    /// May be infinite for immovable particles.
    pub mass: f64,
    pub range: ParticleRange,
    /// Moment of inertia divided by mass; present for spherical tops.
    pub inertia_constant: Option<f64>,
}

impl Species {
    pub fn new(name: impl Into<String>, mass: f64, range: ParticleRange) -> Self {
        Self {
            name: name.into(),
            mass,
            range,
            inertia_constant: None,
        }
    }

    pub fn with_inertia(mut self, inertia_constant: f64) -> Self {
        self.inertia_constant = Some(inertia_constant);
        self
    }

    pub fn moment_of_inertia(&self) -> Option<f64> {
        self.inertia_constant.map(|k| k * self.mass)
    }

    #[inline]
    pub fn inverse_mass(&self) -> f64 {
        if self.mass.is_infinite() {
            0.0
        } else {
            1.0 / self.mass
        }
    }
}

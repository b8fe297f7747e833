use crate::core::io::document::DynamicsConfig;
use crate::core::models::particle::Particle;
use crate::core::models::units::Units;
use crate::core::physics::roots;
use nalgebra::Vector3;

const OVERLAP_TOLERANCE: f64 = 1e-10;

/// Equations of free motion between events.
///
/// Every variant streams particles ballistically (plus a constant field for `Gravity`).
/// `Compression` keeps the particles ballistic but lets every interaction length grow as
/// `L(t) = L0 (1 + growth_rate * t)`, so sphere roots and collisions must account for the
/// moving contact surface.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Dynamics {
    #[default]
    Newtonian,
    Gravity { g: Vector3<f64> },
    Compression { growth_rate: f64 },
}

impl Dynamics {
    pub fn from_config(config: &DynamicsConfig, units: &Units) -> Self {
        match config {
            DynamicsConfig::Newtonian => Self::Newtonian,
            DynamicsConfig::Gravity { gravity } => Self::Gravity {
                g: Vector3::from(*gravity) * units.acceleration(),
            },
            DynamicsConfig::Compression { growth_rate } => Self::Compression {
                growth_rate: growth_rate / units.time,
            },
        }
    }

    pub fn to_config(&self, units: &Units) -> DynamicsConfig {
        match self {
            Self::Newtonian => DynamicsConfig::Newtonian,
            Self::Gravity { g } => {
                let g = g / units.acceleration();
                DynamicsConfig::Gravity {
                    gravity: [g.x, g.y, g.z],
                }
            }
            Self::Compression { growth_rate } => DynamicsConfig::Compression {
                growth_rate: growth_rate * units.time,
            },
        }
    }

    #[inline]
    pub fn acceleration(&self, particle: &Particle) -> Vector3<f64> {
        match self {
            Self::Gravity { g } if particle.dynamic => *g,
            _ => Vector3::zeros(),
        }
    }

    pub fn stream_particle(&self, particle: &mut Particle, dt: f64) {
        let accel = self.acceleration(particle);
        particle.position += particle.velocity * dt + accel * (0.5 * dt * dt);
        particle.velocity += accel * dt;
        if let Some(orientation) = particle.orientation.as_mut() {
            orientation.rotate(dt);
        }
    }

    /// Multiplier applied to every interaction length at `system_time`.
    #[inline]
    pub fn growth_factor(&self, system_time: f64) -> f64 {
        match self {
            Self::Compression { growth_rate } => 1.0 + growth_rate * system_time,
            _ => 1.0,
        }
    }

    #[inline]
    pub fn growth_rate(&self) -> f64 {
        match self {
            Self::Compression { growth_rate } => *growth_rate,
            _ => 0.0,
        }
    }

    /// Whether scaling every velocity by `k` scales every pending event time by `1/k`.
    pub fn is_time_scalable(&self) -> bool {
        matches!(self, Self::Newtonian)
    }

    pub fn has_external_field(&self) -> bool {
        matches!(self, Self::Gravity { .. })
    }

    /// Contact time of two spheres whose unscaled contact distance is `diameter`.
    #[inline]
    pub fn sphere_in_root(
        &self,
        rij: &Vector3<f64>,
        vij: &Vector3<f64>,
        diameter: f64,
        system_time: f64,
    ) -> Option<f64> {
        roots::sphere_in_root(
            rij,
            vij,
            diameter * self.growth_factor(system_time),
            diameter * self.growth_rate(),
        )
    }

    #[inline]
    pub fn sphere_out_root(
        &self,
        rij: &Vector3<f64>,
        vij: &Vector3<f64>,
        diameter: f64,
        system_time: f64,
    ) -> f64 {
        roots::sphere_out_root(
            rij,
            vij,
            diameter * self.growth_factor(system_time),
            diameter * self.growth_rate(),
        )
    }

    /// Whether a pair sits inside the sphere of `diameter`. Pairs that have just collided sit
    /// at contact to rounding error, so a small relative slack is allowed.
    #[inline]
    pub fn sphere_overlap(&self, rij: &Vector3<f64>, diameter: f64, system_time: f64) -> bool {
        let d = diameter * self.growth_factor(system_time);
        rij.norm_squared() < d * d * (1.0 - OVERLAP_TOLERANCE)
    }

    /// Speed at which the contact distance of a pair with unscaled `diameter` grows.
    #[inline]
    pub fn surface_speed(&self, diameter: f64) -> f64 {
        diameter * self.growth_rate()
    }

    /// Time until the velocity component against the field vanishes.
    pub fn parabola_apex_time(&self, particle: &Particle) -> f64 {
        match self {
            Self::Gravity { g } if particle.dynamic && g.norm_squared() > 0.0 => {
                let g_norm = g.norm();
                let along = particle.velocity.dot(g) / g_norm;
                if along < 0.0 {
                    -along / g_norm
                } else {
                    f64::INFINITY
                }
            }
            _ => f64::INFINITY,
        }
    }

    /// Removes the velocity component along the field, placing the particle exactly at its
    /// apex.
    pub fn enforce_parabola(&self, particle: &mut Particle) {
        if let Self::Gravity { g } = self {
            if g.norm_squared() > 0.0 {
                let unit = g.normalize();
                let along = particle.velocity.dot(&unit);
                particle.velocity -= unit * along;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ParticleId;

    const TOLERANCE: f64 = 1e-12;

    fn particle(velocity: Vector3<f64>) -> Particle {
        Particle::new(ParticleId(0), Vector3::zeros(), velocity)
    }

    #[test]
    fn newtonian_stream_is_ballistic() {
        let mut p = particle(Vector3::new(1.0, -2.0, 0.5));
        Dynamics::Newtonian.stream_particle(&mut p, 2.0);
        assert_eq!(p.position, Vector3::new(2.0, -4.0, 1.0));
        assert_eq!(p.velocity, Vector3::new(1.0, -2.0, 0.5));
    }

    #[test]
    fn gravity_stream_follows_parabola_for_dynamic_particles_only() {
        let dynamics = Dynamics::Gravity {
            g: Vector3::new(0.0, 0.0, -2.0),
        };
        let mut p = particle(Vector3::new(0.0, 0.0, 2.0));
        dynamics.stream_particle(&mut p, 1.0);
        assert!((p.position.z - 1.0).abs() < TOLERANCE);
        assert!(p.velocity.z.abs() < TOLERANCE);

        let mut fixed = particle(Vector3::new(0.0, 0.0, 2.0));
        fixed.dynamic = false;
        dynamics.stream_particle(&mut fixed, 1.0);
        assert_eq!(fixed.position.z, 2.0);
    }

    #[test]
    fn parabola_apex_and_enforcement() {
        let dynamics = Dynamics::Gravity {
            g: Vector3::new(0.0, 0.0, -2.0),
        };
        let mut p = particle(Vector3::new(1.0, 0.0, 3.0));
        assert!((dynamics.parabola_apex_time(&p) - 1.5).abs() < TOLERANCE);
        dynamics.enforce_parabola(&mut p);
        assert_eq!(p.velocity, Vector3::new(1.0, 0.0, 0.0));
        assert!(dynamics.parabola_apex_time(&p).is_infinite());
    }

    #[test]
    fn compression_scales_contact_distance_with_time() {
        let dynamics = Dynamics::Compression { growth_rate: 0.5 };
        assert_eq!(dynamics.growth_factor(2.0), 2.0);
        let rij = Vector3::new(1.5, 0.0, 0.0);
        assert!(!dynamics.sphere_overlap(&rij, 1.0, 0.0));
        assert!(dynamics.sphere_overlap(&rij, 1.0, 2.0));
        assert!(!dynamics.is_time_scalable());
    }

    #[test]
    fn config_round_trip_respects_units() {
        let units = Units {
            length: 2.0,
            time: 0.5,
            mass: 1.0,
        };
        let config = DynamicsConfig::Gravity {
            gravity: [0.0, 0.0, -1.0],
        };
        let dynamics = Dynamics::from_config(&config, &units);
        assert_eq!(
            dynamics,
            Dynamics::Gravity {
                g: Vector3::new(0.0, 0.0, -8.0)
            }
        );
        assert_eq!(dynamics.to_config(&units), config);
    }
}

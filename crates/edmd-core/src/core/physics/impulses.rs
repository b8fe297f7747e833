use nalgebra::{Unit, Vector3};

/// Inverse masses and inverse moments of inertia of the two bodies in a collision. Infinite
/// masses are represented by zero inverses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inertia {
    pub inv_mass1: f64,
    pub inv_mass2: f64,
    pub inv_inertia1: f64,
    pub inv_inertia2: f64,
}

impl Inertia {
    pub fn translational(inv_mass1: f64, inv_mass2: f64) -> Self {
        Self {
            inv_mass1,
            inv_mass2,
            inv_inertia1: 0.0,
            inv_inertia2: 0.0,
        }
    }

    #[inline]
    pub fn reduced_mass(&self) -> f64 {
        let sum = self.inv_mass1 + self.inv_mass2;
        if sum == 0.0 { 0.0 } else { 1.0 / sum }
    }
}

/// Velocity changes produced by one impulsive event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidUpdate {
    pub dv1: Vector3<f64>,
    pub dv2: Vector3<f64>,
    pub dw1: Vector3<f64>,
    pub dw2: Vector3<f64>,
}

impl RigidUpdate {
    fn from_linear(impulse: Vector3<f64>, inertia: &Inertia) -> Self {
        Self {
            dv1: impulse * inertia.inv_mass1,
            dv2: -impulse * inertia.inv_mass2,
            ..Default::default()
        }
    }
}

/// Head-on collision of smooth spheres with restitution `e`. `surface_speed` is the rate at
/// which the contact distance grows; it is zero except under compression.
#[inline]
pub fn smooth_collision(
    n: &Unit<Vector3<f64>>,
    vij: &Vector3<f64>,
    inertia: &Inertia,
    e: f64,
    surface_speed: f64,
) -> RigidUpdate {
    let mu = inertia.reduced_mass();
    let impulse = n.into_inner() * (-(1.0 + e) * mu * (n.dot(vij) - surface_speed));
    RigidUpdate::from_linear(impulse, inertia)
}

/// Outcome of a pair crossing a potential step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WellCrossing {
    pub update: RigidUpdate,
    /// False when the pair lacked the energy to cross and bounced back instead.
    pub crossed: bool,
}

/// A pair crossing a step that changes its kinetic energy by `delta_ke`. Kinetic energy is
/// exchanged through the normal relative velocity only.
#[inline]
pub fn step_crossing(
    n: &Unit<Vector3<f64>>,
    vij: &Vector3<f64>,
    inertia: &Inertia,
    delta_ke: f64,
) -> WellCrossing {
    let mu = inertia.reduced_mass();
    if mu == 0.0 {
        return WellCrossing {
            update: RigidUpdate::default(),
            crossed: true,
        };
    }

    let u = n.dot(vij);
    let arg = u * u + 2.0 * delta_ke / mu;
    if arg < 0.0 {
        let impulse = n.into_inner() * (-2.0 * mu * u);
        return WellCrossing {
            update: RigidUpdate::from_linear(impulse, inertia),
            crossed: false,
        };
    }

    let u_new = u.signum() * arg.sqrt();
    let impulse = n.into_inner() * (mu * (u_new - u));
    WellCrossing {
        update: RigidUpdate::from_linear(impulse, inertia),
        crossed: true,
    }
}

/// Collision of rough spheres of radius `radius` with normal restitution `e` and tangential
/// restitution `et` (-1 is perfectly smooth, 1 perfectly rough). `g` is the relative velocity
/// of the contact points.
#[inline]
pub fn rough_collision(
    n: &Unit<Vector3<f64>>,
    g: &Vector3<f64>,
    inertia: &Inertia,
    radius: f64,
    e: f64,
    et: f64,
) -> RigidUpdate {
    let n = n.into_inner();
    let gn = n.dot(g);
    let gt = g - n * gn;

    let normal = n * (-(1.0 + e) * inertia.reduced_mass() * gn);
    let k_t = inertia.inv_mass1
        + inertia.inv_mass2
        + radius * radius * (inertia.inv_inertia1 + inertia.inv_inertia2);
    let tangential = if k_t == 0.0 {
        Vector3::zeros()
    } else {
        gt * (-(1.0 + et) / k_t)
    };

    let impulse = normal + tangential;
    let torque_arm = n.cross(&impulse) * -radius;
    RigidUpdate {
        dv1: impulse * inertia.inv_mass1,
        dv2: -impulse * inertia.inv_mass2,
        dw1: torque_arm * inertia.inv_inertia1,
        dw2: torque_arm * inertia.inv_inertia2,
    }
}

/// Frictionless collision of two rigid bodies touching at a point reached by the lever arms
/// `arm1` and `arm2` from their centres. `g` is the relative velocity of the contact points.
#[inline]
pub fn offcentre_collision(
    n: &Unit<Vector3<f64>>,
    g: &Vector3<f64>,
    arm1: &Vector3<f64>,
    arm2: &Vector3<f64>,
    inertia: &Inertia,
    e: f64,
) -> RigidUpdate {
    let n = n.into_inner();
    let k = inertia.inv_mass1
        + inertia.inv_mass2
        + inertia.inv_inertia1 * arm1.cross(&n).norm_squared()
        + inertia.inv_inertia2 * arm2.cross(&n).norm_squared();
    if k == 0.0 {
        return RigidUpdate::default();
    }
    let impulse = n * (-(1.0 + e) * n.dot(g) / k);
    RigidUpdate {
        dv1: impulse * inertia.inv_mass1,
        dv2: -impulse * inertia.inv_mass2,
        dw1: arm1.cross(&impulse) * inertia.inv_inertia1,
        dw2: -arm2.cross(&impulse) * inertia.inv_inertia2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn kinetic(m: f64, i: f64, v: &Vector3<f64>, w: &Vector3<f64>) -> f64 {
        0.5 * m * v.norm_squared() + 0.5 * i * w.norm_squared()
    }

    #[test]
    fn elastic_smooth_collision_swaps_equal_mass_velocities() {
        let n = Unit::new_normalize(Vector3::new(1.0, 0.0, 0.0));
        let v1 = Vector3::new(-1.0, 0.0, 0.0);
        let v2 = Vector3::new(1.0, 0.0, 0.0);
        let update = smooth_collision(&n, &(v1 - v2), &Inertia::translational(1.0, 1.0), 1.0, 0.0);
        assert!((v1 + update.dv1 - v2).norm() < TOLERANCE);
        assert!((v2 + update.dv2 - v1).norm() < TOLERANCE);
    }

    #[test]
    fn inelastic_collision_conserves_momentum() {
        let n = Unit::new_normalize(Vector3::new(1.0, 1.0, 0.0));
        let (m1, m2) = (1.0, 3.0);
        let v1 = Vector3::new(-2.0, 0.5, 0.0);
        let v2 = Vector3::new(1.0, -1.0, 0.3);
        let inertia = Inertia::translational(1.0 / m1, 1.0 / m2);
        let update = smooth_collision(&n, &(v1 - v2), &inertia, 0.5, 0.0);
        let before = v1 * m1 + v2 * m2;
        let after = (v1 + update.dv1) * m1 + (v2 + update.dv2) * m2;
        assert!((before - after).norm() < TOLERANCE);
    }

    #[test]
    fn infinite_mass_partner_reflects_the_other() {
        let n = Unit::new_normalize(Vector3::new(0.0, 0.0, 1.0));
        let v1 = Vector3::new(0.3, 0.0, -2.0);
        let update = smooth_collision(&n, &v1, &Inertia::translational(1.0, 0.0), 1.0, 0.0);
        assert!((v1 + update.dv1 - Vector3::new(0.3, 0.0, 2.0)).norm() < TOLERANCE);
        assert_eq!(update.dv2, Vector3::zeros());
    }

    #[test]
    fn step_crossing_conserves_total_energy() {
        let n = Unit::new_normalize(Vector3::new(1.0, 0.0, 0.0));
        let v1 = Vector3::new(-1.0, 0.2, 0.0);
        let v2 = Vector3::new(0.5, 0.0, 0.0);
        let inertia = Inertia::translational(1.0, 1.0);
        let crossing = step_crossing(&n, &(v1 - v2), &inertia, 0.4);
        assert!(crossing.crossed);
        let before = kinetic(1.0, 0.0, &v1, &Vector3::zeros()) + kinetic(1.0, 0.0, &v2, &Vector3::zeros());
        let after = kinetic(1.0, 0.0, &(v1 + crossing.update.dv1), &Vector3::zeros())
            + kinetic(1.0, 0.0, &(v2 + crossing.update.dv2), &Vector3::zeros());
        assert!((after - before - 0.4).abs() < TOLERANCE);
    }

    #[test]
    fn step_crossing_without_enough_energy_bounces() {
        let n = Unit::new_normalize(Vector3::new(1.0, 0.0, 0.0));
        let vij = Vector3::new(0.1, 0.0, 0.0);
        let crossing = step_crossing(&n, &vij, &Inertia::translational(1.0, 1.0), -1.0);
        assert!(!crossing.crossed);
        let new_vij = vij + crossing.update.dv1 - crossing.update.dv2;
        assert!((new_vij + vij).norm() < TOLERANCE);
    }

    #[test]
    fn perfectly_rough_elastic_collision_conserves_energy() {
        let (m, i, radius) = (1.0, 0.1, 0.5);
        let inertia = Inertia {
            inv_mass1: 1.0 / m,
            inv_mass2: 1.0 / m,
            inv_inertia1: 1.0 / i,
            inv_inertia2: 1.0 / i,
        };
        let n = Unit::new_normalize(Vector3::new(1.0, 0.2, 0.0));
        let (v1, v2) = (Vector3::new(-1.0, 0.3, 0.1), Vector3::new(0.4, -0.2, 0.0));
        let (w1, w2) = (Vector3::new(0.0, 0.0, 2.0), Vector3::new(1.0, 0.0, -0.5));
        let g = (v1 - v2) - (w1 + w2).cross(&n.into_inner()) * radius;
        let update = rough_collision(&n, &g, &inertia, radius, 1.0, 1.0);

        let before = kinetic(m, i, &v1, &w1) + kinetic(m, i, &v2, &w2);
        let after = kinetic(m, i, &(v1 + update.dv1), &(w1 + update.dw1))
            + kinetic(m, i, &(v2 + update.dv2), &(w2 + update.dw2));
        assert!((before - after).abs() < 1e-10);
    }

    #[test]
    fn smooth_limit_of_rough_collision_leaves_spin_alone() {
        let inertia = Inertia {
            inv_mass1: 1.0,
            inv_mass2: 1.0,
            inv_inertia1: 10.0,
            inv_inertia2: 10.0,
        };
        let n = Unit::new_normalize(Vector3::new(1.0, 0.0, 0.0));
        let g = Vector3::new(-1.0, 0.5, 0.0);
        let update = rough_collision(&n, &g, &inertia, 0.5, 1.0, -1.0);
        assert!(update.dw1.norm() < TOLERANCE);
        assert!(update.dw2.norm() < TOLERANCE);
    }

    #[test]
    fn elastic_offcentre_collision_conserves_energy() {
        let (m, i) = (1.0, 0.25);
        let inertia = Inertia {
            inv_mass1: 1.0 / m,
            inv_mass2: 1.0 / m,
            inv_inertia1: 1.0 / i,
            inv_inertia2: 1.0 / i,
        };
        let n = Unit::new_normalize(Vector3::new(1.0, 0.0, 0.0));
        let arm1 = Vector3::new(-0.2, 0.5, 0.0);
        let arm2 = Vector3::new(0.2, -0.3, 0.1);
        let (v1, v2) = (Vector3::new(-1.0, 0.0, 0.0), Vector3::new(0.5, 0.1, 0.0));
        let (w1, w2) = (Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.3, 0.0, 0.0));
        let g = (v1 + w1.cross(&arm1)) - (v2 + w2.cross(&arm2));
        let update = offcentre_collision(&n, &g, &arm1, &arm2, &inertia, 1.0);

        let before = kinetic(m, i, &v1, &w1) + kinetic(m, i, &v2, &w2);
        let after = kinetic(m, i, &(v1 + update.dv1), &(w1 + update.dw1))
            + kinetic(m, i, &(v2 + update.dv2), &(w2 + update.dw2));
        assert!((before - after).abs() < 1e-10);
    }
}

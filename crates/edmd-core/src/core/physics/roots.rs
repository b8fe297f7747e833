use nalgebra::Vector3;

/// Earliest time at which two spheres moving with relative velocity `vij` come into contact,
/// given their separation `rij`, current contact distance `d` and contact-distance growth
/// speed `d_rate` (zero unless the system is being compressed).
///
/// Returns `None` when the pair never meets. An overlapping pair that is still approaching
/// reports an immediate contact.
#[inline]
pub fn sphere_in_root(rij: &Vector3<f64>, vij: &Vector3<f64>, d: f64, d_rate: f64) -> Option<f64> {
    let a = vij.norm_squared() - d_rate * d_rate;
    let b = rij.dot(vij) - d * d_rate;
    let c = rij.norm_squared() - d * d;

    if c <= 0.0 {
        return (b < 0.0).then_some(0.0);
    }

    let disc = b * b - a * c;
    if a > 0.0 && (b >= 0.0 || disc < 0.0) {
        return None;
    }
    if a == 0.0 && b >= 0.0 {
        return None;
    }
    Some(c / (disc.max(0.0).sqrt() - b))
}

/// Time at which a pair currently inside a shell of diameter `d` leaves it. Returns zero when
/// the pair is already outside and still separating, and `f64::INFINITY` when it never leaves.
///
/// A pair sitting on or just past the shell while heading inwards (the state left by a bounce
/// off the shell) is treated as inside: it leaves through the far side of the shell.
#[inline]
pub fn sphere_out_root(rij: &Vector3<f64>, vij: &Vector3<f64>, d: f64, d_rate: f64) -> f64 {
    let a = vij.norm_squared() - d_rate * d_rate;
    let b = rij.dot(vij) - d * d_rate;
    let c = rij.norm_squared() - d * d;

    if c >= 0.0 {
        if b >= 0.0 {
            return 0.0;
        }
        if a <= 0.0 {
            return f64::INFINITY;
        }
        return ((b * b - a * c).max(0.0).sqrt() - b) / a;
    }

    let disc = b * b - a * c;
    if disc < 0.0 {
        return f64::INFINITY;
    }
    let s = disc.sqrt();
    if b >= 0.0 {
        if s + b == 0.0 {
            return f64::INFINITY;
        }
        -c / (s + b)
    } else if a > 0.0 {
        (s - b) / a
    } else {
        f64::INFINITY
    }
}

/// Earliest time at which a coordinate `x0` above a plane reaches it, moving with normal
/// velocity `v` and normal acceleration `a`.
///
/// A coordinate at or below the plane counts as already crossed while it keeps moving down,
/// and as a return flight when it moves up against a restoring acceleration. This keeps
/// drifted positions from producing repeated zero-time events.
#[inline]
pub fn plane_crossing_time(x0: f64, v: f64, a: f64) -> f64 {
    if x0 <= 0.0 {
        if v < 0.0 {
            return 0.0;
        }
        if a < 0.0 {
            return -2.0 * v / a;
        }
        return f64::INFINITY;
    }

    if a == 0.0 {
        return if v < 0.0 { x0 / -v } else { f64::INFINITY };
    }

    let disc = v * v - 2.0 * a * x0;
    if disc < 0.0 {
        return f64::INFINITY;
    }
    let s = disc.sqrt();
    if a > 0.0 {
        if v >= 0.0 {
            return f64::INFINITY;
        }
        2.0 * x0 / (s - v)
    } else if v >= 0.0 {
        (v + s) / -a
    } else {
        2.0 * x0 / (s - v)
    }
}

/// Time needed to cover `distance` starting at `speed` under an acceleration of magnitude
/// `accel` pointing along the motion, the worst case for how far a particle can get.
#[inline]
pub fn travel_time(distance: f64, speed: f64, accel: f64) -> f64 {
    if distance <= 0.0 {
        return 0.0;
    }
    let denom = speed + (speed * speed + 2.0 * accel * distance).sqrt();
    if denom == 0.0 {
        f64::INFINITY
    } else {
        2.0 * distance / denom
    }
}

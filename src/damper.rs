//! Velocity damper turning a distance into a bound on its rate of change.
//!
//! With interaction distance `di`, safety distance `ds` and damping gain `xsi`, the
//! distance `d` is only constrained once `d <= di`:
//!
//! ```text
//! d_dot >= -xsi * (d - ds) / (di - ds)
//! ```
//!
//! so that the allowed approach speed shrinks linearly to zero at `ds`. At the
//! acceleration level, over one control period `dt`:
//!
//! ```text
//! d_ddot >= (-xsi * (d - ds) / (di - ds) - d_dot) / dt
//! ```
//!
//! A zero gain selects automatic damping: when the constraint activates, the gain is
//! latched so that the current approach speed is exactly admissible, plus a constant
//! offset `xsi_off`. The latched gain is kept while active and dropped once `d > di`.

use crate::collision::{Collision, DEFAULT_DAMPING_OFFSET};

/// Lower bound returned for inactive constraints.
pub const BIG_NUMBER: f64 = 1e6;

/// Parameters of the damper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityDamperConfig {
    /// Interaction distance
    pub di: f64,
    /// Safety distance
    pub ds: f64,
    /// Damping gain, 0 for automatic
    pub xsi: f64,
    /// Offset added to the automatic gain
    pub xsi_off: f64,
}

impl VelocityDamperConfig {
    pub fn new(di: f64, ds: f64, xsi: f64, xsi_off: f64) -> Self {
        VelocityDamperConfig { di, ds, xsi, xsi_off }
    }

    /// Damper configuration for a collision pair with the default damping offset.
    pub fn from_collision(collision: &Collision) -> Self {
        Self::new(collision.i_dist, collision.s_dist, collision.damping, DEFAULT_DAMPING_OFFSET)
    }
}

#[derive(Debug, Clone)]
pub struct VelocityDamper {
    config: VelocityDamperConfig,
    dt: f64,
    big: f64,
    /// Automatic gain computed on activation
    latched: Option<f64>,
}

impl VelocityDamper {
    pub fn new(dt: f64, config: VelocityDamperConfig, big: f64) -> Self {
        VelocityDamper { config, dt, big, latched: None }
    }

    pub fn config(&self) -> &VelocityDamperConfig {
        &self.config
    }

    pub fn is_automatic(&self) -> bool {
        self.config.xsi == 0.0
    }

    pub fn is_active(&self, d: f64) -> bool {
        d <= self.config.di
    }

    /// Gain currently applied, None while inactive in automatic mode.
    pub fn gain(&self) -> Option<f64> {
        if self.is_automatic() {
            self.latched
        } else {
            Some(self.config.xsi)
        }
    }

    /// Lower bound on the distance derivative.
    pub fn velocity_bound(&mut self, d: f64, d_dot: f64) -> f64 {
        let VelocityDamperConfig { di, ds, xsi, xsi_off } = self.config;
        if !self.is_active(d) {
            self.latched = None;
            return -self.big;
        }
        let xsi = if xsi == 0.0 {
            // d == ds would divide by zero
            let margin = (d - ds).max(f64::EPSILON);
            *self.latched.get_or_insert(-d_dot * (di - ds) / margin + xsi_off)
        } else {
            xsi
        };
        -xsi * (d - ds) / (di - ds)
    }

    /// Lower bound on the second derivative of the distance over one control period.
    pub fn acceleration_bound(&mut self, d: f64, d_dot: f64) -> f64 {
        if !self.is_active(d) {
            self.latched = None;
            return -self.big;
        }
        (self.velocity_bound(d, d_dot) - d_dot) / self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.005;

    fn damper(xsi: f64) -> VelocityDamper {
        VelocityDamper::new(DT, VelocityDamperConfig::new(0.1, 0.02, xsi, 0.1), BIG_NUMBER)
    }

    #[test]
    fn test_inactive_above_interaction_distance() {
        let mut damper = damper(0.5);
        assert_eq!(damper.velocity_bound(0.1 + 1e-9, -1.0), -BIG_NUMBER);
        assert_eq!(damper.acceleration_bound(0.5, -1.0), -BIG_NUMBER);
    }

    #[test]
    fn test_bounds_at_interaction_and_safety_distance() {
        let mut damper = damper(0.5);
        // d == di is active: full gain
        assert!((damper.velocity_bound(0.1, 0.0) + 0.5).abs() < 1e-12);
        // d == ds: approaching is forbidden
        assert!(damper.velocity_bound(0.02, 0.0).abs() < 1e-12);
        // Linear in between
        assert!((damper.velocity_bound(0.06, 0.0) + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_acceleration_bound() {
        let mut damper = damper(0.5);
        let expected = (-0.25 - (-0.1)) / DT;
        assert!((damper.acceleration_bound(0.06, -0.1) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_automatic_gain_latched_on_activation() {
        let mut damper = damper(0.0);
        assert_eq!(damper.gain(), None);

        // Approaching at 0.2 m/s when entering at d = 0.06
        let bound = damper.velocity_bound(0.06, -0.2);
        let xsi = 0.2 * (0.1 - 0.02) / (0.06 - 0.02) + 0.1;
        assert!((damper.gain().unwrap() - xsi).abs() < 1e-12);
        assert!((bound - (-xsi * 0.5)).abs() < 1e-12);

        // Speed changes, gain does not while active
        damper.velocity_bound(0.05, -0.5);
        assert!((damper.gain().unwrap() - xsi).abs() < 1e-12);

        // Leaving resets the latch
        damper.velocity_bound(0.2, 0.1);
        assert_eq!(damper.gain(), None);
    }

    #[test]
    fn test_from_collision() {
        let config = VelocityDamperConfig::from_collision(&Collision::new("a", "b", 0.05, 0.01, 0.5));
        assert_eq!(config, VelocityDamperConfig::new(0.05, 0.01, 0.5, DEFAULT_DAMPING_OFFSET));
    }
}

//! Collision pair descriptor and identifiers

use std::fmt;

/// Integer handle of a registered collision pair. Handles are assigned in increasing
/// order by each constraint and never reused, even after the pair is removed.
pub type CollisionId = u32;

/// Marker that, placed at the end of a body name, turns it into a prefix pattern
/// matching every convex of the robot whose name starts with the rest.
pub const WILDCARD: char = '*';

/// Constant margin added to the automatically computed damping gain.
pub const DEFAULT_DAMPING_OFFSET: f64 = 0.1;

/// Defines a pair of convexes that must stay apart.
///
/// Equality only considers the two convex names. Adding a pair whose names are
/// already registered is a duplicate even when the distances differ: the first
/// registration wins.
#[derive(Debug, Clone)]
pub struct Collision {
    /// Convex on the first robot, may end with [`WILDCARD`]
    pub body1: String,

    /// Convex on the second robot, may end with [`WILDCARD`]
    pub body2: String,

    /// Interaction distance: the damper starts acting below it.
    pub i_dist: f64,

    /// Safety distance: the distance that must never be crossed.
    pub s_dist: f64,

    /// Damping gain. Zero selects automatic damping computed when the pair becomes active.
    pub damping: f64,

    /// Joints of the first robot allowed to move to resolve the constraint. Empty means all.
    pub r1_joints: Vec<String>,

    /// Joints of the second robot allowed to move to resolve the constraint. Empty means all.
    pub r2_joints: Vec<String>,
}

impl Collision {
    pub fn new(
        body1: impl Into<String>,
        body2: impl Into<String>,
        i_dist: f64,
        s_dist: f64,
        damping: f64,
    ) -> Self {
        Collision {
            body1: body1.into(),
            body2: body2.into(),
            i_dist,
            s_dist,
            damping,
            r1_joints: Vec::new(),
            r2_joints: Vec::new(),
        }
    }

    /// Restrict the joints each robot may use to resolve this collision.
    pub fn with_joints(mut self, r1_joints: Vec<String>, r2_joints: Vec<String>) -> Self {
        self.r1_joints = r1_joints;
        self.r2_joints = r2_joints;
        self
    }

    /// Same collision, first body replaced.
    pub fn with_body1(&self, body1: &str) -> Self {
        Collision { body1: body1.to_string(), ..self.clone() }
    }

    /// Same collision, second body replaced.
    pub fn with_body2(&self, body2: &str) -> Self {
        Collision { body2: body2.to_string(), ..self.clone() }
    }

    /// Registry key of this pair.
    pub fn key(&self) -> (&str, &str) {
        (&self.body1, &self.body2)
    }

    /// Name used for the monitor checkbox of this pair
    pub(crate) fn monitor_name(&self) -> String {
        format!("Monitor {}/{}", self.body1, self.body2)
    }

    /// Name used for the distance label and the arrow of this pair
    pub(crate) fn label(&self) -> String {
        format!("{}::{}", self.body1, self.body2)
    }
}

/// Returns the prefix to match if the name is a wildcard pattern.
pub fn wildcard_prefix(name: &str) -> Option<&str> {
    name.strip_suffix(WILDCARD)
}

impl Default for Collision {
    fn default() -> Self {
        Collision::new("", "", 0.05, 0.01, 0.0)
    }
}

impl PartialEq for Collision {
    fn eq(&self, other: &Self) -> bool {
        self.body1 == other.body1 && self.body2 == other.body2
    }
}

impl Eq for Collision {}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Collision {}/{} (iDist {}, sDist {}, damping {})",
            self.body1, self.body2, self.i_dist, self.s_dist, self.damping
        )
    }
}

//! Error handling for the collision constraint subsystem

use thiserror::Error;

use crate::collision::CollisionId;

/// Unified error for registry, backend and monitor operations.
///
/// Every variant is raised synchronously at the call that caused it. Calls that fail
/// leave the registry and the solver exactly as they were before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    /// A collision was requested with an empty body name on one side.
    #[error("Attempted to add a collision without a specific body ({body1:?}/{body2:?})")]
    EmptyBodyName { body1: String, body2: String },

    /// A wildcard pattern matched none of the robot convexes.
    #[error("No match found for collision wildcard {pattern} in {robot}")]
    WildcardNoMatch { pattern: String, robot: String },

    /// The safety distance is negative or not below the interaction distance.
    #[error("Invalid distances for collision {body1}/{body2}: iDist {i_dist} must exceed sDist {s_dist} >= 0")]
    InvalidDistances { body1: String, body2: String, i_dist: f64, s_dist: f64 },

    /// Every collision id has been handed out.
    #[error("No collision id left")]
    IdsExhausted,

    /// Monitor requested for an id the registry does not hold.
    #[error("Attempted to toggle the monitor of non-existent collision {0}")]
    UnknownCollisionId(CollisionId),

    #[error("No robot named {0}")]
    UnknownRobot(String),

    #[error("Robot index {index} out of range, {count} robots loaded")]
    RobotIndexOutOfRange { index: usize, count: usize },

    #[error("No convex {convex} in robot {robot}")]
    UnknownConvex { robot: String, convex: String },

    #[error("No joint {joint} in robot {robot}")]
    UnknownJoint { robot: String, joint: String },

    #[error("No body {body} in robot {robot}")]
    UnknownBody { robot: String, body: String },

    /// A matrix or vector provided by the kinematics layer has the wrong size.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The named solver backend is not handled by the collision constraint.
    #[error("Collision constraint not implemented for solver backend: {0}")]
    UnsupportedBackend(String),

    /// The geometry proxy cannot compute proximity between the two shapes.
    #[error("Proximity query not supported between {0}")]
    UnsupportedShape(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type which can have CollisionError as Error
pub type CollisionResult<T> = Result<T, CollisionError>;

//! Collision avoidance constraints for QP-based whole-body robot controllers.
//!
//! A [`CollisionsConstraint`](collisions_constraint::CollisionsConstraint) keeps pairs of
//! convex shapes apart, either between two robots or between the parts of one robot. Each
//! pair becomes one inequality on the joint accelerations, shaped by a velocity damper so
//! that the distance decreases ever more slowly as the shapes approach each other.
//!
//! # Features
//!
//! - Pairs can be added and removed while the controller runs. Ids are never reused.
//! - Body names ending with `*` expand to every convex whose name starts with the prefix.
//! - Each pair may restrict the joints allowed to move to avoid it.
//! - Two solver families are supported. The monolithic one holds every pair in a single
//!   constraint resized once per batch; the per-pair one inserts a hard task per pair.
//!   The family is chosen once, from the solver, when the constraint is created.
//! - Distance labels and arrows between the closest points can be toggled per pair in
//!   the introspection GUI.
//! - Constraint sets can be created from YAML configuration (feature `yaml_config`).
//!
//! The kinematics layer refreshes body poses, Jacobians and joint velocities in the
//! [`Robots`](robot::Robots) of the solver before every [`QpSolver::update`](solver::QpSolver::update).

pub mod collision;
pub mod collision_error;

pub mod robot;
pub mod geometry;
pub mod damper;
pub mod collision_function;

pub mod gui;
pub mod solver;

pub mod registry;

pub mod backend;

#[path = "backend/tasks_backend.rs"]
pub mod tasks_backend;

#[path = "backend/tvm_backend.rs"]
pub mod tvm_backend;

pub mod constraint_set;
pub mod collisions_constraint;

#[cfg(feature = "yaml_config")]
pub mod loader;

#[cfg(test)]
mod tests;

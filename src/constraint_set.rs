use std::any::Any;

use crate::solver::QpSolver;

/// Set of constraints that can be attached to and detached from a solver.
///
/// Attaching an attached set, or detaching a detached one, has no effect.
pub trait ConstraintSet: Any {
    fn add_to_solver(&mut self, solver: &mut QpSolver);

    fn remove_from_solver(&mut self, solver: &mut QpSolver);

    fn in_solver(&self) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

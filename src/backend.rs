//! Engagement of collision pairs with the solver, hiding the difference between the
//! monolithic and the per-pair task solver families.

use std::rc::Rc;

use nalgebra::{DVector, Point3};

use crate::collision::{Collision, CollisionId};
use crate::collision_error::CollisionResult;
use crate::solver::{Backend, QpSolver};
use crate::tasks_backend::TasksBackend;
use crate::tvm_backend::TvmBackend;

/// Live accessors to the last computation of a pair, for monitors.
#[derive(Clone)]
pub struct MonitorProbe {
    pub distance: Rc<dyn Fn() -> f64>,
    pub p1: Rc<dyn Fn() -> Point3<f64>>,
    pub p2: Rc<dyn Fn() -> Point3<f64>>,
}

/// Concrete pair to register, after wildcard expansion and validation.
pub struct PairRegistration<'a> {
    pub id: CollisionId,
    pub collision: &'a Collision,
    pub r1_index: usize,
    pub r2_index: usize,
    pub r1_selector: DVector<f64>,
    pub r2_selector: DVector<f64>,
}

pub trait CollisionBackend {
    /// Creates the per-pair state. Goes into the live problem right away if attached.
    fn register_pair(&mut self, solver: &mut QpSolver, pair: PairRegistration<'_>) -> CollisionResult<()>;

    /// Drops the per-pair state, removing it from the live problem. Returns true if the id was known.
    fn unregister_pair(&mut self, solver: &mut QpSolver, id: CollisionId) -> bool;

    /// Ends a batch of registrations or removals.
    fn commit(&mut self, solver: &mut QpSolver);

    /// Inserts every registered pair into the solver.
    fn attach_all(&mut self, solver: &mut QpSolver);

    /// Removes every inserted pair from the solver, keeping the pairs registered.
    fn detach_all(&mut self, solver: &mut QpSolver);

    /// Forgets all pairs, removing them from the solver first if attached.
    fn clear(&mut self, solver: &mut QpSolver);

    fn monitor_probe(&self, id: CollisionId) -> Option<MonitorProbe>;

    /// Number of registered pairs.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Adapter for the solver family, chosen once per constraint.
pub fn make_backend(backend: Backend, dt: f64) -> Box<dyn CollisionBackend> {
    match backend {
        Backend::Tasks => Box::new(TasksBackend::new(dt)),
        Backend::Tvm => Box::new(TvmBackend::new(dt)),
    }
}

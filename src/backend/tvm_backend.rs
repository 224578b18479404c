//! Per-pair flavour: every pair becomes its own hard task `distance >= 0` with velocity
//! damper dynamics in the shared problem graph. Functions are created on registration;
//! tasks only exist while the constraint is attached.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::backend::{CollisionBackend, MonitorProbe, PairRegistration};
use crate::collision::{Collision, CollisionId};
use crate::collision_error::CollisionResult;
use crate::collision_function::CollisionFunction;
use crate::damper::{VelocityDamper, VelocityDamperConfig, BIG_NUMBER};
use crate::solver::{PriorityLevel, QpSolver, SharedFunction, TaskHandle};

struct CollisionData {
    collision: Collision,
    function: SharedFunction,
    /// Set while in the problem
    task: Option<TaskHandle>,
}

pub struct TvmBackend {
    dt: f64,
    data: BTreeMap<CollisionId, CollisionData>,
    attached: bool,
}

impl TvmBackend {
    pub fn new(dt: f64) -> Self {
        TvmBackend { dt, data: BTreeMap::new(), attached: false }
    }

    fn insert_task(dt: f64, solver: &mut QpSolver, data: &mut CollisionData) {
        let damper = VelocityDamper::new(dt, VelocityDamperConfig::from_collision(&data.collision), BIG_NUMBER);
        data.task = Some(solver.problem_mut().add(data.function.clone(), damper, PriorityLevel::HARD));
    }

    fn remove_task(solver: &mut QpSolver, data: &mut CollisionData) {
        if let Some(task) = data.task.take() {
            solver.problem_mut().remove(task);
        }
    }
}

impl CollisionBackend for TvmBackend {
    fn register_pair(&mut self, solver: &mut QpSolver, pair: PairRegistration<'_>) -> CollisionResult<()> {
        let function = CollisionFunction::new(
            solver.robots(), pair.r1_index, pair.r2_index, pair.collision,
            pair.r1_selector, pair.r2_selector)?;
        let mut data = CollisionData {
            collision: pair.collision.clone(),
            function: Rc::new(RefCell::new(function)),
            task: None,
        };
        if self.attached {
            Self::insert_task(self.dt, solver, &mut data);
        } else {
            debug!("Task for collision {} deferred until attached", pair.id);
        }
        self.data.insert(pair.id, data);
        Ok(())
    }

    fn unregister_pair(&mut self, solver: &mut QpSolver, id: CollisionId) -> bool {
        match self.data.remove(&id) {
            Some(mut data) => {
                Self::remove_task(solver, &mut data);
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, _solver: &mut QpSolver) {}

    fn attach_all(&mut self, solver: &mut QpSolver) {
        for data in self.data.values_mut() {
            if data.task.is_none() {
                Self::insert_task(self.dt, solver, data);
            }
        }
        self.attached = true;
        debug!("Inserted {} collision tasks", self.data.len());
    }

    fn detach_all(&mut self, solver: &mut QpSolver) {
        for data in self.data.values_mut() {
            Self::remove_task(solver, data);
        }
        self.attached = false;
    }

    fn clear(&mut self, solver: &mut QpSolver) {
        for data in self.data.values_mut() {
            Self::remove_task(solver, data);
        }
        self.data.clear();
    }

    fn monitor_probe(&self, id: CollisionId) -> Option<MonitorProbe> {
        let function = &self.data.get(&id)?.function;
        let (f0, f1, f2) = (function.clone(), function.clone(), function.clone());
        Some(MonitorProbe {
            distance: Rc::new(move || f0.borrow().distance()),
            p1: Rc::new(move || *f1.borrow().p1()),
            p2: Rc::new(move || *f2.borrow().p2()),
        })
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

//! Monolithic flavour: one constraint object owns every pair and is attached to the
//! solver as a whole. Its row count changes with every registration, so the solver
//! storage is resized once per batch in [`CollisionBackend::commit`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use nalgebra::Point3;
use tracing::debug;

use crate::backend::{CollisionBackend, MonitorProbe, PairRegistration};
use crate::collision::CollisionId;
use crate::collision_error::CollisionResult;
use crate::collision_function::CollisionFunction;
use crate::damper::{VelocityDamper, VelocityDamperConfig, BIG_NUMBER};
use crate::robot::Robots;
use crate::solver::{InequalityConstraint, InequalityRow, QpSolver, SharedInequality};

struct CollData {
    function: CollisionFunction,
    damper: VelocityDamper,
}

/// Inequality constraint holding all collision pairs of one robot pair.
pub struct CollisionConstr {
    dt: f64,
    data: BTreeMap<CollisionId, CollData>,
    nr_vars: usize,
    nr_rows: usize,
}

impl CollisionConstr {
    pub fn new(dt: f64) -> Self {
        CollisionConstr { dt, data: BTreeMap::new(), nr_vars: 0, nr_rows: 0 }
    }

    pub fn add_collision(&mut self, id: CollisionId, function: CollisionFunction, config: VelocityDamperConfig) {
        let damper = VelocityDamper::new(self.dt, config, BIG_NUMBER);
        self.data.insert(id, CollData { function, damper });
    }

    pub fn rm_collision(&mut self, id: CollisionId) -> bool {
        self.data.remove(&id).is_some()
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Last computation for the pair.
    pub fn collision_data(&self, id: CollisionId) -> Option<&CollisionFunction> {
        self.data.get(&id).map(|d| &d.function)
    }

    pub fn nr_collisions(&self) -> usize {
        self.data.len()
    }

    /// Variables the storage was last sized for.
    pub fn nr_vars(&self) -> usize {
        self.nr_vars
    }
}

impl InequalityConstraint for CollisionConstr {
    fn update_nr_vars(&mut self, robots: &Robots) {
        self.nr_vars = (0..robots.len())
            .filter_map(|i| robots.robot(i).ok())
            .map(|r| r.nr_dof())
            .sum();
        self.nr_rows = self.data.len();
    }

    fn max_inequalities(&self) -> usize {
        self.nr_rows
    }

    fn update(&mut self, robots: &Robots, rows: &mut Vec<InequalityRow>) -> CollisionResult<()> {
        for data in self.data.values_mut() {
            data.function.update(robots)?;
            let bound = data.damper.acceleration_bound(data.function.distance(), data.function.speed());
            rows.push(InequalityRow::from_function(&data.function, bound));
        }
        Ok(())
    }
}

pub struct TasksBackend {
    constr: Rc<RefCell<CollisionConstr>>,
    attached: bool,
}

impl TasksBackend {
    pub fn new(dt: f64) -> Self {
        TasksBackend { constr: Rc::new(RefCell::new(CollisionConstr::new(dt))), attached: false }
    }

    fn shared(&self) -> SharedInequality {
        self.constr.clone()
    }
}

impl CollisionBackend for TasksBackend {
    fn register_pair(&mut self, solver: &mut QpSolver, pair: PairRegistration<'_>) -> CollisionResult<()> {
        let function = CollisionFunction::new(
            solver.robots(), pair.r1_index, pair.r2_index, pair.collision,
            pair.r1_selector, pair.r2_selector)?;
        self.constr.borrow_mut()
            .add_collision(pair.id, function, VelocityDamperConfig::from_collision(pair.collision));
        Ok(())
    }

    fn unregister_pair(&mut self, _solver: &mut QpSolver, id: CollisionId) -> bool {
        self.constr.borrow_mut().rm_collision(id)
    }

    fn commit(&mut self, solver: &mut QpSolver) {
        self.constr.borrow_mut().update_nr_vars(solver.robots());
        solver.tasks_mut().update_constr_size();
    }

    fn attach_all(&mut self, solver: &mut QpSolver) {
        self.constr.borrow_mut().update_nr_vars(solver.robots());
        solver.tasks_mut().add_inequality(self.shared());
        solver.tasks_mut().update_constr_size();
        self.attached = true;
        debug!("Collision constraint attached with {} pairs", self.len());
    }

    fn detach_all(&mut self, solver: &mut QpSolver) {
        solver.tasks_mut().remove_inequality(&self.shared());
        solver.tasks_mut().update_constr_size();
        self.attached = false;
    }

    fn clear(&mut self, solver: &mut QpSolver) {
        self.constr.borrow_mut().reset();
        if self.attached {
            self.commit(solver);
        }
    }

    fn monitor_probe(&self, id: CollisionId) -> Option<MonitorProbe> {
        self.constr.borrow().collision_data(id)?;
        let (c0, c1, c2) = (self.constr.clone(), self.constr.clone(), self.constr.clone());
        Some(MonitorProbe {
            distance: Rc::new(move || {
                c0.borrow().collision_data(id).map(|f| f.distance()).unwrap_or(f64::NAN)
            }),
            p1: Rc::new(move || {
                c1.borrow().collision_data(id).map(|f| *f.p1()).unwrap_or_else(Point3::origin)
            }),
            p2: Rc::new(move || {
                c2.borrow().collision_data(id).map(|f| *f.p2()).unwrap_or_else(Point3::origin)
            }),
        })
    }

    fn len(&self) -> usize {
        self.constr.borrow().nr_collisions()
    }
}

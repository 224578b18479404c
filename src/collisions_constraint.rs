//! Collision avoidance between the convexes of one robot pair (or of one robot with
//! itself), kept consistent with the solver while pairs are added and removed live.
//!
//! ```
//! use std::rc::Rc;
//! use nalgebra::Isometry3;
//! use parry3d::shape::SharedShape;
//! use wbc_collisions::collision::Collision;
//! use wbc_collisions::collisions_constraint::CollisionsConstraint;
//! use wbc_collisions::constraint_set::ConstraintSet;
//! use wbc_collisions::gui::Gui;
//! use wbc_collisions::robot::{Joint, Robot, Robots};
//! use wbc_collisions::solver::{Backend, QpSolver};
//!
//! let mut arm = Robot::new("arm", vec![Joint::new("wrist", 1)]);
//! arm.add_body("L_wrist", Isometry3::identity());
//! arm.add_convex("L_wrist", "L_wrist", SharedShape::ball(0.05), Isometry3::identity()).unwrap();
//! let mut env = Robot::new("env", vec![]);
//! env.add_body("table", Isometry3::translation(0.0, 0.0, -0.5));
//! env.add_convex("table", "table", SharedShape::cuboid(0.5, 0.5, 0.1), Isometry3::identity()).unwrap();
//!
//! let gui = Rc::new(Gui::new());
//! let mut solver = QpSolver::new(Backend::Tvm, Robots::new(vec![arm, env]), 0.005).with_gui(gui);
//! let mut constraint = CollisionsConstraint::new(&solver, 0, 1).unwrap();
//! constraint.add_collision(&mut solver, &Collision::new("L_wrist", "table", 0.05, 0.01, 0.5)).unwrap();
//! constraint.add_to_solver(&mut solver);
//!
//! let rows = solver.update().unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use nalgebra::DVector;
use tracing::{debug, error, warn};

use crate::backend::{make_backend, CollisionBackend, PairRegistration};
use crate::collision::{Collision, CollisionId};
use crate::collision_error::{CollisionError, CollisionResult};
use crate::constraint_set::ConstraintSet;
use crate::gui::{Category, Element, Gui};
use crate::registry::{expand_wildcards, CollisionRegistry};
use crate::solver::QpSolver;

pub struct CollisionsConstraint {
    pub r1_index: usize,
    pub r2_index: usize,
    registry: CollisionRegistry,
    backend: Box<dyn CollisionBackend>,
    /// Ids with an active monitor, shared with the checkbox callbacks
    monitored: Rc<RefCell<BTreeSet<CollisionId>>>,
    /// Checkbox clicks waiting for [`CollisionsConstraint::handle_gui_requests`]
    requests: Rc<RefCell<Vec<CollisionId>>>,
    gui: Option<Rc<Gui>>,
    category: Category,
    in_solver: bool,
}

impl CollisionsConstraint {
    /// Constraint between the convexes of robots `r1_index` and `r2_index` of the solver.
    /// Equal indices give a self-collision constraint.
    pub fn new(solver: &QpSolver, r1_index: usize, r2_index: usize) -> CollisionResult<Self> {
        let r1 = solver.robots().robot(r1_index)?;
        let r2 = solver.robots().robot(r2_index)?;
        Ok(CollisionsConstraint {
            r1_index,
            r2_index,
            registry: CollisionRegistry::new(),
            backend: make_backend(solver.backend(), solver.dt()),
            monitored: Rc::new(RefCell::new(BTreeSet::new())),
            requests: Rc::new(RefCell::new(Vec::new())),
            gui: None,
            category: vec!["Collisions".to_string(), format!("{}/{}", r1.name(), r2.name())],
            in_solver: false,
        })
    }

    /// Adds one collision, expanding wildcards. See [`CollisionsConstraint::add_collisions`].
    pub fn add_collision(&mut self, solver: &mut QpSolver, collision: &Collision) -> CollisionResult<()> {
        self.add_collisions(solver, std::slice::from_ref(collision))
    }

    /// Adds the collisions in order. Pairs already registered are skipped. Stops at the
    /// first failing collision; pairs added before it stay. The solver storage is
    /// resized once for the whole batch.
    pub fn add_collisions(&mut self, solver: &mut QpSolver, collisions: &[Collision]) -> CollisionResult<()> {
        let mut result = Ok(());
        for collision in collisions {
            result = self.add_one(solver, collision);
            if result.is_err() {
                break;
            }
        }
        self.backend.commit(solver);
        result
    }

    /// Removes the pair with exactly these names. Returns true if it was registered.
    pub fn remove_collision(&mut self, solver: &mut QpSolver, body1: &str, body2: &str) -> bool {
        let removed = self.remove_one(solver, body1, body2);
        if removed {
            self.backend.commit(solver);
        }
        removed
    }

    /// Removes every listed pair, resizing the solver storage once. Returns how many were removed.
    pub fn remove_collisions(&mut self, solver: &mut QpSolver, collisions: &[Collision]) -> usize {
        let removed = collisions
            .iter()
            .filter(|c| self.remove_one(solver, &c.body1, &c.body2))
            .count();
        if removed > 0 {
            self.backend.commit(solver);
        }
        removed
    }

    /// Removes every pair whose first convex is attached to body `body1` of the first robot
    /// and whose second convex is attached to body `body2` of the second robot, no matter
    /// which pattern produced them. Returns true if any pair was removed.
    pub fn remove_collision_by_body(&mut self, solver: &mut QpSolver, body1: &str, body2: &str) -> CollisionResult<bool> {
        let keys: Vec<(String, String)> = {
            let r1 = solver.robots().robot(self.r1_index)?;
            let r2 = solver.robots().robot(self.r2_index)?;
            self.registry
                .collisions()
                .filter(|c| {
                    r1.convex(&c.body1).is_ok_and(|cv| cv.body == body1)
                        && r2.convex(&c.body2).is_ok_and(|cv| cv.body == body2)
                })
                .map(|c| (c.body1.clone(), c.body2.clone()))
                .collect()
        };
        for (b1, b2) in &keys {
            self.remove_one(solver, b1, b2);
        }
        if !keys.is_empty() {
            self.backend.commit(solver);
        }
        Ok(!keys.is_empty())
    }

    /// Removes all pairs and their GUI elements. Ids keep increasing afterwards.
    pub fn reset(&mut self, solver: &mut QpSolver) {
        self.registry.clear();
        self.backend.clear(solver);
        self.monitored.borrow_mut().clear();
        self.requests.borrow_mut().clear();
        if let Some(gui) = &self.gui {
            gui.remove_category(&self.category);
        }
    }

    /// Shows or hides the distance label and arrow of a pair. Does nothing without a GUI.
    pub fn toggle_collision_monitor(&mut self, id: CollisionId) -> CollisionResult<()> {
        let Some(collision) = self.registry.get(id) else {
            let err = CollisionError::UnknownCollisionId(id);
            error!("[CollisionsConstraint] {}", err);
            return Err(err);
        };
        let Some(gui) = self.gui.clone() else {
            debug!("No GUI, monitor of collision {} not toggled", id);
            return Ok(());
        };
        let label = collision.label();
        let arrows = self.sub_category("Arrows");
        if self.monitored.borrow().contains(&id) {
            gui.remove_element(&self.category, &label);
            gui.remove_element(&arrows, &label);
            self.monitored.borrow_mut().remove(&id);
        } else {
            let probe = self.backend.monitor_probe(id).ok_or(CollisionError::UnknownCollisionId(id))?;
            let distance = probe.distance.clone();
            gui.add_element(&self.category, Element::label(label.as_str(), move || {
                format!("{:.2} cm", distance() * 100.0)
            }));
            let (p1, p2) = (probe.p1, probe.p2);
            gui.add_element(&arrows, Element::arrow(label.as_str(), move || p1(), move || p2()));
            self.monitored.borrow_mut().insert(id);
        }
        Ok(())
    }

    /// Applies the monitor checkbox clicks received since the last call. Meant to be
    /// called between control cycles. Clicks on pairs removed meanwhile are dropped.
    pub fn handle_gui_requests(&mut self) -> CollisionResult<()> {
        let requests: Vec<CollisionId> = self.requests.borrow_mut().drain(..).collect();
        for id in requests {
            if self.registry.get(id).is_some() {
                self.toggle_collision_monitor(id)?;
            } else {
                debug!("Dropping monitor request for removed collision {}", id);
            }
        }
        Ok(())
    }

    pub fn has_collision(&self, body1: &str, body2: &str) -> bool {
        self.registry.contains(body1, body2)
    }

    pub fn collision_id(&self, body1: &str, body2: &str) -> Option<CollisionId> {
        self.registry.id(body1, body2)
    }

    /// Registered pairs, in registration order.
    pub fn collisions(&self) -> Vec<&Collision> {
        self.registry.collisions().collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn is_monitored(&self, id: CollisionId) -> bool {
        self.monitored.borrow().contains(&id)
    }

    /// GUI category of this constraint.
    pub fn category(&self) -> &[String] {
        &self.category
    }

    fn add_one(&mut self, solver: &mut QpSolver, collision: &Collision) -> CollisionResult<()> {
        if collision.body1.is_empty() || collision.body2.is_empty() {
            let err = CollisionError::EmptyBodyName {
                body1: collision.body1.clone(),
                body2: collision.body2.clone(),
            };
            error!("{}", err);
            return Err(err);
        }
        if collision.s_dist < 0.0 || !(collision.i_dist > collision.s_dist) {
            let err = CollisionError::InvalidDistances {
                body1: collision.body1.clone(),
                body2: collision.body2.clone(),
                i_dist: collision.i_dist,
                s_dist: collision.s_dist,
            };
            error!("{}", err);
            return Err(err);
        }
        let concrete = {
            let r1 = solver.robots().robot(self.r1_index)?;
            let r2 = solver.robots().robot(self.r2_index)?;
            expand_wildcards(collision, r1, r2)?
        };
        for collision in &concrete {
            self.register(solver, collision)?;
        }
        Ok(())
    }

    fn register(&mut self, solver: &mut QpSolver, collision: &Collision) -> CollisionResult<()> {
        if self.registry.contains(&collision.body1, &collision.body2) {
            warn!("Collision {}/{} already registered, ignored", collision.body1, collision.body2);
            return Ok(());
        }
        let (r1_selector, r2_selector) = {
            let r1 = solver.robots().robot(self.r1_index)?;
            let r2 = solver.robots().robot(self.r2_index)?;
            r1.convex(&collision.body1)?;
            r2.convex(&collision.body2)?;
            let r1_selector = r1.joint_selector(&collision.r1_joints)?;
            // The whole gradient of a self-collision lives on the first robot
            let r2_selector = if self.r1_index == self.r2_index {
                DVector::zeros(0)
            } else {
                r2.joint_selector(&collision.r2_joints)?
            };
            (r1_selector, r2_selector)
        };

        let Some(id) = self.registry.create_id(collision)? else {
            return Ok(());
        };
        let registration = PairRegistration {
            id,
            collision,
            r1_index: self.r1_index,
            r2_index: self.r2_index,
            r1_selector,
            r2_selector,
        };
        if let Err(err) = self.backend.register_pair(solver, registration) {
            self.registry.pop(&collision.body1, &collision.body2);
            return Err(err);
        }
        debug!("Registered collision {} as {}", collision, id);

        self.capture_gui(solver);
        self.add_monitor_button(id, collision);
        Ok(())
    }

    fn remove_one(&mut self, solver: &mut QpSolver, body1: &str, body2: &str) -> bool {
        let Some((id, collision)) = self.registry.pop(body1, body2) else {
            return false;
        };
        self.remove_monitor(id, &collision);
        self.backend.unregister_pair(solver, id);
        debug!("Removed collision {}/{} ({})", body1, body2, id);
        true
    }

    fn capture_gui(&mut self, solver: &QpSolver) {
        if self.gui.is_none() {
            self.gui = solver.gui().cloned();
        }
    }

    fn sub_category(&self, name: &str) -> Category {
        let mut category = self.category.clone();
        category.push(name.to_string());
        category
    }

    fn add_monitor_button(&self, id: CollisionId, collision: &Collision) {
        let Some(gui) = &self.gui else {
            return;
        };
        if !self.in_solver {
            return;
        }
        let monitored = self.monitored.clone();
        let requests = self.requests.clone();
        gui.add_element(&self.sub_category("Monitors"), Element::checkbox(
            collision.monitor_name(),
            move || monitored.borrow().contains(&id),
            move || requests.borrow_mut().push(id),
        ));
    }

    /// Hides the monitor of a pair being removed, then its checkbox.
    fn remove_monitor(&mut self, id: CollisionId, collision: &Collision) {
        let Some(gui) = self.gui.clone() else {
            return;
        };
        if self.monitored.borrow_mut().remove(&id) {
            gui.remove_element(&self.category, &collision.label());
            gui.remove_element(&self.sub_category("Arrows"), &collision.label());
        }
        gui.remove_element(&self.sub_category("Monitors"), &collision.monitor_name());
    }
}

impl ConstraintSet for CollisionsConstraint {
    fn add_to_solver(&mut self, solver: &mut QpSolver) {
        if self.in_solver {
            return;
        }
        self.capture_gui(solver);
        self.backend.attach_all(solver);
        self.in_solver = true;
        for (id, collision) in self.registry.entries() {
            self.add_monitor_button(id, collision);
        }
    }

    fn remove_from_solver(&mut self, solver: &mut QpSolver) {
        if !self.in_solver {
            return;
        }
        self.backend.detach_all(solver);
        self.in_solver = false;
        self.monitored.borrow_mut().clear();
        self.requests.borrow_mut().clear();
        if let Some(gui) = &self.gui {
            gui.remove_category(&self.category);
        }
    }

    fn in_solver(&self) -> bool {
        self.in_solver
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//! Boundary with the QP solver.
//!
//! The numerical solve is out of reach of this crate. What is modelled here is how
//! constraints engage with the two solver families:
//!
//! - [`TasksProblem`]: monolithic inequality constraint objects, each managing many rows
//!   internally. Whenever the row count of an object changes the solver must be told to
//!   resize its constraint storage.
//! - [`TvmProblem`]: a problem graph where every constrained function is an individual
//!   task inserted with a priority and a task dynamics.
//!
//! [`QpSolver::update`] runs the per-cycle recomputation and returns the inequality rows
//! handed to the numerical solve.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use nalgebra::RowDVector;

use crate::collision_error::{CollisionError, CollisionResult};
use crate::collision_function::CollisionFunction;
use crate::damper::VelocityDamper;
use crate::gui::Gui;
use crate::robot::Robots;

/// Solver family, fixed for the lifetime of a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Monolithic constraint objects
    Tasks,
    /// Per-function tasks in a problem graph
    Tvm,
}

impl FromStr for Backend {
    type Err = CollisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tasks" => Ok(Backend::Tasks),
            "tvm" => Ok(Backend::Tvm),
            _ => Err(CollisionError::UnsupportedBackend(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Tasks => write!(f, "Tasks"),
            Backend::Tvm => write!(f, "TVM"),
        }
    }
}

/// One inequality `jacobian_r1 * alpha_dot_r1 + jacobian_r2 * alpha_dot_r2 >= lower_bound`.
/// `jacobian_r2` is empty when both sides belong to the same robot.
#[derive(Debug, Clone)]
pub struct InequalityRow {
    pub r1_index: usize,
    pub r2_index: usize,
    pub jacobian_r1: RowDVector<f64>,
    pub jacobian_r2: RowDVector<f64>,
    pub lower_bound: f64,
}

impl InequalityRow {
    /// Row of a damped distance function.
    pub fn from_function(function: &CollisionFunction, lower_bound: f64) -> Self {
        InequalityRow {
            r1_index: function.r1_index(),
            r2_index: function.r2_index(),
            jacobian_r1: function.jacobian_r1().clone(),
            jacobian_r2: function.jacobian_r2().clone(),
            lower_bound,
        }
    }
}

/// Monolithic inequality constraint attached to a [`TasksProblem`].
pub trait InequalityConstraint {
    /// Resizes internal storage after the variables or the managed rows changed.
    fn update_nr_vars(&mut self, robots: &Robots);

    /// Number of rows this constraint may produce.
    fn max_inequalities(&self) -> usize;

    /// Recomputes every row for the current robot state, in a stable order.
    fn update(&mut self, robots: &Robots, rows: &mut Vec<InequalityRow>) -> CollisionResult<()>;
}

pub type SharedInequality = Rc<RefCell<dyn InequalityConstraint>>;

#[derive(Default)]
pub struct TasksProblem {
    constraints: Vec<SharedInequality>,
    nr_inequalities: usize,
    resize_count: usize,
}

impl TasksProblem {
    /// Attaches a constraint object. Attaching the same object twice has no effect.
    pub fn add_inequality(&mut self, constraint: SharedInequality) {
        if !self.contains(&constraint) {
            self.constraints.push(constraint);
        }
    }

    /// Returns true if the object was attached.
    pub fn remove_inequality(&mut self, constraint: &SharedInequality) -> bool {
        let before = self.constraints.len();
        self.constraints.retain(|c| !Rc::ptr_eq(c, constraint));
        self.constraints.len() != before
    }

    pub fn contains(&self, constraint: &SharedInequality) -> bool {
        self.constraints.iter().any(|c| Rc::ptr_eq(c, constraint))
    }

    /// Recomputes the size of the inequality storage from the attached constraints.
    pub fn update_constr_size(&mut self) {
        self.nr_inequalities = self.constraints.iter().map(|c| c.borrow().max_inequalities()).sum();
        self.resize_count += 1;
    }

    /// Rows reserved in the solver.
    pub fn nr_inequalities(&self) -> usize {
        self.nr_inequalities
    }

    pub fn nr_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Number of storage resizes since creation.
    pub fn resize_count(&self) -> usize {
        self.resize_count
    }

    fn update(&mut self, robots: &Robots, rows: &mut Vec<InequalityRow>) -> CollisionResult<()> {
        for constraint in &self.constraints {
            constraint.borrow_mut().update(robots, rows)?;
        }
        Ok(())
    }
}

/// Priority of a task in the problem graph. Level 0 is a hard constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityLevel(pub u32);

impl PriorityLevel {
    pub const HARD: PriorityLevel = PriorityLevel(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u64);

pub type SharedFunction = Rc<RefCell<CollisionFunction>>;

/// `function >= 0` enforced through `damper`.
struct TaskEntry {
    function: SharedFunction,
    damper: VelocityDamper,
    priority: PriorityLevel,
}

#[derive(Default)]
pub struct TvmProblem {
    tasks: BTreeMap<TaskHandle, TaskEntry>,
    next_handle: u64,
}

impl TvmProblem {
    /// Inserts the task `function >= 0` with the given dynamics and priority.
    pub fn add(&mut self, function: SharedFunction, damper: VelocityDamper, priority: PriorityLevel) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.insert(handle, TaskEntry { function, damper, priority });
        handle
    }

    /// Returns true if the task was in the problem.
    pub fn remove(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(&handle).is_some()
    }

    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    pub fn priority(&self, handle: TaskHandle) -> Option<PriorityLevel> {
        self.tasks.get(&handle).map(|t| t.priority)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks are recomputed in insertion order.
    fn update(&mut self, robots: &Robots, rows: &mut Vec<InequalityRow>) -> CollisionResult<()> {
        for task in self.tasks.values_mut() {
            let mut function = task.function.borrow_mut();
            function.update(robots)?;
            let bound = task.damper.acceleration_bound(function.distance(), function.speed());
            rows.push(InequalityRow::from_function(&function, bound));
        }
        Ok(())
    }
}

pub struct QpSolver {
    backend: Backend,
    dt: f64,
    robots: Robots,
    gui: Option<Rc<Gui>>,
    tasks: TasksProblem,
    problem: TvmProblem,
}

impl QpSolver {
    pub fn new(backend: Backend, robots: Robots, dt: f64) -> Self {
        QpSolver {
            backend,
            dt,
            robots,
            gui: None,
            tasks: TasksProblem::default(),
            problem: TvmProblem::default(),
        }
    }

    /// Attach the GUI that constraints may populate.
    pub fn with_gui(mut self, gui: Rc<Gui>) -> Self {
        self.gui = Some(gui);
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Control period
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn robots(&self) -> &Robots {
        &self.robots
    }

    pub fn robots_mut(&mut self) -> &mut Robots {
        &mut self.robots
    }

    pub fn gui(&self) -> Option<&Rc<Gui>> {
        self.gui.as_ref()
    }

    pub fn tasks(&self) -> &TasksProblem {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TasksProblem {
        &mut self.tasks
    }

    pub fn problem(&self) -> &TvmProblem {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut TvmProblem {
        &mut self.problem
    }

    /// Recomputes every attached constraint for the current robot state and returns the
    /// rows for the numerical solve. Constraints must not be added or removed meanwhile.
    pub fn update(&mut self) -> CollisionResult<Vec<InequalityRow>> {
        let mut rows = Vec::with_capacity(self.tasks.nr_inequalities() + self.problem.len());
        self.tasks.update(&self.robots, &mut rows)?;
        self.problem.update(&self.robots, &mut rows)?;
        Ok(rows)
    }
}

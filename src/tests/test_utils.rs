use std::rc::Rc;

use nalgebra::{Isometry3, Matrix6xX};
use parry3d::shape::SharedShape;

use crate::collision::Collision;
use crate::collisions_constraint::CollisionsConstraint;
use crate::gui::{Category, Gui};
use crate::robot::{Joint, Robot, Robots};
use crate::solver::{Backend, QpSolver};

pub const DT: f64 = 0.005;

/// Both solver families, for tests that must behave the same on each.
pub const BACKENDS: [Backend; 2] = [Backend::Tasks, Backend::Tvm];

/// Four-joint arm standing on a torso. The wrist hangs 0.15 above the table of [`env`].
///
/// Convexes (all balls): `torso`, `armLink1`, `armLink2`, and two convexes attached to
/// the `L_wrist` body, `L_wrist` and `L_wrist_cover`.
pub fn arm() -> Robot {
    let mut arm = Robot::new("arm", vec![
        Joint::new("base", 1),
        Joint::new("shoulder", 1),
        Joint::new("elbow", 1),
        Joint::new("wrist", 1),
    ]);
    arm.add_body("torso", Isometry3::translation(0.0, 0.0, 1.0));
    arm.add_body("armLink1", Isometry3::translation(0.3, 0.0, 1.0));
    arm.add_body("armLink2", Isometry3::translation(0.6, 0.0, 1.0));
    arm.add_body("L_wrist", Isometry3::translation(0.6, 0.0, 0.3));

    let ball = |r| SharedShape::ball(r);
    arm.add_convex("torso", "torso", ball(0.1), Isometry3::identity()).unwrap();
    arm.add_convex("armLink1", "armLink1", ball(0.05), Isometry3::identity()).unwrap();
    arm.add_convex("armLink2", "armLink2", ball(0.05), Isometry3::identity()).unwrap();
    arm.add_convex("L_wrist", "L_wrist", ball(0.05), Isometry3::identity()).unwrap();
    arm.add_convex("L_wrist_cover", "L_wrist", ball(0.06), Isometry3::identity()).unwrap();

    // The elbow lifts the wrist
    let mut jacobian = Matrix6xX::zeros(4);
    jacobian[(2, 2)] = 1.0;
    arm.set_body_state("L_wrist", Isometry3::translation(0.6, 0.0, 0.3), jacobian).unwrap();

    arm.with_common_self_collisions(vec![
        Collision::new("armLink1", "torso", 0.05, 0.01, 0.0),
        Collision::new("armLink2", "torso", 0.05, 0.01, 0.0),
        Collision::new("L_wrist", "torso", 0.05, 0.01, 0.0),
    ])
    .with_minimal_self_collisions(vec![
        Collision::new("armLink2", "torso", 0.05, 0.01, 0.0),
        Collision::new("L_wrist", "torso", 0.05, 0.01, 0.0),
    ])
}

/// Fixed environment: a table with its top at z = 0.1 and a large floor below it.
pub fn env() -> Robot {
    let mut env = Robot::new("env", vec![]);
    env.add_body("table", Isometry3::translation(0.6, 0.0, 0.0));
    env.add_body("ground", Isometry3::translation(0.0, 0.0, -1.0));
    env.add_convex("table", "table", SharedShape::cuboid(0.5, 0.5, 0.1), Isometry3::identity()).unwrap();
    env.add_convex("envSurface", "ground", SharedShape::cuboid(2.0, 2.0, 0.1), Isometry3::identity()).unwrap();
    env
}

pub fn solver(backend: Backend) -> QpSolver {
    QpSolver::new(backend, Robots::new(vec![arm(), env()]), DT)
}

pub fn solver_with_gui(backend: Backend) -> (QpSolver, Rc<Gui>) {
    let gui = Rc::new(Gui::new());
    (solver(backend).with_gui(gui.clone()), gui)
}

/// Constraint between the arm and the environment.
pub fn arm_env(solver: &QpSolver) -> CollisionsConstraint {
    CollisionsConstraint::new(solver, 0, 1).unwrap()
}

pub fn wrist_table() -> Collision {
    Collision::new("L_wrist", "table", 0.05, 0.01, 0.5)
}

/// Moves the wrist body so that its lowest point is `gap` above the table.
pub fn set_wrist_gap(solver: &mut QpSolver, gap: f64) {
    let wrist = solver.robots_mut().robot_mut(0).unwrap();
    let jacobian = wrist.body("L_wrist").unwrap().jacobian.clone();
    wrist
        .set_body_state("L_wrist", Isometry3::translation(0.6, 0.0, 0.1 + 0.05 + gap), jacobian)
        .unwrap();
}

pub fn category(items: &[&str]) -> Category {
    items.iter().map(|s| s.to_string()).collect()
}

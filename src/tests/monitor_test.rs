use nalgebra::Point3;

use crate::collision::Collision;
use crate::collision_error::CollisionError;
use crate::constraint_set::ConstraintSet;
use crate::solver::Backend;
use crate::tests::test_utils::{arm_env, category, set_wrist_gap, solver, solver_with_gui, wrist_table, BACKENDS};

const MONITOR: &str = "Monitor L_wrist/table";
const LABEL: &str = "L_wrist::table";

#[test]
fn test_checkbox_only_while_attached() {
    for backend in BACKENDS {
        let (mut solver, gui) = solver_with_gui(backend);
        let monitors = category(&["Collisions", "arm/env", "Monitors"]);
        let mut constraint = arm_env(&solver);
        constraint.add_collision(&mut solver, &wrist_table()).unwrap();
        assert!(gui.is_empty());

        constraint.add_to_solver(&mut solver);
        assert_eq!(gui.element_names(&monitors), vec![MONITOR.to_string()]);
        assert_eq!(gui.checkbox_state(&monitors, MONITOR), Some(false));

        // Added while attached
        constraint
            .add_collision(&mut solver, &Collision::new("armLink1", "table", 0.05, 0.01, 0.0))
            .unwrap();
        assert!(gui.has_element(&monitors, "Monitor armLink1/table"));

        constraint.remove_from_solver(&mut solver);
        assert!(gui.is_empty());
    }
}

#[test]
fn test_toggle_twice_restores_gui() {
    for backend in BACKENDS {
        let (mut solver, gui) = solver_with_gui(backend);
        let root = category(&["Collisions", "arm/env"]);
        let arrows = category(&["Collisions", "arm/env", "Arrows"]);
        let mut constraint = arm_env(&solver);
        constraint.add_collision(&mut solver, &wrist_table()).unwrap();
        constraint.add_to_solver(&mut solver);
        solver.update().unwrap();
        let before = gui.snapshot();
        let id = constraint.collision_id("L_wrist", "table").unwrap();

        constraint.toggle_collision_monitor(id).unwrap();
        assert!(constraint.is_monitored(id));
        assert_eq!(gui.label_text(&root, LABEL).as_deref(), Some("15.00 cm"));
        let (start, end) = gui.arrow_points(&arrows, LABEL).unwrap();
        assert!((start - Point3::new(0.6, 0.0, 0.25)).norm() < 1e-5);
        assert!((end - Point3::new(0.6, 0.0, 0.1)).norm() < 1e-5);

        constraint.toggle_collision_monitor(id).unwrap();
        assert!(!constraint.is_monitored(id));
        assert_eq!(gui.snapshot(), before);
    }
}

#[test]
fn test_label_follows_distance() {
    let (mut solver, gui) = solver_with_gui(Backend::Tvm);
    let root = category(&["Collisions", "arm/env"]);
    let mut constraint = arm_env(&solver);
    constraint.add_collision(&mut solver, &wrist_table()).unwrap();
    constraint.add_to_solver(&mut solver);
    constraint.toggle_collision_monitor(0).unwrap();

    set_wrist_gap(&mut solver, 0.0312);
    solver.update().unwrap();
    assert_eq!(gui.label_text(&root, LABEL).as_deref(), Some("3.12 cm"));
}

#[test]
fn test_toggle_unknown_id() {
    let (mut solver, _gui) = solver_with_gui(Backend::Tasks);
    let mut constraint = arm_env(&solver);
    constraint.add_collision(&mut solver, &wrist_table()).unwrap();
    assert_eq!(
        constraint.toggle_collision_monitor(7),
        Err(CollisionError::UnknownCollisionId(7))
    );
}

#[test]
fn test_toggle_without_gui_does_nothing() {
    for backend in BACKENDS {
        let mut solver = solver(backend);
        let mut constraint = arm_env(&solver);
        constraint.add_collision(&mut solver, &wrist_table()).unwrap();
        constraint.add_to_solver(&mut solver);

        assert_eq!(constraint.toggle_collision_monitor(0), Ok(()));
        assert!(!constraint.is_monitored(0));
        // Unknown ids are still reported
        assert!(constraint.toggle_collision_monitor(1).is_err());
    }
}

#[test]
fn test_click_applied_between_cycles() {
    let (mut solver, gui) = solver_with_gui(Backend::Tasks);
    let root = category(&["Collisions", "arm/env"]);
    let monitors = category(&["Collisions", "arm/env", "Monitors"]);
    let mut constraint = arm_env(&solver);
    constraint.add_collision(&mut solver, &wrist_table()).unwrap();
    constraint.add_to_solver(&mut solver);

    assert!(gui.click(&monitors, MONITOR));
    assert!(!constraint.is_monitored(0));
    assert!(!gui.has_element(&root, LABEL));

    constraint.handle_gui_requests().unwrap();
    assert!(constraint.is_monitored(0));
    assert_eq!(gui.checkbox_state(&monitors, MONITOR), Some(true));
    assert!(gui.has_element(&root, LABEL));

    assert!(gui.click(&monitors, MONITOR));
    constraint.handle_gui_requests().unwrap();
    assert!(!constraint.is_monitored(0));
    assert!(!gui.has_element(&root, LABEL));
}

#[test]
fn test_click_on_removed_pair_is_dropped() {
    let (mut solver, gui) = solver_with_gui(Backend::Tvm);
    let monitors = category(&["Collisions", "arm/env", "Monitors"]);
    let mut constraint = arm_env(&solver);
    constraint.add_collision(&mut solver, &wrist_table()).unwrap();
    constraint.add_to_solver(&mut solver);

    assert!(gui.click(&monitors, MONITOR));
    assert!(constraint.remove_collision(&mut solver, "L_wrist", "table"));
    assert_eq!(constraint.handle_gui_requests(), Ok(()));
    assert!(gui.is_empty());
}

#[test]
fn test_removing_monitored_pair_tears_down_monitor() {
    for backend in BACKENDS {
        let (mut solver, gui) = solver_with_gui(backend);
        let mut constraint = arm_env(&solver);
        constraint.add_collisions(&mut solver, &[
            wrist_table(),
            Collision::new("armLink1", "table", 0.05, 0.01, 0.0),
        ]).unwrap();
        constraint.add_to_solver(&mut solver);
        let before = gui.snapshot();
        constraint.toggle_collision_monitor(0).unwrap();
        constraint.toggle_collision_monitor(1).unwrap();

        assert!(constraint.remove_collision(&mut solver, "L_wrist", "table"));
        assert!(!constraint.is_monitored(0));
        assert!(constraint.is_monitored(1));
        let remaining: Vec<String> = gui.snapshot().into_iter().map(|(_, name)| name).collect();
        assert!(!remaining.iter().any(|name| name == LABEL || name == MONITOR));

        assert!(constraint.remove_collision_by_body(&mut solver, "armLink1", "table").unwrap());
        assert!(gui.is_empty());
        assert_eq!(before.len(), 2);
    }
}

#[test]
fn test_reset_clears_gui() {
    let (mut solver, gui) = solver_with_gui(Backend::Tasks);
    let mut constraint = arm_env(&solver);
    constraint.add_collision(&mut solver, &wrist_table()).unwrap();
    constraint.add_to_solver(&mut solver);
    constraint.toggle_collision_monitor(0).unwrap();

    constraint.reset(&mut solver);
    assert!(gui.is_empty());
    assert!(!constraint.is_monitored(0));
}

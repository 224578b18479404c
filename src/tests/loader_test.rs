use crate::collisions_constraint::CollisionsConstraint;
use crate::constraint_set::ConstraintSet;
use crate::loader::ConstraintSetLoader;
use crate::solver::Backend;
use crate::tests::test_utils::{solver, BACKENDS};

fn collisions(set: &dyn ConstraintSet) -> &CollisionsConstraint {
    set.as_any().downcast_ref::<CollisionsConstraint>().unwrap()
}

#[test]
fn test_minimal_self_collisions() {
    let mut solver = solver(Backend::Tvm);
    let set = ConstraintSetLoader::default()
        .load_str(&mut solver, "type: collision\nr1: arm\nr2: arm\nuseMinimal: true\n")
        .unwrap();
    let constraint = collisions(set.as_ref());

    assert_eq!((constraint.r1_index, constraint.r2_index), (0, 0));
    assert_eq!(constraint.len(), 2);
    assert_eq!(constraint.collision_id("armLink2", "torso"), Some(0));
    assert_eq!(constraint.collision_id("L_wrist", "torso"), Some(1));
    assert!(!set.in_solver());
    assert!(solver.problem().is_empty());
}

#[test]
fn test_common_wins_over_minimal() {
    let mut solver = solver(Backend::Tasks);
    let set = ConstraintSetLoader::default()
        .load_str(&mut solver, "type: collision\nuseCommon: true\nuseMinimal: true\n")
        .unwrap();
    assert_eq!(collisions(set.as_ref()).len(), 3);
}

#[test]
fn test_predefined_sets_only_for_self_collisions() {
    let mut solver = solver(Backend::Tasks);
    let set = ConstraintSetLoader::default()
        .load_str(&mut solver, "type: collision\nr2Index: 1\nuseCommon: true\n")
        .unwrap();
    assert!(collisions(set.as_ref()).is_empty());
}

#[test]
fn test_wrist_table_scenario() {
    let config = r#"
type: collision
r1Index: 0
r2: env
collisions:
  - body1: L_wrist
    body2: table
    iDist: 0.1
    sDist: 0.02
    damping: 1
    r1Joints: [elbow, wrist]
  - body1: "armLink*"
    body2: envSurface
"#;
    for backend in BACKENDS {
        let mut solver = solver(backend);
        let mut set = ConstraintSetLoader::default().load_str(&mut solver, config).unwrap();
        set.add_to_solver(&mut solver);
        assert_eq!(solver.update().unwrap().len(), 3);

        let constraint = set.as_any_mut().downcast_mut::<CollisionsConstraint>().unwrap();
        let wrist = constraint.collisions()[0].clone();
        assert_eq!(wrist.key(), ("L_wrist", "table"));
        assert_eq!((wrist.i_dist, wrist.s_dist, wrist.damping), (0.1, 0.02, 1.0));
        assert_eq!(wrist.r1_joints.len(), 2);
        assert_eq!(constraint.collision_id("armLink2", "envSurface"), Some(2));

        assert!(constraint.remove_collision_by_body(&mut solver, "L_wrist", "table").unwrap());
        assert_eq!(solver.update().unwrap().len(), 2);
    }
}

#[test]
fn test_load_errors() {
    let loader = ConstraintSetLoader::default();
    let mut solver = solver(Backend::Tasks);

    assert!(loader.load_str(&mut solver, "r1: arm\n").is_err());
    assert!(loader.load_str(&mut solver, "type: contact\n").is_err());
    assert!(loader.load_str(&mut solver, "type: collision\nr1: leg\n").is_err());
    assert!(loader.load_str(&mut solver, "type: collision\nr2Index: 5\n").is_err());
    assert!(loader.load_str(&mut solver, "type: collision\nr2Index: 1\ncollisions: []\n").is_ok());
    assert!(loader
        .load_str(&mut solver, "type: collision\nr2Index: 1\ncollisions:\n  - body1: L_wrist\n    body2: sofa\n")
        .is_err());
    assert!(ConstraintSetLoader::new().load_str(&mut solver, "type: collision\n").is_err());
}

#[test]
fn test_custom_factory() {
    fn load_empty(solver: &mut crate::solver::QpSolver, _config: &yaml_rust2::Yaml)
        -> anyhow::Result<Box<dyn ConstraintSet>> {
        Ok(Box::new(CollisionsConstraint::new(solver, 1, 1)?))
    }

    let mut loader = ConstraintSetLoader::new();
    loader.register("empty", load_empty).unwrap();
    assert!(loader.register("empty", load_empty).is_err());

    let mut solver = solver(Backend::Tvm);
    let set = loader.load_str(&mut solver, "type: empty\n").unwrap();
    assert_eq!(collisions(set.as_ref()).category().to_vec(), vec!["Collisions".to_string(), "env/env".to_string()]);
}

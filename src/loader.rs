//! Creation of constraint sets from YAML configuration (optional).
//!
//! ```yaml
//! type: collision
//! r1: arm
//! r2: env
//! collisions:
//!   - body1: L_wrist
//!     body2: table
//!     iDist: 0.1
//!     sDist: 0.02
//!     damping: 0
//!   - body1: "armLink*"
//!     body2: envSurface
//! ```
//!
//! Robots are given by name (`r1`, `r2`) or index (`r1Index`, `r2Index`) and default to
//! the main robot. For a self-collision constraint, `useCommon: true` or `useMinimal: true`
//! first adds the predefined self-collision set of the robot.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use tracing::{debug, error};
use yaml_rust2::{Yaml, YamlLoader};

use crate::collision::Collision;
use crate::collision_error::CollisionError;
use crate::collisions_constraint::CollisionsConstraint;
use crate::constraint_set::ConstraintSet;
use crate::solver::QpSolver;

/// Builds a constraint set of one type from its configuration.
pub type LoadFunction = fn(&mut QpSolver, &Yaml) -> anyhow::Result<Box<dyn ConstraintSet>>;

const DEFAULT_I_DIST: f64 = 0.05;
const DEFAULT_S_DIST: f64 = 0.01;
const DEFAULT_DAMPING: f64 = 0.0;

/// Registry of constraint set factories, keyed by the `type` entry of the configuration.
pub struct ConstraintSetLoader {
    factories: BTreeMap<String, LoadFunction>,
}

impl Default for ConstraintSetLoader {
    /// Loader knowing the built-in `collision` type.
    fn default() -> Self {
        let mut loader = ConstraintSetLoader::new();
        loader.factories.insert("collision".to_string(), load_collision);
        loader
    }
}

impl ConstraintSetLoader {
    /// Loader without any registered type.
    pub fn new() -> Self {
        ConstraintSetLoader { factories: BTreeMap::new() }
    }

    /// Registers a factory. A name can be registered only once.
    pub fn register(&mut self, name: &str, factory: LoadFunction) -> anyhow::Result<()> {
        if self.factories.contains_key(name) {
            bail!("Constraint set type '{}' is already registered", name);
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Creates the constraint set described by `config`. It is not attached to the solver.
    pub fn load(&self, solver: &mut QpSolver, config: &Yaml) -> anyhow::Result<Box<dyn ConstraintSet>> {
        let name = config["type"]
            .as_str()
            .ok_or_else(|| anyhow!("Constraint set configuration has no 'type' entry"))?;
        let factory = self.factories.get(name).ok_or_else(|| {
            error!("No loader for constraint set type '{}'", name);
            anyhow!("Unknown constraint set type '{}'", name)
        })?;
        factory(solver, config).with_context(|| format!("Failed to load '{}' constraint set", name))
    }

    /// Parses a YAML document and loads the constraint set it describes.
    pub fn load_str(&self, solver: &mut QpSolver, yaml: &str) -> anyhow::Result<Box<dyn ConstraintSet>> {
        let docs = YamlLoader::load_from_str(yaml).context("Invalid YAML")?;
        let config = docs.first().ok_or_else(|| anyhow!("Empty YAML document"))?;
        self.load(solver, config)
    }
}

fn load_collision(solver: &mut QpSolver, config: &Yaml) -> anyhow::Result<Box<dyn ConstraintSet>> {
    let r1_index = robot_index_from_config(solver, config, "r1Index", "r1")?;
    let r2_index = robot_index_from_config(solver, config, "r2Index", "r2")?;
    let mut constraint = CollisionsConstraint::new(solver, r1_index, r2_index)?;

    if r1_index == r2_index {
        let robot = solver.robots().robot(r1_index)?;
        let predefined = if bool_or(config, "useCommon", false)? {
            robot.common_self_collisions().to_vec()
        } else if bool_or(config, "useMinimal", false)? {
            robot.minimal_self_collisions().to_vec()
        } else {
            Vec::new()
        };
        if !predefined.is_empty() {
            debug!("Adding {} predefined self-collisions of {}", predefined.len(), robot.name());
            constraint.add_collisions(solver, &predefined)?;
        }
    }

    let collisions = match &config["collisions"] {
        Yaml::BadValue => Vec::new(),
        Yaml::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| collision_from_config(item).with_context(|| format!("collisions[{}]", i)))
            .collect::<anyhow::Result<Vec<_>>>()?,
        _ => return Err(CollisionError::Config("'collisions' must be a list".to_string()).into()),
    };
    constraint.add_collisions(solver, &collisions)?;
    Ok(Box::new(constraint))
}

/// Index of the robot given by `index_key` or, failing that, by the name under `name_key`.
/// Defaults to the main robot.
fn robot_index_from_config(
    solver: &QpSolver,
    config: &Yaml,
    index_key: &str,
    name_key: &str,
) -> anyhow::Result<usize> {
    let robots = solver.robots();
    let index = match (&config[index_key], &config[name_key]) {
        (Yaml::Integer(index), _) => {
            let index = usize::try_from(*index)
                .map_err(|_| CollisionError::Config(format!("'{}' must not be negative", index_key)))?;
            robots.robot(index)?;
            index
        }
        (Yaml::BadValue, Yaml::String(name)) => robots.robot_index(name)?,
        (Yaml::BadValue, Yaml::BadValue) => 0,
        _ => {
            return Err(CollisionError::Config(format!(
                "'{}' must be an integer and '{}' a robot name", index_key, name_key
            )).into());
        }
    };
    Ok(index)
}

fn collision_from_config(config: &Yaml) -> anyhow::Result<Collision> {
    let body1 = string(config, "body1")?;
    let body2 = string(config, "body2")?;
    Ok(Collision::new(
        body1,
        body2,
        real_or(config, "iDist", DEFAULT_I_DIST)?,
        real_or(config, "sDist", DEFAULT_S_DIST)?,
        real_or(config, "damping", DEFAULT_DAMPING)?,
    )
    .with_joints(string_list(config, "r1Joints")?, string_list(config, "r2Joints")?))
}

fn string(config: &Yaml, key: &str) -> Result<String, CollisionError> {
    config[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CollisionError::Config(format!("'{}' is required and must be a string", key)))
}

/// Real number under `key`, accepting integers.
fn real_or(config: &Yaml, key: &str, default: f64) -> Result<f64, CollisionError> {
    match &config[key] {
        Yaml::BadValue => Ok(default),
        Yaml::Integer(value) => Ok(*value as f64),
        value => value
            .as_f64()
            .ok_or_else(|| CollisionError::Config(format!("'{}' must be a number", key))),
    }
}

fn bool_or(config: &Yaml, key: &str, default: bool) -> Result<bool, CollisionError> {
    match &config[key] {
        Yaml::BadValue => Ok(default),
        value => value
            .as_bool()
            .ok_or_else(|| CollisionError::Config(format!("'{}' must be a boolean", key))),
    }
}

fn string_list(config: &Yaml, key: &str) -> Result<Vec<String>, CollisionError> {
    match &config[key] {
        Yaml::BadValue => Ok(Vec::new()),
        Yaml::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| CollisionError::Config(format!("'{}' must list joint names", key)))
            })
            .collect(),
        _ => Err(CollisionError::Config(format!("'{}' must be a list", key))),
    }
}

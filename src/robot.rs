//! Minimal robot model consumed by the collision constraints: joints, bodies with their
//! world poses and Jacobians, and the named convex shapes attached to the bodies.
//!
//! The kinematics layer owns the actual model and refreshes the body states between
//! control cycles with [`Robot::set_body_state`] and [`Robot::set_velocity`].

use std::collections::BTreeMap;

use nalgebra::{DVector, Isometry3, Matrix6xX};
use parry3d::shape::SharedShape;

use crate::collision::Collision;
use crate::collision_error::{CollisionError, CollisionResult};

/// Joint of the robot, owning `dof` consecutive entries of the velocity vector.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub dof: usize,
}

impl Joint {
    pub fn new(name: impl Into<String>, dof: usize) -> Self {
        Joint { name: name.into(), dof }
    }
}

/// Named convex collision shape, rigidly attached to a body of the robot.
#[derive(Clone)]
pub struct Convex {
    pub name: String,

    /// Body this convex moves with.
    pub body: String,

    /// Convex shape, in its own local frame.
    pub shape: SharedShape,

    /// Transform from the body frame to the convex frame.
    pub local_transform: Isometry3<f64>,
}

/// Pose and Jacobian of a body for the current control cycle.
#[derive(Debug, Clone)]
pub struct BodyState {
    /// World pose of the body frame.
    pub pose: Isometry3<f64>,

    /// 6 x dof Jacobian of the body frame origin in world coordinates. Rows 0..3 map joint
    /// velocities to linear velocity, rows 3..6 to angular velocity.
    pub jacobian: Matrix6xX<f64>,
}

/// Robot as seen by the collision constraints.
pub struct Robot {
    name: String,
    joints: Vec<Joint>,
    /// Index of the first dof of every joint
    dof_offsets: Vec<usize>,
    nr_dof: usize,
    bodies: BTreeMap<String, BodyState>,
    convexes: BTreeMap<String, Convex>,
    /// Joint velocities
    alpha: DVector<f64>,
    common_self_collisions: Vec<Collision>,
    minimal_self_collisions: Vec<Collision>,
}

impl Robot {
    /// Creates the robot with the given joints, in the order of the velocity vector.
    pub fn new(name: impl Into<String>, joints: Vec<Joint>) -> Self {
        let mut dof_offsets = Vec::with_capacity(joints.len());
        let mut nr_dof = 0;
        for joint in &joints {
            dof_offsets.push(nr_dof);
            nr_dof += joint.dof;
        }
        Robot {
            name: name.into(),
            joints,
            dof_offsets,
            nr_dof,
            bodies: BTreeMap::new(),
            convexes: BTreeMap::new(),
            alpha: DVector::zeros(nr_dof),
            common_self_collisions: Vec::new(),
            minimal_self_collisions: Vec::new(),
        }
    }

    /// Adds a body at the given world pose, with zero Jacobian until the kinematics layer sets it.
    pub fn add_body(&mut self, name: impl Into<String>, pose: Isometry3<f64>) {
        self.bodies.insert(name.into(), BodyState {
            pose,
            jacobian: Matrix6xX::zeros(self.nr_dof),
        });
    }

    /// Attaches a convex to an existing body.
    pub fn add_convex(
        &mut self,
        name: impl Into<String>,
        body: &str,
        shape: SharedShape,
        local_transform: Isometry3<f64>,
    ) -> CollisionResult<()> {
        if !self.bodies.contains_key(body) {
            return Err(self.unknown_body(body));
        }
        let name = name.into();
        self.convexes.insert(name.clone(), Convex {
            name,
            body: body.to_string(),
            shape,
            local_transform,
        });
        Ok(())
    }

    /// Set of pairs covering most self-collisions of this robot.
    pub fn with_common_self_collisions(mut self, collisions: Vec<Collision>) -> Self {
        self.common_self_collisions = collisions;
        self
    }

    /// Reduced set of pairs covering only the critical self-collisions of this robot.
    pub fn with_minimal_self_collisions(mut self, collisions: Vec<Collision>) -> Self {
        self.minimal_self_collisions = collisions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nr_dof(&self) -> usize {
        self.nr_dof
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn common_self_collisions(&self) -> &[Collision] {
        &self.common_self_collisions
    }

    pub fn minimal_self_collisions(&self) -> &[Collision] {
        &self.minimal_self_collisions
    }

    /// All convexes, ordered by name.
    pub fn convexes(&self) -> &BTreeMap<String, Convex> {
        &self.convexes
    }

    pub fn convex(&self, name: &str) -> CollisionResult<&Convex> {
        self.convexes.get(name).ok_or_else(|| CollisionError::UnknownConvex {
            robot: self.name.clone(),
            convex: name.to_string(),
        })
    }

    pub fn body(&self, name: &str) -> CollisionResult<&BodyState> {
        self.bodies.get(name).ok_or_else(|| self.unknown_body(name))
    }

    /// Updates the pose and Jacobian of a body for the coming control cycle.
    pub fn set_body_state(
        &mut self,
        name: &str,
        pose: Isometry3<f64>,
        jacobian: Matrix6xX<f64>,
    ) -> CollisionResult<()> {
        if jacobian.ncols() != self.nr_dof {
            return Err(CollisionError::DimensionMismatch {
                expected: self.nr_dof,
                found: jacobian.ncols(),
            });
        }
        let error = self.unknown_body(name);
        let state = self.bodies.get_mut(name).ok_or(error)?;
        state.pose = pose;
        state.jacobian = jacobian;
        Ok(())
    }

    pub fn alpha(&self) -> &DVector<f64> {
        &self.alpha
    }

    /// Updates the joint velocities for the coming control cycle.
    pub fn set_velocity(&mut self, alpha: DVector<f64>) -> CollisionResult<()> {
        if alpha.len() != self.nr_dof {
            return Err(CollisionError::DimensionMismatch {
                expected: self.nr_dof,
                found: alpha.len(),
            });
        }
        self.alpha = alpha;
        Ok(())
    }

    /// World pose of the convex: pose of its body composed with its local transform.
    pub fn convex_world_pose(&self, name: &str) -> CollisionResult<Isometry3<f64>> {
        let convex = self.convex(name)?;
        let body = self.body(&convex.body)?;
        Ok(body.pose * convex.local_transform)
    }

    pub fn joint_index_by_name(&self, joint: &str) -> CollisionResult<usize> {
        self.joints
            .iter()
            .position(|j| j.name == joint)
            .ok_or_else(|| CollisionError::UnknownJoint {
                robot: self.name.clone(),
                joint: joint.to_string(),
            })
    }

    /// Index of the first dof of the joint in the velocity vector.
    pub fn joint_pos_in_dof(&self, joint: &str) -> CollisionResult<usize> {
        Ok(self.dof_offsets[self.joint_index_by_name(joint)?])
    }

    /// Builds a dof selector from joint names: ones on every dof of the listed joints,
    /// zeros elsewhere. An empty list gives a zero-length selector, meaning that all
    /// joints may be used.
    pub fn joint_selector(&self, joints: &[String]) -> CollisionResult<DVector<f64>> {
        if joints.is_empty() {
            return Ok(DVector::zeros(0));
        }
        let mut selector = DVector::zeros(self.nr_dof);
        for name in joints {
            let index = self.joint_index_by_name(name)?;
            let offset = self.dof_offsets[index];
            selector.rows_mut(offset, self.joints[index].dof).fill(1.0);
        }
        Ok(selector)
    }

    fn unknown_body(&self, body: &str) -> CollisionError {
        CollisionError::UnknownBody {
            robot: self.name.clone(),
            body: body.to_string(),
        }
    }
}

/// All robots known to the solver, addressed by index.
pub struct Robots {
    robots: Vec<Robot>,
}

impl Robots {
    pub fn new(robots: Vec<Robot>) -> Self {
        Robots { robots }
    }

    pub fn robot(&self, index: usize) -> CollisionResult<&Robot> {
        let count = self.robots.len();
        self.robots
            .get(index)
            .ok_or(CollisionError::RobotIndexOutOfRange { index, count })
    }

    pub fn robot_mut(&mut self, index: usize) -> CollisionResult<&mut Robot> {
        let count = self.robots.len();
        self.robots
            .get_mut(index)
            .ok_or(CollisionError::RobotIndexOutOfRange { index, count })
    }

    pub fn robot_index(&self, name: &str) -> CollisionResult<usize> {
        self.robots
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| CollisionError::UnknownRobot(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }
}

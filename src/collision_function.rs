//! Distance between the two convexes of a collision pair, together with its gradient
//! with respect to the joint velocities of both robots.

use nalgebra::{DVector, Matrix3xX, Point3, RowDVector, Vector3};

use crate::collision::Collision;
use crate::collision_error::CollisionResult;
use crate::geometry::{ConvexPair, Proximity};
use crate::robot::{BodyState, Robots};

/// Recomputed once per control cycle while its constraint is in the solver.
pub struct CollisionFunction {
    r1_index: usize,
    r2_index: usize,
    convex1: String,
    convex2: String,
    body1: String,
    body2: String,
    pair: ConvexPair,
    r1_selector: DVector<f64>,
    r2_selector: DVector<f64>,
    distance: f64,
    p1: Point3<f64>,
    p2: Point3<f64>,
    normal: Vector3<f64>,
    jacobian_r1: RowDVector<f64>,
    jacobian_r2: RowDVector<f64>,
    speed: f64,
}

impl CollisionFunction {
    /// Creates the function for a concrete (wildcard-free) collision. Selectors are
    /// either empty (all dofs) or sized to the dof count of their robot. For a
    /// self-collision the second selector is ignored.
    pub fn new(
        robots: &Robots,
        r1_index: usize,
        r2_index: usize,
        collision: &Collision,
        r1_selector: DVector<f64>,
        r2_selector: DVector<f64>,
    ) -> CollisionResult<Self> {
        let r1 = robots.robot(r1_index)?;
        let r2 = robots.robot(r2_index)?;
        let c1 = r1.convex(&collision.body1)?;
        let c2 = r2.convex(&collision.body2)?;
        Ok(CollisionFunction {
            r1_index,
            r2_index,
            convex1: c1.name.clone(),
            convex2: c2.name.clone(),
            body1: c1.body.clone(),
            body2: c2.body.clone(),
            pair: ConvexPair::new(c1, c2),
            r1_selector,
            r2_selector,
            distance: f64::INFINITY,
            p1: Point3::origin(),
            p2: Point3::origin(),
            normal: Vector3::x(),
            jacobian_r1: RowDVector::zeros(r1.nr_dof()),
            jacobian_r2: RowDVector::zeros(if r1_index == r2_index { 0 } else { r2.nr_dof() }),
            speed: 0.0,
        })
    }

    /// Recomputes distance, witness points and gradient from the current robot state.
    pub fn update(&mut self, robots: &Robots) -> CollisionResult<()> {
        let r1 = robots.robot(self.r1_index)?;
        let r2 = robots.robot(self.r2_index)?;
        self.pair.update_transforms(
            &r1.convex_world_pose(&self.convex1)?,
            &r2.convex_world_pose(&self.convex2)?,
        );
        let proximity = self.pair.compute()?;
        self.distance = proximity.distance;
        self.p1 = proximity.p1;
        self.p2 = proximity.p2;
        self.normal = normal(&proximity);

        let n = self.normal.transpose();
        let g1: RowDVector<f64> = n * point_jacobian(r1.body(&self.body1)?, &self.p1);
        let g2: RowDVector<f64> = -(n * point_jacobian(r2.body(&self.body2)?, &self.p2));

        if self.same_robot() {
            self.jacobian_r1 = g1 + g2;
            self.jacobian_r2 = RowDVector::zeros(0);
            self.speed = dot(&self.jacobian_r1, r1.alpha());
        } else {
            self.jacobian_r1 = g1;
            self.jacobian_r2 = g2;
            self.speed = dot(&self.jacobian_r1, r1.alpha()) + dot(&self.jacobian_r2, r2.alpha());
        }

        // Speed above uses every dof, only the constraint gradient is restricted
        select(&mut self.jacobian_r1, &self.r1_selector);
        if !self.same_robot() {
            select(&mut self.jacobian_r2, &self.r2_selector);
        }
        Ok(())
    }

    pub fn same_robot(&self) -> bool {
        self.r1_index == self.r2_index
    }

    pub fn r1_index(&self) -> usize {
        self.r1_index
    }

    pub fn r2_index(&self) -> usize {
        self.r2_index
    }

    /// Signed distance computed in the last update.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Witness point on the first convex, world frame.
    pub fn p1(&self) -> &Point3<f64> {
        &self.p1
    }

    /// Witness point on the second convex, world frame.
    pub fn p2(&self) -> &Point3<f64> {
        &self.p2
    }

    /// Unit direction along which the distance grows when the first convex moves.
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// Distance time derivative.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Gradient over the dofs of the first robot. Holds the whole gradient for self-collisions.
    pub fn jacobian_r1(&self) -> &RowDVector<f64> {
        &self.jacobian_r1
    }

    /// Gradient over the dofs of the second robot, empty for self-collisions.
    pub fn jacobian_r2(&self) -> &RowDVector<f64> {
        &self.jacobian_r2
    }

    pub fn r1_selector(&self) -> &DVector<f64> {
        &self.r1_selector
    }

    pub fn r2_selector(&self) -> &DVector<f64> {
        &self.r2_selector
    }
}

/// Direction from p2 to p1, flipped when the convexes penetrate.
fn normal(proximity: &Proximity) -> Vector3<f64> {
    let diff = proximity.p1 - proximity.p2;
    let norm = diff.norm();
    if norm <= f64::EPSILON {
        return Vector3::x();
    }
    if proximity.distance < 0.0 {
        -diff / norm
    } else {
        diff / norm
    }
}

/// Linear velocity Jacobian of a world point rigidly attached to the body:
/// `v_p = v_o + w x (p - o)`.
fn point_jacobian(body: &BodyState, point: &Point3<f64>) -> Matrix3xX<f64> {
    let linear = body.jacobian.fixed_rows::<3>(0).into_owned();
    let angular = body.jacobian.fixed_rows::<3>(3).into_owned();
    let arm = point.coords - body.pose.translation.vector;
    linear - arm.cross_matrix() * angular
}

fn dot(row: &RowDVector<f64>, alpha: &DVector<f64>) -> f64 {
    row.iter().zip(alpha.iter()).map(|(g, v)| g * v).sum()
}

/// Zero-length selectors leave the gradient untouched.
fn select(row: &mut RowDVector<f64>, selector: &DVector<f64>) {
    if selector.is_empty() {
        return;
    }
    for (g, s) in row.iter_mut().zip(selector.iter()) {
        *g *= s;
    }
}

//! Implements proximity queries between two convexes

use nalgebra::{Isometry3, Point3};
use parry3d::query::{self, ClosestPoints};
use parry3d::shape::SharedShape;

use crate::collision_error::{CollisionError, CollisionResult};
use crate::robot::Convex;

/// Result of a proximity query, with both points in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    /// Signed distance between the two convexes, negative when they interpenetrate.
    pub distance: f64,
    /// Point on the first convex closest to the second one (deepest one if penetrating).
    pub p1: Point3<f64>,
    /// Point on the second convex closest to the first one (deepest one if penetrating).
    pub p2: Point3<f64>,
}

/// Two convexes whose world transforms are updated every cycle before querying.
/// Parry3d works in f32, poses are cast on update.
pub struct ConvexPair {
    name: String,
    shape1: SharedShape,
    shape2: SharedShape,
    pose1: Isometry3<f32>,
    pose2: Isometry3<f32>,
}

impl ConvexPair {
    pub fn new(convex1: &Convex, convex2: &Convex) -> Self {
        ConvexPair {
            name: format!("{}/{}", convex1.name, convex2.name),
            shape1: convex1.shape.clone(),
            shape2: convex2.shape.clone(),
            pose1: Isometry3::identity(),
            pose2: Isometry3::identity(),
        }
    }

    /// Sets the world pose of both convex frames.
    pub fn update_transforms(&mut self, world1: &Isometry3<f64>, world2: &Isometry3<f64>) {
        self.pose1 = world1.cast::<f32>();
        self.pose2 = world2.cast::<f32>();
    }

    pub fn distance(&self) -> CollisionResult<f64> {
        Ok(self.compute()?.distance)
    }

    pub fn closest_points(&self) -> CollisionResult<(Point3<f64>, Point3<f64>)> {
        let proximity = self.compute()?;
        Ok((proximity.p1, proximity.p2))
    }

    /// Signed distance and witness points for the current transforms.
    pub fn compute(&self) -> CollisionResult<Proximity> {
        let closest = query::closest_points(
            &self.pose1, self.shape1.as_ref(), &self.pose2, self.shape2.as_ref(), f32::MAX)
            .map_err(|_| self.unsupported())?;

        match closest {
            ClosestPoints::WithinMargin(p1, p2) => {
                let p1: Point3<f64> = p1.cast();
                let p2: Point3<f64> = p2.cast();
                Ok(Proximity { distance: (p1 - p2).norm(), p1, p2 })
            }
            ClosestPoints::Intersecting => self.penetration(),
            ClosestPoints::Disjoint => {
                // Only beyond f32::MAX, keep the query total anyway
                let distance = query::distance(
                    &self.pose1, self.shape1.as_ref(), &self.pose2, self.shape2.as_ref())
                    .map_err(|_| self.unsupported())?;
                Ok(Proximity {
                    distance: distance as f64,
                    p1: Point3::from(self.pose1.translation.vector.cast::<f64>()),
                    p2: Point3::from(self.pose2.translation.vector.cast::<f64>()),
                })
            }
        }
    }

    fn penetration(&self) -> CollisionResult<Proximity> {
        let contact = query::contact(
            &self.pose1, self.shape1.as_ref(), &self.pose2, self.shape2.as_ref(), 0.0)
            .map_err(|_| self.unsupported())?;
        match contact {
            Some(contact) => Ok(Proximity {
                distance: contact.dist as f64,
                p1: contact.point1.cast(),
                p2: contact.point2.cast(),
            }),
            None => {
                // Touching within f32 precision
                let p: Point3<f64> = Point3::from(self.pose1.translation.vector.cast::<f64>());
                Ok(Proximity { distance: 0.0, p1: p, p2: p })
            }
        }
    }

    fn unsupported(&self) -> CollisionError {
        CollisionError::UnsupportedShape(self.name.clone())
    }
}

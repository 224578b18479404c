//! Authoritative list of the collision pairs of a constraint, their ids, and the
//! expansion of wildcard body names into concrete pairs.

use std::collections::BTreeMap;

use tracing::error;

use crate::collision::{wildcard_prefix, Collision, CollisionId};
use crate::collision_error::{CollisionError, CollisionResult};
use crate::robot::Robot;

/// Pairs are keyed by `(body1, body2)`. Ids grow monotonically over the whole life of
/// the registry and are not reused after removal or [`CollisionRegistry::clear`].
#[derive(Debug, Default)]
pub struct CollisionRegistry {
    next_id: CollisionId,
    ids: BTreeMap<(String, String), CollisionId>,
    /// Ordered by id, hence by registration
    pairs: BTreeMap<CollisionId, Collision>,
}

impl CollisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next id to the collision, or None if its key is already registered.
    /// Fails once the id space is used up, as ids are never reused.
    pub fn create_id(&mut self, collision: &Collision) -> CollisionResult<Option<CollisionId>> {
        let key = (collision.body1.clone(), collision.body2.clone());
        if self.ids.contains_key(&key) {
            return Ok(None);
        }
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(|| {
            error!("{}", CollisionError::IdsExhausted);
            CollisionError::IdsExhausted
        })?;
        self.ids.insert(key, id);
        self.pairs.insert(id, collision.clone());
        Ok(Some(id))
    }

    /// Removes the pair with this exact key.
    pub fn pop(&mut self, body1: &str, body2: &str) -> Option<(CollisionId, Collision)> {
        let id = self.ids.remove(&(body1.to_string(), body2.to_string()))?;
        let collision = self.pairs.remove(&id)?;
        Some((id, collision))
    }

    pub fn id(&self, body1: &str, body2: &str) -> Option<CollisionId> {
        self.ids.get(&(body1.to_string(), body2.to_string())).copied()
    }

    pub fn contains(&self, body1: &str, body2: &str) -> bool {
        self.id(body1, body2).is_some()
    }

    pub fn get(&self, id: CollisionId) -> Option<&Collision> {
        self.pairs.get(&id)
    }

    /// Registered pairs with their ids, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (CollisionId, &Collision)> {
        self.pairs.iter().map(|(id, c)| (*id, c))
    }

    /// Registered pairs in registration order.
    pub fn collisions(&self) -> impl Iterator<Item = &Collision> {
        self.pairs.values()
    }

    /// Id the next registered pair will get.
    pub fn next_id(&self) -> CollisionId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Forgets all pairs. The id counter keeps going.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.pairs.clear();
    }
}

/// Expands the wildcards of `collision` against the convexes of the two robots: every
/// match of `body1` on `r1`, each paired with every match of `body2` on `r2`, in convex
/// name order. A side without wildcard is its own single match. Nothing is returned if
/// any pattern matches no convex.
pub fn expand_wildcards(collision: &Collision, r1: &Robot, r2: &Robot) -> CollisionResult<Vec<Collision>> {
    let bodies1 = side_matches(r1, &collision.body1)?;
    let bodies2 = side_matches(r2, &collision.body2)?;
    let mut out = Vec::with_capacity(bodies1.len() * bodies2.len());
    for body1 in &bodies1 {
        for body2 in &bodies2 {
            let mut concrete = collision.with_body1(body1);
            concrete.body2 = body2.to_string();
            out.push(concrete);
        }
    }
    Ok(out)
}

fn side_matches<'a>(robot: &'a Robot, name: &'a str) -> CollisionResult<Vec<&'a str>> {
    match wildcard_prefix(name) {
        Some(prefix) => matching(robot, prefix, name),
        None => Ok(vec![name]),
    }
}

fn matching<'a>(robot: &'a Robot, prefix: &str, pattern: &str) -> CollisionResult<Vec<&'a str>> {
    let names: Vec<&str> = robot
        .convexes()
        .keys()
        .filter(|name| name.starts_with(prefix))
        .map(String::as_str)
        .collect();
    if names.is_empty() {
        let err = CollisionError::WildcardNoMatch {
            pattern: pattern.to_string(),
            robot: robot.name().to_string(),
        };
        error!("{}", err);
        return Err(err);
    }
    Ok(names)
}

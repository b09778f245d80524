//! In-memory physics engine used by tests and headless runs
//!
//! Bodies are kinematic records with no integration; ray casts treat every
//! body as a sphere. Good enough to exercise the whole lifecycle without a
//! real solver attached.

use std::collections::HashMap;

use glam::{Mat4, Vec3};

use super::{
    AxisLimit, BodyHandle, ConstraintHandle, GroupHandle, PhysicsEngine, RaycastFilter,
    RaycastHit, ShapeId,
};

/// Ray cast radius assigned to every mock body
pub const MOCK_BODY_RADIUS: f32 = 0.5;

#[derive(Debug, Clone)]
struct MockBody {
    group: GroupHandle,
    #[allow(dead_code)]
    shape: ShapeId,
    transform: Mat4,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    mass: f32,
    asleep: bool,
    self_collision: bool,
}

#[derive(Debug, Clone)]
struct MockConstraint {
    #[allow(dead_code)]
    group: GroupHandle,
    parent: BodyHandle,
    child: BodyHandle,
    rigid: bool,
}

#[derive(Debug, Clone, Default)]
struct MockGroup {
    /// Pair table keyed with the smaller handle first
    pairs: HashMap<(u32, u32), bool>,
    error_cleared: bool,
    asleep: bool,
}

/// Reference [`PhysicsEngine`] implementation backed by hash maps
#[derive(Default)]
pub struct MockEngine {
    bodies: HashMap<u32, MockBody>,
    constraints: HashMap<u32, MockConstraint>,
    groups: HashMap<u32, MockGroup>,
    next_id: u32,
    /// Total bodies ever created (not decremented on destroy)
    pub bodies_created: usize,
    /// Total constraints ever created
    pub constraints_created: usize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live body count
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Live constraint count
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Live group count
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn body_is_asleep(&self, body: BodyHandle) -> bool {
        self.bodies.get(&body.0).map(|b| b.asleep).unwrap_or(false)
    }

    pub fn body_self_collision(&self, body: BodyHandle) -> bool {
        self.bodies
            .get(&body.0)
            .map(|b| b.self_collision)
            .unwrap_or(false)
    }

    pub fn group_is_asleep(&self, group: GroupHandle) -> bool {
        self.groups.get(&group.0).map(|g| g.asleep).unwrap_or(false)
    }

    pub fn group_error_cleared(&self, group: GroupHandle) -> bool {
        self.groups
            .get(&group.0)
            .map(|g| g.error_cleared)
            .unwrap_or(false)
    }

    /// Pair state in a group's collision table, if it was ever set
    pub fn collision_pair(&self, group: GroupHandle, a: BodyHandle, b: BodyHandle) -> Option<bool> {
        self.groups
            .get(&group.0)
            .and_then(|g| g.pairs.get(&pair_key(a, b)).copied())
    }

    pub fn constraint_is_rigid(&self, constraint: ConstraintHandle) -> bool {
        self.constraints
            .get(&constraint.0)
            .map(|c| c.rigid)
            .unwrap_or(false)
    }

    pub fn constraint_endpoints(
        &self,
        constraint: ConstraintHandle,
    ) -> Option<(BodyHandle, BodyHandle)> {
        self.constraints
            .get(&constraint.0)
            .map(|c| (c.parent, c.child))
    }

    /// Set the angular velocity used by [`PhysicsEngine::velocity_at_point`]
    pub fn set_angular_velocity(&mut self, body: BodyHandle, omega: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.angular_velocity = omega;
        }
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

fn pair_key(a: BodyHandle, b: BodyHandle) -> (u32, u32) {
    if a.0 <= b.0 {
        (a.0, b.0)
    } else {
        (b.0, a.0)
    }
}

/// Squared distance from point `p` to segment `ab`
fn segment_distance_sq(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return (p - a).length_squared();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length_squared()
}

impl PhysicsEngine for MockEngine {
    fn create_group(&mut self) -> GroupHandle {
        let id = self.next();
        self.groups.insert(id, MockGroup::default());
        GroupHandle(id)
    }

    fn destroy_group(&mut self, group: GroupHandle) {
        self.groups.remove(&group.0);
    }

    fn create_body(&mut self, group: GroupHandle, shape: ShapeId, mass: f32) -> BodyHandle {
        let id = self.next();
        self.bodies.insert(
            id,
            MockBody {
                group,
                shape,
                transform: Mat4::IDENTITY,
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                mass,
                asleep: false,
                self_collision: false,
            },
        );
        self.bodies_created += 1;
        BodyHandle(id)
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        self.bodies.remove(&body.0);
    }

    fn create_ragdoll_constraint(
        &mut self,
        group: GroupHandle,
        parent: BodyHandle,
        child: BodyHandle,
        _frame: Mat4,
        _limits: &[AxisLimit; 3],
    ) -> ConstraintHandle {
        let id = self.next();
        self.constraints.insert(
            id,
            MockConstraint {
                group,
                parent,
                child,
                rigid: false,
            },
        );
        self.constraints_created += 1;
        ConstraintHandle(id)
    }

    fn create_rigid_constraint(
        &mut self,
        group: GroupHandle,
        parent: BodyHandle,
        child: BodyHandle,
    ) -> ConstraintHandle {
        let id = self.next();
        self.constraints.insert(
            id,
            MockConstraint {
                group,
                parent,
                child,
                rigid: true,
            },
        );
        self.constraints_created += 1;
        ConstraintHandle(id)
    }

    fn destroy_constraint(&mut self, constraint: ConstraintHandle) {
        self.constraints.remove(&constraint.0);
    }

    fn body_transform(&self, body: BodyHandle) -> Mat4 {
        self.bodies
            .get(&body.0)
            .map(|b| b.transform)
            .unwrap_or(Mat4::IDENTITY)
    }

    fn set_body_transform(&mut self, body: BodyHandle, transform: Mat4) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.transform = transform;
        }
    }

    fn body_velocity(&self, body: BodyHandle) -> Vec3 {
        self.bodies
            .get(&body.0)
            .map(|b| b.linear_velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_body_velocity(&mut self, body: BodyHandle, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.linear_velocity = velocity;
        }
    }

    fn velocity_at_point(&self, body: BodyHandle, point: Vec3) -> Vec3 {
        match self.bodies.get(&body.0) {
            Some(b) => {
                let center = b.transform.w_axis.truncate();
                b.linear_velocity + b.angular_velocity.cross(point - center)
            }
            None => Vec3::ZERO,
        }
    }

    fn body_mass(&self, body: BodyHandle) -> f32 {
        self.bodies.get(&body.0).map(|b| b.mass).unwrap_or(0.0)
    }

    fn set_body_mass(&mut self, body: BodyHandle, mass: f32) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.mass = mass;
        }
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3, _at: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            if b.mass > 0.0 {
                b.linear_velocity += impulse / b.mass;
            }
            b.asleep = false;
        }
    }

    fn raycast(&self, from: Vec3, to: Vec3, filter: &RaycastFilter) -> Option<RaycastHit> {
        let mut best: Option<RaycastHit> = None;
        for (&id, body) in &self.bodies {
            let handle = BodyHandle(id);
            if !filter.accepts(handle) {
                continue;
            }
            let center = body.transform.w_axis.truncate();
            if segment_distance_sq(from, to, center) > MOCK_BODY_RADIUS * MOCK_BODY_RADIUS {
                continue;
            }
            let distance = (center - from).length();
            if best.map(|h| distance < h.distance).unwrap_or(true) {
                best = Some(RaycastHit {
                    body: handle,
                    point: center,
                    normal: (from - center).normalize_or_zero(),
                    distance,
                });
            }
        }
        best
    }

    fn sleep_body(&mut self, body: BodyHandle) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.asleep = true;
        }
    }

    fn wake_body(&mut self, body: BodyHandle) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.asleep = false;
        }
    }

    fn sleep_group(&mut self, group: GroupHandle) {
        if let Some(g) = self.groups.get_mut(&group.0) {
            g.asleep = true;
        }
    }

    fn wake_group(&mut self, group: GroupHandle) {
        if let Some(g) = self.groups.get_mut(&group.0) {
            g.asleep = false;
        }
    }

    fn set_collision_pair(
        &mut self,
        group: GroupHandle,
        a: BodyHandle,
        b: BodyHandle,
        enabled: bool,
    ) {
        if let Some(g) = self.groups.get_mut(&group.0) {
            g.pairs.insert(pair_key(a, b), enabled);
        }
    }

    fn set_self_collision(&mut self, body: BodyHandle, enabled: bool) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.self_collision = enabled;
        }
    }

    fn clear_group_error(&mut self, group: GroupHandle) {
        if let Some(g) = self.groups.get_mut(&group.0) {
            g.error_cleared = true;
        }
    }
}

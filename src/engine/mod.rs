//! Physics engine capability surface
//!
//! The ragdoll layer never talks to a concrete solver. Everything it needs
//! from one is captured by the [`PhysicsEngine`] trait; the engine
//! integration implements it once and every component here stays
//! solver-agnostic.

pub mod mock;

pub use mock::MockEngine;

use glam::{Mat4, Vec3};

/// Handle to a rigid body owned by the physics engine
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BodyHandle(pub u32);

/// Handle to a constraint owned by the physics engine
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ConstraintHandle(pub u32);

/// Handle to a constraint group owned by the physics engine
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GroupHandle(pub u32);

/// Identifier of a pre-authored collision shape in the model's shape table
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShapeId(pub u32);

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "BodyHandle<{}>", self.0)
    }
}

impl std::fmt::Display for ConstraintHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ConstraintHandle<{}>", self.0)
    }
}

impl std::fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "GroupHandle<{}>", self.0)
    }
}

/// Per-axis angular limit of a ragdoll constraint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimit {
    pub min: f32,
    pub max: f32,
    /// Joint friction torque resisting motion around this axis
    pub damping: f32,
}

impl AxisLimit {
    /// Scale the friction component, leaving the angular range untouched
    pub fn scaled(self, friction_scale: f32) -> Self {
        Self {
            damping: self.damping * friction_scale,
            ..self
        }
    }
}

/// Result of a ray cast against engine bodies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub body: BodyHandle,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Restricts a ray cast to a candidate set and an ignore set
#[derive(Debug, Clone, Copy, Default)]
pub struct RaycastFilter<'a> {
    /// Only these bodies are candidates; `None` means all bodies
    pub only: Option<&'a [BodyHandle]>,
    /// Bodies never reported as hits
    pub ignore: &'a [BodyHandle],
}

impl<'a> RaycastFilter<'a> {
    pub fn accepts(&self, body: BodyHandle) -> bool {
        if self.ignore.contains(&body) {
            return false;
        }
        match self.only {
            Some(set) => set.contains(&body),
            None => true,
        }
    }
}

/// Everything the ragdoll lifecycle needs from a physics engine.
///
/// Constraint groups scope two engine-side tables: the pairwise collision
/// exception table and the solver's per-group error accumulation.
pub trait PhysicsEngine {
    fn create_group(&mut self) -> GroupHandle;
    fn destroy_group(&mut self, group: GroupHandle);

    fn create_body(&mut self, group: GroupHandle, shape: ShapeId, mass: f32) -> BodyHandle;
    fn destroy_body(&mut self, body: BodyHandle);

    /// Ragdoll-style constraint: per-axis angular limits around `frame`,
    /// expressed in the parent body's space.
    fn create_ragdoll_constraint(
        &mut self,
        group: GroupHandle,
        parent: BodyHandle,
        child: BodyHandle,
        frame: Mat4,
        limits: &[AxisLimit; 3],
    ) -> ConstraintHandle;

    /// Zero-DOF constraint locking the two bodies at their current
    /// relative transform.
    fn create_rigid_constraint(
        &mut self,
        group: GroupHandle,
        parent: BodyHandle,
        child: BodyHandle,
    ) -> ConstraintHandle;

    fn destroy_constraint(&mut self, constraint: ConstraintHandle);

    fn body_transform(&self, body: BodyHandle) -> Mat4;
    fn set_body_transform(&mut self, body: BodyHandle, transform: Mat4);

    fn body_velocity(&self, body: BodyHandle) -> Vec3;
    fn set_body_velocity(&mut self, body: BodyHandle, velocity: Vec3);
    /// Velocity of the point `point` (world space) as carried by `body`,
    /// including the angular contribution.
    fn velocity_at_point(&self, body: BodyHandle, point: Vec3) -> Vec3;

    fn body_mass(&self, body: BodyHandle) -> f32;
    fn set_body_mass(&mut self, body: BodyHandle, mass: f32);

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3, at: Vec3);

    fn raycast(&self, from: Vec3, to: Vec3, filter: &RaycastFilter) -> Option<RaycastHit>;

    fn sleep_body(&mut self, body: BodyHandle);
    fn wake_body(&mut self, body: BodyHandle);
    fn sleep_group(&mut self, group: GroupHandle);
    fn wake_group(&mut self, group: GroupHandle);

    /// Enable or disable collision between a body pair within a group
    fn set_collision_pair(&mut self, group: GroupHandle, a: BodyHandle, b: BodyHandle, enabled: bool);
    /// Whether a body collides with other bodies of its own group at all
    fn set_self_collision(&mut self, body: BodyHandle, enabled: bool);

    /// Drop the solver's accumulated positional error for a group,
    /// telling it to stop compensating for past separation.
    fn clear_group_error(&mut self, group: GroupHandle);
}

//! Constraint graph construction
//!
//! Turns a parsed [`CollisionDescription`] into a live [`RagdollInstance`]:
//! one body per solid placed at its animated starting pose, one constraint
//! per parented solid, plus the spawn impulse that models whatever knocked
//! the character down.
//!
//! Solids arrive in dependency order (parents first), so a single forward
//! pass can place every child against its parent's already-final transform.

use glam::{Mat4, Vec3};
use log::{debug, warn};

use crate::description::{CollisionDescription, ModelId};
use crate::engine::PhysicsEngine;
use crate::error::{RagdollError, RagdollResult};
use crate::instance::{RagdollElement, RagdollInstance, MAX_ELEMENTS};

/// Mass assigned to every body in fixed ("statue") mode. Heavy enough that
/// ordinary gameplay forces no longer move the pose.
pub const FIXED_MODE_MASS: f32 = 1.0e4;

/// The hit that spawned this ragdoll
#[derive(Debug, Clone, Copy)]
pub struct Impulse {
    pub impulse: Vec3,
    /// World position the impulse acts at when distributed across bodies
    pub at: Vec3,
    /// Skeleton bone that takes the full impulse instead, when known
    /// (e.g. the bone a projectile hit)
    pub force_bone: Option<usize>,
}

/// Per-build policy knobs
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Build rigid zero-DOF constraints and statue masses
    pub fixed_mode: bool,
    /// Let the pose extractor report stretched joints as-is
    pub allow_stretch: bool,
    /// Global multiplier on authored joint friction
    pub joint_friction_scale: f32,
    pub impulse: Option<Impulse>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            fixed_mode: false,
            allow_stretch: false,
            joint_friction_scale: 1.0,
            impulse: None,
        }
    }
}

/// Build a ragdoll from a model's description and its current animated pose.
///
/// `bone_poses` is the animation system's world-space matrix array, indexed
/// by skeleton bone. Fails before allocating anything, so a failed build
/// leaves no engine state behind.
pub fn build(
    engine: &mut dyn PhysicsEngine,
    model: ModelId,
    description: &CollisionDescription,
    bone_poses: &[Mat4],
    options: &BuildOptions,
) -> RagdollResult<RagdollInstance> {
    if description.solids.is_empty() {
        return Err(RagdollError::MissingCollisionData { model });
    }
    if description.solids.len() > MAX_ELEMENTS {
        return Err(RagdollError::TooManyElements {
            count: description.solids.len(),
            max: MAX_ELEMENTS,
        });
    }

    let group = engine.create_group();
    let mut elements: Vec<RagdollElement> = Vec::with_capacity(description.solids.len());
    let mut world_transforms: Vec<Mat4> = Vec::with_capacity(description.solids.len());

    // Forward pass: parents are always finalized before their children
    for (index, solid) in description.solids.iter().enumerate() {
        let mass = if options.fixed_mode {
            FIXED_MODE_MASS
        } else {
            solid.params.mass
        };
        let body = engine.create_body(group, solid.shape, mass);

        let joint = description
            .constraints
            .iter()
            .find(|c| c.child == index);

        let world = match joint {
            Some(c) => world_transforms[c.parent] * c.origin_in_parent,
            None => match bone_poses.get(solid.bone_index) {
                Some(&pose) => pose,
                None => {
                    warn!(
                        "no animated pose for bone {}, placing root at identity",
                        solid.bone_index
                    );
                    Mat4::IDENTITY
                }
            },
        };
        engine.set_body_transform(body, world);
        world_transforms.push(world);

        elements.push(RagdollElement {
            body: Some(body),
            constraint: None,
            parent: joint.map(|c| c.parent),
            origin_in_parent: joint.map(|c| c.origin_in_parent).unwrap_or(Mat4::IDENTITY),
        });
    }

    // Joints, once every body exists
    let friction_scale = options.joint_friction_scale * description.friction.at(0.0);
    for c in &description.constraints {
        let (parent_body, child_body) = match (elements[c.parent].body, elements[c.child].body) {
            (Some(p), Some(c)) => (p, c),
            _ => continue,
        };
        let constraint = if options.fixed_mode {
            // Lock the pose exactly as it currently stands
            engine.create_rigid_constraint(group, parent_body, child_body)
        } else {
            let limits = [
                c.limits[0].scaled(friction_scale),
                c.limits[1].scaled(friction_scale),
                c.limits[2].scaled(friction_scale),
            ];
            engine.create_ragdoll_constraint(group, parent_body, child_body, c.frame, &limits)
        };
        elements[c.child].constraint = Some(constraint);
    }

    let instance = RagdollInstance {
        bone_indices: description.solids.iter().map(|s| s.bone_index).collect(),
        elements,
        group: Some(group),
        allow_stretch: options.allow_stretch,
        fixed_mode: options.fixed_mode,
        friction: description.friction,
    };

    if let Some(impulse) = &options.impulse {
        apply_spawn_impulse(engine, &instance, impulse);
    }

    debug!(
        "built ragdoll for {}: {} elements, {} constraints",
        model,
        instance.element_count(),
        description.constraints.len()
    );
    Ok(instance)
}

/// Apply the spawn impulse: all of it at the force bone when one is given,
/// otherwise spread over every body proportional to mass.
fn apply_spawn_impulse(
    engine: &mut dyn PhysicsEngine,
    instance: &RagdollInstance,
    impulse: &Impulse,
) {
    if let Some(bone) = impulse.force_bone {
        if let Some(body) = instance
            .element_for_bone(bone)
            .and_then(|e| instance.elements[e].body)
        {
            let at = engine.body_transform(body).w_axis.truncate();
            engine.apply_impulse(body, impulse.impulse, at);
            return;
        }
        warn!("force bone {} has no ragdoll element, distributing impulse", bone);
    }

    let bodies = instance.bodies();
    let total_mass: f32 = bodies.iter().map(|&b| engine.body_mass(b)).sum();
    if total_mass <= 0.0 {
        return;
    }
    for body in bodies {
        let share = engine.body_mass(body) / total_mass;
        engine.apply_impulse(body, impulse.impulse * share, impulse.at);
    }
}

//! Pose extraction for the animation system
//!
//! Reads simulated body transforms back into bone matrices. Solvers let
//! constrained bodies drift apart a little under load; with stretching
//! disallowed the translation is recomputed from the parent so joints stay
//! visually rigid while orientation still comes from the simulation.

use glam::Mat4;

use crate::engine::PhysicsEngine;
use crate::instance::RagdollInstance;

/// Bone matrix for one element, `None` while the element has no live body
/// (destroyed, or not yet restored).
pub fn extract_bone_matrix(
    engine: &dyn PhysicsEngine,
    instance: &RagdollInstance,
    element: usize,
) -> Option<Mat4> {
    let elem = instance.element(element)?;
    let body = elem.body?;
    let mut world = engine.body_transform(body);

    if !instance.allow_stretch {
        if let Some(parent) = elem.parent {
            let parent_body = instance.element(parent).and_then(|e| e.body)?;
            let parent_world = engine.body_transform(parent_body);
            // Keep the simulated orientation, pin the position to the parent
            world.w_axis = (parent_world * elem.origin_in_parent).w_axis;
        }
    }
    Some(world)
}

/// Write every element's bone matrix into `out`, indexed by skeleton bone.
/// Bones without a live element are left untouched.
pub fn extract_pose(engine: &dyn PhysicsEngine, instance: &RagdollInstance, out: &mut [Mat4]) {
    for element in 0..instance.element_count() {
        let bone = match instance.bone_index(element) {
            Some(bone) if bone < out.len() => bone,
            _ => continue,
        };
        if let Some(matrix) = extract_bone_matrix(engine, instance, element) {
            out[bone] = matrix;
        }
    }
}

//! Live ragdoll instances
//!
//! A [`RagdollInstance`] exclusively owns its engine-side bodies,
//! constraints, and constraint group. Elements form a dense array in
//! dependency order: a parent always has a smaller index than its children,
//! and exactly the non-root elements carry a constraint.

use glam::Mat4;
use log::debug;

use crate::description::AnimatedFrictionParams;
use crate::engine::{BodyHandle, ConstraintHandle, GroupHandle, PhysicsEngine};

/// Hard cap on elements per ragdoll; construction aborts beyond it
pub const MAX_ELEMENTS: usize = 64;

/// One simulated element of a ragdoll
#[derive(Debug, Clone)]
pub struct RagdollElement {
    /// `None` once destroyed or while not yet restored
    pub body: Option<BodyHandle>,
    /// Present iff the element has a parent
    pub constraint: Option<ConstraintHandle>,
    /// Index of the parent element, always smaller than this element's own
    pub parent: Option<usize>,
    /// This element's rest transform in its parent's space
    pub origin_in_parent: Mat4,
}

impl RagdollElement {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A live multi-body ragdoll built from one model's collision description
pub struct RagdollInstance {
    pub(crate) elements: Vec<RagdollElement>,
    pub(crate) group: Option<GroupHandle>,
    /// Element index -> skeleton bone index
    pub(crate) bone_indices: Vec<usize>,
    pub allow_stretch: bool,
    pub fixed_mode: bool,
    pub(crate) friction: AnimatedFrictionParams,
}

impl RagdollInstance {
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, index: usize) -> Option<&RagdollElement> {
        self.elements.get(index)
    }

    pub fn elements(&self) -> &[RagdollElement] {
        &self.elements
    }

    pub fn group(&self) -> Option<GroupHandle> {
        self.group
    }

    /// Skeleton bone driven by an element
    pub fn bone_index(&self, element: usize) -> Option<usize> {
        self.bone_indices.get(element).copied()
    }

    /// Element driving a skeleton bone, if any
    pub fn element_for_bone(&self, bone: usize) -> Option<usize> {
        self.bone_indices.iter().position(|&b| b == bone)
    }

    /// All live body handles of this instance
    pub fn bodies(&self) -> Vec<BodyHandle> {
        self.elements.iter().filter_map(|e| e.body).collect()
    }

    /// Joint friction scale at a given instance age, following the model's
    /// animated friction curve
    pub fn joint_friction_at(&self, age: f32) -> f32 {
        self.friction.at(age)
    }

    /// Tear down all engine-side state: constraints first, then bodies,
    /// then the group. Safe to call more than once.
    pub fn destroy(&mut self, engine: &mut dyn PhysicsEngine) {
        for element in &mut self.elements {
            if let Some(constraint) = element.constraint.take() {
                engine.destroy_constraint(constraint);
            }
        }
        for element in &mut self.elements {
            if let Some(body) = element.body.take() {
                engine.destroy_body(body);
            }
        }
        if let Some(group) = self.group.take() {
            engine.destroy_group(group);
        }
        debug!("destroyed ragdoll with {} elements", self.elements.len());
    }
}

//! Ragdoll physics lifecycle
//!
//! Builds simulated multi-body ragdolls from per-model collision
//! descriptions, keeps their poses usable by the animation system, corrects
//! joints the solver gets stuck on, and retires the least important
//! instances once the scene is over capacity. The physics solver itself is
//! external; see [`engine::PhysicsEngine`] for the capability surface this
//! crate expects from it.
//!
//! Per-tick order on the simulation thread: build (spawn events only) →
//! engine step → pose extraction → separation correction → retirement
//! update.

pub mod builder;
pub mod description;
pub mod engine;
pub mod error;
pub mod instance;
pub mod pose;
pub mod retirement;
pub mod rules;
pub mod separation;
pub mod skeleton;

pub use builder::{build, BuildOptions, Impulse, FIXED_MODE_MASS};
pub use description::{
    global_cache, AnimatedFrictionParams, CollisionDescription, CollisionRuleSet,
    ConstraintDesc, DescriptionCache, ModelId, PhysicalParams, SolidDesc,
};
pub use engine::{
    AxisLimit, BodyHandle, ConstraintHandle, GroupHandle, MockEngine, PhysicsEngine,
    RaycastFilter, RaycastHit, ShapeId,
};
pub use error::{RagdollError, RagdollResult};
pub use instance::{RagdollElement, RagdollInstance, MAX_ELEMENTS};
pub use pose::{extract_bone_matrix, extract_pose};
pub use retirement::{Retirable, RetirementConfig, RetirementManager};
pub use rules::activate;
pub use separation::{
    HeuristicPolicy, SeparationConfig, SeparationCorrector, SeparationPolicy,
};
pub use skeleton::Skeleton;

/// Crate-wide configuration, mapped onto the per-component configs
#[derive(Debug, Clone)]
pub struct RagdollConfig {
    pub max_normal_ragdolls: usize,
    pub max_important_ragdolls: usize,
    /// Global multiplier on authored joint friction
    pub joint_friction_scale: f32,
    /// Build every ragdoll in rigid "statue" mode
    pub fixed_constraints: bool,
    /// Let extracted poses stretch with the solver
    pub allow_stretch: bool,
}

impl Default for RagdollConfig {
    fn default() -> Self {
        Self {
            max_normal_ragdolls: 8,
            max_important_ragdolls: 2,
            joint_friction_scale: 1.0,
            fixed_constraints: false,
            allow_stretch: false,
        }
    }
}

impl RagdollConfig {
    /// Build options for one spawn under this configuration
    pub fn build_options(&self, impulse: Option<Impulse>) -> BuildOptions {
        BuildOptions {
            fixed_mode: self.fixed_constraints,
            allow_stretch: self.allow_stretch,
            joint_friction_scale: self.joint_friction_scale,
            impulse,
        }
    }

    pub fn retirement(&self) -> RetirementConfig {
        RetirementConfig {
            max_normal: self.max_normal_ragdolls,
            max_important: self.max_important_ragdolls,
        }
    }
}

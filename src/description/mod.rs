//! Per-model collision/constraint descriptions
//!
//! A [`CollisionDescription`] is the parsed, immutable form of a model's
//! authored physics blob: which bones become solids, how they are jointed,
//! which pairs may collide. Parsed once per model and shared by every
//! ragdoll instance of that model through the [`cache`].

mod parser;

pub mod cache;

pub use cache::{DescriptionCache, global as global_cache};
pub use parser::parse_description;

use glam::Mat4;

use crate::engine::{AxisLimit, ShapeId};

/// Identity of a model's authored physics data, the cache key
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ModelId(pub u64);

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ModelId<{}>", self.0)
    }
}

/// Physical parameters of one authored solid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalParams {
    pub mass: f32,
    pub friction: f32,
}

/// One simulated solid, bound to a skeleton bone
#[derive(Debug, Clone)]
pub struct SolidDesc {
    /// Index into the skeleton this model animates with
    pub bone_index: usize,
    /// Authored collision shape for this solid
    pub shape: ShapeId,
    /// Surface material for effects/sound lookup
    pub surface_material: u32,
    pub params: PhysicalParams,
}

/// One authored joint between two solids.
///
/// `parent < child` always holds after parsing; the parse step reorders
/// solids into dependency order.
#[derive(Debug, Clone)]
pub struct ConstraintDesc {
    /// Index of the parent solid
    pub parent: usize,
    /// Index of the child solid
    pub child: usize,
    pub limits: [AxisLimit; 3],
    /// Constraint frame in the parent solid's space
    pub frame: Mat4,
    /// Child bind transform in the parent bone's space, derived from the
    /// skeleton bind pose at parse time
    pub origin_in_parent: Mat4,
}

/// Explicit authored collision enable/disable overrides
#[derive(Debug, Clone, Default)]
pub struct CollisionRuleSet {
    /// `(solid_a, solid_b, enabled)` applied in order
    pub pairs: Vec<(usize, usize, bool)>,
}

/// Joint friction curve: starts at `initial` and eases to `settle` over
/// `settle_time` seconds of instance age
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatedFrictionParams {
    pub initial: f32,
    pub settle: f32,
    pub settle_time: f32,
}

impl Default for AnimatedFrictionParams {
    fn default() -> Self {
        Self {
            initial: 1.0,
            settle: 1.0,
            settle_time: 0.0,
        }
    }
}

impl AnimatedFrictionParams {
    /// Friction scale at a given instance age in seconds
    pub fn at(&self, age: f32) -> f32 {
        if self.settle_time <= 0.0 || age >= self.settle_time {
            return self.settle;
        }
        let t = (age / self.settle_time).clamp(0.0, 1.0);
        self.initial + (self.settle - self.initial) * t
    }
}

/// Parsed, immutable physics description of one model
#[derive(Debug, Clone)]
pub struct CollisionDescription {
    pub solids: Vec<SolidDesc>,
    pub constraints: Vec<ConstraintDesc>,
    /// Authored collision overrides; `None` means the default policy applies
    pub rules: Option<CollisionRuleSet>,
    pub friction: AnimatedFrictionParams,
}

impl Default for CollisionDescription {
    fn default() -> Self {
        Self {
            solids: Vec::new(),
            constraints: Vec::new(),
            rules: None,
            friction: AnimatedFrictionParams::default(),
        }
    }
}

impl CollisionDescription {
    /// Parent solid index for each solid, `None` for roots
    pub fn parent_of(&self, solid: usize) -> Option<usize> {
        self.constraints
            .iter()
            .find(|c| c.child == solid)
            .map(|c| c.parent)
    }
}

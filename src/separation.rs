//! Stuck-joint detection and correction
//!
//! After the solver steps, a constrained body can end up far from where its
//! parent says it should be, and the solver alone does not always work its
//! way back (a limb pinned under another ragdoll is the classic case). This
//! pass detects abnormal separation and, when the situation looks stuck,
//! snaps the child back instead of waiting.
//!
//! The triggers are author-tuned heuristics, kept behind a policy trait so a
//! stricter detector can replace them wholesale.

use glam::Vec3;
use log::debug;

use crate::engine::{PhysicsEngine, RaycastFilter};
use crate::instance::RagdollInstance;

/// Tuned thresholds of the stock heuristic
#[derive(Debug, Clone, Copy)]
pub struct SeparationConfig {
    /// Separation distance (world units) below which a joint is healthy
    pub distance_threshold: f32,
    /// A child lighter than this fraction of its parent's mass is treated
    /// as pinned when separated
    pub mass_ratio: f32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.1,
            mass_ratio: 0.5,
        }
    }
}

/// Decides whether a separated joint gets snapped back or left to the solver
pub trait SeparationPolicy {
    fn needs_hard_fix(
        &self,
        engine: &dyn PhysicsEngine,
        instance: &RagdollInstance,
        element: usize,
        target: Vec3,
        actual: Vec3,
    ) -> bool;
}

/// Stock heuristic: separation beyond the threshold plus either a pinned
/// mass ratio or a sibling body sitting between target and actual position
#[derive(Debug, Default)]
pub struct HeuristicPolicy {
    pub config: SeparationConfig,
}

impl SeparationPolicy for HeuristicPolicy {
    fn needs_hard_fix(
        &self,
        engine: &dyn PhysicsEngine,
        instance: &RagdollInstance,
        element: usize,
        target: Vec3,
        actual: Vec3,
    ) -> bool {
        let threshold_sq = self.config.distance_threshold * self.config.distance_threshold;
        if (actual - target).length_squared() <= threshold_sq {
            return false;
        }

        let elem = match instance.element(element) {
            Some(e) => e,
            None => return false,
        };
        let (child_body, parent) = match (elem.body, elem.parent) {
            (Some(b), Some(p)) => (b, p),
            _ => return false,
        };
        let parent_body = match instance.element(parent).and_then(|e| e.body) {
            Some(b) => b,
            None => return false,
        };

        // A light child separated from a heavy parent is usually pinned by
        // something the solver cannot push through
        if engine.body_mass(child_body) < self.config.mass_ratio * engine.body_mass(parent_body) {
            return true;
        }

        // Something of our own in the way between where the child should be
        // and where it is means the chain is tangled with itself
        let bodies = instance.bodies();
        let ignore = [child_body, parent_body];
        let filter = RaycastFilter {
            only: Some(&bodies),
            ignore: &ignore,
        };
        engine.raycast(target, actual, &filter).is_some()
    }
}

/// Per-tick corrector holding the active policy
pub struct SeparationCorrector {
    policy: Box<dyn SeparationPolicy>,
}

impl Default for SeparationCorrector {
    fn default() -> Self {
        Self::new(SeparationConfig::default())
    }
}

impl SeparationCorrector {
    pub fn new(config: SeparationConfig) -> Self {
        Self {
            policy: Box::new(HeuristicPolicy { config }),
        }
    }

    pub fn with_policy(policy: Box<dyn SeparationPolicy>) -> Self {
        Self { policy }
    }

    /// Inspect every joint of `instance`, snapping back the ones the policy
    /// flags. Returns the number of hard fixes. When nothing needed fixing
    /// the group's accumulated solver error is cleared: the structure is
    /// stable and the solver should stop compensating.
    pub fn correct(&self, engine: &mut dyn PhysicsEngine, instance: &RagdollInstance) -> usize {
        let mut fixes = 0;

        for index in 0..instance.element_count() {
            let elem = match instance.element(index) {
                Some(e) => e.clone(),
                None => continue,
            };
            let (child_body, parent) = match (elem.body, elem.parent) {
                (Some(b), Some(p)) => (b, p),
                _ => continue,
            };
            let parent_body = match instance.element(parent).and_then(|e| e.body) {
                Some(b) => b,
                None => continue,
            };

            let parent_world = engine.body_transform(parent_body);
            let target = (parent_world * elem.origin_in_parent).w_axis.truncate();
            let actual = engine.body_transform(child_body).w_axis.truncate();

            if !self
                .policy
                .needs_hard_fix(engine, instance, index, target, actual)
            {
                continue;
            }

            // Teleport back, keeping the simulated orientation, and carry
            // the parent's motion so the joint does not immediately re-open
            let mut transform = engine.body_transform(child_body);
            transform.w_axis = target.extend(1.0);
            engine.set_body_transform(child_body, transform);
            engine.set_body_velocity(child_body, engine.velocity_at_point(parent_body, target));
            fixes += 1;
            debug!(
                "hard-fixed element {}: {:.2} units from its joint target",
                index,
                (actual - target).length()
            );
        }

        if fixes == 0 {
            if let Some(group) = instance.group() {
                engine.clear_group_error(group);
            }
        }
        fixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build, BuildOptions};
    use crate::description::fixtures::chain_description;
    use crate::description::ModelId;
    use crate::engine::MockEngine;
    use glam::Mat4;

    fn build_chain(engine: &mut MockEngine, masses: &[f32]) -> RagdollInstance {
        let desc = chain_description(masses);
        let poses = vec![Mat4::IDENTITY; masses.len()];
        build(engine, ModelId(1), &desc, &poses, &BuildOptions::default()).expect("builds")
    }

    #[test]
    fn test_pinned_light_child_is_teleported() {
        let mut engine = MockEngine::new();
        // Child at 0.3x the parent's mass
        let instance = build_chain(&mut engine, &[10.0, 3.0]);
        let parent_body = instance.element(0).unwrap().body.unwrap();
        let child_body = instance.element(1).unwrap().body.unwrap();

        engine.set_body_velocity(parent_body, Vec3::new(2.0, 0.0, 0.0));
        engine.set_body_transform(child_body, Mat4::from_translation(Vec3::new(500.0, 0.0, 0.0)));

        let fixes = SeparationCorrector::default().correct(&mut engine, &instance);
        assert_eq!(fixes, 1);

        // Back at parent * origin, moving with the parent
        let target = Vec3::new(0.0, 1.0, 0.0);
        let pos = engine.body_transform(child_body).w_axis.truncate();
        assert!((pos - target).length() < 1e-5);
        assert!((engine.body_velocity(child_body) - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_balanced_masses_left_to_solver() {
        let mut engine = MockEngine::new();
        let instance = build_chain(&mut engine, &[10.0, 10.0]);
        let child_body = instance.element(1).unwrap().body.unwrap();
        let displaced = Vec3::new(500.0, 0.0, 0.0);
        engine.set_body_transform(child_body, Mat4::from_translation(displaced));

        let fixes = SeparationCorrector::default().correct(&mut engine, &instance);

        // Neither trigger fires: equal masses, nothing in the way
        assert_eq!(fixes, 0);
        let pos = engine.body_transform(child_body).w_axis.truncate();
        assert_eq!(pos, displaced);
        // Stable tick clears the group's error accumulation
        assert!(engine.group_error_cleared(instance.group().unwrap()));
    }

    #[test]
    fn test_sibling_in_ray_path_triggers_fix() {
        let mut engine = MockEngine::new();
        let instance = build_chain(&mut engine, &[10.0, 10.0, 10.0]);
        let leaf_body = instance.element(2).unwrap().body.unwrap();

        // Drag the leaf below the root so the ray back to its target
        // (0, 2, 0) passes straight through the root body at the origin
        engine.set_body_transform(leaf_body, Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)));

        let fixes = SeparationCorrector::default().correct(&mut engine, &instance);
        assert_eq!(fixes, 1);
        let pos = engine.body_transform(leaf_body).w_axis.truncate();
        assert!((pos - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_small_separation_is_ignored() {
        let mut engine = MockEngine::new();
        let instance = build_chain(&mut engine, &[10.0, 3.0]);
        let child_body = instance.element(1).unwrap().body.unwrap();
        // Inside the threshold
        engine.set_body_transform(
            child_body,
            Mat4::from_translation(Vec3::new(0.05, 1.0, 0.0)),
        );

        let fixes = SeparationCorrector::default().correct(&mut engine, &instance);
        assert_eq!(fixes, 0);
    }

    #[test]
    fn test_hard_fix_tick_does_not_clear_group_error() {
        let mut engine = MockEngine::new();
        let instance = build_chain(&mut engine, &[10.0, 3.0]);
        let child_body = instance.element(1).unwrap().body.unwrap();
        engine.set_body_transform(child_body, Mat4::from_translation(Vec3::new(500.0, 0.0, 0.0)));

        SeparationCorrector::default().correct(&mut engine, &instance);
        assert!(!engine.group_error_cleared(instance.group().unwrap()));
    }
}

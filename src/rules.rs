//! Collision rule activation
//!
//! Decides which bodies of one ragdoll may collide with each other. Without
//! authored overrides everything collides except immediate parent/child
//! pairs; the constraint already bounds their relative motion and letting
//! them collide just makes the solver fight itself.

use log::debug;

use crate::description::CollisionDescription;
use crate::engine::{GroupHandle, PhysicsEngine};
use crate::instance::RagdollInstance;

/// Apply collision rules and bring the instance to its initial sleep state.
///
/// `wake == false` restores a dormant ragdoll (saved-game load): rules are
/// installed but every body and the group go straight to sleep.
pub fn activate(
    engine: &mut dyn PhysicsEngine,
    instance: &RagdollInstance,
    description: &CollisionDescription,
    wake: bool,
) {
    let group = match instance.group() {
        Some(group) => group,
        None => return,
    };

    match &description.rules {
        Some(rules) => {
            for &(a, b, enabled) in &rules.pairs {
                if let (Some(body_a), Some(body_b)) = (
                    instance.element(a).and_then(|e| e.body),
                    instance.element(b).and_then(|e| e.body),
                ) {
                    engine.set_collision_pair(group, body_a, body_b, enabled);
                }
            }
            debug!("applied {} authored collision rules", rules.pairs.len());
        }
        None => apply_default_policy(engine, instance, group),
    }

    for element in instance.elements() {
        if let Some(body) = element.body {
            engine.set_self_collision(body, true);
            if wake {
                engine.wake_body(body);
            } else {
                engine.sleep_body(body);
            }
        }
    }
    if wake {
        engine.wake_group(group);
    } else {
        engine.sleep_group(group);
    }
}

/// Everyone collides with everyone, except directly jointed pairs
fn apply_default_policy(
    engine: &mut dyn PhysicsEngine,
    instance: &RagdollInstance,
    group: GroupHandle,
) {
    let elements = instance.elements();
    for a in 0..elements.len() {
        for b in (a + 1)..elements.len() {
            let (body_a, body_b) = match (elements[a].body, elements[b].body) {
                (Some(x), Some(y)) => (x, y),
                _ => continue,
            };
            let jointed = elements[b].parent == Some(a) || elements[a].parent == Some(b);
            engine.set_collision_pair(group, body_a, body_b, !jointed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build, BuildOptions};
    use crate::description::fixtures::chain_description;
    use crate::description::{CollisionRuleSet, ModelId};
    use crate::engine::MockEngine;
    use glam::Mat4;

    fn built_chain(engine: &mut MockEngine, masses: &[f32]) -> (RagdollInstance, CollisionDescription) {
        let desc = chain_description(masses);
        let poses = vec![Mat4::IDENTITY; masses.len()];
        let instance = build(engine, ModelId(1), &desc, &poses, &BuildOptions::default())
            .expect("chain builds");
        (instance, desc)
    }

    #[test]
    fn test_default_policy_disables_parent_child_only() {
        let mut engine = MockEngine::new();
        let (instance, desc) = built_chain(&mut engine, &[10.0, 6.0, 4.0]);

        activate(&mut engine, &instance, &desc, true);

        let group = instance.group().unwrap();
        let body = |i: usize| instance.element(i).unwrap().body.unwrap();
        // Jointed pairs disabled
        assert_eq!(engine.collision_pair(group, body(0), body(1)), Some(false));
        assert_eq!(engine.collision_pair(group, body(1), body(2)), Some(false));
        // Non-adjacent pair stays enabled
        assert_eq!(engine.collision_pair(group, body(0), body(2)), Some(true));
    }

    #[test]
    fn test_authored_rules_apply_verbatim() {
        let mut engine = MockEngine::new();
        let (instance, mut desc) = built_chain(&mut engine, &[10.0, 6.0, 4.0]);
        desc.rules = Some(CollisionRuleSet {
            pairs: vec![(0, 1, true), (0, 2, false)],
        });

        activate(&mut engine, &instance, &desc, true);

        let group = instance.group().unwrap();
        let body = |i: usize| instance.element(i).unwrap().body.unwrap();
        assert_eq!(engine.collision_pair(group, body(0), body(1)), Some(true));
        assert_eq!(engine.collision_pair(group, body(0), body(2)), Some(false));
        // Pair the author never mentioned is left untouched
        assert_eq!(engine.collision_pair(group, body(1), body(2)), None);
    }

    #[test]
    fn test_wake_flag_controls_sleep_state() {
        let mut engine = MockEngine::new();
        let (instance, desc) = built_chain(&mut engine, &[10.0, 6.0]);

        activate(&mut engine, &instance, &desc, false);
        for element in instance.elements() {
            assert!(engine.body_is_asleep(element.body.unwrap()));
            assert!(engine.body_self_collision(element.body.unwrap()));
        }
        assert!(engine.group_is_asleep(instance.group().unwrap()));

        activate(&mut engine, &instance, &desc, true);
        for element in instance.elements() {
            assert!(!engine.body_is_asleep(element.body.unwrap()));
        }
        assert!(!engine.group_is_asleep(instance.group().unwrap()));
    }
}

//! Full lifecycle pass against the mock engine: spawn, pose, correct, retire

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use glam::{Mat4, Vec3};

use ragdoll_engine::{
    activate, build, extract_pose, AnimatedFrictionParams, AxisLimit, CollisionDescription,
    ConstraintDesc, MockEngine, ModelId, PhysicalParams, PhysicsEngine, RagdollConfig,
    Retirable, RetirementManager, SeparationCorrector, ShapeId, SolidDesc,
};

/// Pelvis -> spine -> head chain, one unit of spacing
fn humanoid_chain() -> CollisionDescription {
    let masses = [12.0f32, 8.0, 4.0];
    CollisionDescription {
        solids: masses
            .iter()
            .enumerate()
            .map(|(i, &mass)| SolidDesc {
                bone_index: i,
                shape: ShapeId(i as u32),
                surface_material: 0,
                params: PhysicalParams {
                    mass,
                    friction: 0.5,
                },
            })
            .collect(),
        constraints: (1..masses.len())
            .map(|child| ConstraintDesc {
                parent: child - 1,
                child,
                limits: [AxisLimit {
                    min: -0.6,
                    max: 0.6,
                    damping: 0.2,
                }; 3],
                frame: Mat4::IDENTITY,
                origin_in_parent: Mat4::from_translation(Vec3::Y),
            })
            .collect(),
        rules: None,
        friction: AnimatedFrictionParams::default(),
    }
}

struct Corpse {
    torn_down: AtomicBool,
}

impl Corpse {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            torn_down: AtomicBool::new(false),
        })
    }

    fn as_retirable(self: &Arc<Self>) -> Weak<dyn Retirable> {
        let strong: Arc<dyn Retirable> = self.clone();
        Arc::downgrade(&strong)
    }
}

impl Retirable for Corpse {
    fn is_visible(&self) -> bool {
        false
    }
    fn is_resting(&self) -> bool {
        true
    }
    fn in_frustum(&self) -> bool {
        false
    }
    fn distance_to_viewer(&self) -> Option<f32> {
        None
    }
    fn begin_teardown(&self) {
        self.torn_down.store(true, Ordering::Relaxed);
    }
}

#[test]
fn spawn_step_pose_correct_retire() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = RagdollConfig::default();
    let mut engine = MockEngine::new();
    let description = humanoid_chain();
    let bone_poses = vec![Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)); 3];

    // Spawn with a blast impulse distributed over the whole body
    let mut instance = build(
        &mut engine,
        ModelId(42),
        &description,
        &bone_poses,
        &config.build_options(Some(ragdoll_engine::Impulse {
            impulse: Vec3::new(0.0, 0.0, 24.0),
            at: Vec3::new(2.0, 0.0, 0.0),
            force_bone: None,
        })),
    )
    .expect("ragdoll builds");
    activate(&mut engine, &instance, &description, true);

    assert_eq!(engine.body_count(), 3);
    assert_eq!(engine.constraint_count(), 2);
    // Mass-proportional distribution: identical delta-v everywhere
    for element in instance.elements() {
        let v = engine.body_velocity(element.body.unwrap());
        assert!((v - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
    }

    // "Solver step": the head drifts off its joint
    let head = instance.element(2).unwrap().body.unwrap();
    engine.set_body_transform(head, Mat4::from_translation(Vec3::new(2.0, 1.4, 0.3)));

    // Pose extraction pins the drifted head back onto the spine visually
    let mut pose = vec![Mat4::IDENTITY; 3];
    extract_pose(&engine, &instance, &mut pose);
    let spine_world = engine.body_transform(instance.element(1).unwrap().body.unwrap());
    let expected = (spine_world * instance.element(2).unwrap().origin_in_parent).w_axis;
    assert_eq!(pose[2].w_axis, expected);

    // Small drift, balanced masses: the corrector leaves it to the solver
    // and reports stability to the group
    let fixes = SeparationCorrector::default().correct(&mut engine, &instance);
    assert_eq!(fixes, 0);
    assert!(engine.group_error_cleared(instance.group().unwrap()));

    // Retirement: under cap, nothing happens
    let corpse = Corpse::new();
    let mut manager = RetirementManager::new(config.retirement());
    manager.track(corpse.as_retirable(), false, 0.0);
    manager.update(0.05);
    assert!(!corpse.torn_down.load(Ordering::Relaxed));
    assert_eq!(manager.normal_len(), 1);

    // Forced lifetime: gone by the first update at or past the deadline
    let doomed = Corpse::new();
    manager.track(doomed.as_retirable(), false, 0.3);
    manager.update(0.5);
    assert!(doomed.torn_down.load(Ordering::Relaxed));
    assert_eq!(manager.normal_len(), 1);

    // Owner teardown releases the physics state
    instance.destroy(&mut engine);
    assert_eq!(engine.body_count(), 0);
    assert_eq!(engine.constraint_count(), 0);
    assert_eq!(engine.group_count(), 0);
}

#[test]
fn capacity_pressure_retires_oldest_corpses() {
    let mut manager = RetirementManager::default();
    let corpses: Vec<_> = (0..10).map(|_| Corpse::new()).collect();
    for corpse in &corpses {
        manager.track(corpse.as_retirable(), false, 0.0);
    }

    manager.update(0.05);

    assert_eq!(manager.normal_len(), 8);
    assert!(corpses[0].torn_down.load(Ordering::Relaxed));
    assert!(corpses[1].torn_down.load(Ordering::Relaxed));
    assert!(corpses[2..]
        .iter()
        .all(|c| !c.torn_down.load(Ordering::Relaxed)));
}

#[test]
fn dormant_restore_sleeps_everything() {
    let mut engine = MockEngine::new();
    let description = humanoid_chain();
    let instance = build(
        &mut engine,
        ModelId(42),
        &description,
        &vec![Mat4::IDENTITY; 3],
        &RagdollConfig::default().build_options(None),
    )
    .expect("ragdoll builds");

    // Saved-game restore path: rules installed, everything asleep
    activate(&mut engine, &instance, &description, false);
    for element in instance.elements() {
        assert!(engine.body_is_asleep(element.body.unwrap()));
    }
    assert!(engine.group_is_asleep(instance.group().unwrap()));
}

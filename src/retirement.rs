//! Ragdoll retirement
//!
//! Every live ragdoll costs solver time, so the scene keeps a bounded pool:
//! a general tier and a small reserved tier for ragdolls the game marks as
//! important. Once a tier is over its cap, the manager evicts the oldest
//! entries it can justify removing, preferring ones the player cannot see.
//!
//! Eviction only signals the owner to begin teardown (fade out, despawn);
//! the owner's own lifecycle releases the physics state.

use std::collections::VecDeque;
use std::sync::Weak;

use log::debug;

/// Capability surface the manager needs from whatever owns a ragdoll
pub trait Retirable {
    /// Mid-effect owners (burning, dissolving) must finish before eviction
    fn is_exempt(&self) -> bool {
        false
    }
    /// In the renderer's current visible set
    fn is_visible(&self) -> bool;
    /// Simulated body has come to rest
    fn is_resting(&self) -> bool;
    /// Inside the camera frustum
    fn in_frustum(&self) -> bool;
    /// Distance to the viewer, `None` when no viewer context exists
    fn distance_to_viewer(&self) -> Option<f32>;
    /// Begin fade-out/removal; the owner frees the physics state itself
    fn begin_teardown(&self);
}

/// Tier capacities
#[derive(Debug, Clone, Copy)]
pub struct RetirementConfig {
    pub max_normal: usize,
    pub max_important: usize,
}

impl Default for RetirementConfig {
    fn default() -> Self {
        Self {
            max_normal: 8,
            max_important: 2,
        }
    }
}

struct Entry {
    owner: Weak<dyn Retirable>,
    /// Absolute simulation-time deadline; 0 means none
    retire_at: f64,
}

/// Tracks every live ragdoll and enforces the pool caps once per tick
pub struct RetirementManager {
    config: RetirementConfig,
    normal: VecDeque<Entry>,
    important: VecDeque<Entry>,
    now: f64,
}

impl Default for RetirementManager {
    fn default() -> Self {
        Self::new(RetirementConfig::default())
    }
}

impl RetirementManager {
    pub fn new(config: RetirementConfig) -> Self {
        Self {
            config,
            normal: VecDeque::new(),
            important: VecDeque::new(),
            now: 0.0,
        }
    }

    /// Current simulation time as accumulated by [`update`](Self::update)
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn normal_len(&self) -> usize {
        self.normal.len()
    }

    pub fn important_len(&self) -> usize {
        self.important.len()
    }

    /// Start tracking a ragdoll owner.
    ///
    /// `forced_retire_time` is an absolute simulation-time deadline (0 for
    /// none) after which the entry is evicted no matter what. Overflowing
    /// the important tier evicts its oldest entry immediately.
    pub fn track(&mut self, owner: Weak<dyn Retirable>, important: bool, forced_retire_time: f64) {
        let entry = Entry {
            owner,
            retire_at: forced_retire_time,
        };
        if important {
            self.important.push_back(entry);
            while self.important.len() > self.config.max_important {
                if let Some(oldest) = self.important.pop_front() {
                    evict(&oldest, "important tier over cap");
                }
            }
        } else {
            self.normal.push_back(entry);
        }
    }

    /// Once-per-tick pass: forced deadlines, dead owners, then capacity.
    ///
    /// Never fails; when every over-cap entry is exempt the pass is a no-op
    /// and capacity stays temporarily exceeded until a later tick.
    pub fn update(&mut self, dt: f64) {
        self.now += dt;
        let now = self.now;

        // Hard author-specified lifetimes, unconditional
        for tier in [&mut self.normal, &mut self.important] {
            tier.retain(|entry| {
                let expired = entry.retire_at != 0.0 && now >= entry.retire_at;
                if expired {
                    evict(entry, "forced retire time elapsed");
                }
                !expired
            });
        }

        // Owners that were destroyed behind our back
        self.normal.retain(|entry| entry.owner.strong_count() > 0);
        self.important.retain(|entry| entry.owner.strong_count() > 0);

        // Capacity pressure on the general tier
        while self.normal.len() > self.config.max_normal {
            if !self.evict_one_normal() {
                break;
            }
        }
    }

    /// Evict the best normal-tier candidate; false when everything is exempt
    fn evict_one_normal(&mut self) -> bool {
        // First pass from the head: oldest entry the visibility heuristic
        // lets go of
        for index in 0..self.normal.len() {
            let owner = match self.normal[index].owner.upgrade() {
                Some(owner) => owner,
                None => {
                    self.normal.remove(index);
                    return true;
                }
            };
            if owner.is_exempt() {
                continue;
            }
            let removable = !owner.is_visible() || (owner.is_resting() && !owner.in_frustum());
            if removable {
                owner.begin_teardown();
                debug!("retiring ragdoll at slot {}: out of sight", index);
                self.normal.remove(index);
                return true;
            }
        }

        // Everything qualifies visually; drop the farthest non-exempt one,
        // or the plain head when no owner knows a viewer
        let mut fallback: Option<(usize, f32)> = None;
        let mut first_non_exempt: Option<usize> = None;
        for index in 0..self.normal.len() {
            let owner = match self.normal[index].owner.upgrade() {
                Some(owner) => owner,
                None => continue,
            };
            if owner.is_exempt() {
                continue;
            }
            if first_non_exempt.is_none() {
                first_non_exempt = Some(index);
            }
            if let Some(distance) = owner.distance_to_viewer() {
                if fallback.map(|(_, d)| distance > d).unwrap_or(true) {
                    fallback = Some((index, distance));
                }
            }
        }

        let index = match fallback.map(|(i, _)| i).or(first_non_exempt) {
            Some(index) => index,
            None => return false, // all mid-effect, try again next tick
        };
        if let Some(entry) = self.normal.remove(index) {
            evict(&entry, "farthest from viewer under capacity pressure");
        }
        true
    }
}

fn evict(entry: &Entry, reason: &str) {
    if let Some(owner) = entry.owner.upgrade() {
        owner.begin_teardown();
        debug!("retiring ragdoll: {}", reason);
    }
}

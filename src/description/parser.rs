//! Binary collision blob decoding
//!
//! The asset pipeline emits one little-endian blob per model. Decoding is
//! best effort: a record naming an unknown bone or referencing a dropped
//! solid is skipped with a warning and the rest of the blob is still used.
//! Malformed content degrades, it never aborts.
//!
//! After decoding, solids are reordered into dependency order so that every
//! constraint satisfies `parent < child`. The builder relies on that to
//! finalize parents before children in a single forward pass.

use glam::{Mat4, Quat, Vec3};
use log::warn;

use crate::engine::{AxisLimit, ShapeId};
use crate::skeleton::Skeleton;

use super::{
    AnimatedFrictionParams, CollisionDescription, CollisionRuleSet, ConstraintDesc,
    PhysicalParams, SolidDesc,
};

const MAGIC: &[u8; 4] = b"RGDL";
const FLAG_RULE_SET: u32 = 1 << 0;
const FLAG_FRICTION: u32 = 1 << 1;

/// Sequential little-endian reader; any read past the end yields `None`
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        if end > self.data.len() {
            return None;
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Some(out)
    }

    fn u8(&mut self) -> Option<u8> {
        self.bytes(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.bytes(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        self.bytes(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Option<f32> {
        self.u32().map(f32::from_bits)
    }

    fn vec3(&mut self) -> Option<Vec3> {
        Some(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn quat(&mut self) -> Option<Quat> {
        Some(Quat::from_xyzw(
            self.f32()?,
            self.f32()?,
            self.f32()?,
            self.f32()?,
        ))
    }

    fn str(&mut self) -> Option<&'a str> {
        let len = self.u16()? as usize;
        std::str::from_utf8(self.bytes(len)?).ok()
    }
}

/// Raw records before bone resolution and reordering
struct RawSolid {
    desc: SolidDesc,
}

struct RawConstraint {
    parent: usize,
    child: usize,
    limits: [AxisLimit; 3],
    frame: Mat4,
}

/// Decode a model's collision blob against its skeleton.
///
/// Always returns a description; malformed input yields whatever subset was
/// recoverable (possibly empty).
pub fn parse_description(blob: &[u8], skeleton: &Skeleton) -> CollisionDescription {
    let mut r = Reader::new(blob);

    match r.bytes(4) {
        Some(m) if m == MAGIC.as_slice() => {}
        _ => {
            warn!("collision blob has no RGDL header, ignoring");
            return CollisionDescription::default();
        }
    }
    let _version = r.u32().unwrap_or(0);

    let (solid_count, constraint_count, flags) = match (r.u32(), r.u32(), r.u32()) {
        (Some(s), Some(c), Some(f)) => (s as usize, c as usize, f),
        _ => {
            warn!("collision blob header truncated, ignoring");
            return CollisionDescription::default();
        }
    };

    // Solids: authored index -> parsed index, None when the record was dropped.
    // Counts come from untrusted data, so cap the pre-allocation.
    let mut solids = Vec::with_capacity(solid_count.min(128));
    let mut remap: Vec<Option<usize>> = Vec::with_capacity(solid_count.min(128));
    for authored in 0..solid_count {
        match read_solid(&mut r, skeleton) {
            ReadResult::Ok(raw) => {
                remap.push(Some(solids.len()));
                solids.push(raw.desc);
            }
            ReadResult::Skipped => remap.push(None),
            ReadResult::Truncated => {
                warn!("collision blob truncated in solid {}", authored);
                return assemble(solids, Vec::new(), None, AnimatedFrictionParams::default());
            }
        }
    }

    // Constraints, remapped through the surviving solids
    let mut constraints = Vec::with_capacity(constraint_count.min(128));
    for authored in 0..constraint_count {
        let raw = match read_constraint(&mut r) {
            Some(raw) => raw,
            None => {
                warn!("collision blob truncated in constraint {}", authored);
                return assemble(solids, constraints, None, AnimatedFrictionParams::default());
            }
        };
        let (parent, child) = match (
            remap.get(raw.parent).copied().flatten(),
            remap.get(raw.child).copied().flatten(),
        ) {
            (Some(p), Some(c)) if p != c => (p, c),
            _ => {
                warn!(
                    "dropping constraint {}: solids {} -> {} unavailable",
                    authored, raw.parent, raw.child
                );
                continue;
            }
        };
        if constraints.iter().any(|c: &RawConstraint| c.child == child) {
            warn!("dropping constraint {}: solid {} already has a parent", authored, child);
            continue;
        }
        constraints.push(RawConstraint {
            parent,
            child,
            limits: raw.limits,
            frame: raw.frame,
        });
    }

    let rules = if flags & FLAG_RULE_SET != 0 {
        read_rules(&mut r, &remap)
    } else {
        None
    };

    let friction = if flags & FLAG_FRICTION != 0 {
        read_friction(&mut r).unwrap_or_default()
    } else {
        AnimatedFrictionParams::default()
    };

    let mut desc = assemble(solids, constraints, rules, friction);
    derive_parent_offsets(&mut desc, skeleton);
    desc
}

enum ReadResult {
    Ok(RawSolid),
    Skipped,
    Truncated,
}

fn read_solid(r: &mut Reader, skeleton: &Skeleton) -> ReadResult {
    let name = match r.str() {
        Some(name) => name,
        None => return ReadResult::Truncated,
    };
    let (shape, material, mass, friction) = match (r.u32(), r.u32(), r.f32(), r.f32()) {
        (Some(s), Some(m), Some(ma), Some(fr)) => (s, m, ma, fr),
        _ => return ReadResult::Truncated,
    };
    match skeleton.bone_index(name) {
        Some(bone_index) => ReadResult::Ok(RawSolid {
            desc: SolidDesc {
                bone_index,
                shape: ShapeId(shape),
                surface_material: material,
                params: PhysicalParams { mass, friction },
            },
        }),
        None => {
            warn!("dropping solid '{}': bone not in skeleton", name);
            ReadResult::Skipped
        }
    }
}

fn read_constraint(r: &mut Reader) -> Option<RawConstraint> {
    let parent = r.u32()? as usize;
    let child = r.u32()? as usize;
    let mut limits = [AxisLimit {
        min: 0.0,
        max: 0.0,
        damping: 0.0,
    }; 3];
    for limit in &mut limits {
        *limit = AxisLimit {
            min: r.f32()?,
            max: r.f32()?,
            damping: r.f32()?,
        };
    }
    let translation = r.vec3()?;
    let rotation = r.quat()?;
    Some(RawConstraint {
        parent,
        child,
        limits,
        frame: Mat4::from_rotation_translation(rotation, translation),
    })
}

fn read_rules(r: &mut Reader, remap: &[Option<usize>]) -> Option<CollisionRuleSet> {
    let count = r.u32()? as usize;
    let mut pairs = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        let a = r.u16()? as usize;
        let b = r.u16()? as usize;
        let enabled = r.u8()? != 0;
        match (
            remap.get(a).copied().flatten(),
            remap.get(b).copied().flatten(),
        ) {
            (Some(a), Some(b)) if a != b => pairs.push((a, b, enabled)),
            _ => warn!("dropping collision rule {} <-> {}: solid unavailable", a, b),
        }
    }
    Some(CollisionRuleSet { pairs })
}

fn read_friction(r: &mut Reader) -> Option<AnimatedFrictionParams> {
    Some(AnimatedFrictionParams {
        initial: r.f32()?,
        settle: r.f32()?,
        settle_time: r.f32()?,
    })
}

/// Reorder solids into dependency order (parents first) and remap every
/// index so `parent < child` holds for all constraints.
fn assemble(
    solids: Vec<SolidDesc>,
    constraints: Vec<RawConstraint>,
    rules: Option<CollisionRuleSet>,
    friction: AnimatedFrictionParams,
) -> CollisionDescription {
    let count = solids.len();
    let mut parent_of: Vec<Option<usize>> = vec![None; count];
    for c in &constraints {
        parent_of[c.child] = Some(c.parent);
    }

    // Stable forward scan: append solids whose parent is already placed.
    // A stalled pass means a malformed cycle; promote its first solid to a
    // root (dropping its constraint) so the scan always terminates.
    let mut order = Vec::with_capacity(count);
    let mut placed = vec![false; count];
    let mut dropped_cycle = Vec::new();
    while order.len() < count {
        let before = order.len();
        for i in 0..count {
            if placed[i] {
                continue;
            }
            let ready = match parent_of[i] {
                Some(p) => placed[p],
                None => true,
            };
            if ready {
                placed[i] = true;
                order.push(i);
            }
        }
        if order.len() == before {
            let stuck = (0..count).find(|&i| !placed[i]).unwrap_or(0);
            warn!("constraint cycle through solid {}, promoting it to a root", stuck);
            parent_of[stuck] = None;
            dropped_cycle.push(stuck);
        }
    }

    // old index -> new index
    let mut new_index = vec![0usize; count];
    for (new, &old) in order.iter().enumerate() {
        new_index[old] = new;
    }

    let solids = order.iter().map(|&old| solids[old].clone()).collect();

    let mut out_constraints: Vec<ConstraintDesc> = constraints
        .into_iter()
        .filter(|c| !dropped_cycle.contains(&c.child))
        .map(|c| ConstraintDesc {
            parent: new_index[c.parent],
            child: new_index[c.child],
            limits: c.limits,
            frame: c.frame,
            origin_in_parent: Mat4::IDENTITY,
        })
        .collect();
    out_constraints.sort_by_key(|c| c.child);

    let rules = rules.map(|r| CollisionRuleSet {
        pairs: r
            .pairs
            .into_iter()
            .map(|(a, b, e)| (new_index[a], new_index[b], e))
            .collect(),
    });

    CollisionDescription {
        solids,
        constraints: out_constraints,
        rules,
        friction,
    }
}

/// Fill each constraint's `origin_in_parent` from the skeleton bind pose
fn derive_parent_offsets(desc: &mut CollisionDescription, skeleton: &Skeleton) {
    for c in &mut desc.constraints {
        let parent_bone = desc.solids[c.parent].bone_index;
        let child_bone = desc.solids[c.child].bone_index;
        if let (Some(parent_bind), Some(child_bind)) = (
            skeleton.bind_transform(parent_bone),
            skeleton.bind_transform(child_bone),
        ) {
            c.origin_in_parent = parent_bind.inverse() * child_bind;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_blob {
    //! Blob construction helper mirroring the asset pipeline's layout

    use super::*;

    #[derive(Default)]
    pub struct BlobBuilder {
        solids: Vec<Vec<u8>>,
        constraints: Vec<Vec<u8>>,
        rules: Option<Vec<(u16, u16, bool)>>,
        friction: Option<AnimatedFrictionParams>,
    }

    impl BlobBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn solid(mut self, bone: &str, shape: u32, material: u32, mass: f32) -> Self {
            let mut rec = Vec::new();
            rec.extend((bone.len() as u16).to_le_bytes());
            rec.extend(bone.as_bytes());
            rec.extend(shape.to_le_bytes());
            rec.extend(material.to_le_bytes());
            rec.extend(mass.to_le_bytes());
            rec.extend(0.5f32.to_le_bytes());
            self.solids.push(rec);
            self
        }

        pub fn constraint(mut self, parent: u32, child: u32) -> Self {
            let mut rec = Vec::new();
            rec.extend(parent.to_le_bytes());
            rec.extend(child.to_le_bytes());
            for _ in 0..3 {
                rec.extend((-0.5f32).to_le_bytes());
                rec.extend(0.5f32.to_le_bytes());
                rec.extend(0.1f32.to_le_bytes());
            }
            // Identity frame
            for v in [0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0] {
                rec.extend(v.to_le_bytes());
            }
            self.constraints.push(rec);
            self
        }

        pub fn rule(mut self, a: u16, b: u16, enabled: bool) -> Self {
            self.rules.get_or_insert_with(Vec::new).push((a, b, enabled));
            self
        }

        pub fn friction(mut self, params: AnimatedFrictionParams) -> Self {
            self.friction = Some(params);
            self
        }

        pub fn finish(self) -> Vec<u8> {
            let mut flags = 0u32;
            if self.rules.is_some() {
                flags |= FLAG_RULE_SET;
            }
            if self.friction.is_some() {
                flags |= FLAG_FRICTION;
            }

            let mut blob = Vec::new();
            blob.extend(MAGIC);
            blob.extend(1u32.to_le_bytes());
            blob.extend((self.solids.len() as u32).to_le_bytes());
            blob.extend((self.constraints.len() as u32).to_le_bytes());
            blob.extend(flags.to_le_bytes());
            for rec in &self.solids {
                blob.extend(rec);
            }
            for rec in &self.constraints {
                blob.extend(rec);
            }
            if let Some(rules) = &self.rules {
                blob.extend((rules.len() as u32).to_le_bytes());
                for &(a, b, enabled) in rules {
                    blob.extend(a.to_le_bytes());
                    blob.extend(b.to_le_bytes());
                    blob.push(enabled as u8);
                }
            }
            if let Some(f) = &self.friction {
                blob.extend(f.initial.to_le_bytes());
                blob.extend(f.settle.to_le_bytes());
                blob.extend(f.settle_time.to_le_bytes());
            }
            blob
        }
    }

    pub fn chain_skeleton(bones: &[&str]) -> Skeleton {
        Skeleton::new(bones.iter().enumerate().map(|(i, name)| {
            (
                name.to_string(),
                Mat4::from_translation(Vec3::new(0.0, i as f32, 0.0)),
            )
        }))
    }
}

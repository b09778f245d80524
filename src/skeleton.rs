//! Skeleton bone table
//!
//! The animation system owns the real skeleton; the ragdoll layer only needs
//! name → index resolution and the bind pose to derive parent-relative
//! offsets at parse time.

use glam::Mat4;

/// Bone names and world-space bind-pose transforms, indexed in parallel
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    names: Vec<String>,
    bind_pose: Vec<Mat4>,
}

impl Skeleton {
    pub fn new(bones: impl IntoIterator<Item = (String, Mat4)>) -> Self {
        let (names, bind_pose) = bones.into_iter().unzip();
        Self { names, bind_pose }
    }

    pub fn bone_count(&self) -> usize {
        self.names.len()
    }

    /// Resolve a bone name to its index, if the skeleton has it
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|n| n.as_str())
    }

    /// World-space bind transform of a bone
    pub fn bind_transform(&self, index: usize) -> Option<Mat4> {
        self.bind_pose.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_bone_lookup() {
        let skeleton = Skeleton::new([
            ("pelvis".to_string(), Mat4::IDENTITY),
            ("spine".to_string(), Mat4::from_translation(Vec3::Y)),
        ]);

        assert_eq!(skeleton.bone_count(), 2);
        assert_eq!(skeleton.bone_index("spine"), Some(1));
        assert_eq!(skeleton.bone_index("tail"), None);
        assert_eq!(
            skeleton.bind_transform(1),
            Some(Mat4::from_translation(Vec3::Y))
        );
    }
}

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use serde::Deserialize;

use crate::convert::world_correction;

pub type Iso3 = Isometry3<f32>;

#[derive(Debug, Clone)]
pub struct Skeleton {
    bone_names: Vec<String>,
    hierarchy: Vec<Option<usize>>,
    default_transforms: Vec<Iso3>,
}

impl Skeleton {
    pub const fn from_hierarchy(bone_names: Vec<String>, hierarchy: Vec<Option<usize>>) -> Self {
        Self {
            bone_names,
            hierarchy,
            default_transforms: Vec::new(),
        }
    }

    pub fn with_rest_transforms(mut self, transforms: Vec<Iso3>) -> Self {
        self.default_transforms = transforms;
        self
    }

    pub fn num_bones(&self) -> usize {
        self.hierarchy.len()
    }

    pub fn bone_name(&self, bone_id: usize) -> &str {
        &self.bone_names[bone_id]
    }

    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    pub fn parent(&self, bone_id: usize) -> Option<usize> {
        self.hierarchy[bone_id]
    }

    pub fn rest_transform(&self, bone_id: usize) -> Iso3 {
        self.default_transforms.get(bone_id).copied().unwrap_or_else(Iso3::identity)
    }

    pub fn get_transform_relative_to(&self, bone_id: usize, parent_id: usize) -> Iso3 {
        if self.default_transforms.is_empty() {
            return Iso3::identity();
        }

        self.rest_transform(parent_id).inverse() * self.rest_transform(bone_id)
    }

    pub fn get_relative_transform(&self, bone_id: usize) -> Iso3 {
        match self.hierarchy[bone_id] {
            Some(parent_id) => self.get_transform_relative_to(bone_id, parent_id),
            None => self.rest_transform(bone_id),
        }
    }

    /// Reads a skeleton manifest. Bone transforms in the file are relative to the parent.
    pub fn load_manifest(path: &Path) -> Result<Self> {
        let manifest: SkeletonManifest = toml::from_str(&std::fs::read_to_string(path)?)?;
        manifest.into_skeleton()
    }
}

#[derive(Debug, Deserialize)]
struct BoneManifest {
    name: String,
    #[serde(default = "no_parent")]
    parent: isize,
    #[serde(default)]
    translation: [f32; 3],
    /// `w, x, y, z`
    #[serde(default = "identity_rotation")]
    rotation: [f32; 4],
}

const fn no_parent() -> isize {
    -1
}

const fn identity_rotation() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

#[derive(Debug, Deserialize)]
struct SkeletonManifest {
    bones: Vec<BoneManifest>,
}

impl SkeletonManifest {
    fn into_skeleton(self) -> Result<Skeleton> {
        let num_bones = self.bones.len();
        let mut names = Vec::with_capacity(num_bones);
        let mut hierarchy = Vec::with_capacity(num_bones);
        let mut local_transforms = Vec::with_capacity(num_bones);

        for (i, bone) in self.bones.into_iter().enumerate() {
            let parent = (bone.parent >= 0).then(|| bone.parent as usize);
            if let Some(parent_id) = parent {
                if parent_id >= num_bones || parent_id == i {
                    bail!("Bone {} has invalid parent {}", bone.name, parent_id);
                }
            }

            let [w, x, y, z] = bone.rotation;
            let Some(rotation) = UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f32::EPSILON) else {
                bail!("Bone {} has a zero rotation", bone.name)
            };
            let [tx, ty, tz] = bone.translation;

            names.push(bone.name);
            hierarchy.push(parent);
            local_transforms.push(Iso3::from_parts(Translation3::new(tx, ty, tz), rotation));
        }

        // parents may come after their children, so resolve armature space recursively
        let mut transforms: Vec<Option<Iso3>> = vec![None; num_bones];
        for i in 0..num_bones {
            resolve_rest(i, &hierarchy, &local_transforms, &mut transforms, 0)?;
        }

        Ok(Skeleton::from_hierarchy(names, hierarchy).with_rest_transforms(transforms.into_iter().flatten().collect()))
    }
}

fn resolve_rest(
    bone_id: usize,
    hierarchy: &[Option<usize>],
    local_transforms: &[Iso3],
    transforms: &mut [Option<Iso3>],
    depth: usize,
) -> Result<Iso3> {
    if let Some(transform) = transforms[bone_id] {
        return Ok(transform);
    }

    if depth > hierarchy.len() {
        bail!("Bone hierarchy contains a cycle at bone {}", bone_id);
    }

    let transform = match hierarchy[bone_id] {
        Some(parent_id) => resolve_rest(parent_id, hierarchy, local_transforms, transforms, depth + 1)? * local_transforms[bone_id],
        None => local_transforms[bone_id],
    };
    transforms[bone_id] = Some(transform);
    Ok(transform)
}

#[derive(Debug, Clone)]
pub struct Pose {
    world: Vec<Iso3>,
}

impl Pose {
    pub fn rest(skeleton: &Skeleton) -> Self {
        Self {
            world: (0..skeleton.num_bones()).map(|i| skeleton.rest_transform(i)).collect(),
        }
    }

    /// Places a bone at `local` relative to its parent's current transform (roots are
    /// placed relative to the capture engine's world) and returns the transform
    /// relative to the bone's rest pose, which is what gets keyframed.
    pub fn set_local(&mut self, skeleton: &Skeleton, bone_id: usize, local: &Iso3) -> Iso3 {
        let parent_world = skeleton.parent(bone_id).map(|parent_id| self.world[parent_id]);
        let world = match parent_world {
            Some(parent_world) => parent_world * local,
            None => Iso3::from_parts(Translation3::identity(), world_correction()) * local,
        };
        self.world[bone_id] = world;

        let relative = match parent_world {
            Some(parent_world) => parent_world.inverse() * world,
            None => world,
        };
        skeleton.get_relative_transform(bone_id).inverse() * relative
    }
}

pub trait ModelImporter {
    /// Extension of the files this importer reads, without the dot.
    fn extension(&self) -> &str;

    fn import(&mut self, path: &Path) -> Result<Skeleton>;
}

/// Builds the asset path for a model identifier such as `models/player/ct_sas.mdl`.
pub fn model_asset_path(asset_root: &str, model: &str, extension: &str) -> PathBuf {
    let root = asset_root.trim_end_matches(['/', '\\']);
    let path = if root.is_empty() {
        PathBuf::from(model)
    } else {
        PathBuf::from(format!("{}/{}", root, model))
    };

    path.with_extension(extension)
}

#[derive(Debug, Default)]
pub struct TomlSkeletonImporter;

impl ModelImporter for TomlSkeletonImporter {
    fn extension(&self) -> &str {
        "toml"
    }

    fn import(&mut self, path: &Path) -> Result<Skeleton> {
        Skeleton::load_manifest(path).with_context(|| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use nalgebra::Vector3;

    use super::*;

    const MANIFEST: &str = r#"
[[bones]]
name = "root"
translation = [0.0, 0.0, 10.0]

[[bones]]
name = "spine"
parent = 0
translation = [0.0, 0.0, 5.0]
rotation = [0.70710677, 0.0, 0.0, 0.70710677]

[[bones]]
name = "head"
parent = 1
translation = [1.0, 0.0, 0.0]
"#;

    fn manifest_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn manifest_resolves_armature_space() {
        let file = manifest_file(MANIFEST);
        let skeleton = Skeleton::load_manifest(file.path()).unwrap();

        assert_eq!(skeleton.num_bones(), 3);
        assert_eq!(skeleton.bone_name(2), "head");
        assert_eq!((0..3).map(|i| skeleton.parent(i)).collect::<Vec<_>>(), vec![None, Some(0), Some(1)]);

        // head sits one unit along the spine's rotated X axis
        let head = skeleton.rest_transform(2).translation.vector;
        assert!((head - Vector3::new(0.0, 1.0, 15.0)).norm() < 1e-5);

        let relative = skeleton.get_relative_transform(2).translation.vector;
        assert!((relative - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn manifest_rejects_bad_parent() {
        let file = manifest_file("[[bones]]\nname = \"a\"\nparent = 3\n");
        assert!(Skeleton::load_manifest(file.path()).is_err());
    }

    #[test]
    fn manifest_rejects_cycles() {
        let file = manifest_file("[[bones]]\nname = \"a\"\nparent = 1\n[[bones]]\nname = \"b\"\nparent = 0\n");
        assert!(Skeleton::load_manifest(file.path()).is_err());
    }

    #[test]
    fn rest_pose_gives_identity_basis() {
        let file = manifest_file(MANIFEST);
        let skeleton = Skeleton::load_manifest(file.path()).unwrap();
        let mut pose = Pose::rest(&skeleton);

        let spine_local = skeleton.get_relative_transform(1);
        let basis = pose.set_local(&skeleton, 1, &spine_local);
        assert!(basis.translation.vector.norm() < 1e-5);
        assert!(basis.rotation.angle() < 1e-5);
    }

    #[test]
    fn root_is_corrected_into_target_world() {
        let skeleton = Skeleton::from_hierarchy(
            vec!["root".to_string(), "child".to_string()],
            vec![None, Some(0)],
        );
        let mut pose = Pose::rest(&skeleton);

        let local = Iso3::translation(1.0, 0.0, 0.0);
        let basis = pose.set_local(&skeleton, 0, &local);
        assert!((basis.translation.vector - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-5);

        // children follow the corrected root without being corrected again
        let child = pose.set_local(&skeleton, 1, &local);
        assert!((child.translation.vector - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn asset_paths() {
        assert_eq!(
            model_asset_path("C:\\assets\\", "models/player/ct_sas.mdl", "toml"),
            PathBuf::from("C:\\assets/models/player/ct_sas.toml")
        );
        assert_eq!(model_asset_path("", "models/a.mdl", "toml"), PathBuf::from("models/a.toml"));
        assert_eq!(model_asset_path("/assets//", "models/a.mdl", "qc"), PathBuf::from("/assets/models/a.qc"));
    }

    #[test]
    fn toml_importer_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/a.toml"), MANIFEST).unwrap();

        let mut importer = TomlSkeletonImporter;
        let path = model_asset_path(dir.path().to_str().unwrap(), "models/a.mdl", importer.extension());
        assert_eq!(importer.import(&path).unwrap().num_bones(), 3);
        assert!(importer.import(&dir.path().join("missing.toml")).is_err());
    }
}

use std::collections::HashMap;

use nalgebra::Translation3;

use crate::animation::{CameraData, Channel, Interpolation, Track};
use crate::config::ImportOptions;
use crate::convert::{alien_swarm_fov_scaling, camera_up_correction, fov_to_lens, QAngle, Quat, Vec3};
use crate::error::DecodeError;
use crate::sink::{AnimatedObject, ObjectKind};
use crate::skeleton::{model_asset_path, Iso3, ModelImporter, Pose, Skeleton};

const VISIBLE: f32 = 0.0;
const HIDDEN: f32 = 1.0;

#[derive(Debug)]
enum Geometry {
    Failed,
    Loaded { skeleton: Skeleton, pose: Pose },
}

#[derive(Debug)]
struct BoneTracks {
    location: Track<Vec3>,
    rotation: Track<Quat>,
}

#[derive(Debug)]
pub struct ModelHandle {
    pub number: usize,
    pub model: String,
    last_position: Vec3,
    visibility: Track<f32>,
    location: Track<Vec3>,
    rotation: Track<Quat>,
    bones: Vec<BoneTracks>,
    geometry: Geometry,
    camera: Option<CameraData>,
}

impl ModelHandle {
    pub fn name(&self) -> String {
        format!("afx.{}", self.number)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.geometry, Geometry::Loaded { .. })
    }

    fn flush(&mut self) {
        self.visibility.flush();
        self.location.flush();
        self.rotation.flush();
        for bone in &mut self.bones {
            bone.location.flush();
            bone.rotation.flush();
        }
        if let Some(camera) = &mut self.camera {
            camera.flush();
        }
    }

    fn into_objects(mut self, interpolation: Interpolation, scale: f32) -> Vec<AnimatedObject> {
        self.flush();

        let mut objects = Vec::new();
        let name = self.name();
        if let Geometry::Loaded { skeleton, .. } = &self.geometry {
            let mut curves = self.visibility.into_curves(|_| Channel::Visibility, Interpolation::Constant);
            curves.extend(self.location.into_curves(Channel::Location, interpolation));
            curves.extend(self.rotation.into_curves(Channel::Rotation, interpolation));

            for (bone_id, bone) in self.bones.into_iter().enumerate() {
                let bone_name = skeleton.bone_name(bone_id);
                curves.extend(bone.location.into_curves(
                    |index| Channel::BoneLocation { bone: bone_name.to_string(), index },
                    interpolation,
                ));
                curves.extend(bone.rotation.into_curves(
                    |index| Channel::BoneRotation { bone: bone_name.to_string(), index },
                    interpolation,
                ));
            }

            objects.push(AnimatedObject {
                name,
                kind: ObjectKind::Armature {
                    model: self.model.clone(),
                    bones: skeleton.bone_names().to_vec(),
                    scale,
                },
                curves,
            });
        }

        if let Some(camera) = self.camera {
            let name = camera.name.clone();
            objects.push(AnimatedObject {
                name,
                kind: ObjectKind::Camera,
                curves: camera.into_curves(interpolation),
            });
        }

        objects
    }
}

/// Binds stream handles to [`ModelHandle`]s and routes samples to their tracks.
///
/// Handles are recycled by the capture engine, so a binding only lives until the
/// entity is deleted, hidden or switches model. Unbound ModelHandles go to a free
/// list and are handed out again to the next entity of the same model, preferring
/// the one that was last seen closest to where the new entity appears.
pub struct EntityTracker<'a> {
    options: &'a ImportOptions,
    importer: &'a mut dyn ModelImporter,
    handles: Vec<ModelHandle>,
    bindings: HashMap<i32, usize>,
    free: Vec<usize>,
    instances: HashMap<String, Option<Skeleton>>,
    failed_models: Vec<String>,
}

impl<'a> EntityTracker<'a> {
    pub fn new(options: &'a ImportOptions, importer: &'a mut dyn ModelImporter) -> Self {
        Self {
            options,
            importer,
            handles: Vec::new(),
            bindings: HashMap::new(),
            free: Vec::new(),
            instances: HashMap::new(),
            failed_models: Vec::new(),
        }
    }

    pub fn bound(&self, handle: i32) -> Option<usize> {
        self.bindings.get(&handle).copied()
    }

    pub fn model_handle(&self, key: usize) -> &ModelHandle {
        &self.handles[key]
    }

    pub fn num_model_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn failed_models(&self) -> &[String] {
        &self.failed_models
    }

    /// Applies a `baseentity` block and returns the ModelHandle now bound to `handle`.
    pub fn update_entity(&mut self, handle: i32, model: &str, visible: bool, origin: Vec3, angles: QAngle, time: f64) -> usize {
        if let Some(key) = self.bound(handle) {
            if self.handles[key].model != model {
                log::debug!("Handle {} switched from {} to {}", handle, self.handles[key].model, model);
                self.release(handle, time);
            }
        }

        let key = match self.bound(handle) {
            Some(key) => key,
            None => {
                let key = self.take_free(model, &origin).unwrap_or_else(|| self.create(model));
                self.bindings.insert(handle, key);
                key
            }
        };

        let scale = self.options.global_scale;
        let model_handle = &mut self.handles[key];
        model_handle.last_position = origin;
        if model_handle.is_loaded() {
            model_handle.visibility.update(time, if visible { VISIBLE } else { HIDDEN });
            model_handle.location.update(time, origin * scale);
            model_handle.rotation.update(time, angles.to_quaternion());
        }

        key
    }

    // bones beyond the model's skeleton are ignored
    pub fn update_bones(&mut self, key: usize, bones: &[(Vec3, Quat)], time: f64) {
        let ModelHandle { geometry, bones: tracks, .. } = &mut self.handles[key];
        let Geometry::Loaded { skeleton, pose } = geometry else {
            return;
        };

        for (bone_id, (translation, rotation)) in bones.iter().enumerate().take(skeleton.num_bones()) {
            let local = Iso3::from_parts(Translation3::from(*translation), *rotation);
            let basis = pose.set_local(skeleton, bone_id, &local);

            let track = &mut tracks[bone_id];
            track.location.update(time, basis.translation.vector);
            track.rotation.update(time, basis.rotation);
        }
    }

    pub fn update_camera(&mut self, key: usize, origin: Vec3, angles: QAngle, fov: f32, time: f64) {
        let options = self.options;
        let model_handle = &mut self.handles[key];
        let name = format!("afxCam.{}", model_handle.number);
        let camera = model_handle
            .camera
            .get_or_insert_with(|| CameraData::new(name, options.inter_key));

        camera_update(options, camera, origin, angles, fov, time);
    }

    /// Ends the binding for `handle`, hiding its entity from `time` on.
    pub fn release(&mut self, handle: i32, time: f64) {
        let Some(key) = self.bindings.remove(&handle) else {
            return;
        };

        let model_handle = &mut self.handles[key];
        model_handle.flush();
        if model_handle.is_loaded() {
            model_handle.visibility.push(time, HIDDEN);
        }
        self.free.push(key);
    }

    fn take_free(&mut self, model: &str, origin: &Vec3) -> Option<usize> {
        let (index, _) = self
            .free
            .iter()
            .enumerate()
            .filter(|(_, key)| self.handles[**key].model == model)
            .map(|(index, key)| (index, (self.handles[*key].last_position - origin).norm_squared()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))?;

        let key = self.free.swap_remove(index);
        log::trace!("Reusing {} for {}", self.handles[key].name(), model);
        Some(key)
    }

    fn create(&mut self, model: &str) -> usize {
        let key = self.handles.len();
        let synthesize = self.options.inter_key;
        let geometry = self.resolve_geometry(model);

        let mut visibility = Track::new(false);
        let mut bones = Vec::new();
        if let Geometry::Loaded { skeleton, .. } = &geometry {
            // hidden until the first sample
            visibility.push(0.0, HIDDEN);
            bones = (0..skeleton.num_bones())
                .map(|_| BoneTracks {
                    location: Track::new(synthesize),
                    rotation: Track::new(synthesize),
                })
                .collect();
        }

        self.handles.push(ModelHandle {
            number: key + 1,
            model: model.to_string(),
            last_position: Vec3::zeros(),
            visibility,
            location: Track::new(synthesize),
            rotation: Track::new(synthesize),
            bones,
            geometry,
            camera: None,
        });
        log::debug!("Created afx.{} for {}", key + 1, model);

        key
    }

    fn resolve_geometry(&mut self, model: &str) -> Geometry {
        if self.options.instancing {
            if let Some(instance) = self.instances.get(model) {
                return match instance {
                    Some(skeleton) => Geometry::Loaded {
                        pose: Pose::rest(skeleton),
                        skeleton: skeleton.clone(),
                    },
                    None => Geometry::Failed,
                };
            }
        }

        let path = model_asset_path(&self.options.asset_path, model, self.importer.extension());
        let skeleton = match self.importer.import(&path) {
            Ok(skeleton) => Some(skeleton),
            Err(e) => {
                let error = DecodeError::ModelImportFailed {
                    model: model.to_string(),
                    reason: format!("{:#}", e),
                };
                log::warn!("{}", error);
                if !self.failed_models.iter().any(|m| m == model) {
                    self.failed_models.push(model.to_string());
                }
                None
            }
        };

        if self.options.instancing {
            self.instances.insert(model.to_string(), skeleton.clone());
        }

        match skeleton {
            Some(skeleton) => Geometry::Loaded {
                pose: Pose::rest(&skeleton),
                skeleton,
            },
            None => Geometry::Failed,
        }
    }

    pub fn finish(self) -> Vec<AnimatedObject> {
        let interpolation = self.options.interpolation;
        let scale = self.options.global_scale;
        self.handles
            .into_iter()
            .flat_map(|handle| handle.into_objects(interpolation, scale))
            .collect()
    }
}

pub fn camera_update(options: &ImportOptions, camera: &mut CameraData, origin: Vec3, angles: QAngle, fov: f32, time: f64) {
    let rotation = angles.to_quaternion() * camera_up_correction();
    let fov = if options.scale_agr_fov {
        alien_swarm_fov_scaling(options.render_width, options.render_height, fov)
    } else {
        fov
    };

    camera.update(
        time,
        origin * options.global_scale,
        rotation,
        fov_to_lens(options.sensor_width, fov),
    );
}

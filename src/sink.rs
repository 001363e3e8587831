use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::animation::{Curve, Interpolation, Keyframe};
use crate::time::FrameRateMismatch;

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Armature { model: String, bones: Vec<String>, scale: f32 },
    Camera,
}

#[derive(Debug, Clone)]
pub struct AnimatedObject {
    pub name: String,
    pub kind: ObjectKind,
    pub curves: Vec<Curve>,
}

impl AnimatedObject {
    pub fn curve(&self, channel: &str) -> Option<&Curve> {
        self.curves.iter().find(|curve| curve.channel.to_string() == channel)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportReport {
    pub frame_start: i64,
    pub frame_end: i64,
    pub frame_rate_mismatch: Option<FrameRateMismatch>,
    pub failed_models: Vec<String>,
}

/// Output frame range from frame 1 to `end_time` or the last keyframe, whichever is later.
pub fn frame_range(objects: &[AnimatedObject], end_time: f64) -> (i64, i64) {
    let last = objects
        .iter()
        .flat_map(|object| &object.curves)
        .flat_map(|curve| &curve.keyframes)
        .map(|keyframe| keyframe.frame)
        .fold(end_time.max(1.0), f64::max);

    (1, last.ceil() as i64)
}

/// Everything an import produced, held back until decoding has succeeded.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub objects: Vec<AnimatedObject>,
    pub report: ImportReport,
}

impl Scene {
    pub fn object(&self, name: &str) -> Option<&AnimatedObject> {
        self.objects.iter().find(|object| object.name == name)
    }

    pub fn emit(&self, sink: &mut impl AnimationSink) -> Result<()> {
        for object in &self.objects {
            match &object.kind {
                ObjectKind::Armature { model, bones, scale } => sink.create_armature(&object.name, model, bones, *scale)?,
                ObjectKind::Camera => sink.create_camera(&object.name)?,
            }

            for curve in &object.curves {
                sink.write_curve(&object.name, curve)?;
            }
        }

        sink.set_frame_range(self.report.frame_start, self.report.frame_end)
    }
}

pub trait AnimationSink {
    fn create_armature(&mut self, name: &str, model: &str, bones: &[String], scale: f32) -> Result<()>;

    fn create_camera(&mut self, name: &str) -> Result<()>;

    fn write_curve(&mut self, object: &str, curve: &Curve) -> Result<()>;

    fn set_frame_range(&mut self, start: i64, end: i64) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct DocumentCurve {
    data_path: String,
    index: usize,
    interpolation: Interpolation,
    keyframes: Vec<Keyframe>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DocumentObject {
    Armature {
        name: String,
        model: String,
        bones: Vec<String>,
        scale: f32,
        curves: Vec<DocumentCurve>,
    },
    Camera {
        name: String,
        curves: Vec<DocumentCurve>,
    },
}

impl DocumentObject {
    fn name(&self) -> &str {
        match self {
            Self::Armature { name, .. } | Self::Camera { name, .. } => name,
        }
    }

    fn curves_mut(&mut self) -> &mut Vec<DocumentCurve> {
        match self {
            Self::Armature { curves, .. } | Self::Camera { curves, .. } => curves,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SceneDocument {
    frame_start: i64,
    frame_end: i64,
    objects: Vec<DocumentObject>,
}

impl SceneDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl AnimationSink for SceneDocument {
    fn create_armature(&mut self, name: &str, model: &str, bones: &[String], scale: f32) -> Result<()> {
        self.objects.push(DocumentObject::Armature {
            name: name.to_string(),
            model: model.to_string(),
            bones: bones.to_vec(),
            scale,
            curves: Vec::new(),
        });
        Ok(())
    }

    fn create_camera(&mut self, name: &str) -> Result<()> {
        self.objects.push(DocumentObject::Camera {
            name: name.to_string(),
            curves: Vec::new(),
        });
        Ok(())
    }

    fn write_curve(&mut self, object: &str, curve: &Curve) -> Result<()> {
        let Some(target) = self.objects.iter_mut().find(|o| o.name() == object) else {
            anyhow::bail!("No object named {}", object)
        };

        target.curves_mut().push(DocumentCurve {
            data_path: curve.channel.data_path(),
            index: curve.channel.index(),
            interpolation: curve.interpolation,
            keyframes: curve.keyframes.clone(),
        });
        Ok(())
    }

    fn set_frame_range(&mut self, start: i64, end: i64) -> Result<()> {
        self.frame_start = start;
        self.frame_end = end;
        Ok(())
    }
}

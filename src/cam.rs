use std::path::Path;

use crate::animation::CameraData;
use crate::config::ImportOptions;
use crate::convert::{alien_swarm_fov_scaling, camera_up_correction, fov_to_lens, QAngle, Vec3};
use crate::error::{DecodeError, Result};
use crate::sink::{frame_range, AnimatedObject, ImportReport, ObjectKind, Scene};

const MIN_FIELDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFov {
    /// Not stated; the recording already matches the render.
    Default,
    /// Recorded as if rendering 4:3.
    None,
    AlienSwarm,
}

impl ScaleFov {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "" => Ok(Self::Default),
            "none" => Ok(Self::None),
            "alienSwarm" => Ok(Self::AlienSwarm),
            other => Err(DecodeError::UnsupportedScaleFovMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CamHeader {
    pub version: i32,
    pub scale_fov: ScaleFov,
}

impl CamHeader {
    fn needs_fov_scaling(&self) -> bool {
        self.version == 1 && self.scale_fov == ScaleFov::None
    }
}

pub struct CamImporter<'a> {
    options: &'a ImportOptions,
}

impl<'a> CamImporter<'a> {
    pub fn new(options: &'a ImportOptions) -> Self {
        Self { options }
    }

    pub fn import_file(&self, path: &Path) -> Result<Scene> {
        self.import(&std::fs::read_to_string(path)?)
    }

    pub fn import(&self, text: &str) -> Result<Scene> {
        let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));
        let header = read_header(&mut lines)?;
        log::debug!("Cam version {}, scaleFov {:?}", header.version, header.scale_fov);

        let options = self.options;
        let mut camera = CameraData::new("afxCam", options.inter_key);
        let mut first_time = None;

        for (line_number, line) in lines {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.len() < MIN_FIELDS {
                break;
            }

            let mut fields = [0.0f64; MIN_FIELDS];
            for (field, word) in fields.iter_mut().zip(&words) {
                *field = parse_number(word, line_number)?;
            }
            let [_, x, y, z, roll, pitch, yaw, fov] = fields.map(|f| f as f32);

            let first = *first_time.get_or_insert(fields[0]);
            let time = 1.0 + (fields[0] - first) * options.fps;

            let location = Vec3::new(-y, x, z) * options.global_scale;
            let rotation = QAngle::new(pitch, yaw, roll).to_quaternion() * camera_up_correction();
            let fov = if header.needs_fov_scaling() {
                alien_swarm_fov_scaling(options.render_width, options.render_height, fov)
            } else {
                fov
            };

            camera.update(time, location, rotation, fov_to_lens(options.sensor_width, fov));
        }

        let objects = vec![AnimatedObject {
            name: camera.name.clone(),
            kind: ObjectKind::Camera,
            curves: camera.into_curves(options.interpolation),
        }];
        let (frame_start, frame_end) = frame_range(&objects, 1.0);

        Ok(Scene {
            objects,
            report: ImportReport {
                frame_start,
                frame_end,
                ..Default::default()
            },
        })
    }
}

fn parse_number(word: &str, line: usize) -> Result<f64> {
    word.parse().map_err(|_| DecodeError::InvalidNumber {
        value: word.to_string(),
        line,
    })
}

fn read_header<'t>(lines: &mut impl Iterator<Item = (usize, &'t str)>) -> Result<CamHeader> {
    let Some((_, first)) = lines.next() else {
        return Err(DecodeError::InvalidCamFileHeader);
    };
    let words: Vec<&str> = first.split_whitespace().collect();
    if words.len() < 2 || words[0] != "advancedfx" || words[1] != "Cam" {
        return Err(DecodeError::InvalidCamFileHeader);
    }

    let mut version = None;
    let mut scale_fov = "";
    loop {
        let Some((line_number, line)) = lines.next() else {
            // header never reached DATA
            return Err(DecodeError::InvalidCamFileHeader);
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["DATA", ..] => break,
            ["version", value, ..] => {
                version = Some(value.parse::<i32>().map_err(|_| DecodeError::InvalidNumber {
                    value: value.to_string(),
                    line: line_number,
                })?);
            }
            ["scaleFov", value, ..] => scale_fov = *value,
            _ => {}
        }
    }

    let version = version.unwrap_or(0);
    if !(1..=2).contains(&version) {
        return Err(DecodeError::UnsupportedCamVersion(version));
    }

    Ok(CamHeader {
        version,
        scale_fov: ScaleFov::parse(scale_fov)?,
    })
}

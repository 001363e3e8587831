use std::path::Path;

use crate::animation::CameraData;
use crate::config::ImportOptions;
use crate::convert::{Quat, Vec3};
use crate::dictionary::Dictionary;
use crate::error::{DecodeError, Result};
use crate::sink::{frame_range, AnimatedObject, ImportReport, ObjectKind, Scene};
use crate::skeleton::ModelImporter;
use crate::stream::ByteCursor;
use crate::time::TimeConverter;
use crate::tracker::{camera_update, EntityTracker};

pub const SUPPORTED_VERSION: i32 = 5;

const END_OF_BLOCK: &str = "/";

pub struct GameRecordImporter<'a> {
    options: &'a ImportOptions,
    importer: &'a mut dyn ModelImporter,
}

impl<'a> GameRecordImporter<'a> {
    pub fn new(options: &'a ImportOptions, importer: &'a mut dyn ModelImporter) -> Self {
        Self { options, importer }
    }

    pub fn import_file(&mut self, path: &Path) -> Result<Scene> {
        self.import(std::fs::read(path)?)
    }

    pub fn import(&mut self, data: Vec<u8>) -> Result<Scene> {
        let mut cursor = ByteCursor::new(data);
        let version = cursor.read_format_marker()?;
        if version != SUPPORTED_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        log::debug!("Game record version {}", version);

        let mut reader = RecordReader {
            options: self.options,
            cursor,
            dictionary: Dictionary::new(),
            time: TimeConverter::new(self.options.fps),
            tracker: EntityTracker::new(self.options, &mut *self.importer),
            camera: None,
        };
        reader.read_records()?;
        Ok(reader.finish())
    }
}

struct RecordReader<'a> {
    options: &'a ImportOptions,
    cursor: ByteCursor,
    dictionary: Dictionary,
    time: TimeConverter,
    tracker: EntityTracker<'a>,
    camera: Option<CameraData>,
}

impl RecordReader<'_> {
    fn read_records(&mut self) -> Result<()> {
        loop {
            let offset = self.cursor.position();
            let Some(node) = self.dictionary.read(&mut self.cursor)? else {
                break;
            };
            log::trace!("{} at {:#x}", node, offset);

            match node.as_str() {
                "afxFrame" => self.read_frame()?,
                "afxFrameEnd" => self.time.commit_frame_end(),
                "afxHidden" => {
                    // superseded by the table referenced from afxFrame
                    self.read_handles()?;
                }
                "deleted" => {
                    let handle = self.cursor.read_i32()?;
                    self.tracker.release(handle, self.time.current_output_time());
                }
                "entity_state" => self.read_entity_state()?,
                "afxCam" => self.read_camera()?,
                _ => return Err(DecodeError::UnknownRecordType { name: node, offset }),
            }
        }

        Ok(())
    }

    fn read_frame(&mut self) -> Result<()> {
        let delta = self.cursor.read_f32()?;
        self.time.advance_frame(f64::from(delta));

        let offset = self.cursor.read_i32()?;
        if offset == 0 {
            return Ok(());
        }

        let resume = self.cursor.position();
        let target = resume as i64 + i64::from(offset);
        let Ok(target) = u64::try_from(target) else {
            return Err(DecodeError::TruncatedStream(resume));
        };

        self.cursor.seek_to(target)?;
        let handles = self.read_handles()?;
        self.cursor.seek_to(resume)?;

        let time = self.time.current_output_time();
        for handle in handles {
            self.tracker.release(handle, time);
        }

        Ok(())
    }

    fn read_handles(&mut self) -> Result<Vec<i32>> {
        let count = self.cursor.read_i32()?;
        (0..count.max(0)).map(|_| self.cursor.read_i32()).collect()
    }

    fn read_entity_state(&mut self) -> Result<()> {
        let time = self.time.current_output_time();
        let handle = self.cursor.read_i32()?;
        let mut key = self.tracker.bound(handle);

        if self.dictionary.peek_equals(&mut self.cursor, "baseentity")? {
            let model = self.dictionary.expect(&mut self.cursor)?;
            let visible = self.cursor.read_bool()?;
            let origin = self.cursor.read_vector(true)?;
            let angles = self.cursor.read_angles()?;
            self.end_block()?;

            let bound = self.tracker.update_entity(handle, &model, visible, origin, angles, time);
            log::trace!("Handle {} -> {}", handle, self.tracker.model_handle(bound).name());
            key = Some(bound);
        }

        if self.dictionary.peek_equals(&mut self.cursor, "baseanimating")? {
            if self.dictionary.peek_equals(&mut self.cursor, "boneList")? {
                let bones = self.read_bones()?;
                if let Some(key) = key {
                    self.tracker.update_bones(key, &bones, time);
                }
            }
            self.end_block()?;
        }

        if self.dictionary.peek_equals(&mut self.cursor, "camera")? {
            let _third_person = self.cursor.read_bool()?;
            let sample = self.cursor.read_camera_sample()?;
            self.end_block()?;

            if let Some(key) = key {
                self.tracker.update_camera(key, sample.origin(), sample.angles(), sample.fov, time);
            }
        }

        self.end_block()
    }

    fn read_bones(&mut self) -> Result<Vec<(Vec3, Quat)>> {
        let count = self.cursor.read_i32()?;
        (0..count.max(0))
            .map(|_| -> Result<(Vec3, Quat)> {
                let bone = self.cursor.read_bone_sample()?;
                Ok((bone.translation(), bone.rotation()))
            })
            .collect()
    }

    fn read_camera(&mut self) -> Result<()> {
        let sample = self.cursor.read_camera_sample()?;

        let synthesize = self.options.inter_key;
        let camera = self.camera.get_or_insert_with(|| CameraData::new("afxCam", synthesize));
        let time = self.time.current_output_time();
        camera_update(self.options, camera, sample.origin(), sample.angles(), sample.fov, time);
        Ok(())
    }

    // blocks are closed by an optional "/" token
    fn end_block(&mut self) -> Result<()> {
        self.dictionary.peek_equals(&mut self.cursor, END_OF_BLOCK)?;
        Ok(())
    }

    fn finish(mut self) -> Scene {
        // a capture may stop without a trailing afxFrameEnd
        self.time.commit_frame_end();

        let interpolation = self.options.interpolation;
        let failed_models = self.tracker.failed_models().to_vec();
        log::debug!("{} model handles", self.tracker.num_model_handles());
        let mut objects = self.tracker.finish();
        if let Some(camera) = self.camera {
            objects.push(AnimatedObject {
                name: camera.name.clone(),
                kind: ObjectKind::Camera,
                curves: camera.into_curves(interpolation),
            });
        }

        let mismatch = self.time.mismatch();
        if let Some(mismatch) = &mismatch {
            log::warn!(
                "{} frames did not match {} fps (largest deviation {:+.1}%)",
                mismatch.count,
                self.time.fps(),
                mismatch.max_error * 100.0
            );
        }

        let (frame_start, frame_end) = frame_range(&objects, self.time.current_output_time());
        log::debug!("Imported {} objects over frames {} - {}", objects.len(), frame_start, frame_end);

        Scene {
            objects,
            report: ImportReport {
                frame_start,
                frame_end,
                frame_rate_mismatch: mismatch,
                failed_models,
            },
        }
    }
}

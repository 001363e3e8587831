#![allow(dead_code)]

use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::BinWriterExt;

use afx_record_import::stream::{BoneSample, CameraSample, FORMAT_MAGIC};

/// Builds game record streams the way the capture engine writes them.
pub struct RecordWriter {
    out: Cursor<Vec<u8>>,
    dictionary: Vec<String>,
    hidden_offset: Option<u64>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::with_version(5)
    }

    pub fn with_version(version: i32) -> Self {
        let mut out = Cursor::new(Vec::new());
        out.write_all(FORMAT_MAGIC).unwrap();
        out.write_le(&version).unwrap();
        Self {
            out,
            dictionary: Vec::new(),
            hidden_offset: None,
        }
    }

    pub fn token(&mut self, value: &str) -> &mut Self {
        match self.dictionary.iter().position(|entry| entry == value) {
            Some(index) => self.i32(index as i32),
            None => {
                self.dictionary.push(value.to_string());
                self.i32(-1);
                self.out.write_all(value.as_bytes()).unwrap();
                self.out.write_all(&[0]).unwrap();
                self
            }
        }
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.out.write_le(&value).unwrap();
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.out.write_le(&value).unwrap();
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.out.write_le(&u8::from(value)).unwrap();
        self
    }

    pub fn floats(&mut self, values: &[f32]) -> &mut Self {
        for value in values {
            self.f32(*value);
        }
        self
    }

    pub fn frame(&mut self, delta: f32) -> &mut Self {
        self.token("afxFrame").f32(delta).i32(0)
    }

    /// Starts a frame whose hidden entities are listed by a later [`RecordWriter::hidden`].
    pub fn frame_with_hidden(&mut self, delta: f32) -> &mut Self {
        self.token("afxFrame").f32(delta);
        self.hidden_offset = Some(self.out.position());
        self.i32(0)
    }

    pub fn hidden(&mut self, handles: &[i32]) -> &mut Self {
        self.token("afxHidden");
        let table = self.out.position();
        if let Some(placeholder) = self.hidden_offset.take() {
            let offset = table as i64 - (placeholder as i64 + 4);
            self.out.seek(SeekFrom::Start(placeholder)).unwrap();
            self.i32(offset as i32);
            self.out.seek(SeekFrom::Start(table)).unwrap();
        }

        self.i32(handles.len() as i32);
        for handle in handles {
            self.i32(*handle);
        }
        self
    }

    pub fn frame_end(&mut self) -> &mut Self {
        self.token("afxFrameEnd")
    }

    pub fn deleted(&mut self, handle: i32) -> &mut Self {
        self.token("deleted").i32(handle)
    }

    pub fn entity(&mut self, handle: i32) -> &mut Self {
        self.token("entity_state").i32(handle)
    }

    pub fn base_entity(&mut self, model: &str, visible: bool, origin: [f32; 3], angles: [f32; 3]) -> &mut Self {
        self.token("baseentity").token(model).bool(visible).floats(&origin).floats(&angles).token("/")
    }

    /// Bones as `(translation, [x, y, z, w])`.
    pub fn bones(&mut self, bones: &[([f32; 3], [f32; 4])]) -> &mut Self {
        self.token("baseanimating").token("boneList").i32(bones.len() as i32);
        for &(translation, rotation) in bones {
            self.out.write_le(&BoneSample { translation, rotation }).unwrap();
        }
        self.token("/")
    }

    pub fn entity_camera(&mut self, origin: [f32; 3], angles: [f32; 3], fov: f32) -> &mut Self {
        self.token("camera").bool(false).sample(origin, angles, fov).token("/")
    }

    pub fn end_entity(&mut self) -> &mut Self {
        self.token("/")
    }

    pub fn camera(&mut self, origin: [f32; 3], angles: [f32; 3], fov: f32) -> &mut Self {
        self.token("afxCam").sample(origin, angles, fov)
    }

    fn sample(&mut self, origin: [f32; 3], angles: [f32; 3], fov: f32) -> &mut Self {
        self.out.write_le(&CameraSample { origin, angles, fov }).unwrap();
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.out.get_ref().clone()
    }
}

pub const TWO_BONES: &str = r#"
[[bones]]
name = "pelvis"

[[bones]]
name = "spine"
parent = 0
translation = [0.0, 0.0, 10.0]
"#;

/// Writes a skeleton manifest where the TOML importer will look for `model`.
pub fn write_manifest(asset_root: &Path, model: &str, contents: &str) {
    let path = asset_root.join(model).with_extension("toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

pub fn keys(curve: &afx_record_import::animation::Curve) -> Vec<(f64, f32)> {
    curve.keyframes.iter().map(|k| (k.frame, k.value)).collect()
}

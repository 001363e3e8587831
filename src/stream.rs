use std::io::{Cursor, ErrorKind, Seek, SeekFrom};

use binrw::{binrw, BinReaderExt};

use crate::convert::{quake_quaternion, quake_vector, QAngle, Quat, Vec3};
use crate::error::{DecodeError, Result};

pub const FORMAT_MAGIC: &[u8; 14] = b"afxGameRecord\0";

/// Payload of an `afxCam` record and of an entity's `camera` block.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSample {
    pub origin: [f32; 3],
    pub angles: [f32; 3],
    pub fov: f32,
}

impl CameraSample {
    pub fn origin(&self) -> Vec3 {
        to_vector(self.origin, true)
    }

    pub fn angles(&self) -> QAngle {
        to_angles(self.angles)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneSample {
    pub translation: [f32; 3],
    /// `x, y, z, w`
    pub rotation: [f32; 4],
}

impl BoneSample {
    pub fn translation(&self) -> Vec3 {
        to_vector(self.translation, false)
    }

    pub fn rotation(&self) -> Quat {
        to_quaternion(self.rotation, false)
    }
}

fn to_vector([x, y, z]: [f32; 3], quake_format: bool) -> Vec3 {
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return Vec3::zeros();
    }

    if quake_format {
        quake_vector(x, y, z)
    } else {
        Vec3::new(x, y, z)
    }
}

fn to_angles([pitch, yaw, roll]: [f32; 3]) -> QAngle {
    if !(pitch.is_finite() && yaw.is_finite() && roll.is_finite()) {
        return QAngle::default();
    }

    QAngle::new(pitch, yaw, roll)
}

// non-finite or degenerate quaternions come back as identity
fn to_quaternion([x, y, z, w]: [f32; 4], quake_format: bool) -> Quat {
    if ![x, y, z, w].iter().all(|c| c.is_finite()) {
        return Quat::identity();
    }

    let q = if quake_format {
        quake_quaternion(w, x, y, z)
    } else {
        nalgebra::Quaternion::new(w, x, y, z)
    };

    Quat::try_new(q, f32::EPSILON).unwrap_or_else(Quat::identity)
}

fn truncated(error: binrw::Error, offset: u64) -> DecodeError {
    match error {
        binrw::Error::Io(e) if e.kind() != ErrorKind::UnexpectedEof => DecodeError::Io(e),
        _ => DecodeError::TruncatedStream(offset),
    }
}

#[derive(Debug)]
pub struct ByteCursor {
    inner: Cursor<Vec<u8>>,
    len: u64,
}

impl ByteCursor {
    pub fn new(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            inner: Cursor::new(data),
            len,
        }
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position())
    }

    // seeking past the end fails here instead of at the next read
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        if position > self.len {
            return Err(DecodeError::TruncatedStream(position));
        }

        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let offset = self.position();
        let value: u8 = self.inner.read_le().map_err(|e| truncated(e, offset))?;
        Ok(value != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let offset = self.position();
        self.inner.read_le().map_err(|e| truncated(e, offset))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let offset = self.position();
        self.inner.read_le().map_err(|e| truncated(e, offset))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let offset = self.position();
        self.inner.read_le().map_err(|e| truncated(e, offset))
    }

    pub fn read_cstring(&mut self) -> Result<String> {
        let offset = self.position();
        let mut bytes = Vec::new();
        loop {
            let byte: u8 = self.inner.read_le().map_err(|e| match e {
                binrw::Error::Io(e) if e.kind() != ErrorKind::UnexpectedEof => DecodeError::Io(e),
                _ => DecodeError::UnterminatedString(offset),
            })?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }

        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidEncoding(offset))
    }

    fn read_components<const N: usize>(&mut self) -> Result<[f32; N]> {
        let offset = self.position();
        self.inner.read_le().map_err(|e| truncated(e, offset))
    }

    pub fn read_vector(&mut self, quake_format: bool) -> Result<Vec3> {
        Ok(to_vector(self.read_components()?, quake_format))
    }

    pub fn read_angles(&mut self) -> Result<QAngle> {
        Ok(to_angles(self.read_components()?))
    }

    /// Reads `x, y, z, w`.
    pub fn read_quaternion(&mut self, quake_format: bool) -> Result<Quat> {
        Ok(to_quaternion(self.read_components()?, quake_format))
    }

    pub fn read_camera_sample(&mut self) -> Result<CameraSample> {
        let offset = self.position();
        self.inner.read_le().map_err(|e| truncated(e, offset))
    }

    pub fn read_bone_sample(&mut self) -> Result<BoneSample> {
        let offset = self.position();
        self.inner.read_le().map_err(|e| truncated(e, offset))
    }

    pub fn read_format_marker(&mut self) -> Result<i32> {
        let offset = self.position();
        let magic: [u8; 14] = self.inner.read_le().map_err(|e| match e {
            binrw::Error::Io(e) if e.kind() != ErrorKind::UnexpectedEof => DecodeError::Io(e),
            _ => DecodeError::BadMagic,
        })?;
        if &magic != FORMAT_MAGIC {
            log::debug!("Bad magic at {:#x}: {:?}", offset, magic);
            return Err(DecodeError::BadMagic);
        }

        self.read_i32()
    }
}

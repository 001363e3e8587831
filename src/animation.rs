use std::fmt;

use serde::{Deserialize, Serialize};

use crate::convert::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Constant,
    #[default]
    Linear,
    Bezier,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keyframe {
    pub frame: f64,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// 0 while visible, 1 while hidden.
    Visibility,
    Location(usize),
    /// Quaternion component, `w` first.
    Rotation(usize),
    BoneLocation { bone: String, index: usize },
    BoneRotation { bone: String, index: usize },
    Lens,
}

impl Channel {
    pub fn data_path(&self) -> String {
        match self {
            Self::Visibility => "hide_render".to_string(),
            Self::Location(_) => "location".to_string(),
            Self::Rotation(_) => "rotation_quaternion".to_string(),
            Self::BoneLocation { bone, .. } => format!("pose.bones[\"{}\"].location", bone),
            Self::BoneRotation { bone, .. } => format!("pose.bones[\"{}\"].rotation_quaternion", bone),
            Self::Lens => "lens".to_string(),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Visibility | Self::Lens => 0,
            Self::Location(index) | Self::Rotation(index) => *index,
            Self::BoneLocation { index, .. } | Self::BoneRotation { index, .. } => *index,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visibility | Self::Lens => write!(f, "{}", self.data_path()),
            _ => write!(f, "{}[{}]", self.data_path(), self.index()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub channel: Channel,
    pub interpolation: Interpolation,
    pub keyframes: Vec<Keyframe>,
}

pub trait Sample: Copy {
    const WIDTH: usize;

    fn component(&self, index: usize) -> f32;

    fn interpolate(&self, to: &Self, t: f32) -> Self;

    /// Chooses the representation of `self` closest to `previous`.
    fn align(self, _previous: Option<&Self>) -> Self {
        self
    }
}

impl Sample for f32 {
    const WIDTH: usize = 1;

    fn component(&self, _index: usize) -> f32 {
        *self
    }

    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Sample for Vec3 {
    const WIDTH: usize = 3;

    fn component(&self, index: usize) -> f32 {
        self[index]
    }

    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self.lerp(to, t)
    }
}

impl Sample for Quat {
    const WIDTH: usize = 4;

    fn component(&self, index: usize) -> f32 {
        match index {
            0 => self.w,
            1 => self.i,
            2 => self.j,
            _ => self.k,
        }
    }

    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self.try_slerp(to, t, 1.0e-6).unwrap_or(*to)
    }

    // q and -q are the same rotation; keep consecutive samples in the same hemisphere
    fn align(self, previous: Option<&Self>) -> Self {
        let flip = match previous {
            Some(previous) => self.coords.dot(&previous.coords) < 0.0,
            None => self.w < 0.0,
        };

        if flip {
            Quat::new_unchecked(-self.into_inner())
        } else {
            self
        }
    }
}

pub const MAX_SYNTHESIZED_GAP: f64 = 10_000.0;

/// Keyframe buffers for one value, fed through a single pending slot.
///
/// An update only becomes a keyframe once a later timestamp arrives (or the track is
/// flushed), so several updates within the same output time collapse into the last one.
#[derive(Debug, Clone)]
pub struct Track<T: Sample> {
    buffers: Vec<Vec<(f64, f32)>>,
    last: Option<(f64, T)>,
    pending: Option<(f64, T)>,
    synthesize: bool,
}

impl<T: Sample> Track<T> {
    pub fn new(synthesize: bool) -> Self {
        Self {
            buffers: vec![Vec::new(); T::WIDTH],
            last: None,
            pending: None,
            synthesize,
        }
    }

    pub fn update(&mut self, time: f64, value: T) {
        if let Some((pending_time, pending_value)) = self.pending {
            if pending_time < time {
                self.commit(pending_time, pending_value);
            }
        }

        self.pending = Some((time, value));
    }

    pub fn flush(&mut self) {
        if let Some((time, value)) = self.pending.take() {
            self.commit(time, value);
        }
    }

    /// Flushes and then writes a keyframe immediately, without interpolation.
    pub fn push(&mut self, time: f64, value: T) {
        self.flush();
        self.write(time, &value);
        self.last = Some((time, value));
    }

    fn commit(&mut self, time: f64, value: T) {
        let value = value.align(self.last.as_ref().map(|(_, previous)| previous));

        if self.synthesize {
            let gap = self.last.filter(|(last_time, _)| time - last_time <= MAX_SYNTHESIZED_GAP);
            if let Some((last_time, last_value)) = gap {
                let mut frame = last_time.floor() + 1.0;
                while frame < time {
                    let t = ((frame - last_time) / (time - last_time)) as f32;
                    let interpolated = last_value.interpolate(&value, t);
                    self.write(frame, &interpolated);
                    frame += 1.0;
                }
            }
        }

        self.write(time, &value);
        self.last = Some((time, value));
    }

    fn write(&mut self, time: f64, value: &T) {
        for (index, buffer) in self.buffers.iter_mut().enumerate() {
            buffer.push((time, value.component(index)));
        }
    }

    /// Converts the committed buffers into curves; anything still pending is dropped.
    pub fn into_curves(self, channel: impl Fn(usize) -> Channel, interpolation: Interpolation) -> Vec<Curve> {
        self.buffers
            .into_iter()
            .enumerate()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(index, buffer)| Curve {
                channel: channel(index),
                interpolation,
                keyframes: buffer.into_iter().map(|(frame, value)| Keyframe { frame, value }).collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CameraData {
    pub name: String,
    location: Track<Vec3>,
    rotation: Track<Quat>,
    lens: Track<f32>,
}

impl CameraData {
    pub fn new(name: impl Into<String>, synthesize: bool) -> Self {
        Self {
            name: name.into(),
            location: Track::new(synthesize),
            rotation: Track::new(synthesize),
            lens: Track::new(synthesize),
        }
    }

    pub fn update(&mut self, time: f64, location: Vec3, rotation: Quat, lens: f32) {
        self.location.update(time, location);
        self.rotation.update(time, rotation);
        self.lens.update(time, lens);
    }

    pub fn flush(&mut self) {
        self.location.flush();
        self.rotation.flush();
        self.lens.flush();
    }

    pub fn into_curves(mut self, interpolation: Interpolation) -> Vec<Curve> {
        self.flush();

        let mut curves = self.location.into_curves(Channel::Location, interpolation);
        curves.extend(self.rotation.into_curves(Channel::Rotation, interpolation));
        curves.extend(self.lens.into_curves(|_| Channel::Lens, interpolation));
        curves
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use proptest::prelude::*;

    use super::*;

    fn times<T: Sample>(track: &Track<T>) -> Vec<f64> {
        track.buffers[0].iter().map(|(time, _)| *time).collect()
    }

    #[test]
    fn updates_coalesce_until_time_advances() {
        let mut track = Track::new(false);
        track.update(1.0, 1.0f32);
        track.update(1.0, 2.0);
        assert!(track.buffers[0].is_empty());

        track.update(2.0, 3.0);
        assert_eq!(track.buffers[0], &[(1.0, 2.0)]);

        track.flush();
        assert_eq!(track.buffers[0], &[(1.0, 2.0), (2.0, 3.0)]);
    }

    #[test]
    fn synthesizes_integer_frames_between_samples() {
        let mut track = Track::new(true);
        track.update(2.0, 1.0f32);
        track.update(5.0, 4.0);
        track.flush();

        assert_eq!(times(&track), vec![2.0, 3.0, 4.0, 5.0]);
        for &(n, value) in &track.buffers[0] {
            let expected = 1.0 + (4.0 - 1.0) / (5.0 - 2.0) * (n as f32 - 2.0);
            assert!((value - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn huge_gaps_are_not_filled() {
        let mut track = Track::new(true);
        track.update(1.0, 0.0f32);
        track.update(1.0 + MAX_SYNTHESIZED_GAP, 1.0);
        track.update(2.0e6, 2.0);
        track.update(f64::INFINITY, 3.0);
        track.flush();

        assert_eq!(track.buffers[0].len(), MAX_SYNTHESIZED_GAP as usize + 3);
        assert_eq!(track.buffers[0].last(), Some(&(f64::INFINITY, 3.0)));
    }

    #[test]
    fn synthesis_skips_fractional_endpoints() {
        let mut track = Track::new(true);
        track.update(1.5, Vector3::new(0.0f32, 0.0, 0.0));
        track.update(3.5, Vector3::new(2.0, 4.0, 6.0));
        track.flush();

        assert_eq!(times(&track), vec![1.5, 2.0, 3.0, 3.5]);
        assert!((track.buffers[1][1].1 - 1.0).abs() < 1e-6);
        assert!((track.buffers[2][2].1 - 4.5).abs() < 1e-6);
    }

    #[test]
    fn push_bypasses_pending() {
        let mut track = Track::new(false);
        track.push(0.0, 1.0f32);
        track.update(1.0, 0.0);
        track.push(1.0, 1.0);
        assert_eq!(track.buffers[0], &[(0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]);
    }

    #[test]
    fn quaternion_sign_follows_previous() {
        let mut track = Track::new(false);
        let q = Quat::from_euler_angles(0.1, 0.2, 0.3);
        track.update(1.0, q);
        track.update(2.0, Quat::new_unchecked(-q.into_inner()));
        track.flush();

        assert_eq!(track.buffers[0][1].1, q.w);
        assert_eq!(track.buffers[1][1].1, q.i);
    }

    #[test]
    fn slerped_frames_stay_unit() {
        let mut track = Track::new(true);
        track.update(1.0, Quat::identity());
        track.update(4.0, Quat::from_euler_angles(0.0, 0.0, 1.5));
        track.flush();

        assert_eq!(times(&track), vec![1.0, 2.0, 3.0, 4.0]);
        for i in 0..4 {
            let norm: f32 = (0..4).map(|c| track.buffers[c][i].1.powi(2)).sum();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn camera_curves() {
        let mut camera = CameraData::new("afxCam", false);
        camera.update(1.0, Vector3::new(1.0, 2.0, 3.0), Quat::identity(), 18.0);
        camera.update(2.0, Vector3::new(1.0, 2.0, 3.0), Quat::identity(), 20.0);

        let curves = camera.into_curves(Interpolation::Linear);
        assert_eq!(curves.len(), 8);
        assert_eq!(curves[7].channel, Channel::Lens);
        assert_eq!(curves[7].keyframes, vec![Keyframe { frame: 1.0, value: 18.0 }, Keyframe { frame: 2.0, value: 20.0 }]);
        assert_eq!(curves[3].channel.to_string(), "rotation_quaternion[0]");
    }

    #[test]
    fn bone_channel_paths() {
        let channel = Channel::BoneRotation { bone: "spine".to_string(), index: 2 };
        assert_eq!(channel.to_string(), "pose.bones[\"spine\"].rotation_quaternion[2]");
        assert_eq!(Channel::Visibility.to_string(), "hide_render");
    }

    fn quaternion() -> impl Strategy<Value = Quat> {
        (-3.0f32..3.0, -3.0f32..3.0, -3.0f32..3.0).prop_map(|(r, p, y)| Quat::from_euler_angles(r, p, y))
    }

    fn committed(track: &Track<Quat>) -> Vec<[f32; 4]> {
        (0..track.buffers[0].len())
            .map(|i| [track.buffers[0][i].1, track.buffers[1][i].1, track.buffers[2][i].1, track.buffers[3][i].1])
            .collect()
    }

    proptest! {
        #[test]
        fn consecutive_rotations_never_flip(qs in prop::collection::vec(quaternion(), 1..30), synthesize in any::<bool>()) {
            let mut track = Track::new(synthesize);
            for (i, q) in qs.iter().enumerate() {
                track.update(i as f64 * 1.5, *q);
            }
            track.flush();

            let samples = committed(&track);
            for pair in samples.windows(2) {
                let dot: f32 = (0..4).map(|c| pair[0][c] * pair[1][c]).sum();
                prop_assert!(dot >= 0.0);
            }
        }

        #[test]
        fn negated_input_commits_the_same(qs in prop::collection::vec(quaternion(), 1..30), flips in prop::collection::vec(any::<bool>(), 30)) {
            let mut original = Track::new(false);
            let mut negated = Track::new(false);
            for (i, q) in qs.iter().enumerate() {
                original.update(i as f64, *q);
                let q = if flips[i] { Quat::new_unchecked(-q.into_inner()) } else { *q };
                negated.update(i as f64, q);
            }
            original.flush();
            negated.flush();

            prop_assert_eq!(committed(&original), committed(&negated));
        }
    }
}

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

pub type Vec3 = Vector3<f32>;
pub type Quat = UnitQuaternion<f32>;

/// Pitch/yaw/roll in degrees, as the capture engine stores them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QAngle {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl QAngle {
    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Yaw is applied outermost and roll innermost. Components are already in
    /// the target frame, which is why pitch lands on -X and roll on +Y.
    pub fn to_quaternion(&self) -> Quat {
        let pitch_h = 0.5 * self.pitch.to_radians();
        let q_pitch = Quat::new_unchecked(Quaternion::new(pitch_h.cos(), -pitch_h.sin(), 0.0, 0.0));

        let yaw_h = 0.5 * self.yaw.to_radians();
        let q_yaw = Quat::new_unchecked(Quaternion::new(yaw_h.cos(), 0.0, 0.0, yaw_h.sin()));

        let roll_h = 0.5 * self.roll.to_radians();
        let q_roll = Quat::new_unchecked(Quaternion::new(roll_h.cos(), 0.0, roll_h.sin(), 0.0));

        q_yaw * q_pitch * q_roll
    }
}

pub fn quake_vector(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(-y, x, z)
}

/// Quaternion counterpart of [`quake_vector`]; takes components in `(w, x, y, z)` order.
pub fn quake_quaternion(w: f32, x: f32, y: f32, z: f32) -> Quaternion<f32> {
    Quaternion::new(w, -y, x, z)
}

/// Quarter turn about Z that aligns the capture engine's world with the target's.
pub fn world_correction() -> Quat {
    Quat::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2)
}

/// Target cameras look down -Z; this turns them to look down +Y like the capture engine's.
pub fn camera_up_correction() -> Quat {
    let half = 0.5 * 90f32.to_radians();
    Quat::new_unchecked(Quaternion::new(half.cos(), half.sin(), 0.0, 0.0))
}

pub fn alien_swarm_fov_scaling(width: f32, height: f32, fov: f32) -> f32 {
    if height == 0.0 {
        return fov;
    }

    let engine_aspect_ratio = width / height;
    let default_aspect_ratio = 4.0 / 3.0;
    let ratio = engine_aspect_ratio / default_aspect_ratio;
    let t = ratio * (0.5 * fov).to_radians().tan();
    2.0 * t.atan().to_degrees()
}

pub fn fov_to_lens(sensor_width: f32, fov: f32) -> f32 {
    sensor_width / (2.0 * (fov.to_radians() / 2.0).tan())
}

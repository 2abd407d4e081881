use crate::scene::Bounds;
use glam::{Mat4, Vec3};

pub const WORLD_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT: f32 = 89.0;
const INITIAL_YAW: f32 = -90.0;
const INITIAL_PITCH: f32 = -20.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct CameraMovement {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub base_speed: f32,
    pub mouse_sensitivity: f32,
    pub fov_degrees: f32,
    pub near_plane: f32,
    pub far_plane_scale: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            base_speed: 100.0,
            mouse_sensitivity: 0.1,
            fov_degrees: 45.0,
            near_plane: 0.1,
            far_plane_scale: 10.0,
        }
    }
}

/// Free-fly camera. Angles are in degrees; the basis vectors are always
/// derived from yaw/pitch.
#[derive(Debug, Clone, Copy)]
pub struct CameraController {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    last_cursor: Option<(f64, f64)>,
    settings: CameraSettings,
}

impl CameraController {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: INITIAL_YAW,
            pitch: 0.0,
            last_cursor: None,
            settings,
        }
    }

    /// Places the camera behind and above the center so the whole box is in view.
    pub fn frame_bounds(&mut self, bounds: &Bounds) {
        let extent = bounds.max_extent();
        let extent = if extent > 0.0 { extent } else { 1.0 };
        let center = bounds.center();
        self.position = center + Vec3::new(0.0, extent * 0.3, extent * 0.8);
        self.yaw = INITIAL_YAW;
        self.pitch = INITIAL_PITCH;
    }

    /// Feeds an absolute cursor sample. The first sample after a reset only
    /// seeds the previous position.
    pub fn process_cursor(&mut self, x: f64, y: f64) {
        let Some((last_x, last_y)) = self.last_cursor.replace((x, y)) else {
            return;
        };
        let sensitivity = self.settings.mouse_sensitivity;
        let x_offset = (x - last_x) as f32 * sensitivity;
        // screen Y grows downward
        let y_offset = (last_y - y) as f32 * sensitivity;
        self.rotate(x_offset, y_offset);
    }

    pub fn reset_cursor(&mut self) {
        self.last_cursor = None;
    }

    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(WORLD_UP).normalize()
    }

    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        (self.front(), self.right(), WORLD_UP)
    }

    pub fn update_movement(&mut self, input: &CameraMovement, multiplier: f32, frame_dt: f32) -> bool {
        let speed = self.settings.base_speed * multiplier * frame_dt;
        let (front, right, _) = self.basis();
        let mut offset = Vec3::ZERO;

        if input.move_forward {
            offset += front;
        }
        if input.move_backward {
            offset -= front;
        }
        if input.move_left {
            offset -= right;
        }
        if input.move_right {
            offset += right;
        }

        if offset == Vec3::ZERO {
            return false;
        }
        self.position += offset * speed;
        true
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), WORLD_UP)
    }

    pub fn projection_matrix(&self, aspect: f32, scene_extent: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.settings.fov_degrees.to_radians(),
            aspect,
            self.settings.near_plane,
            self.far_plane(scene_extent),
        )
    }

    /// Scales with the scene so it always exceeds the content depth.
    pub fn far_plane(&self, scene_extent: f32) -> f32 {
        let near = self.settings.near_plane;
        (scene_extent * self.settings.far_plane_scale).max(near * 100.0)
    }
}

/// Discrete speed multiplier, advanced once per press of the modifier key.
#[derive(Debug, Clone)]
pub struct SpeedSelector {
    multipliers: Vec<f32>,
    index: usize,
    was_down: bool,
}

impl SpeedSelector {
    pub fn new(multipliers: Vec<f32>) -> Self {
        let multipliers = if multipliers.is_empty() {
            vec![1.0]
        } else {
            multipliers
        };
        Self {
            multipliers,
            index: 0,
            was_down: false,
        }
    }

    /// Returns true when this sample is a press-edge and the index advanced.
    pub fn update(&mut self, key_down: bool) -> bool {
        let pressed = key_down && !self.was_down;
        self.was_down = key_down;
        if pressed {
            self.index = (self.index + 1) % self.multipliers.len();
        }
        pressed
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn multiplier(&self) -> f32 {
        self.multipliers[self.index]
    }
}

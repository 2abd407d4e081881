use crate::render::CameraMovement;
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub speed_cycle: bool,
    pub reload: bool,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) {
        match key {
            PhysicalKey::Code(KeyCode::KeyW) => self.move_forward = pressed,
            PhysicalKey::Code(KeyCode::KeyS) => self.move_backward = pressed,
            PhysicalKey::Code(KeyCode::KeyA) => self.move_left = pressed,
            PhysicalKey::Code(KeyCode::KeyD) => self.move_right = pressed,
            PhysicalKey::Code(KeyCode::ShiftLeft) => self.speed_cycle = pressed,
            PhysicalKey::Code(KeyCode::F1) => self.reload = pressed,
            _ => {}
        }
    }

    /// Forgets held keys, e.g. after focus moved to a dialog.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn movement(&self) -> CameraMovement {
        CameraMovement {
            move_forward: self.move_forward,
            move_backward: self.move_backward,
            move_left: self.move_left,
            move_right: self.move_right,
        }
    }
}

/// Detects the released-to-pressed transition of a polled key.
#[derive(Default, Debug, Clone, Copy)]
pub struct KeyEdge {
    was_down: bool,
}

impl KeyEdge {
    pub fn update(&mut self, down: bool) -> bool {
        let pressed = down && !self.was_down;
        self.was_down = down;
        pressed
    }
}

/// Accumulates raw mouse motion into an unbounded virtual cursor position.
#[derive(Default, Debug, Clone, Copy)]
pub struct VirtualCursor {
    x: f64,
    y: f64,
}

impl VirtualCursor {
    pub fn apply(&mut self, delta: (f64, f64)) -> (f64, f64) {
        self.x += delta.0;
        self.y += delta.1;
        (self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasd_maps_to_movement() {
        let mut input = InputState::default();
        input.handle_key(PhysicalKey::Code(KeyCode::KeyW), true);
        input.handle_key(PhysicalKey::Code(KeyCode::KeyD), true);
        input.handle_key(PhysicalKey::Code(KeyCode::KeyQ), true);
        let movement = input.movement();
        assert!(movement.move_forward && movement.move_right);
        assert!(!movement.move_backward && !movement.move_left);

        input.handle_key(PhysicalKey::Code(KeyCode::KeyW), false);
        assert!(!input.movement().move_forward);
    }

    #[test]
    fn clear_releases_everything() {
        let mut input = InputState::default();
        input.handle_key(PhysicalKey::Code(KeyCode::F1), true);
        input.handle_key(PhysicalKey::Code(KeyCode::ShiftLeft), true);
        input.clear();
        assert!(!input.reload && !input.speed_cycle);
    }

    #[test]
    fn key_edge_fires_once_per_press() {
        let mut edge = KeyEdge::default();
        let fired: Vec<bool> = [false, true, true, true, false, true]
            .into_iter()
            .map(|down| edge.update(down))
            .collect();
        assert_eq!(fired, vec![false, true, false, false, false, true]);
    }

    #[test]
    fn virtual_cursor_accumulates() {
        let mut cursor = VirtualCursor::default();
        cursor.apply((3.0, -2.0));
        assert_eq!(cursor.apply((1.5, 4.0)), (4.5, 2.0));
    }
}

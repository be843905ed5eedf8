//! Interactive move and resize
//!
//! A three-state drag machine: Idle, Moving, Resizing. Entering a drag
//! grabs the pointer; motion updates the target; release or target
//! destruction ends it in a single transition back to Idle. The geometry
//! math is pure; grabs and ungrabs bracket it.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::shared::Geometry;
use crate::wm::hints::NormalHints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Moving {
        window: Window,
        /// Pointer position at grab time, root coordinates.
        start_x: i32,
        start_y: i32,
        /// Frame origin at grab time.
        orig_x: i32,
        orig_y: i32,
    },
    Resizing {
        window: Window,
        start_x: i32,
        start_y: i32,
        /// Client size at grab time.
        orig_w: u32,
        orig_h: u32,
        /// Which grip started the drag; the left grip also moves x.
        from_left: bool,
        orig_frame_x: i32,
    },
}

#[derive(Debug)]
pub struct DragController {
    pub state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self { state: DragState::Idle }
    }
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    /// The client being dragged, if a drag is active.
    pub fn target(&self) -> Option<Window> {
        match self.state {
            DragState::Idle => None,
            DragState::Moving { window, .. } | DragState::Resizing { window, .. } => Some(window),
        }
    }

    /// Enter Moving. Refused while another drag is active.
    pub fn begin_move(
        &mut self,
        conn: &RustConnection,
        root: Window,
        window: Window,
        frame: &Geometry,
        pointer_x: i32,
        pointer_y: i32,
    ) -> Result<bool> {
        if !self.is_idle() {
            return Ok(false);
        }
        if !self.grab_pointer(conn, root)? {
            return Ok(false);
        }
        debug!("move drag start on 0x{:x}", window);
        self.state = DragState::Moving {
            window,
            start_x: pointer_x,
            start_y: pointer_y,
            orig_x: frame.x,
            orig_y: frame.y,
        };
        Ok(true)
    }

    /// Enter Resizing from one of the grips.
    pub fn begin_resize(
        &mut self,
        conn: &RustConnection,
        root: Window,
        window: Window,
        frame: &Geometry,
        client_w: u32,
        client_h: u32,
        pointer_x: i32,
        pointer_y: i32,
        from_left: bool,
    ) -> Result<bool> {
        if !self.is_idle() {
            return Ok(false);
        }
        if !self.grab_pointer(conn, root)? {
            return Ok(false);
        }
        debug!("resize drag start on 0x{:x} (left grip: {})", window, from_left);
        self.state = DragState::Resizing {
            window,
            start_x: pointer_x,
            start_y: pointer_y,
            orig_w: client_w,
            orig_h: client_h,
            from_left,
            orig_frame_x: frame.x,
        };
        Ok(true)
    }

    /// Pure motion step: the frame position / client size the current
    /// pointer position asks for. None while Idle.
    pub fn motion(
        &self,
        pointer_x: i32,
        pointer_y: i32,
        hints: &NormalHints,
    ) -> Option<DragUpdate> {
        match self.state {
            DragState::Idle => None,
            DragState::Moving { window, start_x, start_y, orig_x, orig_y } => {
                Some(DragUpdate::Position {
                    window,
                    x: orig_x + (pointer_x - start_x),
                    y: orig_y + (pointer_y - start_y),
                })
            }
            DragState::Resizing {
                window,
                start_x,
                start_y,
                orig_w,
                orig_h,
                from_left,
                orig_frame_x,
            } => {
                let dx = pointer_x - start_x;
                let dy = pointer_y - start_y;
                let raw_w = if from_left {
                    orig_w as i64 - dx as i64
                } else {
                    orig_w as i64 + dx as i64
                };
                let raw_h = orig_h as i64 + dy as i64;
                let (w, h) = hints.clamp(raw_w.max(1) as u32, raw_h.max(1) as u32);
                let x = if from_left {
                    orig_frame_x + (orig_w as i64 - w as i64) as i32
                } else {
                    orig_frame_x
                };
                Some(DragUpdate::Size { window, x, width: w, height: h })
            }
        }
    }

    /// Normal exit: release the grab and return to Idle. Returns the
    /// window that was being dragged.
    pub fn finish(&mut self, conn: &RustConnection) -> Result<Option<Window>> {
        let target = self.target();
        if target.is_some() {
            conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
            debug!("drag finished on {:?}", target);
        }
        self.state = DragState::Idle;
        Ok(target)
    }

    /// Target-destroyed exit: if `window` is the drag target, drop to Idle
    /// in a single transition. Pure half; the caller ungrabs when this
    /// returns true.
    pub fn cancel_if_target(&mut self, window: Window) -> bool {
        if self.target() == Some(window) {
            self.state = DragState::Idle;
            true
        } else {
            false
        }
    }

    fn grab_pointer(&self, conn: &RustConnection, root: Window) -> Result<bool> {
        let reply = conn
            .grab_pointer(
                false,
                root,
                EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            )?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }
}

/// What a motion step wants applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragUpdate {
    Position { window: Window, x: i32, y: i32 },
    Size { window: Window, x: i32, width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> NormalHints {
        NormalHints::fallback(1920, 1080)
    }

    #[test]
    fn idle_motion_is_nothing() {
        let drag = DragController::new();
        assert!(drag.motion(500, 500, &hints()).is_none());
    }

    #[test]
    fn moving_tracks_the_pointer_delta() {
        let mut drag = DragController::new();
        drag.state = DragState::Moving {
            window: 7,
            start_x: 100,
            start_y: 100,
            orig_x: 50,
            orig_y: 60,
        };
        assert_eq!(
            drag.motion(130, 90, &hints()),
            Some(DragUpdate::Position { window: 7, x: 80, y: 50 })
        );
    }

    #[test]
    fn resizing_respects_size_increments() {
        let mut drag = DragController::new();
        let mut h = hints();
        h.width_inc = 8;
        h.height_inc = 16;
        h.min_width = 32;
        h.min_height = 32;
        drag.state = DragState::Resizing {
            window: 7,
            start_x: 0,
            start_y: 0,
            orig_w: 320,
            orig_h: 240,
            from_left: false,
            orig_frame_x: 10,
        };
        let Some(DragUpdate::Size { width, height, x, .. }) = drag.motion(13, 21, &h) else {
            panic!("expected a size update");
        };
        assert_eq!(width % 8, 0);
        assert_eq!(height % 16, 0);
        assert_eq!(x, 10);
    }

    #[test]
    fn left_grip_resize_moves_the_frame() {
        let mut drag = DragController::new();
        drag.state = DragState::Resizing {
            window: 7,
            start_x: 200,
            start_y: 0,
            orig_w: 300,
            orig_h: 200,
            from_left: true,
            orig_frame_x: 100,
        };
        // Pointer moved 40 left: window grows 40, frame shifts 40 left.
        let Some(DragUpdate::Size { width, x, .. }) = drag.motion(160, 0, &hints()) else {
            panic!("expected a size update");
        };
        assert_eq!(width, 340);
        assert_eq!(x, 60);
    }

    #[test]
    fn destroy_of_the_target_cancels_in_one_step() {
        let mut drag = DragController::new();
        drag.state = DragState::Moving {
            window: 7,
            start_x: 0,
            start_y: 0,
            orig_x: 0,
            orig_y: 0,
        };
        assert!(drag.cancel_if_target(7));
        assert!(drag.is_idle());
    }

    #[test]
    fn destroy_of_another_window_leaves_the_drag_alone() {
        let mut drag = DragController::new();
        drag.state = DragState::Moving {
            window: 7,
            start_x: 0,
            start_y: 0,
            orig_x: 0,
            orig_y: 0,
        };
        assert!(!drag.cancel_if_target(8));
        assert_eq!(drag.target(), Some(7));
    }
}

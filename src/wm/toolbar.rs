//! Toolbar
//!
//! The full-width bar at a screen edge: current workspace name, previous/
//! next workspace buttons, an icon-list button and a clock. The bar sits
//! at the very back of the global stack and reserves a strut that
//! maximized windows honor.

use anyhow::Result;
use chrono::Local;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::{ColorConfig, ToolbarConfig};
use crate::shared::Geometry;
use crate::wm::decorations::{self, TextGc};
use crate::wm::registry::ToolbarRegion;

const TOOLBAR_HEIGHT: u16 = 24;
const BUTTON_WIDTH: u16 = 20;
const LABEL_WIDTH: u16 = 140;
const CLOCK_WIDTH: u16 = 110;

#[derive(Debug)]
pub struct Toolbar {
    pub frame: Window,
    pub workspace_label: Window,
    pub prev_button: Window,
    pub next_button: Window,
    pub icon_button: Window,
    pub clock: Window,
    clock_format: String,
    geometry: Geometry,
    workspace_name: String,
}

impl Toolbar {
    /// Build and map the bar at the configured edge.
    pub fn create(
        conn: &RustConnection,
        screen: &Screen,
        config: &ToolbarConfig,
        colors: &ColorConfig,
    ) -> Result<Self> {
        let width = screen.width_in_pixels;
        let y = if config.placement == "top" {
            0
        } else {
            screen.height_in_pixels as i32 - TOOLBAR_HEIGHT as i32
        };
        let geometry = Geometry::new(0, y, width as u32, TOOLBAR_HEIGHT as u32);

        let frame = conn.generate_id()?;
        conn.create_window(
            screen.root_depth,
            frame,
            screen.root,
            0,
            y as i16,
            width,
            TOOLBAR_HEIGHT,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(colors.toolbar)
                .override_redirect(1)
                .event_mask(EventMask::BUTTON_PRESS | EventMask::EXPOSURE),
        )?;

        let sub = |x: i16, w: u16| -> Result<Window> {
            let id = conn.generate_id()?;
            conn.create_window(
                screen.root_depth,
                id,
                frame,
                x,
                2,
                w,
                TOOLBAR_HEIGHT - 4,
                0,
                WindowClass::INPUT_OUTPUT,
                0,
                &CreateWindowAux::new()
                    .background_pixel(colors.toolbar)
                    .event_mask(EventMask::BUTTON_PRESS | EventMask::EXPOSURE),
            )?;
            Ok(id)
        };

        let mut x = 4i16;
        let prev_button = sub(x, BUTTON_WIDTH)?;
        x += BUTTON_WIDTH as i16 + 2;
        let workspace_label = sub(x, LABEL_WIDTH)?;
        x += LABEL_WIDTH as i16 + 2;
        let next_button = sub(x, BUTTON_WIDTH)?;
        x += BUTTON_WIDTH as i16 + 8;
        let icon_button = sub(x, BUTTON_WIDTH)?;
        let clock = sub(width as i16 - CLOCK_WIDTH as i16 - 4, CLOCK_WIDTH)?;

        conn.map_subwindows(frame)?;
        conn.map_window(frame)?;
        debug!("toolbar at y={} ({}x{})", y, width, TOOLBAR_HEIGHT);

        Ok(Self {
            frame,
            workspace_label,
            prev_button,
            next_button,
            icon_button,
            clock,
            clock_format: config.clock_format.clone(),
            geometry,
            workspace_name: String::new(),
        })
    }

    /// Region handles for registry bookkeeping.
    pub fn handles(&self) -> Vec<(Window, ToolbarRegion)> {
        vec![
            (self.frame, ToolbarRegion::Frame),
            (self.workspace_label, ToolbarRegion::WorkspaceLabel),
            (self.prev_button, ToolbarRegion::PrevWorkspace),
            (self.next_button, ToolbarRegion::NextWorkspace),
            (self.icon_button, ToolbarRegion::IconList),
            (self.clock, ToolbarRegion::Clock),
        ]
    }

    /// Screen area left over for maximized windows once the bar's strut is
    /// subtracted.
    pub fn available_area(&self, screen_w: u32, screen_h: u32) -> Geometry {
        let height = screen_h.saturating_sub(self.geometry.height);
        if self.geometry.y == 0 {
            Geometry::new(0, self.geometry.height as i32, screen_w, height)
        } else {
            Geometry::new(0, 0, screen_w, height)
        }
    }

    pub fn set_workspace_name(&mut self, name: &str) {
        self.workspace_name = name.to_string();
    }

    /// Repaint the workspace label, buttons and clock.
    pub fn draw(&self, conn: &RustConnection, text_gc: &TextGc) -> Result<()> {
        let baseline = decorations::text_baseline(TOOLBAR_HEIGHT - 4);
        let text = |window: Window, text: &str| -> Result<()> {
            conn.clear_area(false, window, 0, 0, 0, 0)?;
            let bytes: Vec<u8> = text.bytes().take(255).collect();
            if !bytes.is_empty() {
                conn.image_text8(window, text_gc.unfocused, 4, baseline, &bytes)?;
            }
            Ok(())
        };
        text(self.prev_button, "<")?;
        text(self.next_button, ">")?;
        text(self.icon_button, "=")?;
        text(self.workspace_label, &self.workspace_name)?;
        self.draw_clock(conn, text_gc)?;
        Ok(())
    }

    /// Redraw only the clock; called once per tick.
    pub fn draw_clock(&self, conn: &RustConnection, text_gc: &TextGc) -> Result<()> {
        let now = Local::now().format(&self.clock_format).to_string();
        conn.clear_area(false, self.clock, 0, 0, 0, 0)?;
        let bytes: Vec<u8> = now.bytes().take(255).collect();
        conn.image_text8(
            self.clock,
            text_gc.unfocused,
            4,
            decorations::text_baseline(TOOLBAR_HEIGHT - 4),
            &bytes,
        )?;
        Ok(())
    }

    pub fn destroy(&self, conn: &RustConnection) -> Result<()> {
        conn.destroy_window(self.frame)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_at(y: i32) -> Toolbar {
        Toolbar {
            frame: 1,
            workspace_label: 2,
            prev_button: 3,
            next_button: 4,
            icon_button: 5,
            clock: 6,
            clock_format: "%H:%M".into(),
            geometry: Geometry::new(0, y, 1920, TOOLBAR_HEIGHT as u32),
            workspace_name: String::new(),
        }
    }

    #[test]
    fn bottom_bar_reserves_the_bottom_strut() {
        let bar = bar_at(1080 - TOOLBAR_HEIGHT as i32);
        let avail = bar.available_area(1920, 1080);
        assert_eq!(avail, Geometry::new(0, 0, 1920, 1080 - TOOLBAR_HEIGHT as u32));
    }

    #[test]
    fn top_bar_pushes_the_area_down() {
        let bar = bar_at(0);
        let avail = bar.available_area(1920, 1080);
        assert_eq!(
            avail,
            Geometry::new(0, TOOLBAR_HEIGHT as i32, 1920, 1080 - TOOLBAR_HEIGHT as u32)
        );
    }
}

//! Icons
//!
//! One small labeled widget per iconified client, lined up along the
//! bottom-left of the screen, plus the entry list backing the icon menu.
//! An icon exists exactly while its client is Iconic; restoring or
//! destroying the client destroys the widget.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::ColorConfig;
use crate::wm::decorations::{self, TextGc};

const ICON_WIDTH: u16 = 120;
const ICON_HEIGHT: u16 = 20;
const ICON_GAP: i32 = 4;

#[derive(Debug, Clone)]
pub struct IconEntry {
    /// The iconified client this stands for.
    pub client: Window,
    /// The widget window.
    pub handle: Window,
    pub label: String,
}

/// Owns every icon widget on screen.
#[derive(Debug, Default)]
pub struct IconManager {
    entries: Vec<IconEntry>,
}

impl IconManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and map the widget for a freshly iconified client. The
    /// caller has already hidden the client's frame.
    pub fn create_icon(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        colors: &ColorConfig,
        client: Window,
        label: &str,
    ) -> Result<Window> {
        let handle = conn.generate_id()?;
        let slot = self.entries.len() as i32;
        let x = ICON_GAP + slot * (ICON_WIDTH as i32 + ICON_GAP);
        let y = screen.height_in_pixels as i32 - ICON_HEIGHT as i32 - ICON_GAP;
        conn.create_window(
            screen.root_depth,
            handle,
            screen.root,
            x as i16,
            y as i16,
            ICON_WIDTH,
            ICON_HEIGHT,
            1,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(colors.menu)
                .border_pixel(colors.frame_border)
                .override_redirect(1)
                .event_mask(EventMask::BUTTON_PRESS | EventMask::EXPOSURE),
        )?;
        conn.map_window(handle)?;
        debug!("icon 0x{:x} for client 0x{:x} ({})", handle, client, label);
        self.entries.push(IconEntry {
            client,
            handle,
            label: label.to_string(),
        });
        Ok(handle)
    }

    /// Destroy the widget for a client. Returns its handle so the caller
    /// can unregister it; None when the client has no icon.
    pub fn destroy_icon(
        &mut self,
        conn: &RustConnection,
        client: Window,
    ) -> Result<Option<Window>> {
        let Some(index) = self.entries.iter().position(|e| e.client == client) else {
            return Ok(None);
        };
        let entry = self.entries.remove(index);
        conn.destroy_window(entry.handle)?;
        // Close the gap left in the row.
        for (slot, entry) in self.entries.iter().enumerate().skip(index) {
            let x = ICON_GAP + slot as i32 * (ICON_WIDTH as i32 + ICON_GAP);
            conn.configure_window(entry.handle, &ConfigureWindowAux::new().x(x))?;
        }
        Ok(Some(entry.handle))
    }

    /// The client behind an icon widget.
    pub fn client_for(&self, handle: Window) -> Option<Window> {
        self.entries.iter().find(|e| e.handle == handle).map(|e| e.client)
    }

    pub fn entries(&self) -> &[IconEntry] {
        &self.entries
    }

    /// Repaint one widget's label.
    pub fn draw(
        &self,
        conn: &RustConnection,
        text_gc: &TextGc,
        handle: Window,
    ) -> Result<()> {
        if let Some(entry) = self.entries.iter().find(|e| e.handle == handle) {
            conn.clear_area(false, handle, 0, 0, 0, 0)?;
            let bytes: Vec<u8> = entry.label.bytes().take(255).collect();
            if !bytes.is_empty() {
                conn.image_text8(
                    handle,
                    text_gc.unfocused,
                    4,
                    decorations::text_baseline(ICON_HEIGHT),
                    &bytes,
                )?;
            }
        }
        Ok(())
    }
}

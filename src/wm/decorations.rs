//! Window decorations
//!
//! Frame and decoration sub-window management: which widgets a frame
//! offers, where they sit for a given client size, and the pixmaps behind
//! them. Texture rasterization itself is an external collaborator behind
//! [`TextureRenderer`]; the core only holds the returned pixmap handles
//! and releases them when they leave the screen.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::{ColorConfig, DecorConfig};
use crate::shared::Geometry;

/// Texture descriptor handed to the renderer. The core never interprets
/// the kind; it only forwards it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextureKind {
    #[default]
    Flat,
    Raised,
    Sunken,
    HorizontalGradient,
    VerticalGradient,
    DiagonalGradient,
}

/// Renders a decoration pixmap for (size, texture, colors). Pure function
/// of its inputs; the returned pixmap is owned by the caller.
pub trait TextureRenderer {
    fn render(
        &self,
        conn: &RustConnection,
        screen: &Screen,
        width: u16,
        height: u16,
        texture: TextureKind,
        primary: u32,
        secondary: u32,
    ) -> Result<Pixmap>;

    /// The inverted/pressed variant, used while a button is held.
    fn render_pressed(
        &self,
        conn: &RustConnection,
        screen: &Screen,
        width: u16,
        height: u16,
        texture: TextureKind,
        primary: u32,
        secondary: u32,
    ) -> Result<Pixmap> {
        // Default pressed variant swaps the color pair.
        self.render(conn, screen, width, height, texture, secondary, primary)
    }
}

/// Fallback renderer: a plain fill with the primary color. Also the
/// degraded mode when a themed renderer fails to allocate.
pub struct SolidRenderer;

impl TextureRenderer for SolidRenderer {
    fn render(
        &self,
        conn: &RustConnection,
        screen: &Screen,
        width: u16,
        height: u16,
        _texture: TextureKind,
        primary: u32,
        _secondary: u32,
    ) -> Result<Pixmap> {
        let pixmap = conn.generate_id()?;
        conn.create_pixmap(screen.root_depth, pixmap, screen.root, width, height)?;
        let gc = conn.generate_id()?;
        conn.create_gc(gc, pixmap, &CreateGCAux::new().foreground(primary))?;
        conn.poly_fill_rectangle(
            pixmap,
            gc,
            &[Rectangle { x: 0, y: 0, width, height }],
        )?;
        conn.free_gc(gc)?;
        Ok(pixmap)
    }
}

/// Which widgets a frame offers. Decided once at adoption from the
/// client's hints, re-decided when the hints change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorLayout {
    pub titlebar: bool,
    pub handle: bool,
    pub iconify_button: bool,
    pub maximize_button: bool,
    pub close_button: bool,
}

impl DecorLayout {
    /// Full decorations, trimmed down by the hints: fixed-size windows get
    /// no resize handle or maximize button, the close button is only
    /// offered when the client speaks WM_DELETE_WINDOW, and Motif hints
    /// can turn everything off.
    pub fn from_hints(decorated: bool, fixed_size: bool, has_delete: bool) -> Self {
        if !decorated {
            return Self {
                titlebar: false,
                handle: false,
                iconify_button: false,
                maximize_button: false,
                close_button: false,
            };
        }
        Self {
            titlebar: true,
            handle: !fixed_size,
            iconify_button: true,
            maximize_button: !fixed_size,
            close_button: has_delete,
        }
    }
}

/// Decoration thickness around the client area for a given layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameExtents {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl FrameExtents {
    pub fn compute(layout: &DecorLayout, cfg: &DecorConfig) -> Self {
        let border = cfg.border_width as u32;
        Self {
            top: border + if layout.titlebar { cfg.titlebar_height as u32 } else { 0 },
            bottom: border + if layout.handle { cfg.handle_height as u32 } else { 0 },
            left: border,
            right: border,
        }
    }
}

/// Outer frame size for a client size, and back.
pub fn frame_size(extents: &FrameExtents, client_w: u32, client_h: u32) -> (u32, u32) {
    (
        client_w + extents.left + extents.right,
        client_h + extents.top + extents.bottom,
    )
}

pub fn client_size(extents: &FrameExtents, frame_w: u32, frame_h: u32) -> (u32, u32) {
    (
        frame_w.saturating_sub(extents.left + extents.right).max(1),
        frame_h.saturating_sub(extents.top + extents.bottom).max(1),
    )
}

/// Outer frame height while shaded: the title bar alone.
pub fn shaded_height(layout: &DecorLayout, cfg: &DecorConfig) -> u32 {
    if layout.titlebar {
        cfg.titlebar_height as u32 + 2 * cfg.border_width as u32
    } else {
        2 * cfg.border_width as u32
    }
}

/// What a reconfigure request amounts to, relative to the current frame
/// geometry. Decoration pixmaps are regenerated only for `resized`;
/// a pure move synthesizes a ConfigureNotify instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconfigurePlan {
    pub moved: bool,
    pub resized: bool,
}

pub fn plan_reconfigure(old: &Geometry, new: &Geometry) -> ReconfigurePlan {
    ReconfigurePlan {
        moved: new.x != old.x || new.y != old.y,
        resized: new.width != old.width || new.height != old.height,
    }
}

/// The X windows making up one frame. Handles only; every one of them is
/// registered in the window registry under the owning client.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameWindows {
    pub frame: Window,
    pub titlebar: Option<Window>,
    pub label: Option<Window>,
    pub iconify_button: Option<Window>,
    pub maximize_button: Option<Window>,
    pub close_button: Option<Window>,
    pub handle: Option<Window>,
    pub left_grip: Option<Window>,
    pub right_grip: Option<Window>,
}

impl FrameWindows {
    /// Create the frame and its sub-windows and reparent the client into
    /// it. Nothing is mapped here; showing is a separate lifecycle step.
    /// The whole construction runs under a server grab at the call site so
    /// no other client observes a half-built frame.
    pub fn create(
        conn: &RustConnection,
        screen: &Screen,
        client: Window,
        geometry: &Geometry,
        layout: &DecorLayout,
        cfg: &DecorConfig,
        colors: &ColorConfig,
    ) -> Result<Self> {
        let extents = FrameExtents::compute(layout, cfg);
        let frame = conn.generate_id()?;
        conn.create_window(
            screen.root_depth,
            frame,
            screen.root,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width as u16,
            geometry.height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(colors.frame)
                .border_pixel(colors.frame_border)
                .override_redirect(1)
                .event_mask(
                    EventMask::SUBSTRUCTURE_REDIRECT
                        | EventMask::SUBSTRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON_MOTION
                        | EventMask::ENTER_WINDOW,
                ),
        )?;

        let mut windows = Self { frame, ..Self::default() };

        let sub = |parent: Window,
                   x: i16,
                   y: i16,
                   w: u16,
                   h: u16,
                   background: u32|
         -> Result<Window> {
            let id = conn.generate_id()?;
            conn.create_window(
                screen.root_depth,
                id,
                parent,
                x,
                y,
                w.max(1),
                h.max(1),
                0,
                WindowClass::INPUT_OUTPUT,
                0,
                &CreateWindowAux::new()
                    .background_pixel(background)
                    .event_mask(
                        EventMask::BUTTON_PRESS
                            | EventMask::BUTTON_RELEASE
                            | EventMask::BUTTON_MOTION
                            | EventMask::EXPOSURE,
                    ),
            )?;
            Ok(id)
        };

        let border = cfg.border_width as i16;
        let inner_w = geometry.width.saturating_sub(2 * cfg.border_width as u32) as u16;

        if layout.titlebar {
            let titlebar = sub(
                frame,
                border,
                border,
                inner_w,
                cfg.titlebar_height,
                colors.title_unfocused,
            )?;
            windows.titlebar = Some(titlebar);

            let button = cfg.button_size();
            let pad = cfg.bevel_width as i16;
            let mut right_edge = inner_w as i16 - pad;

            if layout.close_button {
                right_edge -= button as i16;
                windows.close_button = Some(sub(
                    titlebar,
                    right_edge,
                    pad,
                    button,
                    button,
                    colors.button,
                )?);
                right_edge -= pad;
            }
            if layout.maximize_button {
                right_edge -= button as i16;
                windows.maximize_button = Some(sub(
                    titlebar,
                    right_edge,
                    pad,
                    button,
                    button,
                    colors.button,
                )?);
                right_edge -= pad;
            }

            let mut left_edge = pad;
            if layout.iconify_button {
                windows.iconify_button = Some(sub(
                    titlebar,
                    left_edge,
                    pad,
                    button,
                    button,
                    colors.button,
                )?);
                left_edge += button as i16 + pad;
            }

            let label_w = (right_edge - left_edge).max(1) as u16;
            windows.label = Some(sub(
                titlebar,
                left_edge,
                pad,
                label_w,
                cfg.titlebar_height.saturating_sub(2 * cfg.bevel_width),
                colors.title_unfocused,
            )?);
        }

        if layout.handle {
            let handle_y = geometry.height.saturating_sub(
                cfg.handle_height as u32 + cfg.border_width as u32,
            ) as i16;
            let grip = cfg.grip_width;
            windows.left_grip = Some(sub(
                frame,
                border,
                handle_y,
                grip,
                cfg.handle_height,
                colors.grip,
            )?);
            windows.handle = Some(sub(
                frame,
                border + grip as i16,
                handle_y,
                inner_w.saturating_sub(2 * grip),
                cfg.handle_height,
                colors.handle,
            )?);
            windows.right_grip = Some(sub(
                frame,
                inner_w as i16 + border - grip as i16,
                handle_y,
                grip,
                cfg.handle_height,
                colors.grip,
            )?);
        }

        conn.change_save_set(SetMode::INSERT, client)?;
        conn.reparent_window(client, frame, extents.left as i16, extents.top as i16)?;
        conn.change_window_attributes(
            client,
            &ChangeWindowAttributesAux::new()
                .event_mask(EventMask::PROPERTY_CHANGE | EventMask::FOCUS_CHANGE),
        )?;

        Ok(windows)
    }

    /// Every handle of this frame, for registry bookkeeping.
    pub fn handles(&self) -> Vec<Window> {
        let mut out = vec![self.frame];
        for handle in [
            self.titlebar,
            self.label,
            self.iconify_button,
            self.maximize_button,
            self.close_button,
            self.handle,
            self.left_grip,
            self.right_grip,
        ]
        .into_iter()
        .flatten()
        {
            out.push(handle);
        }
        out
    }

    /// Re-lay the sub-windows out for a new outer frame size.
    pub fn apply_layout(
        &self,
        conn: &RustConnection,
        layout: &DecorLayout,
        cfg: &DecorConfig,
        frame_w: u32,
        frame_h: u32,
    ) -> Result<()> {
        let border = cfg.border_width as u32;
        let inner_w = frame_w.saturating_sub(2 * border);

        if let Some(titlebar) = self.titlebar {
            conn.configure_window(titlebar, &ConfigureWindowAux::new().width(inner_w))?;
        }

        let button = cfg.button_size() as i32;
        let pad = cfg.bevel_width as i32;
        let mut right_edge = inner_w as i32 - pad;

        if let Some(close) = self.close_button {
            right_edge -= button;
            conn.configure_window(close, &ConfigureWindowAux::new().x(right_edge))?;
            right_edge -= pad;
        }
        if let Some(maximize) = self.maximize_button {
            right_edge -= button;
            conn.configure_window(maximize, &ConfigureWindowAux::new().x(right_edge))?;
            right_edge -= pad;
        }

        let mut left_edge = pad;
        if self.iconify_button.is_some() {
            left_edge += button + pad;
        }
        if let Some(label) = self.label {
            let label_w = (right_edge - left_edge).max(1) as u32;
            conn.configure_window(label, &ConfigureWindowAux::new().width(label_w))?;
        }

        if layout.handle {
            let handle_y = frame_h.saturating_sub(cfg.handle_height as u32 + border) as i32;
            let grip = cfg.grip_width as u32;
            if let Some(left_grip) = self.left_grip {
                conn.configure_window(left_grip, &ConfigureWindowAux::new().y(handle_y))?;
            }
            if let Some(handle) = self.handle {
                conn.configure_window(
                    handle,
                    &ConfigureWindowAux::new()
                        .y(handle_y)
                        .width(inner_w.saturating_sub(2 * grip).max(1)),
                )?;
            }
            if let Some(right_grip) = self.right_grip {
                conn.configure_window(
                    right_grip,
                    &ConfigureWindowAux::new()
                        .x((inner_w + border - grip) as i32)
                        .y(handle_y),
                )?;
            }
        }

        Ok(())
    }

    /// Reparent the client back to the root and destroy the frame tree.
    pub fn destroy(&self, conn: &RustConnection, client: Window, root: Window) -> Result<()> {
        conn.change_save_set(SetMode::DELETE, client)?;
        conn.reparent_window(client, root, 0, 0)?;
        conn.destroy_window(self.frame)?;
        Ok(())
    }
}

/// Focused/unfocused title pixmaps plus a generation counter so callers
/// can tell when a regeneration actually happened.
#[derive(Debug, Default)]
pub struct DecorPixmaps {
    pub focused: Option<Pixmap>,
    pub unfocused: Option<Pixmap>,
    pub generation: u32,
}

impl DecorPixmaps {
    /// Re-render both variants for a new titlebar size. On allocation
    /// failure the old pixmaps are released and the frame falls back to
    /// its solid background; never fatal.
    pub fn regenerate(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        renderer: &dyn TextureRenderer,
        width: u16,
        height: u16,
        texture: TextureKind,
        colors: &ColorConfig,
    ) -> Result<()> {
        self.release(conn)?;
        self.generation = self.generation.wrapping_add(1);

        match renderer.render(conn, screen, width, height, texture, colors.title_focused, colors.title_focused_to) {
            Ok(pixmap) => self.focused = Some(pixmap),
            Err(err) => warn!("title pixmap allocation failed, using solid fill: {err:#}"),
        }
        match renderer.render(conn, screen, width, height, texture, colors.title_unfocused, colors.title_unfocused_to) {
            Ok(pixmap) => self.unfocused = Some(pixmap),
            Err(err) => warn!("title pixmap allocation failed, using solid fill: {err:#}"),
        }
        Ok(())
    }

    /// Point the titlebar at the variant for the given focus state.
    pub fn apply(
        &self,
        conn: &RustConnection,
        titlebar: Window,
        focused: bool,
    ) -> Result<()> {
        let pixmap = if focused { self.focused } else { self.unfocused };
        if let Some(pixmap) = pixmap {
            conn.change_window_attributes(
                titlebar,
                &ChangeWindowAttributesAux::new().background_pixmap(pixmap),
            )?;
        }
        conn.clear_area(false, titlebar, 0, 0, 0, 0)?;
        Ok(())
    }

    pub fn release(&mut self, conn: &RustConnection) -> Result<()> {
        if let Some(pixmap) = self.focused.take() {
            conn.free_pixmap(pixmap)?;
        }
        if let Some(pixmap) = self.unfocused.take() {
            conn.free_pixmap(pixmap)?;
        }
        Ok(())
    }
}

/// Shared text GCs for titlebar and widget labels, one per focus state.
/// Created once at startup against the root; X text GCs are reusable
/// across same-depth drawables.
#[derive(Debug, Clone, Copy)]
pub struct TextGc {
    pub focused: Gcontext,
    pub unfocused: Gcontext,
}

impl TextGc {
    pub fn create(conn: &RustConnection, screen: &Screen, colors: &ColorConfig) -> Result<Self> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"fixed")?;

        let focused = conn.generate_id()?;
        conn.create_gc(
            focused,
            screen.root,
            &CreateGCAux::new()
                .foreground(colors.text_focused)
                .background(colors.title_focused)
                .font(font),
        )?;
        let unfocused = conn.generate_id()?;
        conn.create_gc(
            unfocused,
            screen.root,
            &CreateGCAux::new()
                .foreground(colors.text_unfocused)
                .background(colors.title_unfocused)
                .font(font),
        )?;
        conn.close_font(font)?;
        Ok(Self { focused, unfocused })
    }
}

// Metrics of the server-side "fixed" font the text GCs open.
const FONT_ASCENT: i16 = 11;
const FONT_DESCENT: i16 = 2;

/// Baseline that vertically centers the fixed font in a row of the given
/// height.
pub fn text_baseline(height: u16) -> i16 {
    (height as i16 + FONT_ASCENT - FONT_DESCENT) / 2
}

/// Clear a label sub-window and draw its text left-aligned. image_text8
/// carries at most 255 bytes, so longer titles are cut.
pub fn draw_label(
    conn: &RustConnection,
    gc: Gcontext,
    label: Window,
    text: &str,
    cfg: &DecorConfig,
) -> Result<()> {
    conn.clear_area(false, label, 0, 0, 0, 0)?;
    let bytes: Vec<u8> = text.bytes().take(255).collect();
    if !bytes.is_empty() {
        let height = cfg.titlebar_height.saturating_sub(2 * cfg.bevel_width);
        conn.image_text8(
            label,
            gc,
            cfg.bevel_width as i16,
            text_baseline(height),
            &bytes,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecorConfig;

    fn cfg() -> DecorConfig {
        DecorConfig::default()
    }

    #[test]
    fn extents_follow_the_layout() {
        let cfg = cfg();
        let full = DecorLayout::from_hints(true, false, true);
        let extents = FrameExtents::compute(&full, &cfg);
        assert_eq!(extents.top, cfg.border_width as u32 + cfg.titlebar_height as u32);
        assert_eq!(extents.bottom, cfg.border_width as u32 + cfg.handle_height as u32);

        let bare = DecorLayout::from_hints(false, false, true);
        let extents = FrameExtents::compute(&bare, &cfg);
        assert_eq!(extents.top, cfg.border_width as u32);
        assert_eq!(extents.bottom, cfg.border_width as u32);
    }

    #[test]
    fn frame_and_client_size_are_inverse() {
        let cfg = cfg();
        let layout = DecorLayout::from_hints(true, false, true);
        let extents = FrameExtents::compute(&layout, &cfg);
        let (fw, fh) = frame_size(&extents, 640, 480);
        assert_eq!(client_size(&extents, fw, fh), (640, 480));
    }

    #[test]
    fn fixed_size_windows_lose_handle_and_maximize() {
        let layout = DecorLayout::from_hints(true, true, true);
        assert!(layout.titlebar);
        assert!(!layout.handle);
        assert!(!layout.maximize_button);
        assert!(layout.close_button);
    }

    #[test]
    fn close_button_requires_delete_protocol() {
        let layout = DecorLayout::from_hints(true, false, false);
        assert!(!layout.close_button);
    }

    #[test]
    fn text_baseline_tracks_the_row_height() {
        assert_eq!(text_baseline(20), 14);
        // Taller rows push the baseline down, keeping the text centered.
        assert!(text_baseline(40) > text_baseline(20));
        assert!(text_baseline(13) <= 13);
    }

    #[test]
    fn reconfigure_plan_distinguishes_move_from_resize() {
        let old = Geometry::new(10, 10, 300, 200);

        let moved = plan_reconfigure(&old, &Geometry::new(50, 60, 300, 200));
        assert!(moved.moved && !moved.resized);

        let resized = plan_reconfigure(&old, &Geometry::new(10, 10, 400, 200));
        assert!(!resized.moved && resized.resized);

        let both = plan_reconfigure(&old, &Geometry::new(0, 0, 400, 300));
        assert!(both.moved && both.resized);

        let neither = plan_reconfigure(&old, &old.clone());
        assert!(!neither.moved && !neither.resized);
    }
}

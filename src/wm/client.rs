//! Client window state machine
//!
//! One `ClientWindow` per managed application window: its frame and
//! decoration handles, ICCCM state flags, size constraints, focus model
//! and transient linkage. Lifecycle operations are split into pure state
//! transitions (`begin_*`, testable without a server) and the X side that
//! applies them. Cross-window concerns (transient recursion, focus
//! exclusivity, stacking) are driven from the session, which owns all
//! clients.
//!
//! State machine: Withdrawn -> {Normal, Iconic}, with Normal orthogonally
//! decorated by Focused/Shaded/Maximized. The terminal state is
//! destruction, at which point every handle is unregistered and the
//! object dropped.

use std::collections::HashMap;

use anyhow::Result;
use bitflags::bitflags;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::{Config, DecorConfig};
use crate::shared::Geometry;
use crate::wm::atoms::{Atoms, WmStateValue};
use crate::wm::decorations::{
    self, DecorLayout, DecorPixmaps, FrameExtents, FrameWindows, ReconfigurePlan, TextGc,
    TextureRenderer,
};
use crate::wm::hints::{self, FocusModel, NormalHints, Protocols, WmHints};

bitflags! {
    /// Independent state booleans. Combinations are kept consistent by the
    /// transition methods: ICONIC and VISIBLE are mutually exclusive, and
    /// FOCUSED is held by at most one client process-wide (enforced by the
    /// session).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientFlags: u32 {
        const VISIBLE      = 1 << 0;
        const ICONIC       = 1 << 1;
        const TRANSIENT    = 1 << 2;
        const FOCUSED      = 1 << 3;
        const SHADED       = 1 << 4;
        const MAXIMIZED    = 1 << 5;
        const MENU_VISIBLE = 1 << 6;
    }
}

/// Everything read from the client at adoption time, bundled so the
/// constructor stays conn-free and testable.
#[derive(Debug, Clone, Copy)]
pub struct AdoptedHints {
    pub normal: NormalHints,
    pub protocols: Protocols,
    pub focus_model: FocusModel,
    pub initial_iconic: bool,
}

#[derive(Debug)]
pub struct ClientWindow {
    /// The application's window. Immutable for the life of this object.
    pub window: Window,
    /// Manager-created frame and decoration handles.
    pub frame: FrameWindows,
    pub layout: DecorLayout,
    pub flags: ClientFlags,
    /// Outer frame rectangle in its unshaded form. While SHADED the frame
    /// on screen is titlebar-high, but this stays the logical geometry so
    /// maximize/restore and unshade work from stable numbers.
    pub frame_geometry: Geometry,
    /// Pre-maximize geometry; present exactly while MAXIMIZED.
    pub restore_geometry: Option<Geometry>,
    pub normal_hints: NormalHints,
    pub protocols: Protocols,
    pub focus_model: FocusModel,
    /// Backward link to the window this one is transient for. Weak: a
    /// plain id, never ownership.
    pub transient_for: Option<Window>,
    /// Forward link to our transient, if any.
    pub transient: Option<Window>,
    /// Workspace membership: exactly one workspace at a time.
    pub workspace: usize,
    /// Slot unique within the workspace; menu index 0 is window number 0.
    pub window_number: usize,
    pub title: String,
    pub icon_title: String,
    /// Whether WM_HINTS asked to start in the Iconic state. Consulted once
    /// at the first map request.
    pub initial_iconic: bool,
    pub pixmaps: DecorPixmaps,
    /// Re-entrancy guard so a transient pair cannot raise/lower each other
    /// forever.
    pub(crate) stack_guard: bool,
}

impl ClientWindow {
    /// Conn-free constructor; `adopt` does the X side first and then
    /// builds the object through here.
    pub fn new(
        window: Window,
        frame: FrameWindows,
        layout: DecorLayout,
        frame_geometry: Geometry,
        hints: AdoptedHints,
        transient_for: Option<Window>,
        workspace: usize,
    ) -> Self {
        let mut flags = ClientFlags::empty();
        if transient_for.is_some() {
            flags |= ClientFlags::TRANSIENT;
        }
        Self {
            window,
            frame,
            layout,
            flags,
            frame_geometry,
            restore_geometry: None,
            normal_hints: hints.normal,
            protocols: hints.protocols,
            focus_model: hints.focus_model,
            transient_for,
            transient: None,
            workspace,
            window_number: 0,
            title: String::new(),
            icon_title: String::new(),
            initial_iconic: hints.initial_iconic,
            pixmaps: DecorPixmaps::default(),
            stack_guard: false,
        }
    }

    // ------------------------------------------------------------------
    // Pure state transitions
    // ------------------------------------------------------------------

    pub fn visible(&self) -> bool {
        self.flags.contains(ClientFlags::VISIBLE)
    }

    pub fn iconic(&self) -> bool {
        self.flags.contains(ClientFlags::ICONIC)
    }

    pub fn focused(&self) -> bool {
        self.flags.contains(ClientFlags::FOCUSED)
    }

    pub fn shaded(&self) -> bool {
        self.flags.contains(ClientFlags::SHADED)
    }

    pub fn maximized(&self) -> bool {
        self.flags.contains(ClientFlags::MAXIMIZED)
    }

    /// Enter Iconic. Returns false when already iconic (no-op).
    pub fn begin_iconify(&mut self) -> bool {
        if self.iconic() {
            return false;
        }
        self.flags.remove(ClientFlags::VISIBLE | ClientFlags::FOCUSED);
        self.flags.insert(ClientFlags::ICONIC);
        true
    }

    /// Leave Iconic (or Withdrawn) for Normal. Returns false when already
    /// Normal; deiconifying a visible window is an explicit no-op.
    pub fn begin_deiconify(&mut self) -> bool {
        if self.visible() && !self.iconic() {
            return false;
        }
        self.flags.remove(ClientFlags::ICONIC);
        self.flags.insert(ClientFlags::VISIBLE);
        true
    }

    /// Enter Withdrawn: neither visible nor iconic.
    pub fn begin_withdraw(&mut self) {
        self.flags
            .remove(ClientFlags::VISIBLE | ClientFlags::ICONIC | ClientFlags::FOCUSED);
    }

    /// Focus-flag half of focus handling: pure state, no server calls.
    pub fn set_focus_state(&mut self, focused: bool) {
        self.flags.set(ClientFlags::FOCUSED, focused);
    }

    /// Decoration thickness for the current layout.
    pub fn extents(&self, cfg: &DecorConfig) -> FrameExtents {
        FrameExtents::compute(&self.layout, cfg)
    }

    /// The client-area rectangle derived from the frame rectangle.
    pub fn client_area(&self, cfg: &DecorConfig) -> Geometry {
        let extents = self.extents(cfg);
        let (w, h) = decorations::client_size(
            &extents,
            self.frame_geometry.width,
            self.frame_geometry.height,
        );
        Geometry::new(
            self.frame_geometry.x + extents.left as i32,
            self.frame_geometry.y + extents.top as i32,
            w,
            h,
        )
    }

    /// Compute the maximized frame geometry: fill `avail` (screen minus
    /// the toolbar strut), with the client size rounded to its resize
    /// increment. Pure; `maximize` applies it.
    pub fn maximized_geometry(&self, avail: &Geometry, cfg: &DecorConfig) -> Geometry {
        let extents = self.extents(cfg);
        let (max_client_w, max_client_h) = decorations::client_size(
            &extents,
            avail.width,
            avail.height,
        );
        let (w, h) = self.normal_hints.clamp(max_client_w, max_client_h);
        let (frame_w, frame_h) = decorations::frame_size(&extents, w, h);
        Geometry::new(avail.x, avail.y, frame_w, frame_h)
    }

    /// Remember the current geometry and switch to the maximized one.
    /// Returns the new frame geometry, or None when already maximized.
    pub fn begin_maximize(&mut self, avail: &Geometry, cfg: &DecorConfig) -> Option<Geometry> {
        if self.maximized() {
            return None;
        }
        let target = self.maximized_geometry(avail, cfg);
        self.restore_geometry = Some(self.frame_geometry);
        self.frame_geometry = target;
        self.flags.insert(ClientFlags::MAXIMIZED);
        Some(target)
    }

    /// Return to the exact remembered geometry. None when not maximized
    /// (internal bookkeeping race; treated as a silent no-op upstream).
    pub fn begin_restore(&mut self) -> Option<Geometry> {
        if !self.maximized() {
            return None;
        }
        self.flags.remove(ClientFlags::MAXIMIZED);
        let restored = self.restore_geometry.take()?;
        self.frame_geometry = restored;
        Some(restored)
    }

    // ------------------------------------------------------------------
    // Adoption
    // ------------------------------------------------------------------

    /// Adopt a top-level window: read its hints, decide the decoration
    /// layout, build the frame and reparent the client into it. Returns
    /// None when the window should not be managed (override-redirect or
    /// already gone). The caller brackets this in a server grab.
    pub fn adopt(
        conn: &RustConnection,
        screen: &Screen,
        atoms: &Atoms,
        config: &Config,
        window: Window,
        workspace: usize,
    ) -> Result<Option<Self>> {
        let attrs = match conn.get_window_attributes(window)?.reply() {
            Ok(attrs) => attrs,
            Err(_) => {
                debug!("window 0x{:x} vanished before adoption", window);
                return Ok(None);
            }
        };
        if attrs.override_redirect {
            debug!("window 0x{:x} is override-redirect, not managing", window);
            return Ok(None);
        }
        let geom = match conn.get_geometry(window)?.reply() {
            Ok(geom) => geom,
            Err(_) => {
                debug!("window 0x{:x} vanished before adoption", window);
                return Ok(None);
            }
        };

        let screen_w = screen.width_in_pixels as u32;
        let screen_h = screen.height_in_pixels as u32;
        let normal = NormalHints::read(conn, window, screen_w, screen_h)?;
        let wm_hints = WmHints::read(conn, window)?;
        let protocols = hints::read_protocols(conn, atoms, window)?;
        let transient_for = hints::read_transient_for(conn, window)?;
        let decorated = hints::motif_wants_decorations(conn, atoms, window)?.unwrap_or(true);

        let focus_model = FocusModel::derive(
            wm_hints.input,
            protocols.contains(Protocols::TAKE_FOCUS),
        );
        let layout = DecorLayout::from_hints(
            decorated,
            normal.fixed_size(),
            protocols.contains(Protocols::DELETE_WINDOW),
        );

        let extents = FrameExtents::compute(&layout, &config.decor);
        let (client_w, client_h) = normal.clamp(geom.width as u32, geom.height as u32);
        let (frame_w, frame_h) = decorations::frame_size(&extents, client_w, client_h);

        // Clients with a position hint keep it; the rest are centered.
        let (x, y) = if normal.user_position {
            (
                geom.x as i32 - extents.left as i32,
                geom.y as i32 - extents.top as i32,
            )
        } else {
            (
                (screen_w as i32 - frame_w as i32) / 2,
                (screen_h as i32 - frame_h as i32) / 2,
            )
        };
        let frame_geometry = Geometry::new(x, y, frame_w, frame_h);

        let frame = FrameWindows::create(
            conn,
            screen,
            window,
            &frame_geometry,
            &layout,
            &config.decor,
            &config.colors,
        )?;
        if client_w != geom.width as u32 || client_h != geom.height as u32 {
            conn.configure_window(
                window,
                &ConfigureWindowAux::new().width(client_w).height(client_h),
            )?;
        }

        let adopted = AdoptedHints {
            normal,
            protocols,
            focus_model,
            initial_iconic: wm_hints.initial_iconic,
        };
        let mut client = Self::new(
            window,
            frame,
            layout,
            frame_geometry,
            adopted,
            transient_for,
            workspace,
        );
        client.title = hints::read_text_property(conn, window, AtomEnum::WM_NAME.into())?
            .unwrap_or_else(|| String::from("Unnamed"));
        client.icon_title = hints::read_text_property(conn, window, AtomEnum::WM_ICON_NAME.into())?
            .unwrap_or_else(|| client.title.clone());

        debug!(
            "adopted window 0x{:x} ({:?}) at {:?}, focus model {:?}",
            window, client.title, frame_geometry, focus_model
        );
        Ok(Some(client))
    }

    // ------------------------------------------------------------------
    // Lifecycle operations (X side)
    // ------------------------------------------------------------------

    /// Show the frame and client and publish NormalState.
    pub fn show(&mut self, conn: &RustConnection, atoms: &Atoms) -> Result<()> {
        self.begin_deiconify();
        conn.map_subwindows(self.frame.frame)?;
        conn.map_window(self.frame.frame)?;
        atoms.publish_wm_state(conn, self.window, WmStateValue::Normal)?;
        Ok(())
    }

    /// Unmap the frame and publish the given state. Used by iconify,
    /// withdraw and workspace switches.
    pub fn hide(&mut self, conn: &RustConnection, atoms: &Atoms, state: WmStateValue) -> Result<()> {
        conn.unmap_window(self.frame.frame)?;
        atoms.publish_wm_state(conn, self.window, state)?;
        Ok(())
    }

    /// MapRequest handler: honored only for a window that is already
    /// Normal (visible and not iconic); publishes NormalState and shows
    /// the decorations.
    pub fn handle_map_request(&mut self, conn: &RustConnection, atoms: &Atoms) -> Result<bool> {
        if !self.visible() || self.iconic() {
            return Ok(false);
        }
        conn.map_subwindows(self.frame.frame)?;
        conn.map_window(self.frame.frame)?;
        atoms.publish_wm_state(conn, self.window, WmStateValue::Normal)?;
        Ok(true)
    }

    /// Publish WithdrawnState and unmap; no destruction.
    pub fn withdraw(&mut self, conn: &RustConnection, atoms: &Atoms) -> Result<()> {
        self.begin_withdraw();
        self.hide(conn, atoms, WmStateValue::Withdrawn)
    }

    /// Ask the client to close itself. A client that does not speak
    /// WM_DELETE_WINDOW is left alone; the manager never destroys a window
    /// that didn't ask for it.
    pub fn close(&self, conn: &RustConnection, atoms: &Atoms) -> Result<()> {
        if self.protocols.contains(Protocols::DELETE_WINDOW) {
            atoms.send_delete_window(conn, self.window)?;
        } else {
            debug!(
                "window 0x{:x} does not support WM_DELETE_WINDOW, close ignored",
                self.window
            );
        }
        Ok(())
    }

    /// Shade: collapse the frame to the titlebar height. The client's own
    /// size is untouched; only the frame's outer height changes.
    pub fn shade(&mut self, conn: &RustConnection, cfg: &DecorConfig) -> Result<()> {
        if self.shaded() || !self.layout.titlebar {
            return Ok(());
        }
        self.flags.insert(ClientFlags::SHADED);
        let height = decorations::shaded_height(&self.layout, cfg);
        conn.configure_window(self.frame.frame, &ConfigureWindowAux::new().height(height))?;
        Ok(())
    }

    /// Unshade: back to the full decorated height.
    pub fn unshade(&mut self, conn: &RustConnection) -> Result<()> {
        if !self.shaded() {
            return Ok(());
        }
        self.flags.remove(ClientFlags::SHADED);
        conn.configure_window(
            self.frame.frame,
            &ConfigureWindowAux::new().height(self.frame_geometry.height),
        )?;
        Ok(())
    }

    /// Swap decoration pixmaps between the focused and unfocused variants
    /// and redraw the title. Never requests input focus itself.
    pub fn set_focus_flag(
        &mut self,
        conn: &RustConnection,
        text_gc: &TextGc,
        cfg: &DecorConfig,
        focused: bool,
    ) -> Result<()> {
        self.set_focus_state(focused);
        if let Some(titlebar) = self.frame.titlebar {
            self.pixmaps.apply(conn, titlebar, focused)?;
        }
        self.draw_title(conn, text_gc, cfg)?;
        Ok(())
    }

    /// Redraw the title text in the label sub-window.
    pub fn draw_title(
        &self,
        conn: &RustConnection,
        text_gc: &TextGc,
        cfg: &DecorConfig,
    ) -> Result<()> {
        if let Some(label) = self.frame.label {
            let gc = if self.focused() { text_gc.focused } else { text_gc.unfocused };
            decorations::draw_label(conn, gc, label, &self.title, cfg)?;
        }
        Ok(())
    }

    /// Try to move input focus here, honoring the focus model. Returns
    /// whether focus was actually transferred, so focus cycling can skip
    /// windows that refuse input.
    pub fn set_input_focus(
        &self,
        conn: &RustConnection,
        atoms: &Atoms,
        time: Timestamp,
    ) -> Result<bool> {
        match self.focus_model {
            FocusModel::NoInput => Ok(false),
            FocusModel::GloballyActive => {
                // The client decides; we only offer.
                atoms.send_take_focus(conn, self.window, time)?;
                Ok(false)
            }
            FocusModel::Passive => {
                conn.set_input_focus(InputFocus::POINTER_ROOT, self.window, time)?;
                Ok(true)
            }
            FocusModel::LocallyActive => {
                conn.set_input_focus(InputFocus::POINTER_ROOT, self.window, time)?;
                atoms.send_take_focus(conn, self.window, time)?;
                Ok(true)
            }
        }
    }

    /// Reconfigure to a new frame position and client size. Clamps to the
    /// size constraints, re-lays the decorations out, and regenerates the
    /// decoration pixmaps only when the size actually changed. A pure move
    /// synthesizes a ConfigureNotify so the client learns its new root
    /// position.
    pub fn reconfigure(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        renderer: &dyn TextureRenderer,
        atoms: &Atoms,
        config: &Config,
        x: i32,
        y: i32,
        client_w: u32,
        client_h: u32,
    ) -> Result<ReconfigurePlan> {
        let extents = self.extents(&config.decor);
        let (client_w, client_h) = self.normal_hints.clamp(client_w, client_h);
        let (frame_w, frame_h) = decorations::frame_size(&extents, client_w, client_h);
        let target = Geometry::new(x, y, frame_w, frame_h);

        let plan = decorations::plan_reconfigure(&self.frame_geometry, &target);
        if !plan.moved && !plan.resized {
            return Ok(plan);
        }
        self.frame_geometry = target;

        if plan.resized {
            let outer_h = if self.shaded() {
                decorations::shaded_height(&self.layout, &config.decor)
            } else {
                frame_h
            };
            conn.configure_window(
                self.frame.frame,
                &ConfigureWindowAux::new()
                    .x(x)
                    .y(y)
                    .width(frame_w)
                    .height(outer_h),
            )?;
            self.frame
                .apply_layout(conn, &self.layout, &config.decor, frame_w, frame_h)?;
            conn.configure_window(
                self.window,
                &ConfigureWindowAux::new().width(client_w).height(client_h),
            )?;
            self.regenerate_pixmaps(conn, screen, renderer, config)?;
        } else {
            conn.configure_window(self.frame.frame, &ConfigureWindowAux::new().x(x).y(y))?;
            // Some clients need an explicit notification when only the
            // position changed.
            let area = self.client_area(&config.decor);
            atoms.send_synthetic_configure(
                conn,
                self.window,
                area.x,
                area.y,
                area.width,
                area.height,
            )?;
        }

        Ok(plan)
    }

    /// Maximize into `avail`, remembering the current geometry.
    pub fn maximize(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        renderer: &dyn TextureRenderer,
        atoms: &Atoms,
        config: &Config,
        avail: &Geometry,
    ) -> Result<()> {
        if self.maximized() {
            return Ok(());
        }
        // Compute before mutating flags so reconfigure diffs against the
        // old geometry.
        let target = self.maximized_geometry(avail, &config.decor);
        self.restore_geometry = Some(self.frame_geometry);
        self.flags.insert(ClientFlags::MAXIMIZED);
        let extents = self.extents(&config.decor);
        let (client_w, client_h) =
            decorations::client_size(&extents, target.width, target.height);
        self.reconfigure(
            conn, screen, renderer, atoms, config, target.x, target.y, client_w, client_h,
        )?;
        Ok(())
    }

    /// Restore the exact pre-maximize geometry.
    pub fn restore(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        renderer: &dyn TextureRenderer,
        atoms: &Atoms,
        config: &Config,
    ) -> Result<()> {
        if !self.maximized() {
            return Ok(());
        }
        self.flags.remove(ClientFlags::MAXIMIZED);
        let Some(restored) = self.restore_geometry.take() else {
            warn!("window 0x{:x} maximized without saved geometry", self.window);
            return Ok(());
        };
        let extents = self.extents(&config.decor);
        let (client_w, client_h) =
            decorations::client_size(&extents, restored.width, restored.height);
        self.reconfigure(
            conn, screen, renderer, atoms, config, restored.x, restored.y, client_w, client_h,
        )?;
        // The clamp inside reconfigure cannot disagree with a geometry we
        // produced ourselves, so this is bit-for-bit the old rectangle.
        self.frame_geometry = restored;
        Ok(())
    }

    /// Re-render the title pixmaps for the current size and repaint.
    pub fn regenerate_pixmaps(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        renderer: &dyn TextureRenderer,
        config: &Config,
    ) -> Result<()> {
        if let Some(titlebar) = self.frame.titlebar {
            let width = self
                .frame_geometry
                .width
                .saturating_sub(2 * config.decor.border_width as u32)
                .max(1) as u16;
            self.pixmaps.regenerate(
                conn,
                screen,
                renderer,
                width,
                config.decor.titlebar_height,
                config.textures.title,
                &config.colors,
            )?;
            self.pixmaps.apply(conn, titlebar, self.focused())?;
        }
        Ok(())
    }

    /// React to a PropertyNotify: re-read only the category that changed.
    /// Unknown atoms are ignored.
    pub fn handle_property_change(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        atoms: &Atoms,
        text_gc: &TextGc,
        cfg: &DecorConfig,
        atom: Atom,
    ) -> Result<()> {
        if atom == Atom::from(AtomEnum::WM_NAME) {
            if let Some(title) = hints::read_text_property(conn, self.window, atom)? {
                self.title = title;
                self.draw_title(conn, text_gc, cfg)?;
            }
        } else if atom == Atom::from(AtomEnum::WM_ICON_NAME) {
            if let Some(icon_title) = hints::read_text_property(conn, self.window, atom)? {
                self.icon_title = icon_title;
            }
        } else if atom == Atom::from(AtomEnum::WM_NORMAL_HINTS) {
            self.normal_hints = NormalHints::read(
                conn,
                self.window,
                screen.width_in_pixels as u32,
                screen.height_in_pixels as u32,
            )?;
        } else if atom == Atom::from(AtomEnum::WM_HINTS) {
            let wm_hints = WmHints::read(conn, self.window)?;
            self.focus_model = FocusModel::derive(
                wm_hints.input,
                self.protocols.contains(Protocols::TAKE_FOCUS),
            );
        } else if atom == atoms.wm_protocols {
            self.protocols = hints::read_protocols(conn, atoms, self.window)?;
            self.focus_model = FocusModel::derive(
                match self.focus_model {
                    FocusModel::NoInput | FocusModel::GloballyActive => Some(false),
                    _ => Some(true),
                },
                self.protocols.contains(Protocols::TAKE_FOCUS),
            );
        } else if atom == Atom::from(AtomEnum::WM_TRANSIENT_FOR) {
            self.transient_for = hints::read_transient_for(conn, self.window)?;
            self.flags
                .set(ClientFlags::TRANSIENT, self.transient_for.is_some());
        }
        // Anything else: not ours to interpret.
        Ok(())
    }

    /// Release decoration resources and unparent the client. Called on
    /// destruction and on manager shutdown.
    pub fn release(&mut self, conn: &RustConnection, root: Window) -> Result<()> {
        self.pixmaps.release(conn)?;
        self.frame.destroy(conn, self.window, root)?;
        Ok(())
    }
}

/// The window plus every transient reachable through forward links, in
/// propagation order. Iconify and deiconify walk this chain so a dialog
/// follows its owner. Tolerates link cycles.
pub fn transient_chain(
    clients: &HashMap<Window, ClientWindow>,
    start: Window,
) -> Vec<Window> {
    let mut chain = Vec::new();
    let mut next = Some(start);
    while let Some(window) = next {
        if chain.contains(&window) {
            break;
        }
        let Some(client) = clients.get(&window) else {
            break;
        };
        chain.push(window);
        next = client.transient;
    }
    chain
}

/// Decide a focus handoff: the window that should carry the focused
/// decoration once `target` is requested. An ineligible target (unknown,
/// iconic, hidden, or a model the manager may not focus) leaves the
/// current holder in place; a `None` target always clears.
pub fn focus_handoff(
    clients: &HashMap<Window, ClientWindow>,
    current: Option<Window>,
    target: Option<Window>,
) -> Option<Window> {
    let Some(window) = target else {
        return None;
    };
    let eligible = clients
        .get(&window)
        .is_some_and(|c| c.visible() && !c.iconic() && c.focus_model.manager_sets_focus());
    if eligible { Some(window) } else { current }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DecorConfig;

    pub(crate) fn test_client(window: Window) -> ClientWindow {
        let hints = AdoptedHints {
            normal: NormalHints::fallback(1920, 1080),
            protocols: Protocols::DELETE_WINDOW,
            focus_model: FocusModel::Passive,
            initial_iconic: false,
        };
        ClientWindow::new(
            window,
            FrameWindows::default(),
            DecorLayout::from_hints(true, false, true),
            Geometry::new(100, 100, 400, 300),
            hints,
            None,
            0,
        )
    }

    #[test]
    fn iconic_and_visible_stay_mutually_exclusive() {
        let mut c = test_client(1);
        c.begin_deiconify();
        assert!(c.visible() && !c.iconic());

        assert!(c.begin_iconify());
        assert!(c.iconic() && !c.visible());

        assert!(c.begin_deiconify());
        assert!(c.visible() && !c.iconic());

        c.begin_withdraw();
        assert!(!c.visible() && !c.iconic());
    }

    #[test]
    fn iconify_drops_focus() {
        let mut c = test_client(1);
        c.begin_deiconify();
        c.set_focus_state(true);
        c.begin_iconify();
        assert!(!c.focused());
    }

    #[test]
    fn deiconify_on_normal_window_is_a_noop() {
        let mut c = test_client(1);
        c.begin_deiconify();
        let before = c.frame_geometry;
        assert!(!c.begin_deiconify());
        assert_eq!(c.frame_geometry, before);
    }

    #[test]
    fn iconify_on_iconic_window_is_a_noop() {
        let mut c = test_client(1);
        c.begin_iconify();
        assert!(!c.begin_iconify());
    }

    #[test]
    fn maximize_restore_round_trips_geometry() {
        let cfg = DecorConfig::default();
        let mut c = test_client(1);
        let original = c.frame_geometry;
        let avail = Geometry::new(0, 0, 1920, 1050);

        let maxed = c.begin_maximize(&avail, &cfg).expect("not maximized yet");
        assert!(c.maximized());
        assert_ne!(maxed, original);

        let restored = c.begin_restore().expect("was maximized");
        assert_eq!(restored, original);
        assert_eq!(c.frame_geometry, original);
        assert!(!c.maximized());
    }

    #[test]
    fn maximize_twice_keeps_first_restore_geometry() {
        let cfg = DecorConfig::default();
        let mut c = test_client(1);
        let original = c.frame_geometry;
        let avail = Geometry::new(0, 0, 1920, 1050);

        c.begin_maximize(&avail, &cfg);
        assert!(c.begin_maximize(&avail, &cfg).is_none());
        assert_eq!(c.begin_restore(), Some(original));
    }

    #[test]
    fn maximized_geometry_honors_resize_increment() {
        let cfg = DecorConfig::default();
        let mut c = test_client(1);
        c.normal_hints.width_inc = 10;
        c.normal_hints.height_inc = 17;
        let avail = Geometry::new(0, 0, 1001, 777);

        let maxed = c.maximized_geometry(&avail, &cfg);
        let extents = c.extents(&cfg);
        let client_w = maxed.width - extents.left - extents.right;
        let client_h = maxed.height - extents.top - extents.bottom;
        assert_eq!(client_w % 10, 0);
        assert_eq!(client_h % 17, 0);
        assert!(maxed.width <= avail.width);
        assert!(maxed.height <= avail.height);
    }

    fn linked_pair() -> HashMap<Window, ClientWindow> {
        let mut clients = HashMap::new();
        let mut owner = test_client(1);
        owner.begin_deiconify();
        owner.transient = Some(2);
        let mut dialog = test_client(2);
        dialog.begin_deiconify();
        dialog.transient_for = Some(1);
        dialog.flags.insert(ClientFlags::TRANSIENT);
        clients.insert(1, owner);
        clients.insert(2, dialog);
        clients
    }

    #[test]
    fn iconify_propagates_across_the_transient_link() {
        let mut clients = linked_pair();

        let chain = transient_chain(&clients, 1);
        assert_eq!(chain, vec![1, 2]);
        for window in chain {
            if let Some(client) = clients.get_mut(&window) {
                client.begin_iconify();
            }
        }
        assert!(clients[&1].iconic());
        assert!(clients[&2].iconic());
    }

    #[test]
    fn transient_chain_survives_a_link_cycle() {
        let mut clients = linked_pair();
        if let Some(dialog) = clients.get_mut(&2) {
            dialog.transient = Some(1);
        }
        assert_eq!(transient_chain(&clients, 1), vec![1, 2]);
    }

    #[test]
    fn at_most_one_client_holds_the_focus_flag() {
        let mut clients = HashMap::new();
        for id in 1..=3 {
            let mut c = test_client(id);
            c.begin_deiconify();
            clients.insert(id, c);
        }

        let mut holder = None;
        for target in [Some(1), Some(3), Some(2), Some(3)] {
            let next = focus_handoff(&clients, holder, target);
            if next != holder {
                if let Some(old) = holder {
                    if let Some(client) = clients.get_mut(&old) {
                        client.set_focus_state(false);
                    }
                }
                if let Some(new) = next {
                    if let Some(client) = clients.get_mut(&new) {
                        client.set_focus_state(true);
                    }
                }
                holder = next;
            }
            assert_eq!(clients.values().filter(|c| c.focused()).count(), 1);
            assert_eq!(holder, target);
        }
    }

    #[test]
    fn focus_handoff_leaves_the_holder_on_ineligible_targets() {
        let mut clients = HashMap::new();
        let mut holder = test_client(1);
        holder.begin_deiconify();
        clients.insert(1, holder);
        let mut refuser = test_client(2);
        refuser.begin_deiconify();
        refuser.focus_model = FocusModel::NoInput;
        clients.insert(2, refuser);
        let mut hidden = test_client(3);
        hidden.begin_iconify();
        clients.insert(3, hidden);

        assert_eq!(focus_handoff(&clients, Some(1), Some(2)), Some(1));
        assert_eq!(focus_handoff(&clients, Some(1), Some(3)), Some(1));
        assert_eq!(focus_handoff(&clients, Some(1), Some(99)), Some(1));
        assert_eq!(focus_handoff(&clients, Some(1), None), None);
    }

    #[test]
    fn focus_transitions_never_touch_the_pixmap_generation() {
        let mut c = test_client(1);
        let generation = c.pixmaps.generation;
        c.set_focus_state(true);
        c.set_focus_state(false);
        c.begin_iconify();
        c.begin_deiconify();
        assert_eq!(c.pixmaps.generation, generation);
    }

    #[test]
    fn restore_without_maximize_is_refused() {
        let mut c = test_client(1);
        assert!(c.begin_restore().is_none());
    }

    #[test]
    fn transient_link_sets_flag() {
        let hints = AdoptedHints {
            normal: NormalHints::fallback(800, 600),
            protocols: Protocols::empty(),
            focus_model: FocusModel::Passive,
            initial_iconic: false,
        };
        let c = ClientWindow::new(
            2,
            FrameWindows::default(),
            DecorLayout::from_hints(true, false, false),
            Geometry::new(0, 0, 100, 100),
            hints,
            Some(1),
            0,
        );
        assert!(c.flags.contains(ClientFlags::TRANSIENT));
        assert_eq!(c.transient_for, Some(1));
    }
}

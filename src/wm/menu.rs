//! Menus
//!
//! One menu engine for every menu the manager shows: the root menu, the
//! per-workspace window lists, per-window operation menus, the send-to
//! submenu and the icon list. A menu is a vertical list of items over an
//! override-redirect window; hit testing and layout are pure so the
//! engine is testable without a server.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::{ColorConfig, DecorConfig};
use crate::wm::decorations::{self, TextGc};

/// What a menu stands for. The kind decides how the session rebuilds the
/// item list and which actions make sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Root,
    /// Window list of one workspace.
    Workspace(usize),
    /// Operations on one client window.
    Window(Window),
    /// Send-to submenu for one client window.
    SendTo(Window),
    /// Iconified windows, session-wide.
    IconList,
}

/// What selecting an item asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    SwitchWorkspace(usize),
    AddWorkspace,
    RemoveLastWorkspace,
    Reconfigure,
    Exit,
    /// Raise and focus a window from a workspace list.
    FocusWindow(Window),
    /// Restore an iconified window from the icon list.
    DeiconifyWindow(Window),
    SendToWorkspace(Window, usize),
    IconifyWindow(Window),
    RaiseWindow(Window),
    LowerWindow(Window),
    MaximizeWindow(Window),
    ShadeWindow(Window),
    CloseWindow(Window),
    /// Open the send-to submenu for a window.
    OpenSendTo(Window),
    /// Label-only row, hit testing skips it.
    None,
}

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub label: String,
    pub action: MenuAction,
}

impl MenuItem {
    pub fn new(label: impl Into<String>, action: MenuAction) -> Self {
        Self { label: label.into(), action }
    }
}

pub const ITEM_HEIGHT: u16 = 20;
pub const MENU_WIDTH: u16 = 180;

/// A realized menu: items plus the X window they draw into. Constructed
/// conn-free; `realize` builds the window on first use.
#[derive(Debug)]
pub struct Menu {
    pub id: u32,
    pub kind: MenuKind,
    pub items: Vec<MenuItem>,
    pub window: Option<Window>,
    pub visible: bool,
    pub x: i32,
    pub y: i32,
}

impl Menu {
    pub fn new(id: u32, kind: MenuKind) -> Self {
        Self { id, kind, items: Vec::new(), window: None, visible: false, x: 0, y: 0 }
    }

    /// Replace the whole item list. Menus are cheap to rebuild and their
    /// contents depend on session state, so the session regenerates them
    /// on every change instead of patching rows.
    pub fn set_items(&mut self, items: Vec<MenuItem>) {
        self.items = items;
    }

    pub fn height(&self) -> u16 {
        (self.items.len().max(1) as u16) * ITEM_HEIGHT
    }

    /// Hit test: the item row at a window-relative y. Label-only rows do
    /// not count as hits.
    pub fn item_at(&self, y: i32) -> Option<&MenuItem> {
        if y < 0 {
            return None;
        }
        let item = self.items.get(y as usize / ITEM_HEIGHT as usize)?;
        if item.action == MenuAction::None {
            return None;
        }
        Some(item)
    }

    /// Create the backing window. Idempotent.
    pub fn realize(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        colors: &ColorConfig,
    ) -> Result<Window> {
        if let Some(window) = self.window {
            return Ok(window);
        }
        let window = conn.generate_id()?;
        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            0,
            0,
            MENU_WIDTH,
            self.height(),
            1,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(colors.menu)
                .border_pixel(colors.frame_border)
                .override_redirect(1)
                .event_mask(
                    EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::POINTER_MOTION
                        | EventMask::EXPOSURE,
                ),
        )?;
        debug!("realized menu {} ({:?}) as 0x{:x}", self.id, self.kind, window);
        self.window = Some(window);
        Ok(window)
    }

    /// Resize to fit the current items and show at (x, y), clamped to the
    /// screen.
    pub fn show(
        &mut self,
        conn: &RustConnection,
        screen: &Screen,
        x: i32,
        y: i32,
    ) -> Result<()> {
        let Some(window) = self.window else {
            return Ok(());
        };
        let height = self.height() as i32;
        let x = x.clamp(0, (screen.width_in_pixels as i32 - MENU_WIDTH as i32).max(0));
        let y = y.clamp(0, (screen.height_in_pixels as i32 - height).max(0));
        self.x = x;
        self.y = y;
        conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(x)
                .y(y)
                .width(MENU_WIDTH as u32)
                .height(self.height() as u32),
        )?;
        conn.map_window(window)?;
        self.visible = true;
        Ok(())
    }

    pub fn hide(&mut self, conn: &RustConnection) -> Result<()> {
        if let Some(window) = self.window {
            conn.unmap_window(window)?;
        }
        self.visible = false;
        Ok(())
    }

    /// Repaint every row. Called on Expose and after a rebuild while
    /// visible.
    pub fn draw(
        &self,
        conn: &RustConnection,
        text_gc: &TextGc,
        cfg: &DecorConfig,
    ) -> Result<()> {
        let Some(window) = self.window else {
            return Ok(());
        };
        conn.clear_area(false, window, 0, 0, 0, 0)?;
        for (row, item) in self.items.iter().enumerate() {
            let baseline =
                row as i16 * ITEM_HEIGHT as i16 + decorations::text_baseline(ITEM_HEIGHT);
            let bytes: Vec<u8> = item.label.bytes().take(255).collect();
            if !bytes.is_empty() {
                conn.image_text8(
                    window,
                    text_gc.unfocused,
                    cfg.bevel_width as i16,
                    baseline,
                    &bytes,
                )?;
            }
        }
        Ok(())
    }

    pub fn destroy(&mut self, conn: &RustConnection) -> Result<()> {
        if let Some(window) = self.window.take() {
            conn.destroy_window(window)?;
        }
        self.visible = false;
        Ok(())
    }
}

/// Item list for the root menu.
pub fn root_menu_items(workspace_count: usize) -> Vec<MenuItem> {
    let mut items = vec![MenuItem::new("Workspaces", MenuAction::None)];
    for id in 0..workspace_count {
        items.push(MenuItem::new(
            format!("  Workspace {}", id + 1),
            MenuAction::SwitchWorkspace(id),
        ));
    }
    items.push(MenuItem::new("Add workspace", MenuAction::AddWorkspace));
    items.push(MenuItem::new("Remove last workspace", MenuAction::RemoveLastWorkspace));
    items.push(MenuItem::new("Reconfigure", MenuAction::Reconfigure));
    items.push(MenuItem::new("Exit", MenuAction::Exit));
    items
}

/// Item list for one window's operation menu. Only operations the window
/// supports are offered.
pub fn window_menu_items(
    window: Window,
    layout: &decorations::DecorLayout,
    shaded: bool,
    maximized: bool,
) -> Vec<MenuItem> {
    let mut items = vec![
        MenuItem::new("Iconify", MenuAction::IconifyWindow(window)),
        MenuItem::new("Raise", MenuAction::RaiseWindow(window)),
        MenuItem::new("Lower", MenuAction::LowerWindow(window)),
        MenuItem::new("Send to ...", MenuAction::OpenSendTo(window)),
    ];
    if layout.maximize_button {
        items.insert(
            0,
            MenuItem::new(
                if maximized { "Restore" } else { "Maximize" },
                MenuAction::MaximizeWindow(window),
            ),
        );
    }
    if layout.titlebar {
        items.push(MenuItem::new(
            if shaded { "Unshade" } else { "Shade" },
            MenuAction::ShadeWindow(window),
        ));
    }
    if layout.close_button {
        items.push(MenuItem::new("Close", MenuAction::CloseWindow(window)));
    }
    items
}

/// Item list for the send-to submenu: every workspace except the window's
/// current one.
pub fn send_to_items(window: Window, workspace_count: usize, current: usize) -> Vec<MenuItem> {
    (0..workspace_count)
        .filter(|id| *id != current)
        .map(|id| {
            MenuItem::new(
                format!("Workspace {}", id + 1),
                MenuAction::SendToWorkspace(window, id),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::decorations::DecorLayout;

    #[test]
    fn hit_testing_maps_y_to_rows() {
        let mut menu = Menu::new(1, MenuKind::Root);
        menu.set_items(vec![
            MenuItem::new("a", MenuAction::AddWorkspace),
            MenuItem::new("b", MenuAction::Exit),
        ]);

        assert_eq!(menu.item_at(0).unwrap().action, MenuAction::AddWorkspace);
        assert_eq!(
            menu.item_at(ITEM_HEIGHT as i32).unwrap().action,
            MenuAction::Exit
        );
        assert!(menu.item_at(-5).is_none());
        assert!(menu.item_at(2 * ITEM_HEIGHT as i32).is_none());
    }

    #[test]
    fn label_rows_are_not_hits() {
        let mut menu = Menu::new(1, MenuKind::Root);
        menu.set_items(root_menu_items(2));
        assert!(menu.item_at(0).is_none()); // "Workspaces" header
        assert_eq!(
            menu.item_at(ITEM_HEIGHT as i32).unwrap().action,
            MenuAction::SwitchWorkspace(0)
        );
    }

    #[test]
    fn window_menu_offers_only_supported_operations() {
        let fixed = DecorLayout::from_hints(true, true, false);
        let items = window_menu_items(7, &fixed, false, false);
        assert!(!items.iter().any(|i| matches!(i.action, MenuAction::MaximizeWindow(_))));
        assert!(!items.iter().any(|i| matches!(i.action, MenuAction::CloseWindow(_))));
        assert!(items.iter().any(|i| i.action == MenuAction::IconifyWindow(7)));

        let full = DecorLayout::from_hints(true, false, true);
        let items = window_menu_items(7, &full, true, true);
        assert!(items.iter().any(|i| i.label == "Restore"));
        assert!(items.iter().any(|i| i.label == "Unshade"));
        assert!(items.iter().any(|i| i.action == MenuAction::CloseWindow(7)));
    }

    #[test]
    fn send_to_skips_the_current_workspace() {
        let items = send_to_items(7, 4, 1);
        let targets: Vec<_> = items
            .iter()
            .map(|i| match i.action {
                MenuAction::SendToWorkspace(_, id) => id,
                other => panic!("unexpected action {other:?}"),
            })
            .collect();
        assert_eq!(targets, vec![0, 2, 3]);
    }
}

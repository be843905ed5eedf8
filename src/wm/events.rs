//! Event dispatch
//!
//! Resolves every inbound event through the window registry and routes it
//! to the owning object. Events referencing a window whose DestroyNotify
//! is already queued are dropped after the destroy is processed first, so
//! no handler ever works on a dead window it could have known about.

use std::collections::VecDeque;

use anyhow::Result;
use tracing::{debug, trace};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;

use crate::wm::menu::{self, MenuKind};
use crate::wm::moveresize::DragUpdate;
use crate::wm::registry::{Owner, ToolbarRegion};
use crate::wm::session::{Session, ICON_MENU_ID, ROOT_MENU_ID};

/// The client window an event is about, for the pending-destroy check.
/// Only events whose processing would be wasted on a dead window count.
pub fn referenced_window(event: &Event) -> Option<Window> {
    match event {
        Event::MapRequest(e) => Some(e.window),
        Event::ConfigureRequest(e) => Some(e.window),
        Event::UnmapNotify(e) => Some(e.window),
        Event::PropertyNotify(e) => Some(e.window),
        Event::ClientMessage(e) => Some(e.window),
        _ => None,
    }
}

/// Remove the first queued DestroyNotify for `window`, if any.
pub fn take_pending_destroy(queue: &mut VecDeque<Event>, window: Window) -> bool {
    let position = queue.iter().position(|event| {
        matches!(event, Event::DestroyNotify(e) if e.window == window)
    });
    match position {
        Some(index) => {
            queue.remove(index);
            true
        }
        None => false,
    }
}

impl Session {
    /// Dispatch one event, short-circuiting to destruction when the
    /// window's death is already queued.
    pub(crate) fn dispatch_with_destroy_check(&mut self, event: Event) -> Result<()> {
        if let Some(window) = referenced_window(&event) {
            if self.clients.contains_key(&window)
                && take_pending_destroy(&mut self.queue, window)
            {
                debug!(
                    "0x{:x} has a queued DestroyNotify, destroying first and dropping {:?}",
                    window, event
                );
                return self.unmanage(window, true);
            }
        }
        self.dispatch(event)
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        trace!("event: {:?}", event);
        match event {
            Event::MapRequest(e) => self.on_map_request(e),
            Event::ConfigureRequest(e) => self.on_configure_request(e),
            Event::DestroyNotify(e) => self.unmanage(e.window, true),
            Event::UnmapNotify(e) => self.on_unmap(e),
            Event::PropertyNotify(e) => self.on_property(e),
            Event::ClientMessage(e) => self.on_client_message(e),
            Event::ButtonPress(e) => self.on_button_press(e),
            Event::KeyPress(e) => self.on_key_press(e),
            Event::FocusIn(e) => self.on_focus_in(e),
            Event::ButtonRelease(e) => self.on_button_release(e),
            Event::MotionNotify(e) => self.on_motion(e),
            Event::Expose(e) => self.on_expose(e),
            Event::Error(e) => {
                // Requests against windows that died in flight land here.
                debug!("X error: {:?}", e);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_map_request(&mut self, e: MapRequestEvent) -> Result<()> {
        if self.clients.contains_key(&e.window) {
            let honored = {
                let Some(client) = self.clients.get_mut(&e.window) else {
                    return Ok(());
                };
                client.handle_map_request(&self.conn, &self.atoms)?
            };
            if !honored {
                debug!("map request for non-Normal 0x{:x} ignored", e.window);
            }
            Ok(())
        } else {
            self.manage(e.window)
        }
    }

    fn on_configure_request(&mut self, e: ConfigureRequestEvent) -> Result<()> {
        if !self.clients.contains_key(&e.window) {
            // Not ours; forward verbatim.
            self.conn
                .configure_window(e.window, &ConfigureWindowAux::from_configure_request(&e))?;
            return Ok(());
        }
        let (x, y, w, h) = {
            let Some(client) = self.clients.get(&e.window) else {
                return Ok(());
            };
            let extents = client.extents(&self.config.decor);
            let area = client.client_area(&self.config.decor);
            let x = if e.value_mask.contains(ConfigWindow::X) {
                e.x as i32 - extents.left as i32
            } else {
                client.frame_geometry.x
            };
            let y = if e.value_mask.contains(ConfigWindow::Y) {
                e.y as i32 - extents.top as i32
            } else {
                client.frame_geometry.y
            };
            let w = if e.value_mask.contains(ConfigWindow::WIDTH) {
                e.width as u32
            } else {
                area.width
            };
            let h = if e.value_mask.contains(ConfigWindow::HEIGHT) {
                e.height as u32
            } else {
                area.height
            };
            (x, y, w, h)
        };
        if let Some(client) = self.clients.get_mut(&e.window) {
            client.reconfigure(
                &self.conn,
                &self.screen,
                self.renderer.as_ref(),
                &self.atoms,
                &self.config,
                x,
                y,
                w,
                h,
            )?;
            client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
        }
        Ok(())
    }

    fn on_unmap(&mut self, e: UnmapNotifyEvent) -> Result<()> {
        if !self.clients.contains_key(&e.window) {
            return Ok(());
        }
        // Reparenting away from the root replays an unmap on the root;
        // only an unmap seen through the frame is the client withdrawing.
        if e.event == self.screen.root {
            return Ok(());
        }
        self.unmanage(e.window, false)
    }

    fn on_property(&mut self, e: PropertyNotifyEvent) -> Result<()> {
        if self.registry.lookup(e.window) != Some(Owner::Client(e.window)) {
            return Ok(());
        }
        if let Some(client) = self.clients.get_mut(&e.window) {
            client.handle_property_change(
                &self.conn,
                &self.screen,
                &self.atoms,
                &self.text_gc,
                &self.config.decor,
                e.atom,
            )?;
        }
        self.rebuild_menus()
    }

    fn on_client_message(&mut self, e: ClientMessageEvent) -> Result<()> {
        if e.type_ == self.atoms.wm_change_state {
            let data = e.data.as_data32();
            if data[0] == crate::wm::atoms::WmStateValue::Iconic as u32 {
                return self.iconify_window(e.window);
            }
        }
        Ok(())
    }

    fn on_button_press(&mut self, e: ButtonPressEvent) -> Result<()> {
        match self.registry.lookup(e.event) {
            Some(Owner::Menu(id)) => self.on_menu_press(id, e),
            Some(Owner::Toolbar(region)) => self.on_toolbar_press(region, e),
            Some(Owner::Icon(handle)) => {
                if let Some(client) = self.icons.client_for(handle) {
                    self.deiconify_window(client)?;
                }
                Ok(())
            }
            Some(Owner::Client(window)) => self.on_client_press(window, e),
            None => {
                if e.event == self.screen.root {
                    self.on_root_press(e)?;
                }
                Ok(())
            }
        }
    }

    fn on_menu_press(&mut self, id: u32, e: ButtonPressEvent) -> Result<()> {
        let action = self
            .menus
            .get(&id)
            .and_then(|menu| menu.item_at(e.event_y as i32))
            .map(|item| item.action);
        if let Some(action) = action {
            self.execute_action(action)?;
        }
        Ok(())
    }

    fn on_toolbar_press(&mut self, region: ToolbarRegion, e: ButtonPressEvent) -> Result<()> {
        match region {
            ToolbarRegion::PrevWorkspace => {
                let count = self.workspaces.len();
                let current = self.workspaces.current_id();
                self.switch_workspace((current + count - 1) % count)
            }
            ToolbarRegion::NextWorkspace => {
                let count = self.workspaces.len();
                let current = self.workspaces.current_id();
                self.switch_workspace((current + 1) % count)
            }
            ToolbarRegion::IconList => {
                let visible = self
                    .menus
                    .get(&ICON_MENU_ID)
                    .map(|m| m.visible)
                    .unwrap_or(false);
                if visible {
                    self.hide_menus()
                } else {
                    self.show_menu(ICON_MENU_ID, e.root_x as i32, e.root_y as i32)
                }
            }
            ToolbarRegion::WorkspaceLabel => {
                let id = self.workspace_menu_id(self.workspaces.current_id());
                self.show_menu(id, e.root_x as i32, e.root_y as i32)
            }
            ToolbarRegion::Frame | ToolbarRegion::Clock => Ok(()),
        }
    }

    fn on_root_press(&mut self, e: ButtonPressEvent) -> Result<()> {
        match e.detail {
            3 => self.show_menu(ROOT_MENU_ID, e.root_x as i32, e.root_y as i32),
            2 => {
                let id = self.workspace_menu_id(self.workspaces.current_id());
                self.show_menu(id, e.root_x as i32, e.root_y as i32)
            }
            _ => self.hide_menus(),
        }
    }

    fn on_client_press(&mut self, window: Window, e: ButtonPressEvent) -> Result<()> {
        self.hide_menus()?;
        let Some(client) = self.clients.get(&window) else {
            return Ok(());
        };
        let frame = client.frame;
        let geometry = client.frame_geometry;
        let area = client.client_area(&self.config.decor);

        if Some(e.event) == frame.iconify_button {
            self.press_button(e.event)?;
            return self.iconify_window(window);
        }
        if Some(e.event) == frame.maximize_button {
            self.press_button(e.event)?;
            return self.toggle_maximize(window);
        }
        if Some(e.event) == frame.close_button {
            self.press_button(e.event)?;
            if let Some(client) = self.clients.get(&window) {
                client.close(&self.conn, &self.atoms)?;
            }
            return Ok(());
        }
        if Some(e.event) == frame.titlebar || Some(e.event) == frame.label {
            self.raise_window(window)?;
            self.focus_window(Some(window))?;
            match e.detail {
                1 => {
                    let geometry = self
                        .clients
                        .get(&window)
                        .map(|c| c.frame_geometry)
                        .unwrap_or(geometry);
                    self.drag.begin_move(
                        &self.conn,
                        self.screen.root,
                        window,
                        &geometry,
                        e.root_x as i32,
                        e.root_y as i32,
                    )?;
                }
                2 => self.toggle_shade(window)?,
                3 => {
                    let (layout, shaded, maximized) = {
                        let Some(client) = self.clients.get(&window) else {
                            return Ok(());
                        };
                        (client.layout, client.shaded(), client.maximized())
                    };
                    let items = menu::window_menu_items(window, &layout, shaded, maximized);
                    self.show_transient_menu(
                        MenuKind::Window(window),
                        items,
                        e.root_x as i32,
                        e.root_y as i32,
                    )?;
                }
                _ => {}
            }
            return Ok(());
        }
        if Some(e.event) == frame.handle
            || Some(e.event) == frame.left_grip
            || Some(e.event) == frame.right_grip
        {
            let from_left = Some(e.event) == frame.left_grip;
            self.raise_window(window)?;
            self.drag.begin_resize(
                &self.conn,
                self.screen.root,
                window,
                &geometry,
                area.width,
                area.height,
                e.root_x as i32,
                e.root_y as i32,
                from_left,
            )?;
            return Ok(());
        }

        // The frame background or the client window itself.
        self.raise_window(window)?;
        self.focus_window(Some(window))
    }

    fn on_key_press(&mut self, e: KeyPressEvent) -> Result<()> {
        if !e.state.contains(KeyButMask::MOD1) {
            return Ok(());
        }
        if e.detail == self.keys.tab && self.keys.tab != 0 {
            let forward = !e.state.contains(KeyButMask::SHIFT);
            return self.cycle_focus(forward);
        }
        if e.detail == self.keys.left && self.keys.left != 0 {
            let count = self.workspaces.len();
            let current = self.workspaces.current_id();
            return self.switch_workspace((current + count - 1) % count);
        }
        if e.detail == self.keys.right && self.keys.right != 0 {
            let count = self.workspaces.len();
            let current = self.workspaces.current_id();
            return self.switch_workspace((current + 1) % count);
        }
        Ok(())
    }

    /// Keep the focus flag honest when focus moved without us (a
    /// globally-active client taking it, or a grab ending).
    fn on_focus_in(&mut self, e: FocusInEvent) -> Result<()> {
        if e.mode != NotifyMode::NORMAL {
            return Ok(());
        }
        let Some(Owner::Client(window)) = self.registry.lookup(e.event) else {
            return Ok(());
        };
        if self.focused == Some(window) {
            return Ok(());
        }
        let eligible = self
            .clients
            .get(&window)
            .is_some_and(|c| c.visible() && !c.iconic());
        if eligible {
            self.apply_focus_flags(Some(window))?;
        }
        Ok(())
    }

    fn on_button_release(&mut self, _e: ButtonReleaseEvent) -> Result<()> {
        self.release_pressed_button()?;
        if !self.drag.is_idle() {
            self.drag.finish(&self.conn)?;
        }
        Ok(())
    }

    fn on_motion(&mut self, e: MotionNotifyEvent) -> Result<()> {
        let Some(target) = self.drag.target() else {
            return Ok(());
        };
        let hints = match self.clients.get(&target) {
            Some(client) => client.normal_hints,
            None => return Ok(()),
        };
        let Some(update) = self.drag.motion(e.root_x as i32, e.root_y as i32, &hints) else {
            return Ok(());
        };
        let Some(client) = self.clients.get_mut(&target) else {
            return Ok(());
        };
        match update {
            DragUpdate::Position { x, y, .. } => {
                let area = client.client_area(&self.config.decor);
                client.reconfigure(
                    &self.conn,
                    &self.screen,
                    self.renderer.as_ref(),
                    &self.atoms,
                    &self.config,
                    x,
                    y,
                    area.width,
                    area.height,
                )?;
            }
            DragUpdate::Size { x, width, height, .. } => {
                let y = client.frame_geometry.y;
                client.reconfigure(
                    &self.conn,
                    &self.screen,
                    self.renderer.as_ref(),
                    &self.atoms,
                    &self.config,
                    x,
                    y,
                    width,
                    height,
                )?;
                client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
            }
        }
        Ok(())
    }

    fn on_expose(&mut self, e: ExposeEvent) -> Result<()> {
        if e.count != 0 {
            return Ok(());
        }
        match self.registry.lookup(e.window) {
            Some(Owner::Menu(id)) => {
                if let Some(menu) = self.menus.get(&id) {
                    menu.draw(&self.conn, &self.text_gc, &self.config.decor)?;
                }
            }
            Some(Owner::Toolbar(_)) => {
                self.toolbar.draw(&self.conn, &self.text_gc)?;
            }
            Some(Owner::Icon(handle)) => {
                self.icons.draw(&self.conn, &self.text_gc, handle)?;
            }
            Some(Owner::Client(window)) => {
                if let Some(client) = self.clients.get(&window) {
                    if client.frame.label == Some(e.window) {
                        client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
                    }
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Get or lazily create the window-list menu for a workspace.
    pub(crate) fn workspace_menu_id(&mut self, workspace: usize) -> u32 {
        if let Some(menu) = self
            .menus
            .values()
            .find(|m| m.kind == MenuKind::Workspace(workspace))
        {
            return menu.id;
        }
        let id = self.next_menu_id;
        self.next_menu_id += 1;
        self.menus
            .insert(id, menu::Menu::new(id, MenuKind::Workspace(workspace)));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destroy(window: Window) -> Event {
        Event::DestroyNotify(DestroyNotifyEvent {
            response_type: 17,
            sequence: 0,
            event: 1,
            window,
        })
    }

    fn unmap(window: Window) -> Event {
        Event::UnmapNotify(UnmapNotifyEvent {
            response_type: 18,
            sequence: 0,
            event: 1,
            window,
            from_configure: false,
        })
    }

    fn property(window: Window) -> Event {
        Event::PropertyNotify(PropertyNotifyEvent {
            response_type: 28,
            sequence: 0,
            window,
            atom: 39,
            time: 0,
            state: Property::NEW_VALUE,
        })
    }

    #[test]
    fn queued_destroy_is_found_and_removed() {
        let mut queue: VecDeque<Event> = VecDeque::new();
        queue.push_back(property(7));
        queue.push_back(destroy(7));
        queue.push_back(unmap(8));

        assert!(take_pending_destroy(&mut queue, 7));
        assert_eq!(queue.len(), 2);
        assert!(!queue
            .iter()
            .any(|e| matches!(e, Event::DestroyNotify(_))));
    }

    #[test]
    fn no_queued_destroy_leaves_the_queue_alone() {
        let mut queue: VecDeque<Event> = VecDeque::new();
        queue.push_back(unmap(8));

        assert!(!take_pending_destroy(&mut queue, 7));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn destroy_for_another_window_does_not_match() {
        let mut queue: VecDeque<Event> = VecDeque::new();
        queue.push_back(destroy(9));

        assert!(!take_pending_destroy(&mut queue, 7));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn referenced_window_covers_stale_prone_events() {
        assert_eq!(referenced_window(&unmap(5)), Some(5));
        assert_eq!(referenced_window(&property(6)), Some(6));
        // Destroys themselves are never short-circuited.
        assert_eq!(referenced_window(&destroy(7)), None);
    }
}

//! Session
//!
//! The top-level object owning the connection, every managed client, the
//! workspaces, menus, icons and toolbar. Startup acquires the manager
//! selection and the redirect mask on the root; the run loop polls the
//! connection fd and dispatches queued events until an exit is requested.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::os::fd::{AsFd, AsRawFd};
use std::time::Duration;

use anyhow::{Context, Result};
use mio::unix::SourceFd;
use mio::{Events as MioEvents, Interest, Poll, Token};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::config::Config;
use crate::shared::Geometry;
use crate::wm::atoms::{Atoms, WmStateValue};
use crate::wm::client::{self, ClientWindow};
use crate::wm::cycle::{self, Candidate};
use crate::wm::decorations::{SolidRenderer, TextGc, TextureRenderer};
use crate::wm::icons::IconManager;
use crate::wm::menu::{self, Menu, MenuKind};
use crate::wm::moveresize::DragController;
use crate::wm::registry::{Owner, WindowRegistry};
use crate::wm::stacking;
use crate::wm::toolbar::Toolbar;
use crate::wm::workspace::WorkspaceManager;

/// Startup failure distinct from "could not open the display": some other
/// manager already holds the selection or the redirect mask.
#[derive(Debug)]
pub struct AnotherWmRunning;

impl fmt::Display for AnotherWmRunning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "another window manager is already running")
    }
}

impl std::error::Error for AnotherWmRunning {}

pub const ROOT_MENU_ID: u32 = 0;
pub const ICON_MENU_ID: u32 = 1;

const XK_TAB: u32 = 0xff09;
const XK_LEFT: u32 = 0xff51;
const XK_RIGHT: u32 = 0xff53;

/// Keycodes of the grabbed bindings: Alt+Tab / Alt+Shift+Tab cycle focus,
/// Alt+Left / Alt+Right switch workspaces.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KeyBindings {
    pub tab: u8,
    pub left: u8,
    pub right: u8,
}

const X_TOKEN: Token = Token(0);
const TICK: Duration = Duration::from_secs(1);

pub struct Session {
    pub(crate) conn: RustConnection,
    pub(crate) screen: Screen,
    pub(crate) atoms: Atoms,
    pub(crate) config: Config,
    pub(crate) registry: WindowRegistry,
    pub(crate) clients: HashMap<Window, ClientWindow>,
    pub(crate) workspaces: WorkspaceManager,
    pub(crate) toolbar: Toolbar,
    pub(crate) icons: IconManager,
    pub(crate) menus: HashMap<u32, Menu>,
    pub(crate) next_menu_id: u32,
    pub(crate) drag: DragController,
    pub(crate) renderer: Box<dyn TextureRenderer>,
    pub(crate) text_gc: TextGc,
    pub(crate) focused: Option<Window>,
    /// Titlebar button showing its pressed texture until the release.
    pub(crate) pressed_button: Option<Window>,
    pub(crate) queue: VecDeque<Event>,
    pub(crate) pending_reload: bool,
    pub(crate) running: bool,
    pub(crate) keys: KeyBindings,
    selection_owner: Window,
}

impl Session {
    /// Acquire the manager role on the screen and build the session. Fails
    /// with [`AnotherWmRunning`] when the selection or the redirect mask is
    /// already taken and `replace` was not requested.
    pub fn new(
        conn: RustConnection,
        screen_num: usize,
        config: Config,
        replace: bool,
    ) -> Result<Self> {
        let screen = conn.setup().roots[screen_num].clone();
        let atoms = Atoms::new(&conn)?;

        let selection_owner = Self::acquire_selection(&conn, &screen, screen_num, replace)?;
        Self::acquire_redirect(&conn, &screen)?;

        let text_gc = TextGc::create(&conn, &screen, &config.colors)?;
        let toolbar = Toolbar::create(&conn, &screen, &config.toolbar, &config.colors)?;
        let workspaces = WorkspaceManager::new(&config.workspaces);
        let keys = Self::grab_keys(&conn, &screen)?;

        let mut session = Self {
            conn,
            screen,
            atoms,
            config,
            registry: WindowRegistry::new(),
            clients: HashMap::new(),
            workspaces,
            toolbar,
            icons: IconManager::new(),
            menus: HashMap::new(),
            next_menu_id: 2,
            drag: DragController::new(),
            renderer: Box::new(SolidRenderer),
            text_gc,
            focused: None,
            pressed_button: None,
            queue: VecDeque::new(),
            pending_reload: false,
            running: true,
            keys,
            selection_owner,
        };

        for (handle, region) in session.toolbar.handles() {
            session.registry.insert(handle, Owner::Toolbar(region));
        }
        session.menus.insert(ROOT_MENU_ID, Menu::new(ROOT_MENU_ID, MenuKind::Root));
        session.menus.insert(ICON_MENU_ID, Menu::new(ICON_MENU_ID, MenuKind::IconList));

        let name = session.workspaces.current().name.clone();
        session.toolbar.set_workspace_name(&name);
        session.toolbar.draw(&session.conn, &session.text_gc)?;

        session.adopt_existing()?;
        session.conn.flush()?;
        info!("session up, managing {} windows", session.clients.len());
        Ok(session)
    }

    fn acquire_selection(
        conn: &RustConnection,
        screen: &Screen,
        screen_num: usize,
        replace: bool,
    ) -> Result<Window> {
        let name = format!("WM_S{screen_num}");
        let selection = conn
            .intern_atom(false, name.as_bytes())?
            .reply()
            .context("interning the manager selection atom")?
            .atom;

        let current = conn.get_selection_owner(selection)?.reply()?.owner;
        if current != x11rb::NONE && !replace {
            return Err(AnotherWmRunning.into());
        }

        let owner = conn.generate_id()?;
        conn.create_window(
            0,
            owner,
            screen.root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            0,
            &CreateWindowAux::new().override_redirect(1),
        )?;
        conn.set_selection_owner(owner, selection, x11rb::CURRENT_TIME)?;
        let confirmed = conn.get_selection_owner(selection)?.reply()?.owner;
        if confirmed != owner {
            return Err(AnotherWmRunning.into());
        }
        if current != x11rb::NONE {
            info!("replacing the previous window manager");
        }
        Ok(owner)
    }

    fn acquire_redirect(conn: &RustConnection, screen: &Screen) -> Result<()> {
        let result = conn
            .change_window_attributes(
                screen.root,
                &ChangeWindowAttributesAux::new().event_mask(
                    EventMask::SUBSTRUCTURE_REDIRECT
                        | EventMask::SUBSTRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::PROPERTY_CHANGE,
                ),
            )?
            .check();
        match result {
            Ok(()) => Ok(()),
            Err(_) => Err(AnotherWmRunning.into()),
        }
    }

    /// Resolve the bound keysyms to keycodes and grab them on the root.
    /// A keysym the keyboard lacks leaves that binding inert.
    fn grab_keys(conn: &RustConnection, screen: &Screen) -> Result<KeyBindings> {
        let setup = conn.setup();
        let min = setup.min_keycode;
        let count = setup.max_keycode - min + 1;
        let mapping = conn.get_keyboard_mapping(min, count)?.reply()?;
        let per = mapping.keysyms_per_keycode as usize;

        let find = |keysym: u32| -> Option<u8> {
            mapping
                .keysyms
                .chunks(per.max(1))
                .position(|chunk| chunk.contains(&keysym))
                .map(|index| min + index as u8)
        };
        let keys = KeyBindings {
            tab: find(XK_TAB).unwrap_or_default(),
            left: find(XK_LEFT).unwrap_or_default(),
            right: find(XK_RIGHT).unwrap_or_default(),
        };

        let grab = |keycode: u8, modifiers: ModMask| -> Result<()> {
            if keycode != 0 {
                conn.grab_key(
                    false,
                    screen.root,
                    modifiers,
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )?;
            }
            Ok(())
        };
        grab(keys.tab, ModMask::M1)?;
        grab(keys.tab, ModMask::M1 | ModMask::SHIFT)?;
        grab(keys.left, ModMask::M1)?;
        grab(keys.right, ModMask::M1)?;
        Ok(keys)
    }

    /// Adopt windows that were already mapped when the session started.
    fn adopt_existing(&mut self) -> Result<()> {
        let children = self.conn.query_tree(self.screen.root)?.reply()?.children;
        for window in children {
            let Ok(attrs) = self.conn.get_window_attributes(window)?.reply() else {
                continue;
            };
            if attrs.override_redirect || attrs.map_state != MapState::VIEWABLE {
                continue;
            }
            self.manage(window)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------

    /// Poll the connection until exit, dispatching every queued event and
    /// redrawing the clock once per tick.
    pub fn run(&mut self) -> Result<()> {
        let mut poll = Poll::new().context("creating the event poll")?;
        let fd = self.conn.stream().as_fd().as_raw_fd();
        poll.registry()
            .register(&mut SourceFd(&fd), X_TOKEN, Interest::READABLE)
            .context("registering the X connection fd")?;
        let mut mio_events = MioEvents::with_capacity(8);
        self.conn.flush()?;

        while self.running {
            if let Err(err) = poll.poll(&mut mio_events, Some(TICK)) {
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err).context("polling the X connection");
            }

            if self.pending_reload {
                self.pending_reload = false;
                if let Err(err) = self.reload_config() {
                    warn!("reconfigure failed, keeping previous config: {err:#}");
                }
            }

            while let Some(event) = self.conn.poll_for_event()? {
                self.queue.push_back(event);
            }
            while let Some(event) = self.queue.pop_front() {
                if let Err(err) = self.dispatch_with_destroy_check(event) {
                    warn!("event dispatch error: {err:#}");
                }
            }

            self.toolbar.draw_clock(&self.conn, &self.text_gc)?;
            self.conn.flush()?;
        }

        self.shutdown()
    }

    /// Re-read the config file and repaint everything themed.
    fn reload_config(&mut self) -> Result<()> {
        info!("reconfiguring");
        self.config = Config::load()?;
        let windows: Vec<Window> = self.clients.keys().copied().collect();
        for window in windows {
            if let Some(client) = self.clients.get_mut(&window) {
                client.regenerate_pixmaps(
                    &self.conn,
                    &self.screen,
                    self.renderer.as_ref(),
                    &self.config,
                )?;
                client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
            }
        }
        self.toolbar.draw(&self.conn, &self.text_gc)?;
        self.rebuild_menus()?;
        Ok(())
    }

    /// Release every client back to the root and drop the redirect.
    fn shutdown(&mut self) -> Result<()> {
        info!("shutting down, releasing {} windows", self.clients.len());
        let windows: Vec<Window> = self.clients.keys().copied().collect();
        for window in windows {
            if let Some(mut client) = self.clients.remove(&window) {
                self.atoms
                    .publish_wm_state(&self.conn, window, WmStateValue::Withdrawn)?;
                client.release(&self.conn, self.screen.root)?;
            }
        }
        self.toolbar.destroy(&self.conn)?;
        for menu in self.menus.values_mut() {
            menu.destroy(&self.conn)?;
        }
        self.conn.destroy_window(self.selection_owner)?;
        self.conn.change_window_attributes(
            self.screen.root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
        )?;
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, x11rb::NONE, x11rb::CURRENT_TIME)?;
        self.conn.flush()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Client lifecycle drivers
    // ------------------------------------------------------------------

    /// Bring a top-level window under management.
    pub fn manage(&mut self, window: Window) -> Result<()> {
        if self.clients.contains_key(&window) {
            return Ok(());
        }
        // Nothing observes a half-built frame.
        self.conn.grab_server()?;
        let adopted = ClientWindow::adopt(
            &self.conn,
            &self.screen,
            &self.atoms,
            &self.config,
            window,
            self.workspaces.current_id(),
        );
        self.conn.ungrab_server()?;
        let Some(mut client) = adopted? else {
            return Ok(());
        };

        for handle in client.frame.handles() {
            self.registry.insert(handle, Owner::Client(window));
        }
        self.registry.insert(window, Owner::Client(window));

        client.window_number = self.workspaces.current_mut().add_window(window);
        if let Some(parent) = client.transient_for {
            if let Some(parent_client) = self.clients.get_mut(&parent) {
                parent_client.transient = Some(window);
            }
        }
        client.regenerate_pixmaps(&self.conn, &self.screen, self.renderer.as_ref(), &self.config)?;

        let initially_iconic = client.initial_iconic;
        self.clients.insert(window, client);

        if initially_iconic {
            self.iconify_window(window)?;
        } else {
            if let Some(client) = self.clients.get_mut(&window) {
                client.show(&self.conn, &self.atoms)?;
                client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
            }
            if self.config.behavior.focus_new_windows {
                self.focus_window(Some(window))?;
            }
        }
        self.restack()?;
        self.rebuild_menus()?;
        Ok(())
    }

    /// Drop a window from management. `destroyed` distinguishes a dead
    /// window from one that withdrew itself.
    pub fn unmanage(&mut self, window: Window, destroyed: bool) -> Result<()> {
        let Some(mut client) = self.clients.remove(&window) else {
            return Ok(());
        };
        debug!("unmanaging 0x{:x} (destroyed: {})", window, destroyed);

        if self.drag.cancel_if_target(window) {
            self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        }
        if self
            .pressed_button
            .is_some_and(|button| client.frame.handles().contains(&button))
        {
            self.pressed_button = None;
        }

        if let Some(parent) = client.transient_for {
            if let Some(parent_client) = self.clients.get_mut(&parent) {
                parent_client.transient = None;
            }
        }
        if let Some(child) = client.transient {
            if let Some(child_client) = self.clients.get_mut(&child) {
                child_client.transient_for = None;
            }
        }

        if let Some(handle) = self.icons.destroy_icon(&self.conn, window)? {
            self.registry.remove(handle);
        }
        if let Some(ws) = self.workspaces.get_mut(client.workspace) {
            for (moved, number) in ws.remove_window(window) {
                if let Some(moved_client) = self.clients.get_mut(&moved) {
                    moved_client.window_number = number;
                }
            }
        }
        self.registry.remove_owner(Owner::Client(window));

        if !destroyed {
            client.withdraw(&self.conn, &self.atoms)?;
        }
        client.release(&self.conn, self.screen.root)?;

        if self.focused == Some(window) {
            self.focused = None;
            let next = cycle::next_candidate(&self.candidates(), None);
            self.focus_window(next)?;
        }
        self.restack()?;
        self.rebuild_menus()?;
        Ok(())
    }

    /// Iconify a window and, through the transient chain, every dialog
    /// hanging off it. Each frame is hidden before its icon widget appears.
    pub fn iconify_window(&mut self, window: Window) -> Result<()> {
        let chain = client::transient_chain(&self.clients, window);
        if chain.is_empty() {
            return Ok(());
        }
        let mut dropped_focus = false;
        for target in chain {
            let label = {
                let Some(client) = self.clients.get_mut(&target) else {
                    continue;
                };
                if !client.begin_iconify() {
                    continue;
                }
                client.hide(&self.conn, &self.atoms, WmStateValue::Iconic)?;
                client.icon_title.clone()
            };
            let handle = self.icons.create_icon(
                &self.conn,
                &self.screen,
                &self.config.colors,
                target,
                &label,
            )?;
            self.registry.insert(handle, Owner::Icon(handle));

            if self.focused == Some(target) {
                self.focused = None;
                dropped_focus = true;
            }
        }
        if dropped_focus {
            let next = cycle::next_candidate(&self.candidates(), None);
            self.focus_window(next)?;
        }
        self.rebuild_menus()?;
        Ok(())
    }

    /// Restore an iconified window (and its transients) and focus it. A
    /// window restored while another workspace is showing joins that
    /// workspace instead of yanking the display back to its old one.
    pub fn deiconify_window(&mut self, window: Window) -> Result<()> {
        if !self.clients.contains_key(&window) {
            return Ok(());
        }
        let current = self.workspaces.current_id();
        let chain = client::transient_chain(&self.clients, window);
        for target in chain {
            let iconic = self
                .clients
                .get(&target)
                .is_some_and(|c| c.iconic());
            if !iconic {
                continue;
            }
            self.reassign_workspace(target, current);
            {
                let Some(client) = self.clients.get_mut(&target) else {
                    continue;
                };
                if !client.begin_deiconify() {
                    continue;
                }
                client.show(&self.conn, &self.atoms)?;
                client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
            }
            if let Some(handle) = self.icons.destroy_icon(&self.conn, target)? {
                self.registry.remove(handle);
            }
        }
        self.raise_window(window)?;
        self.focus_window(Some(window))?;
        self.rebuild_menus()?;
        Ok(())
    }

    /// Move a window's workspace membership, renumbering both sides. Pure
    /// bookkeeping; callers handle visibility.
    fn reassign_workspace(&mut self, window: Window, target: usize) {
        let Some(source) = self.clients.get(&window).map(|c| c.workspace) else {
            return;
        };
        if source == target || target >= self.workspaces.len() {
            return;
        }
        if let Some(ws) = self.workspaces.get_mut(source) {
            for (moved, number) in ws.remove_window(window) {
                if let Some(moved_client) = self.clients.get_mut(&moved) {
                    moved_client.window_number = number;
                }
            }
        }
        let number = self
            .workspaces
            .get_mut(target)
            .map(|ws| ws.add_window(window))
            .unwrap_or(0);
        if let Some(client) = self.clients.get_mut(&window) {
            client.workspace = target;
            client.window_number = number;
        }
    }

    // ------------------------------------------------------------------
    // Focus
    // ------------------------------------------------------------------

    /// Move the focus decoration and, model permitting, the input focus.
    /// At most one client carries the focused decoration at any time. The
    /// decoration only follows when SetInputFocus actually ran; globally
    /// active clients confirm through FocusIn instead, and a NoInput
    /// target changes nothing.
    pub fn focus_window(&mut self, target: Option<Window>) -> Result<()> {
        if self.focused == target {
            return Ok(());
        }
        if let Some(window) = target {
            let Some(client) = self.clients.get(&window) else {
                return Ok(());
            };
            if client.iconic() || !client.visible() {
                return Ok(());
            }
            let granted = client.set_input_focus(&self.conn, &self.atoms, x11rb::CURRENT_TIME)?;
            if !granted {
                return Ok(());
            }
        } else {
            self.conn.set_input_focus(
                InputFocus::POINTER_ROOT,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            )?;
        }

        let holder = client::focus_handoff(&self.clients, self.focused, target);
        self.apply_focus_flags(holder)?;
        if let Some(window) = holder {
            if self.config.behavior.raise_on_focus {
                self.raise_window(window)?;
            }
        }
        Ok(())
    }

    /// Repaint both ends of a focus handoff and record the new holder.
    pub(crate) fn apply_focus_flags(&mut self, holder: Option<Window>) -> Result<()> {
        if self.focused == holder {
            return Ok(());
        }
        if let Some(old) = self.focused.take() {
            if let Some(client) = self.clients.get_mut(&old) {
                client.set_focus_flag(&self.conn, &self.text_gc, &self.config.decor, false)?;
            }
        }
        if let Some(window) = holder {
            if let Some(client) = self.clients.get_mut(&window) {
                client.set_focus_flag(&self.conn, &self.text_gc, &self.config.decor, true)?;
            }
        }
        self.focused = holder;
        Ok(())
    }

    /// Focus the next (or previous) window in window-number order.
    pub fn cycle_focus(&mut self, forward: bool) -> Result<()> {
        let candidates = self.candidates();
        let next = if forward {
            cycle::next_candidate(&candidates, self.focused)
        } else {
            cycle::prev_candidate(&candidates, self.focused)
        };
        if next.is_some() {
            self.focus_window(next)?;
        }
        Ok(())
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.workspaces
            .current()
            .windows
            .iter()
            .filter_map(|w| self.clients.get(w))
            .map(|c| Candidate {
                window: c.window,
                accepts_focus: c.focus_model.manager_sets_focus(),
                iconic: c.iconic(),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Stacking
    // ------------------------------------------------------------------

    /// Raise a window and its transient partner, then restack globally.
    pub fn raise_window(&mut self, window: Window) -> Result<()> {
        self.raise_in_workspace(window);
        self.restack()
    }

    fn raise_in_workspace(&mut self, window: Window) {
        let Some(client) = self.clients.get_mut(&window) else {
            return;
        };
        if client.stack_guard {
            return;
        }
        client.stack_guard = true;
        let workspace = client.workspace;
        let partner_above = client.transient;
        let partner_below = client.transient_for;

        // A transient raises its parent beneath it; a parent brings its
        // transient along on top.
        if let Some(parent) = partner_below {
            self.raise_in_workspace(parent);
        }
        if let Some(ws) = self.workspaces.get_mut(workspace) {
            ws.stack = stacking::raise_order(&ws.stack, window);
        }
        if let Some(child) = partner_above {
            self.raise_in_workspace(child);
        }
        if let Some(client) = self.clients.get_mut(&window) {
            client.stack_guard = false;
        }
    }

    /// Lower a window to the back of its workspace stack, dragging its
    /// transient down after it.
    pub fn lower_window(&mut self, window: Window) -> Result<()> {
        self.lower_in_workspace(window);
        self.restack()
    }

    fn lower_in_workspace(&mut self, window: Window) {
        let Some(client) = self.clients.get_mut(&window) else {
            return;
        };
        if client.stack_guard {
            return;
        }
        client.stack_guard = true;
        let workspace = client.workspace;
        let partner = client.transient;

        if let Some(ws) = self.workspaces.get_mut(workspace) {
            ws.stack = stacking::lower_order(&ws.stack, window);
        }
        if let Some(child) = partner {
            self.lower_in_workspace(child);
        }
        if let Some(client) = self.clients.get_mut(&window) {
            client.stack_guard = false;
        }
    }

    /// Push the full session order to the server: visible menus in front,
    /// then the current workspace's frames, the toolbar at the back.
    pub fn restack(&mut self) -> Result<()> {
        let root_menu = self
            .menus
            .get(&ROOT_MENU_ID)
            .filter(|m| m.visible)
            .and_then(|m| m.window);
        let icon_menu = self
            .menus
            .get(&ICON_MENU_ID)
            .filter(|m| m.visible)
            .and_then(|m| m.window);
        let other_menus: Vec<Window> = self
            .menus
            .values()
            .filter(|m| m.id > ICON_MENU_ID && m.visible)
            .filter_map(|m| m.window)
            .collect();
        let frames: Vec<Window> = self
            .workspaces
            .current()
            .stack
            .iter()
            .filter_map(|w| self.clients.get(w))
            .filter(|c| c.visible() && !c.iconic())
            .map(|c| c.frame.frame)
            .collect();
        let order = stacking::assemble_global_stack(
            root_menu,
            icon_menu,
            &other_menus,
            &frames,
            Some(self.toolbar.frame),
        );
        stacking::apply_restack(&self.conn, &order)
    }

    // ------------------------------------------------------------------
    // Workspaces
    // ------------------------------------------------------------------

    /// Switch the visible workspace, hiding the outgoing members first.
    pub fn switch_workspace(&mut self, id: usize) -> Result<()> {
        let old = self.workspaces.current_id();
        if !self.workspaces.switch(id) {
            return Ok(());
        }
        self.focus_window(None)?;

        let outgoing: Vec<Window> = self
            .workspaces
            .get(old)
            .map(|ws| ws.windows.clone())
            .unwrap_or_default();
        for window in outgoing {
            if let Some(client) = self.clients.get_mut(&window) {
                if client.visible() && !client.iconic() {
                    client.hide(&self.conn, &self.atoms, WmStateValue::Normal)?;
                }
            }
        }
        let incoming: Vec<Window> = self.workspaces.current().windows.clone();
        for window in incoming {
            if let Some(client) = self.clients.get_mut(&window) {
                if client.visible() && !client.iconic() {
                    client.show(&self.conn, &self.atoms)?;
                    client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
                }
            }
        }

        let name = self.workspaces.current().name.clone();
        self.toolbar.set_workspace_name(&name);
        self.toolbar.draw(&self.conn, &self.text_gc)?;
        self.restack()?;

        let top = self
            .workspaces
            .current()
            .stack
            .iter()
            .copied()
            .find(|w| {
                self.clients
                    .get(w)
                    .is_some_and(|c| c.visible() && !c.iconic())
            });
        self.focus_window(top)?;
        self.rebuild_menus()?;
        Ok(())
    }

    /// Move a window to another workspace; it disappears from the current
    /// one until that workspace is shown.
    pub fn send_to_workspace(&mut self, window: Window, target: usize) -> Result<()> {
        if target >= self.workspaces.len() {
            return Ok(());
        }
        let Some(client) = self.clients.get(&window) else {
            return Ok(());
        };
        let source = client.workspace;
        if source == target {
            return Ok(());
        }

        self.reassign_workspace(window, target);
        if let Some(client) = self.clients.get_mut(&window) {
            if target != self.workspaces.current_id() && client.visible() && !client.iconic() {
                client.hide(&self.conn, &self.atoms, WmStateValue::Normal)?;
            }
        }
        if self.focused == Some(window) {
            self.focused = None;
            let next = cycle::next_candidate(&self.candidates(), None);
            self.focus_window(next)?;
        }
        self.restack()?;
        self.rebuild_menus()?;
        Ok(())
    }

    /// Remove the last workspace, pulling its members into the current
    /// one. Refused at the floor.
    pub fn remove_last_workspace(&mut self) -> Result<()> {
        let Some(orphans) = self.workspaces.remove_last_workspace() else {
            return Ok(());
        };
        let current = self.workspaces.current_id();
        for window in orphans {
            let number = self
                .workspaces
                .current()
                .windows
                .iter()
                .position(|w| *w == window)
                .unwrap_or(0);
            if let Some(client) = self.clients.get_mut(&window) {
                client.workspace = current;
                client.window_number = number;
                if client.visible() && !client.iconic() {
                    client.show(&self.conn, &self.atoms)?;
                    client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
                }
            }
        }
        self.restack()?;
        self.rebuild_menus()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Maximize helpers
    // ------------------------------------------------------------------

    /// The screen area maximized windows may cover.
    pub fn available_area(&self) -> Geometry {
        self.toolbar.available_area(
            self.screen.width_in_pixels as u32,
            self.screen.height_in_pixels as u32,
        )
    }

    /// Toggle between maximized and the remembered geometry.
    pub fn toggle_maximize(&mut self, window: Window) -> Result<()> {
        let avail = self.available_area();
        let Some(client) = self.clients.get_mut(&window) else {
            return Ok(());
        };
        if client.maximized() {
            client.restore(
                &self.conn,
                &self.screen,
                self.renderer.as_ref(),
                &self.atoms,
                &self.config,
            )?;
        } else {
            client.maximize(
                &self.conn,
                &self.screen,
                self.renderer.as_ref(),
                &self.atoms,
                &self.config,
                &avail,
            )?;
        }
        client.draw_title(&self.conn, &self.text_gc, &self.config.decor)?;
        Ok(())
    }

    /// Swap a titlebar button to its pressed texture; the release puts the
    /// plain background back.
    pub(crate) fn press_button(&mut self, button: Window) -> Result<()> {
        let size = self.config.decor.button_size();
        let pixmap = self.renderer.render_pressed(
            &self.conn,
            &self.screen,
            size,
            size,
            self.config.textures.title,
            self.config.colors.button,
            self.config.colors.title_focused,
        )?;
        self.conn.change_window_attributes(
            button,
            &ChangeWindowAttributesAux::new().background_pixmap(pixmap),
        )?;
        self.conn.clear_area(false, button, 0, 0, 0, 0)?;
        // The server keeps the background alive; drop our reference now.
        self.conn.free_pixmap(pixmap)?;
        self.pressed_button = Some(button);
        Ok(())
    }

    /// Restore the plain background of the button pressed last, if any.
    pub(crate) fn release_pressed_button(&mut self) -> Result<()> {
        if let Some(button) = self.pressed_button.take() {
            self.conn.change_window_attributes(
                button,
                &ChangeWindowAttributesAux::new().background_pixel(self.config.colors.button),
            )?;
            self.conn.clear_area(false, button, 0, 0, 0, 0)?;
        }
        Ok(())
    }

    /// Toggle shaded.
    pub fn toggle_shade(&mut self, window: Window) -> Result<()> {
        let Some(client) = self.clients.get_mut(&window) else {
            return Ok(());
        };
        if client.shaded() {
            client.unshade(&self.conn)?;
        } else {
            client.shade(&self.conn, &self.config.decor)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Menus
    // ------------------------------------------------------------------

    /// Regenerate the contents of every long-lived menu from session
    /// state and repaint the visible ones.
    pub fn rebuild_menus(&mut self) -> Result<()> {
        let workspace_count = self.workspaces.len();
        let icon_items: Vec<menu::MenuItem> = self
            .icons
            .entries()
            .iter()
            .map(|e| menu::MenuItem::new(e.label.clone(), menu::MenuAction::DeiconifyWindow(e.client)))
            .collect();
        let workspace_lists: HashMap<usize, Vec<menu::MenuItem>> = self
            .workspaces
            .workspaces
            .iter()
            .map(|ws| {
                let items = ws
                    .windows
                    .iter()
                    .filter_map(|w| self.clients.get(w))
                    .map(|c| {
                        menu::MenuItem::new(c.title.clone(), menu::MenuAction::FocusWindow(c.window))
                    })
                    .collect();
                (ws.id, items)
            })
            .collect();

        for menu in self.menus.values_mut() {
            match menu.kind {
                MenuKind::Root => menu.set_items(menu::root_menu_items(workspace_count)),
                MenuKind::IconList => menu.set_items(icon_items.clone()),
                MenuKind::Workspace(id) => {
                    menu.set_items(workspace_lists.get(&id).cloned().unwrap_or_default());
                }
                MenuKind::Window(_) | MenuKind::SendTo(_) => {}
            }
            if menu.visible {
                menu.draw(&self.conn, &self.text_gc, &self.config.decor)?;
            }
        }
        Ok(())
    }

    /// Show one of the long-lived menus at a position.
    pub fn show_menu(&mut self, id: u32, x: i32, y: i32) -> Result<()> {
        self.rebuild_menus()?;
        if let Some(menu) = self.menus.get_mut(&id) {
            let window = menu.realize(&self.conn, &self.screen, &self.config.colors)?;
            self.registry.insert(window, Owner::Menu(id));
            menu.show(&self.conn, &self.screen, x, y)?;
            menu.draw(&self.conn, &self.text_gc, &self.config.decor)?;
        }
        self.restack()
    }

    /// Create and show a transient menu (window menu or send-to list).
    pub fn show_transient_menu(
        &mut self,
        kind: MenuKind,
        items: Vec<menu::MenuItem>,
        x: i32,
        y: i32,
    ) -> Result<u32> {
        let id = self.next_menu_id;
        self.next_menu_id += 1;
        if let MenuKind::Window(window) = kind {
            if let Some(client) = self.clients.get_mut(&window) {
                client.flags.insert(crate::wm::client::ClientFlags::MENU_VISIBLE);
            }
        }
        let mut menu = Menu::new(id, kind);
        menu.set_items(items);
        let window = menu.realize(&self.conn, &self.screen, &self.config.colors)?;
        self.registry.insert(window, Owner::Menu(id));
        menu.show(&self.conn, &self.screen, x, y)?;
        menu.draw(&self.conn, &self.text_gc, &self.config.decor)?;
        self.menus.insert(id, menu);
        self.restack()?;
        Ok(id)
    }

    /// Hide every visible menu; transient menus are destroyed outright.
    pub fn hide_menus(&mut self) -> Result<()> {
        let transient_ids: Vec<u32> = self
            .menus
            .values()
            .filter(|m| m.id > ICON_MENU_ID && !matches!(m.kind, MenuKind::Workspace(_)))
            .map(|m| m.id)
            .collect();
        for id in transient_ids {
            if let Some(mut menu) = self.menus.remove(&id) {
                if let Some(window) = menu.window {
                    self.registry.remove(window);
                }
                menu.destroy(&self.conn)?;
            }
        }
        for menu in self.menus.values_mut() {
            if menu.visible {
                menu.hide(&self.conn)?;
            }
        }
        for client in self.clients.values_mut() {
            client.flags.remove(crate::wm::client::ClientFlags::MENU_VISIBLE);
        }
        Ok(())
    }

    /// Perform a selected menu action. Every branch closes the menus
    /// first; reconfigure and exit are deferred to the loop edge.
    pub fn execute_action(&mut self, action: menu::MenuAction) -> Result<()> {
        use menu::MenuAction;
        // The send-to submenu opens next to its parent menu and keeps the
        // other menus up; everything else closes them first.
        if let MenuAction::OpenSendTo(window) = action {
            let current = self
                .clients
                .get(&window)
                .map(|c| c.workspace)
                .unwrap_or_default();
            let items = menu::send_to_items(window, self.workspaces.len(), current);
            let (x, y) = self
                .menus
                .values()
                .find(|m| matches!(m.kind, MenuKind::Window(w) if w == window))
                .map(|m| (m.x + menu::MENU_WIDTH as i32, m.y))
                .unwrap_or((0, 0));
            self.show_transient_menu(MenuKind::SendTo(window), items, x, y)?;
            return Ok(());
        }
        if action == MenuAction::None {
            return Ok(());
        }
        self.hide_menus()?;
        match action {
            MenuAction::SwitchWorkspace(id) => self.switch_workspace(id)?,
            MenuAction::AddWorkspace => {
                self.workspaces.add_workspace();
                self.rebuild_menus()?;
            }
            MenuAction::RemoveLastWorkspace => self.remove_last_workspace()?,
            MenuAction::Reconfigure => self.pending_reload = true,
            MenuAction::Exit => self.running = false,
            MenuAction::FocusWindow(window) => {
                self.raise_window(window)?;
                self.focus_window(Some(window))?;
            }
            MenuAction::DeiconifyWindow(window) => self.deiconify_window(window)?,
            MenuAction::SendToWorkspace(window, target) => {
                self.send_to_workspace(window, target)?
            }
            MenuAction::IconifyWindow(window) => self.iconify_window(window)?,
            MenuAction::RaiseWindow(window) => self.raise_window(window)?,
            MenuAction::LowerWindow(window) => self.lower_window(window)?,
            MenuAction::MaximizeWindow(window) => self.toggle_maximize(window)?,
            MenuAction::ShadeWindow(window) => self.toggle_shade(window)?,
            MenuAction::CloseWindow(window) => {
                if let Some(client) = self.clients.get(&window) {
                    client.close(&self.conn, &self.atoms)?;
                }
            }
            MenuAction::None | MenuAction::OpenSendTo(_) => {}
        }
        Ok(())
    }
}

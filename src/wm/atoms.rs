//! ICCCM atom handling
//!
//! Interns the atoms the manager speaks and wraps the small client-message
//! protocols built on top of them (WM_STATE publication, WM_DELETE_WINDOW,
//! WM_TAKE_FOCUS, synthetic ConfigureNotify).

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

/// The externally visible lifecycle states published in WM_STATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmStateValue {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

/// Holds all interned atoms.
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub motif_wm_hints: Atom,
}

impl Atoms {
    /// Intern every atom the manager uses. One round trip per atom at
    /// startup only.
    pub fn new(conn: &RustConnection) -> Result<Self> {
        let intern = |name: &[u8]| -> Result<Atom> {
            Ok(conn
                .intern_atom(false, name)?
                .reply()
                .with_context(|| {
                    format!("failed to intern atom {}", String::from_utf8_lossy(name))
                })?
                .atom)
        };

        Ok(Self {
            wm_state: intern(b"WM_STATE")?,
            wm_change_state: intern(b"WM_CHANGE_STATE")?,
            wm_protocols: intern(b"WM_PROTOCOLS")?,
            wm_delete_window: intern(b"WM_DELETE_WINDOW")?,
            wm_take_focus: intern(b"WM_TAKE_FOCUS")?,
            motif_wm_hints: intern(b"_MOTIF_WM_HINTS")?,
        })
    }

    /// Publish the WM_STATE property on a client window.
    ///
    /// WM_STATE carries the state value and the icon window (None here, the
    /// icon widget owns its own handle).
    pub fn publish_wm_state(
        &self,
        conn: &RustConnection,
        window: Window,
        state: WmStateValue,
    ) -> Result<()> {
        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.wm_state,
            self.wm_state,
            &[state as u32, 0],
        )?;
        Ok(())
    }

    /// Send a WM_DELETE_WINDOW close request. The caller must have checked
    /// that the client advertises the protocol.
    pub fn send_delete_window(&self, conn: &RustConnection, window: Window) -> Result<()> {
        self.send_protocol(conn, window, self.wm_delete_window, x11rb::CURRENT_TIME)
    }

    /// Send a WM_TAKE_FOCUS message for clients with a locally- or
    /// globally-active focus model.
    pub fn send_take_focus(
        &self,
        conn: &RustConnection,
        window: Window,
        time: Timestamp,
    ) -> Result<()> {
        self.send_protocol(conn, window, self.wm_take_focus, time)
    }

    fn send_protocol(
        &self,
        conn: &RustConnection,
        window: Window,
        protocol: Atom,
        time: Timestamp,
    ) -> Result<()> {
        let event = ClientMessageEvent::new(
            32,
            window,
            self.wm_protocols,
            [protocol, time, 0, 0, 0],
        );
        conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    /// Synthesize a ConfigureNotify so the client learns its new root
    /// position. Required on pure moves, where the server sends no real
    /// ConfigureNotify for the client window itself.
    pub fn send_synthetic_configure(
        &self,
        conn: &RustConnection,
        window: Window,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: x as i16,
            y: y as i16,
            width: width as u16,
            height: height as u16,
            border_width: 0,
            override_redirect: false,
        };
        conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }
}

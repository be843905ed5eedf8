//! Client hint readers
//!
//! WM_NORMAL_HINTS, WM_HINTS, WM_PROTOCOLS and Motif decoration hints,
//! plus the size clamping arithmetic built on top of them. Malformed or
//! missing hints are replaced with conservative defaults; a client can
//! never make the manager fail here.

use anyhow::Result;
use bitflags::bitflags;
use tracing::debug;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

// XSizeHints flag bits.
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_ASPECT: u32 = 1 << 7;
const P_BASE_SIZE: u32 = 1 << 8;

// XWMHints flag bits.
const INPUT_HINT: u32 = 1 << 0;
const STATE_HINT: u32 = 1 << 1;

// WM_HINTS initial_state values.
const ICONIC_STATE: u32 = 3;

bitflags! {
    /// Protocols the client advertises in WM_PROTOCOLS.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Protocols: u32 {
        const DELETE_WINDOW = 1 << 0;
        const TAKE_FOCUS    = 1 << 1;
    }
}

/// The client-declared focus policy, per ICCCM table 4-2. Derived once
/// from the input hint and WM_TAKE_FOCUS participation, re-derived on
/// property change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusModel {
    /// Never give this window input focus.
    NoInput,
    /// The manager assigns focus; the client never asks for it.
    Passive,
    /// The manager assigns focus, the client also moves it among its own
    /// subwindows via WM_TAKE_FOCUS.
    LocallyActive,
    /// The client manages focus entirely; the manager only sends
    /// WM_TAKE_FOCUS and must not call SetInputFocus itself.
    GloballyActive,
}

impl FocusModel {
    /// A missing input hint is treated as passive focus.
    pub fn derive(input: Option<bool>, takes_focus: bool) -> Self {
        match (input.unwrap_or(true), takes_focus) {
            (true, false) => FocusModel::Passive,
            (true, true) => FocusModel::LocallyActive,
            (false, true) => FocusModel::GloballyActive,
            (false, false) => FocusModel::NoInput,
        }
    }

    /// Whether the manager is permitted to call SetInputFocus itself.
    pub fn manager_sets_focus(&self) -> bool {
        matches!(self, FocusModel::Passive | FocusModel::LocallyActive)
    }
}

/// WM_NORMAL_HINTS with defaults already substituted. `clamp` is total:
/// whatever the client sent, the result is a usable size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalHints {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub width_inc: u32,
    pub height_inc: u32,
    pub base_width: u32,
    pub base_height: u32,
    /// (numerator, denominator); (0, 0) disables the bound.
    pub min_aspect: (u32, u32),
    pub max_aspect: (u32, u32),
    pub user_position: bool,
}

impl NormalHints {
    /// Defaults for a client with no usable hints: bounded by the screen,
    /// unit increments, free aspect.
    pub fn fallback(screen_width: u32, screen_height: u32) -> Self {
        Self {
            min_width: 1,
            min_height: 1,
            max_width: screen_width.max(1),
            max_height: screen_height.max(1),
            width_inc: 1,
            height_inc: 1,
            base_width: 0,
            base_height: 0,
            min_aspect: (0, 0),
            max_aspect: (0, 0),
            user_position: false,
        }
    }

    /// Whether the client declares a fixed size. Fixed-size windows get no
    /// resize handle or maximize button.
    pub fn fixed_size(&self) -> bool {
        self.min_width == self.max_width && self.min_height == self.max_height
    }

    /// Read WM_NORMAL_HINTS from the server, substituting defaults for
    /// absent or self-contradictory fields.
    pub fn read(
        conn: &RustConnection,
        window: Window,
        screen_width: u32,
        screen_height: u32,
    ) -> Result<Self> {
        let mut hints = Self::fallback(screen_width, screen_height);

        let reply = match conn
            .get_property(false, window, AtomEnum::WM_NORMAL_HINTS, AtomEnum::WM_SIZE_HINTS, 0, 18)?
            .reply()
        {
            Ok(reply) => reply,
            // The window may be gone already; keep the defaults.
            Err(_) => return Ok(hints),
        };

        let values: Vec<u32> = match reply.value32() {
            Some(value32) => value32.take(18).collect(),
            None => return Ok(hints),
        };
        if values.len() < 18 {
            debug!("window 0x{:x}: short WM_NORMAL_HINTS, using defaults", window);
            return Ok(hints);
        }

        let flags = values[0];
        // USPosition (bit 0) or PPosition (bit 2).
        hints.user_position = flags & 0b101 != 0;

        if flags & P_MIN_SIZE != 0 {
            hints.min_width = values[5].max(1);
            hints.min_height = values[6].max(1);
        }
        if flags & P_MAX_SIZE != 0 && values[7] > 0 && values[8] > 0 {
            hints.max_width = values[7];
            hints.max_height = values[8];
        }
        // A client claiming max < min is malformed; widen max to min.
        hints.max_width = hints.max_width.max(hints.min_width);
        hints.max_height = hints.max_height.max(hints.min_height);

        if flags & P_RESIZE_INC != 0 {
            hints.width_inc = values[9].max(1);
            hints.height_inc = values[10].max(1);
        }
        if flags & P_ASPECT != 0 {
            hints.min_aspect = (values[11], values[12]);
            hints.max_aspect = (values[13], values[14]);
        }
        if flags & P_BASE_SIZE != 0 {
            hints.base_width = values[15];
            hints.base_height = values[16];
        }

        Ok(hints)
    }

    /// Clamp a requested client size to the hints: min/max bounds, aspect
    /// bounds, then rounding down to the resize increment above the base
    /// size.
    pub fn clamp(&self, width: u32, height: u32) -> (u32, u32) {
        let mut w = width.clamp(self.min_width, self.max_width);
        let mut h = height.clamp(self.min_height, self.max_height);

        // Aspect fields are raw client-supplied u32s; widen before
        // multiplying so no ratio can overflow.
        let (min_num, min_den) = self.min_aspect;
        if min_num > 0 && min_den > 0 && u64::from(w) * u64::from(min_den) < u64::from(h) * u64::from(min_num) {
            let bounded = (u64::from(w) * u64::from(min_den) / u64::from(min_num)).min(u64::from(u32::MAX)) as u32;
            h = bounded.clamp(self.min_height, self.max_height);
        }
        let (max_num, max_den) = self.max_aspect;
        if max_num > 0 && max_den > 0 && u64::from(w) * u64::from(max_den) > u64::from(h) * u64::from(max_num) {
            let bounded = (u64::from(h) * u64::from(max_num) / u64::from(max_den)).min(u64::from(u32::MAX)) as u32;
            w = bounded.clamp(self.min_width, self.max_width);
        }

        if self.width_inc > 1 {
            let over = w.saturating_sub(self.base_width);
            w = (self.base_width + (over / self.width_inc) * self.width_inc).max(self.min_width);
        }
        if self.height_inc > 1 {
            let over = h.saturating_sub(self.base_height);
            h = (self.base_height + (over / self.height_inc) * self.height_inc)
                .max(self.min_height);
        }

        (w, h)
    }
}

/// WM_HINTS fields the manager cares about.
#[derive(Debug, Clone, Copy, Default)]
pub struct WmHints {
    /// The input hint, `None` when the flag is unset.
    pub input: Option<bool>,
    /// Whether the initial-state hint asks for Iconic.
    pub initial_iconic: bool,
}

impl WmHints {
    pub fn read(conn: &RustConnection, window: Window) -> Result<Self> {
        let mut hints = Self::default();

        let reply = match conn
            .get_property(false, window, AtomEnum::WM_HINTS, AtomEnum::WM_HINTS, 0, 9)?
            .reply()
        {
            Ok(reply) => reply,
            Err(_) => return Ok(hints),
        };
        let values: Vec<u32> = match reply.value32() {
            Some(value32) => value32.take(9).collect(),
            None => return Ok(hints),
        };
        if values.len() < 9 {
            return Ok(hints);
        }

        let flags = values[0];
        if flags & INPUT_HINT != 0 {
            hints.input = Some(values[1] != 0);
        }
        if flags & STATE_HINT != 0 {
            hints.initial_iconic = values[2] == ICONIC_STATE;
        }

        Ok(hints)
    }
}

/// Read the WM_PROTOCOLS list into a flag set. Unknown protocols are
/// ignored.
pub fn read_protocols(
    conn: &RustConnection,
    atoms: &crate::wm::atoms::Atoms,
    window: Window,
) -> Result<Protocols> {
    let mut protocols = Protocols::empty();

    let reply = match conn
        .get_property(false, window, atoms.wm_protocols, AtomEnum::ATOM, 0, 32)?
        .reply()
    {
        Ok(reply) => reply,
        Err(_) => return Ok(protocols),
    };
    if let Some(value32) = reply.value32() {
        for atom in value32 {
            if atom == atoms.wm_delete_window {
                protocols |= Protocols::DELETE_WINDOW;
            } else if atom == atoms.wm_take_focus {
                protocols |= Protocols::TAKE_FOCUS;
            }
        }
    }

    Ok(protocols)
}

/// Whether Motif hints ask for a decorated window. `None` when the
/// property is absent or does not speak about decorations.
pub fn motif_wants_decorations(
    conn: &RustConnection,
    atoms: &crate::wm::atoms::Atoms,
    window: Window,
) -> Result<Option<bool>> {
    const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

    let reply = match conn
        .get_property(false, window, atoms.motif_wm_hints, atoms.motif_wm_hints, 0, 5)?
        .reply()
    {
        Ok(reply) => reply,
        Err(_) => return Ok(None),
    };
    let values: Vec<u32> = match reply.value32() {
        Some(value32) => value32.take(5).collect(),
        None => return Ok(None),
    };
    if values.len() < 3 {
        return Ok(None);
    }

    let flags = values[0];
    if flags & MWM_HINTS_DECORATIONS == 0 {
        return Ok(None);
    }
    Ok(Some(values[2] != 0))
}

/// Read a text property (WM_NAME, WM_ICON_NAME) as a lossy string.
pub fn read_text_property(
    conn: &RustConnection,
    window: Window,
    property: Atom,
) -> Result<Option<String>> {
    let reply = match conn
        .get_property(false, window, property, AtomEnum::ANY, 0, 1024)?
        .reply()
    {
        Ok(reply) => reply,
        Err(_) => return Ok(None),
    };
    if reply.value.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
}

/// Read WM_TRANSIENT_FOR. Returns the declared owner window, if any.
pub fn read_transient_for(conn: &RustConnection, window: Window) -> Result<Option<Window>> {
    let reply = match conn
        .get_property(false, window, AtomEnum::WM_TRANSIENT_FOR, AtomEnum::WINDOW, 0, 1)?
        .reply()
    {
        Ok(reply) => reply,
        Err(_) => return Ok(None),
    };
    if let Some(mut value32) = reply.value32() {
        if let Some(owner) = value32.next() {
            if owner != 0 {
                return Ok(Some(owner));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> NormalHints {
        NormalHints::fallback(1920, 1080)
    }

    #[test]
    fn clamp_respects_min_max() {
        let mut h = hints();
        h.min_width = 100;
        h.min_height = 50;
        h.max_width = 800;
        h.max_height = 600;

        assert_eq!(h.clamp(10, 10), (100, 50));
        assert_eq!(h.clamp(5000, 5000), (800, 600));
        assert_eq!(h.clamp(400, 300), (400, 300));
    }

    #[test]
    fn clamp_rounds_to_resize_increment() {
        let mut h = hints();
        h.base_width = 10;
        h.base_height = 20;
        h.width_inc = 8;
        h.height_inc = 16;

        // 10 + 8k below 100 is 98; 20 + 16k below 100 is exactly 100.
        assert_eq!(h.clamp(100, 100), (98, 100));
    }

    #[test]
    fn clamp_never_drops_below_min_after_rounding() {
        let mut h = hints();
        h.min_width = 50;
        h.width_inc = 40;
        h.base_width = 0;

        let (w, _) = h.clamp(55, 100);
        assert!(w >= h.min_width);
    }

    #[test]
    fn clamp_applies_aspect_bounds() {
        let mut h = hints();
        // At least as wide as tall, at most twice as wide as tall.
        h.min_aspect = (1, 1);
        h.max_aspect = (2, 1);

        let (_, clamped_h) = h.clamp(100, 300);
        assert!(clamped_h <= 100);

        let (clamped_w, _) = h.clamp(500, 100);
        assert!(clamped_w <= 200);
    }

    #[test]
    fn clamp_survives_extreme_aspect_ratios() {
        // Nothing stops a client from storing arbitrary u32s in the
        // aspect fields; the clamp must still produce a usable size.
        let mut h = hints();
        h.min_aspect = (4_000_000_000, 4_000_000_000);
        h.max_aspect = (u32::MAX, 1);
        let (w, ch) = h.clamp(1000, 500);
        assert!(w >= h.min_width && w <= h.max_width);
        assert!(ch >= h.min_height && ch <= h.max_height);
    }

    #[test]
    fn fixed_size_detection() {
        let mut h = hints();
        h.min_width = 640;
        h.max_width = 640;
        h.min_height = 480;
        h.max_height = 480;
        assert!(h.fixed_size());
        assert!(!hints().fixed_size());
    }

    #[test]
    fn focus_model_derivation() {
        assert_eq!(FocusModel::derive(Some(true), false), FocusModel::Passive);
        assert_eq!(FocusModel::derive(Some(true), true), FocusModel::LocallyActive);
        assert_eq!(FocusModel::derive(Some(false), true), FocusModel::GloballyActive);
        assert_eq!(FocusModel::derive(Some(false), false), FocusModel::NoInput);
        // Missing input hint defaults to passive behavior.
        assert_eq!(FocusModel::derive(None, false), FocusModel::Passive);
    }

    #[test]
    fn manager_sets_focus_only_for_passive_and_locally_active() {
        assert!(FocusModel::Passive.manager_sets_focus());
        assert!(FocusModel::LocallyActive.manager_sets_focus());
        assert!(!FocusModel::NoInput.manager_sets_focus());
        assert!(!FocusModel::GloballyActive.manager_sets_focus());
    }
}

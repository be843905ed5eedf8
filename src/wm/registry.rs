//! Window registry
//!
//! Maps every X window handle the manager creates or adopts to the object
//! that owns it. The event dispatcher resolves each inbound event through
//! this table; a handle with no entry simply has no owner, which is normal
//! for windows the server has already recycled.

use std::collections::HashMap;

use tracing::trace;
use x11rb::protocol::xproto::Window;

/// A region of the toolbar, each backed by its own sub-window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarRegion {
    Frame,
    WorkspaceLabel,
    PrevWorkspace,
    NextWorkspace,
    IconList,
    Clock,
}

/// The object owning a given handle. Owners are plain ids, never pointers;
/// destruction removes the id from the table before the object goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Any handle belonging to a managed client: the client window itself,
    /// its frame, or a decoration sub-window. Carries the client window id.
    Client(Window),
    /// An icon handle standing in for an iconified client.
    Icon(Window),
    /// A menu, identified by the id the session assigned at creation.
    Menu(u32),
    /// A toolbar region.
    Toolbar(ToolbarRegion),
}

/// Handle-to-owner table.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    map: HashMap<Window, Owner>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    /// Register a handle. A handle belongs to exactly one owner; inserting
    /// twice replaces the previous entry (the server may recycle ids).
    pub fn insert(&mut self, handle: Window, owner: Owner) {
        trace!("registry: insert 0x{:x} -> {:?}", handle, owner);
        self.map.insert(handle, owner);
    }

    /// Drop a handle. Removing an absent handle is a no-op.
    pub fn remove(&mut self, handle: Window) {
        trace!("registry: remove 0x{:x}", handle);
        self.map.remove(&handle);
    }

    /// Resolve a handle to its owner. `None` means "no owner", never an
    /// error.
    pub fn lookup(&self, handle: Window) -> Option<Owner> {
        self.map.get(&handle).copied()
    }

    /// Remove every handle belonging to `owner`. Used when a client or menu
    /// is torn down, so no stale entry can resolve afterwards.
    pub fn remove_owner(&mut self, owner: Owner) {
        self.map.retain(|_, o| *o != owner);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_registered_handles() {
        let mut registry = WindowRegistry::new();
        registry.insert(100, Owner::Client(100));
        registry.insert(101, Owner::Client(100)); // frame
        registry.insert(200, Owner::Toolbar(ToolbarRegion::Clock));

        assert_eq!(registry.lookup(101), Some(Owner::Client(100)));
        assert_eq!(registry.lookup(200), Some(Owner::Toolbar(ToolbarRegion::Clock)));
    }

    #[test]
    fn dangling_lookup_is_no_owner() {
        let registry = WindowRegistry::new();
        assert_eq!(registry.lookup(0xdead), None);
    }

    #[test]
    fn remove_owner_drops_every_sub_handle() {
        let mut registry = WindowRegistry::new();
        registry.insert(100, Owner::Client(100));
        registry.insert(101, Owner::Client(100));
        registry.insert(102, Owner::Client(100));
        registry.insert(300, Owner::Client(300));

        registry.remove_owner(Owner::Client(100));

        assert_eq!(registry.lookup(100), None);
        assert_eq!(registry.lookup(101), None);
        assert_eq!(registry.lookup(102), None);
        assert_eq!(registry.lookup(300), Some(Owner::Client(300)));
    }

    #[test]
    fn removing_absent_handle_is_a_noop() {
        let mut registry = WindowRegistry::new();
        registry.remove(42);
        assert!(registry.is_empty());
    }
}

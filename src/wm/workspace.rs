//! Workspaces
//!
//! Independent desktops, each with its own membership list (window-number
//! order, drives the workspace menu) and its own front-to-back stack.
//! Exactly one workspace is current; switching hides the outgoing set
//! before showing the incoming one. All bookkeeping here is pure; the
//! session applies the results against the server.

use tracing::{debug, info};
use x11rb::protocol::xproto::Window;

use crate::config::WorkspaceConfig;

/// Hard ceiling on the workspace count.
pub const MAX_WORKSPACES: usize = 25;

/// Floor: removal is refused once this many remain.
pub const MIN_WORKSPACES: usize = 2;

#[derive(Debug)]
pub struct Workspace {
    pub id: usize,
    pub name: String,
    /// Members in window-number order. A window's index here is its
    /// window number.
    pub windows: Vec<Window>,
    /// Members front-to-back. Always the same set as `windows`.
    pub stack: Vec<Window>,
}

impl Workspace {
    pub fn new(id: usize, name: String) -> Self {
        Self { id, name, windows: Vec::new(), stack: Vec::new() }
    }

    /// Add a window: it takes the next window number and the front of the
    /// stack. Returns the assigned window number.
    pub fn add_window(&mut self, window: Window) -> usize {
        let number = self.windows.len();
        self.windows.push(window);
        self.stack.insert(0, window);
        number
    }

    /// Remove a window and renumber everything after it. Returns the list
    /// of (window, new_number) pairs that changed so the session can
    /// update the clients. Removing a non-member is a no-op.
    pub fn remove_window(&mut self, window: Window) -> Vec<(Window, usize)> {
        let Some(index) = self.windows.iter().position(|w| *w == window) else {
            return Vec::new();
        };
        self.windows.remove(index);
        self.stack.retain(|w| *w != window);
        self.windows[index..]
            .iter()
            .enumerate()
            .map(|(offset, w)| (*w, index + offset))
            .collect()
    }

    pub fn contains(&self, window: Window) -> bool {
        self.windows.contains(&window)
    }
}

#[derive(Debug)]
pub struct WorkspaceManager {
    pub workspaces: Vec<Workspace>,
    current: usize,
}

impl WorkspaceManager {
    /// Build the startup set from the configuration; the count is clamped
    /// to 1..=MAX_WORKSPACES and unnamed workspaces are numbered.
    pub fn new(config: &WorkspaceConfig) -> Self {
        let count = config.count.clamp(1, MAX_WORKSPACES);
        let workspaces = (0..count)
            .map(|id| {
                let name = config
                    .names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("Workspace {}", id + 1));
                Workspace::new(id, name)
            })
            .collect();
        info!("created {} workspaces", count);
        Self { workspaces, current: 0 }
    }

    pub fn current_id(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Workspace {
        &self.workspaces[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Workspace {
        &mut self.workspaces[self.current]
    }

    pub fn get(&self, id: usize) -> Option<&Workspace> {
        self.workspaces.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Workspace> {
        self.workspaces.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    /// Append one workspace. Refused at the ceiling.
    pub fn add_workspace(&mut self) -> Option<usize> {
        if self.workspaces.len() >= MAX_WORKSPACES {
            debug!("workspace ceiling reached, not adding");
            return None;
        }
        let id = self.workspaces.len();
        self.workspaces
            .push(Workspace::new(id, format!("Workspace {}", id + 1)));
        info!("added workspace {}", id);
        Some(id)
    }

    /// Remove the last workspace, reassigning its members to the current
    /// one. Refused while MIN_WORKSPACES or fewer remain; returns the
    /// orphaned windows (now members of the current workspace) so the
    /// session can renumber and re-place them, or None when refused.
    pub fn remove_last_workspace(&mut self) -> Option<Vec<Window>> {
        if self.workspaces.len() <= MIN_WORKSPACES {
            debug!("workspace floor reached, not removing");
            return None;
        }
        let removed = self.workspaces.pop()?;
        if self.current >= self.workspaces.len() {
            self.current = self.workspaces.len() - 1;
        }
        let orphans = removed.windows;
        for window in &orphans {
            self.workspaces[self.current].add_window(*window);
        }
        info!(
            "removed workspace {}, moved {} windows to workspace {}",
            removed.id,
            orphans.len(),
            self.current
        );
        Some(orphans)
    }

    /// Switch the current workspace. Switching to the current id or to an
    /// unknown id is a no-op; returns whether a switch happened. The
    /// session hides the outgoing members before showing the incoming
    /// ones.
    pub fn switch(&mut self, id: usize) -> bool {
        if id == self.current || id >= self.workspaces.len() {
            return false;
        }
        debug!("switching workspace {} -> {}", self.current, id);
        self.current = id;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(count: usize) -> WorkspaceManager {
        WorkspaceManager::new(&WorkspaceConfig { count, names: Vec::new() })
    }

    #[test]
    fn startup_with_single_workspace_and_growth() {
        let mut m = manager(1);
        assert_eq!(m.len(), 1);
        assert_eq!(m.current_id(), 0);

        assert_eq!(m.add_workspace(), Some(1));
        assert_eq!(m.add_workspace(), Some(2));
        assert_eq!(m.len(), 3);

        assert!(m.switch(2));
        assert_eq!(m.current_id(), 2);
    }

    #[test]
    fn removal_is_refused_at_the_floor() {
        let mut m = manager(2);
        assert!(m.remove_last_workspace().is_none());
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn removal_reassigns_members_to_current() {
        let mut m = manager(3);
        m.get_mut(2).unwrap().add_window(500);
        m.get_mut(2).unwrap().add_window(501);

        let orphans = m.remove_last_workspace().expect("above the floor");
        assert_eq!(orphans, vec![500, 501]);
        assert_eq!(m.len(), 2);
        assert!(m.current().contains(500));
        assert!(m.current().contains(501));
    }

    #[test]
    fn removing_the_current_workspace_retargets_current() {
        let mut m = manager(3);
        m.switch(2);
        m.remove_last_workspace();
        assert_eq!(m.current_id(), 1);
    }

    #[test]
    fn ceiling_is_enforced() {
        let mut m = manager(MAX_WORKSPACES);
        assert!(m.add_workspace().is_none());
        assert_eq!(m.len(), MAX_WORKSPACES);
    }

    #[test]
    fn switch_to_current_or_unknown_is_a_noop() {
        let mut m = manager(4);
        assert!(!m.switch(0));
        assert!(!m.switch(99));
        assert_eq!(m.current_id(), 0);
    }

    #[test]
    fn window_numbers_follow_arrival_and_compact_on_removal() {
        let mut ws = Workspace::new(0, "test".into());
        assert_eq!(ws.add_window(10), 0);
        assert_eq!(ws.add_window(11), 1);
        assert_eq!(ws.add_window(12), 2);
        // Newest window fronts the stack.
        assert_eq!(ws.stack, vec![12, 11, 10]);

        let renumbered = ws.remove_window(11);
        assert_eq!(renumbered, vec![(12, 1)]);
        assert_eq!(ws.windows, vec![10, 12]);
    }

    #[test]
    fn restoring_elsewhere_moves_the_membership_not_the_display() {
        // A window iconified on workspace 1 and restored while workspace 0
        // is showing joins workspace 0; the current workspace never moves.
        let mut m = manager(2);
        m.get_mut(1).unwrap().add_window(500);
        m.get_mut(1).unwrap().add_window(501);

        let renumbered = m.get_mut(1).unwrap().remove_window(500);
        assert_eq!(renumbered, vec![(501, 0)]);
        let number = m.current_mut().add_window(500);

        assert_eq!(m.current_id(), 0);
        assert_eq!(number, 0);
        assert!(m.current().contains(500));
        assert!(!m.get(1).unwrap().contains(500));
    }

    #[test]
    fn removing_non_member_changes_nothing() {
        let mut ws = Workspace::new(0, "test".into());
        ws.add_window(10);
        assert!(ws.remove_window(99).is_empty());
        assert_eq!(ws.windows, vec![10]);
    }
}

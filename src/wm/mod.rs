//! Window management core: client lifecycle, workspaces, stacking,
//! decorations, menus, toolbar and the session event loop.

pub mod atoms;
pub mod client;
pub mod cycle;
pub mod decorations;
pub mod events;
pub mod hints;
pub mod icons;
pub mod menu;
pub mod moveresize;
pub mod registry;
pub mod session;
pub mod stacking;
pub mod toolbar;
pub mod workspace;

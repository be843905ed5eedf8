//! Stacking order
//!
//! Per-workspace window stacks plus the session-wide assembly that layers
//! menus, client frames and the toolbar into one front-to-back order. The
//! order math is pure; `apply_restack` pushes a computed order to the
//! server as a sibling chain.

use anyhow::Result;
use tracing::trace;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

/// Move `target` to the front of `stack` (index 0 is frontmost). Order of
/// the remaining entries is preserved. Unknown targets are appended, so
/// the result always contains the target exactly once.
pub fn raise_order(stack: &[Window], target: Window) -> Vec<Window> {
    let mut out = Vec::with_capacity(stack.len() + 1);
    out.push(target);
    out.extend(stack.iter().copied().filter(|w| *w != target));
    out
}

/// Move `target` to the back of `stack`.
pub fn lower_order(stack: &[Window], target: Window) -> Vec<Window> {
    let mut out: Vec<Window> = stack.iter().copied().filter(|w| *w != target).collect();
    out.push(target);
    out
}

/// Assemble the session-wide front-to-back order: menus in front of
/// every client frame, the toolbar behind everything. Hidden elements are
/// simply absent from the inputs.
pub fn assemble_global_stack(
    root_menu: Option<Window>,
    icon_menu: Option<Window>,
    workspace_menus: &[Window],
    window_frames: &[Window],
    toolbar: Option<Window>,
) -> Vec<Window> {
    let mut order = Vec::with_capacity(
        workspace_menus.len() + window_frames.len() + 3,
    );
    order.extend(root_menu);
    order.extend(icon_menu);
    order.extend_from_slice(workspace_menus);
    order.extend_from_slice(window_frames);
    order.extend(toolbar);
    order
}

/// Restack an entire front-to-back order in one pass: the first window is
/// raised to the top, each following one is placed directly below its
/// predecessor.
pub fn apply_restack(conn: &RustConnection, order: &[Window]) -> Result<()> {
    let Some((&front, rest)) = order.split_first() else {
        return Ok(());
    };
    trace!("restacking {} windows", order.len());
    conn.configure_window(
        front,
        &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
    )?;
    let mut above = front;
    for &window in rest {
        conn.configure_window(
            window,
            &ConfigureWindowAux::new().sibling(above).stack_mode(StackMode::BELOW),
        )?;
        above = window;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_moves_to_front_preserving_rest() {
        let stack = vec![1, 2, 3, 4];
        assert_eq!(raise_order(&stack, 3), vec![3, 1, 2, 4]);
        assert_eq!(raise_order(&stack, 1), vec![1, 2, 3, 4]);
    }

    #[test]
    fn lower_moves_to_back_preserving_rest() {
        let stack = vec![1, 2, 3, 4];
        assert_eq!(lower_order(&stack, 2), vec![1, 3, 4, 2]);
        assert_eq!(lower_order(&stack, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn lowering_an_owner_takes_its_transient_along() {
        // Lowering propagates down the transient link after the target,
        // so a dialog never stays stranded in front of unrelated windows.
        let stack = vec![20, 10, 30, 40]; // 20 is the dialog of 10
        let after_owner = lower_order(&stack, 10);
        assert_eq!(after_owner, vec![20, 30, 40, 10]);
        let after_pair = lower_order(&after_owner, 20);
        assert_eq!(after_pair, vec![30, 40, 10, 20]);
    }

    #[test]
    fn raise_unknown_target_still_lands_in_front() {
        let stack = vec![1, 2];
        assert_eq!(raise_order(&stack, 9), vec![9, 1, 2]);
    }

    #[test]
    fn global_stack_layers_menus_over_windows_over_toolbar() {
        let order = assemble_global_stack(
            Some(100),
            Some(101),
            &[110, 111],
            &[200, 201, 202],
            Some(300),
        );
        assert_eq!(order, vec![100, 101, 110, 111, 200, 201, 202, 300]);

        let windows_start = order.iter().position(|w| *w == 200).unwrap();
        for menu in [100, 101, 110, 111] {
            assert!(order.iter().position(|w| *w == menu).unwrap() < windows_start);
        }
        assert_eq!(order.last(), Some(&300));
    }

    #[test]
    fn hidden_elements_are_simply_absent() {
        let order = assemble_global_stack(None, None, &[], &[200], None);
        assert_eq!(order, vec![200]);
        assert!(assemble_global_stack(None, None, &[], &[], None).is_empty());
    }
}

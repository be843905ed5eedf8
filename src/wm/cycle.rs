//! Focus cycling
//!
//! Next/previous focus candidate within the current workspace, by window
//! number. Windows that refuse input and iconified windows are skipped.
//! The search is bounded to one full pass over the membership list; if
//! nothing accepts focus, cycling gives up instead of spinning.

use x11rb::protocol::xproto::Window;

/// A cycling candidate as the session sees it.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub window: Window,
    /// Whether the window's focus model lets the manager assign focus.
    pub accepts_focus: bool,
    pub iconic: bool,
}

fn eligible(c: &Candidate) -> bool {
    c.accepts_focus && !c.iconic
}

/// The next eligible candidate after `from` (by position in the
/// window-number-ordered list), wrapping once. None when nothing is
/// eligible within one full pass, or when `from` is not in the list and
/// the list has no eligible entry.
pub fn next_candidate(candidates: &[Candidate], from: Option<Window>) -> Option<Window> {
    step(candidates, from, 1)
}

/// The previous eligible candidate before `from`, wrapping once.
pub fn prev_candidate(candidates: &[Candidate], from: Option<Window>) -> Option<Window> {
    step(candidates, from, -1)
}

fn step(candidates: &[Candidate], from: Option<Window>, direction: i64) -> Option<Window> {
    if candidates.is_empty() {
        return None;
    }
    let len = candidates.len() as i64;
    let start = from
        .and_then(|w| candidates.iter().position(|c| c.window == w))
        .map(|i| i as i64)
        .unwrap_or_else(|| if direction > 0 { -1 } else { len });

    // At most one full pass, never revisiting the start.
    for offset in 1..=len {
        let index = (start + direction * offset).rem_euclid(len) as usize;
        let candidate = &candidates[index];
        if Some(candidate.window) == from {
            break;
        }
        if eligible(candidate) {
            return Some(candidate.window);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(window: Window, accepts: bool, iconic: bool) -> Candidate {
        Candidate { window, accepts_focus: accepts, iconic }
    }

    #[test]
    fn cycles_forward_with_wraparound() {
        let list = [c(1, true, false), c(2, true, false), c(3, true, false)];
        assert_eq!(next_candidate(&list, Some(1)), Some(2));
        assert_eq!(next_candidate(&list, Some(3)), Some(1));
        assert_eq!(prev_candidate(&list, Some(1)), Some(3));
    }

    #[test]
    fn skips_refusers_and_iconified() {
        let list = [
            c(1, true, false),
            c(2, false, false),
            c(3, true, true),
            c(4, true, false),
        ];
        assert_eq!(next_candidate(&list, Some(1)), Some(4));
        assert_eq!(prev_candidate(&list, Some(4)), Some(1));
    }

    #[test]
    fn gives_up_after_one_full_pass() {
        let list = [c(1, false, false), c(2, true, true), c(3, false, false)];
        assert_eq!(next_candidate(&list, Some(1)), None);
        assert_eq!(next_candidate(&list, None), None);
        assert_eq!(prev_candidate(&list, Some(2)), None);
    }

    #[test]
    fn no_current_focus_starts_from_the_ends() {
        let list = [c(1, false, false), c(2, true, false), c(3, true, false)];
        assert_eq!(next_candidate(&list, None), Some(2));
        assert_eq!(prev_candidate(&list, None), Some(3));
    }

    #[test]
    fn sole_window_cycling_stays_put() {
        let list = [c(1, true, false)];
        assert_eq!(next_candidate(&list, Some(1)), None);
    }

    #[test]
    fn empty_workspace_has_no_candidate() {
        assert_eq!(next_candidate(&[], None), None);
    }
}

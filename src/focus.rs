// Focus controller
//
// Two independent cursors: the main (document) view focuses an element by
// id, the active side view focuses an index into its current page. Sidebar
// motion never touches main focus; pressing Enter on a sidebar element is
// the only cross-view jump. When navigation runs off a page edge the turn
// is requested and the edge focus is deferred until the page's fetch
// resolves (observed as the panel's loading flag dropping).

use crate::panels::Panel;

/// Focus state of the main document view
#[derive(Debug, Clone, PartialEq)]
pub struct MainFocus {
    pub element_id: String,
    pub document_id: String,
    /// Flipped on every focus of the same id so downstream consumers see a
    /// fresh focus event even when the target did not change
    pub toggle: bool,
    pub highlight: bool,
}

/// Focus state of the active side view: an index into the panel's currently
/// visible page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SidebarFocus {
    pub index: Option<usize>,
    pub scroll_into_view: bool,
}

/// Which end of a freshly loaded page to focus after a page turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingEdge {
    First,
    Last,
}

/// Outcome of a sidebar navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarNav {
    /// Cursor moved within the current page
    Moved(usize),
    /// Ran off a page edge; the caller must fetch this page, after which the
    /// controller focuses the remembered edge
    PageTurn { page: u64, edge: PendingEdge },
    /// At a hard boundary (or page empty); nothing to do
    NoOp,
}

#[derive(Debug, Default)]
pub struct FocusController {
    pub main: Option<MainFocus>,
    pub sidebar: SidebarFocus,
    pending: Option<PendingEdge>,
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Focus an element in the main view. Re-focusing the currently focused
    /// id flips the toggle so the focus event still fires.
    pub fn set_main(&mut self, element_id: &str, document_id: &str, highlight: bool) {
        let toggle = match &self.main {
            Some(prev) if prev.element_id == element_id => !prev.toggle,
            _ => false,
        };
        self.main = Some(MainFocus {
            element_id: element_id.to_string(),
            document_id: document_id.to_string(),
            toggle,
            highlight,
        });
    }

    pub fn clear_main(&mut self) {
        self.main = None;
    }

    /// Set the sidebar cursor directly. An index beyond the current page is
    /// an invariant violation, handled as a no-op.
    pub fn set_sidebar_index(&mut self, index: usize, panel: &Panel) {
        if index < panel.page_len() {
            self.sidebar = SidebarFocus {
                index: Some(index),
                scroll_into_view: false,
            };
        }
    }

    /// Reset the sidebar cursor (active panel switched or refetched)
    pub fn clear_sidebar(&mut self) {
        self.sidebar = SidebarFocus::default();
        self.pending = None;
    }

    /// Move the sidebar cursor down one element, turning the page at the
    /// bottom edge when a next page exists
    pub fn sidebar_next(&mut self, panel: &Panel) -> SidebarNav {
        let len = panel.page_len();
        if len == 0 {
            return SidebarNav::NoOp;
        }
        match self.sidebar.index {
            None => {
                self.sidebar.index = Some(0);
                self.sidebar.scroll_into_view = true;
                SidebarNav::Moved(0)
            }
            Some(i) if i + 1 < len => {
                self.sidebar.index = Some(i + 1);
                self.sidebar.scroll_into_view = true;
                SidebarNav::Moved(i + 1)
            }
            Some(_) if panel.page < panel.page_count() => {
                self.pending = Some(PendingEdge::First);
                SidebarNav::PageTurn {
                    page: panel.page + 1,
                    edge: PendingEdge::First,
                }
            }
            Some(_) => SidebarNav::NoOp,
        }
    }

    /// Move the sidebar cursor up one element, turning the page at the top
    /// edge when a previous page exists
    pub fn sidebar_prev(&mut self, panel: &Panel) -> SidebarNav {
        let len = panel.page_len();
        if len == 0 {
            return SidebarNav::NoOp;
        }
        match self.sidebar.index {
            None => {
                self.sidebar.index = Some(0);
                self.sidebar.scroll_into_view = true;
                SidebarNav::Moved(0)
            }
            Some(i) if i > 0 => {
                self.sidebar.index = Some(i - 1);
                self.sidebar.scroll_into_view = true;
                SidebarNav::Moved(i - 1)
            }
            Some(_) if panel.page > 1 => {
                self.pending = Some(PendingEdge::Last);
                SidebarNav::PageTurn {
                    page: panel.page - 1,
                    edge: PendingEdge::Last,
                }
            }
            Some(_) => SidebarNav::NoOp,
        }
    }

    /// Called when the active panel's fetch resolves (loading true -> false).
    /// Consumes any deferred edge focus from a page turn.
    pub fn on_panel_loaded(&mut self, panel: &Panel) {
        let Some(edge) = self.pending.take() else {
            return;
        };
        let len = panel.page_len();
        if len == 0 {
            self.sidebar = SidebarFocus::default();
            return;
        }
        let index = match edge {
            PendingEdge::First => 0,
            PendingEdge::Last => len - 1,
        };
        self.sidebar = SidebarFocus {
            index: Some(index),
            scroll_into_view: true,
        };
    }

    /// Whether a page-turn focus is still waiting for its fetch
    pub fn has_pending_edge(&self) -> bool {
        self.pending.is_some()
    }
}

/// Ordinal position of an element within its document, recovered from the
/// id's trailing segment (`{docid}-{index}`)
pub fn ordinal_from_id(element_id: &str) -> Option<u64> {
    element_id.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panels::PanelId;

    fn panel_with(ids: &[&str], hit_count: u64, page: u64) -> Panel {
        let mut panel = Panel::new(PanelId::LabelNext, 5);
        panel.accept_fetch(ids.iter().map(|s| s.to_string()).collect(), hit_count);
        panel.page = page;
        panel
    }

    #[test]
    fn test_main_refocus_flips_toggle() {
        let mut focus = FocusController::new();
        focus.set_main("e1", "doc0", true);
        assert!(!focus.main.as_ref().unwrap().toggle);
        focus.set_main("e1", "doc0", true);
        assert!(focus.main.as_ref().unwrap().toggle);
        // Focusing a different id resets the toggle
        focus.set_main("e2", "doc0", true);
        assert!(!focus.main.as_ref().unwrap().toggle);
    }

    #[test]
    fn test_sidebar_next_moves_within_page() {
        let mut focus = FocusController::new();
        let panel = panel_with(&["a", "b", "c"], 3, 1);

        assert_eq!(focus.sidebar_next(&panel), SidebarNav::Moved(0));
        assert_eq!(focus.sidebar_next(&panel), SidebarNav::Moved(1));
        assert_eq!(focus.sidebar_next(&panel), SidebarNav::Moved(2));
        // Single page: bottom edge is a hard boundary
        assert_eq!(focus.sidebar_next(&panel), SidebarNav::NoOp);
    }

    #[test]
    fn test_sidebar_next_turns_page_and_focuses_first() {
        let mut focus = FocusController::new();
        // Page 1 of 2: five elements, ten hits
        let panel = panel_with(&["a", "b", "c", "d", "e"], 10, 1);
        focus.set_sidebar_index(4, &panel);

        let nav = focus.sidebar_next(&panel);
        assert_eq!(
            nav,
            SidebarNav::PageTurn {
                page: 2,
                edge: PendingEdge::First
            }
        );
        assert!(focus.has_pending_edge());
        // Stale index from page 1 must not leak onto page 2
        let page2 = panel_with(&["f", "g", "h"], 10, 2);
        focus.on_panel_loaded(&page2);
        assert_eq!(focus.sidebar.index, Some(0));
        assert!(focus.sidebar.scroll_into_view);
        assert!(!focus.has_pending_edge());
    }

    #[test]
    fn test_sidebar_prev_turns_page_and_focuses_last() {
        let mut focus = FocusController::new();
        let panel = panel_with(&["f", "g", "h"], 8, 2);
        focus.set_sidebar_index(0, &panel);

        let nav = focus.sidebar_prev(&panel);
        assert_eq!(
            nav,
            SidebarNav::PageTurn {
                page: 1,
                edge: PendingEdge::Last
            }
        );
        let page1 = panel_with(&["a", "b", "c", "d", "e"], 8, 1);
        focus.on_panel_loaded(&page1);
        assert_eq!(focus.sidebar.index, Some(4));
    }

    #[test]
    fn test_out_of_range_index_is_noop() {
        let mut focus = FocusController::new();
        let panel = panel_with(&["a", "b"], 2, 1);
        focus.set_sidebar_index(1, &panel);
        focus.set_sidebar_index(7, &panel);
        assert_eq!(focus.sidebar.index, Some(1));
    }

    #[test]
    fn test_loaded_without_pending_keeps_cursor() {
        let mut focus = FocusController::new();
        let panel = panel_with(&["a", "b"], 2, 1);
        focus.set_sidebar_index(1, &panel);
        focus.on_panel_loaded(&panel);
        assert_eq!(focus.sidebar.index, Some(1));
    }

    #[test]
    fn test_empty_page_clears_cursor_after_turn() {
        let mut focus = FocusController::new();
        let panel = panel_with(&["a", "b", "c", "d", "e"], 6, 1);
        focus.set_sidebar_index(4, &panel);
        focus.sidebar_next(&panel);
        // The next page came back empty (hit count shrank server-side)
        let empty = panel_with(&[], 5, 2);
        focus.on_panel_loaded(&empty);
        assert_eq!(focus.sidebar.index, None);
    }

    #[test]
    fn test_ordinal_from_id() {
        assert_eq!(ordinal_from_id("doc1-17"), Some(17));
        assert_eq!(ordinal_from_id("my-doc-0"), Some(0));
        assert_eq!(ordinal_from_id("nodigits"), None);
    }
}

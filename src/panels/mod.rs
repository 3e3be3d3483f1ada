// Panel registry - the fixed set of views onto the corpus
//
// Every view the annotator can see is one of a closed set of PanelIds. Each
// panel owns its page number, hit count, loading flag and an id list into
// the element arena; nothing here owns element data. Panels invalidate on
// explicitly named events rather than on ambient dependency changes, so the
// conditions under which a panel refetches are visible in one table.

pub mod pagination;

use crate::elements::Label;
use std::collections::HashMap;

/// The fixed set of views. The main document view is always displayed; the
/// remaining panels share the side area, one active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelId {
    /// Main single-document view
    Document,
    /// Free-text search results
    Search,
    /// Model-suggested elements to label next (active learning)
    LabelNext,
    /// Elements the model predicts positive
    PositivePredictions,
    /// Elements the user has labeled, filterable by label value
    UserLabels,
    /// Labeled elements the model flags as suspicious
    Suspicious,
    /// Pairs of similar elements labeled in opposite directions
    ContradictingPairs,
    /// Precision evaluation round
    Evaluation,
}

impl PanelId {
    /// All panels, in sidebar display order (Document first, always shown)
    pub const ALL: [PanelId; 8] = [
        PanelId::Document,
        PanelId::Search,
        PanelId::LabelNext,
        PanelId::PositivePredictions,
        PanelId::UserLabels,
        PanelId::Suspicious,
        PanelId::ContradictingPairs,
        PanelId::Evaluation,
    ];

    /// Display name for the status line
    pub fn name(&self) -> &'static str {
        match self {
            PanelId::Document => "Document",
            PanelId::Search => "Search",
            PanelId::LabelNext => "Label next",
            PanelId::PositivePredictions => "Predictions",
            PanelId::UserLabels => "User labels",
            PanelId::Suspicious => "Suspicious",
            PanelId::ContradictingPairs => "Contradictions",
            PanelId::Evaluation => "Evaluation",
        }
    }

    /// Events that reset this panel to page 1 and force a refetch.
    /// This is the explicit subscription table; a panel refetches for these
    /// reasons and no others (besides its own page changing).
    pub fn subscriptions(&self) -> &'static [InvalidationEvent] {
        use InvalidationEvent::*;
        match self {
            PanelId::Document => &[DocumentChanged, CategoryChanged],
            PanelId::Search => &[CategoryChanged],
            PanelId::LabelNext => &[CategoryChanged, ModelVersionChanged],
            PanelId::PositivePredictions => &[CategoryChanged, ModelVersionChanged],
            PanelId::UserLabels => &[CategoryChanged],
            PanelId::Suspicious => &[CategoryChanged, ModelVersionChanged],
            PanelId::ContradictingPairs => &[CategoryChanged, ModelVersionChanged],
            PanelId::Evaluation => &[CategoryChanged],
        }
    }

    /// Panels whose content only exists once a model version is ready.
    /// Their fetches are suppressed until then (the should-fetch gate).
    pub fn requires_model(&self) -> bool {
        matches!(
            self,
            PanelId::LabelNext
                | PanelId::PositivePredictions
                | PanelId::Suspicious
                | PanelId::ContradictingPairs
                | PanelId::Evaluation
        )
    }

    /// Panels where a keyboard label action auto-advances the sidebar cursor
    pub fn auto_advances(&self) -> bool {
        matches!(
            self,
            PanelId::LabelNext | PanelId::Suspicious | PanelId::PositivePredictions
        )
    }
}

/// Named invalidation events panels subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationEvent {
    CategoryChanged,
    DocumentChanged,
    ModelVersionChanged,
}

/// Per-panel view state. Element data lives in the arena; `element_ids` is
/// the ordered window of ids on the currently loaded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: PanelId,
    /// None = never fetched; Some(empty) = fetched, no results
    pub element_ids: Option<Vec<String>>,
    /// Total hits for the panel's query, independent of page size
    pub hit_count: Option<u64>,
    /// Current page, 1-based
    pub page: u64,
    pub loading: bool,
    pub page_size: u64,
    /// Value filter for label/prediction panels ("true"/"false")
    pub filter: Option<String>,
    /// Last submitted search query (Search panel only)
    pub query: Option<String>,
    /// Ordered element-id pairs (ContradictingPairs panel only)
    pub pairs: Vec<(String, String)>,
    /// Pre-edit label snapshot (Evaluation panel only)
    pub initial_labels: HashMap<String, Label>,
    /// Precision score from the last submitted evaluation round
    pub last_score: Option<f64>,
    /// Set when local repair after a mutation was ambiguous; cleared by the
    /// next fetch
    pub needs_refetch: bool,
    /// Monotonic token of the most recently issued fetch; responses carrying
    /// an older token are stale and discarded
    pub fetch_seq: u64,
}

impl Panel {
    pub fn new(id: PanelId, page_size: u64) -> Self {
        Panel {
            id,
            element_ids: None,
            hit_count: None,
            page: 1,
            loading: false,
            page_size,
            filter: None,
            query: None,
            pairs: Vec::new(),
            initial_labels: HashMap::new(),
            last_score: None,
            needs_refetch: false,
            fetch_seq: 0,
        }
    }

    /// Number of elements on the currently loaded page
    pub fn page_len(&self) -> usize {
        self.element_ids.as_ref().map_or(0, |ids| ids.len())
    }

    pub fn page_count(&self) -> u64 {
        pagination::page_count(self.page_size, self.hit_count)
    }

    /// Whether the panel's current page is its last known page
    pub fn on_last_page(&self) -> bool {
        let count = self.page_count();
        count > 0 && self.page == count
    }

    pub fn contains(&self, element_id: &str) -> bool {
        self.element_ids
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == element_id))
    }

    /// Accept a resolved fetch: replace the page window and take the server
    /// hit count as authoritative over any locally adjusted value
    pub fn accept_fetch(&mut self, element_ids: Vec<String>, hit_count: u64) {
        self.element_ids = Some(element_ids);
        self.hit_count = Some(hit_count);
        self.loading = false;
        self.needs_refetch = false;
    }

    /// Reset for an invalidation event: back to page 1, content stale
    pub fn invalidate(&mut self) {
        self.page = 1;
        self.needs_refetch = true;
    }

    /// Drop all fetched state (category teardown). The fetch token survives
    /// so responses issued before the reset still read as stale.
    pub fn reset(&mut self) {
        let (id, page_size, fetch_seq) = (self.id, self.page_size, self.fetch_seq);
        *self = Panel::new(id, page_size);
        self.fetch_seq = fetch_seq;
    }
}

/// The closed registry of panels plus the currently active side view
#[derive(Debug)]
pub struct PanelRegistry {
    panels: HashMap<PanelId, Panel>,
    /// The one panel displayed in the side area. The Document panel is not a
    /// side view; it is always displayed.
    active: PanelId,
}

impl PanelRegistry {
    pub fn new(main_page_size: u64, sidebar_page_size: u64) -> Self {
        let mut panels = HashMap::new();
        for id in PanelId::ALL {
            let size = if id == PanelId::Document {
                main_page_size
            } else {
                sidebar_page_size
            };
            panels.insert(id, Panel::new(id, size));
        }
        PanelRegistry {
            panels,
            active: PanelId::Search,
        }
    }

    pub fn panel(&self, id: PanelId) -> &Panel {
        // The registry is seeded with every PanelId variant at construction
        self.panels.get(&id).expect("registry holds all panels")
    }

    pub fn panel_mut(&mut self, id: PanelId) -> &mut Panel {
        self.panels.get_mut(&id).expect("registry holds all panels")
    }

    pub fn active(&self) -> PanelId {
        self.active
    }

    pub fn active_panel(&self) -> &Panel {
        self.panel(self.active)
    }

    pub fn set_active(&mut self, id: PanelId) {
        if id != PanelId::Document {
            self.active = id;
        }
    }

    /// Panels currently displaying the given element
    pub fn panels_holding(&self, element_id: &str) -> Vec<PanelId> {
        PanelId::ALL
            .into_iter()
            .filter(|id| self.panel(*id).contains(element_id))
            .collect()
    }

    /// Broadcast an invalidation event to every subscribed panel, returning
    /// the ids that were invalidated
    pub fn broadcast(&mut self, event: InvalidationEvent) -> Vec<PanelId> {
        let mut hit = Vec::new();
        for id in PanelId::ALL {
            if id.subscriptions().contains(&event) {
                self.panel_mut(id).invalidate();
                hit.push(id);
            }
        }
        hit
    }

    /// Reset every panel (category teardown)
    pub fn reset_all(&mut self) {
        for id in PanelId::ALL {
            self.panel_mut(id).reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_seeds_all_panels() {
        let reg = PanelRegistry::new(100, 50);
        for id in PanelId::ALL {
            let p = reg.panel(id);
            assert_eq!(p.element_ids, None);
            assert_eq!(p.page, 1);
            assert!(!p.loading);
        }
        assert_eq!(reg.panel(PanelId::Document).page_size, 100);
        assert_eq!(reg.panel(PanelId::LabelNext).page_size, 50);
    }

    #[test]
    fn test_document_cannot_become_active_side_view() {
        let mut reg = PanelRegistry::new(100, 50);
        reg.set_active(PanelId::LabelNext);
        assert_eq!(reg.active(), PanelId::LabelNext);
        reg.set_active(PanelId::Document);
        assert_eq!(reg.active(), PanelId::LabelNext);
    }

    #[test]
    fn test_broadcast_resets_subscribed_panels_only() {
        let mut reg = PanelRegistry::new(100, 50);
        reg.panel_mut(PanelId::LabelNext).page = 3;
        reg.panel_mut(PanelId::Search).page = 2;

        let hit = reg.broadcast(InvalidationEvent::ModelVersionChanged);

        assert!(hit.contains(&PanelId::LabelNext));
        assert!(!hit.contains(&PanelId::Search));
        assert_eq!(reg.panel(PanelId::LabelNext).page, 1);
        assert!(reg.panel(PanelId::LabelNext).needs_refetch);
        // Search does not depend on model output; untouched
        assert_eq!(reg.panel(PanelId::Search).page, 2);
    }

    #[test]
    fn test_accept_fetch_takes_server_hit_count() {
        let mut panel = Panel::new(PanelId::UserLabels, 10);
        panel.hit_count = Some(99); // locally adjusted, wrong
        panel.needs_refetch = true;
        panel.loading = true;

        panel.accept_fetch(vec!["a".into(), "b".into()], 2);

        assert_eq!(panel.hit_count, Some(2));
        assert_eq!(panel.page_len(), 2);
        assert!(!panel.loading);
        assert!(!panel.needs_refetch);
    }

    #[test]
    fn test_on_last_page() {
        let mut panel = Panel::new(PanelId::UserLabels, 10);
        assert!(!panel.on_last_page()); // no hit count yet
        panel.hit_count = Some(25);
        panel.page = 2;
        assert!(!panel.on_last_page());
        panel.page = 3;
        assert!(panel.on_last_page());
    }

    #[test]
    fn test_panels_holding() {
        let mut reg = PanelRegistry::new(100, 50);
        reg.panel_mut(PanelId::Document)
            .accept_fetch(vec!["e1".into(), "e2".into()], 2);
        reg.panel_mut(PanelId::LabelNext)
            .accept_fetch(vec!["e2".into()], 1);

        let holding = reg.panels_holding("e2");
        assert!(holding.contains(&PanelId::Document));
        assert!(holding.contains(&PanelId::LabelNext));
        assert_eq!(reg.panels_holding("e9"), Vec::<PanelId>::new());
    }
}

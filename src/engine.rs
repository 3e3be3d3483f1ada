// The annotation engine - a single state container driven by actions
//
// Every state transition in the application goes through Engine::handle:
// an Action comes in, state mutates synchronously, and zero or more
// Commands (network effects) come out for the driver to execute. Effect
// results re-enter as actions. The engine lives in one task, so each
// reduction is atomic with respect to every other; the only suspension
// points in the system are the network round-trips behind Commands.

use crate::api::types::{ElementsResponse, EvaluationSubmission};
use crate::api::FetchRequest;
use crate::arena::ElementArena;
use crate::elements::{Element, Label, LabelAction, LabelDelta};
use crate::focus::{ordinal_from_id, FocusController, SidebarNav};
use crate::model_status::{infer, ModelIteration, ModelStatus, StatusRetry};
use crate::mutation::{self, MutationSnapshot};
use crate::notify::NoticeBuffer;
use crate::panels::{pagination, InvalidationEvent, PanelId, PanelRegistry};
use std::collections::HashMap;

/// Engine tuning knobs, sourced from the config file
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub main_page_size: u64,
    pub sidebar_page_size: u64,
    /// Extra status polls granted after training evidence disappears
    pub status_check_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            main_page_size: 100,
            sidebar_page_size: 50,
            status_check_attempts: 3,
        }
    }
}

/// Everything that can happen to the engine
#[derive(Debug)]
pub enum Action {
    /// Select (or clear) the labeling category
    SelectCategory(Option<u32>),
    /// Switch the main view to another document
    SwitchDocument(String),
    /// Make a side panel the active one
    ActivatePanel(PanelId),
    /// Activate the next side panel in display order (Tab)
    CyclePanel,
    SetPage(PanelId, u64),
    NextPage(PanelId),
    PrevPage(PanelId),
    /// Submit a free-text search (activates the search panel)
    SubmitQuery(String),
    /// Change a panel's value filter
    SetFilter(PanelId, Option<String>),
    /// Label an element by id
    ApplyLabel {
        element_id: String,
        action: LabelAction,
    },
    /// Label whatever the sidebar cursor points at (keyboard path)
    LabelFocused(LabelAction),
    /// Move the sidebar cursor
    SidebarNext,
    SidebarPrev,
    /// Open the sidebar-focused element in the main view
    OpenFocused,
    /// Begin a precision-evaluation round
    StartEvaluation,
    /// Submit the current evaluation round
    SubmitEvaluation,
    /// Timer tick for the model-status poll
    PollTick,

    // Effect results
    FetchResolved {
        panel: PanelId,
        token: u64,
        response: ElementsResponse,
    },
    FetchFailed {
        panel: PanelId,
        token: u64,
        error: String,
    },
    LabelAccepted {
        mutation_id: u64,
    },
    LabelRejected {
        mutation_id: u64,
        error: String,
    },
    StatusResolved {
        iterations: Vec<ModelIteration>,
    },
    StatusFailed {
        error: String,
    },
    EvaluationSubmitted {
        score: f64,
    },
    EvaluationSubmitFailed {
        error: String,
    },
}

/// Network effects the driver executes on the engine's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fetch {
        panel: PanelId,
        token: u64,
        request: FetchRequest,
    },
    PutLabel {
        mutation_id: u64,
        element_id: String,
        category_id: u32,
        value: &'static str,
        update_counter: bool,
    },
    FetchStatus {
        category_id: u32,
    },
    SubmitEvaluation {
        category_id: u32,
        submission: EvaluationSubmission,
    },
}

/// In-flight mutation state needed for rollback
struct PendingMutation {
    snapshot: MutationSnapshot,
    delta: LabelDelta,
}

pub struct Engine {
    pub arena: ElementArena,
    pub registry: PanelRegistry,
    pub focus: FocusController,
    pub status: ModelStatus,
    pub cur_category: Option<u32>,
    pub cur_document: Option<String>,
    /// Locally maintained label counters for the status line
    pub pos_count: i64,
    pub neg_count: i64,
    retry: StatusRetry,
    pending: HashMap<u64, PendingMutation>,
    next_mutation_id: u64,
    notices: NoticeBuffer,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig, notices: NoticeBuffer) -> Self {
        Engine {
            arena: ElementArena::new(),
            registry: PanelRegistry::new(config.main_page_size, config.sidebar_page_size),
            focus: FocusController::new(),
            status: ModelStatus::default(),
            cur_category: None,
            cur_document: None,
            pos_count: 0,
            neg_count: 0,
            retry: StatusRetry::new(config.status_check_attempts),
            pending: HashMap::new(),
            next_mutation_id: 0,
            notices,
            config,
        }
    }

    pub fn notices(&self) -> &NoticeBuffer {
        &self.notices
    }

    /// Reduce one action, returning the effects to run
    pub fn handle(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::SelectCategory(category) => self.select_category(category),
            Action::SwitchDocument(doc) => self.switch_document(doc),
            Action::ActivatePanel(id) => self.activate_panel(id),
            Action::CyclePanel => {
                let side: Vec<PanelId> = PanelId::ALL
                    .into_iter()
                    .filter(|id| *id != PanelId::Document)
                    .collect();
                let at = side
                    .iter()
                    .position(|id| *id == self.registry.active())
                    .unwrap_or(0);
                self.activate_panel(side[(at + 1) % side.len()])
            }
            Action::SetPage(id, page) => self.set_page(id, page).into_iter().collect(),
            Action::NextPage(id) => {
                let page = self.registry.panel(id).page + 1;
                self.set_page(id, page).into_iter().collect()
            }
            Action::PrevPage(id) => {
                let page = self.registry.panel(id).page.saturating_sub(1);
                self.set_page(id, page).into_iter().collect()
            }
            Action::SubmitQuery(query) => self.submit_query(query),
            Action::SetFilter(id, value) => self.set_filter(id, value),
            Action::ApplyLabel { element_id, action } => self.apply_label(&element_id, action),
            Action::LabelFocused(action) => self.label_focused(action),
            Action::SidebarNext => self.sidebar_move(true),
            Action::SidebarPrev => self.sidebar_move(false),
            Action::OpenFocused => self.open_focused(),
            Action::StartEvaluation => self.start_evaluation(),
            Action::SubmitEvaluation => self.submit_evaluation(),
            Action::PollTick => self.poll_tick(),
            Action::FetchResolved {
                panel,
                token,
                response,
            } => self.fetch_resolved(panel, token, response),
            Action::FetchFailed {
                panel,
                token,
                error,
            } => {
                self.fetch_failed(panel, token, &error);
                Vec::new()
            }
            Action::LabelAccepted { mutation_id } => self.label_accepted(mutation_id),
            Action::LabelRejected { mutation_id, error } => {
                self.label_rejected(mutation_id, &error);
                Vec::new()
            }
            Action::StatusResolved { iterations } => self.status_resolved(&iterations),
            Action::StatusFailed { error } => {
                // Silently ignored; the next tick retries
                tracing::debug!(%error, "model status poll failed");
                Vec::new()
            }
            Action::EvaluationSubmitted { score } => {
                self.registry.panel_mut(PanelId::Evaluation).last_score = Some(score);
                self.notices
                    .info(format!("evaluation precision: {:.2}", score));
                Vec::new()
            }
            Action::EvaluationSubmitFailed { error } => {
                self.notices.error(format!("evaluation submit failed: {error}"));
                Vec::new()
            }
        }
    }

    // ── Fetch plumbing ──────────────────────────────────────────────────

    /// Issue a fetch for a panel if its prerequisites are met. Bumps the
    /// panel's fetch token so any response from an earlier fetch is stale.
    fn request_fetch(&mut self, id: PanelId) -> Option<Command> {
        // Model-output panels have nothing to show before a model is ready
        if id.requires_model() && !self.status.has_model() {
            return None;
        }
        let request = FetchRequest::for_panel(
            self.registry.panel(id),
            self.cur_document.as_deref(),
            self.cur_category,
        )?;
        let panel = self.registry.panel_mut(id);
        panel.fetch_seq += 1;
        panel.loading = true;
        Some(Command::Fetch {
            panel: id,
            token: panel.fetch_seq,
            request,
        })
    }

    /// Fetch the always-visible document panel and the active side panel,
    /// where they are stale
    fn fetch_visible(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        for id in [PanelId::Document, self.registry.active()] {
            let panel = self.registry.panel(id);
            if panel.needs_refetch || panel.element_ids.is_none() {
                commands.extend(self.request_fetch(id));
            }
        }
        commands
    }

    fn set_page(&mut self, id: PanelId, page: u64) -> Option<Command> {
        let panel = self.registry.panel(id);
        let count = panel.page_count();
        // Clamp into the known page range; page 1 is always legal
        let page = if count > 0 { page.clamp(1, count) } else { 1.max(page) };
        if page == panel.page {
            return None;
        }
        self.registry.panel_mut(id).page = page;
        self.request_fetch(id)
    }

    // ── Category / document / panel selection ───────────────────────────

    fn select_category(&mut self, category: Option<u32>) -> Vec<Command> {
        self.cur_category = category;
        // Per-category label projections from the old category must not
        // survive the switch
        self.arena.clear();
        self.registry.reset_all();
        self.focus.clear_sidebar();
        self.focus.clear_main();
        self.status = ModelStatus::default();
        self.retry.reset();
        self.pos_count = 0;
        self.neg_count = 0;
        self.pending.clear();

        let mut commands = Vec::new();
        if let Some(category_id) = category {
            commands.push(Command::FetchStatus { category_id });
        }
        commands.extend(self.fetch_visible());
        commands
    }

    fn switch_document(&mut self, doc: String) -> Vec<Command> {
        if self.cur_document.as_deref() == Some(doc.as_str()) {
            return Vec::new();
        }
        self.cur_document = Some(doc);
        self.registry.broadcast(InvalidationEvent::DocumentChanged);
        self.focus.clear_main();
        self.fetch_visible()
    }

    fn activate_panel(&mut self, id: PanelId) -> Vec<Command> {
        if id == PanelId::Document || id == self.registry.active() {
            return Vec::new();
        }
        self.registry.set_active(id);
        self.focus.clear_sidebar();
        let panel = self.registry.panel(id);
        if panel.needs_refetch || panel.element_ids.is_none() {
            self.request_fetch(id).into_iter().collect()
        } else {
            Vec::new()
        }
    }

    fn submit_query(&mut self, query: String) -> Vec<Command> {
        {
            let panel = self.registry.panel_mut(PanelId::Search);
            panel.query = Some(query);
            panel.page = 1;
        }
        self.registry.set_active(PanelId::Search);
        self.focus.clear_sidebar();
        self.request_fetch(PanelId::Search).into_iter().collect()
    }

    fn set_filter(&mut self, id: PanelId, value: Option<String>) -> Vec<Command> {
        {
            let panel = self.registry.panel_mut(id);
            panel.filter = value;
            panel.page = 1;
        }
        self.request_fetch(id).into_iter().collect()
    }

    // ── Labeling ────────────────────────────────────────────────────────

    fn apply_label(&mut self, element_id: &str, action: LabelAction) -> Vec<Command> {
        let Some(category_id) = self.cur_category else {
            self.notices.error("select a category before labeling");
            return Vec::new();
        };
        let Some(outcome) =
            mutation::apply(&mut self.arena, &mut self.registry, element_id, action)
        else {
            return Vec::new();
        };

        self.pos_count += outcome.delta.pos;
        self.neg_count += outcome.delta.neg;

        let mutation_id = self.next_mutation_id;
        self.next_mutation_id += 1;
        self.pending.insert(
            mutation_id,
            PendingMutation {
                snapshot: outcome.snapshot,
                delta: outcome.delta,
            },
        );

        vec![Command::PutLabel {
            mutation_id,
            element_id: element_id.to_string(),
            category_id,
            value: outcome.new_label.as_wire(),
            update_counter: true,
        }]
    }

    fn label_focused(&mut self, action: LabelAction) -> Vec<Command> {
        let active = self.registry.active();
        let Some(element_id) = self
            .focus
            .sidebar
            .index
            .and_then(|i| {
                self.registry
                    .panel(active)
                    .element_ids
                    .as_ref()
                    .and_then(|ids| ids.get(i))
            })
            .cloned()
        else {
            return Vec::new();
        };

        let mut commands = self.apply_label(&element_id, action);
        // Only a configured subset of panels advances the cursor after a
        // label action
        if !commands.is_empty() && active.auto_advances() {
            commands.extend(self.sidebar_move(true));
        }
        commands
    }

    fn label_accepted(&mut self, mutation_id: u64) -> Vec<Command> {
        self.pending.remove(&mutation_id);
        let mut commands = Vec::new();
        // Label counts feed the training trigger; refresh the status
        if let Some(category_id) = self.cur_category {
            commands.push(Command::FetchStatus { category_id });
        }
        // A mutation may have left the active panel marked; since it is on
        // screen, "next activation" is now
        if self.registry.active_panel().needs_refetch {
            commands.extend(self.request_fetch(self.registry.active()));
        }
        commands
    }

    fn label_rejected(&mut self, mutation_id: u64, error: &str) {
        let Some(pending) = self.pending.remove(&mutation_id) else {
            return;
        };
        self.pos_count -= pending.delta.pos;
        self.neg_count -= pending.delta.neg;
        mutation::rollback(&mut self.arena, &mut self.registry, pending.snapshot);
        self.notices.error(format!("label write rejected: {error}"));
    }

    // ── Navigation ──────────────────────────────────────────────────────

    fn sidebar_move(&mut self, forward: bool) -> Vec<Command> {
        let active = self.registry.active();
        let panel = self.registry.panel(active);
        let nav = if forward {
            self.focus.sidebar_next(panel)
        } else {
            self.focus.sidebar_prev(panel)
        };
        match nav {
            SidebarNav::PageTurn { page, .. } => {
                // The edge focus resolves when this fetch lands
                self.set_page(active, page).into_iter().collect()
            }
            SidebarNav::Moved(_) | SidebarNav::NoOp => Vec::new(),
        }
    }

    fn open_focused(&mut self) -> Vec<Command> {
        let active = self.registry.active();
        let Some(element_id) = self
            .focus
            .sidebar
            .index
            .and_then(|i| {
                self.registry
                    .panel(active)
                    .element_ids
                    .as_ref()
                    .and_then(|ids| ids.get(i))
            })
            .cloned()
        else {
            return Vec::new();
        };
        let Some(element) = self.arena.get(&element_id).cloned() else {
            return Vec::new();
        };

        // The page holding the element is computed from its ordinal and set
        // before any fetch goes out, so a document switch plus page jump is
        // one fetch, not two
        let index = ordinal_from_id(&element_id).unwrap_or(0);
        let page = pagination::page_of_index(index, self.config.main_page_size);

        let commands = if self.cur_document.as_deref() != Some(element.document_id.as_str()) {
            self.cur_document = Some(element.document_id.clone());
            self.registry.broadcast(InvalidationEvent::DocumentChanged);
            self.registry.panel_mut(PanelId::Document).page = page;
            self.request_fetch(PanelId::Document).into_iter().collect()
        } else {
            self.set_page(PanelId::Document, page).into_iter().collect()
        };

        self.focus.set_main(&element_id, &element.document_id, true);
        commands
    }

    // ── Evaluation ──────────────────────────────────────────────────────

    fn start_evaluation(&mut self) -> Vec<Command> {
        if self.cur_category.is_none() || !self.status.has_model() {
            self.notices.error("evaluation requires a trained model");
            return Vec::new();
        }
        {
            let panel = self.registry.panel_mut(PanelId::Evaluation);
            panel.page = 1;
            panel.initial_labels.clear();
        }
        self.registry.set_active(PanelId::Evaluation);
        self.focus.clear_sidebar();
        self.request_fetch(PanelId::Evaluation).into_iter().collect()
    }

    /// Number of evaluation elements whose label changed since the round
    /// started
    pub fn changed_elements_count(&self) -> u64 {
        let panel = self.registry.panel(PanelId::Evaluation);
        let Some(ids) = panel.element_ids.as_ref() else {
            return 0;
        };
        ids.iter()
            .filter(|id| {
                let initial = panel.initial_labels.get(*id).copied().unwrap_or_default();
                self.arena.label_of(id).is_some_and(|now| now != initial)
            })
            .count() as u64
    }

    fn submit_evaluation(&mut self) -> Vec<Command> {
        let Some(category_id) = self.cur_category else {
            return Vec::new();
        };
        let panel = self.registry.panel(PanelId::Evaluation);
        let Some(ids) = panel.element_ids.clone() else {
            return Vec::new();
        };
        let Some(version) = self.status.version.filter(|v| *v >= 1) else {
            return Vec::new();
        };
        let submission = EvaluationSubmission {
            ids,
            // The displayed version is 1-based; the server iteration is the
            // 0-based ordinal behind it
            iteration: (version - 1) as u32,
            changed_elements_count: self.changed_elements_count(),
        };
        vec![Command::SubmitEvaluation {
            category_id,
            submission,
        }]
    }

    // ── Model status ────────────────────────────────────────────────────

    fn poll_tick(&mut self) -> Vec<Command> {
        let Some(category_id) = self.cur_category else {
            return Vec::new();
        };
        let first_fetch = self.status.version.is_none();
        if first_fetch || self.retry.should_poll(self.status.next_training) {
            self.retry.tick();
            vec![Command::FetchStatus { category_id }]
        } else {
            Vec::new()
        }
    }

    fn status_resolved(&mut self, iterations: &[ModelIteration]) -> Vec<Command> {
        let prev = self.status;
        self.status = infer(iterations, &prev);

        let advanced = match (prev.version, self.status.version) {
            (Some(p), Some(n)) => n > p && n >= 1,
            (None, Some(n)) => n >= 1,
            _ => false,
        };
        if advanced {
            tracing::info!(version = ?self.status.version, "new model version ready");
            self.registry
                .broadcast(InvalidationEvent::ModelVersionChanged);
            return self.fetch_visible();
        }
        Vec::new()
    }

    // ── Fetch results ───────────────────────────────────────────────────

    fn fetch_resolved(
        &mut self,
        id: PanelId,
        token: u64,
        response: ElementsResponse,
    ) -> Vec<Command> {
        // Stale-response guard: only the most recently issued fetch for a
        // panel may apply; page may have changed again while this one flew
        if token != self.registry.panel(id).fetch_seq {
            tracing::debug!(panel = id.name(), token, "discarding stale fetch result");
            return Vec::new();
        }

        let hit_count = response.hit_count;
        let mut pairs = Vec::new();
        let raw_elements = match response.pairs {
            // The contradiction endpoint delivers ordered pairs; the flat
            // window is the pairs in order
            Some(raw_pairs) => {
                let mut flat = Vec::new();
                for (a, b) in raw_pairs {
                    pairs.push((a.id.clone(), b.id.clone()));
                    flat.push(a);
                    flat.push(b);
                }
                flat
            }
            None => response.elements,
        };

        let mut ids = Vec::with_capacity(raw_elements.len());
        for raw in raw_elements {
            let mut element = Element::from_wire(raw, self.cur_category);
            // A fetch dispatched before an in-flight label write resolves
            // still carries the pre-mutation label; it must not revert the
            // optimistic one. Acceptance keeps it, rejection rolls it back.
            if self.label_write_pending(&element.id) {
                if let Some(current) = self.arena.label_of(&element.id) {
                    element.user_label = current;
                }
            }
            ids.push(element.id.clone());
            self.arena.upsert(element);
        }

        {
            let panel = self.registry.panel_mut(id);
            if id == PanelId::Evaluation {
                panel.initial_labels.clear();
            }
            panel.pairs = pairs;
            panel.accept_fetch(ids.clone(), hit_count);
        }
        if id == PanelId::Evaluation {
            // Pre-edit snapshot for changed_elements_count
            let snapshot: Vec<(String, Label)> = ids
                .iter()
                .filter_map(|eid| self.arena.label_of(eid).map(|l| (eid.clone(), l)))
                .collect();
            let panel = self.registry.panel_mut(PanelId::Evaluation);
            panel.initial_labels.extend(snapshot);
        }

        // The server count may have shrunk below the current page
        let panel = self.registry.panel(id);
        let count = panel.page_count();
        if count > 0 && panel.page > count {
            self.registry.panel_mut(id).page = count;
            return self.request_fetch(id).into_iter().collect();
        }

        if id == self.registry.active() {
            let panel = self.registry.panel(id);
            if self.focus.has_pending_edge() {
                self.focus.on_panel_loaded(panel);
            } else if let Some(i) = self.focus.sidebar.index {
                // The refreshed page may be shorter than the old cursor
                if i >= panel.page_len() {
                    self.focus.sidebar.index = panel.page_len().checked_sub(1);
                }
            }
        }
        Vec::new()
    }

    /// Whether the element has a label write whose PUT has not resolved yet
    fn label_write_pending(&self, element_id: &str) -> bool {
        self.pending
            .values()
            .any(|p| p.snapshot.element_id == element_id)
    }

    fn fetch_failed(&mut self, id: PanelId, token: u64, error: &str) {
        if token != self.registry.panel(id).fetch_seq {
            return;
        }
        // Stale data beats no data; just stop the spinner and say so
        self.registry.panel_mut(id).loading = false;
        self.notices
            .error(format!("{} fetch failed: {error}", id.name()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::UnparsedElement;
    use crate::model_status::IterationStatus;
    use std::collections::HashMap as Map;

    fn engine() -> Engine {
        let mut e = Engine::new(
            EngineConfig {
                main_page_size: 10,
                sidebar_page_size: 5,
                status_check_attempts: 3,
            },
            NoticeBuffer::new(),
        );
        e.cur_category = Some(1);
        e
    }

    fn wire(id: &str, doc: &str, label: Option<bool>) -> UnparsedElement {
        let mut user_labels = Map::new();
        if let Some(v) = label {
            user_labels.insert("1".to_string(), v);
        }
        UnparsedElement {
            id: id.into(),
            docid: doc.into(),
            text: "t".into(),
            user_labels,
            model_predictions: Map::new(),
        }
    }

    fn resolve(engine: &mut Engine, panel: PanelId, elements: Vec<UnparsedElement>, hits: u64) {
        let token = engine.registry.panel(panel).fetch_seq;
        engine.handle(Action::FetchResolved {
            panel,
            token,
            response: ElementsResponse {
                elements,
                hit_count: hits,
                pairs: None,
            },
        });
    }

    #[test]
    fn test_optimistic_label_then_rejection_reverts_everywhere() {
        // The end-to-end scenario: e1 unlabeled, visible in both the
        // document view and label-next; positive press shows everywhere
        // immediately; server rejects; everything reverts and a notice is
        // shown.
        let mut engine = engine();
        engine.status.version = Some(1);
        resolve(
            &mut engine,
            PanelId::Document,
            vec![wire("d0-0", "d0", None)],
            1,
        );
        resolve(
            &mut engine,
            PanelId::LabelNext,
            vec![wire("d0-0", "d0", None)],
            1,
        );

        let commands = engine.handle(Action::ApplyLabel {
            element_id: "d0-0".into(),
            action: LabelAction::Pos,
        });
        let Command::PutLabel { mutation_id, value, .. } = commands[0].clone() else {
            panic!("expected PutLabel, got {:?}", commands);
        };
        assert_eq!(value, "true");

        // Both views read the arena: the optimistic write is visible in both
        assert_eq!(engine.arena.label_of("d0-0"), Some(Label::Pos));
        assert!(engine.registry.panel(PanelId::Document).contains("d0-0"));
        assert!(engine.registry.panel(PanelId::LabelNext).contains("d0-0"));
        assert_eq!(engine.pos_count, 1);

        engine.handle(Action::LabelRejected {
            mutation_id,
            error: "boom".into(),
        });

        assert_eq!(engine.arena.label_of("d0-0"), Some(Label::None));
        assert_eq!(engine.pos_count, 0);
        assert_eq!(engine.notices().len(), 1);
    }

    #[test]
    fn test_label_without_category_is_refused() {
        let mut engine = engine();
        engine.cur_category = None;
        let commands = engine.handle(Action::ApplyLabel {
            element_id: "x".into(),
            action: LabelAction::Pos,
        });
        assert!(commands.is_empty());
        assert_eq!(engine.notices().len(), 1);
    }

    #[test]
    fn test_accepted_label_refreshes_status() {
        let mut engine = engine();
        resolve(
            &mut engine,
            PanelId::Document,
            vec![wire("d0-0", "d0", None)],
            1,
        );
        let commands = engine.handle(Action::ApplyLabel {
            element_id: "d0-0".into(),
            action: LabelAction::Neg,
        });
        let Command::PutLabel { mutation_id, .. } = commands[0] else {
            panic!();
        };
        let commands = engine.handle(Action::LabelAccepted { mutation_id });
        assert!(commands.contains(&Command::FetchStatus { category_id: 1 }));
    }

    #[test]
    fn test_stale_fetch_result_is_discarded() {
        let mut engine = engine();
        engine.cur_document = Some("d0".into());
        let first = engine.handle(Action::SetPage(PanelId::Document, 1));
        assert!(first.is_empty()); // already on page 1, no fetch
        engine.request_fetch_for_test(PanelId::Document);
        let stale_token = engine.registry.panel(PanelId::Document).fetch_seq;
        // A second fetch supersedes the first
        engine.request_fetch_for_test(PanelId::Document);

        engine.handle(Action::FetchResolved {
            panel: PanelId::Document,
            token: stale_token,
            response: ElementsResponse {
                elements: vec![wire("d0-0", "d0", None)],
                hit_count: 1,
                pairs: None,
            },
        });
        // Stale result discarded: still loading, nothing applied
        let panel = engine.registry.panel(PanelId::Document);
        assert!(panel.loading);
        assert_eq!(panel.element_ids, None);
    }

    #[test]
    fn test_model_version_advance_invalidates_and_refetches() {
        let mut engine = engine();
        engine.registry.set_active(PanelId::LabelNext);
        // First status resolve: version 1 appears
        let commands = engine.handle(Action::StatusResolved {
            iterations: vec![ModelIteration {
                iteration: 0,
                status: IterationStatus::Ready,
                estimated_precision: None,
            }],
        });
        assert_eq!(engine.status.version, Some(1));
        // The gated label-next panel can fetch now
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::Fetch { panel: PanelId::LabelNext, .. })));
    }

    #[test]
    fn test_model_panels_gated_until_version_known() {
        let mut engine = engine();
        let commands = engine.handle(Action::ActivatePanel(PanelId::LabelNext));
        // No model yet: activation cannot fetch
        assert!(commands.is_empty());
        assert!(!engine.registry.panel(PanelId::LabelNext).loading);
    }

    #[test]
    fn test_status_resolved_without_ready_model_keeps_panels_quiet() {
        let mut engine = engine();
        let commands = engine.handle(Action::StatusResolved {
            iterations: vec![ModelIteration {
                iteration: 0,
                status: IterationStatus::Training,
                estimated_precision: None,
            }],
        });
        assert!(commands.is_empty());
        assert_eq!(engine.status.version, Some(-1));
        assert!(engine.status.next_training);
    }

    #[test]
    fn test_poll_gated_by_category_and_retry_budget() {
        let mut engine = engine();
        // Version unknown: always polls
        assert_eq!(
            engine.handle(Action::PollTick),
            vec![Command::FetchStatus { category_id: 1 }]
        );
        engine.status.version = Some(1);
        engine.status.next_training = false;
        // Budget of 3 minus the tick above leaves two more polls
        assert!(!engine.handle(Action::PollTick).is_empty());
        assert!(!engine.handle(Action::PollTick).is_empty());
        assert!(engine.handle(Action::PollTick).is_empty());
        // Training evidence reopens the poll
        engine.status.next_training = true;
        assert!(!engine.handle(Action::PollTick).is_empty());

        engine.cur_category = None;
        assert!(engine.handle(Action::PollTick).is_empty());
    }

    #[test]
    fn test_sidebar_page_turn_focuses_new_pages_first_element() {
        let mut engine = engine();
        engine.registry.set_active(PanelId::Search);
        engine.registry.panel_mut(PanelId::Search).query = Some("q".into());
        // Page 1 of 2: five elements, ten hits
        engine.registry.panel_mut(PanelId::Search).fetch_seq = 1;
        let page1: Vec<UnparsedElement> =
            (0..5).map(|i| wire(&format!("d0-{i}"), "d0", None)).collect();
        engine.handle(Action::FetchResolved {
            panel: PanelId::Search,
            token: 1,
            response: ElementsResponse {
                elements: page1,
                hit_count: 10,
                pairs: None,
            },
        });
        engine.focus.set_sidebar_index(4, engine.registry.panel(PanelId::Search));

        // Next at the bottom edge requests page 2
        let commands = engine.handle(Action::SidebarNext);
        assert!(matches!(
            commands[0],
            Command::Fetch { panel: PanelId::Search, .. }
        ));
        assert_eq!(engine.registry.panel(PanelId::Search).page, 2);

        // Page 2 resolves; focus lands on its first element, not page 1's
        // stale last index
        let token = engine.registry.panel(PanelId::Search).fetch_seq;
        let page2: Vec<UnparsedElement> =
            (5..10).map(|i| wire(&format!("d0-{i}"), "d0", None)).collect();
        engine.handle(Action::FetchResolved {
            panel: PanelId::Search,
            token,
            response: ElementsResponse {
                elements: page2,
                hit_count: 10,
                pairs: None,
            },
        });
        assert_eq!(engine.focus.sidebar.index, Some(0));
    }

    #[test]
    fn test_open_focused_switches_document_with_single_fetch() {
        let mut engine = engine();
        engine.cur_document = Some("d0".into());
        engine.registry.set_active(PanelId::Search);
        engine.registry.panel_mut(PanelId::Search).query = Some("q".into());
        engine.registry.panel_mut(PanelId::Search).fetch_seq = 1;
        // Element 25 of another document: with main page size 10 it lives on
        // page 3
        engine.handle(Action::FetchResolved {
            panel: PanelId::Search,
            token: 1,
            response: ElementsResponse {
                elements: vec![wire("d1-25", "d1", None)],
                hit_count: 1,
                pairs: None,
            },
        });
        engine.focus.set_sidebar_index(0, engine.registry.panel(PanelId::Search));

        let commands = engine.handle(Action::OpenFocused);

        // One fetch, with the page already in place
        let fetches: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, Command::Fetch { panel: PanelId::Document, .. }))
            .collect();
        assert_eq!(fetches.len(), 1);
        assert_eq!(engine.cur_document.as_deref(), Some("d1"));
        assert_eq!(engine.registry.panel(PanelId::Document).page, 3);
        let main = engine.focus.main.as_ref().unwrap();
        assert_eq!(main.element_id, "d1-25");
        assert!(main.highlight);
    }

    #[test]
    fn test_sidebar_motion_never_touches_main_focus() {
        let mut engine = engine();
        engine.focus.set_main("d0-0", "d0", false);
        engine.registry.set_active(PanelId::Search);
        engine
            .registry
            .panel_mut(PanelId::Search)
            .accept_fetch(vec!["d0-1".into(), "d0-2".into()], 2);

        engine.handle(Action::SidebarNext);
        engine.handle(Action::SidebarNext);

        assert_eq!(engine.focus.main.as_ref().unwrap().element_id, "d0-0");
    }

    #[test]
    fn test_label_focused_auto_advances_on_label_next_only() {
        let mut engine = engine();
        engine.status.version = Some(1);
        engine.registry.set_active(PanelId::LabelNext);
        resolve(
            &mut engine,
            PanelId::LabelNext,
            vec![wire("d0-0", "d0", None), wire("d0-1", "d0", None)],
            2,
        );
        engine
            .focus
            .set_sidebar_index(0, engine.registry.panel(PanelId::LabelNext));

        engine.handle(Action::LabelFocused(LabelAction::Pos));
        assert_eq!(engine.focus.sidebar.index, Some(1));

        // The search panel does not auto-advance
        engine.registry.set_active(PanelId::Search);
        engine
            .registry
            .panel_mut(PanelId::Search)
            .accept_fetch(vec!["d0-0".into(), "d0-1".into()], 2);
        engine
            .focus
            .set_sidebar_index(0, engine.registry.panel(PanelId::Search));
        engine.handle(Action::LabelFocused(LabelAction::Pos));
        assert_eq!(engine.focus.sidebar.index, Some(0));
    }

    #[test]
    fn test_contradiction_pairs_are_stored_in_order() {
        let mut engine = engine();
        engine.registry.panel_mut(PanelId::ContradictingPairs).fetch_seq = 1;
        engine.handle(Action::FetchResolved {
            panel: PanelId::ContradictingPairs,
            token: 1,
            response: ElementsResponse {
                elements: vec![],
                hit_count: 1,
                pairs: Some(vec![(wire("d0-0", "d0", Some(true)), wire("d0-9", "d0", Some(false)))]),
            },
        });
        let panel = engine.registry.panel(PanelId::ContradictingPairs);
        assert_eq!(panel.pairs, vec![("d0-0".to_string(), "d0-9".to_string())]);
        assert_eq!(panel.page_len(), 2);
        assert_eq!(engine.arena.label_of("d0-0"), Some(Label::Pos));
        assert_eq!(engine.arena.label_of("d0-9"), Some(Label::Neg));
    }

    #[test]
    fn test_evaluation_round_trip_counts_changes() {
        let mut engine = engine();
        engine.status.version = Some(1);
        engine.registry.panel_mut(PanelId::Evaluation).fetch_seq = 1;
        engine.handle(Action::FetchResolved {
            panel: PanelId::Evaluation,
            token: 1,
            response: ElementsResponse {
                elements: vec![wire("d0-0", "d0", None), wire("d0-1", "d0", Some(true))],
                hit_count: 2,
                pairs: None,
            },
        });
        assert_eq!(engine.changed_elements_count(), 0);

        engine.handle(Action::ApplyLabel {
            element_id: "d0-0".into(),
            action: LabelAction::Pos,
        });
        assert_eq!(engine.changed_elements_count(), 1);

        let commands = engine.handle(Action::SubmitEvaluation);
        let Command::SubmitEvaluation { submission, .. } = &commands[0] else {
            panic!("expected SubmitEvaluation");
        };
        assert_eq!(submission.iteration, 0);
        assert_eq!(submission.changed_elements_count, 1);
        assert_eq!(submission.ids.len(), 2);

        engine.handle(Action::EvaluationSubmitted { score: 0.75 });
        assert_eq!(
            engine.registry.panel(PanelId::Evaluation).last_score,
            Some(0.75)
        );
    }

    #[test]
    fn test_select_category_clears_session_state() {
        let mut engine = engine();
        resolve(
            &mut engine,
            PanelId::Document,
            vec![wire("d0-0", "d0", Some(true))],
            1,
        );
        engine.pos_count = 4;

        let commands = engine.handle(Action::SelectCategory(Some(2)));

        assert!(engine.arena.is_empty());
        assert_eq!(engine.pos_count, 0);
        assert_eq!(engine.registry.panel(PanelId::Document).element_ids, None);
        assert!(commands.contains(&Command::FetchStatus { category_id: 2 }));
    }

    #[test]
    fn test_fetch_failed_keeps_stale_data() {
        let mut engine = engine();
        engine.cur_document = Some("d0".into());
        resolve(
            &mut engine,
            PanelId::Document,
            vec![wire("d0-0", "d0", None)],
            1,
        );
        engine.request_fetch_for_test(PanelId::Document);
        let token = engine.registry.panel(PanelId::Document).fetch_seq;

        engine.handle(Action::FetchFailed {
            panel: PanelId::Document,
            token,
            error: "timeout".into(),
        });

        let panel = engine.registry.panel(PanelId::Document);
        assert!(!panel.loading);
        assert_eq!(panel.page_len(), 1); // stale data retained
        assert_eq!(engine.notices().len(), 1);
    }

    #[test]
    fn test_refetch_does_not_revert_pending_label_write() {
        let mut engine = engine();
        resolve(
            &mut engine,
            PanelId::Document,
            vec![wire("d0-0", "d0", None)],
            1,
        );
        let commands = engine.handle(Action::ApplyLabel {
            element_id: "d0-0".into(),
            action: LabelAction::Pos,
        });
        let Command::PutLabel { mutation_id, .. } = commands[0] else {
            panic!("expected PutLabel");
        };

        // A fetch dispatched before the PUT resolves still carries the old
        // unlabeled state; the optimistic label must survive it
        engine.request_fetch_for_test(PanelId::Document);
        resolve(
            &mut engine,
            PanelId::Document,
            vec![wire("d0-0", "d0", None)],
            1,
        );
        assert_eq!(engine.arena.label_of("d0-0"), Some(Label::Pos));

        // Rejection afterwards still restores the pre-mutation label
        engine.handle(Action::LabelRejected {
            mutation_id,
            error: "conflict".into(),
        });
        assert_eq!(engine.arena.label_of("d0-0"), Some(Label::None));

        // Once no write is pending, the fetched label is authoritative again
        engine.request_fetch_for_test(PanelId::Document);
        resolve(
            &mut engine,
            PanelId::Document,
            vec![wire("d0-0", "d0", Some(true))],
            1,
        );
        assert_eq!(engine.arena.label_of("d0-0"), Some(Label::Pos));
    }

    #[test]
    fn test_shrunken_hit_count_clamps_page_and_refetches() {
        let mut engine = engine();
        engine.registry.set_active(PanelId::Search);
        {
            let panel = engine.registry.panel_mut(PanelId::Search);
            panel.query = Some("q".into());
            panel.page = 3;
            panel.fetch_seq = 1;
        }
        // The server now reports only one page of hits
        let commands = engine.handle(Action::FetchResolved {
            panel: PanelId::Search,
            token: 1,
            response: ElementsResponse {
                elements: vec![],
                hit_count: 4,
                pairs: None,
            },
        });
        assert_eq!(engine.registry.panel(PanelId::Search).page, 1);
        assert!(matches!(
            commands[0],
            Command::Fetch { panel: PanelId::Search, .. }
        ));
    }

    impl Engine {
        /// Test helper: force a fetch issue regardless of staleness checks
        fn request_fetch_for_test(&mut self, id: PanelId) {
            let panel = self.registry.panel_mut(id);
            panel.fetch_seq += 1;
            panel.loading = true;
        }
    }
}

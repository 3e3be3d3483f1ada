// Label mutation coordinator
//
// A label action is applied to the arena synchronously, before the network
// request is sent; panels read through the arena, so every view showing the
// element reflects the new label immediately. Views whose membership is a
// function of the user label get local repair where the element's position
// is unambiguous, and a refetch mark where it is not. Everything written
// here is captured in a snapshot so a server rejection restores the exact
// pre-mutation state.

use crate::arena::ElementArena;
use crate::elements::{transition, Label, LabelAction, LabelDelta};
use crate::panels::{Panel, PanelId, PanelRegistry};

/// Exact pre-mutation state of everything a mutation touched
#[derive(Debug, Clone)]
pub struct MutationSnapshot {
    pub element_id: String,
    pub prev_label: Label,
    /// Full prior state of each panel the mutation adjusted
    panels: Vec<Panel>,
}

/// Result of the optimistic phase of a label action
#[derive(Debug)]
pub struct MutationOutcome {
    pub new_label: Label,
    pub delta: LabelDelta,
    pub snapshot: MutationSnapshot,
}

/// Whether an element with the given user label belongs in the user-labels
/// panel under its current value filter
fn user_labels_member(label: Label, filter: Option<&str>) -> bool {
    match filter {
        Some("true") => label == Label::Pos,
        Some("false") => label == Label::Neg,
        _ => label != Label::None,
    }
}

/// Apply a label action optimistically. Returns None when the element is not
/// in the arena (evicted between keypress and dispatch); that is a no-op,
/// not an error.
pub fn apply(
    arena: &mut ElementArena,
    registry: &mut PanelRegistry,
    element_id: &str,
    action: LabelAction,
) -> Option<MutationOutcome> {
    let current = arena.label_of(element_id)?;
    let (new_label, delta) = transition(current, action);

    let mut snapshot = MutationSnapshot {
        element_id: element_id.to_string(),
        prev_label: current,
        panels: Vec::new(),
    };

    arena.set_label(element_id, new_label);

    // User-labels panel: membership is a pure function of the label, so its
    // count and (sometimes) its page window can be repaired locally
    repair_user_labels(registry, &mut snapshot, element_id, current, new_label);

    // Model-derived panels holding this element (suspicious, contradictions)
    // depend on the label in ways only the server can recompute; mark them
    // for a refetch instead of guessing
    for id in [PanelId::Suspicious, PanelId::ContradictingPairs] {
        if registry.panel(id).contains(element_id) {
            remember(registry, &mut snapshot, id);
            registry.panel_mut(id).needs_refetch = true;
        }
    }

    Some(MutationOutcome {
        new_label,
        delta,
        snapshot,
    })
}

/// Reverse a mutation exactly: restore the arena label and every adjusted
/// panel to its captured prior state
pub fn rollback(arena: &mut ElementArena, registry: &mut PanelRegistry, snapshot: MutationSnapshot) {
    arena.set_label(&snapshot.element_id, snapshot.prev_label);
    for panel in snapshot.panels {
        let id = panel.id;
        *registry.panel_mut(id) = panel;
    }
}

/// Capture a panel's state once; later adjustments to the same panel within
/// this mutation are covered by the first capture
fn remember(registry: &PanelRegistry, snapshot: &mut MutationSnapshot, id: PanelId) {
    if !snapshot.panels.iter().any(|p| p.id == id) {
        snapshot.panels.push(registry.panel(id).clone());
    }
}

fn repair_user_labels(
    registry: &mut PanelRegistry,
    snapshot: &mut MutationSnapshot,
    element_id: &str,
    prev: Label,
    new: Label,
) {
    let filter = registry
        .panel(PanelId::UserLabels)
        .filter
        .clone();
    let was = user_labels_member(prev, filter.as_deref());
    let is = user_labels_member(new, filter.as_deref());
    if was == is {
        return;
    }

    // Never-fetched panels have nothing to repair; the first fetch will see
    // the server's truth
    if registry.panel(PanelId::UserLabels).element_ids.is_none() {
        return;
    }

    remember(registry, snapshot, PanelId::UserLabels);
    let panel = registry.panel_mut(PanelId::UserLabels);

    if is {
        // Membership gained
        panel.hit_count = Some(panel.hit_count.unwrap_or(0) + 1);
        let room = (panel.page_len() as u64) < panel.page_size;
        if panel.on_last_page() && room {
            // Last page with room: append locally so the page stays
            // representative without a round-trip
            if let Some(ids) = panel.element_ids.as_mut() {
                ids.push(element_id.to_string());
            }
        } else {
            panel.needs_refetch = true;
        }
    } else {
        // Membership lost
        panel.hit_count = Some(panel.hit_count.unwrap_or(1).saturating_sub(1));
        let on_last = panel.on_last_page() || panel.page_count() == panel.page.saturating_sub(1);
        if panel.contains(element_id) {
            if let Some(ids) = panel.element_ids.as_mut() {
                ids.retain(|id| id != element_id);
            }
            if panel.page_len() == 0 && panel.page > 1 && on_last {
                // Sole entry of a trailing page: step back one page; the
                // previous page's content still needs a fetch
                panel.page -= 1;
                panel.needs_refetch = true;
            } else if !on_last {
                // Mid-pagination removal shifts every later page
                panel.needs_refetch = true;
            }
        } else {
            // Element lives on some other page; its removal shifts unknown
            // positions
            panel.needs_refetch = true;
        }
    }
}

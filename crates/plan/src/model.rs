// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The markdown plan document model (§4.2). A [`Plan`] is the parsed form of
//! the `.md` file a user (or `generatePlanSkeleton`) writes to disk; it is
//! distinct from `wharf_core::PlanState`, which is the scheduler's own
//! runtime record.

use serde::{Deserialize, Serialize};

/// Section headings recognized by the parser, in canonical document order.
/// Only `TODO` carries scheduler semantics; the rest are free-form prose
/// preserved verbatim for round-tripping and for inclusion in agent prompts.
pub const KNOWN_SECTIONS: &[&str] = &[
    "Plan Summary",
    "Objective",
    "Context",
    "Scope In",
    "Scope Out",
    "Success Criteria",
    "Constraints",
    "Assumptions",
    "Architecture Notes",
    "Decision Log",
    "Implementation Notes",
    "Plan-Specific Checks",
    "Review Focus",
    "Open Questions",
    "TODO",
    "Progress Log",
];

/// A single `## Heading` block and its raw body text (without the heading
/// line itself). Order is preserved from the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

/// The ternary mark on a TODO line: `[ ]`, `[x]`, or `[b]` (§3 "TODO marks").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoMark {
    Unchecked,
    Done,
    Blocked,
}

impl TodoMark {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(TodoMark::Unchecked),
            'x' | 'X' => Some(TodoMark::Done),
            'b' | 'B' => Some(TodoMark::Blocked),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            TodoMark::Unchecked => ' ',
            TodoMark::Done => 'x',
            TodoMark::Blocked => 'b',
        }
    }
}

/// One checklist line under `## TODO`, plus any indented lines directly
/// beneath it (kept verbatim, including their original indentation, and fed
/// back to the coding assistant as extra context for that item).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoItem {
    pub mark: TodoMark,
    pub text: String,
    pub context: Vec<String>,
}

impl TodoItem {
    /// Index of this item in document order, filled in once parsed into a
    /// [`Plan`]; callers that only hold a `&TodoItem` do not get this for
    /// free, so `Plan::todos` is the source of truth for position.
    pub fn is_done(&self) -> bool {
        self.mark == TodoMark::Done
    }
}

/// Lightweight metadata carried directly under the title line, distinct from
/// the prose sections. Not part of the original distilled format but needed
/// so `setStatus`/`setBranch` have somewhere to write without disturbing the
/// free-form sections a human edits (see DESIGN.md, "plan metadata block").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub status: Option<String>,
    pub branch: Option<String>,
}

/// The full parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub title: String,
    pub metadata: Metadata,
    pub sections: Vec<Section>,
    pub todos: Vec<TodoItem>,
}

impl Plan {
    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.heading.eq_ignore_ascii_case(heading))
    }

    /// True if no `## TODO` section was present at all (distinct from a
    /// present-but-empty section, per §4.8 "zero TODO items at all").
    pub fn has_todo_section(&self) -> bool {
        self.section("TODO").is_some()
    }

    /// True if any item anywhere in the list carries a `[b]` mark.
    pub fn has_blocked_marker(&self) -> bool {
        self.todos.iter().any(|t| t.mark == TodoMark::Blocked)
    }

    /// True once every item is `[x]` (vacuously true for an empty, but
    /// present, TODO section).
    pub fn all_done(&self) -> bool {
        self.todos.iter().all(TodoItem::is_done)
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;

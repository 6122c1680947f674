// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Markdown plan parsing and re-serialization (§4.2).

use std::fs;
use std::path::Path;

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::model::{Metadata, Plan, Section, TodoItem, TodoMark};

#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("failed to read plan file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("plan file has no title line (expected a leading `# Heading`)")]
    MissingTitle,
    #[error("malformed TODO item at line {line}: {text:?}")]
    MalformedTodo { line: usize, text: String },
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^##\s+(.+?)\s*$").expect("static regex"))
}

fn todo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-\s\[([ xXbB])\]\s+(.*)$").expect("static regex"))
}

fn metadata_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^-\s+(status|branch):\s*(.*)$").expect("static regex"))
}

/// Parse a plan markdown file from disk.
pub fn parse_plan(path: &Path) -> Result<Plan, PlanParseError> {
    let src = fs::read_to_string(path).map_err(|source| PlanParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_plan_str(&src)
}

/// Parse a plan markdown document already held in memory.
pub fn parse_plan_str(src: &str) -> Result<Plan, PlanParseError> {
    let lines: Vec<&str> = src.lines().collect();
    let mut idx = 0;

    // Title: first non-blank line, must be a top-level `# ` heading.
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    let title = match lines.get(idx) {
        Some(line) if line.trim_start().starts_with("# ") => {
            let t = line.trim_start().trim_start_matches('#').trim().to_string();
            idx += 1;
            t
        }
        _ => return Err(PlanParseError::MissingTitle),
    };

    // Metadata block: contiguous `- Status: ...` / `- Branch: ...` lines
    // (in any order) immediately following the title, before the first
    // section heading.
    let mut metadata = Metadata::default();
    while idx < lines.len() {
        let line = lines[idx];
        if line.trim().is_empty() {
            idx += 1;
            continue;
        }
        if let Some(caps) = metadata_re().captures(line) {
            let key = caps[1].to_ascii_lowercase();
            let value = caps[2].trim().to_string();
            match key.as_str() {
                "status" => metadata.status = Some(value),
                "branch" => metadata.branch = Some(value),
                _ => unreachable!(),
            }
            idx += 1;
        } else {
            break;
        }
    }

    // Sections: `## Heading` followed by body lines up to the next `##`.
    let mut sections: Vec<Section> = Vec::new();
    let mut current_heading: Option<String> = None;
    let mut current_body: Vec<&str> = Vec::new();

    let flush = |heading: Option<String>, body: &mut Vec<&str>, sections: &mut Vec<Section>| {
        if let Some(heading) = heading {
            sections.push(Section {
                heading,
                body: body.join("\n").trim_matches('\n').to_string(),
            });
        }
        body.clear();
    };

    while idx < lines.len() {
        let line = lines[idx];
        if let Some(caps) = heading_re().captures(line) {
            flush(current_heading.take(), &mut current_body, &mut sections);
            current_heading = Some(caps[1].to_string());
        } else {
            current_body.push(line);
        }
        idx += 1;
    }
    flush(current_heading.take(), &mut current_body, &mut sections);

    let todos = match sections.iter().find(|s| s.heading.eq_ignore_ascii_case("TODO")) {
        Some(section) => parse_todos(&section.body)?,
        None => Vec::new(),
    };

    Ok(Plan {
        title,
        metadata,
        sections,
        todos,
    })
}

fn parse_todos(body: &str) -> Result<Vec<TodoItem>, PlanParseError> {
    let mut items: Vec<TodoItem> = Vec::new();
    for (line_no, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = todo_re().captures(line) {
            let mark = TodoMark::from_char(caps[1].chars().next().unwrap_or(' '))
                .unwrap_or(TodoMark::Unchecked);
            items.push(TodoItem {
                mark,
                text: caps[2].trim().to_string(),
                context: Vec::new(),
            });
        } else if line.starts_with(' ') || line.starts_with('\t') {
            match items.last_mut() {
                Some(item) => item.context.push(line.to_string()),
                None => {
                    return Err(PlanParseError::MalformedTodo {
                        line: line_no + 1,
                        text: line.to_string(),
                    })
                }
            }
        } else {
            return Err(PlanParseError::MalformedTodo {
                line: line_no + 1,
                text: line.to_string(),
            });
        }
    }
    Ok(items)
}

/// The first item (in document order) whose mark is not `[x]`. Per §4.8 this
/// is "the head" of the checklist: it may itself be `[b]`, in which case the
/// caller transitions the plan to blocked rather than running an agent.
pub fn find_next_unchecked(plan: &Plan) -> Option<&TodoItem> {
    plan.todos.iter().find(|t| !t.is_done())
}

/// Set the `Status` metadata line, leaving every section untouched.
pub fn set_status(plan: &mut Plan, status: impl Into<String>) {
    plan.metadata.status = Some(status.into());
}

/// Set the `Branch` metadata line, leaving every section untouched.
pub fn set_branch(plan: &mut Plan, branch: impl Into<String>) {
    plan.metadata.branch = Some(branch.into());
}

/// Render the document body handed to the coding assistant: every section
/// after the title, with the metadata block stripped (it is bookkeeping for
/// wharf, not context for the agent).
pub fn extract_body(plan: &Plan) -> String {
    let mut out = String::new();
    for section in &plan.sections {
        out.push_str("## ");
        out.push_str(&section.heading);
        out.push('\n');
        if !section.body.is_empty() {
            out.push_str(&section.body);
            out.push('\n');
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Re-serialize a [`Plan`] back to markdown. Round-trips every section
/// verbatim; only the metadata block reflects `setStatus`/`setBranch`
/// mutations (§3 round-trip law).
pub fn serialize(plan: &Plan) -> String {
    let mut out = String::new();
    out.push_str("# ");
    out.push_str(&plan.title);
    out.push('\n');

    if plan.metadata.status.is_some() || plan.metadata.branch.is_some() {
        out.push('\n');
        if let Some(status) = &plan.metadata.status {
            out.push_str("- Status: ");
            out.push_str(status);
            out.push('\n');
        }
        if let Some(branch) = &plan.metadata.branch {
            out.push_str("- Branch: ");
            out.push_str(branch);
            out.push('\n');
        }
    }

    for section in &plan.sections {
        out.push('\n');
        out.push_str("## ");
        out.push_str(&section.heading);
        out.push('\n');
        if section.heading.eq_ignore_ascii_case("TODO") {
            out.push_str(&serialize_todos(&plan.todos));
        } else if !section.body.is_empty() {
            out.push_str(&section.body);
            out.push('\n');
        }
    }

    let mut out = out.trim_end().to_string();
    out.push('\n');
    out
}

fn serialize_todos(todos: &[TodoItem]) -> String {
    let mut out = String::new();
    for item in todos {
        out.push_str("- [");
        out.push(item.mark.as_char());
        out.push_str("] ");
        out.push_str(&item.text);
        out.push('\n');
        for line in &item.context {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;

use super::*;
use crate::model::KNOWN_SECTIONS;

const SAMPLE: &str = r#"# Add rate limiting

- Status: active
- Branch: plan-add-rate-limiting-9f2a

## Plan Summary
Add a token-bucket limiter in front of the public API.

## Objective
Prevent a single caller from starving the others.

## Context

## Scope In

## Scope Out

## Success Criteria

## Constraints

## Assumptions

## Architecture Notes

## Decision Log

## Implementation Notes

## Plan-Specific Checks

## Review Focus

## Open Questions

## TODO
- [x] sketch the limiter interface
- [ ] implement the token bucket
      use a monotonic clock, not wall time
- [b] wire the limiter into the router
      blocked on deciding which middleware layer owns this

## Progress Log
"#;

#[test]
fn parses_title_and_metadata() {
    let plan = parse_plan_str(SAMPLE).unwrap();
    assert_eq!(plan.title, "Add rate limiting");
    assert_eq!(plan.metadata.status.as_deref(), Some("active"));
    assert_eq!(
        plan.metadata.branch.as_deref(),
        Some("plan-add-rate-limiting-9f2a")
    );
}

#[test]
fn parses_all_known_sections_in_order() {
    let plan = parse_plan_str(SAMPLE).unwrap();
    let headings: Vec<&str> = plan.sections.iter().map(|s| s.heading.as_str()).collect();
    assert_eq!(headings, KNOWN_SECTIONS.to_vec());
}

#[test]
fn parses_todo_marks_and_context_lines() {
    let plan = parse_plan_str(SAMPLE).unwrap();
    assert_eq!(plan.todos.len(), 3);
    assert_eq!(plan.todos[0].mark, TodoMark::Done);
    assert_eq!(plan.todos[1].mark, TodoMark::Unchecked);
    assert_eq!(plan.todos[1].context.len(), 1);
    assert!(plan.todos[1].context[0].contains("monotonic clock"));
    assert_eq!(plan.todos[2].mark, TodoMark::Blocked);
}

#[test]
fn find_next_unchecked_returns_first_non_done_item() {
    let plan = parse_plan_str(SAMPLE).unwrap();
    let next = find_next_unchecked(&plan).unwrap();
    assert_eq!(next.mark, TodoMark::Unchecked);
    assert!(next.text.contains("token bucket"));
}

#[test]
fn find_next_unchecked_can_surface_a_blocked_head() {
    let src = r#"# Only blocked left

## TODO
- [x] step one
- [b] step two
"#;
    let plan = parse_plan_str(src).unwrap();
    let next = find_next_unchecked(&plan).unwrap();
    assert_eq!(next.mark, TodoMark::Blocked);
}

#[test]
fn find_next_unchecked_is_none_when_all_done() {
    let src = "# Done plan\n\n## TODO\n- [x] one\n- [x] two\n";
    let plan = parse_plan_str(src).unwrap();
    assert!(find_next_unchecked(&plan).is_none());
    assert!(plan.all_done());
}

#[test]
fn missing_todo_section_has_no_items_and_is_distinguishable() {
    let src = "# No todos\n\n## Objective\nDo something.\n";
    let plan = parse_plan_str(src).unwrap();
    assert!(plan.todos.is_empty());
    assert!(!plan.has_todo_section());
}

#[test]
fn present_but_empty_todo_section_is_distinguishable_from_missing() {
    let src = "# Empty todos\n\n## TODO\n";
    let plan = parse_plan_str(src).unwrap();
    assert!(plan.todos.is_empty());
    assert!(plan.has_todo_section());
}

#[test]
fn missing_title_is_an_error() {
    let err = parse_plan_str("## Objective\nNo title here.\n").unwrap_err();
    assert!(matches!(err, PlanParseError::MissingTitle));
}

#[test]
fn malformed_todo_line_is_an_error() {
    let src = "# Bad todos\n\n## TODO\nnot a checklist item\n";
    let err = parse_plan_str(src).unwrap_err();
    assert!(matches!(err, PlanParseError::MalformedTodo { .. }));
}

#[test]
fn set_status_and_set_branch_round_trip_through_serialize() {
    let mut plan = parse_plan_str(SAMPLE).unwrap();
    set_status(&mut plan, "blocked");
    set_branch(&mut plan, "plan-add-rate-limiting-9f2a-v2");

    let rendered = serialize(&plan);
    let reparsed = parse_plan_str(&rendered).unwrap();

    assert_eq!(reparsed.metadata.status.as_deref(), Some("blocked"));
    assert_eq!(
        reparsed.metadata.branch.as_deref(),
        Some("plan-add-rate-limiting-9f2a-v2")
    );
    assert_eq!(reparsed.sections, plan.sections);
    assert_eq!(reparsed.todos, plan.todos);
}

#[test]
fn serialize_round_trip_preserves_sections_when_metadata_untouched() {
    let plan = parse_plan_str(SAMPLE).unwrap();
    let rendered = serialize(&plan);
    let reparsed = parse_plan_str(&rendered).unwrap();
    assert_eq!(reparsed, plan);
}

#[test]
fn extract_body_drops_title_and_metadata_but_keeps_sections() {
    let plan = parse_plan_str(SAMPLE).unwrap();
    let body = extract_body(&plan);
    assert!(!body.contains("Add rate limiting"));
    assert!(!body.contains("Status: active"));
    assert!(body.contains("## Objective"));
    assert!(body.contains("## TODO"));
    assert!(body.contains("implement the token bucket"));
}

#[test]
fn parse_plan_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.md");
    std::fs::write(&path, SAMPLE).unwrap();
    let plan = parse_plan(&path).unwrap();
    assert_eq!(plan.title, "Add rate limiting");
}

#[test]
fn parse_plan_missing_file_is_an_io_error() {
    let err = parse_plan(std::path::Path::new("/nonexistent/plan.md")).unwrap_err();
    assert!(matches!(err, PlanParseError::Io { .. }));
}

use super::*;
use crate::model::TodoMark;
use crate::parser::parse_plan_str;

#[test]
fn skeleton_contains_every_known_section() {
    let doc = generate_plan_skeleton("Add rate limiting");
    for heading in KNOWN_SECTIONS {
        assert!(
            doc.contains(&format!("## {heading}")),
            "missing section {heading}"
        );
    }
}

#[test]
fn skeleton_parses_back_with_one_unchecked_todo() {
    let doc = generate_plan_skeleton("Add rate limiting");
    let plan = parse_plan_str(&doc).unwrap();
    assert_eq!(plan.title, "Add rate limiting");
    assert_eq!(plan.metadata.status.as_deref(), Some("draft"));
    assert_eq!(plan.todos.len(), 1);
    assert_eq!(plan.todos[0].mark, TodoMark::Unchecked);
}

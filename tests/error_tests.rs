use althtml::{compile, ErrorKind};

fn kinds(source: &str) -> Vec<ErrorKind> {
    compile(source)
        .unwrap_err()
        .into_iter()
        .map(|d| d.kind)
        .collect()
}

#[test]
fn indentation_jump_is_rejected() {
    let kinds = kinds("a\n  b\n        c\n");
    assert!(kinds.contains(&ErrorKind::IndentationJump));
}

#[test]
fn non_multiple_indent_is_a_unit_conflict() {
    let kinds = kinds("div\n  a\n   b\n");
    assert!(kinds.contains(&ErrorKind::IndentationUnitConflict));
}

#[test]
fn mixed_tabs_and_spaces_are_a_unit_conflict() {
    let kinds = kinds("div\n\t p\n");
    assert!(kinds.contains(&ErrorKind::IndentationUnitConflict));
}

#[test]
fn unknown_colon_directive() {
    let kinds = kinds(":wat\n  p\n");
    assert!(kinds.contains(&ErrorKind::UnknownDirective));
}

#[test]
fn stray_at_sign_is_unknown() {
    let kinds = kinds("@\n");
    assert!(kinds.contains(&ErrorKind::UnknownDirective));
}

#[test]
fn unterminated_attribute_value() {
    let kinds = kinds("div title=\"oops\n");
    assert!(kinds.contains(&ErrorKind::MalformedAttribute));
}

#[test]
fn equals_without_a_name() {
    let kinds = kinds("div =\"v\"\n");
    assert!(kinds.contains(&ErrorKind::MalformedAttribute));
}

#[test]
fn set_without_a_name() {
    let kinds = kinds("set = \"x\"\n");
    assert!(kinds.contains(&ErrorKind::MalformedAttribute));
}

#[test]
fn unquoted_inline_set_value() {
    let kinds = kinds("set user = bare\n");
    assert!(kinds.contains(&ErrorKind::MalformedAttribute));
}

#[test]
fn raw_with_inline_content() {
    let kinds = kinds("raw <b>x</b>\n");
    assert!(kinds.contains(&ErrorKind::RawBlockMisuse));
}

#[test]
fn self_closing_tag_with_a_block() {
    let kinds = kinds("img>\n  p\n");
    assert!(kinds.contains(&ErrorKind::SelfClosingHasChildren));
}

#[test]
fn void_element_with_pipe_text() {
    let kinds = kinds("br | text\n");
    assert!(kinds.contains(&ErrorKind::SelfClosingHasChildren));
}

#[test]
fn independent_errors_are_all_reported() {
    let kinds = kinds("a\n  b\n        c\ndiv t=\"unterminated\n");
    assert!(kinds.contains(&ErrorKind::IndentationJump));
    assert!(kinds.contains(&ErrorKind::MalformedAttribute));
}

#[test]
fn positions_point_at_the_offending_line() {
    let diags = compile("html\n  @broken!\n").unwrap_err();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::UnknownDirective);
    assert_eq!(diags[0].line, 2);
    assert_eq!(diags[0].column, 3);
}

#[test]
fn diagnostics_render_in_line_col_kind_form() {
    let diags = compile("raw oops\n").unwrap_err();
    assert_eq!(
        diags[0].to_string(),
        "1:1: raw-block-misuse: inline content on a raw directive; put it on an indented line"
    );
}

#[test]
fn recovery_does_not_mask_good_output_paths() {
    // The bad line and its block are dropped; compilation still walks the
    // rest of the document and reports its errors too.
    let diags = compile("raw inline\nset = \"x\"\n").unwrap_err();
    assert_eq!(diags.len(), 2);
}

use althtml::{compile, ErrorKind};

fn html(source: &str) -> String {
    compile(source).expect("source should compile")
}

#[test]
fn nullary_macro_expands_at_each_invocation() {
    let out = html(":macro header\n  div hero\n    h1 | Welcome\n@header\n@header\n");
    assert_eq!(
        out,
        "<div class=\"hero\"><h1>Welcome</h1></div>\
         <div class=\"hero\"><h1>Welcome</h1></div>"
    );
}

#[test]
fn parameterized_macro_with_word_and_text_arguments() {
    let out = html(
        ":macro !button\n  button class=\"btn btn-@0\"\n    @1\n\
         !button\n  primary\n  | Click Me\n",
    );
    assert_eq!(out, "<button class=\"btn btn-primary\">Click Me</button>");
}

#[test]
fn structural_argument_splices_in_node_position() {
    let out = html(":macro !wrap\n  section\n    @0\n!wrap\n  div inner\n    p | body\n");
    assert_eq!(
        out,
        "<section><div class=\"inner\"><p>body</p></div></section>"
    );
}

#[test]
fn one_argument_used_twice() {
    let out = html(":macro !echo\n  p | @0 and @0\n!echo\n  | again\n");
    assert_eq!(out, "<p>again and again</p>");
}

#[test]
fn arguments_resolve_at_the_call_site() {
    let out = html("set word = \"early\"\n:macro !show\n  p\n    @0\n!show\n  | word\n");
    assert_eq!(out, "<p>early</p>");
}

#[test]
fn bindings_inside_a_body_do_not_leak() {
    let out = html(":macro setter\n  set local = \"x\"\n@setter\np | local\n");
    assert_eq!(out, "<p>local</p>");
}

#[test]
fn macro_invoking_macro() {
    let out = html(
        ":macro inner\n  em | deep\n:macro outer\n  p\n    @inner\n@outer\n",
    );
    assert_eq!(out, "<p><em>deep</em></p>");
}

#[test]
fn missing_argument_is_an_arity_error() {
    let diags = compile(":macro !pair\n  span | @0 and @1\n!pair\n  | only\n").unwrap_err();
    assert!(diags.iter().any(|d| d.kind == ErrorKind::MacroArityError));
}

#[test]
fn placeholder_outside_a_macro_body() {
    let diags = compile("@0\n").unwrap_err();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, ErrorKind::MacroArityError);
}

#[test]
fn nullary_invocation_rejects_an_argument_block() {
    let diags = compile(":macro hi\n  p | hi\n@hi\n  div\n").unwrap_err();
    assert!(diags.iter().any(|d| d.kind == ErrorKind::MacroArityError));
}

#[test]
fn structural_argument_in_text_position_is_a_mismatch() {
    let diags = compile(":macro !cap\n  p | top @0\n!cap\n  div deep\n    span\n").unwrap_err();
    assert!(diags
        .iter()
        .any(|d| d.kind == ErrorKind::BindingKindMismatch));
}

#[test]
fn sigil_mismatch_is_reported() {
    let diags = compile(":macro !btn\n  p\n@btn\n").unwrap_err();
    assert!(diags
        .iter()
        .any(|d| d.kind == ErrorKind::BindingKindMismatch));

    let diags = compile(":macro hdr\n  p\n!hdr\n").unwrap_err();
    assert!(diags
        .iter()
        .any(|d| d.kind == ErrorKind::BindingKindMismatch));
}

#[test]
fn undefined_macro_is_unknown_binding() {
    let diags = compile("@nope\n").unwrap_err();
    assert_eq!(diags[0].kind, ErrorKind::UnknownBinding);
}

#[test]
fn set_name_invoked_as_macro_is_a_mismatch() {
    let diags = compile("set x = \"1\"\n@x\n").unwrap_err();
    assert_eq!(diags[0].kind, ErrorKind::BindingKindMismatch);
}

#[test]
fn name_conflicts_across_kinds() {
    let diags = compile("set brand = \"x\"\n:macro brand\n  p\n").unwrap_err();
    assert_eq!(diags[0].kind, ErrorKind::NameConflict);

    let diags = compile(":macro nav\n  p\nset nav = \"x\"\n").unwrap_err();
    assert_eq!(diags[0].kind, ErrorKind::NameConflict);
}

#[test]
fn body_errors_are_echoed_at_the_invocation_site() {
    let diags = compile(":macro bad\n  @9\n@bad\n").unwrap_err();
    let arity: Vec<_> = diags
        .iter()
        .filter(|d| d.kind == ErrorKind::MacroArityError)
        .collect();
    assert_eq!(arity.len(), 2);
    // Once at the placeholder's own line, once at the invocation.
    assert!(arity.iter().any(|d| d.line == 2));
    assert!(arity.iter().any(|d| d.line == 3));
}

#[test]
fn recursion_is_capped() {
    // Deep expansion needs more stack than the default test thread has.
    let handle = std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(|| compile(":macro spin\n  @spin\n@spin\n").unwrap_err())
        .expect("thread should spawn");
    let diags = handle.join().expect("thread should finish");
    assert!(diags.iter().any(|d| d.kind == ErrorKind::MacroRecursion));
}

#[test]
fn nested_definitions_keep_their_own_placeholders() {
    let out = html(
        ":macro !outer\n  :macro !inner\n    p | @0\n  !inner\n    | x\n!outer\n  | OUT\n",
    );
    assert_eq!(out, "<p>x</p>");
}

#[test]
fn macro_bodies_see_call_site_bindings() {
    let out = html(":macro greet\n  p | Hello user\nset user = \"Ada\"\n@greet\n");
    assert_eq!(out, "<p>Hello Ada</p>");
}

use althtml::compile;

fn html(source: &str) -> String {
    compile(source).expect("source should compile")
}

#[test]
fn basic_hierarchy() {
    let out = html("html\n  head\n    title | My Page\n  body\n    div\n      p\n    footer\n");
    assert_eq!(
        out,
        "<html><head><title>My Page</title></head>\
         <body><div><p></p></div><footer></footer></body></html>"
    );
}

#[test]
fn pipe_text_keeps_quotes_and_substitutes() {
    let out = html("set user = \"u\"\np | This is \"literal text\" for user.\n");
    assert_eq!(out, "<p>This is \"literal text\" for u.</p>");
}

#[test]
fn attributes_merge_into_id_class_and_pairs() {
    let out = html(
        "set userId = \"123\"\n\
         set theme = \"dark\"\n\
         div btn theme class=\"extra\" #user- #userId data-value=\"some \\\"quoted\\\" data\"\n",
    );
    assert_eq!(
        out,
        "<div id=\"user-123\" class=\"btn dark extra\" \
         data-value=\"some &quot;quoted&quot; data\"></div>"
    );
}

#[test]
fn explicit_self_closing_tag() {
    let out = html("img> src=\"logo.png\" alt=\"My Image\"\n");
    assert_eq!(out, "<img src=\"logo.png\" alt=\"My Image\" />");
}

#[test]
fn void_elements_self_close_without_the_angle() {
    let out = html("div\n  br\n  hr\n");
    assert_eq!(out, "<div><br /><hr /></div>");
}

#[test]
fn doctype_is_canonical() {
    let out = html("!DOCTYPE html\nhtml\n  body\n");
    assert_eq!(out, "<!DOCTYPE html><html><body></body></html>");
}

#[test]
fn angle_sigil_names_a_custom_element() {
    let out = html("<my-widget data-x=\"1\"\n  p | inside\n");
    assert_eq!(out, "<my-widget data-x=\"1\"><p>inside</p></my-widget>");
}

#[test]
fn implicit_text_collapses_whitespace() {
    let out = html("p\n  3  dogs   barked\n");
    assert_eq!(out, "<p>3 dogs barked</p>");
}

#[test]
fn quoted_implicit_text_preserves_whitespace() {
    let out = html("p\n  \" keep  this \"\n");
    assert_eq!(out, "<p> keep  this </p>");
}

#[test]
fn adjacent_implicit_text_lines_join_with_one_space() {
    let out = html("p\n  1 one\n  2 two\n");
    assert_eq!(out, "<p>1 one 2 two</p>");
}

#[test]
fn text_metacharacters_are_escaped() {
    let out = html("p | a < b & c > d\n");
    assert_eq!(out, "<p>a &lt; b &amp; c &gt; d</p>");
}

#[test]
fn comments_are_stripped_outside_quotes() {
    let out = html("div #// build the box\n  p | a #// trailing note\n");
    assert_eq!(out, "<div><p>a</p></div>");
}

#[test]
fn comment_marker_survives_inside_quoted_value() {
    let out = html("div title=\"x #// y\"\n");
    assert_eq!(out, "<div title=\"x #// y\"></div>");
}

#[test]
fn tabs_work_as_the_unit() {
    let out = html("html\n\tbody\n\t\tp | hi\n");
    assert_eq!(out, "<html><body><p>hi</p></body></html>");
}

#[test]
fn doubling_the_unit_gives_the_same_tree() {
    let two = html("div\n  p\n    span | x\n");
    let four = html("div\n    p\n        span | x\n");
    assert_eq!(two, four);
}

#[test]
fn compilation_is_deterministic() {
    let source = "set a = \"1\"\ndiv a #x\n  p | a\n";
    assert_eq!(html(source), html(source));
}

#[test]
fn pipe_directly_after_head() {
    let out = html("p| tight\n");
    assert_eq!(out, "<p>tight</p>");
}

#[test]
fn empty_source_is_empty_output() {
    assert_eq!(html(""), "");
    assert_eq!(html("\n\n#// only a comment\n"), "");
}

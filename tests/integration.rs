// Integration tests for the template engine

use std::cell::Cell;
use std::rc::Rc;

use template_lang::{
    EvalOptions, FieldAccessor, HostObject, NativeFunction, ObjectRef, ParamType, ScriptObject,
    Signature, TemplateEngine, Value,
};

fn render(source: &str) -> String {
    TemplateEngine::new()
        .render(source, ScriptObject::new().into_ref())
        .expect("render failed")
}

fn render_with(source: &str, root: ObjectRef) -> String {
    TemplateEngine::new()
        .render(source, root)
        .expect("render failed")
}

fn render_err(source: &str) -> String {
    TemplateEngine::new()
        .render(source, ScriptObject::new().into_ref())
        .expect_err("expected render to fail")
        .to_string()
}

// ========== End-to-end scenarios ==========

#[test]
fn test_for_loop_over_array_literal() {
    assert_eq!(render("{{ for x in [1,2,3] }}{{x}}{{ end }}"), "123");
}

#[test]
fn test_object_literal_member_access() {
    assert_eq!(render("{{ a = {foo: 1} }}{{ a.foo }}"), "1");
}

#[test]
fn test_division_produces_double() {
    assert_eq!(render("{{ 5 / 2 }}"), "2.5");
    assert_eq!(render("{{ 5 // 2 }}"), "2");
}

#[test]
fn test_read_only_binding_rejects_assignment() {
    let root = ScriptObject::new().into_ref();
    root.borrow_mut().define("x", Value::Int(1), true);
    let err = TemplateEngine::new()
        .render("{{ x = 2 }}", root)
        .unwrap_err()
        .to_string();
    assert!(err.contains("read-only"), "unexpected error: {}", err);
    assert!(err.contains("x"), "unexpected error: {}", err);
}

#[test]
fn test_ascending_and_descending_ranges() {
    assert_eq!(render("{{ for x in 1..3 }}{{x}}{{end}}"), "123");
    assert_eq!(render("{{ for x in 3..1 }}{{x}}{{end}}"), "321");
}

#[test]
fn test_exclusive_range() {
    assert_eq!(render("{{ for x in 1..<4 }}{{x}}{{end}}"), "123");
}

#[test]
fn test_host_function_arity_and_coercion() {
    let root = ScriptObject::new().into_ref();
    root.borrow_mut().define(
        "both_equal",
        NativeFunction::value(
            "both_equal",
            Signature::new()
                .required("a", ParamType::String)
                .required("b", ParamType::String),
            |_ev, args| Ok(Value::Bool(args.get(0) == args.get(1))),
        ),
        false,
    );

    // Two non-string arguments are each coerced to string before invocation
    assert_eq!(
        render_with("{{ both_equal(12, '12') }}", root.clone()),
        "true"
    );

    let err = TemplateEngine::new()
        .render("{{ both_equal(1) }}", root)
        .unwrap_err()
        .to_string();
    assert!(
        err.contains("invalid number of arguments 1 passed to 'both_equal', expecting between 2 and 2"),
        "unexpected error: {}",
        err
    );
}

// ========== Text and output ==========

#[test]
fn test_raw_text_passes_through() {
    assert_eq!(render("hello world"), "hello world");
}

#[test]
fn test_null_values_do_not_print() {
    assert_eq!(render("a{{ null }}b"), "ab");
}

#[test]
fn test_assignments_do_not_print() {
    assert_eq!(render("a{{ x = 5 }}b{{ x }}"), "ab5");
}

#[test]
fn test_whitespace_trim_markers() {
    assert_eq!(render("a   {{- 'b' -}}   c"), "abc");
}

#[test]
fn test_context_data_lookup() {
    let root = ScriptObject::new().into_ref();
    root.borrow_mut().set("name", Value::String("World".into()));
    assert_eq!(render_with("Hello {{ name }}!", root), "Hello World!");
}

// ========== Control flow ==========

#[test]
fn test_if_else_chain() {
    let source = "{{ if x == 1 }}one{{ else if x == 2 }}two{{ else }}many{{ end }}";
    for (value, expected) in [(1, "one"), (2, "two"), (9, "many")] {
        let root = ScriptObject::new().into_ref();
        root.borrow_mut().set("x", Value::Int(value));
        assert_eq!(render_with(source, root), expected);
    }
}

#[test]
fn test_case_when_dispatch() {
    let source = "{{ case x }}{{ when 1 }}one{{ when 2, 3 }}few{{ else }}other{{ end }}";
    for (value, expected) in [(1, "one"), (2, "few"), (3, "few"), (9, "other")] {
        let root = ScriptObject::new().into_ref();
        root.borrow_mut().set("x", Value::Int(value));
        assert_eq!(render_with(source, root), expected);
    }
}

#[test]
fn test_break_terminates_only_its_loop() {
    let out = render("{{ for x in [1,2,3] }}{{ if x == 2 }}{{ break }}{{ end }}{{ x }}{{ end }}after");
    assert_eq!(out, "1after");
}

#[test]
fn test_continue_skips_iteration() {
    let out = render("{{ for x in [1,2,3] }}{{ if x == 2 }}{{ continue }}{{ end }}{{ x }}{{ end }}");
    assert_eq!(out, "13");
}

#[test]
fn test_nested_loop_break_is_local() {
    let out = render(
        "{{ for a in [1,2] }}{{ for b in [1,2,3] }}{{ if b == 2 }}{{ break }}{{ end }}{{ b }}{{ end }}|{{ end }}",
    );
    assert_eq!(out, "1|1|");
}

#[test]
fn test_return_from_loop_inside_function() {
    let out = render(
        "{{ func f }}{{ for i in 1..10 }}{{ if i == 3 }}{{ ret i }}{{ end }}{{ end }}{{ end }}{{ f }}",
    );
    assert_eq!(out, "3");
}

#[test]
fn test_break_outside_loop_is_error() {
    let err = render_err("{{ break }}");
    assert!(err.contains("outside of a loop"), "unexpected error: {}", err);
}

#[test]
fn test_break_outside_loop_degrades_with_option() {
    let mut engine = TemplateEngine::new();
    engine.options.break_outside_loop = true;
    let out = engine
        .render("a{{ break }}b", ScriptObject::new().into_ref())
        .expect("render failed");
    assert_eq!(out, "a");
}

#[test]
fn test_while_loop() {
    let out = render("{{ i = 0 }}{{ while i < 3 }}{{ i = i + 1 }}{{ i }}{{ end }}");
    assert_eq!(out, "123");
}

#[test]
fn test_top_level_return_stops_render() {
    assert_eq!(render("a{{ ret }}b"), "a");
}

// ========== Loop bookkeeping ==========

#[test]
fn test_loop_flags() {
    let out = render(
        "{{ for x in ['a','b','c'] }}{{ for.index }}{{ if for.first }}F{{ end }}{{ if for.last }}L{{ end }}{{ end }}",
    );
    assert_eq!(out, "0F12L");
}

#[test]
fn test_loop_offset_and_limit() {
    let out = render("{{ for x in ['a','b','c'] offset: 1 limit: 1 }}{{ x }}{{ for.length }}{{ end }}");
    assert_eq!(out, "b1");
}

#[test]
fn test_loop_reversed() {
    assert_eq!(render("{{ for x in [1,2,3] reversed }}{{ x }}{{ end }}"), "321");
}

#[test]
fn test_loop_even_odd_rindex() {
    let out = render("{{ for x in [9,9,9] }}{{ for.rindex }}{{ if for.even }}e{{ else }}o{{ end }}{{ end }}");
    assert_eq!(out, "2e1o0e");
}

#[test]
fn test_loop_changed_flag() {
    let out = render("{{ for x in [1,1,2] }}{{ if for.changed }}c{{ else }}s{{ end }}{{ end }}");
    assert_eq!(out, "csc");
}

#[test]
fn test_while_loop_index() {
    let out = render("{{ i = 0 }}{{ while i < 2 }}{{ while.index }}{{ i = i + 1 }}{{ end }}");
    assert_eq!(out, "01");
}

#[test]
fn test_loop_variable_is_scoped_to_the_loop() {
    let err = render_err("{{ for x in [1] }}{{ end }}{{ x }}");
    assert!(err.contains("was not found"), "unexpected error: {}", err);
}

#[test]
fn test_iterating_object_yields_key_value_entries() {
    let out = render("{{ for e in {a: 1, b: 2} }}{{ e.key }}={{ e.value }};{{ end }}");
    assert_eq!(out, "a=1;b=2;");
}

#[test]
fn test_iterating_string_yields_characters() {
    assert_eq!(render("{{ for c in 'abc' }}{{ c }}.{{ end }}"), "a.b.c.");
}

#[test]
fn test_tablerow_markup() {
    let out = render("{{ tablerow x in [1,2,3] cols: 2 }}{{ x }}{{ end }}");
    assert_eq!(
        out,
        "<tr class=\"row1\"><td class=\"col1\">1</td><td class=\"col2\">2</td></tr>\
         <tr class=\"row2\"><td class=\"col1\">3</td></tr>"
    );
}

// ========== Capture / with / import ==========

#[test]
fn test_capture_binds_output() {
    assert_eq!(render("{{ capture out }}A{{ 1 + 1 }}{{ end }}[{{ out }}]"), "[A2]");
}

#[test]
fn test_with_pushes_global_scope() {
    let out = render("{{ a = {} }}{{ with a }}{{ x = 1 }}{{ y = x + 1 }}{{ end }}{{ a.x }}{{ a.y }}");
    assert_eq!(out, "12");
}

#[test]
fn test_with_restores_scope_after_body() {
    let out = render("{{ x = 'outer' }}{{ a = {x: 'inner'} }}{{ with a }}{{ x }}{{ end }}{{ x }}");
    assert_eq!(out, "innerouter");
}

#[test]
fn test_with_requires_object() {
    let err = render_err("{{ with 5 }}{{ end }}");
    assert!(err.contains("must be an object"), "unexpected error: {}", err);
}

#[test]
fn test_import_merges_entries() {
    assert_eq!(render("{{ import {a: 1, b: 2} }}{{ a }}{{ b }}"), "12");
}

#[test]
fn test_import_skips_read_only_destination_keys() {
    let root = ScriptObject::new().into_ref();
    root.borrow_mut().define("keep", Value::Int(1), true);
    let out = render_with("{{ import {keep: 2, add: 3} }}{{ keep }}{{ add }}", root);
    assert_eq!(out, "13");
}

// ========== Functions ==========

#[test]
fn test_function_definition_and_call() {
    assert_eq!(render("{{ func f }}{{ ret 42 }}{{ end }}{{ f }}"), "42");
}

#[test]
fn test_function_body_writes_to_output() {
    assert_eq!(render("{{ func hi }}hello{{ end }}{{ hi }}"), "hello");
}

#[test]
fn test_function_parameters_and_defaults() {
    let out = render("{{ func g(a, b = 10) }}{{ a }}-{{ b }}{{ end }}{{ g(1) }}:{{ g(1, 2) }}");
    assert_eq!(out, "1-10:1-2");
}

#[test]
fn test_named_arguments() {
    let out = render("{{ func g(a, b = 10) }}{{ a }}-{{ b }}{{ end }}{{ g(b: 2, a: 1) }}");
    assert_eq!(out, "1-2");
}

#[test]
fn test_rest_parameter() {
    let out = render("{{ func f(a, rest...) }}{{ a }}:{{ rest | array.join(',') }}{{ end }}{{ f(1, 2, 3) }}");
    assert_eq!(out, "1:2,3");
}

#[test]
fn test_implicit_arguments_and_dollar_locals() {
    let out = render("{{ func k }}{{ $0 }}{{ $1 }}:{{ $ | array.join(',') }}{{ end }}{{ k(7, 8) }}");
    assert_eq!(out, "78:7,8");
}

#[test]
fn test_function_parameters_do_not_leak() {
    let err = render_err("{{ func f(a) }}{{ end }}{{ f(1) }}{{ a }}");
    assert!(err.contains("was not found"), "unexpected error: {}", err);
}

#[test]
fn test_function_locals_do_not_leak() {
    let err = render_err("{{ func f(a) }}{{ b = a }}{{ end }}{{ f(1) }}{{ b }}");
    assert!(err.contains("was not found"), "unexpected error: {}", err);
}

#[test]
fn test_function_updates_existing_outer_variable() {
    let out = render("{{ n = 1 }}{{ func bump }}{{ n = n + 1 }}{{ end }}{{ bump }}{{ n }}");
    assert_eq!(out, "2");
}

#[test]
fn test_argument_expansion() {
    let out = render("{{ func h(a, b) }}{{ a + b }}{{ end }}{{ args = [1, 2] }}{{ h(^args) }}");
    assert_eq!(out, "3");
}

#[test]
fn test_expand_outside_call_is_error() {
    let err = render_err("{{ ^[1] }}");
    assert!(err.contains("'^'"), "unexpected error: {}", err);
}

#[test]
fn test_anonymous_function_value() {
    let out = render("{{ f = do(x) }}{{ ret x + 1 }}{{ end }}{{ f(2) }}");
    assert_eq!(out, "3");
}

#[test]
fn test_function_alias_defers_invocation() {
    let out = render("{{ func f }}{{ ret 1 }}{{ end }}{{ g = @f }}{{ g }}");
    assert_eq!(out, "1");
}

#[test]
fn test_script_function_arity_error() {
    let err = render_err("{{ func f(a, b) }}{{ end }}{{ f(1) }}");
    assert!(
        err.contains("invalid number of arguments 1 passed to 'f', expecting between 2 and 2"),
        "unexpected error: {}",
        err
    );
}

#[test]
fn test_unknown_named_argument_error() {
    let err = render_err("{{ func f(a) }}{{ end }}{{ f(nope: 1) }}");
    assert!(err.contains("nope"), "unexpected error: {}", err);
}

#[test]
fn test_call_non_function_errors() {
    let err = render_err("{{ x = 5 }}{{ x(1) }}");
    assert!(err.contains("non-function"), "unexpected error: {}", err);
}

#[test]
fn test_call_depth_limit() {
    let err = render_err("{{ func f }}{{ f }}{{ end }}{{ f }}");
    assert!(err.contains("call depth"), "unexpected error: {}", err);
}

// ========== Pipes ==========

#[test]
fn test_pipe_feeds_first_argument() {
    assert_eq!(render("{{ 'abc' | string.upcase }}"), "ABC");
}

#[test]
fn test_pipe_chain() {
    assert_eq!(render("{{ ' a,b ' | string.trim | string.split(',') | array.join('-') }}"), "a-b");
}

#[test]
fn test_pipe_into_call_with_arguments() {
    assert_eq!(render("{{ [1,2,3] | array.join(', ') }}"), "1, 2, 3");
}

#[test]
fn test_pipe_to_non_function_errors() {
    let err = render_err("{{ 5 | 3 }}");
    assert!(err.contains("pipe destination"), "unexpected error: {}", err);
}

#[test]
fn test_pipe_into_user_function() {
    let out = render("{{ func inc(x) }}{{ ret x + 1 }}{{ end }}{{ 41 | inc }}");
    assert_eq!(out, "42");
}

// ========== Values and operators ==========

#[test]
fn test_empty_coalescing() {
    assert_eq!(render("{{ null ?? 5 }}"), "5");
    assert_eq!(render("{{ 5 ?? null }}"), "5");
    assert_eq!(render("{{ null ?? null }}"), "");
}

#[test]
fn test_empty_sentinel_comparisons() {
    assert_eq!(render("{{ empty == empty }}"), "true");
    assert_eq!(render("{{ '' == empty }}"), "true");
    assert_eq!(render("{{ [1] == empty }}"), "false");
    assert_eq!(render("{{ x = empty - empty }}{{ x == empty }}"), "true");
}

#[test]
fn test_is_empty_postfix() {
    assert_eq!(render("{{ ''.empty? }}"), "true");
    assert_eq!(render("{{ [].empty? }}"), "true");
    assert_eq!(render("{{ [1].empty? }}"), "false");
}

#[test]
fn test_string_operators() {
    assert_eq!(render("{{ 'ab' * 3 }}"), "ababab");
    assert_eq!(render("{{ 'a' + 1 }}"), "a1");
    assert_eq!(render("{{ 'hello' contains 'ell' }}"), "true");
    assert_eq!(render("{{ 'hello' startsWith 'he' }}"), "true");
    assert_eq!(render("{{ 'hello' endsWith 'lo' }}"), "true");
}

#[test]
fn test_array_membership_operator() {
    assert_eq!(render("{{ [1,2] contains 2 }}"), "true");
    assert_eq!(render("{{ [1,2] contains 9 }}"), "false");
}

#[test]
fn test_list_append_prepend() {
    assert_eq!(render("{{ [1,2] << 3 | array.join(',') }}"), "1,2,3");
    assert_eq!(render("{{ 0 >> [1,2] | array.join(',') }}"), "0,1,2");
}

#[test]
fn test_numeric_promotion() {
    assert_eq!(render("{{ 1 + 2.5 }}"), "3.5");
    assert_eq!(render("{{ 1.5f + 1 }}"), "2.5");
    assert_eq!(render("{{ 0.1m + 0.2m }}"), "0.3");
    assert_eq!(render("{{ 10000000000 + 1 }}"), "10000000001");
}

#[test]
fn test_logical_short_circuit() {
    // The right side would error if evaluated
    assert_eq!(render("{{ false && missing }}"), "false");
    assert_eq!(render("{{ true || missing }}"), "true");
}

#[test]
fn test_array_indexing() {
    assert_eq!(render("{{ [1,2,3][0] }}"), "1");
    assert_eq!(render("{{ [1,2,3][-1] }}"), "3");
    assert_eq!(render("{{ [1,2,3][5] }}"), "");
    assert_eq!(render("{{ 'abc'[1] }}"), "b");
}

#[test]
fn test_array_auto_extension_on_write() {
    let out = render("{{ a = [1] }}{{ a[3] = 9 }}{{ a | array.join(',') }}");
    assert_eq!(out, "1,,,9");
}

#[test]
fn test_object_indexer_uses_member_path() {
    assert_eq!(render("{{ a = {x: 1} }}{{ a['x'] }}"), "1");
    assert_eq!(render("{{ a = {} }}{{ a['k'] = 2 }}{{ a.k }}"), "2");
}

#[test]
fn test_unsupported_operator_names_both_types() {
    let err = render_err("{{ [1] + 1 }}");
    assert!(err.contains("'+'"), "unexpected error: {}", err);
    assert!(err.contains("array"), "unexpected error: {}", err);
    assert!(err.contains("int"), "unexpected error: {}", err);
}

// ========== Strict and relaxed modes ==========

#[test]
fn test_strict_mode_unknown_variable_errors() {
    let err = render_err("{{ missing }}");
    assert!(err.contains("was not found"), "unexpected error: {}", err);
}

#[test]
fn test_relaxed_mode_substitutes_null() {
    let mut options = EvalOptions::default();
    options.relaxed = true;
    let engine = TemplateEngine::new();
    let out = engine
        .render_with_options(
            "a{{ missing }}{{ missing.member }}{{ missing[0] }}b",
            ScriptObject::new().into_ref(),
            options,
        )
        .expect("render failed");
    assert_eq!(out, "ab");
}

#[test]
fn test_error_message_carries_line_and_column() {
    let err = render_err("line one\n{{ missing }}");
    assert!(err.starts_with("(2,"), "unexpected error: {}", err);
    assert!(err.contains("error:"), "unexpected error: {}", err);
}

// ========== Host objects ==========

#[derive(Debug)]
struct User {
    name: String,
    age: Cell<i32>,
}

impl HostObject for User {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn type_name(&self) -> &'static str {
        "User"
    }
}

fn user_accessor() -> FieldAccessor {
    FieldAccessor::new()
        .field("name", |obj| {
            let user = obj.as_any().downcast_ref::<User>().unwrap();
            Value::String(user.name.clone())
        })
        .field_mut(
            "age",
            |obj| {
                let user = obj.as_any().downcast_ref::<User>().unwrap();
                Value::Int(user.age.get())
            },
            |obj, value| {
                let user = obj.as_any().downcast_ref::<User>().unwrap();
                user.age.set(value.to_int().map_err(|e| e.message)?);
                Ok(())
            },
        )
}

fn engine_with_user() -> (TemplateEngine, ObjectRef) {
    let mut engine = TemplateEngine::new();
    engine.accessors_mut().register::<User>(user_accessor());
    let root = ScriptObject::new().into_ref();
    root.borrow_mut().set(
        "user",
        Value::Opaque(Rc::new(User {
            name: "Ada".into(),
            age: Cell::new(36),
        })),
    );
    (engine, root)
}

#[test]
fn test_host_object_member_read() {
    let (engine, root) = engine_with_user();
    let out = engine
        .render("{{ user.name }}:{{ user.age }}", root)
        .expect("render failed");
    assert_eq!(out, "Ada:36");
}

#[test]
fn test_host_object_member_write() {
    let (engine, root) = engine_with_user();
    let out = engine
        .render("{{ user.age = 40 }}{{ user.age }}", root)
        .expect("render failed");
    assert_eq!(out, "40");
}

#[test]
fn test_host_object_read_only_member() {
    let (engine, root) = engine_with_user();
    let err = engine
        .render("{{ user.name = 'Eve' }}", root)
        .unwrap_err()
        .to_string();
    assert!(err.contains("read-only"), "unexpected error: {}", err);
}

#[test]
fn test_host_object_import() {
    let (engine, root) = engine_with_user();
    let out = engine
        .render("{{ import user }}{{ name }}", root)
        .expect("render failed");
    assert_eq!(out, "Ada");
}

#[test]
fn test_host_object_without_accessor_errors() {
    let root = ScriptObject::new().into_ref();
    root.borrow_mut().set(
        "user",
        Value::Opaque(Rc::new(User {
            name: "Ada".into(),
            age: Cell::new(36),
        })),
    );
    let err = TemplateEngine::new()
        .render("{{ user.name }}", root)
        .unwrap_err()
        .to_string();
    assert!(err.contains("accessor"), "unexpected error: {}", err);
}

// ========== Resource limits ==========

#[test]
fn test_cancellation_token_stops_evaluation() {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    let token = Arc::new(AtomicBool::new(true));
    let mut options = EvalOptions::default();
    options.cancellation_token = Some(token);
    let err = TemplateEngine::new()
        .render_with_options(
            "{{ for x in 1..100000 }}{{ end }}",
            ScriptObject::new().into_ref(),
            options,
        )
        .unwrap_err()
        .to_string();
    assert!(err.contains("cancelled"), "unexpected error: {}", err);
}

#[test]
fn test_loop_iteration_limit() {
    let mut options = EvalOptions::default();
    options.max_loop_iterations = 10;
    let err = TemplateEngine::new()
        .render_with_options(
            "{{ while true }}{{ end }}",
            ScriptObject::new().into_ref(),
            options,
        )
        .unwrap_err()
        .to_string();
    assert!(err.contains("iteration limit"), "unexpected error: {}", err);
}

// ========== Reusable ASTs ==========

#[test]
fn test_ast_reuse_across_renders() {
    let engine = TemplateEngine::new();
    let source = "{{ n * 2 }}";
    let ast = engine.parse(source).expect("parse failed");
    for n in [1, 2, 3] {
        let root = ScriptObject::new().into_ref();
        root.borrow_mut().set("n", Value::Int(n));
        let out = engine
            .render_ast(&ast, source, root, EvalOptions::default())
            .expect("render failed");
        assert_eq!(out, (n * 2).to_string());
    }
}

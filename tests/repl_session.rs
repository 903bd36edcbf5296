//! Scripted console sessions driven through the public session API, with
//! output captured through an injected sink.

use ebb_lang::{OutputSink, RunStatus, Session, SessionError};
use std::sync::{Arc, Mutex};

struct Harness {
    session: Session,
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Harness {
    fn new() -> Self {
        let (sink, buf) = OutputSink::buffer();
        Self {
            session: Session::with_output(sink),
            buf,
        }
    }

    fn run(&mut self, line: &str) {
        match self.session.run(line) {
            Ok(RunStatus::Complete) => {}
            Ok(RunStatus::NeedMore) => panic!("unexpected continuation after {:?}", line),
            Err(err) => panic!("error running {:?}: {}", line, err),
        }
    }

    fn run_err(&mut self, line: &str) -> SessionError {
        match self.session.run(line) {
            Err(err) => err,
            Ok(status) => panic!("expected error from {:?}, got {:?}", line, status),
        }
    }

    fn output(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }

    fn take_output(&mut self) -> String {
        let out = self.output();
        self.buf.lock().unwrap().clear();
        out
    }
}

#[test]
fn constant_arithmetic_echoes_with_type() {
    let mut h = Harness::new();
    h.run("x := 2 + 3 * 4");
    h.run("x");
    assert_eq!(h.output(), "=> int: 14\n");
}

#[test]
fn untyped_constant_expression_echoes_untyped() {
    let mut h = Harness::new();
    h.run("2 + 3");
    assert_eq!(h.output(), "=> untyped int: 5\n");
}

#[test]
fn function_literal_defines_and_calls() {
    let mut h = Harness::new();
    h.run("f := func(n int) int { if n < 2 { return n }; return n-1 }");
    h.run("f(10)");
    assert_eq!(h.output(), "=> int: 9\n");
    h.run("f(1)");
    assert_eq!(h.output(), "=> int: 9\n=> int: 1\n");
}

#[test]
fn buffered_channel_round_trip() {
    let mut h = Harness::new();
    h.run("ch := make(chan int, 1); ch <- 7; v := <-ch; v");
    assert_eq!(h.output(), "=> int: 7\n");
}

#[test]
fn map_comma_ok_yields_zero_and_false() {
    let mut h = Harness::new();
    h.run("m := make(map[string]int); m[\"a\"] = 1; v, ok := m[\"b\"]; v");
    assert_eq!(h.take_output(), "=> int: 0\n");
    h.run("ok");
    assert_eq!(h.take_output(), "=> bool: false\n");
    h.run("m[\"a\"]");
    assert_eq!(h.take_output(), "=> int: 1\n");
}

#[test]
fn nil_dereference_reports_and_session_survives() {
    let mut h = Harness::new();
    h.run("var p *int");
    let err = h.run_err("*p");
    assert!(matches!(err, SessionError::Runtime(_)), "{}", err);
    assert!(err.to_string().contains("nil pointer dereference"));
    h.run("x := 3");
    h.run("x");
    assert_eq!(h.output(), "=> int: 3\n");
}

#[test]
fn closure_counter_keeps_its_cell() {
    let mut h = Harness::new();
    h.run(
        "counter := func() func() int { n := 0; return func() int { n = n + 1; return n } }(); counter(); counter()",
    );
    assert_eq!(h.output(), "=> int: 1\n=> int: 2\n");
}

#[test]
fn literal_with_bridged_signature_takes_the_reflective_path() {
    // func(float64) float64 is injected by the math package, so this
    // literal becomes a host function of the exact signature rather than a
    // simulated callable.
    let mut h = Harness::new();
    h.run("g := func(x float64) float64 { return x * 2.0 }");
    h.run("g(21.0)");
    assert_eq!(h.take_output(), "=> float64: 42\n");
    h.run("g(math.Abs(-3.5))");
    assert_eq!(h.take_output(), "=> float64: 7\n");
}

#[test]
fn closure_survives_rebinding_of_captured_name() {
    let mut h = Harness::new();
    h.run("x := 1");
    h.run("get := func() int { return x }");
    // A fresh := rebinds x to a new cell; the closure still reads the old
    // one.
    h.run("x := 99");
    h.run("get()");
    assert_eq!(h.take_output(), "=> int: 1\n");
    h.run("x");
    assert_eq!(h.take_output(), "=> int: 99\n");
}

#[test]
fn closure_writes_reach_the_captured_cell() {
    let mut h = Harness::new();
    h.run("x := 1");
    h.run("set := func(v int) { x = v }");
    h.run("set(42)");
    h.run("x");
    assert_eq!(h.output(), "=> int: 42\n");
}

#[test]
fn recursion_through_a_predeclared_cell() {
    let mut h = Harness::new();
    h.run("var fib func(int) int");
    h.run("fib = func(n int) int { if n < 2 { return n }; return fib(n-1) + fib(n-2) }");
    h.run("fib(10)");
    assert_eq!(h.output(), "=> int: 55\n");
}

#[test]
fn pointers_alias_their_target() {
    let mut h = Harness::new();
    h.run("x := 1");
    h.run("p := &x");
    h.run("*p = 5");
    h.run("x");
    assert_eq!(h.take_output(), "=> int: 5\n");
    h.run("*p");
    assert_eq!(h.take_output(), "=> int: 5\n");
}

#[test]
fn spawned_task_rendezvous_through_unbuffered_channel() {
    let mut h = Harness::new();
    h.run("ch := make(chan int)");
    h.run("go func() { ch <- 42 }()");
    h.run("v := <-ch; v");
    assert_eq!(h.output(), "=> int: 42\n");
}

#[test]
fn receive_from_closed_channel_reports_not_ok() {
    let mut h = Harness::new();
    h.run("ch := make(chan int, 1); ch <- 9; close(ch)");
    h.run("a, ok := <-ch; a");
    assert_eq!(h.take_output(), "=> int: 9\n");
    h.run("b, ok2 := <-ch; b");
    assert_eq!(h.take_output(), "=> int: 0\n");
    h.run("ok2");
    assert_eq!(h.take_output(), "=> bool: false\n");
    let err = h.run_err("ch <- 1");
    assert!(err.to_string().contains("closed channel"), "{}", err);
}

#[test]
fn select_prefers_ready_case_over_default() {
    let mut h = Harness::new();
    h.run("x := 0; ch := make(chan int, 1); ch <- 5");
    h.run("select { case v := <-ch: x = v; default: x = -1 }");
    h.run("x");
    assert_eq!(h.output(), "=> int: 5\n");
}

#[test]
fn select_falls_to_default_when_nothing_ready() {
    let mut h = Harness::new();
    h.run("x := 0; ch := make(chan int)");
    h.run("select { case <-ch: x = 1; default: x = 99 }");
    h.run("x");
    assert_eq!(h.output(), "=> int: 99\n");
}

#[test]
fn select_send_case_fills_buffered_channel() {
    let mut h = Harness::new();
    h.run("ch := make(chan int, 1)");
    h.run("select { case ch <- 7: ; default: }");
    h.run("v := <-ch; v");
    assert_eq!(h.output(), "=> int: 7\n");
}

#[test]
fn for_loop_with_labels() {
    let mut h = Harness::new();
    h.run("sum := 0");
    h.run("outer: for i := 0; i < 3; i++ { for j := 0; j < 3; j++ { if j == 2 { continue outer }; sum = sum + 1 } }");
    h.run("sum");
    assert_eq!(h.take_output(), "=> int: 6\n");
    h.run("count := 0");
    h.run("loop: for { for { break loop }; count = 100 }");
    h.run("count");
    assert_eq!(h.take_output(), "=> int: 0\n");
}

#[test]
fn incomplete_function_spans_lines() {
    let mut h = Harness::new();
    let mut status = h.session.run("add := func(a int, b int) int {").unwrap();
    assert_eq!(status, RunStatus::NeedMore);
    status = h.session.run("return a + b").unwrap();
    assert_eq!(status, RunStatus::NeedMore);
    status = h.session.run("}").unwrap();
    assert_eq!(status, RunStatus::Complete);
    h.run("add(20, 22)");
    assert_eq!(h.output(), "=> int: 42\n");
}

#[test]
fn interface_values_assert_dynamically() {
    let mut h = Harness::new();
    h.run("var i interface{} = 3");
    h.run("n := i.(int); n");
    assert_eq!(h.take_output(), "=> int: 3\n");
    h.run("s, ok := i.(string); ok");
    assert_eq!(h.take_output(), "=> bool: false\n");
    h.run("s");
    assert_eq!(h.take_output(), "=> string: \n");
    let err = h.run_err("i.(string)");
    assert!(err.to_string().contains("interface conversion"), "{}", err);
}

#[test]
fn conversions_between_host_representations() {
    let mut h = Harness::new();
    h.run("x := 65");
    h.run("string(rune(x))");
    assert_eq!(h.take_output(), "=> string: A\n");
    h.run("float64(x) / 2.0");
    assert_eq!(h.take_output(), "=> float64: 32.5\n");
    h.run("int8(300)"); // constant conversion wraps at the width
    let out = h.take_output();
    assert!(out.contains("int8"), "{}", out);
}

#[test]
fn struct_fields_are_assignable_locations() {
    let mut h = Harness::new();
    h.run("var s struct{a int; b string}");
    h.run("s.a = 3; s.b = \"hi\"");
    h.run("s.a");
    assert_eq!(h.take_output(), "=> int: 3\n");
    h.run("sp := &s");
    h.run("sp.a = 9");
    h.run("s.a");
    assert_eq!(h.take_output(), "=> int: 9\n");
}

#[test]
fn slices_index_and_bounds_check() {
    let mut h = Harness::new();
    h.run("s := make([]int, 3)");
    h.run("s[0] = 10; s[2] = 30");
    h.run("s[0]");
    assert_eq!(h.take_output(), "=> int: 10\n");
    h.run("s");
    assert_eq!(h.take_output(), "=> []int: [10 0 30]\n");
    let err = h.run_err("s[5]");
    assert!(err.to_string().contains("index out of range"), "{}", err);
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let mut h = Harness::new();
    h.run("a := 10");
    h.run("b := 0");
    let err = h.run_err("a / b");
    assert!(err.to_string().contains("division by zero"), "{}", err);
}

#[test]
fn bridged_packages_print_and_compute() {
    let mut h = Harness::new();
    h.run("fmt.Println(\"hello\", 42)");
    assert_eq!(h.take_output(), "hello 42\n");
    h.run("fmt.Sprintf(\"%d-%s\", 7, \"x\")");
    assert_eq!(h.take_output(), "=> string: 7-x\n");
    h.run("strings.ToUpper(\"abc\")");
    assert_eq!(h.take_output(), "=> string: ABC\n");
    h.run("strings.Repeat(\"ab\", 3)");
    assert_eq!(h.take_output(), "=> string: ababab\n");
    h.run("math.Sqrt(9.0)");
    assert_eq!(h.take_output(), "=> float64: 3\n");
}

#[test]
fn print_builtins_forward_to_host_print() {
    let mut h = Harness::new();
    h.run("println(\"a\", 1)");
    assert_eq!(h.take_output(), "a 1\n");
    h.run("print(\"b\")");
    assert_eq!(h.take_output(), "b");
}

#[test]
fn reserved_builtins_report_unimplemented() {
    let mut h = Harness::new();
    for line in ["len(\"abc\")", "cap(make([]int, 1))", "new(int)"] {
        let err = h.run_err(line);
        assert!(
            matches!(err, SessionError::Unimplemented(_)),
            "{}: {}",
            line,
            err
        );
    }
}

#[test]
fn goto_and_range_are_unimplemented() {
    let mut h = Harness::new();
    let err = h.run_err("goto done");
    assert!(matches!(err, SessionError::Unimplemented(_)), "{}", err);
    h.run("ch := make(chan int, 1); ch <- 1; close(ch)");
    let err = h.run_err("for v := range ch { v = v }");
    assert!(matches!(err, SessionError::Unimplemented(_)), "{}", err);
}

#[test]
fn type_errors_do_not_kill_the_session() {
    let mut h = Harness::new();
    let err = h.run_err("x := 1 + \"a\"");
    assert!(matches!(err, SessionError::Type { .. }), "{}", err);
    let err = h.run_err("undefined_name");
    assert!(matches!(err, SessionError::Type { .. }), "{}", err);
    h.run("x := 2");
    h.run("x");
    assert_eq!(h.output(), "=> int: 2\n");
}

#[test]
fn string_concat_and_comparison() {
    let mut h = Harness::new();
    h.run("a := \"foo\" + \"bar\"");
    h.run("a");
    assert_eq!(h.take_output(), "=> string: foobar\n");
    h.run("a < \"z\"");
    assert_eq!(h.take_output(), "=> untyped bool: true\n");
}

#[test]
fn inc_dec_statements_mutate_in_place() {
    let mut h = Harness::new();
    h.run("x := 41");
    h.run("x++");
    h.run("x");
    assert_eq!(h.take_output(), "=> int: 42\n");
    h.run("x--; x--");
    h.run("x");
    assert_eq!(h.take_output(), "=> int: 40\n");
}

#[test]
fn shift_and_bitwise_operators() {
    let mut h = Harness::new();
    h.run("x := 1");
    h.run("y := 3");
    h.run("x << y");
    assert_eq!(h.take_output(), "=> int: 8\n");
    h.run("x | 6");
    assert_eq!(h.take_output(), "=> int: 7\n");
    h.run("12 &^ y");
    assert_eq!(h.take_output(), "=> int: 12\n");
}

#[test]
fn named_function_results_allow_naked_return() {
    let mut h = Harness::new();
    h.run("f := func() (n int) { n = 7; return }");
    h.run("f()");
    assert_eq!(h.output(), "=> int: 7\n");
}

#[test]
fn multi_valued_functions_spread_into_assignment() {
    let mut h = Harness::new();
    h.run("pair := func() (int, bool) { return 3, true }");
    h.run("a, b := pair()");
    h.run("a");
    assert_eq!(h.take_output(), "=> int: 3\n");
    h.run("b");
    assert_eq!(h.take_output(), "=> bool: true\n");
}

#[test]
fn blank_identifier_discards_values() {
    let mut h = Harness::new();
    h.run("pair := func() (int, bool) { return 3, true }");
    h.run("v, _ := pair()");
    h.run("v");
    assert_eq!(h.output(), "=> int: 3\n");
}

#[test]
fn worker_pipeline_across_tasks() {
    let mut h = Harness::new();
    h.run("in := make(chan int); out := make(chan int)");
    h.run("go func() { out <- (<-in) * 2 }()");
    h.run("in <- 21; v := <-out; v");
    assert_eq!(h.output(), "=> int: 42\n");
}

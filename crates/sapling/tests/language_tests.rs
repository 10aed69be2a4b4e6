use sapling::Vm;

fn run(src: &str) -> Vec<String> {
    let mut vm = Vm::with_capture(Some(src));
    vm.eval_source(src).unwrap();
    vm.take_output()
}

fn run_err(src: &str) -> String {
    let mut vm = Vm::with_capture(Some(src));
    vm.eval_source(src).unwrap_err().to_string()
}

#[test]
fn test_print_arithmetic() {
    assert_eq!(run("print(1 + 2)"), vec!["3"]);
}

#[test]
fn test_string_method() {
    assert_eq!(run("a = \"hello\"\nprint(a.upper())"), vec!["HELLO"]);
}

#[test]
fn test_array_add() {
    assert_eq!(run("arr = {1, 2, 3}\nprint(arr.add(4))"), vec!["{1, 2, 3, 4}"]);
}

#[test]
fn test_dictionary_lookup() {
    assert_eq!(run("d = {\"a\": 1, \"b\": 2}\nprint(d[\"a\"])"), vec!["1"]);
}

#[test]
fn test_factorial() {
    let src = "func fact(n) { if n <= 1 { return 1 } return n * fact(n - 1) }\nprint(fact(5))";
    assert_eq!(run(src), vec!["120"]);
}

#[test]
fn test_enum_member() {
    assert_eq!(
        run("enum Color { red = 1 green = 2 }\nprint(Color.red)"),
        vec!["1"]
    );
}

#[test]
fn test_double_negation_matches_truthiness() {
    for (src, expected) in [
        ("print(!!1)", "true"),
        ("print(!!0)", "false"),
        ("print(!!'x')", "true"),
        ("print(!!'')", "false"),
        ("print(!!nil)", "false"),
        ("print(!!{1})", "true"),
    ] {
        assert_eq!(run(src), vec![expected], "{src}");
    }
}

#[test]
fn test_equality_reflexivity() {
    for (name, src) in [
        ("int", "x = 4"),
        ("float", "x = 2.5"),
        ("bool", "x = true"),
        ("string", "x = 'abc'"),
        ("strbytes", "x = 'abc'.to_bytes()"),
        ("nil", "x = nil"),
    ] {
        let out = run(&format!("{src}\nprint(x == x)"));
        assert_eq!(out, vec!["true"], "reflexivity for {name}");
    }
}

#[test]
fn test_constant_immutability() {
    assert_eq!(
        run_err("const x = 1\nx = 2"),
        "RuntimeError: Cannot assign to constant 'x'"
    );
    assert_eq!(
        run_err("const x = 1\nx += 2"),
        "RuntimeError: Cannot assign to constant 'x'"
    );
}

#[test]
fn test_annotated_assignment_asserts_at_runtime() {
    assert_eq!(
        run_err("int x = \"s\""),
        "TypeError: Assignment does not match annotated type 'int'"
    );
    // `any` never checks
    assert_eq!(run("any x = 'whatever'\nprint(x)"), vec!["whatever"]);
}

#[test]
fn test_named_arguments_reorder_binding_not_evaluation() {
    let src = "log = {'seq': ''}\n\
               func note(x) { log.add('seq', log['seq'] + x)\nreturn x }\n\
               func pair(a, b) { return a + b }\n\
               print(pair(b: note('B'), a: note('A')))\n\
               print(log['seq'])";
    assert_eq!(run(src), vec!["AB", "BA"]);
}

#[test]
fn test_struct_construction() {
    let src = "struct P { int x int y }\np = new P(3, 4)\nprint(p.x == 3)\nprint(p.y == 4)";
    assert_eq!(run(src), vec!["true", "true"]);
    assert_eq!(
        run_err("struct P { int x int y }\np = new P(3)"),
        "TypeError: Expected 2 arguments, got 1"
    );
}

#[test]
fn test_method_dispatch() {
    let src = "enum C { tag = 0 }\nfunc C.hello() { return 1 }\nc = new C()\nprint(c.hello())";
    assert_eq!(run(src), vec!["1"]);
}

#[test]
fn test_array_comprehension() {
    assert_eq!(
        run("print({x * x : x in {1, 2, 3}} == {1, 4, 9})"),
        vec!["true"]
    );
}

#[test]
fn test_repeat_until() {
    assert_eq!(
        run("i = 0\nrepeat { i += 1 } until i == 3\nprint(i)"),
        vec!["3"]
    );
}

#[test]
fn test_builtin_casts_and_ranges() {
    assert_eq!(run("print(to_int('42') + 1)"), vec!["43"]);
    assert_eq!(run("print(to_float(2) / 4)"), vec!["0.5"]);
    assert_eq!(run("print(to_string(12) + '!')"), vec!["12!"]);
    assert_eq!(run("print(range(1, 5))"), vec!["{1, 2, 3, 4}"]);
    assert_eq!(run("print(range(0, 10, 3))"), vec!["{0, 3, 6, 9}"]);
}

#[test]
fn test_builtin_reflection() {
    assert_eq!(run("print(type(1.5))"), vec!["float"]);
    assert_eq!(run("print(len('hello'))"), vec!["5"]);
    assert_eq!(
        run("func f(a, b) { return a }\nprint(args_of(f))"),
        vec!["{'a', 'b'}"]
    );
    assert_eq!(run("print(get('hi', 'length'))"), vec!["2"]);
}

#[test]
fn test_regex_values() {
    let src = "r = `a+b`\nprint(r.match('aaab'))\nprint(r.match('zzz'))\nprint(r.find_all('ab aab'))";
    assert_eq!(run(src), vec!["true", "false", "{'ab', 'aab'}"]);
}

#[test]
fn test_strbytes_round_trip() {
    let src = "b = 'hey'.to_bytes()\nprint(type(b))\nprint(b.to_string())\nprint(len(b))";
    assert_eq!(run(src), vec!["strbytes", "hey", "3"]);
}

#[test]
fn test_null_safe_attribute() {
    assert_eq!(run("x = nil\nprint(x?.missing)"), vec!["nil"]);
    assert_eq!(
        run_err("x = nil\nprint(x.missing)"),
        "AttributeError: 'nil' type has no attribute 'missing'"
    );
}

#[test]
fn test_division_by_zero_message() {
    assert_eq!(run_err("print(1 / 0)"), "TypeError: Cannot divide by zero");
}

#[test]
fn test_operator_mismatch_message() {
    assert_eq!(
        run_err("x = 1 + 'one'"),
        "TypeError: Operator '+' cannot be applied to 'int' and 'string'"
    );
}

#[test]
fn test_import_of_builtin_math_module() {
    let src = "import 'math'\nprint(math.floor(math.pi))\nprint(math.gcd(12, 18))";
    assert_eq!(run(src), vec!["3", "6"]);
}

#[test]
fn test_from_import_of_builtin_module() {
    let src = "import 'sqrt', 'pi' from 'math'\nprint(sqrt(16))\nprint(pi > 3.1)";
    assert_eq!(run(src), vec!["4.0", "true"]);
}

#[test]
fn test_system_module() {
    let src = "import 'system'\nprint(len(system.platform) > 0)\nprint(system.env('SAPLING_NO_SUCH_VAR'))";
    assert_eq!(run(src), vec!["true", "nil"]);
}

#[test]
fn test_missing_module() {
    assert_eq!(
        run_err("import 'no_such_module'"),
        "ImportError: 'no_such_module' library not found"
    );
}

#[test]
fn test_fizzbuzz_end_to_end() {
    let src = "i = 1\n\
               while i <= 15 {\n\
                 if i % 15 == 0 { print('FizzBuzz') }\n\
                 else if i % 3 == 0 { print('Fizz') }\n\
                 else if i % 5 == 0 { print('Buzz') }\n\
                 else { print(i) }\n\
                 i += 1\n\
               }";
    let out = run(src);
    assert_eq!(out.len(), 15);
    assert_eq!(out[2], "Fizz");
    assert_eq!(out[4], "Buzz");
    assert_eq!(out[14], "FizzBuzz");
}

use std::fs;
use std::path::PathBuf;

use sapling::{cache, parser, Vm};

/// A scratch directory unique to one test.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("sapling-import-tests")
        .join(format!("{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn vm_in(dir: &PathBuf, src: &str) -> Vm {
    let mut vm = Vm::with_capture(Some(src));
    vm.set_base_dir(dir.clone());
    vm
}

#[test]
fn test_import_isolation() {
    let dir = scratch("isolation");
    fs::write(dir.join("lib.sap"), "x = 1\n").unwrap();

    let src = "import 'lib'\nprint(lib.x)";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["1"]);

    // The module's `x` does not leak into the importing environment.
    let src = "import 'lib'\nprint(x)";
    let mut vm = vm_in(&dir, src);
    let err = vm.eval_source(src).unwrap_err();
    assert_eq!(err.to_string(), "NameError: 'x' is not defined");
}

#[test]
fn test_from_import_binds_bare_names() {
    let dir = scratch("from-import");
    fs::write(
        dir.join("geometry.sap"),
        "func area(w, h) { return w * h }\nconst unit = 'cm'\n",
    )
    .unwrap();

    let src = "import 'area', 'unit' from 'geometry'\nprint(area(3, 4))\nprint(unit)";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["12", "cm"]);
}

#[test]
fn test_module_functions_are_callable_through_the_library() {
    let dir = scratch("module-funcs");
    fs::write(dir.join("counter.sap"), "func bump(n) { return n + 1 }\n").unwrap();

    let src = "import 'counter'\nprint(counter.bump(41))";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["42"]);
}

#[test]
fn test_imports_are_memoised_by_path() {
    let dir = scratch("memoised");
    fs::write(dir.join("noisy.sap"), "print('loaded')\n").unwrap();

    let src = "import 'noisy'\nimport 'noisy'";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["loaded"]);
}

#[test]
fn test_sapped_import() {
    let dir = scratch("sapped");
    let module_src = "answer = 42\n";
    let code = parser::parse(module_src).unwrap();
    fs::write(dir.join("deep.sapped"), cache::serialize(&code).unwrap()).unwrap();

    let src = "import 'deep'\nprint(deep.answer)";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["42"]);
}

#[test]
fn test_source_module_shadows_builtin_registry() {
    let dir = scratch("shadow");
    fs::write(dir.join("math.sap"), "pi = 3\n").unwrap();

    let src = "import 'math'\nprint(math.pi)";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["3"]);
}

#[test]
fn test_hyphenated_module_name_binds_with_underscores() {
    let dir = scratch("hyphen");
    fs::write(dir.join("my-lib.sap"), "x = 7\n").unwrap();

    let src = "import 'my-lib'\nprint(my_lib.x)";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["7"]);
}

#[test]
fn test_module_error_propagates() {
    let dir = scratch("module-error");
    fs::write(dir.join("broken.sap"), "x = missing\n").unwrap();

    let src = "import 'broken'";
    let mut vm = vm_in(&dir, src);
    let err = vm.eval_source(src).unwrap_err();
    assert_eq!(err.to_string(), "NameError: 'missing' is not defined");
}

#[test]
fn test_import_sees_importer_bindings() {
    let dir = scratch("parent-env");
    fs::write(dir.join("uses_parent.sap"), "doubled = seed * 2\n").unwrap();

    let src = "seed = 21\nimport 'uses_parent'\nprint(uses_parent.doubled)";
    let mut vm = vm_in(&dir, src);
    vm.eval_source(src).unwrap();
    assert_eq!(vm.take_output(), vec!["42"]);
}

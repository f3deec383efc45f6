//! The bundled Clay toolchain, exercised end to end: compile a unit, bind
//! it, and run the resulting bytecode.

use indoc::indoc;
use kiln::{Engine, RequestBuilder, ResolvedType, RuntimeError, SymbolSpace, Value};

fn compile_one(name: &str, source: &str) -> ResolvedType {
    Engine::new(SymbolSpace::new())
        .compile(&RequestBuilder::new().unit(name, source).build().unwrap())
        .unwrap()
}

#[test]
fn test_variadic_arithmetic() {
    let ty = compile_one(
        "m.Arith",
        indoc! {"
            (deftype m.Arith
              (method sum () (+ 1 2 3 4))
              (method diff () (- 10 2 3))
              (method prod () (* 2 3 4)))
        "},
    );
    assert_eq!(ty.invoke("sum", &[]).unwrap(), Value::Int(10));
    assert_eq!(ty.invoke("diff", &[]).unwrap(), Value::Int(5));
    assert_eq!(ty.invoke("prod", &[]).unwrap(), Value::Int(24));
}

#[test]
fn test_comparisons_yield_booleans() {
    let ty = compile_one(
        "m.Cmp",
        indoc! {"
            (deftype m.Cmp
              (method less (a b) (< a b))
              (method same (a b) (= a b))
              (method truth () (= #t #t)))
        "},
    );
    assert_eq!(
        ty.invoke("less", &[Value::Int(1), Value::Int(2)]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        ty.invoke("same", &[Value::Int(3), Value::Int(4)]).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(ty.invoke("truth", &[]).unwrap(), Value::Bool(true));
}

#[test]
fn test_if_selects_a_branch() {
    let ty = compile_one(
        "m.Sign",
        "(deftype m.Sign (method flag (n) (if (< n 0) -1 1)))",
    );
    assert_eq!(ty.invoke("flag", &[Value::Int(-5)]).unwrap(), Value::Int(-1));
    assert_eq!(ty.invoke("flag", &[Value::Int(5)]).unwrap(), Value::Int(1));
}

#[test]
fn test_recursive_call_through_own_loader() {
    let ty = compile_one(
        "m.Fib",
        indoc! {"
            (deftype m.Fib
              (method fib (n)
                (if (< n 2)
                    n
                    (+ (call m.Fib fib (- n 1)) (call m.Fib fib (- n 2))))))
        "},
    );
    assert_eq!(ty.invoke("fib", &[Value::Int(10)]).unwrap(), Value::Int(55));
}

#[test]
fn test_comments_and_negative_literals() {
    let ty = compile_one(
        "m.Neg",
        "; a scratch type\n(deftype m.Neg (method low () -7)) ; trailing",
    );
    assert_eq!(ty.invoke("low", &[]).unwrap(), Value::Int(-7));
}

#[test]
fn test_auxiliary_type_in_the_same_unit() {
    let ty = compile_one(
        "shop.Order",
        "(deftype shop.Order (method total (n) (* n (call shop.Rate per))))\
         (deftype shop.Rate (method per () 3))",
    );
    assert_eq!(ty.name(), "shop.Order");
    assert_eq!(ty.invoke("total", &[Value::Int(4)]).unwrap(), Value::Int(12));
}

#[test]
fn test_unqualified_type_name() {
    let ty = compile_one("Scratch", "(deftype Scratch (method m () 5))");
    assert_eq!(ty.name(), "Scratch");
    assert_eq!(ty.invoke("m", &[]).unwrap(), Value::Int(5));
}

#[test]
fn test_wrong_argument_count_is_an_arity_error() {
    let ty = compile_one("m.A", "(deftype m.A (method one (x) x))");
    assert!(matches!(
        ty.invoke("one", &[]),
        Err(RuntimeError::Arity { expected: 1, got: 0, .. })
    ));
}

#[test]
fn test_boolean_operand_to_arithmetic_is_a_type_mismatch() {
    let ty = compile_one("m.B", "(deftype m.B (method bad (x) (+ x 1)))");
    assert!(matches!(
        ty.invoke("bad", &[Value::Bool(true)]),
        Err(RuntimeError::TypeMismatch { .. })
    ));
}

#[test]
fn test_unknown_member_is_reported() {
    let ty = compile_one("m.C", "(deftype m.C (method m () 1))");
    assert!(matches!(
        ty.invoke("missing", &[]),
        Err(RuntimeError::UnknownMember { .. })
    ));
}

#[test]
fn test_call_to_an_unknown_type_fails_at_runtime() {
    // Call targets are late-bound; the compile succeeds and the failure
    // surfaces when the call executes.
    let ty = compile_one(
        "m.D",
        "(deftype m.D (method m () (call ghost.Type poke)))",
    );
    assert!(matches!(
        ty.invoke("m", &[]),
        Err(RuntimeError::UnknownType(_))
    ));
}

#[test]
fn test_public_members_are_listed_sorted() {
    let ty = compile_one(
        "m.E",
        "(deftype m.E \
           (method zeta () 1) \
           (method alpha () 2) \
           (private-method hidden () 3))",
    );
    assert_eq!(ty.members(), vec!["alpha", "zeta"]);
}

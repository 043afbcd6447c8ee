//! End to end planning and evaluation scenarios.

use std::sync::Arc;

use cel_eval::{
    disable_shortcircuits, observe_eval, operators, optimize, AttributePattern, Constant,
    Container, Dispatcher, EmptyActivation, EvalState, Expr, ExprKind, Interpretable,
    MapActivation, Overload, PartialActivation, Planner, Program, TypeRegistry, COST_UNBOUNDED,
};
use cel_value::{EvalError, EvalErrorKind, MapKey, Value, ValueMap};

fn base_dispatcher() -> Arc<Dispatcher> {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .add(Overload::binary(operators::ADD, |l, r| {
            match (l.as_int(), r.as_int()) {
                (Some(a), Some(b)) => match a.checked_add(b) {
                    Some(sum) => Value::Int(sum),
                    None => Value::error(EvalError::overflow("integer addition overflow")),
                },
                _ => Value::error(EvalError::no_matching_overload(operators::ADD)),
            }
        }))
        .unwrap();
    dispatcher
        .add(Overload::binary(operators::LESS, |l, r| match l.compare(r) {
            Some(ordering) => Value::Bool(ordering == std::cmp::Ordering::Less),
            None => Value::error(EvalError::no_matching_overload(operators::LESS)),
        }))
        .unwrap();
    dispatcher
        .add(Overload::unary(operators::LOGICAL_NOT, |v| match v {
            Value::Bool(b) => Value::Bool(!b),
            _ => Value::error(EvalError::no_matching_overload(operators::LOGICAL_NOT)),
        }))
        .unwrap();
    dispatcher
        .add(
            Overload::unary("size", |v| match v {
                Value::String(s) => Value::Int(s.chars().count() as i64),
                Value::List(elems) => Value::Int(elems.len() as i64),
                Value::Map(map) => Value::Int(map.len() as i64),
                _ => Value::error(EvalError::no_matching_overload("size")),
            })
            .with_operand_trait(cel_value::ValueTrait::Sizer),
        )
        .unwrap();
    dispatcher
        .add(Overload::binary(operators::IN, |probe, range| {
            match range.as_list() {
                Some(elems) => Value::Bool(elems.iter().any(|e| e == probe)),
                None => Value::error(EvalError::no_matching_overload(operators::IN)),
            }
        }))
        .unwrap();
    Arc::new(dispatcher)
}

fn planner() -> Planner {
    Planner::new(base_dispatcher(), Arc::new(TypeRegistry::new()))
}

fn user_activation() -> MapActivation {
    let mut user = ValueMap::new();
    user.insert(MapKey::String(Arc::from("name")), Value::from("ada"));
    user.insert(MapKey::String(Arc::from("age")), Value::Int(36));
    let mut vars = MapActivation::new();
    vars.insert("user", Value::map(user));
    vars
}

// `user.age < limit` as an AST.
fn age_check_expr() -> Expr {
    Expr::global_call(
        4,
        operators::LESS,
        vec![
            Expr::select(2, Expr::ident(1, "user"), "age"),
            Expr::ident(3, "limit"),
        ],
    )
}

#[test]
fn select_and_compare() {
    let plan = planner().plan(&age_check_expr()).unwrap();
    let mut vars = user_activation();
    vars.insert("limit", Value::Int(40));
    assert_eq!(plan.eval(&vars), Value::Bool(true));

    vars.insert("limit", Value::Int(30));
    assert_eq!(plan.eval(&vars), Value::Bool(false));
}

#[test]
fn program_reuse_across_activations() {
    let program = Program::new(planner().plan(&age_check_expr()).unwrap());
    for (limit, expected) in [(40, true), (30, false)] {
        let mut vars = user_activation();
        vars.insert("limit", Value::Int(limit));
        assert_eq!(program.eval(&vars), Value::Bool(expected));
    }
}

#[test]
fn optimized_set_membership() {
    // kind in ["a", "b", "c"]
    let expr = Expr::global_call(
        6,
        operators::IN,
        vec![
            Expr::ident(1, "kind"),
            Expr::list_expr(
                5,
                vec![
                    Expr::literal(2, Constant::String("a".into())),
                    Expr::literal(3, Constant::String("b".into())),
                    Expr::literal(4, Constant::String("c".into())),
                ],
            ),
        ],
    );
    let plan = planner().with_decorator(optimize()).plan(&expr).unwrap();
    assert!(matches!(plan, Interpretable::SetMembership(_)));

    let mut vars = MapActivation::new();
    vars.insert("kind", Value::from("b"));
    assert_eq!(plan.eval(&vars), Value::Bool(true));
    vars.insert("kind", Value::from("z"));
    assert_eq!(plan.eval(&vars), Value::Bool(false));

    // A probe of the wrong kind is an overload miss.
    vars.insert("kind", Value::Int(1));
    match plan.eval(&vars) {
        Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::NoMatchingOverload),
        other => panic!("expected error, got {}", other),
    }
}

#[test]
fn unoptimized_membership_still_works() {
    let expr = Expr::global_call(
        4,
        operators::IN,
        vec![
            Expr::ident(1, "kind"),
            Expr::list_expr(3, vec![Expr::literal(2, Constant::String("a".into()))]),
        ],
    );
    let plan = planner().plan(&expr).unwrap();
    let mut vars = MapActivation::new();
    vars.insert("kind", Value::from("a"));
    assert_eq!(plan.eval(&vars), Value::Bool(true));
}

#[test]
fn partial_activation_tags_unknown_with_qualifier_id() {
    // user.name with user.name declared unknown: the result is an
    // unknown carrying the id of the .name qualifier step.
    let expr = Expr::select(2, Expr::ident(1, "user"), "name");
    let plan = planner().with_unknown_patterns().plan(&expr).unwrap();

    let partial = PartialActivation::new(
        user_activation(),
        vec![AttributePattern::new("user").qual_string("name")],
    );
    match plan.eval(&partial) {
        Value::Unknown(u) => assert_eq!(u.ids(), &[2]),
        other => panic!("expected unknown, got {}", other),
    }

    // The variable-only pattern tags with the attribute id instead.
    let partial = PartialActivation::new(user_activation(), vec![AttributePattern::new("user")]);
    match plan.eval(&partial) {
        Value::Unknown(u) => assert_eq!(u.ids(), &[1]),
        other => panic!("expected unknown, got {}", other),
    }
}

#[test]
fn unknown_survives_logic_and_calls() {
    // (user.name == "ada") && (1 + 2 < 4) over unknown user.name stays
    // unknown rather than failing.
    let expr = Expr::global_call(
        9,
        operators::LOGICAL_AND,
        vec![
            Expr::global_call(
                4,
                operators::EQUALS,
                vec![
                    Expr::select(2, Expr::ident(1, "user"), "name"),
                    Expr::literal(3, Constant::String("ada".into())),
                ],
            ),
            Expr::global_call(
                8,
                operators::LESS,
                vec![
                    Expr::global_call(
                        6,
                        operators::ADD,
                        vec![
                            Expr::literal(5, Constant::Int(1)),
                            Expr::literal(7, Constant::Int(2)),
                        ],
                    ),
                    Expr::literal(10, Constant::Int(4)),
                ],
            ),
        ],
    );
    let plan = planner().with_unknown_patterns().plan(&expr).unwrap();
    let partial = PartialActivation::new(
        user_activation(),
        vec![AttributePattern::new("user").qual_string("name")],
    );
    assert!(plan.eval(&partial).is_unknown());
}

fn exists_fold(range: Expr, iter_var: &str, predicate: Expr) -> Expr {
    // exists() expansion: accumulate with || and stop once true.
    Expr {
        id: 100,
        kind: ExprKind::Comprehension(Box::new(cel_eval::ComprehensionExpr {
            iter_var: iter_var.to_string(),
            iter_range: range,
            accu_var: "__result__".to_string(),
            accu_init: Expr::literal(101, Constant::Bool(false)),
            loop_condition: Expr::global_call(
                103,
                operators::LOGICAL_NOT,
                vec![Expr::ident(102, "__result__")],
            ),
            loop_step: Expr::global_call(
                105,
                operators::LOGICAL_OR,
                vec![Expr::ident(104, "__result__"), predicate],
            ),
            result: Expr::ident(106, "__result__"),
        })),
    }
}

#[test]
fn fold_exists_short_circuits() {
    // xs.exists(x, x < 0)
    let expr = exists_fold(
        Expr::ident(1, "xs"),
        "x",
        Expr::global_call(
            3,
            operators::LESS,
            vec![Expr::ident(2, "x"), Expr::literal(4, Constant::Int(0))],
        ),
    );
    let plan = planner().plan(&expr).unwrap();

    let mut vars = MapActivation::new();
    vars.insert(
        "xs",
        Value::list(vec![Value::Int(3), Value::Int(-1), Value::Int(5)]),
    );
    assert_eq!(plan.eval(&vars), Value::Bool(true));

    vars.insert("xs", Value::list(vec![Value::Int(3), Value::Int(5)]));
    assert_eq!(plan.eval(&vars), Value::Bool(false));

    vars.insert("xs", Value::list(vec![]));
    assert_eq!(plan.eval(&vars), Value::Bool(false));
}

// Sum over xs, stopping once the accumulator reaches 3.
fn bounded_sum_fold() -> Expr {
    Expr {
        id: 100,
        kind: ExprKind::Comprehension(Box::new(cel_eval::ComprehensionExpr {
            iter_var: "x".to_string(),
            iter_range: Expr::ident(1, "xs"),
            accu_var: "acc".to_string(),
            accu_init: Expr::literal(101, Constant::Int(0)),
            loop_condition: Expr::global_call(
                103,
                operators::LESS,
                vec![Expr::ident(102, "acc"), Expr::literal(104, Constant::Int(3))],
            ),
            loop_step: Expr::global_call(
                106,
                operators::ADD,
                vec![Expr::ident(105, "acc"), Expr::ident(107, "x")],
            ),
            result: Expr::ident(108, "acc"),
        })),
    }
}

#[test]
fn exhaustive_fold_matches_short_circuit_result() {
    let expr = bounded_sum_fold();
    let mut vars = MapActivation::new();
    vars.insert(
        "xs",
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );

    let short = planner().plan(&expr).unwrap();
    assert_eq!(short.eval(&vars), Value::Int(3));

    // The exhaustive fold visits every element but commits no step past
    // the false condition, so the result agrees.
    let state = Arc::new(EvalState::new());
    let exhaustive = planner()
        .with_decorator(disable_shortcircuits())
        .with_decorator(observe_eval(state.clone()))
        .plan(&expr)
        .unwrap();
    assert_eq!(exhaustive.eval(&vars), Value::Int(3));

    // The final iteration's step still ran for state recording.
    assert_eq!(state.value(106), Some(Value::Int(6)));
}

#[test]
fn index_unknown_tagged_with_call_id() {
    // xs[0] with xs[0] declared unknown: the unknown names the index
    // node, not the key literal.
    let expr = Expr::global_call(
        3,
        operators::INDEX,
        vec![Expr::ident(1, "xs"), Expr::literal(2, Constant::Int(0))],
    );
    let plan = planner().with_unknown_patterns().plan(&expr).unwrap();

    let mut base = MapActivation::new();
    base.insert("xs", Value::list(vec![Value::Int(7)]));
    let partial = PartialActivation::new(base, vec![AttributePattern::new("xs").qual_int(0)]);
    match plan.eval(&partial) {
        Value::Unknown(u) => assert_eq!(u.ids(), &[3]),
        other => panic!("expected unknown, got {}", other),
    }
}

#[test]
fn fold_over_map_iterates_keys() {
    let expr = exists_fold(
        Expr::ident(1, "m"),
        "k",
        Expr::global_call(
            3,
            operators::EQUALS,
            vec![
                Expr::ident(2, "k"),
                Expr::literal(4, Constant::String("hit".into())),
            ],
        ),
    );
    let plan = planner().plan(&expr).unwrap();

    let mut map = ValueMap::new();
    map.insert(MapKey::String(Arc::from("miss")), Value::Int(1));
    map.insert(MapKey::String(Arc::from("hit")), Value::Int(2));
    let mut vars = MapActivation::new();
    vars.insert("m", Value::map(map));
    assert_eq!(plan.eval(&vars), Value::Bool(true));
}

#[test]
fn exhaustive_eval_records_every_node() {
    let state = Arc::new(EvalState::new());
    let expr = Expr::global_call(
        3,
        operators::LOGICAL_OR,
        vec![
            Expr::literal(1, Constant::Bool(true)),
            Expr::ident(2, "b"),
        ],
    );
    let plan = planner()
        .with_decorator(disable_shortcircuits())
        .with_decorator(observe_eval(state.clone()))
        .plan(&expr)
        .unwrap();

    let mut vars = MapActivation::new();
    vars.insert("b", Value::Bool(false));
    assert_eq!(plan.eval(&vars), Value::Bool(true));

    // The rhs ran despite the decisive lhs.
    assert_eq!(state.value(1), Some(Value::Bool(true)));
    assert_eq!(state.value(2), Some(Value::Bool(false)));
    assert_eq!(state.value(3), Some(Value::Bool(true)));
}

#[test]
fn short_circuit_eval_skips_rhs() {
    let state = Arc::new(EvalState::new());
    let expr = Expr::global_call(
        3,
        operators::LOGICAL_OR,
        vec![
            Expr::literal(1, Constant::Bool(true)),
            Expr::ident(2, "b"),
        ],
    );
    let plan = planner()
        .with_decorator(observe_eval(state.clone()))
        .plan(&expr)
        .unwrap();

    assert_eq!(plan.eval(&EmptyActivation), Value::Bool(true));
    assert_eq!(state.value(1), Some(Value::Bool(true)));
    assert_eq!(state.value(2), None);
}

#[test]
fn observe_then_prune_then_replan() {
    // flag && user.name == "ada", with user unknown. One observed pass
    // plus pruning leaves a residual over user only.
    let expr = Expr::global_call(
        6,
        operators::LOGICAL_AND,
        vec![
            Expr::ident(1, "flag"),
            Expr::global_call(
                4,
                operators::EQUALS,
                vec![
                    Expr::select(3, Expr::ident(2, "user"), "name"),
                    Expr::literal(5, Constant::String("ada".into())),
                ],
            ),
        ],
    );

    let state = Arc::new(EvalState::new());
    let plan = planner()
        .with_unknown_patterns()
        .with_decorator(disable_shortcircuits())
        .with_decorator(observe_eval(state.clone()))
        .plan(&expr)
        .unwrap();

    let mut base = MapActivation::new();
    base.insert("flag", Value::Bool(true));
    let partial = PartialActivation::new(base, vec![AttributePattern::new("user")]);
    assert!(plan.eval(&partial).is_unknown());

    let residual = prune_and_check(&expr, &state);

    // Re-plan the residual and finish with the remaining input.
    let plan = planner().plan(&residual).unwrap();
    assert_eq!(plan.eval(&user_activation()), Value::Bool(true));
}

fn prune_and_check(expr: &Expr, state: &EvalState) -> Expr {
    let residual = cel_eval::prune_ast(expr, state);
    // The determinate flag operand is folded away.
    match &residual.kind {
        ExprKind::Call { function, .. } => assert_eq!(function, operators::EQUALS),
        other => panic!("expected residual equality, got {:?}", other),
    }
    // Pruning again with the same state changes nothing.
    assert_eq!(cel_eval::prune_ast(&residual, state), residual);
    residual
}

#[test]
fn cost_brackets_short_circuit() {
    let expr = Expr::global_call(
        3,
        operators::LOGICAL_AND,
        vec![Expr::ident(1, "a"), Expr::ident(2, "b")],
    );
    let program = Program::new(planner().plan(&expr).unwrap());
    let cost = program.cost();
    assert!(cost.min < cost.max);
    assert!(cost.max < COST_UNBOUNDED);

    // A fold has no static upper bound.
    let fold = exists_fold(
        Expr::ident(1, "xs"),
        "x",
        Expr::global_call(
            3,
            operators::LESS,
            vec![Expr::ident(2, "x"), Expr::literal(4, Constant::Int(0))],
        ),
    );
    let program = Program::new(planner().plan(&fold).unwrap());
    assert_eq!(program.cost().max, COST_UNBOUNDED);
}

#[test]
fn namespaced_variable_resolution() {
    // Inside container a.b, ident x resolves a.b.x before a.x and x.
    let expr = Expr::ident(1, "x");
    let plan = planner()
        .with_container(Container::new("a.b"))
        .plan(&expr)
        .unwrap();

    let mut vars = MapActivation::new();
    vars.insert("a.b.x", Value::Int(1));
    vars.insert("a.x", Value::Int(2));
    vars.insert("x", Value::Int(3));
    assert_eq!(plan.eval(&vars), Value::Int(1));

    let mut vars = MapActivation::new();
    vars.insert("x", Value::Int(3));
    assert_eq!(plan.eval(&vars), Value::Int(3));
}

#[test]
fn sizer_trait_gates_overload() {
    let expr = Expr::global_call(2, "size", vec![Expr::ident(1, "v")]);
    let plan = planner().plan(&expr).unwrap();

    let mut vars = MapActivation::new();
    vars.insert("v", Value::from("hello"));
    assert_eq!(plan.eval(&vars), Value::Int(5));

    vars.insert("v", Value::Int(5));
    match plan.eval(&vars) {
        Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::NoMatchingOverload),
        other => panic!("expected error, got {}", other),
    }
}

#[test]
fn constant_folding_is_idempotent() {
    let expr = Expr::list_expr(
        3,
        vec![
            Expr::literal(1, Constant::Int(1)),
            Expr::literal(2, Constant::Int(2)),
        ],
    );
    let once = planner().with_decorator(optimize()).plan(&expr).unwrap();
    assert!(once.const_value().is_some());

    // Feeding the folded node through the decorator again is a no-op.
    let decorator = optimize();
    let twice = decorator(once.clone()).unwrap();
    assert_eq!(twice.const_value(), once.const_value());
}

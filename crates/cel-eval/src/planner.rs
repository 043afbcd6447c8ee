//! Expression planning.
//!
//! The planner compiles an AST bottom-up into interpretable nodes,
//! resolving what it can at plan time: checked references win over
//! container-based name resolution, operator calls become dedicated
//! nodes, and every emitted node runs through the decorator list,
//! children before parents.

use std::sync::Arc;

use cel_value::Value;

use crate::ast::{ComprehensionExpr, Expr, ExprKind, ReferenceMap, TypeMap};
use crate::attributes::{Attribute, AttributeFactory, Qualifier};
use crate::container::Container;
use crate::decorators::InterpretableDecorator;
use crate::dispatcher::{BinaryOp, Dispatcher, Overload, UnaryOp};
use crate::error::PlanError;
use crate::interpretable::{
    EvalAttr, EvalBinary, EvalConst, EvalEquality, EvalFold, EvalList, EvalLogic, EvalMap,
    EvalObj, EvalTestOnly, EvalUnary, EvalVarArgs, EvalZeroArity, Interpretable,
};
use crate::operators;
use crate::provider::{default_adapter, FieldType, TypeAdapter, TypeProvider};

/// Compiles expressions into evaluable plans.
pub struct Planner {
    dispatcher: Arc<Dispatcher>,
    provider: Arc<dyn TypeProvider>,
    adapter: TypeAdapter,
    container: Container,
    reference_map: Option<ReferenceMap>,
    type_map: Option<TypeMap>,
    enable_unknowns: bool,
    decorators: Vec<InterpretableDecorator>,
}

impl Planner {
    /// A planner over the given functions and types, in the root
    /// container with the identity adapter.
    pub fn new(dispatcher: Arc<Dispatcher>, provider: Arc<dyn TypeProvider>) -> Self {
        Self {
            dispatcher,
            provider,
            adapter: default_adapter(),
            container: Container::root(),
            reference_map: None,
            type_map: None,
            enable_unknowns: false,
            decorators: Vec::new(),
        }
    }

    /// Plan within the given namespace container.
    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Adapt resolved attribute values with the given adapter.
    pub fn with_adapter(mut self, adapter: TypeAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    /// Use checker references for identifier and call resolution.
    pub fn with_reference_map(mut self, reference_map: ReferenceMap) -> Self {
        self.reference_map = Some(reference_map);
        self
    }

    /// Use checker types for field qualifier and presence planning.
    pub fn with_type_map(mut self, type_map: TypeMap) -> Self {
        self.type_map = Some(type_map);
        self
    }

    /// Let planned attributes consult activation unknown patterns.
    pub fn with_unknown_patterns(mut self) -> Self {
        self.enable_unknowns = true;
        self
    }

    /// Append a decorator, applied to every planned node after any
    /// decorators added earlier.
    pub fn with_decorator(mut self, decorator: InterpretableDecorator) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Plan an expression into an evaluable node tree.
    pub fn plan(&self, expr: &Expr) -> Result<Interpretable, PlanError> {
        let mut factory = AttributeFactory::new(
            self.container.clone(),
            self.provider.clone(),
            self.adapter.clone(),
        );
        if self.enable_unknowns {
            factory = factory.with_unknown_patterns();
        }
        self.plan_expr(expr, &factory)
    }

    fn decorate(&self, mut node: Interpretable) -> Result<Interpretable, PlanError> {
        for decorator in &self.decorators {
            node = decorator(node)?;
        }
        Ok(node)
    }

    fn reference(&self, id: i64) -> Option<&crate::ast::Reference> {
        self.reference_map.as_ref()?.get(&id)
    }

    fn plan_expr(
        &self,
        expr: &Expr,
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        match &expr.kind {
            ExprKind::Const(constant) => {
                self.decorate(Interpretable::Const(EvalConst::new(expr.id, constant.to_value())))
            }
            ExprKind::Ident(name) => self.plan_ident(expr.id, name, factory),
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => self.plan_select(expr.id, operand, field, *test_only, factory),
            ExprKind::Call {
                target,
                function,
                args,
            } => self.plan_call(expr.id, target.as_deref(), function, args, factory),
            ExprKind::List { elements } => {
                let mut planned = Vec::with_capacity(elements.len());
                for element in elements {
                    planned.push(self.plan_expr(element, factory)?);
                }
                self.decorate(Interpretable::List(EvalList {
                    id: expr.id,
                    elements: planned,
                }))
            }
            ExprKind::Map { entries } => {
                let mut planned = Vec::with_capacity(entries.len());
                for entry in entries {
                    planned.push((
                        self.plan_expr(&entry.key, factory)?,
                        self.plan_expr(&entry.value, factory)?,
                    ));
                }
                self.decorate(Interpretable::Map(EvalMap {
                    id: expr.id,
                    entries: planned,
                }))
            }
            ExprKind::Struct { type_name, fields } => {
                let resolved = self
                    .container
                    .resolve_candidate_names(type_name)
                    .into_iter()
                    .find(|candidate| self.provider.find_type(candidate).is_some())
                    .ok_or_else(|| PlanError::UnknownType(type_name.clone()))?;
                let mut planned = Vec::with_capacity(fields.len());
                for field in fields {
                    planned.push((
                        field.field.clone(),
                        self.plan_expr(&field.value, factory)?,
                    ));
                }
                self.decorate(Interpretable::Obj(EvalObj {
                    id: expr.id,
                    type_name: resolved,
                    fields: planned,
                    provider: self.provider.clone(),
                }))
            }
            ExprKind::Comprehension(fold) => self.plan_fold(expr.id, fold, factory),
        }
    }

    fn plan_ident(
        &self,
        id: i64,
        name: &str,
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        if let Some(reference) = self.reference(id) {
            if let Some(constant) = &reference.value {
                return self.decorate(Interpretable::Const(EvalConst::new(
                    id,
                    constant.to_value(),
                )));
            }
            let attribute = factory.absolute_attribute(id, vec![reference.name.clone()]);
            return self.decorate(Interpretable::Attr(EvalAttr::new(
                attribute,
                self.adapter.clone(),
            )));
        }
        let attribute = factory.maybe_attribute(id, name);
        self.decorate(Interpretable::Attr(EvalAttr::new(
            attribute,
            self.adapter.clone(),
        )))
    }

    fn plan_select(
        &self,
        id: i64,
        operand: &Expr,
        field: &str,
        test_only: bool,
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        if test_only {
            let planned = self.plan_expr(operand, factory)?;
            let field_type = self.static_field_type(operand.id, field);
            return self.decorate(Interpretable::TestOnly(EvalTestOnly {
                id,
                operand: Box::new(planned),
                field: field.to_string(),
                field_type,
            }));
        }

        // A checked select may be a single qualified name rather than a
        // field access.
        if let Some(reference) = self.reference(id) {
            if let Some(constant) = &reference.value {
                return self.decorate(Interpretable::Const(EvalConst::new(
                    id,
                    constant.to_value(),
                )));
            }
            let attribute = factory.absolute_attribute(id, vec![reference.name.clone()]);
            return self.decorate(Interpretable::Attr(EvalAttr::new(
                attribute,
                self.adapter.clone(),
            )));
        }

        let planned = self.plan_expr(operand, factory)?;
        let qualifier = match self.static_field_type(operand.id, field) {
            Some(field_type) => Qualifier::field(id, field, field_type),
            None => Qualifier::string(id, field),
        };
        self.attach_qualifier(planned, qualifier, factory)
    }

    /// Extend an attribute node's qualifier path, wrapping non-attribute
    /// operands in a relative attribute first.
    fn attach_qualifier(
        &self,
        mut operand: Interpretable,
        qualifier: Qualifier,
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        if let Some(attr) = operand.as_attr_mut() {
            attr.attribute_mut().add_qualifier(qualifier);
            return Ok(operand);
        }
        let mut attribute = factory.relative_attribute(operand.id(), operand);
        attribute.add_qualifier(qualifier);
        self.decorate(Interpretable::Attr(EvalAttr::new(
            attribute,
            self.adapter.clone(),
        )))
    }

    fn plan_call(
        &self,
        id: i64,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        match function {
            operators::LOGICAL_AND if args.len() == 2 => {
                let lhs = self.plan_expr(&args[0], factory)?;
                let rhs = self.plan_expr(&args[1], factory)?;
                return self.decorate(Interpretable::And(EvalLogic::new(id, lhs, rhs)));
            }
            operators::LOGICAL_OR if args.len() == 2 => {
                let lhs = self.plan_expr(&args[0], factory)?;
                let rhs = self.plan_expr(&args[1], factory)?;
                return self.decorate(Interpretable::Or(EvalLogic::new(id, lhs, rhs)));
            }
            operators::EQUALS if args.len() == 2 => {
                let lhs = self.plan_expr(&args[0], factory)?;
                let rhs = self.plan_expr(&args[1], factory)?;
                return self.decorate(Interpretable::Eq(EvalEquality::new(id, lhs, rhs)));
            }
            operators::NOT_EQUALS if args.len() == 2 => {
                let lhs = self.plan_expr(&args[0], factory)?;
                let rhs = self.plan_expr(&args[1], factory)?;
                return self.decorate(Interpretable::Ne(EvalEquality::new(id, lhs, rhs)));
            }
            operators::CONDITIONAL if args.len() == 3 => {
                return self.plan_conditional(id, args, factory);
            }
            operators::INDEX if args.len() == 2 => {
                return self.plan_index(id, args, factory);
            }
            _ => {}
        }
        self.plan_function_call(id, target, function, args, factory)
    }

    fn plan_conditional(
        &self,
        id: i64,
        args: &[Expr],
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        let cond = self.plan_expr(&args[0], factory)?;
        let truthy = self.plan_expr(&args[1], factory)?;
        let falsy = self.plan_expr(&args[2], factory)?;
        let truthy_attr = self.as_attribute(truthy, factory);
        let falsy_attr = self.as_attribute(falsy, factory);
        let attribute = factory.conditional_attribute(id, cond, truthy_attr, falsy_attr);
        self.decorate(Interpretable::Attr(EvalAttr::new(
            attribute,
            self.adapter.clone(),
        )))
    }

    fn plan_index(
        &self,
        id: i64,
        args: &[Expr],
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        let operand = self.plan_expr(&args[0], factory)?;
        let key = self.plan_expr(&args[1], factory)?;
        // The qualifier step carries the index call's id, so unknowns
        // produced at this step name the `_[_]` node.
        let qualifier = match key.const_value() {
            Some(value) => factory.new_qualifier(id, value.clone())?,
            None => Qualifier::attribute(id, self.as_attribute(key, factory)),
        };
        self.attach_qualifier(operand, qualifier, factory)
    }

    /// View a planned node as an attribute, wrapping computed nodes in a
    /// relative attribute.
    fn as_attribute(&self, node: Interpretable, factory: &AttributeFactory) -> Attribute {
        match node.as_attr() {
            Some(attr) => attr.attribute().clone(),
            None => factory.relative_attribute(node.id(), node),
        }
    }

    fn plan_function_call(
        &self,
        id: i64,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        // Checked references carry the fully qualified function name.
        let checked_name = self
            .reference(id)
            .filter(|r| !r.name.is_empty())
            .map(|r| r.name.clone());

        let mut resolved_name = None;
        let mut receiver_style = false;

        if let Some(name) = checked_name {
            resolved_name = Some(name);
        } else if target.is_none() {
            resolved_name = self
                .container
                .resolve_candidate_names(function)
                .into_iter()
                .find(|candidate| self.dispatcher.find_overload(candidate).is_some());
        } else if let Some(target_expr) = target {
            // A call target that is itself a dotted name may be a
            // namespace rather than a receiver: `a.b.f(x)` resolves as
            // function `a.b.f` before falling back to receiver style.
            if let Some(prefix) = qualified_name(target_expr) {
                let qualified = format!("{}.{}", prefix, function);
                resolved_name = self
                    .container
                    .resolve_candidate_names(&qualified)
                    .into_iter()
                    .find(|candidate| self.dispatcher.find_overload(candidate).is_some());
            }
            if resolved_name.is_none() {
                receiver_style = true;
            }
        }

        let function_name = resolved_name.unwrap_or_else(|| function.to_string());
        let overload = self.dispatcher.find_overload(&function_name).cloned();
        if overload.is_none() && !receiver_style && target.is_none() {
            return Err(PlanError::UnknownFunction(function_name));
        }

        let mut planned_args = Vec::with_capacity(args.len() + 1);
        if receiver_style {
            if let Some(target_expr) = target {
                planned_args.push(self.plan_expr(target_expr, factory)?);
            }
        }
        for arg in args {
            planned_args.push(self.plan_expr(arg, factory)?);
        }

        self.plan_dispatch(id, function_name, planned_args, overload)
    }

    fn plan_dispatch(
        &self,
        id: i64,
        function: String,
        mut args: Vec<Interpretable>,
        overload: Option<Overload>,
    ) -> Result<Interpretable, PlanError> {
        let operand_trait = overload.as_ref().and_then(|o| o.operand_trait);
        let non_strict = overload.as_ref().map(|o| o.non_strict).unwrap_or(false);
        match args.len() {
            0 => self.decorate(Interpretable::Zero(EvalZeroArity {
                id,
                function,
                implementation: overload.and_then(|o| o.function),
            })),
            1 => {
                let arg = Box::new(args.pop().ok_or(PlanError::UnsupportedExpr(id))?);
                self.decorate(Interpretable::Unary(EvalUnary {
                    id,
                    function,
                    arg,
                    implementation: overload.and_then(unary_impl),
                    operand_trait,
                    non_strict,
                }))
            }
            2 => {
                let rhs = Box::new(args.pop().ok_or(PlanError::UnsupportedExpr(id))?);
                let lhs = Box::new(args.pop().ok_or(PlanError::UnsupportedExpr(id))?);
                self.decorate(Interpretable::Binary(EvalBinary {
                    id,
                    function,
                    lhs,
                    rhs,
                    implementation: overload.and_then(binary_impl),
                    operand_trait,
                    non_strict,
                }))
            }
            _ => self.decorate(Interpretable::VarArgs(EvalVarArgs {
                id,
                function,
                args,
                implementation: overload.and_then(|o| o.function),
                operand_trait,
                non_strict,
            })),
        }
    }

    fn plan_fold(
        &self,
        id: i64,
        fold: &ComprehensionExpr,
        factory: &AttributeFactory,
    ) -> Result<Interpretable, PlanError> {
        self.decorate(Interpretable::Fold(EvalFold {
            id,
            iter_var: fold.iter_var.clone(),
            iter_range: Box::new(self.plan_expr(&fold.iter_range, factory)?),
            accu_var: fold.accu_var.clone(),
            accu_init: Box::new(self.plan_expr(&fold.accu_init, factory)?),
            loop_condition: Box::new(self.plan_expr(&fold.loop_condition, factory)?),
            loop_step: Box::new(self.plan_expr(&fold.loop_step, factory)?),
            result: Box::new(self.plan_expr(&fold.result, factory)?),
        }))
    }

    fn static_field_type(&self, operand_id: i64, field: &str) -> Option<FieldType> {
        let type_map = self.type_map.as_ref()?;
        let operand_type = type_map.get(&operand_id)?;
        self.provider.find_field_type(operand_type.name(), field)
    }
}

fn unary_impl(overload: Overload) -> Option<UnaryOp> {
    if overload.unary.is_some() {
        return overload.unary;
    }
    let f = overload.function?;
    Some(Arc::new(move |arg: &Value| f(std::slice::from_ref(arg))))
}

fn binary_impl(overload: Overload) -> Option<BinaryOp> {
    if overload.binary.is_some() {
        return overload.binary;
    }
    let f = overload.function?;
    Some(Arc::new(move |lhs: &Value, rhs: &Value| {
        f(&[lhs.clone(), rhs.clone()])
    }))
}

/// The dotted name an expression spells, when it is a plain identifier
/// or select chain.
fn qualified_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Select {
            operand,
            field,
            test_only: false,
        } => Some(format!("{}.{}", qualified_name(operand)?, field)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{EmptyActivation, MapActivation};
    use crate::ast::{Constant, Reference};
    use crate::provider::TypeRegistry;
    use cel_value::{EvalErrorKind, MapKey, ValueMap};

    fn arith_dispatcher() -> Arc<Dispatcher> {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .add(Overload::binary(operators::ADD, |l, r| {
                match (l.as_int(), r.as_int()) {
                    (Some(a), Some(b)) => Value::Int(a + b),
                    _ => Value::error(cel_value::EvalError::no_matching_overload(
                        operators::ADD,
                    )),
                }
            }))
            .unwrap();
        dispatcher
            .add(Overload::unary(operators::LOGICAL_NOT, |v| match v {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::error(cel_value::EvalError::no_matching_overload(
                    operators::LOGICAL_NOT,
                )),
            }))
            .unwrap();
        Arc::new(dispatcher)
    }

    fn planner() -> Planner {
        Planner::new(arith_dispatcher(), Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn test_plan_and_eval_arithmetic() {
        let expr = Expr::global_call(
            3,
            operators::ADD,
            vec![
                Expr::literal(1, Constant::Int(2)),
                Expr::literal(2, Constant::Int(3)),
            ],
        );
        let plan = planner().plan(&expr).unwrap();
        assert_eq!(plan.eval(&EmptyActivation), Value::Int(5));
    }

    #[test]
    fn test_unknown_function_fails_planning() {
        let expr = Expr::global_call(2, "nope", vec![Expr::literal(1, Constant::Int(1))]);
        assert!(matches!(
            planner().plan(&expr),
            Err(PlanError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_receiver_call_plans_without_overload() {
        // Member-style calls defer overload misses to evaluation.
        let expr = Expr::member_call(3, Expr::literal(1, Constant::String("hi".into())), "frob", vec![]);
        let plan = planner().plan(&expr).unwrap();
        match plan.eval(&EmptyActivation) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::NoMatchingOverload),
            other => panic!("expected error, got {}", other),
        }
    }

    #[test]
    fn test_unresolved_ident_is_no_such_attribute() {
        let expr = Expr::ident(1, "missing");
        let plan = planner().plan(&expr).unwrap();
        match plan.eval(&EmptyActivation) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::NoSuchAttribute),
            other => panic!("expected error, got {}", other),
        }
    }

    #[test]
    fn test_select_resolves_field() {
        let expr = Expr::select(2, Expr::ident(1, "user"), "name");
        let plan = planner().plan(&expr).unwrap();

        let mut map = ValueMap::new();
        map.insert(MapKey::String(Arc::from("name")), Value::from("ada"));
        let mut vars = MapActivation::new();
        vars.insert("user", Value::map(map));

        assert_eq!(plan.eval(&vars), Value::from("ada"));
    }

    #[test]
    fn test_checked_reference_wins_over_field_split() {
        let expr = Expr::select(2, Expr::ident(1, "a"), "b");
        let mut references = ReferenceMap::new();
        references.insert(2, Reference::ident("a.b"));

        let plan = planner().with_reference_map(references).plan(&expr).unwrap();

        // Only the variable a.b satisfies the checked plan; field b of
        // a map named a is not consulted.
        let mut map = ValueMap::new();
        map.insert(MapKey::String(Arc::from("b")), Value::Int(7));
        let mut vars = MapActivation::new();
        vars.insert("a", Value::map(map));
        match plan.eval(&vars) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::NoSuchAttribute),
            other => panic!("expected error, got {}", other),
        }

        let mut vars = MapActivation::new();
        vars.insert("a.b", Value::Int(7));
        assert_eq!(plan.eval(&vars), Value::Int(7));
    }

    #[test]
    fn test_conditional_prunes_eagerly_only_taken_branch() {
        let expr = Expr::global_call(
            4,
            operators::CONDITIONAL,
            vec![
                Expr::literal(1, Constant::Bool(true)),
                Expr::ident(2, "x"),
                Expr::ident(3, "y"),
            ],
        );
        let plan = planner().plan(&expr).unwrap();
        let mut vars = MapActivation::new();
        vars.insert("x", Value::Int(1));
        // y is unbound, but the false branch never resolves.
        assert_eq!(plan.eval(&vars), Value::Int(1));
    }

    #[test]
    fn test_index_with_constant_key() {
        let expr = Expr::global_call(
            3,
            operators::INDEX,
            vec![Expr::ident(1, "xs"), Expr::literal(2, Constant::Int(1))],
        );
        let plan = planner().plan(&expr).unwrap();
        let mut vars = MapActivation::new();
        vars.insert("xs", Value::list(vec![Value::Int(10), Value::Int(20)]));
        assert_eq!(plan.eval(&vars), Value::Int(20));
    }

    #[test]
    fn test_index_with_computed_key() {
        let expr = Expr::global_call(
            3,
            operators::INDEX,
            vec![Expr::ident(1, "xs"), Expr::ident(2, "i")],
        );
        let plan = planner().plan(&expr).unwrap();
        let mut vars = MapActivation::new();
        vars.insert("xs", Value::list(vec![Value::Int(10), Value::Int(20)]));
        vars.insert("i", Value::Int(0));
        assert_eq!(plan.eval(&vars), Value::Int(10));
    }

    #[test]
    fn test_struct_requires_known_type() {
        let expr = Expr {
            id: 1,
            kind: ExprKind::Struct {
                type_name: "pkg.Missing".into(),
                fields: vec![],
            },
        };
        assert!(matches!(
            planner().plan(&expr),
            Err(PlanError::UnknownType(_))
        ));
    }

    #[test]
    fn test_namespaced_function_resolution() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .add(Overload::unary("ns.double", |v| match v.as_int() {
                Some(i) => Value::Int(i * 2),
                None => Value::error(cel_value::EvalError::no_matching_overload("ns.double")),
            }))
            .unwrap();
        let planner = Planner::new(Arc::new(dispatcher), Arc::new(TypeRegistry::new()))
            .with_container(Container::new("ns"));

        let expr = Expr::global_call(2, "double", vec![Expr::literal(1, Constant::Int(4))]);
        let plan = planner.plan(&expr).unwrap();
        assert_eq!(plan.eval(&EmptyActivation), Value::Int(8));
    }

    #[test]
    fn test_target_namespace_retry() {
        // a.b.f(x) where a.b.f is a declared global, not a receiver call.
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .add(Overload::unary("a.b.f", |v| v.clone()))
            .unwrap();
        let planner = Planner::new(Arc::new(dispatcher), Arc::new(TypeRegistry::new()));

        let expr = Expr::member_call(
            4,
            Expr::select(2, Expr::ident(1, "a"), "b"),
            "f",
            vec![Expr::literal(3, Constant::Int(9))],
        );
        let plan = planner.plan(&expr).unwrap();
        assert_eq!(plan.eval(&EmptyActivation), Value::Int(9));
    }
}

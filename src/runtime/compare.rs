use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;
use crate::runtime::object::{call_method, EQ_METHOD, LT_METHOD, Object, ObjectHolder};

/// Comparison selected by a comparison node. `Equal` and `Less` are primitive;
/// the rest are derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Comparator {
    pub fn compare(
        self,
        lhs: &ObjectHolder,
        rhs: &ObjectHolder,
        context: &mut dyn Context,
    ) -> Result<bool, RuntimeError> {
        match self {
            Comparator::Equal => equal(lhs, rhs, context),
            Comparator::NotEqual => not_equal(lhs, rhs, context),
            Comparator::Less => less(lhs, rhs, context),
            Comparator::Greater => greater(lhs, rhs, context),
            Comparator::LessOrEqual => less_or_equal(lhs, rhs, context),
            Comparator::GreaterOrEqual => greater_or_equal(lhs, rhs, context),
        }
    }
}

/// Equality: same-variant primitives compare natively, two absent values are
/// equal, and an instance lhs falls back to `__eq__`.
pub fn equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    let lhs_object = lhs.object();
    let rhs_object = rhs.object();
    if lhs_object.is_none() && rhs_object.is_none() {
        return Ok(true);
    }
    if let (Some(l), Some(r)) = (lhs_object.as_deref(), rhs_object.as_deref()) {
        match (l, r) {
            (Object::Number(l), Object::Number(r)) => return Ok(l == r),
            (Object::Bool(l), Object::Bool(r)) => return Ok(l == r),
            (Object::String(l), Object::String(r)) => return Ok(l == r),
            _ => {}
        }
    }
    if let Some(receiver) = &lhs_object
        && let Object::Instance(instance) = &**receiver
        && instance.class().has_method(EQ_METHOD, 1)
    {
        let result = call_method(receiver, EQ_METHOD, vec![rhs.clone()], context)?;
        return expect_bool_result(EQ_METHOD, &result);
    }
    Err(RuntimeError::UnsupportedOperands {
        operation: "equality",
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    })
}

/// Ordering: same-variant primitives compare natively (`False < True` for
/// Bool), an instance lhs falls back to `__lt__`, and there is no case for
/// the absent value.
pub fn less(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    let lhs_object = lhs.object();
    let rhs_object = rhs.object();
    if let (Some(l), Some(r)) = (lhs_object.as_deref(), rhs_object.as_deref()) {
        match (l, r) {
            (Object::Number(l), Object::Number(r)) => return Ok(l < r),
            (Object::Bool(l), Object::Bool(r)) => return Ok(l < r),
            (Object::String(l), Object::String(r)) => return Ok(l < r),
            _ => {}
        }
    }
    if let Some(receiver) = &lhs_object
        && let Object::Instance(instance) = &**receiver
        && instance.class().has_method(LT_METHOD, 1)
    {
        let result = call_method(receiver, LT_METHOD, vec![rhs.clone()], context)?;
        return expect_bool_result(LT_METHOD, &result);
    }
    Err(RuntimeError::UnsupportedOperands {
        operation: "ordering",
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    })
}

pub fn not_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, context)?)
}

pub fn greater(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)? && !equal(lhs, rhs, context)?)
}

pub fn less_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(less(lhs, rhs, context)? || equal(lhs, rhs, context)?)
}

pub fn greater_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)?)
}

fn expect_bool_result(
    method: &'static str,
    result: &ObjectHolder,
) -> Result<bool, RuntimeError> {
    match result.object().as_deref() {
        Some(Object::Bool(value)) => Ok(*value),
        _ => Err(RuntimeError::NonBoolDunderResult {
            method,
            got: result.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::ast::Statement;
    use crate::runtime::context::DummyContext;
    use crate::runtime::object::{Class, Instance, Method};

    fn cmp(
        comparator: Comparator,
        lhs: &ObjectHolder,
        rhs: &ObjectHolder,
    ) -> Result<bool, RuntimeError> {
        comparator.compare(lhs, rhs, &mut DummyContext::new())
    }

    fn expect(comparator: Comparator, lhs: &ObjectHolder, rhs: &ObjectHolder) -> bool {
        cmp(comparator, lhs, rhs).expect("comparison failed")
    }

    #[test]
    fn compares_numbers() {
        let two = ObjectHolder::number(2);
        let three = ObjectHolder::number(3);
        assert!(expect(Comparator::Less, &two, &three));
        assert!(!expect(Comparator::Equal, &two, &three));
        assert!(expect(Comparator::NotEqual, &two, &three));
        assert!(expect(Comparator::LessOrEqual, &two, &two));
        assert!(expect(Comparator::GreaterOrEqual, &three, &two));
        assert!(expect(Comparator::Greater, &three, &two));
    }

    #[test]
    fn compares_bools_and_strings() {
        let f = ObjectHolder::boolean(false);
        let t = ObjectHolder::boolean(true);
        assert!(expect(Comparator::Less, &f, &t));
        assert!(expect(Comparator::Equal, &t, &t));

        let a = ObjectHolder::string("abc");
        let b = ObjectHolder::string("abd");
        assert!(expect(Comparator::Less, &a, &b));
        assert!(expect(Comparator::Equal, &a, &a));
    }

    #[test]
    fn derived_operators_follow_the_laws() {
        let pairs = [(1, 1), (1, 2), (2, 1)];
        for (l, r) in pairs {
            let lhs = ObjectHolder::number(l);
            let rhs = ObjectHolder::number(r);
            assert_eq!(
                expect(Comparator::Equal, &lhs, &rhs),
                !expect(Comparator::NotEqual, &lhs, &rhs)
            );
            assert_eq!(
                expect(Comparator::GreaterOrEqual, &lhs, &rhs),
                !expect(Comparator::Less, &lhs, &rhs)
            );
            assert_eq!(
                expect(Comparator::LessOrEqual, &lhs, &rhs),
                expect(Comparator::Less, &lhs, &rhs) || expect(Comparator::Equal, &lhs, &rhs)
            );
        }
    }

    #[test]
    fn none_equals_only_none() {
        assert!(expect(Comparator::Equal, &ObjectHolder::none(), &ObjectHolder::none()));
        let err = cmp(
            Comparator::Equal,
            &ObjectHolder::none(),
            &ObjectHolder::number(1),
        )
        .expect_err("expected incomparable values");
        assert_eq!(
            err,
            RuntimeError::UnsupportedOperands {
                operation: "equality",
                lhs: "None",
                rhs: "number",
            }
        );
    }

    #[test]
    fn mixed_primitive_comparison_errors() {
        let err = cmp(
            Comparator::Less,
            &ObjectHolder::number(1),
            &ObjectHolder::string("1"),
        )
        .expect_err("expected incomparable values");
        assert_eq!(
            err,
            RuntimeError::UnsupportedOperands {
                operation: "ordering",
                lhs: "number",
                rhs: "string",
            }
        );
    }

    fn class_with_dunder(name: &str, dunder: &str, result: Statement) -> Rc<Class> {
        Rc::new(Class::new(
            name.to_string(),
            vec![Method {
                name: dunder.to_string(),
                formal_params: vec!["other".to_string()],
                body: Statement::MethodBody(Box::new(Statement::Return(Box::new(result)))),
            }],
            None,
        ))
    }

    fn instance_of(class: &Rc<Class>) -> ObjectHolder {
        ObjectHolder::own(Object::Instance(Instance::new(Rc::clone(class))))
    }

    #[test]
    fn instance_equality_dispatches_to_eq_dunder() {
        let class = class_with_dunder("A", EQ_METHOD, Statement::Bool(true));
        let lhs = instance_of(&class);
        assert!(expect(Comparator::Equal, &lhs, &ObjectHolder::number(1)));
        assert!(!expect(Comparator::NotEqual, &lhs, &ObjectHolder::number(1)));
    }

    #[test]
    fn instance_ordering_dispatches_to_lt_dunder() {
        let class = class_with_dunder("A", LT_METHOD, Statement::Bool(false));
        let lhs = instance_of(&class);
        assert!(!expect(Comparator::Less, &lhs, &ObjectHolder::number(1)));
        assert!(expect(Comparator::GreaterOrEqual, &lhs, &ObjectHolder::number(1)));
    }

    #[test]
    fn non_bool_dunder_result_errors() {
        let class = class_with_dunder("A", EQ_METHOD, Statement::Number(1));
        let lhs = instance_of(&class);
        let err = cmp(Comparator::Equal, &lhs, &ObjectHolder::number(1))
            .expect_err("expected non-bool dunder result");
        assert_eq!(
            err,
            RuntimeError::NonBoolDunderResult {
                method: EQ_METHOD,
                got: "number",
            }
        );
    }

    #[test]
    fn instance_without_dunder_is_incomparable() {
        let class = Rc::new(Class::new("A".to_string(), Vec::new(), None));
        let lhs = instance_of(&class);
        let err = cmp(Comparator::Equal, &lhs, &ObjectHolder::number(1))
            .expect_err("expected incomparable values");
        assert!(matches!(err, RuntimeError::UnsupportedOperands { .. }));
    }
}

//! Abstract syntax tree and its tree-walking evaluator.
//!
//! Statements and expressions share one contract: `execute` over a closure
//! and a context. The result is a control-flow signal: `Compound` stops at
//! the first `Return` travelling up, and `MethodBody` converts it into the
//! produced value of a call.

use std::fmt::Write as _;
use std::rc::Rc;

use crate::runtime::compare::Comparator;
use crate::runtime::context::{Context, DummyContext};
use crate::runtime::error::RuntimeError;
use crate::runtime::object::{
    ADD_METHOD, Class, Closure, INIT_METHOD, Instance, Object, ObjectHolder, call_method,
};

/// Result of executing a statement: a plain value, or a `return` travelling
/// up to the nearest [`Statement::MethodBody`].
#[derive(Debug)]
pub enum Flow {
    Value(ObjectHolder),
    Return(ObjectHolder),
}

impl Flow {
    /// Collapses the signal into the produced value.
    pub fn into_value(self) -> ObjectHolder {
        match self {
            Flow::Value(value) | Flow::Return(value) => value,
        }
    }
}

/// Binary operations with operand rules of their own; comparisons are
/// carried separately by [`Statement::Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Div,
    And,
    Or,
}

impl BinaryOperator {
    fn name(self) -> &'static str {
        match self {
            BinaryOperator::Add => "addition",
            BinaryOperator::Sub => "subtraction",
            BinaryOperator::Mult => "multiplication",
            BinaryOperator::Div => "division",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Number(i64),
    String(String),
    Bool(bool),
    None,
    /// `name = value`, binding in the current scope.
    Assignment {
        name: String,
        value: Box<Statement>,
    },
    /// `object.field = value`, mutating an instance's field scope. `object`
    /// is the dotted path to the instance.
    FieldAssignment {
        object: Vec<String>,
        field: String,
        value: Box<Statement>,
    },
    /// Dotted identifier path: the first segment resolves in the scope, each
    /// further one in the preceding instance's fields.
    Variable(Vec<String>),
    Print {
        args: Vec<Statement>,
    },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    NewInstance {
        class: Rc<Class>,
        args: Vec<Statement>,
    },
    /// `str(expr)`: the value rendered the way `print` would render it.
    Stringify(Box<Statement>),
    BinaryOp {
        op: BinaryOperator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Comparison {
        cmp: Comparator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Not(Box<Statement>),
    Compound(Vec<Statement>),
    Return(Box<Statement>),
    IfElse {
        condition: Box<Statement>,
        then_body: Box<Statement>,
        else_body: Option<Box<Statement>>,
    },
    /// Binds the finished class object under its name.
    ClassDefinition(Rc<Class>),
    /// Boundary that terminates return propagation: the body of a method.
    MethodBody(Box<Statement>),
}

impl Statement {
    pub fn execute(
        &self,
        closure: &mut Closure,
        context: &mut dyn Context,
    ) -> Result<Flow, RuntimeError> {
        match self {
            Statement::Number(value) => Ok(Flow::Value(ObjectHolder::number(*value))),
            Statement::String(value) => Ok(Flow::Value(ObjectHolder::string(value.clone()))),
            Statement::Bool(value) => Ok(Flow::Value(ObjectHolder::boolean(*value))),
            Statement::None => Ok(Flow::Value(ObjectHolder::none())),
            Statement::Assignment { name, value } => {
                let value = value.eval(closure, context)?;
                closure.insert(name.clone(), value.clone());
                Ok(Flow::Value(value))
            }
            Statement::FieldAssignment {
                object,
                field,
                value,
            } => {
                let target = resolve_dotted(object, closure)?;
                let value = value.eval(closure, context)?;
                let not_an_instance = || RuntimeError::NotAnInstance {
                    name: object.join("."),
                };
                let target = target.object().ok_or_else(not_an_instance)?;
                let Object::Instance(instance) = &*target else {
                    return Err(not_an_instance());
                };
                instance.fields_mut().insert(field.clone(), value.clone());
                Ok(Flow::Value(value))
            }
            Statement::Variable(path) => Ok(Flow::Value(resolve_dotted(path, closure)?)),
            Statement::Print { args } => {
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        write!(context.output_stream(), " ")?;
                    }
                    let value = arg.eval(closure, context)?;
                    value.print(context)?;
                }
                writeln!(context.output_stream())?;
                Ok(Flow::Value(ObjectHolder::none()))
            }
            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = object.eval(closure, context)?;
                let receiver = receiver.object().ok_or_else(|| {
                    RuntimeError::MethodCallOnNonInstance {
                        method: method.clone(),
                        type_name: "None",
                    }
                })?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(arg.eval(closure, context)?);
                }
                Ok(Flow::Value(call_method(
                    &receiver, method, arg_values, context,
                )?))
            }
            Statement::NewInstance { class, args } => {
                let receiver = Rc::new(Object::Instance(Instance::new(Rc::clone(class))));
                // __init__ runs only when its arity matches the argument
                // list; otherwise the arguments are ignored.
                if class.has_method(INIT_METHOD, args.len()) {
                    let mut arg_values = Vec::with_capacity(args.len());
                    for arg in args {
                        arg_values.push(arg.eval(closure, context)?);
                    }
                    call_method(&receiver, INIT_METHOD, arg_values, context)?;
                }
                Ok(Flow::Value(ObjectHolder::from(receiver)))
            }
            Statement::Stringify(expr) => {
                let value = expr.eval(closure, context)?;
                let mut buffer = DummyContext::new();
                value.print(&mut buffer)?;
                Ok(Flow::Value(ObjectHolder::string(buffer.output)))
            }
            Statement::BinaryOp { op, lhs, rhs } => {
                let lhs = lhs.eval(closure, context)?;
                let rhs = rhs.eval(closure, context)?;
                Ok(Flow::Value(eval_binary(*op, &lhs, &rhs, context)?))
            }
            Statement::Comparison { cmp, lhs, rhs } => {
                let lhs = lhs.eval(closure, context)?;
                let rhs = rhs.eval(closure, context)?;
                Ok(Flow::Value(ObjectHolder::boolean(cmp.compare(
                    &lhs, &rhs, context,
                )?)))
            }
            Statement::Not(expr) => {
                let value = expr.eval(closure, context)?;
                match value.object().as_deref() {
                    Some(Object::Bool(operand)) => Ok(Flow::Value(ObjectHolder::boolean(!operand))),
                    _ => Err(RuntimeError::ExpectedBool {
                        context: "the 'not' operand",
                        got: value.type_name(),
                    }),
                }
            }
            Statement::Compound(statements) => {
                for statement in statements {
                    if let Flow::Return(value) = statement.execute(closure, context)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Value(ObjectHolder::none()))
            }
            Statement::Return(expr) => Ok(Flow::Return(expr.eval(closure, context)?)),
            Statement::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let condition = condition.eval(closure, context)?;
                match condition.object().as_deref() {
                    Some(Object::Bool(true)) => then_body.execute(closure, context),
                    Some(Object::Bool(false)) => match else_body {
                        Some(body) => body.execute(closure, context),
                        Option::None => Ok(Flow::Value(ObjectHolder::none())),
                    },
                    _ => Err(RuntimeError::ExpectedBool {
                        context: "the if condition",
                        got: condition.type_name(),
                    }),
                }
            }
            Statement::ClassDefinition(class) => {
                closure.insert(
                    class.name().to_string(),
                    ObjectHolder::own(Object::Class(Rc::clone(class))),
                );
                Ok(Flow::Value(ObjectHolder::none()))
            }
            Statement::MethodBody(body) => match body.execute(closure, context)? {
                Flow::Return(value) => Ok(Flow::Value(value)),
                Flow::Value(_) => Ok(Flow::Value(ObjectHolder::none())),
            },
        }
    }

    /// Evaluates as an expression: the produced value with any return signal
    /// collapsed.
    pub fn eval(
        &self,
        closure: &mut Closure,
        context: &mut dyn Context,
    ) -> Result<ObjectHolder, RuntimeError> {
        Ok(self.execute(closure, context)?.into_value())
    }
}

fn eval_binary(
    op: BinaryOperator,
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<ObjectHolder, RuntimeError> {
    let lhs_object = lhs.object();
    let rhs_object = rhs.object();
    let operands = (lhs_object.as_deref(), rhs_object.as_deref());
    let mismatch = || RuntimeError::UnsupportedOperands {
        operation: op.name(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    };
    match op {
        BinaryOperator::Add => {
            match operands {
                (Some(Object::Number(l)), Some(Object::Number(r))) => {
                    return Ok(ObjectHolder::number(l + r));
                }
                (Some(Object::String(l)), Some(Object::String(r))) => {
                    return Ok(ObjectHolder::string(format!("{l}{r}")));
                }
                _ => {}
            }
            if let Some(receiver) = &lhs_object
                && let Object::Instance(instance) = &**receiver
                && instance.class().has_method(ADD_METHOD, 1)
            {
                return call_method(receiver, ADD_METHOD, vec![rhs.clone()], context);
            }
            Err(mismatch())
        }
        BinaryOperator::Sub => match operands {
            (Some(Object::Number(l)), Some(Object::Number(r))) => Ok(ObjectHolder::number(l - r)),
            _ => Err(mismatch()),
        },
        BinaryOperator::Mult => match operands {
            (Some(Object::Number(l)), Some(Object::Number(r))) => Ok(ObjectHolder::number(l * r)),
            _ => Err(mismatch()),
        },
        BinaryOperator::Div => match operands {
            (Some(Object::Number(_)), Some(Object::Number(0))) => Err(RuntimeError::ZeroDivision),
            (Some(Object::Number(l)), Some(Object::Number(r))) => Ok(ObjectHolder::number(l / r)),
            _ => Err(mismatch()),
        },
        // Both operands are always evaluated before this point; the guest
        // language has no short-circuit.
        BinaryOperator::And => match operands {
            (Some(Object::Bool(l)), Some(Object::Bool(r))) => Ok(ObjectHolder::boolean(*l && *r)),
            _ => Err(mismatch()),
        },
        BinaryOperator::Or => match operands {
            (Some(Object::Bool(l)), Some(Object::Bool(r))) => Ok(ObjectHolder::boolean(*l || *r)),
            _ => Err(mismatch()),
        },
    }
}

/// Resolves a dotted identifier path: the first segment from the scope, each
/// further segment from the preceding instance's field scope. A non-instance
/// intermediate is an error.
fn resolve_dotted(path: &[String], closure: &Closure) -> Result<ObjectHolder, RuntimeError> {
    let Some(first) = path.first() else {
        return Ok(ObjectHolder::none());
    };
    let mut value = closure
        .get(first)
        .cloned()
        .ok_or_else(|| RuntimeError::UndefinedVariable { name: first.clone() })?;
    for (position, name) in path.iter().enumerate().skip(1) {
        let object = value
            .object()
            .ok_or_else(|| RuntimeError::NotAnInstance {
                name: path[..position].join("."),
            })?;
        let Object::Instance(instance) = &*object else {
            return Err(RuntimeError::NotAnInstance {
                name: path[..position].join("."),
            });
        };
        let field = instance.fields().get(name).cloned();
        value = field.ok_or_else(|| RuntimeError::UndefinedVariable {
            name: path[..=position].join("."),
        })?;
    }
    Ok(value)
}

/// A parsed program: the top-level statement sequence.
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    /// Executes the program against a fresh module scope, writing output
    /// through `context`; the final module scope is returned. A top-level
    /// `return` stops execution quietly.
    pub fn run(&self, context: &mut dyn Context) -> Result<Closure, RuntimeError> {
        let mut module_scope = Closure::new();
        for statement in &self.statements {
            if let Flow::Return(_) = statement.execute(&mut module_scope, context)? {
                break;
            }
        }
        Ok(module_scope)
    }
}

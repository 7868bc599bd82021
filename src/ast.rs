//! Statement nodes and their evaluation.
//!
//! Every node evaluates against a scope and a context and produces a value.
//! `return` unwinds as [`Unwind::Return`] through arbitrarily nested
//! compounds and branches; only the [`Statement::MethodBody`] frame at the
//! root of a method turns it back into a plain value.

use std::io::prelude::*;
use std::rc::Rc;

use crate::runtime::{
    self, Class, ClassInstance, Closure, Context, ExecResult, Object, ObjectHolder, RuntimeError,
    Unwind, ADD_METHOD, INIT_METHOD,
};

/// Comparator applied by a [`Statement::Comparison`] node.
pub type Comparator =
    fn(&ObjectHolder, &ObjectHolder, &mut Context<'_>) -> Result<bool, Unwind>;

#[derive(Debug)]
pub enum Statement {
    /// A literal or otherwise precomputed value.
    Const(ObjectHolder),
    /// `var = rv`
    Assignment(String, Box<Statement>),
    /// Dotted read: `a`, `a.b`, `a.b.c`, ...
    VariableValue(Vec<String>),
    /// `object.field = rv`
    FieldAssignment(Box<Statement>, String, Box<Statement>),
    /// `print a, b, ...`
    Print(Vec<Statement>),
    /// `str(x)`
    Stringify(Box<Statement>),
    /// `object.method(args)`
    MethodCall(Box<Statement>, String, Vec<Statement>),
    /// `Name(args)`
    NewInstance(Rc<Class>, Vec<Statement>),
    Add(Box<Statement>, Box<Statement>),
    Sub(Box<Statement>, Box<Statement>),
    Mult(Box<Statement>, Box<Statement>),
    Div(Box<Statement>, Box<Statement>),
    /// Statements executed in source order.
    Compound(Vec<Statement>),
    Return(Box<Statement>),
    /// The frame that turns a propagating `return` back into a value.
    MethodBody(Box<Statement>),
    /// Introduces a class into the executing scope.
    ClassDefinition(Rc<Class>),
    IfElse(Box<Statement>, Box<Statement>, Option<Box<Statement>>),
    Or(Box<Statement>, Box<Statement>),
    And(Box<Statement>, Box<Statement>),
    Not(Box<Statement>),
    Comparison(Comparator, Box<Statement>, Box<Statement>),
}

impl Statement {
    /// Evaluate the node against `closure`, writing program output through
    /// `ctx`.
    pub fn execute(&self, closure: &mut Closure, ctx: &mut Context<'_>) -> ExecResult {
        match self {
            Statement::Const(value) => Ok(value.clone()),

            Statement::Assignment(var, rv) => {
                let value = rv.execute(closure, ctx)?;
                let share = value.clone();
                closure.insert(var.clone(), value);
                Ok(share)
            }

            Statement::VariableValue(ids) => resolve_path(ids, closure),

            Statement::FieldAssignment(object, field, rv) => {
                let target = object.execute(closure, ctx)?;
                let value = rv.execute(closure, ctx)?;
                let share = value.clone();
                let instance = target
                    .as_instance()
                    .ok_or_else(|| RuntimeError::NotAnInstance(field.clone()))?;
                instance.fields_mut().insert(field.clone(), value);
                Ok(share)
            }

            Statement::Print(args) => {
                let mut line = String::new();
                let mut first = true;
                for arg in args {
                    if !first {
                        line.push(' ');
                    }
                    first = false;
                    let value = arg.execute(closure, ctx)?;
                    value.print(&mut line, ctx)?;
                }
                line.push('\n');
                ctx.output()
                    .write_all(line.as_bytes())
                    .map_err(RuntimeError::from)?;
                Ok(ObjectHolder::own(Object::String(line)))
            }

            Statement::Stringify(arg) => {
                let mut buf = String::new();
                arg.execute(closure, ctx)?.print(&mut buf, ctx)?;
                Ok(ObjectHolder::own(Object::String(buf)))
            }

            Statement::MethodCall(object, method, args) => {
                let target = object.execute(closure, ctx)?;
                if target
                    .as_instance()
                    .is_some_and(|i| i.has_method(method, args.len()))
                {
                    let actual_args = evaluate_args(args, closure, ctx)?;
                    target.call_method(method, &actual_args, ctx)
                } else {
                    Ok(ObjectHolder::none())
                }
            }

            Statement::NewInstance(class, args) => {
                let instance =
                    ObjectHolder::own(Object::ClassInstance(ClassInstance::new(class.clone())));
                let has_init = class
                    .get_method(INIT_METHOD)
                    .is_some_and(|m| m.formal_params.len() == args.len());
                if has_init {
                    let actual_args = evaluate_args(args, closure, ctx)?;
                    instance.call_method(INIT_METHOD, &actual_args, ctx)?;
                }
                Ok(instance)
            }

            Statement::Add(lhs, rhs) => {
                let l = lhs.execute(closure, ctx)?;
                let r = rhs.execute(closure, ctx)?;
                match (l.get(), r.get()) {
                    (Some(Object::Number(a)), Some(Object::Number(b))) => {
                        Ok(ObjectHolder::own(Object::Number(a.wrapping_add(*b))))
                    }
                    (Some(Object::String(a)), Some(Object::String(b))) => {
                        let mut s = a.clone();
                        s.push_str(b);
                        Ok(ObjectHolder::own(Object::String(s)))
                    }
                    (Some(Object::ClassInstance(instance)), _) => {
                        if instance.has_method(ADD_METHOD, 1) {
                            l.call_method(ADD_METHOD, &[r.clone()], ctx)
                        } else {
                            Err(RuntimeError::CannotAdd.into())
                        }
                    }
                    _ => Err(RuntimeError::CannotAdd.into()),
                }
            }

            Statement::Sub(lhs, rhs) => {
                let l = lhs.execute(closure, ctx)?;
                let r = rhs.execute(closure, ctx)?;
                match (l.as_number(), r.as_number()) {
                    (Some(a), Some(b)) => Ok(ObjectHolder::own(Object::Number(a.wrapping_sub(b)))),
                    _ => Err(RuntimeError::CannotSub.into()),
                }
            }

            Statement::Mult(lhs, rhs) => {
                let l = lhs.execute(closure, ctx)?;
                let r = rhs.execute(closure, ctx)?;
                match (l.as_number(), r.as_number()) {
                    (Some(a), Some(b)) => Ok(ObjectHolder::own(Object::Number(a.wrapping_mul(b)))),
                    _ => Err(RuntimeError::CannotMult.into()),
                }
            }

            Statement::Div(lhs, rhs) => {
                let l = lhs.execute(closure, ctx)?;
                let r = rhs.execute(closure, ctx)?;
                match (l.as_number(), r.as_number()) {
                    (Some(_), Some(0)) => Err(RuntimeError::DivisionByZero.into()),
                    (Some(a), Some(b)) => Ok(ObjectHolder::own(Object::Number(a.wrapping_div(b)))),
                    _ => Err(RuntimeError::CannotDiv.into()),
                }
            }

            Statement::Compound(stmts) => {
                for stmt in stmts {
                    stmt.execute(closure, ctx)?;
                }
                Ok(ObjectHolder::none())
            }

            Statement::Return(rv) => Err(Unwind::Return(rv.execute(closure, ctx)?)),

            Statement::MethodBody(body) => match body.execute(closure, ctx) {
                Ok(_) => Ok(ObjectHolder::none()),
                Err(Unwind::Return(value)) => Ok(value),
                Err(e) => Err(e),
            },

            Statement::ClassDefinition(class) => {
                let holder = ObjectHolder::own(Object::Class(class.clone()));
                let share = holder.clone();
                closure.insert(class.name().to_string(), holder);
                Ok(share)
            }

            Statement::IfElse(condition, if_body, else_body) => {
                let verdict = condition
                    .execute(closure, ctx)?
                    .as_bool()
                    .ok_or(RuntimeError::ExpectedBool)?;
                if verdict {
                    let result = if_body.execute(closure, ctx)?;
                    if !result.is_none() {
                        return Ok(result);
                    }
                } else if let Some(else_body) = else_body {
                    let result = else_body.execute(closure, ctx)?;
                    if !result.is_none() {
                        return Ok(result);
                    }
                }
                Ok(ObjectHolder::none())
            }

            Statement::Or(lhs, rhs) => {
                let value = lhs.execute(closure, ctx)?;
                if truthy(&value, ctx)? {
                    return Ok(ObjectHolder::own(Object::Bool(true)));
                }
                let value = rhs.execute(closure, ctx)?;
                Ok(ObjectHolder::own(Object::Bool(truthy(&value, ctx)?)))
            }

            Statement::And(lhs, rhs) => {
                let value = lhs.execute(closure, ctx)?;
                if !truthy(&value, ctx)? {
                    return Ok(ObjectHolder::own(Object::Bool(false)));
                }
                let value = rhs.execute(closure, ctx)?;
                Ok(ObjectHolder::own(Object::Bool(truthy(&value, ctx)?)))
            }

            Statement::Not(arg) => {
                let verdict = arg
                    .execute(closure, ctx)?
                    .as_bool()
                    .ok_or(RuntimeError::ExpectedBool)?;
                Ok(ObjectHolder::own(Object::Bool(!verdict)))
            }

            Statement::Comparison(cmp, lhs, rhs) => {
                let l = lhs.execute(closure, ctx)?;
                let r = rhs.execute(closure, ctx)?;
                Ok(ObjectHolder::own(Object::Bool(cmp(&l, &r, ctx)?)))
            }
        }
    }
}

// `and`/`or` decide truthiness by equality against `True`, so operands the
// comparison protocol rejects (a bare number against a bool, say) fail
// rather than coerce.
fn truthy(value: &ObjectHolder, ctx: &mut Context<'_>) -> Result<bool, Unwind> {
    runtime::equal(value, &ObjectHolder::own(Object::Bool(true)), ctx)
}

/// Walk a dotted path: the head resolves in `closure`, every further
/// segment in the field scope of the class instance reached so far.
fn resolve_path(ids: &[String], closure: &Closure) -> ExecResult {
    let mut iter = ids.iter();
    let first = match iter.next() {
        Some(id) => id,
        None => return Ok(ObjectHolder::none()),
    };
    let mut value = closure
        .get(first)
        .cloned()
        .ok_or_else(|| RuntimeError::UndefinedIdentifier(first.clone()))?;
    for id in iter {
        let instance = value
            .as_instance()
            .ok_or_else(|| RuntimeError::NotAnInstance(id.clone()))?;
        let field = instance
            .fields()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedIdentifier(id.clone()))?;
        value = field;
    }
    Ok(value)
}

fn evaluate_args(
    args: &[Statement],
    closure: &mut Closure,
    ctx: &mut Context<'_>,
) -> Result<Vec<ObjectHolder>, Unwind> {
    args.iter().map(|arg| arg.execute(closure, ctx)).collect()
}

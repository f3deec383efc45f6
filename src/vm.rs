//! Stack interpreter for method bytecode.
//!
//! Execution always happens "as" some loaded type: cross-type calls resolve
//! through that type's own loader and are checked against its recorded
//! [`Access`](crate::space::Access) capability, which is what makes the
//! loading strategy observable at runtime.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::RuntimeError;
use crate::image::{MethodImage, Op, Value, Visibility};
use crate::space::LoadedType;

const MAX_CALL_DEPTH: usize = 64;

type Stack = SmallVec<[Value; 16]>;

fn pop(stack: &mut Stack) -> Result<Value, RuntimeError> {
    stack
        .pop()
        .ok_or_else(|| RuntimeError::Malformed("operand stack underflow".to_string()))
}

fn pop_int(stack: &mut Stack) -> Result<i64, RuntimeError> {
    match pop(stack)? {
        Value::Int(n) => Ok(n),
        Value::Bool(_) => Err(RuntimeError::TypeMismatch { expected: "int" }),
    }
}

fn pop_bool(stack: &mut Stack) -> Result<bool, RuntimeError> {
    match pop(stack)? {
        Value::Bool(b) => Ok(b),
        Value::Int(_) => Err(RuntimeError::TypeMismatch { expected: "bool" }),
    }
}

/// Run one method of `current` to completion.
pub(crate) fn execute(
    current: &Arc<LoadedType>,
    method: &MethodImage,
    args: &[Value],
    depth: usize,
) -> Result<Value, RuntimeError> {
    if depth > MAX_CALL_DEPTH {
        return Err(RuntimeError::DepthLimit);
    }
    if args.len() != method.params.len() {
        return Err(RuntimeError::Arity {
            member: method.name.clone(),
            expected: method.params.len(),
            got: args.len(),
        });
    }

    let code = &method.code;
    let mut stack: Stack = SmallVec::new();
    let mut pc = 0usize;
    while let Some(op) = code.get(pc) {
        match op {
            Op::Const(value) => stack.push(*value),
            Op::Arg(index) => {
                let value = args
                    .get(*index as usize)
                    .ok_or_else(|| RuntimeError::Malformed("argument index out of range".to_string()))?;
                stack.push(*value);
            }
            Op::Add => {
                let b = pop_int(&mut stack)?;
                let a = pop_int(&mut stack)?;
                stack.push(Value::Int(a.wrapping_add(b)));
            }
            Op::Sub => {
                let b = pop_int(&mut stack)?;
                let a = pop_int(&mut stack)?;
                stack.push(Value::Int(a.wrapping_sub(b)));
            }
            Op::Mul => {
                let b = pop_int(&mut stack)?;
                let a = pop_int(&mut stack)?;
                stack.push(Value::Int(a.wrapping_mul(b)));
            }
            Op::Lt => {
                let b = pop_int(&mut stack)?;
                let a = pop_int(&mut stack)?;
                stack.push(Value::Bool(a < b));
            }
            Op::Eq => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                let equal = match (a, b) {
                    (Value::Int(x), Value::Int(y)) => x == y,
                    (Value::Bool(x), Value::Bool(y)) => x == y,
                    _ => return Err(RuntimeError::TypeMismatch { expected: "operands of one type" }),
                };
                stack.push(Value::Bool(equal));
            }
            Op::Jump(target) => {
                pc = *target as usize;
                continue;
            }
            Op::JumpIfFalse(target) => {
                if !pop_bool(&mut stack)? {
                    pc = *target as usize;
                    continue;
                }
            }
            Op::Call {
                type_name,
                member,
                argc,
            } => {
                let argc = *argc as usize;
                if stack.len() < argc {
                    return Err(RuntimeError::Malformed("operand stack underflow at call".to_string()));
                }
                let call_args: Vec<Value> = stack.drain(stack.len() - argc..).collect();
                let result = call(current, type_name, member, &call_args, depth)?;
                stack.push(result);
            }
            Op::Ret => return pop(&mut stack),
        }
        pc += 1;
    }
    Err(RuntimeError::Malformed("execution fell off end of method".to_string()))
}

/// Resolve and invoke a member of another type, enforcing visibility.
fn call(
    current: &Arc<LoadedType>,
    type_name: &str,
    member: &str,
    args: &[Value],
    depth: usize,
) -> Result<Value, RuntimeError> {
    let target = current.resolve(type_name)?;
    let target_method = target
        .method(member)
        .ok_or_else(|| RuntimeError::UnknownMember {
            type_name: target.name().to_string(),
            member: member.to_string(),
        })?;
    if target_method.visibility == Visibility::Private
        && !Arc::ptr_eq(current, &target)
        && !current.access().permits_private(target.namespace())
    {
        return Err(RuntimeError::PrivateMember {
            type_name: target.name().to_string(),
            member: member.to_string(),
        });
    }
    execute(&target, target_method, args, depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::TypeImage;
    use crate::space::{Access, SymbolSpace};

    fn run(code: Vec<Op>, params: Vec<String>, args: &[Value]) -> Result<Value, RuntimeError> {
        let space = SymbolSpace::new();
        let ty = space
            .define(
                TypeImage {
                    name: "test.T".to_string(),
                    methods: vec![MethodImage {
                        name: "m".to_string(),
                        visibility: Visibility::Public,
                        params,
                        code,
                    }],
                },
                Access::Public,
            )
            .unwrap();
        let method = ty.method("m").unwrap().clone();
        execute(&ty, &method, args, 0)
    }

    #[test]
    fn test_arithmetic() {
        let code = vec![
            Op::Const(Value::Int(2)),
            Op::Const(Value::Int(3)),
            Op::Mul,
            Op::Const(Value::Int(1)),
            Op::Add,
            Op::Ret,
        ];
        assert_eq!(run(code, vec![], &[]).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_arguments() {
        let code = vec![Op::Arg(0), Op::Arg(1), Op::Sub, Op::Ret];
        let params = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            run(code, params, &[Value::Int(10), Value::Int(4)]).unwrap(),
            Value::Int(6)
        );
    }

    #[test]
    fn test_arity_checked() {
        let code = vec![Op::Arg(0), Op::Ret];
        let params = vec!["a".to_string()];
        assert!(matches!(
            run(code, params, &[]),
            Err(RuntimeError::Arity { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn test_branching() {
        // if (< a 10) 1 else 2
        let code = vec![
            Op::Arg(0),
            Op::Const(Value::Int(10)),
            Op::Lt,
            Op::JumpIfFalse(6),
            Op::Const(Value::Int(1)),
            Op::Jump(7),
            Op::Const(Value::Int(2)),
            Op::Ret,
        ];
        let params = vec!["a".to_string()];
        assert_eq!(
            run(code.clone(), params.clone(), &[Value::Int(5)]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            run(code, params, &[Value::Int(50)]).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn test_type_mismatch() {
        let code = vec![
            Op::Const(Value::Bool(true)),
            Op::Const(Value::Int(1)),
            Op::Add,
            Op::Ret,
        ];
        assert!(matches!(
            run(code, vec![], &[]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_ret_is_malformed() {
        let code = vec![Op::Const(Value::Int(1))];
        assert!(matches!(
            run(code, vec![], &[]),
            Err(RuntimeError::Malformed(_))
        ));
    }

    #[test]
    fn test_self_recursion_hits_depth_limit() {
        let code = vec![
            Op::Call {
                type_name: "test.T".to_string(),
                member: "m".to_string(),
                argc: 0,
            },
            Op::Ret,
        ];
        assert!(matches!(
            run(code, vec![], &[]),
            Err(RuntimeError::DepthLimit)
        ));
    }
}

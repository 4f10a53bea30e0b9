//! Moving arguments between the caller and the positional slots of an
//! invocation.
//!
//! Stack-only (`ByRefLike`) values cannot survive the untyped slots: they
//! are replaced by their type's default on the way in and on the way out.

use crate::contract::MethodSig;
use crate::error::CallError;
use crate::types::{ParamMode, TypeKind};
use crate::value::Value;

/// Copies caller arguments into invocation slots.
///
/// Out parameters start from their type's default whatever the caller
/// passed.
///
/// # Errors
///
/// Returns [`CallError::ArgumentCount`] when the argument count does not
/// match the signature.
pub fn to_positional(method: &MethodSig, args: &[Value]) -> Result<Vec<Value>, CallError> {
    check_arity(method, args.len())?;
    Ok(method
        .parameters()
        .iter()
        .zip(args)
        .map(|(param, arg)| match (param.mode(), param.ty().kind()) {
            (_, TypeKind::ByRefLike) | (ParamMode::Out, _) => param.ty().default_value(),
            _ => arg.clone(),
        })
        .collect())
}

/// Writes `Ref` and `Out` slots back to the caller. Read-only references
/// and by-value parameters are left alone.
pub fn copy_back(method: &MethodSig, slots: &[Value], args: &mut [Value]) {
    for ((param, slot), arg) in method.parameters().iter().zip(slots).zip(args.iter_mut()) {
        if !param.mode().copies_back() {
            continue;
        }
        *arg = match param.ty().kind() {
            TypeKind::ByRefLike => param.ty().default_value(),
            _ => slot.clone(),
        };
    }
}

/// Sets every out parameter to its type's default, for bodies that never
/// reach an implementation.
pub fn zero_fill_out(method: &MethodSig, args: &mut [Value]) {
    for (param, arg) in method.parameters().iter().zip(args.iter_mut()) {
        if param.mode() == ParamMode::Out {
            *arg = param.ty().default_value();
        }
    }
}

/// Checks a finished call's return value against the signature.
///
/// `void` and `Task` discard the value. A value type (or the result of a
/// `Task<T>` over one) that came back absent is a contract violation.
///
/// # Errors
///
/// Returns [`CallError::MissingReturnValue`] for an absent value-type result.
pub fn finish_return(method: &MethodSig, value: Value) -> Result<Value, CallError> {
    let ty = method.return_type();
    let ty = match ty.kind() {
        TypeKind::Void | TypeKind::Task => return Ok(Value::null()),
        TypeKind::TaskOf(inner) => inner.as_ref(),
        _ => ty,
    };
    match ty.kind() {
        TypeKind::ByRefLike => Ok(ty.default_value()),
        TypeKind::Value if value.is_null() => Err(CallError::MissingReturnValue {
            method: method.name().to_string(),
        }),
        _ => Ok(value),
    }
}

pub(crate) fn check_arity(method: &MethodSig, given: usize) -> Result<(), CallError> {
    let expected = method.parameters().len();
    if expected != given {
        return Err(CallError::ArgumentCount {
            method: method.name().to_string(),
            expected,
            actual: given,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Parameter, TypeRef};

    fn int() -> TypeRef {
        TypeRef::value_of::<i32>("int")
    }

    fn swap_sig() -> MethodSig {
        MethodSig::new("Swap")
            .param(Parameter::value("a", int()))
            .param(Parameter::by_ref("b", int()))
            .param(Parameter::out("c", int()))
            .param(Parameter::read_only("d", int()))
    }

    #[test]
    fn out_slots_start_from_the_default() {
        let args = [Value::of(1), Value::of(2), Value::of(3), Value::of(4)];
        let slots = to_positional(&swap_sig(), &args).unwrap();
        assert_eq!(slots[1].get::<i32>(), Some(&2));
        assert_eq!(slots[2].get::<i32>(), Some(&0));
        assert_eq!(slots[3].get::<i32>(), Some(&4));
    }

    #[test]
    fn arity_is_checked() {
        let err = to_positional(&swap_sig(), &[Value::of(1)]).unwrap_err();
        assert!(matches!(
            err,
            CallError::ArgumentCount { expected: 4, actual: 1, .. }
        ));
    }

    #[test]
    fn only_mutable_references_are_copied_back() {
        let slots = [Value::of(10), Value::of(20), Value::of(30), Value::of(40)];
        let mut args = [Value::of(1), Value::of(2), Value::of(3), Value::of(4)];
        copy_back(&swap_sig(), &slots, &mut args);
        let seen: Vec<i32> = args.iter().map(|v| *v.get::<i32>().unwrap()).collect();
        assert_eq!(seen, [1, 20, 30, 4]);
    }

    #[test]
    fn stack_only_values_become_defaults_both_ways() {
        let span = TypeRef::by_ref_like("Span<byte>");
        let sig = MethodSig::new("Fill").param(Parameter::by_ref("buffer", span));
        let slots = to_positional(&sig, &[Value::of(vec![1_u8])]).unwrap();
        assert!(slots[0].is_null());

        let mut args = [Value::of(vec![1_u8])];
        copy_back(&sig, &[Value::of(vec![9_u8])], &mut args);
        assert!(args[0].is_null());
    }

    #[test]
    fn zero_fill_touches_out_parameters_only() {
        let mut args = [Value::of(1), Value::of(2), Value::of(3), Value::of(4)];
        zero_fill_out(&swap_sig(), &mut args);
        assert_eq!(args[1].get::<i32>(), Some(&2));
        assert_eq!(args[2].get::<i32>(), Some(&0));
    }

    #[test]
    fn value_type_results_must_be_present() {
        let sig = MethodSig::new("Count").returns(int());
        assert!(matches!(
            finish_return(&sig, Value::null()),
            Err(CallError::MissingReturnValue { .. })
        ));
        assert!(finish_return(&sig, Value::of(3)).is_ok());

        let nullable = MethodSig::new("Find").returns(TypeRef::nullable("int?"));
        assert!(finish_return(&nullable, Value::null()).is_ok());

        let task = MethodSig::new("CountAsync").returns(TypeRef::task_of(int()));
        assert!(matches!(
            finish_return(&task, Value::null()),
            Err(CallError::MissingReturnValue { .. })
        ));

        let void = MethodSig::new("Reset");
        assert!(finish_return(&void, Value::of(1)).unwrap().is_null());
    }
}

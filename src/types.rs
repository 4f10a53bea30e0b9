//! Descriptions of parameter and return types.
//!
//! The engine never inspects real Rust types. Every proxied surface is
//! described by value, and a [`TypeRef`] carries just what interception
//! needs: a name for identity, a kind that decides marshalling, and a way to
//! produce the type's default value.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::value::Value;

/// Produces the default value of a value type.
pub type DefaultFn = fn() -> Value;

fn default_of<T: Default + Any + Send + Sync>() -> Value {
    Value::of(T::default())
}

/// How a type behaves when it crosses the untyped argument representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// No value (return types only)
    Void,
    /// A nullable reference
    Reference,
    /// A value type: never absent, defaults to its zero value
    Value,
    /// A value type that may be absent
    Nullable,
    /// A stack-only type that cannot survive boxing
    ByRefLike,
    /// The n-th generic parameter of the declaring operation
    Generic(usize),
    /// A task without a result
    Task,
    /// A task producing the inner type
    TaskOf(Box<TypeRef>),
}

/// A parameter or return type.
#[derive(Clone)]
pub struct TypeRef {
    name: Arc<str>,
    kind: TypeKind,
    default: Option<DefaultFn>,
}

impl TypeRef {
    fn new(name: impl Into<Arc<str>>, kind: TypeKind, default: Option<DefaultFn>) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
        }
    }

    /// The `void` return type.
    pub fn void() -> Self {
        Self::new("void", TypeKind::Void, None)
    }

    /// A nullable reference type.
    pub fn reference(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, TypeKind::Reference, None)
    }

    /// A value type whose default is `T::default()`.
    ///
    /// ```
    /// use proxy_core::TypeRef;
    ///
    /// let int = TypeRef::value_of::<i32>("int");
    /// assert_eq!(int.default_value().get::<i32>(), Some(&0));
    /// ```
    pub fn value_of<T: Default + Any + Send + Sync>(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, TypeKind::Value, Some(default_of::<T>))
    }

    /// A value type with an explicit default factory.
    pub fn value_with(name: impl Into<Arc<str>>, default: DefaultFn) -> Self {
        Self::new(name, TypeKind::Value, Some(default))
    }

    /// A value type that may be absent.
    pub fn nullable(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, TypeKind::Nullable, None)
    }

    /// A stack-only type; its values are replaced by defaults when marshalled.
    pub fn by_ref_like(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, TypeKind::ByRefLike, None)
    }

    /// The generic parameter at `index`, displayed as `name`.
    pub fn generic(index: usize, name: impl Into<Arc<str>>) -> Self {
        Self::new(name, TypeKind::Generic(index), None)
    }

    /// A task without a result.
    pub fn task() -> Self {
        Self::new("Task", TypeKind::Task, None)
    }

    /// A task producing `result`.
    pub fn task_of(result: TypeRef) -> Self {
        let name = format!("Task<{}>", result.name);
        Self::new(name, TypeKind::TaskOf(Box::new(result)), None)
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type kind.
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Returns true for `void`.
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    /// Returns true for value types that can never be absent.
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Value | TypeKind::ByRefLike)
    }

    /// Returns true for types that can be stored in a [`Value`].
    pub fn is_representable(&self) -> bool {
        !matches!(self.kind, TypeKind::ByRefLike)
    }

    /// Returns true for `Task` and `Task<T>`.
    pub fn is_task(&self) -> bool {
        matches!(self.kind, TypeKind::Task | TypeKind::TaskOf(_))
    }

    /// Returns the result type of `Task<T>`.
    pub fn task_result(&self) -> Option<&TypeRef> {
        match &self.kind {
            TypeKind::TaskOf(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns true if the type mentions a generic parameter.
    pub fn is_open(&self) -> bool {
        match &self.kind {
            TypeKind::Generic(_) => true,
            TypeKind::TaskOf(inner) => inner.is_open(),
            _ => false,
        }
    }

    /// The value a slot of this type holds when nothing was provided.
    pub fn default_value(&self) -> Value {
        match (&self.kind, self.default) {
            (TypeKind::Value, Some(default)) => default(),
            _ => Value::null(),
        }
    }

    /// Replaces generic parameters with the given type arguments.
    ///
    /// Parameters without a matching argument are left open.
    pub fn substitute(&self, type_args: &[TypeRef]) -> TypeRef {
        match &self.kind {
            TypeKind::Generic(index) => type_args
                .get(*index)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeKind::TaskOf(inner) => TypeRef::task_of(inner.substitute(type_args)),
            _ => self.clone(),
        }
    }
}

// Generic parameters compare by position so that `Find<T>(T)` and
// `Find<U>(U)` describe the same signature.
impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Generic(a), TypeKind::Generic(b)) => a == b,
            (a, b) => a == b && self.name == other.name,
        }
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.kind {
            TypeKind::Generic(index) => {
                0u8.hash(state);
                index.hash(state);
            }
            kind => {
                1u8.hash(state);
                kind.hash(state);
                self.name.hash(state);
            }
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// How an argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamMode {
    /// Copied in, never written back
    ByValue,
    /// Mutable reference: copied in and written back
    Ref,
    /// Output reference: starts as the default and is written back
    Out,
    /// Read-only reference: copied in only
    In,
}

impl ParamMode {
    /// Returns true for every by-reference mode.
    pub fn is_by_ref(self) -> bool {
        !matches!(self, ParamMode::ByValue)
    }

    /// Returns true for the modes whose slot is copied back to the caller.
    pub fn copies_back(self) -> bool {
        matches!(self, ParamMode::Ref | ParamMode::Out)
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    name: Arc<str>,
    ty: TypeRef,
    mode: ParamMode,
}

impl Parameter {
    /// A by-value parameter.
    pub fn value(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            mode: ParamMode::ByValue,
        }
    }

    /// A mutable by-reference parameter.
    pub fn by_ref(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            mode: ParamMode::Ref,
            ..Self::value(name, ty)
        }
    }

    /// An output parameter.
    pub fn out(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            mode: ParamMode::Out,
            ..Self::value(name, ty)
        }
    }

    /// A read-only reference parameter.
    pub fn read_only(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            mode: ParamMode::In,
            ..Self::value(name, ty)
        }
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Returns the passing mode.
    pub fn mode(&self) -> ParamMode {
        self.mode
    }

    pub(crate) fn substitute(&self, type_args: &[TypeRef]) -> Parameter {
        Parameter {
            name: Arc::clone(&self.name),
            ty: self.ty.substitute(type_args),
            mode: self.mode,
        }
    }
}

/// A constraint on a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// The argument must be a value type
    ValueType,
    /// The argument must be a reference type
    ReferenceType,
}

impl Constraint {
    /// Returns true if `ty` satisfies the constraint.
    pub fn admits(self, ty: &TypeRef) -> bool {
        match self {
            Constraint::ValueType => ty.is_value_type(),
            Constraint::ReferenceType => {
                matches!(ty.kind(), TypeKind::Reference | TypeKind::Nullable)
            }
        }
    }
}

/// A generic parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericParam {
    name: Arc<str>,
    constraints: Vec<Constraint>,
}

impl GenericParam {
    /// An unconstrained generic parameter.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint.
    pub fn constrained(mut self, constraint: Constraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the constraints.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns true if `ty` satisfies every constraint.
    pub fn admits(&self, ty: &TypeRef) -> bool {
        self.constraints.iter().all(|c| c.admits(ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_types_default_to_zero() {
        let ty = TypeRef::value_of::<u8>("byte");
        assert!(ty.is_value_type());
        assert_eq!(ty.default_value().get::<u8>(), Some(&0));
        assert!(TypeRef::reference("string").default_value().is_null());
    }

    #[test]
    fn generic_parameters_compare_by_position() {
        assert_eq!(TypeRef::generic(0, "T"), TypeRef::generic(0, "U"));
        assert_ne!(TypeRef::generic(0, "T"), TypeRef::generic(1, "T"));
        assert_ne!(TypeRef::reference("T"), TypeRef::generic(0, "T"));
    }

    #[test]
    fn substitution_closes_nested_tasks() {
        let open = TypeRef::task_of(TypeRef::generic(0, "T"));
        assert!(open.is_open());

        let closed = open.substitute(&[TypeRef::value_of::<i64>("long")]);
        assert!(!closed.is_open());
        assert_eq!(closed.name(), "Task<long>");
        assert_eq!(closed.task_result().map(TypeRef::name), Some("long"));
    }

    #[test]
    fn only_ref_and_out_copy_back() {
        assert!(ParamMode::Ref.copies_back());
        assert!(ParamMode::Out.copies_back());
        assert!(!ParamMode::In.copies_back());
        assert!(ParamMode::In.is_by_ref());
        assert!(!ParamMode::ByValue.is_by_ref());
    }

    #[test]
    fn constraints_filter_type_arguments() {
        let param = GenericParam::new("T").constrained(Constraint::ValueType);
        assert!(param.admits(&TypeRef::value_of::<i32>("int")));
        assert!(!param.admits(&TypeRef::reference("string")));
    }
}

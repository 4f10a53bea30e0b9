//! Untyped argument and return slots.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A shared, type-erased object: a target, a mixin or a base state.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// One untyped positional slot: an argument, a by-reference cell or a
/// return value.
///
/// `Value` is nullable and cheap to clone. Typed code converts in and out
/// with [`Value::of`] and [`Value::get`].
///
/// # Examples
///
/// ```
/// use proxy_core::Value;
///
/// let v = Value::of(42_i32);
/// assert_eq!(v.get::<i32>(), Some(&42));
/// assert!(v.get::<String>().is_none());
/// assert!(Value::null().is_null());
/// ```
#[derive(Clone, Default)]
pub struct Value {
    inner: Option<Instance>,
    type_name: Option<&'static str>,
}

impl Value {
    /// Boxes a value into a slot.
    pub fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
            type_name: Some(std::any::type_name::<T>()),
        }
    }

    /// The absent value.
    pub fn null() -> Self {
        Self::default()
    }

    /// Wraps an already shared instance without re-boxing it.
    pub fn from_instance(instance: Instance) -> Self {
        Self {
            inner: Some(instance),
            type_name: None,
        }
    }

    /// Returns true if the slot holds nothing.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Borrows the content as `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.inner.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Clones the content out as `T`.
    pub fn cloned<T: Any + Clone>(&self) -> Option<T> {
        self.get::<T>().cloned()
    }

    /// Returns true if the slot holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Returns the shared instance behind the slot.
    pub fn as_instance(&self) -> Option<&Instance> {
        self.inner.as_ref()
    }

    /// Returns true if both slots share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.inner, self.type_name) {
            (None, _) => write!(f, "Value(null)"),
            (Some(_), Some(name)) => write!(f, "Value({})", name),
            (Some(_), None) => write!(f, "Value(<instance>)"),
        }
    }
}

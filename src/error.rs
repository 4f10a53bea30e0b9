use std::fmt;
use std::sync::Arc;

/// Errors that can occur in the proxy engine.
///
/// Generation errors abort a single synthesis request and never reach the
/// type cache. Instantiation errors reject the arguments used to bind a
/// synthesized type. Call errors surface while an operation runs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A proxy type could not be synthesized
    #[error("proxy generation failed: {0}")]
    Generation(#[from] GenerationError),
    /// A synthesized type could not be bound to the given instances
    #[error("proxy instantiation failed: {0}")]
    Instantiation(#[from] InstantiationError),
    /// A proxied operation failed
    #[error("proxied call failed: {0}")]
    Call(#[from] CallError),
}

/// Why a type was rejected as the base of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseTypeDefect {
    /// The type is sealed and cannot be extended
    Sealed,
    /// The type already implements the proxy target accessor contract
    AlreadyProxy,
    /// The type has no parameterless constructor visible to proxies
    NoAccessibleConstructor,
}

impl fmt::Display for BaseTypeDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseTypeDefect::Sealed => write!(f, "it is sealed"),
            BaseTypeDefect::AlreadyProxy => write!(f, "it is already a proxy type"),
            BaseTypeDefect::NoAccessibleConstructor => {
                write!(f, "it does not have an accessible parameterless constructor")
            }
        }
    }
}

/// Fatal errors raised while synthesizing a proxy type.
///
/// None of these are retried automatically; the cache stays untouched so a
/// corrected request can succeed later.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The base class (or base type for contract proxies) cannot be extended
    #[error(
        "type `{type_name}` is not a valid base type for a proxy, because {reason}; only a non-sealed class with a non-private parameterless constructor can be used"
    )]
    InvalidBaseType {
        /// Name of the rejected type
        type_name: String,
        /// The defect that disqualified it
        reason: BaseTypeDefect,
    },
    /// Two members with the same identity could not be told apart
    #[error("duplicate member `{member}` in proxy `{proxy}`")]
    DuplicateMember {
        /// The proxy type being generated
        proxy: String,
        /// The colliding member, after qualification if any was attempted
        member: String,
    },
    /// The contract set or the options are inconsistent
    #[error("malformed proxy request: {0}")]
    MalformedRequest(String),
    /// Two mixins claim the same contract
    #[error("mixins `{first}` and `{second}` both implement contract `{contract}`")]
    MixinCollision {
        /// The contract claimed twice
        contract: String,
        /// The mixin type that claimed it first
        first: String,
        /// The mixin type that claimed it again
        second: String,
    },
    /// A task-returning operation declares by-reference parameters
    #[error("async operation `{method}` cannot take out/ref arguments")]
    ByRefInAsync {
        /// The offending operation
        method: String,
    },
    /// The target type offers no implementation for a forwarded operation
    #[error("type `{target}` has no implementation for `{contract}.{method}`")]
    UnresolvedImplementation {
        /// The concrete target type
        target: String,
        /// The contract declaring the operation
        contract: String,
        /// The operation name
        method: String,
    },
}

/// Errors raised when binding a synthesized type to live instances.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstantiationError {
    /// The supplied target does not have the type the proxy was built for
    #[error("proxy `{proxy}` expects a target of type `{expected}`, got `{actual}`")]
    TargetType {
        /// The proxy type
        proxy: String,
        /// The type (or contract) the target slot is declared as
        expected: String,
        /// The type of the supplied target
        actual: String,
    },
    /// The proxy strategy has no target slot
    #[error("proxy `{proxy}` does not hold a target")]
    TargetNotAccepted {
        /// The proxy type
        proxy: String,
    },
    /// A mixin slot has no instance to bind
    #[error("proxy `{proxy}` has no mixin instance for contract `{contract}`")]
    MissingMixin {
        /// The proxy type
        proxy: String,
        /// The contract whose mixin is missing
        contract: String,
    },
    /// The base type cannot construct its state
    #[error("base type `{type_name}` has no constructor")]
    NoConstructor {
        /// The base type
        type_name: String,
    },
}

/// Errors raised while a proxied operation runs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// The call reached the forwarding step with nothing to forward to
    #[error(
        "no target to forward `{method}` to; interceptors must not call proceed for operations without a target"
    )]
    NoTarget {
        /// The operation that reached the forwarding step
        method: String,
    },
    /// The bound target does not implement the operation
    #[error("target `{target}` does not implement `{method}`")]
    Unimplemented {
        /// The current target type
        target: String,
        /// The operation
        method: String,
    },
    /// A value-type operation finished without a return value
    #[error(
        "interceptors failed to set a return value for `{method}`, or swallowed the error raised by the target"
    )]
    MissingReturnValue {
        /// The operation
        method: String,
    },
    /// A replacement target does not fit the target slot
    #[error("target of type `{actual}` is not compatible with `{expected}`")]
    IncompatibleTarget {
        /// The declared slot type
        expected: String,
        /// The type of the replacement
        actual: String,
    },
    /// The target of this proxy cannot be replaced
    #[error("the target of `{method}` cannot be changed on this proxy")]
    TargetNotChangeable {
        /// The operation (or infrastructure member) that attempted the change
        method: String,
    },
    /// No member with this name exists
    #[error("proxy has no member named `{name}`")]
    UnknownMember {
        /// The requested name
        name: String,
    },
    /// More than one overload matches
    #[error("member `{name}` is ambiguous for {arity} argument(s)")]
    AmbiguousMember {
        /// The requested name
        name: String,
        /// The argument count used to resolve it
        arity: usize,
    },
    /// The caller passed the wrong number of arguments
    #[error("`{method}` takes {expected} argument(s), {actual} given")]
    ArgumentCount {
        /// The operation
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },
    /// An interceptor addressed an argument slot the operation does not have
    #[error("`{method}` has no argument at index {index} ({count} declared)")]
    ArgumentIndex {
        /// The operation
        method: String,
        /// The requested slot
        index: usize,
        /// Declared parameter count
        count: usize,
    },
    /// The caller passed the wrong number of type arguments
    #[error("`{method}` takes {expected} type argument(s), {actual} given")]
    GenericArity {
        /// The operation
        method: String,
        /// Declared generic parameter count
        expected: usize,
        /// Supplied type argument count
        actual: usize,
    },
    /// A type argument violates a generic constraint
    #[error("type `{argument}` does not satisfy the constraints of `{parameter}` on `{method}`")]
    GenericConstraint {
        /// The operation
        method: String,
        /// The generic parameter
        parameter: String,
        /// The rejected type argument
        argument: String,
    },
    /// A sync call reached an async operation, or the reverse
    #[error("`{method}` must be invoked {expected}")]
    AsyncMismatch {
        /// The operation
        method: String,
        /// `"synchronously"` or `"asynchronously"`
        expected: &'static str,
    },
    /// An implementation received an instance of an unexpected type
    #[error("instance is not a `{expected}`")]
    InstanceType {
        /// The Rust type the implementation expected
        expected: &'static str,
    },
    /// An interceptor or the real implementation raised an error
    #[error("{0}")]
    Raised(Arc<dyn std::error::Error + Send + Sync>),
}

impl CallError {
    /// Wraps an application error raised by an interceptor or a target.
    pub fn raised(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        CallError::Raised(Arc::new(error))
    }

    /// Raises a plain message, for interceptors that have no error type of their own.
    pub fn fault(message: impl Into<String>) -> Self {
        CallError::Raised(Arc::new(Fault(message.into())))
    }

    /// Returns the raised application error, if this is one.
    pub fn as_raised(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        match self {
            CallError::Raised(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// A message-only error raised through [`CallError::fault`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Fault(pub String);

/// Result alias used across the public API.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_type_defect_reads_like_a_reason() {
        let err = GenerationError::InvalidBaseType {
            type_name: "Sealed".to_string(),
            reason: BaseTypeDefect::Sealed,
        };
        let msg = err.to_string();
        assert!(msg.contains("`Sealed`"));
        assert!(msg.contains("because it is sealed"));
    }

    #[test]
    fn fault_round_trips_its_message() {
        let err = CallError::fault("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.as_raised().map(|e| e.to_string()), Some("boom".to_string()));
    }

    #[test]
    fn top_level_error_wraps_each_layer() {
        let err: Error = CallError::NoTarget {
            method: "Run".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Call(CallError::NoTarget { .. })));

        let err: Error = GenerationError::MalformedRequest("x".to_string()).into();
        assert!(err.to_string().starts_with("proxy generation failed"));
    }
}

//! Interceptors: the code a proxy runs around every intercepted call.

use futures::future::BoxFuture;

use crate::error::CallError;
use crate::invocation::Invocation;

/// Code run around an intercepted operation.
///
/// An interceptor may inspect the call, rewrite arguments (by-reference
/// slots included), set a return value, call [`Invocation::proceed`] any
/// number of times, or fail. Whatever it leaves in the invocation is what the
/// caller observes.
///
/// # Examples
///
/// ```
/// use proxy_core::{CallError, Interceptor, Invocation, Value};
///
/// struct Doubler;
///
/// impl Interceptor for Doubler {
///     fn intercept(&self, invocation: &mut Invocation) -> Result<(), CallError> {
///         invocation.proceed()?;
///         let doubled = invocation.return_value().get::<i32>().map(|v| v * 2);
///         if let Some(v) = doubled {
///             invocation.set_return_value(Value::of(v));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync {
    /// Intercepts a synchronous operation.
    fn intercept(&self, invocation: &mut Invocation) -> Result<(), CallError>;

    /// Intercepts a task-returning operation.
    ///
    /// The default runs [`intercept`](Self::intercept). Each
    /// [`Invocation::proceed`] it makes continues the chain asynchronously
    /// once it has returned, so it sees the operation's result only through
    /// a value it sets itself. Override this to await the rest of the chain.
    fn intercept_async<'a>(
        &'a self,
        invocation: &'a mut Invocation,
    ) -> BoxFuture<'a, Result<(), CallError>> {
        Box::pin(async move {
            let outer = invocation.defer_proceeds();
            let outcome = self.intercept(invocation);
            let recorded = invocation.finish_deferred(outer);
            outcome?;
            invocation.run_recorded(recorded).await
        })
    }
}

impl<F> Interceptor for F
where
    F: Fn(&mut Invocation) -> Result<(), CallError> + Send + Sync,
{
    fn intercept(&self, invocation: &mut Invocation) -> Result<(), CallError> {
        self(invocation)
    }
}

/// The steps of a [`StandardInterceptor`].
pub trait InterceptionSteps: Send + Sync {
    /// Runs before the call proceeds.
    fn pre_proceed(&self, invocation: &mut Invocation) -> Result<(), CallError> {
        let _ = invocation;
        Ok(())
    }

    /// Proceeds with the call.
    fn perform_proceed(&self, invocation: &mut Invocation) -> Result<(), CallError> {
        invocation.proceed()
    }

    /// Runs after the call proceeded successfully.
    fn post_proceed(&self, invocation: &mut Invocation) -> Result<(), CallError> {
        let _ = invocation;
        Ok(())
    }
}

/// An interceptor made of overridable pre, perform and post steps.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use proxy_core::{CallError, InterceptionSteps, Invocation, StandardInterceptor};
///
/// #[derive(Default)]
/// struct CountCalls(AtomicUsize);
///
/// impl InterceptionSteps for CountCalls {
///     fn pre_proceed(&self, _: &mut Invocation) -> Result<(), CallError> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let counter = StandardInterceptor::new(CountCalls::default());
/// assert_eq!(counter.steps().0.load(Ordering::SeqCst), 0);
/// ```
#[derive(Debug, Default)]
pub struct StandardInterceptor<S> {
    steps: S,
}

impl<S: InterceptionSteps> StandardInterceptor<S> {
    /// Wraps the steps.
    pub fn new(steps: S) -> Self {
        Self { steps }
    }

    /// Returns the steps.
    pub fn steps(&self) -> &S {
        &self.steps
    }
}

impl<S: InterceptionSteps> Interceptor for StandardInterceptor<S> {
    fn intercept(&self, invocation: &mut Invocation) -> Result<(), CallError> {
        self.steps.pre_proceed(invocation)?;
        self.steps.perform_proceed(invocation)?;
        self.steps.post_proceed(invocation)
    }
}

//! The run-time call context handed to interceptors.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::class::Target;
use crate::contract::MethodSig;
use crate::error::CallError;
use crate::generator::InvocationType;
use crate::interceptor::Interceptor;
use crate::proxy::Proxy;
use crate::types::TypeRef;
use crate::value::Value;

/// One intercepted call in progress.
///
/// An invocation owns the argument slots, the return value and a cursor
/// into the interceptor chain. It is created by the proxy for a single call
/// and dropped when the call returns.
pub struct Invocation {
    ty: Arc<InvocationType>,
    target: Option<Target>,
    proxy: Proxy,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    method: MethodSig,
    arguments: Vec<Value>,
    generic_arguments: Vec<TypeRef>,
    cursor: usize,
    return_value: Value,
    deferred: Option<DeferredProceed>,
}

/// Proceeds requested by a synchronous interceptor on a task-returning
/// operation. They run once the interceptor has returned.
#[derive(Debug, Default)]
pub(crate) struct DeferredProceed {
    proceeds: usize,
    replaced: Option<Value>,
}

impl Invocation {
    pub(crate) fn new(
        target: Option<Target>,
        proxy: Proxy,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        ty: Arc<InvocationType>,
        arguments: Vec<Value>,
    ) -> Self {
        let method = ty.method().clone();
        Self {
            ty,
            target,
            proxy,
            interceptors,
            method,
            arguments,
            generic_arguments: Vec::new(),
            cursor: 0,
            return_value: Value::null(),
            deferred: None,
        }
    }

    /// Closes the invocation over the call's type arguments.
    pub(crate) fn bind_generic_arguments(&mut self, type_args: &[TypeRef]) {
        self.method = self.ty.method().substitute(type_args);
        self.generic_arguments = type_args.to_vec();
    }

    /// Returns the operation, closed over the call's type arguments.
    pub fn method(&self) -> &MethodSig {
        &self.method
    }

    /// Returns the call-context type of the operation.
    pub fn invocation_type(&self) -> &InvocationType {
        &self.ty
    }

    /// Returns the name of this call's closed call-context type.
    pub fn invocation_type_name(&self) -> String {
        self.ty.closed_name(&self.generic_arguments)
    }

    /// Returns the argument slots.
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Returns one argument slot.
    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    /// Replaces an argument slot. By-reference slots written here are copied
    /// back to the caller when the call returns.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::ArgumentIndex`] if the operation has no slot at
    /// `index`.
    pub fn set_argument(&mut self, index: usize, value: Value) -> Result<(), CallError> {
        let count = self.arguments.len();
        if index >= count {
            return Err(CallError::ArgumentIndex {
                method: self.ty.member().to_string(),
                index,
                count,
            });
        }
        self.arguments[index] = value;
        Ok(())
    }

    /// Returns the type arguments of a generic operation.
    pub fn generic_arguments(&self) -> &[TypeRef] {
        &self.generic_arguments
    }

    /// Returns the current return value.
    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    /// Sets the value returned to the caller.
    pub fn set_return_value(&mut self, value: Value) {
        if let Some(deferred) = self.deferred.as_mut().filter(|d| d.proceeds > 0) {
            deferred.replaced = Some(value.clone());
        }
        self.return_value = value;
    }

    /// Returns the proxy the call was made on.
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Returns the object the call will be forwarded to.
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Returns the class of the current target.
    pub fn target_type(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.ty().name())
    }

    fn mismatch(&self, expected: &'static str) -> CallError {
        CallError::AsyncMismatch {
            method: self.ty.member().to_string(),
            expected,
        }
    }

    /// Runs the next interceptor, or the real implementation once every
    /// interceptor has proceeded.
    ///
    /// Interceptors may call this any number of times; each call resumes
    /// from the interceptor's own position in the chain.
    ///
    /// On a task-returning operation, a synchronous interceptor's proceed
    /// is recorded and runs after [`Interceptor::intercept`] returns. A
    /// return value it sets after proceeding replaces the operation's result.
    ///
    /// # Errors
    ///
    /// Returns whatever the rest of the chain or the implementation fails
    /// with, and [`CallError::NoTarget`] when there is nothing to forward
    /// to. Task-returning operations fail with [`CallError::AsyncMismatch`]
    /// outside a synchronous interceptor.
    pub fn proceed(&mut self) -> Result<(), CallError> {
        if self.ty.is_async() {
            let Some(deferred) = self.deferred.as_mut() else {
                return Err(self.mismatch("asynchronously"));
            };
            deferred.proceeds += 1;
            deferred.replaced = None;
            return Ok(());
        }
        match self.interceptors.get(self.cursor).cloned() {
            Some(interceptor) => {
                self.cursor += 1;
                let result = interceptor.intercept(self);
                self.cursor -= 1;
                result
            }
            None => self.dispatch(),
        }
    }

    /// Asynchronous counterpart of [`proceed`](Self::proceed) for
    /// task-returning operations.
    pub fn proceed_async(&mut self) -> BoxFuture<'_, Result<(), CallError>> {
        Box::pin(async move {
            if !self.ty.is_async() {
                return Err(self.mismatch("synchronously"));
            }
            match self.interceptors.get(self.cursor).cloned() {
                Some(interceptor) => {
                    self.cursor += 1;
                    let result = interceptor.intercept_async(self).await;
                    self.cursor -= 1;
                    result
                }
                None => self.dispatch_async().await,
            }
        })
    }

    /// Starts recording proceeds for a synchronous interceptor, returning
    /// the recording of any interceptor further out.
    pub(crate) fn defer_proceeds(&mut self) -> Option<DeferredProceed> {
        self.deferred.replace(DeferredProceed::default())
    }

    /// Stops recording, restoring the recording of the interceptor further
    /// out, and returns what was recorded.
    pub(crate) fn finish_deferred(&mut self, outer: Option<DeferredProceed>) -> DeferredProceed {
        std::mem::replace(&mut self.deferred, outer).unwrap_or_default()
    }

    /// Runs recorded proceeds against the rest of the chain.
    pub(crate) fn run_recorded(
        &mut self,
        recorded: DeferredProceed,
    ) -> BoxFuture<'_, Result<(), CallError>> {
        Box::pin(async move {
            for _ in 0..recorded.proceeds {
                self.proceed_async().await?;
            }
            if let Some(value) = recorded.replaced {
                self.return_value = value;
            }
            Ok(())
        })
    }

    fn dispatch(&mut self) -> Result<(), CallError> {
        let implementation = self
            .ty
            .resolve(self.target.as_ref(), self.proxy.locator())?;
        let Some(target) = self.target.as_ref() else {
            return Err(CallError::NoTarget {
                method: self.ty.member().to_string(),
            });
        };
        let instance = Arc::clone(target.instance());
        if implementation.is_async() {
            return Err(self.mismatch("asynchronously"));
        }
        self.return_value =
            implementation.call(&instance, &mut self.arguments, &self.generic_arguments)?;
        Ok(())
    }

    async fn dispatch_async(&mut self) -> Result<(), CallError> {
        let implementation = self
            .ty
            .resolve(self.target.as_ref(), self.proxy.locator())?;
        let Some(target) = self.target.as_ref() else {
            return Err(CallError::NoTarget {
                method: self.ty.member().to_string(),
            });
        };
        let pending = implementation.call_async(
            Arc::clone(target.instance()),
            self.arguments.clone(),
            self.generic_arguments.clone(),
        );
        self.return_value = pending.await?;
        Ok(())
    }

    /// Redirects the rest of this call to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::TargetNotChangeable`] unless the proxy has a
    /// swappable target, and [`CallError::IncompatibleTarget`] when `target`
    /// does not implement the target slot's contract.
    pub fn change_invocation_target(&mut self, target: Target) -> Result<(), CallError> {
        let Some(contract) = self.ty.target_contract() else {
            return Err(CallError::TargetNotChangeable {
                method: self.ty.member().to_string(),
            });
        };
        if !target.ty().implements(contract.name()) {
            return Err(CallError::IncompatibleTarget {
                expected: contract.name().to_string(),
                actual: target.ty().name().to_string(),
            });
        }
        self.target = Some(target);
        Ok(())
    }

    /// Redirects this call and every later call on the proxy to `target`.
    ///
    /// # Errors
    ///
    /// Same as [`change_invocation_target`](Self::change_invocation_target).
    pub fn change_proxy_target(&mut self, target: Target) -> Result<(), CallError> {
        self.change_invocation_target(target.clone())?;
        self.proxy.replace_target(Some(target));
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Value) {
        (self.arguments, self.return_value)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("type", &self.invocation_type_name())
            .field("target", &self.target)
            .field("arguments", &self.arguments)
            .field("cursor", &self.cursor)
            .field("return_value", &self.return_value)
            .finish()
    }
}

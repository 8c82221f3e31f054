//! Hooks and hook chains
//!
//! A hook is a named command object run before a stack is deployed or
//! destroyed. It holds only the inputs it needs; anything stack-scoped
//! (the stack's own variables, stacks earlier in dependency order) reaches it
//! through [`HookContext`].
//!
//! A [`HookChain`] runs hooks strictly in registration order and stops at the
//! first failure.

use crate::error::HookError;
use crate::kind::AnyStack;
use crate::stack::{StackName, Variables};
use std::fmt;
use std::sync::Arc;

/// A single fallible pre-deploy or pre-destroy operation
#[async_trait::async_trait]
pub trait Hook: Send + Sync {
    /// Identity used in logs and error reports
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError>;
}

/// What a running hook may see and touch
pub struct HookContext<'a> {
    stack: StackName,
    variables: &'a mut Variables,
    prior: &'a mut [AnyStack],
}

impl<'a> HookContext<'a> {
    pub fn new(stack: StackName, variables: &'a mut Variables, prior: &'a mut [AnyStack]) -> Self {
        Self {
            stack,
            variables,
            prior,
        }
    }

    /// Stack whose chain is running
    #[inline]
    #[must_use]
    pub fn stack_name(&self) -> StackName {
        self.stack
    }

    #[must_use]
    pub fn variables(&self) -> &Variables {
        self.variables
    }

    /// Publish an output variable of the running stack
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Resolve a stack earlier in dependency order
    ///
    /// # Errors
    /// Returns `HookError::Configuration` if no such stack precedes this one
    pub fn resolve(&mut self, name: StackName) -> Result<&mut AnyStack, HookError> {
        let current = self.stack;
        self.prior
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| {
                HookError::Configuration(format!(
                    "stack {current} depends on stack {name}, which is not deployed before it"
                ))
            })
    }
}

/// Ordered, fail-fast sequence of hooks
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hook names in execution order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|h| h.name())
    }

    /// Run every hook in order, returning the first failure with its hook name
    ///
    /// # Errors
    /// `(hook name, cause)` of the first hook that failed
    pub async fn run(&self, ctx: &mut HookContext<'_>) -> Result<(), (String, HookError)> {
        for hook in &self.hooks {
            tracing::debug!(stack = %ctx.stack_name(), hook = hook.name(), "running hook");
            hook.run(ctx)
                .await
                .map_err(|e| (hook.name().to_string(), e))?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

type HookFn = dyn Fn(&mut HookContext<'_>) -> Result<(), HookError> + Send + Sync;

/// Hook backed by a synchronous closure
pub struct FnHook {
    name: String,
    f: Box<HookFn>,
}

impl FnHook {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

#[async_trait::async_trait]
impl Hook for FnHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        (self.f)(ctx)
    }
}

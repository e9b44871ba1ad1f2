//! # Checked Callables
//!
//! [`TypeChecked`] wraps a callable body so that every call is bound,
//! validated, invoked, and return-checked, in that order:
//!
//! 1. Snapshot the configuration and build a fresh [`ValidationContext`].
//! 2. Bind arguments to parameters, then validate each typed parameter.
//!    On failure the body is never invoked.
//! 3. Invoke the body. A suspending body is awaited to completion; all
//!    suspension happens inside the body, never inside validation.
//! 4. Validate the result against the declared return type, or fail under
//!    strict return mode if none is declared.
//! 5. Return the body's result unchanged.
//!
//! Errors raised by the body pass through untouched as
//! [`CallError::Raised`], except for type-check failures from lazily
//! validated producers, which surface as [`CallError::TypeCheck`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use typecheck_core::{DescriptorInterner, ErrorKind, Site, TypeCheckError, Value, Violation};

use crate::binder::{bind, validate_arguments, Args, BoundArguments};
use crate::config::ConfigStore;
use crate::context::ValidationContext;
use crate::matcher;
use crate::namespace::Namespace;
use crate::registry::ValidatorRegistry;
use crate::signature::{CallableSpec, Signature};

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Future returned by a suspending body.
pub type BodyFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

type ImmediateFn = dyn Fn(BoundArguments) -> anyhow::Result<Value> + Send + Sync;
type SuspendingFn = dyn Fn(BoundArguments) -> BodyFuture + Send + Sync;

/// The callable being wrapped.
#[derive(Clone)]
pub enum Body {
    /// Returns its result directly.
    Immediate(Arc<ImmediateFn>),
    /// Returns a future that must be awaited.
    Suspending(Arc<SuspendingFn>),
}

impl Body {
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(BoundArguments) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Body::Immediate(Arc::new(f))
    }

    pub fn suspending<F, Fut>(f: F) -> Self
    where
        F: Fn(BoundArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Body::Suspending(Arc::new(move |args| Box::pin(f(args)) as BodyFuture))
    }

    pub fn is_suspending(&self) -> bool {
        matches!(self, Body::Suspending(_))
    }

    async fn invoke(&self, args: BoundArguments) -> anyhow::Result<Value> {
        match self {
            Body::Immediate(f) => f(args),
            Body::Suspending(f) => f(args).await,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Immediate(_) => f.write_str("Body::Immediate(..)"),
            Body::Suspending(_) => f.write_str("Body::Suspending(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Options and errors
// ---------------------------------------------------------------------------

/// Per-wrapper options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Skip validation entirely; the body is called directly.
    pub ignore: bool,
    /// Class mode: only these members are checked. `None` means all.
    pub include: Option<Vec<String>>,
    /// Class mode: these members are never checked. Wins over `include`.
    pub exclude: Vec<String>,
    /// Element sample count, overriding the configured `sample_size`.
    pub sample: Option<usize>,
    /// Force (or forbid) full-collection validation.
    pub deep: Option<bool>,
}

impl CheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn include<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(members.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn sample(mut self, sample: usize) -> Self {
        self.sample = Some(sample);
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = Some(deep);
        self
    }

    /// Whether a class member passes the include/exclude filters.
    pub fn selects(&self, member: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == member));
        included && !self.exclude.iter().any(|n| n == member)
    }
}

/// Outcome of a failed wrapped call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Validation failed.
    #[error(transparent)]
    TypeCheck(#[from] TypeCheckError),

    /// The body itself failed.
    #[error(transparent)]
    Raised(anyhow::Error),

    /// A suspending body was called through the synchronous entry point.
    #[error("{0} must be awaited; use call_async")]
    RequiresAwait(String),
}

impl CallError {
    /// The type-check failure, if this is one.
    pub fn type_check(&self) -> Option<&TypeCheckError> {
        match self {
            CallError::TypeCheck(e) => Some(e),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.type_check().map(TypeCheckError::kind)
    }
}

/// Body errors are passed through, but type-check failures that escaped a
/// body (a lazily validated producer, a nested checked call) keep their
/// identity.
impl From<anyhow::Error> for CallError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<TypeCheckError>() {
            Ok(e) => return CallError::TypeCheck(e),
            Err(err) => err,
        };
        match err.downcast::<CallError>() {
            Ok(e) => e,
            Err(err) => CallError::Raised(err),
        }
    }
}

// ---------------------------------------------------------------------------
// TypeChecked
// ---------------------------------------------------------------------------

/// A callable wrapped with signature validation.
#[derive(Debug, Clone)]
pub struct TypeChecked {
    spec: Arc<CallableSpec>,
    body: Body,
    options: CheckOptions,
    config: ConfigStore,
    registry: ValidatorRegistry,
    namespace: Namespace,
}

impl TypeChecked {
    /// Wrap `body` with default options and the process-wide stores.
    pub fn new(signature: Signature, body: Body) -> Self {
        Self::with_options(signature, body, CheckOptions::default())
    }

    pub fn with_options(signature: Signature, body: Body, options: CheckOptions) -> Self {
        let mut spec = CallableSpec::compile(&signature, DescriptorInterner::global());
        spec.is_awaitable |= body.is_suspending();
        tracing::debug!(
            function = %spec.name,
            parameters = spec.params.len(),
            awaitable = spec.is_awaitable,
            passthrough = options.ignore,
            "callable wrapped"
        );
        Self {
            spec: Arc::new(spec),
            body,
            options,
            config: ConfigStore::global(),
            registry: ValidatorRegistry::global(),
            namespace: Namespace::global(),
        }
    }

    pub fn with_config(mut self, config: ConfigStore) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: ValidatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Namespace forward references in this signature resolve against.
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &CallableSpec {
        &self.spec
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn is_awaitable(&self) -> bool {
        self.spec.is_awaitable
    }

    /// Whether calls bypass validation.
    pub fn is_passthrough(&self) -> bool {
        self.options.ignore
    }

    /// Call an immediate body.
    ///
    /// Returns [`CallError::RequiresAwait`] for a suspending body.
    pub fn call(&self, args: Args) -> Result<Value, CallError> {
        let Body::Immediate(body) = &self.body else {
            return Err(CallError::RequiresAwait(self.spec.name.clone()));
        };
        if self.options.ignore {
            return Ok(body(bind(&self.spec, args)?)?);
        }
        let (bound, ctx) = self.enter(args)?;
        let result = body(bound);
        self.exit(result, ctx)
    }

    /// Call either kind of body, awaiting a suspending one.
    pub async fn call_async(&self, args: Args) -> Result<Value, CallError> {
        if self.options.ignore {
            let bound = bind(&self.spec, args)?;
            return Ok(self.body.invoke(bound).await?);
        }
        let (bound, ctx) = self.enter(args)?;
        let result = self.body.invoke(bound).await;
        self.exit(result, ctx)
    }

    fn enter(&self, args: Args) -> Result<(BoundArguments, ValidationContext), CallError> {
        let mut ctx = ValidationContext::new(
            self.config.snapshot(),
            self.registry.clone(),
            self.namespace.clone(),
        )
        .for_function(self.spec.name.clone())
        .with_overrides(self.options.sample, self.options.deep);

        let mut bound = bind(&self.spec, args)?;
        validate_arguments(&self.spec, &mut bound, &mut ctx)?;
        Ok((bound, ctx))
    }

    fn exit(
        &self,
        result: anyhow::Result<Value>,
        mut ctx: ValidationContext,
    ) -> Result<Value, CallError> {
        let value = result?;
        let function = self.spec.name.as_str();
        match self.spec.returns.as_deref() {
            Some(expected) => {
                tracing::trace!(function, expected = %expected, "validating return value");
                matcher::check(&value, expected, &mut ctx).map_err(|f| f.at(function, Site::Return))?;
            }
            None if ctx.config().strict_return_mode => {
                return Err(TypeCheckError::new(
                    function,
                    Site::Return,
                    Violation::MissingReturnAnnotation,
                )
                .into())
            }
            None => {}
        }
        Ok(value)
    }
}

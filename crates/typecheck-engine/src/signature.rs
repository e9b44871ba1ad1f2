//! # Callable Signatures
//!
//! A [`Signature`] is the declared surface of a callable: ordered
//! parameters with optional type descriptors and defaults, an optional
//! return descriptor, and whether the callable suspends. Signatures are
//! plain data (serde-derivable), so they can be written by hand, built
//! from annotation text, or loaded from JSON/YAML.
//!
//! When a wrapper is built, the signature is compiled once into a
//! [`CallableSpec`] whose descriptors are interned. Nothing is re-parsed
//! per call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typecheck_core::{DescriptorInterner, ParseError, TypeDescriptor, Value};

/// How an argument may be supplied for a parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    PositionalOnly,
    #[default]
    PositionalOrKeyword,
    KeywordOnly,
    /// Collects surplus positionals (`*args`).
    VarPositional,
    /// Collects surplus keywords (`**kwargs`).
    VarKeyword,
}

impl ParamKind {
    pub fn accepts_positional(&self) -> bool {
        matches!(self, Self::PositionalOnly | Self::PositionalOrKeyword)
    }

    pub fn accepts_keyword(&self) -> bool {
        matches!(self, Self::PositionalOrKeyword | Self::KeywordOnly)
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, Self::VarPositional | Self::VarKeyword)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
    /// Declared type; `None` leaves the parameter unchecked.
    #[serde(default)]
    pub descriptor: Option<TypeDescriptor>,
    /// Default, materialized into a fresh [`Value`] on every call that
    /// omits the argument.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            descriptor: Some(descriptor),
            default: None,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            descriptor: None,
            default: None,
        }
    }

    pub fn kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Declared surface of a callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Declared return type; `None` is unconstrained unless strict return
    /// mode is on.
    #[serde(default)]
    pub returns: Option<TypeDescriptor>,
    /// The callable suspends and must be awaited.
    #[serde(default)]
    pub is_awaitable: bool,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns: None,
            is_awaitable: false,
        }
    }

    /// Build a signature from annotation text.
    ///
    /// Each parameter is `(name, annotation)`; an empty annotation leaves the
    /// parameter untyped. All parameters are positional-or-keyword.
    pub fn from_annotations(
        name: impl Into<String>,
        parameters: &[(&str, &str)],
        returns: Option<&str>,
    ) -> Result<Self, ParseError> {
        let mut signature = Self::new(name);
        for (param, annotation) in parameters {
            let parameter = if annotation.trim().is_empty() {
                Parameter::untyped(*param)
            } else {
                Parameter::new(*param, annotation.parse()?)
            };
            signature.parameters.push(parameter);
        }
        signature.returns = returns.map(str::parse).transpose()?;
        Ok(signature)
    }

    pub fn with(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Add a typed positional-or-keyword parameter.
    pub fn param(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with(Parameter::new(name, descriptor))
    }

    pub fn untyped_param(self, name: impl Into<String>) -> Self {
        self.with(Parameter::untyped(name))
    }

    pub fn param_with_default(
        self,
        name: impl Into<String>,
        descriptor: TypeDescriptor,
        default: impl Into<serde_json::Value>,
    ) -> Self {
        self.with(Parameter::new(name, descriptor).with_default(default))
    }

    pub fn keyword_only(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with(Parameter::new(name, descriptor).kind(ParamKind::KeywordOnly))
    }

    /// `*name: T`; each surplus positional is checked against `descriptor`.
    pub fn var_positional(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with(Parameter::new(name, descriptor).kind(ParamKind::VarPositional))
    }

    /// `**name: T`; each surplus keyword value is checked against `descriptor`.
    pub fn var_keyword(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with(Parameter::new(name, descriptor).kind(ParamKind::VarKeyword))
    }

    pub fn returns(mut self, descriptor: TypeDescriptor) -> Self {
        self.returns = Some(descriptor);
        self
    }

    pub fn awaitable(mut self) -> Self {
        self.is_awaitable = true;
        self
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

// ---------------------------------------------------------------------------
// Compiled form
// ---------------------------------------------------------------------------

/// A parameter as the binder sees it.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub descriptor: Option<Arc<TypeDescriptor>>,
    pub default: Option<serde_json::Value>,
}

impl ParamSpec {
    /// Fresh default value for a call that omits this argument.
    pub fn default_value(&self) -> Option<Value> {
        self.default.clone().map(Value::from)
    }
}

/// A [`Signature`] compiled once per wrapped callable.
#[derive(Debug, Clone)]
pub struct CallableSpec {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub returns: Option<Arc<TypeDescriptor>>,
    pub is_awaitable: bool,
}

impl CallableSpec {
    /// Compile `signature`, sharing descriptors through `interner`.
    pub fn compile(signature: &Signature, interner: &DescriptorInterner) -> Self {
        let params = signature
            .parameters
            .iter()
            .map(|p| ParamSpec {
                name: p.name.clone(),
                kind: p.kind,
                descriptor: p.descriptor.clone().map(|d| interner.intern(d)),
                default: p.default.clone(),
            })
            .collect();
        Self {
            name: signature.name.clone(),
            params,
            returns: signature.returns.clone().map(|d| interner.intern(d)),
            is_awaitable: signature.is_awaitable,
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

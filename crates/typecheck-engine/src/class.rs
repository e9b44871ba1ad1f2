//! # Class-Level Application
//!
//! Checking a whole class at once: every member of a [`ClassDef`] is
//! wrapped individually when the class is checked, subject to the
//! include/exclude filters and per-member opt-out. Members that are not
//! selected become passthrough wrappers, decided once here rather than on
//! every call.
//!
//! Calling conventions are preserved:
//!
//! | kind | receiver | reachable through |
//! |------|----------|-------------------|
//! | `Instance` | the instance | [`CheckedClass::call_method`] |
//! | `Class` | `Value::Type(class)` | `call_method`, [`CheckedClass::call_class`] |
//! | `Static` | none | `call_method`, `call_class`, [`CheckedClass::call_static`] |
//!
//! The class name is defined in the namespace the members resolve forward
//! references in, so `-> "Rectangle"` works on Rectangle's own members.

use std::collections::HashMap;

use typecheck_core::{Site, TypeCheckError, Value};

use crate::binder::Args;
use crate::config::ConfigStore;
use crate::namespace::Namespace;
use crate::registry::ValidatorRegistry;
use crate::signature::{ParamKind, Parameter, Signature};
use crate::wrapper::{Body, CallError, CheckOptions, TypeChecked};

/// How a member is bound when called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Instance,
    Class,
    Static,
}

impl MethodKind {
    fn receiver_name(&self) -> Option<&'static str> {
        match self {
            MethodKind::Instance => Some("self"),
            MethodKind::Class => Some("cls"),
            MethodKind::Static => None,
        }
    }
}

/// One member of a class. The signature excludes the receiver.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub kind: MethodKind,
    pub signature: Signature,
    pub body: Body,
    /// Opted out of checking regardless of the class options.
    pub ignored: bool,
}

impl Member {
    fn build(name: impl Into<String>, kind: MethodKind, signature: Signature, body: Body) -> Self {
        Self {
            name: name.into(),
            kind,
            signature,
            body,
            ignored: false,
        }
    }

    pub fn instance(name: impl Into<String>, signature: Signature, body: Body) -> Self {
        Self::build(name, MethodKind::Instance, signature, body)
    }

    pub fn class_method(name: impl Into<String>, signature: Signature, body: Body) -> Self {
        Self::build(name, MethodKind::Class, signature, body)
    }

    pub fn static_method(name: impl Into<String>, signature: Signature, body: Body) -> Self {
        Self::build(name, MethodKind::Static, signature, body)
    }

    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// An unchecked class: a name and its members.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub members: Vec<Member>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Check the class with the process-wide stores.
    pub fn check(self, options: CheckOptions) -> CheckedClass {
        self.check_with(
            options,
            ConfigStore::global(),
            ValidatorRegistry::global(),
            Namespace::global(),
        )
    }

    /// Check the class against explicit stores.
    pub fn check_with(
        self,
        options: CheckOptions,
        config: ConfigStore,
        registry: ValidatorRegistry,
        namespace: Namespace,
    ) -> CheckedClass {
        namespace.define_class(self.name.clone());

        let member_options = CheckOptions {
            ignore: false,
            include: None,
            exclude: Vec::new(),
            sample: options.sample,
            deep: options.deep,
        };

        let mut members = HashMap::with_capacity(self.members.len());
        for member in self.members {
            let skip_reason = if options.ignore {
                Some("class ignored")
            } else if member.ignored {
                Some("member ignored")
            } else if !options.selects(&member.name) {
                Some("filtered by include/exclude")
            } else {
                None
            };
            if let Some(reason) = skip_reason {
                tracing::debug!(class = %self.name, member = %member.name, reason, "member left unchecked");
            }

            let mut signature = member.signature;
            signature.name = format!("{}.{}", self.name, member.name);
            if let Some(receiver) = member.kind.receiver_name() {
                signature
                    .parameters
                    .insert(0, Parameter::untyped(receiver).kind(ParamKind::PositionalOnly));
            }

            let opts = if skip_reason.is_some() {
                CheckOptions::new().ignore()
            } else {
                member_options.clone()
            };
            let wrapped = TypeChecked::with_options(signature, member.body, opts)
                .with_config(config.clone())
                .with_registry(registry.clone())
                .with_namespace(namespace.clone());
            members.insert(member.name, (member.kind, wrapped));
        }

        tracing::debug!(class = %self.name, members = members.len(), "class checked");
        CheckedClass {
            name: self.name,
            members,
        }
    }
}

/// A class whose members have been wrapped.
#[derive(Debug, Clone)]
pub struct CheckedClass {
    name: String,
    members: HashMap<String, (MethodKind, TypeChecked)>,
}

impl CheckedClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self, member: &str) -> Option<MethodKind> {
        self.members.get(member).map(|(kind, _)| *kind)
    }

    /// The wrapper for a member, if the class has it.
    pub fn member(&self, member: &str) -> Option<&TypeChecked> {
        self.members.get(member).map(|(_, wrapped)| wrapped)
    }

    /// Whether calls to `member` are validated.
    pub fn is_checked(&self, member: &str) -> bool {
        self.member(member).is_some_and(|w| !w.is_passthrough())
    }

    /// Call a member through an instance.
    pub fn call_method(&self, member: &str, instance: Value, args: Args) -> Result<Value, CallError> {
        let (kind, wrapped) = self.lookup(member)?;
        wrapped.call(self.receive(kind, Some(instance), args))
    }

    /// Call a class or static member through the class.
    pub fn call_class(&self, member: &str, args: Args) -> Result<Value, CallError> {
        let (kind, wrapped) = self.lookup(member)?;
        if kind == MethodKind::Instance {
            return Err(self.convention(member, "is an instance method and needs an instance"));
        }
        wrapped.call(self.receive(kind, None, args))
    }

    /// Call a static member.
    pub fn call_static(&self, member: &str, args: Args) -> Result<Value, CallError> {
        let (kind, wrapped) = self.lookup(member)?;
        if kind != MethodKind::Static {
            return Err(self.convention(member, "is not a static method"));
        }
        wrapped.call(args)
    }

    /// Awaiting form of [`call_method`](Self::call_method).
    pub async fn call_method_async(
        &self,
        member: &str,
        instance: Value,
        args: Args,
    ) -> Result<Value, CallError> {
        let (kind, wrapped) = self.lookup(member)?;
        wrapped.call_async(self.receive(kind, Some(instance), args)).await
    }

    /// Awaiting form of [`call_class`](Self::call_class).
    pub async fn call_class_async(&self, member: &str, args: Args) -> Result<Value, CallError> {
        let (kind, wrapped) = self.lookup(member)?;
        if kind == MethodKind::Instance {
            return Err(self.convention(member, "is an instance method and needs an instance"));
        }
        wrapped.call_async(self.receive(kind, None, args)).await
    }

    fn lookup(&self, member: &str) -> Result<(MethodKind, &TypeChecked), CallError> {
        self.members
            .get(member)
            .map(|(kind, wrapped)| (*kind, wrapped))
            .ok_or_else(|| self.convention(member, "does not exist"))
    }

    fn receive(&self, kind: MethodKind, instance: Option<Value>, args: Args) -> Args {
        match (kind, instance) {
            (MethodKind::Instance, Some(instance)) => args.with_receiver(instance),
            (MethodKind::Class, _) => args.with_receiver(Value::Type(self.name.clone())),
            _ => args,
        }
    }

    fn convention(&self, member: &str, problem: &str) -> CallError {
        TypeCheckError::binding(
            format!("{}.{member}", self.name),
            Site::Call,
            format!("member '{member}' of {} {problem}", self.name),
        )
        .into()
    }
}

//! # Argument Binding
//!
//! Maps a call's positional and keyword arguments onto the declared
//! parameters (applying defaults), then validates each bound parameter.
//! Both steps run before the callable body; a failure in either means the
//! body is never invoked.

use typecheck_core::{PathSegment, Producer, Site, TypeCheckError, TypeDescriptor, Value};

use crate::context::ValidationContext;
use crate::lazy;
use crate::matcher;
use crate::signature::{CallableSpec, ParamKind};

/// Arguments supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Prepend a receiver (instance or class) ahead of the other positionals.
    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.positional.insert(0, receiver);
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }
}

/// Arguments after binding, in declaration order. This is what a callable
/// body receives.
///
/// A var-positional parameter holds a tuple of the surplus positionals, a
/// var-keyword parameter a mapping of the surplus keywords.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: Vec<(String, Value)>,
}

impl BoundArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Like [`get`](Self::get), for bodies that treat absence as a bug.
    pub fn require(&self, name: &str) -> anyhow::Result<&Value> {
        self.get(name)
            .ok_or_else(|| anyhow::anyhow!("no bound argument named '{name}'"))
    }

    /// Move a value out, leaving `None` behind. Used for producers, which
    /// the body consumes.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.values
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| std::mem::replace(v, Value::None))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values.into_iter().map(|(_, v)| v).collect()
    }
}

/// Bind `args` to the parameters of `spec`.
pub fn bind(spec: &CallableSpec, args: Args) -> Result<BoundArguments, TypeCheckError> {
    let function = spec.name.as_str();
    let Args {
        positional,
        keywords,
    } = args;

    let mut slots: Vec<Option<Value>> = vec![None; spec.params.len()];
    let positional_slots: Vec<usize> = spec
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind.accepts_positional())
        .map(|(i, _)| i)
        .collect();
    let has_var_positional = spec.params.iter().any(|p| p.kind == ParamKind::VarPositional);
    let has_var_keyword = spec.params.iter().any(|p| p.kind == ParamKind::VarKeyword);

    let given = positional.len();
    let mut positional = positional.into_iter();
    for &slot in &positional_slots {
        match positional.next() {
            Some(value) => slots[slot] = Some(value),
            None => break,
        }
    }
    let mut surplus_positional: Vec<Value> = positional.collect();
    if !surplus_positional.is_empty() && !has_var_positional {
        return Err(TypeCheckError::binding(
            function,
            Site::Call,
            format!(
                "takes {} positional argument(s) but {given} were given",
                positional_slots.len()
            ),
        ));
    }

    let mut surplus_keywords: Vec<(String, Value)> = Vec::new();
    for (name, value) in keywords {
        let slot = spec
            .params
            .iter()
            .position(|p| p.name == name && p.kind.accepts_keyword());
        match slot {
            Some(slot) if slots[slot].is_some() => {
                return Err(TypeCheckError::binding(
                    function,
                    Site::Parameter(name.clone()),
                    format!("got multiple values for argument '{name}'"),
                ))
            }
            Some(slot) => slots[slot] = Some(value),
            None if has_var_keyword => {
                if surplus_keywords.iter().any(|(k, _)| *k == name) {
                    return Err(TypeCheckError::binding(
                        function,
                        Site::Parameter(name.clone()),
                        format!("got multiple values for keyword argument '{name}'"),
                    ));
                }
                surplus_keywords.push((name, value));
            }
            None => {
                return Err(TypeCheckError::binding(
                    function,
                    Site::Call,
                    format!("got an unexpected keyword argument '{name}'"),
                ))
            }
        }
    }

    let mut values = Vec::with_capacity(spec.params.len());
    for (param, slot) in spec.params.iter().zip(slots) {
        let value = match param.kind {
            ParamKind::VarPositional => Value::Tuple(std::mem::take(&mut surplus_positional)),
            ParamKind::VarKeyword => Value::Map(
                std::mem::take(&mut surplus_keywords)
                    .into_iter()
                    .map(|(k, v)| (Value::Str(k), v))
                    .collect(),
            ),
            _ => match slot.or_else(|| param.default_value()) {
                Some(value) => value,
                None => {
                    return Err(TypeCheckError::binding(
                        function,
                        Site::Parameter(param.name.clone()),
                        format!("missing required argument '{}'", param.name),
                    ))
                }
            },
        };
        values.push((param.name.clone(), value));
    }
    Ok(BoundArguments { values })
}

/// Validate every typed parameter of `bound`, in declaration order.
///
/// With lazy iterable validation on, producers passed for `Iterable[T]`
/// parameters are replaced in place by validating producers instead of
/// being checked here. The replacement happens after every eager parameter
/// has been checked, so the producers see the call's complete TypeVar
/// bindings.
pub fn validate_arguments(
    spec: &CallableSpec,
    bound: &mut BoundArguments,
    ctx: &mut ValidationContext,
) -> Result<(), TypeCheckError> {
    let function = spec.name.as_str();
    let lazy_enabled = ctx.config().lazy_iterable_validation;
    let mut deferred: Vec<(usize, Producer, TypeDescriptor)> = Vec::new();

    for (index, (param, (name, value))) in spec.params.iter().zip(bound.values.iter()).enumerate() {
        let Some(descriptor) = param.descriptor.as_deref() else {
            continue;
        };
        tracing::trace!(function, parameter = %name, expected = %descriptor, "validating parameter");
        if let Value::Iter(producer) = value {
            if lazy_enabled {
                if let Some(element) = lazy::lazy_element(descriptor) {
                    deferred.push((index, producer.clone(), element.clone()));
                    continue;
                }
            }
        }

        let site = || Site::Parameter(name.clone());
        match (param.kind, value) {
            (ParamKind::VarPositional, Value::Tuple(items)) => {
                for (i, item) in items.iter().enumerate() {
                    matcher::check(item, descriptor, ctx)
                        .map_err(|f| f.within(PathSegment::Variadic(i)).at(function, site()))?;
                }
            }
            (ParamKind::VarKeyword, Value::Map(pairs)) => {
                for (key, item) in pairs {
                    matcher::check(item, descriptor, ctx).map_err(|f| {
                        f.within(PathSegment::Value(key.to_string())).at(function, site())
                    })?;
                }
            }
            _ => matcher::check(value, descriptor, ctx).map_err(|f| f.at(function, site()))?,
        }
    }

    for (index, producer, element) in deferred {
        let (name, value) = &mut bound.values[index];
        let checked = lazy::validating_producer(producer, element, ctx.clone(), name.clone());
        *value = Value::Iter(checked);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::namespace::Namespace;
    use crate::registry::ValidatorRegistry;
    use crate::signature::Signature;
    use typecheck_core::{DescriptorInterner, ErrorKind};

    fn spec(signature: Signature) -> CallableSpec {
        CallableSpec::compile(&signature, &DescriptorInterner::new())
    }

    fn ctx(config: Config) -> ValidationContext {
        ValidationContext::new(config, ValidatorRegistry::new(), Namespace::new())
    }

    fn greet() -> CallableSpec {
        spec(
            Signature::new("greet")
                .param("name", TypeDescriptor::str())
                .param_with_default("times", TypeDescriptor::int(), 1)
                .keyword_only("loud", TypeDescriptor::bool()),
        )
    }

    #[test]
    fn positional_keyword_and_default_binding() {
        let bound = bind(&greet(), Args::new().arg("Ada").kwarg("loud", true)).unwrap();
        assert_eq!(bound.get("name"), Some(&Value::from("Ada")));
        assert_eq!(bound.get("times"), Some(&Value::Int(1)));
        assert_eq!(bound.get("loud"), Some(&Value::Bool(true)));
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn binding_errors_name_the_problem() {
        let too_many = bind(&greet(), Args::new().arg("a").arg(2).arg(3)).unwrap_err();
        assert_eq!(too_many.kind(), ErrorKind::Binding);
        assert!(too_many.to_string().contains("takes 2 positional argument(s) but 3 were given"));

        let dup = bind(&greet(), Args::new().arg("a").kwarg("name", "b").kwarg("loud", false)).unwrap_err();
        assert!(dup.to_string().contains("multiple values for argument 'name'"));

        let unknown = bind(&greet(), Args::new().arg("a").kwarg("shout", true)).unwrap_err();
        assert!(unknown.to_string().contains("unexpected keyword argument 'shout'"));

        let missing = bind(&greet(), Args::new().arg("a")).unwrap_err();
        assert_eq!(missing.site, Site::Parameter("loud".into()));
    }

    #[test]
    fn variadics_collect_surplus_arguments() {
        let s = spec(
            Signature::new("total")
                .param("first", TypeDescriptor::int())
                .var_positional("rest", TypeDescriptor::int())
                .var_keyword("options", TypeDescriptor::str()),
        );
        let bound = bind(&s, Args::new().arg(1).arg(2).arg(3).kwarg("unit", "kg")).unwrap();
        assert_eq!(bound.get("rest"), Some(&Value::Tuple(vec![Value::Int(2), Value::Int(3)])));
        assert_eq!(bound.get("options"), Some(&Value::map([("unit", "kg")])));
    }

    #[test]
    fn variadic_elements_are_validated_individually() {
        let s = spec(Signature::new("total").var_positional("rest", TypeDescriptor::int()));
        let mut bound = bind(&s, Args::new().arg(1).arg("two")).unwrap();
        let err = validate_arguments(&s, &mut bound, &mut ctx(Config::default())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "total: parameter `rest`, argument 1: expected int, got str"
        );
    }

    #[test]
    fn keyword_variadic_failures_name_the_value() {
        let s = spec(Signature::new("label").var_keyword("options", TypeDescriptor::str()));
        let mut bound = bind(&s, Args::new().kwarg("unit", "kg").kwarg("scale", 2)).unwrap();
        let err = validate_arguments(&s, &mut bound, &mut ctx(Config::default())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "label: parameter `options`, value at key 'scale': expected str, got int"
        );
    }

    #[test]
    fn producers_are_substituted_when_lazy() {
        let s = spec(Signature::new("consume").param("seq", TypeDescriptor::iterable(TypeDescriptor::int())));
        let source = Value::producer(vec![Value::Int(1), Value::from("bad")]);
        let mut bound = bind(&s, Args::new().arg(source.clone())).unwrap();
        let lazy = Config {
            lazy_iterable_validation: true,
            ..Config::default()
        };
        validate_arguments(&s, &mut bound, &mut ctx(lazy)).unwrap();
        assert_ne!(bound.get("seq"), Some(&source));

        let mut eager = bind(&s, Args::new().arg(source.clone())).unwrap();
        validate_arguments(&s, &mut eager, &mut ctx(Config::default())).unwrap();
        assert_eq!(eager.get("seq"), Some(&source));
    }

    #[test]
    fn take_leaves_none_behind() {
        let mut bound = bind(&greet(), Args::new().arg("Ada").kwarg("loud", false)).unwrap();
        assert_eq!(bound.take("name"), Some(Value::from("Ada")));
        assert_eq!(bound.get("name"), Some(&Value::None));
        assert!(bound.require("nope").is_err());
    }
}

//! # Lazy Iterable Validation
//!
//! A producer passed where an `Iterable[T]` is declared cannot be checked
//! at call entry without consuming it. With `lazy_iterable_validation`
//! enabled, the wrapper replaces the argument with a validating producer
//! that checks each element as the callee pulls it and yields an `Err` at
//! the first bad one.
//!
//! The failure therefore surfaces mid-execution of the callee, not before
//! it starts. Elements produced before the bad one have already been seen
//! by the callee.

use typecheck_core::{ContainerKind, Producer, Site, TypeDescriptor};

use crate::context::ValidationContext;
use crate::matcher;

/// Element descriptor to enforce lazily for `descriptor`, if it is an
/// iterable declaration (possibly wrapped in `Optional` or `Annotated`).
pub fn lazy_element(descriptor: &TypeDescriptor) -> Option<&TypeDescriptor> {
    match descriptor {
        TypeDescriptor::Container {
            container: ContainerKind::Iterable,
            elements,
        } => elements.first(),
        TypeDescriptor::Optional { inner } | TypeDescriptor::Annotated { inner, .. } => {
            lazy_element(inner)
        }
        _ => None,
    }
}

/// Wrap `producer` so every element is checked against `element` on
/// consumption.
///
/// The context is moved into the producer; type variable bindings made
/// before the call body ran still apply to the elements.
pub fn validating_producer(
    producer: Producer,
    element: TypeDescriptor,
    mut ctx: ValidationContext,
    parameter: String,
) -> Producer {
    producer.map_items(move |index, item| {
        let value = item?;
        matcher::check(&value, &element, &mut ctx).map_err(|failure| {
            tracing::debug!(
                function = %ctx.function(),
                parameter = %parameter,
                index,
                "lazy element failed validation"
            );
            failure.at(
                ctx.function(),
                Site::LazyElement {
                    parameter: parameter.clone(),
                    index,
                },
            )
        })?;
        Ok(value)
    })
}

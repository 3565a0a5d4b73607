//! Dispatch-aware resolution
//!
//! Resolution picks the first variant of an abstract node that accepts the
//! input, trying children in dispatch order. Every child sees the original
//! input. Non-abstract nodes fall back to direct construction.
//!
//! Failure rules:
//! - A failed child is recorded and the next one is tried
//! - If every child fails, one attempt per child is reported, in order
//! - A declaration error anywhere below aborts the whole dispatch

use super::errors::{Attempt, DeclarationError, ResolveError, ResolveResult};
use super::instance::{Datum, Instance};
use super::node::{Hierarchy, NodeId, NodeKind};
use super::validator::Validator;

/// Ordered variant search over a declared hierarchy.
pub struct Resolver<'a> {
    hierarchy: &'a Hierarchy,
}

impl<'a> Resolver<'a> {
    pub fn new(hierarchy: &'a Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Resolves `input` against `node`, dispatching through abstract nodes.
    ///
    /// # Errors
    ///
    /// - `Declaration` if an abstract node on the way has no variants, or a
    ///   value node is mis-declared
    /// - `Invalid` if `node` is not abstract and rejects the input
    /// - `Aggregate` if every variant of an abstract `node` rejects it
    pub fn resolve(&self, node: NodeId, input: impl Into<Datum>) -> ResolveResult<Instance> {
        let input = input.into();
        let validator = Validator::new(self.hierarchy);

        if let Some(instance) = validator.pass_through(node, &input) {
            return Ok(instance);
        }

        match self.hierarchy.kind(node)? {
            NodeKind::Abstract => self.dispatch(node, input),
            _ => validator.construct(node, input),
        }
    }

    /// Like [`Resolver::resolve`], handing validation and aggregate failures
    /// to `interceptor`.
    ///
    /// Declaration errors are returned without calling the interceptor.
    pub fn resolve_or_else<F>(
        &self,
        node: NodeId,
        input: impl Into<Datum>,
        interceptor: F,
    ) -> ResolveResult<Instance>
    where
        F: FnOnce(ResolveError) -> ResolveResult<Instance>,
    {
        match self.resolve(node, input) {
            Err(error) if !error.is_declaration() => interceptor(error),
            other => other,
        }
    }

    fn dispatch(&self, node: NodeId, input: Datum) -> ResolveResult<Instance> {
        let name = self.hierarchy.name(node)?;
        let variants = self.hierarchy.variants(node)?;
        if variants.is_empty() {
            return Err(DeclarationError::NoVariants {
                node: name.to_string(),
            }
            .into());
        }

        let mut attempts = Vec::with_capacity(variants.len());
        for variant in variants {
            match self.resolve(variant, input.clone()) {
                Ok(instance) => return Ok(instance),
                Err(error) if error.is_declaration() => return Err(error),
                Err(error) => attempts.push(Attempt {
                    variant: self.hierarchy.name(variant)?.to_string(),
                    error,
                }),
            }
        }

        Err(ResolveError::Aggregate {
            node: name.to_string(),
            attempts,
        })
    }
}

impl Hierarchy {
    /// Dispatch-aware construction, the usual entry point.
    pub fn resolve(&self, node: NodeId, input: impl Into<Datum>) -> ResolveResult<Instance> {
        Resolver::new(self).resolve(node, input)
    }

    /// Dispatch-aware construction with an error interceptor.
    pub fn resolve_or_else<F>(
        &self,
        node: NodeId,
        input: impl Into<Datum>,
        interceptor: F,
    ) -> ResolveResult<Instance>
    where
        F: FnOnce(ResolveError) -> ResolveResult<Instance>,
    {
        Resolver::new(self).resolve_or_else(node, input, interceptor)
    }
}

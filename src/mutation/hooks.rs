//! User-supplied callbacks invoked around each mutation.

use crate::core::Result;

use super::context::MutationContext;

/// Optional hooks injected into the run configuration.
///
/// Both methods default to no-ops, so an implementation only overrides the
/// ones it needs. Hooks are shared across checker threads.
pub trait MutationHooks: Send + Sync {
    /// Called just before a single tree mutation is committed.
    fn pre_mutation_ast(&self, _ctx: &MutationContext) {}

    /// Called before a mutant is written to disk.
    ///
    /// Returning [`Error::Skip`](crate::core::Error::Skip) or setting
    /// `ctx.skip` marks the mutant as skipped. The hook may also replace
    /// `ctx.config.test_command` for this mutant only.
    fn pre_mutation(&self, _ctx: &mut MutationContext) -> Result<()> {
        Ok(())
    }
}

/// Hooks built from closures, mostly for embedding and tests.
#[derive(Default)]
pub struct FnHooks {
    pre_mutation_ast: Option<Box<dyn Fn(&MutationContext) + Send + Sync>>,
    pre_mutation: Option<Box<dyn Fn(&mut MutationContext) -> Result<()> + Send + Sync>>,
}

impl FnHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pre_mutation_ast(
        mut self,
        hook: impl Fn(&MutationContext) + Send + Sync + 'static,
    ) -> Self {
        self.pre_mutation_ast = Some(Box::new(hook));
        self
    }

    pub fn on_pre_mutation(
        mut self,
        hook: impl Fn(&mut MutationContext) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.pre_mutation = Some(Box::new(hook));
        self
    }
}

impl MutationHooks for FnHooks {
    fn pre_mutation_ast(&self, ctx: &MutationContext) {
        if let Some(hook) = &self.pre_mutation_ast {
            hook(ctx);
        }
    }

    fn pre_mutation(&self, ctx: &mut MutationContext) -> Result<()> {
        match &self.pre_mutation {
            Some(hook) => hook(ctx),
            None => Ok(()),
        }
    }
}

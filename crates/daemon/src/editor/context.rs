// Who is editing, on behalf of which request, and whether they may.

use std::collections::BTreeSet;

use uuid::Uuid;

/// Caller identity passed explicitly into every editor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditContext {
    pub actor: String,
    pub request_id: String,
}

impl EditContext {
    pub fn new(actor: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self { actor: actor.into(), request_id: request_id.into() }
    }

    /// Context with a freshly generated request id.
    pub fn for_actor(actor: impl Into<String>) -> Self {
        Self::new(actor, Uuid::new_v4().to_string())
    }
}

/// Decides whether an actor may mutate documents. Reads are never checked.
pub trait AccessPolicy: Send + Sync {
    fn can_edit(&self, ctx: &EditContext, doc_id: &str) -> bool;

    fn can_create(&self, _ctx: &EditContext) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn can_edit(&self, _ctx: &EditContext, _doc_id: &str) -> bool {
        true
    }
}

/// Denies every mutation by the listed actors.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyActors {
    actors: BTreeSet<String>,
}

impl ReadOnlyActors {
    pub fn new(actors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { actors: actors.into_iter().map(Into::into).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    fn allows(&self, actor: &str) -> bool {
        !self.actors.contains(actor)
    }
}

impl AccessPolicy for ReadOnlyActors {
    fn can_edit(&self, ctx: &EditContext, _doc_id: &str) -> bool {
        self.allows(&ctx.actor)
    }

    fn can_create(&self, ctx: &EditContext) -> bool {
        self.allows(&ctx.actor)
    }
}

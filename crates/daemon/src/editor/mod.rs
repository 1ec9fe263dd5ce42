// Document mutation engine.
//
// Every mutating call is one `BEGIN IMMEDIATE` transaction:
// load → fingerprint check → compute new content → snapshot → compare-and-swap
// update → commit. Any error before the commit drops the transaction, so a
// failed call leaves content, version and history untouched.

pub mod context;
pub mod error;
pub mod guard;

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context as _};
use chrono::Utc;
use folio_common::patch::{apply_patches, decode_specs, ParseTier, Patch, PatchParser, PatchSpec};
use folio_common::types::{DocumentView, EditSummary, VersionSnapshot, VersionSummary};
use rusqlite::TransactionBehavior;
use tracing::{debug, info, info_span, warn};

pub use context::{AccessPolicy, AllowAll, EditContext, ReadOnlyActors};
pub use error::{EditError, ErrorCode};
pub use guard::ConcurrencyGuard;

use crate::store::documents::{ContentUpdate, DocumentRecord, DocumentStore};
use crate::store::meta_db::MetaDb;
use crate::store::versions::{SnapshotOutcome, VersionStore};

/// Patches as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchInput {
    /// Raw model output; goes through the repairing parser.
    Raw(String),
    /// Already structured; only `content_base64` decoding applies.
    List(Vec<PatchSpec>),
}

impl From<&str> for PatchInput {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<Vec<PatchSpec>> for PatchInput {
    fn from(specs: Vec<PatchSpec>) -> Self {
        Self::List(specs)
    }
}

/// A decoded batch plus how it was obtained.
struct PreparedBatch {
    patches: Vec<Patch>,
    tier: Option<ParseTier>,
    skipped: usize,
}

/// The committed state after a mutation.
struct Committed {
    update: ContentUpdate,
    version: i64,
}

pub struct DocumentEditor {
    db: Mutex<MetaDb>,
    policy: Arc<dyn AccessPolicy>,
    parser: PatchParser,
}

impl DocumentEditor {
    pub fn new(db: MetaDb) -> Self {
        Self { db: Mutex::new(db), policy: Arc::new(AllowAll), parser: PatchParser::default() }
    }

    pub fn with_access_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parser(mut self, parser: PatchParser) -> Self {
        self.parser = parser;
        self
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn read(&self, ctx: &EditContext, id: &str) -> Result<DocumentView, EditError> {
        let _span = editor_span("read", id, ctx).entered();
        let db = self.lock_db()?;
        let record =
            DocumentStore::get(db.connection(), id)?.ok_or_else(|| EditError::not_found(id))?;
        Ok(record.view())
    }

    /// Snapshots for `id`, newest first.
    pub fn history(
        &self,
        ctx: &EditContext,
        id: &str,
        limit: usize,
    ) -> Result<Vec<VersionSummary>, EditError> {
        let _span = editor_span("history", id, ctx).entered();
        let db = self.lock_db()?;
        if !DocumentStore::exists(db.connection(), id)? {
            return Err(EditError::not_found(id));
        }
        Ok(VersionStore::list_by_document(db.connection(), id, limit)?)
    }

    pub fn read_version(
        &self,
        ctx: &EditContext,
        id: &str,
        version: i64,
    ) -> Result<VersionSnapshot, EditError> {
        let _span = editor_span("read_version", id, ctx).entered();
        let db = self.lock_db()?;
        VersionStore::get(db.connection(), id, version)?
            .ok_or_else(|| EditError::NotFound { id: id.to_string(), version: Some(version) })
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Create a document at version 1. No snapshot is taken.
    pub fn create(&self, ctx: &EditContext, content: &str) -> Result<DocumentView, EditError> {
        let _span = editor_span("create", "", ctx).entered();
        if !self.policy.can_create(ctx) {
            warn!(actor = %ctx.actor, "document creation forbidden");
            return Err(EditError::Forbidden { actor: ctx.actor.clone(), id: String::new() });
        }
        let db = self.lock_db()?;
        let record = DocumentStore::create(db.connection(), content, Utc::now())?;
        info!(doc_id = %record.id, content_length = record.content_length, "document created");
        Ok(record.view())
    }

    pub fn append(
        &self,
        ctx: &EditContext,
        id: &str,
        content: &str,
        presented_hash: &str,
    ) -> Result<EditSummary, EditError> {
        let _span = editor_span("append", id, ctx).entered();
        let committed = self.mutate(ctx, id, presented_hash, |record| {
            let patch = Patch::append(record.content_length, content);
            Ok(apply_patches(&record.content, &[patch])?)
        })?;
        Ok(summary(id, committed, 1, None, 0))
    }

    pub fn insert(
        &self,
        ctx: &EditContext,
        id: &str,
        position: usize,
        content: &str,
        presented_hash: &str,
    ) -> Result<EditSummary, EditError> {
        let _span = editor_span("insert", id, ctx).entered();
        let committed = self.mutate(ctx, id, presented_hash, |record| {
            Ok(apply_patches(&record.content, &[Patch::insert(position, content)])?)
        })?;
        Ok(summary(id, committed, 1, None, 0))
    }

    /// Apply a batch of patches addressed in the current content's
    /// coordinates. The batch is parsed before any database work.
    pub fn patch(
        &self,
        ctx: &EditContext,
        id: &str,
        input: PatchInput,
        presented_hash: &str,
    ) -> Result<EditSummary, EditError> {
        let _span = editor_span("patch", id, ctx).entered();
        self.ensure_can_edit(ctx, id)?;
        let batch = self.prepare_batch(input)?;
        let applied = batch.patches.len();

        let committed = self.mutate(ctx, id, presented_hash, |record| {
            Ok(apply_patches(&record.content, &batch.patches)?)
        })?;
        Ok(summary(id, committed, applied, batch.tier, batch.skipped))
    }

    /// Replace the whole content. Only the fingerprint is checked.
    pub fn replace_all(
        &self,
        ctx: &EditContext,
        id: &str,
        content: &str,
        presented_hash: &str,
    ) -> Result<EditSummary, EditError> {
        let _span = editor_span("replace_all", id, ctx).entered();
        let committed = self.mutate(ctx, id, presented_hash, |_| Ok(content.to_string()))?;
        Ok(summary(id, committed, 1, None, 0))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn mutate<F>(
        &self,
        ctx: &EditContext,
        id: &str,
        presented_hash: &str,
        build: F,
    ) -> Result<Committed, EditError>
    where
        F: FnOnce(&DocumentRecord) -> Result<String, EditError>,
    {
        self.ensure_can_edit(ctx, id)?;

        let mut db = self.lock_db()?;
        let tx = db
            .connection_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin edit transaction")?;

        let record = DocumentStore::get(&tx, id)?.ok_or_else(|| EditError::not_found(id))?;
        if let Err(error) = ConcurrencyGuard::check(&record, presented_hash) {
            warn!(version = record.version, "stale content hash presented");
            return Err(error);
        }

        let next_content = build(&record)?;

        let now = Utc::now();
        match VersionStore::snapshot(&tx, &record, &ctx.actor, &ctx.request_id, now)? {
            SnapshotOutcome::Created => {}
            SnapshotOutcome::AlreadyExists => {
                info!(version = record.version, "version snapshot already recorded");
            }
        }

        let update = ContentUpdate::new(next_content);
        let Some(version) = DocumentStore::compare_and_swap(
            &tx,
            id,
            &record.content_hash,
            record.version,
            &update,
            now,
        )?
        else {
            let current = DocumentStore::get(&tx, id)?.ok_or_else(|| EditError::not_found(id))?;
            warn!(version = current.version, "document changed during edit");
            return Err(EditError::HashMismatch {
                id: id.to_string(),
                presented: presented_hash.to_string(),
                current_hash: current.content_hash,
                current_version: current.version,
            });
        };

        tx.commit().context("failed to commit edit transaction")?;
        info!(
            version,
            content_length = update.content_length,
            content_hash = %update.content_hash,
            "document updated"
        );
        Ok(Committed { update, version })
    }

    fn ensure_can_edit(&self, ctx: &EditContext, id: &str) -> Result<(), EditError> {
        if self.policy.can_edit(ctx, id) {
            return Ok(());
        }
        warn!("edit forbidden by access policy");
        Err(EditError::Forbidden { actor: ctx.actor.clone(), id: id.to_string() })
    }

    fn prepare_batch(&self, input: PatchInput) -> Result<PreparedBatch, EditError> {
        let batch = match input {
            PatchInput::List(specs) => {
                PreparedBatch { patches: decode_specs(specs)?, tier: None, skipped: 0 }
            }
            PatchInput::Raw(raw) => {
                let parsed = self.parser.parse(&raw).inspect_err(|error| {
                    warn!(error = %error, payload_bytes = raw.len(), "patch payload rejected");
                })?;
                match parsed.tier {
                    ParseTier::Strict => {}
                    ParseTier::Structural => {
                        info!(tier = parsed.tier.as_str(), "patch payload repaired");
                    }
                    ParseTier::ManualScan => warn!(
                        tier = parsed.tier.as_str(),
                        skipped = parsed.skipped,
                        recovered = parsed.patches.len(),
                        "patch payload recovered by manual scan"
                    ),
                }
                PreparedBatch {
                    patches: parsed.patches,
                    tier: Some(parsed.tier),
                    skipped: parsed.skipped,
                }
            }
        };

        if batch.patches.is_empty() {
            return Err(EditError::empty_batch());
        }
        debug!(patches = batch.patches.len(), "patch batch prepared");
        Ok(batch)
    }

    fn lock_db(&self) -> Result<MutexGuard<'_, MetaDb>, EditError> {
        self.db.lock().map_err(|_| EditError::Storage(anyhow!("document database lock poisoned")))
    }
}

fn editor_span(op: &'static str, id: &str, ctx: &EditContext) -> tracing::Span {
    info_span!(
        "folio.editor",
        op,
        doc_id = %id,
        actor = %ctx.actor,
        request_id = %ctx.request_id
    )
}

fn summary(
    id: &str,
    committed: Committed,
    patches_applied: usize,
    parse_tier: Option<ParseTier>,
    patches_skipped: usize,
) -> EditSummary {
    EditSummary {
        id: id.to_string(),
        content_hash: committed.update.content_hash,
        content_length: committed.update.content_length,
        version: committed.version,
        patches_applied,
        patches_skipped,
        parse_tier,
    }
}

// RPC method name constants.

pub const RPC_PING: &str = "rpc.ping";

// ── Document ───────────────────────────────────────────────────────
pub const DOC_CREATE: &str = "doc.create";
pub const DOC_READ: &str = "doc.read";
pub const DOC_APPEND: &str = "doc.append";
pub const DOC_INSERT: &str = "doc.insert";
pub const DOC_PATCH: &str = "doc.patch";
pub const DOC_REPLACE_ALL: &str = "doc.replace_all";

// ── History ────────────────────────────────────────────────────────
pub const DOC_HISTORY: &str = "doc.history";
pub const DOC_VERSION: &str = "doc.version";

/// All methods the server dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    RPC_PING,
    DOC_CREATE,
    DOC_READ,
    DOC_APPEND,
    DOC_INSERT,
    DOC_PATCH,
    DOC_REPLACE_ALL,
    DOC_HISTORY,
    DOC_VERSION,
];

/// Methods that change document content.
pub const MUTATING_METHODS: &[&str] = &[DOC_APPEND, DOC_INSERT, DOC_PATCH, DOC_REPLACE_ALL];

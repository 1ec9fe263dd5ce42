// JSON-RPC dispatch onto the document editor.
//
// Editor calls block on SQLite, so each one runs on the blocking pool.

use std::sync::Arc;

use folio_common::patch::PatchSpec;
use folio_common::protocol::jsonrpc::{
    is_supported_protocol_version, Request, RequestId, Response, RpcError, CURRENT_PROTOCOL_VERSION,
    EDIT_FAILED, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
    SUPPORTED_PROTOCOL_VERSIONS,
};
use folio_common::protocol::rpc_methods;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::editor::{DocumentEditor, EditContext, EditError, ErrorCode, PatchInput};

pub const ANONYMOUS_ACTOR: &str = "anonymous";

const DOC_HISTORY_DEFAULT_LIMIT: usize = 50;
const DOC_HISTORY_MAX_LIMIT: usize = 500;

#[derive(Clone)]
pub struct RpcServerState {
    editor: Arc<DocumentEditor>,
}

impl RpcServerState {
    pub fn new(editor: DocumentEditor) -> Self {
        Self { editor: Arc::new(editor) }
    }
}

// ── Params ─────────────────────────────────────────────────────────

/// Optional caller identity carried by every method.
#[derive(Debug, Default, Deserialize)]
struct CallerParams {
    actor: Option<String>,
    request_id: Option<String>,
}

impl CallerParams {
    fn into_context(self) -> EditContext {
        let actor = self
            .actor
            .filter(|actor| !actor.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_ACTOR.to_string());
        match self.request_id.filter(|id| !id.trim().is_empty()) {
            Some(request_id) => EditContext::new(actor, request_id),
            None => EditContext::for_actor(actor),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocCreateParams {
    #[serde(default)]
    content: String,
    #[serde(flatten)]
    caller: CallerParams,
}

#[derive(Debug, Deserialize)]
struct DocReadParams {
    doc_id: String,
    #[serde(flatten)]
    caller: CallerParams,
}

#[derive(Debug, Deserialize)]
struct DocAppendParams {
    doc_id: String,
    content: String,
    content_hash: String,
    #[serde(flatten)]
    caller: CallerParams,
}

#[derive(Debug, Deserialize)]
struct DocInsertParams {
    doc_id: String,
    position: usize,
    content: String,
    content_hash: String,
    #[serde(flatten)]
    caller: CallerParams,
}

#[derive(Debug, Deserialize)]
struct DocPatchParams {
    doc_id: String,
    /// A JSON array of patch objects, or the raw payload as a string.
    patches: Value,
    content_hash: String,
    #[serde(flatten)]
    caller: CallerParams,
}

#[derive(Debug, Deserialize)]
struct DocReplaceAllParams {
    doc_id: String,
    content: String,
    content_hash: String,
    #[serde(flatten)]
    caller: CallerParams,
}

fn default_doc_history_limit() -> usize {
    DOC_HISTORY_DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
struct DocHistoryParams {
    doc_id: String,
    #[serde(default = "default_doc_history_limit")]
    limit: usize,
    #[serde(flatten)]
    caller: CallerParams,
}

#[derive(Debug, Deserialize)]
struct DocVersionParams {
    doc_id: String,
    version: i64,
    #[serde(flatten)]
    caller: CallerParams,
}

// ── Dispatch ───────────────────────────────────────────────────────

pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request = match serde_json::from_slice::<Request>(raw) {
        Ok(request) => request,
        Err(error) => {
            return Response::error(
                RequestId::Null,
                RpcError {
                    code: PARSE_ERROR,
                    message: "Parse error".to_string(),
                    data: Some(json!({ "reason": error.to_string() })),
                },
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return Response::error(
            request.id,
            RpcError { code: INVALID_REQUEST, message: "Invalid Request".to_string(), data: None },
        );
    }

    if let Some(version) = request.protocol_version.as_deref() {
        if !is_supported_protocol_version(version) {
            return Response::error(
                request.id,
                RpcError {
                    code: INVALID_REQUEST,
                    message: "Unsupported protocol version".to_string(),
                    data: Some(json!({
                        "requested": version,
                        "supported": SUPPORTED_PROTOCOL_VERSIONS,
                    })),
                },
            );
        }
    }

    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    match request.method.as_str() {
        rpc_methods::RPC_PING => Response::success(
            request.id,
            json!({
                "ok": true,
                "protocol_version": CURRENT_PROTOCOL_VERSION,
            }),
        ),
        rpc_methods::DOC_CREATE => handle_doc_create(request, state).await,
        rpc_methods::DOC_READ => handle_doc_read(request, state).await,
        rpc_methods::DOC_APPEND => handle_doc_append(request, state).await,
        rpc_methods::DOC_INSERT => handle_doc_insert(request, state).await,
        rpc_methods::DOC_PATCH => handle_doc_patch(request, state).await,
        rpc_methods::DOC_REPLACE_ALL => handle_doc_replace_all(request, state).await,
        rpc_methods::DOC_HISTORY => handle_doc_history(request, state).await,
        rpc_methods::DOC_VERSION => handle_doc_version(request, state).await,
        _ => Response::error(
            request.id,
            RpcError {
                code: METHOD_NOT_FOUND,
                message: "Method not found".to_string(),
                data: None,
            },
        ),
    }
}

async fn handle_doc_create(request: Request, state: &RpcServerState) -> Response {
    let params: DocCreateParams = match parse_params(request.params, &request.id, "doc.create") {
        Ok(params) => params,
        Err(response) => return response,
    };
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| editor.create(&ctx, &params.content)).await
}

async fn handle_doc_read(request: Request, state: &RpcServerState) -> Response {
    let params: DocReadParams = match parse_params(request.params, &request.id, "doc.read") {
        Ok(params) => params,
        Err(response) => return response,
    };
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| editor.read(&ctx, &params.doc_id)).await
}

async fn handle_doc_append(request: Request, state: &RpcServerState) -> Response {
    let params: DocAppendParams = match parse_params(request.params, &request.id, "doc.append") {
        Ok(params) => params,
        Err(response) => return response,
    };
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| {
        editor.append(&ctx, &params.doc_id, &params.content, &params.content_hash)
    })
    .await
}

async fn handle_doc_insert(request: Request, state: &RpcServerState) -> Response {
    let params: DocInsertParams = match parse_params(request.params, &request.id, "doc.insert") {
        Ok(params) => params,
        Err(response) => return response,
    };
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| {
        editor.insert(&ctx, &params.doc_id, params.position, &params.content, &params.content_hash)
    })
    .await
}

async fn handle_doc_patch(request: Request, state: &RpcServerState) -> Response {
    let params: DocPatchParams = match parse_params(request.params, &request.id, "doc.patch") {
        Ok(params) => params,
        Err(response) => return response,
    };
    let input = match patch_input(params.patches) {
        Ok(input) => input,
        Err(reason) => return invalid_params_response(request.id, reason),
    };
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| {
        editor.patch(&ctx, &params.doc_id, input, &params.content_hash)
    })
    .await
}

async fn handle_doc_replace_all(request: Request, state: &RpcServerState) -> Response {
    let params: DocReplaceAllParams =
        match parse_params(request.params, &request.id, "doc.replace_all") {
            Ok(params) => params,
            Err(response) => return response,
        };
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| {
        editor.replace_all(&ctx, &params.doc_id, &params.content, &params.content_hash)
    })
    .await
}

async fn handle_doc_history(request: Request, state: &RpcServerState) -> Response {
    let params: DocHistoryParams = match parse_params(request.params, &request.id, "doc.history")
    {
        Ok(params) => params,
        Err(response) => return response,
    };
    let limit = params.limit.clamp(1, DOC_HISTORY_MAX_LIMIT);
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| {
        let versions = editor.history(&ctx, &params.doc_id, limit)?;
        Ok(json!({ "doc_id": params.doc_id, "versions": versions }))
    })
    .await
}

async fn handle_doc_version(request: Request, state: &RpcServerState) -> Response {
    let params: DocVersionParams = match parse_params(request.params, &request.id, "doc.version") {
        Ok(params) => params,
        Err(response) => return response,
    };
    let ctx = params.caller.into_context();
    run_editor(state, request.id, move |editor| {
        editor.read_version(&ctx, &params.doc_id, params.version)
    })
    .await
}

/// Structured arrays skip the repairing parser; anything else that might
/// be a payload is handed to it verbatim so failures carry its diagnostics.
fn patch_input(patches: Value) -> Result<PatchInput, String> {
    match patches {
        Value::String(raw) => Ok(PatchInput::Raw(raw)),
        Value::Array(items) => {
            let array = Value::Array(items);
            match serde_json::from_value::<Vec<PatchSpec>>(array.clone()) {
                Ok(specs) => Ok(PatchInput::List(specs)),
                Err(_) => Ok(PatchInput::Raw(array.to_string())),
            }
        }
        Value::Object(map) => Ok(PatchInput::Raw(Value::Object(map).to_string())),
        other => Err(format!("`patches` must be an array or a string, got {other}")),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn parse_params<T: DeserializeOwned>(
    params: Option<Value>,
    request_id: &RequestId,
    method: &str,
) -> Result<T, Response> {
    let Some(params) = params else {
        let reason = format!("{method} requires params");
        return Err(invalid_params_response(request_id.clone(), reason));
    };

    serde_json::from_value::<T>(params).map_err(|error| {
        invalid_params_response(
            request_id.clone(),
            format!("failed to decode {method} params: {error}"),
        )
    })
}

async fn run_editor<T, F>(state: &RpcServerState, request_id: RequestId, op: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&DocumentEditor) -> Result<T, EditError> + Send + 'static,
{
    let editor = Arc::clone(&state.editor);
    match tokio::task::spawn_blocking(move || op(&*editor)).await {
        Ok(Ok(result)) => match serde_json::to_value(result) {
            Ok(value) => Response::success(request_id, value),
            Err(error) => internal_error_response(
                request_id,
                format!("failed to encode result: {error}"),
            ),
        },
        Ok(Err(error)) => edit_error_response(request_id, &error),
        Err(join_error) => {
            error!(error = %join_error, "editor task failed");
            internal_error_response(request_id, format!("editor task failed: {join_error}"))
        }
    }
}

fn edit_error_response(request_id: RequestId, error: &EditError) -> Response {
    let code = error.code();
    if code == ErrorCode::StorageError {
        error!(error = %error, "editor storage failure");
        return Response::error(
            request_id,
            RpcError {
                code: INTERNAL_ERROR,
                message: "Internal error".to_string(),
                data: Some(json!({
                    "code": code.as_str(),
                    "message": error.to_string(),
                    "retryable": error.retryable(),
                    "hint": error.hint(),
                })),
            },
        );
    }

    warn!(code = code.as_str(), error = %error, "editor call failed");
    Response::error(
        request_id,
        RpcError {
            code: EDIT_FAILED,
            message: error.to_string(),
            data: Some(json!({
                "code": code.as_str(),
                "message": error.to_string(),
                "retryable": error.retryable(),
                "hint": error.hint(),
                "details": error.details(),
            })),
        },
    )
}

fn internal_error_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError {
            code: INTERNAL_ERROR,
            message: "Internal error".to_string(),
            data: Some(json!({ "reason": reason })),
        },
    )
}

fn invalid_params_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError {
            code: INVALID_PARAMS,
            message: "Invalid params".to_string(),
            data: Some(json!({ "reason": reason })),
        },
    )
}

//! LSP server implementation using lsp-server (synchronous).
//!
//! Requests are handled one at a time; each navigation request runs
//! `global` once and blocks until it exits.

use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use lsp_server::{Connection, ErrorCode, Message, Notification, Request, RequestId, Response};
use lsp_types::{
    CompletionItem, CompletionList, CompletionOptions, CompletionParams,
    DidChangeConfigurationParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse,
    GotoDefinitionParams, GotoDefinitionResponse, InitializeParams, Location, ReferenceParams,
    ServerCapabilities, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, Url,
    notification::{
        DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument,
        Notification as _,
    },
    request::{Completion, DocumentSymbolRequest, GotoDefinition, References, Request as _},
};
use serde::Serialize;

use super::convert;
use crate::config::{CompletionMode, ConfigStore, GlobalConfiguration};
use crate::document::TextDocument;
use crate::error::{GlobalError, GlobalResult};
use crate::global::Global;
use crate::logging::LogHandle;

pub type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Requests dispatched by [`LspServer::handle_request`]
const HANDLED_REQUESTS: [&str; 4] = [
    GotoDefinition::METHOD,
    References::METHOD,
    Completion::METHOD,
    DocumentSymbolRequest::METHOD,
];

/// Main LSP server state.
struct LspServer {
    connection: Connection,
    documents: HashMap<Url, TextDocument>,
    global: Arc<Global>,
    configuration: GlobalConfiguration,
}

impl LspServer {
    fn new(
        connection: Connection,
        global: Arc<Global>,
        configuration: GlobalConfiguration,
    ) -> Self {
        Self {
            connection,
            documents: HashMap::new(),
            global,
            configuration,
        }
    }

    fn run(&mut self) -> ServerResult<()> {
        loop {
            let msg = self.connection.receiver.recv()?;
            if self.process_message(msg)? {
                return Ok(());
            }
        }
    }

    /// Process a single message. Returns `Ok(true)` if shutdown was requested.
    fn process_message(&mut self, msg: Message) -> ServerResult<bool> {
        match msg {
            Message::Request(req) => {
                if self.connection.handle_shutdown(&req)? {
                    return Ok(true);
                }
                self.handle_request(req)?;
            }
            Message::Response(_) => {
                // We don't send requests, so we shouldn't get responses
            }
            Message::Notification(notif) => {
                self.handle_notification(notif)?;
            }
        }
        Ok(false)
    }

    fn handle_request(&mut self, req: Request) -> ServerResult<()> {
        tracing::debug!(method = %req.method, "Received request");

        if let Some((id, params)) = cast_request::<GotoDefinition>(&req) {
            let result = self.goto_definition(params);
            self.respond(id, result)
        } else if let Some((id, params)) = cast_request::<References>(&req) {
            let result = self.find_references(params);
            self.respond(id, result)
        } else if let Some((id, params)) = cast_request::<Completion>(&req) {
            let result = self.completion(params);
            self.respond(id, result)
        } else if let Some((id, params)) = cast_request::<DocumentSymbolRequest>(&req) {
            let result = self.document_symbols(params);
            self.respond(id, result)
        } else {
            let response = if HANDLED_REQUESTS.contains(&req.method.as_str()) {
                tracing::warn!(method = %req.method, "Malformed request params");
                Response::new_err(
                    req.id,
                    ErrorCode::InvalidParams as i32,
                    format!("Invalid params for {}", req.method),
                )
            } else {
                Response::new_err(
                    req.id,
                    ErrorCode::MethodNotFound as i32,
                    format!("Unhandled method: {}", req.method),
                )
            };
            self.connection.sender.send(Message::Response(response))?;
            Ok(())
        }
    }

    fn handle_notification(&mut self, notif: Notification) -> ServerResult<()> {
        if let Some(params) = cast_notification::<DidOpenTextDocument>(&notif) {
            self.did_open(params);
        } else if let Some(params) = cast_notification::<DidChangeTextDocument>(&notif) {
            self.did_change(params);
        } else if let Some(params) = cast_notification::<DidCloseTextDocument>(&notif) {
            self.did_close(params);
        } else if let Some(params) = cast_notification::<DidChangeConfiguration>(&notif) {
            self.did_change_configuration(params);
        }
        Ok(())
    }

    /// Send a result, or an error response when `global` could not run
    fn respond<T: Serialize>(&self, id: RequestId, result: GlobalResult<T>) -> ServerResult<()> {
        let response = match result {
            Ok(value) => Response::new_ok(id, value),
            Err(e) => {
                tracing::error!(error = %e, "Request failed");
                Response::new_err(id, ErrorCode::InternalError as i32, e.to_string())
            }
        };
        self.connection.sender.send(Message::Response(response))?;
        Ok(())
    }

    fn did_open(&mut self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        tracing::info!(uri = %item.uri, "Document opened");
        let document = TextDocument::from_text(item.uri.clone(), &item.text, item.version);
        self.documents.insert(item.uri, document);
    }

    fn did_change(&mut self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(document) = self.documents.get_mut(&uri) else {
            tracing::warn!(uri = %uri, "Change for a document that is not open");
            return;
        };
        for change in params.content_changes {
            document.apply_change(change.range, &change.text, params.text_document.version);
        }
        tracing::debug!(uri = %uri, version = document.version(), "Document changed");
    }

    fn did_close(&mut self, params: DidCloseTextDocumentParams) {
        tracing::debug!(uri = %params.text_document.uri, "Document closed");
        self.documents.remove(&params.text_document.uri);
    }

    fn did_change_configuration(&mut self, params: DidChangeConfigurationParams) {
        tracing::info!("Configuration changed");
        self.configuration
            .store()
            .set_client_settings(params.settings);
        self.configuration.apply_window_scope_configs();
    }

    /// Open document, or the file on disk when the editor has not opened it
    fn document(&self, uri: &Url) -> GlobalResult<Cow<'_, TextDocument>> {
        if let Some(document) = self.documents.get(uri) {
            return Ok(Cow::Borrowed(document));
        }
        let path = uri.to_file_path().map_err(|_| GlobalError::FileRead {
            path: PathBuf::from(uri.path()),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file URI"),
        })?;
        TextDocument::open(path).map(Cow::Owned)
    }

    fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> GlobalResult<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        tracing::debug!(
            line = position.line,
            character = position.character,
            "Go to Definition request"
        );

        let document = self.document(uri)?;
        let results = self
            .global
            .provide_definition(&document, convert::from_lsp_position(position))?;
        let locations = convert::locations(&results);

        tracing::debug!(count = locations.len(), "Found definitions");
        Ok(Some(GotoDefinitionResponse::Array(locations)))
    }

    fn find_references(&self, params: ReferenceParams) -> GlobalResult<Option<Vec<Location>>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        tracing::debug!(
            line = position.line,
            character = position.character,
            "Find References request"
        );

        let document = self.document(uri)?;
        let results = self
            .global
            .provide_references(&document, convert::from_lsp_position(position))?;
        let locations = convert::locations(&results);

        tracing::debug!(count = locations.len(), "Found references");
        Ok(Some(locations))
    }

    fn completion(&self, params: CompletionParams) -> GlobalResult<Option<CompletionList>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        tracing::debug!(
            line = position.line,
            character = position.character,
            "Completion request"
        );

        let document = self.document(uri)?;
        if self.configuration.completion_mode(document.path()) == CompletionMode::Disabled {
            tracing::debug!(path = %document.path().display(), "Completion disabled");
            return Ok(None);
        }

        let labels = self
            .global
            .provide_completion_items(&document, convert::from_lsp_position(position))?;
        let items: Vec<CompletionItem> = labels
            .into_iter()
            .map(|label| CompletionItem {
                label,
                ..Default::default()
            })
            .collect();

        tracing::debug!(count = items.len(), "Completion items");
        Ok(Some(CompletionList {
            is_incomplete: false,
            items,
        }))
    }

    fn document_symbols(
        &self,
        params: DocumentSymbolParams,
    ) -> GlobalResult<Option<DocumentSymbolResponse>> {
        let uri = &params.text_document.uri;
        tracing::debug!(uri = %uri, "Document symbols request");

        let document = self.document(uri)?;
        let symbols = self.global.provide_document_symbols(&document)?;
        let symbols = convert::symbol_information(&symbols);

        tracing::debug!(count = symbols.len(), "Found document symbols");
        Ok(Some(DocumentSymbolResponse::Flat(symbols)))
    }
}

/// Get the server capabilities.
fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                ..Default::default()
            },
        )),
        definition_provider: Some(lsp_types::OneOf::Left(true)),
        references_provider: Some(lsp_types::OneOf::Left(true)),
        document_symbol_provider: Some(lsp_types::OneOf::Left(true)),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Workspace root from the initialize request, used as the window-scope resource
#[allow(deprecated)] // InitializeParams::root_uri
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(params.root_uri.as_ref())
        .and_then(|uri| uri.to_file_path().ok())
}

/// Register the setters re-run on startup and on every configuration change.
fn register_window_scope_setters(
    configuration: &mut GlobalConfiguration,
    global: &Arc<Global>,
    root: Option<PathBuf>,
    log_handle: Option<LogHandle>,
) {
    let store = configuration.store().clone();
    let global = Arc::clone(global);
    let executable_root = root.clone();
    configuration.register_window_scope_setter(move || {
        let executable: String = store.get(
            "global.executable",
            executable_root.as_deref(),
            "global".to_string(),
        );
        global.set_executable(executable);
        Ok(())
    });

    if let Some(handle) = log_handle {
        let store = configuration.store().clone();
        configuration.register_window_scope_setter(move || {
            let level: String = store.get("log_level", root.as_deref(), "info".to_string());
            handle.set_level(&level)
        });
    }
}

/// Initialize the LSP server with the given connection.
///
/// This performs the LSP initialize handshake, applies the window-scope
/// settings and returns a ready-to-run server.
fn initialize_server(
    connection: Connection,
    store: ConfigStore,
    log_handle: Option<LogHandle>,
) -> ServerResult<LspServer> {
    let capabilities = server_capabilities();
    let server_capabilities = serde_json::to_value(&capabilities)?;
    let init_params = connection.initialize(server_capabilities)?;
    let params: InitializeParams = serde_json::from_value(init_params)?;

    if let Some(options) = params.initialization_options.clone() {
        store.set_client_settings(options);
    }
    let root = workspace_root(&params);
    tracing::info!(root = ?root, "Initialized");

    let global = Arc::new(Global::default());
    let mut configuration = GlobalConfiguration::new(store);
    register_window_scope_setters(&mut configuration, &global, root, log_handle);
    configuration.apply_window_scope_configs();

    match global.version() {
        Ok(version) => tracing::info!(version = %version, "Using GNU Global"),
        Err(e) => tracing::warn!(error = %e, "GNU Global is not available"),
    }

    Ok(LspServer::new(connection, global, configuration))
}

/// Run the server on an established connection until shutdown.
pub fn run(
    connection: Connection,
    store: ConfigStore,
    log_handle: Option<LogHandle>,
) -> ServerResult<()> {
    let mut server = initialize_server(connection, store, log_handle)?;
    server.run()
}

/// Start the LSP server on stdio.
pub fn serve(store: ConfigStore, log_handle: Option<LogHandle>) -> ServerResult<()> {
    let (connection, io_threads) = Connection::stdio();
    run(connection, store, log_handle)?;
    io_threads.join()?;
    Ok(())
}

/// Cast a request to a specific type.
fn cast_request<R: lsp_types::request::Request>(req: &Request) -> Option<(RequestId, R::Params)> {
    if req.method == R::METHOD {
        let params = serde_json::from_value(req.params.clone()).ok()?;
        Some((req.id.clone(), params))
    } else {
        None
    }
}

/// Cast a notification to a specific type.
fn cast_notification<N: lsp_types::notification::Notification>(
    notif: &Notification,
) -> Option<N::Params> {
    if notif.method == N::METHOD {
        serde_json::from_value(notif.params.clone()).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::request::Request as _;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REQUEST_ID: AtomicI32 = AtomicI32::new(1);

    fn next_request_id() -> RequestId {
        RequestId::from(REQUEST_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Test harness that creates a server and client connection pair.
    struct TestHarness {
        server: LspServer,
        client: Connection,
    }

    impl TestHarness {
        fn new(options: serde_json::Value) -> Self {
            use lsp_types::request::Initialize;

            let (server_conn, client_conn) = Connection::memory();

            let init_params = InitializeParams {
                initialization_options: Some(options),
                ..Default::default()
            };
            let init_request = Request::new(
                RequestId::from(0),
                Initialize::METHOD.to_string(),
                init_params,
            );
            client_conn
                .sender
                .send(Message::Request(init_request))
                .unwrap();

            // connection.initialize() waits for the initialized notification
            let initialized = Notification::new("initialized".to_string(), serde_json::json!({}));
            client_conn
                .sender
                .send(Message::Notification(initialized))
                .unwrap();

            let server =
                initialize_server(server_conn, ConfigStore::with_user_config(None), None).unwrap();

            // Client receives initialize response
            let _response = client_conn.receiver.recv().unwrap();

            Self {
                server,
                client: client_conn,
            }
        }

        fn notify<N: lsp_types::notification::Notification>(&mut self, params: N::Params)
        where
            N::Params: Serialize,
        {
            let notif = Notification::new(N::METHOD.to_string(), params);
            self.client
                .sender
                .send(Message::Notification(notif))
                .unwrap();
            let msg = self.server.connection.receiver.recv().unwrap();
            self.server.process_message(msg).unwrap();
        }

        fn open_document(&mut self, uri: &Url, text: &str) {
            self.notify::<DidOpenTextDocument>(DidOpenTextDocumentParams {
                text_document: lsp_types::TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "c".to_string(),
                    version: 1,
                    text: text.to_string(),
                },
            });
        }

        /// Send a request and get the raw response.
        fn request_raw(&mut self, method: &str, params: serde_json::Value) -> Response {
            let id = next_request_id();
            let req = Request::new(id.clone(), method.to_string(), params);
            self.client.sender.send(Message::Request(req)).unwrap();

            let msg = self.server.connection.receiver.recv().unwrap();
            self.server.process_message(msg).unwrap();

            match self.client.receiver.recv().unwrap() {
                Message::Response(resp) => {
                    assert_eq!(resp.id, id);
                    resp
                }
                other => panic!("Expected response message, got {other:?}"),
            }
        }
    }

    fn missing_global() -> serde_json::Value {
        serde_json::json!({ "global": { "executable": "globalnav-test-missing-binary" } })
    }

    fn test_uri() -> Url {
        Url::parse("file:///test/src/main.c").unwrap()
    }

    #[test]
    fn test_capabilities() {
        let caps = server_capabilities();
        assert!(caps.definition_provider.is_some());
        assert!(caps.references_provider.is_some());
        assert!(caps.completion_provider.is_some());
        assert!(caps.document_symbol_provider.is_some());
    }

    #[test]
    fn test_initialization_options_reach_global() {
        let harness = TestHarness::new(missing_global());
        assert_eq!(harness.server.global.executable(), "globalnav-test-missing-binary");
    }

    #[test]
    fn test_did_change_configuration_reapplies_executable() {
        let mut harness = TestHarness::new(missing_global());
        harness.notify::<DidChangeConfiguration>(DidChangeConfigurationParams {
            settings: serde_json::json!({
                "globalnav": { "global": { "executable": "gtags-global" } }
            }),
        });
        assert_eq!(harness.server.global.executable(), "gtags-global");
    }

    #[test]
    fn test_document_lifecycle() {
        let mut harness = TestHarness::new(missing_global());
        let uri = test_uri();
        harness.open_document(&uri, "int foo;\n");
        assert!(harness.server.documents.contains_key(&uri));

        harness.notify::<DidChangeTextDocument>(DidChangeTextDocumentParams {
            text_document: lsp_types::VersionedTextDocumentIdentifier {
                uri: uri.clone(),
                version: 2,
            },
            content_changes: vec![lsp_types::TextDocumentContentChangeEvent {
                range: Some(lsp_types::Range {
                    start: lsp_types::Position::new(0, 4),
                    end: lsp_types::Position::new(0, 7),
                }),
                range_length: None,
                text: "bar".to_string(),
            }],
        });
        assert_eq!(
            harness.server.documents[&uri].word_at(crate::types::Position::new(0, 5)),
            Some("bar".to_string())
        );

        harness.notify::<DidCloseTextDocument>(DidCloseTextDocumentParams {
            text_document: lsp_types::TextDocumentIdentifier { uri: uri.clone() },
        });
        assert!(!harness.server.documents.contains_key(&uri));
    }

    #[test]
    fn test_spawn_failure_is_an_error_response() {
        let mut harness = TestHarness::new(missing_global());
        let uri = test_uri();
        harness.open_document(&uri, "int foo;\n");

        let params = serde_json::json!({
            "textDocument": { "uri": uri },
            "position": { "line": 0, "character": 5 }
        });
        let response = harness.request_raw(GotoDefinition::METHOD, params);
        let error = response.error.expect("expected an error response");
        assert_eq!(error.code, ErrorCode::InternalError as i32);
        assert!(error.message.contains("globalnav-test-missing-binary"));
    }

    #[test]
    fn test_no_word_needs_no_process() {
        let mut harness = TestHarness::new(missing_global());
        let uri = test_uri();
        harness.open_document(&uri, "a = ( b );\n");

        let params = serde_json::json!({
            "textDocument": { "uri": uri },
            "position": { "line": 0, "character": 4 },
            "context": { "includeDeclaration": true }
        });
        let response = harness.request_raw(References::METHOD, params);
        assert!(response.error.is_none());
        assert_eq!(response.result, Some(serde_json::json!([])));
    }

    #[test]
    fn test_completion_disabled_by_client_settings() {
        let mut harness = TestHarness::new(serde_json::json!({
            "global": {
                "executable": "globalnav-test-missing-binary",
                "completion": "Disabled"
            }
        }));
        let uri = test_uri();
        harness.open_document(&uri, "nfs_f");

        let params = serde_json::json!({
            "textDocument": { "uri": uri },
            "position": { "line": 0, "character": 5 }
        });
        let response = harness.request_raw(Completion::METHOD, params);
        assert!(response.error.is_none());
        assert_eq!(response.result, Some(serde_json::Value::Null));
    }

    #[test]
    fn test_unknown_method() {
        let mut harness = TestHarness::new(missing_global());
        let response = harness.request_raw("textDocument/hover", serde_json::json!({}));
        let error = response.error.expect("expected an error response");
        assert_eq!(error.code, ErrorCode::MethodNotFound as i32);
    }

    #[test]
    fn test_malformed_params_are_invalid_params() {
        let mut harness = TestHarness::new(missing_global());
        let params = serde_json::json!({ "textDocument": { "uri": 42 } });
        let response = harness.request_raw(GotoDefinition::METHOD, params);
        let error = response.error.expect("expected an error response");
        assert_eq!(error.code, ErrorCode::InvalidParams as i32);
        assert!(error.message.contains(GotoDefinition::METHOD));
    }
}

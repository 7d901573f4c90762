//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use relay_api::{AppState, build_router};
use relay_auth::JwtEncoder;
use relay_core::config::AppConfig;
use relay_core::protocol::{Message, MessageType};
use relay_core::types::{Role, UserId};
use relay_plugin::prelude::*;
use relay_realtime::{ConnectionHandle, Frame, RelayEngine};

/// Configuration shared by every integration test.
pub fn test_config() -> AppConfig {
    AppConfig::from_toml(
        r#"
        [auth]
        jwt_secret = "integration-test-secret"
        auth_timeout_seconds = 2

        [plugins]
        hook_timeout_ms = 500

        [logging]
        format = "pretty"
        "#,
    )
    .expect("Failed to parse test config")
}

/// An engine plus a token issuer sharing its secret.
pub struct TestRelay {
    /// Engine under test
    pub engine: RelayEngine,
    /// Issues tokens the engine accepts
    pub encoder: JwtEncoder,
}

impl TestRelay {
    /// Create a relay with the default test configuration
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a relay with a custom configuration
    pub fn with_config(config: AppConfig) -> Self {
        let encoder = JwtEncoder::new(&config.auth);
        Self {
            engine: RelayEngine::new(config),
            encoder,
        }
    }

    /// Issue a valid token
    pub fn token(&self, user: &str, role: Role) -> String {
        self.encoder
            .issue(&UserId::from(user), user, role)
            .expect("Failed to issue token")
            .token
    }

    /// Accept and authenticate a connection without a transport
    pub async fn connect(&self, user: &str) -> Arc<ConnectionHandle> {
        self.connect_as(user, Role::User).await
    }

    /// Same as [`connect`](Self::connect) with an explicit role
    pub async fn connect_as(&self, user: &str, role: Role) -> Arc<ConnectionHandle> {
        let router = &self.engine.router;
        let handle = router
            .accept(Some("127.0.0.1:0".to_string()))
            .await
            .expect("Connection refused");
        router
            .authenticate(&handle, &self.token(user, role))
            .await
            .expect("Authentication failed");
        handle
    }

    /// Feed one raw frame to the router
    pub async fn send(&self, handle: &Arc<ConnectionHandle>, raw: &str) -> relay_realtime::RouteOutcome {
        self.engine.router.handle_inbound(handle, raw).await
    }

    /// Load one plugin, panicking on failure
    pub async fn load(&self, plugin: Arc<dyn Plugin>) {
        self.engine
            .plugins
            .load(plugin)
            .await
            .expect("Failed to load plugin");
    }

    /// Build an HTTP app over this relay's engine
    pub fn app(&self) -> TestApp {
        TestApp {
            router: build_router(AppState::new(self.engine.clone())),
        }
    }
}

/// Everything queued for a connection so far.
#[derive(Debug, Default)]
pub struct Inbox {
    /// Decoded messages in arrival order
    pub messages: Vec<Message>,
    /// Close frame, if the connection was closed
    pub close: Option<(u16, String)>,
}

impl Inbox {
    /// Messages of one kind
    pub fn of_kind(&self, kind: MessageType) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.kind() == kind).collect()
    }

    /// Content of every TEXT message
    pub fn texts(&self) -> Vec<&str> {
        self.of_kind(MessageType::Text)
            .into_iter()
            .map(Message::content)
            .collect()
    }
}

/// Take every frame queued for `handle`.
pub fn drain(handle: &ConnectionHandle) -> Inbox {
    let mut inbox = Inbox::default();
    while let Some(frame) = handle.queue().try_recv() {
        match frame {
            Frame::Text(text) => inbox
                .messages
                .push(Message::from_json(&text).expect("Queued frame is not a message")),
            Frame::Close { code, reason } => inbox.close = Some((code, reason)),
        }
    }
    inbox
}

/// A plugin made of hook closures, for exercising the pipeline.
#[derive(Debug)]
pub struct HookPlugin {
    name: String,
    hooks: Vec<(HookPhase, Arc<dyn HookHandler>)>,
}

impl HookPlugin {
    /// Create an empty plugin
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hooks: Vec::new(),
        }
    }

    /// Add a hook
    pub fn with_hook(mut self, phase: HookPhase, handler: Arc<dyn HookHandler>) -> Self {
        self.hooks.push((phase, handler));
        self
    }
}

#[async_trait]
impl Plugin for HookPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(self.name.clone(), "0.0.1")
    }

    async fn activate(
        &self,
        _ctx: &PluginContext,
        registrar: &mut PluginRegistrar<'_>,
    ) -> Result<(), PluginError> {
        for (phase, handler) in &self.hooks {
            registrar.hook(*phase, handler.clone()).await;
        }
        Ok(())
    }
}

/// Test application wrapping the HTTP router
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
}

impl TestApp {
    /// Make a JSON request, optionally with a bearer token
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Test response wrapper
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

/// Serve `relay` on an ephemeral port. Returns the bound address.
pub async fn spawn_server(relay: &TestRelay) -> SocketAddr {
    let app = build_router(AppState::new(relay.engine.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });

    addr
}

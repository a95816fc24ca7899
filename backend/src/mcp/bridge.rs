//! Capability bridge: API routes exposed as invokable tools.
//!
//! At startup every [`RouteBinding`] is matched against the OpenAPI document.
//! A route becomes a [`Capability`] when its operation has a JSON request
//! body whose schema is a resolvable component reference; other routes are
//! skipped quietly. Invocations coerce untyped arguments into the handler's
//! parameter type and always produce an [`InvocationResult`].

use anyhow::Context as _;
use axum::http::Method;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use utoipa::openapi::path::{Operation, PathItem};
use utoipa::openapi::{OpenApi, RefOr};

use crate::identity::CallerContext;

/// Media type whose request-body schema describes a capability's arguments.
const JSON_MEDIA_TYPE: &str = "application/json";

type Invoker =
    dyn Fn(CallerContext, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// A live API handler together with the route it serves.
#[derive(Clone)]
pub struct RouteBinding {
    pub method: Method,
    pub path: String,
    /// Name of the type declaring the handler, e.g. `AccountsApi`.
    pub handler_type: &'static str,
    /// Name of the handler method, e.g. `create_account`.
    pub handler_name: &'static str,
    invoker: Arc<Invoker>,
}

impl RouteBinding {
    /// Bind `handler`, whose single parameter is decoded from JSON arguments.
    pub fn new<P, R, E, F, Fut>(
        method: Method,
        path: impl Into<String>,
        handler_type: &'static str,
        handler_name: &'static str,
        handler: F,
    ) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        E: Into<anyhow::Error> + 'static,
        F: Fn(CallerContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let invoker = move |ctx: CallerContext, args: Value| {
            let handler = Arc::clone(&handler);
            let pending: BoxFuture<'static, anyhow::Result<Value>> = async move {
                let args = if args.is_null() { json!({}) } else { args };
                let params: P = serde_json::from_value(args).context("invalid arguments")?;
                let output = handler(ctx, params)
                    .await
                    .map_err(Into::<anyhow::Error>::into)?;
                Ok(serde_json::to_value(output)?)
            }
            .boxed();
            pending
        };

        Self {
            method,
            path: path.into(),
            handler_type,
            handler_name,
            invoker: Arc::new(invoker),
        }
    }

    /// Capability name: `<handler type>.<handler method>`.
    pub fn capability_name(&self) -> String {
        format!("{}.{}", self.handler_type, self.handler_name)
    }
}

impl std::fmt::Debug for RouteBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBinding")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.capability_name())
            .finish()
    }
}

/// Outcome of one invocation, always produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub payload: String,
    pub is_error: bool,
}

impl InvocationResult {
    pub fn success(payload: String) -> Self {
        Self {
            payload,
            is_error: false,
        }
    }

    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self {
            payload: format!("Error: {}", message),
            is_error: true,
        }
    }

    /// Render as an MCP `tools/call` result.
    pub fn to_tool_result(&self) -> Value {
        json!({
            "content": [{
                "type": "text",
                "text": self.payload,
            }],
            "isError": self.is_error,
        })
    }
}

/// A named, schema-described, invokable operation.
#[derive(Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    /// Request-body schema, exposed verbatim.
    pub input_schema: Value,
    invoker: Arc<Invoker>,
}

impl Capability {
    /// Descriptor as listed by `tools/list`.
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Why a route was left out of the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    NoPathItem,
    NoOperation,
    NoSchemaReference,
    UnresolvedSchema,
}

/// The capability table, built once and immutable afterwards.
#[derive(Default)]
pub struct CapabilityBridge {
    capabilities: HashMap<String, Capability>,
}

impl CapabilityBridge {
    /// Build the table from route bindings and the API description.
    pub fn introspect(routes: impl IntoIterator<Item = RouteBinding>, api: &OpenApi) -> Self {
        let tag_descriptions: HashMap<&str, &str> = api
            .tags
            .iter()
            .flatten()
            .filter_map(|tag| Some((tag.name.as_str(), tag.description.as_deref()?)))
            .collect();

        let mut capabilities = HashMap::new();
        for route in routes {
            match Self::describe(&route, api, &tag_descriptions) {
                Ok(capability) => {
                    debug!(
                        "Registered capability {} for {} {}",
                        capability.name, route.method, route.path
                    );
                    if let Some(previous) = capabilities.insert(capability.name.clone(), capability)
                    {
                        warn!(
                            "Capability name collision: {} replaced by {} {}",
                            previous.name, route.method, route.path
                        );
                    }
                }
                Err(reason) => debug!(
                    "Skipping {} {} ({}): {:?}",
                    route.method,
                    route.path,
                    route.capability_name(),
                    reason
                ),
            }
        }

        info!("Capability bridge ready with {} tools", capabilities.len());
        Self { capabilities }
    }

    fn describe(
        route: &RouteBinding,
        api: &OpenApi,
        tag_descriptions: &HashMap<&str, &str>,
    ) -> Result<Capability, SkipReason> {
        let item = api
            .paths
            .paths
            .get(&route.path)
            .ok_or(SkipReason::NoPathItem)?;
        let operation = operation_for(item, &route.method).ok_or(SkipReason::NoOperation)?;

        let reference = operation
            .request_body
            .as_ref()
            .and_then(|body| body.content.get(JSON_MEDIA_TYPE))
            .and_then(|content| content.schema.as_ref())
            .and_then(|schema| match schema {
                RefOr::Ref(r) => Some(r.ref_location.as_str()),
                RefOr::T(_) => None,
            })
            .filter(|r| !r.trim().is_empty())
            .ok_or(SkipReason::NoSchemaReference)?;

        let schema_name = reference.rsplit('/').next().unwrap_or(reference);
        let schema = api
            .components
            .as_ref()
            .and_then(|c| c.schemas.get(schema_name))
            .and_then(|s| serde_json::to_value(s).ok())
            .ok_or(SkipReason::UnresolvedSchema)?;

        Ok(Capability {
            name: route.capability_name(),
            description: describe_operation(operation, tag_descriptions),
            input_schema: schema,
            invoker: Arc::clone(&route.invoker),
        })
    }

    /// All capabilities, sorted by name.
    pub fn list(&self) -> Vec<&Capability> {
        let mut list: Vec<_> = self.capabilities.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Invoke `name`. Returns `None` only when no such capability exists;
    /// every failure after lookup is folded into the result.
    pub async fn invoke(
        &self,
        ctx: &CallerContext,
        name: &str,
        args: Value,
    ) -> Option<InvocationResult> {
        let capability = self.capabilities.get(name)?;
        let pending = (capability.invoker)(ctx.clone(), args.clone());

        let result = match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(output)) => match serde_json::to_string(&output) {
                Ok(text) => InvocationResult::success(text),
                Err(e) => InvocationResult::failure(e),
            },
            Ok(Err(e)) => {
                error!("Error invoking {}, args: {}: {:#}", name, args, e);
                InvocationResult::failure(format!("{:#}", e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Handler for {} panicked: {}", name, message);
                InvocationResult::failure(message)
            }
        };
        Some(result)
    }
}

fn operation_for<'a>(item: &'a PathItem, method: &Method) -> Option<&'a Operation> {
    match *method {
        Method::GET => item.get.as_ref(),
        Method::POST => item.post.as_ref(),
        Method::PUT => item.put.as_ref(),
        Method::PATCH => item.patch.as_ref(),
        Method::DELETE => item.delete.as_ref(),
        _ => None,
    }
}

/// Tag descriptions joined by `;`, then the operation's own text.
fn describe_operation(operation: &Operation, tag_descriptions: &HashMap<&str, &str>) -> String {
    let tags = operation
        .tags
        .iter()
        .flatten()
        .filter_map(|tag| tag_descriptions.get(tag.as_str()).copied())
        .collect::<Vec<_>>()
        .join(";");
    let text = operation
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or(operation.summary.as_deref())
        .unwrap_or_default();

    [tags.as_str(), text]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

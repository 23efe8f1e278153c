//! Node executor dispatch.
//!
//! One exhaustive dispatch over the closed node-kind set. Every outcome is
//! returned as data — success (with optional output and a degraded flag),
//! failure (with a classified message), or skipped — so nothing unwinds
//! past the coordinator boundary.

use crate::store::MediaStore;
use amber_relay_core::{ExecutionId, WorkflowId};
use amber_relay_generate::{ContentGenerator, ContentKind, GenerateRequest};
use amber_relay_publish::{
    ConnectionLookup, Publisher, RateLimiter, RetryPolicy, deliver, format_content,
};
use amber_relay_workflow::{
    ActionConfig, ContentValue, FallbackPolicy, GeneratorConfig, ModifierConfig, Node, NodeConfig,
    NodeId, TriggerConfig,
};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Per-execution context passed to every node.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The execution this node runs in.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// Trigger payload carried by the job, if any.
    pub payload: Option<JsonValue>,
    /// The instant a scheduled firing was due, if any.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Timeout applied to each external collaborator call.
    pub call_timeout: Duration,
}

/// The terminal outcome of one node's execution, always data.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// The node produced its output (possibly none, for actions).
    Success {
        output: Option<ContentValue>,
        /// True when the output came from a fallback path.
        degraded: bool,
    },
    /// The node failed; downstream nodes will be skipped.
    Failed { error: String },
    /// The node skipped itself (skip fallback); downstream follows.
    Skipped,
}

impl NodeOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }
}

/// Dispatches node execution to the right collaborator per node kind.
pub struct NodeExecutor {
    generator: Arc<dyn ContentGenerator>,
    media: Arc<dyn MediaStore>,
    publisher: Arc<dyn Publisher>,
    connections: Arc<dyn ConnectionLookup>,
    retry: RetryPolicy,
    limiter: Option<RateLimiter>,
    /// Last successful output per generator node, for the cache fallback.
    generation_cache: Mutex<HashMap<(WorkflowId, NodeId), ContentValue>>,
}

impl NodeExecutor {
    /// Creates an executor over the given collaborators.
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        media: Arc<dyn MediaStore>,
        publisher: Arc<dyn Publisher>,
        connections: Arc<dyn ConnectionLookup>,
    ) -> Self {
        Self {
            generator,
            media,
            publisher,
            connections,
            retry: RetryPolicy::default(),
            limiter: None,
            generation_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the publish retry budget.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Installs a client-side rate limiter for publish calls.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Executes one node against its resolved inputs.
    pub async fn execute(
        &self,
        node: &Node,
        inputs: &HashMap<String, ContentValue>,
        ctx: &ExecutionContext,
    ) -> NodeOutcome {
        match &node.config {
            NodeConfig::Trigger(config) => Self::run_trigger(config, ctx),
            NodeConfig::Generator(config) => self.run_generator(node.id, config, inputs, ctx).await,
            NodeConfig::Modifier(config) => self.run_modifier(config, inputs, ctx).await,
            NodeConfig::Action(config) => self.run_action(node.id, config, inputs, ctx).await,
        }
    }

    /// Triggers materialize their firing payload as their single output:
    /// the webhook body or manual data verbatim, or the scheduled instant.
    fn run_trigger(_config: &TriggerConfig, ctx: &ExecutionContext) -> NodeOutcome {
        let value = if let Some(payload) = &ctx.payload {
            ContentValue::Data(payload.clone())
        } else if let Some(instant) = ctx.scheduled_for {
            ContentValue::Data(serde_json::json!({ "scheduled_for": instant.to_rfc3339() }))
        } else {
            ContentValue::Data(serde_json::json!({}))
        };
        NodeOutcome::Success {
            output: Some(value),
            degraded: false,
        }
    }

    async fn run_generator(
        &self,
        node_id: NodeId,
        config: &GeneratorConfig,
        inputs: &HashMap<String, ContentValue>,
        ctx: &ExecutionContext,
    ) -> NodeOutcome {
        let (kind, prompt, model) = match config {
            GeneratorConfig::Text { prompt, model, .. } => (ContentKind::Text, prompt, model),
            GeneratorConfig::Image { prompt, model, .. } => (ContentKind::Image, prompt, model),
        };

        let mut request = GenerateRequest::new(kind, prompt.clone(), model.clone());
        if let Some(context) = inputs.get("context").and_then(ContentValue::as_text) {
            request = request.with_param("context", JsonValue::String(context.to_string()));
        }

        let cause = match tokio::time::timeout(ctx.call_timeout, self.generator.generate(&request))
            .await
        {
            Ok(Ok(content)) => {
                self.generation_cache
                    .lock()
                    .unwrap()
                    .insert((ctx.workflow_id, node_id), content.clone());
                return NodeOutcome::Success {
                    output: Some(content),
                    degraded: false,
                };
            }
            Ok(Err(error)) => error.to_string(),
            Err(_elapsed) => format!(
                "generation call exceeded its {}ms timeout",
                ctx.call_timeout.as_millis()
            ),
        };

        tracing::warn!(
            workflow = %ctx.workflow_id,
            node = %node_id,
            %cause,
            "generator call failed; applying fallback"
        );
        self.apply_fallback(node_id, config.fallback(), ctx, &cause)
    }

    fn apply_fallback(
        &self,
        node_id: NodeId,
        fallback: &FallbackPolicy,
        ctx: &ExecutionContext,
        cause: &str,
    ) -> NodeOutcome {
        match fallback {
            FallbackPolicy::Cache => {
                let cached = self
                    .generation_cache
                    .lock()
                    .unwrap()
                    .get(&(ctx.workflow_id, node_id))
                    .cloned();
                match cached {
                    Some(content) => NodeOutcome::Success {
                        output: Some(content),
                        degraded: true,
                    },
                    None => NodeOutcome::failed(format!(
                        "{cause}; no cached output available to fall back to"
                    )),
                }
            }
            FallbackPolicy::Template { text } => NodeOutcome::Success {
                output: Some(ContentValue::Text(text.clone())),
                degraded: true,
            },
            FallbackPolicy::Skip => NodeOutcome::Skipped,
            FallbackPolicy::None => NodeOutcome::failed(cause.to_string()),
        }
    }

    /// Modifiers are deterministic transforms; they fail only on malformed
    /// input.
    async fn run_modifier(
        &self,
        config: &ModifierConfig,
        inputs: &HashMap<String, ContentValue>,
        ctx: &ExecutionContext,
    ) -> NodeOutcome {
        let Some(input) = inputs.get("input") else {
            return NodeOutcome::failed("modifier input is missing");
        };

        match config {
            ModifierConfig::TruncateText { max_chars } => match input.as_text() {
                Some(text) => {
                    let kept: String = text.chars().take(*max_chars as usize).collect();
                    NodeOutcome::Success {
                        output: Some(ContentValue::Text(kept)),
                        degraded: false,
                    }
                }
                None => NodeOutcome::failed("truncate expects text input"),
            },
            ModifierConfig::RenderTemplate { template } => match input.as_text() {
                Some(text) => NodeOutcome::Success {
                    output: Some(ContentValue::Text(template.replace("{input}", text))),
                    degraded: false,
                },
                None => NodeOutcome::failed("template rendering expects text input"),
            },
            ModifierConfig::ResizeImage { width, height } => {
                let ContentValue::Image(media) = input else {
                    return NodeOutcome::failed("resize expects an image input");
                };
                match tokio::time::timeout(
                    ctx.call_timeout,
                    self.media.resize(media, *width, *height),
                )
                .await
                {
                    Ok(Ok(resized)) => NodeOutcome::Success {
                        output: Some(ContentValue::Image(resized)),
                        degraded: false,
                    },
                    Ok(Err(error)) => NodeOutcome::failed(format!("resize failed: {error}")),
                    Err(_elapsed) => NodeOutcome::failed(format!(
                        "resize call exceeded its {}ms timeout",
                        ctx.call_timeout.as_millis()
                    )),
                }
            }
        }
    }

    /// Actions format, validate, resolve the connection, then deliver.
    /// The dedupe key (`executionId:nodeId`) makes retried deliveries safe.
    async fn run_action(
        &self,
        node_id: NodeId,
        config: &ActionConfig,
        inputs: &HashMap<String, ContentValue>,
        ctx: &ExecutionContext,
    ) -> NodeOutcome {
        let ActionConfig::Publish {
            platform,
            connection,
        } = config;

        let Some(raw) = inputs.get("content") else {
            return NodeOutcome::failed("no content to publish");
        };

        // Fail fast on non-compliant content: no network call is made.
        let post = match format_content(raw, *platform) {
            Ok(post) => post,
            Err(error) => return NodeOutcome::failed(error.to_string()),
        };

        let handle = match self.connections.lookup(*connection).await {
            Ok(handle) => handle,
            Err(error) => return NodeOutcome::failed(error.to_string()),
        };
        if !handle.valid {
            return NodeOutcome::failed(format!(
                "connection {connection} has expired credentials: reconnect the account"
            ));
        }
        if handle.platform != *platform {
            return NodeOutcome::failed(format!(
                "connection {connection} belongs to {}, not {platform}",
                handle.platform
            ));
        }

        let dedupe_key = format!("{}:{node_id}", ctx.execution_id);
        match deliver(
            self.publisher.as_ref(),
            &post,
            &handle,
            &dedupe_key,
            self.retry,
            self.limiter.as_ref(),
        )
        .await
        {
            Ok(receipt) => {
                tracing::info!(
                    workflow = %ctx.workflow_id,
                    node = %node_id,
                    platform = %platform,
                    post_id = %receipt.post_id,
                    "published"
                );
                NodeOutcome::Success {
                    output: None,
                    degraded: false,
                }
            }
            Err(error) => NodeOutcome::failed(error.to_string()),
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rewrite the outbound request body (spec §4.H). Produces a new body and
//! leaves the caller's original untouched — the dynamically typed request
//! is modeled as a JSON object mutated through a handful of focused passes
//! rather than a closed Rust struct (Design Note "Dynamically typed request
//! bodies": preserve unknown keys).

use serde_json::{json, Map, Value};

use crate::normalizer::{self, Effort, ModelFamily};

const MAX_TRUNCATED_OUTPUT: usize = 16_000;
const TRUNCATION_SUFFIX: &str = "\n...[truncated]";
const ENV_MARKERS: &[&str] =
    &["<env>", "<instructions>", "here is some useful information about the environment", "instructions from:"];

/// Knobs the Transformer needs beyond the request body itself.
#[derive(Debug, Clone, Default)]
pub struct TransformConfig {
    pub codex_mode: bool,
    pub host_name: String,
    /// A cached copy of the host agent's own system prompt, used for the
    /// stable prefix/equality match in Codex-mode host-prompt stripping.
    pub known_host_prompt: Option<String>,
    pub configured_include: Vec<String>,
    pub global_reasoning_effort: Option<String>,
    pub model_reasoning_overrides: Vec<(String, String)>,
    pub default_verbosity: String,
}

impl TransformConfig {
    pub fn codex(host_name: impl Into<String>) -> Self {
        Self {
            codex_mode: true,
            host_name: host_name.into(),
            known_host_prompt: None,
            configured_include: Vec::new(),
            global_reasoning_effort: None,
            model_reasoning_overrides: Vec::new(),
            default_verbosity: "medium".to_string(),
        }
    }
}

/// System-instructions text selected by the narrow `model_family_tag`
/// (spec §4.G / §4.H step 2).
pub fn system_instructions_for_family(tag: &str) -> &'static str {
    match tag {
        "gpt-5.2-codex" => "You are gpt-5.2-codex, an agentic coding model operating inside the Codex CLI.",
        "codex-max" => "You are codex-max, an agentic coding model with extended context operating inside the Codex CLI.",
        "codex" => "You are codex, an agentic coding model operating inside the Codex CLI.",
        "gpt-5.2" => "You are gpt-5.2, a general-purpose assistant.",
        _ => "You are gpt-5.1, a general-purpose assistant.",
    }
}

/// Rewrite `body` per spec §4.H. Never mutates the input.
pub fn transform(body: &Value, config: &TransformConfig) -> Value {
    let mut out = body.as_object().cloned().unwrap_or_default();

    let family = out
        .get("model")
        .and_then(Value::as_str)
        .map(normalizer::normalize)
        .unwrap_or(ModelFamily::Gpt51);
    out.insert("model".to_string(), json!(family.canonical_id()));

    out.insert("store".to_string(), json!(false));
    out.insert("stream".to_string(), json!(true));
    out.insert("instructions".to_string(), json!(system_instructions_for_family(family.family_tag())));

    if let Some(Value::Array(items)) = out.remove("input") {
        let tools_present = out.contains_key("tools");
        let cleaned = clean_input(items, config, tools_present);
        out.insert("input".to_string(), Value::Array(cleaned));
    }

    let reasoning = resolve_reasoning(&out, family, config);
    out.insert("reasoning".to_string(), reasoning);

    let verbosity = resolve_verbosity(&out, config);
    out.entry("text".to_string()).or_insert_with(|| json!({})).as_object_mut().map(|text| {
        text.insert("verbosity".to_string(), json!(verbosity));
    });

    let include = resolve_include(&out, config);
    out.insert("include".to_string(), json!(include));

    out.remove("max_output_tokens");
    out.remove("max_completion_tokens");

    Value::Object(out)
}

fn clean_input(items: Vec<Value>, config: &TransformConfig, tools_present: bool) -> Vec<Value> {
    let mut items: Vec<Value> = items
        .into_iter()
        .filter(|item| item.get("type").and_then(Value::as_str) != Some("item_reference"))
        .map(|mut item| {
            if let Some(obj) = item.as_object_mut() {
                obj.remove("id");
            }
            item
        })
        .collect();

    if config.codex_mode {
        items = strip_host_prompts(items, config);
    }

    items = normalize_orphaned_tool_outputs(items);

    if tools_present {
        items.insert(0, tool_bridge_message(config.codex_mode));
    }

    items
}

fn strip_host_prompts(items: Vec<Value>, config: &TransformConfig) -> Vec<Value> {
    items
        .into_iter()
        .map(|item| {
            let role = item.get("role").and_then(Value::as_str);
            if !matches!(role, Some("system") | Some("developer")) {
                return item;
            }
            let Some(content) = item.get("content").and_then(Value::as_str) else { return item };
            if !is_host_prompt(content, config) {
                return item;
            }

            let mut item = item;
            let replacement = earliest_env_marker(content).map(str::to_string).unwrap_or_default();
            if let Some(obj) = item.as_object_mut() {
                obj.insert("content".to_string(), json!(replacement));
            }
            item
        })
        .collect()
}

fn is_host_prompt(content: &str, config: &TransformConfig) -> bool {
    if let Some(known) = &config.known_host_prompt {
        let content_head: String = content.chars().take(200).collect();
        let known_head: String = known.chars().take(200).collect();
        if content == known || content.starts_with(known.as_str()) || content_head == known_head {
            return true;
        }
    }

    let lower = content.to_lowercase();
    let prefix: String = lower.chars().take(200).collect();
    let host_signature = format!("you are {}, an agent", config.host_name.to_lowercase());
    prefix.starts_with("you are a coding agent running in the") || prefix.starts_with(&host_signature)
}

fn earliest_env_marker(content: &str) -> Option<&str> {
    ENV_MARKERS
        .iter()
        .filter_map(|marker| content.find(marker))
        .min()
        .map(|idx| &content[idx..])
}

fn tool_bridge_message(codex_mode: bool) -> Value {
    let content = if codex_mode {
        "You have access to host-provided tools. Call them using the standard function-call \
         protocol; results are bridged back through this conversation as the host executes them."
    } else {
        "Tool calls in this conversation are remapped from the host's native tool protocol."
    };
    json!({ "type": "message", "role": "developer", "content": content })
}

/// Rewrite any `*_call_output` item whose `call_id` is missing or unmatched
/// by a same-request call of the corresponding type into a plain assistant
/// message. Running this twice is a no-op (spec §8 property 6): the second
/// pass sees only `message` items where the first pass acted, and those
/// items are not `*_call_output` items so nothing further changes, and the
/// `call_id`s that *did* match continue to match identically.
pub fn normalize_orphaned_tool_outputs(items: Vec<Value>) -> Vec<Value> {
    let mut function_calls = std::collections::HashSet::new();
    let mut shell_calls = std::collections::HashSet::new();
    let mut custom_calls = std::collections::HashSet::new();

    for item in &items {
        let Some(id) = item.get("call_id").and_then(Value::as_str) else { continue };
        match item.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                function_calls.insert(id.to_string());
            }
            Some("local_shell_call") => {
                shell_calls.insert(id.to_string());
            }
            Some("custom_tool_call") => {
                custom_calls.insert(id.to_string());
            }
            _ => {}
        }
    }

    items
        .into_iter()
        .map(|item| {
            let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
            let matching_set = match item_type.as_str() {
                "function_call_output" => Some(&function_calls),
                "local_shell_call_output" => Some(&shell_calls),
                "custom_tool_call_output" => Some(&custom_calls),
                _ => None,
            };
            let Some(set) = matching_set else { return item };

            let call_id = item.get("call_id").and_then(Value::as_str);
            if call_id.is_some_and(|id| set.contains(id)) {
                return item;
            }

            let tool_name = item.get("name").and_then(Value::as_str).unwrap_or("tool");
            let id_display = call_id.unwrap_or("unknown");
            let output = output_as_string(item.get("output"));
            let content = format!("[Previous {tool_name} result; call_id={id_display}]: {}", truncate(&output));
            json!({ "type": "message", "role": "assistant", "content": content })
        })
        .collect()
}

fn output_as_string(output: Option<&Value>) -> String {
    match output {
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
        None => String::new(),
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_TRUNCATED_OUTPUT {
        return s.to_string();
    }
    let truncated: String = s.chars().take(MAX_TRUNCATED_OUTPUT).collect();
    format!("{truncated}{TRUNCATION_SUFFIX}")
}

fn resolve_reasoning(body: &Map<String, Value>, family: ModelFamily, config: &TransformConfig) -> Value {
    let requested = body
        .get("reasoning")
        .and_then(|r| r.get("effort"))
        .and_then(Value::as_str)
        .or_else(|| {
            body.get("providerOptions")
                .and_then(|p| p.get("openai"))
                .and_then(|o| o.get("reasoningEffort").or_else(|| o.get("reasoning_effort")))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .or_else(|| {
            config
                .model_reasoning_overrides
                .iter()
                .find(|(model, _)| model == family.canonical_id())
                .map(|(_, effort)| effort.clone())
        })
        .or_else(|| config.global_reasoning_effort.clone());

    let parsed = requested.as_deref().and_then(parse_effort).unwrap_or_else(|| family.default_effort());
    let coerced = family.coerce_effort(parsed);

    json!({ "effort": effort_str(coerced), "encrypted_content": true })
}

fn resolve_verbosity(body: &Map<String, Value>, config: &TransformConfig) -> String {
    body.get("text")
        .and_then(|t| t.get("verbosity"))
        .and_then(Value::as_str)
        .or_else(|| {
            body.get("providerOptions")
                .and_then(|p| p.get("openai"))
                .and_then(|o| o.get("verbosity"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| config.default_verbosity.clone())
}

/// Union of the request body's own `include`, the statically configured
/// list (`TransformConfig.configured_include`), and the always-added
/// `reasoning.encrypted_content` entry (spec §4.H step 6).
fn resolve_include(body: &Map<String, Value>, config: &TransformConfig) -> Vec<String> {
    let mut include: Vec<String> = body
        .get("include")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    include.extend(config.configured_include.iter().cloned());
    include.push("reasoning.encrypted_content".to_string());
    include.retain(|s| !s.is_empty());
    include.sort();
    include.dedup();
    include
}

fn parse_effort(s: &str) -> Option<Effort> {
    match s {
        "minimal" => Some(Effort::Minimal),
        "low" => Some(Effort::Low),
        "medium" => Some(Effort::Medium),
        "high" => Some(Effort::High),
        "xhigh" => Some(Effort::Xhigh),
        "none" => Some(Effort::None),
        _ => None,
    }
}

fn effort_str(effort: Effort) -> &'static str {
    match effort {
        Effort::Minimal => "minimal",
        Effort::Low => "low",
        Effort::Medium => "medium",
        Effort::High => "high",
        Effort::Xhigh => "xhigh",
        Effort::None => "none",
    }
}

#[cfg(test)]
#[path = "transformer_tests.rs"]
mod tests;

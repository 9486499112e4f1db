//! Live oracle adapters for the Grok and Gemini planning APIs.

use std::env;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::ports::{Oracle, OracleError, OracleKind, PlanFuture, PlanRequest, PlanResponse};

const GROK_API_URL: &str = "https://api.grok.x.ai/v1/chat/completions";
const GROK_MODEL: &str = "grok-3";
const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

/// Live oracle that calls the configured planning backend.
pub struct LiveOracle {
    client: Client,
    kind: OracleKind,
}

impl LiveOracle {
    /// Creates a live oracle for the given backend.
    #[must_use]
    pub fn new(kind: OracleKind) -> Self {
        Self { client: Client::new(), kind }
    }

    async fn plan_grok(&self, prompt: String) -> Result<PlanResponse, OracleError> {
        let api_key = env::var("XAI_API_KEY").map_err(|_| {
            OracleError::Transport("XAI_API_KEY environment variable not set".into())
        })?;
        let body = json!({
            "model": GROK_MODEL,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(GROK_API_URL)
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(format!("grok request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(format!("grok response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(OracleError::Transport(format!(
                "grok API error ({}): {text}",
                status.as_u16()
            )));
        }

        let parsed: GrokResponse = serde_json::from_str(&text)
            .map_err(|e| OracleError::Parse(format!("grok response envelope: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Parse("grok response had no choices".into()))?;
        parse_plan(&content)
    }

    async fn plan_gemini(&self, prompt: String) -> Result<PlanResponse, OracleError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            OracleError::Transport("GEMINI_API_KEY environment variable not set".into())
        })?;
        let body = json!({"contents": [{"parts": [{"text": prompt}]}]});

        let response = self
            .client
            .post(format!("{GEMINI_API_URL}?key={api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(format!("gemini request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(format!("gemini response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(OracleError::Transport(format!(
                "gemini API error ({}): {text}",
                status.as_u16()
            )));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| OracleError::Parse(format!("gemini response envelope: {e}")))?;
        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| OracleError::Parse("gemini response had no candidates".into()))?;
        parse_plan(&content)
    }
}

impl Oracle for LiveOracle {
    fn plan(&self, request: &PlanRequest) -> PlanFuture<'_> {
        let prompt = render_prompt(request);
        Box::pin(async move {
            match self.kind {
                OracleKind::Grok => self.plan_grok(prompt).await,
                OracleKind::Gemini => self.plan_gemini(prompt).await,
            }
        })
    }
}

/// Top-level response from the Grok chat completions API.
#[derive(Deserialize)]
struct GrokResponse {
    choices: Vec<GrokChoice>,
}

#[derive(Deserialize)]
struct GrokChoice {
    message: GrokMessage,
}

#[derive(Deserialize)]
struct GrokMessage {
    content: String,
}

/// Top-level response from the Gemini generateContent API.
#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: String,
}

/// Renders the full planning prompt for one request.
///
/// The model is stateless between iterations; the digest JSON is its
/// only memory, so the prompt restates the command, the supported
/// action grammar, and the guardrails every time.
fn render_prompt(request: &PlanRequest) -> String {
    let digest_json = serde_json::to_string_pretty(&request.digest).unwrap_or_default();
    let features = request
        .digest
        .metadata
        .features
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You are an expert coder continuing a long-term software project. You have no \
         memory of past interactions; rely on the provided context to stay aligned with \
         the project's state and goals.\n\n\
         **User Command**: '{}'\n\
         **Current Iteration**: {}\n",
        request.command, request.iteration
    );
    if let Some(failed) = &request.failed_task {
        prompt.push_str(&format!("**Previous Task Failed**: {failed}\n"));
    }
    if request.retry {
        prompt.push_str("**Retry Attempt**: Correct previous invalid response\n");
    }
    prompt.push_str(&format!(
        "\n**Project Context Summary**:\n{digest_json}\n\n\
         **Instructions**:\n\
         - Respond with a JSON object containing a \"tasks\" array.\n\
         - Supported actions:\n\
           - create_directory: {{\"path\": \"dir_name\"}}\n\
           - create_venv: {{\"path\": \"dir_name\", \"name\": \"venv_name\"}}\n\
           - set_language: {{\"language\": \"python|nodejs\"}}\n\
           - create_file: {{\"path\": \"file_path\", \"content\": \"file_content\"}}\n\
           - modify_file: {{\"path\": \"file_path\", \"content\": \"new_content\"}}\n\
           - delete_file: {{\"path\": \"file_path\"}}\n\
           - install_dependency: {{\"package\": \"name\", \"version\": \"version\"}}\n\
           - init_git: {{\"path\": \"repo_path\"}}\n\
           - git_commit: {{\"path\": \"repo_path\", \"message\": \"commit_message\"}}\n\
           - git_branch: {{\"path\": \"repo_path\", \"branch\": \"branch_name\"}}\n\
           - git_push: {{\"path\": \"repo_path\", \"remote\": \"remote_url\", \"branch\": \"branch_name\"}}\n\
           - run_script: {{\"path\": \"script_path\"}}\n\
           - create_test: {{\"path\": \"test_file_path\", \"content\": \"test_content\"}}\n\
           - run_test: {{\"path\": \"test_file_path\"}}\n\
           - generate_docs: {{\"path\": \"doc_path\", \"content\": \"doc_content\"}}\n\
           - run_lint: {{\"path\": \"file_path\", \"tool\": \"flake8|eslint\", \"fix\": true}}\n\
         - Include \"depends_on\": [task_indices] and \"feature\": \"feature_name\" per task.\n\n\
         **Guardrails**:\n\
         - Base tasks on the user command and context. Do not re-implement existing \
           features: [{features}].\n\
         - Integrate with existing code (see file_summaries); do not modify files \
           unnecessarily.\n\
         - Prioritize the listed issues and missing features.\n\
         - Check recent_tasks to avoid repeating work.\n\
         - If a failed task is provided, suggest recovery tasks for it.\n\
         - If the project scores >= 80 with no issues, return an empty tasks list.\n"
    ));
    prompt
}

/// Parses the model's reply into a plan, tolerating code fences.
fn parse_plan(text: &str) -> Result<PlanResponse, OracleError> {
    let stripped = strip_code_fences(text);
    serde_json::from_str(stripped).map_err(|e| OracleError::Parse(format!("plan JSON: {e}")))
}

/// Removes a surrounding ```/```json fence if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

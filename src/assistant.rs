//!
//! intelhub assistant
//! ------------------
//! Conversation state for the analyst chat panel. The model call sits behind
//! `ChatBackend`; this module owns the system prompt, the history and the
//! access check that gates a domain-specific context.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domains::{Dataset, ItTicket, SecurityIncident};
use crate::error::{AuthError, AuthResult};
use crate::identity::{authorize, Domain, Identity};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// What the assistant is currently specialised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssistantDomain {
    General,
    Domain(Domain),
}

impl AssistantDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantDomain::General => "general",
            AssistantDomain::Domain(d) => d.as_str(),
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AssistantDomain::General => GENERAL_PROMPT,
            AssistantDomain::Domain(Domain::Cybersecurity) => CYBER_PROMPT,
            AssistantDomain::Domain(Domain::DataScience) => DATA_PROMPT,
            AssistantDomain::Domain(Domain::ItOperations) => ITOPS_PROMPT,
        }
    }
}

impl fmt::Display for AssistantDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

const GENERAL_PROMPT: &str = "You assist analysts on an intelligence platform that spans \
cybersecurity, data science and IT operations. Give accurate, practical answers.";

const CYBER_PROMPT: &str = "You are a security analysis assistant. Assess incidents, \
identify likely attack vectors and recommend mitigations aligned with NIST, ISO 27001 \
and MITRE ATT&CK. Answer in structured bullet points.";

const DATA_PROMPT: &str = "You are a data science assistant. Explain dataset \
characteristics, suggest processing and analysis techniques and flag data quality \
problems. Use concrete examples.";

const ITOPS_PROMPT: &str = "You are an IT operations assistant. Troubleshoot incidents, \
prioritise urgent issues and give step-by-step resolution guides with preventive \
follow-ups.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new<S: Into<String>>(role: ChatRole, content: S) -> Self { Self { role, content: content.into() } }
}

/// Failure of a guarded assistant action: either the caller lacks the domain
/// or the model call failed.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Denied(#[from] AuthError),
    #[error("chat backend: {0}")]
    Backend(#[from] anyhow::Error),
}

/// A chat-completion provider.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

pub struct Assistant {
    backend: Arc<dyn ChatBackend>,
    model: String,
    domain: AssistantDomain,
    history: Vec<ChatMessage>,
}

impl Assistant {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self { Self::with_model(backend, DEFAULT_MODEL) }

    pub fn with_model<S: Into<String>>(backend: Arc<dyn ChatBackend>, model: S) -> Self {
        Self { backend, model: model.into(), domain: AssistantDomain::General, history: Vec::new() }
    }

    pub fn model(&self) -> &str { &self.model }

    pub fn domain(&self) -> AssistantDomain { self.domain }

    pub fn history(&self) -> &[ChatMessage] { &self.history }

    /// Switch context. A business domain requires the caller to hold it;
    /// on denial the current context is kept.
    pub fn set_domain(&mut self, who: &Identity, domain: AssistantDomain) -> AuthResult<()> {
        if let AssistantDomain::Domain(d) = domain {
            authorize(who, d)?;
        }
        debug!(target: "assistant", user = %who.username(), domain = %domain, "assistant domain set");
        self.domain = domain;
        Ok(())
    }

    pub fn clear_conversation(&mut self) { self.history.clear(); }

    /// Send one user turn. Optional `context` is appended as a `Context:` block.
    /// If the backend fails the history is left as it was before the call.
    pub fn send_message(&mut self, text: &str, context: Option<&str>) -> anyhow::Result<String> {
        let content = match context.filter(|c| !c.is_empty()) {
            Some(ctx) => format!("{}\n\nContext:\n{}", text, ctx),
            None => text.to_string(),
        };
        self.history.push(ChatMessage::new(ChatRole::User, content));

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::new(ChatRole::System, self.domain.system_prompt()));
        messages.extend(self.history.iter().cloned());

        match self.backend.complete(&self.model, &messages) {
            Ok(reply) => {
                self.history.push(ChatMessage::new(ChatRole::Assistant, reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                warn!(target: "assistant", error = %e, model = %self.model, "chat backend call failed");
                Err(e)
            }
        }
    }

    pub fn analyse_incident(&mut self, who: &Identity, incident: &SecurityIncident) -> Result<String, AssistantError> {
        self.set_domain(who, AssistantDomain::Domain(Domain::Cybersecurity))?;
        let prompt = format!(
            "Analyse this security incident and provide:\n1. Threat severity assessment\n2. Likely attack vectors\n3. Immediate actions\n4. Preventive measures\n\nIncident Details:\n{}",
            incident.ai_context()
        );
        Ok(self.send_message(&prompt, None)?)
    }

    pub fn analyse_dataset(&mut self, who: &Identity, dataset: &Dataset) -> Result<String, AssistantError> {
        self.set_domain(who, AssistantDomain::Domain(Domain::DataScience))?;
        let prompt = format!(
            "Analyse this dataset and provide:\n1. Data quality considerations\n2. Suitable analysis techniques\n3. Visualisation ideas\n4. Storage or processing concerns\n\nDataset Details:\n{}",
            dataset.ai_context()
        );
        Ok(self.send_message(&prompt, None)?)
    }

    pub fn troubleshoot_ticket(&mut self, who: &Identity, ticket: &ItTicket) -> Result<String, AssistantError> {
        self.set_domain(who, AssistantDomain::Domain(Domain::ItOperations))?;
        let prompt = format!(
            "Help resolve this IT ticket:\n1. Probable root causes\n2. Step-by-step resolution\n3. Verification steps\n4. Prevention\n\nTicket Details:\n{}",
            ticket.ai_context()
        );
        Ok(self.send_message(&prompt, None)?)
    }
}

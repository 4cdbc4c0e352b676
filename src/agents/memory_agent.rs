//! User memory: nicknames, remembered facts and per-user context.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::base_agent::{AgentProfile, BaseAgent};
use crate::memory::records::{UserRecord, UserUpdate};
use crate::memory::storage::RecordStore;
use crate::utilities::errors::ServiceResult;
use crate::utilities::text_processing::extract_nickname;

static REMEMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*(?:please\s+)?remember(?:\s+that)?\s*:?\s+(.+)$").unwrap());

pub const NICKNAME_HELP: &str =
    "I couldn't understand what nickname you'd like to use. Please try again with something like 'call me John'.";

pub struct MemoryAgent {
    profile: AgentProfile,
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for MemoryAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAgent")
            .field("backend", &self.store.backend())
            .finish_non_exhaustive()
    }
}

impl MemoryAgent {
    pub fn new(store: Arc<dyn RecordStore>, verbose: bool) -> Self {
        Self {
            profile: AgentProfile::new("Memory Manager", "User memory and context specialist")
                .with_verbose(verbose),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Store the nickname from `prompt` and return the confirmation text.
    ///
    /// When no nickname can be extracted the help text is returned and
    /// nothing is written.
    pub async fn handle_nickname_command(
        &self,
        prompt: &str,
        user_id: &str,
        display_name: Option<&str>,
    ) -> ServiceResult<String> {
        let Some(nickname) = extract_nickname(prompt) else {
            return Ok(NICKNAME_HELP.to_string());
        };
        self.store_user_nickname(user_id, &nickname, display_name).await?;
        log::info!("Stored nickname {} for {}", nickname, user_id);
        Ok(format!("Got it! I'll call you {} from now on.", nickname))
    }

    pub async fn store_user_nickname(
        &self,
        user_id: &str,
        nickname: &str,
        display_name: Option<&str>,
    ) -> ServiceResult<UserRecord> {
        self.store
            .upsert_user(
                user_id,
                UserUpdate {
                    display_name: display_name.map(str::to_string),
                    preferred_name: Some(nickname.to_string()),
                },
            )
            .await
    }

    /// The fact in "remember that X" / "please remember X", if any.
    pub fn extract_fact(prompt: &str) -> Option<String> {
        REMEMBER_PATTERN
            .captures(prompt)
            .map(|caps| caps[1].trim().trim_end_matches('.').trim().to_string())
            .filter(|f| !f.is_empty())
    }

    pub async fn remember(&self, prompt: &str, user_id: &str) -> ServiceResult<String> {
        let Some(fact) = Self::extract_fact(prompt) else {
            return Ok("Tell me what to remember, for example 'remember that I prefer short answers'.".to_string());
        };
        self.store.append_memory_fact(user_id, &fact).await?;
        Ok(format!("Got it! I'll remember that {}.", fact))
    }

    /// Summary of everything stored about the user.
    pub async fn describe_memory(&self, user_id: &str, display_name: &str) -> ServiceResult<String> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(format!(
                "I don't have anything stored about you yet, {}. You can say 'call me <name>' or 'remember that ...'.",
                display_name
            ));
        };

        let mut lines = vec![format!(
            "Here's what I know about you, {}:",
            user.addressed_as().unwrap_or(display_name)
        )];
        if let Some(ref nickname) = user.preferred_name {
            lines.push(format!("• You asked me to call you {}", nickname));
        }
        for (key, value) in &user.preferences {
            let value = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            lines.push(format!("• Preference {}: {}", key, value));
        }
        for fact in &user.memory_facts {
            lines.push(format!("• {}", fact));
        }
        if lines.len() == 1 {
            lines.push("• Nothing beyond your name yet.".to_string());
        }
        Ok(lines.join("\n"))
    }

    /// "You are talking to X." plus stored notes and facts.
    pub async fn fetch_user_context(&self, user_id: &str, display_name: &str) -> ServiceResult<String> {
        let user = self.store.get_user(user_id).await?;
        let name = user
            .as_ref()
            .and_then(|u| u.preferred_name.as_deref())
            .unwrap_or(display_name);

        let mut context = format!("You are talking to {}.", name);
        if let Some(user) = user {
            if let Some(notes) = user.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                context.push_str(&format!(" Here is some context about this user: {}", notes));
            }
            if !user.memory_facts.is_empty() {
                context.push_str(&format!(
                    " They asked you to remember: {}.",
                    user.memory_facts.join("; ")
                ));
            }
        }
        Ok(context)
    }
}

impl BaseAgent for MemoryAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extractor::CodeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One entry in the append-only transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Everything one browser session owns: the current code, the transcript,
/// and the GitHub token once the OAuth flow has completed. Persisted as JSON
/// at explicit load/save points instead of living in browser storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub code: CodeState,
    pub conversation: Vec<ConversationTurn>,
    pub github_token: Option<String>,
}

impl SessionState {
    /// Load a session from `path`. A missing file is a fresh session, not an
    /// error; a corrupt file is.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "No session file, starting fresh");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let state: Self = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse session file {}", path.display()))?;
        info!(
            turns = state.conversation.len(),
            has_token = state.github_token.is_some(),
            "Loaded session"
        );
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Failed to serialize session")?;
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        debug!(?path, "Saved session");
        Ok(())
    }

    pub fn add_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.conversation.push(ConversationTurn {
            speaker,
            text: text.into(),
        });
    }

    /// Reset the code and transcript. The GitHub token survives a clear; the
    /// user is wiping their work, not logging out.
    pub fn clear(&mut self) {
        self.code = CodeState::default();
        self.conversation.clear();
    }
}

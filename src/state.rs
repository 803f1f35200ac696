use crate::completion::CompletionError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const INITIAL_CODE: &str = r#"import React from "react";
import { Box, Button, Typography } from "@mui/material";

export default function App() {
  const [count, setCount] = React.useState(0);

  return (
    <Box sx={{ p: 4, fontFamily: "sans-serif" }}>
      <Typography variant="h4" gutterBottom>
        Hello Reactor
      </Typography>
      <Typography variant="body1" gutterBottom>
        Describe a change in the chat below and apply the result.
      </Typography>
      <Button variant="contained" onClick={() => setCount(count + 1)}>
        Clicked {count} times
      </Button>
    </Box>
  );
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub sender: Sender,
    pub text: String,
    pub is_error: bool,
    pub expanded: bool,
}

impl TranscriptEntry {
    fn user(text: String) -> Self {
        Self {
            sender: Sender::User,
            text,
            is_error: false,
            expanded: false,
        }
    }

    fn assistant(text: String) -> Self {
        Self {
            sender: Sender::Assistant,
            text,
            is_error: false,
            expanded: false,
        }
    }

    fn assistant_error(error: &CompletionError) -> Self {
        Self {
            sender: Sender::Assistant,
            text: format!("An error occurred: {error}"),
            is_error: true,
            expanded: false,
        }
    }

    pub fn can_apply(&self) -> bool {
        self.sender == Sender::Assistant && !self.is_error
    }
}

/// How a submit behaves while an earlier request is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    #[default]
    AllowConcurrent,
    RejectWhilePending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Everything the completion client needs for one request, captured at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: RequestId,
    pub code: String,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a request is already pending")]
    RequestPending,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("no transcript entry at index {0}")]
    NoSuchEntry(usize),
    #[error("transcript entry {0} is not an applicable assistant response")]
    NotApplicable(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevertError {
    #[error("No previous code to revert to.")]
    NothingToRevert,
}

#[derive(Debug, Clone)]
pub struct PlaygroundState {
    code: String,
    previous_code: Option<String>,
    transcript: Vec<TranscriptEntry>,
    in_flight: usize,
    next_request_id: u64,
    policy: SubmitPolicy,
    pub input: String,
}

impl Default for PlaygroundState {
    fn default() -> Self {
        Self::new(INITIAL_CODE, SubmitPolicy::default())
    }
}

impl PlaygroundState {
    pub fn new(initial_code: impl Into<String>, policy: SubmitPolicy) -> Self {
        Self {
            code: initial_code.into(),
            previous_code: None,
            transcript: Vec::new(),
            in_flight: 0,
            next_request_id: 1,
            policy,
            input: String::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn previous_code(&self) -> Option<&str> {
        self.previous_code.as_deref()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight > 0
    }

    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty()
            && !(self.policy == SubmitPolicy::RejectWhilePending && self.is_pending())
    }

    /// Takes the current input field as the user's instruction.
    pub fn submit_input(&mut self) -> Result<Submission, SubmitError> {
        let input = std::mem::take(&mut self.input);
        match self.submit(&input) {
            Ok(submission) => Ok(submission),
            Err(err) => {
                self.input = input;
                Err(err)
            }
        }
    }

    pub fn submit(&mut self, instruction: &str) -> Result<Submission, SubmitError> {
        if instruction.trim().is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }
        if self.policy == SubmitPolicy::RejectWhilePending && self.is_pending() {
            return Err(SubmitError::RequestPending);
        }

        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        self.in_flight += 1;
        self.transcript.push(TranscriptEntry::user(instruction.to_string()));
        self.input.clear();
        debug!(request_id = id.0, in_flight = self.in_flight, "prompt submitted");

        Ok(Submission {
            id,
            code: self.code.clone(),
            instruction: instruction.to_string(),
        })
    }

    pub fn request_resolved(&mut self, id: RequestId, outcome: Result<String, CompletionError>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            Ok(text) => {
                debug!(request_id = id.0, chars = text.len(), "completion received");
                self.transcript.push(TranscriptEntry::assistant(text));
            }
            Err(err) => {
                warn!(request_id = id.0, error = %err, "completion request failed");
                self.transcript.push(TranscriptEntry::assistant_error(&err));
            }
        }
    }

    pub fn apply_code(&mut self, text: impl Into<String>) {
        let previous = std::mem::replace(&mut self.code, text.into());
        self.previous_code = Some(previous);
    }

    pub fn apply_entry(&mut self, index: usize) -> Result<(), ApplyError> {
        let entry = self
            .transcript
            .get(index)
            .ok_or(ApplyError::NoSuchEntry(index))?;
        if !entry.can_apply() {
            return Err(ApplyError::NotApplicable(index));
        }
        let text = entry.text.clone();
        self.apply_code(text);
        Ok(())
    }

    pub fn revert(&mut self) -> Result<(), RevertError> {
        let previous = self
            .previous_code
            .take()
            .ok_or(RevertError::NothingToRevert)?;
        self.code = previous;
        Ok(())
    }

    pub fn toggle_expansion(&mut self, index: usize) -> bool {
        match self.transcript.get_mut(index) {
            Some(entry) => {
                entry.expanded = !entry.expanded;
                true
            }
            None => false,
        }
    }

    pub fn editor_changed(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }
}

//! Scripted generator for tests and offline dry runs.
//!
//! Replays a fixed sequence of canned responses in call order, then keeps
//! repeating the last one. Prompts are recorded so tests can assert on what
//! the agents actually asked.

use std::sync::Mutex;

use super::{LlmError, TextGenerator};

enum Step {
    Text(String),
    Fail(String),
}

pub struct ScriptedGenerator {
    steps: Vec<Step>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    cursor: usize,
    prompts: Vec<String>,
}

impl ScriptedGenerator {
    /// Generator that answers every call with `text`.
    pub fn always(text: &str) -> Self {
        Self {
            steps: vec![Step::Text(text.to_string())],
            state: Mutex::new(State::default()),
        }
    }

    /// Generator that fails every call with an unreachable-service error.
    pub fn always_failing(reason: &str) -> Self {
        Self {
            steps: vec![Step::Fail(reason.to_string())],
            state: Mutex::new(State::default()),
        }
    }

    /// Empty script; chain [`then`](Self::then) / [`then_fail`](Self::then_fail).
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            state: Mutex::new(State::default()),
        }
    }

    #[must_use]
    pub fn then(mut self, text: &str) -> Self {
        self.steps.push(Step::Text(text.to_string()));
        self
    }

    #[must_use]
    pub fn then_fail(mut self, reason: &str) -> Self {
        self.steps.push(Step::Fail(reason.to_string()));
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().expect("scripted generator poisoned").prompts.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().expect("scripted generator poisoned").cursor
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let mut state = self.state.lock().expect("scripted generator poisoned");
        state.prompts.push(prompt.to_string());

        if self.steps.is_empty() {
            state.cursor += 1;
            return Err(LlmError::EmptyResponse);
        }

        let idx = state.cursor.min(self.steps.len() - 1);
        state.cursor += 1;
        match &self.steps[idx] {
            Step::Text(text) => Ok(text.clone()),
            Step::Fail(reason) => Err(LlmError::ServiceUnreachable(reason.clone())),
        }
    }
}

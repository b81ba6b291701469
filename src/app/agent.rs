use log::{debug, info, warn};

use super::App;
use crate::agent::ChatError;

// Actions on the chat core, triggered from the keyboard.
impl App {
    /// Sends the composer's content to the active agent.
    pub(crate) fn submit_composer(&mut self) {
        if self.composer.is_empty() {
            self.status_message = String::from("Type a message first");
            return;
        }
        let agent_id = self.manager.active_id().to_string();
        // The composer keeps its text until the manager has accepted it.
        match self.manager.submit(&agent_id, self.composer.buffer()) {
            Ok(id) => {
                self.composer.take();
                debug!("Submitted message {} to {}", id, agent_id);
                self.scroll_offset = 0;
                self.status_message = format!("Sent to {}", self.label_of(&agent_id));
            }
            Err(err) => self.report(err),
        }
    }

    /// Switches to the agent at `index` in the catalogue.
    pub(crate) fn activate_index(&mut self, index: usize) {
        let Some(agent_id) = self
            .manager
            .registry()
            .agents
            .get(index)
            .map(|agent| agent.id.clone())
        else {
            return;
        };
        match self.manager.activate(&agent_id) {
            Ok(()) => {
                self.unread.remove(&agent_id);
                self.scroll_offset = 0;
                let agent = self.manager.active_agent();
                info!("Active agent: {}", agent.id);
                self.status_message = match agent.subtitle.as_deref() {
                    Some(subtitle) => format!("{}: {}", agent.label, subtitle),
                    None => agent.label.clone(),
                };
            }
            Err(err) => self.report(err),
        }
    }

    /// Moves the active tab by `delta`, wrapping around.
    pub(crate) fn cycle_agent(&mut self, delta: isize) {
        let agents = &self.manager.registry().agents;
        let len = agents.len() as isize;
        if len == 0 {
            return;
        }
        let current = agents
            .iter()
            .position(|agent| agent.id == self.manager.active_id())
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.activate_index(next);
    }

    /// Loads the active agent's next prompt template into the composer.
    pub(crate) fn cycle_prompt(&mut self) {
        let agent = self.manager.active_agent();
        if agent.prompts.is_empty() {
            self.status_message = format!("{} has no prompt templates", agent.label);
            return;
        }
        let slot = self.prompt_cursor.entry(agent.id.clone()).or_insert(0);
        let index = *slot % agent.prompts.len();
        *slot = index + 1;
        let prompt = &agent.prompts[index];
        self.status_message = format!(
            "Prompt {}/{}: {} (Enter to send)",
            index + 1,
            agent.prompts.len(),
            prompt.label
        );
        self.composer.set(prompt.text.clone());
    }

    /// Clears the active conversation, cancelling its outstanding request.
    pub(crate) fn clear_active(&mut self) {
        let agent_id = self.manager.active_id().to_string();
        match self.manager.clear(&agent_id) {
            Ok(()) => {
                self.status_message =
                    format!("Cleared conversation with {}", self.label_of(&agent_id));
            }
            Err(err) => self.report(err),
        }
    }

    fn report(&mut self, err: ChatError) {
        warn!("{}", err);
        self.status_message = err.to_string();
    }
}

use log::error;

use super::App;
use crate::agent::{ChatEvent, NoticeLevel, Settled};

impl App {
    /// Called on every tick of the event loop.
    ///
    /// Applies finished requests, then drains the observer events they
    /// produced into view state (typing indicators, unread markers, status).
    pub fn on_tick(&mut self) {
        if self.last_tick.elapsed() >= self.tick_rate {
            self.last_tick = std::time::Instant::now();
        }

        match self.manager.poll_completions() {
            Ok(settled) => {
                for outcome in settled {
                    if let Settled::Applied { agent_id, decision } = outcome {
                        self.status_message =
                            format!("{}: {}", self.label_of(&agent_id), decision.heading());
                    }
                }
            }
            Err(err) => {
                error!("Failed to apply response: {}", err);
                self.status_message = format!("Failed to apply response: {}", err);
            }
        }

        while let Ok(event) = self.events.try_recv() {
            self.on_chat_event(event);
        }
    }

    fn on_chat_event(&mut self, event: ChatEvent) {
        let agent_id = event.agent_id().to_string();
        let is_active = agent_id == self.manager.active_id();
        match event {
            ChatEvent::TypingStarted { .. } => {
                self.typing.insert(agent_id);
            }
            ChatEvent::TypingEnded { .. } => {
                self.typing.remove(&agent_id);
            }
            ChatEvent::MessageAppended { .. } | ChatEvent::Policy { .. } => {
                if is_active {
                    self.scroll_offset = 0;
                } else {
                    self.unread.insert(agent_id);
                }
            }
            ChatEvent::Notice { notice, .. } => {
                if notice.level == NoticeLevel::Error {
                    self.status_message =
                        format!("{}: {}", self.label_of(&agent_id), notice.title);
                }
                if !is_active {
                    self.unread.insert(agent_id);
                }
            }
            ChatEvent::Cleared { .. } => {
                self.typing.remove(&agent_id);
                self.unread.remove(&agent_id);
                self.scroll_offset = 0;
            }
            ChatEvent::MessageRewritten { .. } | ChatEvent::Inspector { .. } => {}
        }
    }

    pub(crate) fn label_of(&self, agent_id: &str) -> String {
        self.manager
            .registry()
            .agent(agent_id)
            .map_or_else(|| agent_id.to_string(), |agent| agent.label.clone())
    }
}

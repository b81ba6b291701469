use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{App, Composer};
use crate::agent::{AgentManager, ChatEvent};

impl App {
    /// Creates the application state around an already configured manager.
    ///
    /// `events` must be the receiving end of the channel the manager was
    /// given as its observer.
    pub fn new(manager: AgentManager, events: UnboundedReceiver<ChatEvent>) -> Self {
        let active = manager.active_agent();
        debug!("Initializing App with active agent {}", active.id);
        let status_message = format!(
            "{}: Enter to send, Tab to switch agent, Ctrl+P for prompts, Ctrl+Q to quit",
            active.label
        );

        Self {
            should_quit: false,
            manager,
            composer: Composer::new(),
            status_message,
            typing: HashSet::new(),
            unread: HashSet::new(),
            prompt_cursor: HashMap::new(),
            scroll_offset: 0,
            events,
            last_tick: Instant::now(),
            tick_rate: Duration::from_millis(100),
        }
    }

    pub fn tick_rate(&self) -> Duration {
        self.tick_rate
    }
}

//! Defines the core state of the terminal front end.
//!
//! `App` owns the `AgentManager` (and with it every conversation), the
//! composer, and the small amount of view state the chat core doesn't track:
//! typing indicators, unread markers and the scroll offset.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;

use super::Composer;
use crate::agent::{AgentManager, ChatEvent};

/// The main application state.
///
/// All mutation happens on the event loop; completions from the network are
/// pulled in on every tick.
pub struct App {
    // --- Core State ---
    /// Flag to indicate if the application should quit.
    pub should_quit: bool,
    /// The chat core: agents, conversations, inspector and request control.
    pub(crate) manager: AgentManager,
    /// The message composer at the bottom of the chat pane.
    pub composer: Composer,

    // --- View State ---
    /// The message currently displayed in the status bar.
    pub status_message: String,
    /// Agents whose request is outstanding, keyed by agent id.
    pub(crate) typing: HashSet<String>,
    /// Agents that received entries while their tab was not active.
    pub(crate) unread: HashSet<String>,
    /// Next prompt template index per agent for Ctrl+P cycling.
    pub(crate) prompt_cursor: HashMap<String, usize>,
    /// Lines scrolled up from the bottom of the chat history.
    pub scroll_offset: u16,

    // --- Internal ---
    /// Observer events emitted by the manager.
    pub(crate) events: UnboundedReceiver<ChatEvent>,
    pub(crate) last_tick: Instant,
    pub(crate) tick_rate: Duration,
}

impl App {
    pub fn manager(&self) -> &AgentManager {
        &self.manager
    }

    pub fn is_typing(&self, agent_id: &str) -> bool {
        self.typing.contains(agent_id)
    }

    pub fn has_unread(&self, agent_id: &str) -> bool {
        self.unread.contains(agent_id)
    }
}

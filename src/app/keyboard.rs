use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::App;

/// Lines moved per PageUp/PageDown.
const PAGE: u16 = 5;

impl App {
    /// The main entry point for handling keyboard events.
    ///
    /// Global shortcuts are checked first; everything else edits the composer.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.handle_global_shortcuts(key) {
            return;
        }
        self.handle_composer_key(key);
    }

    /// Returns `true` if the key was a shortcut.
    fn handle_global_shortcuts(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('l') if ctrl => self.clear_active(),
            KeyCode::Char('p') if ctrl => self.cycle_prompt(),
            KeyCode::Tab => self.cycle_agent(1),
            KeyCode::BackTab => self.cycle_agent(-1),
            KeyCode::F(n @ 1..=9) => self.activate_index(usize::from(n - 1)),
            KeyCode::PageUp => self.scroll_offset = self.scroll_offset.saturating_add(PAGE),
            KeyCode::PageDown => self.scroll_offset = self.scroll_offset.saturating_sub(PAGE),
            _ => return false,
        }
        true
    }

    fn handle_composer_key(&mut self, key: KeyEvent) {
        let modifiers = key.modifiers;
        match key.code {
            KeyCode::Enter => {
                // Many terminals report Shift+Enter as plain Enter; Alt+Enter is the reliable one.
                if modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) {
                    self.composer.insert_newline();
                } else {
                    self.submit_composer();
                }
            }
            KeyCode::Backspace => self.composer.backspace(),
            KeyCode::Delete => self.composer.delete(),
            KeyCode::Left => self.composer.move_left(),
            KeyCode::Right => self.composer.move_right(),
            KeyCode::Home => self.composer.move_to_line_start(),
            KeyCode::End => self.composer.move_to_line_end(),
            KeyCode::Esc => {
                self.composer.clear();
                self.status_message = String::from("Input cleared");
            }
            KeyCode::Up => self.navigate_history(-1),
            KeyCode::Down => self.navigate_history(1),
            KeyCode::Char(ch) => {
                if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
                    self.composer.insert_char(ch);
                }
            }
            _ => {}
        }
    }

    /// Up/Down walk the sent-message history while the composer is empty (or
    /// already showing a history entry); otherwise they scroll the chat.
    fn navigate_history(&mut self, delta: isize) {
        if self.composer.is_empty() || self.composer.is_browsing_history() {
            let moved = if delta < 0 {
                self.composer.history_previous()
            } else {
                self.composer.history_next()
            };
            if moved {
                return;
            }
        }
        if delta < 0 {
            self.scroll_offset = self.scroll_offset.saturating_add(1);
        } else {
            self.scroll_offset = self.scroll_offset.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::KeyEventState;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::agent::providers::memory::ScriptedTransport;
    use crate::agent::{AgentManager, AgentSettings, Decision};

    const SETTINGS: &str = r#"
        [[agents]]
        id = "alpha"
        label = "Alpha"
        webhook = "http://test/alpha"

        [[agents.prompts]]
        key = "one"
        label = "One"
        text = "first prompt"

        [[agents.prompts]]
        key = "two"
        label = "Two"
        text = "second prompt"

        [[agents]]
        id = "beta"
        label = "Beta"
        webhook = "http://test/beta"
    "#;

    fn app(transport: Arc<ScriptedTransport>) -> App {
        let settings = AgentSettings::from_toml_str(SETTINGS).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = AgentManager::new(settings, transport, Box::new(tx)).unwrap();
        App::new(manager, rx)
    }

    fn press(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        app.handle_key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        });
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch), KeyModifiers::NONE);
        }
    }

    #[tokio::test]
    async fn enter_sends_and_tick_applies_response() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(json!({"decision": "blocked", "reason": "nope"}));
        let mut app = app(transport.clone());

        type_text(&mut app, "hello");
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.composer.is_empty());
        app.on_tick();
        assert!(app.is_typing("alpha"));

        transport.delivered(1).await;
        while app.manager().is_pending("alpha") {
            tokio::task::yield_now().await;
            app.on_tick();
        }
        assert!(!app.is_typing("alpha"));
        assert_eq!(
            app.manager().snapshot("alpha").decision(),
            Some(Decision::Blocked)
        );
        assert_eq!(transport.requests()[0].1.message, "hello");
    }

    #[tokio::test]
    async fn rejected_submit_keeps_composer_text() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut app = app(transport.clone());
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);

        assert_eq!(app.composer.buffer(), "   ");
        assert_eq!(app.status_message, "message cannot be empty");
        assert!(!app.manager().is_pending("alpha"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn alt_enter_inserts_newline() {
        let mut app = app(Arc::new(ScriptedTransport::new()));
        type_text(&mut app, "a");
        press(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        type_text(&mut app, "b");
        assert_eq!(app.composer.buffer(), "a\nb");
        assert!(!app.manager().is_pending("alpha"));
    }

    #[tokio::test]
    async fn tab_and_function_keys_switch_agents() {
        let mut app = app(Arc::new(ScriptedTransport::new()));
        press(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(app.manager().active_id(), "beta");
        press(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(app.manager().active_id(), "alpha");
        press(&mut app, KeyCode::BackTab, KeyModifiers::SHIFT);
        assert_eq!(app.manager().active_id(), "beta");
        press(&mut app, KeyCode::F(1), KeyModifiers::NONE);
        assert_eq!(app.manager().active_id(), "alpha");
        press(&mut app, KeyCode::F(9), KeyModifiers::NONE);
        assert_eq!(app.manager().active_id(), "alpha");
    }

    #[tokio::test]
    async fn ctrl_p_cycles_prompt_templates() {
        let mut app = app(Arc::new(ScriptedTransport::new()));
        press(&mut app, KeyCode::Char('p'), KeyModifiers::CONTROL);
        assert_eq!(app.composer.buffer(), "first prompt");
        press(&mut app, KeyCode::Char('p'), KeyModifiers::CONTROL);
        assert_eq!(app.composer.buffer(), "second prompt");
        press(&mut app, KeyCode::Char('p'), KeyModifiers::CONTROL);
        assert_eq!(app.composer.buffer(), "first prompt");
    }

    #[tokio::test]
    async fn up_recalls_sent_message() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(json!({"decision": "allowed"}));
        let mut app = app(transport);
        type_text(&mut app, "again");
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        press(&mut app, KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(app.composer.buffer(), "again");
    }

    #[tokio::test]
    async fn ctrl_l_clears_and_ctrl_q_quits() {
        let transport = Arc::new(ScriptedTransport::new());
        let _gate = transport.gate();
        let mut app = app(transport);
        type_text(&mut app, "pending");
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        press(&mut app, KeyCode::Char('l'), KeyModifiers::CONTROL);
        app.on_tick();
        assert!(!app.manager().is_pending("alpha"));
        assert!(!app.is_typing("alpha"));
        assert_eq!(app.manager().store().list("alpha").unwrap().len(), 1);

        press(&mut app, KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }
}

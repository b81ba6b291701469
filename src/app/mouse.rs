use crossterm::event::{MouseEvent, MouseEventKind};

use super::App;

impl App {
    /// The wheel scrolls the chat history; everything else is ignored.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll_offset = self.scroll_offset.saturating_add(3),
            MouseEventKind::ScrollDown => self.scroll_offset = self.scroll_offset.saturating_sub(3),
            _ => {}
        }
    }
}

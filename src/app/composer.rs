use unicode_width::UnicodeWidthChar;

/// 訊息輸入框的狀態：文字緩衝、游標位置（位元組索引）與已送出的歷史紀錄。
#[derive(Debug, Clone, Default)]
pub struct Composer {
    buffer: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_browsing_history(&self) -> bool {
        self.history_index.is_some()
    }

    /// 在游標處插入一個字元。
    pub fn insert_char(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.history_index = None;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// 以整段文字取代目前內容（例如載入預設提示），游標移到結尾。
    pub fn set(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.cursor = self.buffer.len();
        self.history_index = None;
    }

    pub fn backspace(&mut self) {
        if let Some((idx, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.buffer.drain(idx..self.cursor);
            self.cursor = idx;
            self.history_index = None;
        }
    }

    pub fn delete(&mut self) {
        if let Some(ch) = self.buffer[self.cursor..].chars().next() {
            self.buffer.drain(self.cursor..self.cursor + ch.len_utf8());
            self.history_index = None;
        }
    }

    pub fn move_left(&mut self) {
        if let Some((idx, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.cursor = idx;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(ch) = self.buffer[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    /// 移到目前這一行的開頭。
    pub fn move_to_line_start(&mut self) {
        self.cursor = self.buffer[..self.cursor]
            .rfind('\n')
            .map_or(0, |pos| pos + 1);
    }

    /// 移到目前這一行的結尾。
    pub fn move_to_line_end(&mut self) {
        self.cursor = self.buffer[self.cursor..]
            .find('\n')
            .map_or(self.buffer.len(), |pos| self.cursor + pos);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    /// 取出目前內容並清空輸入框；非空白內容會加入歷史紀錄。
    pub fn take(&mut self) -> String {
        let content = std::mem::take(&mut self.buffer);
        if !content.trim().is_empty() && self.history.last() != Some(&content) {
            self.history.push(content.clone());
        }
        self.cursor = 0;
        self.history_index = None;
        content
    }

    /// 往前瀏覽歷史紀錄。沒有歷史時回傳 `false`。
    pub fn history_previous(&mut self) -> bool {
        if self.history.is_empty() {
            return false;
        }
        let target = match self.history_index {
            Some(idx) => idx.saturating_sub(1),
            None => self.history.len() - 1,
        };
        self.load_history(target)
    }

    /// 往後瀏覽歷史紀錄；越過最新一筆時回到空白輸入框。
    pub fn history_next(&mut self) -> bool {
        match self.history_index {
            Some(idx) if idx + 1 < self.history.len() => self.load_history(idx + 1),
            Some(_) => {
                self.clear();
                true
            }
            None => false,
        }
    }

    fn load_history(&mut self, index: usize) -> bool {
        let Some(entry) = self.history.get(index) else {
            return false;
        };
        self.buffer = entry.clone();
        self.cursor = self.buffer.len();
        self.history_index = Some(index);
        true
    }

    /// 計算游標在寬度為 `width` 的區域中的 (欄, 列) 位置，會考慮自動換行與全形字元。
    pub fn cursor_display_position(&self, width: usize) -> (u16, u16) {
        if width == 0 {
            return (0, 0);
        }
        let mut col = 0usize;
        let mut row = 0usize;
        for ch in self.buffer[..self.cursor].chars() {
            if ch == '\n' {
                row += 1;
                col = 0;
                continue;
            }
            let char_width = ch.width().unwrap_or(1).max(1);
            if col + char_width > width {
                row += 1;
                col = 0;
            }
            col += char_width;
        }
        if col >= width {
            row += 1;
            col = 0;
        }
        (col as u16, row as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> Composer {
        let mut composer = Composer::new();
        text.chars().for_each(|ch| composer.insert_char(ch));
        composer
    }

    #[test]
    fn editing_respects_multibyte_characters() {
        let mut composer = typed("héllo");
        composer.move_left();
        composer.move_left();
        composer.move_left();
        composer.backspace();
        assert_eq!(composer.buffer(), "hllo");
        composer.delete();
        assert_eq!(composer.buffer(), "hlo");
    }

    #[test]
    fn line_navigation() {
        let mut composer = typed("first\nsecond");
        composer.move_to_line_start();
        composer.insert_char('>');
        assert_eq!(composer.buffer(), "first\n>second");
        composer.move_left();
        composer.move_left();
        composer.move_to_line_start();
        composer.move_to_line_end();
        composer.insert_char('!');
        assert_eq!(composer.buffer(), "first!\n>second");
    }

    #[test]
    fn take_records_history_once() {
        let mut composer = typed("hello");
        assert_eq!(composer.take(), "hello");
        composer.set("hello");
        composer.take();
        composer.set("   ");
        composer.take();
        assert!(composer.is_empty());

        assert!(composer.history_previous());
        assert_eq!(composer.buffer(), "hello");
        assert!(composer.history_previous());
        assert_eq!(composer.buffer(), "hello");
        assert!(composer.history_next());
        assert!(composer.is_empty());
        assert!(!composer.history_next());
    }

    #[test]
    fn cursor_position_wraps_wide_characters() {
        let composer = typed("ab漢字");
        assert_eq!(composer.cursor_display_position(4), (2, 1));
        let composer = typed("abcd");
        assert_eq!(composer.cursor_display_position(4), (0, 1));
        let composer = typed("a\nb");
        assert_eq!(composer.cursor_display_position(10), (1, 1));
    }
}

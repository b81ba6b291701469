use ratatui::style::Color;

use crate::agent::{Decision, NoticeLevel};

pub const BG_PRIMARY: Color = Color::Rgb(0, 0, 0);
pub const BG_PANEL: Color = Color::Rgb(12, 12, 12);
pub const FG_PRIMARY: Color = Color::Rgb(190, 190, 190);
pub const FG_DIM: Color = Color::Rgb(128, 128, 128);

pub const BAR_BG: Color = Color::Rgb(23, 52, 127);
pub const BAR_TEXT: Color = Color::Rgb(235, 240, 255);
pub const BAR_HIGHLIGHT_BG: Color = Color::Rgb(73, 102, 177);
pub const BAR_HIGHLIGHT_TEXT: Color = Color::Rgb(255, 255, 255);

pub const BORDER_IDLE: Color = Color::Rgb(61, 120, 120);
pub const BORDER_FOCUS: Color = Color::Rgb(187, 94, 0);

pub const ROLE_USER: Color = Color::Cyan;
pub const ROLE_ASSISTANT: Color = Color::Rgb(120, 200, 140);
pub const ROLE_SYSTEM: Color = Color::Rgb(150, 150, 190);

pub const DECISION_ALLOWED: Color = Color::Rgb(80, 190, 110);
pub const DECISION_BLOCKED: Color = Color::Rgb(230, 80, 80);
pub const DECISION_REWRITTEN: Color = Color::Rgb(230, 190, 70);
pub const DECISION_APPROVAL: Color = Color::Rgb(200, 130, 230);

pub fn decision_color(decision: Decision) -> Color {
    match decision {
        Decision::Allowed => DECISION_ALLOWED,
        Decision::Blocked => DECISION_BLOCKED,
        Decision::Rewritten => DECISION_REWRITTEN,
        Decision::NeedsApproval => DECISION_APPROVAL,
    }
}

pub fn notice_color(level: NoticeLevel) -> Color {
    match level {
        NoticeLevel::Info => ROLE_SYSTEM,
        NoticeLevel::Error => DECISION_BLOCKED,
    }
}

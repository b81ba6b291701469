//! `app` 模組是終端機前端的核心。
//!
//! 它持有 `AgentManager` 與畫面所需的狀態、處理鍵盤與滑鼠輸入，
//! 並在每個 tick 套用已完成的請求。

/// `agent` 模組：切換代理、送出訊息、清除對話等操作。
mod agent;
/// `composer` 模組：訊息輸入框的編輯與歷史紀錄。
mod composer;
/// `init` 模組：負責 `App` 結構的初始化。
mod init;
/// `keyboard` 模組：專門處理所有的鍵盤輸入事件。
mod keyboard;
/// `mouse` 模組：滑鼠滾輪捲動對話紀錄。
mod mouse;
/// `state` 模組：定義了 `App` 結構。
mod state;
/// `tick` 模組：處理定時更新，套用回應並更新輸入指示。
mod tick;

pub use composer::Composer;
pub use state::App;

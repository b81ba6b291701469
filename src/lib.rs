//! GuardChat: a terminal chat front end for policy-guarded AI agents.
//!
//! Every message goes to the selected agent's webhook, which evaluates it
//! against security policy and answers with a decision (allowed, blocked,
//! rewritten, needs approval), its signals, and possibly a model reply.

pub mod agent;
pub mod app;
pub mod event;
pub mod logging;
pub mod tui;
pub mod ui;

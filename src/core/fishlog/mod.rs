//! Fishing log classification.
//!
//! Turns localized chat lines into cast / discovery / mooch events so a
//! fishing timer can run without hooking the game client.

pub mod parser;
pub mod rules;

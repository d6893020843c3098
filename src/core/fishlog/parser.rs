//! Classifier for fishing log lines.
//!
//! Each line is checked against the active rule set in a fixed order
//! (area discovered, cast, mooch) and produces at most one event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::rules::RuleBook;
use crate::core::model::Language;

/// An event inferred from a single log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FishingEvent {
    /// A line was cast at `spot`.
    Cast { spot: String },
    /// A new spot was recorded in the fishing log.
    AreaDiscovered { spot: String },
    /// The line was recast with the hooked fish as bait.
    Mooch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParserState {
    #[default]
    Idle,
    CastActive,
}

/// Session state owned by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserSession {
    pub state: ParserState,
    /// Last fishing spot a cast was seen at.
    pub spot: Option<String>,
    pub mooching: bool,
}

pub struct EventParser {
    rules: Arc<RuleBook>,
    session: ParserSession,
}

impl EventParser {
    pub fn new(rules: Arc<RuleBook>) -> Self {
        Self {
            rules,
            session: ParserSession::default(),
        }
    }

    pub fn session(&self) -> &ParserSession {
        &self.session
    }

    pub fn state(&self) -> ParserState {
        self.session.state
    }

    /// Classify a single line.
    pub fn parse_line(&mut self, language: Language, line: &str) -> Option<FishingEvent> {
        // Strip BOM and trim whitespace
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            return None;
        }
        let rules = self.rules.get(language);

        if let Some(capture) = rules.match_area_discovered(line) {
            return Some(FishingEvent::AreaDiscovered {
                spot: rules.resolve_spot(capture),
            });
        }

        if let Some(capture) = rules.match_cast(line) {
            let spot = rules.resolve_spot(capture);
            self.session.state = ParserState::CastActive;
            self.session.spot = Some(spot.clone());
            self.session.mooching = false;
            return Some(FishingEvent::Cast { spot });
        }

        if self.session.state == ParserState::CastActive && rules.is_mooch(line) {
            self.session.mooching = true;
            return Some(FishingEvent::Mooch);
        }

        None
    }

    /// Classify a line tagged with a raw language code.
    pub fn parse_tagged(&mut self, tag: &str, line: &str) -> Option<FishingEvent> {
        let language = self.rules.for_tag(tag).language();
        self.parse_line(language, line)
    }

    /// Classify all lines in order.
    pub fn parse_lines(&mut self, language: Language, lines: &[String]) -> Vec<FishingEvent> {
        lines
            .iter()
            .filter_map(|line| self.parse_line(language, line))
            .collect()
    }

    /// Return to `Idle` after the game reports a catch, release or cancel.
    /// The last known spot is kept.
    pub fn reset(&mut self) {
        self.session.state = ParserState::Idle;
        self.session.mooching = false;
    }
}

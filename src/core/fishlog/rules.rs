//! Per-language classification rules for fishing log lines.
//!
//! Rule sets are compiled once, eagerly, into a [`RuleBook`] and shared by
//! reference; nothing here is global.

use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::core::model::Language;

/// Placeholder used whenever a line does not name a usable fishing spot.
pub const UNKNOWN_SPOT: &str = "Unknown Spot";

/// Raw location captures of a matched line.
///
/// Some languages embed an article or preposition in the location
/// (`spot_article`), others capture the bare name (`spot`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpotCapture<'a> {
    pub spot: Option<&'a str>,
    pub spot_article: Option<&'a str>,
}

impl<'a> SpotCapture<'a> {
    fn from_captures(caps: &Captures<'a>) -> Self {
        Self {
            spot: caps.name("spot").map(|m| m.as_str()),
            spot_article: caps.name("spot_article").map(|m| m.as_str()),
        }
    }
}

/// Immutable bundle of patterns and labels for one client language.
#[derive(Debug, Clone)]
pub struct ParserRuleSet {
    language: Language,
    cast: Regex,
    area_discovered: Regex,
    mooch: Regex,
    undiscovered: String,
    articles: Vec<String>,
}

impl ParserRuleSet {
    /// Build a rule set from raw patterns. Location captures must be named
    /// `spot` or `spot_article`.
    pub fn new(
        language: Language,
        cast: &str,
        area_discovered: &str,
        mooch: &str,
        undiscovered: &str,
        articles: &[&str],
    ) -> Result<Self, regex::Error> {
        let mut articles: Vec<String> = articles.iter().map(|a| a.to_lowercase()).collect();
        // Longest first so "an der " wins over "an ".
        articles.sort_by_key(|a| std::cmp::Reverse(a.chars().count()));
        Ok(Self {
            language,
            cast: Regex::new(cast)?,
            area_discovered: Regex::new(area_discovered)?,
            mooch: Regex::new(mooch)?,
            undiscovered: undiscovered.to_string(),
            articles,
        })
    }

    /// The shipped rules for `language`.
    pub fn builtin(language: Language) -> Self {
        let result = match language {
            Language::English => Self::new(
                language,
                r"(?:You cast your|.*? casts (?:her|his)) line (?:on|in|at) (?P<spot>.+)\.",
                r".*?(?:on|at) (?P<spot>.+) is added to your fishing log\.",
                r"line with the fish still hooked\.",
                "undiscovered fishing hole",
                &["the ", "an ", "a "],
            ),
            Language::German => Self::new(
                language,
                r".*? has?t mit dem Fischen (?P<spot_article>.+) begonnen\.",
                r"Die neue Angelstelle (?P<spot>.*) wurde in deinem Fischer-Notizbuch vermerkt\.",
                r"Du hast die Leine mit",
                "unerforschten Angelplatz",
                &[
                    "am ", "an ", "an dem ", "an den ", "an der ", "an einem ", "an einer ",
                    "auf dem ", "auf der ", "beim ", "bei der ", "bei den ", "im ", "in der ",
                    "in den ", "in einem ", "vor dem ", "vor der ",
                ],
            ),
            Language::French => Self::new(
                language,
                r".*? commencez? à pêcher\.\s*Point de pêche: (?P<spot>.+)\.",
                r"Vous notez le banc de poissons “(?P<spot>.+)” dans votre carnet\.",
                r"Vous essayez de pêcher au vif avec",
                "Zone de pêche inconnue",
                &[],
            ),
            Language::Japanese => Self::new(
                language,
                r".+は(?P<spot>.+)で釣りを開始した。",
                r"釣り手帳に新しい釣り場「(?P<spot>.+)」の情報を記録した！",
                r"は釣り上げた.+を慎重に投げ込み、泳がせ釣りを試みた。",
                "未知の釣り場",
                &[],
            ),
            Language::ChineseSimplified => Self::new(
                language,
                r".+?在(?P<spot>.+?)甩出了鱼线开始钓鱼。",
                r"将新钓场“(?P<spot>.+)”记录到了钓鱼笔记中！",
                r"尝试以小钓大。",
                "未知钓场",
                &[],
            ),
        };
        result.expect("Invalid builtin fishing regex")
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn undiscovered(&self) -> &str {
        &self.undiscovered
    }

    pub fn match_cast<'a>(&self, line: &'a str) -> Option<SpotCapture<'a>> {
        self.cast.captures(line).map(|caps| SpotCapture::from_captures(&caps))
    }

    pub fn match_area_discovered<'a>(&self, line: &'a str) -> Option<SpotCapture<'a>> {
        self.area_discovered
            .captures(line)
            .map(|caps| SpotCapture::from_captures(&caps))
    }

    pub fn is_mooch(&self, line: &str) -> bool {
        self.mooch.is_match(line)
    }

    /// Pick the populated capture and normalize it to a spot name, or
    /// [`UNKNOWN_SPOT`] when it is empty or the undiscovered placeholder.
    pub fn resolve_spot(&self, capture: SpotCapture<'_>) -> String {
        let raw = capture
            .spot
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| capture.spot_article.map(|s| self.strip_article(s.trim())));

        match raw {
            Some(spot) if !spot.is_empty() && !self.is_undiscovered(spot) => spot.to_string(),
            _ => UNKNOWN_SPOT.to_string(),
        }
    }

    fn is_undiscovered(&self, spot: &str) -> bool {
        let bare = self.strip_article(spot);
        bare.to_lowercase() == self.undiscovered.to_lowercase()
    }

    fn strip_article<'a>(&self, spot: &'a str) -> &'a str {
        let lower = spot.to_lowercase();
        for article in &self.articles {
            // Lowercasing can change byte lengths outside ASCII; only strip
            // when the prefix lines up with the original text.
            if lower.starts_with(article.as_str()) && spot.is_char_boundary(article.len()) {
                return spot[article.len()..].trim_start();
            }
        }
        spot
    }
}

/// Rule sets for every supported language, plus the one used for tags that
/// are not recognized.
#[derive(Debug, Clone)]
pub struct RuleBook {
    sets: HashMap<Language, ParserRuleSet>,
    fallback: Language,
}

impl RuleBook {
    /// Compile every builtin rule set.
    pub fn builtin(fallback: Language) -> Self {
        let sets = Language::all()
            .iter()
            .map(|lang| (*lang, ParserRuleSet::builtin(*lang)))
            .collect();
        Self { sets, fallback }
    }

    /// Replace or add a rule set.
    pub fn with_rule_set(mut self, rules: ParserRuleSet) -> Self {
        self.sets.insert(rules.language(), rules);
        self
    }

    pub fn fallback(&self) -> Language {
        self.fallback
    }

    pub fn get(&self, language: Language) -> &ParserRuleSet {
        match self.sets.get(&language) {
            Some(rules) => rules,
            None => &self.sets[&self.fallback],
        }
    }

    /// Rule set for a raw language tag; unknown tags use the fallback.
    pub fn for_tag(&self, tag: &str) -> &ParserRuleSet {
        self.get(Language::from_tag(tag).unwrap_or(self.fallback))
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::builtin(Language::English)
    }
}

//! Decides whether a rendered item gets reported.
//!
//! Rules are checked in a fixed order and the first one that fires wins:
//! already-reported id, keyword, regex, known bad author. Only the rule that
//! fires has its counter incremented.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::Handle;
use crate::page::RenderedItem;
use crate::store::{normalize_term, Database, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Invalid pattern {source_text:?}: {reason}")]
    InvalidPattern { source_text: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// Outcome of classifying one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum Verdict {
    AlreadyReported,
    Keyword(String),
    Pattern(String),
    KnownBadActor(Handle),
    Unmatched,
}

impl Verdict {
    pub fn should_report(&self) -> bool {
        matches!(
            self,
            Verdict::Keyword(_) | Verdict::Pattern(_) | Verdict::KnownBadActor(_)
        )
    }
}

/// Live rule set, loaded from the store.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    keywords: Vec<String>,
    patterns: Vec<CompiledPattern>,
}

/// Compile a pattern the way the classifier applies it (case-insensitive).
pub fn compile_pattern(source: &str) -> Result<Regex, ClassifierError> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| ClassifierError::InvalidPattern {
            source_text: source.to_string(),
            reason: e.to_string(),
        })
}

impl Classifier {
    /// Load every keyword and pattern in insertion order.
    ///
    /// Stored patterns that no longer compile are skipped.
    pub fn load(db: &Database) -> Result<Self, ClassifierError> {
        let keywords = db.keywords()?.into_iter().map(|k| k.term).collect();

        let mut patterns = Vec::new();
        for stored in db.regex_patterns()? {
            match compile_pattern(&stored.source) {
                Ok(regex) => patterns.push(CompiledPattern {
                    source: stored.source,
                    regex,
                }),
                Err(e) => warn!("Skipping stored pattern: {}", e),
            }
        }

        Ok(Self { keywords, patterns })
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Persist a keyword and make it live. Returns false if it already existed.
    pub fn add_keyword(&mut self, db: &Database, term: &str) -> Result<bool, ClassifierError> {
        let added = db.add_keyword(term)?;
        if added {
            self.keywords.push(normalize_term(term)?);
        }
        Ok(added)
    }

    /// Validate, persist and make a pattern live. Returns false if it already existed.
    pub fn add_pattern(&mut self, db: &Database, source: &str) -> Result<bool, ClassifierError> {
        let regex = compile_pattern(source)?;
        let added = db.add_regex(source)?;
        if added {
            self.patterns.push(CompiledPattern {
                source: source.to_string(),
                regex,
            });
        }
        Ok(added)
    }

    /// First keyword contained in `text`, ignoring case. Bumps its counter.
    pub fn matches_keyword(
        &self,
        db: &Database,
        text: &str,
    ) -> Result<Option<String>, ClassifierError> {
        let haystack = text.to_lowercase();
        for term in &self.keywords {
            if haystack.contains(term.as_str()) {
                db.increment_keyword_count(term)?;
                debug!(term = %term, "Keyword matched");
                return Ok(Some(term.clone()));
            }
        }
        Ok(None)
    }

    /// First pattern matching the body text. Bumps its counter.
    pub fn matches_regex(
        &self,
        db: &Database,
        body: Option<&str>,
    ) -> Result<Option<String>, ClassifierError> {
        let Some(body) = body else {
            return Ok(None);
        };
        for pattern in &self.patterns {
            if pattern.regex.is_match(body) {
                db.increment_regex_count(&pattern.source)?;
                debug!(pattern = %pattern.source, "Pattern matched");
                return Ok(Some(pattern.source.clone()));
            }
        }
        Ok(None)
    }

    pub fn is_known_bad_actor(
        db: &Database,
        handle: Option<&Handle>,
    ) -> Result<bool, ClassifierError> {
        match handle {
            Some(handle) => Ok(db.reported_user_exists(handle)?),
            None => Ok(false),
        }
    }

    pub fn classify(&self, db: &Database, item: &RenderedItem) -> Result<Verdict, ClassifierError> {
        if let Some(id) = &item.tweet_id {
            if db.reported_tweet_exists(id)? {
                return Ok(Verdict::AlreadyReported);
            }
        }
        if let Some(term) = self.matches_keyword(db, &item.text)? {
            return Ok(Verdict::Keyword(term));
        }
        if let Some(source) = self.matches_regex(db, item.body.as_deref())? {
            return Ok(Verdict::Pattern(source));
        }
        if let Some(author) = &item.author {
            if Self::is_known_bad_actor(db, Some(author))? {
                return Ok(Verdict::KnownBadActor(author.clone()));
            }
        }
        Ok(Verdict::Unmatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TweetId;

    fn item(text: &str, body: Option<&str>, author: &str, id: &str) -> RenderedItem {
        RenderedItem {
            slot: 0,
            text: text.to_string(),
            body: body.map(str::to_string),
            author: Handle::new(author),
            tweet_id: TweetId::new(id),
            has_expander: false,
        }
    }

    fn setup() -> (Database, Classifier) {
        let db = Database::open_in_memory().unwrap();
        let mut classifier = Classifier::load(&db).unwrap();
        classifier.add_keyword(&db, "Giveaway").unwrap();
        classifier.add_pattern(&db, r"whats?app\s*\+?\d+").unwrap();
        (db, classifier)
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let (db, classifier) = setup();
        let hit = classifier
            .matches_keyword(&db, "Huge GIVEAWAY today")
            .unwrap();
        assert_eq!(hit.as_deref(), Some("giveaway"));
        assert_eq!(db.keyword("giveaway").unwrap().unwrap().match_count, 1);
        assert!(classifier.matches_keyword(&db, "nothing here").unwrap().is_none());
    }

    #[test]
    fn test_padded_keyword_does_not_match_inside_words() {
        let (db, mut classifier) = setup();
        assert!(classifier.add_keyword(&db, " dm ").unwrap());

        assert!(classifier
            .matches_keyword(&db, "ask the admin please")
            .unwrap()
            .is_none());
        let hit = classifier.matches_keyword(&db, "just DM me").unwrap();
        assert_eq!(hit.as_deref(), Some(" dm "));
        assert_eq!(db.keyword(" dm ").unwrap().unwrap().match_count, 1);
    }

    #[test]
    fn test_keyword_wins_over_regex() {
        let (db, classifier) = setup();
        let both = item(
            "giveaway! whatsapp +123",
            Some("giveaway! whatsapp +123"),
            "someone",
            "100",
        );

        let verdict = classifier.classify(&db, &both).unwrap();
        assert_eq!(verdict, Verdict::Keyword("giveaway".to_string()));
        assert_eq!(db.keyword("giveaway").unwrap().unwrap().match_count, 1);
        assert_eq!(db.regex_patterns().unwrap()[0].match_count, 0);
    }

    #[test]
    fn test_regex_uses_body_only() {
        let (db, classifier) = setup();
        // Pattern text appears outside the body (e.g. in the display name)
        let outside = item("WhatsApp +1 Support\nhello", Some("hello"), "x", "1");
        assert_eq!(classifier.classify(&db, &outside).unwrap(), Verdict::Unmatched);

        let inside = item("hi", Some("Contact WHATSAPP +44"), "x", "2");
        let verdict = classifier.classify(&db, &inside).unwrap();
        assert_eq!(verdict, Verdict::Pattern(r"whats?app\s*\+?\d+".to_string()));
        assert_eq!(db.regex_patterns().unwrap()[0].match_count, 1);
    }

    #[test]
    fn test_already_reported_precedes_everything() {
        let (db, classifier) = setup();
        let id = TweetId::new("55").unwrap();
        db.record_reported_tweet(&id, None).unwrap();

        let verdict = classifier
            .classify(&db, &item("giveaway", None, "x", "55"))
            .unwrap();
        assert_eq!(verdict, Verdict::AlreadyReported);
        assert_eq!(db.keyword("giveaway").unwrap().unwrap().match_count, 0);
    }

    #[test]
    fn test_known_bad_actor_is_last_rule() {
        let (db, classifier) = setup();
        let spammer = Handle::new("@KnownBot").unwrap();
        db.record_reported_user(&spammer).unwrap();

        let verdict = classifier
            .classify(&db, &item("innocent text", Some("innocent text"), "knownbot", "9"))
            .unwrap();
        assert_eq!(verdict, Verdict::KnownBadActor(spammer));
        assert!(verdict.should_report());

        assert!(!Classifier::is_known_bad_actor(&db, None).unwrap());
    }

    #[test]
    fn test_invalid_pattern_rejected_and_not_stored() {
        let (db, mut classifier) = setup();
        let err = classifier.add_pattern(&db, "(unclosed").unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidPattern { .. }));
        assert_eq!(db.regex_patterns().unwrap().len(), 1);
        assert_eq!(classifier.pattern_count(), 1);
    }

    #[test]
    fn test_load_restores_rules_in_order() {
        let (db, _) = setup();
        db.add_keyword("second").unwrap();
        let loaded = Classifier::load(&db).unwrap();
        assert_eq!(loaded.keyword_count(), 2);
        assert_eq!(loaded.pattern_count(), 1);

        let hit = loaded.matches_keyword(&db, "second giveaway").unwrap();
        assert_eq!(hit.as_deref(), Some("giveaway"));
    }

    #[test]
    fn test_duplicate_runtime_adds_are_noops() {
        let (db, mut classifier) = setup();
        assert!(!classifier.add_keyword(&db, "GIVEAWAY").unwrap());
        assert!(!classifier.add_pattern(&db, r"whats?app\s*\+?\d+").unwrap());
        assert_eq!(classifier.keyword_count(), 1);
        assert_eq!(classifier.pattern_count(), 1);
    }
}

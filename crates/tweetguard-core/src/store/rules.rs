//! Keyword terms and regex patterns with their match counters.

use rusqlite::{params, OptionalExtension};

use super::db::Database;
use super::{StoreError, StoreResult};
use crate::models::{InvalidKey, KeywordTerm, RegexPattern};

/// Keywords are keyed by their lower-cased term; surrounding spaces are part of it.
pub(crate) fn normalize_term(term: &str) -> StoreResult<String> {
    if term.trim().is_empty() {
        return Err(InvalidKey {
            kind: "keyword",
            value: term.to_string(),
        }
        .into());
    }
    Ok(term.to_lowercase())
}

impl Database {
    // ===== Keywords =====

    /// Returns false when the lower-cased term already exists (count untouched).
    pub fn add_keyword(&self, term: &str) -> StoreResult<bool> {
        let term = normalize_term(term)?;
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO keywords (term, match_count) VALUES (?1, 0)",
            params![term],
        )?;
        Ok(inserted > 0)
    }

    pub fn keyword(&self, term: &str) -> StoreResult<Option<KeywordTerm>> {
        let term = normalize_term(term)?;
        Ok(self
            .conn()
            .query_row(
                "SELECT term, match_count FROM keywords WHERE term = ?1",
                params![term],
                |row| {
                    Ok(KeywordTerm {
                        term: row.get(0)?,
                        match_count: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    /// Every term, in the order it was added.
    pub fn keywords(&self) -> StoreResult<Vec<KeywordTerm>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT term, match_count FROM keywords ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok(KeywordTerm {
                term: row.get(0)?,
                match_count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fails with NotFound when the term was never added.
    pub fn increment_keyword_count(&self, term: &str) -> StoreResult<u32> {
        let term = normalize_term(term)?;
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE keywords SET match_count = match_count + 1 WHERE term = ?1",
            params![term],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("keywords", term));
        }
        Ok(conn.query_row(
            "SELECT match_count FROM keywords WHERE term = ?1",
            params![term],
            |row| row.get(0),
        )?)
    }

    pub fn preload_keywords(&self, terms: &[&str]) -> StoreResult<usize> {
        let mut added = 0;
        for term in terms {
            if self.add_keyword(term)? {
                added += 1;
            }
        }
        Ok(added)
    }

    // ===== Regex patterns =====

    /// Stores the pattern source text. Returns false when already present.
    ///
    /// Callers are expected to have compiled the pattern first; see
    /// [`Classifier::add_pattern`](crate::classifier::Classifier::add_pattern).
    pub fn add_regex(&self, source: &str) -> StoreResult<bool> {
        if source.is_empty() {
            return Err(InvalidKey {
                kind: "regex pattern",
                value: String::new(),
            }
            .into());
        }
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO regex_patterns (pattern, match_count) VALUES (?1, 0)",
            params![source],
        )?;
        Ok(inserted > 0)
    }

    pub fn regex_patterns(&self) -> StoreResult<Vec<RegexPattern>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT pattern, match_count FROM regex_patterns ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok(RegexPattern {
                source: row.get(0)?,
                match_count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fails with NotFound when the pattern source was never added.
    pub fn increment_regex_count(&self, source: &str) -> StoreResult<u32> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE regex_patterns SET match_count = match_count + 1 WHERE pattern = ?1",
            params![source],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("regex_patterns", source));
        }
        Ok(conn.query_row(
            "SELECT match_count FROM regex_patterns WHERE pattern = ?1",
            params![source],
            |row| row.get(0),
        )?)
    }

    pub fn preload_regex(&self, sources: &[&str]) -> StoreResult<usize> {
        let mut added = 0;
        for source in sources {
            if self.add_regex(source)? {
                added += 1;
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keyword_is_idempotent_across_casing() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_keyword("Free BTC").unwrap());
        db.increment_keyword_count("free btc").unwrap();

        assert!(!db.add_keyword("FREE btc").unwrap());
        assert!(!db.add_keyword("free btc").unwrap());

        let all = db.keywords().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].term, "free btc");
        assert_eq!(all[0].match_count, 1);
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.add_keyword("   "),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_padded_keyword_keeps_its_spaces() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_keyword(" DM ").unwrap());
        assert!(db.add_keyword("dm").unwrap());

        let terms: Vec<String> = db.keywords().unwrap().into_iter().map(|k| k.term).collect();
        assert_eq!(terms, vec![" dm ", "dm"]);
        assert!(db.keyword(" dm ").unwrap().is_some());
    }

    #[test]
    fn test_increment_missing_keyword_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.increment_keyword_count("absent").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_keywords_keep_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.preload_keywords(&["zeta", "alpha", "Zeta", "mid"]).unwrap(), 3);
        let terms: Vec<String> = db.keywords().unwrap().into_iter().map(|k| k.term).collect();
        assert_eq!(terms, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_regex_dedup_by_source_and_count() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_regex(r"dm\s+me").unwrap());
        assert!(!db.add_regex(r"dm\s+me").unwrap());
        // Different source text is a different pattern
        assert!(db.add_regex(r"DM\s+me").unwrap());

        assert_eq!(db.increment_regex_count(r"dm\s+me").unwrap(), 1);
        assert_eq!(db.increment_regex_count(r"dm\s+me").unwrap(), 2);
        assert!(db.increment_regex_count("nope").unwrap_err().is_not_found());

        let patterns = db.regex_patterns().unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].match_count, 2);
        assert_eq!(patterns[1].match_count, 0);
    }
}

//! In-memory presentation state: nicknames, Likert votes and free-text answers.
//!
//! Nothing here survives a restart. Every table keeps first-insertion order,
//! which is the order the audience sees in broadcasts and listings; updating
//! an existing key keeps its position.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{InteraktivError, InteraktivResult};

// ─────────────────────────────────────────────────────────────────────────────
// Ordered Table
// ─────────────────────────────────────────────────────────────────────────────

/// Small insertion-ordered map.
///
/// Serializes as a JSON object with keys in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedTable<V> {
    entries: Vec<(String, V)>,
}

impl<V> OrderedTable<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces the value for `key`, keeping an existing key's position.
    pub fn upsert(&mut self, key: &str, value: V) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the value for `key`, inserting a default first if absent.
    pub fn entry_or_default(&mut self, key: &str) -> &mut V
    where
        V: Default,
    {
        let index = match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => index,
            None => {
                self.entries.push((key.to_string(), V::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for OrderedTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for OrderedTable<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Likert Values
// ─────────────────────────────────────────────────────────────────────────────

/// A single Likert vote, `0` (full agreement) through `4` (full disagreement).
///
/// Travels as a one-digit string, as the frontend sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikertValue(u8);

impl LikertValue {
    /// Contribution of this vote to the agreement percentage.
    fn contribution(self) -> f64 {
        match self.0 {
            0 => 1.0,
            1 => 0.75,
            2 => 0.5,
            3 => 0.25,
            _ => 0.0,
        }
    }
}

impl FromStr for LikertValue {
    type Err = InteraktivError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [digit @ b'0'..=b'4'] => Ok(Self(digit - b'0')),
            _ => Err(InteraktivError::validation()),
        }
    }
}

impl fmt::Display for LikertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for LikertValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Agreement percentage of a set of votes, rounded half-to-even.
///
/// Returns `None` for an empty set.
#[must_use]
pub fn likert_percentage<'a>(votes: impl IntoIterator<Item = &'a LikertValue>) -> Option<u32> {
    let (sum, count) = votes
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), vote| {
            (sum + vote.contribution(), count + 1)
        });
    if count == 0 {
        return None;
    }
    Some((sum / f64::from(count) * 100.0).round_ties_even() as u32)
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Votes per scale: scale id -> nickname -> vote.
pub type LikertTable = OrderedTable<OrderedTable<LikertValue>>;

/// Answers per question: qid -> nickname -> answer.
pub type AnswerTable = OrderedTable<OrderedTable<String>>;

#[derive(Default)]
struct Tables {
    /// uuid -> nickname
    nicknames: OrderedTable<String>,
    likerts: LikertTable,
    answers: AnswerTable,
}

impl Tables {
    fn is_registered(&self, nickname: &str) -> bool {
        self.nicknames.values().any(|n| n == nickname)
    }
}

/// Presentation state shared by all handlers.
///
/// Votes and answers are keyed by nickname, and only nicknames that some
/// uuid has registered may vote or answer.
#[derive(Default)]
pub struct PresentationStore {
    tables: RwLock<Tables>,
}

impl PresentationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or renames) the participant `uuid` and returns every
    /// nickname in registration order.
    pub fn register_nickname(&self, uuid: &str, nickname: &str) -> Vec<String> {
        let mut tables = self.tables.write();
        tables.nicknames.upsert(uuid, nickname.to_string());
        tables.nicknames.values().cloned().collect()
    }

    pub fn nickname(&self, uuid: &str) -> Option<String> {
        self.tables.read().nicknames.get(uuid).cloned()
    }

    pub fn nicknames(&self) -> Vec<String> {
        self.tables.read().nicknames.values().cloned().collect()
    }

    /// Records `nickname`'s vote on `scale` and returns the scale's new
    /// agreement percentage.
    ///
    /// # Errors
    ///
    /// [`InteraktivError::UnknownUser`] if no uuid registered `nickname`.
    pub fn record_likert(
        &self,
        scale: &str,
        nickname: &str,
        value: LikertValue,
    ) -> InteraktivResult<u32> {
        let mut tables = self.tables.write();
        if !tables.is_registered(nickname) {
            return Err(InteraktivError::UnknownUser(
                "Unknown user can not vote".to_string(),
            ));
        }
        let votes = tables.likerts.entry_or_default(scale);
        votes.upsert(nickname, value);
        // A scale that was just written to has at least one vote.
        Ok(likert_percentage(votes.values()).unwrap_or_default())
    }

    /// Returns the agreement percentage of `scale`, if anyone voted on it.
    pub fn likert_percentage(&self, scale: &str) -> Option<u32> {
        let tables = self.tables.read();
        tables
            .likerts
            .get(scale)
            .and_then(|votes| likert_percentage(votes.values()))
    }

    pub fn likerts(&self) -> LikertTable {
        self.tables.read().likerts.clone()
    }

    /// Records `nickname`'s answer to `qid` and returns all answers to that
    /// question in first-answer order.
    ///
    /// # Errors
    ///
    /// [`InteraktivError::UnknownUser`] if no uuid registered `nickname`.
    pub fn record_answer(
        &self,
        qid: &str,
        nickname: &str,
        answer: &str,
    ) -> InteraktivResult<Vec<String>> {
        let mut tables = self.tables.write();
        if !tables.is_registered(nickname) {
            return Err(InteraktivError::UnknownUser("Unknown uuid".to_string()));
        }
        let answers = tables.answers.entry_or_default(qid);
        answers.upsert(nickname, answer.to_string());
        Ok(answers.values().cloned().collect())
    }

    pub fn answers_for(&self, qid: &str) -> Option<Vec<String>> {
        self.tables
            .read()
            .answers
            .get(qid)
            .map(|answers| answers.values().cloned().collect())
    }

    pub fn answers(&self) -> AnswerTable {
        self.tables.read().answers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vote(s: &str) -> LikertValue {
        s.parse().unwrap()
    }

    #[test]
    fn likert_value_accepts_single_digit_zero_to_four() {
        assert_eq!(vote("0"), LikertValue(0));
        assert_eq!(vote("4"), LikertValue(4));
        assert!("5".parse::<LikertValue>().is_err());
        assert!("".parse::<LikertValue>().is_err());
        assert!("12".parse::<LikertValue>().is_err());
        assert!(" 1".parse::<LikertValue>().is_err());
    }

    #[test]
    fn percentage_averages_contributions() {
        assert_eq!(likert_percentage(&[vote("0")]), Some(100));
        assert_eq!(likert_percentage(&[vote("4")]), Some(0));
        assert_eq!(likert_percentage(&[vote("0"), vote("2")]), Some(75));

        let no_votes: [LikertValue; 0] = [];
        assert_eq!(likert_percentage(&no_votes), None);
    }

    #[test]
    fn percentage_rounds_half_to_even() {
        // (1.0 + 0.25) / 2 = 62.5% -> 62
        assert_eq!(likert_percentage(&[vote("0"), vote("3")]), Some(62));
        // (0.75 + 0.0) / 2 = 37.5% -> 38
        assert_eq!(likert_percentage(&[vote("1"), vote("4")]), Some(38));
        // (1.0 + 0.75 + 0.75) / 3 = 83.33% -> 83
        assert_eq!(
            likert_percentage(&[vote("0"), vote("1"), vote("1")]),
            Some(83)
        );
    }

    #[test]
    fn nicknames_keep_registration_order() {
        let store = PresentationStore::new();
        store.register_nickname("b-1", "Hund");
        store.register_nickname("a-2", "Katze");
        let all = store.register_nickname("b-1", "Maus");

        assert_eq!(all, vec!["Maus", "Katze"]);
        assert_eq!(store.nickname("a-2").as_deref(), Some("Katze"));
        assert_eq!(store.nickname("ff"), None);
    }

    #[test]
    fn unknown_user_cannot_vote_or_answer() {
        let store = PresentationStore::new();

        let err = store.record_likert("scale1", "Hund", vote("1")).unwrap_err();
        assert!(matches!(err, InteraktivError::UnknownUser(_)));
        assert_eq!(err.to_string(), "Unknown user can not vote");

        let err = store.record_answer("q1", "Hund", "yes").unwrap_err();
        assert_eq!(err.to_string(), "Unknown uuid");

        assert_eq!(store.likert_percentage("scale1"), None);
        assert_eq!(store.answers_for("q1"), None);
    }

    #[test]
    fn revote_replaces_previous_vote() {
        let store = PresentationStore::new();
        store.register_nickname("1", "Hund");
        store.register_nickname("2", "Katze");

        assert_eq!(store.record_likert("s", "Hund", vote("4")).unwrap(), 0);
        assert_eq!(store.record_likert("s", "Katze", vote("0")).unwrap(), 50);
        assert_eq!(store.record_likert("s", "Hund", vote("0")).unwrap(), 100);
        assert_eq!(store.likert_percentage("s"), Some(100));
    }

    #[test]
    fn answers_are_listed_per_question() {
        let store = PresentationStore::new();
        store.register_nickname("1", "Hund");
        store.register_nickname("2", "Katze");

        store.record_answer("q1", "Hund", "I mean yes").unwrap();
        let all = store.record_answer("q1", "Katze", "no").unwrap();
        assert_eq!(all, vec!["I mean yes", "no"]);
        assert_eq!(store.answers_for("q1"), Some(all));
    }

    #[test]
    fn tables_serialize_in_insertion_order() {
        let store = PresentationStore::new();
        store.register_nickname("1", "Zebra");
        store.register_nickname("2", "Affe");
        store.record_likert("z-scale", "Zebra", vote("3")).unwrap();
        store.record_likert("a-scale", "Affe", vote("1")).unwrap();

        let json = serde_json::to_string(&store.likerts()).unwrap();
        assert_eq!(json, r#"{"z-scale":{"Zebra":"3"},"a-scale":{"Affe":"1"}}"#);

        store.record_answer("q", "Zebra", "z").unwrap();
        store.record_answer("q", "Affe", "a").unwrap();
        assert_eq!(
            serde_json::to_value(store.answers()).unwrap(),
            json!({"q": {"Zebra": "z", "Affe": "a"}})
        );
    }
}

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::collections::btree_set;
use thiserror::Error;

/// Wire format of an activity date (ISO 8601 calendar date).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActivityError {
    #[error("invalid activity date `{raw}`: expected YYYY-MM-DD")]
    InvalidDate { raw: String },
}

/// Parse a strict `YYYY-MM-DD` date string.
///
/// # Errors
///
/// Returns `ActivityError::InvalidDate` for anything else, including
/// timestamps with a time component.
pub fn parse_activity_date(raw: &str) -> Result<NaiveDate, ActivityError> {
    let invalid = || ActivityError::InvalidDate {
        raw: raw.to_owned(),
    };
    if raw.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| invalid())
}

#[must_use]
pub fn format_activity_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Set of calendar days on which the learner completed at least one session.
///
/// Append-only and order-irrelevant; duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityRecord {
    dates: BTreeSet<NaiveDate>,
}

impl ActivityRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from persisted date strings.
    ///
    /// # Errors
    ///
    /// Returns `ActivityError` on the first malformed date.
    pub fn parse<I, S>(raw: I) -> Result<Self, ActivityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .map(|s| parse_activity_date(s.as_ref()))
            .collect()
    }

    /// Adds a date; returns `false` if it was already present.
    pub fn insert(&mut self, date: NaiveDate) -> bool {
        self.dates.insert(date)
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Dates in ascending calendar order.
    pub fn iter(&self) -> btree_set::Iter<'_, NaiveDate> {
        self.dates.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.dates.iter().copied().map(format_activity_date).collect()
    }
}

impl FromIterator<NaiveDate> for ActivityRecord {
    fn from_iter<T: IntoIterator<Item = NaiveDate>>(iter: T) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

impl Extend<NaiveDate> for ActivityRecord {
    fn extend<T: IntoIterator<Item = NaiveDate>>(&mut self, iter: T) {
        self.dates.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ActivityRecord {
    type Item = &'a NaiveDate;
    type IntoIter = btree_set::Iter<'a, NaiveDate>;

    fn into_iter(self) -> Self::IntoIter {
        self.dates.iter()
    }
}

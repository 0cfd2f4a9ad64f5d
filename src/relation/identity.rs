//! Identity enum for representing single and composite column references
//!
//! This module provides the `Identity` enum which can represent either a single column
//! or a composite key consisting of multiple columns. Model primary keys and relation
//! keys are both expressed as an `Identity`; batch loading only accepts the unary form.

/// Represents a column identifier that can be single or composite
///
/// # Example
///
/// ```
/// use lifeguard_bulk::relation::identity::Identity;
///
/// let id = Identity::Unary("id".to_string());
/// assert_eq!(id.arity(), 1);
/// assert_eq!(id.as_unary(), Some("id"));
///
/// let composite = Identity::from(["id", "tenant_id"]);
/// assert_eq!(composite.arity(), 2);
/// assert_eq!(composite.as_unary(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Single column identifier
    Unary(String),
    /// Two or more column identifiers (composite key)
    Many(Vec<String>),
}

impl Identity {
    /// Get the arity (number of columns) for this identity
    pub fn arity(&self) -> usize {
        match self {
            Self::Unary(_) => 1,
            Self::Many(cols) => cols.len(),
        }
    }

    /// Iterate over column names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let cols: &[String] = match self {
            Self::Unary(col) => std::slice::from_ref(col),
            Self::Many(cols) => cols,
        };
        cols.iter().map(String::as_str)
    }

    /// The column name when this identity covers exactly one column
    pub fn as_unary(&self) -> Option<&str> {
        match self {
            Self::Unary(col) => Some(col),
            Self::Many(cols) if cols.len() == 1 => Some(&cols[0]),
            Self::Many(_) => None,
        }
    }

    /// Check if this identity contains a specific column
    pub fn contains(&self, col: &str) -> bool {
        self.iter().any(|c| c == col)
    }
}

impl From<&str> for Identity {
    fn from(col: &str) -> Self {
        Identity::Unary(col.to_string())
    }
}

impl From<String> for Identity {
    fn from(col: String) -> Self {
        Identity::Unary(col)
    }
}

impl<const N: usize> From<[&str; N]> for Identity {
    fn from(cols: [&str; N]) -> Self {
        if N == 1 {
            Identity::Unary(cols[0].to_string())
        } else {
            Identity::Many(cols.iter().map(|c| c.to_string()).collect())
        }
    }
}

//! Bounded candidate selection per event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MeteorError, Result};

/// How an event with more candidates than the limit is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Keep the candidates with the largest |pt|, in no particular order.
    TopK,
    /// Keep the leading candidates in source order.
    #[default]
    Truncate,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopK => write!(f, "topk"),
            Self::Truncate => write!(f, "truncate"),
        }
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "topk" | "top-k" => Ok(Self::TopK),
            "truncate" | "truncation" => Ok(Self::Truncate),
            other => Err(format!(
                "unknown selection mode '{other}', expected 'topk' or 'truncate'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kept {
    All,
    Prefix(usize),
    Indices(Vec<usize>),
}

/// Positions kept from one event's candidate list.
///
/// Computed once from the pt field and applied to every per-candidate field
/// of the same event so that entries stay index-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    source_len: usize,
    kept: Kept,
}

impl Selection {
    /// Keep every candidate of an event with `source_len` candidates.
    pub fn all(source_len: usize) -> Self {
        Self {
            source_len,
            kept: Kept::All,
        }
    }

    /// Number of candidates the selection was computed on.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Number of candidates kept.
    pub fn len(&self) -> usize {
        match &self.kept {
            Kept::All => self.source_len,
            Kept::Prefix(n) => *n,
            Kept::Indices(idx) => idx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kept source positions, in output order.
    pub fn indices(&self) -> Vec<usize> {
        match &self.kept {
            Kept::All => (0..self.source_len).collect(),
            Kept::Prefix(n) => (0..*n).collect(),
            Kept::Indices(idx) => idx.clone(),
        }
    }

    /// Apply the selection to one per-candidate field.
    pub fn apply<T: Copy>(&self, field: &str, values: &[T]) -> Result<Vec<T>> {
        if values.len() != self.source_len {
            return Err(MeteorError::RaggedMismatch {
                field: field.to_string(),
                expected: self.source_len,
                found: values.len(),
            });
        }
        Ok(match &self.kept {
            Kept::All => values.to_vec(),
            Kept::Prefix(n) => values[..*n].to_vec(),
            Kept::Indices(idx) => idx.iter().map(|&i| values[i]).collect(),
        })
    }
}

/// Choose at most `max` candidates of an event from its pt values.
///
/// With no limit, or with no more than `max` candidates, everything is kept
/// in order. Otherwise `Truncate` keeps the first `max` and `TopK` keeps the
/// `max` entries with the largest |pt| using a partial selection; the order
/// of the kept entries is the partition order and carries no meaning.
pub fn select_candidates(pt: &[f32], max: Option<usize>, mode: SelectionMode) -> Selection {
    let len = pt.len();
    let n = match max {
        Some(n) if n < len => n,
        _ => return Selection::all(len),
    };

    let kept = match mode {
        SelectionMode::Truncate => Kept::Prefix(n),
        SelectionMode::TopK if n == 0 => Kept::Indices(Vec::new()),
        SelectionMode::TopK => {
            let mut order: Vec<usize> = (0..len).collect();
            order.select_nth_unstable_by(n - 1, |&a, &b| pt[b].abs().total_cmp(&pt[a].abs()));
            order.truncate(n);
            Kept::Indices(order)
        }
    };
    Selection {
        source_len: len,
        kept,
    }
}

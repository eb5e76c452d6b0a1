use std::fmt;

use crate::generator::notice::{NoticeKind, Notices};
use crate::parser::names::{normalize_identifier, sanitize_column_names};

/// Which rule produced an [`Alignment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentBranch {
    /// Same length: renamed position by position.
    Positional,
    /// Every target name found among the incoming names.
    ByName,
    /// More incoming than target columns: the last N were used.
    Tail,
    /// Fewer incoming than target columns: the first M targets were filled.
    Prefix,
}

impl fmt::Display for AlignmentBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Positional => "positional",
            Self::ByName => "by-name",
            Self::Tail => "tail",
            Self::Prefix => "prefix",
        };
        f.write_str(name)
    }
}

/// Mapping of incoming columns onto target names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    /// Rule that was applied.
    pub branch: AlignmentBranch,
    /// `(incoming column, target column)` pairs in target order.
    pub pairs: Vec<(String, String)>,
    /// Fallback warnings.
    pub notices: Notices,
}

impl Alignment {
    /// Target names that received a column.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, target)| target.as_str())
    }
}

/// Align an unlabeled incoming column list onto `targets`.
///
/// Rules, tried in order:
/// 1. equal lengths: rename positionally;
/// 2. every target present by (sanitized, case-insensitive) name: rename by name;
/// 3. more incoming than targets: map the last N incoming columns, so
///    `SELECT <computed>, *` projections line up;
/// 4. fewer incoming than targets: fill the first M targets and leave the rest unmapped.
pub fn align_positional<T, S>(targets: &[T], incoming: &[S]) -> Alignment
where
    T: AsRef<str>,
    S: AsRef<str>,
{
    let targets: Vec<String> = targets
        .iter()
        .map(|t| normalize_identifier(t.as_ref()))
        .collect();
    let incoming: Vec<String> = incoming.iter().map(|c| c.as_ref().to_string()).collect();
    let (n, m) = (targets.len(), incoming.len());
    let mut notices = Notices::new();

    if m == n {
        return Alignment {
            branch: AlignmentBranch::Positional,
            pairs: incoming.into_iter().zip(targets).collect(),
            notices,
        };
    }

    let sanitized = sanitize_column_names(&incoming);
    let by_name: Option<Vec<(String, String)>> = targets
        .iter()
        .map(|target| {
            sanitized
                .iter()
                .position(|name| name == target)
                .map(|idx| (incoming[idx].clone(), target.clone()))
        })
        .collect();
    if let Some(pairs) = by_name {
        return Alignment {
            branch: AlignmentBranch::ByName,
            pairs,
            notices,
        };
    }

    if m > n {
        let dropped = &incoming[..m - n];
        notices.warn(
            NoticeKind::AlignmentFallback,
            format!(
                "{m} incoming columns for {n} targets; using the last {n}, dropping {dropped:?}"
            ),
        );
        return Alignment {
            branch: AlignmentBranch::Tail,
            pairs: incoming[m - n..].iter().cloned().zip(targets).collect(),
            notices,
        };
    }

    let unmapped = &targets[m..];
    notices.warn(
        NoticeKind::AlignmentFallback,
        format!("{m} incoming columns for {n} targets; leaving {unmapped:?} unmapped"),
    );
    Alignment {
        branch: AlignmentBranch::Prefix,
        pairs: incoming.iter().cloned().zip(targets.iter().cloned()).collect(),
        notices,
    }
}

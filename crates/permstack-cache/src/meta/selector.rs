//! Selection of a single meta value from the values collected for a key

use serde::{Deserialize, Serialize};

/// Strategy for picking one value for a meta key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetaValueSelector {
    /// First value in inheritance order
    #[default]
    First,
    /// Largest numeric value
    HighestNumber,
    /// Smallest numeric value
    LowestNumber,
}

impl MetaValueSelector {
    /// Pick a value. Non-numeric values are skipped by the numeric selectors,
    /// which fall back to the first value when nothing parses.
    pub fn select(self, values: &[String]) -> Option<&str> {
        let first = values.first().map(String::as_str);
        let wanted = match self {
            Self::First => return first,
            Self::HighestNumber => std::cmp::Ordering::Greater,
            Self::LowestNumber => std::cmp::Ordering::Less,
        };

        let mut best: Option<(f64, &str)> = None;
        for value in values {
            let Some(number) = value.trim().parse::<f64>().ok().filter(|n| n.is_finite()) else {
                continue;
            };
            let replace = best.is_none_or(|(current, _)| number.partial_cmp(&current) == Some(wanted));
            if replace {
                best = Some((number, value.as_str()));
            }
        }
        best.map(|(_, value)| value).or(first)
    }
}

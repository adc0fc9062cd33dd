use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Single-site measurement basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Basis {
    X,
    Y,
    Z,
}

impl Basis {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'X' => Some(Basis::X),
            'Y' => Some(Basis::Y),
            'Z' => Some(Basis::Z),
            _   => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Basis::X => 'X',
            Basis::Y => 'Y',
            Basis::Z => 'Z',
        }
    }
}

/// One basis per visible unit, e.g. `XZZ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasisLabel(Vec<Basis>);

impl BasisLabel {
    pub fn new(sites: Vec<Basis>) -> Self {
        Self(sites)
    }

    /// The all-`Z` label for `n` sites.
    pub fn computational(n: usize) -> Self {
        Self(vec![Basis::Z; n])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sites(&self) -> &[Basis] {
        &self.0
    }

    pub fn is_computational(&self) -> bool {
        self.0.iter().all(|&b| b == Basis::Z)
    }
}

impl fmt::Display for BasisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{}", b.as_char())?;
        }
        Ok(())
    }
}

/// Accepts both `X Z Z` and `XZZ`, case-insensitive.
impl FromStr for BasisLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sites = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| Basis::from_char(c).ok_or_else(|| format!("'{c}' is not a basis (X, Y or Z)")))
            .collect::<Result<Vec<_>, _>>()?;

        if sites.is_empty() {
            return Err("empty basis label".to_string());
        }
        Ok(Self(sites))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spaced_and_compact() {
        let spaced: BasisLabel  = "X z Z".parse().unwrap();
        let compact: BasisLabel = "XZZ".parse().unwrap();
        assert_eq!(spaced, compact);
        assert_eq!(compact.to_string(), "XZZ");
    }

    #[test]
    fn test_rejects_unknown_letter() {
        assert!("XQZ".parse::<BasisLabel>().is_err());
        assert!("   ".parse::<BasisLabel>().is_err());
    }

    #[test]
    fn test_computational() {
        let z = BasisLabel::computational(3);
        assert!(z.is_computational());
        assert!(!"ZXZ".parse::<BasisLabel>().unwrap().is_computational());
    }
}

//! Phase mini-language.
//!
//! A phase is a `/`-separated list of tokens:
//!
//! - `rand` marks the phase for shuffled, Monte-Carlo averaged execution;
//! - `lamda=<number>` (or `lambda=`) overrides the asymptote for this phase;
//! - `<count?><LETTERS><sign?>` adds `count` (default 1) trial elements of the
//!   compound `LETTERS` with sign `+` (default) or `-`.
//!
//! Token order only matters for trial elements, which accumulate as written.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Whether the US follows the compound (`+`) or not (`-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn as_char(self) -> char {
        match self {
            Sign::Plus => '+',
            Sign::Minus => '-',
        }
    }

    /// `+1` or `-1`, as consumed by the step rules.
    pub fn value(self) -> i32 {
        match self {
            Sign::Plus => 1,
            Sign::Minus => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrialElement {
    /// Distinct uppercase letters in sorted order.
    pub compound: String,
    pub sign: Sign,
}

impl TrialElement {
    pub fn new(compound: &str, sign: Sign) -> Self {
        let mut letters: Vec<char> = compound.chars().collect();
        letters.sort_unstable();
        Self {
            compound: letters.into_iter().collect(),
            sign,
        }
    }

    pub fn is_compound(&self) -> bool {
        self.compound.len() > 1
    }
}

impl fmt::Display for TrialElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.compound, self.sign.as_char())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Phase {
    pub elems: Vec<TrialElement>,
    pub rand: bool,
    /// Phase-local asymptote; the group's `lamda` applies when absent.
    pub lamda: Option<f64>,
    /// The text this phase was parsed from, kept for display.
    pub phase_str: String,
}

impl Phase {
    pub fn parse(phase_str: &str) -> Result<Self> {
        let mut phase = Phase {
            elems: Vec::new(),
            rand: false,
            lamda: None,
            phase_str: phase_str.to_string(),
        };

        for token in phase_str.trim().split('/') {
            let token = token.trim();
            if token == "rand" {
                phase.rand = true;
            } else if let Some(rest) = strip_lamda(token) {
                phase.lamda = Some(parse_lamda(rest, token, phase_str)?);
            } else {
                let (count, elem) = parse_trial_token(token, phase_str)?;
                phase.elems.extend(std::iter::repeat(elem).take(count));
            }
        }

        Ok(phase)
    }

    /// Single-letter stimuli appearing anywhere in the phase.
    pub fn cs(&self) -> BTreeSet<char> {
        self.elems
            .iter()
            .flat_map(|e| e.compound.chars())
            .collect()
    }

    /// Multi-letter compounds appearing in the phase.
    pub fn compounds(&self) -> BTreeSet<String> {
        self.elems
            .iter()
            .filter(|e| e.is_compound())
            .map(|e| e.compound.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

impl FromStr for Phase {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Phase::parse(s)
    }
}

/// Canonical text form: runs of identical elements are collapsed into a count.
///
/// Parsing the output yields the same trial elements, `rand` flag and asymptote,
/// though not necessarily the original formatting.
impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens: Vec<String> = Vec::new();

        let mut i = 0;
        while i < self.elems.len() {
            let elem = &self.elems[i];
            let mut run = 1;
            while i + run < self.elems.len() && self.elems[i + run] == *elem {
                run += 1;
            }
            if run == 1 {
                tokens.push(elem.to_string());
            } else {
                tokens.push(format!("{run}{elem}"));
            }
            i += run;
        }

        if let Some(lamda) = self.lamda {
            tokens.push(format!("lamda={lamda}"));
        }
        if self.rand {
            tokens.push("rand".to_string());
        }

        f.write_str(&tokens.join("/"))
    }
}

fn strip_lamda(token: &str) -> Option<&str> {
    token
        .strip_prefix("lambda")
        .or_else(|| token.strip_prefix("lamda"))
}

fn parse_lamda(rest: &str, token: &str, phase_str: &str) -> Result<f64> {
    let number = rest
        .trim_start()
        .strip_prefix('=')
        .ok_or_else(|| SimError::parse(token, phase_str, "expected `=` after lamda"))?
        .trim_start();

    let mut digits = 0usize;
    let mut dots = 0usize;
    for c in number.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => {
                return Err(SimError::parse(
                    token,
                    phase_str,
                    format!("unexpected character `{c}` in asymptote"),
                ))
            }
        }
    }
    if digits == 0 || dots > 1 {
        return Err(SimError::parse(token, phase_str, "malformed asymptote value"));
    }

    number
        .parse::<f64>()
        .map_err(|e| SimError::parse(token, phase_str, e.to_string()))
}

fn parse_trial_token(token: &str, phase_str: &str) -> Result<(usize, TrialElement)> {
    if token.is_empty() {
        return Err(SimError::parse(token, phase_str, "empty token"));
    }

    let letters_at = token
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| SimError::parse(token, phase_str, "count without stimuli"))?;
    let (count, rest) = token.split_at(letters_at);

    let count = if count.is_empty() {
        1
    } else {
        count
            .parse::<usize>()
            .map_err(|e| SimError::parse(token, phase_str, e.to_string()))?
    };
    if count == 0 {
        return Err(SimError::parse(token, phase_str, "count must be at least 1"));
    }

    let (letters, sign) = match rest.chars().last() {
        Some('+') => (&rest[..rest.len() - 1], Sign::Plus),
        Some('-') => (&rest[..rest.len() - 1], Sign::Minus),
        _ => (rest, Sign::Plus),
    };

    if letters.is_empty() {
        return Err(SimError::parse(token, phase_str, "no stimuli before sign"));
    }
    if let Some(c) = letters.chars().find(|c| !c.is_ascii_uppercase()) {
        return Err(SimError::parse(
            token,
            phase_str,
            format!("unexpected character `{c}`"),
        ));
    }

    let mut seen = BTreeSet::new();
    for c in letters.chars() {
        if !seen.insert(c) {
            return Err(SimError::parse(
                token,
                phase_str,
                format!("stimulus `{c}` repeated within a compound"),
            ));
        }
    }

    Ok((count, TrialElement::new(letters, sign)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn elem(compound: &str, sign: Sign) -> TrialElement {
        TrialElement::new(compound, sign)
    }

    #[test]
    fn repeated_compound_with_rand() {
        let phase = Phase::parse("2AB+/rand").unwrap();
        assert!(phase.rand);
        assert_eq!(
            phase.elems,
            vec![elem("AB", Sign::Plus), elem("AB", Sign::Plus)]
        );
        assert_eq!(phase.lamda, None);
    }

    #[test]
    fn defaults_and_ordering() {
        let phase = Phase::parse("A/3B-/lambda=0.5/C+").unwrap();
        assert_eq!(
            phase.elems,
            vec![
                elem("A", Sign::Plus),
                elem("B", Sign::Minus),
                elem("B", Sign::Minus),
                elem("B", Sign::Minus),
                elem("C", Sign::Plus),
            ]
        );
        assert_eq!(phase.lamda, Some(0.5));
        assert!(!phase.rand);
        assert_eq!(phase.phase_str, "A/3B-/lambda=0.5/C+");
    }

    #[test]
    fn lamda_spellings() {
        assert_eq!(Phase::parse("A+/lamda = 2").unwrap().lamda, Some(2.0));
        assert_eq!(Phase::parse("A+/lamda=.25").unwrap().lamda, Some(0.25));
        assert_eq!(Phase::parse("A+/lambda=1.").unwrap().lamda, Some(1.0));
        assert!(Phase::parse("A+/lamda=").is_err());
        assert!(Phase::parse("A+/lamda=1.2.3").is_err());
        assert!(Phase::parse("A+/lamda=x").is_err());
    }

    #[test]
    fn compounds_are_canonical() {
        let phase = Phase::parse("BA+").unwrap();
        assert_eq!(phase.elems[0].compound, "AB");
        assert_eq!(phase.compounds().into_iter().collect::<Vec<_>>(), vec!["AB"]);
        assert_eq!(phase.cs().into_iter().collect::<String>(), "AB");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["A?", "a+", "A+B", "10", "+", "AAB+", "A//B", "A*2", ""] {
            let err = Phase::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "{bad:?} should not parse");
        }
    }

    #[test]
    fn error_names_token_and_phase() {
        match Phase::parse("10A+/X!").unwrap_err() {
            SimError::Parse { token, phase, .. } => {
                assert_eq!(token, "X!");
                assert_eq!(phase, "10A+/X!");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn zero_count_is_rejected() {
        for bad in ["0A+", "0A+/B-", "00AB-/rand"] {
            match Phase::parse(bad).unwrap_err() {
                SimError::Parse { token, .. } => assert!(token.starts_with('0'), "{bad:?}"),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn display_reparses_to_same_elements() {
        for src in [
            "2AB+/rand",
            "10A+/5B-/A+/lamda=0.3",
            "rand/AB-/BA-/C/lambda = 1.5/3C+",
            "X",
            "10B-",
            "rand",
            "lamda=0.5",
        ] {
            let parsed = Phase::parse(src).unwrap();
            let reparsed = Phase::parse(&parsed.to_string()).unwrap();
            assert_eq!(reparsed.elems, parsed.elems, "round trip of {src:?}");
            assert_eq!(reparsed.rand, parsed.rand);
            assert_eq!(reparsed.lamda, parsed.lamda);
        }
    }

    #[test]
    fn display_collapses_runs() {
        let phase = Phase::parse("A+/A+/A+/B-/A+/rand").unwrap();
        assert_eq!(phase.to_string(), "3A+/B-/A+/rand");
    }
}

//! Folds per-step `Strengths` into display histories keyed `"<group> - <stimulus>"`.

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::strengths::{History, Strengths};

/// Display key -> history, for one phase.
pub type PhaseHistories = BTreeMap<String, History>;

/// Which phases, groups and stimuli end up in the aggregated output.
///
/// `None` everywhere keeps everything.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HistoryFilter {
    /// 1-based phase number.
    pub phase: Option<usize>,
    pub groups: Option<Vec<String>>,
    pub stimuli: Option<Vec<String>>,
}

impl HistoryFilter {
    pub fn with_phase(mut self, phase: usize) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_stimuli<I, S>(mut self, stimuli: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stimuli = Some(stimuli.into_iter().map(Into::into).collect());
        self
    }

    pub fn includes_group(&self, name: &str) -> bool {
        self.groups
            .as_ref()
            .map_or(true, |groups| groups.iter().any(|g| g == name))
    }

    /// Stimulus allow-list in canonical key form (`BA` and `AB` are the same).
    fn stimulus_keys(&self) -> Option<BTreeSet<String>> {
        self.stimuli
            .as_ref()
            .map(|stimuli| stimuli.iter().map(|s| canonical_key(s.trim())).collect())
    }
}

/// Builds one [`PhaseHistories`] per phase of a single group's results.
///
/// Every derivable key of each step (see [`Strengths::ordered_cs`]) is folded
/// into its history unless the filter's stimulus allow-list excludes it. The
/// filter's phase selection is not applied here.
pub fn group_results(
    results: &[Vec<Strengths>],
    name: &str,
    filter: &HistoryFilter,
) -> Result<Vec<PhaseHistories>> {
    let allowed = filter.stimulus_keys();

    results
        .iter()
        .map(|steps| {
            let mut histories = PhaseHistories::new();
            for strengths in steps {
                for cs in strengths.ordered_cs() {
                    if allowed.as_ref().map_or(false, |a| !a.contains(&cs)) {
                        continue;
                    }
                    let ind = strengths.combined(&cs)?;
                    histories
                        .entry(format!("{name} - {cs}"))
                        .or_default()
                        .add(&ind);
                }
            }
            Ok(histories)
        })
        .collect()
}

/// Merges another group's per-phase histories into `into`, phase by phase.
///
/// The result grows to the longer of the two phase lists; groups with fewer
/// phases simply contribute nothing to the later ones.
pub fn merge(into: &mut Vec<PhaseHistories>, other: Vec<PhaseHistories>) {
    if into.len() < other.len() {
        into.resize_with(other.len(), PhaseHistories::new);
    }
    for (acc, phase) in into.iter_mut().zip(other) {
        acc.extend(phase);
    }
}

/// Keeps only the filter's selected phase, if any.
///
/// A phase number outside `1..=len` leaves nothing.
pub fn select_phase(histories: Vec<PhaseHistories>, filter: &HistoryFilter) -> Vec<PhaseHistories> {
    match filter.phase {
        None => histories,
        Some(n) => histories
            .into_iter()
            .nth(n.wrapping_sub(1))
            .into_iter()
            .collect(),
    }
}

fn canonical_key(key: &str) -> String {
    if let Some(inner) = key.strip_prefix("c(").and_then(|k| k.strip_suffix(')')) {
        return format!("c({})", canonical_key(inner));
    }
    let mut letters: Vec<char> = key.chars().collect();
    letters.sort_unstable();
    letters.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{Group, GroupParams};
    use crate::phase::Phase;
    use crate::prng::InOrder;
    use crate::runner::run_group_experiments;
    use crate::AdaptiveType;

    fn simulate(
        name: &str,
        stimuli: &[&str],
        phases: &[&str],
        configurals: bool,
    ) -> Vec<Vec<Strengths>> {
        let stimuli: BTreeSet<String> = stimuli.iter().map(|s| s.to_string()).collect();
        let params = GroupParams::default()
            .with_adaptive_type(AdaptiveType::Linear)
            .with_configurals(configurals);
        let mut g = Group::new(name, &BTreeMap::new(), 0.1, &stimuli, params).unwrap();
        let phases: Vec<Phase> = phases.iter().map(|p| Phase::parse(p).unwrap()).collect();
        run_group_experiments(&mut g, &phases, 1, &mut InOrder).unwrap()
    }

    #[test]
    fn keys_cover_all_derivable_stimuli() {
        let results = simulate("Control", &["A", "B"], &["2AB+", "A-"], false);
        let out = group_results(&results, "Control", &HistoryFilter::default()).unwrap();

        assert_eq!(out.len(), 2);
        let keys: Vec<&str> = out[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["Control - A", "Control - AB", "Control - B"]);
        assert_eq!(out[0]["Control - A"].len(), 3);
    }

    #[test]
    fn compound_history_sums_its_letters() {
        let results = simulate("G", &["A", "B"], &["3AB+"], false);
        let out = group_results(&results, "G", &HistoryFilter::default()).unwrap();

        let a = out[0]["G - A"].assoc();
        let b = out[0]["G - B"].assoc();
        let ab = out[0]["G - AB"].assoc();
        for i in 0..ab.len() {
            assert!((ab[i] - (a[i] + b[i]).min(1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn configural_alias_is_reported() {
        let results = simulate("G", &["AB"], &["AB+"], true);
        let out = group_results(&results, "G", &HistoryFilter::default()).unwrap();

        assert!(out[0].contains_key("G - c(AB)"));
        let ab = out[0]["G - AB"].assoc();
        let parts = out[0]["G - A"].assoc()[1]
            + out[0]["G - B"].assoc()[1]
            + out[0]["G - c(AB)"].assoc()[1];
        assert!((ab[1] - parts).abs() < 1e-12);
    }

    #[test]
    fn stimulus_allow_list_is_canonicalized() {
        let results = simulate("G", &["A", "B"], &["AB+"], false);
        let filter = HistoryFilter::default().with_stimuli(["BA", " A "]);
        let out = group_results(&results, "G", &filter).unwrap();

        let keys: Vec<&str> = out[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["G - A", "G - AB"]);
    }

    #[test]
    fn merge_extends_to_longest_group() {
        let all_of = HistoryFilter::default();
        let one = group_results(&simulate("One", &["A"], &["A+"], false), "One", &all_of).unwrap();
        let two =
            group_results(&simulate("Two", &["B"], &["B+", "B-"], false), "Two", &all_of).unwrap();

        let mut all = Vec::new();
        merge(&mut all, one);
        merge(&mut all, two);

        assert_eq!(all.len(), 2);
        assert!(all[0].contains_key("One - A") && all[0].contains_key("Two - B"));
        assert_eq!(all[1].keys().collect::<Vec<_>>(), ["Two - B"]);
    }

    #[test]
    fn phase_selection() {
        let results = simulate("G", &["A"], &["A+", "A-", "A+"], false);
        let out = group_results(&results, "G", &HistoryFilter::default()).unwrap();

        let second = select_phase(out.clone(), &HistoryFilter::default().with_phase(2));
        assert_eq!(second, vec![out[1].clone()]);
        assert!(select_phase(out.clone(), &HistoryFilter::default().with_phase(0)).is_empty());
        assert!(select_phase(out, &HistoryFilter::default().with_phase(9)).is_empty());
    }

    #[test]
    fn group_filter() {
        let filter = HistoryFilter::default().with_groups(["Blocking"]);
        assert!(filter.includes_group("Blocking"));
        assert!(!filter.includes_group("Control"));
        assert!(HistoryFilter::default().includes_group("anything"));
    }
}

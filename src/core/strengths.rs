//! Per-stimulus state and its combination algebra.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// `delta_ma_hall` assumed before any moving average exists.
pub const DEFAULT_DELTA_MA_HALL: f64 = 0.2;

/// Bounded FIFO of trailing associative strengths.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Window {
    values: VecDeque<f64>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value`, evicting the oldest entries first so that the length
    /// never exceeds `capacity`.
    pub fn push(&mut self, value: f64, capacity: usize) {
        let capacity = capacity.max(1);
        while self.values.len() >= capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Element-wise sum over the trailing entries both windows share.
    fn sum_trailing(&self, other: &Window) -> Window {
        let n = self.len().min(other.len());
        Window {
            values: self
                .values
                .iter()
                .skip(self.len() - n)
                .zip(other.values.iter().skip(other.len() - n))
                .map(|(&a, &b)| a + b)
                .collect(),
        }
    }

    fn map(&self, op: impl Fn(f64) -> f64) -> Window {
        Window {
            values: self.values.iter().map(|&a| op(a)).collect(),
        }
    }
}

/// Snapshot of one stimulus.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Individual {
    pub assoc: f64,

    // Weight actually applied to the prediction error.
    pub alpha: f64,
    pub alpha_mack: f64,
    pub alpha_hall: f64,

    // Excitatory / inhibitory accumulators of the dual-process rules.
    pub ve: f64,
    pub vi: f64,

    pub window: Window,
    pub delta_ma_hall: Option<f64>,
}

impl Individual {
    pub fn new(alpha: f64) -> Self {
        Self::with_assoc(0.0, alpha)
    }

    /// `assoc` is capped at 1 here; later updates are not capped.
    pub fn with_assoc(assoc: f64, alpha: f64) -> Self {
        Self {
            assoc: assoc.min(1.0),
            alpha,
            alpha_mack: alpha,
            alpha_hall: alpha,
            ve: 0.0,
            vi: 0.0,
            window: Window::new(),
            delta_ma_hall: None,
        }
    }

    /// Field-by-field sum of two snapshots of the same stimulus. The result
    /// goes through the construction cap, so a summed `assoc` never exceeds 1.
    pub fn try_add(&self, other: &Individual) -> Result<Individual> {
        if self.window.len() != other.window.len() {
            return Err(SimError::Shape(format!(
                "window lengths differ ({} vs {})",
                self.window.len(),
                other.window.len()
            )));
        }
        Ok(self.combine(other))
    }

    /// Field-by-field sum of two different stimuli, as shown for a compound.
    ///
    /// Letters trained in separate phases carry windows of different
    /// lengths; only the trailing entries they share are summed.
    pub fn combine(&self, other: &Individual) -> Individual {
        let delta_ma_hall = match (self.delta_ma_hall, other.delta_ma_hall) {
            (Some(a), Some(b)) => Some(a + b),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };

        Individual {
            assoc: (self.assoc + other.assoc).min(1.0),
            alpha: self.alpha + other.alpha,
            alpha_mack: self.alpha_mack + other.alpha_mack,
            alpha_hall: self.alpha_hall + other.alpha_hall,
            ve: self.ve + other.ve,
            vi: self.vi + other.vi,
            window: self.window.sum_trailing(&other.window),
            delta_ma_hall,
        }
    }

    pub fn div(&self, quot: f64) -> Individual {
        Individual {
            assoc: self.assoc / quot,
            alpha: self.alpha / quot,
            alpha_mack: self.alpha_mack / quot,
            alpha_hall: self.alpha_hall / quot,
            ve: self.ve / quot,
            vi: self.vi / quot,
            window: self.window.map(|a| a / quot),
            delta_ma_hall: self.delta_ma_hall.map(|d| d / quot),
        }
    }

    /// Mean of `items`, dividing each operand before summing.
    pub fn avg(items: &[Individual]) -> Result<Individual> {
        let (first, rest) = items
            .split_first()
            .ok_or_else(|| SimError::Shape("cannot average an empty list".into()))?;
        let n = items.len() as f64;

        rest.iter()
            .try_fold(first.div(n), |acc, x| acc.try_add(&x.div(n)))
    }
}

/// Stimulus key -> state.
///
/// Keys are single letters, or whole compounds when configural cues are on.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Strengths {
    s: BTreeMap<String, Individual>,
}

impl Strengths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(s: BTreeMap<String, Individual>) -> Self {
        Self { s }
    }

    pub fn insert(&mut self, key: impl Into<String>, ind: Individual) {
        self.s.insert(key.into(), ind);
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.s.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.s.keys().map(String::as_str)
    }

    /// The tracked entry for `key`, without any combination.
    pub fn individual(&self, key: &str) -> Option<&Individual> {
        self.s.get(key)
    }

    pub(crate) fn individual_mut(&mut self, key: &str) -> Option<&mut Individual> {
        self.s.get_mut(key)
    }

    /// Sum of the single-letter entries spelled by `key`.
    pub fn get(&self, key: &str) -> Result<Individual> {
        let mut letters: Vec<char> = key.chars().collect();
        letters.sort_unstable();
        if letters.windows(2).any(|w| w[0] == w[1]) {
            return Err(SimError::Shape(format!(
                "compound `{key}` repeats a stimulus"
            )));
        }

        let mut parts = letters.iter().map(|c| {
            let k = c.to_string();
            self.s
                .get(&k)
                .ok_or_else(|| SimError::Shape(format!("no state for stimulus `{k}`")))
        });

        let first = parts
            .next()
            .ok_or_else(|| SimError::Shape("empty stimulus key".into()))??
            .clone();
        parts.try_fold(first, |acc, part| Ok(acc.combine(part?)))
    }

    /// Value displayed for any key produced by [`Strengths::combined_cs`].
    ///
    /// A compound tracked with its own configural state adds that state on
    /// top of the sum of its letters; `c(<compound>)` yields the configural
    /// state alone.
    pub fn combined(&self, key: &str) -> Result<Individual> {
        if let Some(inner) = configural_inner(key) {
            return self
                .s
                .get(inner)
                .cloned()
                .ok_or_else(|| SimError::Shape(format!("no configural state for `{inner}`")));
        }

        let summed = self.get(key)?;
        match self.s.get(&canonical(key)) {
            Some(own) if key.len() > 1 => Ok(summed.combine(own)),
            _ => Ok(summed),
        }
    }

    /// Every derivable key: each non-empty subset of the single letters, plus
    /// every tracked compound and its `c(<compound>)` alias.
    ///
    /// The subset enumeration is exponential in the number of letters.
    pub fn combined_cs(&self) -> BTreeSet<String> {
        let simples: Vec<char> = self
            .s
            .keys()
            .filter(|k| k.len() == 1)
            .filter_map(|k| k.chars().next())
            .collect();

        let mut out = BTreeSet::new();
        for mask in 1u64..(1u64 << simples.len()) {
            let key: String = simples
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| *c)
                .collect();
            out.insert(key);
        }

        for k in self.s.keys().filter(|k| k.len() > 1) {
            out.insert(k.clone());
            out.insert(format!("c({k})"));
        }

        out
    }

    /// [`Strengths::combined_cs`] ordered simple stimuli first, then larger compounds.
    pub fn ordered_cs(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.combined_cs().into_iter().collect();
        keys.sort_by(|a, b| (a.len(), a).cmp(&(b.len(), b)));
        keys
    }

    /// Sum of `assoc` over every tracked entry.
    pub fn sigma(&self) -> f64 {
        self.s.values().map(|x| x.assoc).sum()
    }

    pub fn try_add(&self, other: &Strengths) -> Result<Strengths> {
        if !self.s.keys().eq(other.s.keys()) {
            return Err(SimError::Shape(format!(
                "stimulus sets differ ({:?} vs {:?})",
                self.s.keys().collect::<Vec<_>>(),
                other.s.keys().collect::<Vec<_>>()
            )));
        }

        let s = self
            .s
            .iter()
            .zip(other.s.values())
            .map(|((k, a), b)| Ok((k.clone(), a.try_add(b)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Strengths { s })
    }

    pub fn div(&self, quot: f64) -> Strengths {
        Strengths {
            s: self.s.iter().map(|(k, v)| (k.clone(), v.div(quot))).collect(),
        }
    }

    /// Mean of same-keyed `Strengths`, computed as `sum(x / n)` rather than
    /// `sum(x) / n` because summed `assoc` values are capped.
    ///
    /// The partial sums still pass through the cap, so any mean above 1 comes
    /// back as 1. Only the `hall` rule drives `assoc` past 1; averaging
    /// identical states at 1.4 yields 1.0.
    pub fn avg(items: &[Strengths]) -> Result<Strengths> {
        let (first, rest) = items
            .split_first()
            .ok_or_else(|| SimError::Shape("cannot average an empty list".into()))?;
        let n = items.len() as f64;

        rest.iter()
            .try_fold(first.div(n), |acc, x| acc.try_add(&x.div(n)))
    }

    /// Transposes per-stimulus histories into one `Strengths` per step index.
    ///
    /// Step `i` holds the `i`-th snapshot of every history that is long enough.
    pub fn from_histories(histories: &BTreeMap<String, History>) -> Vec<Strengths> {
        let longest = histories.values().map(History::len).max().unwrap_or(0);

        (0..longest)
            .map(|i| Strengths {
                s: histories
                    .iter()
                    .filter_map(|(cs, h)| h.get(i).map(|ind| (cs.clone(), ind.clone())))
                    .collect(),
            })
            .collect()
    }
}

fn configural_inner(key: &str) -> Option<&str> {
    key.strip_prefix("c(")?.strip_suffix(')')
}

fn canonical(key: &str) -> String {
    let mut letters: Vec<char> = key.chars().collect();
    letters.sort_unstable();
    letters.into_iter().collect()
}

/// Append-only sequence of snapshots of one stimulus within one phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    hist: Vec<Individual>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ind: &Individual) {
        self.hist.push(ind.clone());
    }

    pub fn len(&self) -> usize {
        self.hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Individual> {
        self.hist.get(i)
    }

    pub fn last(&self) -> Option<&Individual> {
        self.hist.last()
    }

    pub fn assoc(&self) -> Vec<f64> {
        self.hist.iter().map(|x| x.assoc).collect()
    }

    pub fn alpha(&self) -> Vec<f64> {
        self.hist.iter().map(|x| x.alpha).collect()
    }

    pub fn alpha_mack(&self) -> Vec<f64> {
        self.hist.iter().map(|x| x.alpha_mack).collect()
    }

    pub fn alpha_hall(&self) -> Vec<f64> {
        self.hist.iter().map(|x| x.alpha_hall).collect()
    }

    pub fn ve(&self) -> Vec<f64> {
        self.hist.iter().map(|x| x.ve).collect()
    }

    pub fn vi(&self) -> Vec<f64> {
        self.hist.iter().map(|x| x.vi).collect()
    }

    pub fn delta_ma_hall(&self) -> Vec<Option<f64>> {
        self.hist.iter().map(|x| x.delta_ma_hall).collect()
    }

    pub fn series(&self) -> HistorySeries {
        HistorySeries {
            assoc: self.assoc(),
            alpha: self.alpha(),
            alpha_mack: self.alpha_mack(),
            alpha_hall: self.alpha_hall(),
            ve: self.ve(),
            vi: self.vi(),
        }
    }
}

/// Parallel per-field sequences of a [`History`], as handed to a renderer.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistorySeries {
    pub assoc: Vec<f64>,
    pub alpha: Vec<f64>,
    pub alpha_mack: Vec<f64>,
    pub alpha_hall: Vec<f64>,
    pub ve: Vec<f64>,
    pub vi: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn ind(assoc: f64, alpha: f64) -> Individual {
        Individual::with_assoc(assoc, alpha)
    }

    fn strengths(entries: &[(&str, f64)]) -> Strengths {
        let mut s = Strengths::new();
        for &(k, assoc) in entries {
            s.insert(k, ind(assoc, 0.1));
        }
        s
    }

    #[test]
    fn construction_caps_assoc() {
        assert_eq!(ind(1.7, 0.2).assoc, 1.0);
        assert_eq!(ind(-3.0, 0.2).assoc, -3.0);
        let fresh = Individual::new(0.3);
        assert_eq!(fresh.alpha_mack, 0.3);
        assert_eq!(fresh.alpha_hall, 0.3);
        assert!(fresh.delta_ma_hall.is_none());
    }

    #[test]
    fn window_evicts_oldest() {
        let mut w = Window::new();
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v, 3);
        }
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert!((w.mean().unwrap() - 3.0).abs() < EPS);

        w.push(5.0, 0);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn addition_requires_equal_windows() {
        let mut a = ind(0.1, 0.1);
        let b = ind(0.2, 0.1);
        a.window.push(0.1, 3);
        let err = a.try_add(&b).unwrap_err();
        assert!(matches!(err, SimError::Shape(_)));
    }

    #[test]
    fn addition_is_fieldwise_and_capped() {
        let mut a = ind(0.7, 0.1);
        a.ve = 0.4;
        a.delta_ma_hall = Some(0.05);
        let mut b = ind(0.6, 0.2);
        b.vi = 0.3;

        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.assoc, 1.0);
        assert!((sum.alpha - 0.3).abs() < EPS);
        assert!((sum.ve - 0.4).abs() < EPS);
        assert!((sum.vi - 0.3).abs() < EPS);
        assert_eq!(sum.delta_ma_hall, Some(0.05));
    }

    #[test]
    fn compound_key_sums_letters() {
        let s = strengths(&[("A", 0.2), ("B", 0.3), ("C", 0.9)]);
        let ab = s.get("AB").unwrap();
        assert!((ab.assoc - 0.5).abs() < EPS);
        assert!((ab.alpha - 0.2).abs() < EPS);

        assert_eq!(s.get("BC").unwrap().assoc, 1.0);
        assert!(s.get("AA").is_err());
        assert!(s.get("AZ").is_err());
    }

    #[test]
    fn combine_ignores_letter_order() {
        let s = strengths(&[("A", 0.1), ("B", 0.25), ("C", 0.3)]);
        let abc = s.get("ABC").unwrap();
        let cab = s.get("CAB").unwrap();
        let bca = s.get("BCA").unwrap();
        assert!((abc.assoc - cab.assoc).abs() < EPS);
        assert!((abc.assoc - bca.assoc).abs() < EPS);
        assert!((abc.alpha - bca.alpha).abs() < EPS);
    }

    #[test]
    fn compound_of_separately_trained_letters() {
        let mut s = strengths(&[("A", 0.6), ("B", 0.0)]);
        for v in [0.2, 0.4, 0.6] {
            s.individual_mut("A").unwrap().window.push(v, 3);
        }
        s.individual_mut("A").unwrap().delta_ma_hall = Some(0.1);

        let ab = s.combined("AB").unwrap();
        assert!((ab.assoc - 0.6).abs() < EPS);
        assert!(ab.window.is_empty());
        assert_eq!(ab.delta_ma_hall, Some(0.1));

        s.individual_mut("B").unwrap().window.push(0.1, 3);
        let ab = s.get("BA").unwrap();
        let window: Vec<f64> = ab.window.iter().collect();
        assert_eq!(window.len(), 1);
        assert!((window[0] - 0.7).abs() < EPS);

        // Snapshots of one stimulus still have to line up.
        let a = s.individual("A").unwrap();
        let b = s.individual("B").unwrap();
        assert!(matches!(a.try_add(b), Err(SimError::Shape(_))));
    }

    #[test]
    fn combined_cs_enumerates_subsets_and_configurals() {
        let mut s = strengths(&[("A", 0.1), ("B", 0.2), ("C", 0.3)]);
        s.insert("AB", ind(0.05, 0.01));

        let keys = s.combined_cs();
        for k in ["A", "B", "C", "AB", "AC", "BC", "ABC", "c(AB)"] {
            assert!(keys.contains(k), "missing {k}");
        }
        assert_eq!(keys.len(), 8);

        let ordered = s.ordered_cs();
        assert_eq!(&ordered[..3], &["A", "B", "C"]);
    }

    #[test]
    fn configural_state_is_added_on_top() {
        let mut s = strengths(&[("A", 0.1), ("B", 0.2)]);
        s.insert("AB", ind(0.05, 0.01));

        assert!((s.combined("AB").unwrap().assoc - 0.35).abs() < EPS);
        assert!((s.combined("c(AB)").unwrap().assoc - 0.05).abs() < EPS);
        assert!((s.combined("A").unwrap().assoc - 0.1).abs() < EPS);
        assert!(s.combined("c(BC)").is_err());
    }

    #[test]
    fn avg_of_singleton_is_identity() {
        let mut s = strengths(&[("A", 0.42), ("B", -0.1)]);
        s.individual_mut("A").unwrap().window.push(0.4, 3);
        s.individual_mut("B").unwrap().window.push(-0.1, 3);

        let avg = Strengths::avg(std::slice::from_ref(&s)).unwrap();
        for k in ["A", "B"] {
            let (x, y) = (s.individual(k).unwrap(), avg.individual(k).unwrap());
            assert!((x.assoc - y.assoc).abs() < EPS);
            assert!((x.alpha - y.alpha).abs() < EPS);
            assert_eq!(x.window, y.window);
        }
    }

    #[test]
    fn avg_divides_before_summing() {
        let a = strengths(&[("A", 1.0)]);
        let b = strengths(&[("A", 0.5)]);
        let avg = Strengths::avg(&[a, b]).unwrap();
        assert!((avg.individual("A").unwrap().assoc - 0.75).abs() < EPS);
    }

    #[test]
    fn avg_caps_means_above_one() {
        let mut a = strengths(&[("A", 0.0)]);
        a.individual_mut("A").unwrap().assoc = 1.4;
        let avg = Strengths::avg(&[a.clone(), a]).unwrap();
        assert_eq!(avg.individual("A").unwrap().assoc, 1.0);
    }

    #[test]
    fn avg_rejects_mismatched_shapes() {
        assert!(Strengths::avg(&[]).is_err());

        let a = strengths(&[("A", 0.1)]);
        let b = strengths(&[("B", 0.1)]);
        assert!(matches!(
            Strengths::avg(&[a.clone(), b]),
            Err(SimError::Shape(_))
        ));

        let mut c = a.clone();
        c.individual_mut("A").unwrap().window.push(0.1, 3);
        assert!(Strengths::avg(&[a, c]).is_err());
    }

    #[test]
    fn from_histories_transposes() {
        let mut histories = BTreeMap::new();
        let mut ha = History::new();
        ha.add(&ind(0.0, 0.1));
        ha.add(&ind(0.1, 0.1));
        ha.add(&ind(0.2, 0.1));
        let mut hb = History::new();
        hb.add(&ind(0.0, 0.2));
        histories.insert("A".to_string(), ha);
        histories.insert("B".to_string(), hb);

        let steps = Strengths::from_histories(&histories);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].len(), 2);
        assert_eq!(steps[1].keys().collect::<Vec<_>>(), vec!["A"]);
        assert!((steps[2].individual("A").unwrap().assoc - 0.2).abs() < EPS);
    }

    #[test]
    fn history_exposes_parallel_fields() {
        let mut h = History::new();
        let mut x = ind(0.1, 0.3);
        x.ve = 0.2;
        h.add(&x);
        x.assoc = 0.4;
        h.add(&x);

        assert_eq!(h.assoc(), vec![0.1, 0.4]);
        assert_eq!(h.alpha(), vec![0.3, 0.3]);
        assert_eq!(h.series().ve, vec![0.2, 0.2]);
        assert_eq!(h.last().unwrap().assoc, 0.4);
    }

    #[test]
    fn sigma_sums_tracked_entries() {
        let s = strengths(&[("A", 0.1), ("B", 0.2)]);
        assert!((s.sigma() - 0.3).abs() < EPS);
    }
}

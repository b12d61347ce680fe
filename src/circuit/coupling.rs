//! Mutual inductance between pairs of inductors.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::{Result, TransimError};

/// A magnetic coupling between two inductors, identified by element index.
///
/// `M = k·sqrt(La·Lb)`. Two couplings are the same if they join the same
/// unordered pair.
#[derive(Debug, Clone, Copy)]
pub struct Coupling {
    first: usize,
    second: usize,
    k: f64,
    l_first: f64,
    l_second: f64,
    mutual: f64,
}

impl Coupling {
    fn new(first: usize, second: usize, k: f64, l_first: f64, l_second: f64) -> Self {
        Self {
            first,
            second,
            k,
            l_first,
            l_second,
            mutual: k * (l_first * l_second).sqrt(),
        }
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn second(&self) -> usize {
        self.second
    }

    /// Coupling coefficient `k`.
    pub fn coefficient(&self) -> f64 {
        self.k
    }

    pub fn inductances(&self) -> (f64, f64) {
        (self.l_first, self.l_second)
    }

    /// Mutual inductance `M`.
    pub fn mutual_inductance(&self) -> f64 {
        self.mutual
    }

    pub fn involves(&self, inductor: usize) -> bool {
        self.first == inductor || self.second == inductor
    }

    /// The other inductor, if `inductor` is part of this coupling.
    pub fn partner(&self, inductor: usize) -> Option<usize> {
        if self.first == inductor {
            Some(self.second)
        } else if self.second == inductor {
            Some(self.first)
        } else {
            None
        }
    }

    fn joins(&self, a: usize, b: usize) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }
}

impl PartialEq for Coupling {
    fn eq(&self, other: &Self) -> bool {
        self.joins(other.first, other.second)
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Coupling[L{}-L{}, k={:.4}, M={:.6e}]",
            self.first, self.second, self.k, self.mutual
        )
    }
}

/// One cross term of a coupled inductor's branch equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingTerm {
    /// Matrix row of the partner inductor's branch current
    pub partner_branch: usize,
    /// Element index of the partner inductor
    pub partner: usize,
    /// Mutual inductance `M`
    pub mutual_inductance: f64,
}

/// All couplings of one netlist.
#[derive(Debug, Clone, Default)]
pub struct MutualCouplingRegistry {
    couplings: Vec<Coupling>,
    by_inductor: BTreeMap<usize, Vec<Coupling>>,
}

impl MutualCouplingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Couple inductors `first` and `second` with coefficient `k`.
    pub fn register_coupling(
        &mut self,
        first: usize,
        second: usize,
        k: f64,
        l_first: f64,
        l_second: f64,
    ) -> Result<Coupling> {
        if first == second {
            return Err(TransimError::invalid_coupling(format!(
                "cannot couple inductor {} with itself",
                first
            )));
        }
        if !k.is_finite() {
            return Err(TransimError::invalid_coupling(format!(
                "coupling coefficient must be finite, got {}",
                k
            )));
        }
        if !(l_first > 0.0) || !(l_second > 0.0) {
            return Err(TransimError::invalid_coupling(format!(
                "inductances must be positive, got {} and {}",
                l_first, l_second
            )));
        }
        if self.are_coupled(first, second) {
            return Err(TransimError::DuplicateCoupling { first, second });
        }

        let coupling = Coupling::new(first, second, k, l_first, l_second);
        self.couplings.push(coupling);
        self.by_inductor.entry(first).or_default().push(coupling);
        self.by_inductor.entry(second).or_default().push(coupling);
        Ok(coupling)
    }

    /// Remove the coupling between `first` and `second`, in either order.
    pub fn remove_coupling(&mut self, first: usize, second: usize) -> bool {
        let Some(pos) = self.couplings.iter().position(|c| c.joins(first, second)) else {
            return false;
        };
        let removed = self.couplings.remove(pos);
        for inductor in [removed.first, removed.second] {
            if let Some(list) = self.by_inductor.get_mut(&inductor) {
                list.retain(|c| c != &removed);
                if list.is_empty() {
                    self.by_inductor.remove(&inductor);
                }
            }
        }
        true
    }

    fn find(&self, first: usize, second: usize) -> Option<&Coupling> {
        self.by_inductor
            .get(&first)?
            .iter()
            .find(|c| c.involves(second))
    }

    /// `M` between two inductors, zero if they are not coupled.
    pub fn mutual_inductance(&self, first: usize, second: usize) -> f64 {
        self.find(first, second).map_or(0.0, |c| c.mutual)
    }

    /// `k` between two inductors, zero if they are not coupled.
    pub fn coupling_coefficient(&self, first: usize, second: usize) -> f64 {
        self.find(first, second).map_or(0.0, |c| c.k)
    }

    pub fn are_coupled(&self, first: usize, second: usize) -> bool {
        self.find(first, second).is_some()
    }

    /// Whether `inductor` takes part in at least one coupling.
    pub fn is_coupled(&self, inductor: usize) -> bool {
        self.by_inductor.contains_key(&inductor)
    }

    pub fn couplings_for(&self, inductor: usize) -> &[Coupling] {
        self.by_inductor
            .get(&inductor)
            .map_or(&[], |list| list.as_slice())
    }

    pub fn partners(&self, inductor: usize) -> Vec<usize> {
        self.couplings_for(inductor)
            .iter()
            .filter_map(|c| c.partner(inductor))
            .collect()
    }

    /// Every coupled inductor, ascending.
    pub fn coupled_inductors(&self) -> BTreeSet<usize> {
        self.by_inductor.keys().copied().collect()
    }

    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    pub fn len(&self) -> usize {
        self.couplings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.couplings.is_empty()
    }

    pub fn clear(&mut self) {
        self.couplings.clear();
        self.by_inductor.clear();
    }

    /// Cross terms for every coupled inductor, given each inductor's branch
    /// row.
    pub fn build_coupling_arrays(
        &self,
        branch_of: &HashMap<usize, usize>,
    ) -> Result<BTreeMap<usize, Vec<CouplingTerm>>> {
        let mut terms = BTreeMap::new();
        for (&inductor, list) in &self.by_inductor {
            let mut row = Vec::with_capacity(list.len());
            for c in list {
                let partner = c.partner(inductor).ok_or_else(|| {
                    TransimError::invalid_coupling(format!(
                        "coupling {} listed under unrelated inductor {}",
                        c, inductor
                    ))
                })?;
                let partner_branch = *branch_of.get(&partner).ok_or_else(|| {
                    TransimError::invalid_coupling(format!(
                        "coupled inductor {} has no branch row",
                        partner
                    ))
                })?;
                row.push(CouplingTerm {
                    partner_branch,
                    partner,
                    mutual_inductance: c.mutual,
                });
            }
            if !branch_of.contains_key(&inductor) {
                return Err(TransimError::invalid_coupling(format!(
                    "coupled inductor {} has no branch row",
                    inductor
                )));
            }
            terms.insert(inductor, row);
        }
        Ok(terms)
    }
}

impl fmt::Display for MutualCouplingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MutualCouplingRegistry[count={}]", self.len())?;
        for c in &self.couplings {
            writeln!(f, "  {}", c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mutual_inductance() {
        let mut reg = MutualCouplingRegistry::new();
        let c = reg.register_coupling(0, 1, 0.5, 1e-3, 4e-3).unwrap();
        assert_relative_eq!(c.mutual_inductance(), 1e-3);
        assert_relative_eq!(reg.mutual_inductance(1, 0), 1e-3);
        assert_relative_eq!(reg.coupling_coefficient(0, 1), 0.5);
        assert_eq!(reg.mutual_inductance(0, 7), 0.0);
    }

    #[test]
    fn test_rejects_bad_couplings() {
        let mut reg = MutualCouplingRegistry::new();
        assert!(matches!(
            reg.register_coupling(2, 2, 0.5, 1e-3, 1e-3),
            Err(TransimError::InvalidCoupling { .. })
        ));
        assert!(reg.register_coupling(0, 1, f64::NAN, 1e-3, 1e-3).is_err());
        assert!(reg.register_coupling(0, 1, 0.5, 0.0, 1e-3).is_err());
        assert!(reg.register_coupling(0, 1, 0.5, 1e-3, -1.0).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_duplicate_is_unordered() {
        let mut reg = MutualCouplingRegistry::new();
        reg.register_coupling(0, 1, 0.5, 1e-3, 1e-3).unwrap();
        assert!(matches!(
            reg.register_coupling(1, 0, 0.9, 1e-3, 1e-3),
            Err(TransimError::DuplicateCoupling { first: 1, second: 0 })
        ));
    }

    #[test]
    fn test_membership_survives_partial_removal() {
        let mut reg = MutualCouplingRegistry::new();
        reg.register_coupling(0, 1, 0.5, 1e-3, 1e-3).unwrap();
        reg.register_coupling(0, 2, 0.5, 1e-3, 1e-3).unwrap();
        assert_eq!(reg.partners(0), vec![1, 2]);

        assert!(reg.remove_coupling(1, 0));
        assert!(reg.is_coupled(0));
        assert!(!reg.is_coupled(1));
        assert!(!reg.remove_coupling(0, 1));

        assert!(reg.remove_coupling(0, 2));
        assert!(!reg.is_coupled(0));
        assert!(reg.coupled_inductors().is_empty());
    }

    #[test]
    fn test_register_then_remove_restores_state() {
        let mut reg = MutualCouplingRegistry::new();
        reg.register_coupling(3, 4, 0.2, 1e-3, 1e-3).unwrap();
        reg.remove_coupling(3, 4);
        assert!(reg.is_empty());
        assert!(reg.couplings_for(3).is_empty());
        assert!(!reg.are_coupled(3, 4));
    }

    #[test]
    fn test_build_coupling_arrays() {
        let mut reg = MutualCouplingRegistry::new();
        reg.register_coupling(0, 1, 1.0, 1e-3, 1e-3).unwrap();
        let branches = HashMap::from([(0, 4), (1, 5)]);
        let terms = reg.build_coupling_arrays(&branches).unwrap();
        assert_eq!(terms[&0][0].partner_branch, 5);
        assert_eq!(terms[&1][0].partner_branch, 4);
        assert_relative_eq!(terms[&0][0].mutual_inductance, 1e-3);

        let missing = HashMap::from([(0, 4)]);
        assert!(matches!(
            reg.build_coupling_arrays(&missing),
            Err(TransimError::InvalidCoupling { .. })
        ));
    }
}

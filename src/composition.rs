use crate::errors::{DataError, EquilError, EquilResult};
use crate::species::SpeciesDatabase;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul};

/// Molar amounts indexed by species or element symbol.
///
/// Keys that are not contained in the map represent an amount of zero.
/// Explicit zero entries are kept, so a composition can carry species that
/// may form in a reaction but are not present initially.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition(IndexMap<String, f64>);

impl Composition {
    /// An empty composition.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// The amount of the given key in mol, or zero if it is absent.
    pub fn amount(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    /// Sets the amount of the given key in mol.
    pub fn set(&mut self, key: &str, amount: f64) {
        self.0.insert(key.to_owned(), amount);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over keys and amounts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// The total amount in mol.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// The composition rescaled to a total amount of one.
    pub fn normalized(&self) -> EquilResult<Self> {
        let total = self.total();
        if total == 0.0 {
            return Err(EquilError::ZeroTotalComposition);
        }
        Ok(self * (1.0 / total))
    }

    /// Decomposes every species into its elements and returns the total
    /// elemental amounts.
    pub fn elemental_composition(&self, db: &SpeciesDatabase) -> EquilResult<Composition> {
        let mut elements = Composition::new();
        for (species, amount) in self.iter() {
            for (element, count) in db.elemental_composition(species)?.iter() {
                *elements.0.entry(element.to_owned()).or_insert(0.0) += amount * count;
            }
        }
        Ok(elements)
    }

    /// The total mass in g.
    pub fn total_mass(&self, db: &SpeciesDatabase) -> EquilResult<f64> {
        let mut mass = 0.0;
        for (element, amount) in self.elemental_composition(db)?.iter() {
            let atomic_weight = db
                .atomic_weight(element)
                .ok_or_else(|| DataError::UnknownElement(element.to_owned()))?;
            mass += amount * atomic_weight;
        }
        Ok(mass)
    }

    /// The mean molar weight in g/mol.
    pub fn average_molar_mass(&self, db: &SpeciesDatabase) -> EquilResult<f64> {
        let total = self.total();
        if total == 0.0 {
            return Err(EquilError::ZeroTotalComposition);
        }
        Ok(self.total_mass(db)? / total)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Composition {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Add<&Composition> for &Composition {
    type Output = Composition;
    fn add(self, rhs: &Composition) -> Composition {
        let mut sum = self.clone();
        for (k, v) in rhs.iter() {
            *sum.0.entry(k.to_owned()).or_insert(0.0) += v;
        }
        sum
    }
}

impl Mul<f64> for &Composition {
    type Output = Composition;
    fn mul(self, factor: f64) -> Composition {
        Composition(self.0.iter().map(|(k, v)| (k.clone(), v * factor)).collect())
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.iter().map(|(k, v)| format!("{}: {}", k, v)).join(", ")
        )
    }
}

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three tracked fertilizer nutrients
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nutrient {
    #[serde(rename = "N")]
    N,
    #[serde(rename = "P2O5", alias = "P205")]
    P2O5,
    #[serde(rename = "K2O")]
    K2O,
}

impl Nutrient {
    /// Catalog order, also the order of rows in every blend model
    pub const ALL: [Nutrient; 3] = [Nutrient::N, Nutrient::P2O5, Nutrient::K2O];

    pub fn symbol(self) -> &'static str {
        match self {
            Nutrient::N => "N",
            Nutrient::P2O5 => "P2O5",
            Nutrient::K2O => "K2O",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Nutrient::N => "Nitrogen",
            Nutrient::P2O5 => "Phosphorus pentoxide",
            Nutrient::K2O => "Potassium oxide",
        }
    }

    /// Mass unit in which targets and achieved amounts are expressed
    pub fn unit(self) -> &'static str {
        "kg"
    }

    fn index(self) -> usize {
        match self {
            Nutrient::N => 0,
            Nutrient::P2O5 => 1,
            Nutrient::K2O => 2,
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown nutrient: {0}")]
pub struct UnknownNutrient(pub String);

impl FromStr for Nutrient {
    type Err = UnknownNutrient;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "P205" (zero instead of O) shows up in hand-typed spreadsheets
        match s.trim().to_ascii_uppercase().as_str() {
            "N" => Ok(Nutrient::N),
            "P2O5" | "P205" => Ok(Nutrient::P2O5),
            "K2O" | "K20" => Ok(Nutrient::K2O),
            _ => Err(UnknownNutrient(s.to_string())),
        }
    }
}

/// A value for each nutrient, iterated in catalog order
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct NutrientVector<T> {
    #[serde(rename = "N")]
    pub n: T,
    #[serde(rename = "P2O5", alias = "P205")]
    pub p2o5: T,
    #[serde(rename = "K2O")]
    pub k2o: T,
}

impl<T> NutrientVector<T> {
    pub fn new(n: T, p2o5: T, k2o: T) -> Self {
        Self { n, p2o5, k2o }
    }

    pub fn from_fn(mut f: impl FnMut(Nutrient) -> T) -> Self {
        Self {
            n: f(Nutrient::N),
            p2o5: f(Nutrient::P2O5),
            k2o: f(Nutrient::K2O),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, &T)> {
        Nutrient::ALL.into_iter().map(move |n| (n, &self[n]))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Nutrient, &T) -> U) -> NutrientVector<U> {
        NutrientVector::from_fn(|n| f(n, &self[n]))
    }
}

impl<T> Index<Nutrient> for NutrientVector<T> {
    type Output = T;

    fn index(&self, nutrient: Nutrient) -> &T {
        match nutrient.index() {
            0 => &self.n,
            1 => &self.p2o5,
            _ => &self.k2o,
        }
    }
}

impl<T> IndexMut<Nutrient> for NutrientVector<T> {
    fn index_mut(&mut self, nutrient: Nutrient) -> &mut T {
        match nutrient.index() {
            0 => &mut self.n,
            1 => &mut self.p2o5,
            _ => &mut self.k2o,
        }
    }
}

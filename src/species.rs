//! Light-absorbing impurity species carried by snow layers.

use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::SnicarError;

/// One of the fixed impurity species.
///
/// The discriminant is the slot of the species in a [`SpeciesTable`]. Dust
/// and ash bins share the same size ranges: 0.05-0.5, 0.5-1.25, 1.25-2.5,
/// 2.5-5 and 5-50 µm diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    /// Uncoated black carbon
    BlackCarbon = 0,
    /// Sulfate-coated black carbon
    CoatedBlackCarbon,
    /// Uncoated brown carbon
    BrownCarbon,
    /// Sulfate-coated brown carbon
    CoatedBrownCarbon,
    /// Mineral dust, size bin 1
    Dust1,
    /// Mineral dust, size bin 2
    Dust2,
    /// Mineral dust, size bin 3
    Dust3,
    /// Mineral dust, size bin 4
    Dust4,
    /// Mineral dust, size bin 5
    Dust5,
    /// Volcanic ash, size bin 1
    Ash1,
    /// Volcanic ash, size bin 2
    Ash2,
    /// Volcanic ash, size bin 3
    Ash3,
    /// Volcanic ash, size bin 4
    Ash4,
    /// Volcanic ash, size bin 5
    Ash5,
}

impl Species {
    /// Number of species, and the length of every [`SpeciesTable`].
    pub const COUNT: usize = 14;

    /// Every species, in table order.
    pub const ALL: [Species; Species::COUNT] = [
        Species::BlackCarbon,
        Species::CoatedBlackCarbon,
        Species::BrownCarbon,
        Species::CoatedBrownCarbon,
        Species::Dust1,
        Species::Dust2,
        Species::Dust3,
        Species::Dust4,
        Species::Dust5,
        Species::Ash1,
        Species::Ash2,
        Species::Ash3,
        Species::Ash4,
        Species::Ash5,
    ];

    /// Slot in a [`SpeciesTable`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// File stem of the optical property table for this species.
    pub fn file_stem(self) -> &'static str {
        match self {
            Species::BlackCarbon => "bc_uncoated",
            Species::CoatedBlackCarbon => "bc_coated",
            Species::BrownCarbon => "brc_uncoated",
            Species::CoatedBrownCarbon => "brc_coated",
            Species::Dust1 => "dust_1",
            Species::Dust2 => "dust_2",
            Species::Dust3 => "dust_3",
            Species::Dust4 => "dust_4",
            Species::Dust5 => "dust_5",
            Species::Ash1 => "ash_1",
            Species::Ash2 => "ash_2",
            Species::Ash3 => "ash_3",
            Species::Ash4 => "ash_4",
            Species::Ash5 => "ash_5",
        }
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for Species {
    type Err = SnicarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Species::ALL
            .into_iter()
            .find(|species| species.file_stem() == s)
            .ok_or_else(|| SnicarError::InvalidConfig(format!("unknown impurity species {s:?}")))
    }
}

/// A value for every [`Species`], indexed by species rather than by position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesTable<T>([T; Species::COUNT]);

impl<T> SpeciesTable<T> {
    /// Build a table by evaluating `f` for every species.
    pub fn from_fn(mut f: impl FnMut(Species) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Species::ALL[i])))
    }

    /// Iterate over `(species, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Species, &T)> + '_ {
        Species::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Copy + Default> Default for SpeciesTable<T> {
    fn default() -> Self {
        Self([T::default(); Species::COUNT])
    }
}

impl<T> From<[T; Species::COUNT]> for SpeciesTable<T> {
    fn from(values: [T; Species::COUNT]) -> Self {
        Self(values)
    }
}

impl<T> Index<Species> for SpeciesTable<T> {
    type Output = T;

    fn index(&self, species: Species) -> &T {
        &self.0[species.index()]
    }
}

impl<T> IndexMut<Species> for SpeciesTable<T> {
    fn index_mut(&mut self, species: Species) -> &mut T {
        &mut self.0[species.index()]
    }
}

//! Per-wavelength optical properties and where they come from.
//!
//! The solver never reads files itself. Everything it needs is gathered into
//! an [`OpticalLibrary`] up front, which is read-only afterwards and can be
//! shared by any number of concurrent solves.

pub(crate) mod table;

use std::collections::HashMap;

use log::debug;

use crate::column::SnowColumn;
use crate::error::SnicarError;
use crate::species::{Species, SpeciesTable};

pub use table::TableDirectory;

/// Wavelengths (band centres, µm) shared by every per-wavelength array of a
/// run.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthGrid {
    wavelengths: Vec<f64>,
}

impl WavelengthGrid {
    /// Wrap a strictly increasing, non-empty set of wavelengths in µm.
    pub fn new(wavelengths: Vec<f64>) -> Result<Self, SnicarError> {
        if wavelengths.is_empty() {
            return Err(SnicarError::InconsistentInputs(
                "the wavelength grid is empty".into(),
            ));
        }
        if wavelengths.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(SnicarError::InconsistentInputs(
                "the wavelength grid must be strictly increasing".into(),
            ));
        }
        Ok(Self { wavelengths })
    }

    /// The standard 480 bands of 0.01 µm from 0.2 to 5.0 µm.
    pub fn snicar_default() -> Self {
        Self {
            wavelengths: (0..480).map(|i| 0.205 + 0.01 * i as f64).collect(),
        }
    }

    /// Number of bands.
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    /// Always false, since an empty grid can't be built.
    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// Band centres in µm.
    pub fn as_slice(&self) -> &[f64] {
        &self.wavelengths
    }
}

/// Optical properties of one constituent, each indexed by wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralOptics {
    /// Single-scattering albedo.
    pub ssa: Vec<f64>,
    /// Mass-extinction coefficient in m²/kg.
    pub mac: Vec<f64>,
    /// Asymmetry parameter.
    pub asymmetry: Vec<f64>,
}

impl SpectralOptics {
    /// Check that the three arrays have the same length and sensible values.
    ///
    /// The asymmetry parameter must lie strictly between -1 and 1; at the
    /// ends the Delta transform is undefined.
    pub fn new(ssa: Vec<f64>, mac: Vec<f64>, asymmetry: Vec<f64>) -> Result<Self, SnicarError> {
        if ssa.len() != mac.len() || ssa.len() != asymmetry.len() {
            return Err(SnicarError::InconsistentInputs(
                "ssa, mac, and asymmetry must have the same length".into(),
            ));
        }
        if ssa.iter().any(|w| !(0.0..=1.0).contains(w))
            || mac.iter().any(|k| k.is_nan() || *k < 0.0)
            || asymmetry.iter().any(|g| g.is_nan() || g.abs() >= 1.0)
        {
            return Err(SnicarError::InconsistentInputs(
                "optical properties out of their physical range".into(),
            ));
        }
        Ok(Self {
            ssa,
            mac,
            asymmetry,
        })
    }

    /// Number of wavelengths.
    pub fn len(&self) -> usize {
        self.ssa.len()
    }

    /// True if there are no wavelengths.
    pub fn is_empty(&self) -> bool {
        self.ssa.is_empty()
    }
}

/// Identifies one optical property table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Spherical ice grains of the given effective radius (µm)
    Ice {
        /// Effective radius in whole µm
        radius_um: u32,
    },
    /// An impurity species
    Impurity(Species),
    /// Algae cells of the given radius (µm)
    Algae {
        /// Cell radius in whole µm
        radius_um: u32,
    },
}

impl PropertyKey {
    /// Key for ice grains, rounding the radius to the nearest µm.
    pub fn ice(radius_um: f64) -> Self {
        PropertyKey::Ice {
            radius_um: radius_um.round() as u32,
        }
    }

    /// Key for algae cells, rounding the radius to the nearest µm.
    pub fn algae(radius_um: f64) -> Self {
        PropertyKey::Algae {
            radius_um: radius_um.round() as u32,
        }
    }

    /// File stem used by [`TableDirectory`].
    pub fn file_stem(&self) -> String {
        match self {
            PropertyKey::Ice { radius_um } => format!("ice_r{radius_um:04}"),
            PropertyKey::Impurity(species) => species.file_stem().to_string(),
            PropertyKey::Algae { radius_um } => format!("algae_r{radius_um:04}"),
        }
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// A store that can produce optical properties for a key on a given grid.
///
/// Implementations fail with [`SnicarError::MissingOpticalProperty`] when
/// they have nothing for the key.
pub trait OpticalPropertyProvider: Send + Sync {
    /// Load the properties for `key`, aligned to `grid`.
    fn optical_properties(
        &self,
        key: &PropertyKey,
        grid: &WavelengthGrid,
    ) -> Result<SpectralOptics, SnicarError>;
}

/// Every optical property table a set of runs needs, loaded once.
#[derive(Debug, Clone)]
pub struct OpticalLibrary {
    grid: WavelengthGrid,
    tables: HashMap<PropertyKey, SpectralOptics>,
}

impl OpticalLibrary {
    /// An empty library for `grid`.
    pub fn new(grid: WavelengthGrid) -> Self {
        Self {
            grid,
            tables: HashMap::new(),
        }
    }

    /// Load from `provider` every table that `columns` refer to.
    ///
    /// Ice is loaded for each distinct (rounded) grain radius, a species only
    /// if some layer carries a non-zero amount of it, and algae only if some
    /// layer carries cells.
    pub fn load<'a>(
        provider: &dyn OpticalPropertyProvider,
        grid: &WavelengthGrid,
        columns: impl IntoIterator<Item = &'a SnowColumn>,
        algae_radius_um: f64,
    ) -> Result<Self, SnicarError> {
        let mut library = Self::new(grid.clone());
        for column in columns {
            for key in required_keys(column, algae_radius_um) {
                if !library.tables.contains_key(&key) {
                    let optics = provider.optical_properties(&key, grid)?;
                    library.insert(key, optics)?;
                }
            }
        }
        debug!("loaded {} optical property tables", library.tables.len());
        Ok(library)
    }

    /// Add (or replace) one table. Its length must match the grid.
    pub fn insert(&mut self, key: PropertyKey, optics: SpectralOptics) -> Result<(), SnicarError> {
        if optics.len() != self.grid.len() {
            return Err(SnicarError::InconsistentInputs(format!(
                "{key} has {} wavelengths but the grid has {}",
                optics.len(),
                self.grid.len()
            )));
        }
        self.tables.insert(key, optics);
        Ok(())
    }

    /// The table for `key`.
    pub fn get(&self, key: &PropertyKey) -> Result<&SpectralOptics, SnicarError> {
        self.tables
            .get(key)
            .ok_or_else(|| SnicarError::MissingOpticalProperty(key.to_string()))
    }

    /// The wavelength grid every table is aligned to.
    pub fn grid(&self) -> &WavelengthGrid {
        &self.grid
    }

    /// Pick out the tables used by one column.
    pub fn resolve(
        &self,
        column: &SnowColumn,
        algae_radius_um: f64,
    ) -> Result<ColumnOptics<'_>, SnicarError> {
        let ice = column
            .layers()
            .iter()
            .map(|layer| self.get(&PropertyKey::ice(layer.grain_radius)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut impurities = SpeciesTable::from_fn(|_| None);
        for species in Species::ALL {
            if column.layers().iter().any(|layer| layer.impurities[species] > 0.0) {
                impurities[species] = Some(self.get(&PropertyKey::Impurity(species))?);
            }
        }

        let algae = if column.layers().iter().any(|layer| layer.algae > 0.0) {
            Some(self.get(&PropertyKey::algae(algae_radius_um))?)
        } else {
            None
        };

        Ok(ColumnOptics {
            ice,
            impurities,
            algae,
        })
    }
}

/// The optical property tables used by one column, borrowed from an
/// [`OpticalLibrary`].
#[derive(Debug, Clone)]
pub struct ColumnOptics<'a> {
    /// Ice properties, one per layer.
    pub ice: Vec<&'a SpectralOptics>,
    /// Impurity properties, present for every species the column carries.
    pub impurities: SpeciesTable<Option<&'a SpectralOptics>>,
    /// Algae properties, present if the column carries algae.
    pub algae: Option<&'a SpectralOptics>,
}

fn required_keys(column: &SnowColumn, algae_radius_um: f64) -> Vec<PropertyKey> {
    let layers = column.layers();
    let mut keys: Vec<_> = layers
        .iter()
        .map(|layer| PropertyKey::ice(layer.grain_radius))
        .collect();
    keys.extend(
        Species::ALL
            .into_iter()
            .filter(|&species| layers.iter().any(|layer| layer.impurities[species] > 0.0))
            .map(PropertyKey::Impurity),
    );
    if layers.iter().any(|layer| layer.algae > 0.0) {
        keys.push(PropertyKey::algae(algae_radius_um));
    }
    keys
}

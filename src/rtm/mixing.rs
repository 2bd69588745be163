//! Bulk optical properties of each layer.
//!
//! Ice, impurities, and algae are treated as an external mixture: optical
//! depths add, and the single-scattering albedo and asymmetry parameter are
//! optical-depth weighted means over the constituents.

use ndarray::Array2;

use crate::column::{AlgaeCells, Layer, SnowColumn, PPB};
use crate::error::SnicarError;
use crate::optics::{ColumnOptics, PropertyKey, SpectralOptics};
use crate::species::SpeciesTable;

/// Optical depth, single-scattering albedo, and asymmetry parameter of one
/// layer at one wavelength.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerOptics {
    /// Optical depth
    pub tau: f64,
    /// Single-scattering albedo
    pub ssa: f64,
    /// Asymmetry parameter
    pub asymmetry: f64,
}

impl LayerOptics {
    /// Apply the Delta-Eddington transform.
    ///
    /// The forward-scattering peak is folded into unscattered transmission,
    /// leaving a reduced optical depth, albedo, and asymmetry parameter
    /// (Joseph, Wiscombe & Weinman, 1976). The asymmetry must lie strictly
    /// between -1 and 1, as it does for anything built from
    /// [`SpectralOptics`].
    pub fn delta_scaled(self) -> Self {
        let g2 = self.asymmetry.powi(2);
        let scale = 1.0 - self.ssa * g2;
        Self {
            tau: scale * self.tau,
            ssa: (1.0 - g2) * self.ssa / scale,
            asymmetry: self.asymmetry / (1.0 + self.asymmetry),
        }
    }
}

/// Mass per unit area (kg/m²) of each constituent of a layer.
#[derive(Debug, Clone)]
pub(crate) struct LayerBurdens {
    pub(crate) impurities: SpeciesTable<f64>,
    pub(crate) algae: f64,
    pub(crate) ice: f64,
}

impl LayerBurdens {
    /// Split the layer mass between impurities, algae, and ice.
    ///
    /// Fails if the impurities leave no ice in the layer.
    fn new(index: usize, layer: &Layer, algae: &AlgaeCells) -> Result<Self, SnicarError> {
        let mass = layer.mass();
        let impurities = SpeciesTable::from_fn(|species| mass * layer.impurities[species] * PPB);
        let algae = algae.burden(layer.algae, layer.thickness);

        let foreign: f64 = impurities.iter().map(|(_, &burden)| burden).sum::<f64>() + algae;
        let ice = mass - foreign;
        if ice <= 0.0 {
            return Err(SnicarError::InvalidImpurityLoad {
                layer: index,
                fraction: foreign / mass,
            });
        }

        Ok(Self {
            impurities,
            algae,
            ice,
        })
    }
}

/// Work out the constituent burdens of every layer in the column.
pub(crate) fn column_burdens(
    column: &SnowColumn,
    algae: &AlgaeCells,
) -> Result<Vec<LayerBurdens>, SnicarError> {
    column
        .layers()
        .iter()
        .enumerate()
        .map(|(index, layer)| LayerBurdens::new(index, layer, algae))
        .collect()
}

/// Running sums of τ, τω, and τωg over the constituents of one layer at one
/// wavelength, plus the largest asymmetry of any scattering constituent.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    tau: f64,
    tau_ssa: f64,
    tau_ssa_g: f64,
    max_asymmetry: Option<f64>,
}

impl Accumulator {
    fn add(&mut self, burden: f64, optics: &SpectralOptics, asymmetry: f64, index: usize) {
        let tau = burden * optics.mac[index];
        let scattering = tau * optics.ssa[index];
        self.tau += tau;
        self.tau_ssa += scattering;
        self.tau_ssa_g += scattering * asymmetry;
        if scattering > 0.0 {
            self.max_asymmetry = Some(self.max_asymmetry.map_or(asymmetry, |g| g.max(asymmetry)));
        }
    }

    fn finish(self) -> LayerOptics {
        if self.tau <= 0.0 {
            return LayerOptics::default();
        }
        // A weighted mean never exceeds its largest term, but rounding can
        // push it one ulp over
        let asymmetry = match self.max_asymmetry {
            Some(max) if self.tau_ssa > 0.0 => (self.tau_ssa_g / self.tau_ssa).min(max),
            _ => 0.0,
        };
        LayerOptics {
            tau: self.tau,
            ssa: self.tau_ssa / self.tau,
            asymmetry,
        }
    }
}

/// Mix every layer at every wavelength.
///
/// `ice_asymmetry` holds the (shape-corrected) ice asymmetry parameter of
/// each layer. The result is indexed by `(layer, wavelength)`.
pub(crate) fn mix_column(
    burdens: &[LayerBurdens],
    optics: &ColumnOptics<'_>,
    ice_asymmetry: &[Vec<f64>],
    num_wavelengths: usize,
) -> Result<Array2<LayerOptics>, SnicarError> {
    let mut mixed = Array2::<LayerOptics>::default((burdens.len(), num_wavelengths));

    for (n, (burden, mut row)) in burdens.iter().zip(mixed.rows_mut()).enumerate() {
        let impurities = burden
            .impurities
            .iter()
            .filter(|(_, load)| **load > 0.0)
            .map(|(species, &load)| {
                optics.impurities[species]
                    .map(|props| (load, props))
                    .ok_or_else(|| {
                        SnicarError::MissingOpticalProperty(
                            PropertyKey::Impurity(species).to_string(),
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let algae = if burden.algae > 0.0 {
            let props = optics.algae.ok_or_else(|| {
                SnicarError::MissingOpticalProperty("algae".to_string())
            })?;
            Some((burden.algae, props))
        } else {
            None
        };
        let ice = optics.ice[n];

        for (w, cell) in row.iter_mut().enumerate() {
            let mut sums = Accumulator::default();
            for &(load, props) in impurities.iter().chain(&algae) {
                sums.add(load, props, props.asymmetry[w], w);
            }
            sums.add(burden.ice, ice, ice_asymmetry[n][w], w);
            *cell = sums.finish();
        }
    }

    Ok(mixed)
}

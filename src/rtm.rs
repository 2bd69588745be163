//! Two-stream radiative transfer through a layered snow column

mod aggregate;
mod mixing;
mod pchip;
mod shape;
mod two_stream;


use log::debug;
use ndarray::Array2;
use rayon::prelude::*;

use self::two_stream::{Boundary, PerLayer, SpectralFluxes};
use crate::column::{AlgaeCells, SnowColumn};
use crate::error::SnicarError;
use crate::illumination::Illumination;
use crate::optics::{ColumnOptics, WavelengthGrid};

pub use self::aggregate::{heating_rate, SpectralBands, Summary};
pub use self::mixing::LayerOptics;
pub use self::two_stream::Closure;

/// Solver settings that are shared by every column of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmParameters {
    /// Two-stream closure
    pub closure: Closure,
    /// Whether to apply the Delta-Eddington transform
    pub delta: bool,
    /// Cosine of the solar zenith angle, μ₀
    pub cos_zenith: f64,
    /// Number of leading bands counted as visible
    pub visible_bands: usize,
    /// Energy residual, relative to the incident flux, above which a run is
    /// reported as unbalanced
    pub energy_tolerance: f64,
    /// Algae cell model
    pub algae: AlgaeCells,
}

impl Default for RtmParameters {
    fn default() -> Self {
        Self {
            closure: Closure::default(),
            delta: true,
            cos_zenith: 0.5,
            visible_bands: 50,
            energy_tolerance: 1e-10,
            algae: AlgaeCells::default(),
        }
    }
}

impl RtmParameters {
    /// Check the settings.
    pub fn validate(&self) -> Result<(), SnicarError> {
        if !(self.cos_zenith > 0.0 && self.cos_zenith <= 1.0) {
            return Err(SnicarError::InvalidConfig(format!(
                "cosine of the zenith angle {} is outside (0, 1]",
                self.cos_zenith
            )));
        }
        if self.visible_bands == 0 {
            return Err(SnicarError::InvalidConfig(
                "at least one band must be visible".into(),
            ));
        }
        if self.energy_tolerance.is_nan() || self.energy_tolerance < 0.0 {
            return Err(SnicarError::InvalidConfig(
                "energy tolerance can't be negative".into(),
            ));
        }
        if !(self.algae.radius_um > 0.0 && self.algae.density > 0.0) {
            return Err(SnicarError::InvalidConfig(
                "algae cells need a positive radius and density".into(),
            ));
        }
        Ok(())
    }
}

/// Inputs for the RTM for a single column. Unlike [`RtmParameters`], these
/// vary from column to column.
#[derive(Debug)]
pub struct RtmInputs<'a> {
    grid: &'a WavelengthGrid,
    column: &'a SnowColumn,
    optics: ColumnOptics<'a>,
    illumination: &'a Illumination,
    surface_albedo: &'a [f64],
}

/// Outputs from the RTM for a single column. Per-layer arrays are indexed by
/// `(layer, wavelength)` and hold values at the base of each layer.
#[derive(Debug, Clone)]
pub struct RtmOutputs {
    /// Spectral albedo
    pub albedo: Vec<f64>,
    /// Flux absorbed in each layer (W/m²)
    pub absorbed: Array2<f64>,
    /// Upward diffuse flux (W/m²)
    pub upward_flux: Array2<f64>,
    /// Downward flux, diffuse plus direct (W/m²)
    pub downward_flux: Array2<f64>,
    /// Net flux, upward minus downward (W/m²)
    pub net_flux: Array2<f64>,
    /// Mean intensity (W/m²/sr)
    pub mean_intensity: Array2<f64>,
    /// Flux absorbed by the underlying surface (W/m²)
    pub surface_absorbed: Vec<f64>,
    /// Optical state the two-stream solve saw (after the Delta transform if
    /// enabled)
    pub layer_optics: Array2<LayerOptics>,
    /// Ice mass of each layer (kg/m²)
    pub ice_mass: Vec<f64>,
    /// Column totals
    pub summary: Summary,
}

impl<'a> RtmInputs<'a> {
    /// Check that everything lines up with `grid`.
    ///
    /// `surface_albedo` has one value per band.
    pub fn new(
        grid: &'a WavelengthGrid,
        column: &'a SnowColumn,
        optics: ColumnOptics<'a>,
        illumination: &'a Illumination,
        surface_albedo: &'a [f64],
    ) -> Result<Self, SnicarError> {
        let num_wavelengths = grid.len();
        if optics.ice.len() != column.len() {
            return Err(SnicarError::InconsistentInputs(format!(
                "{} layers but ice optics for {}",
                column.len(),
                optics.ice.len()
            )));
        }
        let tables = optics
            .ice
            .iter()
            .copied()
            .chain(optics.impurities.iter().filter_map(|(_, table)| *table))
            .chain(optics.algae);
        for table in tables {
            if table.len() != num_wavelengths {
                return Err(SnicarError::InconsistentInputs(format!(
                    "optical properties have {} bands but the grid has {num_wavelengths}",
                    table.len()
                )));
            }
        }
        if illumination.len() != num_wavelengths {
            return Err(SnicarError::InconsistentInputs(format!(
                "illumination has {} bands but the grid has {num_wavelengths}",
                illumination.len()
            )));
        }
        if surface_albedo.len() != num_wavelengths {
            return Err(SnicarError::InconsistentInputs(format!(
                "surface albedo has {} bands but the grid has {num_wavelengths}",
                surface_albedo.len()
            )));
        }
        if surface_albedo.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err(SnicarError::InconsistentInputs(
                "surface albedo must lie in [0, 1]".into(),
            ));
        }

        Ok(Self {
            grid,
            column,
            optics,
            illumination,
            surface_albedo,
        })
    }

    /// Apply the RTM on the inputs for the given parameters.
    pub fn run(&self, parameters: &RtmParameters) -> Result<RtmOutputs, SnicarError> {
        parameters.validate()?;
        let num_layers = self.column.len();
        let num_wavelengths = self.grid.len();

        // Impurity loads are checked before any optics are touched
        let burdens = mixing::column_burdens(self.column, &parameters.algae)?;

        let ice_asymmetry = self
            .column
            .layers()
            .iter()
            .zip(&self.optics.ice)
            .map(|(layer, ice)| shape::ice_asymmetry(self.grid, layer, ice))
            .collect::<Result<Vec<_>, _>>()?;

        let mut layer_optics =
            mixing::mix_column(&burdens, &self.optics, &ice_asymmetry, num_wavelengths)?;
        if parameters.delta {
            layer_optics.mapv_inplace(LayerOptics::delta_scaled);
        }
        debug!("mixed optics for {num_layers} layers over {num_wavelengths} bands");

        // Every band is an independent boundary-value problem
        let fluxes: Vec<SpectralFluxes> = (0..num_wavelengths)
            .into_par_iter()
            .map(|w| {
                let layers: PerLayer<LayerOptics> = layer_optics.column(w).iter().copied().collect();
                let boundary = Boundary {
                    cos_zenith: parameters.cos_zenith,
                    direct: self.illumination.direct()[w],
                    diffuse: self.illumination.diffuse_flux()[w],
                    surface_albedo: self.surface_albedo[w],
                };
                two_stream::solve(&layers, parameters.closure, &boundary)
            })
            .collect();
        debug!("solved {num_wavelengths} two-stream systems");

        let ice_mass: Vec<f64> = burdens.iter().map(|b| b.ice).collect();
        let summary = Summary::new(
            &fluxes,
            &ice_mass,
            parameters.visible_bands,
            parameters.energy_tolerance,
        );

        Ok(RtmOutputs {
            albedo: fluxes.iter().map(|f| f.albedo).collect(),
            absorbed: per_layer(&fluxes, num_layers, |f| &f.absorbed),
            upward_flux: per_layer(&fluxes, num_layers, |f| &f.upward),
            downward_flux: per_layer(&fluxes, num_layers, |f| &f.downward),
            net_flux: per_layer(&fluxes, num_layers, |f| &f.net),
            mean_intensity: per_layer(&fluxes, num_layers, |f| &f.mean_intensity),
            surface_absorbed: fluxes.iter().map(|f| f.transmitted).collect(),
            layer_optics,
            ice_mass,
            summary,
        })
    }
}

/// Gather one per-layer quantity from every band into a `(layer, wavelength)`
/// array.
fn per_layer(
    fluxes: &[SpectralFluxes],
    num_layers: usize,
    value: impl Fn(&SpectralFluxes) -> &PerLayer<f64>,
) -> Array2<f64> {
    Array2::from_shape_fn((num_layers, fluxes.len()), |(n, w)| value(&fluxes[w])[n])
}

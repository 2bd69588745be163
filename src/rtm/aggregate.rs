//! Broadband, visible, and near-infrared totals.

use log::warn;

use super::two_stream::SpectralFluxes;

/// Specific heat capacity of ice in J/(kg K)
pub(crate) const ICE_SPECIFIC_HEAT: f64 = 2117.0;

/// Seconds per hour
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Largest tolerated `|net - (upward - downward)|` relative to the incident
/// flux before a warning is logged
const NET_FLUX_TOLERANCE: f64 = 1e-9;

/// A quantity over the whole spectrum, the visible bands, and the near
/// infrared.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectralBands {
    /// All bands
    pub broadband: f64,
    /// The first `visible_bands` bands
    pub visible: f64,
    /// The remaining bands
    pub near_infrared: f64,
}

impl SpectralBands {
    /// Sum `values` over each range.
    pub(crate) fn sum(values: &[f64], visible_bands: usize) -> Self {
        let split = visible_bands.min(values.len());
        let visible: f64 = values[..split].iter().sum();
        let near_infrared: f64 = values[split..].iter().sum();
        Self {
            broadband: visible + near_infrared,
            visible,
            near_infrared,
        }
    }

    /// Mean of `values` weighted by `weights` over each range. A range with
    /// no weight gives NaN.
    pub(crate) fn weighted_mean(values: &[f64], weights: &[f64], visible_bands: usize) -> Self {
        let weighted: Vec<f64> = values.iter().zip(weights).map(|(v, w)| v * w).collect();
        let numerator = Self::sum(&weighted, visible_bands);
        let denominator = Self::sum(weights, visible_bands);
        Self {
            broadband: numerator.broadband / denominator.broadband,
            visible: numerator.visible / denominator.visible,
            near_infrared: numerator.near_infrared / denominator.near_infrared,
        }
    }
}

/// Heating rate in K/hour for `absorbed` W/m² deposited in `ice_mass` kg/m².
pub fn heating_rate(absorbed: f64, ice_mass: f64) -> f64 {
    absorbed / (ice_mass * ICE_SPECIFIC_HEAT) * SECONDS_PER_HOUR
}

/// Column-integrated results of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Incident-weighted albedo
    pub albedo: SpectralBands,
    /// Absorbed flux per layer (W/m²)
    pub layer_absorption: Vec<SpectralBands>,
    /// Absorbed flux in the whole column (W/m²)
    pub column_absorption: SpectralBands,
    /// Flux absorbed by the underlying surface (W/m²)
    pub surface_absorption: SpectralBands,
    /// Broadband heating rate per layer (K/hour)
    pub heating_rate: Vec<f64>,
    /// Sum over bands of `|incident - (absorbed + transmitted + reflected)|`
    pub energy_residual: f64,
    /// Whether the residual is within tolerance of the incident flux
    pub energy_balanced: bool,
    /// Largest `|net - (upward - downward)|` over bands and interfaces
    pub net_flux_discrepancy: f64,
    /// Number of bands where some layer was close to the particular-solution
    /// singularity
    pub near_singular_bands: usize,
}

impl Summary {
    /// Aggregate per-band fluxes. `ice_mass` is the ice mass (kg/m²) of each
    /// layer.
    pub(crate) fn new(
        fluxes: &[SpectralFluxes],
        ice_mass: &[f64],
        visible_bands: usize,
        energy_tolerance: f64,
    ) -> Self {
        let incident: Vec<f64> = fluxes.iter().map(|f| f.incident).collect();
        let albedo: Vec<f64> = fluxes.iter().map(|f| f.albedo).collect();
        let transmitted: Vec<f64> = fluxes.iter().map(|f| f.transmitted).collect();

        let layer_absorption: Vec<SpectralBands> = (0..ice_mass.len())
            .map(|n| {
                let absorbed: Vec<f64> = fluxes.iter().map(|f| f.absorbed[n]).collect();
                SpectralBands::sum(&absorbed, visible_bands)
            })
            .collect();
        let column_absorption = layer_absorption.iter().fold(SpectralBands::default(), |acc, layer| {
            SpectralBands {
                broadband: acc.broadband + layer.broadband,
                visible: acc.visible + layer.visible,
                near_infrared: acc.near_infrared + layer.near_infrared,
            }
        });
        let heating_rate = layer_absorption
            .iter()
            .zip(ice_mass)
            .map(|(absorbed, &mass)| heating_rate(absorbed.broadband, mass))
            .collect();

        let total_incident: f64 = incident.iter().sum();
        let energy_residual: f64 = fluxes.iter().map(|f| f.residual.abs()).sum();
        let energy_balanced = energy_residual <= energy_tolerance * total_incident;
        if !energy_balanced {
            warn!(
                "energy residual {energy_residual:e} exceeds tolerance of {:e}",
                energy_tolerance * total_incident
            );
        }

        let net_flux_discrepancy = fluxes.iter().map(|f| f.net_discrepancy).fold(0.0, f64::max);
        let peak_incident = incident.iter().copied().fold(0.0, f64::max);
        if net_flux_discrepancy > NET_FLUX_TOLERANCE * peak_incident {
            warn!("net flux disagrees with upward minus downward flux by {net_flux_discrepancy:e}");
        }

        let near_singular_bands = fluxes.iter().filter(|f| f.near_singular).count();
        if near_singular_bands > 0 {
            warn!("{near_singular_bands} bands were close to the two-stream singularity");
        }

        Self {
            albedo: SpectralBands::weighted_mean(&albedo, &incident, visible_bands),
            layer_absorption,
            column_absorption,
            surface_absorption: SpectralBands::sum(&transmitted, visible_bands),
            heating_rate,
            energy_residual,
            energy_balanced,
            net_flux_discrepancy,
            near_singular_bands,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sums_split_at_visible_bands() {
        let bands = SpectralBands::sum(&[1.0, 2.0, 3.0, 4.0], 1);
        assert_eq!(bands.visible, 1.0);
        assert_eq!(bands.near_infrared, 9.0);
        assert_eq!(bands.broadband, 10.0);

        let all_visible = SpectralBands::sum(&[1.0, 2.0], 50);
        assert_eq!(all_visible.visible, 3.0);
        assert_eq!(all_visible.near_infrared, 0.0);
    }

    #[test]
    fn weighted_albedo() {
        let bands = SpectralBands::weighted_mean(&[0.9, 0.8, 0.5, 0.1], &[3.0, 1.0, 1.0, 0.0], 2);
        assert_relative_eq!(bands.visible, (2.7 + 0.8) / 4.0, max_relative = 1e-14);
        assert_relative_eq!(bands.near_infrared, 0.5, max_relative = 1e-14);
        assert_relative_eq!(bands.broadband, (2.7 + 0.8 + 0.5) / 5.0, max_relative = 1e-14);
    }

    #[test]
    fn heating_rate_formula() {
        // 10 W/m² into 1 kg/m² of ice
        assert_relative_eq!(heating_rate(10.0, 1.0), 36000.0 / 2117.0, max_relative = 1e-14);
        assert_relative_eq!(heating_rate(2.117, 100.0), 0.036, max_relative = 1e-12);
    }
}

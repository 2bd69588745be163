//! Incident solar flux at the top of the snow column.

use log::debug;
use serde::Deserialize;

use crate::error::SnicarError;
use crate::optics::WavelengthGrid;

/// Standard atmosphere used to compute the incident spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atmosphere {
    /// Mid-latitude winter
    #[default]
    MidLatitudeWinter,
    /// Mid-latitude summer
    MidLatitudeSummer,
    /// Sub-Arctic winter
    SubArcticWinter,
    /// Sub-Arctic summer
    SubArcticSummer,
    /// Summit, Greenland
    Summit,
    /// High mountain summer
    HighMountain,
    /// Tropical
    Tropical,
}

impl Atmosphere {
    /// Short code used in table file names.
    pub fn code(self) -> &'static str {
        match self {
            Atmosphere::MidLatitudeWinter => "mlw",
            Atmosphere::MidLatitudeSummer => "mls",
            Atmosphere::SubArcticWinter => "saw",
            Atmosphere::SubArcticSummer => "sas",
            Atmosphere::Summit => "smm",
            Atmosphere::HighMountain => "hmn",
            Atmosphere::Tropical => "toa",
        }
    }
}

/// Direct-beam or diffuse illumination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beam {
    /// Clear sky, collimated beam from the solar zenith angle
    Direct,
    /// Overcast, isotropic diffuse flux
    Diffuse,
}

/// A store that can produce an incident spectrum for a scenario.
pub trait IrradianceProvider: Send + Sync {
    /// Spectral incident flux for `atmosphere`, aligned to `grid`. The
    /// zenith angle (whole degrees) only matters for [`Beam::Direct`].
    fn irradiance(
        &self,
        atmosphere: Atmosphere,
        beam: Beam,
        zenith_deg: u32,
        grid: &WavelengthGrid,
    ) -> Result<Vec<f64>, SnicarError>;
}

/// Incident flux (W/m² per band) split into its direct and diffuse parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Illumination {
    direct: Vec<f64>,
    diffuse: Vec<f64>,
}

impl Illumination {
    /// Wrap per-wavelength direct and diffuse flux. Both must have the same
    /// length and be non-negative.
    pub fn new(direct: Vec<f64>, diffuse: Vec<f64>) -> Result<Self, SnicarError> {
        if direct.len() != diffuse.len() {
            return Err(SnicarError::InconsistentInputs(
                "direct and diffuse flux must have the same length".into(),
            ));
        }
        if direct.iter().chain(&diffuse).any(|f| f.is_nan() || *f < 0.0) {
            return Err(SnicarError::InconsistentInputs(
                "incident flux can't be negative".into(),
            ));
        }
        Ok(Self { direct, diffuse })
    }

    /// Direct beam only.
    pub fn direct_beam(flux: Vec<f64>) -> Result<Self, SnicarError> {
        let diffuse = vec![0.0; flux.len()];
        Self::new(flux, diffuse)
    }

    /// Diffuse only.
    pub fn diffuse(flux: Vec<f64>) -> Result<Self, SnicarError> {
        let direct = vec![0.0; flux.len()];
        Self::new(direct, flux)
    }

    /// Load a scenario from `provider`.
    ///
    /// Each profile is normalised to a unit sum and the two are blended so
    /// that `diffuse_fraction` of the (unit) incident flux is diffuse. A
    /// profile with zero weight isn't loaded at all.
    pub fn load(
        provider: &dyn IrradianceProvider,
        grid: &WavelengthGrid,
        atmosphere: Atmosphere,
        cos_zenith: f64,
        diffuse_fraction: f64,
    ) -> Result<Self, SnicarError> {
        if !(0.0..=1.0).contains(&diffuse_fraction) {
            return Err(SnicarError::InvalidConfig(format!(
                "diffuse fraction {diffuse_fraction} is outside [0, 1]"
            )));
        }
        let zenith_deg = cos_zenith.clamp(-1.0, 1.0).acos().to_degrees().round() as u32;

        let profile = |beam: Beam, weight: f64| -> Result<Vec<f64>, SnicarError> {
            if weight == 0.0 {
                return Ok(vec![0.0; grid.len()]);
            }
            let mut flux = provider.irradiance(atmosphere, beam, zenith_deg, grid)?;
            let total: f64 = flux.iter().sum();
            if !total.is_finite() || total <= 0.0 {
                return Err(SnicarError::InconsistentInputs(format!(
                    "{beam:?} irradiance for {atmosphere:?} has no energy"
                )));
            }
            flux.iter_mut().for_each(|f| *f *= weight / total);
            Ok(flux)
        };

        let direct = profile(Beam::Direct, 1.0 - diffuse_fraction)?;
        let diffuse = profile(Beam::Diffuse, diffuse_fraction)?;
        debug!("loaded {atmosphere:?} illumination at {zenith_deg}° zenith");
        Self::new(direct, diffuse)
    }

    /// Direct-beam flux per band, as received on a horizontal surface.
    pub fn direct(&self) -> &[f64] {
        &self.direct
    }

    /// Diffuse flux per band.
    pub fn diffuse_flux(&self) -> &[f64] {
        &self.diffuse
    }

    /// Total incident flux in band `index`.
    pub fn total(&self, index: usize) -> f64 {
        self.direct[index] + self.diffuse[index]
    }

    /// Total incident flux per band.
    pub fn totals(&self) -> Vec<f64> {
        self.direct
            .iter()
            .zip(&self.diffuse)
            .map(|(s, d)| s + d)
            .collect()
    }

    /// Number of bands.
    pub fn len(&self) -> usize {
        self.direct.len()
    }

    /// True if there are no bands.
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }
}

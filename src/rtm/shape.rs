//! Asymmetry parameter of non-spherical ice grains.
//!
//! Mie theory gives the asymmetry parameter of spheres. For spheroids,
//! hexagonal plates, and Koch snowflakes it is corrected with the empirical
//! fits of He et al. (2017), which work on six broad bands, and Fu (2007)
//! for the aspect-ratio dependence. The band values are then interpolated
//! back onto the full wavelength grid.
//!
//! # References
//!
//! C. He, K. N. Liou, Y. Takano, et al., "Impact of grain shape and
//! multiple black carbon internal mixing on snow albedo: parameterization and
//! radiative effect analysis", J. Geophys. Res. Atmos., 123, 1253-1268, 2018,
//! <https://doi.org/10.1002/2017JD027752>.
//!
//! Q. Fu, "A new parameterization of an asymmetry factor of cirrus clouds for
//! climate models", J. Atmos. Sci., 64, 4140-4150, 2007,
//! <https://doi.org/10.1175/2007JAS2289.1>.

use crate::column::{GrainShape, Layer};
use crate::error::SnicarError;
use crate::optics::{SpectralOptics, WavelengthGrid};

use super::pchip::MonotoneCubic;

/// Upper bound on the ice asymmetry parameter
pub(crate) const MAX_ASYMMETRY: f64 = 0.99;

/// Number of band centres the corrections are defined at
const NUM_BANDS: usize = 7;

/// Band edges in µm. The 4-5 µm band reuses the 3.5-4 µm coefficients.
const BAND_EDGES: [f64; NUM_BANDS + 1] = [0.25, 0.70, 1.41, 1.90, 2.50, 3.50, 4.00, 5.00];

/// Past this wavelength (µm) the last interpolated value is held.
const HOLD_BEYOND: f64 = 4.0;

/// Reference shape factor of a hexagonal plate
const FS_HEX_REFERENCE: f64 = 0.788;

/// Equal-projected-area diameter ratio of a Koch snowflake to a sphere
const KOCH_DIAMETER_RATIO: f64 = 0.544;

// He et al. (2017), Table 3 and Eqs. 6-7
const CG_B0: [f64; NUM_BANDS] = [
    9.76029e-01, 9.67798e-01, 1.00111e+00, 1.00224e+00, 9.64295e-01, 9.97475e-01, 9.97475e-01,
];
const CG_B1: [f64; NUM_BANDS] = [
    5.21042e-01, 4.96181e-01, 1.83711e-01, 1.37082e-01, 5.50598e-02, 8.48743e-02, 8.48743e-02,
];
const CG_B2: [f64; NUM_BANDS] = [
    -2.66792e-04, 1.14088e-03, 2.37011e-04, -2.35905e-04, 8.40449e-04, -4.71484e-04,
    -4.71484e-04,
];

// Fu (2007), Tables 1 and 2, Eqs. 3.1-3.4: quadratic in aspect ratio for
// spheroids...
const F07_C0: [f64; NUM_BANDS] = [
    7.938904e-01, 8.030084e-01, 8.513932e-01, 8.692241e-01, 7.085850e-01, 6.412701e-01,
    6.412701e-01,
];
const F07_C1: [f64; NUM_BANDS] = [
    -3.987320e-01, -3.723287e-01, -3.924784e-01, -3.259404e-01, 4.429054e-02, -1.726586e-01,
    -1.726586e-01,
];
const F07_C2: [f64; NUM_BANDS] = [
    1.349959e-01, 1.115697e-01, 9.853958e-02, 5.557793e-02, -1.233493e-01, 0.0, 0.0,
];

// ...and quadratic in log(aspect ratio) for plates and snowflakes
const F07_P0: [f64; NUM_BANDS] = [
    5.292852e-01, 5.425909e-01, 5.601598e-01, 6.025738e-01, 6.679325e-01, 6.388362e-01,
    6.388362e-01,
];
const F07_P1: [f64; NUM_BANDS] = [
    1.140557e-01, 1.143152e-01, 1.143814e-01, 1.071238e-01, 1.353873e-01, 1.914431e-01,
    1.914431e-01,
];
const F07_P2: [f64; NUM_BANDS] = [
    3.165543e-03, 2.014810e-03, 1.780838e-03, 6.987734e-04, -1.882932e-02, -2.277872e-02,
    -2.277872e-02,
];

impl GrainShape {
    /// Shape factor used when the layer gives 0.
    fn default_shape_factor(self) -> f64 {
        match self {
            GrainShape::Sphere => 1.0,
            GrainShape::Spheroid => 0.929,
            GrainShape::HexagonalPlate => 0.788,
            GrainShape::KochSnowflake => 0.712,
        }
    }

    /// Aspect ratio used when the layer gives 0.
    fn default_aspect_ratio(self) -> f64 {
        match self {
            GrainShape::Sphere => 1.0,
            GrainShape::Spheroid => 0.5,
            GrainShape::HexagonalPlate | GrainShape::KochSnowflake => 2.5,
        }
    }
}

fn band_centres() -> [f64; NUM_BANDS] {
    std::array::from_fn(|i| 0.5 * (BAND_EDGES[i] + BAND_EDGES[i + 1]))
}

/// Asymmetry parameter of the ice grains in `layer` at every wavelength of
/// `grid`, capped at [`MAX_ASYMMETRY`].
///
/// `ice` holds the Mie properties of spheres with the layer's effective
/// radius.
pub(crate) fn ice_asymmetry(
    grid: &WavelengthGrid,
    layer: &Layer,
    ice: &SpectralOptics,
) -> Result<Vec<f64>, SnicarError> {
    if layer.shape == GrainShape::Sphere {
        return Ok(ice
            .asymmetry
            .iter()
            .map(|g| g.min(MAX_ASYMMETRY))
            .collect());
    }

    let shape = layer.shape;
    let shape_factor = if layer.shape_factor > 0.0 {
        layer.shape_factor
    } else {
        shape.default_shape_factor()
    };
    let aspect_ratio = if layer.aspect_ratio > 0.0 {
        layer.aspect_ratio
    } else {
        shape.default_aspect_ratio()
    };

    // Effective diameter in µm
    let diameter = match shape {
        GrainShape::KochSnowflake => 2.0 * layer.grain_radius / KOCH_DIAMETER_RATIO,
        _ => 2.0 * layer.grain_radius,
    };

    let centres = band_centres();
    let band_asymmetry: [f64; NUM_BANDS] = std::array::from_fn(|b| {
        let cg = CG_B0[b] * (shape_factor / FS_HEX_REFERENCE).powf(CG_B1[b]) * diameter.powf(CG_B2[b]);
        let gg_f07 = match shape {
            GrainShape::Spheroid => {
                F07_C0[b] + F07_C1[b] * aspect_ratio + F07_C2[b] * aspect_ratio.powi(2)
            }
            _ => {
                let ln_ar = aspect_ratio.ln();
                F07_P0[b] + F07_P1[b] * ln_ar + F07_P2[b] * ln_ar.powi(2)
            }
        };
        let ssa = interpolate_linear(grid.as_slice(), &ice.ssa, centres[b]).max(f64::EPSILON);
        let g_f07 = gg_f07 + (1.0 - gg_f07) / (2.0 * ssa);
        g_f07 * cg
    });

    let interp = MonotoneCubic::new(&centres, &band_asymmetry)?;
    let mut asymmetry = Vec::with_capacity(grid.len());
    let mut held = f64::NAN;
    for &wavelength in grid.as_slice() {
        if wavelength <= HOLD_BEYOND || held.is_nan() {
            held = interp.evaluate(wavelength);
        }
        asymmetry.push(held.min(MAX_ASYMMETRY));
    }
    Ok(asymmetry)
}

/// Linear interpolation of `ys` (on increasing `xs`) at `x`, clamped to the
/// end values.
fn interpolate_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let upper = xs.partition_point(|&xi| xi < x);
    if upper == 0 {
        ys[0]
    } else if upper == xs.len() {
        ys[xs.len() - 1]
    } else {
        let t = (x - xs[upper - 1]) / (xs[upper] - xs[upper - 1]);
        ys[upper - 1] + t * (ys[upper] - ys[upper - 1])
    }
}

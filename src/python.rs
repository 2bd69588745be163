//! Python bindings.
//!
//! NOTE: this module is the interface between Rust and Python. The real work
//! happens in the other modules, and they do not use `pyo3`, it's only used
//! here.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, info};
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use numpy::prelude::*;
use numpy::{PyArray1, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3, ToPyArray};
use pyo3::exceptions::{PyFileNotFoundError, PyIOError, PyKeyboardInterrupt, PyValueError};
use pyo3::prelude::*;
use rayon::prelude::*;

use crate::column::{GrainShape, Layer, SnowColumn};
use crate::config::RunConfig;
use crate::error::SnicarError;
use crate::model::Model;
use crate::rtm::RtmOutputs;
use crate::species::{Species, SpeciesTable};

impl From<SnicarError> for PyErr {
    fn from(e: SnicarError) -> Self {
        match e {
            SnicarError::MissingOpticalProperty(_) => PyFileNotFoundError::new_err(e.to_string()),
            SnicarError::Io(_) | SnicarError::GridMismatch(_) | SnicarError::Parse { .. } => {
                PyIOError::new_err(e.to_string())
            }
            SnicarError::Cancelled => PyKeyboardInterrupt::new_err(e.to_string()),
            SnicarError::InconsistentInputs(_)
            | SnicarError::InvalidLayer { .. }
            | SnicarError::InvalidGrainShape(_)
            | SnicarError::InvalidImpurityLoad { .. }
            | SnicarError::InvalidConfig(_)
            | SnicarError::Json(_) => PyValueError::new_err(e.to_string()),
        }
    }
}

/// Results of a batch of columns.
///
/// This is just a container of numpy arrays. Per-column values have shape
/// (`num_columns`, ), spectra (`num_columns`, `num_bands`), per-layer values
/// (`num_columns`, `num_layers`), and the spectral absorption (`num_columns`,
/// `num_layers`, `num_bands`).
#[pyclass]
struct SnicarResults {
    wavelengths: Array1<f64>,
    albedo: Array2<f64>,
    broadband_albedo: Array1<f64>,
    visible_albedo: Array1<f64>,
    near_ir_albedo: Array1<f64>,
    absorbed: Array2<f64>,
    heating_rate: Array2<f64>,
    spectral_absorption: Array3<f64>,
    energy_residual: Array1<f64>,
}

/// Implement all the "getters" for the Python properties
#[pymethods]
impl SnicarResults {
    #[getter]
    fn wavelengths<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.wavelengths.to_pyarray(py)
    }

    #[getter]
    fn albedo<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.albedo.to_pyarray(py)
    }

    #[getter]
    fn broadband_albedo<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.broadband_albedo.to_pyarray(py)
    }

    #[getter]
    fn visible_albedo<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.visible_albedo.to_pyarray(py)
    }

    #[getter]
    fn near_ir_albedo<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.near_ir_albedo.to_pyarray(py)
    }

    #[getter]
    fn absorbed<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.absorbed.to_pyarray(py)
    }

    #[getter]
    fn heating_rate<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.heating_rate.to_pyarray(py)
    }

    #[getter]
    fn spectral_absorption<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.spectral_absorption.to_pyarray(py)
    }

    #[getter]
    fn energy_residual<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.energy_residual.to_pyarray(py)
    }
}

impl SnicarResults {
    fn new(wavelengths: &[f64], num_columns: usize, num_layers: usize) -> Self {
        let num_bands = wavelengths.len();
        Self {
            wavelengths: Array1::from(wavelengths.to_vec()),
            albedo: Array2::zeros([num_columns, num_bands]),
            broadband_albedo: Array1::zeros(num_columns),
            visible_albedo: Array1::zeros(num_columns),
            near_ir_albedo: Array1::zeros(num_columns),
            absorbed: Array2::zeros([num_columns, num_layers]),
            heating_rate: Array2::zeros([num_columns, num_layers]),
            spectral_absorption: Array3::zeros([num_columns, num_layers, num_bands]),
            energy_residual: Array1::zeros(num_columns),
        }
    }

    fn assign(&mut self, index: usize, outputs: &RtmOutputs) {
        let summary = &outputs.summary;
        self.albedo
            .index_axis_mut(Axis(0), index)
            .assign(&ArrayView1::from(outputs.albedo.as_slice()));
        self.broadband_albedo[index] = summary.albedo.broadband;
        self.visible_albedo[index] = summary.albedo.visible;
        self.near_ir_albedo[index] = summary.albedo.near_infrared;

        let absorbed: Vec<f64> = summary.layer_absorption.iter().map(|b| b.broadband).collect();
        self.absorbed
            .index_axis_mut(Axis(0), index)
            .assign(&ArrayView1::from(absorbed.as_slice()));
        self.heating_rate
            .index_axis_mut(Axis(0), index)
            .assign(&ArrayView1::from(summary.heating_rate.as_slice()));
        self.spectral_absorption
            .index_axis_mut(Axis(0), index)
            .assign(&outputs.absorbed);
        self.energy_residual[index] = summary.energy_residual;
    }
}

/// Compute spectral albedo and absorption for a batch of snow columns.
///
/// Every column has the same number of layers, ordered from the top down.
/// The following have shape (`num_columns`, `num_layers`):
///
/// `thickness`: layer thickness in m
///
/// `density`: snow density in kg/m³
///
/// `grain_radius`: ice grain effective radius in µm
///
/// `grain_shape`: 1 sphere, 2 spheroid, 3 hexagonal plate, 4 Koch snowflake
///
/// `shape_factor`, `aspect_ratio`: grain shape parameters, 0 for the shape
/// defaults
///
/// `algae`: algae concentration in cells/mL
///
/// `impurities` has shape (`num_columns`, `num_layers`, 14) and holds the
/// mixing ratio of each impurity species in ppb, in the order black carbon,
/// coated black carbon, brown carbon, coated brown carbon, dust 1 to 5, ash 1
/// to 5.
///
/// `config_path` is a JSON run configuration; its optical and irradiance
/// tables are read from its `data_dir`.
///
/// The number of worker threads is controlled by `num_threads`. It must be a
/// positive integer, or `None` to use the configured or automatic count.
#[pyfunction]
#[pyo3(signature = (thickness, density, grain_radius, grain_shape, shape_factor, aspect_ratio, impurities, algae, config_path, num_threads=None))]
#[allow(clippy::too_many_arguments)]
fn compute_snicar(
    py: Python<'_>,
    thickness: PyReadonlyArray2<'_, f64>,
    density: PyReadonlyArray2<'_, f64>,
    grain_radius: PyReadonlyArray2<'_, f64>,
    grain_shape: PyReadonlyArray2<'_, i64>,
    shape_factor: PyReadonlyArray2<'_, f64>,
    aspect_ratio: PyReadonlyArray2<'_, f64>,
    impurities: PyReadonlyArray3<'_, f64>,
    algae: PyReadonlyArray2<'_, f64>,
    config_path: PathBuf,
    num_threads: Option<usize>,
) -> PyResult<SnicarResults> {
    let num_columns = thickness.shape()[0];
    let num_layers = thickness.shape()[1];

    // Check shapes of all inputs
    {
        let two_dims = &[
            density.dims(),
            grain_radius.dims(),
            shape_factor.dims(),
            aspect_ratio.dims(),
            algae.dims(),
        ];
        if two_dims.iter().any(|d| d != &[num_columns, num_layers])
            || grain_shape.dims() != [num_columns, num_layers]
        {
            return Err(SnicarError::InconsistentInputs(
                "layer arrays must all have the same shape".into(),
            )
            .into());
        }
        if impurities.dims() != [num_columns, num_layers, Species::COUNT] {
            return Err(SnicarError::InconsistentInputs(format!(
                "impurities must have shape ({num_columns}, {num_layers}, {})",
                Species::COUNT
            ))
            .into());
        }
    }
    debug!("input shapes are consistent");

    let thickness = thickness.as_array();
    let density = density.as_array();
    let grain_radius = grain_radius.as_array();
    let grain_shape = grain_shape.as_array();
    let shape_factor = shape_factor.as_array();
    let aspect_ratio = aspect_ratio.as_array();
    let impurities = impurities.as_array();
    let algae = algae.as_array();

    let columns = (0..num_columns)
        .map(|c| -> Result<SnowColumn, SnicarError> {
            let layers = (0..num_layers)
                .map(|n| -> Result<Layer, SnicarError> {
                    let mut layer = Layer::new(thickness[[c, n]], density[[c, n]], grain_radius[[c, n]])
                        .with_shape(
                            GrainShape::try_from(grain_shape[[c, n]])?,
                            shape_factor[[c, n]],
                            aspect_ratio[[c, n]],
                        )
                        .with_algae(algae[[c, n]]);
                    layer.impurities =
                        SpeciesTable::from_fn(|species| impurities[[c, n, species.index()]]);
                    Ok(layer)
                })
                .collect::<Result<Vec<_>, _>>()?;
            SnowColumn::new(layers)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let config = RunConfig::from_file(&config_path)?;
    let model = Model::load(&config, &columns)?;
    let pool = model.thread_pool(num_threads)?;

    let mut results = Vec::new();

    // These atomics keep track of how many columns have finished and whether
    // it's time to cancel the computation or not
    let num_completed = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);

    info!("Processing snow RTM for {num_columns} columns of {num_layers} layers");

    pool.in_place_scope(|s| -> Result<(), PyErr> {
        s.spawn(|_| {
            columns
                .par_iter()
                .map(|column| -> Result<_, SnicarError> {
                    if cancelled.load(Ordering::Relaxed) {
                        return Err(SnicarError::Cancelled);
                    }
                    model.run(column)
                })
                .inspect(|_| {
                    num_completed.fetch_add(1, Ordering::Relaxed);
                })
                .collect_into_vec(&mut results);
        });

        // The work is done in the thread pool, but back here in the main
        // thread, handle progress reporting and checking for early
        // cancellation
        while !cancelled.load(Ordering::Relaxed) {
            if let Err(e) = py.check_signals() {
                cancelled.store(true, Ordering::Relaxed);
                return Err(e);
            }

            let num_completed = num_completed.load(Ordering::Relaxed);
            let progress = num_completed as f32 / num_columns.max(1) as f32 * 100.;
            info!("Completed RTM for {num_completed}/{num_columns} columns ({progress:0.2}%)");

            // All finished without cancelling early
            if num_completed == num_columns {
                break;
            }

            py.allow_threads(|| {
                std::thread::sleep(Duration::from_secs(5));
            });
        }

        Ok(())
    })?;

    // Copy the intermediate results to the output arrays
    debug!("copying RTM output");
    let mut output = SnicarResults::new(model.grid().as_slice(), num_columns, num_layers);
    results
        .into_iter()
        .enumerate()
        .try_for_each(|(index, rtm_output)| -> Result<_, SnicarError> {
            output.assign(index, &rtm_output?);
            Ok(())
        })?;

    Ok(output)
}

/// A Python module implemented in Rust.
#[pymodule]
fn snicar_rtm(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_function(wrap_pyfunction!(compute_snicar, m)?)?;
    m.add_class::<SnicarResults>()?;
    Ok(())
}

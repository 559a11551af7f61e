use super::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Distribution};
use tracing::trace;

/// Variational (tied-weights) dropout for recurrent projections.
///
/// Unlike ordinary dropout, which resamples its mask on every call, this layer draws one
/// mask at the start of a run (`begin_sequence`) and multiplies every timestep of that
/// run by the same mask. The mask has one entry per (sequence element, feature) and uses
/// inverted dropout scaling, so kept entries are `1 / (1 - rate)`.
///
/// See Gal & Ghahramani, "A Theoretically Grounded Application of Dropout in Recurrent
/// Neural Networks".
///
/// # Fields
///
/// - `rate` - Fraction of features to drop, in `[0, 1)`
/// - `training` - Masks are only applied in training mode
/// - `mask` - Mask of the current run, shape (batch, features)
/// - `rng` - Random source for the masks
///
/// # Example
/// ```rust
/// use rustycell::prelude::*;
/// use ndarray::Array2;
///
/// let mut dropout = VariationalDropout::with_seed(0.5, 42).unwrap();
/// dropout.begin_sequence(2, 8);
///
/// let step_1 = dropout.apply(Array2::ones((2, 8))).unwrap();
/// let step_2 = dropout.apply(Array2::ones((2, 8))).unwrap();
///
/// // Same mask for every step of the run
/// assert_eq!(step_1, step_2);
/// ```
pub struct VariationalDropout {
    rate: f32,
    training: bool,
    mask: Option<Array2<f32>>,
    rng: StdRng,
}

impl VariationalDropout {
    /// Creates a new variational dropout seeded from the operating system.
    ///
    /// # Parameters
    ///
    /// - `rate` - Dropout rate, must be in `[0, 1)`
    ///
    /// # Returns
    ///
    /// - `Ok(Self)` - A dropout in training mode with no mask drawn yet
    /// - `Err(ModelError::ConfigurationError)` - If the rate is outside `[0, 1)`
    pub fn new(rate: f32) -> Result<Self, ModelError> {
        validate_dropout_rate(rate)?;
        Ok(Self {
            rate,
            training: true,
            mask: None,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Creates a new variational dropout with a deterministic random source.
    pub fn with_seed(rate: f32, seed: u64) -> Result<Self, ModelError> {
        validate_dropout_rate(rate)?;
        Ok(Self {
            rate,
            training: true,
            mask: None,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    get_field!(get_rate, rate, f32);
    get_field!(is_training, training, bool);

    mode_dependent_layer_set_training!();

    /// Whether `apply` changes its input
    pub fn is_active(&self) -> bool {
        self.training && self.rate > 0.0
    }

    /// Mask of the current run, if one has been drawn
    pub fn get_mask(&self) -> Option<&Array2<f32>> {
        self.mask.as_ref()
    }

    /// Draws the mask for a new run.
    ///
    /// # Parameters
    ///
    /// - `batch` - Number of sequence elements processed together
    /// - `features` - Width of the projection output being masked
    pub fn begin_sequence(&mut self, batch: usize, features: usize) {
        if !self.is_active() {
            self.mask = None;
            return;
        }
        let scale = 1.0 / (1.0 - self.rate);
        let keep = match Bernoulli::new(f64::from(1.0 - self.rate)) {
            Ok(keep) => keep,
            Err(_) => {
                self.mask = None;
                return;
            }
        };
        let rng = &mut self.rng;
        let mask = Array2::from_shape_fn((batch, features), |_| {
            if keep.sample(rng) { scale } else { 0.0 }
        });
        trace!(batch, features, rate = self.rate, "drew variational dropout mask");
        self.mask = Some(mask);
    }

    /// Applies the mask of the current run.
    ///
    /// # Parameters
    ///
    /// - `x` - Projection output with shape (batch, features)
    ///
    /// # Returns
    ///
    /// - `Ok(Array2<f32>)` - `x` unchanged when inactive, `x ⊙ mask` otherwise
    /// - `Err(ModelError::ProcessingError)` - Active but `begin_sequence` has not been called
    /// - `Err(ModelError::ShapeMismatch)` - The mask was drawn for another shape
    pub fn apply(&self, x: Array2<f32>) -> Result<Array2<f32>, ModelError> {
        if !self.is_active() {
            return Ok(x);
        }
        let mask = self.mask.as_ref().ok_or_else(|| {
            ModelError::ProcessingError(
                "variational dropout mask has not been drawn for this run".to_string(),
            )
        })?;
        if mask.dim() != x.dim() {
            return Err(ModelError::ShapeMismatch(format!(
                "dropout mask has shape {:?} but the projection has shape {:?}",
                mask.dim(),
                x.dim()
            )));
        }
        Ok(x * mask)
    }
}

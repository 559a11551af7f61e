use super::*;

/// Affine projection `y = x · Wᵀ + b` producing `number_of_elements` outputs per row.
///
/// The weight matrix is stored as `(number_of_elements, input_dim)`, one row per output
/// element. Weights and free term are held behind `Arc` so several layers may share the
/// same handle; every mutation goes through `Arc::make_mut`, which copies the data if the
/// handle is shared.
///
/// # Fields
///
/// - `number_of_elements` - Output width
/// - `weights` - Weight matrix with shape (number_of_elements, input_dim), `None` until initialized or set
/// - `free_term` - Bias vector with length number_of_elements, `None` means a zero free term
pub struct FullyConnected {
    number_of_elements: usize,
    weights: Option<Arc<Array2<f32>>>,
    free_term: Option<Arc<Array1<f32>>>,
}

impl FullyConnected {
    /// Creates a projection with `number_of_elements` outputs and no weights yet.
    pub fn new(number_of_elements: usize) -> Self {
        Self {
            number_of_elements,
            weights: None,
            free_term: None,
        }
    }

    get_field!(get_number_of_elements, number_of_elements, usize);

    /// Changes the output width. Existing weights and free term are dropped if the width changes.
    pub fn set_number_of_elements(&mut self, number_of_elements: usize) {
        if self.number_of_elements != number_of_elements {
            self.number_of_elements = number_of_elements;
            self.weights = None;
            self.free_term = None;
        }
    }

    /// Returns the weight handle (shared, not copied)
    pub fn get_weights_data(&self) -> Option<Arc<Array2<f32>>> {
        self.weights.clone()
    }

    /// Replaces the weight handle.
    ///
    /// The output width follows the row count of the new weights.
    pub fn set_weights_data(&mut self, weights: Option<Arc<Array2<f32>>>) {
        if let Some(w) = &weights {
            self.number_of_elements = w.nrows();
        }
        self.weights = weights;
    }

    /// Returns the free term handle (shared, not copied)
    pub fn get_free_term_data(&self) -> Option<Arc<Array1<f32>>> {
        self.free_term.clone()
    }

    /// Replaces the free term handle. `None` makes the free term zero.
    pub fn set_free_term_data(&mut self, free_term: Option<Arc<Array1<f32>>>) {
        self.free_term = free_term;
    }

    /// Mutates the weights in place, copying them first if the handle is shared.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - The closure ran on an exclusively owned matrix
    /// - `Err(ModelError::ProcessingError)` - There are no weights to mutate yet
    pub fn update_weights<F>(&mut self, f: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut Array2<f32>),
    {
        let weights = self.weights.as_mut().ok_or_else(|| {
            ModelError::ProcessingError("weights have not been initialized".to_string())
        })?;
        f(Arc::make_mut(weights));
        Ok(())
    }

    /// Creates weights for `input_dim` inputs if there are none yet.
    ///
    /// Uses Xavier/Glorot uniform initialization when `normalize_columns` is false, and a
    /// uniform matrix scaled to unit column norms (the recurrent-kernel initialization)
    /// otherwise.
    /// A missing free term is created filled with zeros, then `bias_init` may adjust it.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if new weights were created
    pub fn initialize_if_empty<F>(
        &mut self,
        input_dim: usize,
        normalize_columns: bool,
        bias_init: F,
    ) -> bool
    where
        F: FnOnce(&mut Array1<f32>),
    {
        if self.weights.is_some() {
            return false;
        }
        let rows = self.number_of_elements;
        let weights = if normalize_columns {
            let mut w = Array::random((rows, input_dim), Uniform::new(-1.0f32, 1.0));
            for mut col in w.columns_mut() {
                let norm = col.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 1e-8 {
                    col /= norm;
                }
            }
            w
        } else {
            let limit = (6.0 / (input_dim + rows) as f32).sqrt();
            Array::random((rows, input_dim), Uniform::new(-limit, limit))
        };
        self.weights = Some(Arc::new(weights));

        if self.free_term.is_none() {
            let mut free_term = Array1::<f32>::zeros(rows);
            bias_init(&mut free_term);
            self.free_term = Some(Arc::new(free_term));
        }
        true
    }

    /// Verifies the owned weights against an input width.
    ///
    /// # Errors
    ///
    /// - `ModelError::ProcessingError` - No weights exist yet
    /// - `ModelError::ShapeMismatch` - The weights' trailing extent differs from `input_dim`
    /// - `ModelError::ConfigurationError` - Row count or free term length differ from `number_of_elements`
    pub fn check_input(&self, input_dim: usize, name: &str) -> Result<(), ModelError> {
        let weights = self.weights.as_ref().ok_or_else(|| {
            ModelError::ProcessingError(format!("{} weights have not been initialized", name))
        })?;
        if weights.ncols() != input_dim {
            return Err(ModelError::ShapeMismatch(format!(
                "{} weights expect {} input features but the input has {}",
                name,
                weights.ncols(),
                input_dim
            )));
        }
        if weights.nrows() != self.number_of_elements {
            return Err(ModelError::ConfigurationError(format!(
                "{} weights must have {} rows, got {}",
                name,
                self.number_of_elements,
                weights.nrows()
            )));
        }
        if let Some(free_term) = &self.free_term {
            if free_term.len() != self.number_of_elements {
                return Err(ModelError::ConfigurationError(format!(
                    "{} free term must have length {}, got {}",
                    name,
                    self.number_of_elements,
                    free_term.len()
                )));
            }
        }
        Ok(())
    }

    /// Projects a batch of rows.
    ///
    /// # Parameters
    ///
    /// - `x` - Input rows with shape (batch, input_dim)
    ///
    /// # Returns
    ///
    /// - `Ok(Array2<f32>)` - Projection with shape (batch, number_of_elements)
    /// - `Err(ModelError::ProcessingError)` - No weights exist yet
    /// - `Err(ModelError::ShapeMismatch)` - `x` does not have as many columns as the weights
    /// - `Err(ModelError::ConfigurationError)` - The free term length differs from the weights' row count
    pub fn project(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, ModelError> {
        let weights = self.weights.as_ref().ok_or_else(|| {
            ModelError::ProcessingError("weights have not been initialized".to_string())
        })?;
        if x.ncols() != weights.ncols() {
            return Err(ModelError::ShapeMismatch(format!(
                "weights expect {} input features but the input has {}",
                weights.ncols(),
                x.ncols()
            )));
        }
        let mut y = x.dot(&weights.t());
        if let Some(free_term) = &self.free_term {
            if free_term.len() != weights.nrows() {
                return Err(ModelError::ConfigurationError(format!(
                    "free term must have length {}, got {}",
                    weights.nrows(),
                    free_term.len()
                )));
            }
            y += &free_term.view();
        }
        Ok(y)
    }

    /// Number of scalars held by weights and free term
    pub fn param_count(&self) -> usize {
        self.weights.as_ref().map_or(0, |w| w.len())
            + self.free_term.as_ref().map_or(0, |b| b.len())
    }
}

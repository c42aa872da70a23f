use crate::core::order_stats::nth_element;
use crate::types::{StackError, StackResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Robust filtering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustFilterParams {
    /// Filter window size (must be odd)
    pub window_size: usize,
    /// Samples below this fraction of the local median count as dropouts
    pub dropout_threshold: f32,
}

impl Default for RobustFilterParams {
    fn default() -> Self {
        Self {
            window_size: 5,          // 5x5 window
            dropout_threshold: 0.1,  // 10% of local median
        }
    }
}

/// Median based filters for dropout correction and mask clean-up
pub struct RobustFilter {
    params: RobustFilterParams,
}

impl RobustFilter {
    /// Create a robust filter with default parameters
    pub fn new() -> Self {
        Self {
            params: RobustFilterParams::default(),
        }
    }

    /// Create a robust filter with custom parameters
    pub fn with_params(params: RobustFilterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RobustFilterParams {
        &self.params
    }

    fn validate(&self, dim: (usize, usize)) -> StackResult<()> {
        if dim.0 == 0 || dim.1 == 0 {
            return Err(StackError::EmptyInput);
        }
        if self.params.window_size == 0 || self.params.window_size % 2 == 0 {
            return Err(StackError::InvalidParameter(format!(
                "Window size must be odd, got {}",
                self.params.window_size
            )));
        }
        if !(0.0..1.0).contains(&self.params.dropout_threshold) {
            return Err(StackError::InvalidParameter(format!(
                "Dropout threshold must be within [0, 1), got {}",
                self.params.dropout_threshold
            )));
        }
        Ok(())
    }

    /// Window median of the finite, positive samples around (i, j)
    fn local_median(&self, image: &Array2<f32>, i: usize, j: usize, buffer: &mut Vec<f32>) -> Option<f32> {
        let (height, width) = image.dim();
        let half_window = self.params.window_size / 2;
        buffer.clear();

        let i_end = (i + half_window + 1).min(height);
        let j_end = (j + half_window + 1).min(width);
        for ii in i.saturating_sub(half_window)..i_end {
            for jj in j.saturating_sub(half_window)..j_end {
                let value = image[[ii, jj]];
                if value.is_finite() && value > 0.0 {
                    buffer.push(value);
                }
            }
        }

        if buffer.is_empty() {
            return None;
        }
        let middle = buffer.len() / 2;
        nth_element(buffer, middle).ok()
    }

    /// Median filter over finite positive samples; pixels without valid
    /// neighbours keep their value
    pub fn median_filter(&self, image: &Array2<f32>) -> StackResult<Array2<f32>> {
        self.validate(image.dim())?;
        log::debug!("Applying {}x{} median filter", self.params.window_size, self.params.window_size);

        let (height, width) = image.dim();
        let values = map_rows(height, width, |i, j, buffer| {
            self.local_median(image, i, j, buffer).unwrap_or(image[[i, j]])
        });

        Array2::from_shape_vec((height, width), values)
            .map_err(|e| StackError::Numerical(format!("Failed to assemble filtered image: {}", e)))
    }

    /// Replace dropouts with the local median in place.
    ///
    /// A dropout is a non-finite or non-positive sample, or one below
    /// `dropout_threshold` times the local median. Returns the number of
    /// corrected samples; dropouts with no valid neighbour are left untouched.
    pub fn correct_dropouts(&self, image: &mut Array2<f32>) -> StackResult<usize> {
        self.validate(image.dim())?;

        let (height, width) = image.dim();
        let threshold = self.params.dropout_threshold;
        let source: &Array2<f32> = image;
        let replacements = map_rows(height, width, |i, j, buffer| {
            let value = source[[i, j]];
            let median = self.local_median(source, i, j, buffer)?;
            let is_dropout = !value.is_finite() || value <= 0.0 || value < threshold * median;
            if is_dropout {
                Some(median)
            } else {
                None
            }
        });

        let mut corrected = 0;
        for (value, replacement) in image.iter_mut().zip(replacements) {
            if let Some(median) = replacement {
                *value = median;
                corrected += 1;
            }
        }

        log::info!("Corrected {} dropout samples out of {}", corrected, height * width);
        Ok(corrected)
    }

    /// Majority filter on a boolean mask (window median of 0/1 values).
    /// Border windows with an even sample count resolve ties to `true`.
    pub fn refine_mask(&self, mask: &Array2<bool>) -> StackResult<Array2<bool>> {
        self.validate(mask.dim())?;

        let (height, width) = mask.dim();
        let half_window = self.params.window_size / 2;
        let values = map_rows(height, width, |i, j, _| {
            let mut window: Vec<u8> = Vec::with_capacity(self.params.window_size.pow(2));
            let i_end = (i + half_window + 1).min(height);
            let j_end = (j + half_window + 1).min(width);
            for ii in i.saturating_sub(half_window)..i_end {
                for jj in j.saturating_sub(half_window)..j_end {
                    window.push(mask[[ii, jj]] as u8);
                }
            }
            let middle = window.len() / 2;
            nth_element(&mut window, middle).map(|v| v == 1).unwrap_or(mask[[i, j]])
        });

        let refined = Array2::from_shape_vec((height, width), values)
            .map_err(|e| StackError::Numerical(format!("Failed to assemble refined mask: {}", e)))?;

        let changed = refined.iter().zip(mask.iter()).filter(|(a, b)| a != b).count();
        log::debug!("Mask refinement changed {} pixels", changed);
        Ok(refined)
    }
}

impl Default for RobustFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate `f` for every pixel in row-major order, one scratch buffer per row
#[cfg(feature = "parallel")]
fn map_rows<T, F>(height: usize, width: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize, usize, &mut Vec<f32>) -> T + Sync,
{
    use rayon::prelude::*;

    let rows: Vec<Vec<T>> = (0..height)
        .into_par_iter()
        .map(|i| {
            let mut buffer = Vec::new();
            (0..width).map(|j| f(i, j, &mut buffer)).collect()
        })
        .collect();

    rows.into_iter().flatten().collect()
}

#[cfg(not(feature = "parallel"))]
fn map_rows<T, F>(height: usize, width: usize, f: F) -> Vec<T>
where
    F: Fn(usize, usize, &mut Vec<f32>) -> T,
{
    let mut buffer = Vec::new();
    let mut values = Vec::with_capacity(height * width);
    for i in 0..height {
        for j in 0..width {
            values.push(f(i, j, &mut buffer));
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn create_test_image() -> Array2<f32> {
        Array2::from_shape_fn((12, 10), |(i, j)| 1.0 + 0.01 * (i + j) as f32)
    }

    #[test]
    fn test_median_filter_removes_spike() {
        let mut image = create_test_image();
        image[[6, 5]] = 50.0;

        let filter = RobustFilter::new();
        let filtered = filter.median_filter(&image).unwrap();

        assert_eq!(filtered.dim(), image.dim());
        assert!(filtered[[6, 5]] < 1.5);
        assert_abs_diff_eq!(filtered[[3, 3]], image[[3, 3]], epsilon = 0.05);
    }

    #[test]
    fn test_map_rows_is_row_major() {
        let values = map_rows(4, 3, |i, j, buffer| {
            buffer.push(0.0);
            (i, j)
        });
        let expected: Vec<(usize, usize)> = (0..4).flat_map(|i| (0..3).map(move |j| (i, j))).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_even_window_rejected() {
        let filter = RobustFilter::with_params(RobustFilterParams {
            window_size: 4,
            ..Default::default()
        });
        assert!(matches!(
            filter.median_filter(&create_test_image()),
            Err(StackError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_empty_image_rejected() {
        let image = Array2::<f32>::zeros((0, 5));
        assert_eq!(RobustFilter::new().median_filter(&image), Err(StackError::EmptyInput));
    }

    #[test]
    fn test_correct_dropouts() {
        let mut image = Array2::from_elem((9, 9), 2.0f32);
        image[[1, 1]] = f32::NAN;
        image[[4, 4]] = 0.0;
        image[[7, 2]] = 0.05;
        image[[2, 7]] = 1.5;

        let filter = RobustFilter::new();
        let corrected = filter.correct_dropouts(&mut image).unwrap();

        assert_eq!(corrected, 3);
        assert_eq!(image[[1, 1]], 2.0);
        assert_eq!(image[[4, 4]], 2.0);
        assert_eq!(image[[7, 2]], 2.0);
        // above threshold, kept
        assert_eq!(image[[2, 7]], 1.5);
    }

    #[test]
    fn test_refine_mask() {
        let mut mask = Array2::from_elem((10, 10), false);
        for i in 0..10 {
            for j in 5..10 {
                mask[[i, j]] = true;
            }
        }
        // isolated pixel and a hole
        mask[[2, 1]] = true;
        mask[[6, 8]] = false;

        let filter = RobustFilter::with_params(RobustFilterParams {
            window_size: 3,
            ..Default::default()
        });
        let refined = filter.refine_mask(&mask).unwrap();

        assert!(!refined[[2, 1]]);
        assert!(refined[[6, 8]]);
        assert!(!refined[[5, 2]]);
        assert!(refined[[5, 7]]);
    }
}

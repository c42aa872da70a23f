use crate::types::{StackError, StackResult};

/// Select the n-th smallest element (0-based) of a slice.
///
/// The slice is partially reordered in place: afterwards `data[n]` holds the
/// selected value, no element before it is greater and no element after it
/// is smaller. Average linear time (median-of-three quickselect).
///
/// Values must be totally ordered; a value that does not compare equal to
/// itself (NaN) is rejected with `InvalidParameter`.
pub fn nth_element<T: PartialOrd + Copy>(data: &mut [T], n: usize) -> StackResult<T> {
    if data.is_empty() {
        return Err(StackError::EmptyInput);
    }
    if n >= data.len() {
        return Err(StackError::IndexRange { index: n, len: data.len() });
    }
    if let Some(position) = data.iter().position(|v| v.partial_cmp(v).is_none()) {
        return Err(StackError::InvalidParameter(format!(
            "Unordered value at index {} cannot be ranked",
            position
        )));
    }

    let mut left = 0usize;
    let mut right = data.len() - 1;

    loop {
        if right <= left + 1 {
            if right == left + 1 && data[right] < data[left] {
                data.swap(left, right);
            }
            return Ok(data[n]);
        }

        // median of left, mid, right ends up in left; sentinels at left+1 and right
        let mid = left + (right - left) / 2;
        data.swap(mid, left + 1);
        if data[left] > data[right] {
            data.swap(left, right);
        }
        if data[left + 1] > data[right] {
            data.swap(left + 1, right);
        }
        if data[left] > data[left + 1] {
            data.swap(left, left + 1);
        }

        let mut i = left + 1;
        let mut j = right;
        let pivot = data[left + 1];
        loop {
            i += 1;
            while data[i] < pivot {
                i += 1;
            }
            j -= 1;
            while data[j] > pivot {
                j -= 1;
            }
            if j < i {
                break;
            }
            data.swap(i, j);
        }
        data[left + 1] = data[j];
        data[j] = pivot;

        if j >= n {
            // the sentinel at `left` keeps j > left
            right = j - 1;
        }
        if j <= n {
            left = i;
        }
    }
}

/// Median of a slice of finite values; even-length input averages the two
/// central values. The slice is reordered.
pub fn median(data: &mut [f64]) -> StackResult<f64> {
    let len = data.len();
    if len == 0 {
        return Err(StackError::EmptyInput);
    }
    let upper = nth_element(data, len / 2)?;
    if len % 2 == 1 {
        return Ok(upper);
    }
    // the lower half now sits before len / 2
    let lower = data[..len / 2]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    Ok(0.5 * (lower + upper))
}

/// Nearest-rank percentile (0..=100) of a slice. The slice is reordered.
pub fn percentile(data: &mut [f64], percent: f64) -> StackResult<f64> {
    if data.is_empty() {
        return Err(StackError::EmptyInput);
    }
    if !(0.0..=100.0).contains(&percent) {
        return Err(StackError::InvalidParameter(format!(
            "Percentile must be within [0, 100], got {}",
            percent
        )));
    }
    let rank = ((percent / 100.0) * (data.len() - 1) as f64).round() as usize;
    nth_element(data, rank)
}

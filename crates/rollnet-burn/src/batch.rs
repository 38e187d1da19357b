//! Boolean roll arrays to float tensors.

use burn::prelude::*;
use ndarray::{ArrayView2, ArrayView3, Axis};

fn cell(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// Rows `rows` of a `(samples, lookback, pitches)` phrase array.
pub(crate) fn phrases<B: Backend>(
    x: ArrayView3<'_, bool>,
    rows: &[usize],
    device: &B::Device,
) -> Tensor<B, 3> {
    let (_, lookback, pitches) = x.dim();
    let mut data = Vec::with_capacity(rows.len() * lookback * pitches);
    for &row in rows {
        data.extend(x.index_axis(Axis(0), row).iter().map(|&on| cell(on)));
    }
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([rows.len(), lookback, pitches])
}

/// Rows `rows` of a `(samples, pitches)` label array.
pub(crate) fn labels<B: Backend>(
    y: ArrayView2<'_, bool>,
    rows: &[usize],
    device: &B::Device,
) -> Tensor<B, 2> {
    let pitches = y.ncols();
    let mut data = Vec::with_capacity(rows.len() * pitches);
    for &row in rows {
        data.extend(y.row(row).iter().map(|&on| cell(on)));
    }
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([rows.len(), pitches])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use ndarray::{array, Array3};

    #[test]
    fn test_selected_rows_in_order() {
        let device = NdArrayDevice::default();
        let y = array![[true, false], [false, false], [false, true]];
        let t = labels::<NdArray<f32>>(y.view(), &[2, 0], &device);
        assert_eq!(t.dims(), [2, 2]);
        assert_eq!(t.into_data().to_vec::<f32>().unwrap(), vec![0.0, 1.0, 1.0, 0.0]);

        let x = Array3::from_shape_fn((3, 2, 2), |(s, t, p)| s == 1 && t == p);
        let t = phrases::<NdArray<f32>>(x.view(), &[1], &device);
        assert_eq!(t.dims(), [1, 2, 2]);
        assert_eq!(t.into_data().to_vec::<f32>().unwrap(), vec![1.0, 0.0, 0.0, 1.0]);
    }
}

use crate::{
    fixed::Fixed,
    tensor::{WeightDesc, WeightTensor},
    utils::error::FxnnError,
};

/// Quantize float values into Q6.10, rounding half toward +inf and
/// saturating at the format bounds.
pub fn quantize_slice(values: &[f32]) -> Vec<Fixed> {
    values.iter().map(|&v| Fixed::from_f32(v)).collect()
}

pub fn dequantize_slice(values: &[Fixed]) -> Vec<f32> {
    values.iter().map(|v| v.to_f32()).collect()
}

/// Build a weight tensor from float values already laid out in
/// (Cout, Cin, Kh, Kw) order.
pub fn weight_tensor_from_f32(desc: WeightDesc, values: &[f32]) -> Result<WeightTensor, FxnnError> {
    WeightTensor::from_vec(desc, quantize_slice(values))
}

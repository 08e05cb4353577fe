mod quantize;
pub use quantize::{dequantize_slice, quantize_slice, weight_tensor_from_f32};
mod store;
pub use store::{WeightEntry, WeightStore};

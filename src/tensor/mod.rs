mod desc;
pub use desc::{TensorDesc, WeightDesc};
mod scores;
pub use scores::ClassScores;
mod tensor;
pub use tensor::{Tensor, WeightTensor};

//! fxnn - Fixed-point convolutional inference with weight-stationary tiling
//!
//! Q6.10 activations and weights with a wide exact accumulator, a
//! capacity-tiled convolution engine, and a sequential layer pipeline that
//! ping-pongs two shared activation buffers into a final class-score vector.

mod fixed;

mod layer;

mod model;

mod ops;

mod pipeline;

mod tensor;

mod utils;

mod weights;

pub use fixed::{ACC_FRAC_BITS, Accum, FRAC_BITS, Fixed};
pub use layer::{LayerDescriptor, LayerKind, LayerWeights, WeightId};
pub use model::squeezenet_v10;
pub use ops::avgpool::global_avg_pool;
pub use ops::concat::concat_channels;
pub use ops::conv2d::{
    Activation, Conv2dEngine, Conv2dParams, TilePolicy, Traversal, conv_output_dim,
};
pub use ops::fire::{FireEngine, FireWeights};
pub use ops::maxpool::{PoolRounding, max_pool2d, pool_output_dim};
pub use ops::relu::relu_inplace;
pub use pipeline::{
    BufferRole, LayerRunStats, Pipeline, PipelineConfig, PipelinePhase, print_pipeline_stats,
};
pub use tensor::{ClassScores, Tensor, TensorDesc, WeightDesc, WeightTensor};
pub use utils::error::FxnnError;
pub use weights::{
    WeightEntry, WeightStore, dequantize_slice, quantize_slice, weight_tensor_from_f32,
};

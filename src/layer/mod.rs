mod descriptor;
pub use descriptor::{LayerDescriptor, LayerKind, LayerWeights, WeightId};

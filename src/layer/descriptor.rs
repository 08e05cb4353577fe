use crate::{
    ops::conv2d::{Activation, conv_output_dim},
    ops::maxpool::{PoolRounding, pool_output_dim},
    tensor::{TensorDesc, WeightDesc},
    utils::error::FxnnError,
};

/// Reference into the weight store. The value is the owning layer's index in
/// the pipeline table; resolving it twice yields the same entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WeightId(pub usize);

/// One layer kind with its operator parameters. Square kernels throughout;
/// the dispatcher pattern-matches on this instead of per-operator enable
/// flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Conv {
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        activation: Activation,
    },
    MaxPool {
        kernel: usize,
        stride: usize,
        rounding: PoolRounding,
    },
    Fire {
        squeeze: usize,
        expand: usize,
    },
    AvgPool,
}

/// Weight shapes a layer expects from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerWeights {
    None,
    Conv(WeightDesc),
    Fire {
        squeeze: WeightDesc,
        expand1x1: WeightDesc,
        expand3x3: WeightDesc,
    },
}

/// One entry of the pipeline's static layer table. Immutable once built; the
/// input descriptor of layer i+1 must equal the output descriptor of layer i.
#[derive(Clone, Debug)]
pub struct LayerDescriptor {
    pub label: String,
    pub kind: LayerKind,
    pub input: TensorDesc,
    pub weights: Option<WeightId>,
}

impl LayerDescriptor {
    pub fn new(label: impl Into<String>, kind: LayerKind, input: TensorDesc) -> Self {
        Self {
            label: label.into(),
            kind,
            input,
            weights: None,
        }
    }

    pub fn with_weights(
        label: impl Into<String>,
        kind: LayerKind,
        input: TensorDesc,
        weights: WeightId,
    ) -> Self {
        Self {
            label: label.into(),
            kind,
            input,
            weights: Some(weights),
        }
    }

    /// Output shape this layer produces, or a configuration error when the
    /// operator cannot fit its input.
    pub fn output_desc(&self) -> Result<TensorDesc, FxnnError> {
        self.input.validate(&self.label)?;
        match self.kind {
            LayerKind::Conv {
                out_channels,
                kernel,
                stride,
                padding,
                ..
            } => {
                if out_channels == 0 || kernel == 0 || stride == 0 {
                    return Err(FxnnError::Configuration(format!(
                        "{}: convolution parameters must be at least 1",
                        self.label
                    )));
                }
                let out_h = conv_output_dim(self.input.height, kernel, stride, padding);
                let out_w = conv_output_dim(self.input.width, kernel, stride, padding);
                let (Some(out_h), Some(out_w)) = (out_h, out_w) else {
                    return Err(FxnnError::Configuration(format!(
                        "{}: kernel {kernel}×{kernel} does not fit the padded {}×{} input",
                        self.label, self.input.height, self.input.width
                    )));
                };
                Ok(TensorDesc::new(out_channels, out_h, out_w))
            }
            LayerKind::MaxPool {
                kernel,
                stride,
                rounding,
            } => {
                if kernel == 0 || stride == 0 {
                    return Err(FxnnError::Configuration(format!(
                        "{}: pooling parameters must be at least 1",
                        self.label
                    )));
                }
                let out_h = pool_output_dim(self.input.height, kernel, stride, rounding);
                let out_w = pool_output_dim(self.input.width, kernel, stride, rounding);
                let (Some(out_h), Some(out_w)) = (out_h, out_w) else {
                    return Err(FxnnError::Configuration(format!(
                        "{}: window {kernel}×{kernel} does not fit the {}×{} input",
                        self.label, self.input.height, self.input.width
                    )));
                };
                Ok(TensorDesc::new(self.input.channels, out_h, out_w))
            }
            LayerKind::Fire { squeeze, expand } => {
                if squeeze == 0 || expand == 0 {
                    return Err(FxnnError::Configuration(format!(
                        "{}: fire channel counts must be at least 1",
                        self.label
                    )));
                }
                // concatenated 1×1 and 3×3 branches double the expand width
                Ok(TensorDesc::new(
                    2 * expand,
                    self.input.height,
                    self.input.width,
                ))
            }
            LayerKind::AvgPool => Ok(TensorDesc::new(self.input.channels, 1, 1)),
        }
    }

    /// Weight shapes the store must hold for this layer.
    pub fn weight_shapes(&self) -> LayerWeights {
        match self.kind {
            LayerKind::Conv {
                out_channels,
                kernel,
                ..
            } => LayerWeights::Conv(WeightDesc::conv(out_channels, self.input.channels, kernel)),
            LayerKind::Fire { squeeze, expand } => LayerWeights::Fire {
                squeeze: WeightDesc::conv(squeeze, self.input.channels, 1),
                expand1x1: WeightDesc::conv(expand, squeeze, 1),
                expand3x3: WeightDesc::conv(expand, squeeze, 3),
            },
            LayerKind::MaxPool { .. } | LayerKind::AvgPool => LayerWeights::None,
        }
    }

    /// Total parameter elements of this layer.
    pub fn weight_count(&self) -> usize {
        match self.weight_shapes() {
            LayerWeights::None => 0,
            LayerWeights::Conv(desc) => desc.num_elements(),
            LayerWeights::Fire {
                squeeze,
                expand1x1,
                expand3x3,
            } => squeeze.num_elements() + expand1x1.num_elements() + expand3x3.num_elements(),
        }
    }

    pub fn name(&self) -> String {
        match self.kind {
            LayerKind::Conv { .. } => "Conv2D".to_string(),
            LayerKind::MaxPool { .. } => "MaxPool".to_string(),
            LayerKind::Fire { .. } => "Fire".to_string(),
            LayerKind::AvgPool => "AvgPool".to_string(),
        }
    }

    pub fn config_string(&self) -> Option<String> {
        match self.kind {
            LayerKind::Conv {
                kernel,
                stride,
                padding,
                activation,
                ..
            } => {
                let act = match activation {
                    Activation::Relu => "relu",
                    Activation::Linear => "linear",
                };
                Some(format!(
                    "kernel={kernel}×{kernel}, stride={stride}, padding={padding}, activation={act}"
                ))
            }
            LayerKind::MaxPool {
                kernel,
                stride,
                rounding,
            } => {
                let mode = match rounding {
                    PoolRounding::Floor => "floor",
                    PoolRounding::Ceil => "ceil",
                };
                Some(format!(
                    "kernel={kernel}×{kernel}, stride={stride}, rounding={mode}"
                ))
            }
            LayerKind::Fire { squeeze, expand } => {
                Some(format!("squeeze={squeeze}, expand={expand}+{expand}"))
            }
            LayerKind::AvgPool => None,
        }
    }
}

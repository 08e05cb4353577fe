use crate::{
    layer::{LayerDescriptor, LayerKind, WeightId},
    ops::conv2d::Activation,
    ops::maxpool::PoolRounding,
    tensor::TensorDesc,
    utils::error::FxnnError,
};

/// SqueezeNet v1.0 layer table for a 3-channel input of the given extent.
///
/// Fourteen layers: Conv1 7×7/2/3 into 96 channels, three fire groups
/// separated by 3×3/2 max pools, Conv10 1×1 into the 10 class channels and a
/// terminal global average pool. The max pools round up so the 224×224 chain
/// lands on 112/56/28/14 as exported. Weight ids equal layer indices.
pub fn squeezenet_v10(height: usize, width: usize) -> Result<Vec<LayerDescriptor>, FxnnError> {
    let steps: [(&str, LayerKind); 14] = [
        (
            "conv1",
            LayerKind::Conv {
                out_channels: 96,
                kernel: 7,
                stride: 2,
                padding: 3,
                activation: Activation::Relu,
            },
        ),
        ("maxpool1", max_pool()),
        ("fire2", fire(16, 64)),
        ("fire3", fire(16, 64)),
        ("fire4", fire(32, 128)),
        ("maxpool2", max_pool()),
        ("fire5", fire(32, 128)),
        ("fire6", fire(48, 192)),
        ("fire7", fire(48, 192)),
        ("fire8", fire(64, 256)),
        ("maxpool3", max_pool()),
        ("fire9", fire(64, 256)),
        (
            "conv10",
            LayerKind::Conv {
                out_channels: 10,
                kernel: 1,
                stride: 1,
                padding: 0,
                activation: Activation::Relu,
            },
        ),
        ("avgpool", LayerKind::AvgPool),
    ];

    let mut input = TensorDesc::new(3, height, width);
    let mut table = Vec::with_capacity(steps.len());
    for (index, (label, kind)) in steps.into_iter().enumerate() {
        let desc = match kind {
            LayerKind::Conv { .. } | LayerKind::Fire { .. } => {
                LayerDescriptor::with_weights(label, kind, input, WeightId(index))
            }
            LayerKind::MaxPool { .. } | LayerKind::AvgPool => {
                LayerDescriptor::new(label, kind, input)
            }
        };
        input = desc.output_desc()?;
        table.push(desc);
    }
    Ok(table)
}

fn max_pool() -> LayerKind {
    LayerKind::MaxPool {
        kernel: 3,
        stride: 2,
        rounding: PoolRounding::Ceil,
    }
}

fn fire(squeeze: usize, expand: usize) -> LayerKind {
    LayerKind::Fire { squeeze, expand }
}

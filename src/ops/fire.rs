use std::thread;

use crate::{
    fixed::Fixed,
    ops::concat::concat_channels,
    ops::conv2d::{Activation, Conv2dEngine, Conv2dParams, TilePolicy, Traversal},
    ops::relu::relu_inplace,
    tensor::{TensorDesc, WeightTensor},
    utils::error::FxnnError,
};

/// The three weight sets of one squeeze/expand block, borrowed from the
/// weight store for the duration of the layer.
#[derive(Clone, Copy)]
pub struct FireWeights<'a> {
    pub squeeze: &'a WeightTensor,
    pub expand1x1: &'a WeightTensor,
    pub expand3x3: &'a WeightTensor,
}

const SQUEEZE: Conv2dParams = Conv2dParams {
    stride: (1, 1),
    padding: (0, 0),
    activation: Activation::Relu,
};

// Expand branches run linear; rectification is applied once over the
// concatenated block, acting on disjoint channel ranges exactly as
// per-branch activation would.
const EXPAND_1X1: Conv2dParams = Conv2dParams {
    stride: (1, 1),
    padding: (0, 0),
    activation: Activation::Linear,
};

const EXPAND_3X3: Conv2dParams = Conv2dParams {
    stride: (1, 1),
    padding: (1, 1),
    activation: Activation::Linear,
};

/// Squeeze/expand block composed from the convolution engine: a 1×1 squeeze
/// with fused rectification, then a 1×1 and a 3×3 expand reading the shared
/// squeeze output, concatenated along channels. The expand branches have no
/// mutual ordering dependency and may run on scoped threads; both wait for
/// the squeeze write-back to complete.
pub struct FireEngine {
    conv: Conv2dEngine,
    parallel_expand: bool,
}

impl FireEngine {
    pub fn new(
        capacity: usize,
        tiling: TilePolicy,
        traversal: Traversal,
        parallel_expand: bool,
    ) -> Self {
        Self {
            conv: Conv2dEngine::new(capacity, tiling, traversal),
            parallel_expand,
        }
    }

    /// Runs one fire layer, returning the total weight tiles executed across
    /// the squeeze and expand passes.
    pub fn run(
        &mut self,
        src_desc: &TensorDesc,
        src: &[Fixed],
        weights: &FireWeights<'_>,
        dst_desc: &TensorDesc,
        dst: &mut [Fixed],
    ) -> Result<usize, FxnnError> {
        let squeeze_ch = weights.squeeze.desc.out_channels;
        let expand_ch = weights.expand1x1.desc.out_channels;

        if weights.squeeze.desc.kernel_h != 1 || weights.squeeze.desc.kernel_w != 1 {
            return Err(FxnnError::Configuration(format!(
                "fire squeeze kernel must be 1×1, got {}×{}",
                weights.squeeze.desc.kernel_h, weights.squeeze.desc.kernel_w
            )));
        }
        if weights.expand1x1.desc.kernel_h != 1
            || weights.expand1x1.desc.kernel_w != 1
            || weights.expand3x3.desc.kernel_h != 3
            || weights.expand3x3.desc.kernel_w != 3
        {
            return Err(FxnnError::Configuration(
                "fire expand kernels must be 1×1 and 3×3".to_string(),
            ));
        }
        if weights.expand3x3.desc.out_channels != expand_ch {
            return Err(FxnnError::Configuration(format!(
                "fire expand branches disagree on channels: 1×1 has {}, 3×3 has {}",
                expand_ch, weights.expand3x3.desc.out_channels
            )));
        }
        if weights.expand1x1.desc.in_channels != squeeze_ch
            || weights.expand3x3.desc.in_channels != squeeze_ch
        {
            return Err(FxnnError::Configuration(format!(
                "fire expand weights must read {} squeeze channels",
                squeeze_ch
            )));
        }
        if dst_desc.channels != 2 * expand_ch
            || dst_desc.height != src_desc.height
            || dst_desc.width != src_desc.width
        {
            return Err(FxnnError::Configuration(format!(
                "fire output must be {}×{}×{}, destination is {}×{}×{}",
                2 * expand_ch,
                src_desc.height,
                src_desc.width,
                dst_desc.channels,
                dst_desc.height,
                dst_desc.width
            )));
        }

        // Squeeze must be fully written before either expand branch starts.
        let squeeze_desc = TensorDesc::new(squeeze_ch, src_desc.height, src_desc.width);
        let mut squeeze_out = vec![Fixed::ZERO; squeeze_desc.num_elements()];
        let mut tiles = self.conv.run(
            src_desc,
            src,
            weights.squeeze,
            &SQUEEZE,
            &squeeze_desc,
            &mut squeeze_out,
        )?;

        let branch_desc = TensorDesc::new(expand_ch, src_desc.height, src_desc.width);
        let ((out1, tiles1), (out3, tiles3)) = if self.parallel_expand {
            let capacity = self.conv.capacity();
            let tiling = self.conv.tiling();
            let traversal = self.conv.traversal();
            let (r1, r3) = thread::scope(|s| {
                let h1 = s.spawn(|| {
                    let mut conv = Conv2dEngine::new(capacity, tiling, traversal);
                    expand_branch(
                        &mut conv,
                        &squeeze_desc,
                        &squeeze_out,
                        weights.expand1x1,
                        &EXPAND_1X1,
                        &branch_desc,
                    )
                });
                let h3 = s.spawn(|| {
                    let mut conv = Conv2dEngine::new(capacity, tiling, traversal);
                    expand_branch(
                        &mut conv,
                        &squeeze_desc,
                        &squeeze_out,
                        weights.expand3x3,
                        &EXPAND_3X3,
                        &branch_desc,
                    )
                });
                (h1.join(), h3.join())
            });
            (
                r1.expect("expand 1×1 branch panicked")?,
                r3.expect("expand 3×3 branch panicked")?,
            )
        } else {
            (
                expand_branch(
                    &mut self.conv,
                    &squeeze_desc,
                    &squeeze_out,
                    weights.expand1x1,
                    &EXPAND_1X1,
                    &branch_desc,
                )?,
                expand_branch(
                    &mut self.conv,
                    &squeeze_desc,
                    &squeeze_out,
                    weights.expand3x3,
                    &EXPAND_3X3,
                    &branch_desc,
                )?,
            )
        };
        tiles += tiles1 + tiles3;

        concat_channels(
            &[(&branch_desc, &out1), (&branch_desc, &out3)],
            dst_desc,
            dst,
        )?;
        relu_inplace(dst);

        Ok(tiles)
    }
}

fn expand_branch(
    conv: &mut Conv2dEngine,
    squeeze_desc: &TensorDesc,
    squeeze_out: &[Fixed],
    weights: &WeightTensor,
    params: &Conv2dParams,
    branch_desc: &TensorDesc,
) -> Result<(Vec<Fixed>, usize), FxnnError> {
    let mut out = vec![Fixed::ZERO; branch_desc.num_elements()];
    let tiles = conv.run(squeeze_desc, squeeze_out, weights, params, branch_desc, &mut out)?;
    Ok((out, tiles))
}

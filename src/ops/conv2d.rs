use crate::{
    fixed::{Accum, Fixed},
    tensor::{TensorDesc, WeightTensor},
    utils::error::FxnnError,
};

/// Activation fused into the convolution write-back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
}

/// How output channels are grouped into weight tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TilePolicy {
    /// Consecutive groups sized so one group's weights fit the working-memory
    /// capacity.
    Bounded,
    /// A single group spanning every output channel, ignoring the capacity
    /// bound.
    SinglePass,
}

/// Loop nesting inside one tile. Every accumulator consumes its taps in
/// ascending (ic, kh, kw) order under both nestings, so results are
/// bit-identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Traversal {
    /// Tile channels form the outer loop; one output plane completes before
    /// the next channel starts.
    ChannelMajor,
    /// Output positions form the outer loop; every tile channel is computed
    /// at a position before moving to the next.
    SpatialMajor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conv2dParams {
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub activation: Activation,
}

/// Output extent along one axis: `(input + 2·pad − kernel) / stride + 1`,
/// or None when the padded input cannot hold the kernel.
pub fn conv_output_dim(input: usize, kernel: usize, stride: usize, pad: usize) -> Option<usize> {
    let span = (input + 2 * pad).checked_sub(kernel)?;
    Some(span / stride + 1)
}

#[derive(Clone, Copy)]
struct Geometry {
    in_channels: usize,
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

/// Weight-stationary tiled convolution. Weights for one tile of output
/// channels are staged into a scratch buffer bounded by the working-memory
/// capacity; tiles execute strictly in sequence and reuse the same scratch.
pub struct Conv2dEngine {
    capacity: usize,
    tiling: TilePolicy,
    traversal: Traversal,
    scratch: Vec<Fixed>,
    accum: Vec<Accum>,
}

impl Conv2dEngine {
    pub fn new(capacity: usize, tiling: TilePolicy, traversal: Traversal) -> Self {
        Self {
            capacity,
            tiling,
            traversal,
            scratch: Vec::new(),
            accum: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tiling(&self) -> TilePolicy {
        self.tiling
    }

    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Runs one convolution layer, returning the number of weight tiles
    /// executed. `dst` is untouched unless the whole layer can run.
    pub fn run(
        &mut self,
        src_desc: &TensorDesc,
        src: &[Fixed],
        weights: &WeightTensor,
        params: &Conv2dParams,
        dst_desc: &TensorDesc,
        dst: &mut [Fixed],
    ) -> Result<usize, FxnnError> {
        assert_eq!(src.len(), src_desc.num_elements(), "src slice mismatch");
        assert_eq!(dst.len(), dst_desc.num_elements(), "dst slice mismatch");

        let wdesc = weights.desc;
        if params.stride.0 == 0 || params.stride.1 == 0 {
            return Err(FxnnError::Configuration(
                "convolution stride must be at least 1".to_string(),
            ));
        }
        if wdesc.out_channels == 0 || wdesc.weights_per_output_channel() == 0 {
            return Err(FxnnError::Configuration(format!(
                "weight shape ({},{},{},{}) has a zero dimension",
                wdesc.out_channels, wdesc.in_channels, wdesc.kernel_h, wdesc.kernel_w
            )));
        }
        if wdesc.in_channels != src_desc.channels {
            return Err(FxnnError::Configuration(format!(
                "weights expect {} input channels, tensor has {}",
                wdesc.in_channels, src_desc.channels
            )));
        }
        if wdesc.out_channels != dst_desc.channels {
            return Err(FxnnError::Configuration(format!(
                "weights produce {} output channels, destination has {}",
                wdesc.out_channels, dst_desc.channels
            )));
        }

        let out_h = conv_output_dim(
            src_desc.height,
            wdesc.kernel_h,
            params.stride.0,
            params.padding.0,
        );
        let out_w = conv_output_dim(
            src_desc.width,
            wdesc.kernel_w,
            params.stride.1,
            params.padding.1,
        );
        let (Some(out_h), Some(out_w)) = (out_h, out_w) else {
            return Err(FxnnError::Configuration(format!(
                "kernel {}×{} does not fit the padded {}×{} input",
                wdesc.kernel_h, wdesc.kernel_w, src_desc.height, src_desc.width
            )));
        };
        if out_h != dst_desc.height || out_w != dst_desc.width {
            return Err(FxnnError::Configuration(format!(
                "destination is {}×{}, convolution produces {}×{}",
                dst_desc.height, dst_desc.width, out_h, out_w
            )));
        }

        // Tile size is decided before any accumulator is touched; a channel
        // whose weights cannot be staged fails the whole layer here.
        let wpo = wdesc.weights_per_output_channel();
        let max_tile = match self.tiling {
            TilePolicy::Bounded => {
                let max_tile = self.capacity / wpo;
                if max_tile == 0 {
                    return Err(FxnnError::Capacity {
                        required: wpo,
                        capacity: self.capacity,
                    });
                }
                max_tile
            }
            TilePolicy::SinglePass => wdesc.out_channels,
        };

        let geom = Geometry {
            in_channels: src_desc.channels,
            in_h: src_desc.height,
            in_w: src_desc.width,
            out_h,
            out_w,
            kernel: (wdesc.kernel_h, wdesc.kernel_w),
            stride: params.stride,
            padding: params.padding,
        };

        let mut tiles = 0;
        let mut tile_start = 0;
        while tile_start < wdesc.out_channels {
            let tile_len = max_tile.min(wdesc.out_channels - tile_start);

            // Stage this tile's weights: with (Cout, Cin, Kh, Kw) layout the
            // tile is one contiguous slice.
            let lo = tile_start * wpo;
            self.scratch.clear();
            self.scratch
                .extend_from_slice(&weights.data()[lo..lo + tile_len * wpo]);

            self.accum.clear();
            self.accum
                .resize(tile_len * geom.out_h * geom.out_w, Accum::ZERO);

            match self.traversal {
                Traversal::ChannelMajor => {
                    accumulate_channel_major(&geom, src, &self.scratch, tile_len, &mut self.accum)
                }
                Traversal::SpatialMajor => {
                    accumulate_spatial_major(&geom, src, &self.scratch, tile_len, &mut self.accum)
                }
            }

            for t in 0..tile_len {
                for oh in 0..geom.out_h {
                    for ow in 0..geom.out_w {
                        let mut value = self.accum[(t * geom.out_h + oh) * geom.out_w + ow]
                            .to_fixed();
                        if params.activation == Activation::Relu {
                            value = value.relu();
                        }
                        dst[((tile_start + t) * geom.out_h + oh) * geom.out_w + ow] = value;
                    }
                }
            }

            tile_start += tile_len;
            tiles += 1;
        }

        Ok(tiles)
    }
}

/// Accumulate every tap of one output position in ascending (ic, kh, kw)
/// order. Positions whose shifted input coordinate falls outside the tensor
/// contribute exactly zero and are skipped, never read.
#[inline]
fn accumulate_taps(
    geom: &Geometry,
    src: &[Fixed],
    tile_weights: &[Fixed],
    t: usize,
    oh: usize,
    ow: usize,
    acc: &mut Accum,
) {
    for ic in 0..geom.in_channels {
        for kh in 0..geom.kernel.0 {
            for kw in 0..geom.kernel.1 {
                let ih_pos = oh * geom.stride.0 + kh;
                let iw_pos = ow * geom.stride.1 + kw;

                if ih_pos < geom.padding.0 || iw_pos < geom.padding.1 {
                    continue;
                }

                let ih = ih_pos - geom.padding.0;
                let iw = iw_pos - geom.padding.1;

                if ih < geom.in_h && iw < geom.in_w {
                    let in_idx = (ic * geom.in_h + ih) * geom.in_w + iw;
                    let w_idx = ((t * geom.in_channels + ic) * geom.kernel.0 + kh) * geom.kernel.1
                        + kw;
                    acc.mac(src[in_idx], tile_weights[w_idx]);
                }
            }
        }
    }
}

fn accumulate_channel_major(
    geom: &Geometry,
    src: &[Fixed],
    tile_weights: &[Fixed],
    tile_len: usize,
    accum: &mut [Accum],
) {
    for t in 0..tile_len {
        for oh in 0..geom.out_h {
            for ow in 0..geom.out_w {
                accumulate_taps(
                    geom,
                    src,
                    tile_weights,
                    t,
                    oh,
                    ow,
                    &mut accum[(t * geom.out_h + oh) * geom.out_w + ow],
                );
            }
        }
    }
}

fn accumulate_spatial_major(
    geom: &Geometry,
    src: &[Fixed],
    tile_weights: &[Fixed],
    tile_len: usize,
    accum: &mut [Accum],
) {
    for oh in 0..geom.out_h {
        for ow in 0..geom.out_w {
            for t in 0..tile_len {
                accumulate_taps(
                    geom,
                    src,
                    tile_weights,
                    t,
                    oh,
                    ow,
                    &mut accum[(t * geom.out_h + oh) * geom.out_w + ow],
                );
            }
        }
    }
}

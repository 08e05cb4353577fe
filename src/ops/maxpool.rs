use crate::{fixed::Fixed, tensor::TensorDesc, utils::error::FxnnError};

/// Output-size rounding when the window stride does not divide the input
/// evenly. Floor is canonical (consistent with the convolution formula);
/// Ceil keeps the legacy behaviour of some deployments and produces partial
/// windows at the far edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolRounding {
    Floor,
    Ceil,
}

/// Output extent of a K×K/S max pool along one axis. Pooling is never
/// padded, so the kernel must fit the input at least once.
pub fn pool_output_dim(
    input: usize,
    kernel: usize,
    stride: usize,
    rounding: PoolRounding,
) -> Option<usize> {
    let span = input.checked_sub(kernel)?;
    match rounding {
        PoolRounding::Floor => Some(span / stride + 1),
        PoolRounding::Ceil => Some(span.div_ceil(stride) + 1),
    }
}

/// Square max pooling over each channel plane. Window elements past the
/// input edge are excluded from the maximum, never read as zero.
pub fn max_pool2d(
    src_desc: &TensorDesc,
    src: &[Fixed],
    kernel: usize,
    stride: usize,
    rounding: PoolRounding,
    dst_desc: &TensorDesc,
    dst: &mut [Fixed],
) -> Result<(), FxnnError> {
    assert_eq!(src.len(), src_desc.num_elements(), "src slice mismatch");
    assert_eq!(dst.len(), dst_desc.num_elements(), "dst slice mismatch");

    if kernel == 0 || stride == 0 {
        return Err(FxnnError::Configuration(
            "pooling kernel and stride must be at least 1".to_string(),
        ));
    }
    if src_desc.channels != dst_desc.channels {
        return Err(FxnnError::Configuration(format!(
            "pooling preserves {} channels, destination has {}",
            src_desc.channels, dst_desc.channels
        )));
    }

    let out_h = pool_output_dim(src_desc.height, kernel, stride, rounding);
    let out_w = pool_output_dim(src_desc.width, kernel, stride, rounding);
    let (Some(out_h), Some(out_w)) = (out_h, out_w) else {
        return Err(FxnnError::Configuration(format!(
            "pool window {0}×{0} does not fit the {1}×{2} input",
            kernel, src_desc.height, src_desc.width
        )));
    };
    if out_h != dst_desc.height || out_w != dst_desc.width {
        return Err(FxnnError::Configuration(format!(
            "destination is {}×{}, pooling produces {}×{}",
            dst_desc.height, dst_desc.width, out_h, out_w
        )));
    }

    for c in 0..src_desc.channels {
        for oh in 0..out_h {
            for ow in 0..out_w {
                let mut max_val = Fixed::MIN;
                let mut found = false;

                for kh in 0..kernel {
                    for kw in 0..kernel {
                        let ih = oh * stride + kh;
                        let iw = ow * stride + kw;
                        if ih < src_desc.height && iw < src_desc.width {
                            let val = src[src_desc.index(c, ih, iw)];
                            if val > max_val {
                                max_val = val;
                            }
                            found = true;
                        }
                    }
                }

                // a window with no in-bounds element cannot arise for
                // stride <= kernel; keep the write defined regardless
                dst[dst_desc.index(c, oh, ow)] = if found { max_val } else { Fixed::ZERO };
            }
        }
    }

    Ok(())
}

use crate::fixed::Fixed;
use crate::utils::error::FxnnError;

/// Shape of one activation tensor, stored dense row-major in channel/height/
/// width order: a channel's H×W plane is one contiguous block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TensorDesc {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl TensorDesc {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    pub fn num_elements(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn size_in_bytes(&self) -> usize {
        self.num_elements() * std::mem::size_of::<Fixed>()
    }

    /// Elements in one channel plane.
    pub fn plane(&self) -> usize {
        self.height * self.width
    }

    pub fn index(&self, c: usize, h: usize, w: usize) -> usize {
        (c * self.height + h) * self.width + w
    }

    pub fn to_dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    pub fn validate(&self, what: &str) -> Result<(), FxnnError> {
        if self.channels == 0 || self.height == 0 || self.width == 0 {
            return Err(FxnnError::Configuration(format!(
                "{} has a zero dimension: {}×{}×{}",
                what, self.channels, self.height, self.width
            )));
        }
        Ok(())
    }
}

/// Shape of one convolution weight set, stored dense row-major in
/// (Cout, Cin, Kh, Kw) order: all weights of one output channel are one
/// contiguous block, so a tile of consecutive output channels is a single
/// contiguous slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightDesc {
    pub out_channels: usize,
    pub in_channels: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
}

impl WeightDesc {
    pub fn new(out_channels: usize, in_channels: usize, kernel_h: usize, kernel_w: usize) -> Self {
        Self {
            out_channels,
            in_channels,
            kernel_h,
            kernel_w,
        }
    }

    /// Square-kernel helper.
    pub fn conv(out_channels: usize, in_channels: usize, kernel: usize) -> Self {
        Self::new(out_channels, in_channels, kernel, kernel)
    }

    pub fn num_elements(&self) -> usize {
        self.out_channels * self.weights_per_output_channel()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.num_elements() * std::mem::size_of::<Fixed>()
    }

    /// Weight elements belonging to a single output channel.
    pub fn weights_per_output_channel(&self) -> usize {
        self.in_channels * self.kernel_h * self.kernel_w
    }

    pub fn index(&self, oc: usize, ic: usize, kh: usize, kw: usize) -> usize {
        ((oc * self.in_channels + ic) * self.kernel_h + kh) * self.kernel_w + kw
    }
}

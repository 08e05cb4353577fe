use crate::{
    fixed::Fixed,
    tensor::desc::{TensorDesc, WeightDesc},
    utils::error::FxnnError,
};

/// Owned activation storage. The data length always matches the descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tensor {
    pub desc: TensorDesc,
    data: Vec<Fixed>,
}

impl Tensor {
    pub fn zeros(desc: TensorDesc) -> Self {
        Self {
            desc,
            data: vec![Fixed::ZERO; desc.num_elements()],
        }
    }

    pub fn from_vec(desc: TensorDesc, data: Vec<Fixed>) -> Result<Self, FxnnError> {
        if data.len() != desc.num_elements() {
            return Err(FxnnError::Configuration(format!(
                "tensor data length {} does not match {}×{}×{}",
                data.len(),
                desc.channels,
                desc.height,
                desc.width
            )));
        }
        Ok(Self { desc, data })
    }

    pub fn data(&self) -> &[Fixed] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Fixed] {
        &mut self.data
    }

    pub fn get(&self, c: usize, h: usize, w: usize) -> Fixed {
        self.data[self.desc.index(c, h, w)]
    }

    pub fn set(&mut self, c: usize, h: usize, w: usize, value: Fixed) {
        let idx = self.desc.index(c, h, w);
        self.data[idx] = value;
    }
}

/// Owned convolution weights in (Cout, Cin, Kh, Kw) order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightTensor {
    pub desc: WeightDesc,
    data: Vec<Fixed>,
}

impl WeightTensor {
    pub fn constant(desc: WeightDesc, value: Fixed) -> Self {
        Self {
            desc,
            data: vec![value; desc.num_elements()],
        }
    }

    pub fn from_vec(desc: WeightDesc, data: Vec<Fixed>) -> Result<Self, FxnnError> {
        if data.len() != desc.num_elements() {
            return Err(FxnnError::Weights(format!(
                "weight data length {} does not match ({},{},{},{})",
                data.len(),
                desc.out_channels,
                desc.in_channels,
                desc.kernel_h,
                desc.kernel_w
            )));
        }
        Ok(Self { desc, data })
    }

    pub fn data(&self) -> &[Fixed] {
        &self.data
    }

    pub fn get(&self, oc: usize, ic: usize, kh: usize, kw: usize) -> Fixed {
        self.data[self.desc.index(oc, ic, kh, kw)]
    }

    pub fn set(&mut self, oc: usize, ic: usize, kh: usize, kw: usize, value: Fixed) {
        let idx = self.desc.index(oc, ic, kh, kw);
        self.data[idx] = value;
    }
}

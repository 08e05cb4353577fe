use crate::fixed::Fixed;

/// In-place rectification over a whole activation slice. The convolution
/// engine fuses this into its write-back; the standalone form covers outputs
/// assembled from several passes, such as a concatenated fire block.
pub fn relu_inplace(data: &mut [Fixed]) {
    for v in data.iter_mut() {
        *v = v.relu();
    }
}

use crate::{
    fixed::{Accum, Fixed},
    tensor::{ClassScores, TensorDesc},
    utils::error::FxnnError,
};

/// Global average pooling: one value per channel over the full spatial
/// extent. This is the terminal reduction of the pipeline, so it produces a
/// `ClassScores` vector rather than another activation tensor. Sums are
/// carried in the wide accumulator and rounded once by the division.
pub fn global_avg_pool(src_desc: &TensorDesc, src: &[Fixed]) -> Result<ClassScores, FxnnError> {
    assert_eq!(src.len(), src_desc.num_elements(), "src slice mismatch");
    src_desc.validate("average-pool input")?;

    let plane = src_desc.plane();
    let mut scores = Vec::with_capacity(src_desc.channels);
    for c in 0..src_desc.channels {
        let mut sum = Accum::ZERO;
        for &v in &src[c * plane..(c + 1) * plane] {
            sum.add(v);
        }
        scores.push(sum.to_fixed_div(plane));
    }

    Ok(ClassScores::new(scores))
}

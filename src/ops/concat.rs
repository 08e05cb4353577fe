use crate::{fixed::Fixed, tensor::TensorDesc, utils::error::FxnnError};

/// Channel concatenation. Sources are appended in argument order; with the
/// channel-major layout each source occupies one contiguous block of the
/// destination, so the copy degenerates to consecutive block moves.
pub fn concat_channels(
    srcs: &[(&TensorDesc, &[Fixed])],
    dst_desc: &TensorDesc,
    dst: &mut [Fixed],
) -> Result<(), FxnnError> {
    assert_eq!(dst.len(), dst_desc.num_elements(), "dst slice mismatch");

    if srcs.is_empty() {
        return Err(FxnnError::Configuration(
            "concat requires at least one source".to_string(),
        ));
    }

    let mut channel_sum = 0;
    for (desc, data) in srcs {
        assert_eq!(data.len(), desc.num_elements(), "src slice mismatch");
        if desc.height != dst_desc.height || desc.width != dst_desc.width {
            return Err(FxnnError::Configuration(format!(
                "concat source is {}×{}, destination is {}×{}",
                desc.height, desc.width, dst_desc.height, dst_desc.width
            )));
        }
        channel_sum += desc.channels;
    }
    if channel_sum != dst_desc.channels {
        return Err(FxnnError::Configuration(format!(
            "concat sources provide {} channels, destination has {}",
            channel_sum, dst_desc.channels
        )));
    }

    let mut offset = 0;
    for (desc, data) in srcs {
        let block = desc.num_elements();
        dst[offset..offset + block].copy_from_slice(data);
        offset += block;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_occupy_consecutive_channel_blocks() {
        let a_desc = TensorDesc::new(2, 2, 2);
        let b_desc = TensorDesc::new(1, 2, 2);
        let a = vec![Fixed::from_f32(1.0); a_desc.num_elements()];
        let b = vec![Fixed::from_f32(-1.0); b_desc.num_elements()];
        let dst_desc = TensorDesc::new(3, 2, 2);
        let mut dst = vec![Fixed::ZERO; dst_desc.num_elements()];

        concat_channels(&[(&a_desc, &a), (&b_desc, &b)], &dst_desc, &mut dst).unwrap();

        assert!(dst[..8].iter().all(|&v| v == Fixed::from_f32(1.0)));
        assert!(dst[8..].iter().all(|&v| v == Fixed::from_f32(-1.0)));
    }

    #[test]
    fn argument_order_decides_channel_order() {
        let desc = TensorDesc::new(1, 1, 2);
        let lo = vec![Fixed::from_f32(0.25); 2];
        let hi = vec![Fixed::from_f32(0.75); 2];
        let dst_desc = TensorDesc::new(2, 1, 2);
        let mut dst = vec![Fixed::ZERO; 4];

        concat_channels(&[(&desc, &hi), (&desc, &lo)], &dst_desc, &mut dst).unwrap();
        assert_eq!(dst[dst_desc.index(0, 0, 0)], Fixed::from_f32(0.75));
        assert_eq!(dst[dst_desc.index(1, 0, 0)], Fixed::from_f32(0.25));
    }

    #[test]
    fn rejects_spatial_and_channel_mismatches() {
        let a_desc = TensorDesc::new(1, 2, 2);
        let a = vec![Fixed::ZERO; 4];
        let mut dst = vec![Fixed::ZERO; 8];

        // spatial mismatch
        let bad_dst = TensorDesc::new(2, 4, 1);
        let err = concat_channels(&[(&a_desc, &a), (&a_desc, &a)], &bad_dst, &mut dst).unwrap_err();
        assert!(matches!(err, FxnnError::Configuration(_)));

        // channel sum mismatch
        let bad_dst = TensorDesc::new(3, 2, 2);
        let mut bad = vec![Fixed::ZERO; bad_dst.num_elements()];
        let err = concat_channels(&[(&a_desc, &a), (&a_desc, &a)], &bad_dst, &mut bad).unwrap_err();
        assert!(matches!(err, FxnnError::Configuration(_)));

        // no sources
        let err = concat_channels(&[], &a_desc, &mut dst[..4]).unwrap_err();
        assert!(matches!(err, FxnnError::Configuration(_)));
    }
}

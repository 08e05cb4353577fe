use crate::fixed::Fixed;

/// Final class-score vector. A separate owned type rather than a view of the
/// activation buffers: the reduction layer writes here and nowhere else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassScores {
    scores: Vec<Fixed>,
}

impl ClassScores {
    pub fn new(scores: Vec<Fixed>) -> Self {
        Self { scores }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn as_slice(&self) -> &[Fixed] {
        &self.scores
    }

    /// Index of the highest score. Ties resolve to the lowest index.
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for i in 1..self.scores.len() {
            if self.scores[i] > self.scores[best] {
                best = i;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_first_maximum() {
        let scores = ClassScores::new(vec![
            Fixed::from_f32(0.1),
            Fixed::from_f32(0.9),
            Fixed::from_f32(0.9),
            Fixed::from_f32(-0.5),
        ]);
        assert_eq!(scores.argmax(), 1);
    }

    #[test]
    fn argmax_handles_all_negative() {
        let scores = ClassScores::new(vec![
            Fixed::from_f32(-0.4),
            Fixed::from_f32(-0.2),
            Fixed::from_f32(-0.6),
        ]);
        assert_eq!(scores.argmax(), 1);
    }
}

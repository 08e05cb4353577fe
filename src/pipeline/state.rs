use std::fmt;

/// Executor phase, advanced strictly in order. Each layer passes through
/// Begin, Executing and Done before the next layer begins; buffer roles swap
/// only on the Done to Begin edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    LayerBegin(usize),
    LayerExecuting(usize),
    LayerDone(usize),
    Finished,
}

impl PipelinePhase {
    /// Next phase for a table of `layer_count` layers. Finished is absorbing.
    pub fn advance(self, layer_count: usize) -> PipelinePhase {
        match self {
            PipelinePhase::Idle => {
                if layer_count == 0 {
                    PipelinePhase::Finished
                } else {
                    PipelinePhase::LayerBegin(0)
                }
            }
            PipelinePhase::LayerBegin(i) => PipelinePhase::LayerExecuting(i),
            PipelinePhase::LayerExecuting(i) => PipelinePhase::LayerDone(i),
            PipelinePhase::LayerDone(i) => {
                if i + 1 < layer_count {
                    PipelinePhase::LayerBegin(i + 1)
                } else {
                    PipelinePhase::Finished
                }
            }
            PipelinePhase::Finished => PipelinePhase::Finished,
        }
    }

    pub fn is_finished(self) -> bool {
        self == PipelinePhase::Finished
    }
}

/// Backing store that held a layer's input or output during a run. The
/// terminal reduction writes the score vector, never an activation buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferRole {
    A,
    B,
    Scores,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferRole::A => write!(f, "A"),
            BufferRole::B => write!(f, "B"),
            BufferRole::Scores => write!(f, "scores"),
        }
    }
}

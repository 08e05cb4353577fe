use crate::{
    fixed::Fixed,
    layer::{LayerDescriptor, LayerKind},
    ops::{
        avgpool::global_avg_pool,
        conv2d::{Conv2dEngine, Conv2dParams},
        fire::{FireEngine, FireWeights},
        maxpool::max_pool2d,
    },
    pipeline::{
        config::PipelineConfig,
        state::{BufferRole, PipelinePhase},
    },
    tensor::{ClassScores, Tensor, TensorDesc},
    utils::error::FxnnError,
    weights::{WeightEntry, WeightStore},
};

/// Per-layer record of the most recent run.
#[derive(Clone, Debug)]
pub struct LayerRunStats {
    pub index: usize,
    pub label: String,
    pub kind: String,
    pub config: String,
    pub input: TensorDesc,
    pub output: TensorDesc,
    pub input_buffer: BufferRole,
    pub output_buffer: BufferRole,
    pub weight_elements: usize,
    pub tiles: usize,
}

/// Sequential layer executor over two shared activation buffers.
///
/// The descriptor table, weight store and buffer extents are fixed at
/// construction. `run` drives the phase machine across the table; each layer
/// reads one buffer and writes the other, and the roles swap on every
/// done-to-begin edge. The terminal reduction writes the type-distinct score
/// vector, so no layer output is ever reinterpreted in place.
pub struct Pipeline {
    descriptors: Vec<LayerDescriptor>,
    outputs: Vec<TensorDesc>,
    store: WeightStore,
    config: PipelineConfig,
    conv: Conv2dEngine,
    fire: FireEngine,
    buffers: [Vec<Fixed>; 2],
    current: usize,
    phase: PipelinePhase,
    trace: Vec<LayerRunStats>,
    scores: Option<ClassScores>,
}

impl Pipeline {
    /// Validates the table, the store and the configuration, and sizes both
    /// activation buffers to the largest tensor any layer touches.
    pub fn new(
        descriptors: Vec<LayerDescriptor>,
        store: WeightStore,
        config: PipelineConfig,
    ) -> Result<Self, FxnnError> {
        let config = config.build()?;
        if descriptors.is_empty() {
            return Err(FxnnError::Configuration(
                "pipeline needs at least one layer".to_string(),
            ));
        }

        let mut outputs = Vec::with_capacity(descriptors.len());
        let mut max_elements = descriptors[0].input.num_elements();
        for (i, desc) in descriptors.iter().enumerate() {
            let output = desc.output_desc()?;
            let terminal = i + 1 == descriptors.len();

            if matches!(desc.kind, LayerKind::AvgPool) != terminal {
                return Err(FxnnError::Configuration(if terminal {
                    "pipeline must end in the global average reduction".to_string()
                } else {
                    format!(
                        "{}: global average pool must be the terminal layer",
                        desc.label
                    )
                }));
            }

            if !terminal {
                let next = &descriptors[i + 1];
                if output != next.input {
                    return Err(FxnnError::Configuration(format!(
                        "{} produces {}×{}×{} but {} expects {}×{}×{}",
                        desc.label,
                        output.channels,
                        output.height,
                        output.width,
                        next.label,
                        next.input.channels,
                        next.input.height,
                        next.input.width
                    )));
                }
                max_elements = max_elements.max(output.num_elements());
            }
            outputs.push(output);
        }

        store.validate(&descriptors)?;

        let conv = Conv2dEngine::new(config.weight_capacity, config.tiling, config.traversal);
        let fire = FireEngine::new(
            config.weight_capacity,
            config.tiling,
            config.traversal,
            config.parallel_expand,
        );

        Ok(Self {
            descriptors,
            outputs,
            store,
            config,
            conv,
            fire,
            buffers: [
                vec![Fixed::ZERO; max_elements],
                vec![Fixed::ZERO; max_elements],
            ],
            current: 0,
            phase: PipelinePhase::Idle,
            trace: Vec::new(),
            scores: None,
        })
    }

    pub fn descriptors(&self) -> &[LayerDescriptor] {
        &self.descriptors
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Trace of the most recent run, empty before the first.
    pub fn trace(&self) -> &[LayerRunStats] {
        &self.trace
    }

    /// Scores of the last completed run; a failed run leaves none.
    pub fn scores(&self) -> Option<&ClassScores> {
        self.scores.as_ref()
    }

    pub fn input_desc(&self) -> TensorDesc {
        self.descriptors[0].input
    }

    /// Elements held by each of the two activation buffers.
    pub fn buffer_elements(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn total_weight_elements(&self) -> usize {
        self.store.total_elements()
    }

    /// Runs the whole table over `input` and returns the class scores. Any
    /// layer failure aborts immediately, leaving no readable scores.
    pub fn run(&mut self, input: &Tensor) -> Result<ClassScores, FxnnError> {
        self.trace.clear();
        self.scores = None;
        self.current = 0;
        self.phase = PipelinePhase::Idle;

        if input.desc != self.descriptors[0].input {
            return Err(FxnnError::Configuration(format!(
                "input is {}×{}×{}, pipeline expects {}×{}×{}",
                input.desc.channels,
                input.desc.height,
                input.desc.width,
                self.descriptors[0].input.channels,
                self.descriptors[0].input.height,
                self.descriptors[0].input.width
            )));
        }

        let layer_count = self.descriptors.len();
        self.buffers[0][..input.desc.num_elements()].copy_from_slice(input.data());
        self.phase = self.phase.advance(layer_count);

        for index in 0..layer_count {
            debug_assert_eq!(self.phase, PipelinePhase::LayerBegin(index));
            self.phase = self.phase.advance(layer_count);

            let desc = &self.descriptors[index];
            let output = self.outputs[index];
            let (in_role, mut out_role) = if self.current == 0 {
                (BufferRole::A, BufferRole::B)
            } else {
                (BufferRole::B, BufferRole::A)
            };

            let [buf_a, buf_b] = &mut self.buffers;
            let (src_all, dst_all) = if self.current == 0 {
                (&buf_a[..], &mut buf_b[..])
            } else {
                (&buf_b[..], &mut buf_a[..])
            };
            let src = &src_all[..desc.input.num_elements()];

            let mut tiles = 0;
            match desc.kind {
                LayerKind::Conv {
                    stride,
                    padding,
                    activation,
                    ..
                } => {
                    let weights = resolve_conv(&self.store, desc)?;
                    let params = Conv2dParams {
                        stride: (stride, stride),
                        padding: (padding, padding),
                        activation,
                    };
                    let dst = &mut dst_all[..output.num_elements()];
                    tiles = self
                        .conv
                        .run(&desc.input, src, weights, &params, &output, dst)?;
                }
                LayerKind::MaxPool {
                    kernel,
                    stride,
                    rounding,
                } => {
                    let dst = &mut dst_all[..output.num_elements()];
                    max_pool2d(&desc.input, src, kernel, stride, rounding, &output, dst)?;
                }
                LayerKind::Fire { .. } => {
                    let weights = resolve_fire(&self.store, desc)?;
                    let dst = &mut dst_all[..output.num_elements()];
                    tiles = self.fire.run(&desc.input, src, &weights, &output, dst)?;
                }
                LayerKind::AvgPool => {
                    self.scores = Some(global_avg_pool(&desc.input, src)?);
                    out_role = BufferRole::Scores;
                }
            }

            self.trace.push(LayerRunStats {
                index,
                label: desc.label.clone(),
                kind: desc.name(),
                config: desc.config_string().unwrap_or_default(),
                input: desc.input,
                output,
                input_buffer: in_role,
                output_buffer: out_role,
                weight_elements: desc.weight_count(),
                tiles,
            });

            self.phase = self.phase.advance(layer_count);
            self.phase = self.phase.advance(layer_count);
            if !self.phase.is_finished() {
                // roles swap on the done-to-begin edge
                self.current = 1 - self.current;
            }
        }

        self.scores.clone().ok_or_else(|| {
            FxnnError::Configuration("pipeline finished without writing scores".to_string())
        })
    }
}

fn resolve_conv<'a>(
    store: &'a WeightStore,
    desc: &LayerDescriptor,
) -> Result<&'a crate::tensor::WeightTensor, FxnnError> {
    let id = desc.weights.ok_or_else(|| {
        FxnnError::Weights(format!("{}: layer has no weight reference", desc.label))
    })?;
    match store.resolve(id)? {
        WeightEntry::Conv(weights) => Ok(weights),
        WeightEntry::Fire { .. } => Err(FxnnError::Weights(format!(
            "{}: expected convolution weights",
            desc.label
        ))),
    }
}

fn resolve_fire<'a>(
    store: &'a WeightStore,
    desc: &LayerDescriptor,
) -> Result<FireWeights<'a>, FxnnError> {
    let id = desc.weights.ok_or_else(|| {
        FxnnError::Weights(format!("{}: layer has no weight reference", desc.label))
    })?;
    match store.resolve(id)? {
        WeightEntry::Fire {
            squeeze,
            expand1x1,
            expand3x3,
        } => Ok(FireWeights {
            squeeze,
            expand1x1,
            expand3x3,
        }),
        WeightEntry::Conv(_) => Err(FxnnError::Weights(format!(
            "{}: expected fire weights",
            desc.label
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layer::WeightId,
        model::squeezenet_v10,
        ops::conv2d::{Activation, TilePolicy},
        tensor::WeightTensor,
    };

    fn conv_layer(
        label: &str,
        input: TensorDesc,
        out_channels: usize,
        kernel: usize,
        id: usize,
    ) -> LayerDescriptor {
        LayerDescriptor::with_weights(
            label,
            LayerKind::Conv {
                out_channels,
                kernel,
                stride: 1,
                padding: 0,
                activation: Activation::Linear,
            },
            input,
            WeightId(id),
        )
    }

    fn tiny_table() -> Vec<LayerDescriptor> {
        vec![
            conv_layer("conv1", TensorDesc::new(1, 2, 2), 2, 1, 0),
            LayerDescriptor::new("avgpool", LayerKind::AvgPool, TensorDesc::new(2, 2, 2)),
        ]
    }

    #[test]
    fn two_layer_run_produces_scores() {
        let table = tiny_table();
        let store = WeightStore::constant_for(&table, Fixed::from_f32(0.5)).unwrap();
        let mut pipeline =
            Pipeline::new(table, store, PipelineConfig::default()).unwrap();

        let input = Tensor::from_vec(
            TensorDesc::new(1, 2, 2),
            vec![
                Fixed::from_f32(1.0),
                Fixed::from_f32(0.5),
                Fixed::from_f32(-0.5),
                Fixed::from_f32(0.0),
            ],
        )
        .unwrap();

        let scores = pipeline.run(&input).unwrap();
        assert_eq!(scores.len(), 2);
        // each channel averages 0.5 × (1.0 + 0.5 − 0.5 + 0.0) / 4
        assert_eq!(scores.as_slice(), &[Fixed::from_f32(0.125); 2]);
        assert!(pipeline.phase().is_finished());

        let trace = pipeline.trace();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].input_buffer, BufferRole::A);
        assert_eq!(trace[0].output_buffer, BufferRole::B);
        assert_eq!(trace[1].input_buffer, BufferRole::B);
        assert_eq!(trace[1].output_buffer, BufferRole::Scores);
        assert_eq!(trace[0].output, trace[1].input);
        assert_eq!(trace[0].tiles, 1);
    }

    #[test]
    fn misplaced_avgpool_is_rejected() {
        let early = vec![
            LayerDescriptor::new("avgpool", LayerKind::AvgPool, TensorDesc::new(2, 2, 2)),
            conv_layer("conv1", TensorDesc::new(2, 1, 1), 2, 1, 1),
        ];
        let store = WeightStore::empty(2);
        assert!(matches!(
            Pipeline::new(early, store, PipelineConfig::default()),
            Err(FxnnError::Configuration(_))
        ));

        let no_reduce = vec![conv_layer("conv1", TensorDesc::new(1, 2, 2), 2, 1, 0)];
        let store = WeightStore::empty(1);
        assert!(matches!(
            Pipeline::new(no_reduce, store, PipelineConfig::default()),
            Err(FxnnError::Configuration(_))
        ));
    }

    #[test]
    fn broken_descriptor_chain_is_rejected() {
        let table = vec![
            conv_layer("conv1", TensorDesc::new(1, 4, 4), 2, 1, 0),
            // expects 3 channels where conv1 produces 2
            LayerDescriptor::new("avgpool", LayerKind::AvgPool, TensorDesc::new(3, 4, 4)),
        ];
        let store = WeightStore::empty(2);
        assert!(matches!(
            Pipeline::new(table, store, PipelineConfig::default()),
            Err(FxnnError::Configuration(_))
        ));
    }

    #[test]
    fn missing_weights_fail_construction() {
        let table = tiny_table();
        let store = WeightStore::empty(table.len());
        assert!(matches!(
            Pipeline::new(table, store, PipelineConfig::default()),
            Err(FxnnError::Weights(_))
        ));
    }

    #[test]
    fn wrong_input_shape_is_rejected() {
        let table = tiny_table();
        let store = WeightStore::constant_for(&table, Fixed::ONE).unwrap();
        let mut pipeline =
            Pipeline::new(table, store, PipelineConfig::default()).unwrap();
        let input = Tensor::zeros(TensorDesc::new(1, 3, 3));
        assert!(matches!(
            pipeline.run(&input),
            Err(FxnnError::Configuration(_))
        ));
        assert!(pipeline.scores().is_none());
    }

    #[test]
    fn capacity_failure_aborts_without_scores() {
        let table = vec![
            conv_layer("conv1", TensorDesc::new(2, 4, 4), 2, 3, 0),
            LayerDescriptor::new("avgpool", LayerKind::AvgPool, TensorDesc::new(2, 2, 2)),
        ];
        let store = WeightStore::constant_for(&table, Fixed::ONE).unwrap();
        let config = PipelineConfig {
            weight_capacity: 10,
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(table, store, config).unwrap();

        let err = pipeline.run(&Tensor::zeros(TensorDesc::new(2, 4, 4))).unwrap_err();
        assert!(matches!(
            err,
            FxnnError::Capacity {
                required: 18,
                capacity: 10
            }
        ));
        assert!(pipeline.scores().is_none());
        assert!(!pipeline.phase().is_finished());
        assert!(pipeline.trace().is_empty());
    }

    #[test]
    fn buffers_cover_the_widest_layer() {
        let table = tiny_table();
        let store = WeightStore::constant_for(&table, Fixed::ONE).unwrap();
        let pipeline = Pipeline::new(table, store, PipelineConfig::default()).unwrap();
        // conv output 2×2×2 = 8 elements is the widest tensor in the chain
        assert_eq!(pipeline.buffer_elements(), 8);
        assert_eq!(pipeline.input_desc(), TensorDesc::new(1, 2, 2));
        assert_eq!(pipeline.total_weight_elements(), 2);
    }

    // ---- full-network checks against a raw-integer reference ----

    fn narrow(acc: i64) -> i16 {
        ((acc + 512) >> 10).clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    fn ref_conv(
        src: &[i16],
        h: usize,
        w: usize,
        weights: &WeightTensor,
        stride: usize,
        pad: usize,
        relu: bool,
    ) -> (Vec<i16>, usize, usize) {
        let wd = weights.desc;
        let oh = (h + 2 * pad - wd.kernel_h) / stride + 1;
        let ow = (w + 2 * pad - wd.kernel_w) / stride + 1;
        let mut out = vec![0i16; wd.out_channels * oh * ow];
        for oc in 0..wd.out_channels {
            for y in 0..oh {
                for x in 0..ow {
                    let mut acc = 0i64;
                    for ic in 0..wd.in_channels {
                        for kh in 0..wd.kernel_h {
                            for kw in 0..wd.kernel_w {
                                let iy = (y * stride + kh) as i64 - pad as i64;
                                let ix = (x * stride + kw) as i64 - pad as i64;
                                if iy >= 0 && ix >= 0 && (iy as usize) < h && (ix as usize) < w {
                                    let s = src[(ic * h + iy as usize) * w + ix as usize];
                                    let wt = weights.get(oc, ic, kh, kw).raw();
                                    acc += s as i64 * wt as i64;
                                }
                            }
                        }
                    }
                    let mut v = narrow(acc);
                    if relu && v < 0 {
                        v = 0;
                    }
                    out[(oc * oh + y) * ow + x] = v;
                }
            }
        }
        (out, oh, ow)
    }

    fn ref_maxpool_ceil(
        src: &[i16],
        c: usize,
        h: usize,
        w: usize,
        kernel: usize,
        stride: usize,
    ) -> (Vec<i16>, usize, usize) {
        let oh = (h - kernel).div_ceil(stride) + 1;
        let ow = (w - kernel).div_ceil(stride) + 1;
        let mut out = vec![0i16; c * oh * ow];
        for ch in 0..c {
            for y in 0..oh {
                for x in 0..ow {
                    let mut best = i16::MIN;
                    for kh in 0..kernel {
                        for kw in 0..kernel {
                            let iy = y * stride + kh;
                            let ix = x * stride + kw;
                            if iy < h && ix < w {
                                best = best.max(src[(ch * h + iy) * w + ix]);
                            }
                        }
                    }
                    out[(ch * oh + y) * ow + x] = best;
                }
            }
        }
        (out, oh, ow)
    }

    fn ref_fire(
        src: &[i16],
        h: usize,
        w: usize,
        squeeze: &WeightTensor,
        expand1x1: &WeightTensor,
        expand3x3: &WeightTensor,
    ) -> Vec<i16> {
        let (s, _, _) = ref_conv(src, h, w, squeeze, 1, 0, true);
        let (mut out, _, _) = ref_conv(&s, h, w, expand1x1, 1, 0, false);
        let (tail, _, _) = ref_conv(&s, h, w, expand3x3, 1, 1, false);
        out.extend(tail);
        for v in &mut out {
            if *v < 0 {
                *v = 0;
            }
        }
        out
    }

    fn ref_avgpool(src: &[i16], c: usize, h: usize, w: usize) -> Vec<i16> {
        let n = (h * w) as i64;
        (0..c)
            .map(|ch| {
                let sum: i64 = src[ch * h * w..(ch + 1) * h * w]
                    .iter()
                    .map(|&v| v as i64)
                    .sum();
                let num = (sum << 10) + (n << 9);
                num.div_euclid(n << 10)
                    .clamp(i16::MIN as i64, i16::MAX as i64) as i16
            })
            .collect()
    }

    #[test]
    fn full_network_matches_the_reference() {
        let table = squeezenet_v10(32, 32).unwrap();
        let store = WeightStore::random_for(&table, 2024).unwrap();

        let input_desc = table[0].input;
        let input_raw: Vec<i16> = (0..input_desc.num_elements())
            .map(|i| ((i as i64 * 73 + 19) % 2048 - 1024) as i16)
            .collect();
        let input = Tensor::from_vec(
            input_desc,
            input_raw.iter().map(|&r| Fixed::from_raw(r)).collect(),
        )
        .unwrap();

        // walk the table in the raw integer domain
        let mut cur = input_raw;
        let (mut c, mut h, mut w) = (3usize, 32usize, 32usize);
        let mut expected = Vec::new();
        for desc in &table {
            match desc.kind {
                LayerKind::Conv {
                    out_channels,
                    stride,
                    padding,
                    activation,
                    ..
                } => {
                    let entry = store.resolve(desc.weights.unwrap()).unwrap();
                    let WeightEntry::Conv(wt) = entry else {
                        panic!("conv layer must hold conv weights");
                    };
                    let relu = activation == Activation::Relu;
                    let (out, oh, ow) = ref_conv(&cur, h, w, wt, stride, padding, relu);
                    cur = out;
                    c = out_channels;
                    h = oh;
                    w = ow;
                }
                LayerKind::MaxPool { kernel, stride, .. } => {
                    let (out, oh, ow) = ref_maxpool_ceil(&cur, c, h, w, kernel, stride);
                    cur = out;
                    h = oh;
                    w = ow;
                }
                LayerKind::Fire { expand, .. } => {
                    let entry = store.resolve(desc.weights.unwrap()).unwrap();
                    let WeightEntry::Fire {
                        squeeze,
                        expand1x1,
                        expand3x3,
                    } = entry
                    else {
                        panic!("fire layer must hold fire weights");
                    };
                    cur = ref_fire(&cur, h, w, squeeze, expand1x1, expand3x3);
                    c = 2 * expand;
                }
                LayerKind::AvgPool => {
                    expected = ref_avgpool(&cur, c, h, w);
                }
            }
        }
        assert_eq!(expected.len(), 10);

        let mut pipeline = Pipeline::new(
            table.clone(),
            store.clone(),
            PipelineConfig::default(),
        )
        .unwrap();
        let scores = pipeline.run(&input).unwrap();
        let raws: Vec<i16> = scores.as_slice().iter().map(|v| v.raw()).collect();
        assert_eq!(raws, expected);

        // scoped-thread expand branches must not change a single bit
        let sequential = PipelineConfig {
            parallel_expand: false,
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(table.clone(), store.clone(), sequential).unwrap();
        assert_eq!(pipeline.run(&input).unwrap(), scores);

        // neither may the tiling decomposition
        let single_pass = PipelineConfig {
            tiling: TilePolicy::SinglePass,
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(table, store, single_pass).unwrap();
        assert_eq!(pipeline.run(&input).unwrap(), scores);
    }

    #[test]
    fn ping_pong_roles_alternate_through_the_reference_net() {
        let table = squeezenet_v10(32, 32).unwrap();
        let store = WeightStore::constant_for(&table, Fixed::from_f32(0.01)).unwrap();
        let mut pipeline = Pipeline::new(table, store, PipelineConfig::default()).unwrap();
        let input = Tensor::zeros(pipeline.input_desc());
        pipeline.run(&input).unwrap();
        assert!(pipeline.phase().is_finished());

        let trace = pipeline.trace();
        assert_eq!(trace.len(), 14);
        for (i, s) in trace.iter().enumerate() {
            let expect_in = if i % 2 == 0 { BufferRole::A } else { BufferRole::B };
            assert_eq!(s.input_buffer, expect_in, "layer {i}");
            if i + 1 < trace.len() {
                let expect_out = if i % 2 == 0 { BufferRole::B } else { BufferRole::A };
                assert_eq!(s.output_buffer, expect_out, "layer {i}");
                assert_eq!(s.output, trace[i + 1].input, "layer {i}");
            } else {
                assert_eq!(s.output_buffer, BufferRole::Scores);
            }
            // weighted layers tile at least once under the default capacity
            assert_eq!(s.weight_elements > 0, s.tiles > 0, "layer {i}");
        }
    }

    #[test]
    fn capacity_shortfall_surfaces_from_the_first_conv() {
        let table = squeezenet_v10(32, 32).unwrap();
        let store = WeightStore::constant_for(&table, Fixed::ONE).unwrap();
        let config = PipelineConfig {
            weight_capacity: 100,
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(table, store, config).unwrap();

        let input = Tensor::zeros(pipeline.input_desc());
        let err = pipeline.run(&input).unwrap_err();
        // conv1 needs 3·7·7 elements for a single output channel
        assert!(matches!(
            err,
            FxnnError::Capacity {
                required: 147,
                capacity: 100
            }
        ));
        assert!(pipeline.scores().is_none());
        assert!(pipeline.trace().is_empty());
    }
}

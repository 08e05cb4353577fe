use std::fs;
use std::path::{Path, PathBuf};

use rand::{
    SeedableRng,
    distr::{Distribution, Uniform},
    rngs::StdRng,
};

use crate::{
    fixed::Fixed,
    layer::{LayerDescriptor, LayerWeights, WeightId},
    tensor::{WeightDesc, WeightTensor},
    utils::error::FxnnError,
};

/// Parameters of one layer. Fire layers carry their three branch tensors as
/// one entry so a single resolve covers the whole module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WeightEntry {
    Conv(WeightTensor),
    Fire {
        squeeze: WeightTensor,
        expand1x1: WeightTensor,
        expand3x3: WeightTensor,
    },
}

impl WeightEntry {
    pub fn num_elements(&self) -> usize {
        match self {
            WeightEntry::Conv(t) => t.desc.num_elements(),
            WeightEntry::Fire {
                squeeze,
                expand1x1,
                expand3x3,
            } => {
                squeeze.desc.num_elements()
                    + expand1x1.desc.num_elements()
                    + expand3x3.desc.num_elements()
            }
        }
    }

    fn matches(&self, expected: &LayerWeights) -> bool {
        match (self, expected) {
            (WeightEntry::Conv(t), LayerWeights::Conv(d)) => t.desc == *d,
            (
                WeightEntry::Fire {
                    squeeze,
                    expand1x1,
                    expand3x3,
                },
                LayerWeights::Fire {
                    squeeze: sd,
                    expand1x1: e1d,
                    expand3x3: e3d,
                },
            ) => squeeze.desc == *sd && expand1x1.desc == *e1d && expand3x3.desc == *e3d,
            _ => false,
        }
    }
}

/// One optional weight entry per layer index. Populated once at build time,
/// read-only afterwards; `resolve` never reloads or mutates, so repeated
/// resolution of the same id yields the identical entry.
#[derive(Clone, Debug)]
pub struct WeightStore {
    entries: Vec<Option<WeightEntry>>,
}

impl WeightStore {
    pub fn empty(layer_count: usize) -> Self {
        Self {
            entries: vec![None; layer_count],
        }
    }

    pub fn layer_count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: WeightId) -> bool {
        matches!(self.entries.get(id.0), Some(Some(_)))
    }

    /// Total parameter elements held across all entries.
    pub fn total_elements(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .map(WeightEntry::num_elements)
            .sum()
    }

    pub fn insert(&mut self, id: WeightId, entry: WeightEntry) -> Result<(), FxnnError> {
        let slot = self.entries.get_mut(id.0).ok_or_else(|| {
            FxnnError::Weights(format!("weight id {} is outside the layer table", id.0))
        })?;
        if slot.is_some() {
            return Err(FxnnError::Weights(format!(
                "weight id {} is already populated",
                id.0
            )));
        }
        *slot = Some(entry);
        Ok(())
    }

    pub fn resolve(&self, id: WeightId) -> Result<&WeightEntry, FxnnError> {
        self.entries
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| FxnnError::Weights(format!("weight id {} is not populated", id.0)))
    }

    /// Every descriptor that references weights must have an entry of the
    /// expected shapes.
    pub fn validate(&self, descriptors: &[LayerDescriptor]) -> Result<(), FxnnError> {
        for desc in descriptors {
            let Some(id) = desc.weights else { continue };
            let entry = self.resolve(id).map_err(|_| {
                FxnnError::Weights(format!("{}: no weights under id {}", desc.label, id.0))
            })?;
            if !entry.matches(&desc.weight_shapes()) {
                return Err(FxnnError::Weights(format!(
                    "{}: stored weight shapes do not match the layer",
                    desc.label
                )));
            }
        }
        Ok(())
    }

    /// Store with every referenced entry filled by a single constant.
    pub fn constant_for(descriptors: &[LayerDescriptor], value: Fixed) -> Result<Self, FxnnError> {
        Self::build_for(descriptors, |_, desc| {
            Ok(WeightTensor::constant(desc, value))
        })
    }

    /// Store with every referenced entry drawn uniformly from
    /// ±1/sqrt(fan_in), quantized. The same seed yields the same store.
    pub fn random_for(descriptors: &[LayerDescriptor], seed: u64) -> Result<Self, FxnnError> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::build_for(descriptors, |label, desc| {
            let limit = 1.0 / (desc.weights_per_output_channel() as f32).sqrt();
            let dist = Uniform::new(-limit, limit)
                .map_err(|e| FxnnError::Weights(format!("{label}: {e}")))?;
            let data = (0..desc.num_elements())
                .map(|_| Fixed::from_f32(dist.sample(&mut rng)))
                .collect();
            WeightTensor::from_vec(desc, data)
        })
    }

    /// Store read from one raw file per conv layer and three per fire layer,
    /// named after the layer label (`conv1_weights_flat.bin`,
    /// `fire2_squeeze_weights_flat.bin`, …). Files hold little-endian i16
    /// Q6.10 in flat (Kh, Kw, Cin, Cout) export order; loading permutes into
    /// the engine's (Cout, Cin, Kh, Kw) order.
    pub fn load_dir(descriptors: &[LayerDescriptor], dir: &Path) -> Result<Self, FxnnError> {
        let mut store = Self::empty(descriptors.len());
        for desc in descriptors {
            let Some(id) = desc.weights else { continue };
            let entry = match desc.weight_shapes() {
                LayerWeights::None => {
                    return Err(FxnnError::Weights(format!(
                        "{}: layer kind takes no weights",
                        desc.label
                    )));
                }
                LayerWeights::Conv(shape) => {
                    WeightEntry::Conv(read_flat(&branch_path(dir, &desc.label, None), shape)?)
                }
                LayerWeights::Fire {
                    squeeze,
                    expand1x1,
                    expand3x3,
                } => WeightEntry::Fire {
                    squeeze: read_flat(&branch_path(dir, &desc.label, Some("squeeze")), squeeze)?,
                    expand1x1: read_flat(
                        &branch_path(dir, &desc.label, Some("expand1x1")),
                        expand1x1,
                    )?,
                    expand3x3: read_flat(
                        &branch_path(dir, &desc.label, Some("expand3x3")),
                        expand3x3,
                    )?,
                },
            };
            store.insert(id, entry)?;
        }
        Ok(store)
    }

    fn build_for<F>(descriptors: &[LayerDescriptor], mut make: F) -> Result<Self, FxnnError>
    where
        F: FnMut(&str, WeightDesc) -> Result<WeightTensor, FxnnError>,
    {
        let mut store = Self::empty(descriptors.len());
        for desc in descriptors {
            let Some(id) = desc.weights else { continue };
            let entry = match desc.weight_shapes() {
                LayerWeights::None => {
                    return Err(FxnnError::Weights(format!(
                        "{}: layer kind takes no weights",
                        desc.label
                    )));
                }
                LayerWeights::Conv(shape) => WeightEntry::Conv(make(&desc.label, shape)?),
                LayerWeights::Fire {
                    squeeze,
                    expand1x1,
                    expand3x3,
                } => WeightEntry::Fire {
                    squeeze: make(&desc.label, squeeze)?,
                    expand1x1: make(&desc.label, expand1x1)?,
                    expand3x3: make(&desc.label, expand3x3)?,
                },
            };
            store.insert(id, entry)?;
        }
        Ok(store)
    }
}

fn branch_path(dir: &Path, label: &str, branch: Option<&str>) -> PathBuf {
    match branch {
        Some(branch) => dir.join(format!("{label}_{branch}_weights_flat.bin")),
        None => dir.join(format!("{label}_weights_flat.bin")),
    }
}

fn read_flat(path: &Path, desc: WeightDesc) -> Result<WeightTensor, FxnnError> {
    let bytes = fs::read(path)
        .map_err(|e| FxnnError::Weights(format!("cannot read {}: {e}", path.display())))?;
    if bytes.len() != desc.size_in_bytes() {
        return Err(FxnnError::Weights(format!(
            "{}: {} bytes on disk, shape ({},{},{},{}) needs {}",
            path.display(),
            bytes.len(),
            desc.out_channels,
            desc.in_channels,
            desc.kernel_h,
            desc.kernel_w,
            desc.size_in_bytes()
        )));
    }
    let raw: Vec<i16> = bytemuck::pod_collect_to_vec(&bytes);

    let mut data = vec![Fixed::ZERO; desc.num_elements()];
    let mut src = 0;
    for kh in 0..desc.kernel_h {
        for kw in 0..desc.kernel_w {
            for ic in 0..desc.in_channels {
                for oc in 0..desc.out_channels {
                    data[desc.index(oc, ic, kh, kw)] = Fixed::from_raw(i16::from_le(raw[src]));
                    src += 1;
                }
            }
        }
    }
    WeightTensor::from_vec(desc, data)
}

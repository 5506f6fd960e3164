use crate::loss::{ContentProbe, ProbeKind, StyleProbe};
use crate::net::{Layer, PoolKind};
use crate::optimizer::{self, Lbfgs};
use crate::session::{GeneratorProgress, ProgressStat, ProgressUpdate};
use crate::{errors, utils, Dims, Error};

use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor, TensorData};

/// One entry of the assembled sequence: either a copied network layer or a
/// spliced-in loss probe
enum Item<B: Backend> {
    Layer(Layer<B>),
    Content(ContentProbe<B>),
    Style(StyleProbe<B>),
}

/// One probe's loss reading from a single forward pass
#[derive(Clone, Copy, Debug)]
pub struct ProbeReading {
    pub kind: ProbeKind,
    pub depth: usize,
    pub loss: f32,
}

/// Every probe's reading from one evaluation of the assembled sequence,
/// along with the per-kind sums and the scalar objective
#[derive(Clone, Debug)]
pub struct LossReadout {
    pub probes: Vec<ProbeReading>,
    pub content: f32,
    pub style: f32,
    pub total: f32,
}

pub(crate) struct AssemblyParams<'a> {
    pub content_depths: &'a [usize],
    pub style_depths: &'a [usize],
    pub content_weight: f32,
    pub style_weight: f32,
    pub average_pooling: bool,
}

/// An ordered layer stack with loss probes spliced in at the requested
/// depths. Built once, structurally immutable afterwards; only tensor values
/// flow through it.
pub(crate) struct InstrumentedNet<B: AutodiffBackend> {
    items: Vec<Item<B>>,
    probe_count: usize,
    device: B::Device,
}

impl<B: AutodiffBackend> InstrumentedNet<B> {
    /// Walks `layers` in order, copying each into the new sequence and
    /// splicing in a probe after every convolution+activation unit whose
    /// depth was requested. Each probe's target is captured by running the
    /// sequence built so far on the content (or style) image.
    ///
    /// Trailing layers past the last probe cannot influence any loss and are
    /// dropped.
    pub(crate) fn assemble(
        layers: Vec<Layer<B>>,
        content: Tensor<B, 4>,
        style: Tensor<B, 4>,
        params: &AssemblyParams<'_>,
    ) -> Result<Self, Error> {
        let content_dims = content.dims();
        let style_dims = style.dims();
        if content_dims != style_dims {
            return Err(Error::DimensionMismatch(errors::DimensionMismatch {
                content: (content_dims[3] as u32, content_dims[2] as u32),
                style: (style_dims[3] as u32, style_dims[2] as u32),
            }));
        }

        let deepest = params
            .content_depths
            .iter()
            .chain(params.style_depths.iter())
            .copied()
            .max()
            .ok_or(Error::NoProbes)?;

        let available = layers
            .iter()
            .filter(|l| matches!(l, Layer::Activation))
            .count();
        if deepest > available {
            return Err(Error::DepthOutOfRange {
                requested: deepest,
                available,
            });
        }

        let device = content.device();
        let content = content.detach();
        let style = style.detach();

        let mut items: Vec<Item<B>> = Vec::with_capacity(layers.len());
        let mut probe_count = 0;
        let mut depth = 0;

        for layer in layers {
            let layer = match layer {
                Layer::Pooling {
                    kind: PoolKind::Max,
                    window,
                } if params.average_pooling => Layer::Pooling {
                    kind: PoolKind::Average,
                    window,
                },
                other => other,
            };

            let is_activation = matches!(layer, Layer::Activation);
            items.push(Item::Layer(layer));

            if is_activation {
                depth += 1;

                if params.content_depths.contains(&depth) {
                    let target = forward_plain(&items, content.clone());
                    items.push(Item::Content(ContentProbe::new(
                        depth,
                        params.content_weight,
                        target,
                    )));
                    probe_count += 1;
                }
                if params.style_depths.contains(&depth) {
                    let target = forward_plain(&items, style.clone());
                    items.push(Item::Style(StyleProbe::new(
                        depth,
                        params.style_weight,
                        target,
                    )));
                    probe_count += 1;
                }

                if depth == deepest {
                    break;
                }
            }
        }

        Ok(Self {
            items,
            probe_count,
            device,
        })
    }

    /// Runs `input` through the assembled sequence. Probes are transparent:
    /// the returned tensor is exactly what the plain layer prefix would have
    /// produced, while every probe contributes one loss reading.
    pub(crate) fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> (Tensor<B, 4>, Vec<(ProbeKind, usize, Tensor<B, 1>)>) {
        let mut readings = Vec::with_capacity(self.probe_count);
        let mut x = input;

        for item in &self.items {
            match item {
                Item::Layer(layer) => x = layer.forward(x),
                Item::Content(probe) => {
                    readings.push((ProbeKind::Content, probe.depth, probe.evaluate(&x)));
                }
                Item::Style(probe) => {
                    readings.push((ProbeKind::Style, probe.depth, probe.evaluate(&x)));
                }
            }
        }

        (x, readings)
    }

    /// One full evaluation: rebuilds the tracked pixel tensor, runs the
    /// instrumented sequence, sums every probe loss into the scalar
    /// objective and differentiates it with respect to the pixels.
    pub(crate) fn evaluate(&self, pixels: &[f32], size: Dims) -> (f32, Vec<f32>, LossReadout) {
        let (w, h) = (size.width as usize, size.height as usize);
        let grid = Tensor::<B, 4>::from_data(
            TensorData::new(pixels.to_vec(), [1, 3, h, w]),
            &self.device,
        )
        .require_grad();

        let (_, readings) = self.forward(grid.clone());

        let mut probes = Vec::with_capacity(readings.len());
        let mut content = 0.0_f32;
        let mut style = 0.0_f32;
        let mut objective: Option<Tensor<B, 1>> = None;

        for (kind, depth, loss) in readings {
            let value: f32 = loss.clone().into_scalar().elem();
            match kind {
                ProbeKind::Content => content += value,
                ProbeKind::Style => style += value,
            }
            probes.push(ProbeReading { kind, depth, loss: value });

            objective = Some(match objective {
                Some(sum) => sum + loss,
                None => loss,
            });
        }

        // assembly rejects empty probe sets up front
        let objective = objective.expect("assembled sequence holds at least one probe");
        let total: f32 = objective.clone().into_scalar().elem();

        let grads = objective.backward();
        let grad = grid
            .grad(&grads)
            .expect("the pixel grid is a tracked leaf of the graph");
        let grad = grad
            .into_data()
            .into_vec::<f32>()
            .expect("float tensor data");

        (
            total,
            grad,
            LossReadout {
                probes,
                content,
                style,
                total,
            },
        )
    }
}

/// Runs `input` through the sequence ignoring probe readings; used while
/// capturing probe targets during assembly.
fn forward_plain<B: Backend>(items: &[Item<B>], input: Tensor<B, 4>) -> Tensor<B, 4> {
    let mut x = input;
    for item in items {
        if let Item::Layer(layer) = item {
            x = layer.forward(x);
        }
    }
    x
}

/// Repairs the pixel grid into the valid `[0, 1]` range in place.
pub(crate) fn clamp_unit(data: &mut [f32]) {
    for v in data.iter_mut() {
        *v = v.max(0.0).min(1.0);
    }
}

/// Owns the output pixel grid and drives the optimization loop.
pub(crate) struct Generator<B: AutodiffBackend> {
    net: InstrumentedNet<B>,
    pixels: Vec<f32>,
    pub(crate) size: Dims,
    last_readout: Option<LossReadout>,
}

impl<B: AutodiffBackend> Generator<B> {
    pub(crate) fn new(net: InstrumentedNet<B>, pixels: Vec<f32>, size: Dims) -> Self {
        Self {
            net,
            pixels,
            size,
            last_readout: None,
        }
    }

    /// The optimization loop. Per iteration: clamp the grid, evaluate the
    /// instrumented sequence for the objective and its pixel gradient, then
    /// hand both to the quasi-Newton step, whose line search may re-evaluate
    /// a few more times. Terminates only on budget exhaustion.
    pub(crate) fn resolve(
        &mut self,
        iterations: u32,
        progress_interval: u32,
        mut progress: Option<Box<dyn GeneratorProgress>>,
    ) {
        let Self {
            net,
            pixels,
            size,
            last_readout,
        } = self;
        let size = *size;

        let mut opt = Lbfgs::new(optimizer::DEFAULT_MEMORY);

        for iteration in 0..iterations {
            clamp_unit(pixels);

            let (loss, grad, readout) = net.evaluate(pixels, size);

            if let Some(p) = progress.as_mut() {
                if iteration % progress_interval == 0 {
                    let image = utils::pixels_to_image(pixels, size);
                    p.update(ProgressUpdate {
                        image: &image,
                        iter: ProgressStat {
                            current: iteration as usize,
                            total: iterations as usize,
                        },
                        content_loss: readout.content,
                        style_loss: readout.style,
                        total_loss: readout.total,
                    });
                }
            }

            opt.step(pixels, loss, &grad, &mut |candidate: &[f32]| {
                let (l, g, _) = net.evaluate(candidate, size);
                (l, g)
            });
        }

        clamp_unit(pixels);

        // the readout has to describe the grid as returned, after the last
        // step and the trailing clamp
        let (_, _, readout) = net.evaluate(pixels, size);
        *last_readout = Some(readout);
    }

    pub(crate) fn to_image(&self) -> image::RgbaImage {
        utils::pixels_to_image(&self.pixels, self.size)
    }

    pub(crate) fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub(crate) fn last_readout(&self) -> Option<&LossReadout> {
        self.last_readout.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::Layer;
    use crate::DefaultBackend;
    use burn::nn::conv::Conv2dConfig;
    use burn::nn::PaddingConfig2d;
    use burn::tensor::activation::relu;
    use burn::tensor::Distribution;

    type B = DefaultBackend;

    fn random_image(height: usize, width: usize) -> Tensor<B, 4> {
        let device = Default::default();
        Tensor::random([1, 3, height, width], Distribution::Default, &device)
    }

    fn one_unit() -> (Vec<Layer<B>>, burn::nn::conv::Conv2d<B>) {
        let device = Default::default();
        let conv = Conv2dConfig::new([3, 4], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(&device);
        let layers = vec![Layer::Convolution(conv.clone()), Layer::activation()];
        (layers, conv)
    }

    fn both_probes<'a>() -> AssemblyParams<'a> {
        AssemblyParams {
            content_depths: &[1],
            style_depths: &[1],
            content_weight: 1.0,
            style_weight: 1000.0,
            average_pooling: false,
        }
    }

    #[test]
    fn probes_are_transparent() {
        let (layers, conv) = one_unit();
        let content = random_image(4, 4);
        let style = random_image(4, 4);
        let input = random_image(4, 4);

        let net =
            InstrumentedNet::assemble(layers, content, style, &both_probes()).unwrap();
        let (instrumented, readings) = net.forward(input.clone());
        assert_eq!(readings.len(), 2);

        let plain = relu(conv.forward(input));
        let diff = instrumented
            .sub(plain)
            .abs()
            .max()
            .into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn target_image_reads_near_zero_content_loss() {
        let (layers, _) = one_unit();
        let content = random_image(4, 4);
        let style = random_image(4, 4);

        let net =
            InstrumentedNet::assemble(layers, content.clone(), style, &both_probes()).unwrap();
        let (_, readings) = net.forward(content);

        let content_loss = readings
            .iter()
            .find(|(kind, _, _)| *kind == ProbeKind::Content)
            .map(|(_, _, loss)| loss.clone().into_scalar())
            .unwrap();
        assert!(content_loss < 1e-10);
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let (layers, _) = one_unit();
        let content = random_image(4, 4);
        let style = random_image(5, 5);

        let err = InstrumentedNet::assemble(layers, content, style, &both_probes());
        assert!(matches!(err, Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn too_deep_probe_is_rejected() {
        let (layers, _) = one_unit();
        let params = AssemblyParams {
            content_depths: &[2],
            style_depths: &[],
            content_weight: 1.0,
            style_weight: 1.0,
            average_pooling: false,
        };

        let err =
            InstrumentedNet::assemble(layers, random_image(4, 4), random_image(4, 4), &params);
        assert!(matches!(
            err,
            Err(Error::DepthOutOfRange {
                requested: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn empty_probe_set_is_rejected() {
        let (layers, _) = one_unit();
        let params = AssemblyParams {
            content_depths: &[],
            style_depths: &[],
            content_weight: 1.0,
            style_weight: 1.0,
            average_pooling: false,
        };

        let err =
            InstrumentedNet::assemble(layers, random_image(4, 4), random_image(4, 4), &params);
        assert!(matches!(err, Err(Error::NoProbes)));
    }

    #[test]
    fn evaluation_returns_one_reading_per_probe() {
        let (layers, _) = one_unit();
        let net = InstrumentedNet::assemble(
            layers,
            random_image(4, 4),
            random_image(4, 4),
            &both_probes(),
        )
        .unwrap();

        let pixels = vec![0.5_f32; 3 * 4 * 4];
        let (total, grad, readout) = net.evaluate(&pixels, Dims::new(4, 4));

        assert_eq!(readout.probes.len(), 2);
        assert_eq!(grad.len(), pixels.len());
        let drift = (readout.content + readout.style - total).abs();
        assert!(drift <= 1e-4 * total.abs().max(1.0));
    }

    #[test]
    fn final_readout_matches_the_returned_grid() {
        let (layers, _) = one_unit();
        let net = InstrumentedNet::assemble(
            layers,
            random_image(4, 4),
            random_image(4, 4),
            &both_probes(),
        )
        .unwrap();

        let mut generator = Generator::new(net, vec![0.5_f32; 3 * 4 * 4], Dims::new(4, 4));
        generator.resolve(3, 1, None);

        // re-evaluating the grid the caller receives must reproduce the
        // reported losses exactly
        let reported = generator.last_readout().unwrap().total;
        let (fresh, _, _) = generator.net.evaluate(generator.pixels(), generator.size);
        assert_eq!(fresh, reported);
    }

    #[test]
    fn clamp_is_idempotent() {
        let mut grid = vec![0.0, 0.25, 0.5, 0.75, 1.0];
        let expected = grid.clone();

        clamp_unit(&mut grid);
        assert_eq!(grid, expected);

        let mut out_of_range = vec![-0.5, 1.5, 0.3];
        clamp_unit(&mut out_of_range);
        assert_eq!(out_of_range, vec![0.0, 1.0, 0.3]);
        let snapshot = out_of_range.clone();
        clamp_unit(&mut out_of_range);
        assert_eq!(out_of_range, snapshot);
    }
}

use crate::*;

use crate::net::{vgg19_features, Layer};
use crate::transfer::{AssemblyParams, Generator, InstrumentedNet};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Style transfer session.
///
/// Calling `run()` will optimize an output image towards the configured
/// content and style targets and return it, consuming the session in the
/// process. You can provide a `GeneratorProgress` implementation to
/// periodically get updates with the current image and the running content
/// and style losses.
///
/// # Example
/// ```no_run
/// let session = neural_style::Session::builder()
///     .content(&"imgs/dancing.jpg")
///     .style(&"imgs/picasso.jpg")
///     .iterations(300)
///     .build().expect("failed to build session");
///
/// let generated = session.run(None);
/// generated.save("my_styled_img.jpg").expect("failed to save image");
/// ```
pub struct Session {
    generator: Generator<DefaultBackend>,
    params: Parameters,
}

impl Session {
    /// Creates a new session with default parameters.
    pub fn builder<'a>() -> SessionBuilder<'a> {
        SessionBuilder::default()
    }

    /// Runs the optimization loop and outputs the generated image.
    pub fn run(mut self, progress: Option<Box<dyn GeneratorProgress>>) -> GeneratedImage {
        self.generator.resolve(
            self.params.iterations,
            self.params.progress_interval,
            progress,
        );

        GeneratedImage {
            inner: self.generator,
        }
    }
}

/// Builds a session by setting parameters and adding the input images,
/// calling `build` will load and validate all of the provided inputs, and
/// capture every probe target, so that `run` itself cannot fail
#[derive(Default)]
pub struct SessionBuilder<'a> {
    content: Option<ImageSource<'a>>,
    style: Option<ImageSource<'a>>,
    layers: Option<Vec<Layer<DefaultBackend>>>,
    params: Parameters,
}

impl<'a> SessionBuilder<'a> {
    /// Creates a new `SessionBuilder`, can also be created via
    /// `Session::builder()`
    pub fn new() -> Self {
        Self::default()
    }

    /// The image whose content is preserved in the output.
    pub fn content<I: Into<ImageSource<'a>>>(mut self, img: I) -> Self {
        self.content = Some(img.into());
        self
    }

    /// The image whose style is transferred onto the content.
    pub fn style<I: Into<ImageSource<'a>>>(mut self, img: I) -> Self {
        self.style = Some(img.into());
        self
    }

    /// Replaces the built-in VGG-19 feature stack with a custom ordered
    /// layer stack. Probe depths are counted in convolution+activation
    /// units of the provided stack.
    pub fn layers(mut self, layers: Vec<Layer<DefaultBackend>>) -> Self {
        self.layers = Some(layers);
        self
    }

    /// Depths at which content probes are attached.
    ///
    /// Default: the second activation of VGG block 4.
    pub fn content_depths(mut self, depths: &[usize]) -> Self {
        self.params.content_depths = depths.to_vec();
        self
    }

    /// Depths at which style probes are attached.
    ///
    /// Default: the first activation of each of the five VGG blocks.
    pub fn style_depths(mut self, depths: &[usize]) -> Self {
        self.params.style_depths = depths.to_vec();
        self
    }

    /// Weight applied to every content probe.
    ///
    /// Default: 1.0
    pub fn content_weight(mut self, weight: f32) -> Self {
        self.params.content_weight = weight;
        self
    }

    /// Weight applied to every style probe. The usual working range is a few
    /// orders of magnitude above the content weight.
    ///
    /// Default: 1000.0
    pub fn style_weight(mut self, weight: f32) -> Self {
        self.params.style_weight = weight;
        self
    }

    /// Fixed iteration budget of the optimization loop; there is no other
    /// termination criterion.
    ///
    /// Default: 300
    pub fn iterations(mut self, count: u32) -> Self {
        self.params.iterations = count;
        self
    }

    /// How often the progress callback fires, in iterations.
    ///
    /// Default: 10
    pub fn progress_interval(mut self, interval: u32) -> Self {
        self.params.progress_interval = interval;
        self
    }

    /// Overwrite incoming images sizes
    pub fn resize_input(mut self, dims: Dims) -> Self {
        self.params.resize_input = Some(dims);
        self
    }

    /// Starting point of the output grid: a copy of the content image or
    /// seeded uniform noise.
    ///
    /// Default: `Init::FromContent`
    pub fn init(mut self, init: Init) -> Self {
        self.params.init = init;
        self
    }

    /// Seed for the noise initialization; has no effect with
    /// `Init::FromContent`. Runs are fully deterministic for a given seed.
    pub fn seed(mut self, value: u64) -> Self {
        self.params.seed = value;
        self
    }

    /// Substitutes every max pooling layer with average pooling, which tends
    /// to give smoother results.
    ///
    /// Default: false
    pub fn average_pooling(mut self, enabled: bool) -> Self {
        self.params.average_pooling = enabled;
        self
    }

    /// Creates a `Session`, or returns an error if invalid parameters or
    /// input images were specified.
    pub fn build(self) -> Result<Session, Error> {
        self.check_parameters_validity()?;

        let content = self.content.ok_or(Error::MissingInput("content"))?;
        let style = self.style.ok_or(Error::MissingInput("style"))?;

        let content_img = load_image(content, self.params.resize_input)?;
        let style_img = load_image(style, self.params.resize_input)?;

        if content_img.dimensions() != style_img.dimensions() {
            return Err(Error::DimensionMismatch(errors::DimensionMismatch {
                content: content_img.dimensions(),
                style: style_img.dimensions(),
            }));
        }
        let (width, height) = content_img.dimensions();
        let size = Dims::new(width, height);

        let device = Default::default();
        let content_tensor = utils::image_to_tensor::<DefaultBackend>(&content_img, &device);
        let style_tensor = utils::image_to_tensor::<DefaultBackend>(&style_img, &device);

        let layers = match self.layers {
            Some(layers) => layers,
            None => vgg19_features(&device),
        };

        let net = InstrumentedNet::assemble(
            layers,
            content_tensor.clone(),
            style_tensor,
            &AssemblyParams {
                content_depths: &self.params.content_depths,
                style_depths: &self.params.style_depths,
                content_weight: self.params.content_weight,
                style_weight: self.params.style_weight,
                average_pooling: self.params.average_pooling,
            },
        )?;

        let pixels = match self.params.init {
            Init::FromContent => content_tensor
                .into_data()
                .into_vec::<f32>()
                .expect("float tensor data"),
            Init::Noise => {
                let mut rng = Pcg32::seed_from_u64(self.params.seed);
                (0..3 * (width as usize) * (height as usize))
                    .map(|_| rng.gen::<f32>())
                    .collect()
            }
        };

        Ok(Session {
            generator: Generator::new(net, pixels, size),
            params: self.params,
        })
    }

    fn check_parameters_validity(&self) -> Result<(), Error> {
        if self.params.content_weight < 0.0 || !self.params.content_weight.is_finite() {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f32::INFINITY,
                value: self.params.content_weight,
                name: "content-weight",
            }));
        }

        if self.params.style_weight < 0.0 || !self.params.style_weight.is_finite() {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f32::INFINITY,
                value: self.params.style_weight,
                name: "style-weight",
            }));
        }

        if self.params.iterations == 0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 1.0,
                max: f32::INFINITY,
                value: 0.0,
                name: "iterations",
            }));
        }

        if self.params.progress_interval == 0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 1.0,
                max: f32::INFINITY,
                value: 0.0,
                name: "progress-interval",
            }));
        }

        Ok(())
    }
}

/// Helper struct for passing progress information to external callers
pub struct ProgressStat {
    /// The current amount of work that has been done
    pub current: usize,
    /// The total amount of work to do
    pub total: usize,
}

/// The current state of the optimization loop
pub struct ProgressUpdate<'a> {
    /// The current output image
    pub image: &'a image::RgbaImage,
    /// How far along the iteration budget the loop is
    pub iter: ProgressStat,
    /// Sum of all content probe losses at this iteration
    pub content_loss: f32,
    /// Sum of all style probe losses at this iteration
    pub style_loss: f32,
    /// The scalar objective, content plus style
    pub total_loss: f32,
}

/// Allows the optimization loop to update external callers with the current
/// progress of the transfer
pub trait GeneratorProgress {
    fn update(&mut self, info: ProgressUpdate<'_>);
}

impl<G> GeneratorProgress for G
where
    G: FnMut(ProgressUpdate<'_>) + Send,
{
    fn update(&mut self, info: ProgressUpdate<'_>) {
        self(info)
    }
}

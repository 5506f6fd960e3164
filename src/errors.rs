use std::fmt;

#[derive(Debug)]
pub struct InvalidRange {
    pub(crate) min: f32,
    pub(crate) max: f32,
    pub(crate) value: f32,
    pub(crate) name: &'static str,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' - value '{}' is outside the range of {}-{}",
            self.name, self.value, self.min, self.max
        )
    }
}

#[derive(Debug)]
pub struct DimensionMismatch {
    pub(crate) content: (u32, u32),
    pub(crate) style: (u32, u32),
}

impl fmt::Display for DimensionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the content size ({}x{}) must match the style size ({}x{}), \
             use resize_input to bring both to a common size",
            self.content.0, self.content.1, self.style.0, self.style.1
        )
    }
}

#[derive(Debug)]
pub enum Error {
    /// An error in the image library occurred, eg failed to load/save
    Image(image::ImageError),
    /// An input parameter had an invalid range specified
    InvalidRange(InvalidRange),
    /// The content and style images must have the same dimensions
    DimensionMismatch(DimensionMismatch),
    /// A probe was requested at a depth the layer stack never reaches
    DepthOutOfRange { requested: usize, available: usize },
    /// Io is notoriously error free with no problems, but we cover it just in case!
    Io(std::io::Error),
    /// Neither a content nor a style probe depth was requested, so there is
    /// nothing to optimize towards
    NoProbes,
    /// A required input image was never provided to the builder
    MissingInput(&'static str),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(ie) => write!(f, "{}", ie),
            Self::InvalidRange(ir) => write!(f, "{}", ir),
            Self::DimensionMismatch(dm) => write!(f, "{}", dm),
            Self::DepthOutOfRange {
                requested,
                available,
            } => write!(
                f,
                "a probe was requested at depth {}, but the layer stack only \
                 has {} convolution+activation unit(s)",
                requested, available
            ),
            Self::Io(io) => write!(f, "{}", io),
            Self::NoProbes => write!(
                f,
                "at least 1 content or style probe depth must be requested"
            ),
            Self::MissingInput(which) => {
                write!(f, "no {} image was provided to the session builder", which)
            }
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(ie: image::ImageError) -> Self {
        Self::Image(ie)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::Io(io)
    }
}

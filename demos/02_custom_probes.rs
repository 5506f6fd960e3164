use neural_style as ns;

fn main() -> Result<(), ns::Error> {
    let device = Default::default();

    // a small custom feature stack instead of the built-in VGG-19; probe
    // depths count convolution+activation units of this stack
    let layers = vec![
        ns::Layer::conv3x3(3, 16, &device),
        ns::Layer::activation(),
        ns::Layer::conv3x3(16, 32, &device),
        ns::Layer::activation(),
        ns::Layer::max_pool(),
        ns::Layer::conv3x3(32, 64, &device),
        ns::Layer::activation(),
    ];

    let session = ns::Session::builder()
        .content(&"imgs/dancing.jpg")
        .style(&"imgs/picasso.jpg")
        .resize_input(ns::Dims::square(256))
        .layers(layers)
        // content matched at the deepest unit, style at the two shallow ones
        .content_depths(&[3])
        .style_depths(&[1, 2])
        .style_weight(500.0)
        // start from seeded noise instead of the content image
        .init(ns::Init::Noise)
        .seed(7)
        // smoother downsampling for the style statistics
        .average_pooling(true)
        .iterations(150)
        .build()?;

    let generated = session.run(Some(Box::new(|update: ns::ProgressUpdate<'_>| {
        println!(
            "iteration {}/{}: total {:.4}",
            update.iter.current, update.iter.total, update.total_loss
        );
    })));

    generated.save("out/02.png")
}

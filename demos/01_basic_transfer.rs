use neural_style as ns;

fn main() -> Result<(), ns::Error> {
    let session = ns::Session::builder()
        // the image whose layout survives in the output
        .content(&"imgs/dancing.jpg")
        // the image whose brush strokes and palette are transferred
        .style(&"imgs/picasso.jpg")
        // both inputs are brought to a common, manageable resolution
        .resize_input(ns::Dims::square(256))
        .build()?;

    // optimize the output image, printing the running losses as we go
    let generated = session.run(Some(Box::new(|update: ns::ProgressUpdate<'_>| {
        println!(
            "iteration {}/{}: style {:.4} content {:.4}",
            update.iter.current, update.iter.total, update.style_loss, update.content_loss
        );
    })));

    // save the result to the disk
    generated.save("out/01.png")
}

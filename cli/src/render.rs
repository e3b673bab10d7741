use anyhow::Result;
use std::path;
use stipple::{Stipple, StippleKind};
use svg::node::element::Circle;
use svg::Document;

/// Stipples of one density image together with the image size they are scaled to.
pub struct Layer<'a> {
    pub stipples: &'a [Stipple],
    pub width: u32,
    pub height: u32,
}

fn color(stipple: &Stipple, color_new: bool) -> &'static str {
    match stipple.kind {
        StippleKind::New if color_new => "red",
        _ => "black",
    }
}

fn draw_stipples(document: Document, layer: &Layer, color_new: bool) -> Document {
    let mut document = document;
    let (width, height) = (layer.width as f64, layer.height as f64);

    for stipple in layer.stipples {
        document = document.add(
            Circle::new()
                .set("fill", color(stipple, color_new))
                .set("cx", stipple.pos.x * width)
                .set("cy", stipple.pos.y * height)
                .set("r", stipple.size / 2.0),
        );
    }

    document
}

/// Write all layers into one document sized after the first layer.
pub fn write_stipples(filename: &path::Path, layers: &[Layer], color_new: bool) -> Result<()> {
    let (width, height) = layers
        .first()
        .map(|l| (l.width, l.height))
        .unwrap_or((0, 0));

    let mut document = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));

    for layer in layers {
        document = draw_stipples(document, layer, color_new);
    }

    svg::save(filename, &document)?;

    Ok(())
}

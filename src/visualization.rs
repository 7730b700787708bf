use std::io::Cursor;

use image::DynamicImage;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::RecordingStream;

use crate::error::{FieldMapError, Result};
use crate::tag::tag_corners_3d;
use crate::tag_map::TagMap;
use crate::transform::transform_points;

pub const OBSERVED_COLOR: (u8, u8, u8, u8) = (0, 255, 0, 255);
pub const IDEAL_COLOR: (u8, u8, u8, u8) = (255, 0, 0, 255);

fn rerun_err(e: impl std::fmt::Display) -> FieldMapError {
    FieldMapError::Rerun(e.to_string())
}

fn to_color(c: (u8, u8, u8, u8)) -> rerun::Color {
    rerun::Color::from_unmultiplied_rgba(c.0, c.1, c.2, c.3)
}

pub fn log_image(recording: &RecordingStream, topic: &str, img: &DynamicImage) -> Result<()> {
    let mut bytes: Vec<u8> = Vec::new();
    img.to_luma8()
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .map_err(rerun_err)?;
    let image = rerun::EncodedImage::from_file_contents(bytes);
    recording
        .log(format!("{}/image", topic), &image)
        .map_err(rerun_err)
}

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// Logs every tag as a labelled center point, its outline and its local axes.
///
/// Tags use `color` when given, otherwise a color derived from the tag id.
pub fn log_tag_map(
    recording: &RecordingStream,
    topic: &str,
    tag_map: &TagMap,
    tag_size_meter: f64,
    color: Option<(u8, u8, u8, u8)>,
) -> Result<()> {
    let corners = tag_corners_3d(tag_size_meter);
    let axis_length = tag_size_meter as f32 * 0.5;

    let mut centers = Vec::with_capacity(tag_map.len());
    let mut colors = Vec::with_capacity(tag_map.len());
    let mut labels = Vec::with_capacity(tag_map.len());
    let mut outlines = Vec::with_capacity(tag_map.len());
    let mut origins = Vec::with_capacity(tag_map.len() * 3);
    let mut vectors = Vec::with_capacity(tag_map.len() * 3);
    let mut axis_colors = Vec::with_capacity(tag_map.len() * 3);

    for (tag_id, t) in tag_map.iter() {
        let c = t.translation().cast::<f32>();
        let r = t.rotation().cast::<f32>();
        centers.push([c.x, c.y, c.z]);
        colors.push(to_color(color.unwrap_or(id_to_color(tag_id as usize))));
        labels.push(format!("tag {}", tag_id));

        let mut outline: Vec<[f32; 3]> = transform_points(t, &corners)
            .iter()
            .map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect();
        outline.push(outline[0]);
        outlines.push(outline);

        for (axis, axis_color) in [(255, 0, 0), (0, 255, 0), (0, 0, 255)].into_iter().enumerate() {
            let v = r.column(axis) * axis_length;
            origins.push([c.x, c.y, c.z]);
            vectors.push([v.x, v.y, v.z]);
            axis_colors.push(rerun::Color::from_rgb(axis_color.0, axis_color.1, axis_color.2));
        }
    }

    recording
        .log(
            format!("{}/centers", topic),
            &rerun::Points3D::new(centers)
                .with_colors(colors.clone())
                .with_labels(labels)
                .with_radii([rerun::Radius::new_ui_points(5.0)]),
        )
        .map_err(rerun_err)?;
    recording
        .log(
            format!("{}/outlines", topic),
            &rerun::LineStrips3D::new(outlines).with_colors(colors),
        )
        .map_err(rerun_err)?;
    recording
        .log(
            format!("{}/axes", topic),
            &rerun::Arrows3D::from_vectors(vectors)
                .with_origins(origins)
                .with_colors(axis_colors),
        )
        .map_err(rerun_err)
}

/// Observed tags in green next to their ideal poses in red.
pub fn log_observed_and_ideal(
    recording: &RecordingStream,
    observed: &TagMap,
    ideal: Option<&TagMap>,
    tag_size_meter: f64,
) -> Result<()> {
    log_tag_map(
        recording,
        "field/observed",
        observed,
        tag_size_meter,
        Some(OBSERVED_COLOR),
    )?;
    if let Some(ideal) = ideal {
        log_tag_map(recording, "field/ideal", ideal, tag_size_meter, Some(IDEAL_COLOR))?;
    }
    Ok(())
}

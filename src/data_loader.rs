use std::path::{Path, PathBuf};

use aprilgrid::detector::TagDetector;
use glob::glob;
use image::{DynamicImage, ImageReader};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use rerun::TimeCell;

use crate::camera::CameraModel;
use crate::error::Result;
use crate::pnp::estimate_tag_pose;
use crate::types::FrameObservations;
use crate::visualization::log_image;

const FRAME_INTERVAL_NS: i64 = 100_000_000;

/// Parses the timestamp from a file path.
///
/// Assumes the filename (without extension) is a timestamp in nanoseconds.
fn path_to_timestamp(path: &Path) -> Option<i64> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Detects tags in an image and estimates each tag's camera-to-tag transform.
///
/// Observations are sorted by tag id, so the lowest id becomes the frame's
/// reference tag.
pub fn image_to_frame_observations(
    tag_detector: &TagDetector,
    img: &DynamicImage,
    camera: &CameraModel,
    tag_size_meter: f64,
    time_ns: i64,
) -> FrameObservations {
    let detected_tags = tag_detector.detect(img);
    let mut observations: Vec<_> = detected_tags
        .iter()
        .filter_map(|(id, corners)| {
            let corners: [(f32, f32); 4] = corners.as_slice().try_into().ok()?;
            match estimate_tag_pose(*id, &corners, tag_size_meter, camera) {
                Ok(o) => Some(o),
                Err(e) => {
                    log::debug!("frame {}: {}", time_ns, e);
                    None
                }
            }
        })
        .collect();
    observations.sort_by_key(|o| o.tag_id);
    FrameObservations {
        time_ns,
        observations,
    }
}

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg", ".jpeg"] {
            if p.as_os_str().to_string_lossy().to_lowercase().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Loads every image of a folder and detects tags in parallel.
///
/// Each frame's observations are sorted by tag id, so the lowest id in a
/// frame, not the detector's first detection, becomes its reference.
///
/// # Arguments
/// * `root_folder` - Folder holding the extracted frames.
/// * `tag_detector` - The tag detector instance.
/// * `camera` - Intrinsics used to undistort corners before PnP.
/// * `tag_size_meter` - Side length of the tags.
/// * `start_idx` - Starting image index.
/// * `step` - Step size for sampling images.
/// * `recording_option` - Optional Rerun recording stream for visualization.
pub fn load_image_folder(
    root_folder: &str,
    tag_detector: &TagDetector,
    camera: &CameraModel,
    tag_size_meter: f64,
    start_idx: usize,
    step: usize,
    recording_option: Option<&rerun::RecordingStream>,
) -> Result<Vec<FrameObservations>> {
    let img_paths = glob(format!("{}/*", root_folder).as_str())?;
    let mut sorted_path: Vec<PathBuf> = img_paths.into_iter().filter_map(img_filter).collect();
    sorted_path.sort();
    log::info!("found {} images in {}", sorted_path.len(), root_folder);

    let new_paths: Vec<_> = sorted_path
        .iter()
        .skip(start_idx)
        .step_by(step.max(1))
        .enumerate()
        .collect();
    let mut frames: Vec<FrameObservations> = new_paths
        .par_iter()
        .progress_count(new_paths.len() as u64)
        .filter_map(|(idx, path)| {
            let time_ns = path_to_timestamp(path).unwrap_or(*idx as i64 * FRAME_INTERVAL_NS);
            let img = match ImageReader::open(path).map_err(image::ImageError::from).and_then(|r| r.decode()) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("skipping {}: {}", path.display(), e);
                    return None;
                }
            };
            if let Some(recording) = recording_option {
                recording.set_time("stable", TimeCell::from_timestamp_nanos_since_epoch(time_ns));
                if let Err(e) = log_image(recording, "cam0", &img) {
                    log::warn!("{}", e);
                }
            }
            let frame = image_to_frame_observations(tag_detector, &img, camera, tag_size_meter, time_ns);
            log::trace!("{}: {} tags", path.display(), frame.observations.len());
            Some(frame)
        })
        .collect();
    frames.sort_by_key(|f| f.time_ns);
    Ok(frames)
}

use std::path::PathBuf;
use std::time::Instant;

use apriltag_field_map::camera::CameraModel;
use apriltag_field_map::config::MappingConfig;
use apriltag_field_map::data_loader::load_image_folder;
use apriltag_field_map::io::{write_mapping_report, write_text_report};
use apriltag_field_map::pipeline::map_field;
use apriltag_field_map::tag_map::TagMap;
use apriltag_field_map::visualization::log_observed_and_ideal;
use aprilgrid::TagFamily;
use aprilgrid::detector::TagDetector;
use clap::Parser;
use time::OffsetDateTime;
use time::macros::format_description;

#[derive(Parser)]
#[command(version, about, author)]
struct FieldMapCli {
    /// path to the folder of extracted frames
    path: String,

    /// camera intrinsics json
    #[arg(short, long)]
    camera: PathBuf,

    /// ground truth map to compare against
    #[arg(short, long)]
    ideal_map: Option<PathBuf>,

    /// mapping config json
    #[arg(long)]
    config: Option<PathBuf>,

    /// tag_family: ["t16h5", "t25h7", "t25h9", "t36h11", "t36h11b1"]
    #[arg(long, value_enum, default_value = "t36h11")]
    tag_family: TagFamily,

    /// overrides the tag size of the config, meters
    #[arg(long)]
    tag_size: Option<f64>,

    #[arg(long, default_value_t = 0)]
    start_idx: usize,

    #[arg(long, default_value_t = 1)]
    step: usize,

    #[arg(short, long)]
    output_folder: Option<PathBuf>,

    /// save a rerun recording to <output_folder>/output.rrd
    #[arg(long, action)]
    rerun: bool,
}

fn default_output_folder() -> PathBuf {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let name = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    PathBuf::from("results").join(name)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = FieldMapCli::parse();

    let mut config = match &cli.config {
        Some(p) => MappingConfig::load(p)?,
        None => MappingConfig::default(),
    };
    if let Some(tag_size) = cli.tag_size {
        config.tag.tag_size_meter = tag_size;
    }
    let camera = CameraModel::load(&cli.camera)?;
    let ideal = cli.ideal_map.as_ref().map(TagMap::load).transpose()?;

    let output_folder = cli.output_folder.unwrap_or_else(default_output_folder);
    std::fs::create_dir_all(&output_folder)?;
    log::info!("writing results to {}", output_folder.display());

    let recording = if cli.rerun {
        Some(
            rerun::RecordingStreamBuilder::new("field_mapping")
                .save(output_folder.join("output.rrd"))?,
        )
    } else {
        None
    };

    let detector = TagDetector::new(&cli.tag_family, None);
    let now = Instant::now();
    let frames = load_image_folder(
        &cli.path,
        &detector,
        &camera,
        config.tag.tag_size_meter,
        cli.start_idx,
        cli.step,
        recording.as_ref(),
    )?;
    let duration_sec = now.elapsed().as_secs_f64();
    log::info!(
        "detecting tags in {} frames took {:.6} sec",
        frames.len(),
        duration_sec
    );

    let result = map_field(&frames, ideal.as_ref(), &config)?;
    if result.observed.is_empty() {
        log::warn!("no tag map produced");
        return Ok(());
    }

    result.observed.save(output_folder.join("observed_map.json"))?;
    result
        .relative_map
        .save(output_folder.join("relative_map.json"))?;
    write_mapping_report(
        output_folder.join("report.json"),
        result.frames_used,
        result.observed.len(),
        result.anchor_tag,
        result.optimization.as_ref(),
        &result.comparisons,
    )?;
    write_text_report(
        output_folder.join("report.txt"),
        result.optimization.as_ref(),
        &result.comparisons,
    )?;

    if let Some(recording) = &recording {
        log_observed_and_ideal(
            recording,
            &result.observed,
            ideal.as_ref(),
            config.tag.tag_size_meter,
        )?;
    }
    Ok(())
}

use clap::Parser;
use rgbd_block_fusion::block_store::DirectoryBlockStore;
use rgbd_block_fusion::categorize::FrameCategorizer;
use rgbd_block_fusion::io::write_report;
use rgbd_block_fusion::Settings;
use std::path::Path;
use std::time::Instant;

const REPORT_FILE: &str = "categorize_report.json";

/// Sort recorded RGB-D frames into reconstruction blocks
#[derive(Parser)]
#[command(version, about)]
struct CategorizeCli {
    /// path to the recorded frames (with RGB/, depth/ and tcw/)
    frames_root: String,

    /// settings file (JSON)
    settings: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = CategorizeCli::parse();

    let settings = Settings::from_file(&cli.settings)?;
    let frames_root = Path::new(&cli.frames_root);
    if !frames_root.is_dir() {
        return Err(format!("{} is not a valid directory", frames_root.display()).into());
    }

    let store = DirectoryBlockStore::under_frames_root(frames_root);
    std::fs::create_dir_all(store.root())?;
    let categorizer = FrameCategorizer::from_settings(&settings);
    log::info!(
        "block size {:.4}, sampling every {} px, depth ceiling {}",
        categorizer.block_size(),
        settings.precision,
        settings.max_accurate_distance
    );

    let now = Instant::now();
    let report = categorizer.categorize_recording(frames_root, settings.depth_map_factor, &store)?;
    let duration_sec = now.elapsed().as_secs_f64();
    log::info!(
        "categorized {} frames into {} blocks in {:.3} sec ({} without valid depth, {} failed)",
        report.frames_seen,
        report.blocks.len(),
        duration_sec,
        report.frames_dropped,
        report.frames_failed
    );

    write_report(store.root().join(REPORT_FILE), &report)?;
    Ok(())
}

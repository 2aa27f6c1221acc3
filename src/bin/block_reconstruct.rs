use clap::Parser;
use rgbd_block_fusion::block_store::DirectoryBlockStore;
use rgbd_block_fusion::fusion::TsdfBackend;
use rgbd_block_fusion::io::write_report;
use rgbd_block_fusion::orchestrator::Orchestrator;
use rgbd_block_fusion::Settings;
use std::path::{Path, PathBuf};
use std::time::Instant;

const REPORT_FILE: &str = "reconstruct_report.json";

/// Fuse every categorized block into its own reconstruction
#[derive(Parser)]
#[command(version, about)]
struct ReconstructCli {
    /// path to the recorded frames, categorized by block-categorize
    frames_root: String,

    /// settings file (JSON)
    settings: String,

    /// where to write one .ply per block [default: <frames_root>/reconstruction]
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = ReconstructCli::parse();

    let settings = Settings::from_file(&cli.settings)?;
    let frames_root = Path::new(&cli.frames_root);
    let store = DirectoryBlockStore::under_frames_root(frames_root);
    let output_dir = cli
        .output
        .map(PathBuf::from)
        .unwrap_or_else(|| frames_root.join("reconstruction"));
    std::fs::create_dir_all(&output_dir)?;

    let backend = TsdfBackend;
    let orchestrator = Orchestrator::from_settings(&store, &backend, &settings, &output_dir);

    let now = Instant::now();
    let report = orchestrator.run()?;
    log::info!(
        "reconstructed {} of {} blocks in {:.3} sec",
        report.reconstructed().count(),
        report.blocks.len(),
        now.elapsed().as_secs_f64()
    );

    write_report(output_dir.join(REPORT_FILE), &report)?;
    Ok(())
}

use clap::{Parser, Subcommand};
use image::{Luma, Rgb, RgbImage};
use nalgebra as na;
use rgbd_block_fusion::data_loader::{
    frame_file, write_pose, DEPTH_DIR, IMAGE_EXT, POSE_DIR, POSE_EXT, RGB_DIR,
};
use rgbd_block_fusion::io::object_to_json;
use rgbd_block_fusion::types::{Pose, RawDepthImage};
use rgbd_block_fusion::Settings;
use std::path::Path;

/// Half extents of the synthetic room, meters.
const ROOM: [f64; 3] = [4.0, 1.5, 4.0];

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic RGB-D sequence: a camera turning inside a box room
    Generate {
        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of frames to generate
        #[arg(short, long, default_value = "36")]
        num_frames: usize,

        /// Image width
        #[arg(long, default_value = "160")]
        width: u32,

        /// Image height
        #[arg(long, default_value = "120")]
        height: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Commands::Generate {
            output,
            num_frames,
            width,
            height,
        } => {
            generate_dataset(&output, num_frames, width, height)?;
        }
    }

    Ok(())
}

fn generate_dataset(
    output_dir: &str,
    num_frames: usize,
    width: u32,
    height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::fs;

    let root = Path::new(output_dir);
    for sub in [RGB_DIR, DEPTH_DIR, POSE_DIR] {
        fs::create_dir_all(root.join(sub))?;
    }

    let f = width as f64 * 0.8;
    let settings = Settings {
        fx: f,
        fy: f,
        cx: (width as f64 - 1.0) / 2.0,
        cy: (height as f64 - 1.0) / 2.0,
        width,
        height,
        voxel_size: 0.02,
        voxel_dim: 128,
        ..Default::default()
    };
    let k_inv = settings.intrinsics().k_inv();

    for frame_idx in 0..num_frames {
        // turn in place, bobbing a little so consecutive poses differ in height too
        let yaw = frame_idx as f64 / num_frames.max(1) as f64 * std::f64::consts::TAU;
        let rot = na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), yaw);
        let center = na::Vector3::new(0.3, 0.1 * yaw.sin(), -0.2);
        let twc = na::Isometry3::from_parts(na::Translation3::from(center), rot.into());

        let mut color = RgbImage::new(width, height);
        let mut depth = RawDepthImage::new(width, height);
        for v in 0..height {
            for u in 0..width {
                let ray_cam = k_inv * na::Vector3::new(u as f64, v as f64, 1.0);
                let ray_world = rot * ray_cam;
                let (t, hit) = hit_room(&center, &ray_world);
                let mm = (t * settings.depth_map_factor).round().min(u16::MAX as f64) as u16;
                depth.put_pixel(u, v, Luma([mm]));
                color.put_pixel(u, v, wall_color(&hit));
            }
        }

        color.save(frame_file(root, RGB_DIR, frame_idx as u64, IMAGE_EXT))?;
        depth.save(frame_file(root, DEPTH_DIR, frame_idx as u64, IMAGE_EXT))?;
        write_pose(
            &frame_file(root, POSE_DIR, frame_idx as u64, POSE_EXT),
            &Pose::from_camera_to_world(twc.to_homogeneous()),
        )?;
    }

    object_to_json(root.join("settings.json"), &settings)?;

    log::info!("Generated {} frames in {}", num_frames, output_dir);
    Ok(())
}

/// Distance along `dir` (camera z units, since `dir.z` of the camera ray is 1)
/// from `origin` to the inside of the room, and the hit point.
fn hit_room(origin: &na::Vector3<f64>, dir: &na::Vector3<f64>) -> (f64, na::Vector3<f64>) {
    let mut t = f64::INFINITY;
    for axis in 0..3 {
        let d = dir[axis];
        if d.abs() < 1e-12 {
            continue;
        }
        let bound = if d > 0.0 { ROOM[axis] } else { -ROOM[axis] };
        t = t.min((bound - origin[axis]) / d);
    }
    (t, origin + dir * t)
}

/// Checkerboard texture, tinted per wall.
fn wall_color(p: &na::Vector3<f64>) -> Rgb<u8> {
    let cell = ((p.x * 2.0).floor() + (p.y * 2.0).floor() + (p.z * 2.0).floor()) as i64;
    let light = cell.rem_euclid(2) == 0;
    let tint = if (p.x.abs() - ROOM[0]).abs() < 1e-6 {
        [200, 80, 80]
    } else if (p.y.abs() - ROOM[1]).abs() < 1e-6 {
        [80, 200, 80]
    } else {
        [80, 80, 200]
    };
    if light {
        Rgb(tint)
    } else {
        Rgb(tint.map(|c| c / 2))
    }
}

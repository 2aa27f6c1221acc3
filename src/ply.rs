//! Colored point cloud export in ASCII PLY.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredPoint {
    pub position: [f32; 3],
    pub color: [u8; 3],
}

pub fn write_point_cloud(path: impl AsRef<Path>, points: &[ColoredPoint]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "comment rgbd-block-fusion export")?;
    writeln!(writer, "element vertex {}", points.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property uchar red")?;
    writeln!(writer, "property uchar green")?;
    writeln!(writer, "property uchar blue")?;
    writeln!(writer, "end_header")?;

    for p in points {
        let [x, y, z] = p.position;
        let [r, g, b] = p.color;
        writeln!(writer, "{} {} {} {} {} {}", x, y, z, r, g, b)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_counts_vertices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.ply");
        let points = [
            ColoredPoint {
                position: [0.0, 1.0, 2.0],
                color: [255, 0, 0],
            },
            ColoredPoint {
                position: [0.5, -1.0, 3.0],
                color: [0, 255, 0],
            },
        ];
        write_point_cloud(&path, &points).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("ply\nformat ascii 1.0\n"));
        assert!(text.contains("element vertex 2\n"));
        let body: Vec<&str> = text.split("end_header\n").nth(1).unwrap().lines().collect();
        assert_eq!(body, vec!["0 1 2 255 0 0", "0.5 -1 3 0 255 0"]);
    }
}

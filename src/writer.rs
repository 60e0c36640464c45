use crate::{error::Result, transform::WorldPoint};
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// `<run_start>_<lidar>_pointcloud.asc`
pub fn pointcloud_filename(run_start: u64, lidar: &str) -> String {
    format!("{run_start}_{lidar}_pointcloud.asc")
}

/// Writes one record per line:
/// `x y z range angle timestamp_ms r g b`.
pub fn write_point<W: Write>(out: &mut W, p: &WorldPoint) -> std::io::Result<()> {
    writeln!(
        out,
        "{:.6} {:.6} {:.6} {:.6} {:.6} {} {} {} {}",
        p.x, p.y, p.z, p.range, p.angle, p.timestamp_ms, p.color[0], p.color[1], p.color[2]
    )
}

/// Output file for a single lidar. Opened once per run and kept open; the
/// buffer is flushed after each scan.
pub struct AscWriter {
    path: PathBuf,
    out: BufWriter<File>,
    points: u64,
}

impl AscWriter {
    /// Truncates an existing file unless `append` is set, in which case new
    /// scans are superimposed onto what is already there.
    pub fn create(path: impl AsRef<Path>, append: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;
        debug!("opened {}", path.display());
        Ok(AscWriter {
            path,
            out: BufWriter::new(file),
            points: 0,
        })
    }

    /// Appends a scan and flushes it. Returns the number of points written.
    pub fn write_scan<I>(&mut self, points: I) -> Result<usize>
    where
        I: IntoIterator<Item = WorldPoint>,
    {
        let mut n = 0;
        for p in points {
            write_point(&mut self.out, &p)?;
            n += 1;
        }
        self.out.flush()?;
        self.points += n as u64;
        Ok(n)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total points written through this writer.
    pub fn points(&self) -> u64 {
        self.points
    }

    /// Flushes and closes the file.
    pub fn finish(mut self) -> Result<u64> {
        self.out.flush()?;
        Ok(self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, ts: u64) -> WorldPoint {
        WorldPoint {
            x,
            y: 4.0,
            z: -1.0,
            range: 5.0,
            angle: 0.0,
            timestamp_ms: ts,
            color: [255, 255, 0],
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("asc-writer-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("out.asc")
    }

    #[test]
    fn record_format() {
        let mut buf = Vec::new();
        write_point(&mut buf, &point(3.0, 1700000000123)).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "3.000000 4.000000 -1.000000 5.000000 0.000000 1700000000123 255 255 0\n"
        );
    }

    #[test]
    fn filename_pattern() {
        assert_eq!(
            pointcloud_filename(1700000000, "LidarSensor1"),
            "1700000000_LidarSensor1_pointcloud.asc"
        );
    }

    #[test]
    fn truncates_then_appends_scans() {
        let path = scratch("truncate");
        std::fs::write(&path, "stale\n").unwrap();

        let mut w = AscWriter::create(&path, false).unwrap();
        assert_eq!(w.write_scan([point(1.0, 1)]).unwrap(), 1);
        assert_eq!(w.write_scan([point(2.0, 2), point(3.0, 2)]).unwrap(), 2);
        assert_eq!(w.finish().unwrap(), 3);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("1.000000 "));
        assert!(lines[2].starts_with("3.000000 "));
    }

    #[test]
    fn append_keeps_existing_points() {
        let path = scratch("append");
        std::fs::write(&path, "0.000000 0.000000 0.000000 0.000000 0.000000 0 255 255 0\n").unwrap();

        let mut w = AscWriter::create(&path, true).unwrap();
        w.write_scan([point(1.0, 1)]).unwrap();
        w.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn scan_is_flushed_without_finish() {
        let path = scratch("flush");
        let mut w = AscWriter::create(&path, false).unwrap();
        w.write_scan([point(1.0, 1)]).unwrap();
        let text = std::fs::read_to_string(w.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert_eq!(w.points(), 1);
    }
}

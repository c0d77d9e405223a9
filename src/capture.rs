// ============================================================================
// capture.rs — Life GPU
// Grid snapshots written as grayscale PNG files.
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::reference::CpuGrid;
use crate::rules::AutomatonRule;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to create {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// `<dir>/life_<rule>_gen<N>_<timestamp>.png`, rule name in snake case.
pub fn screenshot_path(
    dir: &Path,
    generation: u64,
    rule: &AutomatonRule,
    now: DateTime<Local>,
) -> PathBuf {
    let rule_name: String = rule
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    dir.join(format!(
        "life_{}_gen{:06}_{}.png",
        rule_name,
        generation,
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// One pixel per cell: white Active, black Inactive.
pub fn save_grid_png(path: &Path, grid: &CpuGrid) -> Result<(), CaptureError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CaptureError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    image::save_buffer(
        path,
        &grid.to_texels(),
        grid.size(),
        grid.size(),
        image::ColorType::L8,
    )
    .map_err(|source| CaptureError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Snapshot saved: {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::find_rule;
    use chrono::TimeZone;

    #[test]
    fn test_screenshot_path() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let rule = find_rule("Day and Night").unwrap();
        let path = screenshot_path(Path::new("shots"), 42, rule, now);
        assert_eq!(path, PathBuf::from("shots/life_day_and_night_gen000042_20240309_140507.png"));
    }

    #[test]
    fn test_save_grid_png_roundtrip() {
        let dir = std::env::temp_dir().join(format!("life_gpu_capture_{}", std::process::id()));
        let path = dir.join("nested").join("grid.png");
        let mut grid = CpuGrid::new(16);
        grid.set(3, 5, true);
        grid.set(15, 0, true);
        save_grid_png(&path, &grid).unwrap();

        let img = image::open(&path).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(img.get_pixel(3, 5).0, [255]);
        assert_eq!(img.get_pixel(15, 0).0, [255]);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        let _ = fs::remove_dir_all(&dir);
    }
}

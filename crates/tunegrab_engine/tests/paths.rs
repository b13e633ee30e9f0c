use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tunegrab_engine::{default_output_dir, ffmpeg_location, settings_path, BundleLayout};

#[test]
fn default_output_dir_is_under_music() {
    let dir = default_output_dir();
    assert_eq!(dir.file_name().unwrap(), "YouTube Downloads");
    assert_eq!(dir.parent().unwrap().file_name().unwrap(), "Music");
}

#[test]
fn standalone_settings_live_in_home() {
    let path = settings_path(&BundleLayout::Standalone);
    assert_eq!(path.file_name().unwrap(), ".yt_mp3_settings.json");
    if let Some(home) = dirs::home_dir() {
        assert_eq!(path, home.join(".yt_mp3_settings.json"));
    }
}

#[test]
fn bundled_settings_live_next_to_executable() {
    let temp = TempDir::new().unwrap();
    let layout = BundleLayout::Bundled {
        dir: temp.path().to_path_buf(),
    };
    assert_eq!(settings_path(&layout), temp.path().join(".yt_mp3_settings.json"));
}

#[test]
fn dir_with_ffmpeg_is_a_bundle() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("ffmpeg"), b"").unwrap();

    let layout = BundleLayout::from_dir(temp.path().to_path_buf());
    assert_eq!(
        layout,
        BundleLayout::Bundled {
            dir: temp.path().to_path_buf()
        }
    );
    assert_eq!(ffmpeg_location(&layout), Some(temp.path().to_path_buf()));
}

#[test]
fn dir_without_ffmpeg_is_standalone() {
    let temp = TempDir::new().unwrap();
    let layout = BundleLayout::from_dir(temp.path().to_path_buf());
    assert_eq!(layout, BundleLayout::Standalone);
    assert_eq!(ffmpeg_location(&layout), None);
}

#[test]
fn bundle_that_lost_ffmpeg_has_no_location() {
    let layout = BundleLayout::Bundled {
        dir: PathBuf::from("/definitely/not/here"),
    };
    assert_eq!(ffmpeg_location(&layout), None);
}

//! Configuration: `settings.json`, slug lists, environment overrides, and
//! the on-disk paths the rest of the system works under.
//!
//! Resolution order is file, then environment, matching the layered config
//! loading used across the pack. A missing settings file is created with
//! defaults; unknown keys are ignored.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which external downloader binary to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Downloader {
    #[default]
    #[serde(rename = "yt-dlp")]
    YtDlp,
    #[serde(rename = "youtube-dl")]
    YoutubeDl,
}

impl Downloader {
    pub fn command(&self) -> &'static str {
        match self {
            Downloader::YtDlp => "yt-dlp",
            Downloader::YoutubeDl => "youtube-dl",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YtdlpSettings {
    pub format: String,
    pub extract_audio: bool,
    pub audio_format: String,
    pub audio_quality: String,
    pub add_metadata: bool,
    pub embed_thumbnail: bool,
    pub write_thumbnail: bool,
    pub cookies_file: Option<PathBuf>,
    pub cookies_from_browser: Option<String>,
}

impl Default for YtdlpSettings {
    fn default() -> Self {
        Self {
            format: "bestaudio/best".to_string(),
            extract_audio: true,
            audio_format: "mp3".to_string(),
            audio_quality: "0".to_string(),
            add_metadata: true,
            embed_thumbnail: false,
            write_thumbnail: false,
            cookies_file: None,
            cookies_from_browser: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathsSettings {
    pub mount_point: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    /// Rsync destination for the optional sync feature.
    pub sync_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeaturesSettings {
    pub organize_by_tags: bool,
    pub rsync_enabled: bool,
}

impl Default for FeaturesSettings {
    fn default() -> Self {
        Self {
            organize_by_tags: true,
            rsync_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MountSettings {
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub downloader: Downloader,
    pub ytdlp: YtdlpSettings,
    pub paths: PathsSettings,
    pub features: FeaturesSettings,
    pub mount: MountSettings,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    fn write_default(path: &Path) -> Result<Self> {
        let settings = Settings::default();
        let body = serde_json::to_string_pretty(&settings)
            .map_err(|e| Error::Config(format!("default settings: {e}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        Ok(settings)
    }
}

/// Parse a slug-per-line list file. Blank lines are ignored.
pub fn parse_slug_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

fn env_path(names: &[&str]) -> Option<PathBuf> {
    env_first(names).map(PathBuf::from)
}

/// True when one path contains the other. The mount point and the download
/// root must never overlap.
pub fn paths_overlap(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Read access to the favorites and downloads slug lists. The projection
/// re-reads them on every listing, so edits show up without a remount.
pub trait SlugLists: Send + Sync {
    fn favorites(&self) -> Result<Vec<String>>;
    fn downloads(&self) -> Result<Vec<String>>;
}

impl SlugLists for Config {
    fn favorites(&self) -> Result<Vec<String>> {
        Config::favorites(self)
    }

    fn downloads(&self) -> Result<Vec<String>> {
        Config::downloads(self)
    }
}

/// Resolved configuration: parsed settings plus every path the system
/// touches, with environment overrides applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    pub mount_point: PathBuf,
    pub download_root: PathBuf,
    pub cache_dir: PathBuf,
    pub state_dir: PathBuf,
    favorites_file: PathBuf,
    downloads_file: PathBuf,
    api_url: Option<String>,
    api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| home.join(".config"))
            .join("radio4000");

        let settings_file =
            env_path(&["R4_CONFIG_FILE"]).unwrap_or_else(|| config_dir.join("settings.json"));
        let settings = if settings_file.exists() {
            Settings::from_file(&settings_file)?
        } else {
            Settings::write_default(&settings_file)?
        };

        let mount_point = env_path(&["R4_MOUNT_POINT"])
            .or_else(|| settings.paths.mount_point.clone())
            .unwrap_or_else(|| home.join("mnt").join("radio4000"));
        let download_root = env_path(&["R4_DOWNLOAD_DIR"])
            .or_else(|| settings.paths.download_dir.clone())
            .unwrap_or_else(|| home.join("Music").join("radio4000"));
        let cache_dir = env_path(&["R4_CACHE_DIR"]).unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| home.join(".cache"))
                .join("radio4000")
        });
        let state_dir = env_path(&["R4_STATE_DIR"]).unwrap_or_else(|| {
            dirs::state_dir()
                .unwrap_or_else(|| home.join(".local").join("state"))
                .join("radio4000")
        });

        Ok(Self {
            settings,
            favorites_file: config_dir.join("favorites.txt"),
            downloads_file: config_dir.join("downloads.txt"),
            settings_file,
            config_dir,
            mount_point,
            download_root,
            cache_dir,
            state_dir,
            api_url: env_first(&["SUPABASE_URL", "VITE_SUPABASE_URL"]),
            api_key: env_first(&["SUPABASE_KEY", "VITE_SUPABASE_KEY"]),
        })
    }

    /// Build a config rooted at explicit directories, with default
    /// settings and no environment consultation.
    pub fn with_dirs(config_dir: &Path, mount_point: &Path, download_root: &Path) -> Self {
        Self {
            settings: Settings::default(),
            favorites_file: config_dir.join("favorites.txt"),
            downloads_file: config_dir.join("downloads.txt"),
            settings_file: config_dir.join("settings.json"),
            config_dir: config_dir.to_path_buf(),
            mount_point: mount_point.to_path_buf(),
            download_root: download_root.to_path_buf(),
            cache_dir: config_dir.join("cache"),
            state_dir: config_dir.join("state"),
            api_url: None,
            api_key: None,
        }
    }

    /// Catalog credentials; missing credentials are fatal at startup.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.api_url.as_deref(), self.api_key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(Error::NotInitialized(
                "SUPABASE_URL and SUPABASE_KEY (or VITE_-prefixed) must be set".to_string(),
            )),
        }
    }

    /// Create every directory and list file the system expects.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.mount_point,
            &self.download_root,
            &self.cache_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        for file in [&self.favorites_file, &self.downloads_file] {
            if !file.exists() {
                fs::write(file, "")?;
            }
        }
        if paths_overlap(&self.mount_point, &self.download_root) {
            return Err(Error::Config(format!(
                "mount point {} and download root {} overlap",
                self.mount_point.display(),
                self.download_root.display()
            )));
        }
        Ok(())
    }

    fn read_list(&self, path: &Path) -> Result<Vec<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(parse_slug_list(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Favorite channel slugs, read fresh on every call.
    pub fn favorites(&self) -> Result<Vec<String>> {
        self.read_list(&self.favorites_file)
    }

    /// Download-list channel slugs, read fresh on every call.
    pub fn downloads(&self) -> Result<Vec<String>> {
        self.read_list(&self.downloads_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serialize_with_camel_case_field_names() {
        let json = serde_json::to_string_pretty(&Settings::default()).unwrap();
        assert!(json.contains("\"downloader\": \"yt-dlp\""));
        assert!(json.contains("\"extractAudio\""));
        assert!(json.contains("\"audioQuality\""));
        assert!(json.contains("\"organizeByTags\""));
        assert!(json.contains("\"rsyncEnabled\""));
        assert!(json.contains("\"mountPoint\""));
    }

    #[test]
    fn partial_settings_fill_in_defaults_and_ignore_unknown_keys() {
        let parsed: Settings = serde_json::from_str(
            r#"{
                "downloader": "youtube-dl",
                "ytdlp": {"audioFormat": "opus", "somethingNew": 1},
                "futureSection": {"a": true}
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.downloader, Downloader::YoutubeDl);
        assert_eq!(parsed.downloader.command(), "youtube-dl");
        assert_eq!(parsed.ytdlp.audio_format, "opus");
        assert_eq!(parsed.ytdlp.format, "bestaudio/best");
        assert!(parsed.features.organize_by_tags);
    }

    #[test]
    fn slug_lists_skip_blank_lines() {
        let parsed = parse_slug_list("oskar\n\n  \n  detecteve \nksr\n");
        assert_eq!(parsed, vec!["oskar", "detecteve", "ksr"]);
        assert!(parse_slug_list("").is_empty());
    }

    #[test]
    fn overlap_detection() {
        let mount = Path::new("/home/u/mnt/radio4000");
        assert!(paths_overlap(mount, Path::new("/home/u/mnt/radio4000/dl")));
        assert!(paths_overlap(Path::new("/home/u"), mount));
        assert!(!paths_overlap(mount, Path::new("/home/u/Music/radio4000")));
    }

    #[test]
    fn missing_settings_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings::write_default(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.ytdlp.audio_format, "mp3");
        let reread = Settings::from_file(&path).unwrap();
        assert_eq!(reread.downloader, Downloader::YtDlp);
    }
}

use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};

pub struct FileDownloadConfig {
    /// Base url, files are fetched from `{url}/{uri}`.
    pub url: String,
}

pub struct FileDownload {
    url: String,
}

impl FileDownload {
    pub fn new(config: FileDownloadConfig) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
        }
    }

    pub fn download_url(&self, uri: &str) -> String {
        format!("{}/{}", self.url, uri.trim_start_matches('/'))
    }

    /// Fetch `{url}/{uri}` into `file_path` unless the file is already there.
    ///
    /// The body is streamed into `<file_path>.temp` and renamed once complete,
    /// so an interrupted download never leaves a truncated file at `file_path`.
    pub async fn download_to_path_if_not_exists(
        &self,
        uri: &str,
        file_path: impl AsRef<Path>,
    ) -> anyhow::Result<PathBuf> {
        let file_path = file_path.as_ref().to_path_buf();
        debug!("check file path: {:?}", file_path);
        if file_path.exists() {
            return Ok(file_path);
        }

        let download_url = self.download_url(uri);
        info!("downloading {} to {:?}", download_url, file_path);

        let mut response = reqwest::get(&download_url).await?.error_for_status()?;

        if let Some(parent_dir) = file_path.parent() {
            fs::create_dir_all(parent_dir).await?;
        }

        let temp_download_path = file_path.with_extension("temp");
        let mut file = File::create(&temp_download_path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        fs::rename(&temp_download_path, &file_path).await?;

        info!("file {:?} downloaded ({} bytes)", file_path, written);

        Ok(file_path)
    }
}

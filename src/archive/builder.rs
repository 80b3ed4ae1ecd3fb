//! Zip packaging of a finished result set.
//!
//! Layout:
//! - `classes.txt`: detection classes, one per line, line number = index.
//! - `labels/<slug>-<n>.txt`: label lines for the n-th image of a category.
//! - `images/<slug>-<n>.png`: the image bytes.
//!
//! Image bytes are fetched concurrently and joined before anything is
//! written; one failed fetch aborts the whole archive.
use std::io::{Cursor, Write};

use futures::future::try_join_all;
use reqwest::Client;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult};
use crate::generation::results::ResultSet;
use crate::prompt::catalog::DETECTION_CLASSES;
use crate::utils::media::decode_data_uri;

pub const ARCHIVE_FILE_NAME: &str = "ai-generated-images-with-labels.zip";

struct Entry<'a> {
    base_name: String,
    label: &'a str,
    image_uri: &'a str,
}

#[derive(Clone, Default)]
pub struct ArchiveBuilder {
    client: Client,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an image URI to bytes: `data:` URIs are decoded in place,
    /// `http(s)` URIs are downloaded.
    pub async fn fetch_image(&self, uri: &str) -> AppResult<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri);
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let response = self.client.get(uri)
                .send()
                .await
                .map_err(AppError::HttpClient)?;
            if response.status().is_success() {
                return response.bytes().await.map(|b| b.to_vec()).map_err(AppError::HttpClient);
            }
            return Err(AppError::Archive(format!("Failed to get image: {:?}", response.status())));
        }
        Err(AppError::Archive("Unsupported image URI scheme".to_string()))
    }

    /// Build the archive bytes for `results`.
    pub async fn build(&self, results: &ResultSet) -> AppResult<Vec<u8>> {
        let entries: Vec<Entry<'_>> = results
            .iter()
            .flat_map(|(category, images)| {
                images.iter().enumerate().map(move |(i, img)| Entry {
                    base_name: format!("{}-{}", category.slug(), i + 1),
                    label: &img.label,
                    image_uri: &img.image_uri,
                })
            })
            .collect();

        let fetches = entries.iter().map(|entry| async move {
            self.fetch_image(entry.image_uri).await.map_err(|e| {
                AppError::Archive(format!("Failed to fetch image {}: {}", entry.base_name, e))
            })
        });
        let images = try_join_all(fetches).await?;
        tracing::info!(files = entries.len(), "Fetched all images, writing archive");

        write_archive(&entries, &images)
    }
}

fn write_archive(entries: &[Entry<'_>], images: &[Vec<u8>]) -> AppResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("classes.txt", options)?;
    zip.write_all(DETECTION_CLASSES.join("\n").as_bytes())?;

    for entry in entries {
        zip.start_file(format!("labels/{}.txt", entry.base_name), options)?;
        zip.write_all(entry.label.as_bytes())?;
    }
    for (entry, bytes) in entries.iter().zip(images) {
        zip.start_file(format!("images/{}.png", entry.base_name), options)?;
        zip.write_all(bytes)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::results::GeneratedImage;
    use crate::generation::GeneratedVariant;
    use crate::prompt::catalog::Category;
    use std::io::Read;
    use zip::ZipArchive;

    fn image(uri: &str, label: &str) -> GeneratedImage {
        GeneratedImage::new("p", GeneratedVariant { image_uri: uri.to_string(), label: label.to_string() })
    }

    fn names(bytes: Vec<u8>) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut out: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        out.sort();
        out
    }

    #[tokio::test]
    async fn single_image_layout() {
        let mut results = ResultSet::new();
        results.push(Category::Yawning, image("data:image/png;base64,AQID", "0 0.5 0.5 0.2 0.2")).unwrap();

        let bytes = ArchiveBuilder::new().build(&results).await.unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.clone())).unwrap();

        let mut classes = String::new();
        archive.by_name("classes.txt").unwrap().read_to_string(&mut classes).unwrap();
        assert_eq!(classes.lines().count(), 5);
        assert_eq!(classes.lines().nth(1), Some("hand"));

        let mut png = Vec::new();
        archive.by_name("images/yawning-1.png").unwrap().read_to_end(&mut png).unwrap();
        assert_eq!(png, vec![1, 2, 3]);

        assert_eq!(
            names(bytes),
            vec!["classes.txt", "images/yawning-1.png", "labels/yawning-1.txt"]
        );
    }

    #[tokio::test]
    async fn positions_are_per_category_and_empty_labels_kept() {
        let mut results = ResultSet::new();
        results.push(Category::HoldingPhone, image("data:image/png;base64,AA==", "")).unwrap();
        results.push(Category::HoldingPhone, image("data:image/png;base64,AQ==", "2 0.1 0.1 0.1 0.1")).unwrap();
        results.push(Category::Anxious, image("data:image/png;base64,Ag==", "")).unwrap();

        let bytes = ArchiveBuilder::new().build(&results).await.unwrap();
        let listed = names(bytes.clone());
        assert!(listed.contains(&"labels/holding-phone-2.txt".to_string()));
        assert!(listed.contains(&"images/anxious-1.png".to_string()));
        assert_eq!(listed.len(), 7);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut label = String::new();
        archive.by_name("labels/holding-phone-1.txt").unwrap().read_to_string(&mut label).unwrap();
        assert_eq!(label, "");
    }

    #[tokio::test]
    async fn one_bad_image_aborts_everything() {
        let mut results = ResultSet::new();
        results.push(Category::Focused, image("data:image/png;base64,AA==", "")).unwrap();
        results.push(Category::Focused, image("data:image/png;base64,!!!", "")).unwrap();

        let err = ArchiveBuilder::new().build(&results).await.unwrap_err();
        assert!(err.to_string().contains("focused-2"));

        let mut other = ResultSet::new();
        other.push(Category::Focused, image("blob:whatever", "")).unwrap();
        assert!(ArchiveBuilder::new().build(&other).await.is_err());
    }
}

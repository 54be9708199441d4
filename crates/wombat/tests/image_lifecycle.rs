//! Image upload, replacement and cleanup against a real directory tree

mod common;

use common::{FlakyBackend, StubConverter, file_names};
use image::{ImageFormat, Rgb, RgbImage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use wombat::*;

fn gallery_upload(name: &str) -> UploadForm {
    UploadForm {
        name: None,
        kind: UploadKind::Gallery,
        file: Some(UploadedFile {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            data: b"pretend pixels".to_vec(),
        }),
    }
}

fn thumb_upload(name: &str) -> UploadForm {
    UploadForm {
        kind: UploadKind::Thumbnail,
        ..gallery_upload(name)
    }
}

async fn created(backend: &FlakyBackend, title: &str) -> Document {
    let document = Document::new(title, Arc::new(backend.clone()));
    document.create().await.unwrap();
    document
}

#[tokio::test]
async fn test_gallery_upload_appends_then_updates_in_place() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Trip Report").await;

    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(640, 480)));
    let image = assets.upload(&mut article, gallery_upload("Beach Day.png")).await.unwrap();
    assert_eq!(image, Image::new("Beach-Day.jpg", "", 640, 480));

    let dir = assets.dir_for(article.title_path()).unwrap();
    assert_eq!(file_names(&dir), vec!["Beach-Day.jpg"]);

    // Same name again: dimensions change, no duplicate entry
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(1280, 960)));
    assets.upload(&mut article, gallery_upload("Beach Day.gif")).await.unwrap();
    assert_eq!(article.images(), &[Image::new("Beach-Day.jpg", "", 1280, 960)]);
    assert_eq!(file_names(&dir), vec!["Beach-Day.jpg"]);

    let stored = backend.inner().by_title_path(article.title_path(), true).await.unwrap();
    assert_eq!(stored.images(), article.images());

    // Deleting removes exactly one entry and its file
    assets.upload(&mut article, gallery_upload("sunset.png")).await.unwrap();
    assert!(assets.remove_image(&mut article, "Beach-Day.jpg").await.unwrap());
    assert_eq!(article.images().len(), 1);
    assert_eq!(article.images()[0].src, "sunset.jpg");
    assert_eq!(file_names(&dir), vec!["sunset.jpg"]);

    assert!(!assets.remove_image(&mut article, "Beach-Day.jpg").await.unwrap());
}

#[tokio::test]
async fn test_form_name_overrides_file_name() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Named").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));

    let mut form = gallery_upload("IMG_0001.png");
    form.name = Some("front cover".to_string());
    let image = assets.upload(&mut article, form).await.unwrap();
    assert_eq!(image.src, "front-cover.jpg");
}

#[tokio::test]
async fn test_thumbnail_replaces_previous_file_after_persisting() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Cover Story").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(800, 150)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    let first = assets.upload(&mut article, thumb_upload("first.png")).await.unwrap();
    assert_eq!(first, Image::new("thumb.first.jpg", "thumb.first.jpg", 200, 150));
    assert_eq!(article.image(), &first);
    assert_eq!(file_names(&dir), vec!["thumb.first.jpg"]);

    let second = assets.upload(&mut article, thumb_upload("second.png")).await.unwrap();
    assert_eq!(article.image(), &second);
    assert_eq!(file_names(&dir), vec!["thumb.second.jpg"]);
}

#[tokio::test]
async fn test_thumbnail_width_is_configurable() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Chapter);
    let mut chapter = created(&backend, "Wide").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(800, 600)))
        .with_thumb_width(320);

    let thumb = assets.upload(&mut chapter, thumb_upload("wide.png")).await.unwrap();
    assert_eq!(thumb.width, 320);
}

#[tokio::test]
async fn test_failed_thumbnail_persist_keeps_old_thumbnail() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Stubborn").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(200, 100)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    let original = assets.upload(&mut article, thumb_upload("keep.png")).await.unwrap();

    backend.fail_writes(true);
    let err = assets.upload(&mut article, thumb_upload("new.png")).await.unwrap_err();
    assert_eq!(err.status(), Status::DatastoreError);

    // Old metadata and file survive; the new file is cleaned up
    assert_eq!(article.image(), &original);
    assert_eq!(file_names(&dir), vec!["thumb.keep.jpg"]);
}

#[tokio::test]
async fn test_failed_gallery_persist_removes_new_file() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Offline").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    backend.fail_writes(true);
    assert!(assets.upload(&mut article, gallery_upload("lost.png")).await.is_err());
    assert!(article.images().is_empty());
    assert!(file_names(&dir).is_empty());
}

#[tokio::test]
async fn test_failed_delete_persist_keeps_file() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Sticky").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    assets.upload(&mut article, gallery_upload("stay.png")).await.unwrap();

    backend.fail_writes(true);
    assert!(assets.remove_image(&mut article, "stay.jpg").await.is_err());
    assert_eq!(article.images().len(), 1);
    assert_eq!(file_names(&dir), vec!["stay.jpg"]);
}

#[tokio::test]
async fn test_conversion_failure_cleans_staged_upload() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Broken Upload").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::failing()));

    let err = assets.upload(&mut article, gallery_upload("bad.png")).await.unwrap_err();
    assert_eq!(err.status(), Status::ConversionError);

    let dir = assets.dir_for(article.title_path()).unwrap();
    assert!(file_names(&dir).is_empty());
    assert!(article.images().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_bad_requests() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Picky").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));

    let mut missing = gallery_upload("x.png");
    missing.file = None;
    let err = assets.upload(&mut article, missing).await.unwrap_err();
    assert_eq!(err.status(), Status::BadRequest);

    let mut pdf = gallery_upload("doc.pdf");
    if let Some(file) = pdf.file.as_mut() {
        file.content_type = Some("application/pdf".to_string());
    }
    let err = assets.upload(&mut article, pdf).await.unwrap_err();
    assert_eq!(err.status(), Status::BadRequest);

    // Nothing was staged
    assert!(!root.path().join(article.title_path()).exists());
}

#[tokio::test]
async fn test_sweep_removes_only_unreferenced_files() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Messy").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)))
        .with_stale_upload_age(Duration::ZERO);
    let dir = assets.dir_for(article.title_path()).unwrap();

    assets.upload(&mut article, thumb_upload("cover.png")).await.unwrap();
    assets.upload(&mut article, gallery_upload("kept.png")).await.unwrap();

    std::fs::write(dir.join("stray.jpg"), b"orphan").unwrap();
    std::fs::write(dir.join(".kept.png.1a2b3c4d"), b"staged leftover").unwrap();
    std::fs::create_dir(dir.join("nested")).unwrap();

    let mut removed = assets.sweep_orphans(&article).await.unwrap();
    removed.sort();
    assert_eq!(
        removed,
        vec![dir.join(".kept.png.1a2b3c4d"), dir.join("stray.jpg")]
    );
    assert_eq!(
        file_names(&dir),
        vec!["kept.jpg", "nested", "thumb.cover.jpg"]
    );

    // Nothing left to sweep
    assert!(assets.sweep_orphans(&article).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sweep_keeps_recent_upload_files() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Busy").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    assets.upload(&mut article, gallery_upload("done.png")).await.unwrap();
    std::fs::write(dir.join(".next.png.5e6f7a8b"), b"uploading").unwrap();
    std::fs::write(dir.join(".next.jpg.9c0d1e2f.part"), b"converting").unwrap();
    std::fs::write(dir.join("stray.jpg"), b"orphan").unwrap();

    let removed = assets.sweep_orphans(&article).await.unwrap();
    assert_eq!(removed, vec![dir.join("stray.jpg")]);
    assert_eq!(
        file_names(&dir),
        vec![".next.jpg.9c0d1e2f.part", ".next.png.5e6f7a8b", "done.jpg"]
    );
}

#[tokio::test]
async fn test_sweep_and_purge_without_directory() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let article = created(&backend, "Imageless").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));

    assert!(assets.sweep_orphans(&article).await.unwrap().is_empty());
    assets.purge(article.title_path()).await.unwrap();
}

#[tokio::test]
async fn test_purge_removes_document_directory() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Doomed").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));

    assets.upload(&mut article, gallery_upload("a.png")).await.unwrap();
    let dir = assets.dir_for(article.title_path()).unwrap();
    assert!(dir.exists());

    article.delete().await.unwrap();
    assets.purge(article.title_path()).await.unwrap();
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_real_png_becomes_jpeg_thumbnail() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Real Pixels").await;
    let assets = ImageAssets::new(root.path(), Arc::new(JpegConverter::default()));

    let mut png = Vec::new();
    RgbImage::from_pixel(400, 300, Rgb([30, 120, 200]))
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();

    let form = UploadForm {
        name: Some("Hero Shot".to_string()),
        kind: UploadKind::Thumbnail,
        file: Some(UploadedFile {
            file_name: "hero.png".to_string(),
            content_type: Some("image/png".to_string()),
            data: png,
        }),
    };

    let thumb = assets.upload(&mut article, form).await.unwrap();
    assert_eq!(thumb, Image::new("thumb.Hero-Shot.jpg", "thumb.Hero-Shot.jpg", 200, 150));

    let dir = assets.dir_for(article.title_path()).unwrap();
    let written = image::open(dir.join(&thumb.src)).unwrap();
    assert_eq!((written.width(), written.height()), (200, 150));
    assert_eq!(file_names(&dir), vec!["thumb.Hero-Shot.jpg"]);
}

#[tokio::test]
async fn test_actions_apply_to_document() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Edited").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(10, 10)));
    assets.upload(&mut article, gallery_upload("pic.png")).await.unwrap();

    for message in [
        br#"{"action":"setSynopsis","data":"Short"}"#.as_slice(),
        br#"{"action":"setContent","data":"Long"}"#.as_slice(),
        br#"{"action":"setActive","data":""}"#.as_slice(),
        br#"{"action":"deleteImage","data":"pic.jpg"}"#.as_slice(),
    ] {
        Action::from_json(message)
            .unwrap()
            .apply(&mut article, &assets)
            .await
            .unwrap();
    }

    assert_eq!(article.synopsis(), "Short");
    assert_eq!(article.content(), "Long");
    assert!(article.is_published());
    assert!(article.images().is_empty());

    // setActive toggles
    Action::TogglePublished.apply(&mut article, &assets).await.unwrap();
    assert!(!article.is_published());
}

#[tokio::test]
async fn test_gallery_upload_cannot_take_thumbnail_name() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Lookalike").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(800, 600)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    let thumb = assets.upload(&mut article, thumb_upload("cover.png")).await.unwrap();
    let before = std::fs::read(dir.join(&thumb.src)).unwrap();

    let err = assets
        .upload(&mut article, gallery_upload("thumb.cover.png"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Status::BadRequest);

    assert!(article.images().is_empty());
    assert_eq!(article.image(), &thumb);
    assert_eq!(std::fs::read(dir.join(&thumb.src)).unwrap(), before);
    assert_eq!(file_names(&dir), vec!["thumb.cover.jpg"]);
}

#[tokio::test]
async fn test_shared_file_is_kept_while_referenced() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Shared").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(300, 300)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    // Metadata written before thumbnail names were reserved
    let first = assets.upload(&mut article, thumb_upload("first.png")).await.unwrap();
    article
        .set_images(vec![Image::new(&first.src, "", 300, 300)])
        .await
        .unwrap();

    // A new thumbnail leaves the file the gallery still shows
    assets.upload(&mut article, thumb_upload("second.png")).await.unwrap();
    assert_eq!(
        file_names(&dir),
        vec!["thumb.first.jpg", "thumb.second.jpg"]
    );

    // Point the thumbnail back at the shared file, then drop the gallery entry
    article.set_image(first.clone()).await.unwrap();
    assert!(assets.remove_image(&mut article, &first.src).await.unwrap());
    assert!(article.images().is_empty());
    assert!(dir.join(&first.src).exists());
}

#[tokio::test]
async fn test_failed_reupload_keeps_existing_file() {
    let root = tempdir().unwrap();
    let backend = FlakyBackend::new(DocumentKind::Article);
    let mut article = created(&backend, "Steady").await;
    let assets = ImageAssets::new(root.path(), Arc::new(StubConverter::new(640, 480)));
    let dir = assets.dir_for(article.title_path()).unwrap();

    assets.upload(&mut article, gallery_upload("photo.png")).await.unwrap();
    let original = std::fs::read(dir.join("photo.jpg")).unwrap();

    let mut replacement = gallery_upload("photo.png");
    if let Some(file) = replacement.file.as_mut() {
        file.data = b"different pixels".to_vec();
    }

    backend.fail_writes(true);
    assert!(assets.upload(&mut article, replacement).await.is_err());

    // File on disk still matches the persisted entry
    assert_eq!(std::fs::read(dir.join("photo.jpg")).unwrap(), original);
    assert_eq!(article.images(), &[Image::new("photo.jpg", "", 640, 480)]);
    assert_eq!(file_names(&dir), vec!["photo.jpg"]);
}

#[tokio::test]
async fn test_slash_title_cannot_be_created() {
    let backend = FlakyBackend::new(DocumentKind::Article);
    let article = Document::new("TCP/IP Basics", Arc::new(backend.clone()));

    let err = article.create().await.unwrap_err();
    assert_eq!(err.status(), Status::BadRequest);
    assert!(backend.inner().is_empty());
}

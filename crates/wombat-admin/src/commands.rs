//! Command line surface

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use wombat::title_path::check_title_path;
use wombat::{Action, Document, DocumentKind, UploadForm, UploadKind, UploadedFile, WombatError};

use crate::App;
use crate::error::Result;

#[derive(Parser)]
#[command(about = "Manage wombat articles and chapters", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Document kind to operate on
    #[arg(long, value_enum, default_value = "article", global = true)]
    pub kind: KindArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Article,
    Chapter,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Article => DocumentKind::Article,
            KindArg::Chapter => DocumentKind::Chapter,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// List the most recent documents
    List {
        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// Page size (defaults to WOMBAT_PAGE_COUNT)
        #[arg(long)]
        limit: Option<u32>,
        /// Include unpublished documents
        #[arg(long)]
        all: bool,
    },

    /// Print one document
    Show {
        title_path: String,
        /// Show the document even when unpublished
        #[arg(long)]
        all: bool,
    },

    /// Create an unpublished document dated now
    Create { title: String },

    /// Replace the synopsis
    Synopsis { title_path: String, text: String },

    /// Replace the content body
    Content {
        title_path: String,
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        /// Read the body from a file
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Publish, or with --unpublish hide, a document
    Publish {
        title_path: String,
        #[arg(long)]
        unpublish: bool,
    },

    /// Apply an edit action message such as {"action":"setActive","data":""}
    Apply { title_path: String, message: String },

    /// Upload an image as gallery entry or thumbnail
    Upload {
        title_path: String,
        file: PathBuf,
        /// Name to store the image under
        #[arg(long)]
        name: Option<String>,
        /// Store as the document thumbnail
        #[arg(long)]
        thumb: bool,
    },

    /// Remove a gallery image and its file
    DeleteImage { title_path: String, src: String },

    /// Delete image files no longer referenced by the document
    Sweep { title_path: String },

    /// Delete a document
    Delete {
        title_path: String,
        /// Also remove the document's image directory
        #[arg(long)]
        purge_images: bool,
    },
}

/// A document together with the public links of its images
#[derive(Serialize)]
struct Shown<'a> {
    #[serde(flatten)]
    document: &'a Document,
    links: Vec<String>,
}

impl Command {
    pub async fn run(self, app: &App, kind: DocumentKind) -> Result<()> {
        let repository = app.repository(kind);

        match self {
            Command::List { page, limit, all } => {
                let limit = limit.unwrap_or(app.config.page_count);
                let documents = repository.recent(limit, page, all).await?;
                print_json(&documents)
            }
            Command::Show { title_path, all } => {
                let document = repository.by_title_path(checked(&title_path)?, all).await?;
                let links = document
                    .images()
                    .iter()
                    .chain(Some(document.image()).filter(|image| !image.is_empty()))
                    .map(|image| app.config.media_link(document.title_path(), &image.src))
                    .collect();
                print_json(&Shown {
                    document: &document,
                    links,
                })
            }
            Command::Create { title } => {
                if title.trim().is_empty() {
                    return Err(WombatError::bad_request("title must not be empty").into());
                }
                let document = Document::from_registry(&app.registry, kind, title)?;
                document.create().await?;
                info!(title_path = document.title_path(), kind = %kind, "document created");
                print_json(&document)
            }
            Command::Synopsis { title_path, text } => {
                let mut document = load(app, kind, &title_path).await?;
                document.set_synopsis(text).await?;
                print_json(&document)
            }
            Command::Content {
                title_path,
                text,
                file,
            } => {
                let content = match (text, file) {
                    (_, Some(path)) => tokio::fs::read_to_string(&path).await?,
                    (Some(text), None) => text,
                    (None, None) => {
                        return Err(WombatError::bad_request("missing content").into());
                    }
                };
                let mut document = load(app, kind, &title_path).await?;
                document.set_content(content).await?;
                print_json(&document)
            }
            Command::Publish {
                title_path,
                unpublish,
            } => {
                let mut document = load(app, kind, &title_path).await?;
                document.publish(!unpublish).await?;
                info!(
                    title_path = document.title_path(),
                    published = document.is_published(),
                    "publication changed"
                );
                print_json(&document)
            }
            Command::Apply {
                title_path,
                message,
            } => {
                let action = Action::from_json(message.as_bytes())?;
                let mut document = load(app, kind, &title_path).await?;
                action.apply(&mut document, &app.assets).await?;
                print_json(&document)
            }
            Command::Upload {
                title_path,
                file,
                name,
                thumb,
            } => {
                let mut document = load(app, kind, &title_path).await?;
                let form = UploadForm {
                    name,
                    kind: if thumb {
                        UploadKind::Thumbnail
                    } else {
                        UploadKind::Gallery
                    },
                    file: Some(read_upload(&file).await?),
                };
                let image = app.assets.upload(&mut document, form).await?;
                print_json(&image)
            }
            Command::DeleteImage { title_path, src } => {
                let mut document = load(app, kind, &title_path).await?;
                if !app.assets.remove_image(&mut document, &src).await? {
                    return Err(WombatError::NotFound(format!("Image {src}")).into());
                }
                print_json(&document)
            }
            Command::Sweep { title_path } => {
                let document = load(app, kind, &title_path).await?;
                let removed = app.assets.sweep_orphans(&document).await?;
                print_json(&removed)
            }
            Command::Delete {
                title_path,
                purge_images,
            } => {
                let document = load(app, kind, &title_path).await?;
                document.delete().await?;
                if purge_images {
                    app.assets.purge(document.title_path()).await?;
                }
                info!(title_path = document.title_path(), purge_images, "document deleted");
                print_json(&document)
            }
        }
    }
}

/// Reject malformed keys before they reach storage
fn checked(title_path: &str) -> Result<&str> {
    check_title_path(title_path)?;
    Ok(title_path)
}

/// Load a document for editing, published or not
async fn load(app: &App, kind: DocumentKind, title_path: &str) -> Result<Document> {
    let title_path = checked(title_path)?;
    Ok(app.repository(kind).by_title_path(title_path, true).await?)
}

async fn read_upload(path: &Path) -> Result<UploadedFile> {
    let data = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(UploadedFile {
        content_type: content_type(path).map(str::to_string),
        file_name,
        data,
    })
}

fn content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "gif" => Some("image/gif"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => Some("application/octet-stream"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

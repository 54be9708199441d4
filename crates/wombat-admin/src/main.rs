//! Wombat admin tool
//!
//! Manages articles and chapters of a wombat content repository from the
//! command line: listing, editing, publishing and image maintenance.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use wombat::{
    BackendRegistry, DocumentKind, ImageAssets, JpegConverter, RegistryBuilder, Repository,
    SqliteBackend,
};

mod commands;
mod config;
mod error;

use commands::Cli;
use config::AdminConfig;
use error::Result;

/// Everything a command needs, resolved once at startup
pub struct App {
    pub config: AdminConfig,
    pub registry: BackendRegistry,
    pub articles: Repository,
    pub chapters: Repository,
    pub assets: ImageAssets,
}

impl App {
    pub async fn init(config: AdminConfig) -> Result<Self> {
        if let Some(dir) = config.database_dir() {
            tokio::fs::create_dir_all(&dir).await?;
        }

        let pool = SqliteBackend::connect(&config.database_url).await?;
        let articles = SqliteBackend::with_pool(pool.clone(), DocumentKind::Article).await?;
        let chapters = SqliteBackend::with_pool(pool, DocumentKind::Chapter).await?;

        let mut builder = RegistryBuilder::new(&config.namespace);
        builder
            .register_kind(DocumentKind::Article, Arc::new(articles))
            .register_kind(DocumentKind::Chapter, Arc::new(chapters));
        let registry = builder.build();

        // A repository without a reader is unusable
        let articles = Repository::new(&registry, DocumentKind::Article)?;
        let chapters = Repository::new(&registry, DocumentKind::Chapter)?;

        let assets = ImageAssets::new(config.image_path.clone(), Arc::new(JpegConverter::default()))
            .with_thumb_width(config.thumb_width);

        info!(
            namespace = registry.namespace(),
            database = %config.database_url,
            images = %config.image_path.display(),
            "content repository ready"
        );

        Ok(Self {
            config,
            registry,
            articles,
            chapters,
            assets,
        })
    }

    pub fn repository(&self, kind: DocumentKind) -> &Repository {
        match kind {
            DocumentKind::Article => &self.articles,
            DocumentKind::Chapter => &self.chapters,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "wombat=info,wombat_admin=info".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AdminConfig::from_env()?;
    let app = App::init(config).await?;
    cli.command.run(&app, cli.kind.into()).await
}

//! Upload a local video or photo and save the resulting album
//!
//! ```text
//! cargo run --example upload_file -- party.mp4 ./albums
//! ```

use anyhow::{bail, Context};
use happyshot::{
    CapturedMedia, ClientConfig, DirectorySaveTarget, DownloadOutcome, HappyShot, ViewState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: upload_file <media file> [download dir]");
    };
    let download_dir = args.next();

    let config = ClientConfig::from_env()?;
    happyshot::init_logging(config.debug_logging);
    let client = HappyShot::new(config)?;

    if !client.health().await? {
        println!("⚠️  Backend health check failed, trying anyway");
    }

    let media = CapturedMedia::from_file(&path)
        .await
        .with_context(|| format!("reading {}", path))?;
    println!("📦 {} ({}, {} bytes)", media.file_name(), media.mime_type(), media.len());

    let session = client.session();
    let mut states = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            match state {
                ViewState::Uploading { progress } => println!("   ⬆️  {:.0}%", progress),
                ViewState::Waiting { status } => println!("   ⏳ {}", status),
                ViewState::Ready { .. } | ViewState::Error { .. } => break,
                ViewState::Idle => {}
            }
        }
    });

    let result = session.run(media, None).await;
    printer.abort();

    let album = match result {
        Ok(album) => album,
        Err(e) => bail!("{} ({:?})", e.user_message(), e.kind()),
    };

    if album.is_empty() {
        println!("🫙 Album {} is empty", album.bucket_id);
        return Ok(());
    }
    println!("✅ Album {} has {} image(s)", album.bucket_id, album.len());
    for url in &album.images {
        println!("   {}", url);
    }

    if let Some(dir) = download_dir {
        let target = DirectorySaveTarget::new(dir);
        match session.download_all(&target).await? {
            DownloadOutcome::Saved { path, bytes } => {
                println!("💾 Saved {} bytes to {}", bytes, path.display())
            }
            DownloadOutcome::Cancelled => println!("Download cancelled"),
        }
    }

    Ok(())
}

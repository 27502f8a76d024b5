//! Camera-to-album walkthrough
//!
//! Opens the synthetic camera, switches facing, takes a snapshot on a
//! 3 second self-timer and uploads it to the backend named by
//! `HAPPYSHOT_BASE_URL` (default `http://localhost:5000`).

use anyhow::Context;
use happyshot::{ClientConfig, DeviceSelector, HappyShot, SyntheticBackend, ViewState};
use std::sync::Arc;
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    happyshot::init_logging(false);

    let client = HappyShot::new(ClientConfig::from_env()?)?;
    let camera = client.camera(Arc::new(SyntheticBackend::new()));

    let devices = camera.list_devices().await?;
    println!("📷 {} camera(s) found", devices.len());
    for device in &devices {
        println!("   - {} ({})", device.label, device.id);
    }

    let view = camera
        .open_stream(DeviceSelector::Facing(camera.facing()))
        .await?;
    println!("🎥 Streaming from {} at {}", view.device().label, view.resolution());

    if camera.can_switch() {
        let view = camera.toggle_facing().await?;
        println!("🔄 Switched to {} at {}", view.device().label, view.resolution());
    }

    let (fire_tx, fire_rx) = oneshot::channel();
    let timer = client.capture_timer();
    timer.start(
        3,
        |remaining| println!("   ⏱️  {}", remaining),
        move || {
            let _ = fire_tx.send(());
        },
    );
    fire_rx.await.context("timer cancelled")?;

    let view = camera.active().context("camera closed before capture")?;
    let snapshot = client.snapshot_extractor()?.capture(&view).await?;
    camera.close();
    println!("📸 Captured {} ({} bytes)", snapshot.file_name(), snapshot.len());

    let session = client.session().with_observer(|state| match state {
        ViewState::Uploading { progress } => println!("   ⬆️  {:.0}%", progress),
        ViewState::Waiting { status } => println!("   ⏳ {}", status),
        _ => {}
    });

    match session.run(snapshot, None).await {
        Ok(album) => {
            println!("✅ Album {} has {} image(s)", album.bucket_id, album.len());
            for url in &album.images {
                println!("   {}", url);
            }
        }
        Err(e) => println!("❌ {}", e.user_message()),
    }

    Ok(())
}

use std::path::Path;

use vreel_media::{check_ffmpeg, check_ffprobe};
use vreel_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;

    println!(
        "vreel-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_engine()?;
    report_inputs(&config);

    println!("vreel-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_engine() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    println!("vreel-selfcheck: ffmpeg={}", ffmpeg.display());
    println!("vreel-selfcheck: ffprobe={}", ffprobe.display());
    Ok(())
}

/// Missing inputs are reported, not fatal: they may be supplied per run.
fn report_inputs(config: &WorkerConfig) {
    for (name, path) in [
        ("clip_dir", &config.clip_dir),
        ("script", &config.script_path),
        ("bgm", &config.bgm_path),
    ] {
        let state = if path.exists() { "found" } else { "missing" };
        println!("vreel-selfcheck: {}={} ({})", name, path.display(), state);
    }
}

//! Headless pump loop: load a clip, run the refresh cadence for a few
//! seconds, and report how often the source asked for an upload.
//!
//! ```text
//! cargo run --example player -- path/to/clip.mp4 [update-fps]
//! ```

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use vidtex::{VideoSource, VideoSourceOptions};

fn main() -> Result<()> {
    env_logger::init();

    let Some(location) = std::env::args().nth(1) else {
        bail!("usage: player <video-path-or-url> [update-fps]");
    };
    let update_fps: f32 = match std::env::args().nth(2) {
        Some(raw) => raw.parse()?,
        None => 0.0,
    };

    let options = VideoSourceOptions {
        update_fps,
        load_timeout: Some(Duration::from_secs(10)),
        ..Default::default()
    };
    let mut source = VideoSource::from_locator(&location, &options);

    source.load()?;
    println!(
        "ready: {}x{} pixels, {}x{} logical",
        source.pixel_width(),
        source.pixel_height(),
        source.width(),
        source.height()
    );

    let started = Instant::now();
    let mut uploads = 0u32;
    while started.elapsed() < Duration::from_secs(3) {
        source.update(Instant::now());
        if source.take_dirty() {
            uploads += 1;
            if let Some(frame) = source.acquire_frame() {
                log::debug!("would upload a {}x{} frame", frame.width, frame.height);
            }
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    println!("{uploads} uploads in 3s at update_fps={update_fps}");

    source.destroy();
    Ok(())
}

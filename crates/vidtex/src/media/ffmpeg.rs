//! Playback engine backed by ffmpeg subprocesses (feature-gated behind
//! `video`).
//!
//! - `ffprobe` discovers metadata (dimensions, frame rate, duration) on a
//!   background thread kicked off by `begin_load`
//! - `ffmpeg -re -f rawvideo -pix_fmt rgba` streams realtime-paced RGBA
//!   frames on a dedicated decode thread into a bounded latest-wins channel
//! - Inline `data:` payloads are fed to both tools through `pipe:0`

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use base64::Engine as _;
use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, error, warn};

use super::handle::{HandleConfig, MediaEvent, MediaInfo, PlaybackHandle, VideoFrame};
use crate::locator::{DataEncoding, Locator};

/// Check if ffmpeg/ffprobe are available on the system. Cached per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

/// What the engine decodes from.
#[derive(Clone)]
enum Input {
    /// Filesystem path or network URL; ffmpeg reads it directly.
    Location(String),
    /// Still-encoded inline payload, decoded at probe/stream time.
    Data {
        encoding: DataEncoding,
        payload: String,
    },
}

/// Playback handle driving ffprobe/ffmpeg subprocesses.
pub struct FfmpegHandle {
    input: Input,
    config: HandleConfig,
    /// Decoder hint resolved from the locator. ffmpeg sniffs the container
    /// itself, so the hint rides along for diagnostics and for engines
    /// swapped in behind the same source declaration.
    mime_hint: Option<String>,
    probe_thread: Option<JoinHandle<()>>,
    info_rx: Option<Receiver<MediaInfo>>,
    info: Option<MediaInfo>,
    decode_thread: Option<JoinHandle<()>>,
    frame_rx: Option<Receiver<VideoFrame>>,
    playing: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl FfmpegHandle {
    /// Build an engine for the given locator. The source declaration keeps
    /// the resolved MIME hint; `config` is the element-style attribute bag,
    /// of which this engine consumes `looping`.
    pub fn from_locator(locator: &Locator, config: HandleConfig) -> Self {
        let mime_hint = locator.format_hint().map(str::to_string);
        if let Some(mime) = &mime_hint {
            debug!("attached media source with decoder hint {mime}");
        }
        let input = match locator {
            Locator::Url(url) => Input::Location(url.clone()),
            Locator::Data {
                encoding, payload, ..
            } => Input::Data {
                encoding: *encoding,
                payload: payload.clone(),
            },
        };
        Self {
            input,
            config,
            mime_hint,
            probe_thread: None,
            info_rx: None,
            info: None,
            decode_thread: None,
            frame_rx: None,
            playing: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The MIME type carried on the source declaration, if one was resolved.
    pub fn mime_hint(&self) -> Option<&str> {
        self.mime_hint.as_deref()
    }

    /// Probed metadata, once the load has completed.
    pub fn media_info(&mut self) -> Option<&MediaInfo> {
        self.refresh_info();
        self.info.as_ref()
    }

    fn refresh_info(&mut self) {
        if self.info.is_none() {
            if let Some(rx) = &self.info_rx {
                self.info = rx.try_recv().ok();
            }
        }
    }

    fn spawn_decode(&mut self, info: MediaInfo) {
        let (frame_tx, frame_rx) = bounded(2);
        self.frame_rx = Some(frame_rx);
        let input = self.input.clone();
        let looping = self.config.looping;
        let playing = Arc::clone(&self.playing);
        let shutdown = Arc::clone(&self.shutdown);
        let handle = thread::Builder::new()
            .name("vidtex-decode".into())
            .spawn(move || {
                decode_thread(&input, &info, looping, &frame_tx, &playing, &shutdown);
            })
            .expect("failed to spawn decode thread");
        self.decode_thread = Some(handle);
    }
}

impl PlaybackHandle for FfmpegHandle {
    fn begin_load(&mut self, events: Sender<MediaEvent>) {
        if self.probe_thread.is_some() || self.shutdown.load(Ordering::Relaxed) {
            return;
        }
        let input = self.input.clone();
        let (info_tx, info_rx) = bounded(1);
        self.info_rx = Some(info_rx);
        let handle = thread::Builder::new()
            .name("vidtex-probe".into())
            .spawn(move || match probe_input(&input) {
                Ok(info) => {
                    // Internal copy first so the handle sees dimensions by
                    // the time the external event is observed.
                    let _ = info_tx.send(info.clone());
                    let _ = events.send(MediaEvent::Loaded(info));
                }
                Err(reason) => {
                    let _ = events.send(MediaEvent::Error(reason));
                }
            })
            .expect("failed to spawn media probe thread");
        self.probe_thread = Some(handle);
    }

    fn play(&mut self) {
        if self.shutdown.load(Ordering::Relaxed) {
            return;
        }
        self.refresh_info();
        let Some(info) = self.info.clone() else {
            warn!("play requested before media is ready; ignoring");
            return;
        };
        self.playing.store(true, Ordering::Relaxed);
        if self.decode_thread.as_ref().is_some_and(JoinHandle::is_finished) {
            // Previous stream ran out (non-looping EOF); restart from the top.
            if let Some(handle) = self.decode_thread.take() {
                let _ = handle.join();
            }
        }
        if self.decode_thread.is_none() {
            self.spawn_decode(info);
        }
    }

    fn pause(&mut self) {
        self.playing.store(false, Ordering::Relaxed);
    }

    fn is_playing(&self) -> bool {
        if !self.playing.load(Ordering::Relaxed) {
            return false;
        }
        match &self.decode_thread {
            Some(handle) => !handle.is_finished(),
            None => false,
        }
    }

    fn poll_frame(&mut self) -> Option<VideoFrame> {
        let rx = self.frame_rx.as_ref()?;
        // Drain to get the latest frame (drop old ones)
        let mut latest = None;
        while let Ok(frame) = rx.try_recv() {
            latest = Some(frame);
        }
        latest
    }

    fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::Relaxed) {
            return;
        }
        self.playing.store(false, Ordering::Relaxed);
        if let Some(handle) = self.decode_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.probe_thread.take() {
            let _ = handle.join();
        }
        self.frame_rx = None;
        self.info_rx = None;
    }
}

impl Drop for FfmpegHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn probe_input(input: &Input) -> Result<MediaInfo, String> {
    let payload = input_bytes(input)?;
    if payload.as_ref().is_some_and(Vec::is_empty) {
        return Err("inline payload is empty".to_string());
    }
    if !ffmpeg_available() {
        return Err("ffprobe not found on PATH".to_string());
    }
    let info = match (input, payload.as_deref()) {
        (_, Some(bytes)) => probe_bytes(bytes)?,
        (Input::Location(location), None) => probe_location(location)?,
        (Input::Data { .. }, None) => return Err("inline payload is empty".to_string()),
    };
    // Ready means dimensions plus at least one decodable frame; a stream
    // whose headers parse but whose payload never decodes fails here.
    decode_first_frame(input, payload.as_deref())?;
    Ok(info)
}

fn decode_first_frame(input: &Input, payload: Option<&[u8]>) -> Result<(), String> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "quiet"]);
    match input {
        Input::Location(location) => {
            cmd.arg("-i").arg(location).stdin(Stdio::null());
        }
        Input::Data { .. } => {
            cmd.args(["-i", "pipe:0"]).stdin(Stdio::piped());
        }
    }
    cmd.args(["-frames:v", "1", "-f", "null", "-"])
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn ffmpeg: {e}"))?;

    if let Some(bytes) = payload {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(bytes);
        }
    }

    let status = child
        .wait()
        .map_err(|e| format!("ffmpeg did not exit cleanly: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err("no decodable video frame in stream".to_string())
    }
}

/// Probe media metadata at a path or URL using ffprobe.
fn probe_location(location: &str) -> Result<MediaInfo, String> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(location)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("ffprobe failed to execute: {e}"))?;

    if !output.status.success() {
        return Err(format!("ffprobe could not read {location}"));
    }

    parse_probe_json(&output.stdout)
}

/// Probe an in-memory payload by feeding it to ffprobe through stdin.
fn probe_bytes(bytes: &[u8]) -> Result<MediaInfo, String> {
    let mut child = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
            "-i",
            "pipe:0",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("ffprobe failed to execute: {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        // ffprobe may stop reading once it has the headers; a broken pipe
        // here just means it already has what it needs.
        let _ = stdin.write_all(bytes);
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("ffprobe did not exit cleanly: {e}"))?;

    if !output.status.success() {
        return Err("ffprobe could not read the inline media stream".to_string());
    }

    parse_probe_json(&output.stdout)
}

fn parse_probe_json(json_bytes: &[u8]) -> Result<MediaInfo, String> {
    let json: serde_json::Value = serde_json::from_slice(json_bytes)
        .map_err(|e| format!("failed to parse ffprobe JSON: {e}"))?;

    let streams = json["streams"]
        .as_array()
        .ok_or("no streams in ffprobe output")?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or("no video stream found")?;

    let width = video_stream["width"].as_u64().ok_or("missing width")? as u32;
    let height = video_stream["height"].as_u64().ok_or("missing height")? as u32;
    if width == 0 || height == 0 {
        return Err("stream reports zero dimensions".to_string());
    }

    let frame_rate = parse_frame_rate(video_stream["r_frame_rate"].as_str().unwrap_or("30/1"));

    let duration_secs = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            video_stream["duration"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    Ok(MediaInfo {
        width,
        height,
        frame_rate,
        duration_secs,
    })
}

fn parse_frame_rate(rate: &str) -> f64 {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().unwrap_or(30.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d > 0.0 { n / d } else { 30.0 }
    } else {
        rate.parse().unwrap_or(30.0)
    }
}

fn decode_payload(encoding: DataEncoding, payload: &str) -> Result<Vec<u8>, String> {
    match encoding {
        DataEncoding::Base64 => base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("invalid base64 payload: {e}")),
        DataEncoding::Plain => Ok(payload.as_bytes().to_vec()),
    }
}

fn input_bytes(input: &Input) -> Result<Option<Vec<u8>>, String> {
    match input {
        Input::Location(_) => Ok(None),
        Input::Data { encoding, payload } => decode_payload(*encoding, payload).map(Some),
    }
}

fn decode_thread(
    input: &Input,
    info: &MediaInfo,
    looping: bool,
    frame_tx: &Sender<VideoFrame>,
    playing: &AtomicBool,
    shutdown: &AtomicBool,
) {
    let frame_size = info.width as usize * info.height as usize * 4;
    let payload = match input_bytes(input) {
        Ok(payload) => payload,
        Err(reason) => {
            error!("decode stream unavailable: {reason}");
            return;
        }
    };

    loop {
        let mut child = match spawn_stream(input, info, payload.as_deref()) {
            Ok(child) => child,
            Err(reason) => {
                error!("{reason}");
                return;
            }
        };
        let Some(mut stdout) = child.stdout.take() else {
            error!("ffmpeg: no stdout pipe");
            let _ = child.kill();
            let _ = child.wait();
            return;
        };

        let mut buf = vec![0u8; frame_size];
        let mut eof = false;
        while !shutdown.load(Ordering::Relaxed) {
            if !playing.load(Ordering::Relaxed) {
                // Parked while paused; pipe backpressure stalls the decoder.
                thread::sleep(Duration::from_millis(10));
                continue;
            }
            match stdout.read_exact(&mut buf) {
                Ok(()) => {
                    let frame = VideoFrame {
                        data: buf.clone(),
                        width: info.width,
                        height: info.height,
                    };
                    // try_send: drop the frame if the consumer is behind
                    let _ = frame_tx.try_send(frame);
                }
                Err(_) => {
                    eof = true;
                    break;
                }
            }
        }

        let _ = child.kill();
        let _ = child.wait();

        if shutdown.load(Ordering::Relaxed) || !eof || !looping {
            break;
        }
        // Loop playback: restart the stream from the top.
    }
}

/// Spawn the realtime-paced RGBA stream for one pass over the media.
fn spawn_stream(input: &Input, info: &MediaInfo, payload: Option<&[u8]>) -> Result<Child, String> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "quiet", "-re"]);
    match input {
        Input::Location(location) => {
            cmd.arg("-i").arg(location).stdin(Stdio::null());
        }
        Input::Data { .. } => {
            cmd.args(["-i", "pipe:0"]).stdin(Stdio::piped());
        }
    }
    cmd.args([
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
        &format!("{}x{}", info.width, info.height),
        "pipe:1",
    ])
    .stdout(Stdio::piped())
    .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn ffmpeg: {e}"))?;

    if let Some(bytes) = payload {
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = bytes.to_vec();
            let _ = thread::Builder::new().name("vidtex-feed".into()).spawn(move || {
                // The decoder may stop reading early; a broken pipe is fine.
                let _ = stdin.write_all(&bytes);
            });
        }
    }

    Ok(child)
}

/// Encode a short test clip; `None` when ffmpeg is unavailable or the encode
/// fails (callers treat that as a skip, not a failure).
#[cfg(test)]
pub(crate) fn generate_test_clip(
    dir: &std::path::Path,
    name: &str,
    size: &str,
) -> Option<std::path::PathBuf> {
    if !ffmpeg_available() {
        return None;
    }
    let path = dir.join(name);
    let status = Command::new("ffmpeg")
        .args([
            "-y",
            "-f",
            "lavfi",
            "-i",
            &format!("testsrc=duration=1:size={size}:rate=24"),
            "-c:v",
            "mpeg4",
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(&path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok()?;
    status.success().then_some(path)
}

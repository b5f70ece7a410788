mod reader;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use clap::Parser;
use livesource::{
    Codec, DecodedPicture, LiveVideoSource, NullDecoderFactory, PipelineConfig, RegressionPolicy,
    SinkWants, TransportCallback, VideoSink,
};

const SESSION_ID: &str = "file";
/// Below this the chunk interval exceeds 100 seconds.
const MIN_FPS: f64 = 0.01;

#[derive(Parser)]
#[command(
    name = "livesource-ingest",
    about = "Push an elementary video stream file through the live ingest pipeline"
)]
struct Args {
    /// Annex-B H.264/H.265, concatenated MJPEG or IVF VP9 file
    #[arg(long, short)]
    input: PathBuf,

    /// H264, H265, MJPEG or VP9
    #[arg(long, short, value_parser = parse_codec)]
    codec: Codec,

    /// Chunk rate of the simulated transport
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// Reproduce source cadence at playout
    #[arg(long)]
    pace: bool,

    /// Always drop frames whose timestamp goes backwards
    #[arg(long, conflicts_with = "forward_regressed")]
    drop_regressed: bool,

    /// Never drop frames whose timestamp goes backwards
    #[arg(long)]
    forward_regressed: bool,
}

fn parse_codec(name: &str) -> Result<Codec, String> {
    Codec::from_name(name).ok_or_else(|| format!("unsupported codec '{name}'"))
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let timestamp_regression = if self.drop_regressed {
            RegressionPolicy::Drop
        } else if self.forward_regressed {
            RegressionPolicy::Forward
        } else {
            RegressionPolicy::Auto
        };
        PipelineConfig {
            pacing: self.pace,
            timestamp_regression,
            ..PipelineConfig::default()
        }
    }
}

/// Logs every delivered picture.
#[derive(Default)]
struct LogSink {
    pictures: AtomicU64,
}

impl VideoSink for LogSink {
    fn on_frame(&self, picture: &Arc<DecodedPicture>) {
        let n = self.pictures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            n,
            ts = picture.timestamp_ms,
            capture = picture.capture_time_ms,
            width = picture.width,
            height = picture.height,
            bytes = picture.buffer.len(),
            "picture"
        );
    }
}

/// Spacing between chunks, or `None` for a rate below [`MIN_FPS`].
fn chunk_interval(fps: f64) -> Option<Duration> {
    if !fps.is_finite() || fps < MIN_FPS {
        return None;
    }
    Some(Duration::from_secs_f64(1.0 / fps))
}

fn presentation_offset(interval: Duration, index: usize) -> Duration {
    interval.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let Some(interval) = chunk_interval(args.fps) else {
        tracing::error!(fps = args.fps, min = MIN_FPS, "fps out of range");
        return ExitCode::FAILURE;
    };

    let data = match std::fs::read(&args.input) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(input = %args.input.display(), error = %e, "cannot read input");
            return ExitCode::FAILURE;
        }
    };
    let chunks = match reader::split(args.codec, &data) {
        Ok(chunks) => chunks,
        Err(e) => {
            tracing::error!(input = %args.input.display(), error = %e, "cannot split input");
            return ExitCode::FAILURE;
        }
    };

    let source = match LiveVideoSource::with_config(
        Arc::new(NullDecoderFactory),
        args.pipeline_config(),
    ) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "cannot start pipeline");
            return ExitCode::FAILURE;
        }
    };
    let sink = Arc::new(LogSink::default());
    source.add_or_update_sink(sink.clone(), SinkWants::default());

    if !source.on_new_session(SESSION_ID, "video", args.codec.name(), "") {
        return ExitCode::FAILURE;
    }

    let start = SystemTime::now();
    let mut rejected = 0u64;
    for (i, chunk) in chunks.iter().enumerate() {
        let presentation_time = start + presentation_offset(interval, i);
        if !source.on_data(SESSION_ID, chunk, presentation_time) {
            rejected += 1;
        }
        std::thread::sleep(interval);
    }
    source.on_session_closed(SESSION_ID);
    source.stop();

    let stats = source.stats();
    tracing::info!(
        chunks = chunks.len(),
        rejected,
        enqueued = stats.frames_enqueued,
        dropped = stats.frames_dropped,
        decode_errors = stats.decode_errors,
        decoders = stats.decoders_created,
        delivered = stats.pictures_delivered,
        "done"
    );
    ExitCode::SUCCESS
}

pub mod decoder;
pub mod error;
pub mod fanout;
pub mod media;
pub mod pacer;
pub mod picture;
pub mod pipeline;
pub mod playout;
pub mod queue;
pub mod session;
pub mod stats;
pub mod worker;

pub use decoder::{
    DecodeCompleteCallback, DecoderCapabilities, DecoderFactory, DecoderSettings,
    NullDecoderFactory, VideoDecoder,
};
pub use error::{IngestError, ParseErrorKind, Result};
pub use fanout::{SinkWants, VideoSink};
pub use media::{Codec, CodedFrame, FormatDescriptor, FrameKind};
pub use picture::{DecodedPicture, I420Buffer, PictureBuffer};
pub use pipeline::{LiveVideoSource, PipelineConfig, RegressionPolicy, TransportCallback};
pub use session::SessionState;
pub use stats::StatsSnapshot;

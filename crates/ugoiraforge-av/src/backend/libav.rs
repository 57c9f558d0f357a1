//! In-process encoding through libavcodec.
//!
//! Frames are decoded with `image`, converted to YUV420P by swscale at the
//! graph's even-rounded output size, and encoded to H.264 with presentation
//! timestamps taken from the graph timeline on a 1/1000 timebase. libavformat
//! needs a real file to mux into, so the MP4 is written to a scratch file and
//! copied into the virtual filesystem.

use bytes::Bytes;
use ffmpeg_the_third as ffmpeg;

use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::{output as open_output, Pixel};
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;
use ugoiraforge_common::{Error, Result};

use super::{EmbeddedRuntime, VirtualFs};
use crate::graph::EncodeGraph;

/// Millisecond timebase matching the graph timeline.
const TIMEBASE: Rational = Rational(1, 1000);

/// [`EmbeddedRuntime`] backed by the FFmpeg libraries linked into this binary.
#[derive(Debug, Clone)]
pub struct LibavRuntime {
    video_codec: String,
}

impl LibavRuntime {
    /// Initialise libav and pick the encoder named `video_codec`.
    pub fn new(video_codec: String) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::encode(format!("failed to initialise libav: {e}")))?;
        Ok(Self { video_codec })
    }
}

impl EmbeddedRuntime for LibavRuntime {
    fn name(&self) -> &'static str {
        "libav"
    }

    fn run(&self, fs: &VirtualFs, graph: &EncodeGraph, inputs: &[String], output: &str) -> Result<()> {
        let images = inputs
            .iter()
            .map(|path| {
                let data = fs
                    .read(path)
                    .ok_or_else(|| Error::encode(format!("missing virtual input {path}")))?;
                image::load_from_memory(&data)
                    .map(|img| img.to_rgb8())
                    .map_err(|e| Error::encode(format!("failed to decode {path}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let first = images
            .first()
            .ok_or_else(|| Error::encode("no frames to encode"))?;
        let (width, height) = (first.width() & !1, first.height() & !1);
        if width == 0 || height == 0 {
            return Err(Error::encode(format!(
                "frame size {}x{} is too small to encode",
                first.width(),
                first.height()
            )));
        }

        let scratch = tempfile::Builder::new()
            .prefix("ugoira-libav-")
            .suffix(".mp4")
            .tempfile()?;
        self.encode_to_file(graph, &images, width, height, scratch.path())
            .map_err(Error::encode)?;

        let encoded = std::fs::read(scratch.path())?;
        fs.write(output, Bytes::from(encoded));
        Ok(())
    }
}

impl LibavRuntime {
    fn encode_to_file(
        &self,
        graph: &EncodeGraph,
        images: &[image::RgbImage],
        width: u32,
        height: u32,
        path: &std::path::Path,
    ) -> std::result::Result<(), String> {
        let codec = encoder::find_by_name(&self.video_codec)
            .or_else(|| encoder::find(CodecId::H264))
            .ok_or_else(|| format!("encoder {} not available", self.video_codec))?;

        let mut octx = open_output(path).map_err(|e| format!("could not open output: {e}"))?;
        let mut ost = octx
            .add_stream(codec)
            .map_err(|e| format!("add video stream: {e}"))?;
        ost.set_time_base(TIMEBASE);

        let mut video_enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| format!("create video encoder context: {e}"))?;
        video_enc.set_width(width);
        video_enc.set_height(height);
        video_enc.set_format(Pixel::YUV420P);
        video_enc.set_time_base(TIMEBASE);

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("preset", "medium");
        let mut video_encoder = video_enc
            .open_as_with(codec, opts)
            .map_err(|e| format!("open {} encoder: {e}", self.video_codec))?;

        // encoder::Video has no AsPtr<AVCodecParameters>, so copy through FFI.
        unsafe {
            let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                (**(*octx.as_mut_ptr()).streams.add(0)).codecpar,
                video_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
            );
            if ret < 0 {
                return Err(format!("avcodec_parameters_from_context failed: {ret}"));
            }
        }

        octx.write_header()
            .map_err(|e| format!("write header: {e}"))?;
        let ost_tb = octx
            .stream(0)
            .map(|s| s.time_base())
            .ok_or_else(|| "output stream disappeared".to_string())?;

        let drain = |enc: &mut encoder::video::Video,
                     octx: &mut ffmpeg::format::context::Output|
         -> std::result::Result<(), String> {
            let mut pkt = Packet::empty();
            while enc.receive_packet(&mut pkt).is_ok() {
                pkt.set_stream(0);
                pkt.rescale_ts(TIMEBASE, ost_tb);
                pkt.write_interleaved(octx)
                    .map_err(|e| format!("write video packet: {e}"))?;
            }
            Ok(())
        };

        for entry in graph.timeline() {
            let image = images
                .get(entry.input)
                .ok_or_else(|| format!("timeline references missing input {}", entry.input))?;
            let mut yuv = to_yuv(image, width, height)?;
            yuv.set_pts(Some(entry.pts_ms as i64));

            video_encoder
                .send_frame(&yuv)
                .map_err(|e| format!("send frame to encoder: {e}"))?;
            drain(&mut video_encoder, &mut octx)?;
        }

        video_encoder
            .send_eof()
            .map_err(|e| format!("send EOF to encoder: {e}"))?;
        drain(&mut video_encoder, &mut octx)?;

        octx.write_trailer()
            .map_err(|e| format!("write trailer: {e}"))?;
        Ok(())
    }
}

/// Convert an RGB image into a YUV420P frame of the output size.
fn to_yuv(image: &image::RgbImage, width: u32, height: u32) -> std::result::Result<VideoFrame, String> {
    let (src_w, src_h) = image.dimensions();
    let mut rgb = VideoFrame::new(Pixel::RGB24, src_w, src_h);

    let stride = rgb.stride(0);
    let row = src_w as usize * 3;
    let data = rgb.data_mut(0);
    for (y, src) in image.as_raw().chunks_exact(row).enumerate() {
        data[y * stride..y * stride + row].copy_from_slice(src);
    }

    let mut scaler = ScaleCtx::get(
        Pixel::RGB24,
        src_w,
        src_h,
        Pixel::YUV420P,
        width,
        height,
        ScaleFlags::BILINEAR,
    )
    .map_err(|e| format!("create swscale context: {e}"))?;

    let mut yuv = VideoFrame::empty();
    scaler
        .run(&rgb, &mut yuv)
        .map_err(|e| format!("scale frame: {e}"))?;
    Ok(yuv)
}

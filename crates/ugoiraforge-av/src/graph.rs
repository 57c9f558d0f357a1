//! Encode graph construction for variable-duration frame sequences.
//!
//! Every frame is its own input stream. Frames after the first are moved onto
//! a millisecond timebase and shifted by the display duration of the frame
//! before them, then all streams are concatenated in order and the output
//! dimensions are rounded down to even values for the H.264 encoder.
//!
//! A plain concat drops the last frame's display time, so the last input is
//! split in two and both copies are retimed identically.
//!
//! ```
//! use ugoiraforge_av::EncodeGraph;
//! use ugoiraforge_common::frames_from_delays;
//!
//! let frames = frames_from_delays([("000000.jpg", 100), ("000001.jpg", 150)]);
//! let graph = EncodeGraph::build(&frames)?;
//! assert_eq!(graph.inputs().len(), 2);
//! assert!(graph.filter_complex().ends_with("scale=trunc(iw/2)*2:trunc(ih/2)*2"));
//! # Ok::<(), ugoiraforge_common::Error>(())
//! ```

use std::fmt;

use ugoiraforge_common::{Error, Frame, Result};

/// Timebase shared by every retimed stream: one tick per millisecond.
pub const TIMEBASE: &str = "1/1000";

/// Scale expression rounding both dimensions down to an even size.
pub const EVEN_SCALE: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// A stream reference inside the filter graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pad {
    /// The n-th `-i` input.
    Input(usize),
    /// A stream produced by an earlier directive.
    Label(String),
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Input(index) => write!(f, "[{index}]"),
            Pad::Label(label) => write!(f, "[{label}]"),
        }
    }
}

/// One step of the encode graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Duplicate an input into two labelled streams.
    Split { input: usize, outputs: [String; 2] },
    /// Put a stream on the millisecond timebase shifted by `offset_ms`.
    Retime {
        source: Pad,
        offset_ms: u32,
        output: String,
    },
    /// Join streams in order, then round dimensions to even.
    Concat { sources: Vec<Pad> },
    /// Round dimensions of a lone input to even.
    Scale { input: usize },
}

impl Directive {
    /// Whether this directive forces even output dimensions.
    pub fn rounds_dimensions(&self) -> bool {
        matches!(self, Directive::Concat { .. } | Directive::Scale { .. })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Split { input, outputs } => {
                write!(f, "[{input}]split[{}][{}]", outputs[0], outputs[1])
            }
            Directive::Retime {
                source,
                offset_ms,
                output,
            } => write!(
                f,
                "{source}settb={TIMEBASE},setpts=PTS+{}/TB[{output}]",
                ms_as_seconds(*offset_ms)
            ),
            Directive::Concat { sources } => {
                for source in sources {
                    write!(f, "{source}")?;
                }
                write!(f, "concat=n={},{EVEN_SCALE}", sources.len())
            }
            Directive::Scale { input } => write!(f, "[{input}]{EVEN_SCALE}"),
        }
    }
}

/// A frame placed on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Input stream shown at this point.
    pub input: usize,
    /// Presentation timestamp in milliseconds.
    pub pts_ms: u64,
}

/// Declarative description of how frame inputs become one video stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeGraph {
    inputs: Vec<String>,
    directives: Vec<Directive>,
    timeline: Vec<TimelineEntry>,
}

impl EncodeGraph {
    /// Build the graph for an ordered frame list.
    ///
    /// # Errors
    ///
    /// - [`Error::Encode`] when `frames` is empty.
    /// - [`Error::InvalidInput`] when sequence indices are not contiguous from 0.
    pub fn build(frames: &[Frame]) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::encode("cannot build an encode graph from zero frames"));
        }

        let mut ordered: Vec<&Frame> = frames.iter().collect();
        ordered.sort_by_key(|f| f.sequence_index);
        for (expected, frame) in ordered.iter().enumerate() {
            if frame.sequence_index != expected {
                return Err(Error::invalid_input(format!(
                    "frame sequence has a gap: expected index {expected}, found {}",
                    frame.sequence_index
                )));
            }
        }

        let inputs: Vec<String> = ordered.iter().map(|f| f.source_file.clone()).collect();
        let delays: Vec<u32> = ordered.iter().map(|f| f.display_duration_ms).collect();
        let n = inputs.len();

        if n == 1 {
            return Ok(Self {
                inputs,
                directives: vec![Directive::Scale { input: 0 }],
                timeline: vec![TimelineEntry { input: 0, pts_ms: 0 }],
            });
        }

        let mut directives = Vec::with_capacity(n + 2);
        let mut concat = vec![Pad::Input(0)];
        let mut timeline = vec![TimelineEntry { input: 0, pts_ms: 0 }];
        let mut pts: u64 = 0;

        for k in 1..n {
            let offset_ms = delays[k - 1];
            pts += u64::from(offset_ms);
            timeline.push(TimelineEntry { input: k, pts_ms: pts });

            if k < n - 1 {
                directives.push(Directive::Retime {
                    source: Pad::Input(k),
                    offset_ms,
                    output: format!("f{k}"),
                });
                concat.push(Pad::Label(format!("f{k}")));
                continue;
            }

            let (first, second) = (format!("s{k}"), format!("s{}", k + 1));
            directives.push(Directive::Split {
                input: k,
                outputs: [first.clone(), second.clone()],
            });
            directives.push(Directive::Retime {
                source: Pad::Label(first),
                offset_ms,
                output: format!("f{k}"),
            });
            directives.push(Directive::Retime {
                source: Pad::Label(second),
                offset_ms,
                output: format!("f{}", k + 1),
            });
            concat.push(Pad::Label(format!("f{k}")));
            concat.push(Pad::Label(format!("f{}", k + 1)));

            pts += u64::from(offset_ms);
            timeline.push(TimelineEntry { input: k, pts_ms: pts });
        }

        directives.push(Directive::Concat { sources: concat });

        Ok(Self {
            inputs,
            directives,
            timeline,
        })
    }

    /// Archive entry names, one per input stream, in input order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Resolved presentation order, including the duplicated last frame.
    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    /// Whether the graph joins several streams.
    pub fn needs_concat(&self) -> bool {
        self.directives
            .iter()
            .any(|d| matches!(d, Directive::Concat { .. }))
    }

    /// Render the graph as an ffmpeg `-filter_complex` value.
    pub fn filter_complex(&self) -> String {
        self.directives
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Full ffmpeg argument list for this graph.
    ///
    /// `resolve` maps an input's archive entry name to the path ffmpeg should
    /// read it from.
    pub fn ffmpeg_args<F>(&self, resolve: F, video_codec: &str, output: &str) -> Vec<String>
    where
        F: Fn(&str) -> String,
    {
        let mut args = vec!["-hide_banner".to_string()];
        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(resolve(input));
        }
        args.extend([
            "-c:v".to_string(),
            video_codec.to_string(),
            "-filter_complex".to_string(),
            self.filter_complex(),
            "-fps_mode".to_string(),
            "vfr".to_string(),
            "-video_track_timescale".to_string(),
            "1000".to_string(),
            output.to_string(),
        ]);
        args
    }
}

/// Render milliseconds as the shortest decimal number of seconds.
fn ms_as_seconds(ms: u32) -> String {
    let (whole, frac) = (ms / 1000, ms % 1000);
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:03}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

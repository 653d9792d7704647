//! Declarative compositing invocations.
//!
//! An `Invocation` describes inputs, per-input filters, an optional mixing
//! graph and the output encoding. `args()` renders it for the ffmpeg CLI.

use crate::error::CompositingError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    File(PathBuf),
    /// Loops the file indefinitely; needs a duration limit or trim downstream
    Looped(PathBuf),
    /// Lossless concatenation of `entries`, listed in `list`
    ConcatList { list: PathBuf, entries: Vec<PathBuf> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixDuration {
    /// Output lasts as long as the first input
    First,
    Longest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioFilter {
    Delay { millis: u64 },
    Volume(f64),
    Trim { duration: f64 },
    Split(usize),
    Mix {
        inputs: usize,
        duration: MixDuration,
        dropout_transition: f64,
    },
}

impl fmt::Display for AudioFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFilter::Delay { millis } => write!(f, "adelay=delays={}:all=1", millis),
            AudioFilter::Volume(v) => write!(f, "volume={:.2}", v),
            AudioFilter::Trim { duration } => write!(f, "atrim=duration={:.2}", duration),
            AudioFilter::Split(n) => write!(f, "asplit={}", n),
            AudioFilter::Mix {
                inputs,
                duration,
                dropout_transition,
            } => {
                let duration = match duration {
                    MixDuration::First => "first",
                    MixDuration::Longest => "longest",
                };
                write!(
                    f,
                    "amix=inputs={}:duration={}:dropout_transition={}",
                    inputs, duration, dropout_transition
                )
            }
        }
    }
}

/// One `[in]filter,filter[out]` link of a filter graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chain {
    pub inputs: Vec<String>,
    pub filters: Vec<AudioFilter>,
    pub outputs: Vec<String>,
}

impl Chain {
    pub fn new(inputs: Vec<String>, filters: Vec<AudioFilter>, outputs: Vec<String>) -> Self {
        Self {
            inputs,
            filters,
            outputs,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "[{}]", label)?;
        }
        let filters: Vec<String> = self.filters.iter().map(|x| x.to_string()).collect();
        f.write_str(&filters.join(","))?;
        for label in &self.outputs {
            write!(f, "[{}]", label)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGraph {
    pub chains: Vec<Chain>,
}

impl FilterGraph {
    /// The mix at the end of the graph, if any.
    pub fn final_mix(&self) -> Option<&AudioFilter> {
        self.chains
            .last()
            .and_then(|c| c.filters.last())
            .filter(|f| matches!(f, AudioFilter::Mix { .. }))
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains: Vec<String> = self.chains.iter().map(|c| c.to_string()).collect();
        f.write_str(&chains.join(";"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Codec {
    /// Stream copy, no re-encode
    Copy,
    Opus { bitrate: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub inputs: Vec<Input>,
    /// Simple per-stream filters (`-af`)
    pub audio_filters: Vec<AudioFilter>,
    /// Multi-input graph (`-filter_complex`)
    pub graph: Option<FilterGraph>,
    /// Output duration limit (`-t`)
    pub max_duration: Option<f64>,
    pub codec: Option<Codec>,
    pub output: PathBuf,
}

impl Invocation {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            inputs: Vec::new(),
            audio_filters: Vec::new(),
            graph: None,
            max_duration: None,
            codec: None,
            output: output.into(),
        }
    }

    pub fn input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn filter(mut self, filter: AudioFilter) -> Self {
        self.audio_filters.push(filter);
        self
    }

    pub fn graph(mut self, graph: FilterGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn limit(mut self, seconds: f64) -> Self {
        self.max_duration = Some(seconds);
        self
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn validate(&self) -> Result<(), CompositingError> {
        if self.inputs.is_empty() {
            return Err(CompositingError::InvalidGraph("no inputs".into()));
        }
        if self.graph.is_some() && !self.audio_filters.is_empty() {
            return Err(CompositingError::InvalidGraph(
                "simple filters and a filter graph are exclusive".into(),
            ));
        }
        let looped = self.inputs.iter().any(|i| matches!(i, Input::Looped(_)));
        let trimmed = self
            .audio_filters
            .iter()
            .any(|f| matches!(f, AudioFilter::Trim { .. }));
        if looped && self.max_duration.is_none() && !trimmed {
            return Err(CompositingError::InvalidGraph(
                "looped input without a duration bound".into(),
            ));
        }
        if let Some(AudioFilter::Mix { inputs, .. }) = self.graph.as_ref().and_then(|g| g.final_mix()) {
            if *inputs < 1 {
                return Err(CompositingError::InvalidGraph("empty mix".into()));
            }
        }
        Ok(())
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("-y")];
        for input in &self.inputs {
            match input {
                Input::File(path) => {
                    args.push(OsString::from("-i"));
                    args.push(path.as_os_str().to_owned());
                }
                Input::Looped(path) => {
                    args.extend(["-stream_loop", "-1", "-i"].map(OsString::from));
                    args.push(path.as_os_str().to_owned());
                }
                Input::ConcatList { list, .. } => {
                    args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
                    args.push(list.as_os_str().to_owned());
                }
            }
        }
        if let Some(limit) = self.max_duration {
            args.push(OsString::from("-t"));
            args.push(OsString::from(format!("{:.2}", limit)));
        }
        if !self.audio_filters.is_empty() {
            let chain: Vec<String> = self.audio_filters.iter().map(|f| f.to_string()).collect();
            args.push(OsString::from("-af"));
            args.push(OsString::from(chain.join(",")));
        }
        if let Some(graph) = &self.graph {
            args.push(OsString::from("-filter_complex"));
            args.push(OsString::from(graph.to_string()));
        }
        match &self.codec {
            Some(Codec::Copy) => args.extend(["-c", "copy"].map(OsString::from)),
            Some(Codec::Opus { bitrate }) => {
                args.extend(["-c:a", "libopus", "-b:a", bitrate.as_str()].map(OsString::from))
            }
            None => {}
        }
        args.push(self.output.as_os_str().to_owned());
        args
    }
}

/// Seconds to whole milliseconds for `adelay`, clamped at zero.
pub fn millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// Contents of a concat-demuxer list file.
pub fn render_concat_list(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|p| format!("file '{}'\n", escape_concat_path(p)))
        .collect()
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

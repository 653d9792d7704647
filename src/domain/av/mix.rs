use super::graph::{AudioFilter, Chain, Codec, FilterGraph, Input, Invocation, MixDuration};
use crate::config::PipelineSettings;
use std::path::{Path, PathBuf};

/// Narration over the background track; the narration's duration wins.
pub fn base_mix_invocation(
    narration: &Path,
    background: &Path,
    settings: &PipelineSettings,
    output: &Path,
) -> Invocation {
    let graph = FilterGraph {
        chains: vec![
            Chain::new(
                vec!["1".into()],
                vec![AudioFilter::Volume(settings.base_mix_background_volume)],
                vec!["bg".into()],
            ),
            Chain::new(
                vec!["0".into(), "bg".into()],
                vec![AudioFilter::Mix {
                    inputs: 2,
                    duration: MixDuration::First,
                    dropout_transition: settings.base_mix_dropout_transition,
                }],
                vec![],
            ),
        ],
    };
    Invocation::new(output)
        .input(Input::File(narration.to_path_buf()))
        .input(Input::File(background.to_path_buf()))
        .graph(graph)
        .codec(Codec::Opus {
            bitrate: settings.bitrate.clone(),
        })
}

/// Lossless join of same-format narration files listed in `list`.
pub fn concat_invocation(list: &Path, entries: Vec<PathBuf>, output: &Path) -> Invocation {
    Invocation::new(output)
        .input(Input::ConcatList {
            list: list.to_path_buf(),
            entries,
        })
        .codec(Codec::Copy)
}

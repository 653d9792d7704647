//! Foley overlay graph: every (event type, timestamp) occurrence is a
//! delayed, attenuated copy of that type's clip, mixed over the base track.

use super::graph::{millis, AudioFilter, Chain, Codec, FilterGraph, Input, Invocation, MixDuration};
use crate::config::PipelineSettings;
use std::path::{Path, PathBuf};

/// One resolved effect clip and where it must sound.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub event_type: String,
    pub clip: PathBuf,
    pub timestamps: Vec<f64>,
}

const KNOWN_EFFECT_PROMPTS: [(&str, &str); 3] = [
    (
        "sword_clash",
        "Short metallic sword clash, bright ring, about 2 seconds.",
    ),
    (
        "door_creak",
        "Wooden door creaking open, slow, about 2 seconds.",
    ),
    ("thunder", "Low rumbling thunder roll, about 2 seconds."),
];

/// Generation prompt for an event type.
pub fn effect_prompt(event_type: &str) -> String {
    KNOWN_EFFECT_PROMPTS
        .iter()
        .find(|(name, _)| *name == event_type)
        .map(|(_, prompt)| prompt.to_string())
        .unwrap_or_else(|| format!("Sound effect for event: {}, about 2 seconds.", event_type))
}

/// Mix `base` with every placement in one invocation. The output lasts as long
/// as `base`; occurrences running past its end are cut.
///
/// Returns `None` when there is nothing to place.
pub fn overlay_invocation(
    base: &Path,
    placements: &[Placement],
    settings: &PipelineSettings,
    output: &Path,
) -> Option<Invocation> {
    let mut invocation = Invocation::new(output).input(Input::File(base.to_path_buf()));
    let mut chains = Vec::new();
    let mut mix_inputs = vec!["0:a".to_string()];

    let placed = placements.iter().filter(|p| !p.timestamps.is_empty());
    for (offset, placement) in placed.enumerate() {
        let input = offset + 1;
        invocation = invocation.input(Input::File(placement.clip.clone()));

        let count = placement.timestamps.len();
        let sources: Vec<String> = if count == 1 {
            vec![format!("{}:a", input)]
        } else {
            let split: Vec<String> = (0..count).map(|j| format!("s{}_{}", input, j)).collect();
            chains.push(Chain::new(
                vec![format!("{}:a", input)],
                vec![AudioFilter::Split(count)],
                split.clone(),
            ));
            split
        };

        for (j, (source, at)) in sources.into_iter().zip(&placement.timestamps).enumerate() {
            let label = format!("e{}_{}", input, j);
            chains.push(Chain::new(
                vec![source],
                vec![
                    AudioFilter::Delay { millis: millis(*at) },
                    AudioFilter::Volume(settings.overlay_volume),
                ],
                vec![label.clone()],
            ));
            mix_inputs.push(label);
        }
    }

    if mix_inputs.len() == 1 {
        return None;
    }

    let inputs = mix_inputs.len();
    chains.push(Chain::new(
        mix_inputs,
        vec![AudioFilter::Mix {
            inputs,
            duration: MixDuration::First,
            dropout_transition: settings.overlay_dropout_transition,
        }],
        vec![],
    ));

    Some(
        invocation
            .graph(FilterGraph { chains })
            .codec(Codec::Opus {
                bitrate: settings.bitrate.clone(),
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(name: &str, times: &[f64]) -> Placement {
        Placement {
            event_type: name.to_string(),
            clip: PathBuf::from(format!("{}.mp3", name)),
            timestamps: times.to_vec(),
        }
    }

    #[test]
    fn test_known_and_generic_prompts() {
        assert!(effect_prompt("thunder").contains("thunder roll"));
        assert_eq!(
            effect_prompt("glass_break"),
            "Sound effect for event: glass_break, about 2 seconds."
        );
    }

    #[test]
    fn test_single_occurrence_graph() {
        let settings = PipelineSettings::default();
        let inv = overlay_invocation(
            Path::new("base.ogg"),
            &[placement("thunder", &[3.5])],
            &settings,
            Path::new("fx.ogg"),
        )
        .unwrap();
        inv.validate().unwrap();
        assert_eq!(inv.inputs.len(), 2);
        assert_eq!(
            inv.graph.unwrap().to_string(),
            "[1:a]adelay=delays=3500:all=1,volume=0.45[e1_0];\
             [0:a][e1_0]amix=inputs=2:duration=first:dropout_transition=0"
        );
    }

    #[test]
    fn test_repeated_occurrences_split_the_clip() {
        let settings = PipelineSettings::default();
        let inv = overlay_invocation(
            Path::new("base.ogg"),
            &[
                placement("door_creak", &[1.0]),
                placement("sword_clash", &[2.0, 10.0]),
            ],
            &settings,
            Path::new("fx.ogg"),
        )
        .unwrap();
        let graph = inv.graph.unwrap().to_string();
        assert!(graph.contains("[2:a]asplit=2[s2_0][s2_1]"));
        assert!(graph.contains("[s2_1]adelay=delays=10000:all=1,volume=0.45[e2_1]"));
        assert!(graph.ends_with(
            "[0:a][e1_0][e2_0][e2_1]amix=inputs=4:duration=first:dropout_transition=0"
        ));
    }

    #[test]
    fn test_nothing_to_place() {
        let settings = PipelineSettings::default();
        assert!(overlay_invocation(Path::new("b.ogg"), &[], &settings, Path::new("o.ogg")).is_none());
        assert!(overlay_invocation(
            Path::new("b.ogg"),
            &[placement("thunder", &[])],
            &settings,
            Path::new("o.ogg")
        )
        .is_none());
    }
}

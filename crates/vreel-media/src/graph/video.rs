//! Video composition graph: normalize, concatenate, zoom/pan, hook caption.

use std::path::{Path, PathBuf};

use tracing::debug;
use vreel_models::{EncodingConfig, RenderConfig};

use super::{CompiledGraph, Filter, FilterGraph, MediaKind, StreamRef};
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Hook caption stays on screen for this window (seconds).
const HOOK_WINDOW: (f64, f64) = (0.0, 2.5);
const HOOK_FONT: &str = "Microsoft YaHei";
const HOOK_FONT_SIZE: u32 = 60;
const HOOK_Y: u32 = 150;

/// Video pass: graph plus everything needed to invoke the engine.
#[derive(Debug, Clone)]
pub struct VideoComposition {
    graph: CompiledGraph,
    clips: Vec<PathBuf>,
    duration_cap: f64,
    encoding: EncodingConfig,
}

impl VideoComposition {
    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Inputs in `-i` order. Input `i` feeds `[i:v]`.
    pub fn clips(&self) -> &[PathBuf] {
        &self.clips
    }

    pub fn duration_cap(&self) -> f64 {
        self.duration_cap
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    /// The single final video stream.
    pub fn video_output(&self) -> MediaResult<&StreamRef> {
        self.graph
            .output(MediaKind::Video)
            .ok_or_else(|| MediaError::invalid_graph("composition has no video output"))
    }

    /// Build the engine invocation writing to `output`.
    pub fn to_command(&self, output: impl AsRef<Path>) -> MediaResult<FfmpegCommand> {
        let video = self.video_output()?.map_arg();

        let cmd = self
            .clips
            .iter()
            .fold(FfmpegCommand::new(output), |cmd, clip| cmd.input(clip));

        Ok(cmd
            .duration(self.duration_cap)
            .filter_complex(self.graph.description())
            .map(video)
            .encoding(&self.encoding))
    }
}

/// Build the composition graph over an already expanded clip list.
///
/// The clip list must be non-empty and within `max_clip_inputs`; repeating
/// short footage happens before this call, never inside the graph.
pub fn build_composition(clips: &[PathBuf], config: &RenderConfig) -> MediaResult<VideoComposition> {
    if clips.is_empty() {
        return Err(MediaError::invalid_graph("composition needs at least one clip"));
    }
    if clips.len() > config.max_clip_inputs {
        return Err(MediaError::invalid_graph(format!(
            "{} clips exceed the input cap of {}",
            clips.len(),
            config.max_clip_inputs
        )));
    }

    let mut graph = FilterGraph::new(clips.len());

    let normalized: Vec<StreamRef> = (0..clips.len())
        .map(|i| {
            let input = graph.input(i, MediaKind::Video);
            graph
                .chain(vec![input], normalize_filters(config), &format!("v{}", i), MediaKind::Video)
                .into()
        })
        .collect();

    let concat = Filter::new("concat")
        .arg("n", clips.len())
        .arg("v", 1)
        .arg("a", 0);
    let mut current: StreamRef = graph
        .chain(normalized, vec![concat], "v_concat", MediaKind::Video)
        .into();

    if config.enable_zoompan {
        current = graph
            .chain(vec![current], vec![zoompan_filter(config)], "v_zoom", MediaKind::Video)
            .into();
    }

    if let Some(hook) = config.hook_text.as_deref() {
        current = graph
            .chain(vec![current], vec![hook_filter(hook)], "v_final", MediaKind::Video)
            .into();
    }

    let graph = graph.finish(vec![current])?;
    debug!(
        clips = clips.len(),
        zoompan = config.enable_zoompan,
        hook = config.hook_text.is_some(),
        "Built composition graph"
    );

    Ok(VideoComposition {
        graph,
        clips: clips.to_vec(),
        duration_cap: config.duration_cap_secs,
        encoding: config.composition.clone(),
    })
}

/// Cover-fit scale then crop to the exact canvas.
fn normalize_filters(config: &RenderConfig) -> Vec<Filter> {
    let ar = format!("{:.4}", config.aspect_ratio());
    let wider = format!("gte(iw/ih,{})", ar);

    vec![
        Filter::new("scale")
            .arg("w", format!("if({},-2,{})", wider, config.width))
            .arg("h", format!("if({},{},-2)", wider, config.height)),
        Filter::new("crop").positional(config.width).positional(config.height),
        Filter::new("setsar").positional(1),
    ]
}

/// Slow push-in capped at `zoom_max`, framed slightly above center.
fn zoompan_filter(config: &RenderConfig) -> Filter {
    Filter::new("zoompan")
        .arg("z", format!("min(zoom+{},{})", config.zoom_step, config.zoom_max))
        .arg("d", 1)
        .arg("x", "iw/2-(iw/zoom/2)")
        .arg("y", "ih/2-(ih/zoom/2)-(ih*0.05)")
        .arg("s", format!("{}x{}", config.width, config.height))
        .arg("fps", config.fps)
}

fn hook_filter(text: &str) -> Filter {
    Filter::new("drawtext")
        .arg("font", HOOK_FONT)
        .arg("text", text)
        .arg("expansion", "none")
        .arg("fontcolor", "yellow")
        .arg("fontsize", HOOK_FONT_SIZE)
        .arg("borderw", 3)
        .arg("bordercolor", "black")
        .arg("x", "(w-text_w)/2")
        .arg("y", HOOK_Y)
        .arg("enable", format!("between(t,{},{})", HOOK_WINDOW.0, HOOK_WINDOW.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vreel_models::Orientation;

    fn clips(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("clip{}.mp4", i))).collect()
    }

    #[test]
    fn test_portrait_graph_text() {
        let config = RenderConfig::for_orientation(Orientation::Portrait).with_zoompan(false);
        let comp = build_composition(&clips(2), &config).unwrap();
        let text = comp.graph().description();

        assert_eq!(
            text,
            "[0:v]scale=w=if(gte(iw/ih\\,0.5625)\\,-2\\,720):h=if(gte(iw/ih\\,0.5625)\\,1280\\,-2),crop=720:1280,setsar=1[v0];\
             [1:v]scale=w=if(gte(iw/ih\\,0.5625)\\,-2\\,720):h=if(gte(iw/ih\\,0.5625)\\,1280\\,-2),crop=720:1280,setsar=1[v1];\
             [v0][v1]concat=n=2:v=1:a=0[v_concat]"
        );
        assert_eq!(comp.video_output().unwrap().map_arg(), "[v_concat]");
    }

    #[test]
    fn test_landscape_aspect() {
        let config = RenderConfig::for_orientation(Orientation::Landscape);
        let comp = build_composition(&clips(1), &config).unwrap();
        let text = comp.graph().description();

        assert!(text.contains("gte(iw/ih\\,1.7778)"));
        assert!(text.contains("crop=1280:720"));
        assert!(text.contains("s=1280x720"));
    }

    #[test]
    fn test_zoompan_and_hook() {
        let config = RenderConfig::default().with_hook_text("Top 5 tips");
        let comp = build_composition(&clips(3), &config).unwrap();
        let text = comp.graph().description();

        assert!(text.contains(
            "[v_concat]zoompan=z=min(zoom+0.0005\\,1.1):d=1:x=iw/2-(iw/zoom/2):y=ih/2-(ih/zoom/2)-(ih*0.05):s=720x1280:fps=60[v_zoom]"
        ));
        assert!(text.contains("[v_zoom]drawtext=font=Microsoft YaHei:text=Top 5 tips:expansion=none"));
        assert!(text.contains("enable=between(t\\,0\\,2.5)[v_final]"));
        assert_eq!(comp.video_output().unwrap().map_arg(), "[v_final]");
    }

    #[test]
    fn test_hook_text_is_escaped() {
        let config = RenderConfig::default()
            .with_zoompan(false)
            .with_hook_text("Don't: [stop]");
        let comp = build_composition(&clips(1), &config).unwrap();

        assert!(comp
            .graph()
            .description()
            .contains("text=Don\\\\\\'t\\\\: \\[stop\\]"));
    }

    #[test]
    fn test_every_label_wired_once() {
        let config = RenderConfig::default().with_hook_text("hook");
        let comp = build_composition(&clips(20), &config).unwrap();
        let graph = comp.graph().graph();

        let produced: Vec<&str> = graph
            .nodes()
            .iter()
            .flat_map(|n| n.outputs().iter().map(|l| l.name()))
            .collect();
        let consumed: Vec<String> = graph
            .nodes()
            .iter()
            .flat_map(|n| n.inputs().iter())
            .filter_map(|s| match s {
                StreamRef::Label(l) => Some(l.name().to_string()),
                StreamRef::Input { .. } => None,
            })
            .collect();

        // Everything but the final label is consumed exactly once
        assert_eq!(produced.len(), consumed.len() + 1);
        for name in &consumed {
            assert_eq!(consumed.iter().filter(|c| *c == name).count(), 1);
            assert!(produced.contains(&name.as_str()));
        }
        assert!(!consumed.contains(&"v_final".to_string()));
    }

    #[test]
    fn test_rejects_bad_clip_lists() {
        let config = RenderConfig::default();
        assert!(build_composition(&[], &config).is_err());
        assert!(build_composition(&clips(21), &config).is_err());
    }

    #[test]
    fn test_command_arguments() {
        let config = RenderConfig::default().with_zoompan(false);
        let comp = build_composition(&clips(2), &config).unwrap();
        let args = comp.to_command("work/clip.mp4").unwrap().build_args();

        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, path)| path)
            .collect();
        assert_eq!(inputs, vec!["clip0.mp4", "clip1.mp4"]);

        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "60.000");
        let map = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map + 1], "[v_concat]");
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"18".to_string()));
    }
}

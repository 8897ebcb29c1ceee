//! End-to-end timing scenarios that run without FFmpeg.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use vreel_media::{PcmTrack, SubtitleTemplate};
use vreel_models::RenderConfig;
use vreel_tts::{DisabledSynthesizer, SpeechSynthesizer, TtsError, TtsResult};
use vreel_worker::narration::placeholder_duration;
use vreel_worker::{Pipeline, TimingAccumulator, WorkerConfig, WorkerError, PAUSE_SECS};

/// Synthesizes every sentence as a fixed-length WAV.
struct FixedLength {
    seconds: f64,
    sample_rate: u32,
}

#[async_trait]
impl SpeechSynthesizer for FixedLength {
    fn name(&self) -> &str {
        "fixed-length"
    }

    async fn synthesize(&self, _text: &str) -> TtsResult<Vec<u8>> {
        PcmTrack::tone(self.sample_rate, self.seconds, 330.0, -12.0)
            .to_wav_bytes(1)
            .map_err(|e| TtsError::InvalidResponse(e.to_string()))
    }
}

fn sentences(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn unit_speed() -> RenderConfig {
    RenderConfig::default().with_speed(1.0)
}

#[tokio::test]
async fn two_short_sentences_produce_contiguous_cues() {
    let config = unit_speed();
    let tts = Arc::new(FixedLength {
        seconds: 0.6,
        sample_rate: config.sample_rate,
    });

    let narration = TimingAccumulator::new(tts, &config)
        .accumulate(&sentences(&["你好", "世界"]))
        .await;
    let cues = narration.timeline.cues();

    let expected = [(0.0, 0.6, "你好"), (0.75, 1.35, "世界")];
    assert_eq!(cues.len(), expected.len());
    for (cue, (start, end, text)) in cues.iter().zip(expected) {
        assert!((cue.start - start).abs() < 1e-3, "start {} != {}", cue.start, start);
        assert!((cue.end - end).abs() < 1e-3, "end {} != {}", cue.end, end);
        assert_eq!(cue.text, text);
    }

    assert!((narration.timeline.total_duration() - 1.5).abs() < 1e-3);
    assert!((narration.track.duration_secs() - 1.5).abs() < 0.01);
    assert_eq!(narration.fallback_count(), 0);
}

#[tokio::test]
async fn speech_end_plus_pause_matches_track() {
    let config = unit_speed();
    let tts = Arc::new(FixedLength {
        seconds: 0.433,
        sample_rate: 16_000,
    });

    let narration = TimingAccumulator::new(tts, &config)
        .accumulate(&sentences(&["一", "二", "三", "四", "五", "六", "七"]))
        .await;

    let track = narration.track.duration_secs();
    assert!(narration.timeline.is_well_formed());
    assert!((narration.timeline.speech_end() + PAUSE_SECS - track).abs() <= 0.01);
    assert!((narration.timeline.total_duration() - track).abs() <= 0.01);
}

#[tokio::test]
async fn failing_synthesizer_still_produces_timeline() {
    let config = unit_speed();
    let narration = TimingAccumulator::new(Arc::new(DisabledSynthesizer), &config)
        .accumulate(&sentences(&["你好", "世界"]))
        .await;
    let cues = narration.timeline.cues();

    assert_eq!(cues.len(), 2);
    assert!((cues[0].start - 0.0).abs() < 1e-9);
    assert!((cues[0].end - 1.0).abs() < 1e-3);
    assert!((cues[1].start - 1.15).abs() < 1e-3);
    assert!((cues[1].end - 2.15).abs() < 1e-3);
    assert!((narration.timeline.total_duration() - 2.3).abs() < 1e-3);
    assert_eq!(narration.fallback_count(), 2);
    assert!(narration.track.peak() > 0, "placeholder must be audible");
}

#[tokio::test]
async fn placeholder_length_tracks_character_count() {
    let config = unit_speed();
    let lines = sentences(&["短", "稍微长一点", "这一句明显要更长一些"]);
    let narration = TimingAccumulator::new(Arc::new(DisabledSynthesizer), &config)
        .accumulate(&lines)
        .await;

    for (cue, line) in narration.timeline.cues().iter().zip(&lines) {
        assert!((cue.duration() - placeholder_duration(line)).abs() < 1e-3);
    }
    let durations: Vec<f64> = narration.timeline.cues().iter().map(|c| c.duration()).collect();
    assert!(durations.windows(2).all(|w| w[1] > w[0]));
}

#[tokio::test]
async fn subtitles_follow_the_timeline() {
    let config = unit_speed();
    let tts = Arc::new(FixedLength {
        seconds: 0.6,
        sample_rate: config.sample_rate,
    });
    let narration = TimingAccumulator::new(tts, &config)
        .accumulate(&sentences(&["你好", "世界"]))
        .await;

    let doc = SubtitleTemplate::builtin(config.width, config.height).render(&narration.timeline);
    assert!(doc.contains("Dialogue: 0,0:00:00.00,0:00:00.60,Default,,0,0,0,,你好"));
    assert!(doc.contains("Dialogue: 0,0:00:00.75,0:00:01.35,Default,,0,0,0,,世界"));
}

#[tokio::test]
async fn zero_clips_aborts_with_input_error() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    tokio::fs::create_dir(root.join("clips")).await.unwrap();
    tokio::fs::write(root.join("script.txt"), "你好\n世界").await.unwrap();
    tokio::fs::write(root.join("bgm.mp3"), b"x").await.unwrap();

    let config = WorkerConfig {
        work_dir: root.join("work"),
        output: root.join("final.mp4"),
        clip_dir: root.join("clips"),
        script_path: root.join("script.txt"),
        bgm_path: root.join("bgm.mp3"),
        ..WorkerConfig::default()
    };

    let err = Pipeline::new(config, Arc::new(DisabledSynthesizer))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::NoClips(_)));
    assert!(err.is_input_error());
    assert!(!root.join("work").exists(), "nothing may be written before inputs resolve");
}

//! Playback Coordination Tests
//!
//! Tests for:
//! - PlaybackCoordinator state transitions and supersession
//! - AnimationCompositor speech pair bookkeeping
//! - Avatar mount/speak/tick against an in-memory Pose

use std::sync::Arc;

use glam::Quat;
use serde_json::json;

use talking_avatar::animation::{
    AnimationClip, InterpolationMode, KeyframeTrack, Pose, PoseNode, PropertyPath, Track,
    TrackData,
};
use talking_avatar::avatar::{
    AnimationCompositor, AudioEvent, AudioHandle, AudioHost, Avatar, AvatarConfig, AvatarRig,
    BlendFrameSource, FinishReason, MorphDictionary, PlaybackCoordinator, PlaybackState,
    PlaybackStatus, SessionEnd, SessionId, SpeechClipPair, SpeechResponse, TrackSynthesizer,
};
use talking_avatar::avatar::coordinator::AUDIO_ERROR_NOTICE;
use talking_avatar::errors::{AudioFailure, AvatarError};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Fakes
// ============================================================================

/// Audio host that records every call and never produces events by itself.
#[derive(Default)]
struct FakeAudio {
    next: u64,
    loaded: Vec<(AudioHandle, String)>,
    playing: Vec<AudioHandle>,
    released: Vec<AudioHandle>,
    reject_play: bool,
}

impl FakeAudio {
    fn last_handle(&self) -> AudioHandle {
        self.loaded.last().expect("nothing loaded").0
    }
}

impl AudioHost for FakeAudio {
    fn load(&mut self, url: &str) -> AudioHandle {
        self.next += 1;
        let handle = AudioHandle(self.next);
        self.loaded.push((handle, url.to_string()));
        handle
    }

    fn play(&mut self, handle: AudioHandle) -> Result<(), AudioFailure> {
        if self.reject_play {
            return Err(AudioFailure::PlaybackRejected("autoplay blocked".into()));
        }
        self.playing.push(handle);
        Ok(())
    }

    fn pause(&mut self, handle: AudioHandle) {
        self.playing.retain(|&h| h != handle);
    }

    fn release(&mut self, handle: AudioHandle) {
        self.released.push(handle);
    }
}

fn mouth_pair() -> SpeechClipPair {
    let frames = BlendFrameSource::parse(&json!([
        { "t": 0.0, "mouthOpen": 0.0 },
        { "t": 0.5, "mouthOpen": 0.8 },
        { "t": 1.0, "mouthOpen": 0.0 },
    ]))
    .unwrap();
    let rig = AvatarRig::new(
        MorphDictionary::new("HG_Body", [("mouthOpen", 3)]).unwrap(),
        MorphDictionary::new("HG_TeethLower", [("mouthOpen", 0)]).unwrap(),
    );
    TrackSynthesizer::default().synthesize_pair(&frames, &rig)
}

fn idle_clip() -> AnimationClip {
    AnimationClip::new(
        "idle",
        vec![Track::new(
            PropertyPath::rotation("head"),
            TrackData::Quaternion(KeyframeTrack::new(
                vec![0.0, 2.0],
                vec![Quat::from_rotation_y(0.3), Quat::from_rotation_y(0.3)],
                InterpolationMode::Linear,
            )),
        )],
    )
}

fn blink_clip() -> AnimationClip {
    AnimationClip::new(
        "blink",
        vec![Track::new(
            PropertyPath::morph("HG_Body", 1),
            TrackData::Scalar(KeyframeTrack::new(
                vec![0.0, 4.0],
                vec![0.0, 0.0],
                InterpolationMode::Linear,
            )),
        )],
    )
}

struct Rig {
    coordinator: PlaybackCoordinator,
    compositor: AnimationCompositor,
    audio: FakeAudio,
    pose: Pose,
}

impl Rig {
    fn new() -> Self {
        Self {
            coordinator: PlaybackCoordinator::new(),
            compositor: AnimationCompositor::new(idle_clip(), Some(blink_clip())),
            audio: FakeAudio::default(),
            pose: Pose::new()
                .with_node(PoseNode::new("HG_Body").with_morph_targets(4))
                .with_node(PoseNode::new("HG_TeethLower").with_morph_targets(1))
                .with_node(PoseNode::new("head")),
        }
    }

    fn tick(&mut self, dt: f32) {
        self.compositor.tick(dt, &mut self.pose);
    }

    /// `mouthOpen` on the body and on the lower teeth.
    fn mouth(&self) -> (f32, f32) {
        (
            self.pose.morph_weight("HG_Body", 3).unwrap(),
            self.pose.morph_weight("HG_TeethLower", 0).unwrap(),
        )
    }

    fn assert_mouth(&self, expected: f32) {
        let (body, teeth) = self.mouth();
        assert!(
            approx(body, expected) && approx(teeth, expected),
            "mouth at ({body}, {teeth}), expected {expected}"
        );
    }

    fn request(&mut self, url: &str, clips: SpeechClipPair) -> SessionId {
        self.coordinator
            .request_utterance(url, clips, &mut self.compositor, &mut self.audio)
    }

    fn event(&mut self, handle: AudioHandle, event: AudioEvent) -> PlaybackStatus {
        self.coordinator
            .on_audio_event(handle, event, &mut self.compositor, &mut self.audio)
    }

    fn ready(&mut self) -> PlaybackStatus {
        let handle = self.audio.last_handle();
        self.event(handle, AudioEvent::CanPlayThrough)
    }
}

// ============================================================================
// State Transitions
// ============================================================================

#[test]
fn animation_waits_for_can_play_through() {
    let mut rig = Rig::new();
    let id = rig.request("http://h/a.mp3", mouth_pair());

    assert_eq!(rig.coordinator.status(), PlaybackStatus::AwaitingAudio);
    assert_eq!(rig.compositor.speech_action_count(), 0);
    assert!(rig.audio.playing.is_empty());
    assert_eq!(rig.audio.loaded[0].1, "http://h/a.mp3");

    assert_eq!(rig.ready(), PlaybackStatus::Playing);
    assert_eq!(rig.compositor.speech_action_count(), 2);
    assert_eq!(rig.audio.playing, vec![rig.audio.last_handle()]);
    assert_eq!(rig.coordinator.active_session().map(|s| s.id), Some(id));
}

#[test]
fn ended_finishes_and_unregisters() {
    let mut rig = Rig::new();
    let id = rig.request("a.mp3", mouth_pair());
    rig.ready();

    let handle = rig.audio.last_handle();
    assert_eq!(rig.event(handle, AudioEvent::Ended), PlaybackStatus::Finished);
    assert_eq!(rig.compositor.speech_action_count(), 0);
    assert!(matches!(
        rig.coordinator.state(),
        PlaybackState::Finished { id: done, reason: FinishReason::Completed } if *done == id
    ));
    assert_eq!(rig.audio.released, vec![handle]);

    let outcomes = rig.coordinator.take_outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].animated);
}

#[test]
fn supersede_while_awaiting_audio() {
    let mut rig = Rig::new();
    let a = rig.request("a.mp3", mouth_pair());
    let a_handle = rig.audio.last_handle();
    let b = rig.request("b.mp3", mouth_pair());
    assert_ne!(a, b);

    // A ended before B's audio was even loaded, and never animated.
    let outcomes = rig.coordinator.take_outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].id, a);
    assert_eq!(outcomes[0].end, SessionEnd::Finished(FinishReason::Superseded));
    assert!(!outcomes[0].animated);
    assert_eq!(rig.audio.released, vec![a_handle]);
    assert_eq!(rig.coordinator.status(), PlaybackStatus::AwaitingAudio);

    // A's late readiness callback must not start anything.
    assert_eq!(rig.event(a_handle, AudioEvent::CanPlayThrough), PlaybackStatus::AwaitingAudio);
    assert_eq!(rig.compositor.speech_action_count(), 0);
    rig.tick(0.5);
    rig.assert_mouth(0.0);

    assert_eq!(rig.ready(), PlaybackStatus::Playing);
    assert_eq!(rig.coordinator.active_session().map(|s| s.id), Some(b));
    rig.tick(0.5);
    rig.assert_mouth(0.8);
}

#[test]
fn interrupting_playback_leaves_one_pair() {
    let mut rig = Rig::new();
    rig.request("a.mp3", mouth_pair());
    rig.ready();
    let a_handle = rig.audio.last_handle();
    assert_eq!(rig.compositor.speech_action_count(), 2);
    rig.tick(0.5);
    rig.assert_mouth(0.8);

    rig.request("b.mp3", mouth_pair());
    // Torn down synchronously, before B is ready.
    assert_eq!(rig.compositor.speech_action_count(), 0);
    assert!(!rig.audio.playing.contains(&a_handle));

    // While B waits for its audio, A's mouth shape is gone.
    rig.tick(0.1);
    rig.assert_mouth(0.0);

    rig.ready();
    assert_eq!(rig.compositor.speech_action_count(), 2);
    rig.tick(0.25);
    rig.assert_mouth(0.4);

    let outcomes = rig.coordinator.take_outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].animated);

    // A's ended callback arrives late and is ignored.
    assert_eq!(rig.event(a_handle, AudioEvent::Ended), PlaybackStatus::Playing);
    assert_eq!(rig.compositor.speech_action_count(), 2);
}

#[test]
fn rejected_play_fails_with_notice() {
    let mut rig = Rig::new();
    rig.audio.reject_play = true;
    let id = rig.request("a.mp3", mouth_pair());

    assert_eq!(rig.ready(), PlaybackStatus::Failed);
    assert_eq!(rig.compositor.speech_action_count(), 0);

    let notices = rig.coordinator.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].session, Some(id));
    assert_eq!(notices[0].message, AUDIO_ERROR_NOTICE);
    assert!(rig.coordinator.take_notices().is_empty());
}

#[test]
fn audio_error_while_playing_fails() {
    let mut rig = Rig::new();
    rig.request("a.mp3", mouth_pair());
    rig.ready();
    rig.tick(0.5);
    rig.assert_mouth(0.8);

    let handle = rig.audio.last_handle();
    let status = rig.event(handle, AudioEvent::Error(AudioFailure::Network("reset".into())));

    assert_eq!(status, PlaybackStatus::Failed);
    assert_eq!(rig.compositor.speech_action_count(), 0);
    rig.tick(0.1);
    rig.assert_mouth(0.0);
    assert!(matches!(
        rig.coordinator.state(),
        PlaybackState::Failed { failure: AudioFailure::Network(_), .. }
    ));
    assert_eq!(rig.coordinator.take_notices().len(), 1);
}

#[test]
fn audio_error_while_awaiting_fails() {
    let mut rig = Rig::new();
    rig.request("a.mp3", mouth_pair());
    let handle = rig.audio.last_handle();

    let status = rig.event(handle, AudioEvent::Error(AudioFailure::Decode("bad header".into())));
    assert_eq!(status, PlaybackStatus::Failed);
    let outcomes = rig.coordinator.take_outcomes();
    assert!(!outcomes[0].animated);
}

#[test]
fn stop_and_abort() {
    let mut rig = Rig::new();
    rig.request("a.mp3", mouth_pair());
    rig.ready();
    rig.tick(0.5);

    rig.coordinator.stop(&mut rig.compositor, &mut rig.audio);
    assert!(matches!(
        rig.coordinator.state(),
        PlaybackState::Finished { reason: FinishReason::Stopped, .. }
    ));
    assert_eq!(rig.compositor.speech_action_count(), 0);
    rig.tick(0.1);
    rig.assert_mouth(0.0);

    // Nothing active: both are no-ops.
    rig.coordinator.stop(&mut rig.compositor, &mut rig.audio);
    rig.coordinator
        .abort(AudioFailure::Network("timeout".into()), &mut rig.compositor, &mut rig.audio);
    assert_eq!(rig.coordinator.status(), PlaybackStatus::Finished);

    rig.request("b.mp3", mouth_pair());
    rig.coordinator
        .abort(AudioFailure::Network("timeout".into()), &mut rig.compositor, &mut rig.audio);
    assert_eq!(rig.coordinator.status(), PlaybackStatus::Failed);
}

#[test]
fn backend_failure_only_adds_notice() {
    let mut rig = Rig::new();
    rig.request("a.mp3", mouth_pair());
    rig.ready();

    rig.coordinator.report_backend_failure("HTTP 500");
    assert_eq!(rig.coordinator.status(), PlaybackStatus::Playing);

    let notices = rig.coordinator.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].session, None);
}

#[test]
fn empty_pair_still_plays_through() {
    let frames = BlendFrameSource::parse(&json!([
        { "t": 0.0, "tongueCurl": 0.2 },
        { "t": 0.7, "tongueCurl": 0.9 },
    ]))
    .unwrap();
    let rig_dicts = AvatarRig::new(
        MorphDictionary::new("HG_Body", [("mouthOpen", 3)]).unwrap(),
        MorphDictionary::new("HG_TeethLower", [("mouthOpen", 0)]).unwrap(),
    );
    let pair = TrackSynthesizer::default().synthesize_pair(&frames, &rig_dicts);
    assert_eq!(pair.track_count(), 0);

    let mut rig = Rig::new();
    rig.request("a.mp3", pair);
    assert_eq!(rig.ready(), PlaybackStatus::Playing);

    let handle = rig.audio.last_handle();
    assert_eq!(rig.event(handle, AudioEvent::Ended), PlaybackStatus::Finished);
}

#[test]
fn persistent_loops_survive_many_sessions() {
    init_logging();
    let mut rig = Rig::new();

    for round in 0..24 {
        rig.request(&format!("{round}.mp3"), mouth_pair());
        if round % 4 != 3 {
            rig.ready();
        }
        let handle = rig.audio.last_handle();
        match round % 4 {
            0 => {
                rig.event(handle, AudioEvent::Ended);
            }
            1 => rig.coordinator.stop(&mut rig.compositor, &mut rig.audio),
            2 => {
                rig.event(handle, AudioEvent::Error(AudioFailure::Decode("x".into())));
            }
            // Left awaiting; the next request supersedes it.
            _ => {}
        }

        assert!(rig.compositor.persistent_actions_running(), "round {round}");
        assert!(rig.compositor.speech_action_count() <= 2);
        assert_eq!(rig.compositor.mixer().len(), 2 + rig.compositor.speech_action_count());
    }
}

// ============================================================================
// Compositor
// ============================================================================

#[test]
fn speech_overrides_blink_then_releases_channel() {
    let mut pose = Pose::new().with_node(PoseNode::new("HG_Body").with_morph_targets(4));
    let mut compositor = AnimationCompositor::new(idle_clip(), Some(blink_clip()));

    let speech = AnimationClip::new(
        "HG_Body",
        vec![Track::new(
            PropertyPath::morph("HG_Body", 1),
            TrackData::Scalar(KeyframeTrack::new(
                vec![0.0, 1.0],
                vec![0.9, 0.9],
                InterpolationMode::Linear,
            )),
        )],
    );
    let pair = SpeechClipPair {
        body: Arc::new(speech),
        teeth: Arc::new(AnimationClip::empty("HG_TeethLower")),
    };

    let slot = compositor.play_speech(&pair, 1.0);
    compositor.tick(0.1, &mut pose);
    assert!(approx(pose.morph_weight("HG_Body", 1).unwrap(), 0.9));

    assert!(compositor.stop_speech(slot));
    assert!(!compositor.stop_speech(slot));
    compositor.tick(0.1, &mut pose);
    assert!(approx(pose.morph_weight("HG_Body", 1).unwrap(), 0.0));
}

#[test]
fn played_out_pair_is_released_by_tick() {
    let mut pose = Pose::new();
    let mut compositor = AnimationCompositor::new(idle_clip(), None);
    compositor.play_speech(&mouth_pair(), 1.0);

    compositor.tick(0.6, &mut pose);
    assert_eq!(compositor.speech_action_count(), 2);
    compositor.tick(0.6, &mut pose);
    assert_eq!(compositor.speech_action_count(), 0);
    assert!(compositor.speech_slot().is_none());
    assert_eq!(compositor.mixer().len(), 1);
    assert!(compositor.persistent_actions_running());
    assert!(!compositor.has_blink());
}

#[test]
fn played_out_pair_leaves_session_playing() {
    let mut rig = Rig::new();
    rig.request("a.mp3", mouth_pair());
    rig.ready();

    // The clips last 1 s; the audio keeps going.
    for _ in 0..15 {
        rig.tick(0.1);
    }
    assert_eq!(rig.compositor.speech_action_count(), 0);
    assert_eq!(rig.coordinator.status(), PlaybackStatus::Playing);
    rig.assert_mouth(0.0);

    let handle = rig.audio.last_handle();
    assert_eq!(rig.event(handle, AudioEvent::Ended), PlaybackStatus::Finished);
    assert!(rig.coordinator.take_outcomes()[0].animated);
}

#[test]
fn speech_only_channel_returns_to_rest_after_stop() {
    let mut pose = Pose::new().with_node(PoseNode::new("HG_Body").with_morph_targets(4));
    let mut compositor = AnimationCompositor::new(idle_clip(), Some(blink_clip()));

    let slot = compositor.play_speech(&mouth_pair(), 1.0);
    compositor.tick(0.5, &mut pose);
    assert!(approx(pose.morph_weight("HG_Body", 3).unwrap(), 0.8));

    compositor.stop_speech(slot);
    assert!(compositor.mixer().pending_restore_count() > 0);
    compositor.tick(0.1, &mut pose);
    assert!(approx(pose.morph_weight("HG_Body", 3).unwrap(), 0.0));
    assert_eq!(compositor.mixer().pending_restore_count(), 0);
}

// ============================================================================
// Avatar
// ============================================================================

fn avatar_pose() -> Pose {
    Pose::new()
        .with_node(PoseNode::new("HG_Body").with_morph_targets(3))
        .with_node(PoseNode::new("HG_TeethLower").with_morph_targets(1))
        .with_node(PoseNode::new("head"))
        .with_node(PoseNode::new("neck"))
        .with_node(PoseNode::new("spine2"))
}

fn mixamo_idle() -> AnimationClip {
    AnimationClip::new(
        "mixamo.com",
        vec![Track::new(
            PropertyPath::rotation("mixamorigHead"),
            TrackData::Quaternion(KeyframeTrack::new(
                vec![0.0, 2.0],
                vec![Quat::from_rotation_y(0.3), Quat::from_rotation_y(0.3)],
                InterpolationMode::Linear,
            )),
        )],
    )
}

fn mount_avatar() -> Avatar {
    let config = AvatarConfig::default();
    let rig = AvatarRig::from_config(
        &config,
        &["jawOpen", "eyeBlink_L", "eyeBlink_R"],
        &["jawOpen"],
    )
    .unwrap();
    Avatar::mount(config, rig, &mixamo_idle()).unwrap()
}

#[test]
fn avatar_speaks_into_pose() {
    init_logging();
    let mut avatar = mount_avatar();
    let mut audio = FakeAudio::default();
    let mut pose = avatar_pose();

    assert!(avatar.compositor().has_blink());
    assert_eq!(avatar.compositor().mixer().len(), 2);

    let response = SpeechResponse::from_json(
        r#"{
            "blendData": [
                { "time": 0.0, "blendshapes": { "jawOpen": 0.0 } },
                { "time": 1.0, "blendshapes": { "jawOpen": 1.0 } }
            ],
            "filename": "/speech-1.mp3"
        }"#,
    )
    .unwrap();
    avatar.speak(&response, "http://localhost:5000", &mut audio);
    assert_eq!(audio.loaded[0].1, "http://localhost:5000/speech-1.mp3");

    // Not ready yet: only idle and blink write.
    avatar.tick(0.5, &mut pose);
    assert!(approx(pose.morph_weight("HG_Body", 0).unwrap(), 0.0));
    let head = pose.rotation("head").unwrap();
    assert!(head.angle_between(Quat::from_rotation_y(0.3)) < 1e-3);

    let handle = audio.last_handle();
    assert_eq!(
        avatar.handle_audio_event(handle, AudioEvent::CanPlayThrough, &mut audio),
        PlaybackStatus::Playing
    );

    avatar.tick(0.5, &mut pose);
    assert!(approx(pose.morph_weight("HG_Body", 0).unwrap(), 0.5));
    assert!(approx(pose.morph_weight("HG_TeethLower", 0).unwrap(), 0.5));
    assert!(approx(pose.morph_weight("HG_Body", 1).unwrap(), 0.0));

    avatar.handle_audio_event(handle, AudioEvent::Ended, &mut audio);
    assert_eq!(avatar.status(), PlaybackStatus::Finished);
    assert_eq!(avatar.compositor().mixer().len(), 2);
}

#[test]
fn malformed_blend_data_still_plays_audio() {
    init_logging();
    let mut avatar = mount_avatar();
    let mut audio = FakeAudio::default();

    let response = SpeechResponse::from_json(
        r#"{ "blendData": [{ "t": 0.5 }, { "t": 0.2 }], "filename": "x.mp3" }"#,
    )
    .unwrap();
    avatar.speak(&response, "http://h", &mut audio);

    let handle = audio.last_handle();
    avatar.handle_audio_event(handle, AudioEvent::CanPlayThrough, &mut audio);
    assert_eq!(avatar.status(), PlaybackStatus::Playing);
    assert_eq!(audio.playing, vec![handle]);
    assert!(avatar.take_notices().is_empty());
}

#[test]
fn mount_rejects_mismatched_rig() {
    let config = AvatarConfig::default();
    let rig = AvatarRig::new(
        MorphDictionary::new("Wolf3D_Head", [("jawOpen", 0)]).unwrap(),
        MorphDictionary::new("HG_TeethLower", [("jawOpen", 0)]).unwrap(),
    );
    let err = Avatar::mount(config, rig, &mixamo_idle()).err();
    assert!(matches!(err, Some(AvatarError::Config(_))));
}

#[test]
fn mount_without_blink() {
    let config = AvatarConfig {
        blink_enabled: false,
        ..AvatarConfig::default()
    };
    let rig = AvatarRig::from_config(&config, &["jawOpen"], &["jawOpen"]).unwrap();
    let avatar = Avatar::mount(config, rig, &mixamo_idle()).unwrap();
    assert!(!avatar.compositor().has_blink());
    assert_eq!(avatar.compositor().mixer().len(), 1);
}

#[test]
fn avatar_mouth_closes_after_stop() {
    init_logging();
    let mut avatar = mount_avatar();
    let mut audio = FakeAudio::default();
    let mut pose = avatar_pose();

    let response = SpeechResponse::from_json(
        r#"{
            "blendData": [
                { "time": 0.0, "blendshapes": { "jawOpen": 0.0 } },
                { "time": 1.0, "blendshapes": { "jawOpen": 1.0 } },
                { "time": 2.0, "blendshapes": { "jawOpen": 0.0 } }
            ],
            "filename": "/speech-2.mp3"
        }"#,
    )
    .unwrap();
    avatar.speak(&response, "http://h", &mut audio);
    let handle = audio.last_handle();
    avatar.handle_audio_event(handle, AudioEvent::CanPlayThrough, &mut audio);

    avatar.tick(0.8, &mut pose);
    assert!(approx(pose.morph_weight("HG_Body", 0).unwrap(), 0.8));

    avatar.stop(&mut audio);
    for _ in 0..10 {
        avatar.tick(0.1, &mut pose);
    }
    assert_eq!(avatar.status(), PlaybackStatus::Finished);
    assert!(approx(pose.morph_weight("HG_Body", 0).unwrap(), 0.0));
    assert!(approx(pose.morph_weight("HG_TeethLower", 0).unwrap(), 0.0));
}

#[test]
fn mount_rejects_malformed_idle_clip() {
    let config = AvatarConfig::default();
    let rig = AvatarRig::from_config(&config, &["jawOpen"], &["jawOpen"]).unwrap();
    let idle = AnimationClip::new(
        "mixamo.com",
        vec![Track::new(
            PropertyPath::rotation("mixamorigHead"),
            TrackData::Quaternion(KeyframeTrack::new(
                vec![0.0, 1.0, 2.0],
                vec![Quat::IDENTITY],
                InterpolationMode::Linear,
            )),
        )],
    );

    let err = Avatar::mount(config, rig, &idle).err();
    assert!(matches!(err, Some(AvatarError::InvalidTrack { .. })));
}

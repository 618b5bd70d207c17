// End-to-end runs over a working directory of fragment files

use midi_timeline::codec::{encode_document, read_document};
use midi_timeline::models::{Document, Event, EventKind, Meta, Track};
use midi_timeline::timeline::InstrumentTag;
use midi_timeline::{Engine, EngineConfig, Outcome, SlotMode, TimelineError};
use std::path::Path;
use tempfile::TempDir;

/// Helper: a one-track part with `count` quarter notes after `lead_in` ticks of silence
fn part(tpb: u16, lead_in: u32, key: u8, count: usize) -> Document {
    let quarter = tpb as u32;
    let mut events = vec![Event::program_change(0, 0, 12)];
    for i in 0..count {
        let delta = if i == 0 { lead_in } else { 0 };
        events.push(Event::note_on(delta, 0, key, 90));
        events.push(Event::note_off(quarter, 0, key, 0));
    }
    Document::with_tracks(tpb, vec![Track::from_events(events)])
}

fn write_midi(dir: &Path, name: &str, doc: &Document) {
    std::fs::write(dir.join(name), encode_document(doc).unwrap()).unwrap();
}

fn note_on_ticks(track: &Track) -> Vec<(u64, u8)> {
    track
        .absolute_events()
        .filter_map(|(tick, e)| match e.kind {
            EventKind::NoteOn { key, velocity, .. } if velocity > 0 => Some((tick, key)),
            _ => None,
        })
        .collect()
}

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).unwrap()
}

#[test]
fn test_numbered_parts_are_stitched_in_order() {
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_midi(work.path(), "Part_2.mid", &part(480, 0, 64, 2));
    write_midi(work.path(), "Part_10.mid", &part(480, 0, 67, 1));
    // Leading silence gets trimmed before placement
    write_midi(work.path(), "Part_1.mid", &part(480, 960, 60, 5));

    let output = out.path().join("song.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::Assembled);
    assert_eq!(report.fragments_used, vec!["Part_1.mid", "Part_2.mid", "Part_10.mid"]);

    let doc = read_document(&output).unwrap();
    // Part_1: 2400 ticks -> 2 bars; Part_2: 960 -> 1 bar
    let ons = note_on_ticks(&doc.tracks[0]);
    assert_eq!(ons[0], (0, 60));
    assert_eq!(ons[5], (3840, 64));
    assert_eq!(ons[7], (5760, 67));
}

#[test]
fn test_instrument_tag_applied_to_output() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "Part_1.mid", &part(480, 0, 60, 1));
    write_midi(work.path(), "Part_2.mid", &part(480, 0, 62, 1));

    let mut config = EngineConfig::default();
    config.instrument = Some(InstrumentTag { program: Some(0), channel: Some(3) });
    let engine = Engine::new(config).unwrap();

    let output = work.path().join("combined_out.mid");
    engine.run(work.path(), &output).unwrap();

    let doc = read_document(&output).unwrap();
    let programs: Vec<&Event> = doc.tracks[0].events.iter().filter(|e| e.is_program_change()).collect();
    assert_eq!(programs, vec![&Event::program_change(0, 3, 0)]);
    assert!(doc.tracks[0]
        .events
        .iter()
        .filter_map(|e| e.kind.channel())
        .all(|c| c == 3));
}

#[test]
fn test_mixed_resolutions_use_target() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "Part_1.mid", &part(96, 0, 60, 4));
    write_midi(work.path(), "Part_2.mid", &part(480, 0, 62, 1));

    let mut config = EngineConfig::default();
    config.target_ticks_per_beat = Some(960);
    let output = work.path().join("combined.mid");
    Engine::new(config).unwrap().run(work.path(), &output).unwrap();

    let doc = read_document(&output).unwrap();
    assert_eq!(doc.ticks_per_beat, 960);
    // One full 4/4 bar at 960 tpb
    assert_eq!(note_on_ticks(&doc.tracks[0])[4], (3840, 62));
}

#[test]
fn test_fixed_bars_policy() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "Part_1.mid", &part(480, 0, 60, 1));
    write_midi(work.path(), "Part_2.mid", &part(480, 0, 62, 1));

    let mut config = EngineConfig::default();
    config.slot_policy = SlotMode::FixedBars { bars: 4 };
    let output = work.path().join("combined.mid");
    Engine::new(config).unwrap().run(work.path(), &output).unwrap();

    let doc = read_document(&output).unwrap();
    assert_eq!(note_on_ticks(&doc.tracks[0]), vec![(0, 60), (7680, 62)]);
}

#[test]
fn test_single_final_file_is_used_unmodified() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "Part_1.mid", &part(480, 0, 60, 1));
    write_midi(work.path(), "Final_Mix.mid", &part(480, 240, 72, 3));

    let output = work.path().join("combined_result.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::UsedFinal);
    assert_eq!(
        std::fs::read(&output).unwrap(),
        std::fs::read(work.path().join("Final_Mix.mid")).unwrap()
    );
}

#[test]
fn test_unreadable_fragment_is_skipped() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "Part_1.mid", &part(480, 0, 60, 1));
    std::fs::write(work.path().join("Part_2.mid"), b"garbage").unwrap();
    write_midi(work.path(), "Part_3.mid", &part(480, 0, 64, 1));

    let output = work.path().join("combined.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::Assembled);
    assert_eq!(report.fragments_used, vec!["Part_1.mid", "Part_3.mid"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "Part_2.mid");

    let doc = read_document(&output).unwrap();
    assert_eq!(note_on_ticks(&doc.tracks[0]), vec![(0, 60), (1920, 64)]);
}

#[test]
fn test_fallback_to_largest_file_on_total_failure() {
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    std::fs::write(work.path().join("Part_1.mid"), vec![0u8; 1000]).unwrap();
    std::fs::write(work.path().join("Part_2.mid"), vec![7u8; 5000]).unwrap();

    let output = out.path().join("song.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::FellBack);
    assert_eq!(report.fragments_used, vec!["Part_2.mid"]);
    assert!(report.fallback_reason.is_some());
    assert_eq!(std::fs::read(&output).unwrap(), vec![7u8; 5000]);
}

#[test]
fn test_empty_directory_is_fatal() {
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("notes.txt"), b"not midi").unwrap();

    let output = work.path().join("out.mid");
    let err = engine().run(work.path(), &output).unwrap_err();

    assert!(matches!(err, TimelineError::MissingFragments { .. }));
    assert!(!output.exists());
}

#[test]
fn test_no_fallback_when_every_candidate_is_empty() {
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("Part_1.mid"), b"").unwrap();

    let output = work.path().join("combined.mid");
    let err = engine().run(work.path(), &output).unwrap_err();

    assert!(matches!(err, TimelineError::NoFallbackAvailable { .. }));
    assert!(!output.exists());
}

#[test]
fn test_silent_parts_fall_back_instead_of_empty_output() {
    let work = TempDir::new().unwrap();
    let silent = Document::with_tracks(480, vec![Track::new()]);
    write_midi(work.path(), "Part_1.mid", &silent);

    let output = work.path().join("combined.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::FellBack);
}

#[test]
fn test_drum_stems_are_merged() {
    let work = TempDir::new().unwrap();
    let hit = |lead_in: u32| {
        Document::with_tracks(
            480,
            vec![
                Track::from_events(vec![Event::meta(0, Meta::Tempo(500_000))]),
                Track::from_events(vec![Event::note_on(lead_in, 0, 60, 100), Event::note_off(60, 0, 60, 0)]),
            ],
        )
    };
    write_midi(work.path(), "snare.mid", &hit(480));
    write_midi(work.path(), "stem_kick.mid", &hit(0));
    write_midi(work.path(), "hi_hat.mid", &hit(240));

    let output = work.path().join("combined_drums.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::Merged);
    assert_eq!(report.fragments_used, vec!["stem_kick.mid", "snare.mid", "hi_hat.mid"]);

    let doc = read_document(&output).unwrap();
    assert_eq!(doc.tracks.len(), 1);
    assert_eq!(note_on_ticks(&doc.tracks[0]), vec![(0, 36), (240, 42), (480, 38)]);
    assert!(doc.tracks[0]
        .events
        .iter()
        .filter_map(|e| e.kind.channel())
        .all(|c| c == 9));
}

#[cfg(unix)]
#[test]
fn test_output_is_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let work = TempDir::new().unwrap();
    write_midi(work.path(), "Part_1.mid", &part(480, 0, 60, 1));

    let output = work.path().join("combined.mid");
    engine().run(work.path(), &output).unwrap();

    let mode = std::fs::metadata(&output).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[test]
fn test_report_serializes_to_json() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "Part_1.mid", &part(480, 0, 60, 1));

    let output = work.path().join("combined.mid");
    let report = engine().run(work.path(), &output).unwrap();

    let json = report.to_json().unwrap();
    assert!(json.contains("\"outcome\": \"assembled\""));
    assert!(json.contains("Part_1.mid"));
}

#[test]
fn test_rerun_ignores_previous_output() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "A_Part.mid", &part(480, 0, 60, 1));
    let output = work.path().join("song.mid");

    engine().run(work.path(), &output).unwrap();
    let report = engine().run(work.path(), &output).unwrap();

    // song.mid would otherwise count as an unnumbered part
    assert_eq!(report.fragments_used, vec!["A_Part.mid"]);
}

fn channels(track: &Track) -> Vec<u8> {
    track.events.iter().filter_map(|e| e.kind.channel()).collect()
}

#[test]
fn test_instrument_stems_are_layered_on_mapped_channels() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "stem_piano.mid", &part(480, 0, 60, 1));
    write_midi(work.path(), "stem_bass.mid", &part(480, 240, 40, 2));
    std::fs::write(work.path().join("stem_guitar.mid"), b"garbage").unwrap();

    let output = work.path().join("combined.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::Layered);
    assert_eq!(report.fragments_used, vec!["stem_bass.mid", "stem_piano.mid"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "stem_guitar.mid");

    let doc = read_document(&output).unwrap();
    assert_eq!(doc.tracks.len(), 2);
    assert_eq!(doc.tracks[0].events[0].kind, EventKind::Meta(Meta::TrackName(b"BASS".to_vec())));
    assert_eq!(doc.tracks[1].events[0].kind, EventKind::Meta(Meta::TrackName(b"PIANO".to_vec())));
    assert!(channels(&doc.tracks[0]).iter().all(|&c| c == 1));
    assert!(channels(&doc.tracks[1]).iter().all(|&c| c == 0));
    // Stems play together, so nothing is trimmed or shifted
    assert_eq!(note_on_ticks(&doc.tracks[0]), vec![(240, 40), (720, 40)]);
    assert_eq!(note_on_ticks(&doc.tracks[1]), vec![(0, 60)]);
}

#[test]
fn test_drum_voices_are_layered_with_instruments() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "piano.mid", &part(480, 0, 60, 1));
    write_midi(work.path(), "kick.mid", &part(480, 480, 50, 1));

    let output = work.path().join("combined.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::Layered);
    assert_eq!(report.fragments_used, vec!["piano.mid", "kick.mid"]);

    let doc = read_document(&output).unwrap();
    assert_eq!(doc.tracks.len(), 2);
    assert_eq!(doc.tracks[1].events[0].kind, EventKind::Meta(Meta::TrackName(b"DRUMS".to_vec())));
    assert_eq!(note_on_ticks(&doc.tracks[1]), vec![(480, 36)]);
    assert!(channels(&doc.tracks[1]).iter().all(|&c| c == 9));
    assert!(channels(&doc.tracks[0]).iter().all(|&c| c == 0));
}

#[test]
fn test_parts_without_notes_fall_back() {
    let work = TempDir::new().unwrap();
    let conductor = |name: &[u8]| {
        Document::with_tracks(
            480,
            vec![Track::from_events(vec![
                Event::meta(0, Meta::Tempo(500_000)),
                Event::meta(0, Meta::TrackName(name.to_vec())),
            ])],
        )
    };
    write_midi(work.path(), "Part_1.mid", &conductor(b"Intro"));
    write_midi(work.path(), "Part_2.mid", &conductor(b"Outro"));

    let output = work.path().join("combined.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::FellBack);
    assert!(report
        .fallback_reason
        .as_deref()
        .unwrap_or_default()
        .contains("no audible notes"));
}

fn snapshot(dir: &Path) -> std::collections::BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, std::fs::read(&path).unwrap())
        })
        .collect()
}

#[test]
fn test_fragments_are_never_modified() {
    let assemble = TempDir::new().unwrap();
    // Leading silence makes the normalizer do real work
    write_midi(assemble.path(), "Part_1.mid", &part(480, 960, 60, 2));
    write_midi(assemble.path(), "Part_2.mid", &part(96, 48, 62, 1));

    let merge = TempDir::new().unwrap();
    write_midi(merge.path(), "kick.mid", &part(480, 240, 60, 2));
    write_midi(merge.path(), "snare.mid", &part(480, 480, 60, 1));

    let fallback = TempDir::new().unwrap();
    std::fs::write(fallback.path().join("Part_1.mid"), vec![3u8; 300]).unwrap();
    std::fs::write(fallback.path().join("Part_2.mid"), vec![4u8; 600]).unwrap();

    let out = TempDir::new().unwrap();
    let cases = [
        (assemble.path(), Outcome::Assembled),
        (merge.path(), Outcome::Merged),
        (fallback.path(), Outcome::FellBack),
    ];
    for (i, (dir, expected)) in cases.iter().enumerate() {
        let before = snapshot(dir);
        let output = out.path().join(format!("song_{}.mid", i));
        let report = engine().run(dir, &output).unwrap();

        assert_eq!(report.outcome, *expected);
        assert_eq!(snapshot(dir), before);
    }
}

#[test]
fn test_sequential_parts_take_precedence_over_stems() {
    let work = TempDir::new().unwrap();
    write_midi(work.path(), "kick.mid", &part(480, 0, 60, 2));
    write_midi(work.path(), "stem_piano.mid", &part(480, 0, 60, 2));
    write_midi(work.path(), "notes.mid", &part(480, 0, 64, 1));

    let output = work.path().join("combined.mid");
    let report = engine().run(work.path(), &output).unwrap();

    assert_eq!(report.outcome, Outcome::Assembled);
    assert_eq!(report.fragments_used, vec!["notes.mid"]);
}

#[test]
fn test_default_resolution_when_nothing_loaded() {
    let merged = engine().merge_stems(&[]).unwrap();
    assert_eq!(merged.ticks_per_beat, midi_timeline::defaults::DEFAULT_TPB);
    assert!(!merged.has_audible_notes());

    let mut config = EngineConfig::default();
    config.target_ticks_per_beat = Some(960);
    let merged = Engine::new(config).unwrap().merge_stems(&[]).unwrap();
    assert_eq!(merged.ticks_per_beat, 960);
}

use super::discovery::{Candidate, Discovery};
use super::fallback::{select_final, select_largest};
use crate::codec::{encode_document, read_document, write_bytes};
use crate::config::EngineConfig;
use crate::defaults::DEFAULT_TPB;
use crate::error::{Result, TimelineError};
use crate::models::{Document, Fragment};
use crate::timeline::{align, layer_stems, merge_voices, normalize, tag_document, Assembler, StemVoice};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Track label of a merged drum kit when layered with instruments
const DRUM_LAYER: &str = "drums";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A pre-combined final file was copied through
    UsedFinal,
    /// Sequential parts were stitched
    Assembled,
    /// Single-voice stems were flattened into one track
    Merged,
    /// Instrument stems were stacked as separate tracks
    Layered,
    /// Assembly failed and the largest candidate was copied through
    FellBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFragment {
    pub name: String,
    pub reason: String,
}

/// What a run did, for logs and callers
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub output: PathBuf,
    /// Files whose content reached the output, in order
    pub fragments_used: Vec<String>,
    pub skipped: Vec<SkippedFragment>,
    /// Why assembly was abandoned, when it was
    pub fallback_reason: Option<String>,
}

impl RunReport {
    fn new(outcome: Outcome, output: &Path) -> Self {
        Self {
            outcome,
            output: output.to_path_buf(),
            fragments_used: Vec::new(),
            skipped: Vec::new(),
            fallback_reason: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs the whole fragment-directory-to-output-file transformation
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Turn the fragments in `dir` into one MIDI file at `output`
    ///
    /// A single final-prefixed file is copied as-is. Otherwise numbered (or
    /// unnumbered) parts are stitched, or, if there are none, stems are merged
    /// (drum voices) and layered (instruments). If that fails for any recoverable reason the largest
    /// candidate file is copied instead.
    pub fn run(&self, dir: &Path, output: &Path) -> Result<RunReport> {
        let discovery = Discovery::scan(dir, &self.config, Some(output))?;
        if discovery.is_empty() {
            return Err(TimelineError::MissingFragments {
                dir: dir.to_path_buf(),
            });
        }

        if let Some(final_file) = select_final(&discovery.finals()) {
            log::info!("Found combined MIDI {}, skipping assembly", final_file.name);
            self.copy_through(final_file, output)?;
            let mut report = RunReport::new(Outcome::UsedFinal, output);
            report.fragments_used.push(final_file.name.clone());
            return Ok(report);
        }

        let mut skipped = Vec::new();
        let attempt = self.assemble_from(&discovery, &mut skipped);

        match attempt {
            Ok((outcome, used, bytes)) => {
                write_bytes(&bytes, output, self.config.output_mode)?;
                log::info!("Wrote {} ({} fragments)", output.display(), used.len());
                let mut report = RunReport::new(outcome, output);
                report.fragments_used = used;
                report.skipped = skipped;
                Ok(report)
            }
            Err(err) if err.is_recoverable() => {
                log::warn!("{}; falling back to largest fragment", err);
                let candidates = discovery.fallback_candidates();
                let chosen = select_largest(&candidates).ok_or_else(|| {
                    TimelineError::NoFallbackAvailable {
                        dir: dir.to_path_buf(),
                        reason: format!("{} (and no non-empty candidate file)", err),
                    }
                })?;
                log::warn!("Fallback MIDI: {} ({} bytes)", chosen.name, chosen.size);
                self.copy_through(chosen, output).map_err(|e| match e {
                    TimelineError::Io { source, .. } => TimelineError::NoFallbackAvailable {
                        dir: dir.to_path_buf(),
                        reason: format!("cannot read {}: {}", chosen.name, source),
                    },
                    other => other,
                })?;

                let mut report = RunReport::new(Outcome::FellBack, output);
                report.fragments_used.push(chosen.name.clone());
                report.skipped = skipped;
                report.fallback_reason = Some(err.to_string());
                Ok(report)
            }
            Err(err) => Err(err),
        }
    }

    /// Normalize, align and stitch parts, then apply the configured instrument
    pub fn assemble_parts(&self, parts: &[Fragment]) -> Result<Document> {
        let usable = parts.len();
        if parts.is_empty() {
            return Err(TimelineError::assembly("assemble", 0, "no fragments to assemble"));
        }
        let target_tpb = self.target_tpb(parts.first());
        let policy = self.config.slot_policy.policy();

        let mut assembler = Assembler::new();
        for part in parts {
            let part = if self.config.normalize_fragments {
                normalize(part)
            } else {
                part.clone()
            };
            let aligned = align(&part, target_tpb, policy.as_ref())
                .map_err(|e| TimelineError::assembly("align", usable, e))?;
            log::debug!(
                "{}: content {} ticks, slot {} ticks at {}",
                aligned.fragment.source,
                aligned.fragment.content_length(),
                aligned.slot_length,
                assembler.cursor()
            );
            assembler
                .push(&aligned.fragment, aligned.slot_length)
                .map_err(|e| TimelineError::assembly("assemble", usable, e))?;
        }
        let mut doc = assembler
            .finish()
            .map_err(|e| TimelineError::assembly("assemble", usable, e))?;

        if let Some(tag) = &self.config.instrument {
            tag_document(&mut doc, tag);
        }
        Ok(doc)
    }

    /// Flatten single-voice stems onto the merge channel
    pub fn merge_stems(&self, stems: &[(StemVoice, Fragment)]) -> Result<Document> {
        let target_tpb = self.target_tpb(stems.first().map(|(_, f)| f));
        let sources: Vec<(StemVoice, &Document)> = stems
            .iter()
            .map(|(voice, fragment)| (voice.clone(), &fragment.document))
            .collect();
        merge_voices(&sources, target_tpb, self.config.merge_channel)
            .map_err(|e| TimelineError::assembly("merge", stems.len(), e))
    }

    /// Stack labelled instrument stems as tracks, each on its mapped channel
    ///
    /// `drums` is an already merged drum kit, layered last on the merge channel.
    pub fn layer_instruments(&self, stems: &[(String, Fragment)], drums: Option<&Document>) -> Result<Document> {
        let target_tpb = self.target_tpb(stems.first().map(|(_, f)| f));
        let mut sources: Vec<(String, &Document)> = stems
            .iter()
            .map(|(label, fragment)| (label.clone(), &fragment.document))
            .collect();
        if let Some(drums) = drums {
            sources.push((DRUM_LAYER.to_string(), drums));
        }

        let channel_for = |label: &str| {
            if drums.is_some() && label == DRUM_LAYER {
                self.config.merge_channel
            } else {
                self.config.channel_for_stem(label)
            }
        };
        layer_stems(&sources, target_tpb, channel_for)
            .map_err(|e| TimelineError::assembly("layer", sources.len(), e))
    }

    /// Resolution every fragment is brought to
    fn target_tpb(&self, first: Option<&Fragment>) -> u16 {
        self.config
            .target_ticks_per_beat
            .or_else(|| first.map(Fragment::ticks_per_beat))
            .unwrap_or(DEFAULT_TPB)
    }

    /// Pick sequential, merge or layer mode and produce encoded bytes
    fn assemble_from(
        &self,
        discovery: &Discovery,
        skipped: &mut Vec<SkippedFragment>,
    ) -> Result<(Outcome, Vec<String>, Vec<u8>)> {
        let parts = discovery.parts();
        let (outcome, used, doc) = if !parts.is_empty() {
            let stems = discovery.stem_count();
            if stems > 0 {
                log::warn!("Assembling {} sequential parts; ignoring {} stem files", parts.len(), stems);
            }
            let fragments = load_fragments(&parts, skipped);
            let used: Vec<String> = fragments.iter().map(|f| f.source.clone()).collect();
            (Outcome::Assembled, used, self.assemble_parts(&fragments)?)
        } else {
            self.combine_stems(discovery, skipped)?
        };

        let usable = used.len();
        if !doc.has_audible_notes() {
            return Err(TimelineError::assembly("assemble", usable, "result has no audible notes"));
        }
        let bytes = encode_document(&doc).map_err(|e| TimelineError::assembly("encode", usable, e))?;
        Ok((outcome, used, bytes))
    }

    /// Merge drum voices and layer instrument stems found in the directory
    fn combine_stems(
        &self,
        discovery: &Discovery,
        skipped: &mut Vec<SkippedFragment>,
    ) -> Result<(Outcome, Vec<String>, Document)> {
        let voices = discovery.stems(&self.config);
        let instruments = discovery.instrument_stems(&self.config);
        if voices.is_empty() && instruments.is_empty() {
            return Err(TimelineError::assembly(
                "discovery",
                0,
                "no sequential parts or stems",
            ));
        }

        let voice_candidates: Vec<&Candidate> = voices.iter().map(|&(_, c)| c).collect();
        let voice_fragments = load_fragments(&voice_candidates, skipped);
        let loaded: Vec<(StemVoice, Fragment)> = voices
            .iter()
            .filter_map(|&(voice, candidate)| {
                voice_fragments
                    .iter()
                    .find(|f| f.source == candidate.name)
                    .map(|f| (voice.clone(), f.clone()))
            })
            .collect();
        let mut used: Vec<String> = loaded.iter().map(|(_, f)| f.source.clone()).collect();

        if instruments.is_empty() {
            return Ok((Outcome::Merged, used, self.merge_stems(&loaded)?));
        }

        let instrument_candidates: Vec<&Candidate> = instruments.iter().map(|(_, c)| *c).collect();
        let instrument_fragments = load_fragments(&instrument_candidates, skipped);
        let layers: Vec<(String, Fragment)> = instruments
            .iter()
            .filter_map(|(label, candidate)| {
                instrument_fragments
                    .iter()
                    .find(|f| f.source == candidate.name)
                    .map(|f| (label.clone(), f.clone()))
            })
            .collect();
        let drums = if loaded.is_empty() {
            None
        } else {
            Some(self.merge_stems(&loaded)?)
        };
        let mut layered_used: Vec<String> = layers.iter().map(|(_, f)| f.source.clone()).collect();
        layered_used.append(&mut used);
        let doc = self.layer_instruments(&layers, drums.as_ref())?;
        Ok((Outcome::Layered, layered_used, doc))
    }

    /// Copy a candidate's bytes to `output` unmodified
    fn copy_through(&self, source: &Candidate, output: &Path) -> Result<()> {
        let bytes = std::fs::read(&source.path).map_err(|e| TimelineError::Io {
            path: source.path.clone(),
            source: e,
        })?;
        write_bytes(&bytes, output, self.config.output_mode)
    }
}

/// Read candidates, dropping the unreadable ones with a warning
fn load_fragments(candidates: &[&Candidate], skipped: &mut Vec<SkippedFragment>) -> Vec<Fragment> {
    let mut fragments = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match read_document(&candidate.path) {
            Ok(doc) => fragments.push(Fragment::new(candidate.name.clone(), doc)),
            Err(err) => {
                log::warn!("Skipping {}: {}", candidate.name, err);
                skipped.push(SkippedFragment {
                    name: candidate.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    fragments
}

//! Working-directory scan and file-role conventions

use crate::config::EngineConfig;
use crate::error::{Result, TimelineError};
use crate::timeline::StemVoice;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)").expect("valid regex"));

/// What a file name says about a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Already-combined result from the generator
    Final,
    /// Earlier output of this engine, never an input
    Combined,
    /// Numbered sequential part
    Part(u32),
    /// Transcribed stem (lower-cased label), merged as a drum voice or
    /// layered as an instrument
    Stem(String),
    /// Any other MIDI file, ordered by name when no numbered parts exist
    Unnumbered,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub dir: PathBuf,
    /// Every MIDI file found, sorted by name
    pub candidates: Vec<Candidate>,
}

pub fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
        .unwrap_or(false)
}

fn strip_prefix_ci<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &name[prefix.len()..])
}

/// Classify a MIDI file by name
pub fn classify(file_name: &str, config: &EngineConfig) -> Role {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    if strip_prefix_ci(stem, &config.final_prefix).is_some() {
        return Role::Final;
    }
    if strip_prefix_ci(stem, &config.combined_prefix).is_some() {
        return Role::Combined;
    }
    if let Some(rest) = strip_prefix_ci(stem, &config.part_prefix) {
        if let Some(number) = LEADING_NUMBER
            .captures(rest)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            return Role::Part(number);
        }
        return Role::Unnumbered;
    }
    if let Some(label) = strip_prefix_ci(stem, &config.stem_prefix) {
        return Role::Stem(label.to_lowercase());
    }
    if config.stem_voice(stem).is_some() || config.stem_channel(stem).is_some() {
        return Role::Stem(stem.to_lowercase());
    }
    Role::Unnumbered
}

impl Discovery {
    /// List MIDI files in `dir`, skipping `exclude` (usually the output path)
    pub fn scan(dir: &Path, config: &EngineConfig, exclude: Option<&Path>) -> Result<Self> {
        let io_error = |source| TimelineError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let excluded = exclude.and_then(|p| std::fs::canonicalize(p).ok());

        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let path = entry.path();
            if !path.is_file() || !is_midi_file(&path) {
                continue;
            }
            if excluded.is_some() && std::fs::canonicalize(&path).ok() == excluded {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                log::warn!("Skipping non-UTF-8 file name {}", path.display());
                continue;
            };
            let size = entry.metadata().map_err(io_error)?.len();
            let role = classify(&name, config);
            candidates.push(Candidate {
                path,
                name,
                size,
                role,
            });
        }
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        log::debug!("Found {} MIDI files in {}", candidates.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            candidates,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn finals(&self) -> Vec<&Candidate> {
        self.with_role(|r| matches!(r, Role::Final))
    }

    /// Sequential parts in assembly order
    ///
    /// Numbered parts sort by number (name breaks ties); without any, every
    /// unnumbered file is used in name order.
    pub fn parts(&self) -> Vec<&Candidate> {
        let mut numbered: Vec<(u32, &Candidate)> = self
            .candidates
            .iter()
            .filter_map(|c| match c.role {
                Role::Part(n) => Some((n, c)),
                _ => None,
            })
            .collect();
        if numbered.is_empty() {
            return self.with_role(|r| matches!(r, Role::Unnumbered));
        }
        numbered.sort_by(|(a, ca), (b, cb)| a.cmp(b).then_with(|| ca.name.cmp(&cb.name)));
        numbered.into_iter().map(|(_, c)| c).collect()
    }

    /// Stems matching configured voices, in voice order
    pub fn stems<'a>(&'a self, config: &'a EngineConfig) -> Vec<(&'a StemVoice, &'a Candidate)> {
        let mut out = Vec::new();
        for voice in &config.stem_voices {
            let label = voice.label.to_lowercase();
            match self
                .candidates
                .iter()
                .find(|c| c.role == Role::Stem(label.clone()))
            {
                Some(candidate) => out.push((voice, candidate)),
                None => log::debug!("No stem file for voice {}", voice.label),
            }
        }
        out
    }

    /// Stems that aren't merge voices, with their labels, in name order
    ///
    /// These are layered as separate instrument tracks.
    pub fn instrument_stems(&self, config: &EngineConfig) -> Vec<(String, &Candidate)> {
        self.candidates
            .iter()
            .filter_map(|c| match &c.role {
                Role::Stem(label) if config.stem_voice(label).is_none() => Some((label.clone(), c)),
                _ => None,
            })
            .collect()
    }

    pub fn stem_count(&self) -> usize {
        self.with_role(|r| matches!(r, Role::Stem(_))).len()
    }

    /// Files eligible as a fallback (everything but earlier combined output)
    pub fn fallback_candidates(&self) -> Vec<&Candidate> {
        self.with_role(|r| !matches!(r, Role::Combined))
    }

    fn with_role(&self, pred: impl Fn(&Role) -> bool) -> Vec<&Candidate> {
        self.candidates.iter().filter(|c| pred(&c.role)).collect()
    }
}

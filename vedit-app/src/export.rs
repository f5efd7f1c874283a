//! Clip-and-concatenate scripts for an external media tool (ffmpeg).
//!
//! The engine only produces `(source, start, end)` segments; everything about
//! command syntax lives here. A plan cuts each segment into a numbered temp
//! clip, concatenates the clips through a list file, then removes the temps.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use vedit_core::Segment;

/// Script dialect written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavour {
    /// Windows `.bat`.
    Batch,
    /// POSIX `sh`.
    Shell,
}

impl ScriptFlavour {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            ScriptFlavour::Batch
        } else {
            ScriptFlavour::Shell
        }
    }

    /// Guess from a script file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bat" | "cmd" => Some(ScriptFlavour::Batch),
            "sh" => Some(ScriptFlavour::Shell),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScriptFlavour::Batch => "batch",
            ScriptFlavour::Shell => "shell",
        }
    }

    fn quote(self, raw: &str) -> String {
        match self {
            ScriptFlavour::Batch => format!("\"{raw}\""),
            ScriptFlavour::Shell => {
                let mut out = String::with_capacity(raw.len() + 2);
                out.push('"');
                for c in raw.chars() {
                    if matches!(c, '"' | '\\' | '$' | '`') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
                out
            }
        }
    }

    fn comment(self) -> &'static str {
        match self {
            ScriptFlavour::Batch => "rem",
            ScriptFlavour::Shell => "#",
        }
    }

    fn remove(self) -> &'static str {
        match self {
            ScriptFlavour::Batch => "del",
            ScriptFlavour::Shell => "rm -f",
        }
    }
}

/// Whether clips keep the video stream or are rendered to PCM audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    Video,
    Audio,
}

impl ExportMode {
    fn clip_extension(self) -> &'static str {
        match self {
            ExportMode::Video => "mp4",
            ExportMode::Audio => "wav",
        }
    }
}

/// One `-ss start -t duration` cut.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipCommand {
    pub source: PathBuf,
    pub start: f64,
    pub duration: f64,
    pub temp_file: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    clips: Vec<ClipCommand>,
    mode: ExportMode,
    output: String,
}

pub const CONCAT_LIST: &str = "mylist.txt";

impl ExportPlan {
    /// Build a plan in segment order. Segments with no duration are skipped.
    pub fn from_segments(segments: &[Segment], mode: ExportMode, output: impl Into<String>) -> Self {
        let clips = segments
            .iter()
            .filter(|s| s.duration() > 0.0)
            .enumerate()
            .map(|(i, s)| ClipCommand {
                source: s.source.clone(),
                start: s.start_time,
                duration: s.duration(),
                temp_file: format!("temp_{i}.{}", mode.clip_extension()),
            })
            .collect();

        Self {
            clips,
            mode,
            output: output.into(),
        }
    }

    pub fn clips(&self) -> &[ClipCommand] {
        &self.clips
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clip_command(&self, clip: &ClipCommand, flavour: ScriptFlavour) -> String {
        let codec = match self.mode {
            ExportMode::Video => "-c copy",
            ExportMode::Audio => "-vn -acodec pcm_s16le",
        };
        format!(
            "ffmpeg -i {} -ss {:.3} -t {:.3} {codec} {}",
            flavour.quote(&clip.source.display().to_string()),
            clip.start,
            clip.duration,
            flavour.quote(&clip.temp_file),
        )
    }

    /// Contents of the concat-demuxer list file.
    pub fn concat_list(&self) -> String {
        self.clips
            .iter()
            .map(|c| format!("file '{}'\n", c.temp_file))
            .collect()
    }

    pub fn merge_command(&self, flavour: ScriptFlavour) -> String {
        let codec = match self.mode {
            ExportMode::Video => "-c copy",
            ExportMode::Audio if self.output.to_ascii_lowercase().ends_with(".mp3") => {
                "-acodec libmp3lame"
            }
            ExportMode::Audio => "-acodec pcm_s16le",
        };
        format!(
            "ffmpeg -f concat -safe 0 -i {CONCAT_LIST} {codec} {}",
            flavour.quote(&self.output)
        )
    }

    /// Full script text, newline separated.
    pub fn render(&self, flavour: ScriptFlavour) -> String {
        let rem = flavour.comment();
        let mut out = String::new();

        match flavour {
            ScriptFlavour::Batch => out.push_str("@echo off\n"),
            ScriptFlavour::Shell => out.push_str("#!/bin/sh\nset -e\n"),
        }
        let _ = writeln!(out, "{rem} generated by vedit: {} clips", self.clips.len());
        out.push('\n');

        for (i, clip) in self.clips.iter().enumerate() {
            let _ = writeln!(out, "{rem} clip {}", i + 1);
            let _ = writeln!(out, "{}", self.clip_command(clip, flavour));
            out.push('\n');
        }

        let _ = writeln!(out, "{rem} concat list");
        let list = self.concat_list();
        match flavour {
            ScriptFlavour::Batch => {
                for (i, line) in list.lines().enumerate() {
                    let redirect = if i == 0 { ">" } else { ">>" };
                    let _ = writeln!(out, "echo {line} {redirect} {CONCAT_LIST}");
                }
            }
            ScriptFlavour::Shell => {
                let _ = write!(out, "cat > {CONCAT_LIST} <<'EOF'\n{list}EOF\n");
            }
        }
        out.push('\n');

        let _ = writeln!(out, "{rem} merge");
        let _ = writeln!(out, "{}", self.merge_command(flavour));
        out.push('\n');

        let _ = writeln!(out, "{rem} cleanup");
        let remove = flavour.remove();
        let _ = writeln!(out, "{remove} {CONCAT_LIST}");
        for clip in &self.clips {
            let _ = writeln!(out, "{remove} {}", flavour.quote(&clip.temp_file));
        }
        out
    }
}

/// Render `plan` and write it to `path`.
pub fn write_script(path: &Path, plan: &ExportPlan, flavour: ScriptFlavour) -> anyhow::Result<()> {
    if plan.is_empty() {
        bail!("no segments to export");
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, plan.render(flavour))
        .with_context(|| format!("writing script {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<Segment> {
        vec![
            Segment {
                start_time: 0.5,
                end_time: 1.75,
                source: PathBuf::from("talk.mp4"),
            },
            Segment {
                start_time: 2.0,
                end_time: 2.0,
                source: PathBuf::from("talk.mp4"),
            },
            Segment {
                start_time: 3.0,
                end_time: 4.5,
                source: PathBuf::from("b roll.mp4"),
            },
        ]
    }

    #[test]
    fn plan_skips_empty_segments_and_numbers_clips() {
        let plan = ExportPlan::from_segments(&segments(), ExportMode::Video, "out.mp4");
        assert_eq!(plan.clips().len(), 2);
        assert_eq!(plan.clips()[0].temp_file, "temp_0.mp4");
        assert_eq!(plan.clips()[1].temp_file, "temp_1.mp4");
        assert!((plan.clips()[1].duration - 1.5).abs() < 1e-12);
    }

    #[test]
    fn clip_command_uses_start_and_duration() {
        let plan = ExportPlan::from_segments(&segments(), ExportMode::Video, "out.mp4");
        let cmd = plan.clip_command(&plan.clips()[0], ScriptFlavour::Batch);
        assert_eq!(
            cmd,
            "ffmpeg -i \"talk.mp4\" -ss 0.500 -t 1.250 -c copy \"temp_0.mp4\""
        );
    }

    #[test]
    fn audio_mode_picks_codecs_from_output() {
        let plan = ExportPlan::from_segments(&segments(), ExportMode::Audio, "mix.MP3");
        assert!(plan.clips()[0].temp_file.ends_with(".wav"));
        assert!(plan
            .clip_command(&plan.clips()[0], ScriptFlavour::Shell)
            .contains("-vn -acodec pcm_s16le"));
        assert!(plan.merge_command(ScriptFlavour::Shell).contains("libmp3lame"));
    }

    #[test]
    fn concat_list_lists_temp_files_in_order() {
        let plan = ExportPlan::from_segments(&segments(), ExportMode::Video, "out.mp4");
        assert_eq!(plan.concat_list(), "file 'temp_0.mp4'\nfile 'temp_1.mp4'\n");
    }

    #[test]
    fn batch_script_layout() {
        let plan = ExportPlan::from_segments(&segments(), ExportMode::Video, "out.mp4");
        let script = plan.render(ScriptFlavour::Batch);
        assert!(script.starts_with("@echo off\n"));
        assert!(script.contains("echo file 'temp_0.mp4' > mylist.txt"));
        assert!(script.contains("echo file 'temp_1.mp4' >> mylist.txt"));
        assert!(script.contains("ffmpeg -f concat -safe 0 -i mylist.txt -c copy \"out.mp4\""));
        assert!(script.contains("del \"temp_1.mp4\""));
    }

    #[test]
    fn shell_script_escapes_paths() {
        let segs = vec![Segment {
            start_time: 0.0,
            end_time: 1.0,
            source: PathBuf::from("$HOME/a\"b.mp4"),
        }];
        let plan = ExportPlan::from_segments(&segs, ExportMode::Video, "out.mp4");
        let script = plan.render(ScriptFlavour::Shell);
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("cat > mylist.txt <<'EOF'\nfile 'temp_0.mp4'\nEOF\n"));
        assert!(script.contains("-i \"\\$HOME/a\\\"b.mp4\""));
        assert!(script.contains("rm -f mylist.txt"));
    }

    #[test]
    fn flavour_from_extension() {
        assert_eq!(ScriptFlavour::from_path(Path::new("x.BAT")), Some(ScriptFlavour::Batch));
        assert_eq!(ScriptFlavour::from_path(Path::new("x.sh")), Some(ScriptFlavour::Shell));
        assert_eq!(ScriptFlavour::from_path(Path::new("x")), None);
    }

    #[test]
    fn empty_plan_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let plan = ExportPlan::from_segments(&[], ExportMode::Video, "out.mp4");
        assert!(write_script(&dir.path().join("cut.sh"), &plan, ScriptFlavour::Shell).is_err());
        assert!(!dir.path().join("cut.sh").exists());
    }

    #[test]
    fn script_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts").join("cut.bat");
        let plan = ExportPlan::from_segments(&segments(), ExportMode::Video, "out.mp4");
        write_script(&path, &plan, ScriptFlavour::Batch).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), plan.render(ScriptFlavour::Batch));
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use ctc_diarize::{format_speech_segments, SessionResult};

use crate::json_report_formatter::write_json;

const VAD_DIR: &str = "oracle_vad";
const JSON_DIR: &str = "json_result";
const TRANSCRIPT_DIR: &str = "trans_with_spks";

/// Per-session output locations under the run's output directory.
pub struct SessionWriter {
    vad_dir: PathBuf,
    json_dir: PathBuf,
    transcript_dir: PathBuf,
}

impl SessionWriter {
    pub fn create(out_dir: &Path) -> Result<Self, String> {
        let writer = Self {
            vad_dir: out_dir.join(VAD_DIR),
            json_dir: out_dir.join(JSON_DIR),
            transcript_dir: out_dir.join(TRANSCRIPT_DIR),
        };
        for dir in [&writer.vad_dir, &writer.json_dir, &writer.transcript_dir] {
            fs::create_dir_all(dir).map_err(|err| {
                format!("Failed to create output directory '{}': {err}", dir.display())
            })?;
        }
        Ok(writer)
    }

    /// Writes `<id>.rttm` (speech regions), `<id>.json` (session record) and
    /// `<id>.txt` (speaker-segmented transcript).
    pub fn write(&self, session: &SessionResult) -> Result<(), String> {
        let output = &session.output;

        let vad_path = self.vad_dir.join(format!("{}.rttm", output.id));
        fs::write(
            &vad_path,
            format_speech_segments(&output.id, &output.speech_segments),
        )
        .map_err(|err| format!("Failed to write '{}': {err}", vad_path.display()))?;

        write_json(
            &self.json_dir.join(format!("{}.json", output.id)),
            &output.session,
        )?;

        let transcript_path = self.transcript_dir.join(format!("{}.txt", output.id));
        let mut transcript = output.transcript.clone();
        transcript.push('\n');
        fs::write(&transcript_path, transcript)
            .map_err(|err| format!("Failed to write '{}': {err}", transcript_path.display()))?;
        Ok(())
    }
}

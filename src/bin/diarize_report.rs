use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Parser;
use ctc_diarize::{
    parse_rttm, BatchItem, BatchRunner, Meta, PipelineConfig, SpeakerTranscriberBuilder,
    SpeakerTurn, UtteranceInput,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[path = "diarize_report/json_report_formatter.rs"]
mod json_report_formatter;
#[path = "diarize_report/session_writer.rs"]
mod session_writer;

const REPORT_FILE_NAME: &str = "diarization_report.json";

#[derive(Debug, Parser)]
#[command(name = "diarize_report")]
#[command(about = "Speaker-attributed transcripts and diarization error report for a batch of sessions")]
struct Args {
    /// JSON list of `{ id, logits_path, hypothesis_rttm, reference_rttm? }`.
    #[arg(long, env = "CTC_DIARIZE_MANIFEST")]
    manifest: PathBuf,
    #[arg(long, env = "CTC_DIARIZE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "CTC_DIARIZE_OUT_DIR", default_value = "diarize_out")]
    out_dir: PathBuf,
    #[arg(long, env = "CTC_DIARIZE_MIN_NON_SPEECH_FRAMES")]
    min_non_speech_frames: Option<usize>,
    #[arg(long, env = "CTC_DIARIZE_ATTRIBUTION_TOLERANCE_SEC")]
    attribution_tolerance_sec: Option<f64>,
    #[arg(long, env = "CTC_DIARIZE_LIMIT")]
    limit: Option<usize>,
    #[arg(long, env = "CTC_DIARIZE_OFFSET", default_value_t = 0)]
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    logits_path: PathBuf,
    hypothesis_rttm: PathBuf,
    #[serde(default)]
    reference_rttm: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let cwd = std::env::current_dir()
        .map_err(|err| format!("Failed to resolve working directory: {err}"))?;

    let manifest_path = resolve_path(&cwd, &args.manifest);
    require_path_exists(&manifest_path, "Missing manifest file.")?;
    let manifest_dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.clone());
    let out_dir = resolve_path(&cwd, &args.out_dir);

    let config_path = args.config.as_ref().map(|path| resolve_path(&cwd, path));
    let config = match config_path.as_ref() {
        Some(path) => {
            require_path_exists(path, "Missing pipeline config file.")?;
            PipelineConfig::load(path).map_err(|err| format!("Invalid pipeline config: {err}"))?
        }
        None => PipelineConfig::default(),
    };
    let mut builder = SpeakerTranscriberBuilder::new(config);
    if let Some(frames) = args.min_non_speech_frames {
        builder = builder.with_min_non_speech_frames(frames);
    }
    if let Some(tolerance_sec) = args.attribution_tolerance_sec {
        builder = builder.with_attribution_tolerance_sec(tolerance_sec);
    }
    let transcriber = builder
        .build()
        .map_err(|err| format!("Failed to build transcriber: {err}"))?;

    let mut entries = load_manifest(&manifest_path)?;
    if args.offset > 0 {
        entries = entries.into_iter().skip(args.offset).collect();
    }
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }
    if entries.is_empty() {
        return Err("No sessions selected after applying offset/limit.".to_string());
    }
    let session_count = entries.len();

    let writer = session_writer::SessionWriter::create(&out_dir)?;
    let mut runner = BatchRunner::new(&transcriber);
    let mut lib_work_elapsed = Duration::ZERO;

    let progress = ProgressBar::new(entries.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    for entry in entries {
        progress.set_message(entry.id.clone());
        lib_work_elapsed += process_entry(&mut runner, &writer, &manifest_dir, &entry);
        progress.inc(1);
    }
    progress.finish_with_message("diarization pass complete");

    let outcome = runner.finish();
    let stats = outcome.stats();
    let scored = outcome
        .sessions
        .iter()
        .filter(|session| session.score.is_some())
        .count();
    let failed = outcome.failures.len();

    let timing = transcriber.config().timing;
    let report = outcome.into_report(Meta {
        generated_at: Utc::now().to_rfc3339(),
        config_path: config_path.map(|path| path.to_string_lossy().into_owned()),
        frame_stride_ms: (timing.frame_stride_sec * 1000.0) as f32,
        min_non_speech_frames: transcriber.config().silence.min_non_speech_frames,
        session_count,
    });
    let report_path = out_dir.join(REPORT_FILE_NAME);
    json_report_formatter::write_json(&report_path, &report)?;

    println!(
        "lib_work_elapsed: {:.2}s ({})",
        lib_work_elapsed.as_secs_f64(),
        format_duration_hms(lib_work_elapsed)
    );
    println!(
        "DER {:.4} (FA {:.4}, MISS {:.4}, CONF {:.4}) over {scored} scored session(s); {failed} failed",
        stats.total_error, stats.false_alarm, stats.miss, stats.confusion
    );
    println!("{}", report_path.display());
    Ok(())
}

/// Loads, transcribes and writes one manifest entry. Any failure is recorded
/// against the entry's id. Returns the time spent inside the library.
fn process_entry(
    runner: &mut BatchRunner<'_>,
    writer: &session_writer::SessionWriter,
    manifest_dir: &Path,
    entry: &ManifestEntry,
) -> Duration {
    let item = match load_item(manifest_dir, entry) {
        Ok(item) => item,
        Err(err) => {
            runner.record_failure(&entry.id, &err);
            return Duration::ZERO;
        }
    };

    let lib_started = Instant::now();
    let processed = runner.process(item);
    let elapsed = lib_started.elapsed();
    let written = match processed {
        Some(session) => writer.write(session),
        None => Ok(()),
    };
    if let Err(err) = written {
        runner.fail_session(&entry.id, &err);
    }
    elapsed
}

fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, String> {
    let file = File::open(path)
        .map_err(|err| format!("Failed to open manifest '{}': {err}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("Failed to parse manifest '{}': {err}", path.display()))
}

fn load_item(base: &Path, entry: &ManifestEntry) -> Result<BatchItem, String> {
    let logits_path = resolve_path(base, &entry.logits_path);
    require_path_exists(&logits_path, "Missing logits file referenced by manifest.")?;
    let file = File::open(&logits_path)
        .map_err(|err| format!("Failed to open logits '{}': {err}", logits_path.display()))?;
    let frames: Vec<Vec<f32>> = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("Failed to parse logits '{}': {err}", logits_path.display()))?;

    let speaker_turns = load_turns(&resolve_path(base, &entry.hypothesis_rttm))?;
    let reference = match entry.reference_rttm.as_ref() {
        Some(path) => {
            let path = resolve_path(base, path);
            if path.exists() {
                Some(load_turns(&path)?)
            } else {
                tracing::warn!(
                    id = entry.id.as_str(),
                    path = %path.display(),
                    "reference RTTM not found, session will not be scored"
                );
                None
            }
        }
        None => None,
    };

    Ok(BatchItem {
        input: UtteranceInput {
            id: entry.id.clone(),
            frames,
            token_ids: None,
            speaker_turns,
        },
        reference,
    })
}

fn load_turns(path: &Path) -> Result<Vec<SpeakerTurn>, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read RTTM '{}': {err}", path.display()))?;
    parse_rttm(&content).map_err(|err| format!("{}: {err}", path.display()))
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn format_duration_hms(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let hours = total_ms / 3_600_000;
    let rem_after_hours = total_ms % 3_600_000;
    let minutes = rem_after_hours / 60_000;
    let rem_after_minutes = rem_after_hours % 60_000;
    let seconds = rem_after_minutes / 1_000;
    let millis = rem_after_minutes % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn require_path_exists(path: &Path, message: &str) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    Err(format!("{message} Missing path: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctc_diarize::{PipelineConfig, SpeakerTranscriber, Vocabulary};

    const BLANK: usize = 3;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ctc_diarize_report_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn transcriber() -> SpeakerTranscriber {
        let mut config = PipelineConfig::default();
        config.vocabulary = Vocabulary::with_trailing_blank(vec![' ', 'a', 'b']);
        config.silence.silence_class = BLANK;
        config.timing.offset_sec = 0.0;
        config.timing.frame_stride_sec = 1.0;
        SpeakerTranscriberBuilder::new(config)
            .build()
            .expect("build should succeed")
    }

    /// Writes logits for "a b" over ten frames plus a two-speaker hypothesis.
    fn write_session_inputs(dir: &Path) {
        let classes = [BLANK, 1, 1, BLANK, 0, BLANK, 2, 2, BLANK, BLANK];
        let frames: Vec<Vec<f32>> = classes
            .iter()
            .map(|&class| {
                let mut row = vec![0.0f32; 4];
                row[class] = 4.0;
                row
            })
            .collect();
        fs::write(
            dir.join("logits.json"),
            serde_json::to_string(&frames).expect("serialize logits"),
        )
        .expect("write logits");
        fs::write(
            dir.join("hyp.rttm"),
            "SPEAKER s1 1 0.000 5.000 <NA> <NA> s0 <NA> <NA>\n\
             SPEAKER s1 1 5.000 5.000 <NA> <NA> s1 <NA> <NA>\n",
        )
        .expect("write hypothesis");
    }

    fn entry(id: &str, reference_rttm: Option<&str>) -> ManifestEntry {
        ManifestEntry {
            id: id.to_string(),
            logits_path: PathBuf::from("logits.json"),
            hypothesis_rttm: PathBuf::from("hyp.rttm"),
            reference_rttm: reference_rttm.map(PathBuf::from),
        }
    }

    #[test]
    fn missing_reference_file_leaves_session_unscored() {
        let dir = scratch_dir("missing_reference");
        write_session_inputs(&dir);
        let item = load_item(&dir, &entry("s1", Some("missing_ref.rttm")))
            .expect("missing reference is not an error");
        assert!(item.reference.is_none());
        assert_eq!(item.input.speaker_turns.len(), 2);

        let transcriber = transcriber();
        let writer = session_writer::SessionWriter::create(&dir.join("out")).expect("writer");
        let mut runner = BatchRunner::new(&transcriber);
        process_entry(&mut runner, &writer, &dir, &entry("s1", Some("missing_ref.rttm")));
        let aggregates = runner.finish().aggregates();
        assert_eq!(aggregates.counts.without_reference, 1);
        assert_eq!(aggregates.counts.failed, 0);
        assert!(dir.join("out/oracle_vad/s1.rttm").exists());
        assert!(dir.join("out/json_result/s1.json").exists());
        assert!(dir.join("out/trans_with_spks/s1.txt").exists());
    }

    #[test]
    fn unreadable_reference_file_still_fails_the_session() {
        let dir = scratch_dir("bad_reference");
        write_session_inputs(&dir);
        fs::write(dir.join("ref.rttm"), "SPEAKER s1 1 zero 5.0 <NA> <NA> a <NA> <NA>\n")
            .expect("write reference");
        assert!(load_item(&dir, &entry("s1", Some("ref.rttm"))).is_err());
    }

    #[test]
    fn write_failure_does_not_stop_later_sessions() {
        let dir = scratch_dir("write_failure");
        write_session_inputs(&dir);
        let transcriber = transcriber();
        let writer = session_writer::SessionWriter::create(&dir.join("out")).expect("writer");
        let mut runner = BatchRunner::new(&transcriber);
        process_entry(&mut runner, &writer, &dir, &entry("nested/s1", None));
        process_entry(&mut runner, &writer, &dir, &entry("s2", None));

        let outcome = runner.finish();
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].id, "nested/s1");
        let ids: Vec<&str> = outcome.sessions.iter().map(|s| s.output.id.as_str()).collect();
        assert_eq!(ids, vec!["s2"]);
        assert_eq!(outcome.aggregates().counts.total, 2);
        assert!(dir.join("out/trans_with_spks/s2.txt").exists());
    }
}

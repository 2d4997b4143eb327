//! Job lifecycle against the shared registries.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use tempfile::tempdir;

use mas_core::converters::{Asciify, GlyphArtOptions};
use mas_core::files::{FileRole, FileType, OutputType};
use mas_core::jobs::{
    Conversion, ConversionContext, ConversionError, ConversionResult, Job, JobError, JobOutcome,
    JobPhase, JobServices, RenderMode, Resolution,
};
use mas_core::time_source::TestTimeSource;

enum Behaviour {
    Write,
    Fail,
    Panic,
}

/// Test conversion: writes, fails or panics.
struct Scripted {
    behaviour: Behaviour,
    inputs: Vec<FileType>,
}

impl Scripted {
    fn boxed(behaviour: Behaviour, inputs: &[FileType]) -> Box<dyn Conversion> {
        Box::new(Self {
            behaviour,
            inputs: inputs.to_vec(),
        })
    }
}

impl Conversion for Scripted {
    fn name(&self) -> &str {
        "Write"
    }

    fn input_types(&self) -> &[FileType] {
        &self.inputs
    }

    fn output_type(&self) -> OutputType {
        OutputType::Fixed(FileType::Txt)
    }

    fn run(&mut self, ctx: &ConversionContext) -> ConversionResult<()> {
        ctx.report_progress(40.0);
        match self.behaviour {
            Behaviour::Write => {
                fs::write(ctx.output_path(), b"ok").map_err(|e| ConversionError::io("write", e))
            }
            Behaviour::Fail => Err(ConversionError::other("disk on fire")),
            Behaviour::Panic => panic!("converter bug"),
        }
    }
}

fn services() -> Arc<JobServices> {
    services_on(TestTimeSource::shared())
}

fn services_on(clock: Arc<TestTimeSource>) -> Arc<JobServices> {
    Arc::new(
        JobServices::builder()
            .clock(clock)
            .drain_grace(Duration::from_secs(5))
            .status_clear(Duration::from_secs(60))
            .build(),
    )
}

fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
    .save(path)
    .unwrap();
}

#[test]
fn colliding_output_name_gets_numeric_suffix() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("cat.png"), b"png").unwrap();
    fs::write(dir.path().join("cat_Write.txt"), b"old").unwrap();
    let clock = TestTimeSource::shared();
    let services = services_on(Arc::clone(&clock));

    let report = Job::new(
        Scripted::boxed(Behaviour::Write, &[FileType::Png]),
        dir.path(),
        Arc::clone(&services),
    )
    .with_input(dir.path().join("cat.png"))
    .execute();

    let JobOutcome::Completed { output } = &report.outcome else {
        panic!("job did not complete: {:?}", report.outcome);
    };
    assert_eq!(output.file_name().unwrap(), "cat_Write_0.txt");
    assert_eq!(fs::read(dir.path().join("cat_Write.txt")).unwrap(), b"old");
    assert_eq!(
        report.phases,
        vec![
            JobPhase::Created,
            JobPhase::Validating,
            JobPhase::ResourcesLocked,
            JobPhase::Running,
            JobPhase::Cleanup,
            JobPhase::Draining,
            JobPhase::Done,
        ]
    );
    assert!(services.resources.is_empty());
    assert!(services.slots.is_empty());
    assert_eq!(clock.elapsed(), Duration::from_secs(5));

    let status = services.status.current().unwrap();
    assert!(!status.is_error());
    assert_eq!(status.text, "Write: saved cat_Write_0.txt");
}

#[test]
fn second_job_on_same_output_is_rejected() {
    let dir = tempdir().unwrap();
    let services = services();

    let mut first = Job::new(
        Scripted::boxed(Behaviour::Write, &[]),
        dir.path(),
        Arc::clone(&services),
    );
    let mut second = Job::new(
        Scripted::boxed(Behaviour::Write, &[]),
        dir.path(),
        Arc::clone(&services),
    );

    // Both resolve before either claims, so they pick the same name.
    first.validate().unwrap();
    second.validate().unwrap();
    assert_eq!(first.output().full_path(), second.output().full_path());

    first.lock_resources().unwrap();
    let err = second.lock_resources().unwrap_err();
    assert!(matches!(
        err,
        JobError::ResourceInUse {
            role: FileRole::Output,
            ..
        }
    ));
    assert_eq!(err.user_message(), "this output file is currently in use.");
    assert_eq!(services.resources.len(), 1);

    first.run().unwrap();
    first.cleanup();
    assert!(services.resources.is_empty());
}

#[test]
fn shared_input_is_claimed_by_one_job_at_a_time() {
    let dir = tempdir().unwrap();
    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");
    fs::create_dir(&out_a).unwrap();
    fs::create_dir(&out_b).unwrap();
    fs::write(dir.path().join("cat.png"), b"png").unwrap();
    let services = services();

    let mut first = Job::new(
        Scripted::boxed(Behaviour::Write, &[FileType::Png]),
        &out_a,
        Arc::clone(&services),
    )
    .with_input(dir.path().join("cat.png"));
    first.validate().unwrap();
    first.lock_resources().unwrap();

    let report = Job::new(
        Scripted::boxed(Behaviour::Write, &[FileType::Png]),
        &out_b,
        Arc::clone(&services),
    )
    .with_input(dir.path().join("cat.png"))
    .execute();

    assert!(matches!(
        report.outcome,
        JobOutcome::Rejected(JobError::ResourceInUse {
            role: FileRole::Input,
            ..
        })
    ));
    // The rejected job claimed nothing of its own.
    assert_eq!(services.resources.len(), 2);
    assert_eq!(
        services.status.current().unwrap().text,
        "this input file is currently in use."
    );

    first.cleanup();
    assert!(services.resources.is_empty());
}

#[test]
fn failing_conversion_releases_locks_and_reports_error() {
    let dir = tempdir().unwrap();
    let services = services();

    let report = Job::new(
        Scripted::boxed(Behaviour::Fail, &[]),
        dir.path(),
        Arc::clone(&services),
    )
    .execute();

    assert!(matches!(report.outcome, JobOutcome::Failed(_)));
    assert_eq!(report.phases.last(), Some(&JobPhase::Done));
    assert!(services.resources.is_empty());
    assert!(services.slots.is_empty());

    let status = services.status.current().unwrap();
    assert!(status.is_error());
    assert!(status.text.contains("disk on fire"));
}

#[test]
fn panicking_conversion_is_contained() {
    let dir = tempdir().unwrap();
    let services = services();

    let handle = Job::new(
        Scripted::boxed(Behaviour::Panic, &[]),
        dir.path(),
        Arc::clone(&services),
    )
    .spawn()
    .unwrap();
    let report = handle.join();

    assert!(matches!(
        report.outcome,
        JobOutcome::Failed(JobError::ConversionFailure(ConversionError::Panicked(ref msg)))
            if msg == "converter bug"
    ));
    assert!(services.resources.is_empty());
    assert!(services.slots.is_empty());
    assert!(services.status.current().unwrap().is_error());
}

#[test]
fn validation_rejection_takes_no_slot() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
    let services = services();

    let report = Job::new(
        Scripted::boxed(Behaviour::Write, &[FileType::Png, FileType::Jpg]),
        dir.path(),
        Arc::clone(&services),
    )
    .with_input(dir.path().join("notes.txt"))
    .execute();

    assert!(matches!(
        report.outcome,
        JobOutcome::Rejected(JobError::IncorrectFileType { .. })
    ));
    assert!(!report.phases.contains(&JobPhase::Running));
    assert_eq!(services.slots.revision(), 0);
    assert!(services.resources.is_empty());
    assert!(report.summary().message.unwrap().starts_with("incorrect file type"));
}

#[test]
fn missing_output_directory_is_rejected() {
    let dir = tempdir().unwrap();
    let services = services();

    let report = Job::new(
        Scripted::boxed(Behaviour::Write, &[]),
        dir.path().join("missing"),
        Arc::clone(&services),
    )
    .execute();

    let error = report.error().unwrap();
    assert!(matches!(error, JobError::OutputDirectoryNotFound { .. }));
    assert_eq!(error.user_message(), "destination folder does not exist.");
}

#[test]
fn asciify_end_to_end() {
    let dir = tempdir().unwrap();
    let weights = dir.path().join("weights.txt");
    fs::write(&weights, "0: 32\n255: 35\n").unwrap();
    let input = dir.path().join("half.png");
    write_png(&input, 200, 100);
    let services = services();

    let mut options = GlyphArtOptions::new(&weights);
    options.resolution = Resolution::Small;
    options.mode = RenderMode::WhiteOnBlack;
    options.seed = Some(7);

    let report = Job::new(
        Box::new(Asciify::new(options, (10, 20))),
        dir.path(),
        Arc::clone(&services),
    )
    .with_input(&input)
    .execute();

    assert!(report.succeeded(), "{:?}", report.outcome);
    let text = fs::read_to_string(dir.path().join("half_Asciify.txt")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    // 50 columns; 200x100 image with 10x20 cells gives 12 rows.
    assert_eq!(lines.len(), 12);
    for line in &lines {
        assert_eq!(line.chars().count(), 50);
        assert!(line.starts_with(' '));
        assert!(line.ends_with('#'));
    }

    let summary = report.summary();
    assert_eq!(summary.status, "completed");
    assert_eq!(summary.kind, "Asciify");
}

#[test]
fn bad_weight_file_fails_the_run() {
    let dir = tempdir().unwrap();
    let weights = dir.path().join("weights.txt");
    fs::write(&weights, "300: 65\n").unwrap();
    let input = dir.path().join("img.png");
    write_png(&input, 20, 20);
    let services = services();

    let report = Job::new(
        Box::new(Asciify::new(GlyphArtOptions::new(&weights), (10, 22))),
        dir.path(),
        Arc::clone(&services),
    )
    .with_input(&input)
    .execute();

    assert!(matches!(
        report.outcome,
        JobOutcome::Failed(JobError::ConversionFailure(ConversionError::Weights(_)))
    ));
    assert!(!dir.path().join("img_Asciify.txt").exists());
    assert!(services.resources.is_empty());
}

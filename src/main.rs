//! # Seatlabel CLI
//!
//! Command-line interface for exam seat label printing.
//!
//! ## Usage
//!
//! ```bash
//! # Browse the exam records
//! seatlabel semesters
//! seatlabel dates 2024S1
//! seatlabel modules 2024S1 --date 2024-06-03
//! seatlabel students 2024S1 CS101
//!
//! # Render labels and a grid preview to a directory
//! seatlabel generate 2024S1 CS101 --out labels/
//!
//! # Print (TSPL commands by default, or rendered images)
//! seatlabel print 2024S1 CS101
//! seatlabel print 2024S1 CS101 --mode raster
//!
//! # Verify a scanned barcode
//! seatlabel scan X1
//!
//! # Read from the registration database instead of a JSON export
//! seatlabel settings set records_backend mysql
//! seatlabel settings set database.host db.example.edu
//! seatlabel test-connection
//!
//! # Run the HTTP API
//! seatlabel serve --listen 127.0.0.1:8080
//! ```
//!
//! Log lines go to stderr and are appended to `seatlabel.log` in the working
//! directory (`--log-file`, `--no-log-file`).

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use seatlabel::{
    LabelError, Settings,
    config::{RecordBackend, SettingsStore},
    output::{CommandOutput, PreviewOutput, RecordOutput},
    printing,
    records::{RecordSource, StudentRecord},
    render::{CaptionFont, LabelComposer, save_png},
    server::{self, ServerConfig},
    task::TaskRunner,
    transport::{DirectoryPageDevice, spooler},
};

/// Seatlabel - Exam seat barcode label utility
#[derive(Parser, Debug)]
#[command(name = "seatlabel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = "settings.json")]
    settings: PathBuf,

    /// Record store file; reads this JSON export instead of the configured source
    #[arg(long, global = true)]
    records: Option<PathBuf>,

    /// Log file, appended to
    #[arg(long, global = true, default_value = "seatlabel.log")]
    log_file: PathBuf,

    /// Log to stderr only
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
enum PrintMode {
    /// TSPL commands, barcode drawn by the printer
    #[default]
    Commands,
    /// Rendered label images, one page per label
    Raster,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List semesters, most recent first
    Semesters,

    /// List exam dates of a semester
    Dates { semester: String },

    /// List module codes of a semester
    Modules {
        semester: String,

        /// Only modules examined on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List the seat records of a module
    Students { semester: String, module: String },

    /// Render a module's labels and a grid preview as PNG files
    Generate {
        semester: String,
        module: String,

        /// Output directory
        #[arg(long, default_value = "labels")]
        out: PathBuf,
    },

    /// Render one label to a PNG file
    Label {
        value: String,

        /// Output file
        #[arg(long, default_value = "label.png")]
        png: PathBuf,
    },

    /// Write a module's TSPL command script to a file or stdout
    Emit {
        semester: String,
        module: String,

        /// Output file (stdout if omitted)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Print a module's labels
    Print {
        semester: String,
        module: String,

        #[arg(long, value_enum, default_value_t = PrintMode::Commands)]
        mode: PrintMode,

        /// Raster mode: write pages as PNG files here instead of printing
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Look up a scanned barcode or student ID
    Scan { code: String },

    /// Check that the configured record source can be reached
    TestConnection,

    /// List installed printers
    Printers,

    /// Print a test page on the configured printer
    TestPage {
        /// Write the page to a PNG file instead of printing
        #[arg(long, value_name = "FILE")]
        png: Option<PathBuf>,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the effective settings as JSON, database password blanked
    Show,
    /// Set one field, e.g. `label_width_mm 50`
    Set { key: String, value: String },
}

fn main() {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr and, unless disabled, to the log file.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let file = if cli.no_log_file {
        None
    } else {
        match log_file_writer(&cli.log_file) {
            Ok(writer) => Some(writer),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", cli.log_file.display(), e);
                None
            }
        }
    };
    let (writer, guard) = file.unzip();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seatlabel=info")))
        .init();
    guard
}

fn log_file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("seatlabel.log");
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

fn run(cli: Cli) -> Result<(), LabelError> {
    let store = SettingsStore::new(&cli.settings);
    let mut settings = store.load();
    if let Some(records) = &cli.records {
        settings.records_backend = RecordBackend::Snapshot;
        settings.records_path = records.clone();
    }
    let records = settings.record_source();

    match cli.command {
        Commands::Semesters => {
            for s in records.semesters()? {
                match &s.semester_name {
                    Some(name) => println!("{}  {}", s.semester_code, name),
                    None => println!("{}", s.semester_code),
                }
            }
        }

        Commands::Dates { semester } => {
            for date in records.exam_dates(&semester)? {
                println!("{}", date);
            }
        }

        Commands::Modules { semester, date } => {
            let modules = match date {
                Some(date) => records.modules_by_date(date, &semester)?,
                None => records.modules_by_semester(&semester)?,
            };
            for module in modules {
                println!("{}", module);
            }
        }

        Commands::Students { semester, module } => {
            if let Some(name) = records.module_name(&module)? {
                println!("{} - {}", module, name);
            }
            for student in records.students(&module, &semester)? {
                println!("{}", student.display_line());
            }
        }

        Commands::Generate {
            semester,
            module,
            out,
        } => {
            let rt = runtime()?;
            let students = fetch_students(&rt, &settings, &semester, &module)?;
            let composer = composer(&settings)?;
            let dpi = composer.spec().dpi();
            let policy = settings.missing_barcode;

            let batch = run_task(&rt, "render labels", move || {
                Ok(PreviewOutput::new(composer, policy).produce(&students))
            })?;

            std::fs::create_dir_all(&out)?;
            for (index, label) in &batch.labels {
                let path = out.join(format!("{:03}-{}.png", index + 1, file_safe(&label.value)));
                save_png(&label.image, dpi, &path)?;
            }
            if let Some(grid) = batch.grid() {
                save_png(&grid, dpi, &out.join("preview.png"))?;
            }
            for e in batch.errors() {
                eprintln!("{}", e);
            }
            println!(
                "{} label(s) in {} ({} skipped, {} failed)",
                batch.labels.len(),
                out.display(),
                batch.skipped().len(),
                batch.failed().len()
            );
        }

        Commands::Label { value, png } => {
            let composer = composer(&settings)?;
            let label = composer.compose(&value)?;
            save_png(&label.image, composer.spec().dpi(), &png)?;
            println!(
                "Saved {}x{} label to {}",
                label.width(),
                label.height(),
                png.display()
            );
        }

        Commands::Emit {
            semester,
            module,
            out,
        } => {
            let students = records.students(&module, &semester)?;
            let script = CommandOutput::new(printing::media_size(&settings), settings.missing_barcode)
                .produce(&students);
            match out {
                Some(path) => {
                    std::fs::write(&path, script.to_bytes())?;
                    eprintln!("Wrote {} label(s) to {}", script.emitted.len(), path.display());
                }
                None => println!("{}", script.lines.join("\n")),
            }
        }

        Commands::Print {
            semester,
            module,
            mode,
            out_dir,
        } => {
            let rt = runtime()?;
            let students = fetch_students(&rt, &settings, &semester, &module)?;
            let job_name = format!("labels-{}", module);

            match mode {
                PrintMode::Commands => {
                    let script = run_task(&rt, "print commands", move || {
                        printing::print_commands(&students, &settings, &job_name)
                    })?;
                    println!(
                        "Printed {} label(s), {} skipped",
                        script.emitted.len(),
                        script.skipped.len()
                    );
                }
                PrintMode::Raster => {
                    let composer = composer(&settings)?;
                    let report = run_task(&rt, "print raster", move || {
                        let batch =
                            PreviewOutput::new(composer, settings.missing_barcode).produce(&students);
                        let images = batch.dynamic_images();
                        match out_dir {
                            Some(dir) => {
                                let mut device =
                                    DirectoryPageDevice::for_label(dir, &settings.label_spec()?);
                                printing::print_to_device(&mut device, &images, &settings, &job_name)
                            }
                            None => printing::print_raster(&images, &settings, &job_name),
                        }
                    })?;
                    println!(
                        "Printed {} page(s), {} failed",
                        report.printed(),
                        report.failed()
                    );
                }
            }
        }

        Commands::Scan { code } => match records.lookup(code.trim())? {
            Some(found) => {
                println!("Verified: {}", found.record.display_line());
                println!("Student: {}", found.record.student_id);
                println!("Module:  {}", found.record.module_code);
                if let Some(date) = found.exam_date {
                    println!("Exam:    {}", date);
                }
            }
            None => println!("No record for '{}'", code.trim()),
        },

        Commands::TestConnection => {
            records.test_connection()?;
            println!("Record source reachable");
        }

        Commands::Printers => {
            let printers = spooler::list_printers()?;
            let default = spooler::default_printer();
            let resolved = spooler::resolve_printer(&settings.printer_name, &printers).ok();
            for p in &printers {
                let mut marks = Vec::new();
                if default.as_deref() == Some(p.as_str()) {
                    marks.push("default");
                }
                if resolved.as_deref() == Some(p.as_str()) {
                    marks.push("configured");
                }
                if marks.is_empty() {
                    println!("{}", p);
                } else {
                    println!("{} ({})", p, marks.join(", "));
                }
            }
            if resolved.is_none() {
                eprintln!("Configured printer '{}' not found", settings.printer_name);
            }
        }

        Commands::TestPage { png } => {
            let font = CaptionFont::load(settings.font_path.as_deref());
            let page = spooler::test_page(&settings.printer_name, &font);
            match png {
                Some(path) => {
                    save_png(&page, settings.label_spec()?.dpi(), &path)?;
                    println!("Saved test page to {}", path.display());
                }
                None => {
                    let report = printing::print_raster(
                        &[image::DynamicImage::ImageRgb8(page)],
                        &settings,
                        "test-page",
                    )?;
                    println!("Test page: {} printed", report.printed());
                }
            }
        }

        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                let json = serde_json::to_string_pretty(&settings.redacted())
                    .map_err(|e| LabelError::Config(e.to_string()))?;
                println!("{}", json);
            }
            SettingsAction::Set { key, value } => {
                // Start from the file, not from command-line overrides
                let mut saved: Settings = store.load();
                saved.set(&key, &value)?;
                store.save(&saved)?;
                println!("{} = {}", key, value);
            }
        },

        Commands::Serve { listen } => {
            let rt = runtime()?;
            rt.block_on(server::serve(ServerConfig {
                settings_path: cli.settings,
                listen_addr: listen,
            }))?;
        }
    }

    Ok(())
}

fn runtime() -> Result<Runtime, LabelError> {
    Runtime::new().map_err(|e| LabelError::Task(format!("Cannot start runtime: {}", e)))
}

/// Run `work` in the background and wait for its completion.
fn run_task<T, F>(rt: &Runtime, name: &str, work: F) -> Result<T, LabelError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LabelError> + Send + 'static,
{
    let (runner, mut completions) = TaskRunner::new(rt.handle().clone());
    runner.spawn(name, work);
    rt.block_on(completions.recv())
        .ok_or_else(|| LabelError::Task(format!("{} never completed", name)))?
        .result
}

fn fetch_students(
    rt: &Runtime,
    settings: &Settings,
    semester: &str,
    module: &str,
) -> Result<Vec<StudentRecord>, LabelError> {
    let store: Box<dyn RecordSource> = settings.record_source();
    let (semester, module) = (semester.to_string(), module.to_string());
    let students = run_task(rt, "fetch students", move || store.students(&module, &semester))?;
    if students.is_empty() {
        eprintln!("No students found");
    }
    Ok(students)
}

fn composer(settings: &Settings) -> Result<LabelComposer, LabelError> {
    let font = CaptionFont::load(settings.font_path.as_deref());
    Ok(LabelComposer::new(settings.label_spec()?, font))
}

/// Barcode values as file name parts.
fn file_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_receives_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seatlabel.log");
        let (writer, guard) = log_file_writer(&path).unwrap();

        let subscriber = tracing_subscriber::fmt().with_ansi(false).with_writer(writer).finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Retrieved 3 semesters");
        });
        drop(guard);

        let logged = std::fs::read_to_string(&path).unwrap();
        assert!(logged.contains("Retrieved 3 semesters"));
        assert!(logged.contains("INFO"));
    }

    #[test]
    fn test_log_file_flags() {
        let cli = Cli::parse_from(["seatlabel", "--no-log-file", "semesters"]);
        assert!(cli.no_log_file);
        let cli = Cli::parse_from(["seatlabel", "test-connection", "--log-file", "logs/app.log"]);
        assert_eq!(cli.log_file, PathBuf::from("logs/app.log"));
        assert!(matches!(cli.command, Commands::TestConnection));
    }
}

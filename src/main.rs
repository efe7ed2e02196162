use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mba_cohort_roster::config::{GlobalArgs, RosterLocation, Settings};
use mba_cohort_roster::export::{self, ExportFormat, ExportRequest, ReportPreset};
use mba_cohort_roster::models::{NewNote, NoteCategory, NotePriority, NoteQuery};
use mba_cohort_roster::sort::{self, SortOrder};
use mba_cohort_roster::source::{FileSheetSource, HttpSheetSource, SheetSource};
use mba_cohort_roster::{db, filter, report, risk, stats};
use mba_cohort_roster::cache::SnapshotSource;
use mba_cohort_roster::export::ExportField;
use mba_cohort_roster::{FilterOptions, RosterCache, RosterLoader, StudentRecord};

#[derive(Parser)]
#[command(name = "cohort-roster")]
#[command(about = "MBA batch roster: directory, statistics, reports and notes", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List students, filtered and sorted
    Directory {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        specialization: Option<String>,
        /// MALE or FEMALE
        #[arg(long)]
        gender: Option<String>,
        /// fresher or experienced
        #[arg(long)]
        experience: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        ug_degree: Option<String>,
        #[arg(long)]
        graduation_year: Option<String>,
        /// name, rollNo, ugPercentage, totalExperience, ugEndYear,
        /// class12Percentage or class10Percentage
        #[arg(long, default_value = "name")]
        sort_by: String,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one student's profile
    Profile {
        roll_no: String,
    },
    /// Batch-level statistics
    Stats {
        #[arg(long, default_value_t = 8)]
        top: usize,
        #[arg(long)]
        json: bool,
    },
    /// Academic performance, tiers and students needing attention
    Academic,
    /// Export a field subset as CSV or JSON
    Export {
        #[arg(long, value_enum, default_value_t = PresetArg::Full)]
        preset: PresetArg,
        #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,
        /// Comma-separated field ids; defaults to the preset's fields
        #[arg(long)]
        fields: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        min_records: usize,
        /// Output path; defaults to <preset>_report_<date>.<ext>
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the fields an export can select
    Fields,
    /// Generate a markdown batch report
    Report {
        #[arg(long)]
        batch: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Manage notes in the local annotation store
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
}

#[derive(Subcommand)]
enum NotesCommand {
    /// Create or upgrade the notes schema
    InitDb,
    /// Add a note for a student
    Add {
        roll_no: String,
        content: String,
        #[arg(long, default_value = "admin")]
        author: String,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
        #[arg(long, value_enum, default_value_t = CategoryArg::General)]
        category: CategoryArg,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        private: bool,
    },
    /// List a student's notes, newest first
    List {
        roll_no: String,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Replace a note's text
    Edit { id: Uuid, content: String },
    /// Tag a note
    Tag { id: Uuid, tag: String },
    /// Delete a note
    Delete { id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Full,
    Academic,
    Geographic,
    Achievements,
    Contacts,
}

impl From<PresetArg> for ReportPreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Full => ReportPreset::Full,
            PresetArg::Academic => ReportPreset::Academic,
            PresetArg::Geographic => ReportPreset::Geographic,
            PresetArg::Achievements => ReportPreset::Achievements,
            PresetArg::Contacts => ReportPreset::Contacts,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for NotePriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => NotePriority::Low,
            PriorityArg::Medium => NotePriority::Medium,
            PriorityArg::High => NotePriority::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    General,
    Academic,
    Behavioral,
    Meeting,
    FollowUp,
}

impl From<CategoryArg> for NoteCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::General => NoteCategory::General,
            CategoryArg::Academic => NoteCategory::Academic,
            CategoryArg::Behavioral => NoteCategory::Behavioral,
            CategoryArg::Meeting => NoteCategory::Meeting,
            CategoryArg::FollowUp => NoteCategory::FollowUp,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from(cli.global);

    match cli.command {
        Commands::Notes { command } => run_notes(&settings, command).await,
        Commands::Fields => {
            print_field_catalogue();
            Ok(())
        }
        command => {
            let students = load_roster(&settings).await?;
            run_roster(command, &students)
        }
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<SqlitePool> {
    let pool = db::connect(&settings.database_url)
        .await
        .with_context(|| format!("failed to open local store {}", settings.database_url))?;
    db::init_db(&pool).await?;
    Ok(pool)
}

async fn load_roster(settings: &Settings) -> anyhow::Result<Vec<StudentRecord>> {
    let source: Box<dyn SheetSource> = match &settings.roster {
        RosterLocation::Url(url) => {
            let http = HttpSheetSource::new(url.clone(), settings.fetch_timeout)?;
            let pool = open_store(settings).await?;
            Box::new(SnapshotSource::new(http, pool, settings.stale_after))
        }
        RosterLocation::File(path) => Box::new(FileSheetSource::new(path.clone())),
    };
    let cache = RosterCache::new(settings.stale_after);
    let mut loader = RosterLoader::new(source, cache, settings.retries);

    match loader.students().await {
        Ok(students) => Ok(students.to_vec()),
        Err(err) if err.is_retryable() => {
            Err(anyhow::Error::new(err).context("roster data unavailable, please retry"))
        }
        Err(err) => Err(err.into()),
    }
}

fn run_roster(command: Commands, students: &[StudentRecord]) -> anyhow::Result<()> {
    match command {
        Commands::Directory {
            search,
            specialization,
            gender,
            experience,
            state,
            ug_degree,
            graduation_year,
            sort_by,
            desc,
            limit,
        } => {
            let filters = FilterOptions {
                search,
                specialization,
                gender,
                graduation_year,
                state,
                ug_degree,
                experience,
            };
            let order = if desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            let filtered = filter::filter_students(students, &filters);
            let sorted = sort::sort_students(&filtered, &sort_by, order);

            if sorted.is_empty() {
                println!("No students match these filters.");
                return Ok(());
            }

            println!("{} of {} students:", sorted.len(), students.len());
            for student in sorted.iter().take(limit) {
                println!(
                    "- {} {} | {} | UG {} | {:.1} yrs exp | {}",
                    student.roll_no,
                    student.name,
                    student.specialization(),
                    format_pct(student.ug_percentage),
                    student.total_experience,
                    student.state.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Profile { roll_no } => {
            let Some(student) = students.iter().find(|s| s.roll_no == roll_no) else {
                bail!("no student with roll number {roll_no}");
            };
            print_profile(student);
        }
        Commands::Stats { top, json } => {
            let mut batch = stats::batch_statistics(students);
            batch.specialization_distribution =
                stats::top_categories(batch.specialization_distribution, top);
            batch.state_distribution = stats::top_categories(batch.state_distribution, top);

            if json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
                return Ok(());
            }

            let gender = &batch.gender_distribution;
            println!("Students: {}", batch.total_students);
            println!(
                "Gender: {} male, {} female, {} unrecorded",
                gender.male, gender.female, gender.unknown
            );
            println!(
                "Experience: {} freshers, {} experienced",
                batch.experience_distribution.fresher, batch.experience_distribution.experienced
            );
            println!("Average UG score: {:.2}%", batch.average_ug_percentage);
            println!("Top specializations:");
            for entry in batch.specialization_distribution.iter() {
                println!("- {}: {}", entry.label, entry.count);
            }
            println!("Top states:");
            for entry in batch.state_distribution.iter() {
                println!("- {}: {}", entry.label, entry.count);
            }
        }
        Commands::Academic => {
            let summary = stats::academic_summary(students);
            let tiers = risk::tier_summary(students);
            let at_risk = risk::at_risk_students(students);

            println!("Average UG: {}", format_pct(summary.average_ug_percentage));
            println!("Average Class 12: {}", format_pct(summary.average_class12_percentage));
            println!("Average Class 10: {}", format_pct(summary.average_class10_percentage));
            println!("UG grade bands ({} with UG%):", summary.ug_grades.defined);
            for band in summary.ug_grades.bands.iter() {
                println!(
                    "- {}: {} ({:.0}%)",
                    band.label,
                    band.count,
                    summary.ug_grades.share(band)
                );
            }
            println!(
                "Tiers: {} high ({:.0}%), {} average ({:.0}%), {} struggling ({:.0}%)",
                tiers.high,
                tiers.share(tiers.high),
                tiers.average,
                tiers.share(tiers.average),
                tiers.struggling,
                tiers.share(tiers.struggling)
            );
            println!("Top programs:");
            for entry in summary.top_programs.iter() {
                println!("- {}: {}", entry.label, entry.count);
            }
            println!("Top performers:");
            for student in summary.top_performers.iter() {
                println!(
                    "- {} ({}) {}",
                    student.name,
                    student.roll_no,
                    format_pct(student.ug_percentage)
                );
            }
            println!("Needing attention: {}", at_risk.len());
            for entry in at_risk.iter() {
                let reasons: Vec<String> = entry.reasons.iter().map(|r| r.to_string()).collect();
                println!("- {} ({}): {}", entry.name, entry.roll_no, reasons.join(", "));
            }
        }
        Commands::Export {
            preset,
            format,
            fields,
            search,
            min_records,
            out,
        } => {
            let fields = match fields {
                Some(list) => export::parse_field_list(&list)?,
                None => Vec::new(),
            };
            let request = ExportRequest {
                preset: preset.into(),
                fields,
                format: format.into(),
                search,
                min_records,
            };
            let artifact = export::build_export(students, &request, Utc::now())?;
            let out = out.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
            std::fs::write(&out, &artifact.content)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "{} with {} records written to {}.",
                request.preset.title(),
                artifact.record_count,
                out.display()
            );
        }
        Commands::Report { batch, out } => {
            let report = report::build_report(batch.as_deref(), Utc::now().date_naive(), students);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Notes { .. } | Commands::Fields => bail!("command does not use the roster"),
    }

    Ok(())
}

async fn run_notes(settings: &Settings, command: NotesCommand) -> anyhow::Result<()> {
    let pool = open_store(settings).await?;

    match command {
        NotesCommand::InitDb => println!("Schema ready."),
        NotesCommand::Add {
            roll_no,
            content,
            author,
            priority,
            category,
            tags,
            private,
        } => {
            let note = NewNote {
                roll_no,
                content,
                author,
                priority: priority.into(),
                category: category.into(),
                tags,
                is_private: private,
            };
            let note = db::add_note(&pool, note, Utc::now()).await?;
            println!("Added note {} for {}.", note.id, note.roll_no);
        }
        NotesCommand::List {
            roll_no,
            priority,
            category,
            search,
        } => {
            let query = NoteQuery {
                priority: priority.map(Into::into),
                category: category.map(Into::into),
                search,
            };
            let notes = db::fetch_notes(&pool, &roll_no, &query).await?;
            if notes.is_empty() {
                println!("No notes for {roll_no}.");
            }
            for note in notes.iter() {
                let tags = if note.tags.is_empty() {
                    String::new()
                } else {
                    format!(" #{}", note.tags.join(" #"))
                };
                println!(
                    "- [{}] {} {}/{} by {}: {}{}",
                    note.created_at.format("%Y-%m-%d %H:%M"),
                    note.id,
                    note.priority.as_str(),
                    note.category.as_str(),
                    note.author,
                    note.content,
                    tags
                );
            }
        }
        NotesCommand::Edit { id, content } => {
            if !db::update_note_content(&pool, id, &content, Utc::now()).await? {
                bail!("no note with id {id}");
            }
            println!("Note {id} updated.");
        }
        NotesCommand::Tag { id, tag } => {
            if db::add_tag(&pool, id, &tag).await? {
                println!("Tagged {id} with {}.", tag.trim().to_lowercase());
            } else {
                println!("Nothing to tag: note missing, tag blank or already present.");
            }
        }
        NotesCommand::Delete { id } => {
            if !db::delete_note(&pool, id).await? {
                bail!("no note with id {id}");
            }
            println!("Note {id} deleted.");
        }
    }

    Ok(())
}

fn print_field_catalogue() {
    let mut categories: Vec<&str> = Vec::new();
    for field in ExportField::ALL.iter() {
        if !categories.contains(&field.category()) {
            categories.push(field.category());
        }
    }

    for category in categories {
        println!("{category}:");
        for field in ExportField::ALL.iter().filter(|f| f.category() == category) {
            println!("  {:<18} {}", field.id(), field.label());
        }
    }
}

fn print_profile(student: &StudentRecord) {
    let today = Utc::now().date_naive();
    println!("{} ({})", student.name, student.roll_no);
    println!("Course: {}", student.course.as_deref().unwrap_or("-"));
    println!(
        "Gender: {}",
        student.gender.map(|g| g.to_string()).unwrap_or_else(|| "-".to_string())
    );
    match student.age_on(today) {
        Some(age) => println!("Age: {age}"),
        None => println!("Age: -"),
    }
    println!("State: {}", student.state.as_deref().unwrap_or("-"));
    println!(
        "Contact: {} / {} / {}",
        student.college_email.as_deref().unwrap_or("-"),
        student.personal_email.as_deref().unwrap_or("-"),
        student.phone.as_deref().unwrap_or("-")
    );
    println!(
        "UG: {} {} at {}, {} ({})",
        student.ug_program.as_deref().unwrap_or("-"),
        student.ug_branch.as_deref().unwrap_or(""),
        student.ug_board.as_deref().unwrap_or("-"),
        format_pct(student.ug_percentage),
        format_year(student.ug_end_year)
    );
    println!(
        "Class 12: {} ({})",
        format_pct(student.class12_percentage),
        format_year(student.class12_yop)
    );
    println!(
        "Class 10: {} ({})",
        format_pct(student.class10_percentage),
        format_year(student.class10_yop)
    );
    println!("Experience: {:.1} years", student.total_experience);

    let roles = [
        ("Internship", &student.internship),
        ("Work 1", &student.work_experience_1),
        ("Work 2", &student.work_experience_2),
    ];
    for (label, placement) in roles.iter().filter(|(_, p)| !p.is_empty()) {
        println!(
            "{}: {} at {} ({})",
            label,
            placement.title.as_deref().unwrap_or("-"),
            placement.company.as_deref().unwrap_or("-"),
            placement.duration.as_deref().unwrap_or("-")
        );
    }

    if let Some(languages) = &student.languages {
        println!("Languages: {}", languages.join(", "));
    }
    if let Some(achievements) = &student.achievements {
        println!("Achievements: {}", achievements.join("; "));
    }
    if let Some(comments) = &student.comments {
        println!("Comments: {comments}");
    }
}

fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}%"))
}

fn format_year(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |y| y.to_string())
}

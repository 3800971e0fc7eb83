use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// Use modules from the library crate
use diffpin::app::{App, MultilineSelection, ReviewCommand, SubmitOutcome, SubmitStart};
use diffpin::config::{Config, Credentials};
use diffpin::diff::{self, DiffModel, ParsedPatch, PatchRow, RenderMode, Side};
use diffpin::{github, loader};

// init is only used by the binary
mod init;

#[derive(Parser, Debug)]
#[command(name = "dp")]
#[command(about = "Parse pull request patches and anchor review comments to them")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a patch (or a multi-file unified diff) into row-aligned texts and mappings
    Parse {
        /// Patch file; reads stdin when omitted or "-"
        patch: Option<String>,

        /// Select one file of a multi-file diff
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Print the comment threads of a file, anchored to the rendered diff
    Threads {
        #[command(flatten)]
        target: FileArgs,
    },
    /// Post a comment (or a reply, when the line belongs to a thread)
    Comment {
        #[command(flatten)]
        target: FileArgs,

        /// File line the comment ends on
        #[arg(short, long)]
        line: u32,

        /// First file line of a multi-line comment
        #[arg(long)]
        start_line: Option<u32>,

        /// LEFT (base) or RIGHT (head)
        #[arg(long, default_value = "RIGHT")]
        side: Side,

        /// Comment body
        #[arg(short, long)]
        body: String,
    },
    /// Write the default configuration file
    Init {
        /// Force overwrite existing files
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

#[derive(clap::Args, Debug)]
struct FileArgs {
    /// Repository name (e.g., "owner/repo"); detected from the current directory when omitted
    #[arg(short, long)]
    repo: Option<String>,

    /// Pull request number
    #[arg(short, long)]
    pr: u32,

    /// Path of the changed file
    #[arg(short, long)]
    file: String,

    /// Render the whole file instead of the patch only
    #[arg(long, default_value = "false")]
    full_file: bool,
}

#[derive(Serialize)]
struct ParseOutput<'a> {
    original: &'a str,
    modified: &'a str,
    rows: &'a [PatchRow],
}

impl<'a> From<&'a ParsedPatch> for ParseOutput<'a> {
    fn from(parsed: &'a ParsedPatch) -> Self {
        Self {
            original: &parsed.original,
            modified: &parsed.modified,
            rows: parsed.rows(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(patch: Option<&str>) -> Result<String> {
    match patch {
        None | Some("-") => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read patch from stdin")?;
            Ok(input)
        }
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn run_parse(patch: Option<&str>, file: Option<&str>) -> Result<()> {
    let input = read_input(patch)?;
    let files = diff::parse_unified_diff(&input);

    if files.is_empty() {
        // 単一ファイルの patch（diff --git ヘッダなし）
        if let Some(file) = file {
            bail!("No diff for {} in input", file);
        }
        return print_json(&ParseOutput::from(&diff::parse_patch(&input)));
    }

    if let Some(file) = file {
        let patch = files
            .get(file)
            .with_context(|| format!("No diff for {} in input", file))?;
        return print_json(&ParseOutput::from(&diff::parse_patch(patch)));
    }

    let parsed: BTreeMap<String, ParsedPatch> = files
        .into_iter()
        .map(|(path, patch)| {
            let parsed = diff::parse_patch(&patch);
            (path, parsed)
        })
        .collect();
    let output: BTreeMap<&str, ParseOutput<'_>> = parsed
        .iter()
        .map(|(path, parsed)| (path.as_str(), ParseOutput::from(parsed)))
        .collect();
    print_json(&output)
}

/// Load the PR and open a session on `target.file`
async fn open_session(config: Config, target: &FileArgs) -> Result<App> {
    let repo = match &target.repo {
        Some(repo) => repo.clone(),
        None => github::detect_repo().await?,
    };
    let credentials = Credentials::resolve(&config.github);
    let collapse_unchanged = config.diff.collapse_unchanged;

    let data = loader::fetch_pr_data(&repo, target.pr, &credentials).await?;
    let changed = data
        .files
        .iter()
        .find(|f| f.filename == target.file)
        .cloned()
        .with_context(|| format!("{} is not changed in #{}", target.file, target.pr))?;
    let contents = if target.full_file || config.diff.full_file {
        Some(loader::fetch_file_contents(&repo, &data.pr, &changed, &credentials).await)
    } else {
        None
    };

    let mut app = App::with_pr_data(
        config,
        Arc::new(github::GhReviewApi),
        &repo,
        data,
        credentials,
    );
    let index = app
        .file_index(&target.file)
        .with_context(|| format!("{} is not changed in #{}", target.file, target.pr))?;
    if let Some(contents) = contents {
        app.set_file_contents(index, contents);
    }
    if target.full_file {
        app.set_render_mode(RenderMode::FullFile { collapse_unchanged });
    }
    app.handle_command(ReviewCommand::SelectFile(index));
    Ok(app)
}

async fn run_threads(config: Config, target: FileArgs) -> Result<()> {
    let app = open_session(config, &target).await?;
    print_json(&app.threads())
}

async fn run_comment(
    config: Config,
    target: FileArgs,
    line: u32,
    start_line: Option<u32>,
    side: Side,
    body: String,
) -> Result<()> {
    let mut app = open_session(config, &target).await?;

    let to_editor_line = |app: &App, file_line: u32| {
        app.model()
            .and_then(|model| model.map_line_for_side(file_line, side))
            .with_context(|| format!("{} line {} is not part of the rendered diff", side, file_line))
    };
    let end = to_editor_line(&app, line)?;
    let command = match start_line {
        Some(start_line) if start_line != line => ReviewCommand::TargetRange {
            selection: MultilineSelection {
                anchor_line: to_editor_line(&app, start_line)?,
                cursor_line: end,
            },
            side,
        },
        _ => ReviewCommand::TargetLine { line: end, side },
    };
    app.handle_command(command);
    app.handle_command(ReviewCommand::EditDraft(body));

    match app.submit() {
        SubmitStart::Started => {}
        SubmitStart::Rejected => {
            let error = app.overlay().error().map(|e| e.to_string());
            bail!(error.unwrap_or_else(|| "Comment rejected".to_string()));
        }
        SubmitStart::Ignored => bail!("Nothing to submit"),
    }

    match app.wait_for_submission().await {
        Some(SubmitOutcome::Posted(comment)) => print_json(&comment),
        _ => {
            let error = app.overlay().error().map(|e| e.to_string());
            bail!(error.unwrap_or_else(|| "Comment submission failed".to_string()));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Init { force } => init::run_init(force),
        Commands::Parse { patch, file } => run_parse(patch.as_deref(), file.as_deref()),
        Commands::Threads { target } => run_threads(Config::load()?, target).await,
        Commands::Comment {
            target,
            line,
            start_line,
            side,
            body,
        } => run_comment(Config::load()?, target, line, start_line, side, body).await,
    }
}

mod config;
mod resolve;
mod test_runner;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use blockdoc::{
    Applied, Block, BlockContent, BlockKind, Document, FileStore, ImportWarning, Importer,
    SnapshotStore, TopLevelItem, VariableField,
};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "blockdoc", version, about = "Assemble Markdown documents from blocks")]
struct Cli {
    /// Config file (default: ./blockdoc.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file, overriding the config
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Disable colored diagnostics
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the starter document
    Init {
        /// Replace an existing document
        #[arg(long)]
        force: bool,
    },
    /// List blocks and groups in document order
    Show {
        /// Print the raw snapshot JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Write the document as Markdown
    Export {
        /// Output file (default: `export_file` from the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Print to stdout instead of writing a file
        #[arg(long, conflicts_with = "out")]
        stdout: bool,
    },
    /// Replace all blocks with those read from a .md or .txt file
    Import { file: PathBuf },
    /// Append a block (heading, paragraph, list, code, table)
    Add { kind: BlockKind },
    /// Delete a block
    Rm { id: String },
    /// Copy a block to just after itself
    Dup { id: String },
    /// Replace a block's text ("-" reads stdin)
    Text { id: String, text: String },
    /// Mark blocks as selected for grouping
    Select {
        ids: Vec<String>,
        /// Clear the selection instead
        #[arg(long, conflicts_with = "ids")]
        none: bool,
    },
    /// Move a block or group one place earlier
    Up { id: String },
    /// Move a block or group one place later
    Down { id: String },
    /// Move a block or group to a position within its sequence
    Reorder { id: String, index: usize },
    /// Put a block into a group at a position among its members
    MoveInto {
        id: String,
        group: String,
        #[arg(default_value_t = 0)]
        index: usize,
    },
    /// Take a grouped block out to a top-level position
    MoveOut {
        id: String,
        #[arg(default_value_t = 0)]
        index: usize,
    },
    /// Group the selected blocks
    Group,
    /// Dissolve a group, keeping its blocks
    Ungroup { group: String },
    /// Delete a group and its blocks
    RmGroup { group: String },
    /// Rename a group
    RenameGroup { group: String, name: String },
    /// Edit a table block
    Table {
        id: String,
        #[command(subcommand)]
        op: TableOp,
    },
    /// Manage variables
    Var {
        #[command(subcommand)]
        op: VarOp,
    },
    /// Apply the [[commands]] of a TOML script
    Apply { script: PathBuf },
    /// Run .test.md scenario files
    Test(TestArgs),
}

#[derive(Subcommand)]
enum TableOp {
    AddRow,
    AddCol,
    RmRow { index: usize },
    RmCol { index: usize },
    Header { index: usize, text: String },
    Cell { row: usize, column: usize, text: String },
}

#[derive(Subcommand)]
enum VarOp {
    List,
    /// Create a variable or change its value
    Set { key: String, value: String },
    Rm { key: String },
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Command::Test(args) = &cli.command {
        let path = Path::new(&args.path);
        if args.list_categories {
            test_runner::list_categories(path);
            return;
        }
        process::exit(test_runner::run_tests(path, cli.no_color, &args.category));
    }

    let config = match Config::locate(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {:#}", err);
            process::exit(1);
        }
    };
    init_tracing(&config.log);

    if let Err(err) = run(cli, config) {
        eprintln!("error: {:#}", err);
        process::exit(1);
    }
}

fn init_tracing(default: &str) {
    let filter = EnvFilter::try_from_env("BLOCKDOC_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The loaded document and where it goes back to.
struct Session {
    doc: Document,
    store: FileStore,
    color: ColorChoice,
}

impl Session {
    fn open(store: FileStore, color: ColorChoice) -> Session {
        let doc = Document::load_or_bootstrap(&store);
        Session { doc, store, color }
    }

    fn save(&mut self) -> Result<()> {
        self.doc
            .save_to(&mut self.store)
            .with_context(|| format!("failed to save {}", self.store.path().display()))
    }

    /// Apply one command, save if it changed anything, and report.
    fn apply(&mut self, command: blockdoc::Command) -> Result<()> {
        let applied = self.doc.apply(command)?;
        self.finish(applied)
    }

    fn finish(&mut self, applied: Applied) -> Result<()> {
        if applied.is_change() {
            self.save()?;
        }
        match applied {
            Applied::Unchanged => eprintln!("nothing changed"),
            Applied::Changed => {}
            Applied::CreatedBlock(id) => println!("{}", id.to_hex()),
            Applied::CreatedGroup(id) => println!("{}", id.to_hex()),
            Applied::CreatedVariable(id) => println!("{}", id.to_hex()),
            Applied::Imported { warnings } => {
                eprintln!("imported {} block(s)", self.doc.block_count());
                if !warnings.is_empty() {
                    eprintln!("{} warning(s)", warnings.len());
                }
            }
        }
        Ok(())
    }
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path());
    debug!(store = %store_path.display(), "using snapshot store");
    let store = FileStore::new(store_path);

    let command = match cli.command {
        Command::Init { force } => return init(store, force),
        command => command,
    };

    let mut session = Session::open(store, color);
    let doc = &session.doc;

    use blockdoc::Command as Cmd;
    match command {
        // Both run without a session.
        Command::Init { .. } | Command::Test(_) => Ok(()),
        Command::Show { json } => {
            if json {
                let snapshot = serde_json::to_string_pretty(&doc.to_snapshot())?;
                println!("{}", snapshot);
            } else {
                print!("{}", outline(doc));
            }
            Ok(())
        }
        Command::Export { out, stdout } => {
            let markdown = doc.generate();
            if stdout {
                println!("{}", markdown);
                return Ok(());
            }
            let path = out.unwrap_or(config.export_file);
            std::fs::write(&path, format!("{}\n", markdown))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("wrote {} ({})", path.display(), blockdoc::parser::EXPORT_MIME);
            Ok(())
        }
        Command::Import { file } => {
            let source = blockdoc::parser::read_import_file(&file)?;
            let mut files = SimpleFiles::new();
            let file_id = files.add(file.display().to_string(), source.clone());
            let import = Importer::new(&source, file_id).parse();
            let warnings = session.doc.import_parsed(import);
            emit_warnings(session.color, &files, &warnings);
            session.finish(Applied::Imported { warnings })
        }
        Command::Add { kind } => session.apply(Cmd::AddBlock { kind }),
        Command::Rm { id } => {
            let block = resolve::block(doc, &id)?;
            session.apply(Cmd::DeleteBlock { block })
        }
        Command::Dup { id } => {
            let block = resolve::block(doc, &id)?;
            session.apply(Cmd::DuplicateBlock { block })
        }
        Command::Text { id, text } => {
            let block = resolve::block(doc, &id)?;
            let text = if text == "-" { read_stdin()? } else { text };
            session.apply(Cmd::SetText { block, text })
        }
        Command::Select { ids, none } => {
            if none {
                return session.apply(Cmd::ClearSelection);
            }
            let blocks = ids
                .iter()
                .map(|id| resolve::block(doc, id))
                .collect::<Result<Vec<_>>>()?;
            for block in blocks {
                session.apply(Cmd::Select {
                    block,
                    selected: true,
                })?;
            }
            Ok(())
        }
        Command::Up { id } => {
            let item = resolve::item(doc, &id)?;
            session.apply(Cmd::MoveUp { item })
        }
        Command::Down { id } => {
            let item = resolve::item(doc, &id)?;
            session.apply(Cmd::MoveDown { item })
        }
        Command::Reorder { id, index } => {
            let item = resolve::item(doc, &id)?;
            session.apply(Cmd::Reorder { item, index })
        }
        Command::MoveInto { id, group, index } => {
            let block = resolve::block(doc, &id)?;
            let group = resolve::group(doc, &group)?;
            session.apply(Cmd::MoveIntoGroup {
                block,
                group,
                index,
            })
        }
        Command::MoveOut { id, index } => {
            let block = resolve::block(doc, &id)?;
            session.apply(Cmd::MoveToTopLevel { block, index })
        }
        Command::Group => session.apply(Cmd::GroupSelection),
        Command::Ungroup { group } => {
            let group = resolve::group(doc, &group)?;
            session.apply(Cmd::Ungroup { group })
        }
        Command::RmGroup { group } => {
            let group = resolve::group(doc, &group)?;
            session.apply(Cmd::DeleteGroup { group })
        }
        Command::RenameGroup { group, name } => {
            let group = resolve::group(doc, &group)?;
            session.apply(Cmd::RenameGroup { group, name })
        }
        Command::Table { id, op } => {
            let block = resolve::block(doc, &id)?;
            if doc.block(block).and_then(Block::table).is_none() {
                bail!("block {} is not a table", block.to_hex());
            }
            session.apply(match op {
                TableOp::AddRow => Cmd::AddRow { block },
                TableOp::AddCol => Cmd::AddColumn { block },
                TableOp::RmRow { index } => Cmd::DeleteRow { block, index },
                TableOp::RmCol { index } => Cmd::DeleteColumn { block, index },
                TableOp::Header { index, text } => Cmd::SetHeader { block, index, text },
                TableOp::Cell { row, column, text } => Cmd::SetCell {
                    block,
                    row,
                    column,
                    text,
                },
            })
        }
        Command::Var { op } => match op {
            VarOp::List => {
                let all = resolve::variable_hexes(doc);
                for (id, variable) in doc.variables().iter() {
                    let shown = doc.variables().substitute(&format!("{{{{{}}}}}", variable.key));
                    println!(
                        "{}  {} = {}  -> {}",
                        resolve::handle(&id.to_hex(), &all),
                        variable.key,
                        variable.value,
                        shown
                    );
                }
                Ok(())
            }
            VarOp::Set { key, value } => match doc.variables().get_by_key(&key).map(|(id, _)| id) {
                Some(variable) => session.apply(Cmd::UpdateVariable {
                    variable,
                    field: VariableField::Value,
                    text: value,
                }),
                None => session.apply(Cmd::AddVariable { key, value }),
            },
            VarOp::Rm { key } => {
                let variable = resolve::variable(doc, &key)?;
                session.apply(Cmd::DeleteVariable { variable })
            }
        },
        Command::Apply { script } => apply_script(&mut session, &script),
    }
}

fn init(mut store: FileStore, force: bool) -> Result<()> {
    if !force && store.load().is_ok_and(|s| s.is_some()) {
        bail!(
            "{} already holds a document (use --force to replace it)",
            store.path().display()
        );
    }
    Document::bootstrap()
        .save_to(&mut store)
        .with_context(|| format!("failed to save {}", store.path().display()))?;
    eprintln!("created {}", store.path().display());
    Ok(())
}

#[derive(serde::Deserialize)]
struct Script {
    #[serde(default)]
    commands: Vec<toml::Value>,
}

/// Apply every command in a script, then save once. Stops at the first
/// failure without saving.
fn apply_script(session: &mut Session, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script: {}", path.display()))?;
    let script: Script = toml::from_str(&raw)
        .with_context(|| format!("failed to parse script: {}", path.display()))?;

    let mut changed = false;
    for (index, value) in script.commands.into_iter().enumerate() {
        let command = resolve::command(&session.doc, value)
            .with_context(|| format!("command {} in {}", index, path.display()))?;
        let applied = session
            .doc
            .apply(command)
            .with_context(|| format!("command {} in {}", index, path.display()))?;
        if let Applied::Imported { warnings } = &applied {
            for warning in warnings {
                eprintln!("warning: command {}: {}", index, warning.message);
            }
        }
        changed |= applied.is_change();
    }
    if changed {
        session.save()?;
    } else {
        eprintln!("nothing changed");
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read stdin")?;
    Ok(text.trim_end_matches(['\n', '\r']).to_string())
}

fn emit_warnings(color: ColorChoice, files: &SimpleFiles<String, String>, warnings: &[ImportWarning]) {
    let writer = StandardStream::stderr(color);
    let config = term::Config::default();
    for warning in warnings {
        let diagnostic = warning.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

const PREVIEW_WIDTH: usize = 48;

fn preview(block: &Block) -> String {
    let text = match block.content() {
        BlockContent::Text(text) => text.lines().next().unwrap_or_default().to_string(),
        BlockContent::Table(table) => format!(
            "{}x{} table: {}",
            table.column_count(),
            table.row_count(),
            table.headers().join(" | ")
        ),
    };
    if text.chars().count() > PREVIEW_WIDTH {
        let cut: String = text.chars().take(PREVIEW_WIDTH - 1).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

fn block_line(position: usize, block: &Block, indent: &str, all: &[String]) -> String {
    format!(
        "{:>3} {}{} {} {:<9} {}\n",
        position,
        indent,
        if block.is_selected() { '*' } else { ' ' },
        resolve::handle(&block.id().to_hex(), all),
        block.kind(),
        preview(block)
    )
}

/// One line per block, numbered the way `@N` positions count, with group
/// members indented under their group. Ids are shown as the shortest
/// prefix that still resolves.
fn outline(doc: &Document) -> String {
    let all = resolve::item_hexes(doc);
    let mut out = String::new();
    let mut position = 0;
    for item in doc.top_level() {
        match item {
            TopLevelItem::Block(block) => {
                out.push_str(&block_line(position, block, "", &all));
                position += 1;
            }
            TopLevelItem::Group(group) => {
                let handle = resolve::handle(&group.id().to_hex(), &all);
                out.push_str(&format!("    [{}] {}\n", handle, group.name()));
                for block in doc.group_members(group.id()) {
                    out.push_str(&block_line(position, block, "  ", &all));
                    position += 1;
                }
            }
        }
    }
    if out.is_empty() {
        out.push_str("(empty document)\n");
    }
    out
}

mod logger;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use sheet_renamer_core::{
    app_paths, collect_photos, column_report, export_to_directory, load_config, parse_format,
    preview_sample, save_config_to, unique_values, write_archive_file, AppConfig, ArchiveLayout,
    CollectOptions, FormatPart, FormatTemplate, MatchStrategy, Photo, Preview, RenameSession,
    SessionOptions, Signal,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "sheet-renamer-cli")]
#[command(about = "根据表格数据批量重命名照片并打包")]
struct Cli {
    /// Repeat for more detail (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Preview(PreviewArgs),
    Rename(RenameArgs),
    Columns(ColumnsArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Spreadsheet (.xlsx/.xls/.ods/.csv/.tsv); the first row is the header
    #[arg(long)]
    sheet: PathBuf,
    /// Photo files or folders
    #[arg(long, required = true, num_args = 1..)]
    photos: Vec<PathBuf>,
    #[arg(long)]
    key_column: Option<String>,
    /// e.g. "{姓名}_{编号}"
    #[arg(long, conflicts_with = "parts")]
    template: Option<String>,
    /// Ordered format parts: col:<column> or sep:<text>
    #[arg(long = "part", value_parser = parse_part)]
    parts: Vec<FormatPart>,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    #[arg(long, default_value_t = false)]
    include_hidden: bool,
}

#[derive(Debug, Args)]
struct PreviewArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Zip path; defaults to the configured archive name in the current directory
    #[arg(long, conflicts_with = "out_dir")]
    out: Option<PathBuf>,
    /// Copy into matched/unmatched folders instead of zipping
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ColumnsArgs {
    #[arg(long)]
    sheet: PathBuf,
    /// List the distinct values of this column
    #[arg(long)]
    column: Option<String>,
    /// Check which placeholders of this template resolve
    #[arg(long)]
    template: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Commands::Preview(args) => cmd_preview(args),
        Commands::Rename(args) => cmd_rename(args),
        Commands::Columns(args) => cmd_columns(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init { force } => cmd_config_init(force),
        },
    }
}

fn cmd_preview(args: PreviewArgs) -> Result<()> {
    let config = load_config()?;
    let session = prepare_session(&args.input, &config)?;

    match args.output {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "key_column": session.key_column(),
                "format": session.format().to_template_string(),
                "preview": session.preview(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Table => {
            if let Some(preview) = session.preview() {
                print_table(preview);
            }
        }
    }

    eprintln!("预览模式: 未生成任何文件。使用 rename 子命令输出重命名结果。");
    Ok(())
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;
    let mut session = prepare_session(&args.input, &config)?;
    let layout = ArchiveLayout::from(&config);

    let destination = match &args.out_dir {
        Some(dir) => dir.clone(),
        None => args
            .out
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.archive_name)),
    };

    let signal = session.package(|targets| match &args.out_dir {
        Some(dir) => export_to_directory(targets, &layout, dir),
        None => write_archive_file(targets, &layout, &destination),
    });
    report(&signal)?;
    eprintln!("输出位置: {}", destination.display());
    Ok(())
}

fn cmd_columns(args: ColumnsArgs) -> Result<()> {
    let config = load_config()?;
    let mut session = RenameSession::new(SessionOptions::from(&config));
    report(&session.load_spreadsheet(&args.sheet))?;

    println!("列名 (* 为默认文件名列)");
    for column in session.columns() {
        let marker = if session.key_column() == Some(column.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {column}");
    }

    if let Some(column) = &args.column {
        println!("\n{column} 的取值:");
        for value in unique_values(session.rows(), column) {
            println!("  {value}");
        }
    }

    if let Some(template) = &args.template {
        let report = column_report(&parse_format(template), session.rows());
        println!("\n格式中的列: {}", report.format_columns.join(", "));
        if report.unresolved_columns.is_empty() {
            println!("所有列均可解析");
        } else {
            println!("无法解析的列: {}", report.unresolved_columns.join(", "));
        }
    }
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("配置文件: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(force: bool) -> Result<()> {
    let paths = app_paths()?;
    if paths.config_path.exists() && !force {
        bail!(
            "配置文件已存在: {} (使用 --force 覆盖)",
            paths.config_path.display()
        );
    }
    save_config_to(&AppConfig::default(), &paths.config_path)?;
    println!("已写入默认配置: {}", paths.config_path.display());
    Ok(())
}

/// Loads rows and photos, applies key column and format, and runs the matching pass.
fn prepare_session(input: &InputArgs, config: &AppConfig) -> Result<RenameSession> {
    let mut session = RenameSession::new(SessionOptions::from(config));
    report(&session.load_spreadsheet(&input.sheet))?;

    let options = CollectOptions {
        recursive: input.recursive || config.recursive_default,
        include_hidden: input.include_hidden || config.include_hidden_default,
    };
    let photos = gather_photos(&input.photos, &options)?;
    report(&session.load_photos(photos))?;

    if let Some(column) = &input.key_column {
        if !session.columns().contains(column) {
            bail!(
                "表格中没有列 \"{column}\"，可用列: {}",
                session.columns().join(", ")
            );
        }
        session.select_key_column(column.as_str());
    }
    if let Some(column) = session.key_column() {
        eprintln!("文件名列: {column}");
    }

    let format = match &input.template {
        Some(template) => parse_format(template),
        None if !input.parts.is_empty() => FormatTemplate::from_parts(input.parts.clone()),
        None => config.format_template(),
    };
    warn_on_sample(&format, &session);
    session.set_format(format);

    report(&session.build_preview())?;
    Ok(session)
}

fn gather_photos(inputs: &[PathBuf], options: &CollectOptions) -> Result<Vec<Photo>> {
    let mut photos = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let (found, stats) = collect_photos(input, options)?;
            log::info!(
                "{}: scanned={} image={} non_image_skip={} hidden_skip={}",
                input.display(),
                stats.scanned_files,
                stats.image_files,
                stats.skipped_non_image,
                stats.skipped_hidden
            );
            photos.extend(found);
        } else {
            ensure_file(input)?;
            photos.push(Photo::from_path(input));
        }
    }
    Ok(photos)
}

fn ensure_file(path: &Path) -> Result<()> {
    let metadata = path
        .metadata()
        .with_context(|| format!("照片不存在: {}", path.display()))?;
    if !metadata.is_file() {
        bail!("不是文件: {}", path.display());
    }
    Ok(())
}

fn warn_on_sample(format: &FormatTemplate, session: &RenameSession) {
    if format.is_empty() {
        return;
    }
    if let Some(sample) = preview_sample(format, session.rows()) {
        eprintln!("格式示例: {}", sample.text);
        for diagnostic in sample.diagnostics() {
            eprintln!("警告: {diagnostic} (将保留原样)");
        }
    }
}

fn report(signal: &Signal) -> Result<()> {
    match signal {
        Signal::Success(_) => eprintln!("{signal}"),
        Signal::Warning { .. } => eprintln!("警告: {signal}"),
        Signal::Error(err) => {
            return Err(anyhow::Error::new(err.clone()).context(format!("[{}]", err.code())))
        }
    }
    Ok(())
}

fn parse_part(raw: &str) -> Result<FormatPart, String> {
    match raw.split_once(':') {
        Some(("col", column)) if !column.is_empty() => Ok(FormatPart::Column(column.to_string())),
        Some(("sep", separator)) => Ok(FormatPart::Separator(separator.to_string())),
        _ => Err(format!("无效的格式片段 \"{raw}\"，应为 col:<列名> 或 sep:<分隔符>")),
    }
}

fn strategy_label(strategy: Option<MatchStrategy>) -> &'static str {
    match strategy {
        Some(MatchStrategy::ExactName) => "完整文件名",
        Some(MatchStrategy::Stem) => "去扩展名",
        Some(MatchStrategy::Containment) => "包含",
        None => "未匹配",
    }
}

fn print_table(preview: &Preview) {
    println!("原文件名 -> 新文件名 (匹配方式)");
    for record in preview.records() {
        println!(
            "{} -> {} ({})",
            record.original_name(),
            record.new_name(),
            strategy_label(record.strategy())
        );
    }

    println!(
        "\n汇总: 已匹配 {} 张, 未匹配 {} 张",
        preview.matched_count(),
        preview.unmatched_count()
    );
}

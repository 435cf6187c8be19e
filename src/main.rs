use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use log::info;

use toolhub::config::{init_default_config, load_or_default, AppConfig, CONFIG_FILE_NAME};
use toolhub::docx::package::{validate_docx, DOCUMENT_PART};
use toolhub::docx::xml::{paragraph_texts, parse_xml_part};
use toolhub::provider::title_from_file_name;
use toolhub::qr::{encode_png, encode_svg, parse_ec_level, png_data_url};

#[derive(Parser, Debug)]
#[command(name = "toolhub")]
#[command(version)]
#[command(about = "Pages to Word conversion, short URLs and QR codes", long_about = None)]
struct Args {
    /// Config file path (default: $TOOLHUB_CONFIG, else search for toolhub.toml upwards)
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a .pages document to .docx
    Convert {
        #[arg(value_name = "PAGES")]
        input: PathBuf,

        /// Output .docx (default: next to the input)
        #[arg(short, long, value_name = "DOCX")]
        output: Option<PathBuf>,

        /// Document title (default: input file stem)
        #[arg(long)]
        title: Option<String>,

        /// Skip external conversion engines
        #[arg(long)]
        salvage_only: bool,
    },

    /// Salvage text from a Pages container without writing a document
    Extract {
        #[arg(value_name = "PAGES")]
        input: PathBuf,

        /// Write the extracted content as JSON
        #[arg(long, value_name = "JSON")]
        json: Option<PathBuf>,

        /// Dump collected images into this directory
        #[arg(long, value_name = "DIR")]
        images: Option<PathBuf>,
    },

    /// Validate a .docx and print its paragraphs
    Inspect {
        #[arg(value_name = "DOCX")]
        input: PathBuf,
    },

    /// Create (or reuse) a short code for a URL
    Shorten { url: String },

    /// Show the entry behind a short code
    Lookup { code: String },

    /// Count a visit and print the target URL
    Resolve { code: String },

    /// Render text as a QR code
    Qrcode {
        text: String,

        /// Output file (png default: qrcode.png; svg default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Edge length in pixels (50..=2000)
        #[arg(long)]
        size: Option<u32>,

        /// Error correction level: L, M, Q or H
        #[arg(long)]
        level: Option<String>,

        #[arg(long, value_enum, default_value = "png")]
        format: QrFormat,
    },

    /// Write a default toolhub.toml, then exit
    InitConfig {
        /// Target directory (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QrFormat {
    Png,
    Svg,
    DataUrl,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read input: {}", path.display()))
}

fn run_convert(
    cfg: &AppConfig,
    input: &Path,
    output: Option<PathBuf>,
    title: Option<String>,
    salvage_only: bool,
) -> anyhow::Result<()> {
    let bytes = read_input(input)?;
    let name = file_name_of(input);
    let converter = cfg.converter().context("build converter")?;
    let result = if salvage_only {
        converter.salvage(&bytes, &name, title.as_deref())
    } else {
        converter.convert(&bytes, &name, title.as_deref())
    };
    let out = result.map_err(|e| anyhow!("{}: {e}", e.user_message()))?;
    let output = output.unwrap_or_else(|| input.with_file_name(&out.file_name));
    std::fs::write(&output, &out.bytes)
        .with_context(|| format!("write output: {}", output.display()))?;
    info!("wrote {} (via {})", output.display(), out.produced_by);
    Ok(())
}

fn run_extract(
    cfg: &AppConfig,
    input: &Path,
    json: Option<PathBuf>,
    images: Option<PathBuf>,
) -> anyhow::Result<()> {
    let bytes = read_input(input)?;
    let title = title_from_file_name(&file_name_of(input));
    let pipeline = cfg.salvage_pipeline()?;
    let content = pipeline
        .extract(&bytes, &title)
        .with_context(|| format!("extract: {}", input.display()))?;

    for p in &content.paragraphs {
        println!("{p}");
    }
    if let Some(path) = json {
        let text = serde_json::to_string_pretty(&content).context("serialize content")?;
        std::fs::write(&path, text).with_context(|| format!("write json: {}", path.display()))?;
    }
    if let Some(dir) = images {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create image dir: {}", dir.display()))?;
        for (i, img) in content.images.iter().enumerate() {
            let path = dir.join(format!("{i:03}_{}", img.file_name()));
            std::fs::write(&path, &img.data)
                .with_context(|| format!("write image: {}", path.display()))?;
        }
    }
    info!(
        "{} paragraphs, {} images",
        content.paragraphs.len(),
        content.images.len()
    );
    Ok(())
}

fn run_inspect(input: &Path) -> anyhow::Result<()> {
    let bytes = read_input(input)?;
    let pkg = validate_docx(&bytes).with_context(|| format!("validate: {}", input.display()))?;
    let doc = pkg
        .entry(DOCUMENT_PART)
        .with_context(|| format!("missing {DOCUMENT_PART}"))?;
    let part = parse_xml_part(&doc.name, &doc.data)?;
    for p in paragraph_texts(&part) {
        match p.style {
            Some(style) => println!("[{style}] {}", p.text),
            None => println!("{}", p.text),
        }
    }
    Ok(())
}

fn run_qrcode(
    cfg: &AppConfig,
    text: &str,
    output: Option<PathBuf>,
    size: Option<u32>,
    level: Option<String>,
    format: QrFormat,
) -> anyhow::Result<()> {
    let mut opts = cfg.qr_options()?;
    if let Some(size) = size {
        opts.size = size;
    }
    if let Some(level) = level.as_deref() {
        opts.level = parse_ec_level(level)?;
    }
    match format {
        QrFormat::Png => {
            let png = encode_png(text, &opts)?;
            let path = output.unwrap_or_else(|| PathBuf::from("qrcode.png"));
            std::fs::write(&path, png).with_context(|| format!("write png: {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        QrFormat::Svg => {
            let svg = encode_svg(text, &opts)?;
            match output {
                Some(path) => std::fs::write(&path, svg)
                    .with_context(|| format!("write svg: {}", path.display()))?,
                None => println!("{svg}"),
            }
        }
        QrFormat::DataUrl => println!("{}", png_data_url(&encode_png(text, &opts)?)),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let command = match args.command {
        Some(c) => c,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  toolhub convert <input.pages>\n\nTIPS:\n  - Default config search: {CONFIG_FILE_NAME} (upwards), or set TOOLHUB_CONFIG.\n"
            );
            return Ok(());
        }
    };

    if let Command::InitConfig { dir, force } = &command {
        let dir = dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, *force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let cfg = load_or_default(args.config.as_deref())?;
    match command {
        Command::Convert {
            input,
            output,
            title,
            salvage_only,
        } => run_convert(&cfg, &input, output, title, salvage_only),
        Command::Extract {
            input,
            json,
            images,
        } => run_extract(&cfg, &input, json, images),
        Command::Inspect { input } => run_inspect(&input),
        Command::Shorten { url } => {
            let out = cfg.url_service()?.shorten(&url)?;
            if out.is_existing {
                info!("{url} was already shortened");
            }
            println!("{}", out.short_url);
            Ok(())
        }
        Command::Lookup { code } => {
            let entry = cfg.url_service()?.lookup(&code)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
            Ok(())
        }
        Command::Resolve { code } => {
            println!("{}", cfg.url_service()?.resolve(&code)?);
            Ok(())
        }
        Command::Qrcode {
            text,
            output,
            size,
            level,
            format,
        } => run_qrcode(&cfg, &text, output, size, level, format),
        Command::InitConfig { .. } => Ok(()),
    }
}

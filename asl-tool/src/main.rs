mod config;

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use asl_core::{walk_document, AslDocument, AslReader, CodecConfig, DumpCatcher, PatternTile};
use asl_style::StyleSerializer;
use clap::{Parser, Subcommand};

use crate::config::{LoggerConfig, ToolConfig, ToolConfigBuilder};

#[derive(Parser, Debug)]
#[command(version, about = "Photoshop layer style (.asl) inspector", long_about = None)]
struct Args {
    /// TOML file with `[codec]` and `[logger]` tables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fail on the first damaged record instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a binary file into its XML form
    Dump {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert the XML form back into a binary file
    Build {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List every value together with its catcher path
    Paths { input: PathBuf },
    /// Print the layer styles as JSON
    Styles {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export the embedded patterns as PNG files
    Patterns {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logger(config: &LoggerConfig) {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(config.level_filter.to_string()));
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn read_document(path: &Path, codec: &CodecConfig) -> Result<AslDocument> {
    AslReader::new(codec.clone())
        .read_file(&mut open(path)?)
        .with_context(|| format!("failed to decode {}", path.display()))
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text).with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn dump(input: &Path, output: Option<&Path>, codec: &CodecConfig) -> Result<()> {
    let doc = read_document(input, codec)?;
    let xml = asl_core::document_to_xml(&doc).context("failed to render XML")?;
    write_output(output, &xml)
}

fn build(input: &Path, output: &Path) -> Result<()> {
    let xml = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let doc = asl_core::xml_to_document(&xml).with_context(|| format!("failed to parse {}", input.display()))?;
    let bytes = asl_core::write_document(&doc).context("failed to encode document")?;
    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("wrote {} styles to {}", doc.styles().len(), output.display());
    Ok(())
}

fn paths(input: &Path, codec: &CodecConfig) -> Result<()> {
    let doc = read_document(input, codec)?;
    let mut catcher = DumpCatcher::new();
    walk_document(&doc, &mut catcher);
    for record in &catcher.records {
        println!("{}", record);
    }
    Ok(())
}

fn styles(input: &Path, output: Option<&Path>, codec: &CodecConfig) -> Result<()> {
    let mut serializer = StyleSerializer::new(codec.clone());
    serializer
        .read_from_device(&mut open(input)?)
        .with_context(|| format!("failed to read styles from {}", input.display()))?;
    if !serializer.is_valid() {
        log::warn!("{} references patterns it does not embed", input.display());
    }
    let json = serde_json::to_string_pretty(serializer.styles())?;
    write_output(output, &json)
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "pattern".to_string()
    } else {
        stem
    }
}

fn patterns(input: &Path, output: &Path, codec: &CodecConfig) -> Result<()> {
    let doc = read_document(input, codec)?;
    fs::create_dir_all(output).with_context(|| format!("failed to create {}", output.display()))?;

    let mut count = 0;
    for payload in doc.patterns() {
        let tile = PatternTile::from_payload(payload)
            .with_context(|| format!("failed to decode pattern {}", payload.uuid))?;
        let image = image::RgbaImage::from_raw(tile.width, tile.height, tile.to_rgba())
            .with_context(|| format!("pattern {} has an inconsistent size", payload.uuid))?;
        let path = output.join(format!("{}_{}.png", file_stem(&tile.name), payload.uuid));
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::debug!("exported {:?} ({}x{}) to {}", tile.name, tile.width, tile.height, path.display());
        count += 1;
    }
    if count == 0 {
        bail!("{} embeds no patterns", input.display());
    }
    log::info!("exported {} patterns to {}", count, output.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (loaded, missing) = match args.config.as_deref() {
        Some(path) => match ToolConfig::load(path)? {
            Some(loaded) => (loaded, None),
            None => (ToolConfig::default(), Some(path)),
        },
        None => (ToolConfig::default(), None),
    };
    let mut codec = loaded.codec;
    codec.strict |= args.strict;
    let config = ToolConfigBuilder::new()
        .with_codec_config(codec)
        .with_logger_config(loaded.logger)
        .get();
    init_logger(&config.logger);
    if let Some(path) = missing {
        log::warn!("couldn't find {}, using the default configuration", path.display());
    }

    match &args.command {
        Command::Dump { input, output } => dump(input, output.as_deref(), &config.codec),
        Command::Build { input, output } => build(input, output),
        Command::Paths { input } => paths(input, &config.codec),
        Command::Styles { input, output } => styles(input, output.as_deref(), &config.codec),
        Command::Patterns { input, output } => patterns(input, output, &config.codec),
    }
}

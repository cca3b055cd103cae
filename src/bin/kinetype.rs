use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kinetype", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an animated GIF from text and a style id.
    Generate(GenerateArgs),
    /// List the animation style ids accepted by `generate`.
    Styles,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Text to animate (1..=20 printable characters).
    #[arg(long)]
    text: Option<String>,

    /// Animation style id (see `kinetype styles`).
    #[arg(long)]
    style: Option<String>,

    /// Read the request from a JSON file ({"text": "...", "style": "..."})
    /// instead of --text/--style.
    #[arg(long = "in", conflicts_with_all = ["text", "style"])]
    in_path: Option<PathBuf>,

    /// Output directory for the generated GIF.
    #[arg(long, default_value = "uploads")]
    out_dir: PathBuf,

    /// Override the number of frames per loop.
    #[arg(long)]
    frames: Option<u64>,

    /// Override the per-frame delay in milliseconds.
    #[arg(long)]
    delay_ms: Option<u32>,

    /// Render frames on a worker pool.
    #[arg(long)]
    parallel: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
        Command::Styles => cmd_styles(),
    }
}

fn read_request_json(path: &PathBuf) -> anyhow::Result<kinetype::AnimationRequest> {
    let f = File::open(path).with_context(|| format!("open request '{}'", path.display()))?;
    let r = BufReader::new(f);
    let request: kinetype::AnimationRequest =
        serde_json::from_reader(r).with_context(|| "parse request JSON")?;
    Ok(request)
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let request = match (&args.in_path, &args.text, &args.style) {
        (Some(path), _, _) => read_request_json(path)?,
        (None, Some(text), Some(style)) => {
            kinetype::AnimationRequest::new(text.clone(), kinetype::StyleId::parse(style)?)
        }
        _ => anyhow::bail!("pass either --in <request.json> or both --text and --style"),
    };
    request.validate()?;

    let mut cfg = kinetype::RenderConfig::default();
    if let Some(frames) = args.frames {
        cfg.frame_count = frames;
    }
    if let Some(delay_ms) = args.delay_ms {
        cfg.delay_ms = delay_ms;
    }
    cfg.parallel = args.parallel;

    let generator = kinetype::Generator::new(cfg)?;
    let store = kinetype::DirStore::new(&args.out_dir);
    let locator = generator.generate(&request, &store)?;

    eprintln!("wrote {}", args.out_dir.join(&locator.rel_path).display());
    Ok(())
}

fn cmd_styles() -> anyhow::Result<()> {
    for id in kinetype::StyleId::WIRE_IDS {
        println!("{id}");
    }
    Ok(())
}

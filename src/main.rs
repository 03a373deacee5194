// Command-line renderer: template file + JSON context -> rendered text

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use template_lang::{FileTemplateLoader, ObjectRef, ScriptObject, TemplateEngine, Value};

#[derive(Parser)]
#[command(
    name = "template-lang",
    about = "Render a template against a JSON data context"
)]
struct Args {
    /// Template file to render
    template: PathBuf,

    /// JSON file providing the root data context
    #[arg(long)]
    data: Option<PathBuf>,

    /// Write output to a file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Relaxed mode: missing variables and members yield null
    #[arg(long)]
    relaxed: bool,

    /// Root directory for include resolution (defaults to the template's
    /// directory)
    #[arg(long)]
    include_root: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(message) = run(&args) {
        eprintln!("{}", message);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    let source = fs::read_to_string(&args.template)
        .map_err(|e| format!("cannot read template '{}': {}", args.template.display(), e))?;

    let root = load_context(args)?;

    let include_root = args
        .include_root
        .clone()
        .or_else(|| args.template.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));
    let mut engine = TemplateEngine::with_loader(FileTemplateLoader::new(include_root));
    engine.options.relaxed = args.relaxed;

    let output = engine.render(&source, root).map_err(|e| e.to_string())?;

    match &args.out {
        Some(path) => fs::write(path, output)
            .map_err(|e| format!("cannot write output '{}': {}", path.display(), e))?,
        None => print!("{}", output),
    }
    Ok(())
}

fn load_context(args: &Args) -> Result<ObjectRef, String> {
    let Some(path) = &args.data else {
        return Ok(ScriptObject::new().into_ref());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read data file '{}': {}", path.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("invalid json in '{}': {}", path.display(), e))?;
    match template_lang::json::value_from_json(&json) {
        Value::Object(o) => Ok(o),
        other => Err(format!(
            "data context must be a JSON object, found {}",
            other.kind_name()
        )),
    }
}

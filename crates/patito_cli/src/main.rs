//! Patito CLI: new, build, run, exec, quads.

use clap::{Parser, Subcommand};
use patito_compiler::print_diagnostics;
use patito_pkg::{Manifest, DEFAULT_ENTRY, MANIFEST_FILE};
use patito_syntax::ir::Program;
use patito_vm::VirtualMachine;
use std::io::Write;
use std::path::{Path, PathBuf};

const OBJECT_EXTENSION: &str = "pato";

#[derive(Parser)]
#[command(name = "patito")]
#[command(about = "Patito language toolchain")]
struct Cli {
    /// Log compiler and VM events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new Patito project
    New { name: String },
    /// Compile a .pat file or project to dist/<name>.pato
    Build { path: PathBuf },
    /// Compile and run a .pat file or project
    Run { path: PathBuf },
    /// Run a compiled .pato object program
    Exec { path: PathBuf },
    /// Print the annotated quadruple listing of a .pat file or project
    Quads { path: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// `warn` by default; `debug` with --verbose or PATITO_DEBUG set.
fn init_logging(verbose: bool) {
    let level = if verbose || std::env::var("PATITO_DEBUG").is_ok() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::New { name } => cmd_new(Path::new(&name)),
        Commands::Build { path } => cmd_build(&path).map(|out| println!("Wrote {}", out.display())),
        Commands::Run { path } => cmd_run(&path),
        Commands::Exec { path } => cmd_exec(&path),
        Commands::Quads { path } => cmd_quads(&path),
    }
}

fn cmd_new(dir: &Path) -> Result<(), String> {
    if dir.exists() {
        return Err(format!("Directory already exists: {}", dir.display()));
    }
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Invalid project name: {}", dir.display()))?;
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let manifest = Manifest::new(name).to_toml().map_err(|e| e.to_string())?;
    std::fs::write(dir.join(MANIFEST_FILE), manifest).map_err(|e| e.to_string())?;
    let main_pat = format!(
        r#"program {};

main {{
    print("Hello, Patito!");
}}
end
"#,
        program_ident(name)
    );
    std::fs::write(dir.join(DEFAULT_ENTRY), main_pat).map_err(|e| e.to_string())?;
    println!("Created project {}", name);
    Ok(())
}

/// Project names may contain characters identifiers cannot.
fn program_ident(name: &str) -> String {
    let ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    match ident.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => ident,
        _ => format!("p_{}", ident),
    }
}

/// A resolved compile target: the entry file, the directory that receives
/// dist/, and the project manifest if there is one.
struct Target {
    source: PathBuf,
    project_root: PathBuf,
    manifest: Option<Manifest>,
}

fn resolve_target(path: &Path) -> Result<Target, String> {
    let path = path.canonicalize().map_err(|e| format!("{}: {}", path.display(), e))?;
    let discovered = patito_pkg::discover(&path).map_err(|e| e.to_string())?;
    if path.is_dir() {
        let (root, manifest) = match discovered {
            Some((root, manifest)) if root == path => (root, Some(manifest)),
            _ => (path.clone(), None),
        };
        let entry = manifest
            .as_ref()
            .map(|m| m.package.entry.clone())
            .unwrap_or_else(|| DEFAULT_ENTRY.to_string());
        let source = root.join(entry);
        if !source.exists() {
            return Err(format!("No {} found in {}", source.display(), root.display()));
        }
        Ok(Target {
            source,
            project_root: root,
            manifest,
        })
    } else if path.extension().map(|e| e == "pat").unwrap_or(false) {
        let (project_root, manifest) = match discovered {
            Some((root, manifest)) => (root, Some(manifest)),
            None => (
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
                None,
            ),
        };
        Ok(Target {
            source: path,
            project_root,
            manifest,
        })
    } else {
        Err("Expected .pat file or project directory".into())
    }
}

fn compile_target(target: &Target) -> Result<Program, String> {
    tracing::debug!(
        source = %target.source.display(),
        project_root = %target.project_root.display(),
        "compile"
    );
    patito_compiler::compile_file(&target.source).map_err(|diags| {
        let source = std::fs::read_to_string(&target.source).unwrap_or_default();
        print_diagnostics(&source, &target.source.display().to_string(), &diags);
        "Compilation failed".to_string()
    })
}

fn max_call_depth(manifest: Option<&Manifest>) -> usize {
    manifest
        .map(|m| m.vm.max_call_depth)
        .unwrap_or(patito_vm::DEFAULT_MAX_CALL_DEPTH)
}

fn execute<W: Write>(program: &Program, max_depth: usize, out: W) -> Result<W, String> {
    let mut vm = VirtualMachine::new(program, out)
        .map_err(|e| format!("runtime error: {}", e))?
        .with_max_call_depth(max_depth);
    vm.run()
        .map_err(|e| format!("runtime error at quadruple {}: {}", vm.ip(), e))?;
    Ok(vm.into_output())
}

fn cmd_build(path: &Path) -> Result<PathBuf, String> {
    let target = resolve_target(path)?;
    let program = compile_target(&target)?;
    let stem = target
        .source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main");
    let out_dir = target.project_root.join("dist");
    let out_path = out_dir.join(format!("{}.{}", stem, OBJECT_EXTENSION));
    let text = toml::to_string(&program).map_err(|e| e.to_string())?;
    std::fs::create_dir_all(&out_dir).map_err(|e| e.to_string())?;
    std::fs::write(&out_path, text).map_err(|e| e.to_string())?;
    tracing::info!(path = %out_path.display(), "object program written");
    Ok(out_path)
}

fn cmd_run(path: &Path) -> Result<(), String> {
    let target = resolve_target(path)?;
    let program = compile_target(&target)?;
    let stdout = std::io::stdout().lock();
    execute(&program, max_call_depth(target.manifest.as_ref()), stdout)?;
    Ok(())
}

fn load_object(path: &Path) -> Result<Program, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    toml::from_str(&text).map_err(|e| format!("invalid object program {}: {}", path.display(), e))
}

fn cmd_exec(path: &Path) -> Result<(), String> {
    let program = load_object(path)?;
    let manifest = patito_pkg::discover(path)
        .map_err(|e| e.to_string())?
        .map(|(_, manifest)| manifest);
    let stdout = std::io::stdout().lock();
    execute(&program, max_call_depth(manifest.as_ref()), stdout)?;
    Ok(())
}

fn cmd_quads(path: &Path) -> Result<(), String> {
    let target = resolve_target(path)?;
    let program = compile_target(&target)?;
    print!("{}", program.listing());
    Ok(())
}

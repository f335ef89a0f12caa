use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, NamedSource, Report, Result};

use relasm::{source, Tables};

/// Relasm is a two-pass relocating assembler for a 16-bit page-addressed instruction set.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to assemble into `.obj` and `.lst` files beside it
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a `.asm` file into an object file and a listing file
    Assemble {
        /// `.asm` file to assemble
        name: PathBuf,
        /// Destination of the object file, defaults to `<name>.obj`
        #[arg(short, long)]
        object: Option<PathBuf>,
        /// Destination of the listing file, defaults to `<name>.lst`
        #[arg(short, long)]
        listing: Option<PathBuf>,
    },
    /// Check a `.asm` file without writing any output
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print the symbol, external and literal tables built by the first pass
    Symbols {
        /// File to inspect
        name: PathBuf,
    },
    /// Place a watch on a `.asm` file to receive constant assembler updates
    Watch {
        /// `.asm` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    relasm::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(relasm::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Assemble {
                name,
                object,
                listing,
            } => assemble(&name, object, listing),
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let src = read(&name)?;
                let (mut object, mut listing) = (std::io::sink(), std::io::sink());
                with_source(&name, &src, |src| {
                    let lines = source::read(src)?;
                    relasm::assemble_to(&lines, &mut object, &mut listing)
                })?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Symbols { name } => {
                file_message(Green, "Reading", &name);
                let src = read(&name)?;
                let tables: Tables = with_source(&name, &src, |src| {
                    let lines = source::read(src)?;
                    relasm::pass1::run(&lines)
                })?;
                print!("{tables}");
                Ok(())
            }
            Command::Watch { name } => {
                if !name.exists() {
                    bail!("File does not exist. Exiting...")
                }
                // Vim breaks if watching a single file
                let folder_path = match name.parent() {
                    Some(pth) if pth.is_dir() => pth.to_path_buf(),
                    _ => Path::new(".").to_path_buf(),
                };

                // Clear screen and move cursor to top left
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Cyan, "Help", "press CTRL+C to exit");

                let mut watcher = Hotwatch::new_with_custom_delay(Duration::from_millis(500))
                    .into_diagnostic()?;

                watcher
                    .watch(folder_path, move |event: Event| match event.kind {
                        // Watch remove for vim changes
                        EventKind::Modify(_) | EventKind::Remove(_) => {
                            // Clear screen
                            print!("\x1B[2J\x1B[2;1H");
                            file_message(Green, "Watching", &name);
                            message(Green, "Re-checking", "file change detected");
                            message(Cyan, "Help", "press CTRL+C to exit");

                            sleep(Duration::from_millis(50));

                            let result = read(&name).and_then(|src| {
                                with_source(&name, &src, relasm::assemble_source)
                            });
                            match result {
                                Ok(_) => message(Green, "Success", "no errors found!"),
                                Err(e) => println!("\n{:?}", e),
                            }
                            Flow::Continue
                        }
                        _ => Flow::Continue,
                    })
                    .into_diagnostic()?;
                watcher.run();
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        assemble(&path, None, None)
    } else {
        println!("\n~ relasm v{VERSION} ~");
        println!("{SHORT_INFO}");
        Ok(())
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    use colored::Colorize;

    if relasm::env::is_quiet() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn read(name: &Path) -> Result<String> {
    match name.extension().and_then(|ext| ext.to_str()) {
        Some("asm") => fs::read_to_string(name).into_diagnostic(),
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    }
}

/// Run `f`, attaching the file contents to any diagnostic so it renders with a snippet.
fn with_source<T>(name: &Path, src: &str, f: impl FnOnce(&str) -> Result<T>) -> Result<T> {
    f(src).map_err(|e: Report| {
        e.with_source_code(NamedSource::new(name.display().to_string(), src.to_owned()))
    })
}

fn assemble(name: &Path, object: Option<PathBuf>, listing: Option<PathBuf>) -> Result<()> {
    use MsgColor::*;

    file_message(Green, "Assembling", name);
    let src = read(name)?;
    let lines = with_source(name, &src, source::read)?;

    let object = object.unwrap_or_else(|| name.with_extension("obj"));
    let listing = listing.unwrap_or_else(|| name.with_extension("lst"));
    let mut object_file = BufWriter::new(File::create(&object).into_diagnostic()?);
    let mut listing_file = BufWriter::new(File::create(&listing).into_diagnostic()?);

    let result = with_source(name, &src, |_| {
        relasm::assemble_to(&lines, &mut object_file, &mut listing_file)
    });
    // Keep whatever was produced before a failure
    object_file.flush().into_diagnostic()?;
    listing_file.flush().into_diagnostic()?;
    let tables = result?;

    message(
        Green,
        "Finished",
        &format!(
            "{} symbols, {} literals, x{:04X} words",
            tables.symbols.len(),
            tables.literals.len(),
            tables.length
        ),
    );
    file_message(Green, "Saved", &object);
    file_message(Green, "Saved", &listing);
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to relasm, a two-pass relocating assembler producing
object and listing files for a 16-bit page-addressed machine.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");

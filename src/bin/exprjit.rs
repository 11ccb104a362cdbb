//! Command line front end for the expression JIT.
//!
//! ```text
//! exprjit "sqrt(x*x + y*y)" -x 3 -y 4
//! exprjit "sin(x)*cos(y)" --grid 8 4 --range -3 3 -3 3
//! exprjit "(x+y)*2 + (1+x)/y" --disasm --stats
//! ```

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use exprjit::core::write_object;
use exprjit::x64::disasm;
use exprjit::{CompileOptions, Compiler, FunctionTable, JitError};

#[derive(Parser, Debug)]
#[command(name = "exprjit", about = "Compile an expression of x and y to machine code and run it")]
struct Args {
    /// Expression over x and y, e.g. "sqrt(x*x + y*y)"
    expr: String,

    /// Value of x
    #[arg(short = 'x', default_value_t = 0.0, allow_negative_numbers = true)]
    x: f64,

    /// Value of y
    #[arg(short = 'y', default_value_t = 0.0, allow_negative_numbers = true)]
    y: f64,

    /// Evaluate over a grid of NX by NY cell centers instead of a single point
    #[arg(long, num_args = 2, value_names = ["NX", "NY"])]
    grid: Option<Vec<usize>>,

    /// Grid bounds
    #[arg(
        long,
        num_args = 4,
        value_names = ["XMIN", "XMAX", "YMIN", "YMAX"],
        allow_negative_numbers = true,
        default_values_t = [-1.0, 1.0, -1.0, 1.0]
    )]
    range: Vec<f64>,

    /// Disable constant folding
    #[arg(long)]
    no_fold: bool,

    /// Always spill intermediate values to the stack
    #[arg(long)]
    no_reuse: bool,

    /// Evaluate binary operands left to right
    #[arg(long)]
    no_depth_order: bool,

    /// Number of scratch xmm registers
    #[arg(long)]
    scratch: Option<u8>,

    /// Print a disassembly of the generated code
    #[arg(long)]
    disasm: bool,

    /// Write the generated code as an ELF object file
    #[arg(long, value_name = "PATH")]
    emit_obj: Option<PathBuf>,

    /// Print code size and register allocation statistics
    #[arg(long)]
    stats: bool,
}

impl Args {
    fn options(&self) -> CompileOptions {
        let mut options = CompileOptions::from_env();
        if self.no_fold {
            options.constant_folding = false;
        }
        if self.no_reuse {
            options.register_reuse = false;
        }
        if self.no_depth_order {
            options.depth_ordering = false;
        }
        if let Some(count) = self.scratch {
            options = options.with_scratch_registers(count);
        }
        options
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let compiler = Compiler::new(FunctionTable::standard()).with_options(args.options());

    if args.disasm || args.emit_obj.is_some() {
        let assembled = compiler.assemble(&args.expr)?;
        if args.disasm {
            print!("{}", disasm::listing(&assembled.code));
        }
        if let Some(path) = &args.emit_obj {
            let object = write_object("exprjit_fn", &assembled.code)?;
            fs::write(path, object)?;
            log::info!("wrote {} bytes of code to {}", assembled.code.len(), path.display());
        }
    }

    let mut code = compiler.compile(&args.expr)?;
    if args.stats {
        eprintln!("{}", code.stats());
    }

    match args.grid.as_deref() {
        Some(&[nx, ny]) => {
            let [xmin, xmax, ymin, ymax] = <[f64; 4]>::try_from(args.range.as_slice())?;
            let mut dst = vec![0.0; nx * ny];
            code.eval_grid(&mut dst, xmin, xmax, nx, ymin, ymax, ny)?;
            for row in dst.chunks(nx.max(1)) {
                let cells: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
                println!("{}", cells.join(" "));
            }
        }
        Some(_) => unreachable!("clap enforces two grid values"),
        None => println!("{}", code.eval(args.x, args.y)),
    }

    code.release();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<JitError>() {
                Some(JitError::Parse { expr, position, .. }) => {
                    eprintln!("error: {e}");
                    eprintln!("  {expr}");
                    eprintln!("  {}^", " ".repeat(*position));
                }
                _ => eprintln!("error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}

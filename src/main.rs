//! bytevm - CLI entry point
//!
//! Commands:
//! - `bytevm run <program>` - Run an image or mnemonic source file
//! - `bytevm debug <program>` - Interactive dashboard
//! - `bytevm asm <source>` - Assemble mnemonics to an image
//! - `bytevm disasm <image>` - Disassemble an image to mnemonics

use bytevm::asm::{assemble, disasm, load_image, save_image};
use bytevm::cpu::{Cpu, MachineConfig, RunOutcome, StepEvent};
use bytevm::runner::{self, Command as VmCommand, Event};
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bytevm")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of a small accumulator-based byte-code virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the image (.img) or mnemonic source (.asm) file
        program: String,
        /// Maximum number of cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show a per-instruction trace
        #[arg(short, long)]
        trace: bool,
        /// Clock delay in seconds between instructions; 0 is full speed
        #[arg(short, long, default_value = "0")]
        clock: f64,
        /// Machine configuration file (JSON)
        #[arg(long)]
        config: Option<String>,
        /// Write the final machine state as JSON
        #[arg(long)]
        dump_state: Option<String>,
    },
    /// Interactive dashboard
    Debug {
        /// Path to the image or mnemonic source file
        program: String,
        /// Machine configuration file (JSON)
        #[arg(long)]
        config: Option<String>,
    },
    /// Assemble mnemonic source to an image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an image to readable mnemonics
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { program, max_cycles, trace, clock, config, dump_state } => {
            run_program(&program, max_cycles, trace, clock, config, dump_state);
        }
        Commands::Debug { program, config } => {
            debug_program(&program, config);
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output);
        }
        Commands::Disasm { image } => {
            disassemble_file(&image);
        }
    }
}

/// Load program bytes: mnemonic source for `.asm` paths, image otherwise.
fn load_program_bytes(path: &str) -> Vec<u8> {
    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to read {}: {}", path, e);
                std::process::exit(1);
            }
        };
        match assemble(&source) {
            Ok(bytes) => {
                println!("Assembled {} bytes", bytes.len());
                bytes
            }
            Err(e) => {
                eprintln!("Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(bytes) => {
                println!("Loaded {} bytes", bytes.len());
                bytes
            }
            Err(e) => {
                eprintln!("Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(path: Option<String>) -> MachineConfig {
    match path {
        None => MachineConfig::default(),
        Some(path) => {
            let text = match std::fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Failed to read {}: {}", path, e);
                    std::process::exit(1);
                }
            };
            match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Bad machine config {}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn run_program(
    path: &str,
    max_cycles: u64,
    trace: bool,
    clock: f64,
    config: Option<String>,
    dump_state: Option<String>,
) {
    let program = load_program_bytes(path);
    let mut cpu = Cpu::new(load_config(config));

    if let Err(e) = cpu.load(&program) {
        eprintln!("Failed to load program: {}", e);
        std::process::exit(1);
    }

    let cpu = if clock > 0.0 {
        run_clocked(cpu, Duration::from_secs_f64(clock), trace)
    } else {
        run_full_speed(cpu, max_cycles, trace)
    };

    println!();
    println!("--- Result ---");
    println!("Cycles: {}", cpu.cycles);
    println!("State:  {:?}", cpu.state);
    println!("R0:     {} (x{:04x})", cpu.regs.r[0], cpu.regs.r[0]);
    println!(
        "PC: x{:04x}  SP: x{:04x}  Flag: {}",
        cpu.regs.pc, cpu.regs.sp, cpu.regs.flag
    );

    if let Some(out) = dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&out, json) {
                    eprintln!("Failed to write {}: {}", out, e);
                    std::process::exit(1);
                }
                println!("State dumped to {}", out);
            }
            Err(e) => {
                eprintln!("Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Synchronous run on this thread, with an optional trace.
fn run_full_speed(mut cpu: Cpu, max_cycles: u64, trace: bool) -> Cpu {
    if !trace {
        match cpu.run_limited(max_cycles) {
            Ok(RunOutcome::CycleLimit { executed }) => {
                println!("Cycle limit reached after {} instructions. Use --max-cycles to raise it.", executed);
            }
            Ok(_) => {}
            Err(e) => eprintln!("CPU fault: {}", e),
        }
        return cpu;
    }

    if let Err(e) = cpu.begin_run() {
        eprintln!("Cannot run: {}", e);
        return cpu;
    }
    let mut executed = 0u64;
    while cpu.is_running() && !cpu.at_end() && executed < max_cycles {
        let pc = cpu.regs.pc;
        let (text, _) = disasm::disassemble_instruction(cpu.mem.bytes(), pc);
        match cpu.step() {
            Ok(StepEvent::Executed(_)) | Ok(StepEvent::Halted) => {
                println!("{:04x}: {:<12} R0={:04x} SP={:04x}", pc, text, cpu.regs.r[0], cpu.regs.sp);
                executed += 1;
            }
            Err(e) => {
                eprintln!("CPU fault at PC {:04x}: {}", pc, e);
                break;
            }
        }
    }
    if cpu.is_running() && cpu.at_end() {
        cpu.halt();
    }
    cpu
}

/// Clocked run through the controller thread.
fn run_clocked(cpu: Cpu, clock: Duration, trace: bool) -> Cpu {
    let handle = runner::spawn(cpu);
    let _ = handle.commands.send(VmCommand::SetClock(clock));
    let _ = handle.commands.send(VmCommand::Run);

    for event in handle.events.iter() {
        match event {
            Event::Stepped { pc, instr } => {
                if trace {
                    println!("{:04x}: {}", pc, disasm::format_instruction(&instr));
                }
            }
            Event::Completed { cycles } => {
                println!("Completed after {} cycles.", cycles);
                break;
            }
            Event::Halted { cycles } => {
                println!("Halted after {} cycles.", cycles);
                break;
            }
            Event::Faulted(reason) => {
                eprintln!("CPU fault: {}", reason);
                break;
            }
            Event::Diagnostic(message) => {
                eprintln!("{}", message);
                break;
            }
            Event::Paused => {}
        }
    }

    handle.join()
}

fn debug_program(path: &str, config: Option<String>) {
    let program = load_program_bytes(path);
    let config = load_config(config);

    #[cfg(feature = "tui")]
    {
        if let Err(e) = bytevm::tui::run_dashboard(program, config) {
            eprintln!("Dashboard error: {}", e);
            std::process::exit(1);
        }
    }
    #[cfg(not(feature = "tui"))]
    {
        let _ = (program, config);
        eprintln!("This build has no dashboard; rebuild with the `tui` feature.");
        std::process::exit(1);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".img"));

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", source_path, e);
            std::process::exit(1);
        }
    };

    let bytes = match assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Assembled {} bytes", bytes.len());

    if let Err(e) = save_image(&out_path, &bytes) {
        eprintln!("Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    let bytes = match load_image(image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", disasm::disassemble(&bytes));
}

// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// main.rs
//
// This file contains the command-line interface for the Tomasulo
// simulator. `run` executes an assembly file with a configurable machine;
// `demo` executes one of the built-in demonstration programs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

use tomasulo_rust::{AsmParser, SimConfig, Simulator, SimulatorError};

#[derive(Parser)]
#[command(name = "tomasulo_rust")]
#[command(about = "A cycle-accurate Tomasulo's algorithm simulator with ROB and speculation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an assembly program
    Run {
        /// Input assembly file
        input: PathBuf,

        /// JSON configuration file; command-line overrides apply on top
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Reorder buffer capacity
        #[arg(long)]
        rob_size: Option<usize>,

        /// Add/Sub/Addi/branch reservation station count
        #[arg(long)]
        add_rs: Option<usize>,

        /// Mul/Div reservation station count
        #[arg(long)]
        mul_rs: Option<usize>,

        /// Load reservation station count
        #[arg(long)]
        load_rs: Option<usize>,

        /// Store reservation station count
        #[arg(long)]
        store_rs: Option<usize>,

        /// Maximum cycles before the run is aborted
        #[arg(long)]
        max_cycles: Option<usize>,

        /// Print the machine state after every cycle
        #[arg(short, long)]
        trace: bool,

        /// Write a JSON snapshot of the final state to this file
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Log level (error, warn, info, debug, trace)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },
    /// Run one of the built-in demonstration programs
    Demo {
        /// Demo number (1 = basic, 2 = dependencies, 3 = parallelism,
        /// 4 = memory)
        #[arg(default_value_t = 1)]
        number: usize,

        /// Print the machine state after every cycle
        #[arg(short, long)]
        trace: bool,

        /// Log level (error, warn, info, debug, trace)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },
}

const DEMO_BASIC: &str = "\
# Basic arithmetic
ADDI R1, R0, 10
ADDI R2, R0, 20
ADD R3, R1, R2
SUB R4, R3, R1
MUL R5, R3, R2
";

const DEMO_DEPENDENCIES: &str = "\
# A chain of data dependencies
ADDI R1, R0, 5
ADD R2, R1, R1
MUL R3, R2, R1
DIV R4, R3, R2
";

const DEMO_PARALLELISM: &str = "\
# Independent instructions issue back to back
ADDI R1, R0, 10
ADDI R2, R0, 20
ADDI R3, R0, 30
ADDI R4, R0, 40
ADD R5, R1, R2
MUL R6, R3, R4
";

const DEMO_MEMORY: &str = "\
# Stores reach memory at commit; loads read it back
ADDI R1, R0, 100
ADDI R2, R0, 42
SW R2, 0(R1)
SW R2, 4(R1)
LW R3, 0(R1)
LW R4, 4(R1)
ADD R5, R3, R4
";

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            config,
            rob_size,
            add_rs,
            mul_rs,
            load_rs,
            store_rs,
            max_cycles,
            trace,
            snapshot,
            log_level,
        } => {
            init_logger(&log_level);
            run_file(
                &input,
                config.as_deref(),
                RunOverrides {
                    rob_size,
                    add_rs,
                    mul_rs,
                    load_rs,
                    store_rs,
                    max_cycles,
                },
                trace,
                snapshot.as_deref(),
            )
        },
        Commands::Demo {
            number,
            trace,
            log_level,
        } => {
            init_logger(&log_level);
            run_demo(number, trace)
        },
    };

    if let Err(error) = result {
        eprintln!("{}: {}", "error".red().bold(), error);
        process::exit(1);
    }
}

fn init_logger(level: &str) {
    let filter = level.parse().unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::from_default_env()
        .filter_level(filter)
        .init();
}

struct RunOverrides {
    rob_size: Option<usize>,
    add_rs: Option<usize>,
    mul_rs: Option<usize>,
    load_rs: Option<usize>,
    store_rs: Option<usize>,
    max_cycles: Option<usize>,
}

fn run_file(
    input: &Path,
    config_file: Option<&Path>,
    overrides: RunOverrides,
    trace: bool,
    snapshot: Option<&Path>,
) -> Result<(), SimulatorError> {
    let source = fs::read_to_string(input)?;

    let mut config = match config_file {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            serde_json::from_str::<SimConfig>(&text)
                .map_err(|e| SimulatorError::InvalidConfig(e.to_string()))?
        },
        None => SimConfig::default(),
    };
    if let Some(rob_size) = overrides.rob_size {
        config.rob_size = rob_size;
    }
    if let Some(add_rs) = overrides.add_rs {
        config.add_rs = add_rs;
    }
    if let Some(mul_rs) = overrides.mul_rs {
        config.mul_rs = mul_rs;
    }
    if let Some(load_rs) = overrides.load_rs {
        config.load_rs = load_rs;
    }
    if let Some(store_rs) = overrides.store_rs {
        config.store_rs = store_rs;
    }
    if let Some(max_cycles) = overrides.max_cycles {
        config.max_cycles = max_cycles;
    }

    execute(&source, config, trace, snapshot)
}

fn run_demo(number: usize, trace: bool) -> Result<(), SimulatorError> {
    let (title, source) = match number {
        1 => ("Basic arithmetic", DEMO_BASIC),
        2 => ("Data dependencies", DEMO_DEPENDENCIES),
        3 => ("Parallelism", DEMO_PARALLELISM),
        4 => ("Memory operations", DEMO_MEMORY),
        other => {
            return Err(SimulatorError::InvalidConfig(format!(
                "no demo number {}; choose 1-4",
                other
            )))
        },
    };

    println!("{}", format!("### Demo {}: {} ###", number, title).bold());
    println!("{}", source);
    execute(source, SimConfig::default(), trace, None)
}

fn execute(
    source: &str,
    config: SimConfig,
    trace: bool,
    snapshot: Option<&Path>,
) -> Result<(), SimulatorError> {
    let mut parser = AsmParser::new();
    let instructions = parser.parse_program(source)?;
    println!("Program loaded: {} instructions", instructions.len());

    let mut simulator = Simulator::new(config)?;
    simulator.load_program(instructions);

    if trace {
        while !simulator.finished {
            simulator.step();
            print_cycle_state(&simulator);
            if !simulator.finished && simulator.current_cycle >= simulator.config.max_cycles {
                println!("Simulation aborted: exceeded {} cycles", simulator.config.max_cycles);
                break;
            }
        }
    } else if !simulator.run_until_complete() {
        println!("Simulation aborted: exceeded {} cycles", simulator.config.max_cycles);
    }

    print_instruction_table(&simulator);
    print_registers(&simulator);
    print_memory(&simulator);
    print_metrics(&simulator);

    if let Some(path) = snapshot {
        let snap = simulator.state_snapshot();
        let json = serde_json::to_string_pretty(&snap)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)?;
        println!("\nSnapshot written to {}", path.display());
    }

    Ok(())
}

fn fmt_cycle(cycle: Option<usize>) -> String {
    cycle.map_or_else(|| "-".to_string(), |c| c.to_string())
}

fn print_instruction_table(simulator: &Simulator) {
    println!();
    println!(
        "{}",
        format!(
            "{:<4} {:<25} {:>6} {:>6} {:>6} {:>6} {:>6}  {}",
            "PC", "Instruction", "Issue", "ExecS", "ExecE", "Write", "Commit", "Stage"
        )
        .bold()
    );
    println!("{}", "-".repeat(80));
    for inst in &simulator.instructions {
        println!(
            "{:<4} {:<25} {:>6} {:>6} {:>6} {:>6} {:>6}  {}",
            inst.pc,
            inst.op.to_string(),
            fmt_cycle(inst.issue_cycle),
            fmt_cycle(inst.exec_start_cycle),
            fmt_cycle(inst.exec_end_cycle),
            fmt_cycle(inst.write_cycle),
            fmt_cycle(inst.commit_cycle),
            inst.stage,
        );
    }
}

fn print_registers(simulator: &Simulator) {
    println!();
    println!("{}", "Registers (non-zero):".bold());
    let mut shown = 0;
    for (number, value) in simulator.registers.values().iter().enumerate() {
        if *value == 0 && number != 0 {
            continue;
        }
        print!("{:<4}= {:<8} ", format!("R{}", number), value);
        shown += 1;
        if shown % 4 == 0 {
            println!();
        }
    }
    if shown % 4 != 0 {
        println!();
    }
}

fn print_memory(simulator: &Simulator) {
    if simulator.memory.is_empty() {
        return;
    }
    println!();
    println!("{}", "Memory:".bold());
    let mut entries: Vec<(i32, i32)> = simulator.memory.iter().collect();
    entries.sort_unstable();
    for (address, value) in entries {
        println!("  [{}] = {}", address, value);
    }
}

fn print_metrics(simulator: &Simulator) {
    println!();
    println!("{}", simulator.metrics);
    let predictor = &simulator.branch_predictor;
    if predictor.predictions() > 0 {
        println!("  Branch predictions:     {}", predictor.predictions());
        println!(
            "  Prediction accuracy:    {:.1}%",
            predictor.accuracy() * 100.0
        );
    }
}

fn print_cycle_state(simulator: &Simulator) {
    println!("{}", format!("=== Cycle {} ===", simulator.current_cycle).bold());
    for station in &simulator.stations {
        if station.busy {
            println!("  {}", station);
        }
    }
    for (index, entry) in simulator.rob.iter().enumerate() {
        if !entry.busy {
            continue;
        }
        let mut markers = String::new();
        if index == simulator.rob_head {
            markers.push_str(" (HEAD)");
        }
        if index == simulator.rob_tail {
            markers.push_str(" (TAIL)");
        }
        let text = entry
            .instruction
            .map(|pc| simulator.instructions[pc].op.to_string())
            .unwrap_or_else(|| "?".to_string());
        let spec = if entry.speculative { " [SPEC]" } else { "" };
        println!(
            "  ROB{}{}: {:<8} {:<25} Dest={} Value={} Ready={}{}",
            index,
            markers,
            entry.state.to_string(),
            text,
            entry.dest,
            entry
                .value
                .map_or_else(|| "-".to_string(), |v| v.to_string()),
            entry.ready,
            spec,
        );
    }
}

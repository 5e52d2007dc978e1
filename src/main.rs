use std::env;
use std::fs;
use std::io::Write as _;
use std::process::ExitCode;

use stackvm::display;
use stackvm::Machine;

struct Args {
    program_path: String,
    disk_path: Option<String>,
    headless: bool,
    debug: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut program_path = None;
    let mut disk_path = None;
    let mut headless = false;
    let mut debug = false;

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--disk" => {
                let path = it.next().ok_or("--disk requires a path")?;
                disk_path = Some(path);
            }
            "--headless" => headless = true,
            "--debug" => debug = true,
            other if program_path.is_none() => program_path = Some(other.to_string()),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(Args {
        program_path: program_path.ok_or("usage: stackvm <program> [--disk <image>] [--headless] [--debug]")?,
        disk_path,
        headless,
        debug,
    })
}

fn load_machine(args: &Args) -> Result<Machine, String> {
    let program = fs::read(&args.program_path)
        .map_err(|e| format!("failed to read program {}: {e}", args.program_path))?;
    let mut machine = Machine::new();
    machine.load_program(&program);
    println!("loaded {} ({} bytes)", args.program_path, program.len());

    if let Some(disk_path) = &args.disk_path {
        let image =
            fs::read(disk_path).map_err(|e| format!("failed to read disk image {disk_path}: {e}"))?;
        if image.len() > stackvm::disk::DISK_SIZE {
            eprintln!(
                "warning: disk image {disk_path} is {} bytes, truncating to {}",
                image.len(),
                stackvm::disk::DISK_SIZE
            );
        } else if image.len() < stackvm::disk::DISK_SIZE {
            eprintln!(
                "warning: disk image {disk_path} is {} bytes, zero-padding to {}",
                image.len(),
                stackvm::disk::DISK_SIZE
            );
        }
        machine.load_disk_image(&image);
        println!("loaded disk image {disk_path}");
    } else {
        println!("no disk image given, disk starts blank");
    }

    Ok(machine)
}

fn print_debug_line(machine: &Machine) {
    print!("\x1b[2K\r{}", machine.debug_state());
    let _ = std::io::stdout().flush();
}

fn run_headless(mut machine: Machine, debug: bool) {
    let mut frame = vec![0u32; display::FRAME_WIDTH * display::FRAME_HEIGHT];
    let mut frames = 0u64;
    while !machine.is_halted() {
        machine.frame(&mut frame);
        frames += 1;
        if debug {
            print_debug_line(&machine);
        }
    }
    println!("halted after {frames} frames");
}

fn run_windowed(mut machine: Machine, debug: bool) -> Result<(), String> {
    use minifb::{Window, WindowOptions};

    let mut window = Window::new(
        "stackvm",
        display::FRAME_WIDTH,
        display::FRAME_HEIGHT,
        WindowOptions::default(),
    )
    .map_err(|e| format!("failed to open display window: {e}"))?;

    let mut frame = vec![0u32; display::FRAME_WIDTH * display::FRAME_HEIGHT];
    while window.is_open() && !machine.is_halted() {
        machine.frame(&mut frame);
        window
            .update_with_buffer(&frame, display::FRAME_WIDTH, display::FRAME_HEIGHT)
            .map_err(|e| format!("failed to present frame: {e}"))?;
        if debug {
            print_debug_line(&machine);
        }
    }
    println!("halted, closing window");
    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let machine = match load_machine(&args) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let result = if args.headless {
        run_headless(machine, args.debug);
        Ok(())
    } else {
        run_windowed(machine, args.debug)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

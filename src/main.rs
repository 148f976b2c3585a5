use clap::{crate_name, crate_version, Arg, Command};
use env_logger::Builder;
use log::{error, LevelFilter};
use rusty_mbd::defaults::RESULT_FILE_NAME;
use rusty_mbd::io::{read_input, write_footer, write_header, write_result};
use rusty_mbd::utils::Timer;
use rusty_mbd::{MbdResult, System};
use std::io::Write;
use std::path::Path;
use std::process;

fn main() {
    // Input.
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("many-body dispersion energies and gradients")
        .arg(
            Arg::new("input-File")
                .help("Sets the TOML file with the atoms and their response properties")
                .required(true)
                .index(1),
        )
        .get_matches();
    let input_file: &str = matches.value_of("input-File").unwrap_or_default();

    // The configuration is read from the working directory together with the system.
    let system: System = match read_input(input_file) {
        Ok(system) => system,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            process::exit(1);
        }
    };
    let config = system.config.clone();

    // Multithreading.
    if let Err(err) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallelization.number_of_cores)
        .build_global()
    {
        eprintln!("Error: unable to build the thread pool: {}", err);
        process::exit(1);
    }

    // Logging.
    // The log level is set.
    let log_level: LevelFilter = match config.verbose {
        2 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        0 => LevelFilter::Info,
        -1 => LevelFilter::Warn,
        -2 => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    // and the logger is build.
    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter(None, log_level)
        .init();

    // The program header is written to the command line.
    write_header();
    // and the total wall-time timer is started.
    let timer: Timer = Timer::start();

    // Computations.
    // ................................................................
    let result: MbdResult = match system.calculate(config.gradients_requested()) {
        Ok(result) => result,
        Err(err) => {
            error!("The calculation failed: {}", err);
            process::exit(1);
        }
    };
    if let Err(err) = write_result(&result, Path::new(RESULT_FILE_NAME)) {
        error!("{:#}", err);
        process::exit(1);
    }
    // ................................................................

    // Finished.
    // The total wall-time is printed together with the end statement.
    write_footer(timer);
}

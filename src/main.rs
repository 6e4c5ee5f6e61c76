mod app;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use app::{CapresApp, CliOptions};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"CapRes Analyzer - CTLM contact-resistance extraction

USAGE:
    capres-analyzer [OPTIONS] <FILE>...

ARGS:
    <FILE>...                   Instrument export(s). One file is read as a
                                multi-sweep export, several as one sweep each.

OPTIONS:
    -h, --help                  Print help information
    -V, --version               Print version information
    -d, --dir <DIR>             Load every *.csv in DIR (sorted by name)
    -c, --config <PATH>         JSON analysis config
    -w, --window <V>            Zero-bias fit half-width (default: 0.5)
    -l, --contact-length <UM>   Contact length R2 in µm (default: 100)
    -s, --spacing <N>=<LABEL>   Set spacing-table entry N (1-9)
    -a, --all                   Include every curve, not just the first nine
    -o, --output <DIR>          Write summary and CSV tables to DIR
    --json                      Print the full report as JSON

EXAMPLES:
    capres-analyzer ctlm_iv.csv                      # One export, many sweeps
    capres-analyzer --dir runs/ -l 120 -o out/       # One sweep per file
    capres-analyzer ctlm_iv.csv -s 1=5um -s 2=10um   # Custom spacings
    capres-analyzer cv_dump.csv --json               # C-V curves as JSON"#
    );
}

fn print_version() {
    println!("capres-analyzer {VERSION}");
}

fn parse_spacing(value: &str) -> Option<(usize, String)> {
    let (group, label) = value.split_once('=')?;
    Some((group.trim().parse().ok()?, label.trim().to_string()))
}

fn parse_args() -> Result<CliOptions, String> {
    let mut args = env::args().skip(1);
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        let mut value = || {
            args.next()
                .ok_or_else(|| format!("missing value for {arg}"))
        };
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                print_version();
                std::process::exit(0);
            }
            "--dir" | "-d" => options.dir = Some(PathBuf::from(value()?)),
            "--config" | "-c" => options.config = Some(PathBuf::from(value()?)),
            "--window" | "-w" => options.window = Some(value()?),
            "--contact-length" | "-l" => options.contact_length = Some(value()?),
            "--spacing" | "-s" => {
                let v = value()?;
                let entry =
                    parse_spacing(&v).ok_or_else(|| format!("expected N=LABEL, got {v:?}"))?;
                options.spacing.push(entry);
            }
            "--all" | "-a" => options.select_all = true,
            "--output" | "-o" => options.output = Some(PathBuf::from(value()?)),
            "--json" => options.json = true,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            other => options.inputs.push(PathBuf::from(other)),
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    env_logger::init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("try --help");
            return ExitCode::from(2);
        }
    };

    match CapresApp::new(options).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

use schemaglot::translate::Target;
use schemaglot::{SourceFormat, translate};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <input> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -f, --from <dialect>  Source dialect: dbml, sql (default: by extension)");
        eprintln!("  -t, --to <dialect>    Target dialect: dbml, sql, orm (default: sql)");
        eprintln!("  -o, --output <file>   Output file (default: stdout)");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut from: Option<SourceFormat> = None;
    let mut to = Target::Sql;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-f" | "--from" => {
                i += 1;
                if i < args.len() {
                    from = Some(SourceFormat::from_str(&args[i]).unwrap_or_else(|| {
                        eprintln!("Unknown source dialect: {}", args[i]);
                        process::exit(1);
                    }));
                }
            }
            "-t" | "--to" => {
                i += 1;
                if i < args.len() {
                    to = Target::from_str(&args[i]).unwrap_or_else(|| {
                        eprintln!("Unknown target dialect: {}", args[i]);
                        process::exit(1);
                    });
                }
            }
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let from = from.unwrap_or_else(|| {
        if input_path.ends_with(".sql") || input_path.ends_with(".ddl") {
            SourceFormat::Sql
        } else {
            SourceFormat::Dbml
        }
    });

    let input = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let output = match translate(&input, from, to) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Translation error: {}", e);
            process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &output) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => println!("{}", output),
    }
}

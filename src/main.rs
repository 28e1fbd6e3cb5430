//! TESSERA - Interactive Shell
//! A line-oriented shell over a Tessera data directory.
//!
//! Usage: `tessera [DATA_DIR]` (defaults to `./data`).

use std::io::{self, BufRead, Write};

use tessera::{Config, Tessera, TesseraError};

fn print_banner() {
    println!();
    println!("  ╔═══════════════════════════════════════════╗");
    println!("  ║          TESSERA Storage Engine           ║");
    println!("  ║   Skip List + SSTable Key-Value Store     ║");
    println!("  ╚═══════════════════════════════════════════╝");
    println!();
    println!("  Commands:");
    println!("    set <key> <value>    - Store a key-value pair");
    println!("    get <key>            - Retrieve a value by key");
    println!("    has <key>            - Check whether a key exists");
    println!("    del <key>            - Delete a key");
    println!("    scan [start limit]   - List pairs, optionally in [start, limit)");
    println!("    flush                - Write buffered entries to a new SSTable");
    println!("    info                 - Show engine statistics");
    println!("    exit                 - Shutdown engine");
    println!();
}

fn show(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => format!("\"{}\"", s),
        Err(_) => format!("<{} bytes binary>", bytes.len()),
    }
}

fn run_scan(engine: &Tessera, parts: &[&str]) -> tessera::Result<()> {
    let entries = match parts {
        [] => engine.scan()?,
        [start, limit] => engine
            .range_scan(start.as_bytes(), limit.as_bytes())?
            .collect::<tessera::Result<Vec<_>>>()?,
        _ => {
            println!("  Usage: scan [start limit]");
            return Ok(());
        }
    };

    if entries.is_empty() {
        println!("  (empty)");
    } else {
        for (key, value) in &entries {
            println!("  {} -> {}", show(key), show(value));
        }
        println!("  ({} entries)", entries.len());
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(dir) => Config::new(dir),
        None => Config::default(),
    };

    print_banner();

    let mut engine = match Tessera::open(config) {
        Ok(e) => e,
        Err(err) => {
            eprintln!("[ERROR] Failed to open engine: {}", err);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("tessera> ");
        if stdout.flush().is_err() {
            break;
        }

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("[ERROR] Failed to read input: {}", e);
                break;
            }
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((command, args)) = parts.split_first() else {
            continue;
        };

        match command.to_lowercase().as_str() {
            "set" | "put" => {
                if args.len() < 2 {
                    println!("  Usage: set <key> <value>");
                    continue;
                }
                let key = args[0].as_bytes().to_vec();
                let value = args[1..].join(" ").into_bytes();
                match engine.put(key, value) {
                    Ok(()) => println!("  OK"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "get" => {
                let [key] = args else {
                    println!("  Usage: get <key>");
                    continue;
                };
                match engine.get(key.as_bytes()) {
                    Ok(value) => println!("  {}", show(&value)),
                    Err(TesseraError::KeyNotFound) => println!("  (nil)"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "has" => {
                let [key] = args else {
                    println!("  Usage: has <key>");
                    continue;
                };
                match engine.has(key.as_bytes()) {
                    Ok(found) => println!("  {}", found),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "del" | "delete" => {
                let [key] = args else {
                    println!("  Usage: del <key>");
                    continue;
                };
                match engine.delete(key.as_bytes()) {
                    Ok(()) => println!("  OK (deleted)"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "scan" | "list" => {
                if let Err(e) = run_scan(&engine, args) {
                    println!("  ERROR: {}", e);
                }
            }
            "flush" => match engine.flush() {
                Ok(()) => println!("  OK ({} sstables)", engine.table_count()),
                Err(e) => println!("  ERROR: {}", e),
            },
            "info" | "stats" => {
                println!("  Data dir:       {:?}", engine.config().data_dir);
                println!("  SSTables:       {}", engine.table_count());
                println!("  MemTable size:  {} bytes", engine.memtable_size());
                println!("  Tombstones:     {} bytes", engine.tombstones_size());
                println!("{}", engine.metrics().report());
            }
            "exit" | "quit" | "q" => {
                println!("  Shutting down TESSERA...");
                break;
            }
            _ => {
                println!("  Unknown command: '{}'. Type 'exit' to quit.", command);
            }
        }
    }

    // Buffered entries are only durable once flushed.
    if let Err(e) = engine.flush() {
        eprintln!("[ERROR] Final flush failed: {}", e);
        std::process::exit(1);
    }
}

use plotlisp::lexer::check_balance;
use plotlisp::primitives::primitives;
use plotlisp::{EvalConfig, Evaluator, ParseConfig, Session, Value};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use std::thread;
use tracing_subscriber::EnvFilter;

/// Deep recursion in user code needs more than the default main-thread stack
const REPL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Evaluation depth that fits in `REPL_STACK_SIZE`
const REPL_MAX_DEPTH: usize = 5_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let handle = thread::Builder::new()
        .name("repl".into())
        .stack_size(REPL_STACK_SIZE)
        .spawn(|| panic::catch_unwind(run_repl));

    let result = match handle {
        Ok(handle) => handle.join().unwrap_or_else(Err),
        Err(err) => {
            eprintln!("Could not start the REPL thread: {err}");
            process::exit(1);
        }
    };

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("plotlisp: a small dynamically-scoped S-expression language");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };

    let parse = ParseConfig {
        handle_comments: true,
    };
    let session = Session::with_evaluator(Evaluator::new(EvalConfig {
        max_depth: REPL_MAX_DEPTH,
        parse,
    }));

    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            "plotlisp> "
        } else {
            "     ...> "
        };

        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }

                    // Handle special commands
                    match command {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&session);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');

                // Keep reading while a list is still open
                if let Err(err) = check_balance(&pending, parse)
                    && err.found.as_deref() == Some("(")
                {
                    continue;
                }

                let source = std::mem::take(&mut pending);
                let _ = rl.add_history_entry(source.trim_end());

                match session.evaluate_program(&source) {
                    Ok(Value::Unspecified) => {}
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                // Ctrl+C abandons a partial expression
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show top-level bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Input continues over several lines until parentheses balance.");
    println!("Comments start with ';' and run to the end of the line.");
    println!();
    println!("Values: numbers (3, -2.5), strings (\"hi\"), TRUE, FALSE, procedures");
    println!("Only FALSE is false; 0 and \"\" count as true.");
    println!("Procedures see the caller's bindings (dynamic scope).");
    println!();
    println!("Primitives:");
    let mut col = 0;
    for op in primitives() {
        print!("  {:<12}", op.name);
        col += 1;
        if col % 5 == 0 {
            println!();
        }
    }
    if col % 5 != 0 {
        println!();
    }
    println!();
    println!("Examples:");
    println!("  (define square (lambda (x) (* x x)))");
    println!("  (square 7)");
    println!("  (cond ((< 1 2) \"yes\") (else \"no\"))");
    println!("  (draw-plot 400 300 (lambda (x) (sin x)))");
    println!("  (load-file \"prelude.lisp\")");
    println!();
}

fn print_environment(session: &Session) {
    let bindings = session.bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    for (name, value) in bindings {
        println!("  {name} = {value}");
    }
}

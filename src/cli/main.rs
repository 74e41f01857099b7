//! # Daedalus DB CLI
//!
//! An interactive REPL over a [`Database`], in the same accumulate-a-line /
//! dispatch-dot-command shape as the original shell, retargeted from SQL
//! statements to class/node operations.

use std::env;
use std::io::{self, BufRead, Write};

use daedalus::{Class, Database, DbError, OpenMode, Primitive, PrimitiveType, Value};

fn main() {
    let args: Vec<String> = env::args().collect();

    let db_path = if args.len() > 1 {
        args[1].clone()
    } else {
        "daedalus.db".to_string()
    };

    println!("Daedalus DB v{}", env!("CARGO_PKG_VERSION"));
    println!("Enter \".help\" for usage hints.");
    println!("Connected to {}", db_path);

    let mut db = match Database::open(&db_path, OpenMode::Default) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening database: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("daedalus> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(_) => break,
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !trimmed.starts_with('.') {
            eprintln!("Error: unrecognized input; commands start with '.' (try .help)");
            continue;
        }

        if handle_dot_command(trimmed, &mut db) {
            break;
        }
    }

    println!();
}

/// Returns `true` when the REPL should exit.
fn handle_dot_command(cmd: &str, db: &mut Database) -> bool {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    let command = parts[0].to_lowercase();

    match command.as_str() {
        ".help" => {
            println!(".help                    Show this help");
            println!(".classes                 List every registered class");
            println!(".defclass TAG NAME       Register a primitive or string class");
            println!(".add CLASS VALUE...      Insert a node into CLASS");
            println!(".nodes CLASS             List every node of CLASS");
            println!(".quit / .exit            Exit this program");
            false
        }
        ".classes" => {
            let result = db.visit_class_names(|name, serialized| {
                println!("{name}  {serialized}");
                Ok(())
            });
            if let Err(e) = result {
                eprintln!("Error: {e}");
            }
            false
        }
        ".defclass" => {
            if parts.len() != 3 {
                eprintln!("Usage: .defclass TAG NAME");
                return false;
            }
            let result = PrimitiveType::from_tag(parts[1])
                .map(|ty| Class::primitive(parts[2], ty))
                .unwrap_or_else(|| {
                    if parts[1] == "string" {
                        Class::string(parts[2])
                    } else {
                        Err(DbError::Type(format!("unknown type tag {:?}", parts[1])))
                    }
                })
                .and_then(|class| db.add_class(&class));
            match result {
                Ok(_) => println!("registered"),
                Err(e) => eprintln!("Error: {e}"),
            }
            false
        }
        ".add" => {
            if parts.len() < 3 {
                eprintln!("Usage: .add CLASS VALUE");
                return false;
            }
            let class_name = parts[1];
            let text = parts[2..].join(" ");
            match db.find_class_by_name(class_name) {
                Ok(Some(class)) => match value_for(&class, &text) {
                    Ok(value) => match db.add_node(&class, value) {
                        Ok(id) => println!("inserted id {id}"),
                        Err(e) => eprintln!("Error: {e}"),
                    },
                    Err(e) => eprintln!("Error: {e}"),
                },
                Ok(None) => eprintln!("Error: no such class {class_name:?}"),
                Err(e) => eprintln!("Error: {e}"),
            }
            false
        }
        ".nodes" => {
            if parts.len() != 2 {
                eprintln!("Usage: .nodes CLASS");
                return false;
            }
            match db.find_class_by_name(parts[1]) {
                Ok(Some(class)) => {
                    let result = db.visit_nodes(&class, |_, _| true, |_, value| {
                        println!("{}", value.display(&class));
                        Ok(())
                    });
                    if let Err(e) = result {
                        eprintln!("Error: {e}");
                    }
                }
                Ok(None) => eprintln!("Error: no such class {:?}", parts[1]),
                Err(e) => eprintln!("Error: {e}"),
            }
            false
        }
        ".quit" | ".exit" => true,
        _ => {
            eprintln!("Error: unknown command: {}", command);
            eprintln!("Use .help for a list of commands.");
            false
        }
    }
}

/// Parses a single space-free token into a value shaped like `class`.
/// Only primitive and string classes are supported from the shell;
/// structs and relations need the library API.
fn value_for(class: &Class, text: &str) -> daedalus::Result<Value> {
    match class {
        Class::Primitive { ty, .. } => parse_primitive(*ty, text),
        Class::String { .. } => Ok(Value::Str(text.to_string())),
        _ => Err(DbError::NotImplemented(
            "the shell can only build primitive and string values; use the library API for structs and relations".into(),
        )),
    }
}

fn parse_primitive(ty: PrimitiveType, text: &str) -> daedalus::Result<Value> {
    let bad = |e: std::fmt::Arguments| DbError::BadArgument(format!("{e}"));
    let p = match ty {
        PrimitiveType::Bool => Primitive::Bool(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not a bool")))?,
        ),
        PrimitiveType::I8 => Primitive::I8(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not an i8")))?,
        ),
        PrimitiveType::U8 => Primitive::U8(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not a u8")))?,
        ),
        PrimitiveType::I16 => Primitive::I16(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not an i16")))?,
        ),
        PrimitiveType::U16 => Primitive::U16(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not a u16")))?,
        ),
        PrimitiveType::I32 => Primitive::I32(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not an i32")))?,
        ),
        PrimitiveType::U32 => Primitive::U32(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not a u32")))?,
        ),
        PrimitiveType::I64 => Primitive::I64(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not an i64")))?,
        ),
        PrimitiveType::U64 => Primitive::U64(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not a u64")))?,
        ),
        PrimitiveType::F32 => Primitive::F32(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not an f32")))?,
        ),
        PrimitiveType::F64 => Primitive::F64(
            text.parse()
                .map_err(|_| bad(format_args!("{text:?} is not an f64")))?,
        ),
    };
    Ok(Value::Primitive(p))
}

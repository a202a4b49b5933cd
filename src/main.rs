use lisp86::repl::{Input, Repl};
use lisp86::{compile_function, read, value, Buffer};

/// Words available to each evaluation's bump allocator.
const HEAP_WORDS: usize = 4096;

fn main() {
    let dump_bytes = std::env::args().any(|arg| arg == "--dump");

    let mut repl = match Repl::new() {
        Ok(repl) => repl,
        Err(err) => {
            eprintln!("failed to start line editor: {}", err);
            std::process::exit(1);
        }
    };

    println!("lisp86 {}", env!("CARGO_PKG_VERSION"));
    println!("Empty line or Ctrl-D exits");

    loop {
        let line = match repl.read_line("lisp> ") {
            Ok(Input::Line(line)) => line,
            Ok(Input::End) => break,
            Err(err) => {
                eprintln!("input error: {}", err);
                break;
            }
        };
        if line.trim().is_empty() {
            break;
        }

        let node = match read(&line) {
            Ok(node) => node,
            Err(err) => {
                eprintln!("Parse error! {}", err);
                continue;
            }
        };

        let mut buf = Buffer::new();
        if let Err(err) = compile_function(&mut buf, &node) {
            eprintln!("Compile error: {}", err);
            continue;
        }

        if dump_bytes {
            let hex: Vec<String> = buf.as_slice().iter().map(|b| format!("{:02x}", b)).collect();
            eprintln!("{}", hex.join(" "));
        }

        #[cfg(target_arch = "x86_64")]
        {
            let code = match buf.freeze() {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("failed to map executable memory: {}", err);
                    continue;
                }
            };
            let mut heap = vec![0u64; HEAP_WORDS];
            let result = unsafe { code.run(&mut heap) };
            println!("{}", value::format_value(result, &heap));
        }

        #[cfg(not(target_arch = "x86_64"))]
        eprintln!("generated {} bytes of x86-64 code; this host cannot run them", buf.len());
    }

    repl.finalize();
    println!("Good bye");
}

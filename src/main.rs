fn main() {
    if let Err(err) = ollama_cli::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}

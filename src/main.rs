fn main() {
    if let Err(err) = mcp_browser::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

mod cli;

fn main() {
    match cli::run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{e:#}"); // pretty anyhow chain
            std::process::exit(1);
        }
    }
}

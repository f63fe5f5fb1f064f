fn main() {
    if let Err(e) = provcheck::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

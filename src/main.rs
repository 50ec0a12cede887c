fn main() {
    if let Err(err) = csv_dashboard::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

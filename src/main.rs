use axmlview::cli::Cli;

fn main() {
    let matches = Cli::build_command().get_matches();

    env_logger::Builder::new()
        .filter_level(Cli::log_level(&matches))
        .parse_default_env()
        .init();

    if let Err(e) = Cli::run_with_matches(matches) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

//! Main application entry point.

fn main() {
    env_logger::init();
    log::info!("Starting viewmeasure");

    if let Err(error) = viewmeasure_app::run(std::env::args_os()) {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

use smart_intersection::config::ControllerConfig;
use smart_intersection::monitoring::ManualConsole;
use smart_intersection::publisher::open_store;
use std::io::{stdin, stdout};
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match ControllerConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("Manual control writing to the {:?} store", config.store.backend);
    let store = open_store(&config.store);
    let console = ManualConsole::new(store.as_ref(), &config.store);
    if let Err(e) = console.run(stdin().lock(), &mut stdout()) {
        eprintln!("Console error: {:#}", e);
    }
}

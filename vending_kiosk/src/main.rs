use dotenvy::dotenv;
use log::info;
use vending_kiosk::{cli::handle_command_line_args, config::KioskConfig, machine::run_kiosk};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = KioskConfig::from_env_or_default();

    info!("🚀️ Starting the kiosk in {} payment mode", config.payment_mode);
    match run_kiosk(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

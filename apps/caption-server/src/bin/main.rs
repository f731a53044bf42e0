use caption_server::standalone;

#[tokio::main]
async fn main() {
    if let Err(e) = standalone::start_server().await {
        eprintln!("Error starting caption server: {:?}", e);
        std::process::exit(1);
    }
}

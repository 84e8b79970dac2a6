use mplayer_rc::AppConfig;

#[tokio::main]
async fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let tracks: Vec<String> = std::env::args().skip(1).collect();
  if tracks.is_empty() {
    eprintln!("usage: mplayer-rc <files or URLs>...");
    eprintln!();
    eprintln!("Set MPRC_PASSWORD to the password of the HTTP remote.");
    std::process::exit(2);
  }

  let config = match AppConfig::default().apply_env() {
    Ok(config) => config,
    Err(e) => {
      log::error!("{}", e);
      std::process::exit(1);
    }
  };

  if let Err(e) = mplayer_rc::run(config, tracks).await {
    log::error!("{}", e);
    std::process::exit(1);
  }
}

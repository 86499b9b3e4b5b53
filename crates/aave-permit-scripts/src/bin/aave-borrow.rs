use aave_scripts::flow;
use aave_scripts::settings::Settings;

#[tokio::main]
async fn main() {
    aave_scripts::init_tracing();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(?settings, "loaded settings");

    if let Err(e) = flow::run(&settings).await {
        if e.requires_resign() {
            tracing::error!(error = %e, "permit unusable, run again to sign a fresh one");
        } else {
            tracing::error!(error = %e, "script failed");
        }
        std::process::exit(1);
    }
}

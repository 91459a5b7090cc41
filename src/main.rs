use tone2vibe::{
    configuration::get_configuration,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("tone2vibe".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber)?;

    let config = get_configuration()?;
    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
